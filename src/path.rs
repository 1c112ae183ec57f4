// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Every path the planner juggles is relative to the target directory, and
//! every link source is relative to the directory holding the link. Nothing
//! here touches the process working directory. Paths are combined and
//! cleaned up lexically, the same way the links themselves will be read
//! back later.

use std::{
    ffi::{OsStr, OsString},
    path::{Component, Path, PathBuf},
};

/// Name of the rc file looked up in the current and home directories.
pub const RC_FILE_NAME: &str = ".oxistowrc.toml";

/// Determine absolute path to user's home directory.
///
/// Does not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or(NoWayHome)
}

/// Candidate rc file locations in lookup order.
///
/// The current directory comes first, then the home directory. Does not
/// check if any of the paths exist.
///
/// # Errors
///
/// - Return [`NoWayHome`] if home directory path cannot be determined.
pub fn rc_file_candidates() -> Result<Vec<PathBuf>> {
    Ok(vec![
        PathBuf::from(RC_FILE_NAME),
        home_dir()?.join(RC_FILE_NAME),
    ])
}

/// Lexically normalize a path.
///
/// Drops `.` components and folds `name/..` pairs without consulting the
/// filesystem. Leading `..` components of a relative path are kept. An
/// empty result becomes `.`.
pub fn normalize(path: impl AsRef<Path>) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.as_ref().components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                // INVARIANT: Cannot climb above the filesystem root.
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            _ => parts.push(component),
        }
    }

    if parts.is_empty() {
        PathBuf::from(".")
    } else {
        parts.iter().collect()
    }
}

/// Join `tail` onto `base` and normalize the result.
///
/// An absolute `tail` replaces `base` entirely.
pub fn join(base: impl AsRef<Path>, tail: impl AsRef<Path>) -> PathBuf {
    normalize(base.as_ref().join(tail))
}

/// Express `path` relative to `base`.
///
/// Both paths should be absolute and canonical. The result climbs out of
/// `base` with `..` as far as needed, so it is only meaningful when no
/// component of `base` below the common prefix is a symlink.
pub fn relative_path(path: impl AsRef<Path>, base: impl AsRef<Path>) -> PathBuf {
    let path = normalize(path);
    let base = normalize(base);
    let mut path_parts = path.components().peekable();
    let mut base_parts = base.components().peekable();

    while let (Some(lhs), Some(rhs)) = (path_parts.peek(), base_parts.peek()) {
        if lhs != rhs {
            break;
        }
        path_parts.next();
        base_parts.next();
    }

    let mut relative = PathBuf::new();
    for part in base_parts {
        if !matches!(part, Component::CurDir) {
            relative.push(Component::ParentDir);
        }
    }
    for part in path_parts {
        relative.push(part);
    }

    normalize(relative)
}

/// Translate a package entry name into its target name for dotfile mode.
///
/// A leading `dot-` becomes `.`, so `dot-bashrc` turns into `.bashrc`. The
/// bare names `dot-` and `dot-.` are left alone.
pub fn translate_dotfile(name: &OsStr) -> OsString {
    match name.as_encoded_bytes().strip_prefix(b"dot-") {
        Some(rest) if !rest.is_empty() && rest != b"." => {
            // SAFETY: `rest` is `name` split right after an ASCII prefix, so
            // it is still valid encoded text.
            let rest = unsafe { OsStr::from_encoded_bytes_unchecked(rest) };
            let mut translated = OsString::from(".");
            translated.push(rest);
            translated
        }
        _ => name.to_os_string(),
    }
}

/// No way to determine user's home directory.
///
/// # See Also
///
/// - [`dirs::home_dir`](https://docs.rs/dirs/latest/dirs/fn.home_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's home directory")]
pub struct NoWayHome;

/// Friendly result alias :3
pub type Result<T, E = NoWayHome> = std::result::Result<T, E>;
