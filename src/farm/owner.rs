// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Link ownership resolution.
//!
//! Before touching an existing link the planner needs to know who made it.
//! A link is __owned__ by a package when its source resolves to a path
//! inside that package's directory, either in a marked stow directory or in
//! the stow directory of the current run.

use crate::{
    context::Context,
    farm::task::TaskError,
    path::join,
    store::is_marked,
};

use std::path::{Component, Path, PathBuf};
use tracing::{trace, warn};

/// Owner of an existing link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ownership {
    /// Link source resolved relative to the target directory.
    pub path: PathBuf,

    /// Owning stow directory relative to the target directory.
    pub stow_path: PathBuf,

    /// Owning package.
    pub package: String,
}

impl Ownership {
    /// Path of the link source inside the owning package.
    ///
    /// The package directory itself yields `.`.
    pub fn subpath(&self) -> PathBuf {
        let package_dir = join(&self.stow_path, &self.package);
        match self.path.strip_prefix(&package_dir) {
            Ok(rest) if !rest.as_os_str().is_empty() => rest.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

/// Determine which package, if any, owns link at `target` with `source`.
///
/// Marked stow directories are searched first, walking the resolved source
/// from its shallowest prefix to its deepest. The first marked prefix wins
/// and the component after it names the package. Failing that, the resolved
/// source is matched against the stow directory of the current run.
///
/// Return `None` if no known stow directory owns the link.
///
/// # Errors
///
/// - Return [`TaskError::Internal`] if the link points directly at a marked
///   stow directory.
pub fn find_stowed_path(
    ctx: &Context,
    target: &Path,
    source: &Path,
) -> Result<Option<Ownership>, TaskError> {
    // INVARIANT: Evaluate link source relative to the directory holding it.
    let path = join(target.join(".."), source);
    trace!("is {} owned by stow?", path.display());

    let parts: Vec<Component<'_>> = path.components().collect();
    let mut dir = PathBuf::new();
    for (at, part) in parts.iter().enumerate() {
        dir.push(part);
        if !is_marked(ctx.resolve(&dir)) {
            continue;
        }

        let Some(package) = parts.get(at + 1) else {
            return Err(TaskError::Internal(format!(
                "find_stowed_path() called directly on stow dir {}",
                dir.display()
            )));
        };

        trace!("yes - {} was marked as a stow dir", dir.display());
        return Ok(Some(Ownership {
            package: package.as_os_str().to_string_lossy().into_owned(),
            stow_path: dir,
            path,
        }));
    }

    let stow_path = ctx.stow_path();
    if path.is_absolute() != stow_path.is_absolute() {
        warn!(
            "absolute/relative mismatch between stow dir {} and path {}",
            stow_path.display(),
            path.display()
        );
    }

    let mut rest = path.components().filter(|part| *part != Component::CurDir);
    for stow_part in stow_path.components().filter(|part| *part != Component::CurDir) {
        if rest.next() != Some(stow_part) {
            trace!(
                "no - {} is not under {}",
                path.display(),
                stow_path.display()
            );
            return Ok(None);
        }
    }

    let Some(package) = rest.next() else {
        trace!("no - {} is the stow dir itself", path.display());
        return Ok(None);
    };

    let package = package.as_os_str().to_string_lossy().into_owned();
    trace!("yes - by {package} in {}", stow_path.display());
    Ok(Some(Ownership {
        path,
        stow_path: stow_path.to_path_buf(),
        package,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Options;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn context(root: &Path) -> anyhow::Result<Context> {
        Ok(Context::new(Options {
            dir: Some(root.join("stow")),
            target: Some(root.to_path_buf()),
            ..Options::default()
        })?)
    }

    #[test]
    fn link_into_current_stow_dir() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        fs::create_dir_all(root.path().join("stow/pkg/bin"))?;
        let ctx = context(root.path())?;

        let owner = find_stowed_path(&ctx, Path::new("bin/tool"), Path::new("../stow/pkg/bin/tool"))?;
        let expect = Ownership {
            path: "stow/pkg/bin/tool".into(),
            stow_path: "stow".into(),
            package: "pkg".into(),
        };
        assert_eq!(owner, Some(expect.clone()));
        assert_eq!(expect.subpath(), PathBuf::from("bin/tool"));

        Ok(())
    }

    #[test]
    fn unrelated_link_is_not_owned() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        fs::create_dir_all(root.path().join("stow"))?;
        fs::create_dir_all(root.path().join("notes"))?;
        let ctx = context(root.path())?;

        assert_eq!(find_stowed_path(&ctx, Path::new("todo"), Path::new("notes/todo"))?, None);
        assert_eq!(find_stowed_path(&ctx, Path::new("sh"), Path::new("/bin/sh"))?, None);
        assert_eq!(find_stowed_path(&ctx, Path::new("s"), Path::new("stow"))?, None);

        Ok(())
    }

    #[test]
    fn marked_stow_dir_wins() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        fs::create_dir_all(root.path().join("stow"))?;
        fs::create_dir_all(root.path().join("opt/stow/pkg/bin"))?;
        fs::write(root.path().join("opt/stow/.stow"), "")?;
        let ctx = context(root.path())?;

        let owner = find_stowed_path(&ctx, Path::new("bin"), Path::new("opt/stow/pkg/bin"))?;
        let expect = Ownership {
            path: "opt/stow/pkg/bin".into(),
            stow_path: "opt/stow".into(),
            package: "pkg".into(),
        };
        assert_eq!(owner, Some(expect));

        Ok(())
    }

    #[test]
    fn shallowest_marker_wins() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        fs::create_dir_all(root.path().join("stow"))?;
        fs::create_dir_all(root.path().join("outer/inner/pkg"))?;
        fs::write(root.path().join("outer/.stow"), "")?;
        fs::write(root.path().join("outer/inner/.stow"), "")?;
        let ctx = context(root.path())?;

        let owner = find_stowed_path(&ctx, Path::new("x"), Path::new("outer/inner/pkg"))?
            .map(|owner| (owner.stow_path, owner.package));
        assert_eq!(owner, Some((PathBuf::from("outer"), "inner".to_string())));

        Ok(())
    }

    #[test]
    fn link_to_marked_dir_itself_is_internal_error() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        fs::create_dir_all(root.path().join("stow"))?;
        fs::write(root.path().join("stow/.stow"), "")?;
        let ctx = context(root.path())?;

        let result = find_stowed_path(&ctx, Path::new("s"), Path::new("stow"));
        assert!(matches!(result, Err(TaskError::Internal(_))));

        Ok(())
    }
}
