// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Stow directory management.
//!
//! Oxistow groups packages together into one place called the
//! __stow directory__. Each immediate subdirectory of the stow directory is a
//! __package__, and the name of a package is the name of that subdirectory.
//!
//! # Stow Directory Markers
//!
//! Any directory containing a file named `.stow` or `.nonstow` is considered
//! a marked stow directory. Markers serve two purposes. First, links pointing
//! into a marked directory are recognized as owned by it even if it is not
//! the stow directory of the current run, so nested or foreign stow
//! directories are never mistaken for user data. Second, a marked directory
//! is protected, i.e., it is never descended into as a target.

use std::path::{Component, Path, PathBuf};

/// File names that mark a directory as a stow directory.
pub const MARKER_FILES: [&str; 2] = [".stow", ".nonstow"];

/// Per-package ignore file holding extra gitignore-style patterns.
pub const LOCAL_IGNORE_FILE: &str = ".stow-local-ignore";

/// Check if directory carries a stow directory marker file.
///
/// A missing directory is simply not marked.
pub fn is_marked(dir: impl AsRef<Path>) -> bool {
    MARKER_FILES
        .iter()
        .any(|marker| dir.as_ref().join(marker).exists())
}

/// Handle to a stow directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StowDir {
    path: PathBuf,
}

impl StowDir {
    /// Open existing stow directory.
    ///
    /// The path is canonicalized so links computed against it are stable.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::Open`] if path cannot be canonicalized.
    /// - Return [`StoreError::NotADirectory`] if path is not a directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = dunce::canonicalize(path.as_ref()).map_err(|err| StoreError::Open {
            source: err,
            path: path.as_ref().to_path_buf(),
        })?;

        if !path.is_dir() {
            return Err(StoreError::NotADirectory { path });
        }

        Ok(Self { path })
    }

    /// Absolute canonical path of stow directory.
    pub fn as_path(&self) -> &Path {
        self.path.as_path()
    }

    /// Absolute path to package directory.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError::MissingPackage`] if the stow directory has no
    ///   such package, or if `package` is not a plain directory name.
    pub fn package_path(&self, package: &str) -> Result<PathBuf> {
        // INVARIANT: Package names are exactly one normal path component.
        let mut parts = Path::new(package).components();
        let is_name = matches!((parts.next(), parts.next()), (Some(Component::Normal(_)), None));

        let path = self.path.join(package);
        if !is_name || MARKER_FILES.contains(&package) || !path.is_dir() {
            return Err(StoreError::MissingPackage {
                stow_dir: self.path.clone(),
                package: package.to_string(),
            });
        }

        Ok(path)
    }
}

/// All possible error types for stow directory interaction.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Stow directory path cannot be resolved.
    #[error("failed to open stow directory {:?}", path.display())]
    Open {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Stow directory path is not a directory.
    #[error("stow directory {:?} is not a directory", path.display())]
    NotADirectory { path: PathBuf },

    /// Package does not exist.
    #[error("stow directory {:?} does not contain package {package:?}", stow_dir.display())]
    MissingPackage { stow_dir: PathBuf, package: String },
}

/// Friendly result alias :3
pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;
    use std::fs;

    #[test]
    fn open_and_locate_package() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        fs::create_dir_all(root.path().join("stow/zsh"))?;
        fs::create_dir_all(root.path().join("stow/bash"))?;
        fs::write(root.path().join("stow/.stow"), "")?;

        let stow = StowDir::open(root.path().join("stow"))?;
        assert_eq!(stow.as_path(), dunce::canonicalize(root.path().join("stow"))?);
        assert!(stow.package_path("zsh")?.ends_with("stow/zsh"));
        assert!(is_marked(stow.as_path()));

        Ok(())
    }

    #[test]
    fn missing_package() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let stow = StowDir::open(root.path())?;
        let result = stow.package_path("vim");
        assert!(matches!(result, Err(StoreError::MissingPackage { .. })));

        Ok(())
    }

    #[test_case("."; "current dir")]
    #[test_case(".."; "parent dir")]
    #[test_case(""; "empty")]
    #[test_case("zsh/bin"; "nested")]
    #[test_case("./zsh"; "dotted")]
    #[test_case("/tmp"; "absolute")]
    #[test_case(".stow"; "marker")]
    #[test]
    fn reject_non_package_names(name: &str) {
        let root = tempfile::tempdir().expect("create root dir");
        fs::create_dir_all(root.path().join("stow/zsh/bin")).expect("create package");
        fs::create_dir_all(root.path().join("stow/.stow")).expect("create marker dir");
        let stow = StowDir::open(root.path().join("stow")).expect("open stow dir");

        let result = stow.package_path(name);
        assert!(matches!(result, Err(StoreError::MissingPackage { .. })));
    }

    #[test]
    fn open_rejects_plain_file() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        fs::write(root.path().join("file"), "")?;
        let result = StowDir::open(root.path().join("file"));
        assert!(matches!(result, Err(StoreError::NotADirectory { .. })));

        Ok(())
    }
}
