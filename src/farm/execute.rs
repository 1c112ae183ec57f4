// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Task execution.
//!
//! Once planning finished without conflict, the remaining tasks are applied
//! to the target directory in the order they were planned. Each task maps to
//! exactly one filesystem primitive. The first failure aborts execution,
//! leaving earlier tasks applied; running the same operation again picks up
//! where it stopped.

use crate::farm::{task::Task, Farm, FarmError, Result};

use std::{fs, io, path::Path};
use tracing::{debug, instrument};

/// Apply tasks relative to a target directory.
#[derive(Debug, Clone, Copy)]
pub struct Executor<'a> {
    target: &'a Path,
}

impl<'a> Executor<'a> {
    /// Construct new executor for target directory.
    pub fn new(target: &'a Path) -> Self {
        Self { target }
    }

    /// Apply one task.
    ///
    /// # Errors
    ///
    /// - Return [`io::Error`] if the filesystem primitive fails.
    pub fn apply(&self, task: &Task) -> io::Result<()> {
        debug!("{task}");
        match task {
            Task::LinkCreate { path, source } => symlink(source, &self.target.join(path)),
            Task::LinkRemove { path, .. } => fs::remove_file(self.target.join(path)),
            Task::DirCreate { path } => fs::create_dir(self.target.join(path)),
            Task::DirRemove { path } => fs::remove_dir(self.target.join(path)),
            Task::Move { path, dest } => {
                fs::rename(self.target.join(path), self.target.join(dest))
            }
        }
    }
}

impl Farm {
    /// Apply every planned task to the target directory.
    ///
    /// Consumes the planning session. Return the number of tasks applied.
    ///
    /// # Errors
    ///
    /// - Return [`FarmError::Execute`] on the first failing task.
    #[instrument(skip(self), level = "debug")]
    pub fn process_tasks(self) -> Result<usize> {
        let executor = Executor::new(self.ctx.target());
        let mut applied = 0;
        for task in self.index.tasks() {
            executor.apply(task).map_err(|err| FarmError::Execute {
                source: err,
                task: task.clone(),
            })?;
            applied += 1;
        }

        debug!("applied {applied} tasks");
        Ok(applied)
    }
}

#[cfg(unix)]
fn symlink(source: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(source, link)
}

#[cfg(windows)]
fn symlink(source: &Path, link: &Path) -> io::Result<()> {
    use std::os::windows::fs::{symlink_dir, symlink_file};

    let resolved = link.parent().unwrap_or(link).join(source);
    if resolved.is_dir() {
        symlink_dir(source, link)
    } else {
        symlink_file(source, link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    #[test]
    fn apply_each_primitive() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        fs::create_dir(root.path().join("pkg"))?;
        fs::write(root.path().join("rc"), "rc")?;
        let executor = Executor::new(root.path());

        executor.apply(&Task::DirCreate { path: "share".into() })?;
        assert!(root.path().join("share").is_dir());

        executor.apply(&Task::LinkCreate {
            path: "share/pkg".into(),
            source: "../pkg".into(),
        })?;
        assert_eq!(fs::read_link(root.path().join("share/pkg"))?, PathBuf::from("../pkg"));

        executor.apply(&Task::Move {
            path: "rc".into(),
            dest: "pkg/rc".into(),
        })?;
        assert_eq!(fs::read_to_string(root.path().join("pkg/rc"))?, "rc");

        executor.apply(&Task::LinkRemove {
            path: "share/pkg".into(),
            source: "../pkg".into(),
        })?;
        executor.apply(&Task::DirRemove { path: "share".into() })?;
        assert!(!root.path().join("share").exists());

        Ok(())
    }

    #[test]
    fn rmdir_of_non_empty_dir_fails() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        fs::create_dir_all(root.path().join("share/doc"))?;
        let executor = Executor::new(root.path());

        let result = executor.apply(&Task::DirRemove { path: "share".into() });
        assert!(result.is_err());

        Ok(())
    }
}
