// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Pending filesystem mutations.
//!
//! Planning never touches the filesystem. Every mutation the planner decides
//! on is recorded as a [`Task`] in a [`TaskIndex`], which keeps tasks in
//! insertion order and indexes them by path so later decisions can see the
//! state earlier decisions left behind.
//!
//! # Guarded Inserts
//!
//! Inserting a task first consults the pending task at the same path:
//!
//! - An identical pending task makes the insert a no-op.
//! - A pending task that the new one exactly reverses is marked as skipped
//!   and dropped from the index, and no new task is added. A link created
//!   and later removed in one session never reaches the filesystem.
//! - A pending task that cannot be ordered with the new one is a planner
//!   defect, reported as [`TaskError::Internal`].
//!
//! At most one link task and one directory task are indexed per path. Both
//! exist at once only while a directory link is being unfolded, i.e., the
//! link is removed and a real directory is created in its place.

use crate::path::normalize;

use std::{
    collections::HashMap,
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};
use tracing::{debug, info};

/// One pending filesystem mutation.
///
/// Paths are relative to the target directory. Link sources are relative to
/// the directory holding the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// Create symlink at `path` pointing to `source`.
    LinkCreate { path: PathBuf, source: PathBuf },

    /// Remove symlink at `path`, which currently points to `source`.
    LinkRemove { path: PathBuf, source: PathBuf },

    /// Create directory at `path`.
    DirCreate { path: PathBuf },

    /// Remove empty directory at `path`.
    DirRemove { path: PathBuf },

    /// Move file at `path` to `dest`.
    Move { path: PathBuf, dest: PathBuf },
}

impl Task {
    /// Path the task mutates.
    pub fn path(&self) -> &Path {
        match self {
            Self::LinkCreate { path, .. }
            | Self::LinkRemove { path, .. }
            | Self::DirCreate { path }
            | Self::DirRemove { path }
            | Self::Move { path, .. } => path.as_path(),
        }
    }
}

impl Display for Task {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::LinkCreate { path, source } => {
                write!(fmt, "LINK: {} => {}", path.display(), source.display())
            }
            Self::LinkRemove { path, .. } => write!(fmt, "UNLINK: {}", path.display()),
            Self::DirCreate { path } => write!(fmt, "MKDIR: {}", path.display()),
            Self::DirRemove { path } => write!(fmt, "RMDIR: {}", path.display()),
            Self::Move { path, dest } => {
                write!(fmt, "MV: {} => {}", path.display(), dest.display())
            }
        }
    }
}

/// Kind of change a pending task makes at its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Remove,
}

#[derive(Debug, Clone)]
struct Slot {
    task: Task,
    skip: bool,
}

/// Ordered, path-indexed list of pending tasks.
#[derive(Debug, Default)]
pub struct TaskIndex {
    slots: Vec<Slot>,
    link_task_for: HashMap<PathBuf, usize>,
    dir_task_for: HashMap<PathBuf, usize>,
}

impl TaskIndex {
    /// Construct new empty task index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Action of pending link task at path.
    pub fn link_action(&self, path: &Path) -> Option<Action> {
        self.link_task_for
            .get(path)
            .map(|&at| match self.slots[at].task {
                Task::LinkCreate { .. } => Action::Create,
                _ => Action::Remove,
            })
    }

    /// Action of pending directory task at path.
    pub fn dir_action(&self, path: &Path) -> Option<Action> {
        self.dir_task_for
            .get(path)
            .map(|&at| match self.slots[at].task {
                Task::DirCreate { .. } => Action::Create,
                _ => Action::Remove,
            })
    }

    /// Source of pending link task at path.
    pub fn link_source(&self, path: &Path) -> Option<&Path> {
        self.link_task_for
            .get(path)
            .and_then(|&at| match &self.slots[at].task {
                Task::LinkCreate { source, .. } | Task::LinkRemove { source, .. } => {
                    Some(source.as_path())
                }
                _ => None,
            })
    }

    /// Paths directly inside `dir` that have a pending task of any kind.
    pub fn pending_children<'a>(&'a self, dir: &'a Path) -> impl Iterator<Item = &'a Path> + 'a {
        let dir = normalize(dir);
        self.link_task_for
            .keys()
            .chain(self.dir_task_for.keys())
            .filter(move |path| path.parent().map(normalize).as_ref() == Some(&dir))
            .map(PathBuf::as_path)
    }

    /// Iterate over tasks still to be executed, in insertion order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.slots
            .iter()
            .filter(|slot| !slot.skip)
            .map(|slot| &slot.task)
    }

    /// Check if nothing remains to be executed.
    pub fn is_empty(&self) -> bool {
        self.tasks().next().is_none()
    }

    /// Schedule creation of link at `path` pointing to `source`.
    ///
    /// # Errors
    ///
    /// - Return [`TaskError::Internal`] if a directory is already scheduled
    ///   for creation at `path`, or a link to a different source is.
    pub fn link(&mut self, source: impl Into<PathBuf>, path: impl Into<PathBuf>) -> Result<()> {
        let source = source.into();
        let path = path.into();

        // INVARIANT: A pending directory removal may precede the new link.
        if self.dir_action(&path) == Some(Action::Create) {
            return Err(TaskError::Internal(format!(
                "new link ({} => {}) clashes with planned new directory",
                path.display(),
                source.display()
            )));
        }

        if let Some(&at) = self.link_task_for.get(&path) {
            match &self.slots[at].task {
                Task::LinkCreate { source: pending, .. } if *pending == source => {
                    debug!(
                        "LINK: {} => {} (duplicates previous action)",
                        path.display(),
                        source.display()
                    );
                    return Ok(());
                }
                Task::LinkCreate { source: pending, .. } => {
                    return Err(TaskError::Internal(format!(
                        "new link clashes with planned new link: {} => {}",
                        path.display(),
                        pending.display()
                    )));
                }
                Task::LinkRemove { source: pending, .. } if *pending == source => {
                    debug!(
                        "LINK: {} => {} (reverts previous action)",
                        path.display(),
                        source.display()
                    );
                    self.revert_link(&path, at);
                    return Ok(());
                }
                _ => {}
            }
        }

        info!("LINK: {} => {}", path.display(), source.display());
        let at = self.push(Task::LinkCreate {
            path: path.clone(),
            source,
        });
        self.link_task_for.insert(path, at);

        Ok(())
    }

    /// Schedule removal of link at `path`.
    ///
    /// The link's current source is only read through `read_source` when a
    /// new task is actually added.
    ///
    /// # Errors
    ///
    /// - Return [`TaskError::Internal`] if a directory is already scheduled
    ///   for creation at `path`.
    /// - Return [`TaskError::ReadLink`] if `read_source` fails.
    pub fn unlink<F>(&mut self, path: impl Into<PathBuf>, read_source: F) -> Result<()>
    where
        F: FnOnce() -> std::io::Result<PathBuf>,
    {
        let path = path.into();

        if let Some(&at) = self.link_task_for.get(&path) {
            if matches!(self.slots[at].task, Task::LinkRemove { .. }) {
                debug!("UNLINK: {} (duplicates previous action)", path.display());
            } else {
                debug!("UNLINK: {} (reverts previous action)", path.display());
                self.revert_link(&path, at);
            }
            return Ok(());
        }

        if self.dir_action(&path) == Some(Action::Create) {
            return Err(TaskError::Internal(format!(
                "new unlink operation clashes with planned operation: create dir {}",
                path.display()
            )));
        }

        let source = read_source().map_err(|err| TaskError::ReadLink {
            source: err,
            path: path.clone(),
        })?;

        info!("UNLINK: {}", path.display());
        let at = self.push(Task::LinkRemove {
            path: path.clone(),
            source,
        });
        self.link_task_for.insert(path, at);

        Ok(())
    }

    /// Schedule creation of directory at `path`.
    ///
    /// # Errors
    ///
    /// - Return [`TaskError::Internal`] if a link is already scheduled for
    ///   creation at `path`.
    pub fn mkdir(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();

        // INVARIANT: A pending link removal may precede the new directory.
        if let Some(&at) = self.link_task_for.get(&path) {
            if let Task::LinkCreate { source, .. } = &self.slots[at].task {
                return Err(TaskError::Internal(format!(
                    "new dir clashes with planned new link {} => {}",
                    path.display(),
                    source.display()
                )));
            }
        }

        if let Some(&at) = self.dir_task_for.get(&path) {
            if matches!(self.slots[at].task, Task::DirCreate { .. }) {
                debug!("MKDIR: {} (duplicates previous action)", path.display());
            } else {
                debug!("MKDIR: {} (reverts previous action)", path.display());
                self.revert_dir(&path, at);
            }
            return Ok(());
        }

        info!("MKDIR: {}", path.display());
        let at = self.push(Task::DirCreate { path: path.clone() });
        self.dir_task_for.insert(path, at);

        Ok(())
    }

    /// Schedule removal of directory at `path`.
    ///
    /// # Errors
    ///
    /// - Return [`TaskError::Internal`] if a link is already scheduled for
    ///   creation at `path`.
    pub fn rmdir(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();

        // INVARIANT: A pending link removal may precede the removal of the
        // directory that replaced it, e.g., when folding back an unfold.
        if let Some(&at) = self.link_task_for.get(&path) {
            if matches!(self.slots[at].task, Task::LinkCreate { .. }) {
                return Err(TaskError::Internal(format!(
                    "rmdir clashes with planned operation: {}",
                    self.slots[at].task
                )));
            }
        }

        if let Some(&at) = self.dir_task_for.get(&path) {
            if matches!(self.slots[at].task, Task::DirRemove { .. }) {
                debug!("RMDIR: {} (duplicates previous action)", path.display());
            } else {
                debug!("RMDIR: {} (reverts previous action)", path.display());
                self.revert_dir(&path, at);
            }
            return Ok(());
        }

        info!("RMDIR: {}", path.display());
        let at = self.push(Task::DirRemove { path: path.clone() });
        self.dir_task_for.insert(path, at);

        Ok(())
    }

    /// Schedule move of file at `path` to `dest`.
    ///
    /// Moves are never merged with other tasks, so scheduling the same move
    /// twice moves twice.
    ///
    /// # Errors
    ///
    /// - Return [`TaskError::Internal`] if any task is pending at `path`.
    pub fn mv(&mut self, path: impl Into<PathBuf>, dest: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        let dest = dest.into();

        if let Some(&at) = self
            .link_task_for
            .get(&path)
            .or_else(|| self.dir_task_for.get(&path))
        {
            return Err(TaskError::Internal(format!(
                "move of {} clashes with planned operation: {}",
                path.display(),
                self.slots[at].task
            )));
        }

        info!("MV: {} => {}", path.display(), dest.display());
        self.push(Task::Move { path, dest });

        Ok(())
    }

    fn push(&mut self, task: Task) -> usize {
        self.slots.push(Slot { task, skip: false });
        self.slots.len() - 1
    }

    fn revert_link(&mut self, path: &Path, at: usize) {
        self.slots[at].skip = true;
        self.link_task_for.remove(path);
    }

    fn revert_dir(&mut self, path: &Path, at: usize) {
        self.slots[at].skip = true;
        self.dir_task_for.remove(path);
    }
}

/// Task bookkeeping error types.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// Pending tasks contradict each other.
    #[error("internal planner error: {0}")]
    Internal(String),

    /// Existing link cannot be read.
    #[error("failed to read link {:?}", path.display())]
    ReadLink {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = TaskError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn no_read() -> std::io::Result<PathBuf> {
        Err(std::io::Error::other("link should not be read"))
    }

    #[test]
    fn duplicate_link_is_noop() -> anyhow::Result<()> {
        let mut index = TaskIndex::new();
        index.link("stow/pkg/bin", "bin")?;
        index.link("stow/pkg/bin", "bin")?;

        let expect = vec![Task::LinkCreate {
            path: "bin".into(),
            source: "stow/pkg/bin".into(),
        }];
        assert_eq!(index.tasks().cloned().collect::<Vec<_>>(), expect);

        Ok(())
    }

    #[test]
    fn unlink_cancels_pending_link() -> anyhow::Result<()> {
        let mut index = TaskIndex::new();
        index.link("stow/pkg/bin", "bin")?;
        index.unlink("bin", no_read)?;

        assert!(index.is_empty());
        assert_eq!(index.link_action(Path::new("bin")), None);

        Ok(())
    }

    #[test]
    fn link_cancels_pending_unlink_of_same_source() -> anyhow::Result<()> {
        let mut index = TaskIndex::new();
        index.unlink("bin", || Ok(PathBuf::from("stow/pkg/bin")))?;
        index.link("stow/pkg/bin", "bin")?;

        assert!(index.is_empty());

        Ok(())
    }

    #[test]
    fn link_after_unlink_of_other_source_is_kept() -> anyhow::Result<()> {
        let mut index = TaskIndex::new();
        index.unlink("bin", || Ok(PathBuf::from("stow/old/bin")))?;
        index.link("stow/new/bin", "bin")?;

        let expect = vec![
            Task::LinkRemove {
                path: "bin".into(),
                source: "stow/old/bin".into(),
            },
            Task::LinkCreate {
                path: "bin".into(),
                source: "stow/new/bin".into(),
            },
        ];
        assert_eq!(index.tasks().cloned().collect::<Vec<_>>(), expect);
        assert_eq!(index.link_action(Path::new("bin")), Some(Action::Create));
        assert_eq!(index.link_source(Path::new("bin")), Some(Path::new("stow/new/bin")));

        Ok(())
    }

    #[test]
    fn mkdir_and_rmdir_cancel_each_other() -> anyhow::Result<()> {
        let mut index = TaskIndex::new();
        index.rmdir("share")?;
        index.mkdir("share")?;
        assert!(index.is_empty());

        index.mkdir("lib")?;
        index.rmdir("lib")?;
        assert!(index.is_empty());
        assert_eq!(index.dir_action(Path::new("lib")), None);

        Ok(())
    }

    #[test]
    fn fold_after_unfold_cancels_everything() -> anyhow::Result<()> {
        let mut index = TaskIndex::new();
        index.unlink("share", || Ok(PathBuf::from("stow/pkg1/share")))?;
        index.mkdir("share")?;
        index.link("../stow/pkg1/share/doc", "share/doc")?;

        index.unlink("share/doc", no_read)?;
        index.rmdir("share")?;
        index.link("stow/pkg1/share", "share")?;

        assert!(index.is_empty());
        assert_eq!(index.link_action(Path::new("share")), None);
        assert_eq!(index.dir_action(Path::new("share")), None);

        Ok(())
    }

    #[test]
    fn list_pending_children() -> anyhow::Result<()> {
        let mut index = TaskIndex::new();
        index.mkdir("share")?;
        index.link("../stow/pkg/share/doc", "share/doc")?;
        index.link("../../stow/pkg/share/man/tool.1", "share/man/tool.1")?;
        index.link("stow/pkg/bin", "bin")?;

        let mut children: Vec<_> = index.pending_children(Path::new("share")).collect();
        children.sort();
        assert_eq!(children, [Path::new("share/doc")]);

        let mut top: Vec<_> = index.pending_children(Path::new(".")).collect();
        top.sort();
        assert_eq!(top, [Path::new("bin"), Path::new("share")]);

        Ok(())
    }

    #[test]
    fn unfold_keeps_link_removal_and_dir_creation() -> anyhow::Result<()> {
        let mut index = TaskIndex::new();
        index.unlink("share", || Ok(PathBuf::from("stow/pkg1/share")))?;
        index.mkdir("share")?;

        assert_eq!(index.link_action(Path::new("share")), Some(Action::Remove));
        assert_eq!(index.dir_action(Path::new("share")), Some(Action::Create));
        assert_eq!(index.tasks().count(), 2);

        Ok(())
    }

    #[test]
    fn clashing_tasks_are_internal_errors() -> anyhow::Result<()> {
        let mut index = TaskIndex::new();
        index.link("stow/pkg/bin", "bin")?;
        assert!(matches!(index.link("stow/other/bin", "bin"), Err(TaskError::Internal(_))));
        assert!(matches!(index.mkdir("bin"), Err(TaskError::Internal(_))));
        assert!(matches!(index.rmdir("bin"), Err(TaskError::Internal(_))));
        assert!(matches!(index.mv("bin", "stow/pkg/bin"), Err(TaskError::Internal(_))));

        index.mkdir("lib")?;
        assert!(matches!(index.link("stow/pkg/lib", "lib"), Err(TaskError::Internal(_))));
        assert!(matches!(index.unlink("lib", no_read), Err(TaskError::Internal(_))));

        Ok(())
    }

    #[test]
    fn unlink_reports_unreadable_link() {
        let mut index = TaskIndex::new();
        assert!(matches!(index.unlink("bin", no_read), Err(TaskError::ReadLink { .. })));
    }

    #[test]
    fn moves_are_never_merged() -> anyhow::Result<()> {
        let mut index = TaskIndex::new();
        index.mv("rc", "stow/pkg/rc")?;
        index.mv("rc", "stow/pkg/rc")?;
        assert_eq!(index.tasks().count(), 2);

        Ok(())
    }

    #[test]
    fn display_tasks() {
        let task = Task::LinkCreate {
            path: "bin".into(),
            source: "stow/pkg/bin".into(),
        };
        assert_eq!(task.to_string(), "LINK: bin => stow/pkg/bin");
        assert_eq!(
            Task::DirRemove { path: "share".into() }.to_string(),
            "RMDIR: share"
        );
    }
}
