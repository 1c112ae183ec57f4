// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Virtual view of the target tree.
//!
//! Planning decisions must see the tree as it will be once every pending
//! task has run, not as it is on disk right now. A [`View`] answers the
//! usual questions (is this a link, a directory, anything at all) by
//! consulting the task index first and falling back to the filesystem.

use crate::{
    context::Context,
    farm::task::{Action, TaskError, TaskIndex},
};

use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::trace;

/// Real filesystem layered with pending tasks.
#[derive(Debug, Clone, Copy)]
pub struct View<'a> {
    ctx: &'a Context,
    index: &'a TaskIndex,
}

impl<'a> View<'a> {
    /// Construct new view over target tree of `ctx`.
    pub fn new(ctx: &'a Context, index: &'a TaskIndex) -> Self {
        Self { ctx, index }
    }

    /// Check if any prefix of path is a link scheduled for removal.
    ///
    /// Needed while unfolding: the real filesystem still resolves paths
    /// through the old directory link, although it is already gone as far
    /// as planning is concerned.
    pub fn parent_link_scheduled_for_removal(&self, path: &Path) -> bool {
        let mut prefix = PathBuf::new();
        for part in path.components() {
            prefix.push(part);
            if self.index.link_action(&prefix) == Some(Action::Remove) {
                trace!("{} has a parent link scheduled for removal", path.display());
                return true;
            }
        }

        false
    }

    /// Check if path is a current or planned link.
    pub fn is_a_link(&self, path: &Path) -> bool {
        match self.index.link_action(path) {
            Some(Action::Remove) => return false,
            Some(Action::Create) => return true,
            None => {}
        }

        let is_link = fs::symlink_metadata(self.ctx.resolve(path))
            .map(|meta| meta.file_type().is_symlink())
            .unwrap_or(false);

        is_link && !self.parent_link_scheduled_for_removal(path)
    }

    /// Check if path is a current or planned directory.
    ///
    /// Links to directories count as directories.
    pub fn is_a_dir(&self, path: &Path) -> bool {
        match self.index.dir_action(path) {
            Some(Action::Remove) => return false,
            Some(Action::Create) => return true,
            None => {}
        }

        !self.parent_link_scheduled_for_removal(path) && self.ctx.resolve(path).is_dir()
    }

    /// Check if path is a current or planned node of any kind.
    ///
    /// A node scheduled for removal does not exist, a node scheduled for
    /// creation does. Links are followed, so a dangling link is not a node.
    ///
    /// # Errors
    ///
    /// - Return [`TaskError::Internal`] if both a link and a directory are
    ///   scheduled for creation, or for removal, at path.
    pub fn is_a_node(&self, path: &Path) -> Result<bool, TaskError> {
        let link = self.index.link_action(path);
        let dir = self.index.dir_action(path);

        match (link, dir) {
            (Some(Action::Remove), Some(Action::Remove)) => Err(TaskError::Internal(format!(
                "removing link and dir: {}",
                path.display()
            ))),
            (Some(Action::Create), Some(Action::Create)) => Err(TaskError::Internal(format!(
                "creating link and dir: {}",
                path.display()
            ))),
            // INVARIANT: Unfolding schedules the link removal before the
            // directory creation, and folding schedules the directory removal
            // before the link creation. Either way the path ends up occupied.
            (Some(Action::Remove), Some(Action::Create))
            | (Some(Action::Create), Some(Action::Remove)) => Ok(true),
            (Some(Action::Remove), None) | (None, Some(Action::Remove)) => Ok(false),
            (Some(Action::Create), None) | (None, Some(Action::Create)) => Ok(true),
            (None, None) => Ok(!self.parent_link_scheduled_for_removal(path)
                && self.ctx.resolve(path).exists()),
        }
    }

    /// Check if anything occupies path, following links or not.
    ///
    /// Unlike [`View::is_a_node`], a dangling link counts.
    pub fn is_occupied(&self, path: &Path) -> Result<bool, TaskError> {
        Ok(self.is_a_link(path) || self.is_a_node(path)?)
    }

    /// Read the source of a current or planned link.
    ///
    /// # Errors
    ///
    /// - Return [`TaskError::Internal`] if path is scheduled for removal, or
    ///   is not a link.
    /// - Return [`TaskError::ReadLink`] if the link cannot be read.
    pub fn read_a_link(&self, path: &Path) -> Result<PathBuf, TaskError> {
        match self.index.link_action(path) {
            Some(Action::Create) => {
                if let Some(source) = self.index.link_source(path) {
                    return Ok(source.to_path_buf());
                }
            }
            Some(Action::Remove) => {
                return Err(TaskError::Internal(format!(
                    "read_a_link() passed a path scheduled for removal: {}",
                    path.display()
                )));
            }
            None => {}
        }

        let real = self.ctx.resolve(path);
        if real.is_symlink() {
            return fs::read_link(&real).map_err(|err| TaskError::ReadLink {
                source: err,
                path: path.to_path_buf(),
            });
        }

        Err(TaskError::Internal(format!(
            "read_a_link() passed a non link path: {}",
            path.display()
        )))
    }
}
