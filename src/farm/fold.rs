// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Tree folding.
//!
//! A directory in the target whose entries are all links into the same
//! package directory can be replaced by a single link to that directory.
//! This is the exact inverse of unfolding, which the planner performs when a
//! second package needs to populate a directory that is currently a link.
//! Folding is attempted right after a package is removed from a directory,
//! since its removal may have left only one package behind.

use crate::{
    farm::{owner::find_stowed_path, Farm, Result},
    path::join,
};

use std::{
    collections::BTreeSet,
    path::{Component, Path, PathBuf},
};
use tracing::debug;

impl Farm {
    /// Determine if directory at `target` can be folded.
    ///
    /// Return the link source to fold to, relative to the parent of
    /// `target`, or `None` if the directory must stay a directory.
    pub(crate) fn foldable(&self, target: &Path) -> Result<Option<PathBuf>> {
        debug!("is {} foldable?", target.display());
        if self.ctx.no_folding() {
            debug!("no, because folding is disabled");
            return Ok(None);
        }

        let mut parent: Option<PathBuf> = None;
        for path in self.planned_entries(target)? {
            let view = self.view();

            // INVARIANT: Skip nodes scheduled for removal.
            if !view.is_occupied(&path)? {
                continue;
            }

            if !view.is_a_link(&path) {
                return Ok(None);
            }

            let source_parent = join(view.read_a_link(&path)?, "..");
            if parent.is_none() {
                parent = Some(source_parent);
            } else if parent.as_ref() != Some(&source_parent) {
                return Ok(None);
            }
        }

        let Some(parent) = parent else {
            return Ok(None);
        };

        // INVARIANT: Chop the leading ".." to make the common parent relative
        // to the parent of target rather than to target itself.
        let mut parts = parent.components();
        if parts.next() != Some(Component::ParentDir) {
            return Ok(None);
        }
        let parent = join(parts.as_path(), ".");

        if find_stowed_path(&self.ctx, target, &parent)?.is_some() {
            debug!("{} is foldable into {}", target.display(), parent.display());
            Ok(Some(parent))
        } else {
            Ok(None)
        }
    }

    /// Replace directory at `target` with link to `source`.
    ///
    /// Unlinks every remaining entry, removes the emptied directory, then
    /// links `target` to `source`.
    pub(crate) fn fold_tree(&mut self, target: &Path, source: &Path) -> Result<()> {
        debug!("folding tree: {} => {}", target.display(), source.display());
        for path in self.planned_entries(target)? {
            if self.view().is_occupied(&path)? {
                self.do_unlink(&path)?;
            }
        }

        self.do_rmdir(target)?;
        self.do_link(source, target)
    }

    /// List entries of directory at `target` as planning sees it, sorted.
    ///
    /// Real entries only count while no link above them is scheduled for
    /// removal. Paths with pending tasks are added on top, and a directory
    /// that only exists as a pending task is listed from those alone.
    fn planned_entries(&self, target: &Path) -> Result<BTreeSet<PathBuf>> {
        let mut entries = BTreeSet::new();
        let real = self.ctx.resolve(target);
        if real.is_dir() && !self.view().parent_link_scheduled_for_removal(target) {
            for name in self.read_dir(target)? {
                entries.insert(join(target, name));
            }
        }
        entries.extend(self.index.pending_children(target).map(Path::to_path_buf));

        Ok(entries)
    }
}
