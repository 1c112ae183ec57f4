// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Symlink farm planning.
//!
//! A __symlink farm__ mirrors the packages of a stow directory into a target
//! directory through relative symlinks. Installing (__stowing__) a package
//! links every entry of the package into the target; removing
//! (__unstowing__) it deletes those links again.
//!
//! # Planning and Execution
//!
//! Work happens in two strictly separate phases. Planning walks each package
//! and decides what to do at each target path, recording its decisions as
//! pending [`Task`]s. Planning consults a virtual view of the target tree in
//! which pending tasks already took effect, and never mutates anything.
//! Execution then applies the planned tasks in order and makes no further
//! decisions. A conflict found during planning aborts the whole run before
//! anything is executed.
//!
//! # Folding
//!
//! When the target has no directory where a package has one, the planner
//! links the whole directory instead of its entries. Such a directory link
//! is __folded__. If a second package later needs the same directory, the
//! link is __unfolded__: it is replaced by a real directory holding one link
//! per entry of both packages. Removing one of the packages again folds the
//! directory back into a single link, so repeated stow/unstow cycles
//! converge on the same tree.
//!
//! # See Also
//!
//! 1. [GNU Stow manual](https://www.gnu.org/software/stow/manual/stow.html)

pub mod conflict;
pub mod execute;
pub mod fold;
pub mod owner;
pub mod task;
pub mod view;

use crate::{
    context::Context,
    farm::{
        conflict::{ConflictLog, Direction},
        owner::find_stowed_path,
        task::{Task, TaskError, TaskIndex},
        view::View,
    },
    filter::{FilterError, IgnoreRules, PathFilter},
    path::{join, translate_dotfile},
    store::{is_marked, StoreError},
};

use std::{
    collections::{hash_map::Entry, HashMap},
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument, warn};

/// Deepest nesting the planner descends into.
pub const MAX_DEPTH: usize = 256;

/// A planning session over one target directory.
///
/// Plan any number of packages in either direction, then either inspect the
/// planned [`Task`]s or hand them to [`Farm::process_tasks`].
#[derive(Debug)]
pub struct Farm {
    pub(crate) ctx: Context,
    pub(crate) index: TaskIndex,
    conflicts: ConflictLog,
    ignores: HashMap<PathBuf, IgnoreRules>,
}

impl Farm {
    /// Construct new planning session.
    pub fn new(ctx: Context) -> Self {
        Self {
            ctx,
            index: TaskIndex::new(),
            conflicts: ConflictLog::new(),
            ignores: HashMap::new(),
        }
    }

    /// Run context of this session.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Conflicts recorded so far.
    pub fn conflicts(&self) -> &ConflictLog {
        &self.conflicts
    }

    /// Planned tasks still to be executed, in execution order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.index.tasks()
    }

    /// Plan installation of packages.
    ///
    /// # Errors
    ///
    /// - Return [`FarmError::Store`] if a package does not exist.
    /// - Return [`FarmError::Conflict`] on the first conflict.
    /// - Return any other [`FarmError`] if planning cannot proceed.
    #[instrument(skip(self, packages), level = "debug")]
    pub fn plan_stow(&mut self, packages: impl IntoIterator<Item = impl AsRef<str>>) -> Result<()> {
        for package in packages {
            let package = package.as_ref();
            debug!("planning stow of package {package}");
            self.ctx.stow_dir().package_path(package)?;

            let stow_path = self.ctx.stow_path().to_path_buf();
            let source = join(&stow_path, package);
            self.stow_contents(&stow_path, package, Path::new("."), Path::new("."), &source, 0)?;
            debug!("planning stow of package {package} done");
        }

        Ok(())
    }

    /// Plan removal of packages.
    ///
    /// # Errors
    ///
    /// - Return [`FarmError::Store`] if a package does not exist.
    /// - Return [`FarmError::Conflict`] on the first conflict.
    /// - Return any other [`FarmError`] if planning cannot proceed.
    #[instrument(skip(self, packages), level = "debug")]
    pub fn plan_unstow(
        &mut self,
        packages: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Result<()> {
        for package in packages {
            let package = package.as_ref();
            debug!("planning unstow of package {package}");
            self.ctx.stow_dir().package_path(package)?;

            let stow_path = self.ctx.stow_path().to_path_buf();
            self.unstow_contents(&stow_path, package, Path::new("."), Path::new("."), 0)?;
            debug!("planning unstow of package {package} done");
        }

        Ok(())
    }

    /// Stow every entry of a package directory.
    ///
    /// - `stow_path` is the stow directory relative to the target directory.
    /// - `pkg_node` is the directory inside the package being stowed.
    /// - `target` is the directory relative to the target directory that
    ///   receives the entries.
    /// - `source` is the path of `pkg_node` relative to `target`, so each
    ///   entry's link source is `source` joined with the entry name.
    fn stow_contents(
        &mut self,
        stow_path: &Path,
        package: &str,
        pkg_node: &Path,
        target: &Path,
        source: &Path,
        depth: usize,
    ) -> Result<()> {
        check_depth(target, depth)?;
        if self.is_protected(target) {
            return Ok(());
        }

        let path = join(join(stow_path, package), pkg_node);
        debug!("stowing contents of {} into {}", path.display(), target.display());

        if !self.ctx.resolve(&path).is_dir() {
            return Err(internal(format!(
                "stow_contents() called with non-directory path: {}",
                path.display()
            )));
        }
        if !self.view().is_a_node(target)? {
            return Err(internal(format!(
                "stow_contents() called with non-directory target: {}",
                target.display()
            )));
        }

        for name in self.read_dir(&path)? {
            let node_pkg = join(pkg_node, &name);
            let is_dir = self.ctx.resolve(join(&path, &name)).is_dir();
            if self.is_ignored(stow_path, package, &node_pkg, is_dir)? {
                continue;
            }

            let node_target = join(target, self.target_name(&name));
            let node_source = join(source, &name);
            self.stow_node(stow_path, package, &node_pkg, &node_target, &node_source, depth)?;
        }

        Ok(())
    }

    /// Stow one package entry at `target` as a link to `source`.
    fn stow_node(
        &mut self,
        stow_path: &Path,
        package: &str,
        pkg_node: &Path,
        target: &Path,
        source: &Path,
        depth: usize,
    ) -> Result<()> {
        let path = join(join(stow_path, package), pkg_node);
        debug!("stowing {} at {}", path.display(), target.display());

        // INVARIANT: Absolute links inside a package can never be unstowed.
        let real = self.ctx.resolve(&path);
        if real.is_symlink() {
            let second = fs::read_link(&real).map_err(|err| TaskError::ReadLink {
                source: err,
                path: path.clone(),
            })?;
            if second.is_absolute() {
                return Err(self.conflict(
                    Direction::Stow,
                    package,
                    format!(
                        "source is an absolute symlink {} => {}",
                        path.display(),
                        second.display()
                    ),
                ));
            }
        }

        if self.view().is_a_link(target) {
            let existing_source = self.view().read_a_link(target)?;
            debug!(
                "evaluate existing link: {} => {}",
                target.display(),
                existing_source.display()
            );

            let Some(owner) = find_stowed_path(&self.ctx, target, &existing_source)? else {
                return Err(self.conflict(
                    Direction::Stow,
                    package,
                    format!("existing target is not owned by stow: {}", target.display()),
                ));
            };

            if !self.view().is_a_node(&owner.path)? {
                debug!("replacing invalid link: {}", target.display());
                self.do_unlink(target)?;
                return self.do_link(source, target);
            }

            if existing_source == source {
                debug!(
                    "skipping {} as it already points to {}",
                    target.display(),
                    source.display()
                );
            } else if self.ctx.defer().is_match(target, false) {
                debug!("deferring installation of {}", target.display());
            } else if self.ctx.overrides().is_match(target, false) {
                debug!("overriding installation of {}", target.display());
                self.do_unlink(target)?;
                self.do_link(source, target)?;
            } else if self.view().is_a_dir(&join(target.join(".."), source))
                && self.view().is_a_dir(&join(target.join(".."), &existing_source))
            {
                debug!(
                    "unfolding {} which was already owned by {}",
                    target.display(),
                    owner.package
                );
                self.do_unlink(target)?;
                self.do_mkdir(target)?;
                self.stow_contents(
                    &owner.stow_path,
                    &owner.package,
                    &owner.subpath(),
                    target,
                    &join("..", &existing_source),
                    depth + 1,
                )?;
                self.stow_contents(
                    stow_path,
                    package,
                    pkg_node,
                    target,
                    &join("..", source),
                    depth + 1,
                )?;
            } else {
                return Err(self.conflict(
                    Direction::Stow,
                    package,
                    format!(
                        "existing target is stowed to a different package: {} => {}",
                        target.display(),
                        existing_source.display()
                    ),
                ));
            }
        } else if self.view().is_a_node(target)? {
            debug!("evaluate existing node: {}", target.display());
            if self.view().is_a_dir(target) {
                self.stow_contents(
                    stow_path,
                    package,
                    pkg_node,
                    target,
                    &join("..", source),
                    depth + 1,
                )?;
            } else if self.ctx.adopt() {
                self.do_mv(target, &path)?;
                self.do_link(source, target)?;
            } else {
                return Err(self.conflict(
                    Direction::Stow,
                    package,
                    format!(
                        "existing target is neither a link nor a directory: {}",
                        target.display()
                    ),
                ));
            }
        } else if self.ctx.no_folding() && real.is_dir() && !real.is_symlink() {
            self.do_mkdir(target)?;
            self.stow_contents(
                stow_path,
                package,
                pkg_node,
                target,
                &join("..", source),
                depth + 1,
            )?;
        } else {
            self.do_link(source, target)?;
        }

        Ok(())
    }

    /// Unstow every entry of a package directory from `target`.
    fn unstow_contents(
        &mut self,
        stow_path: &Path,
        package: &str,
        pkg_node: &Path,
        target: &Path,
        depth: usize,
    ) -> Result<()> {
        check_depth(target, depth)?;
        if self.is_protected(target) {
            return Ok(());
        }

        let path = join(join(stow_path, package), pkg_node);
        debug!("unstowing contents of {} from {}", path.display(), target.display());

        // INVARIANT: Traverse the package tree, not the target tree.
        if !self.ctx.resolve(&path).is_dir() {
            return Err(internal(format!(
                "unstow_contents() called with non-directory path: {}",
                path.display()
            )));
        }
        if !self.view().is_a_node(target)? {
            return Err(internal(format!(
                "unstow_contents() called with invalid target: {}",
                target.display()
            )));
        }

        for name in self.read_dir(&path)? {
            let node_pkg = join(pkg_node, &name);
            let is_dir = self.ctx.resolve(join(&path, &name)).is_dir();
            if self.is_ignored(stow_path, package, &node_pkg, is_dir)? {
                continue;
            }

            let node_target = join(target, self.target_name(&name));
            self.unstow_node(stow_path, package, &node_pkg, &node_target, depth)?;
        }

        Ok(())
    }

    /// Unstow one package entry from `target`.
    fn unstow_node(
        &mut self,
        stow_path: &Path,
        package: &str,
        pkg_node: &Path,
        target: &Path,
        depth: usize,
    ) -> Result<()> {
        let path = join(join(stow_path, package), pkg_node);
        debug!("unstowing {} from {}", path.display(), target.display());

        if self.view().is_a_link(target) {
            let existing_source = self.view().read_a_link(target)?;

            // INVARIANT: Only relative links are ever created, so absolute
            // ones belong to someone else.
            if existing_source.is_absolute() {
                warn!(
                    "ignoring an absolute symlink: {} => {}",
                    target.display(),
                    existing_source.display()
                );
                return Ok(());
            }

            let Some(owner) = find_stowed_path(&self.ctx, target, &existing_source)? else {
                return Err(self.conflict(
                    Direction::Unstow,
                    package,
                    format!(
                        "existing target is not owned by stow: {} => {}",
                        target.display(),
                        existing_source.display()
                    ),
                ));
            };

            if !self.view().is_a_node(&owner.path)? {
                warn!("removing invalid link into a stow dir: {}", target.display());
                self.do_unlink(target)?;
            } else if owner.path == path {
                self.do_unlink(target)?;
            } else {
                debug!(
                    "ignoring {} which is stowed by package {}",
                    target.display(),
                    owner.package
                );
            }
        } else if self.view().is_a_node(target)? {
            debug!("evaluate existing node: {}", target.display());
            if !self.view().is_a_dir(target) {
                return Err(self.conflict(
                    Direction::Unstow,
                    package,
                    format!(
                        "existing target is neither a link nor a directory: {}",
                        target.display()
                    ),
                ));
            }

            self.unstow_contents(stow_path, package, pkg_node, target, depth + 1)?;

            // INVARIANT: Removing this package may leave a single package
            // behind in the directory.
            if let Some(parent) = self.foldable(target)? {
                self.fold_tree(target, &parent)?;
            }
        } else {
            debug!("{} did not exist to be unstowed", target.display());
        }

        Ok(())
    }

    pub(crate) fn view(&self) -> View<'_> {
        View::new(&self.ctx, &self.index)
    }

    pub(crate) fn do_link(&mut self, source: &Path, target: &Path) -> Result<()> {
        Ok(self.index.link(source, target)?)
    }

    pub(crate) fn do_unlink(&mut self, target: &Path) -> Result<()> {
        let real = self.ctx.resolve(target);
        Ok(self.index.unlink(target, || fs::read_link(&real))?)
    }

    pub(crate) fn do_mkdir(&mut self, target: &Path) -> Result<()> {
        Ok(self.index.mkdir(target)?)
    }

    pub(crate) fn do_rmdir(&mut self, target: &Path) -> Result<()> {
        Ok(self.index.rmdir(target)?)
    }

    pub(crate) fn do_mv(&mut self, target: &Path, dest: &Path) -> Result<()> {
        Ok(self.index.mv(target, dest)?)
    }

    /// List entry names of directory relative to target directory, sorted.
    pub(crate) fn read_dir(&self, dir: &Path) -> Result<Vec<OsString>> {
        let real = self.ctx.resolve(dir);
        let read_err = |err| FarmError::ReadDir {
            source: err,
            path: real.clone(),
        };

        let mut names = Vec::new();
        for entry in fs::read_dir(&real).map_err(read_err)? {
            names.push(entry.map_err(read_err)?.file_name());
        }
        names.sort();

        Ok(names)
    }

    fn target_name(&self, name: &OsString) -> OsString {
        if self.ctx.dotfiles() {
            translate_dotfile(name)
        } else {
            name.clone()
        }
    }

    fn is_protected(&self, target: &Path) -> bool {
        if target == self.ctx.stow_path() {
            warn!("skipping target which was current stow directory {}", target.display());
            return true;
        }

        if is_marked(self.ctx.resolve(target)) {
            warn!("skipping protected directory {}", target.display());
            return true;
        }

        false
    }

    fn is_ignored(
        &mut self,
        stow_path: &Path,
        package: &str,
        pkg_node: &Path,
        is_dir: bool,
    ) -> Result<bool> {
        let package_dir = self.ctx.resolve(join(stow_path, package));
        let rules = match self.ignores.entry(package_dir) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let rules = IgnoreRules::new(entry.key(), self.ctx.ignore_patterns())?;
                entry.insert(rules)
            }
        };

        let ignored = rules.is_match(pkg_node, is_dir);
        if ignored {
            debug!("ignoring path {} of package {package}", pkg_node.display());
        }

        Ok(ignored)
    }

    fn conflict(&mut self, direction: Direction, package: &str, message: String) -> FarmError {
        debug!("CONFLICT when {direction}ing {package}: {message}");
        self.conflicts.record(direction, package, message.clone());
        FarmError::Conflict {
            direction,
            package: package.to_string(),
            message,
        }
    }
}

fn check_depth(target: &Path, depth: usize) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(FarmError::TooDeep {
            path: target.to_path_buf(),
        });
    }

    Ok(())
}

fn internal(message: String) -> FarmError {
    FarmError::Task(TaskError::Internal(message))
}

/// All possible error types for planning and executing a symlink farm.
#[derive(Debug, thiserror::Error)]
pub enum FarmError {
    /// Package claims a target path it cannot have.
    #[error("conflict when {direction}ing {package}: {message}")]
    Conflict {
        direction: Direction,
        package: String,
        message: String,
    },

    /// Task bookkeeping failed.
    #[error(transparent)]
    Task(#[from] TaskError),

    /// Planner descended implausibly deep.
    #[error("directory nesting too deep at {:?}", path.display())]
    TooDeep { path: PathBuf },

    /// Directory cannot be listed.
    #[error("failed to read directory {:?}", path.display())]
    ReadDir {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Package lookup failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Ignore rules cannot be compiled.
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// Filesystem primitive failed during execution.
    #[error("failed to execute {task}")]
    Execute {
        #[source]
        source: std::io::Error,
        task: Task,
    },
}

/// Friendly result alias :3
pub type Result<T, E = FarmError> = std::result::Result<T, E>;
