// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Per-run planning context.
//!
//! A [`Context`] is built once per run from the merged command line and rc
//! file options. It fixes the target directory every relative path is
//! resolved against, so the planner never needs to change the process
//! working directory, and carries the mode flags and path rules the planner
//! consults. Independent contexts never share state, so several planning
//! sessions may live in one process.

use crate::{
    config::RcFile,
    filter::{FilterError, GlobRules},
    path::{join, relative_path},
    store::{StoreError, StowDir},
};

use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming the default stow directory.
pub const STOW_DIR_ENV: &str = "STOW_DIR";

/// Unresolved run options.
///
/// Collected from the command line and rc file before any directory is
/// looked at.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Options {
    /// Stow directory, defaults to `$STOW_DIR` or the current directory.
    pub dir: Option<PathBuf>,

    /// Target directory, defaults to the parent of the stow directory.
    pub target: Option<PathBuf>,

    /// Gitignore-style patterns of package paths to leave alone.
    pub ignore: Vec<String>,

    /// Glob patterns of target paths whose foreign links are kept.
    pub defer: Vec<String>,

    /// Glob patterns of target paths whose foreign links are replaced.
    pub overrides: Vec<String>,

    /// Import plain files found in the target into the package.
    pub adopt: bool,

    /// Never link whole directories.
    pub no_folding: bool,

    /// Translate `dot-` name prefixes into `.`.
    pub dotfiles: bool,
}

impl Options {
    /// Layer these options on top of rc file defaults.
    ///
    /// Directories given here win over the rc file. Rule lists are
    /// concatenated with rc file rules first. Mode flags are enabled if
    /// either side enables them.
    pub fn with_defaults(self, rc: RcFile) -> Self {
        let concat = |mut head: Vec<String>, tail: Vec<String>| {
            head.extend(tail);
            head
        };

        Self {
            dir: self.dir.or(rc.dir),
            target: self.target.or(rc.target),
            ignore: concat(rc.ignore, self.ignore),
            defer: concat(rc.defer, self.defer),
            overrides: concat(rc.overrides, self.overrides),
            adopt: self.adopt || rc.adopt,
            no_folding: self.no_folding || rc.no_folding,
            dotfiles: self.dotfiles || rc.dotfiles,
        }
    }
}

/// Resolved run context.
#[derive(Debug, Clone)]
pub struct Context {
    target: PathBuf,
    stow_dir: StowDir,
    stow_path: PathBuf,
    ignore: Vec<String>,
    defer: GlobRules,
    overrides: GlobRules,
    adopt: bool,
    no_folding: bool,
    dotfiles: bool,
}

impl Context {
    /// Resolve options into a run context.
    ///
    /// # Errors
    ///
    /// - Return [`ContextError::CurrentDir`] if the stow directory defaults
    ///   to the current directory and it cannot be determined.
    /// - Return [`ContextError::Store`] if the stow directory is unusable.
    /// - Return [`ContextError::Target`] if the target directory cannot be
    ///   resolved.
    /// - Return [`ContextError::Filter`] if a defer or override rule is
    ///   malformed.
    pub fn new(options: Options) -> Result<Self> {
        let dir = match options.dir {
            Some(dir) => dir,
            None => match std::env::var_os(STOW_DIR_ENV) {
                Some(dir) => PathBuf::from(dir),
                None => std::env::current_dir().map_err(ContextError::CurrentDir)?,
            },
        };
        let stow_dir = StowDir::open(&dir)?;

        let target = options.target.unwrap_or_else(|| join(&dir, ".."));
        let target = dunce::canonicalize(&target).map_err(|err| ContextError::Target {
            source: err,
            path: target.clone(),
        })?;
        if !target.is_dir() {
            return Err(ContextError::Target {
                source: std::io::Error::other("not a directory"),
                path: target,
            });
        }

        let stow_path = relative_path(stow_dir.as_path(), &target);
        debug!("stow dir is {}", stow_dir.as_path().display());
        debug!(
            "stow dir path relative to target {} is {}",
            target.display(),
            stow_path.display()
        );

        Ok(Self {
            target,
            stow_dir,
            stow_path,
            ignore: options.ignore,
            defer: GlobRules::new(&options.defer)?,
            overrides: GlobRules::new(&options.overrides)?,
            adopt: options.adopt,
            no_folding: options.no_folding,
            dotfiles: options.dotfiles,
        })
    }

    /// Absolute canonical target directory.
    pub fn target(&self) -> &Path {
        self.target.as_path()
    }

    /// Stow directory of this run.
    pub fn stow_dir(&self) -> &StowDir {
        &self.stow_dir
    }

    /// Stow directory relative to the target directory.
    pub fn stow_path(&self) -> &Path {
        self.stow_path.as_path()
    }

    /// Resolve a target-relative path against the target directory.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        join(&self.target, path)
    }

    /// Ignore patterns shared by every package.
    pub fn ignore_patterns(&self) -> &[String] {
        self.ignore.as_slice()
    }

    /// Rules for target paths whose foreign links are kept.
    pub fn defer(&self) -> &GlobRules {
        &self.defer
    }

    /// Rules for target paths whose foreign links are replaced.
    pub fn overrides(&self) -> &GlobRules {
        &self.overrides
    }

    /// Whether plain files in the target are adopted into packages.
    pub fn adopt(&self) -> bool {
        self.adopt
    }

    /// Whether whole directories are never linked.
    pub fn no_folding(&self) -> bool {
        self.no_folding
    }

    /// Whether `dot-` name prefixes are translated.
    pub fn dotfiles(&self) -> bool {
        self.dotfiles
    }
}

/// Context resolution error types.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    /// Current directory cannot be determined.
    #[error("cannot determine current directory")]
    CurrentDir(#[source] std::io::Error),

    /// Target directory cannot be resolved.
    #[error("invalid target directory {:?}", path.display())]
    Target {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Stow directory is unusable.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Path rule is malformed.
    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// Friendly result alias :3
pub type Result<T, E = ContextError> = std::result::Result<T, E>;
