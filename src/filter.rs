// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path filtering rules.
//!
//! The planner consults three kinds of path rules while walking a package:
//!
//! - __Ignore__ rules name package paths that should never be linked or
//!   unlinked. They use gitignore syntax and are matched against the path
//!   relative to the package root. A package may carry extra ignore rules in
//!   a `.stow-local-ignore` file at its top-level.
//! - __Defer__ rules name target paths whose existing links from another
//!   package should be kept as they are.
//! - __Override__ rules name target paths whose existing links from another
//!   package should be replaced.
//!
//! Defer and override rules are glob patterns matched against the path
//! relative to the target directory.

use crate::store::LOCAL_IGNORE_FILE;

use glob::{MatchOptions, Pattern};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::Path;

/// Match paths against a set of rules.
pub trait PathFilter {
    /// Check if path matches any rule.
    ///
    /// The `is_dir` flag tells the filter whether the path names a directory,
    /// since some rule syntaxes only match one or the other.
    fn is_match(&self, path: &Path, is_dir: bool) -> bool;
}

/// Gitignore-style ignore rules for one package.
#[derive(Clone, Debug)]
pub struct IgnoreRules {
    matcher: Gitignore,
}

impl IgnoreRules {
    /// Build ignore rules for the package rooted at `package_dir`.
    ///
    /// Combines the given patterns with those in the package's own
    /// `.stow-local-ignore` file, if present. The local ignore file itself
    /// is always ignored.
    ///
    /// # Errors
    ///
    /// - Return [`FilterError::Ignore`] if any pattern is malformed, or if
    ///   the local ignore file cannot be read.
    pub fn new(
        package_dir: impl AsRef<Path>,
        patterns: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Result<Self> {
        let package_dir = package_dir.as_ref();
        let mut builder = GitignoreBuilder::new(package_dir);

        // INVARIANT: Never stow the local ignore file itself.
        builder.add_line(None, &format!("/{LOCAL_IGNORE_FILE}"))?;
        for pattern in patterns {
            builder.add_line(None, pattern.as_ref())?;
        }

        let local = package_dir.join(LOCAL_IGNORE_FILE);
        if local.is_file() {
            if let Some(err) = builder.add(&local) {
                return Err(FilterError::Ignore(err));
            }
        }

        Ok(Self {
            matcher: builder.build()?,
        })
    }
}

impl PathFilter for IgnoreRules {
    fn is_match(&self, path: &Path, is_dir: bool) -> bool {
        self.matcher.matched(path, is_dir).is_ignore()
    }
}

/// Glob rules matched against target-relative paths.
#[derive(Clone, Debug, Default)]
pub struct GlobRules {
    patterns: Vec<Pattern>,
}

impl GlobRules {
    /// Compile glob patterns.
    ///
    /// # Errors
    ///
    /// - Return [`FilterError::Glob`] if any pattern is malformed.
    pub fn new(patterns: impl IntoIterator<Item = impl AsRef<str>>) -> Result<Self> {
        let patterns = patterns
            .into_iter()
            .map(|pattern| Pattern::new(pattern.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { patterns })
    }
}

impl PathFilter for GlobRules {
    fn is_match(&self, path: &Path, _is_dir: bool) -> bool {
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };

        self.patterns
            .iter()
            .any(|pattern| pattern.matches_path_with(path, options))
    }
}

/// Path filter error types.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    /// Gitignore pattern or file is invalid.
    #[error(transparent)]
    Ignore(#[from] ignore::Error),

    /// Glob pattern is invalid.
    #[error(transparent)]
    Glob(#[from] glob::PatternError),
}

/// Friendly result alias :3
pub type Result<T, E = FilterError> = std::result::Result<T, E>;
