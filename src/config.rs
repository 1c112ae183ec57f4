// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the rc file that Oxistow reads its default options
//! from, to simplify the process of serialization and deserialization. File
//! lookup is left to the caller to figure out.

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::PathBuf,
    str::FromStr,
};

/// Rc file layout.
///
/// An rc file holds the same options the command line accepts, so a user
/// does not have to repeat their stow and target directories, or their
/// ignore rules, on every invocation.
///
/// # General Layout
///
/// All keys are optional. Directory keys undergo shell expansion, so `~`
/// and environment variables may be used freely:
///
/// ```toml
/// dir = "~/dotfiles"
/// target = "~"
/// ignore = ["*.swp", "/README.md"]
/// defer = ["bin/*"]
/// override = []
/// adopt = false
/// no_folding = false
/// dotfiles = true
/// ```
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RcFile {
    /// Stow directory holding packages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    /// Target directory receiving links.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<PathBuf>,

    /// Gitignore-style patterns of package paths to leave alone.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ignore: Vec<String>,

    /// Glob patterns of target paths whose existing links are kept.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub defer: Vec<String>,

    /// Glob patterns of target paths whose existing links are replaced.
    #[serde(default, rename = "override", skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<String>,

    /// Import plain files found in the target into the package.
    #[serde(default)]
    pub adopt: bool,

    /// Never link whole directories.
    #[serde(default)]
    pub no_folding: bool,

    /// Translate `dot-` name prefixes into `.`.
    #[serde(default)]
    pub dotfiles: bool,
}

impl FromStr for RcFile {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut rc: RcFile = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on directory fields.
        rc.dir = rc.dir.map(expand).transpose()?;
        rc.target = rc.target.map(expand).transpose()?;

        Ok(rc)
    }
}

impl Display for RcFile {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

fn expand(path: PathBuf) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.to_string_lossy().as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;
