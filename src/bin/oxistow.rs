// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use oxistow::{path::rc_file_candidates, Context, Farm, Options, RcFile};

use anyhow::{bail, Context as _, Result};
use clap::{ArgAction, Parser};
use std::{fs, path::PathBuf, process::exit};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "\n  oxistow [options] [-D|-S|-R] <package>... [-D|-S|-R] <package>...",
    version
)]
struct Cli {
    /// Packages to stow.
    #[arg(value_name = "package")]
    pub packages: Vec<String>,

    /// Stow packages.
    #[arg(short = 'S', long = "stow", num_args = 1.., value_name = "package")]
    pub stow: Vec<String>,

    /// Unstow packages.
    #[arg(short = 'D', long = "delete", num_args = 1.., value_name = "package")]
    pub delete: Vec<String>,

    /// Unstow then stow packages again, e.g., to prune obsolete links.
    #[arg(short = 'R', long = "restow", num_args = 1.., value_name = "package")]
    pub restow: Vec<String>,

    /// Set stow directory, defaults to $STOW_DIR or current directory.
    #[arg(short, long, value_name = "path")]
    pub dir: Option<PathBuf>,

    /// Set target directory, defaults to parent of stow directory.
    #[arg(short, long, value_name = "path")]
    pub target: Option<PathBuf>,

    /// Ignore package paths matching gitignore-style pattern.
    #[arg(long, value_name = "pattern")]
    pub ignore: Vec<String>,

    /// Keep links of other packages at target paths matching glob.
    ///
    /// Patterns are shell-style globs (not regexes) matched against the
    /// whole path relative to the target directory, e.g., "bin/*".
    #[arg(long, value_name = "glob")]
    pub defer: Vec<String>,

    /// Replace links of other packages at target paths matching glob.
    ///
    /// Patterns are shell-style globs (not regexes) matched against the
    /// whole path relative to the target directory, e.g., "share/man/*".
    #[arg(long = "override", value_name = "glob")]
    pub overrides: Vec<String>,

    /// Move plain files found in target into package before linking.
    #[arg(long)]
    pub adopt: bool,

    /// Never link whole directories, only individual files.
    #[arg(long)]
    pub no_folding: bool,

    /// Translate "dot-" name prefix in packages into ".".
    #[arg(long)]
    pub dotfiles: bool,

    /// Plan only, print tasks instead of executing them.
    #[arg(short = 'n', long = "simulate", visible_alias = "no")]
    pub simulate: bool,

    /// Increase verbosity, may be repeated.
    #[arg(short = 'v', action = ArgAction::Count)]
    pub verbose_count: u8,

    /// Set verbosity level directly.
    #[arg(long = "verbose", value_name = "level")]
    pub verbose: Option<u8>,
}

impl Cli {
    fn level(&self) -> &'static str {
        match self.verbose.unwrap_or(self.verbose_count) {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    fn run(self) -> Result<()> {
        let mut stow = self.packages;
        stow.extend(self.stow);
        let mut unstow = self.delete;
        unstow.extend(self.restow.iter().cloned());
        stow.extend(self.restow);

        if stow.is_empty() && unstow.is_empty() {
            bail!("no packages to stow or unstow");
        }

        let options = Options {
            dir: self.dir,
            target: self.target,
            ignore: self.ignore,
            defer: self.defer,
            overrides: self.overrides,
            adopt: self.adopt,
            no_folding: self.no_folding,
            dotfiles: self.dotfiles,
        };
        let options = options.with_defaults(load_rc_file()?);
        let ctx = Context::new(options)?;

        // INVARIANT: Plan every unstow before any stow, so restow sees the
        // package removed first.
        let mut farm = Farm::new(ctx);
        farm.plan_unstow(&unstow)?;
        farm.plan_stow(&stow)?;

        if self.simulate {
            for task in farm.tasks() {
                info!("{task}");
            }
            warn!("in simulation mode so not modifying filesystem");
            return Ok(());
        }

        let applied = farm.process_tasks()?;
        debug!("finished with {applied} tasks applied");

        Ok(())
    }
}

fn main() {
    let cli = Cli::parse();

    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(cli.level()))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = cli.run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn load_rc_file() -> Result<RcFile> {
    for path in rc_file_candidates()? {
        if !path.is_file() {
            continue;
        }

        debug!("loading rc file {}", path.display());
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed to read rc file {}", path.display()))?;
        let rc = data
            .parse::<RcFile>()
            .with_context(|| format!("failed to parse rc file {}", path.display()))?;
        return Ok(rc);
    }

    Ok(RcFile::default())
}
