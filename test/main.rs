// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT


use anyhow::Result;
use mkdirp::mkdirp;
use oxistow::{Context, Farm, Options};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tempfile::TempDir;
use walkdir::WalkDir;

/// Scratch target directory holding a stow directory named "stow".
pub(crate) struct FarmFixture {
    _tmp: TempDir,
    root: PathBuf,
}

impl FarmFixture {
    pub(crate) fn new() -> Result<Self> {
        let tmp = tempfile::tempdir()?;

        // INVARIANT: Canonicalize so link sources compare equal on systems
        // whose temporary directory sits behind a symlink.
        let root = dunce::canonicalize(tmp.path())?;
        mkdirp(root.join("stow"))?;

        Ok(Self { _tmp: tmp, root })
    }

    pub(crate) fn root(&self) -> &Path {
        self.root.as_path()
    }

    pub(crate) fn with_file(&self, path: impl AsRef<Path>, contents: &str) -> Result<&Self> {
        let path = self.root.join(path);
        if let Some(parent) = path.parent() {
            mkdirp(parent)?;
        }
        fs::write(path, contents)?;

        Ok(self)
    }

    pub(crate) fn with_dir(&self, path: impl AsRef<Path>) -> Result<&Self> {
        mkdirp(self.root.join(path))?;
        Ok(self)
    }

    pub(crate) fn with_link(
        &self,
        path: impl AsRef<Path>,
        source: impl AsRef<Path>,
    ) -> Result<&Self> {
        let path = self.root.join(path);
        if let Some(parent) = path.parent() {
            mkdirp(parent)?;
        }
        std::os::unix::fs::symlink(source, path)?;

        Ok(self)
    }

    pub(crate) fn read(&self, path: impl AsRef<Path>) -> Result<String> {
        Ok(fs::read_to_string(self.root.join(path))?)
    }

    pub(crate) fn read_link(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        Ok(fs::read_link(self.root.join(path))?)
    }

    /// Start a planning session with default options.
    pub(crate) fn farm(&self) -> Result<Farm> {
        self.farm_with(Options::default())
    }

    /// Start a planning session, filling in stow and target directories.
    pub(crate) fn farm_with(&self, options: Options) -> Result<Farm> {
        let options = Options {
            dir: options.dir.or_else(|| Some(self.root.join("stow"))),
            target: options.target.or_else(|| Some(self.root.clone())),
            ..options
        };

        Ok(Farm::new(Context::new(options)?))
    }

    /// Plan and execute stow of packages with default options.
    pub(crate) fn stow(&self, packages: &[&str]) -> Result<usize> {
        let mut farm = self.farm()?;
        farm.plan_stow(packages)?;
        Ok(farm.process_tasks()?)
    }

    /// Plan and execute unstow of packages with default options.
    pub(crate) fn unstow(&self, packages: &[&str]) -> Result<usize> {
        let mut farm = self.farm()?;
        farm.plan_unstow(packages)?;
        Ok(farm.process_tasks()?)
    }

    /// Render target tree outside the stow directory, one node per line.
    ///
    /// Directories render as `d path`, files as `f path`, and links as
    /// `l path -> source`. Links are never followed.
    pub(crate) fn snapshot(&self) -> Result<String> {
        let stow = self.root.join("stow");
        let mut snapshot = String::new();
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.path() != stow);

        for entry in walker {
            let entry = entry?;
            let path = entry.path().strip_prefix(&self.root)?.display().to_string();
            if entry.path_is_symlink() {
                let source = fs::read_link(entry.path())?;
                snapshot.push_str(&format!("l {path} -> {}\n", source.display()));
            } else if entry.file_type().is_dir() {
                snapshot.push_str(&format!("d {path}\n"));
            } else {
                snapshot.push_str(&format!("f {path}\n"));
            }
        }

        Ok(snapshot)
    }
}
