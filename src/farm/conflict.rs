// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Conflict bookkeeping.
//!
//! A __conflict__ is an incompatible claim of a package over one target
//! path, e.g., a plain file already sitting where a link should go. Every
//! conflict is logged per direction and package. The planner currently stops
//! at the first one, so a log holds at most one message per failed session.

use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter, Result as FmtResult},
};

/// Direction of a planning pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Direction {
    /// Installing a package.
    Stow,

    /// Removing a package.
    Unstow,
}

impl Display for Direction {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Stow => fmt.write_str("stow"),
            Self::Unstow => fmt.write_str("unstow"),
        }
    }
}

/// Append-only log of conflict messages.
#[derive(Debug, Default, Clone)]
pub struct ConflictLog {
    messages: BTreeMap<(Direction, String), Vec<String>>,
}

impl ConflictLog {
    /// Construct new empty conflict log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record conflict message for package.
    pub fn record(
        &mut self,
        direction: Direction,
        package: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.messages
            .entry((direction, package.into()))
            .or_default()
            .push(message.into());
    }

    /// Messages recorded for package in given direction, oldest first.
    pub fn messages(&self, direction: Direction, package: &str) -> &[String] {
        self.messages
            .get(&(direction, package.to_string()))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Total number of recorded messages.
    pub fn len(&self) -> usize {
        self.messages.values().map(Vec::len).sum()
    }

    /// Check if no conflict was recorded.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn record_per_direction_and_package() {
        let mut log = ConflictLog::new();
        assert!(log.is_empty());

        log.record(Direction::Stow, "pkg", "first");
        log.record(Direction::Stow, "pkg", "second");
        log.record(Direction::Unstow, "pkg", "third");

        assert_eq!(log.messages(Direction::Stow, "pkg"), ["first", "second"]);
        assert_eq!(log.messages(Direction::Unstow, "pkg"), ["third"]);
        assert!(log.messages(Direction::Stow, "other").is_empty());
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn display_direction() {
        assert_eq!(format!("{}ing", Direction::Unstow), "unstowing");
    }
}
