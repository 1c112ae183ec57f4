// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Symlink farm manager.
//!
//! Oxistow installs software or dotfile __packages__ kept side by side in a
//! __stow directory__ into a common __target directory__ by creating relative
//! symlinks, and removes them again without touching anything it did not
//! create. Packages are plain directory trees whose layout mirrors the part
//! of the target they populate.
//!
//! The flow of one run is: merge [`Options`] with the [`RcFile`], resolve a
//! [`Context`], plan any number of packages through a [`Farm`], then execute
//! the planned tasks.

pub mod config;
pub mod context;
pub mod farm;
pub mod filter;
pub mod path;
pub mod store;

#[doc(inline)]
pub use config::RcFile;
#[doc(inline)]
pub use context::{Context, Options};
#[doc(inline)]
pub use farm::{task::Task, Farm, FarmError};
