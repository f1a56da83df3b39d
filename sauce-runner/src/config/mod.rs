// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sauce OnDemand account configuration.
//!
//! ## Config file location
//!
//! Unless a file is passed in explicitly, the config file is searched for at
//! `$XDG_CONFIG_HOME/sauce-annotate/config.toml` or
//! `~/.config/sauce-annotate/config.toml`. On Windows,
//! `%APPDATA%\sauce-annotate\config.toml` is checked first.
//!
//! ## Configuration hierarchy
//!
//! Settings are resolved in the following order (highest priority first):
//!
//! 1. CLI arguments (e.g. `--username`)
//! 2. Environment variables (e.g. `SAUCE_USERNAME`)
//! 3. The `[sauce]` section of the config file
//! 4. Built-in defaults

mod discovery;
mod imp;

pub use discovery::*;
pub use imp::*;
