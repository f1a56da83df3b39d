// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read JUnit reports in Rust.
//!
//! This crate parses the XML produced by test runners (JUnit, XUnit, pytest,
//! nextest, ...) into a [`Report`], keeping the parts that downstream tools
//! care about: suites, cases, statuses, and captured standard output and error.

#![warn(missing_docs)]

mod deserialize;
mod errors;
mod report;

pub use errors::*;
pub use report::*;
