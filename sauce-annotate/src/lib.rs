// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Annotates Sauce OnDemand sessions with the outcomes of the tests that ran them.
//!
//! After a test run, `sauce-annotate annotate` reads JUnit reports and the build console log,
//! finds the Sauce OnDemand session IDs printed by each test, and records the test's name, its
//! pass/fail status and the build number on the corresponding Sauce jobs.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::{OutputContext, OutputWriter};
