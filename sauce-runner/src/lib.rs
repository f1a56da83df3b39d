// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for `sauce-annotate`.
//!
//! The basic flow is:
//!
//! 1. Read the test results ([`test_result::TestResult`]) and the build console log
//!    ([`build_log::BuildLog`]).
//! 2. For each test case, look for Sauce OnDemand session markers in its output
//!    ([`markers::extract_session_ids`]), falling back to the build log.
//! 3. For each session found, fetch the remote job record and fill in the fields that are not
//!    yet set ([`patch::UpdatePatch`]), using a [`client::SessionClient`].
//! 4. Collect what was found into a [`report::SessionReport`].
//!
//! Step 2 onwards is driven by [`annotator::SessionAnnotator`].

pub mod annotator;
pub mod build_log;
pub mod client;
pub mod config;
pub mod errors;
pub mod markers;
pub mod patch;
pub mod report;
pub mod test_result;
