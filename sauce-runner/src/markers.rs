// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session markers embedded in test output.
//!
//! Test harnesses that run against Sauce OnDemand print a line per remote session:
//!
//! ```text
//! SauceOnDemandSessionID=<session-id> job-name=<test name>
//! ```
//!
//! Older harnesses omit the `job-name` tag. Both forms are recognized. The job name runs up to
//! the next marker on the same line, or to the end of the line, and is trimmed.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

/// The text that introduces a session marker.
pub const SESSION_MARKER: &str = "SauceOnDemandSessionID=";

// Applied to the text following SESSION_MARKER, up to the next marker.
static MARKER_BODY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9_-]+)(?:[\s,;]+job-name=(.*))?").expect("marker regex is valid")
});

/// A session identifier found in test output, along with the job name it was tagged with.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SessionReference {
    /// The test name the session was tagged with, or `None` for untagged (legacy) markers.
    pub job_label: Option<String>,

    /// The Sauce OnDemand session ID.
    pub session_id: String,
}

impl SessionReference {
    /// Creates a new session reference.
    pub fn new(job_label: Option<&str>, session_id: impl Into<String>) -> Self {
        Self {
            job_label: job_label.map(ToOwned::to_owned),
            session_id: session_id.into(),
        }
    }
}

/// Extracts the session references matching `label` from the given text sources.
///
/// * If `label` is `Some`, only markers tagged with exactly that job name are returned.
/// * If `label` is `None`, only untagged markers are returned.
///
/// Sources are scanned in order, line by line. Matches are returned in order of appearance,
/// and duplicates are preserved.
pub fn extract_session_ids<'a>(
    label: Option<&str>,
    sources: impl IntoIterator<Item = &'a str>,
) -> Vec<SessionReference> {
    sources
        .into_iter()
        .flat_map(scan_markers)
        .filter(|reference| reference.job_label.as_deref() == label)
        .collect()
}

/// Returns every session marker in `text`, tagged or not, in order of appearance.
pub fn scan_markers(text: &str) -> impl Iterator<Item = SessionReference> + '_ {
    text.lines().flat_map(scan_line)
}

fn scan_line(line: &str) -> impl Iterator<Item = SessionReference> + '_ {
    let starts: Vec<_> = line
        .match_indices(SESSION_MARKER)
        .map(|(start, _)| start)
        .collect();
    let ends: Vec<_> = starts
        .iter()
        .skip(1)
        .copied()
        .chain(std::iter::once(line.len()))
        .collect();

    starts
        .into_iter()
        .zip(ends)
        .filter_map(move |(start, end)| parse_marker_body(&line[start + SESSION_MARKER.len()..end]))
}

fn parse_marker_body(body: &str) -> Option<SessionReference> {
    let captures = MARKER_BODY_REGEX.captures(body)?;
    let session_id = captures.get(1)?.as_str();
    let job_label = captures
        .get(2)
        .map(|m| m.as_str().trim())
        .filter(|job| !job.is_empty());
    Some(SessionReference::new(job_label, session_id))
}
