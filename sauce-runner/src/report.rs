// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The sessions found in a build, and what happened to each of them.

use crate::errors::ReportWriteError;
use camino::Utf8Path;
use serde::Serialize;

/// The sessions found for a single build, for later display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SessionReport {
    /// The build that ran the tests.
    pub build_number: u64,

    /// The test cases that produced session references, in test-result order.
    pub cases: Vec<CaseSessions>,
}

impl SessionReport {
    /// Returns the total number of session references in the report.
    pub fn session_count(&self) -> usize {
        self.cases.iter().map(|case| case.sessions.len()).sum()
    }

    /// Returns the number of sessions with the given outcome.
    pub fn count_outcome(&self, outcome: SessionOutcome) -> usize {
        self.cases
            .iter()
            .flat_map(|case| &case.sessions)
            .filter(|session| session.outcome == outcome)
            .count()
    }

    /// Serializes the report as pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String, ReportWriteError> {
        serde_json::to_string_pretty(self).map_err(|error| ReportWriteError::Serialize { error })
    }

    /// Writes the report as JSON to `path`.
    pub fn write_json(&self, path: &Utf8Path) -> Result<(), ReportWriteError> {
        let mut json = self.to_json_string()?;
        json.push('\n');
        std::fs::write(path, json).map_err(|error| ReportWriteError::Write {
            path: path.to_owned(),
            error,
        })
    }
}

/// The sessions associated with a single test case.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct CaseSessions {
    /// The qualified name of the test case.
    pub case_name: String,

    /// Whether the test case passed.
    pub passed: bool,

    /// The sessions found for the test case, in order of appearance.
    pub sessions: Vec<ReportedSession>,
}

impl CaseSessions {
    /// Returns true if any session references were found for this case.
    pub fn has_sessions(&self) -> bool {
        !self.sessions.is_empty()
    }
}

/// A session reference, as recorded in the report.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReportedSession {
    /// The Sauce OnDemand session ID.
    pub session_id: String,

    /// The job name the session was tagged with, if any.
    pub job_name: Option<String>,

    /// The URL at which the job can be viewed.
    pub job_url: String,

    /// What happened when the session was processed.
    pub outcome: SessionOutcome,
}

/// What happened to a session during an annotation pass.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionOutcome {
    /// The job record was updated.
    Updated,

    /// The job record could not be fetched.
    FetchFailed,

    /// The job record was fetched but could not be parsed, so nothing was updated.
    MalformedRecord,

    /// The job record was fetched, but the update was rejected or failed.
    UpdateFailed,

    /// An untagged session marker was found. These are not updated.
    Detected,
}

impl SessionOutcome {
    /// Returns a short description of the outcome.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Updated => "updated",
            Self::FetchFailed => "fetch failed",
            Self::MalformedRecord => "malformed record",
            Self::UpdateFailed => "update failed",
            Self::Detected => "detected",
        }
    }

    /// Returns true if this outcome represents a failure to annotate the session.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Self::FetchFailed | Self::MalformedRecord | Self::UpdateFailed
        )
    }
}
