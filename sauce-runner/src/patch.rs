// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Remote job records, and the updates applied to them.

use crate::{errors::MalformedRecordError, test_result::TestCaseOutcome};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The job record held by Sauce OnDemand for a session.
///
/// Only `passed` and `name` are inspected. All other fields are kept as-is.
///
/// A record that omits `passed` or `name` is read as if the field were `null`, so the field is
/// filled in. Records are only rejected as malformed when they are not JSON objects or when
/// these fields have the wrong type.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct RemoteSessionRecord {
    /// Whether the job passed, if that has been reported yet.
    #[serde(default)]
    pub passed: Option<bool>,

    /// The display name of the job, if one has been set.
    #[serde(default)]
    pub name: Option<String>,

    /// All other fields in the record.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl RemoteSessionRecord {
    /// Parses a job record from the JSON returned by the service.
    pub fn from_json(session_id: &str, json: &str) -> Result<Self, MalformedRecordError> {
        serde_json::from_str(json).map_err(|error| MalformedRecordError {
            session_id: session_id.to_owned(),
            error,
        })
    }
}

/// The fields to write to a remote job record.
///
/// `passed` and `name` are only present if the remote record doesn't have them yet. `public` and
/// `build` are always written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UpdatePatch {
    /// The pass/fail status of the test.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passed: Option<bool>,

    /// The qualified name of the test.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Job visibility. Jobs touched by an annotation pass are always made private.
    pub public: bool,

    /// The number of the build that ran the test.
    pub build: u64,
}

impl UpdatePatch {
    /// Computes the patch for a session, given its current remote record and the outcome of the
    /// test case that ran it.
    pub fn gap_fill(
        record: &RemoteSessionRecord,
        outcome: &TestCaseOutcome,
        build_number: u64,
    ) -> Self {
        Self {
            passed: record.passed.is_none().then_some(outcome.passed),
            name: record
                .name
                .is_none()
                .then(|| outcome.qualified_name.clone()),
            public: false,
            build: build_number,
        }
    }

    /// Returns the names of the fields this patch writes, in serialization order.
    pub fn field_names(&self) -> Vec<&'static str> {
        let mut fields = Vec::with_capacity(4);
        if self.passed.is_some() {
            fields.push("passed");
        }
        if self.name.is_some() {
            fields.push("name");
        }
        fields.extend(["public", "build"]);
        fields
    }

    /// Returns the record as it would be after this patch is applied to it.
    pub fn apply_to(&self, record: &RemoteSessionRecord) -> RemoteSessionRecord {
        let mut updated = record.clone();
        if let Some(passed) = self.passed {
            updated.passed = Some(passed);
        }
        if let Some(name) = &self.name {
            updated.name = Some(name.clone());
        }
        updated
            .other
            .insert("public".to_owned(), Value::Bool(self.public));
        updated
            .other
            .insert("build".to_owned(), Value::from(self.build));
        updated
    }

    /// Encodes the patch as a JSON object.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
