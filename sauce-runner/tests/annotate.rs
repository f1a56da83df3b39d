// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end annotation of a JUnit report against an in-memory jobs service.

use camino::{Utf8Path, Utf8PathBuf};
use pretty_assertions::assert_eq;
use sauce_runner::{
    annotator::SessionAnnotator,
    build_log::BuildLog,
    client::SessionClient,
    errors::SessionClientError,
    patch::{RemoteSessionRecord, UpdatePatch},
    report::SessionOutcome,
    test_result::TestResult,
};
use serde_json::{Value, json};
use std::{cell::RefCell, collections::BTreeMap};

/// Holds job records and applies updates to them the way the real service does.
#[derive(Default)]
struct InMemoryJobs {
    records: RefCell<BTreeMap<String, RemoteSessionRecord>>,
}

impl InMemoryJobs {
    fn insert(&self, session_id: &str, record: Value) {
        let record = RemoteSessionRecord::from_json(session_id, &record.to_string())
            .expect("seed record is valid");
        self.records
            .borrow_mut()
            .insert(session_id.to_owned(), record);
    }

    fn get(&self, session_id: &str) -> Value {
        let records = self.records.borrow();
        serde_json::to_value(&records[session_id]).expect("record serializes")
    }
}

impl SessionClient for InMemoryJobs {
    fn fetch_session(&self, session_id: &str) -> Result<String, SessionClientError> {
        let records = self.records.borrow();
        let record = records.get(session_id).ok_or_else(|| SessionClientError::Http {
            url: format!("memory://jobs/{session_id}"),
            error: Box::new(ureq::Error::StatusCode(404)),
        })?;
        Ok(serde_json::to_string(record).expect("record serializes"))
    }

    fn update_session(
        &self,
        session_id: &str,
        patch: &UpdatePatch,
    ) -> Result<(), SessionClientError> {
        let mut records = self.records.borrow_mut();
        if let Some(record) = records.get_mut(session_id) {
            *record = patch.apply_to(record);
        }
        Ok(())
    }
}

fn fixture(name: &str) -> Utf8PathBuf {
    Utf8Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn seeded_jobs() -> InMemoryJobs {
    let jobs = InMemoryJobs::default();
    for session_id in ["a1b2c3", "d4e5f6", "9f8e7d"] {
        jobs.insert(
            session_id,
            json!({"id": session_id, "passed": null, "name": null, "public": true, "browser": "firefox"}),
        );
    }
    jobs
}

#[test]
fn annotates_fixture_report() {
    let result =
        TestResult::from_paths([fixture("selenium-report.xml")]).expect("fixture report is valid");
    let log = BuildLog::from_path(&fixture("console.log")).expect("fixture log is readable");
    let jobs = seeded_jobs();
    let annotator = SessionAnnotator::new(&jobs);

    let report = annotator
        .annotate_result(&result, &log, 42)
        .expect("sessions were found");

    let summary: Vec<_> = report
        .cases
        .iter()
        .flat_map(|case| {
            case.sessions.iter().map(move |session| {
                (
                    case.case_name.as_str(),
                    session.session_id.as_str(),
                    session.outcome,
                )
            })
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            (
                "com.example.LoginTest.testLogin",
                "a1b2c3",
                SessionOutcome::Updated
            ),
            (
                "com.example.LoginTest.testLogout",
                "d4e5f6",
                SessionOutcome::Updated
            ),
            // Found in the build log.
            (
                "com.example.SearchTest.testSearch",
                "9f8e7d",
                SessionOutcome::Updated
            ),
            // Untagged marker in the suite output.
            (
                "com.example.SearchTest.testSkipped",
                "0ld5e55",
                SessionOutcome::Detected
            ),
        ]
    );

    assert_eq!(
        jobs.get("a1b2c3"),
        json!({
            "id": "a1b2c3",
            "passed": true,
            "name": "com.example.LoginTest.testLogin",
            "public": false,
            "build": 42,
            "browser": "firefox",
        })
    );
    assert_eq!(jobs.get("d4e5f6")["passed"], json!(false));
    assert_eq!(
        jobs.get("9f8e7d")["name"],
        json!("com.example.SearchTest.testSearch")
    );
}

#[test]
fn repeated_builds_only_touch_public_and_build() {
    let result =
        TestResult::from_paths([fixture("selenium-report.xml")]).expect("fixture report is valid");
    let log = BuildLog::from_path(&fixture("console.log")).expect("fixture log is readable");
    let jobs = seeded_jobs();
    let annotator = SessionAnnotator::new(&jobs);

    annotator
        .annotate_result(&result, &log, 41)
        .expect("sessions were found");
    let first = jobs.get("d4e5f6");

    // Someone makes the job public again between builds.
    {
        let mut records = jobs.records.borrow_mut();
        let record = records.get_mut("d4e5f6").expect("record exists");
        record.other.insert("public".to_owned(), json!(true));
        record.name = Some("renamed by hand".to_owned());
    }

    annotator
        .annotate_result(&result, &log, 42)
        .expect("sessions were found");
    let second = jobs.get("d4e5f6");

    assert_eq!(first["passed"], second["passed"]);
    assert_eq!(second["name"], json!("renamed by hand"));
    assert_eq!(second["public"], json!(false));
    assert_eq!(second["build"], json!(42));
}

#[test]
fn missing_jobs_are_reported_as_fetch_failures() {
    let result =
        TestResult::from_paths([fixture("selenium-report.xml")]).expect("fixture report is valid");
    let jobs = InMemoryJobs::default();
    let annotator = SessionAnnotator::new(&jobs);

    let report = annotator
        .annotate_result(&result, &BuildLog::empty(), 1)
        .expect("sessions were found");
    assert_eq!(report.count_outcome(SessionOutcome::FetchFailed), 2);
    assert_eq!(report.count_outcome(SessionOutcome::Detected), 2);
    assert!(jobs.records.borrow().is_empty());
}
