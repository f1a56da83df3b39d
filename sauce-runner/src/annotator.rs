// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Annotating remote sessions with test outcomes.

use crate::{
    build_log::BuildLog,
    client::SessionClient,
    errors::DisplayErrorChain,
    markers::{SessionReference, extract_session_ids},
    patch::{RemoteSessionRecord, UpdatePatch},
    report::{CaseSessions, ReportedSession, SessionOutcome, SessionReport},
    test_result::{TestCaseOutcome, TestResult},
};
use tracing::{debug, info, warn};

/// Notice emitted before a test result is scanned.
pub const SCANNING_NOTICE: &str = "Scanning for Sauce OnDemand test data...";

/// Notice emitted when no session markers were found anywhere in a test result.
pub const NO_SESSIONS_NOTICE: &str =
    "The Sauce OnDemand plugin is configured, but no session IDs were found in the test output.";

/// The session markers found for a single test case.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaseMatches {
    /// Markers tagged with the name of the test case. These sessions are updated.
    Tagged(Vec<SessionReference>),

    /// Untagged markers from older harnesses. These are only reported.
    Untagged(Vec<SessionReference>),
}

impl CaseMatches {
    /// Returns the references that were found.
    pub fn references(&self) -> &[SessionReference] {
        match self {
            Self::Tagged(references) | Self::Untagged(references) => references,
        }
    }
}

/// Finds the session markers for a test case.
///
/// Markers tagged with the case's qualified name are looked for first in the case's own output,
/// then in the build log. If there are none, untagged markers are looked for in the same order.
/// Returns `None` if nothing was found.
pub fn find_case_sessions(outcome: &TestCaseOutcome, log: &BuildLog) -> Option<CaseMatches> {
    let label = Some(outcome.qualified_name.as_str());
    let streams = outcome.output_streams();

    let tagged = non_empty(extract_session_ids(label, streams))
        .or_else(|| non_empty(extract_session_ids(label, log.lines())));
    if let Some(references) = tagged {
        return Some(CaseMatches::Tagged(references));
    }

    non_empty(extract_session_ids(None, streams))
        .or_else(|| non_empty(extract_session_ids(None, log.lines())))
        .map(CaseMatches::Untagged)
}

/// Returns true if any test case in `result` has markers tagged with its own name.
///
/// Only tagged markers cause the service to be contacted.
pub fn has_tagged_sessions(result: &TestResult, log: &BuildLog) -> bool {
    result
        .cases()
        .any(|outcome| matches!(find_case_sessions(outcome, log), Some(CaseMatches::Tagged(_))))
}

fn non_empty(references: Vec<SessionReference>) -> Option<Vec<SessionReference>> {
    (!references.is_empty()).then_some(references)
}

/// Annotates the remote sessions referenced by test output.
#[derive(Debug)]
pub struct SessionAnnotator<C> {
    client: C,
}

impl<C: SessionClient> SessionAnnotator<C> {
    /// Creates a new annotator that talks to the service through `client`.
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Returns the client used by this annotator.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Annotates every test case in `result`.
    ///
    /// Returns `None` if no session markers were found for any test case.
    pub fn annotate_result(
        &self,
        result: &TestResult,
        log: &BuildLog,
        build_number: u64,
    ) -> Option<SessionReport> {
        info!("{SCANNING_NOTICE}");
        debug!(
            "scanning {} test cases for build {build_number}",
            result.case_count()
        );

        let cases: Vec<_> = result
            .cases()
            .map(|outcome| self.annotate_case(outcome, log, build_number))
            .filter(|case| case.has_sessions())
            .collect();

        if cases.is_empty() {
            info!("{NO_SESSIONS_NOTICE}");
            return None;
        }

        Some(SessionReport {
            build_number,
            cases,
        })
    }

    /// Annotates the sessions referenced by a single test case.
    ///
    /// Returns true if any session references were found.
    pub fn annotate(&self, outcome: &TestCaseOutcome, log: &BuildLog, build_number: u64) -> bool {
        self.annotate_case(outcome, log, build_number)
            .has_sessions()
    }

    /// Annotates the sessions referenced by a single test case, returning what happened to each.
    ///
    /// Failures to fetch or update a session are logged, and do not stop the remaining sessions
    /// from being processed.
    pub fn annotate_case(
        &self,
        outcome: &TestCaseOutcome,
        log: &BuildLog,
        build_number: u64,
    ) -> CaseSessions {
        let sessions = match find_case_sessions(outcome, log) {
            Some(CaseMatches::Tagged(references)) => references
                .into_iter()
                .map(|reference| {
                    let session_outcome =
                        self.annotate_session(outcome, &reference.session_id, build_number);
                    self.reported(reference, session_outcome)
                })
                .collect(),
            Some(CaseMatches::Untagged(references)) => references
                .into_iter()
                .map(|reference| {
                    debug!(
                        "{}: found untagged session {}",
                        outcome.qualified_name, reference.session_id
                    );
                    self.reported(reference, SessionOutcome::Detected)
                })
                .collect(),
            None => Vec::new(),
        };

        CaseSessions {
            case_name: outcome.qualified_name.clone(),
            passed: outcome.passed,
            sessions,
        }
    }

    fn annotate_session(
        &self,
        outcome: &TestCaseOutcome,
        session_id: &str,
        build_number: u64,
    ) -> SessionOutcome {
        debug!("{}: found session {session_id}", outcome.qualified_name);

        let json = match self.client.fetch_session(session_id) {
            Ok(json) => json,
            Err(error) => {
                warn!(
                    "failed to fetch job record for session {session_id}: {}",
                    DisplayErrorChain::new(&error)
                );
                return SessionOutcome::FetchFailed;
            }
        };

        let record = match RemoteSessionRecord::from_json(session_id, &json) {
            Ok(record) => record,
            Err(error) => {
                warn!("{}", DisplayErrorChain::new(&error));
                return SessionOutcome::MalformedRecord;
            }
        };

        let patch = UpdatePatch::gap_fill(&record, outcome, build_number);
        debug!(
            "session {session_id}: updating {}",
            patch.field_names().join(", ")
        );

        match self.client.update_session(session_id, &patch) {
            Ok(()) => SessionOutcome::Updated,
            Err(error) => {
                warn!(
                    "failed to update job record for session {session_id}: {}",
                    DisplayErrorChain::new(&error)
                );
                SessionOutcome::UpdateFailed
            }
        }
    }

    fn reported(&self, reference: SessionReference, outcome: SessionOutcome) -> ReportedSession {
        ReportedSession {
            job_url: self.client.job_url(&reference.session_id),
            session_id: reference.session_id,
            job_name: reference.job_label,
            outcome,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{client::OfflineClient, errors::SessionClientError, test_result::SuiteOutcomes};
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::{
        cell::RefCell,
        collections::{HashMap, HashSet},
    };

    #[derive(Clone, Debug, PartialEq, Eq)]
    enum Call {
        Fetch(String),
        Update(String, UpdatePatch),
    }

    /// A client that serves canned records and records every call.
    #[derive(Default)]
    struct RecordingClient {
        records: HashMap<String, String>,
        failing_updates: HashSet<String>,
        calls: RefCell<Vec<Call>>,
    }

    impl RecordingClient {
        fn with_record(mut self, session_id: &str, json: &str) -> Self {
            self.records.insert(session_id.to_owned(), json.to_owned());
            self
        }

        fn failing_update(mut self, session_id: &str) -> Self {
            self.failing_updates.insert(session_id.to_owned());
            self
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.borrow().clone()
        }
    }

    fn http_error(session_id: &str, status: u16) -> SessionClientError {
        SessionClientError::Http {
            url: format!("https://example.invalid/jobs/{session_id}"),
            error: Box::new(ureq::Error::StatusCode(status)),
        }
    }

    impl SessionClient for RecordingClient {
        fn fetch_session(&self, session_id: &str) -> Result<String, SessionClientError> {
            self.calls
                .borrow_mut()
                .push(Call::Fetch(session_id.to_owned()));
            self.records
                .get(session_id)
                .cloned()
                .ok_or_else(|| http_error(session_id, 404))
        }

        fn update_session(
            &self,
            session_id: &str,
            patch: &UpdatePatch,
        ) -> Result<(), SessionClientError> {
            self.calls
                .borrow_mut()
                .push(Call::Update(session_id.to_owned(), patch.clone()));
            if self.failing_updates.contains(session_id) {
                Err(http_error(session_id, 500))
            } else {
                Ok(())
            }
        }
    }

    const NULL_RECORD: &str = r#"{"id": "x", "passed": null, "name": null}"#;

    fn full_patch(passed: bool, name: &str, build: u64) -> UpdatePatch {
        UpdatePatch {
            passed: Some(passed),
            name: Some(name.to_owned()),
            public: false,
            build,
        }
    }

    fn outcomes(case: &CaseSessions) -> Vec<(&str, SessionOutcome)> {
        case.sessions
            .iter()
            .map(|session| (session.session_id.as_str(), session.outcome))
            .collect()
    }

    #[test]
    fn login_test_scenario() {
        let client = RecordingClient::default().with_record("abc123", NULL_RECORD);
        let annotator = SessionAnnotator::new(&client);
        let outcome = TestCaseOutcome::new(
            "LoginTest",
            true,
            "SauceOnDemandSessionID=abc123 job-name=LoginTest",
            "",
        );

        let case = annotator.annotate_case(&outcome, &BuildLog::empty(), 42);
        assert_eq!(
            case,
            CaseSessions {
                case_name: "LoginTest".to_owned(),
                passed: true,
                sessions: vec![ReportedSession {
                    session_id: "abc123".to_owned(),
                    job_name: Some("LoginTest".to_owned()),
                    job_url: "https://saucelabs.com/jobs/abc123".to_owned(),
                    outcome: SessionOutcome::Updated,
                }],
            }
        );
        assert_eq!(
            client.calls(),
            vec![
                Call::Fetch("abc123".to_owned()),
                Call::Update("abc123".to_owned(), full_patch(true, "LoginTest", 42)),
            ]
        );
    }

    #[test]
    fn fetch_failure_does_not_stop_later_sessions() {
        // "first" has no record, so fetching it fails.
        let client = RecordingClient::default().with_record("second", NULL_RECORD);
        let annotator = SessionAnnotator::new(&client);
        let outcome = TestCaseOutcome::new(
            "LoginTest",
            false,
            indoc! {"
                SauceOnDemandSessionID=first job-name=LoginTest
                SauceOnDemandSessionID=second job-name=LoginTest
            "},
            "",
        );

        let case = annotator.annotate_case(&outcome, &BuildLog::empty(), 7);
        assert_eq!(
            outcomes(&case),
            vec![
                ("first", SessionOutcome::FetchFailed),
                ("second", SessionOutcome::Updated),
            ]
        );
        assert_eq!(
            client.calls(),
            vec![
                Call::Fetch("first".to_owned()),
                Call::Fetch("second".to_owned()),
                Call::Update("second".to_owned(), full_patch(false, "LoginTest", 7)),
            ]
        );
    }

    #[test]
    fn malformed_record_and_update_failure() {
        let client = RecordingClient::default()
            .with_record("garbled", "<html>maintenance</html>")
            .with_record("rejected", r#"{"passed": true, "name": "kept"}"#)
            .failing_update("rejected");
        let annotator = SessionAnnotator::new(&client);
        let outcome = TestCaseOutcome::new(
            "LoginTest",
            true,
            "SauceOnDemandSessionID=garbled job-name=LoginTest",
            "SauceOnDemandSessionID=rejected job-name=LoginTest",
        );

        let case = annotator.annotate_case(&outcome, &BuildLog::empty(), 3);
        assert_eq!(
            outcomes(&case),
            vec![
                ("garbled", SessionOutcome::MalformedRecord),
                ("rejected", SessionOutcome::UpdateFailed),
            ]
        );
        assert_eq!(
            client.calls(),
            vec![
                Call::Fetch("garbled".to_owned()),
                Call::Fetch("rejected".to_owned()),
                Call::Update(
                    "rejected".to_owned(),
                    UpdatePatch {
                        passed: None,
                        name: None,
                        public: false,
                        build: 3,
                    },
                ),
            ]
        );
    }

    #[test]
    fn falls_back_to_build_log() {
        let client = RecordingClient::default().with_record("fromlog", NULL_RECORD);
        let annotator = SessionAnnotator::new(&client);
        let log = BuildLog::from_bytes(indoc! {"
            Running com.example.LoginTest
            SauceOnDemandSessionID=other job-name=com.example.OtherTest
            SauceOnDemandSessionID=fromlog job-name=com.example.LoginTest.testLogin
        "});
        let outcome = TestCaseOutcome::new(
            "com.example.LoginTest.testLogin",
            true,
            // Untagged markers in the case's own output lose to tagged markers in the log.
            "SauceOnDemandSessionID=legacy",
            "",
        );

        let case = annotator.annotate_case(&outcome, &log, 5);
        assert_eq!(outcomes(&case), vec![("fromlog", SessionOutcome::Updated)]);
    }

    #[test]
    fn own_output_wins_over_build_log() {
        let client = RecordingClient::default().with_record("own", NULL_RECORD);
        let annotator = SessionAnnotator::new(&client);
        let log = BuildLog::from_bytes("SauceOnDemandSessionID=fromlog job-name=LoginTest\n");
        let outcome = TestCaseOutcome::new(
            "LoginTest",
            true,
            "",
            "SauceOnDemandSessionID=own job-name=LoginTest",
        );

        let case = annotator.annotate_case(&outcome, &log, 5);
        assert_eq!(outcomes(&case), vec![("own", SessionOutcome::Updated)]);
    }

    #[test]
    fn colored_junit_output_keeps_job_name() {
        let report: sauce_junit::Report = indoc! {r#"
            <testsuite name="LoginTest">
                <testcase name="testLogin" classname="LoginTest">
                    <system-out>&#27;[32mSauceOnDemandSessionID=abc123&#27;[0m job-name=LoginTest.testLogin</system-out>
                </testcase>
            </testsuite>
        "#}
        .parse()
        .expect("report is valid");
        let result = TestResult::from_reports([&report]);
        let outcome = result.cases().next().expect("one test case");
        assert_eq!(
            outcome.standard_output,
            "SauceOnDemandSessionID=abc123 job-name=LoginTest.testLogin"
        );
        assert_eq!(
            find_case_sessions(outcome, &BuildLog::empty()),
            Some(CaseMatches::Tagged(vec![SessionReference::new(
                Some("LoginTest.testLogin"),
                "abc123"
            )]))
        );

        let client = RecordingClient::default().with_record("abc123", NULL_RECORD);
        let case = SessionAnnotator::new(&client).annotate_case(outcome, &BuildLog::empty(), 3);
        assert_eq!(outcomes(&case), vec![("abc123", SessionOutcome::Updated)]);
    }

    #[test]
    fn tagged_sessions_need_the_service() {
        let untagged = TestResult::new(vec![SuiteOutcomes {
            name: "suite".to_owned(),
            cases: vec![
                TestCaseOutcome::new("LoginTest", true, "SauceOnDemandSessionID=legacy", ""),
                TestCaseOutcome::new("LogoutTest", true, "", ""),
            ],
        }]);
        assert!(!has_tagged_sessions(&untagged, &BuildLog::empty()));
        assert!(!has_tagged_sessions(&TestResult::default(), &BuildLog::empty()));

        let log = BuildLog::from_bytes("SauceOnDemandSessionID=s1 job-name=LogoutTest\n");
        assert!(has_tagged_sessions(&untagged, &log));
    }

    #[test]
    fn offline_client_reports_each_session() {
        let annotator = SessionAnnotator::new(OfflineClient);
        let outcome = TestCaseOutcome::new(
            "LoginTest",
            true,
            "SauceOnDemandSessionID=s1 job-name=LoginTest\nSauceOnDemandSessionID=legacy",
            "",
        );
        let case = annotator.annotate_case(&outcome, &BuildLog::empty(), 1);
        assert_eq!(outcomes(&case), vec![("s1", SessionOutcome::FetchFailed)]);

        let legacy = TestCaseOutcome::new("LoginTest", true, "SauceOnDemandSessionID=legacy", "");
        let case = annotator.annotate_case(&legacy, &BuildLog::empty(), 1);
        assert_eq!(outcomes(&case), vec![("legacy", SessionOutcome::Detected)]);
    }

    #[test]
    fn legacy_markers_are_detected_only() {
        let client = RecordingClient::default();
        let annotator = SessionAnnotator::new(&client);
        let outcome = TestCaseOutcome::new("LoginTest", true, "SauceOnDemandSessionID=legacy1", "");
        assert!(annotator.annotate(&outcome, &BuildLog::empty(), 1));

        // Untagged markers in the build log are used if the case's output has none.
        let log = BuildLog::from_bytes("SauceOnDemandSessionID=legacy2\n");
        let outcome = TestCaseOutcome::new("LoginTest", true, "", "");
        let case = annotator.annotate_case(&outcome, &log, 1);
        assert_eq!(outcomes(&case), vec![("legacy2", SessionOutcome::Detected)]);
        assert_eq!(case.sessions[0].job_name, None);

        assert_eq!(client.calls(), vec![]);
    }

    #[test]
    fn no_sessions_anywhere() {
        let client = RecordingClient::default();
        let annotator = SessionAnnotator::new(&client);
        let result = TestResult::new(vec![SuiteOutcomes {
            name: "suite".to_owned(),
            cases: vec![
                TestCaseOutcome::new("a", true, "nothing to see", ""),
                TestCaseOutcome::new("b", false, "", "still nothing"),
            ],
        }]);
        let log = BuildLog::from_bytes("BUILD SUCCESSFUL\n");

        assert!(
            find_case_sessions(&result.suites()[0].cases[0], &log).is_none(),
            "no markers for case a"
        );
        assert!(!annotator.annotate(&result.suites()[0].cases[1], &log, 9));
        assert_eq!(annotator.annotate_result(&result, &log, 9), None);
        assert_eq!(client.calls(), vec![]);
    }

    #[test]
    fn annotate_result_keeps_cases_with_sessions() {
        let client = RecordingClient::default()
            .with_record("s1", NULL_RECORD)
            .with_record("s2", r#"{"passed": false, "name": "Renamed"}"#);
        let annotator = SessionAnnotator::new(&client);
        let result = TestResult::new(vec![
            SuiteOutcomes {
                name: "first".to_owned(),
                cases: vec![
                    TestCaseOutcome::new("pkg.A.one", true, "SauceOnDemandSessionID=s1 job-name=pkg.A.one", ""),
                    TestCaseOutcome::new("pkg.A.two", true, "", ""),
                ],
            },
            SuiteOutcomes {
                name: "second".to_owned(),
                cases: vec![TestCaseOutcome::new(
                    "pkg.B.three",
                    true,
                    "SauceOnDemandSessionID=s2 job-name=pkg.B.three",
                    "",
                )],
            },
        ]);

        let report = annotator
            .annotate_result(&result, &BuildLog::empty(), 12)
            .expect("sessions were found");
        assert_eq!(report.build_number, 12);
        assert_eq!(
            report
                .cases
                .iter()
                .map(|case| case.case_name.as_str())
                .collect::<Vec<_>>(),
            vec!["pkg.A.one", "pkg.B.three"]
        );
        assert_eq!(report.count_outcome(SessionOutcome::Updated), 2);
        assert_eq!(
            client.calls(),
            vec![
                Call::Fetch("s1".to_owned()),
                Call::Update("s1".to_owned(), full_patch(true, "pkg.A.one", 12)),
                Call::Fetch("s2".to_owned()),
                Call::Update(
                    "s2".to_owned(),
                    UpdatePatch {
                        passed: None,
                        name: None,
                        public: false,
                        build: 12,
                    },
                ),
            ]
        );
    }
}
