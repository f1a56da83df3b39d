// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deserialize a `Report`.

use crate::{DeserializeError, NonSuccessKind, Output, Report, TestCase, TestCaseStatus, TestSuite};
use indexmap::IndexMap;
use quick_xml::{
    Reader,
    events::{BytesStart, Event},
};
use std::time::Duration;

static TESTSUITES_TAG: &[u8] = b"testsuites";
static TESTSUITE_TAG: &[u8] = b"testsuite";
static TESTCASE_TAG: &[u8] = b"testcase";
static FAILURE_TAG: &[u8] = b"failure";
static ERROR_TAG: &[u8] = b"error";
static SKIPPED_TAG: &[u8] = b"skipped";
static SYSTEM_OUT_TAG: &[u8] = b"system-out";
static SYSTEM_ERR_TAG: &[u8] = b"system-err";

pub(crate) fn deserialize_report(input: &str) -> Result<Report, DeserializeError> {
    let mut reader = Reader::from_str(input);
    let mut state = DeserializeState::default();

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(inner) => {
                return Err(DeserializeError::Xml {
                    position: reader.buffer_position(),
                    inner,
                });
            }
        };
        let res = match event {
            Event::Start(start) => state.start(&start, false),
            Event::Empty(start) => state.start(&start, true),
            Event::End(_) => {
                state.end();
                Ok(())
            }
            Event::Text(text) => text
                .unescape()
                .map(|text| state.push_text(&text))
                .map_err(StartError::from),
            Event::CData(cdata) => {
                state.push_text(&String::from_utf8_lossy(&cdata.into_inner()));
                Ok(())
            }
            Event::Eof => break,
            _ => Ok(()),
        };
        match res {
            Ok(()) => {}
            Err(StartError::Xml(inner)) => {
                return Err(DeserializeError::Xml {
                    position: reader.buffer_position(),
                    inner,
                });
            }
            Err(StartError::UnexpectedRoot(name)) => {
                return Err(DeserializeError::UnexpectedRoot { name });
            }
        }
    }

    state.report.ok_or(DeserializeError::Empty)
}

enum StartError {
    Xml(quick_xml::Error),
    UnexpectedRoot(String),
}

impl From<quick_xml::Error> for StartError {
    fn from(err: quick_xml::Error) -> Self {
        StartError::Xml(err)
    }
}

impl From<quick_xml::events::attributes::AttrError> for StartError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        StartError::Xml(err.into())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum OutputKind {
    Out,
    Err,
}

#[derive(Debug)]
enum Frame {
    Root,
    Suite(TestSuite),
    Case(TestCase),
    Status { status: TestCaseStatus, text: String },
    Output { kind: OutputKind, text: String },
    // Anything else, including reruns and flaky runs whose output does not belong to the case.
    Other,
}

#[derive(Debug, Default)]
struct DeserializeState {
    report: Option<Report>,
    stack: Vec<Frame>,
}

impl DeserializeState {
    fn start(&mut self, start: &BytesStart<'_>, empty: bool) -> Result<(), StartError> {
        let local_name = start.local_name();
        let name = local_name.as_ref();

        if self.report.is_none() {
            let mut attrs = read_attributes(start)?;
            let frame = if name == TESTSUITES_TAG {
                self.report = Some(Report {
                    name: attrs.shift_remove("name"),
                    ..Report::default()
                });
                Frame::Root
            } else if name == TESTSUITE_TAG {
                self.report = Some(Report::new());
                Frame::Suite(new_testsuite(attrs))
            } else {
                return Err(StartError::UnexpectedRoot(
                    String::from_utf8_lossy(name).into_owned(),
                ));
            };
            self.stack.push(frame);
            if empty {
                self.end();
            }
            return Ok(());
        }

        let frame = match (self.stack.last(), name) {
            (Some(Frame::Root | Frame::Suite(_)), n) if n == TESTSUITE_TAG => {
                Frame::Suite(new_testsuite(read_attributes(start)?))
            }
            (Some(Frame::Suite(_)), n) if n == TESTCASE_TAG => {
                Frame::Case(new_testcase(read_attributes(start)?))
            }
            (Some(Frame::Case(_)), n) if n == FAILURE_TAG => new_status(
                TestCaseStatus::non_success(NonSuccessKind::Failure),
                read_attributes(start)?,
            ),
            (Some(Frame::Case(_)), n) if n == ERROR_TAG => new_status(
                TestCaseStatus::non_success(NonSuccessKind::Error),
                read_attributes(start)?,
            ),
            (Some(Frame::Case(_)), n) if n == SKIPPED_TAG => {
                new_status(TestCaseStatus::skipped(), read_attributes(start)?)
            }
            (Some(Frame::Suite(_) | Frame::Case(_) | Frame::Other), n) if n == SYSTEM_OUT_TAG => {
                Frame::Output {
                    kind: OutputKind::Out,
                    text: String::new(),
                }
            }
            (Some(Frame::Suite(_) | Frame::Case(_) | Frame::Other), n) if n == SYSTEM_ERR_TAG => {
                Frame::Output {
                    kind: OutputKind::Err,
                    text: String::new(),
                }
            }
            _ => Frame::Other,
        };

        self.stack.push(frame);
        if empty {
            self.end();
        }
        Ok(())
    }

    fn push_text(&mut self, new_text: &str) {
        match self.stack.last_mut() {
            Some(Frame::Status { text, .. } | Frame::Output { text, .. }) => {
                text.push_str(new_text);
            }
            _ => {}
        }
    }

    fn end(&mut self) {
        let Some(frame) = self.stack.pop() else {
            return;
        };

        match frame {
            Frame::Root | Frame::Other => {}
            Frame::Suite(suite) => {
                if let Some(report) = &mut self.report {
                    report.add_testsuite(suite);
                }
            }
            Frame::Case(case) => {
                if let Some(Frame::Suite(suite)) = self.stack.last_mut() {
                    suite.add_testcase(case);
                }
            }
            Frame::Status { mut status, text } => {
                if !text.trim().is_empty() {
                    status.set_description(text);
                }
                if let Some(Frame::Case(case)) = self.stack.last_mut() {
                    case.status = status;
                }
            }
            Frame::Output { kind, text } => match (self.stack.last_mut(), kind) {
                (Some(Frame::Case(case)), OutputKind::Out) => {
                    case.system_out = Some(Output::new(text))
                }
                (Some(Frame::Case(case)), OutputKind::Err) => {
                    case.system_err = Some(Output::new(text))
                }
                (Some(Frame::Suite(suite)), OutputKind::Out) => {
                    suite.system_out = Some(Output::new(text))
                }
                (Some(Frame::Suite(suite)), OutputKind::Err) => {
                    suite.system_err = Some(Output::new(text))
                }
                _ => {}
            },
        }
    }
}

fn read_attributes(start: &BytesStart<'_>) -> Result<IndexMap<String, String>, StartError> {
    let mut attrs = IndexMap::new();
    for attr in start.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        attrs.insert(key, value);
    }
    Ok(attrs)
}

fn new_testsuite(mut attrs: IndexMap<String, String>) -> TestSuite {
    let mut suite = TestSuite::new(attrs.shift_remove("name").unwrap_or_default());
    suite.time = attrs.shift_remove("time").as_deref().and_then(parse_time);
    // These counts are recomputed from the testcases as they are added.
    for key in ["tests", "failures", "errors", "disabled", "skipped"] {
        attrs.shift_remove(key);
    }
    suite.extra = attrs;
    suite
}

fn new_testcase(mut attrs: IndexMap<String, String>) -> TestCase {
    let mut testcase = TestCase::new(
        attrs.shift_remove("name").unwrap_or_default(),
        TestCaseStatus::success(),
    );
    testcase.classname = attrs.shift_remove("classname");
    testcase.time = attrs.shift_remove("time").as_deref().and_then(parse_time);
    testcase.extra = attrs;
    testcase
}

fn new_status(mut status: TestCaseStatus, mut attrs: IndexMap<String, String>) -> Frame {
    if let Some(message) = attrs.shift_remove("message") {
        status.set_message(message);
    }
    if let Some(ty) = attrs.shift_remove("type") {
        status.set_type(ty);
    }
    Frame::Status {
        status,
        text: String::new(),
    }
}

// Time is serialized as (possibly fractional) seconds.
fn parse_time(time: &str) -> Option<Duration> {
    let secs: f64 = time.trim().parse().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    // Round to the nearest nanosecond so that e.g. "4.242" is exactly 4242ms.
    Some(Duration::from_nanos((secs * 1e9).round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn testsuites_root() {
        let input = indoc! {r#"
            <?xml version="1.0" encoding="UTF-8"?>
            <testsuites name="my-test-run" tests="3" failures="1" errors="0">
                <testsuite name="com.example.LoginTest" tests="3" hostname="ci-01">
                    <testcase name="passes" classname="com.example.LoginTest" time="0.250">
                        <system-out>SauceOnDemandSessionID=abc123 job-name=com.example.LoginTest.passes</system-out>
                    </testcase>
                    <testcase name="fails" classname="com.example.LoginTest">
                        <failure message="expected true" type="AssertionError">stack trace here</failure>
                        <system-err><![CDATA[<oops> & more]]></system-err>
                    </testcase>
                    <testcase name="skipped" classname="com.example.LoginTest">
                        <skipped/>
                    </testcase>
                    <system-out>suite output</system-out>
                </testsuite>
            </testsuites>
        "#};

        let report: Report = input.parse().expect("report parses");
        assert_eq!(report.name.as_deref(), Some("my-test-run"));
        assert_eq!((report.tests, report.failures, report.errors), (3, 1, 0));

        let suite = &report.testsuites[0];
        assert_eq!(suite.name, "com.example.LoginTest");
        assert_eq!(suite.disabled, 1);
        assert_eq!(suite.extra.get("hostname").map(String::as_str), Some("ci-01"));
        assert_eq!(
            suite.system_out.as_ref().map(Output::as_str),
            Some("suite output")
        );

        let passes = &suite.testcases[0];
        assert_eq!(passes.full_name(), "com.example.LoginTest.passes");
        assert_eq!(passes.time, Some(Duration::from_millis(250)));
        assert!(passes.status.is_success());
        assert_eq!(
            passes.system_out.as_ref().map(Output::as_str),
            Some("SauceOnDemandSessionID=abc123 job-name=com.example.LoginTest.passes")
        );

        let fails = &suite.testcases[1];
        assert_eq!(
            fails.status,
            TestCaseStatus::NonSuccess {
                kind: NonSuccessKind::Failure,
                message: Some("expected true".to_owned()),
                ty: Some("AssertionError".to_owned()),
                description: Some("stack trace here".to_owned()),
            }
        );
        assert_eq!(
            fails.system_err.as_ref().map(Output::as_str),
            Some("<oops> & more")
        );

        assert_eq!(suite.testcases[2].status, TestCaseStatus::skipped());
    }

    #[test]
    fn testsuite_root() {
        let input = indoc! {r#"
            <testsuite name="pytest" tests="1">
                <testcase classname="tests.test_login" name="test_login" time="1.5">
                    <error message="boom"/>
                    <system-out>line one &amp; two
            SauceOnDemandSessionID=ffee00</system-out>
                </testcase>
            </testsuite>
        "#};

        let report: Report = input.parse().expect("report parses");
        assert_eq!(report.name, None);
        assert_eq!(report.errors, 1);

        let testcase = &report.testsuites[0].testcases[0];
        assert_eq!(testcase.time, Some(Duration::from_millis(1500)));
        assert_eq!(
            testcase.system_out.as_ref().map(Output::as_str),
            Some("line one & two\nSauceOnDemandSessionID=ffee00")
        );
        assert!(matches!(
            testcase.status,
            TestCaseStatus::NonSuccess {
                kind: NonSuccessKind::Error,
                ..
            }
        ));
    }

    #[test]
    fn rerun_output_is_not_attributed_to_case() {
        let input = indoc! {r#"
            <testsuites>
                <testsuite name="suite">
                    <testcase name="flaky">
                        <flakyFailure message="first attempt">
                            <system-out>SauceOnDemandSessionID=rerun1 job-name=flaky</system-out>
                        </flakyFailure>
                        <system-out>SauceOnDemandSessionID=final1 job-name=flaky</system-out>
                    </testcase>
                </testsuite>
            </testsuites>
        "#};

        let report: Report = input.parse().expect("report parses");
        let testcase = &report.testsuites[0].testcases[0];
        assert!(testcase.status.is_success());
        assert_eq!(
            testcase.system_out.as_ref().map(Output::as_str),
            Some("SauceOnDemandSessionID=final1 job-name=flaky")
        );
    }

    #[test]
    fn empty_testsuite_root() {
        let report: Report = r#"<testsuite name="empty"/>"#.parse().expect("report parses");
        assert_eq!(report.testsuites.len(), 1);
        assert_eq!(report.testsuites[0].name, "empty");
        assert!(report.testsuites[0].testcases.is_empty());
    }

    #[test_case("", "empty" ; "no root element")]
    #[test_case("<html><body/></html>", "unexpected root" ; "wrong root element")]
    #[test_case("<testsuites><testsuite></testcase></testsuites>", "xml" ; "mismatched end tag")]
    fn invalid_reports(input: &str, kind: &str) {
        let err = input.parse::<Report>().expect_err("report is invalid");
        let matches = match kind {
            "empty" => matches!(err, DeserializeError::Empty),
            "unexpected root" => {
                matches!(&err, DeserializeError::UnexpectedRoot { name } if name == "html")
            }
            "xml" => matches!(err, DeserializeError::Xml { .. }),
            other => panic!("unknown kind {other}"),
        };
        assert!(matches, "unexpected error for {kind}: {err:?}");
    }

    #[test_case("1.5", Some(Duration::from_millis(1500)) ; "fractional")]
    #[test_case(" 3 ", Some(Duration::from_secs(3)) ; "padded integer")]
    #[test_case("-1", None ; "negative")]
    #[test_case("abc", None ; "not a number")]
    fn time_parsing(input: &str, expected: Option<Duration>) {
        assert_eq!(parse_time(input), expected);
    }
}
