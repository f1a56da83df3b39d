// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The test-result tree: suites of test cases, with their captured output.

use crate::errors::TestResultReadError;
use camino::{Utf8Path, Utf8PathBuf};
use sauce_junit::{Report, TestCase, TestSuite};
use tracing::debug;

/// An immutable snapshot of a single executed test case.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestCaseOutcome {
    /// The fully qualified name of the test, e.g. `com.example.LoginTest.testLogin`.
    pub qualified_name: String,

    /// Whether the test passed. Failed, errored and skipped tests have not passed.
    pub passed: bool,

    /// Standard output captured while the test ran.
    pub standard_output: String,

    /// Standard error captured while the test ran.
    pub standard_error: String,
}

impl TestCaseOutcome {
    /// Creates a new outcome.
    pub fn new(
        qualified_name: impl Into<String>,
        passed: bool,
        standard_output: impl Into<String>,
        standard_error: impl Into<String>,
    ) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            passed,
            standard_output: standard_output.into(),
            standard_error: standard_error.into(),
        }
    }

    /// Builds an outcome from a JUnit test case.
    ///
    /// If the test case has no output of its own, the output of its suite is used instead.
    pub fn from_junit(suite: &TestSuite, testcase: &TestCase) -> Self {
        let standard_output = testcase
            .system_out
            .as_ref()
            .or(suite.system_out.as_ref())
            .map_or("", |output| output.as_str());
        let standard_error = testcase
            .system_err
            .as_ref()
            .or(suite.system_err.as_ref())
            .map_or("", |output| output.as_str());

        Self::new(
            testcase.full_name(),
            testcase.status.is_success(),
            standard_output,
            standard_error,
        )
    }

    /// Returns the captured output streams, standard output first.
    pub fn output_streams(&self) -> [&str; 2] {
        [&self.standard_output, &self.standard_error]
    }
}

/// The outcomes of a single test suite.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SuiteOutcomes {
    /// The name of the suite.
    pub name: String,

    /// The test cases in the suite, in report order.
    pub cases: Vec<TestCaseOutcome>,
}

/// A test-result tree: suites, each containing test cases.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TestResult {
    suites: Vec<SuiteOutcomes>,
}

impl TestResult {
    /// Creates a test result from the given suites.
    pub fn new(suites: Vec<SuiteOutcomes>) -> Self {
        Self { suites }
    }

    /// Builds a test result from parsed JUnit reports, in order.
    pub fn from_reports<'a>(reports: impl IntoIterator<Item = &'a Report>) -> Self {
        let suites = reports
            .into_iter()
            .flat_map(|report| &report.testsuites)
            .map(|suite| SuiteOutcomes {
                name: suite.name.clone(),
                cases: suite
                    .testcases
                    .iter()
                    .map(|testcase| TestCaseOutcome::from_junit(suite, testcase))
                    .collect(),
            })
            .collect();
        Self { suites }
    }

    /// Reads JUnit reports from the given paths.
    ///
    /// Each path is either a report file, or a directory whose `*.xml` files (not recursing
    /// into subdirectories) are read in sorted order.
    pub fn from_paths(
        paths: impl IntoIterator<Item = impl AsRef<Utf8Path>>,
    ) -> Result<Self, TestResultReadError> {
        let mut reports = Vec::new();
        for path in paths {
            for file in expand_report_path(path.as_ref())? {
                reports.push(read_report(&file)?);
            }
        }
        Ok(Self::from_reports(&reports))
    }

    /// Returns the suites in this test result.
    pub fn suites(&self) -> &[SuiteOutcomes] {
        &self.suites
    }

    /// Iterates over all test cases, suite by suite.
    pub fn cases(&self) -> impl Iterator<Item = &TestCaseOutcome> {
        self.suites.iter().flat_map(|suite| &suite.cases)
    }

    /// Returns the total number of test cases.
    pub fn case_count(&self) -> usize {
        self.suites.iter().map(|suite| suite.cases.len()).sum()
    }
}

fn expand_report_path(path: &Utf8Path) -> Result<Vec<Utf8PathBuf>, TestResultReadError> {
    if !path.is_dir() {
        return Ok(vec![path.to_owned()]);
    }

    let read_dir_error = |error| TestResultReadError::ReadDir {
        dir: path.to_owned(),
        error,
    };
    let mut files = Vec::new();
    for entry in path.read_dir_utf8().map_err(read_dir_error)? {
        let entry = entry.map_err(read_dir_error)?;
        let entry_path = entry.path();
        if entry_path.extension() == Some("xml") && entry_path.is_file() {
            files.push(entry_path.to_owned());
        }
    }
    files.sort();
    debug!("found {} JUnit reports in {path}", files.len());
    Ok(files)
}

fn read_report(path: &Utf8Path) -> Result<Report, TestResultReadError> {
    debug!("reading JUnit report at {path}");
    let contents = std::fs::read_to_string(path).map_err(|error| TestResultReadError::Read {
        path: path.to_owned(),
        error,
    })?;
    contents
        .parse::<Report>()
        .map_err(|error| TestResultReadError::Parse {
            path: path.to_owned(),
            error,
        })
}
