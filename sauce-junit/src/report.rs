// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{DeserializeError, deserialize::deserialize_report};
use indexmap::IndexMap;
use std::{io, str::FromStr, time::Duration};

/// The root element of a JUnit report.
///
/// Documents whose root is a single `<testsuite>` are read as a report with one
/// test suite and no name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Report {
    /// The name of this report, if the document had a `<testsuites>` root with a name.
    pub name: Option<String>,

    /// The total number of tests from all testsuites.
    pub tests: usize,

    /// The total number of failures from all testsuites.
    pub failures: usize,

    /// The total number of errors from all testsuites.
    pub errors: usize,

    /// The test suites contained in this report.
    pub testsuites: Vec<TestSuite>,
}

impl Report {
    /// Creates a new, empty `Report`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a new testsuite and updates the `tests`, `failures` and `errors` counts.
    pub fn add_testsuite(&mut self, testsuite: TestSuite) -> &mut Self {
        self.tests += testsuite.tests;
        self.failures += testsuite.failures;
        self.errors += testsuite.errors;
        self.testsuites.push(testsuite);
        self
    }

    /// Reads a report from the given reader.
    pub fn deserialize(mut reader: impl io::Read) -> Result<Self, DeserializeError> {
        let mut buf = String::new();
        reader.read_to_string(&mut buf)?;
        deserialize_report(&buf)
    }
}

impl FromStr for Report {
    type Err = DeserializeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        deserialize_report(s)
    }
}

/// Represents a single testsuite.
///
/// A `TestSuite` groups together several `TestCase` instances.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct TestSuite {
    /// The name of this testsuite.
    pub name: String,

    /// The total number of tests in this testsuite.
    pub tests: usize,

    /// The total number of disabled (skipped) tests in this testsuite.
    pub disabled: usize,

    /// The total number of tests in this suite that errored.
    pub errors: usize,

    /// The total number of tests in this suite that failed.
    pub failures: usize,

    /// The overall time taken by the testsuite.
    pub time: Option<Duration>,

    /// The testcases that form this testsuite.
    pub testcases: Vec<TestCase>,

    /// Data written to standard output while the testsuite was executed.
    pub system_out: Option<Output>,

    /// Data written to standard error while the testsuite was executed.
    pub system_err: Option<Output>,

    /// Other attributes, such as "hostname" or "package".
    pub extra: IndexMap<String, String>,
}

impl TestSuite {
    /// Creates a new `TestSuite`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds a testcase to this testsuite and updates the counts.
    pub fn add_testcase(&mut self, testcase: TestCase) -> &mut Self {
        self.tests += 1;
        match &testcase.status {
            TestCaseStatus::Success => {}
            TestCaseStatus::NonSuccess { kind, .. } => match kind {
                NonSuccessKind::Failure => self.failures += 1,
                NonSuccessKind::Error => self.errors += 1,
            },
            TestCaseStatus::Skipped { .. } => self.disabled += 1,
        }
        self.testcases.push(testcase);
        self
    }

    /// Sets standard output.
    pub fn set_system_out(&mut self, system_out: impl AsRef<str>) -> &mut Self {
        self.system_out = Some(Output::new(system_out.as_ref()));
        self
    }

    /// Sets standard error.
    pub fn set_system_err(&mut self, system_err: impl AsRef<str>) -> &mut Self {
        self.system_err = Some(Output::new(system_err.as_ref()));
        self
    }
}

/// Represents a single testcase.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct TestCase {
    /// The name of the testcase.
    pub name: String,

    /// The "classname" of the testcase.
    ///
    /// Typically, this represents the fully qualified path to the test. In other words,
    /// `classname` + `name` together should uniquely identify and locate a test.
    pub classname: Option<String>,

    /// The time it took to execute this testcase.
    pub time: Option<Duration>,

    /// The status of this test.
    pub status: TestCaseStatus,

    /// Data written to standard output while the testcase was executed.
    pub system_out: Option<Output>,

    /// Data written to standard error while the testcase was executed.
    pub system_err: Option<Output>,

    /// Other attributes that were set on the testcase element.
    pub extra: IndexMap<String, String>,
}

impl TestCase {
    /// Creates a new testcase.
    pub fn new(name: impl Into<String>, status: TestCaseStatus) -> Self {
        Self {
            name: name.into(),
            classname: None,
            time: None,
            status,
            system_out: None,
            system_err: None,
            extra: IndexMap::new(),
        }
    }

    /// Returns the fully qualified name of the test: `classname.name`, or just `name` if the
    /// classname is missing or empty.
    pub fn full_name(&self) -> String {
        match self.classname.as_deref() {
            Some(classname) if !classname.is_empty() => format!("{classname}.{}", self.name),
            _ => self.name.clone(),
        }
    }

    /// Sets the classname of the test.
    pub fn set_classname(&mut self, classname: impl Into<String>) -> &mut Self {
        self.classname = Some(classname.into());
        self
    }

    /// Sets the time taken for the testcase.
    pub fn set_time(&mut self, time: Duration) -> &mut Self {
        self.time = Some(time);
        self
    }

    /// Sets standard output.
    pub fn set_system_out(&mut self, system_out: impl AsRef<str>) -> &mut Self {
        self.system_out = Some(Output::new(system_out.as_ref()));
        self
    }

    /// Sets standard error.
    pub fn set_system_err(&mut self, system_err: impl AsRef<str>) -> &mut Self {
        self.system_err = Some(Output::new(system_err.as_ref()));
        self
    }
}

/// Represents the success or failure of a testcase.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TestCaseStatus {
    /// This testcase passed.
    Success,

    /// This testcase did not pass.
    NonSuccess {
        /// Whether this testcase failed in an expected way (failure) or an unexpected way (error).
        kind: NonSuccessKind,

        /// The failure message.
        message: Option<String>,

        /// The "type" of failure that occurred.
        ty: Option<String>,

        /// The description of the failure.
        ///
        /// This is read from the text node of the element.
        description: Option<String>,
    },

    /// This testcase was not run.
    Skipped {
        /// The skip message.
        message: Option<String>,

        /// The "type" of skip that occurred.
        ty: Option<String>,

        /// The description of the skip.
        ///
        /// This is read from the text node of the element.
        description: Option<String>,
    },
}

impl TestCaseStatus {
    /// Creates a new `TestCaseStatus` that represents a successful test.
    pub fn success() -> Self {
        TestCaseStatus::Success
    }

    /// Creates a new `TestCaseStatus` that represents an unsuccessful test.
    pub fn non_success(kind: NonSuccessKind) -> Self {
        TestCaseStatus::NonSuccess {
            kind,
            message: None,
            ty: None,
            description: None,
        }
    }

    /// Creates a new `TestCaseStatus` that represents a skipped test.
    pub fn skipped() -> Self {
        TestCaseStatus::Skipped {
            message: None,
            ty: None,
            description: None,
        }
    }

    /// Returns true if this status represents a passing test.
    ///
    /// Skipped tests are not considered to have passed.
    pub fn is_success(&self) -> bool {
        matches!(self, TestCaseStatus::Success)
    }

    /// Sets the message. No-op if this is a success case.
    pub fn set_message(&mut self, message: impl Into<String>) -> &mut Self {
        let message_mut = match self {
            TestCaseStatus::Success => return self,
            TestCaseStatus::NonSuccess { message, .. } => message,
            TestCaseStatus::Skipped { message, .. } => message,
        };
        *message_mut = Some(message.into());
        self
    }

    /// Sets the type. No-op if this is a success case.
    pub fn set_type(&mut self, ty: impl Into<String>) -> &mut Self {
        let ty_mut = match self {
            TestCaseStatus::Success => return self,
            TestCaseStatus::NonSuccess { ty, .. } => ty,
            TestCaseStatus::Skipped { ty, .. } => ty,
        };
        *ty_mut = Some(ty.into());
        self
    }

    /// Sets the description (text node). No-op if this is a success case.
    pub fn set_description(&mut self, description: impl Into<String>) -> &mut Self {
        let description_mut = match self {
            TestCaseStatus::Success => return self,
            TestCaseStatus::NonSuccess { description, .. } => description,
            TestCaseStatus::Skipped { description, .. } => description,
        };
        *description_mut = Some(description.into());
        self
    }
}

/// The kind of non-success: an expected failure or an unexpected error.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NonSuccessKind {
    /// This is an expected failure. Read from a `failure` element.
    Failure,

    /// This is an unexpected error. Read from an `error` element.
    Error,
}

/// Represents text that is written out to standard output or standard error during test execution.
///
/// # Encoding
///
/// On Unix platforms, standard output and standard error are typically bytestrings (`Vec<u8>`).
/// However, XUnit assumes that the output is valid Unicode, and this type definition reflects
/// that.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Output {
    output: Box<str>,
}

impl Output {
    /// Creates a new output, removing ANSI escape sequences and other non-printable characters
    /// from it.
    pub fn new(output: impl AsRef<str>) -> Self {
        let output = strip_ansi_escapes::strip_str(output.as_ref());
        let output = output
            .replace(
                |c| matches!(c, '\x00'..='\x08' | '\x0b' | '\x0c' | '\x0e'..='\x1f'),
                "",
            )
            .into_boxed_str();
        Self { output }
    }

    /// Returns the output.
    pub fn as_str(&self) -> &str {
        &self.output
    }

    /// Converts the output into a string.
    pub fn into_string(self) -> String {
        self.output.into_string()
    }
}

impl AsRef<str> for Output {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<Output> for String {
    fn from(output: Output) -> Self {
        output.into_string()
    }
}
