// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use owo_colors::OwoColorize;
use sauce_runner::errors::{BuildLogReadError, ConfigError, ReportWriteError, TestResultReadError};
use std::error::Error;
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

/// Documented exit codes for `sauce-annotate` failures.
pub enum SauceAnnotateExitCode {}

impl SauceAnnotateExitCode {
    /// No errors occurred. This includes runs where no sessions were found.
    pub const OK: i32 = 0;

    /// Writing the report or summary failed.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;

    /// The JUnit reports or the build log could not be read.
    pub const INPUT_READ_ERROR: i32 = 97;

    /// The configuration was invalid or incomplete.
    pub const SETUP_ERROR: i32 = 96;
}

// The #[error()] strings are placeholders: errors are printed with display_to_stderr, which
// colorizes them.

/// An error that stops `sauce-annotate` from completing.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("config error")]
    Config {
        #[from]
        err: ConfigError,
    },
    #[error("failed to read test results")]
    TestResultRead {
        #[from]
        err: TestResultReadError,
    },
    #[error("failed to read build log")]
    BuildLogRead {
        #[from]
        err: BuildLogReadError,
    },
    #[error("failed to write session report")]
    ReportWrite {
        #[from]
        err: ReportWriteError,
    },
    #[error("failed to write to stdout")]
    WriteOutput {
        #[source]
        err: std::io::Error,
    },
}

impl ExpectedError {
    pub(crate) fn write_output(err: std::io::Error) -> Self {
        Self::WriteOutput { err }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => SauceAnnotateExitCode::SETUP_ERROR,
            Self::TestResultRead { .. } | Self::BuildLogRead { .. } => {
                SauceAnnotateExitCode::INPUT_READ_ERROR
            }
            Self::ReportWrite { .. } | Self::WriteOutput { .. } => {
                SauceAnnotateExitCode::WRITE_OUTPUT_ERROR
            }
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match &self {
            Self::Config { err } => match err {
                // The message already says what to do.
                ConfigError::Missing { .. } => {
                    error!("{err}");
                    None
                }
                _ => {
                    error!("failed to load sauce-annotate configuration");
                    Some(err as &dyn Error)
                }
            },
            Self::TestResultRead { err } => {
                error!("failed to read JUnit test results");
                Some(err as &dyn Error)
            }
            Self::BuildLogRead { err } => {
                error!(
                    "failed to read build log at `{}`",
                    err.path.style(styles.bold)
                );
                Some(&err.error as &dyn Error)
            }
            Self::ReportWrite { err } => {
                error!("failed to write session report");
                Some(err as &dyn Error)
            }
            Self::WriteOutput { err } => {
                error!("failed to write to stdout");
                Some(err as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}
