// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by sauce-runner.

use camino::{FromPathBufError, Utf8PathBuf};
use std::{error::Error, fmt, io};
use thiserror::Error;

/// An error that occurred while loading the Sauce OnDemand configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file at `{path}`")]
    Read {
        /// The path to the config file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// The config file could not be parsed.
    #[error("failed to parse config file at `{path}`")]
    Parse {
        /// The path to the config file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: toml::de::Error,
    },

    /// The config directory path is not valid UTF-8.
    #[error("config directory path is not valid UTF-8")]
    NonUtf8Path {
        /// The underlying error.
        #[source]
        error: FromPathBufError,
    },

    /// A required setting was not provided by any source.
    #[error(
        "no Sauce OnDemand {setting} configured \
         (set `sauce.{config_key}` in the config file, {env_var}, or {flag})"
    )]
    Missing {
        /// A human-readable name for the setting.
        setting: &'static str,

        /// The key in the `[sauce]` config section.
        config_key: &'static str,

        /// The environment variable that can provide the setting.
        env_var: &'static str,

        /// The command-line flag that can provide the setting.
        flag: &'static str,
    },
}

/// An error that occurred while reading JUnit test results.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TestResultReadError {
    /// A JUnit report file could not be read.
    #[error("failed to read JUnit report at `{path}`")]
    Read {
        /// The path to the report.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// A JUnit report file could not be parsed.
    #[error("failed to parse JUnit report at `{path}`")]
    Parse {
        /// The path to the report.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: sauce_junit::DeserializeError,
    },

    /// A directory of JUnit reports could not be listed.
    #[error("failed to list JUnit reports in `{dir}`")]
    ReadDir {
        /// The directory being listed.
        dir: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },
}

/// An error that occurred while reading the build console log.
#[derive(Debug, Error)]
#[error("failed to read build log at `{path}`")]
pub struct BuildLogReadError {
    /// The path to the build log.
    pub path: Utf8PathBuf,

    /// The underlying error.
    #[source]
    pub error: io::Error,
}

/// An error returned by a [`SessionClient`](crate::client::SessionClient).
///
/// These are transport failures: the request could not be made, timed out, or the service
/// responded with a non-success status.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionClientError {
    /// The HTTP request failed.
    #[error("request to `{url}` failed")]
    Http {
        /// The URL that was requested.
        url: String,

        /// The underlying error.
        #[source]
        error: Box<ureq::Error>,
    },

    /// The update could not be encoded as JSON.
    #[error("failed to encode session update")]
    Encode {
        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },

    /// No credentials were loaded, so the service can't be reached.
    #[error("no Sauce credentials are configured")]
    Offline,
}

/// The remote session record could not be parsed.
#[derive(Debug, Error)]
#[error("session `{session_id}` returned a malformed job record")]
pub struct MalformedRecordError {
    /// The session ID whose record was malformed.
    pub session_id: String,

    /// The underlying error.
    #[source]
    pub error: serde_json::Error,
}

/// An error that occurred while writing a [`SessionReport`](crate::report::SessionReport).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReportWriteError {
    /// The report could not be serialized.
    #[error("failed to serialize session report")]
    Serialize {
        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },

    /// The report could not be written to disk.
    #[error("failed to write session report to `{path}`")]
    Write {
        /// The output path.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: io::Error,
    },
}

/// Displays an error along with its chain of sources on a single line.
///
/// Useful for log messages where the error is not fatal.
pub struct DisplayErrorChain<E>(E);

impl<E: Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain`.
    pub fn new(error: E) -> Self {
        Self(error)
    }
}

impl<E: Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(error) = source {
            write!(f, ": {error}")?;
            source = error.source();
        }
        Ok(())
    }
}
