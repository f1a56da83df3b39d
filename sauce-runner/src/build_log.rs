// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The build console log.

use crate::errors::BuildLogReadError;
use camino::Utf8Path;
use tracing::debug;

/// The console log of a build, split into lines.
///
/// CI consoles are frequently colorized, so ANSI escape sequences are stripped when the log is
/// loaded. Invalid UTF-8 is replaced with `U+FFFD`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildLog {
    lines: Vec<String>,
}

impl BuildLog {
    /// Creates an empty build log, for when no console log is available.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a build log from raw console bytes.
    pub fn from_bytes(bytes: impl AsRef<[u8]>) -> Self {
        let stripped = strip_ansi_escapes::strip(bytes.as_ref());
        let lines = String::from_utf8_lossy(&stripped)
            .lines()
            .map(ToOwned::to_owned)
            .collect();
        Self { lines }
    }

    /// Reads a build log from a file.
    pub fn from_path(path: &Utf8Path) -> Result<Self, BuildLogReadError> {
        let bytes = std::fs::read(path).map_err(|error| BuildLogReadError {
            path: path.to_owned(),
            error,
        })?;
        let log = Self::from_bytes(bytes);
        debug!("read {} lines from build log at {path}", log.lines.len());
        Ok(log)
    }

    /// Iterates over the lines of the log.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// Returns true if the log has no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
