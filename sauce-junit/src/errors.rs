// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use thiserror::Error;

/// An error that occurs while reading a [`Report`](crate::Report).
///
/// Returned by [`Report::deserialize`](crate::Report::deserialize) and
/// [`Report::from_str`](crate::Report::from_str).
#[derive(Debug, Error)]
pub enum DeserializeError {
    /// The input was not well-formed XML.
    #[error("error reading JUnit XML at byte offset {position}")]
    Xml {
        /// The byte offset at which the error was detected.
        position: usize,

        /// The underlying XML error.
        #[source]
        inner: quick_xml::Error,
    },

    /// The input could not be read.
    #[error("error reading JUnit report input")]
    Io {
        /// The underlying I/O error.
        #[from]
        inner: std::io::Error,
    },

    /// The document's root element is neither `testsuites` nor `testsuite`.
    #[error("unexpected root element `{name}`, expected `testsuites` or `testsuite`")]
    UnexpectedRoot {
        /// The name of the root element that was found.
        name: String,
    },

    /// The document did not contain a root element.
    #[error("JUnit report is empty")]
    Empty,
}
