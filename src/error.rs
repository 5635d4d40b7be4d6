// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types.

use std::io;

use thiserror::Error;

use crate::Response;

/// Error type of all driver operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The port specifier could not be parsed.
    #[error("invalid port specifier `{spec}`: {reason}")]
    InvalidPortSpec { spec: String, reason: &'static str },

    /// Unknown data type token.
    #[error("invalid data type `{0}`")]
    InvalidDataType(String),

    /// The value cannot be represented by the data type of the port.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// A set was issued against a port that can only be read.
    #[error("port `{0}` is read-only")]
    ReadOnly(String),

    /// An option string could not be converted into configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The transport session reported an I/O failure.
    #[error("transport: {0}")]
    Transport(#[from] io::Error),

    /// The timeout budget was exhausted before completion.
    #[error("operation timed out")]
    Timeout,

    /// The received response doesn't match the request.
    #[error("unexpected response: {response:?}")]
    UnexpectedResponse { response: Response },

    /// The monitored equipment reports the port as down.
    #[error("port `{0}` is not operational")]
    NotOperational(String),
}

impl Error {
    pub(crate) fn invalid_port(spec: &str, reason: &'static str) -> Self {
        Self::InvalidPortSpec {
            spec: spec.to_owned(),
            reason,
        }
    }

    /// Whether a retry loop may attempt the failed step again.
    ///
    /// Only transport failures are transient; malformed input and an
    /// exhausted budget are surfaced immediately.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Whether the error was caused by running out of time.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout => true,
            Self::Transport(err) => err.kind() == io::ErrorKind::TimedOut,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_errors_are_retryable() {
        assert!(Error::from(io::Error::from(io::ErrorKind::BrokenPipe)).is_retryable());
        assert!(!Error::Timeout.is_retryable());
        assert!(!Error::invalid_port("x", "empty").is_retryable());
        assert!(!Error::InvalidDataType("u12".into()).is_retryable());
    }

    #[test]
    fn transport_timeouts_count_as_timeouts() {
        assert!(Error::from(io::Error::from(io::ErrorKind::TimedOut)).is_timeout());
        assert!(Error::Timeout.is_timeout());
        assert!(!Error::from(io::Error::from(io::ErrorKind::Other)).is_timeout());
    }

    #[test]
    fn display_names_the_offending_spec() {
        let err = Error::invalid_port("h1000/x", "bad bit index");
        assert_eq!(
            err.to_string(),
            "invalid port specifier `h1000/x`: bad bit index"
        );
    }
}
