// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Unified error types for the storage agent.
//!
//! Every failure the reconciliation loops can observe falls into one of a
//! small number of kinds. The kind decides what the loop does next:
//!
//! - [`Error::SourceUnavailable`]: the local or inventory read failed. The
//!   cycle is abandoned and committed state is left untouched.
//! - [`Error::SinkUnavailable`]: the orchestration backend rejected or did not
//!   receive an event. The loop applies its retain/drop rules and retries on
//!   the next cycle.
//! - [`Error::Configuration`]: a required setting is missing or invalid. This
//!   is only raised at startup and is fatal.

use thiserror::Error;

/// The main error type for storage agent operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Reading the current snapshot failed.
    ///
    /// Raised for a missing heartbeat directory, an unreachable storage
    /// daemon or metadata service, or a payload that could not be decoded.
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// Delivering an event to the orchestration backend failed.
    #[error("Sink unavailable: {0}")]
    SinkUnavailable(String),

    /// A required setting is missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Short machine-readable name of the error kind, used in status output.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::SourceUnavailable(_) => "source_unavailable",
            Error::SinkUnavailable(_) => "sink_unavailable",
            Error::Configuration(_) => "configuration",
            Error::Io(_) => "io",
        }
    }
}

/// A specialized Result type for storage agent operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::SourceUnavailable("connection refused".to_string());
        assert_eq!(err.to_string(), "Source unavailable: connection refused");

        let err = Error::SinkUnavailable("HTTP 503".to_string());
        assert_eq!(err.to_string(), "Sink unavailable: HTTP 503");

        let err = Error::Configuration("storagepool driver is not set".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: storagepool driver is not set"
        );
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(
            Error::SourceUnavailable(String::new()).kind(),
            "source_unavailable"
        );
        assert_eq!(
            Error::SinkUnavailable(String::new()).kind(),
            "sink_unavailable"
        );
        assert_eq!(Error::Configuration(String::new()).kind(), "configuration");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.kind(), "io");
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
