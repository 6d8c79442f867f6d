// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Error types for the synchronization engine.
//!
//! Only [`ConfigError`] is ever returned to the caller synchronously. The
//! per-attempt errors ([`ResolveError`], [`SendError`], [`MemoryError`],
//! [`ClockError`](crate::clock::ClockError)) are absorbed by the engine's
//! retry logic and logged. A pass that ends without any accepted reply is
//! reported through the error callback as [`ErrorKind::Timeout`].
//!
//! Callers holding an [`io::Error`] from the tokio service can recover the
//! typed error with `get_ref()` and `downcast_ref::<SyncError>()`.

// Re-export proto error types so callers need not depend on the proto crate.
pub use sntp_proto::error::{DecodeError, ParseError};

pub use crate::clock::ClockError;

use std::io;

/// Invalid synchronization configuration. Returned before any state changes.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// The server list is empty.
    #[error("at least one server is required")]
    NoServers,
    /// More servers than the engine can track per pass.
    #[error("too many servers: {count} (maximum {max})")]
    TooManyServers {
        /// Number of servers supplied.
        count: usize,
        /// Maximum supported.
        max: usize,
    },
    /// A server entry is the empty string.
    #[error("server {index} has an empty hostname")]
    EmptyHostname {
        /// Zero-based position in the list.
        index: usize,
    },
    /// A server hostname exceeds the length limit.
    #[error("server {index} hostname is {len} bytes (maximum {max})")]
    HostnameTooLong {
        /// Zero-based position in the list.
        index: usize,
        /// Length of the offending hostname in characters.
        len: usize,
        /// Maximum supported.
        max: usize,
    },
}

/// Name resolution failed for one attempt.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ResolveError {
    /// The resolver produced no addresses.
    #[error("{host}: resolved to no addresses")]
    NoAddresses {
        /// Hostname that was looked up.
        host: String,
    },
    /// The resolver reported a failure.
    #[error("{host}: {detail}")]
    Failed {
        /// Hostname that was looked up.
        host: String,
        /// Resolver-specific description.
        detail: String,
    },
}

/// Transmitting a request failed. Ignored by the engine; the attempt timer retries.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("send failed: {detail}")]
pub struct SendError {
    /// Transport-specific description.
    pub detail: String,
}

/// The transport could not acquire a socket or buffer.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("out of resources: {detail}")]
pub struct MemoryError {
    /// Transport-specific description.
    pub detail: String,
}

/// Category of a pass-level failure, with stable numeric codes.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorKind {
    /// Name resolution failed.
    Dns,
    /// Resource acquisition failed.
    Memory,
    /// Transmission failed.
    Send,
    /// No server produced an accepted reply.
    Timeout,
}

impl ErrorKind {
    /// Stable numeric code: DNS=1, MEM=2, SEND=3, TIMEOUT=4.
    pub fn code(self) -> u8 {
        match self {
            ErrorKind::Dns => 1,
            ErrorKind::Memory => 2,
            ErrorKind::Send => 3,
            ErrorKind::Timeout => 4,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Dns => "dns",
            ErrorKind::Memory => "memory",
            ErrorKind::Send => "send",
            ErrorKind::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

/// Top-level error for callers of the engine and the tokio service.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Invalid configuration.
    #[error("sntp config error: {0}")]
    Config(#[from] ConfigError),
    /// Name resolution failure.
    #[error("sntp resolve error: {0}")]
    Resolve(#[from] ResolveError),
    /// Transmission failure.
    #[error("sntp {0}")]
    Send(#[from] SendError),
    /// Resource acquisition failure.
    #[error("sntp {0}")]
    Memory(#[from] MemoryError),
    /// Clock refused an adjustment.
    #[error("sntp clock error: {0}")]
    Clock(#[from] ClockError),
    /// The background service is no longer running.
    #[error("sntp service has shut down")]
    ServiceStopped,
    /// Underlying I/O error.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<SyncError> for io::Error {
    fn from(err: SyncError) -> io::Error {
        let kind = match &err {
            SyncError::Config(_) => io::ErrorKind::InvalidInput,
            SyncError::Resolve(_) => io::ErrorKind::NotFound,
            SyncError::Send(_) => io::ErrorKind::Other,
            SyncError::Memory(_) => io::ErrorKind::OutOfMemory,
            SyncError::Clock(ClockError::PermissionDenied) => io::ErrorKind::PermissionDenied,
            SyncError::Clock(_) => io::ErrorKind::Other,
            SyncError::ServiceStopped => io::ErrorKind::BrokenPipe,
            SyncError::Io(e) => e.kind(),
        };
        if let SyncError::Io(e) = err {
            return e;
        }
        io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        assert_eq!(
            ConfigError::NoServers.to_string(),
            "at least one server is required"
        );
        let e = ConfigError::HostnameTooLong {
            index: 2,
            len: 129,
            max: 128,
        };
        assert_eq!(e.to_string(), "server 2 hostname is 129 bytes (maximum 128)");
    }

    #[test]
    fn test_error_kind_codes() {
        assert_eq!(ErrorKind::Dns.code(), 1);
        assert_eq!(ErrorKind::Memory.code(), 2);
        assert_eq!(ErrorKind::Send.code(), 3);
        assert_eq!(ErrorKind::Timeout.code(), 4);
        assert_eq!(ErrorKind::Timeout.to_string(), "timeout");
    }

    #[test]
    fn test_sync_error_to_io_error_kind() {
        let cases: Vec<(SyncError, io::ErrorKind)> = vec![
            (
                SyncError::Config(ConfigError::NoServers),
                io::ErrorKind::InvalidInput,
            ),
            (
                SyncError::Memory(MemoryError {
                    detail: "bind".into(),
                }),
                io::ErrorKind::OutOfMemory,
            ),
            (
                SyncError::Clock(ClockError::PermissionDenied),
                io::ErrorKind::PermissionDenied,
            ),
            (SyncError::ServiceStopped, io::ErrorKind::BrokenPipe),
        ];
        for (err, expected) in cases {
            let io_err: io::Error = err.into();
            assert_eq!(io_err.kind(), expected);
        }
    }

    #[test]
    fn test_sync_error_downcast_roundtrip() {
        let io_err: io::Error = SyncError::Config(ConfigError::NoServers).into();
        let inner = io_err
            .get_ref()
            .unwrap()
            .downcast_ref::<SyncError>()
            .unwrap();
        assert!(matches!(inner, SyncError::Config(ConfigError::NoServers)));
    }

    #[test]
    fn test_io_error_passthrough() {
        let orig = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        let io_err: io::Error = SyncError::Io(orig).into();
        assert_eq!(io_err.kind(), io::ErrorKind::ConnectionReset);
        assert_eq!(io_err.to_string(), "reset");
    }
}
