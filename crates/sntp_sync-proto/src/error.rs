// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Error types for buffer-based SNTP packet parsing and reply validation.
//!
//! Both [`ParseError`] and [`DecodeError`] are `no_std`-compatible and use no
//! heap allocation. When the `std` feature is enabled they also implement
//! [`std::error::Error`] and can be converted to [`std::io::Error`].

use core::fmt;

use crate::protocol::Mode;

/// Errors that can occur during buffer-based packet parsing or serialization.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ParseError {
    /// The buffer is too short for the expected data.
    BufferTooShort {
        /// Number of bytes needed.
        needed: usize,
        /// Number of bytes available.
        available: usize,
    },
    /// An invalid or unrecognized field value was encountered.
    InvalidField {
        /// Name of the field that was invalid.
        field: &'static str,
        /// The invalid value.
        value: u32,
    },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::BufferTooShort { needed, available } => {
                write!(
                    f,
                    "buffer too short: needed {} bytes, got {}",
                    needed, available
                )
            }
            ParseError::InvalidField { field, value } => {
                write!(f, "invalid {} value: {}", field, value)
            }
        }
    }
}

/// Reasons a received datagram is rejected as a reply to the outstanding request.
///
/// None of these are reported to callers of the synchronization engine; a
/// rejected datagram is treated as noise and the engine keeps waiting.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DecodeError {
    /// The datagram is not exactly one SNTP header long.
    BadLength {
        /// Length of the received datagram.
        len: usize,
    },
    /// The origin timestamp does not echo the cookie of the outstanding request.
    Unsolicited,
    /// The datagram is not a server-mode reply.
    UnexpectedMode {
        /// Association mode carried by the datagram.
        mode: Mode,
    },
    /// The server reports that its own clock is not synchronized.
    Unsynchronized,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::BadLength { len } => {
                write!(f, "bad packet length: {}", len)
            }
            DecodeError::Unsolicited => write!(f, "origin timestamp does not match request"),
            DecodeError::UnexpectedMode { mode } => {
                write!(f, "unexpected association mode: {:?}", mode)
            }
            DecodeError::Unsynchronized => write!(f, "server not synchronized"),
        }
    }
}

#[cfg(feature = "std")]
impl From<ParseError> for std::io::Error {
    fn from(err: ParseError) -> std::io::Error {
        let kind = match &err {
            ParseError::BufferTooShort { .. } => std::io::ErrorKind::UnexpectedEof,
            ParseError::InvalidField { .. } => std::io::ErrorKind::InvalidData,
        };
        std::io::Error::new(kind, err)
    }
}

#[cfg(feature = "std")]
impl From<DecodeError> for std::io::Error {
    fn from(err: DecodeError) -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::InvalidData, err)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ParseError {}

#[cfg(feature = "std")]
impl std::error::Error for DecodeError {}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn test_display_buffer_too_short() {
        let err = ParseError::BufferTooShort {
            needed: 48,
            available: 10,
        };
        assert_eq!(err.to_string(), "buffer too short: needed 48 bytes, got 10");
    }

    #[test]
    fn test_display_invalid_field() {
        let err = ParseError::InvalidField {
            field: "leap indicator",
            value: 5,
        };
        assert_eq!(err.to_string(), "invalid leap indicator value: 5");
    }

    #[test]
    fn test_display_decode_errors() {
        assert_eq!(
            DecodeError::BadLength { len: 47 }.to_string(),
            "bad packet length: 47"
        );
        assert_eq!(
            DecodeError::Unsolicited.to_string(),
            "origin timestamp does not match request"
        );
        assert_eq!(
            DecodeError::Unsynchronized.to_string(),
            "server not synchronized"
        );
        assert_eq!(
            DecodeError::UnexpectedMode {
                mode: Mode::Client
            }
            .to_string(),
            "unexpected association mode: Client"
        );
    }

    #[test]
    fn test_into_io_error() {
        let parse_err = ParseError::BufferTooShort {
            needed: 48,
            available: 0,
        };
        let io_err: std::io::Error = parse_err.into();
        assert_eq!(io_err.kind(), std::io::ErrorKind::UnexpectedEof);

        let io_err: std::io::Error = DecodeError::Unsolicited.into();
        assert_eq!(io_err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_decode_error_is_std_error() {
        let err: Box<dyn std::error::Error> = Box::new(DecodeError::Unsynchronized);
        assert_eq!(err.to_string(), "server not synchronized");
    }
}
