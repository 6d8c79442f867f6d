// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! SNTP wire types, fixed-point timestamp arithmetic, and the request/reply codec.
//!
//! This crate provides the foundational types and parsing logic for the
//! Simple Network Time Protocol (RFC 4330). It performs no I/O and can be
//! built without `std`.
//!
//! # Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `std`   | Yes     | `std::error::Error` impls, `NtpTimestamp::now()` |

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

/// Encoding of client requests and validation of server replies.
pub mod codec;

/// Error types for packet parsing and reply validation.
pub mod error;

/// SNTP protocol types and constants (RFC 4330).
pub mod protocol;

/// 32.32 fixed-point NTP timestamps and microsecond conversions.
pub mod timestamp;

pub use codec::{DecodedReply, Reply, decode_reply, encode_request};
pub use error::{DecodeError, ParseError};
pub use timestamp::NtpTimestamp;
