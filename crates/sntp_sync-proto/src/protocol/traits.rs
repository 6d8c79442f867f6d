// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

use crate::error::ParseError;

/// Types that have a constant size on the wire.
pub trait ConstPackedSizeBytes {
    /// Size in bytes when packed for transmission.
    const PACKED_SIZE_BYTES: usize;
}

/// Parse a type from the front of a byte slice.
///
/// Does not need `std::io`; usable on `no_std` targets.
pub trait FromBytes: Sized {
    /// Returns the parsed value and the number of bytes consumed from `buf`.
    fn from_bytes(buf: &[u8]) -> Result<(Self, usize), ParseError>;
}

/// Serialize a type into the front of a byte slice.
pub trait ToBytes {
    /// Returns the number of bytes written, or [`ParseError::BufferTooShort`]
    /// if `buf` cannot hold the value.
    fn to_bytes(&self, buf: &mut [u8]) -> Result<usize, ParseError>;
}
