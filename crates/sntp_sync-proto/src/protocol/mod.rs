// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Types and constants that precisely match the SNTP header layout.
//!
//! Every header type has slice-based [`FromBytes`]/[`ToBytes`] implementations that
//! work without `std`.
//!
//! Field documentation is largely derived from IETF RFC 4330 and RFC 5905.

/// Well-known NTP/SNTP UDP port.
pub const PORT: u16 = 123;

/// Size in bytes of an SNTP header without extension fields or MAC.
pub const HEADER_SIZE: usize = 48;

/// IPv4 "NTP" multicast/anycast group (224.0.1.1); replies from it are accepted
/// in place of the resolved unicast address.
pub const NTP_ANYCAST_V4: [u8; 4] = [224, 0, 1, 1];

// Convert an ascii string to a big-endian u32.
macro_rules! code_to_u32 {
    ($w:expr) => {
        (($w[3] as u32) << 0) | (($w[2] as u32) << 8) | (($w[1] as u32) << 16) | (($w[0] as u32) << 24)
    };
}

pub(crate) fn be_u32_to_bytes(u: u32) -> [u8; 4] {
    [
        (u >> 24 & 0xff) as u8,
        (u >> 16 & 0xff) as u8,
        (u >> 8 & 0xff) as u8,
        (u & 0xff) as u8,
    ]
}

mod bytes;
mod traits;
mod types;

pub use self::traits::*;
pub use self::types::*;
