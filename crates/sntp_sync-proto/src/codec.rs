// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Request encoding and reply validation.
//!
//! The client's transmit timestamp doubles as a cookie: a server copies it into
//! the origin field of its reply, and [`decode_reply`] refuses any datagram whose
//! origin field does not match the outstanding request.

use crate::error::DecodeError;
use crate::protocol::{
    ConstPackedSizeBytes, FromBytes, HEADER_SIZE, KissOfDeath, LeapIndicator, Mode, Packet,
    ReferenceIdentifier, Stratum, ToBytes, Version,
};
use crate::timestamp::NtpTimestamp;

/// Header fields and timestamps of an accepted time reply, byte-order corrected.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DecodedReply {
    /// Leap indicator (never [`LeapIndicator::Unknown`] in an accepted reply).
    pub leap_indicator: LeapIndicator,
    /// Version number echoed by the server.
    pub version: Version,
    /// Association mode of the reply.
    pub mode: Mode,
    /// Server stratum (never 0 in an accepted reply).
    pub stratum: Stratum,
    /// Poll exponent.
    pub poll: i8,
    /// Precision exponent.
    pub precision: i8,
    /// Root delay, 16.16 fixed point seconds.
    pub root_delay: u32,
    /// Root dispersion, 16.16 fixed point seconds.
    pub root_dispersion: u32,
    /// Reference identifier.
    pub reference_id: ReferenceIdentifier,
    /// Server reference timestamp.
    pub reference: NtpTimestamp,
    /// Origin timestamp (equal to the request cookie).
    pub origin: NtpTimestamp,
    /// Server receive timestamp.
    pub receive: NtpTimestamp,
    /// Server transmit timestamp.
    pub transmit: NtpTimestamp,
}

/// A reply that matched the outstanding request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Reply {
    /// A usable time sample.
    Time(DecodedReply),
    /// The server asked the client to go away (`LI = 3`, reference id `DENY`).
    KissOfDeath,
}

/// The client-mode packet carrying `transmit` as its transmit timestamp.
pub fn request_packet(transmit: NtpTimestamp) -> Packet {
    Packet {
        leap_indicator: LeapIndicator::NoWarning,
        version: Version::V4,
        mode: Mode::Client,
        transmit_timestamp: transmit.into(),
        ..Packet::default()
    }
}

/// Encode an SNTPv4 client request.
///
/// The caller must retain `transmit` as the cookie for [`decode_reply`].
pub fn encode_request(transmit: NtpTimestamp) -> [u8; HEADER_SIZE] {
    let mut buf = [0u8; HEADER_SIZE];
    let written = request_packet(transmit).to_bytes(&mut buf);
    debug_assert_eq!(written, Ok(HEADER_SIZE));
    buf
}

/// Decode and validate a datagram against the cookie of the outstanding request.
pub fn decode_reply(bytes: &[u8], cookie: NtpTimestamp) -> Result<Reply, DecodeError> {
    if bytes.len() != Packet::PACKED_SIZE_BYTES {
        return Err(DecodeError::BadLength { len: bytes.len() });
    }
    let (packet, _) =
        Packet::from_bytes(bytes).map_err(|_| DecodeError::BadLength { len: bytes.len() })?;

    if packet.mode != Mode::Server {
        return Err(DecodeError::UnexpectedMode { mode: packet.mode });
    }

    if NtpTimestamp::from(packet.origin_timestamp) != cookie {
        return Err(DecodeError::Unsolicited);
    }

    if packet.leap_indicator == LeapIndicator::Unknown {
        return match packet.reference_id.kiss_code() {
            Some(KissOfDeath::Deny) => Ok(Reply::KissOfDeath),
            _ => Err(DecodeError::Unsynchronized),
        };
    }

    if packet.stratum == Stratum::UNSPECIFIED {
        return Err(DecodeError::Unsynchronized);
    }

    Ok(Reply::Time(DecodedReply {
        leap_indicator: packet.leap_indicator,
        version: packet.version,
        mode: packet.mode,
        stratum: packet.stratum,
        poll: packet.poll,
        precision: packet.precision,
        root_delay: packet.root_delay.to_bits(),
        root_dispersion: packet.root_dispersion.to_bits(),
        reference_id: packet.reference_id,
        reference: packet.reference_timestamp.into(),
        origin: packet.origin_timestamp.into(),
        receive: packet.receive_timestamp.into(),
        transmit: packet.transmit_timestamp.into(),
    }))
}
