// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

use proptest::prelude::*;
use sntp_proto::protocol::{
    ConstPackedSizeBytes, FromBytes, LeapIndicator, Mode, Packet, ShortFormat, Stratum, ToBytes,
    Version,
};
use sntp_proto::{DecodeError, NtpTimestamp, Reply, decode_reply, encode_request};

fn arb_48_bytes() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 48)
}

fn reply_echoing(origin: NtpTimestamp, stratum: u8, li: u8) -> Vec<u8> {
    let packet = Packet {
        leap_indicator: LeapIndicator::from_bits(li),
        version: Version::V4,
        mode: Mode::Server,
        stratum: Stratum(stratum),
        root_delay: ShortFormat::from_bits(0x100),
        origin_timestamp: origin.into(),
        ..Packet::default()
    };
    let mut buf = vec![0u8; Packet::PACKED_SIZE_BYTES];
    packet.to_bytes(&mut buf).unwrap();
    buf
}

proptest! {
    /// Arbitrary datagrams never panic the decoder, whatever the cookie.
    #[test]
    fn decode_arbitrary_bytes_never_panics(bytes in arb_48_bytes(), cookie in any::<u64>()) {
        let _ = decode_reply(&bytes, NtpTimestamp(cookie));
    }

    /// Any length other than 48 is rejected before anything else is looked at.
    #[test]
    fn decode_wrong_length_is_bad_length(len in 0usize..200, cookie in any::<u64>()) {
        prop_assume!(len != 48);
        let buf = vec![0u8; len];
        prop_assert_eq!(
            decode_reply(&buf, NtpTimestamp(cookie)),
            Err(DecodeError::BadLength { len })
        );
    }

    /// A request's transmit field is exactly the cookie a matching reply must echo.
    #[test]
    fn request_cookie_is_accepted_only_when_echoed(
        cookie in any::<u64>(),
        other in any::<u64>(),
        stratum in 1u8..=15,
        li in 0u8..=2,
    ) {
        let request = encode_request(NtpTimestamp(cookie));
        let (parsed, _) = Packet::from_bytes(&request).unwrap();
        prop_assert_eq!(NtpTimestamp::from(parsed.transmit_timestamp), NtpTimestamp(cookie));
        prop_assert_eq!(parsed.mode, Mode::Client);

        let reply = reply_echoing(NtpTimestamp(cookie), stratum, li);
        let accepted = matches!(
            decode_reply(&reply, NtpTimestamp(cookie)),
            Ok(Reply::Time(_))
        );
        prop_assert!(accepted);

        prop_assume!(other != cookie);
        prop_assert_eq!(
            decode_reply(&reply, NtpTimestamp(other)),
            Err(DecodeError::Unsolicited)
        );
    }

    /// If Packet::from_bytes succeeds, writing it back reproduces the input.
    #[test]
    fn packet_roundtrip_is_lossless(bytes in arb_48_bytes()) {
        let (packet, consumed) = Packet::from_bytes(&bytes).unwrap();
        prop_assert_eq!(consumed, 48);
        let mut buf = [0u8; 48];
        packet.to_bytes(&mut buf).unwrap();
        prop_assert_eq!(&buf[..], &bytes[..]);
    }
}
