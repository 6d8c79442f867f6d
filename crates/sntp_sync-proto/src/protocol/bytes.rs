// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

use crate::error::ParseError;

use super::{
    ConstPackedSizeBytes, FromBytes, LeapIndicator, Mode, Packet, PacketByte1,
    ReferenceIdentifier, ShortFormat, Stratum, TimestampFormat, ToBytes, Version,
};

fn check_len(buf: &[u8], needed: usize) -> Result<(), ParseError> {
    if buf.len() < needed {
        return Err(ParseError::BufferTooShort {
            needed,
            available: buf.len(),
        });
    }
    Ok(())
}

impl FromBytes for ShortFormat {
    fn from_bytes(buf: &[u8]) -> Result<(Self, usize), ParseError> {
        check_len(buf, Self::PACKED_SIZE_BYTES)?;
        let seconds = u16::from_be_bytes([buf[0], buf[1]]);
        let fraction = u16::from_be_bytes([buf[2], buf[3]]);
        Ok((ShortFormat { seconds, fraction }, Self::PACKED_SIZE_BYTES))
    }
}

impl FromBytes for TimestampFormat {
    fn from_bytes(buf: &[u8]) -> Result<(Self, usize), ParseError> {
        check_len(buf, Self::PACKED_SIZE_BYTES)?;
        let seconds = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let fraction = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        Ok((
            TimestampFormat { seconds, fraction },
            Self::PACKED_SIZE_BYTES,
        ))
    }
}

impl FromBytes for PacketByte1 {
    fn from_bytes(buf: &[u8]) -> Result<(Self, usize), ParseError> {
        check_len(buf, Self::PACKED_SIZE_BYTES)?;
        let li_vn_mode = buf[0];
        let li = LeapIndicator::from_bits(li_vn_mode >> 6);
        let vn = Version((li_vn_mode >> 3) & 0b111);
        let mode = Mode::from_bits(li_vn_mode);
        Ok(((li, vn, mode), 1))
    }
}

impl FromBytes for ReferenceIdentifier {
    fn from_bytes(buf: &[u8]) -> Result<(Self, usize), ParseError> {
        check_len(buf, Self::PACKED_SIZE_BYTES)?;
        Ok((
            ReferenceIdentifier([buf[0], buf[1], buf[2], buf[3]]),
            Self::PACKED_SIZE_BYTES,
        ))
    }
}

impl FromBytes for Packet {
    fn from_bytes(buf: &[u8]) -> Result<(Self, usize), ParseError> {
        check_len(buf, Self::PACKED_SIZE_BYTES)?;

        let mut offset = 0;

        let ((leap_indicator, version, mode), n) = PacketByte1::from_bytes(&buf[offset..])?;
        offset += n;

        let stratum = Stratum(buf[offset]);
        let poll = buf[offset + 1] as i8;
        let precision = buf[offset + 2] as i8;
        offset += 3;

        let (root_delay, n) = ShortFormat::from_bytes(&buf[offset..])?;
        offset += n;

        let (root_dispersion, n) = ShortFormat::from_bytes(&buf[offset..])?;
        offset += n;

        let (reference_id, n) = ReferenceIdentifier::from_bytes(&buf[offset..])?;
        offset += n;

        let (reference_timestamp, n) = TimestampFormat::from_bytes(&buf[offset..])?;
        offset += n;

        let (origin_timestamp, n) = TimestampFormat::from_bytes(&buf[offset..])?;
        offset += n;

        let (receive_timestamp, n) = TimestampFormat::from_bytes(&buf[offset..])?;
        offset += n;

        let (transmit_timestamp, n) = TimestampFormat::from_bytes(&buf[offset..])?;
        offset += n;

        Ok((
            Packet {
                leap_indicator,
                version,
                mode,
                stratum,
                poll,
                precision,
                root_delay,
                root_dispersion,
                reference_id,
                reference_timestamp,
                origin_timestamp,
                receive_timestamp,
                transmit_timestamp,
            },
            offset,
        ))
    }
}

// Slice writers.

impl ToBytes for ShortFormat {
    fn to_bytes(&self, buf: &mut [u8]) -> Result<usize, ParseError> {
        check_len(buf, Self::PACKED_SIZE_BYTES)?;
        buf[..4].copy_from_slice(&self.to_bits().to_be_bytes());
        Ok(Self::PACKED_SIZE_BYTES)
    }
}

impl ToBytes for TimestampFormat {
    fn to_bytes(&self, buf: &mut [u8]) -> Result<usize, ParseError> {
        check_len(buf, Self::PACKED_SIZE_BYTES)?;
        buf[..4].copy_from_slice(&self.seconds.to_be_bytes());
        buf[4..8].copy_from_slice(&self.fraction.to_be_bytes());
        Ok(Self::PACKED_SIZE_BYTES)
    }
}

impl ToBytes for PacketByte1 {
    fn to_bytes(&self, buf: &mut [u8]) -> Result<usize, ParseError> {
        check_len(buf, Self::PACKED_SIZE_BYTES)?;
        let (li, vn, mode) = *self;
        buf[0] = (li as u8) << 6 | (vn.0 & 0b111) << 3 | mode as u8;
        Ok(1)
    }
}

impl ToBytes for ReferenceIdentifier {
    fn to_bytes(&self, buf: &mut [u8]) -> Result<usize, ParseError> {
        check_len(buf, Self::PACKED_SIZE_BYTES)?;
        buf[..4].copy_from_slice(&self.0);
        Ok(Self::PACKED_SIZE_BYTES)
    }
}

impl ToBytes for Packet {
    fn to_bytes(&self, buf: &mut [u8]) -> Result<usize, ParseError> {
        check_len(buf, Self::PACKED_SIZE_BYTES)?;

        let mut offset = 0;

        let li_vn_mode = (self.leap_indicator, self.version, self.mode);
        offset += li_vn_mode.to_bytes(&mut buf[offset..])?;
        buf[offset] = self.stratum.0;
        buf[offset + 1] = self.poll as u8;
        buf[offset + 2] = self.precision as u8;
        offset += 3;
        offset += self.root_delay.to_bytes(&mut buf[offset..])?;
        offset += self.root_dispersion.to_bytes(&mut buf[offset..])?;
        offset += self.reference_id.to_bytes(&mut buf[offset..])?;
        offset += self.reference_timestamp.to_bytes(&mut buf[offset..])?;
        offset += self.origin_timestamp.to_bytes(&mut buf[offset..])?;
        offset += self.receive_timestamp.to_bytes(&mut buf[offset..])?;
        offset += self.transmit_timestamp.to_bytes(&mut buf[offset..])?;

        Ok(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_byte_layout() {
        let mut buf = [0u8; 1];
        (LeapIndicator::SubOne, Version::V4, Mode::Client)
            .to_bytes(&mut buf)
            .unwrap();
        assert_eq!(buf[0], 0b10_100_011);

        let ((li, vn, mode), n) = PacketByte1::from_bytes(&[0b11_011_100]).unwrap();
        assert_eq!(n, 1);
        assert_eq!(li, LeapIndicator::Unknown);
        assert_eq!(vn, Version::V3);
        assert_eq!(mode, Mode::Server);
    }

    #[test]
    fn test_packet_short_buffer() {
        let buf = [0u8; 47];
        assert_eq!(
            Packet::from_bytes(&buf),
            Err(ParseError::BufferTooShort {
                needed: 48,
                available: 47
            })
        );
        let mut out = [0u8; 10];
        assert!(Packet::default().to_bytes(&mut out).is_err());
    }

    #[test]
    fn test_packet_field_offsets() {
        let mut buf = [0u8; 48];
        buf[1] = 2;
        buf[4..8].copy_from_slice(&0x0000_8000u32.to_be_bytes());
        buf[12..16].copy_from_slice(b"DENY");
        buf[24..28].copy_from_slice(&7u32.to_be_bytes());
        buf[44..48].copy_from_slice(&9u32.to_be_bytes());
        let (packet, n) = Packet::from_bytes(&buf).unwrap();
        assert_eq!(n, 48);
        assert_eq!(packet.stratum, Stratum(2));
        assert_eq!(packet.root_delay.to_bits(), 0x8000);
        assert_eq!(&packet.reference_id.as_bytes(), b"DENY");
        assert_eq!(packet.origin_timestamp.seconds, 7);
        assert_eq!(packet.transmit_timestamp.fraction, 9);
    }
}
