// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! 32.32 fixed-point NTP timestamps.
//!
//! All offset arithmetic in the client is done on the packed 64-bit form so
//! that differences wrap the same way the on-wire 32-bit seconds field does.
//! Conversions to and from microseconds avoid 64-bit division by using a
//! shift-and-add approximation of `n / 1_000_000` ([`div1m`]), which is exact
//! to well under one microsecond for every value the client produces.
//!
//! # Era limitation
//!
//! Unix conversions assume NTP era 0 (1900-01-01 through 2036-02-07). Offset
//! and delay arithmetic stays correct across the 2036 rollover because it only
//! uses wrapping differences, but [`NtpTimestamp::to_unix`] on an era-1 value
//! yields a time 2^32 seconds too early.

use crate::protocol::TimestampFormat;
#[cfg(feature = "std")]
use std::time;

/// The number of seconds from 1st January 1900 UTC to the start of the Unix epoch.
pub const EPOCH_DELTA: i64 = 2_208_988_800;

const MICROS_PER_SEC: u64 = 1_000_000;

/// Approximate `n / 1_000_000` using shifts and adds only.
pub fn div1m(n: u64) -> u64 {
    let q1 = (n >> 5) + (n >> 10);
    let q2 = (n >> 12) + (q1 >> 1);
    let q3 = (q2 >> 11).wrapping_sub(q2 >> 23);
    let q = n.wrapping_add(q1).wrapping_add(q2).wrapping_sub(q3);
    q >> 20
}

/// Convert microseconds (below one second) to a 32-bit binary fraction.
pub fn us_to_frac(us: u64) -> u64 {
    div1m(us << 32)
}

/// Convert a 16.16 fixed-point value to microseconds.
pub fn frac16_to_us(frac: u64) -> u64 {
    frac.wrapping_mul(MICROS_PER_SEC) >> 16
}

/// Convert signed microseconds to a signed 32.32 fixed-point value.
///
/// Rounds toward negative infinity. Exact for any offset the 32.32 format
/// can hold.
pub const fn micros_to_fixed(us: i64) -> i64 {
    let per_sec = MICROS_PER_SEC as i64;
    let secs = us.div_euclid(per_sec);
    let rem = us.rem_euclid(per_sec);
    (secs << 32) + (rem << 32) / per_sec
}

/// Convert a signed 32.32 fixed-point value to microseconds.
///
/// Only meaningful while `|fixed|` is below 2^40 (about 256 seconds); larger
/// values should be reported in whole seconds with `fixed >> 32`.
pub fn fixed_to_micros(fixed: i64) -> i64 {
    fixed.wrapping_mul(MICROS_PER_SEC as i64) >> 32
}

/// A 64-bit NTP timestamp: seconds since 1900 in the high word, binary fraction in the low word.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct NtpTimestamp(pub u64);

impl NtpTimestamp {
    /// Build from the two on-wire words.
    pub const fn from_parts(seconds: u32, fraction: u32) -> Self {
        NtpTimestamp(((seconds as u64) << 32) | fraction as u64)
    }

    /// Build from Unix seconds and microseconds within the second.
    ///
    /// Microseconds of one second or more are not normalized.
    pub fn from_unix(secs: i64, micros: u32) -> Self {
        let seconds = secs.wrapping_add(EPOCH_DELTA) as u32;
        NtpTimestamp::from_parts(seconds, us_to_frac(micros as u64) as u32)
    }

    /// The integer seconds word.
    pub const fn seconds(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// The binary fraction word.
    pub const fn fraction(self) -> u32 {
        self.0 as u32
    }

    /// Unix seconds and microseconds within the second, assuming era 0.
    pub fn to_unix(self) -> (i64, u32) {
        let secs = self.seconds() as i64 - EPOCH_DELTA;
        let micros = ((self.fraction() as u64 * MICROS_PER_SEC) >> 32) as u32;
        (secs, micros)
    }

    /// Signed difference `self - earlier` in 32.32 fixed point.
    ///
    /// Wraps like the on-wire seconds field, so it is correct whenever the two
    /// instants are within 68 years of each other.
    pub fn diff(self, earlier: NtpTimestamp) -> i64 {
        self.0.wrapping_sub(earlier.0) as i64
    }

    /// Shift by a signed 32.32 fixed-point amount.
    pub fn offset_by(self, delta: i64) -> NtpTimestamp {
        NtpTimestamp(self.0.wrapping_add(delta as u64))
    }

    /// Shift by whole seconds.
    pub fn offset_secs(self, secs: i64) -> NtpTimestamp {
        self.offset_by(secs.wrapping_shl(32))
    }

    /// The current system time.
    #[cfg(feature = "std")]
    pub fn now() -> Self {
        match time::SystemTime::now().duration_since(time::UNIX_EPOCH) {
            Ok(d) => NtpTimestamp::from_unix(d.as_secs() as i64, d.subsec_micros()),
            Err(e) => {
                let d = e.duration();
                let mut secs = -(d.as_secs() as i64);
                let mut micros = d.subsec_micros();
                if micros > 0 {
                    secs -= 1;
                    micros = 1_000_000 - micros;
                }
                NtpTimestamp::from_unix(secs, micros)
            }
        }
    }
}

impl From<TimestampFormat> for NtpTimestamp {
    fn from(t: TimestampFormat) -> Self {
        NtpTimestamp::from_parts(t.seconds, t.fraction)
    }
}

impl From<NtpTimestamp> for TimestampFormat {
    fn from(t: NtpTimestamp) -> Self {
        TimestampFormat {
            seconds: t.seconds(),
            fraction: t.fraction(),
        }
    }
}
