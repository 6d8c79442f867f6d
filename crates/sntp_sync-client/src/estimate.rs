// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Clock offset and round-trip delay from one request/reply exchange.
//!
//! With origin `T1`, server receive `T2`, server transmit `T3` and
//! destination `T4`:
//!
//! - offset: `delta = (T2 - T1)/2 + (T3 - T4)/2` (32.32 fixed point)
//! - delay: `((T4 - T1) - (T3 - T2)) >> 16` (16.16 fixed point)
//!
//! Each difference is a wrapping 64-bit subtraction read back as signed, and
//! each half is taken before summing so the intermediate never overflows.

use sntp_proto::codec::DecodedReply;
use sntp_proto::timestamp::{fixed_to_micros, frac16_to_us};
use sntp_proto::NtpTimestamp;

/// Offset in the precision the reply warrants.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Offset {
    /// Whole seconds, for offsets of roughly 256 s or more.
    Seconds(i64),
    /// Microseconds, for smaller offsets.
    Micros(i64),
}

/// Offset, delay and error terms derived from one accepted reply.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DeltaEstimate {
    /// Signed clock offset, 32.32 fixed point. Positive means the local clock is behind.
    pub delta: i64,
    /// Round-trip delay excluding server processing, 16.16 fixed point.
    pub delay_frac: i64,
    /// Server root delay, 16.16 fixed point.
    pub root_delay: u32,
    /// Server root dispersion, 16.16 fixed point.
    pub root_dispersion: u32,
}

impl DeltaEstimate {
    /// Compute the estimate from the four exchange timestamps.
    pub fn compute(
        origin: NtpTimestamp,
        receive: NtpTimestamp,
        transmit: NtpTimestamp,
        destination: NtpTimestamp,
        root_delay: u32,
        root_dispersion: u32,
    ) -> Self {
        let delta = receive.diff(origin) / 2 + transmit.diff(destination) / 2;
        let delay_frac = destination
            .diff(origin)
            .wrapping_sub(transmit.diff(receive))
            >> 16;
        DeltaEstimate {
            delta,
            delay_frac,
            root_delay,
            root_dispersion,
        }
    }

    /// Compute the estimate for `reply` received at `destination` (UTC).
    pub fn from_reply(reply: &DecodedReply, destination: NtpTimestamp) -> Self {
        Self::compute(
            reply.origin,
            reply.receive,
            reply.transmit,
            destination,
            reply.root_delay,
            reply.root_dispersion,
        )
    }

    /// Selection metric: twice the root delay plus the measured delay.
    pub fn metric(&self) -> i64 {
        self.root_delay as i64 * 2 + self.delay_frac
    }

    /// Worst-case error bound, 16.16 fixed point:
    /// `root_dispersion + root_delay/2 + delay/2`.
    pub fn root_max_error(&self) -> i64 {
        self.root_dispersion as i64 + (self.root_delay / 2) as i64 + self.delay_frac / 2
    }

    /// The offset as whole seconds when large, microseconds otherwise.
    pub fn offset(&self) -> Offset {
        let d40 = self.delta >> 40;
        if d40 != 0 && d40 != -1 {
            Offset::Seconds(self.delta >> 32)
        } else {
            Offset::Micros(fixed_to_micros(self.delta))
        }
    }

    /// Measured round-trip delay in microseconds, if positive.
    pub fn delay_us(&self) -> Option<u64> {
        (self.delay_frac > 0).then(|| frac16_to_us(self.delay_frac as u64))
    }

    /// Server root delay in microseconds.
    pub fn root_delay_us(&self) -> u64 {
        frac16_to_us(self.root_delay as u64)
    }

    /// Server root dispersion in microseconds.
    pub fn root_dispersion_us(&self) -> u64 {
        frac16_to_us(self.root_dispersion as u64)
    }

    /// [`root_max_error`](Self::root_max_error) in microseconds.
    pub fn root_max_error_us(&self) -> i64 {
        self.root_max_error().wrapping_mul(1_000_000) >> 16
    }
}
