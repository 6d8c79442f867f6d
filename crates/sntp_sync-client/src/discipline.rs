// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Local clock discipline.
//!
//! [`ClockAdjuster`] turns the winning offset of a pass into either a
//! frequency correction (a small proportional-integral loop) or a step of the
//! local clock. [`ClockModel`] tracks the caller-supplied offset between the
//! local clock and UTC, and applies a staged leap second to that offset at
//! the first UTC midnight of a month.
//!
//! Both survive across passes and across `start_sync` calls.

use sntp_proto::protocol::LeapIndicator;
use sntp_proto::NtpTimestamp;

use crate::clock::ClockError;
use crate::config::EngineTuning;
use crate::platform::ClockSource;

const SECS_PER_DAY: i64 = 86_400;

/// What the adjuster did to the clock.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Adjustment {
    /// The clock rate was changed; `frequency` is in 2^-32 s/s.
    Slewed {
        /// Frequency correction handed to the clock.
        frequency: i32,
    },
    /// The clock was set to `to`.
    Stepped {
        /// New local time.
        to: NtpTimestamp,
    },
}

/// Proportional-integral frequency loop with a step fallback.
#[derive(Clone, Debug)]
pub struct ClockAdjuster {
    window: i64,
    gain_a: i64,
    gain_b: i64,
    integral: i64,
}

impl ClockAdjuster {
    /// Create an adjuster with a zero integral term.
    pub fn new(tuning: &EngineTuning) -> Self {
        ClockAdjuster {
            window: tuning.pll_window,
            gain_a: tuning.pll_gain_a,
            gain_b: tuning.pll_gain_b,
            integral: 0,
        }
    }

    /// Accumulated integral term, 2^-32 s/s.
    pub fn integral(&self) -> i64 {
        self.integral
    }

    /// Whether `delta` (32.32) is small enough to slew.
    pub fn within_window(&self, delta: i64) -> bool {
        -self.window < delta && delta < self.window
    }

    /// Correct `clock` by `delta` (32.32 fixed point, positive means the
    /// clock is behind).
    pub fn apply(
        &mut self,
        delta: i64,
        clock: &mut dyn ClockSource,
    ) -> Result<Adjustment, ClockError> {
        if self.within_window(delta) {
            self.integral += scale(delta, self.gain_b);
            let frequency = scale(delta, self.gain_a) + self.integral;
            let frequency = frequency.clamp(i32::MIN as i64, i32::MAX as i64) as i32;
            log::debug!(
                "slewing: delta={} integral={} frequency={}",
                delta,
                self.integral,
                frequency
            );
            clock.adjust_frequency(frequency)?;
            Ok(Adjustment::Slewed { frequency })
        } else {
            let to = clock.now().offset_by(delta);
            log::debug!("stepping clock by {} (32.32) to {:?}", delta, to);
            clock.set_time(to)?;
            Ok(Adjustment::Stepped { to })
        }
    }
}

/// `(delta * gain) >> 32` without intermediate overflow.
fn scale(delta: i64, gain: i64) -> i64 {
    ((delta as i128 * gain as i128) >> 32) as i64
}

/// Offset between the local clock and UTC, with leap-second staging.
///
/// The local clock is assumed to read `UTC + offset` seconds once
/// [`set_offset`](Self::set_offset) has been called. Until then the offset is
/// zero and leap indications are recorded but never applied.
#[derive(Clone, Debug, Default)]
pub struct ClockModel {
    offset: i64,
    using_offset: bool,
    pending_leap: Option<LeapIndicator>,
    next_midnight: Option<i64>,
}

impl ClockModel {
    /// A model with no offset and nothing pending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current offset in seconds, without running the leap update.
    pub fn raw_offset(&self) -> i64 {
        if self.using_offset { self.offset } else { 0 }
    }

    /// Whether a leap indication is staged.
    pub fn pending_leap(&self) -> Option<LeapIndicator> {
        self.pending_leap
    }

    /// UTC midnight (Unix seconds) at which the staged leap is next checked.
    pub fn next_midnight(&self) -> Option<i64> {
        self.next_midnight
    }

    /// Stage the leap indicator from an accepted reply.
    pub fn record_leap(&mut self, leap: LeapIndicator) {
        if matches!(leap, LeapIndicator::AddOne | LeapIndicator::SubOne) {
            self.pending_leap = Some(leap);
        }
    }

    /// Declare that the local clock reads `UTC + secs`.
    pub fn set_offset(&mut self, secs: i64, local_now: NtpTimestamp) {
        self.offset = secs;
        self.using_offset = true;
        self.next_midnight = Some(next_utc_midnight(local_now.to_unix().0 - secs));
    }

    /// Run the leap update, then return the offset in seconds.
    pub fn offset(&mut self, local_now: NtpTimestamp) -> i64 {
        self.update(local_now);
        self.raw_offset()
    }

    /// Convert a local clock reading to UTC.
    pub fn to_utc(&self, local: NtpTimestamp) -> NtpTimestamp {
        local.offset_secs(-self.raw_offset())
    }

    /// Apply a staged leap if UTC has crossed the stored midnight.
    ///
    /// Returns the change made to the offset (+1, -1 or 0) when a midnight
    /// was crossed, `None` otherwise.
    pub fn update(&mut self, local_now: NtpTimestamp) -> Option<i64> {
        let leap = self.pending_leap?;
        if !self.using_offset {
            return None;
        }
        let utc = local_now.to_unix().0 - self.offset;
        let Some(midnight) = self.next_midnight else {
            self.next_midnight = Some(next_utc_midnight(utc));
            return None;
        };
        if utc < midnight {
            return None;
        }

        self.next_midnight = Some(next_utc_midnight(utc));
        self.pending_leap = None;
        let (_, _, day) = civil_from_days(utc.div_euclid(SECS_PER_DAY));
        if day != 1 {
            log::debug!("midnight crossed on day {}, dropping staged leap", day);
            return Some(0);
        }
        let change = match leap {
            LeapIndicator::AddOne => 1,
            LeapIndicator::SubOne => -1,
            _ => 0,
        };
        self.offset += change;
        log::debug!("leap second applied, offset now {}", self.offset);
        Some(change)
    }
}

/// The first UTC midnight strictly after `utc` (Unix seconds).
pub fn next_utc_midnight(utc: i64) -> i64 {
    utc + SECS_PER_DAY - utc.rem_euclid(SECS_PER_DAY)
}

/// Proleptic Gregorian `(year, month, day)` for a count of days since
/// 1970-01-01.
pub fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}
