// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Clock sources the engine can discipline.
//!
//! - [`SoftClock`]: an in-process clock built on [`Instant`]. It honours steps
//!   and frequency corrections without touching the operating system, which
//!   makes it suitable for tests, demos and applications that keep their own
//!   notion of time.
//! - [`SystemClock`]: the host's realtime clock. Reading always works.
//!   Setting and slewing require the `clock` feature, Linux, and the
//!   `CAP_SYS_TIME` capability; elsewhere they return
//!   [`ClockError::Unsupported`].

#![cfg_attr(all(feature = "clock", target_os = "linux"), allow(unsafe_code))]

use std::time::Instant;

use sntp_proto::NtpTimestamp;

use crate::platform::ClockSource;

/// Error type for clock adjustment operations.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ClockError {
    /// The operation requires elevated privileges.
    #[error("permission denied (requires CAP_SYS_TIME)")]
    PermissionDenied,
    /// Platform-specific error with an OS error code.
    #[error("OS error: {0}")]
    OsError(i32),
    /// Clock adjustment is not supported on this platform or build.
    #[error("clock adjustment not supported on this platform")]
    Unsupported,
}

/// A software clock advancing with [`Instant`], corrected in-process.
#[derive(Clone, Debug)]
pub struct SoftClock {
    base: NtpTimestamp,
    anchor: Instant,
    frequency: i32,
}

impl SoftClock {
    /// A clock reading `start` now.
    pub fn new(start: NtpTimestamp) -> Self {
        SoftClock {
            base: start,
            anchor: Instant::now(),
            frequency: 0,
        }
    }

    /// A clock initialised from the system time.
    pub fn from_system() -> Self {
        Self::new(NtpTimestamp::now())
    }

    /// Current frequency correction, 2^-32 s/s.
    pub fn frequency(&self) -> i32 {
        self.frequency
    }

    fn rebase(&mut self) {
        self.base = self.now();
        self.anchor = Instant::now();
    }
}

impl Default for SoftClock {
    fn default() -> Self {
        Self::from_system()
    }
}

impl ClockSource for SoftClock {
    fn now(&self) -> NtpTimestamp {
        let elapsed = self.anchor.elapsed();
        let fixed = ((elapsed.as_nanos() << 32) / 1_000_000_000) as i64;
        let correction = ((fixed as i128 * self.frequency as i128) >> 32) as i64;
        self.base.offset_by(fixed + correction)
    }

    fn set_time(&mut self, to: NtpTimestamp) -> Result<(), ClockError> {
        self.base = to;
        self.anchor = Instant::now();
        Ok(())
    }

    fn adjust_frequency(&mut self, freq: i32) -> Result<(), ClockError> {
        self.rebase();
        self.frequency = freq;
        Ok(())
    }
}

/// The host realtime clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a handle to the system clock.
    pub fn new() -> Self {
        SystemClock
    }
}

impl ClockSource for SystemClock {
    fn now(&self) -> NtpTimestamp {
        NtpTimestamp::now()
    }

    fn set_time(&mut self, to: NtpTimestamp) -> Result<(), ClockError> {
        platform::set_time(to)
    }

    fn adjust_frequency(&mut self, freq: i32) -> Result<(), ClockError> {
        platform::adjust_frequency(freq)
    }
}

/// Convert a 2^-32 s/s frequency into the kernel's scaled-ppm unit
/// (ppm with a 16-bit binary fraction), clamped to the ±500 ppm the kernel
/// accepts.
pub fn frequency_to_scaled_ppm(freq: i32) -> i64 {
    const MAX_SCALED_PPM: i64 = 500 << 16;
    ((freq as i64 * 1_000_000) >> 16).clamp(-MAX_SCALED_PPM, MAX_SCALED_PPM)
}

#[cfg(all(feature = "clock", target_os = "linux"))]
mod platform {
    use super::*;

    fn os_error_from_errno() -> ClockError {
        let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(-1);
        if errno == libc::EPERM {
            ClockError::PermissionDenied
        } else {
            ClockError::OsError(errno)
        }
    }

    pub(super) fn set_time(to: NtpTimestamp) -> Result<(), ClockError> {
        let (secs, micros) = to.to_unix();
        let mut tp: libc::timespec = unsafe { std::mem::zeroed() };
        tp.tv_sec = secs as _;
        tp.tv_nsec = (micros as i64 * 1_000) as _;

        let ret = unsafe { libc::clock_settime(libc::CLOCK_REALTIME, &tp) };
        if ret < 0 {
            return Err(os_error_from_errno());
        }
        log::debug!("clock stepped to {}.{:06}", secs, micros);
        Ok(())
    }

    pub(super) fn adjust_frequency(freq: i32) -> Result<(), ClockError> {
        let mut tx: libc::timex = unsafe { std::mem::zeroed() };
        tx.modes = libc::ADJ_FREQUENCY;
        tx.freq = frequency_to_scaled_ppm(freq) as _;

        let ret = unsafe { libc::clock_adjtime(libc::CLOCK_REALTIME, &mut tx) };
        if ret < 0 {
            return Err(os_error_from_errno());
        }
        log::debug!("clock frequency set to {} scaled ppm", tx.freq);
        Ok(())
    }
}

#[cfg(not(all(feature = "clock", target_os = "linux")))]
mod platform {
    use super::*;

    pub(super) fn set_time(_to: NtpTimestamp) -> Result<(), ClockError> {
        Err(ClockError::Unsupported)
    }

    pub(super) fn adjust_frequency(_freq: i32) -> Result<(), ClockError> {
        Err(ClockError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_error_display() {
        assert_eq!(ClockError::OsError(22).to_string(), "OS error: 22");
        assert_eq!(
            ClockError::Unsupported.to_string(),
            "clock adjustment not supported on this platform"
        );
    }

    #[test]
    fn test_soft_clock_step() {
        let mut clock = SoftClock::new(NtpTimestamp::from_parts(1000, 0));
        clock.set_time(NtpTimestamp::from_parts(5000, 0)).unwrap();
        let now = clock.now();
        assert!(now.seconds() == 5000 || now.seconds() == 5001, "{now:?}");
    }

    #[test]
    fn test_soft_clock_monotonic_with_frequency() {
        let mut clock = SoftClock::new(NtpTimestamp::from_parts(1000, 0));
        clock.adjust_frequency(1 << 20).unwrap();
        assert_eq!(clock.frequency(), 1 << 20);
        let a = clock.now();
        let b = clock.now();
        assert!(b.diff(a) >= 0);
        assert!(a.seconds() >= 1000);
    }

    #[test]
    fn test_scaled_ppm_conversion() {
        // 2^16 * 2^-32 s/s is about 15.26 ppm.
        assert_eq!(frequency_to_scaled_ppm(1 << 16), 1_000_000);
        assert_eq!(frequency_to_scaled_ppm(0), 0);
        assert_eq!(frequency_to_scaled_ppm(i32::MAX), 500 << 16);
        assert_eq!(frequency_to_scaled_ppm(i32::MIN), -(500 << 16));
    }

    #[cfg(not(all(feature = "clock", target_os = "linux")))]
    #[test]
    fn test_system_clock_unsupported_without_feature() {
        let mut clock = SystemClock::new();
        assert_eq!(clock.adjust_frequency(0), Err(ClockError::Unsupported));
        assert!(clock.now().seconds() > 0);
    }
}
