// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Contracts for the external collaborators that drive the engine.
//!
//! The engine never blocks and never performs I/O itself. It issues requests
//! through these traits and receives the outcomes later as [`Completion`]
//! values passed to [`SyncEngine::on_completion`](crate::engine::SyncEngine::on_completion).
//! Work that must run outside the completion context (clock adjustment and
//! user callbacks) is posted as a [`DeferredTask`] and run by
//! [`SyncEngine::run_deferred`](crate::engine::SyncEngine::run_deferred).
//!
//! Resolution and datagram receipt cannot be cancelled. Every request carries
//! a [`PassToken`] and every timer arm a [`TimerGeneration`]; completions
//! carrying a stale value are ignored.

use std::net::IpAddr;
use std::time::Duration;

use sntp_proto::NtpTimestamp;

use crate::clock::ClockError;
use crate::error::{MemoryError, ResolveError, SendError};

/// Identifies one pass. Completions from an earlier pass are discarded.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct PassToken(pub u64);

/// Identifies one arming of the timer. A fire from an earlier arm is discarded.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TimerGeneration(pub u64);

/// An outcome delivered to the engine from an external source.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Completion {
    /// A [`Resolver::resolve`] request finished.
    Resolved {
        /// Token passed to `resolve`.
        token: PassToken,
        /// Resolved addresses, or why resolution failed.
        result: Result<Vec<IpAddr>, ResolveError>,
    },
    /// A datagram arrived on the transport opened with `token`.
    Datagram {
        /// Token passed to [`Transport::open`].
        token: PassToken,
        /// Sender address.
        from: IpAddr,
        /// Raw payload.
        bytes: Vec<u8>,
    },
    /// The timer armed with `generation` expired.
    TimerFired {
        /// Generation passed to [`Timer::arm`].
        generation: TimerGeneration,
    },
}

/// Work the engine defers out of the completion context.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeferredTask {
    /// The pass identified by the token has visited every server.
    FinishPass(PassToken),
}

/// Asynchronous hostname lookup.
pub trait Resolver: Send {
    /// Start resolving `host`; deliver [`Completion::Resolved`] with `token`.
    fn resolve(&mut self, host: &str, token: PassToken);
}

/// Datagram socket used for one pass.
pub trait Transport: Send {
    /// Acquire the socket for the pass identified by `token`.
    ///
    /// Datagrams received on it are delivered as [`Completion::Datagram`]
    /// carrying `token`. Opening again replaces the previous socket.
    fn open(&mut self, token: PassToken) -> Result<(), MemoryError>;

    /// Send `bytes` to `addr:port`.
    fn send(&mut self, addr: IpAddr, port: u16, bytes: &[u8]) -> Result<(), SendError>;

    /// Release the socket. Idempotent.
    fn close(&mut self);
}

/// Single shared timer. Arming replaces any previous arm.
pub trait Timer: Send {
    /// Fire [`Completion::TimerFired`] with `generation` after `after`,
    /// and keep firing every `after` if `recurring`.
    fn arm(&mut self, after: Duration, recurring: bool, generation: TimerGeneration);

    /// Cancel the current arm. Idempotent.
    fn disarm(&mut self);
}

/// The local clock being disciplined.
pub trait ClockSource: Send {
    /// Current local time.
    fn now(&self) -> NtpTimestamp;

    /// Step the local clock to `to`.
    fn set_time(&mut self, to: NtpTimestamp) -> Result<(), ClockError>;

    /// Set the frequency correction, in units of 2^-32 seconds per second.
    fn adjust_frequency(&mut self, freq: i32) -> Result<(), ClockError>;
}

/// Queue for work that must run outside the completion context.
pub trait Scheduler: Send {
    /// Queue `task` for a later call to `SyncEngine::run_deferred`.
    fn post_deferred(&mut self, task: DeferredTask);
}

/// The full set of collaborators owned by a [`SyncEngine`](crate::engine::SyncEngine).
pub struct Collaborators {
    /// Hostname lookup.
    pub resolver: Box<dyn Resolver>,
    /// Datagram socket.
    pub transport: Box<dyn Transport>,
    /// Attempt, repeat and backoff timer.
    pub timer: Box<dyn Timer>,
    /// Clock being disciplined.
    pub clock: Box<dyn ClockSource>,
    /// Deferred work queue.
    pub scheduler: Box<dyn Scheduler>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
