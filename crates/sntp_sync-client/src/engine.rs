// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! The synchronization state machine.
//!
//! [`SyncEngine`] owns its collaborators and all session state. It is driven
//! from two entry points that must never run concurrently (they take
//! `&mut self`):
//!
//! - [`SyncEngine::on_completion`]: lookup results, datagrams and timer fires.
//!   Never blocks and never invokes user callbacks.
//! - [`SyncEngine::run_deferred`]: tasks the engine posted to its
//!   [`Scheduler`]. Clock adjustment and callbacks happen here.
//!
//! A session starts with [`SyncEngine::start_sync`] and consists of one pass,
//! or a pass every repeat interval when repeating. Each pass queries every
//! server, keeps the best reply, and finishes by disciplining the clock and
//! firing exactly one of the success or error callbacks.

use std::net::IpAddr;
use std::time::Duration;

use tracing::{debug, trace, warn};

use sntp_proto::codec::{Reply, decode_reply, encode_request};
use sntp_proto::protocol::LeapIndicator;
use sntp_proto::NtpTimestamp;

use crate::config::{EngineTuning, ErrorCallback, SuccessCallback, SyncConfig};
use crate::discipline::{Adjustment, ClockAdjuster, ClockModel};
use crate::error::{ConfigError, ErrorKind, ResolveError};
use crate::estimate::{DeltaEstimate, Offset};
use crate::pass::{PassState, Phase, ServerSlot};
use crate::platform::{
    ClockSource, Collaborators, Completion, DeferredTask, PassToken, Resolver, Scheduler, Timer,
    TimerGeneration, Transport,
};
use crate::selection::{BestResult, ServerIdentity};

/// Payload of the success callback.
#[derive(Clone, Debug, PartialEq)]
pub struct SyncSuccess {
    /// Corrected local time at the end of the pass (`now + delta`).
    pub instant: NtpTimestamp,
    /// The selected server.
    pub server: ServerIdentity,
    /// Measured offset of the local clock.
    pub offset: Offset,
    /// Round-trip delay in microseconds, when positive.
    pub delay_us: Option<u64>,
    /// Server root delay in microseconds.
    pub root_delay_us: u64,
    /// Server root dispersion in microseconds.
    pub root_dispersion_us: u64,
    /// Error bound in microseconds.
    pub root_max_error_us: i64,
    /// Server stratum.
    pub stratum: u8,
    /// Leap indicator of the selected reply.
    pub leap: LeapIndicator,
    /// Whether a leap second is staged for the next first-of-month midnight.
    pub pending_leap: bool,
    /// What was done to the clock, or `None` if the clock refused.
    pub adjustment: Option<Adjustment>,
}

impl SyncSuccess {
    /// [`instant`](Self::instant) as Unix seconds and microseconds.
    pub fn unix_time(&self) -> (i64, u32) {
        self.instant.to_unix()
    }
}

/// Payload of the error callback.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SyncFailure {
    /// Why the pass failed.
    pub kind: ErrorKind,
    /// Server involved, when the failure is specific to one.
    pub server: Option<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum TimerPurpose {
    Attempt,
    Repeat,
    Backoff,
}

/// The single shared timer plus the generation of its current arm.
struct TimerSlot {
    timer: Box<dyn Timer>,
    next_generation: u64,
    armed: Option<(TimerGeneration, TimerPurpose)>,
}

impl TimerSlot {
    fn arm(&mut self, after: Duration, purpose: TimerPurpose) {
        self.next_generation += 1;
        let generation = TimerGeneration(self.next_generation);
        let recurring = purpose == TimerPurpose::Backoff;
        self.timer.arm(after, recurring, generation);
        self.armed = Some((generation, purpose));
    }

    fn disarm(&mut self) {
        if self.armed.take().is_some() {
            self.timer.disarm();
        }
    }

    /// The purpose of the arm that produced `generation`, if still current.
    fn fired(&mut self, generation: TimerGeneration) -> Option<TimerPurpose> {
        match self.armed {
            Some((current, purpose)) if current == generation => {
                if purpose != TimerPurpose::Backoff {
                    self.armed = None;
                }
                Some(purpose)
            }
            _ => None,
        }
    }
}

/// Configuration and cross-pass state of the running session.
struct Session {
    servers: Vec<ServerSlot>,
    repeat: bool,
    on_success: Option<SuccessCallback>,
    on_error: Option<ErrorCallback>,
    last_selected: Option<usize>,
    pass: Option<PassState>,
}

/// SNTP synchronization engine.
pub struct SyncEngine {
    resolver: Box<dyn Resolver>,
    transport: Box<dyn Transport>,
    timer: TimerSlot,
    clock: Box<dyn ClockSource>,
    scheduler: Box<dyn Scheduler>,
    tuning: EngineTuning,
    adjuster: ClockAdjuster,
    model: ClockModel,
    session: Option<Session>,
    next_token: u64,
}

impl SyncEngine {
    /// Create an idle engine.
    pub fn new(collaborators: Collaborators, tuning: EngineTuning) -> Self {
        let Collaborators {
            resolver,
            transport,
            timer,
            clock,
            scheduler,
        } = collaborators;
        SyncEngine {
            resolver,
            transport,
            timer: TimerSlot {
                timer,
                next_generation: 0,
                armed: None,
            },
            clock,
            scheduler,
            adjuster: ClockAdjuster::new(&tuning),
            tuning,
            model: ClockModel::new(),
            session: None,
            next_token: 0,
        }
    }

    /// Engine constants in use.
    pub fn tuning(&self) -> &EngineTuning {
        &self.tuning
    }

    /// Whether a session is configured.
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Replace any running session with `config` and start its first pass.
    ///
    /// The configuration is validated first; on error nothing changes.
    pub fn start_sync(&mut self, config: SyncConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.reset();

        debug!(
            servers = config.servers.len(),
            repeat = config.repeat,
            "starting sntp sync"
        );
        self.session = Some(Session {
            servers: config.servers.into_iter().map(ServerSlot::new).collect(),
            repeat: config.repeat,
            on_success: config.on_success,
            on_error: config.on_error,
            last_selected: None,
            pass: None,
        });
        self.start_pass();
        Ok(())
    }

    /// Cancel the running session, if any. Its callbacks are dropped.
    pub fn stop(&mut self) {
        if self.session.is_some() {
            debug!("stopping sntp sync");
        }
        self.reset();
    }

    /// Declare that the local clock reads `UTC + secs`.
    pub fn set_offset(&mut self, secs: i64) {
        let now = self.clock.now();
        self.model.set_offset(secs, now);
    }

    /// The local clock offset from UTC in seconds, after applying any
    /// leap second that has come due.
    pub fn offset(&mut self) -> i64 {
        let now = self.clock.now();
        self.model.offset(now)
    }

    /// Handle an asynchronous completion.
    pub fn on_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Resolved { token, result } => self.on_resolved(token, result),
            Completion::Datagram { token, from, bytes } => self.on_datagram(token, from, &bytes),
            Completion::TimerFired { generation } => self.on_timer(generation),
        }
    }

    /// Run a task previously posted to the scheduler.
    pub fn run_deferred(&mut self, task: DeferredTask) {
        match task {
            DeferredTask::FinishPass(token) => self.finish_pass(token),
        }
    }

    fn reset(&mut self) {
        // Invalidate anything still in flight for the old pass.
        self.next_token += 1;
        self.timer.disarm();
        self.transport.close();
        self.session = None;
    }

    fn current_pass(&mut self, token: PassToken) -> Option<&mut PassState> {
        self.session
            .as_mut()
            .and_then(|s| s.pass.as_mut())
            .filter(|p| p.token == token)
    }

    fn start_pass(&mut self) {
        self.next_token += 1;
        let token = PassToken(self.next_token);
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.pass = None;
        // Cookies of this pass must use the post-leap offset.
        if let Some(change) = self.model.update(self.clock.now()) {
            debug!(change, "midnight crossed before pass start");
        }

        if let Err(e) = self.transport.open(token) {
            warn!(error = %e, "cannot open transport, backing off");
            if !matches!(self.timer.armed, Some((_, TimerPurpose::Backoff))) {
                self.timer.arm(self.tuning.backoff_interval, TimerPurpose::Backoff);
            }
            return;
        }

        trace!(token = token.0, "pass started");
        session.pass = Some(PassState::new(
            token,
            self.tuning.max_attempts,
            session.last_selected,
        ));
        self.enter_server();
    }

    /// Skip servers that must not be queried, then start on the current one
    /// or queue the end of the pass.
    fn enter_server(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(pass) = session.pass.as_mut() else {
            return;
        };
        while let Some(slot) = session.servers.get_mut(pass.index) {
            if slot.take_turn() {
                break;
            }
            debug!(server = %slot.hostname, standing = ?slot.standing, "skipping server");
            pass.next_server();
        }
        if pass.index >= session.servers.len() {
            pass.phase = Phase::Done;
            self.timer.disarm();
            trace!(token = pass.token.0, "pass complete");
            self.scheduler
                .post_deferred(DeferredTask::FinishPass(pass.token));
            return;
        }
        self.begin_attempt();
    }

    fn begin_attempt(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(pass) = session.pass.as_mut() else {
            return;
        };
        let host = &session.servers[pass.index].hostname;
        match pass.address {
            Some(addr) => {
                let cookie = self.model.to_utc(self.clock.now());
                pass.cookie = Some(cookie);
                pass.phase = Phase::AwaitingResponse;
                let request = encode_request(cookie);
                trace!(server = %host, %addr, attempts = pass.attempts, "sending request");
                if let Err(e) = self.transport.send(addr, self.tuning.port, &request) {
                    debug!(server = %host, error = %e, "send failed, waiting for retry");
                }
            }
            None => {
                pass.phase = Phase::Resolving;
                trace!(server = %host, "resolving");
                self.resolver.resolve(host, pass.token);
            }
        }
        self.timer
            .arm(self.tuning.attempt_timeout, TimerPurpose::Attempt);
    }

    /// The current attempt ended without a usable reply.
    fn attempt_failed(&mut self) {
        self.timer.disarm();
        let Some(pass) = self.session.as_mut().and_then(|s| s.pass.as_mut()) else {
            return;
        };
        if pass.consume_attempt() {
            pass.next_server();
            self.enter_server();
        } else {
            self.begin_attempt();
        }
    }

    fn on_resolved(&mut self, token: PassToken, result: Result<Vec<IpAddr>, ResolveError>) {
        let Some(pass) = self.current_pass(token) else {
            trace!(token = token.0, "stale lookup result");
            return;
        };
        if pass.phase != Phase::Resolving {
            return;
        }
        match result {
            Ok(addrs) if !addrs.is_empty() => {
                pass.address = Some(addrs[0]);
                self.timer.disarm();
                self.begin_attempt();
            }
            Ok(_) => {
                debug!("lookup returned no addresses");
                self.attempt_failed();
            }
            Err(e) => {
                debug!(error = %e, "lookup failed");
                self.attempt_failed();
            }
        }
    }

    fn on_datagram(&mut self, token: PassToken, from: IpAddr, bytes: &[u8]) {
        let local_now = self.clock.now();
        let Some(pass) = self.current_pass(token) else {
            trace!(%from, "datagram for stale pass");
            return;
        };
        if pass.phase != Phase::AwaitingResponse || !pass.accepts_from(from) {
            trace!(%from, "unexpected datagram");
            return;
        }
        let Some(cookie) = pass.cookie else {
            return;
        };
        match decode_reply(bytes, cookie) {
            Err(e) => trace!(%from, error = %e, "discarding datagram"),
            Ok(Reply::KissOfDeath) => self.on_kiss_of_death(from),
            Ok(Reply::Time(reply)) => {
                self.model.record_leap(reply.leap_indicator);
                if let Some(change) = self.model.update(local_now) {
                    debug!(change, "midnight crossed on accepted reply");
                }
                let destination = self.model.to_utc(local_now);
                let estimate = DeltaEstimate::from_reply(&reply, destination);
                self.accept(from, estimate, reply.stratum.0, reply.leap_indicator, destination);
            }
        }
    }

    fn on_kiss_of_death(&mut self, from: IpAddr) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(pass) = session.pass.as_mut() else {
            return;
        };
        let slot = &mut session.servers[pass.index];
        if slot.kiss_of_death() {
            warn!(server = %slot.hostname, peer = %from, "repeated kiss-of-death, dropping server");
            self.timer.disarm();
            pass.next_server();
            self.enter_server();
        } else {
            warn!(server = %slot.hostname, peer = %from, "server sent kiss-of-death");
            pass.exhaust();
        }
    }

    fn accept(
        &mut self,
        from: IpAddr,
        estimate: DeltaEstimate,
        stratum: u8,
        leap: LeapIndicator,
        captured_at: NtpTimestamp,
    ) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(pass) = session.pass.as_mut() else {
            return;
        };
        let server = ServerIdentity {
            index: pass.index,
            hostname: session.servers[pass.index].hostname.clone(),
            address: from,
        };
        debug!(
            server = %server.hostname,
            peer = %from,
            delta = estimate.delta,
            delay_frac = estimate.delay_frac,
            stratum,
            "reply accepted"
        );
        let candidate = BestResult::new(server, estimate, stratum, leap, captured_at);
        if pass.selector.offer(candidate) {
            trace!("new best server");
        }
        session.servers[pass.index].responded();
        self.timer.disarm();
        pass.next_server();
        self.enter_server();
    }

    fn finish_pass(&mut self, token: PassToken) {
        let Some(pass) = self.current_pass(token).filter(|p| p.phase == Phase::Done) else {
            trace!(token = token.0, "stale pass completion");
            return;
        };
        let best = std::mem::take(&mut pass.selector).into_best();
        self.transport.close();

        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.pass = None;
        match best {
            Some(best) => {
                let delta = best.estimate.delta;
                let instant = self.clock.now().offset_by(delta);
                let adjustment = match self.adjuster.apply(delta, self.clock.as_mut()) {
                    Ok(adj) => Some(adj),
                    Err(e) => {
                        warn!(error = %e, "clock adjustment failed");
                        None
                    }
                };
                let success = SyncSuccess {
                    instant,
                    offset: best.estimate.offset(),
                    delay_us: best.estimate.delay_us(),
                    root_delay_us: best.estimate.root_delay_us(),
                    root_dispersion_us: best.estimate.root_dispersion_us(),
                    root_max_error_us: best.estimate.root_max_error_us(),
                    stratum: best.stratum,
                    leap: best.leap,
                    pending_leap: self.model.pending_leap().is_some(),
                    adjustment,
                    server: best.server,
                };
                debug!(
                    server = %success.server.hostname,
                    offset = ?success.offset,
                    "sntp sync succeeded"
                );
                session.last_selected = Some(success.server.index);
                if let Some(cb) = session.on_success.as_mut() {
                    cb(&success);
                }
            }
            None => {
                debug!("sntp sync pass got no usable reply");
                session.last_selected = None;
                let failure = SyncFailure {
                    kind: ErrorKind::Timeout,
                    server: None,
                };
                if let Some(cb) = session.on_error.as_mut() {
                    cb(&failure);
                }
            }
        }

        if session.repeat {
            self.timer
                .arm(self.tuning.repeat_interval, TimerPurpose::Repeat);
        } else {
            self.session = None;
        }
    }

    fn on_timer(&mut self, generation: TimerGeneration) {
        let Some(purpose) = self.timer.fired(generation) else {
            trace!(generation = generation.0, "stale timer");
            return;
        };
        match purpose {
            TimerPurpose::Attempt => {
                trace!("attempt timed out");
                self.attempt_failed();
            }
            TimerPurpose::Repeat | TimerPurpose::Backoff => self.start_pass(),
        }
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("tuning", &self.tuning)
            .field("model", &self.model)
            .field("active", &self.session.is_some())
            .finish_non_exhaustive()
    }
}
