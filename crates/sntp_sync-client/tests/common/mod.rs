// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Scripted collaborators for driving the engine step by step.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sntp_client::clock::ClockError;
use sntp_client::config::{EngineTuning, SyncConfig, SyncConfigBuilder};
use sntp_client::engine::{SyncEngine, SyncFailure, SyncSuccess};
use sntp_client::error::{MemoryError, ResolveError, SendError};
use sntp_client::platform::{
    ClockSource, Collaborators, Completion, DeferredTask, PassToken, Resolver, Scheduler, Timer,
    TimerGeneration, Transport,
};
use sntp_client::protocol::{
    KissOfDeath, LeapIndicator, Mode, Packet, ReferenceIdentifier, ShortFormat, Stratum, ToBytes,
    Version,
};
use sntp_client::timestamp::micros_to_fixed;
use sntp_client::NtpTimestamp;

/// Everything the collaborators were asked to do.
#[derive(Debug, Default)]
pub struct Log {
    pub now: NtpTimestamp,
    pub resolves: Vec<(String, PassToken)>,
    pub opens: Vec<PassToken>,
    pub fail_open: bool,
    pub sends: Vec<(IpAddr, u16, Vec<u8>)>,
    pub fail_send: bool,
    pub closes: usize,
    pub arms: Vec<(Duration, bool, TimerGeneration)>,
    pub armed: Option<TimerGeneration>,
    pub steps: Vec<NtpTimestamp>,
    pub frequencies: Vec<i32>,
    pub deferred: VecDeque<DeferredTask>,
}

pub type Shared = Arc<Mutex<Log>>;

struct MockResolver(Shared);

impl Resolver for MockResolver {
    fn resolve(&mut self, host: &str, token: PassToken) {
        self.0.lock().unwrap().resolves.push((host.to_owned(), token));
    }
}

struct MockTransport(Shared);

impl Transport for MockTransport {
    fn open(&mut self, token: PassToken) -> Result<(), MemoryError> {
        let mut log = self.0.lock().unwrap();
        if log.fail_open {
            return Err(MemoryError {
                detail: "no buffers".into(),
            });
        }
        log.opens.push(token);
        Ok(())
    }

    fn send(&mut self, addr: IpAddr, port: u16, bytes: &[u8]) -> Result<(), SendError> {
        let mut log = self.0.lock().unwrap();
        log.sends.push((addr, port, bytes.to_vec()));
        if log.fail_send {
            return Err(SendError {
                detail: "unreachable".into(),
            });
        }
        Ok(())
    }

    fn close(&mut self) {
        self.0.lock().unwrap().closes += 1;
    }
}

struct MockTimer(Shared);

impl Timer for MockTimer {
    fn arm(&mut self, after: Duration, recurring: bool, generation: TimerGeneration) {
        let mut log = self.0.lock().unwrap();
        log.arms.push((after, recurring, generation));
        log.armed = Some(generation);
    }

    fn disarm(&mut self) {
        self.0.lock().unwrap().armed = None;
    }
}

struct ManualClock(Shared);

impl ClockSource for ManualClock {
    fn now(&self) -> NtpTimestamp {
        self.0.lock().unwrap().now
    }

    fn set_time(&mut self, to: NtpTimestamp) -> Result<(), ClockError> {
        let mut log = self.0.lock().unwrap();
        log.now = to;
        log.steps.push(to);
        Ok(())
    }

    fn adjust_frequency(&mut self, freq: i32) -> Result<(), ClockError> {
        self.0.lock().unwrap().frequencies.push(freq);
        Ok(())
    }
}

struct QueueScheduler(Shared);

impl Scheduler for QueueScheduler {
    fn post_deferred(&mut self, task: DeferredTask) {
        self.0.lock().unwrap().deferred.push_back(task);
    }
}

/// How a scripted server answers the last request.
#[derive(Clone, Copy, Debug)]
pub struct ServerReply {
    /// Server clock minus client clock, microseconds.
    pub offset_us: i64,
    /// One-way network delay, microseconds.
    pub one_way_us: i64,
    pub stratum: u8,
    pub leap: LeapIndicator,
    /// Root delay, 16.16 fixed point.
    pub root_delay: u32,
    pub root_dispersion: u32,
    pub kiss: bool,
}

impl ServerReply {
    pub fn offset_us(offset_us: i64) -> Self {
        ServerReply {
            offset_us,
            one_way_us: 10_000,
            stratum: 2,
            leap: LeapIndicator::NoWarning,
            root_delay: 0,
            root_dispersion: 0,
            kiss: false,
        }
    }

    pub fn kiss_of_death() -> Self {
        ServerReply {
            kiss: true,
            ..Self::offset_us(0)
        }
    }

    pub fn stratum(mut self, stratum: u8) -> Self {
        self.stratum = stratum;
        self
    }

    pub fn leap(mut self, leap: LeapIndicator) -> Self {
        self.leap = leap;
        self
    }

    pub fn root_delay(mut self, root_delay: u32) -> Self {
        self.root_delay = root_delay;
        self
    }
}

/// Build the 48-byte reply a server would send for `cookie`.
pub fn reply_bytes(cookie: NtpTimestamp, reply: &ServerReply) -> Vec<u8> {
    let receive = cookie.offset_by(micros_to_fixed(reply.offset_us + reply.one_way_us));
    let (leap, reference_id) = if reply.kiss {
        (
            LeapIndicator::Unknown,
            ReferenceIdentifier::kiss(KissOfDeath::Deny),
        )
    } else {
        (reply.leap, ReferenceIdentifier(*b"GPS\0"))
    };
    let packet = Packet {
        leap_indicator: leap,
        version: Version::V4,
        mode: Mode::Server,
        stratum: Stratum(if reply.kiss { 0 } else { reply.stratum }),
        poll: 6,
        precision: -20,
        root_delay: ShortFormat::from_bits(reply.root_delay),
        root_dispersion: ShortFormat::from_bits(reply.root_dispersion),
        reference_id,
        reference_timestamp: receive.into(),
        origin_timestamp: cookie.into(),
        receive_timestamp: receive.into(),
        transmit_timestamp: receive.into(),
    };
    let mut buf = vec![0u8; 48];
    packet.to_bytes(&mut buf).unwrap();
    buf
}

/// Transmit timestamp of a client request.
pub fn request_cookie(bytes: &[u8]) -> NtpTimestamp {
    let mut word = [0u8; 8];
    word.copy_from_slice(&bytes[40..48]);
    NtpTimestamp(u64::from_be_bytes(word))
}

/// An engine wired to scripted collaborators, with recorded callbacks.
pub struct Harness {
    pub engine: SyncEngine,
    pub log: Shared,
    pub successes: Arc<Mutex<Vec<SyncSuccess>>>,
    pub failures: Arc<Mutex<Vec<SyncFailure>>>,
}

/// 2024-06-30 12:00:00 UTC.
pub const START_UNIX: i64 = 1_719_748_800;

impl Harness {
    pub fn new() -> Self {
        Self::with_tuning(EngineTuning::default())
    }

    pub fn with_tuning(tuning: EngineTuning) -> Self {
        let log: Shared = Arc::new(Mutex::new(Log {
            now: NtpTimestamp::from_unix(START_UNIX, 0),
            ..Log::default()
        }));
        let collaborators = Collaborators {
            resolver: Box::new(MockResolver(Arc::clone(&log))),
            transport: Box::new(MockTransport(Arc::clone(&log))),
            timer: Box::new(MockTimer(Arc::clone(&log))),
            clock: Box::new(ManualClock(Arc::clone(&log))),
            scheduler: Box::new(QueueScheduler(Arc::clone(&log))),
        };
        Harness {
            engine: SyncEngine::new(collaborators, tuning),
            log,
            successes: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A config for `servers` whose callbacks record into this harness.
    pub fn config(&self, servers: &[&str], repeat: bool) -> SyncConfig {
        self.recording(SyncConfig::builder().servers(servers.iter().copied()))
            .repeat(repeat)
            .build()
    }

    pub fn recording(&self, builder: SyncConfigBuilder) -> SyncConfigBuilder {
        let successes = Arc::clone(&self.successes);
        let failures = Arc::clone(&self.failures);
        builder
            .on_success(move |s| successes.lock().unwrap().push(s.clone()))
            .on_error(move |f| failures.lock().unwrap().push(f.clone()))
    }

    pub fn start(&mut self, servers: &[&str]) {
        let config = self.config(servers, false);
        self.engine.start_sync(config).unwrap();
    }

    pub fn resolves(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .resolves
            .iter()
            .map(|(h, _)| h.clone())
            .collect()
    }

    pub fn send_count(&self) -> usize {
        self.log.lock().unwrap().sends.len()
    }

    pub fn success_count(&self) -> usize {
        self.successes.lock().unwrap().len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.lock().unwrap().len()
    }

    pub fn advance(&self, micros: i64) {
        let mut log = self.log.lock().unwrap();
        log.now = log.now.offset_by(micros_to_fixed(micros));
    }

    /// Answer the most recent lookup with `addrs`.
    pub fn resolve_with(&mut self, addrs: &[&str]) {
        let token = self.last_resolve_token();
        let result = Ok(addrs.iter().map(|a| a.parse().unwrap()).collect());
        self.engine
            .on_completion(Completion::Resolved { token, result });
    }

    /// Fail the most recent lookup.
    pub fn fail_resolve(&mut self) {
        let (host, token) = self.log.lock().unwrap().resolves.last().cloned().unwrap();
        self.engine.on_completion(Completion::Resolved {
            token,
            result: Err(ResolveError::Failed {
                host,
                detail: "NXDOMAIN".into(),
            }),
        });
    }

    pub fn last_resolve_token(&self) -> PassToken {
        self.log.lock().unwrap().resolves.last().unwrap().1
    }

    pub fn last_open_token(&self) -> PassToken {
        *self.log.lock().unwrap().opens.last().unwrap()
    }

    pub fn last_cookie(&self) -> NtpTimestamp {
        request_cookie(&self.log.lock().unwrap().sends.last().unwrap().2)
    }

    /// Deliver raw bytes from `from` on the current transport.
    pub fn deliver(&mut self, from: &str, bytes: Vec<u8>) {
        let token = self.last_open_token();
        self.engine.on_completion(Completion::Datagram {
            token,
            from: from.parse().unwrap(),
            bytes,
        });
    }

    /// Answer the most recent request from `from`, advancing the clock by
    /// the round trip.
    pub fn reply(&mut self, from: &str, reply: ServerReply) {
        let bytes = reply_bytes(self.last_cookie(), &reply);
        self.advance(2 * reply.one_way_us);
        self.deliver(from, bytes);
    }

    pub fn armed(&self) -> Option<TimerGeneration> {
        self.log.lock().unwrap().armed
    }

    pub fn last_arm(&self) -> (Duration, bool, TimerGeneration) {
        *self.log.lock().unwrap().arms.last().unwrap()
    }

    /// Fire the currently armed timer. Panics if nothing is armed.
    pub fn fire_timer(&mut self) {
        let generation = self.armed().expect("timer not armed");
        let recurring = self.last_arm().1;
        if !recurring {
            self.log.lock().unwrap().armed = None;
        }
        self.engine
            .on_completion(Completion::TimerFired { generation });
    }

    /// Run every queued deferred task.
    pub fn run_deferred(&mut self) {
        loop {
            let task = self.log.lock().unwrap().deferred.pop_front();
            match task {
                Some(task) => self.engine.run_deferred(task),
                None => break,
            }
        }
    }

    pub fn deferred_len(&self) -> usize {
        self.log.lock().unwrap().deferred.len()
    }
}
