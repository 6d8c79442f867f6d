// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Tokio runtime adapter for [`SyncEngine`].
//!
//! [`spawn`] starts a driver task that owns the engine. Hostname lookups,
//! socket reads and timers run as separate tasks that only post
//! [`Completion`]s to the driver, so the engine itself is only ever touched
//! from one task. Callers interact with it through a cloneable [`SyncHandle`].
//!
//! # Example
//!
//! ```rust,no_run
//! use sntp_client::clock::SoftClock;
//! use sntp_client::config::{EngineTuning, SyncConfig};
//! use sntp_client::service::{self, SyncOutcome};
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let handle = service::spawn(Box::new(SoftClock::from_system()), EngineTuning::default());
//!     match handle.sync_once(SyncConfig::with_default_servers()).await? {
//!         SyncOutcome::Synced(s) => println!("offset {:?} from {}", s.offset, s.server.hostname),
//!         SyncOutcome::Failed(f) => println!("sync failed: {}", f.kind),
//!     }
//!     Ok(())
//! }
//! ```

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::config::{EngineTuning, SyncConfig, SyncConfigBuilder};
use crate::engine::{SyncEngine, SyncFailure, SyncSuccess};
use crate::error::{ConfigError, MemoryError, ResolveError, SendError, SyncError};
use crate::platform::{
    ClockSource, Collaborators, Completion, DeferredTask, PassToken, Resolver, Scheduler, Timer,
    TimerGeneration, Transport,
};

/// Receive buffer size; replies with extension fields are rejected by length anyway.
const RECV_BUFFER: usize = 1024;

/// Select the bind address matching the target address family.
fn bind_addr_for(target: &IpAddr) -> SocketAddr {
    match target {
        IpAddr::V4(_) => SocketAddr::from(([0, 0, 0, 0], 0)),
        IpAddr::V6(_) => SocketAddr::from(([0u16; 8], 0)),
    }
}

/// Order resolved addresses by IP version preference.
///
/// Without the `ipv4` feature (default): prefers IPv6 addresses, falling back
/// to all addresses if there are none. With the `ipv4` feature: returns all
/// addresses unchanged.
pub(crate) fn prefer_addresses(addrs: Vec<IpAddr>) -> Vec<IpAddr> {
    #[cfg(feature = "ipv4")]
    {
        addrs
    }
    #[cfg(not(feature = "ipv4"))]
    {
        let v6: Vec<IpAddr> = addrs.iter().filter(|a| a.is_ipv6()).copied().collect();
        if v6.is_empty() { addrs } else { v6 }
    }
}

/// Resolver backed by `tokio::net::lookup_host`.
struct TokioResolver {
    completions: mpsc::UnboundedSender<Completion>,
}

impl Resolver for TokioResolver {
    fn resolve(&mut self, host: &str, token: PassToken) {
        let host = host.to_owned();
        let tx = self.completions.clone();
        tokio::spawn(async move {
            let lookup = tokio::net::lookup_host((host.as_str(), 0)).await;
            let result = match lookup {
                Ok(addrs) => {
                    let ips = prefer_addresses(addrs.map(|a| a.ip()).collect());
                    if ips.is_empty() {
                        Err(ResolveError::NoAddresses { host })
                    } else {
                        Ok(ips)
                    }
                }
                Err(e) => Err(ResolveError::Failed {
                    host,
                    detail: e.to_string(),
                }),
            };
            let _ = tx.send(Completion::Resolved { token, result });
        });
    }
}

/// A bound socket and the task forwarding its datagrams.
struct BoundSocket {
    socket: Arc<UdpSocket>,
    reader: JoinHandle<()>,
}

impl Drop for BoundSocket {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// UDP transport with one socket per address family, bound on demand.
struct TokioTransport {
    completions: mpsc::UnboundedSender<Completion>,
    token: Option<PassToken>,
    v4: Option<BoundSocket>,
    v6: Option<BoundSocket>,
}

impl TokioTransport {
    fn bind(&self, family: &IpAddr, token: PassToken) -> io::Result<BoundSocket> {
        let std_sock = std::net::UdpSocket::bind(bind_addr_for(family))?;
        std_sock.set_nonblocking(true)?;
        let socket = Arc::new(UdpSocket::from_std(std_sock)?);
        debug!(local = ?socket.local_addr(), "bound sntp socket");

        let reader_sock = Arc::clone(&socket);
        let tx = self.completions.clone();
        let reader = tokio::spawn(async move {
            let mut buf = [0u8; RECV_BUFFER];
            loop {
                match reader_sock.recv_from(&mut buf).await {
                    Ok((len, from)) => {
                        trace!(len, %from, "datagram received");
                        let datagram = Completion::Datagram {
                            token,
                            from: from.ip(),
                            bytes: buf[..len].to_vec(),
                        };
                        if tx.send(datagram).is_err() {
                            return;
                        }
                    }
                    // ICMP errors surface here on some platforms; keep reading.
                    Err(e) => trace!(error = %e, "recv error"),
                }
            }
        });
        Ok(BoundSocket { socket, reader })
    }

    fn slot(&mut self, addr: &IpAddr) -> &mut Option<BoundSocket> {
        match addr {
            IpAddr::V4(_) => &mut self.v4,
            IpAddr::V6(_) => &mut self.v6,
        }
    }

    fn preferred_family() -> IpAddr {
        if cfg!(feature = "ipv4") {
            IpAddr::from([0u8; 4])
        } else {
            IpAddr::from([0u16; 8])
        }
    }
}

impl Transport for TokioTransport {
    fn open(&mut self, token: PassToken) -> Result<(), MemoryError> {
        self.close();
        self.token = Some(token);
        let family = Self::preferred_family();
        let socket = match self.bind(&family, token) {
            // Hosts without IPv6 still get a socket for IPv4 servers.
            Err(first) if family.is_ipv6() => self
                .bind(&IpAddr::from([0u8; 4]), token)
                .map_err(|_| first),
            other => other,
        };
        match socket {
            Ok(socket) => {
                let local_is_v4 = socket
                    .socket
                    .local_addr()
                    .map(|a| a.is_ipv4())
                    .unwrap_or(false);
                if local_is_v4 {
                    self.v4 = Some(socket);
                } else {
                    self.v6 = Some(socket);
                }
                Ok(())
            }
            Err(e) => Err(MemoryError {
                detail: e.to_string(),
            }),
        }
    }

    fn send(&mut self, addr: IpAddr, port: u16, bytes: &[u8]) -> Result<(), SendError> {
        let Some(token) = self.token else {
            return Err(SendError {
                detail: "transport is closed".into(),
            });
        };
        if self.slot(&addr).is_none() {
            let bound = self.bind(&addr, token).map_err(|e| SendError {
                detail: e.to_string(),
            })?;
            *self.slot(&addr) = Some(bound);
        }
        let Some(bound) = self.slot(&addr).as_ref() else {
            return Err(SendError {
                detail: "no socket for address family".into(),
            });
        };
        let sent = bound
            .socket
            .try_send_to(bytes, SocketAddr::new(addr, port))
            .map_err(|e| SendError {
                detail: e.to_string(),
            })?;
        trace!(sent, "request sent");
        Ok(())
    }

    fn close(&mut self) {
        self.token = None;
        self.v4 = None;
        self.v6 = None;
    }
}

/// Timer backed by a sleeping task; re-arming aborts the previous task.
struct TokioTimer {
    completions: mpsc::UnboundedSender<Completion>,
    task: Option<JoinHandle<()>>,
}

impl Timer for TokioTimer {
    fn arm(&mut self, after: Duration, recurring: bool, generation: TimerGeneration) {
        self.disarm();
        let tx = self.completions.clone();
        self.task = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(after).await;
                if tx.send(Completion::TimerFired { generation }).is_err() || !recurring {
                    return;
                }
            }
        }));
    }

    fn disarm(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for TokioTimer {
    fn drop(&mut self) {
        self.disarm();
    }
}

struct ChannelScheduler {
    deferred: mpsc::UnboundedSender<DeferredTask>,
}

impl Scheduler for ChannelScheduler {
    fn post_deferred(&mut self, task: DeferredTask) {
        let _ = self.deferred.send(task);
    }
}

enum Command {
    Start(SyncConfig, oneshot::Sender<Result<(), ConfigError>>),
    Stop(oneshot::Sender<()>),
    SetOffset(i64, oneshot::Sender<()>),
    Offset(oneshot::Sender<i64>),
}

/// Result of [`SyncHandle::sync_once`].
#[derive(Clone, Debug, PartialEq)]
pub enum SyncOutcome {
    /// A server was selected and the clock corrected.
    Synced(SyncSuccess),
    /// No server produced a usable reply.
    Failed(SyncFailure),
}

/// Cloneable handle to a running sync service.
///
/// The service shuts down once every handle has been dropped.
#[derive(Clone, Debug)]
pub struct SyncHandle {
    commands: mpsc::Sender<Command>,
}

impl SyncHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, SyncError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(make(tx))
            .await
            .map_err(|_| SyncError::ServiceStopped)?;
        rx.await.map_err(|_| SyncError::ServiceStopped)
    }

    /// Replace the running session with `config`.
    pub async fn start(&self, config: SyncConfig) -> Result<(), SyncError> {
        self.request(|tx| Command::Start(config, tx)).await??;
        Ok(())
    }

    /// Cancel the running session.
    pub async fn stop(&self) -> Result<(), SyncError> {
        self.request(Command::Stop).await
    }

    /// Declare that the local clock reads `UTC + secs`.
    pub async fn set_offset(&self, secs: i64) -> Result<(), SyncError> {
        self.request(|tx| Command::SetOffset(secs, tx)).await
    }

    /// The local clock offset from UTC, after any due leap second.
    pub async fn offset(&self) -> Result<i64, SyncError> {
        self.request(Command::Offset).await
    }

    /// Run a single pass over the servers in `builder` and wait for it.
    ///
    /// Callbacks and the repeat flag already set on `builder` are replaced.
    pub async fn sync_once(&self, builder: SyncConfigBuilder) -> Result<SyncOutcome, SyncError> {
        let (tx, rx) = oneshot::channel();
        let slot = Arc::new(Mutex::new(Some(tx)));
        let on_error_slot = Arc::clone(&slot);
        let deliver = |slot: &Mutex<Option<oneshot::Sender<SyncOutcome>>>, outcome| {
            if let Some(tx) = slot.lock().ok().and_then(|mut s| s.take()) {
                let _ = tx.send(outcome);
            }
        };
        let config = builder
            .repeat(false)
            .on_success(move |s| deliver(&*slot, SyncOutcome::Synced(s.clone())))
            .on_error(move |f| deliver(&*on_error_slot, SyncOutcome::Failed(f.clone())))
            .build();
        self.start(config).await?;
        rx.await.map_err(|_| SyncError::ServiceStopped)
    }
}

/// Start a sync service on the current tokio runtime.
///
/// `clock` is the clock to discipline; pass a
/// [`SoftClock`](crate::clock::SoftClock) to keep corrections in-process or a
/// [`SystemClock`](crate::clock::SystemClock) to adjust the host.
///
/// # Panics
///
/// Panics if called outside a tokio runtime.
pub fn spawn(clock: Box<dyn ClockSource>, tuning: EngineTuning) -> SyncHandle {
    let (completion_tx, completion_rx) = mpsc::unbounded_channel();
    let (deferred_tx, deferred_rx) = mpsc::unbounded_channel();
    let (command_tx, command_rx) = mpsc::channel(16);

    let collaborators = Collaborators {
        resolver: Box::new(TokioResolver {
            completions: completion_tx.clone(),
        }),
        transport: Box::new(TokioTransport {
            completions: completion_tx.clone(),
            token: None,
            v4: None,
            v6: None,
        }),
        timer: Box::new(TokioTimer {
            completions: completion_tx,
            task: None,
        }),
        clock,
        scheduler: Box::new(ChannelScheduler {
            deferred: deferred_tx,
        }),
    };
    let engine = SyncEngine::new(collaborators, tuning);
    tokio::spawn(drive(engine, command_rx, completion_rx, deferred_rx));
    SyncHandle {
        commands: command_tx,
    }
}

async fn drive(
    mut engine: SyncEngine,
    mut commands: mpsc::Receiver<Command>,
    mut completions: mpsc::UnboundedReceiver<Completion>,
    mut deferred: mpsc::UnboundedReceiver<DeferredTask>,
) {
    debug!("sntp service started");
    loop {
        tokio::select! {
            biased;
            command = commands.recv() => match command {
                Some(Command::Start(config, reply)) => {
                    let _ = reply.send(engine.start_sync(config));
                }
                Some(Command::Stop(reply)) => {
                    engine.stop();
                    let _ = reply.send(());
                }
                Some(Command::SetOffset(secs, reply)) => {
                    engine.set_offset(secs);
                    let _ = reply.send(());
                }
                Some(Command::Offset(reply)) => {
                    let _ = reply.send(engine.offset());
                }
                None => break,
            },
            Some(task) = deferred.recv() => engine.run_deferred(task),
            Some(completion) = completions.recv() => engine.on_completion(completion),
        }
    }
    engine.stop();
    debug!("sntp service stopped");
}
