// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Synchronization requests and engine tunables.
//!
//! A [`SyncConfig`] describes one synchronization session: the servers to
//! query, whether to repeat, and the callbacks to fire. It is handed to
//! [`SyncEngine::start_sync`](crate::engine::SyncEngine::start_sync) as a
//! whole and replaces any previous session; nothing is merged.
//!
//! ```
//! use sntp_client::config::SyncConfig;
//!
//! let config = SyncConfig::builder()
//!     .server("0.pool.ntp.org")
//!     .server("1.pool.ntp.org")
//!     .repeat(true)
//!     .on_success(|s| println!("offset {:?} from {}", s.offset, s.server.hostname))
//!     .on_error(|e| eprintln!("sync failed: {}", e.kind))
//!     .build();
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use sntp_proto::protocol::PORT;
use sntp_proto::timestamp::micros_to_fixed;

use crate::engine::{SyncFailure, SyncSuccess};
use crate::error::ConfigError;

/// Maximum number of servers in one session.
pub const MAX_SERVERS: usize = 32;

/// Maximum hostname length in characters.
pub const MAX_HOSTNAME_LEN: usize = 128;

/// Public pool used by [`SyncConfig::with_default_servers`].
pub const DEFAULT_SERVERS: [&str; 4] = [
    "0.nodemcu.pool.ntp.org",
    "1.nodemcu.pool.ntp.org",
    "2.nodemcu.pool.ntp.org",
    "3.nodemcu.pool.ntp.org",
];

/// Callback fired after a pass that selected a server.
pub type SuccessCallback = Box<dyn FnMut(&SyncSuccess) + Send>;

/// Callback fired after a pass in which no server replied.
pub type ErrorCallback = Box<dyn FnMut(&SyncFailure) + Send>;

/// One synchronization session.
pub struct SyncConfig {
    pub(crate) servers: Vec<String>,
    pub(crate) repeat: bool,
    pub(crate) on_success: Option<SuccessCallback>,
    pub(crate) on_error: Option<ErrorCallback>,
}

impl SyncConfig {
    /// Create a builder with an empty server list.
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::new()
    }

    /// Create a builder pre-populated with [`DEFAULT_SERVERS`].
    pub fn with_default_servers() -> SyncConfigBuilder {
        SyncConfigBuilder::new().servers(DEFAULT_SERVERS)
    }

    /// The configured server hostnames, in query order.
    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    /// Whether a new pass is scheduled after each completed pass.
    pub fn repeat(&self) -> bool {
        self.repeat
    }

    /// Check the server list without touching any engine state.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.servers.is_empty() {
            return Err(ConfigError::NoServers);
        }
        if self.servers.len() > MAX_SERVERS {
            return Err(ConfigError::TooManyServers {
                count: self.servers.len(),
                max: MAX_SERVERS,
            });
        }
        for (index, host) in self.servers.iter().enumerate() {
            if host.is_empty() {
                return Err(ConfigError::EmptyHostname { index });
            }
            let len = host.chars().count();
            if len > MAX_HOSTNAME_LEN {
                return Err(ConfigError::HostnameTooLong {
                    index,
                    len,
                    max: MAX_HOSTNAME_LEN,
                });
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncConfig")
            .field("servers", &self.servers)
            .field("repeat", &self.repeat)
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Builder for [`SyncConfig`].
pub struct SyncConfigBuilder {
    servers: Vec<String>,
    repeat: bool,
    on_success: Option<SuccessCallback>,
    on_error: Option<ErrorCallback>,
}

impl SyncConfigBuilder {
    fn new() -> Self {
        SyncConfigBuilder {
            servers: Vec::new(),
            repeat: false,
            on_success: None,
            on_error: None,
        }
    }

    /// Append a server hostname (or IP literal, without port).
    pub fn server(mut self, host: impl Into<String>) -> Self {
        self.servers.push(host.into());
        self
    }

    /// Append several server hostnames.
    pub fn servers<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.servers.extend(hosts.into_iter().map(Into::into));
        self
    }

    /// Repeat synchronization on the engine's repeat interval (default: off).
    pub fn repeat(mut self, enabled: bool) -> Self {
        self.repeat = enabled;
        self
    }

    /// Callback for each pass that selected a server.
    pub fn on_success(mut self, f: impl FnMut(&SyncSuccess) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(f));
        self
    }

    /// Callback for each pass in which no server produced an accepted reply.
    pub fn on_error(mut self, f: impl FnMut(&SyncFailure) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Finish the configuration. Validation happens in `start_sync`.
    pub fn build(self) -> SyncConfig {
        SyncConfig {
            servers: self.servers,
            repeat: self.repeat,
            on_success: self.on_success,
            on_error: self.on_error,
        }
    }
}

/// Engine constants. The defaults suit public pool servers.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EngineTuning {
    /// How long to wait for one reply before retrying (default 1 s).
    pub attempt_timeout: Duration,
    /// Delay between passes when repeating (default 1000 s).
    pub repeat_interval: Duration,
    /// Retry period when the transport cannot be opened (default 30 s).
    pub backoff_interval: Duration,
    /// Attempts per server per pass (default 5).
    pub max_attempts: u8,
    /// Destination UDP port (default 123).
    pub port: u16,
    /// Offsets strictly inside `±pll_window` are slewed, others stepped.
    /// 32.32 fixed point (default 200 ms).
    pub pll_window: i64,
    /// Proportional gain applied as `(delta * a) >> 32` (default 2^21).
    pub pll_gain_a: i64,
    /// Integral gain applied as `(delta * b) >> 32` (default 2^19).
    pub pll_gain_b: i64,
}

impl Default for EngineTuning {
    fn default() -> Self {
        EngineTuning {
            attempt_timeout: Duration::from_secs(1),
            repeat_interval: Duration::from_secs(1000),
            backoff_interval: Duration::from_secs(30),
            max_attempts: 5,
            port: PORT,
            pll_window: micros_to_fixed(200_000),
            pll_gain_a: 1 << 21,
            pll_gain_b: 1 << 19,
        }
    }
}
