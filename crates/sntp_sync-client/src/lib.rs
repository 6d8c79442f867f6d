// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

/*!
SNTP client synchronization engine.

The engine queries a list of servers in turn, keeps the reply with the best
delay metric, and disciplines a local clock with it: small offsets adjust the
clock frequency through a proportional-integral loop, large ones step the
clock. It can repeat on an interval, honours Kiss-of-Death replies, and
applies leap seconds to a caller-declared UTC offset.

The core [`SyncEngine`](engine::SyncEngine) performs no I/O of its own. It
talks to a resolver, a datagram transport, a timer, a clock and a deferred
work queue through the traits in [`platform`], so it can be driven by any
event loop. The `tokio` feature provides a ready-made driver in
[`service`].

# Example

```rust,no_run
# #[cfg(feature = "tokio")]
# async fn run() -> Result<(), sntp_client::error::SyncError> {
use sntp_client::clock::SoftClock;
use sntp_client::config::{EngineTuning, SyncConfig};

let handle = sntp_client::service::spawn(Box::new(SoftClock::from_system()), EngineTuning::default());
handle
    .start(
        SyncConfig::with_default_servers()
            .repeat(true)
            .on_success(|s| println!("{:?} via {}", s.offset, s.server.hostname))
            .build(),
    )
    .await?;
# Ok(())
# }
```

# Feature Flags

| Feature | Default | Description |
|---------|---------|-------------|
| `tokio` | no | Tokio resolver, UDP transport, timer and driver task (`service`). |
| `clock` | no | Step and slew the host clock in `SystemClock` (Linux, `libc`). |
| `ipv4` | no | Do not prefer IPv6 addresses when a hostname resolves to both. |
*/

#![warn(missing_docs)]

// Re-export protocol types from sntp_proto for convenience.
pub use sntp_proto::{NtpTimestamp, codec, protocol, timestamp};

/// Local clock sources: an in-process soft clock and the host clock.
pub mod clock;

/// Session configuration and engine tunables.
pub mod config;

/// Frequency/step discipline and leap-second staging.
pub mod discipline;

/// The synchronization state machine.
pub mod engine;

/// Error types.
pub mod error;

/// Offset and delay from one exchange.
pub mod estimate;

/// Per-pass state.
pub mod pass;

/// Collaborator traits and the messages exchanged with them.
pub mod platform;

/// Best-server selection.
pub mod selection;

/// Tokio driver for the engine.
#[cfg(feature = "tokio")]
pub mod service;

pub use config::{EngineTuning, SyncConfig};
pub use engine::{SyncEngine, SyncFailure, SyncSuccess};
pub use error::{ConfigError, ErrorKind, SyncError};
