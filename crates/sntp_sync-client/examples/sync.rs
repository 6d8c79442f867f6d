// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Synchronize an in-process clock against a list of SNTP servers.
//!
//! Run with: `RUST_LOG=debug cargo run --example sync --features tokio -- [servers...]`
//!
//! With no arguments the public NodeMCU pool is used. The correction is
//! applied to a `SoftClock`, so no privileges are needed.

use sntp_client::clock::SoftClock;
use sntp_client::config::{EngineTuning, SyncConfig};
use sntp_client::estimate::Offset;
use sntp_client::service::{self, SyncOutcome};

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let servers: Vec<String> = std::env::args().skip(1).collect();
    let builder = if servers.is_empty() {
        SyncConfig::with_default_servers()
    } else {
        SyncConfig::builder().servers(servers)
    };

    let handle = service::spawn(Box::new(SoftClock::from_system()), EngineTuning::default());
    println!("Querying servers...\n");

    match handle.sync_once(builder).await? {
        SyncOutcome::Synced(s) => {
            let (secs, micros) = s.unix_time();
            println!("server:      {} ({})", s.server.hostname, s.server.address);
            println!("time:        {}.{:06}", secs, micros);
            match s.offset {
                Offset::Seconds(secs) => println!("offset:      {} s", secs),
                Offset::Micros(us) => println!("offset:      {} us", us),
            }
            if let Some(delay) = s.delay_us {
                println!("delay:       {} us", delay);
            }
            println!("root delay:  {} us", s.root_delay_us);
            println!("max error:   {} us", s.root_max_error_us);
            println!("stratum:     {}", s.stratum);
            println!("adjustment:  {:?}", s.adjustment);
        }
        SyncOutcome::Failed(f) => {
            println!("sync failed: {} (code {})", f.kind, f.kind.code());
        }
    }
    Ok(())
}
