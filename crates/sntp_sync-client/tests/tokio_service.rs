// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

use sntp_client::NtpTimestamp;
use sntp_client::clock::SoftClock;
use sntp_client::config::{EngineTuning, SyncConfig};
use sntp_client::error::{ConfigError, ErrorKind, SyncError};
use sntp_client::estimate::Offset;
use sntp_client::protocol::{
    FromBytes, LeapIndicator, Mode, Packet, ReferenceIdentifier, ShortFormat, Stratum, ToBytes,
    Version,
};
use sntp_client::service::{self, SyncOutcome};
use tokio::net::UdpSocket;

/// Answer every request on `sock` with the current system time.
async fn serve(sock: UdpSocket) {
    let mut buf = [0u8; 128];
    loop {
        let Ok((len, peer)) = sock.recv_from(&mut buf).await else {
            return;
        };
        let Ok((request, _)) = Packet::from_bytes(&buf[..len]) else {
            continue;
        };
        let now = NtpTimestamp::now();
        let reply = Packet {
            leap_indicator: LeapIndicator::NoWarning,
            version: Version::V4,
            mode: Mode::Server,
            stratum: Stratum(2),
            poll: 6,
            precision: -20,
            root_delay: ShortFormat::from_bits(0x0000_0100),
            root_dispersion: ShortFormat::from_bits(0x0000_0200),
            reference_id: ReferenceIdentifier(*b"LOCL"),
            reference_timestamp: now.into(),
            origin_timestamp: request.transmit_timestamp,
            receive_timestamp: now.into(),
            transmit_timestamp: now.into(),
        };
        let mut out = [0u8; 48];
        reply.to_bytes(&mut out).unwrap();
        let _ = sock.send_to(&out, peer).await;
    }
}

async fn fake_server() -> u16 {
    let sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = sock.local_addr().unwrap().port();
    tokio::spawn(serve(sock));
    port
}

fn tuning(port: u16) -> EngineTuning {
    EngineTuning {
        port,
        attempt_timeout: Duration::from_millis(200),
        ..EngineTuning::default()
    }
}

#[tokio::test]
async fn test_sync_against_loopback_server() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let port = fake_server().await;
    let handle = service::spawn(Box::new(SoftClock::from_system()), tuning(port));
    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        handle.sync_once(SyncConfig::builder().server("127.0.0.1")),
    )
    .await
    .expect("sync timed out")
    .unwrap();

    let SyncOutcome::Synced(s) = outcome else {
        panic!("expected success, got {outcome:?}");
    };
    assert_eq!(s.server.hostname, "127.0.0.1");
    assert_eq!(s.server.address, "127.0.0.1".parse::<std::net::IpAddr>().unwrap());
    assert_eq!(s.stratum, 2);
    match s.offset {
        Offset::Micros(us) => assert!(us.abs() < 500_000, "offset {us}us"),
        other => panic!("unexpected offset {other:?}"),
    }
    assert_eq!(s.root_delay_us, (0x100u64 * 1_000_000) >> 16);
}

#[tokio::test]
async fn test_silent_server_reports_timeout() {
    // Bound but never answers.
    let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let port = silent.local_addr().unwrap().port();
    let tuning = EngineTuning {
        attempt_timeout: Duration::from_millis(20),
        max_attempts: 2,
        ..tuning(port)
    };
    let handle = service::spawn(Box::new(SoftClock::from_system()), tuning);
    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        handle.sync_once(SyncConfig::builder().server("127.0.0.1")),
    )
    .await
    .expect("sync timed out")
    .unwrap();

    match outcome {
        SyncOutcome::Failed(f) => {
            assert_eq!(f.kind, ErrorKind::Timeout);
            assert_eq!(f.server, None);
        }
        other => panic!("expected failure, got {other:?}"),
    }
    drop(silent);
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let handle = service::spawn(Box::new(SoftClock::from_system()), EngineTuning::default());
    let err = handle.start(SyncConfig::builder().build()).await.unwrap_err();
    assert!(matches!(err, SyncError::Config(ConfigError::NoServers)));
}

#[tokio::test]
async fn test_offset_roundtrip_and_stop() {
    let handle = service::spawn(Box::new(SoftClock::from_system()), EngineTuning::default());
    assert_eq!(handle.offset().await.unwrap(), 0);
    handle.set_offset(37).await.unwrap();
    assert_eq!(handle.offset().await.unwrap(), 37);
    handle.stop().await.unwrap();

    let clone = handle.clone();
    drop(handle);
    assert_eq!(clone.offset().await.unwrap(), 37);
}
