// SPDX-License-Identifier: Apache-2.0

//! End-to-end tests for the single-slot channel.
//!
//! Each test drives both halves of a channel pair from one process
//! (cross-wired names, separate threads where ordering matters), which
//! exercises the same named OS resources two processes would share.
//! Resource names are unique per test so parallel test runs never
//! collide, and every name is unlinked on drop.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use shmslot::{
    ChannelConfig, ChannelError, ConnectConfig, ResetMode, SharedSlotChannel, SignalConfig,
    SlotPayload,
};

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

fn unique(tag: &str) -> String {
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    format!(
        "it_{}_{}_{}",
        tag,
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

/// Fast retry policy for tests.
fn quick_connect() -> ConnectConfig {
    ConnectConfig {
        timeout: Duration::from_secs(5),
        retry_interval: Duration::from_millis(10),
    }
}

/// Producer/consumer pair with cross-wired names, both connected.
fn connected_pair<T: SlotPayload>(
    tag: &str,
) -> (SharedSlotChannel<T>, SharedSlotChannel<T>) {
    connected_pair_with_config(tag, ChannelConfig::default())
}

fn connected_pair_with_config<T: SlotPayload>(
    tag: &str,
    config: ChannelConfig,
) -> (SharedSlotChannel<T>, SharedSlotChannel<T>) {
    let a_name = unique(&format!("{}_a", tag));
    let b_name = unique(&format!("{}_b", tag));

    let mut a = SharedSlotChannel::<T>::with_config(&a_name, &b_name, config).unwrap();
    let mut b = SharedSlotChannel::<T>::with_config(&b_name, &a_name, config).unwrap();

    assert!(a.try_connect(quick_connect()).unwrap());
    assert!(b.try_connect(quick_connect()).unwrap());
    (a, b)
}

/// A control/state snapshot, the kind of payload the channel targets.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
struct Snapshot {
    sequence: u64,
    position: [f64; 3],
    mode: u32,
    armed: bool,
}

// SAFETY: all fields are plain fixed-size values, repr(C) layout.
unsafe impl SlotPayload for Snapshot {}

#[test]
fn test_round_trip_bit_for_bit() {
    init_tracing();
    let (mut producer, consumer) = connected_pair::<Snapshot>("roundtrip");

    let sent = Snapshot {
        sequence: 0x0123_4567_89AB_CDEF,
        position: [1.5, -2.25, f64::MIN_POSITIVE],
        mode: u32::MAX,
        armed: true,
    };
    producer.send(&sent).unwrap();

    let received = consumer.receive(Duration::from_secs(1)).unwrap();
    assert_eq!(received, sent);
}

#[test]
fn test_last_write_wins() {
    init_tracing();
    let (mut producer, consumer) = connected_pair::<u64>("lww");

    producer.send(&1).unwrap();
    producer.send(&2).unwrap();

    // The slot holds only the most recent value.
    assert_eq!(consumer.receive(Duration::from_secs(1)).unwrap(), 2);
}

#[test]
fn test_signal_collapse() {
    init_tracing();
    let (mut producer, consumer) = connected_pair::<u64>("collapse");

    producer.send(&10).unwrap();
    producer.send(&11).unwrap();

    // Two sends, one pending notification.
    assert_eq!(consumer.receive(Duration::from_secs(1)).unwrap(), 11);
    assert!(matches!(
        consumer.receive(Duration::from_millis(100)),
        Err(ChannelError::ReceiveTimeout)
    ));
}

#[test]
fn test_connect_timeout_is_not_an_error() {
    init_tracing();
    let name = unique("cto");
    let mut channel = SharedSlotChannel::<u32>::new(&name, "no-such-peer-anywhere").unwrap();

    let config = ConnectConfig {
        timeout: Duration::from_millis(500),
        retry_interval: Duration::from_millis(50),
    };

    let start = Instant::now();
    let connected = channel.try_connect(config).unwrap();
    let elapsed = start.elapsed();

    assert!(!connected);
    assert!(!channel.is_connected());
    // Budget of 500 ms, plus or minus one retry interval.
    assert!(elapsed >= Duration::from_millis(450), "returned too early: {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(900), "returned too late: {:?}", elapsed);
}

#[test]
fn test_connect_succeeds_once_peer_appears() {
    init_tracing();
    let a_name = unique("late_a");
    let b_name = unique("late_b");

    let (peer_up_tx, peer_up_rx) = mpsc::channel::<()>();
    let (done_tx, done_rx) = mpsc::channel::<()>();

    let peer_name = a_name.clone();
    let own_name = b_name.clone();
    let peer = thread::spawn(move || {
        // Peer comes up late, after the connect loop has started.
        thread::sleep(Duration::from_millis(200));
        let _channel = SharedSlotChannel::<u32>::new(&own_name, &peer_name).unwrap();
        peer_up_tx.send(()).unwrap();
        // Hold the resources until the main thread has connected.
        done_rx.recv().unwrap();
    });

    let mut channel = SharedSlotChannel::<u32>::new(&a_name, &b_name).unwrap();
    let start = Instant::now();
    let connected = channel
        .try_connect(ConnectConfig {
            timeout: Duration::from_secs(5),
            retry_interval: Duration::from_millis(20),
        })
        .unwrap();
    let elapsed = start.elapsed();

    assert!(connected);
    assert!(channel.is_connected());
    peer_up_rx.recv().unwrap();
    // The loop must have actually waited for the peer.
    assert!(elapsed >= Duration::from_millis(150), "connected too early: {:?}", elapsed);

    done_tx.send(()).unwrap();
    peer.join().unwrap();
}

#[test]
fn test_connect_is_idempotent_after_success() {
    init_tracing();
    let (mut producer, _consumer) = connected_pair::<u64>("idem");
    assert!(producer.try_connect(quick_connect()).unwrap());
}

#[test]
fn test_invalid_name_leaves_no_resources() {
    init_tracing();
    let result = SharedSlotChannel::<u64>::new("no spaces allowed", "peer");
    assert!(matches!(
        result,
        Err(ChannelError::InvalidConfig { field: "channel_name", .. })
    ));

    // Nothing of the derived names may exist on the host. The kernel
    // exposes POSIX shm objects and named semaphores under /dev/shm.
    assert!(!Path::new("/dev/shm/slot_seg_no spaces allowed").exists());
    assert!(!Path::new("/dev/shm/sem.slot_sig_no spaces allowed").exists());
}

#[test]
fn test_zero_sized_payload_rejected_before_provisioning() {
    init_tracing();

    #[derive(Clone, Copy)]
    struct Empty;
    // SAFETY: no fields, no indirection.
    unsafe impl SlotPayload for Empty {}

    let name = unique("zst");
    let result = SharedSlotChannel::<Empty>::new(&name, "peer");
    assert!(matches!(
        result,
        Err(ChannelError::InvalidConfig { field: "payload", .. })
    ));

    // Rejected before any OS resource was created.
    assert!(!Path::new(&format!("/dev/shm/slot_seg_{}", name)).exists());
    assert!(!Path::new(&format!("/dev/shm/sem.slot_sig_{}", name)).exists());
}

#[test]
fn test_outbound_conflict_between_channels() {
    init_tracing();
    let name = unique("conflict");
    let _first = SharedSlotChannel::<u64>::new(&name, "peer-x").unwrap();
    assert!(matches!(
        SharedSlotChannel::<u64>::new(&name, "peer-y"),
        Err(ChannelError::Conflict { .. })
    ));
}

#[test]
fn test_drop_unlinks_named_resources() {
    init_tracing();
    let name = unique("teardown");
    let seg_path = format!("/dev/shm/slot_seg_{}", name);
    let sig_path = format!("/dev/shm/sem.slot_sig_{}", name);

    {
        let _channel = SharedSlotChannel::<u64>::new(&name, "peer").unwrap();
        assert!(Path::new(&seg_path).exists());
        assert!(Path::new(&sig_path).exists());
    }

    assert!(!Path::new(&seg_path).exists());
    assert!(!Path::new(&sig_path).exists());
}

#[test]
fn test_reprovision_allows_fresh_consumer() {
    init_tracing();
    let a_name = unique("reprov_a");
    let b_name = unique("reprov_b");

    let mut producer = SharedSlotChannel::<u64>::new(&a_name, &b_name).unwrap();
    producer.send(&1).unwrap();

    // Replace the outbound pair under the same name.
    producer.provision_outbound().unwrap();
    producer.send(&2).unwrap();

    let mut consumer = SharedSlotChannel::<u64>::new(&b_name, &a_name).unwrap();
    assert!(consumer.try_connect(quick_connect()).unwrap());
    producer.send(&3).unwrap();
    assert_eq!(consumer.receive(Duration::from_secs(1)).unwrap(), 3);
}

#[test]
fn test_receive_timeout_skips_stale_read() {
    init_tracing();
    let (mut producer, consumer) = connected_pair::<u64>("stale");

    producer.send(&99).unwrap();
    assert_eq!(consumer.receive(Duration::from_secs(1)).unwrap(), 99);

    // The slot still physically holds 99, but a timed-out wait must not
    // hand it back.
    assert!(matches!(
        consumer.receive(Duration::from_millis(100)),
        Err(ChannelError::ReceiveTimeout)
    ));
}

#[test]
fn test_blocking_receive_wakes_on_send() {
    init_tracing();
    let (producer, consumer) = connected_pair::<u64>("wake");

    let receiver = thread::spawn(move || consumer.receive(Duration::from_secs(5)));

    thread::sleep(Duration::from_millis(100));
    let mut producer = producer;
    producer.send(&7).unwrap();

    assert_eq!(receiver.join().unwrap().unwrap(), 7);
}

#[test]
fn test_manual_reset_signal() {
    init_tracing();
    let config = ChannelConfig {
        signal: SignalConfig {
            initially_set: false,
            reset_mode: ResetMode::Manual,
        },
    };
    let (mut producer, consumer) = connected_pair_with_config::<u64>("manual", config);

    producer.send(&5).unwrap();

    // Manual reset: the signal stays set across waits.
    assert_eq!(consumer.receive(Duration::from_millis(500)).unwrap(), 5);
    assert_eq!(consumer.receive(Duration::from_millis(500)).unwrap(), 5);

    consumer.reset_inbound().unwrap();
    assert!(matches!(
        consumer.receive(Duration::from_millis(100)),
        Err(ChannelError::ReceiveTimeout)
    ));
}

#[test]
fn test_duplex_exchange() {
    init_tracing();
    let (mut a, mut b) = connected_pair::<u64>("duplex");

    a.send(&100).unwrap();
    assert_eq!(b.receive(Duration::from_secs(1)).unwrap(), 100);

    b.send(&200).unwrap();
    assert_eq!(a.receive(Duration::from_secs(1)).unwrap(), 200);
}
