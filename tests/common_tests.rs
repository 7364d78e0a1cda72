//! Integration tests for shared types, event queues, memory timing and
//! statistics.

use socbus::common::{Command, ResponseStatus, SimTime, Transaction, TransactionPool};
use socbus::sim::PayloadEventQueue;
use socbus::soc::devices::{AccessTiming, FixedLatency, RowBufferLatency};
use socbus::stats::BusStats;

/// Tests time construction, arithmetic and formatting.
#[test]
fn test_sim_time() {
    let clock = SimTime::from_ns(10);
    assert_eq!(clock.as_ps(), 10_000);
    assert_eq!((clock * 3 + SimTime::RESOLUTION).cycles(clock), 3);
    assert_eq!(SimTime::ZERO.saturating_sub(clock), SimTime::ZERO);
    assert_eq!(clock - SimTime::from_ps(1), SimTime::from_ps(9_999));
    assert_eq!(clock.to_string(), "10 ns");
    assert_eq!(SimTime::from_ps(10_001).to_string(), "10001 ps");
    assert_eq!(clock.cycles(SimTime::ZERO), 0);
}

/// Tests that addition and scaling saturate instead of overflowing.
#[test]
fn test_sim_time_saturates() {
    let clock = SimTime::from_ns(10);
    assert_eq!(clock * u64::MAX, SimTime::MAX);
    assert_eq!(SimTime::MAX + clock, SimTime::MAX);
    let mut t = SimTime::MAX - clock;
    t += clock * 2;
    assert_eq!(t, SimTime::MAX);
    assert_eq!((clock * 3).as_ps(), 30_000);
}

/// Tests transaction constructors.
#[test]
fn test_transaction_constructors() {
    let read = Transaction::read(0x100, 8);
    assert_eq!(read.command, Command::Read);
    assert_eq!(read.len(), 8);
    assert_eq!(read.response, ResponseStatus::Incomplete);
    assert!(!read.lock);

    let write = Transaction::write(0x200, &[1, 2]).locked(true);
    assert!(write.is_write());
    assert_eq!(write.data, vec![1, 2]);
    assert!(write.lock);
    assert_eq!(write.master_id, None);
}

/// Tests reference counting in the transaction pool.
#[test]
fn test_pool_reference_counting() {
    let mut pool = TransactionPool::new();
    let id = pool.alloc(Transaction::read(0, 4));
    assert_eq!(pool.ref_count(id), 1);
    assert!(pool.acquire(id));
    assert_eq!(pool.ref_count(id), 2);

    assert!(pool.release(id).is_none());
    assert_eq!(pool.live(), 1);
    let last = pool.release(id).expect("last reference returns the transaction");
    assert_eq!(last.address, 0);
    assert_eq!(pool.live(), 0);
    assert_eq!(pool.ref_count(id), 0);
}

/// Tests that a recycled slot does not alias a stale handle.
#[test]
fn test_pool_stale_handle() {
    let mut pool = TransactionPool::new();
    let old = pool.alloc(Transaction::read(0x10, 4));
    pool.release(old);

    let new = pool.alloc(Transaction::read(0x20, 4));
    assert_ne!(old, new);
    assert!(pool.get(old).is_none());
    assert!(!pool.acquire(old));
    assert!(pool.release(old).is_none());
    assert_eq!(pool.get(new).map(|tx| tx.address), Some(0x20));
}

/// Tests due-time ordering and FIFO order within one instant.
#[test]
fn test_event_queue_ordering() {
    let mut peq = PayloadEventQueue::new("test");
    let t = SimTime::from_ns(5);
    peq.notify("late", SimTime::ZERO, t * 2);
    peq.notify("first", SimTime::ZERO, t);
    peq.notify("second", SimTime::ZERO, t);

    assert_eq!(peq.name(), "test");
    assert_eq!(peq.len(), 3);
    assert_eq!(peq.next_due(), Some(t));
    assert_eq!(peq.pop_due(SimTime::ZERO), None);
    assert_eq!(peq.pop_due(t), Some("first"));
    assert_eq!(peq.pop_due(t), Some("second"));
    assert_eq!(peq.pop_due(t), None);
    assert_eq!(peq.pop_due(t * 3), Some("late"));
    assert!(peq.is_empty());
}

/// Tests the fixed latency model.
#[test]
fn test_fixed_latency() {
    let mut timing = FixedLatency::new(3);
    assert_eq!(timing.access_latency(0), 3);
    assert_eq!(timing.access_latency(0xFFFF_0000), 3);
}

/// Tests row hits, row misses and the first activation.
#[test]
fn test_row_buffer_latency() {
    let mut timing = RowBufferLatency::new(2, 3, 4, 11);
    assert_eq!(timing.access_latency(0x0000), 3 + 2);
    assert_eq!(timing.access_latency(0x0100), 2);
    assert_eq!(timing.access_latency(0x0800), 4 + 3 + 2);
    assert_eq!(timing.access_latency(0x0804), 2);
}

/// Tests statistics accounting and derived figures.
#[test]
fn test_bus_stats() {
    let mut stats = BusStats::default();
    stats.record_transfer(&Transaction::read(0, 8));
    stats.record_transfer(&Transaction::write(0, &[1, 2]));
    stats.record_response(ResponseStatus::Ok);
    stats.record_response(ResponseStatus::AddressError);
    stats.record_wait(1, SimTime::from_ps(100));
    stats.record_wait(0, SimTime::from_ps(300));
    stats.record_wait(1, SimTime::from_ps(200));
    stats.cycles = 10;
    stats.idle_cycles = 4;

    assert_eq!((stats.reads, stats.writes), (1, 1));
    assert_eq!((stats.bytes_read, stats.bytes_written), (8, 2));
    assert_eq!((stats.completed_ok, stats.address_errors), (1, 1));
    assert_eq!(stats.max_wait_ps, 300);
    assert_eq!(stats.max_wait_master, Some(0));
    assert_eq!(stats.average_wait_ps(), 200.0);
    assert!((stats.utilization() - 0.6).abs() < 1e-9);

    let json = stats.to_json().expect("json");
    assert!(json.contains("\"max_wait_master\": 0"));
    assert_eq!(BusStats::default().utilization(), 0.0);
}
