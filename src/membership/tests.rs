use std::net::SocketAddr;
use std::time::Duration;

use super::table::{MembershipTable, RegisterOutcome};
use super::types::AckState;
use crate::error::ProtocolError;

fn addr(port: u16) -> SocketAddr {
    format!("127.0.0.1:{port}").parse().unwrap()
}

fn register(table: &mut MembershipTable, rank: i64, port: u16) -> Result<RegisterOutcome, ProtocolError> {
    table.register(rank, addr(port), 4, "/home/alice/job".into(), "alice".into())
}

// ===== MEMBERSHIP TABLE TESTS =====

#[test]
fn slots_fill_exactly_once() {
    let mut table = MembershipTable::new(4);
    assert_eq!(register(&mut table, 1, 9001).unwrap(), RegisterOutcome::New);
    assert_eq!(register(&mut table, 2, 9002).unwrap(), RegisterOutcome::New);
    assert_eq!(table.registered_count(), 2);

    // Same source resends are idempotent and do not bump the count.
    assert_eq!(
        register(&mut table, 1, 9001).unwrap(),
        RegisterOutcome::AlreadyRegistered
    );
    assert_eq!(table.registered_count(), 2);
}

#[test]
fn register_from_different_source_is_rejected() {
    let mut table = MembershipTable::new(4);
    register(&mut table, 1, 9001).unwrap();
    let err = register(&mut table, 1, 9999).unwrap_err();
    assert!(matches!(err, ProtocolError::SourceMismatch { .. }));
    // The original claim is untouched.
    assert_eq!(table.get(1).unwrap().addr, addr(9001));
}

#[test]
fn register_rejects_out_of_range_ranks() {
    let mut table = MembershipTable::new(4);
    assert!(matches!(
        register(&mut table, 0, 9000),
        Err(ProtocolError::RankOutOfRange(0, 4))
    ));
    assert!(matches!(
        register(&mut table, 4, 9004),
        Err(ProtocolError::RankOutOfRange(4, 4))
    ));
    assert!(matches!(
        register(&mut table, -3, 9004),
        Err(ProtocolError::RankOutOfRange(-3, 4))
    ));
}

#[test]
fn mark_alive_verifies_the_source_address() {
    let mut table = MembershipTable::new(4);
    register(&mut table, 1, 9001).unwrap();
    assert!(table.mark_alive(1, addr(9001)).is_ok());
    assert!(matches!(
        table.mark_alive(1, addr(6666)),
        Err(ProtocolError::SourceMismatch { .. })
    ));
    assert!(matches!(
        table.mark_alive(2, addr(9002)),
        Err(ProtocolError::NotRegistered(2))
    ));
}

#[test]
fn stale_ranks_respects_the_timeout() {
    let mut table = MembershipTable::new(3);
    register(&mut table, 1, 9001).unwrap();
    register(&mut table, 2, 9002).unwrap();
    // Freshly registered members are never stale under a sane timeout.
    assert!(table.stale_ranks(Duration::from_secs(300)).is_empty());
    // A zero timeout makes everyone stale.
    std::thread::sleep(Duration::from_millis(5));
    let stale = table.stale_ranks(Duration::ZERO);
    assert_eq!(stale, vec![1, 2]);
}

#[test]
fn missing_ranks_excludes_the_coordinator_slot() {
    let mut table = MembershipTable::new(4);
    register(&mut table, 2, 9002).unwrap();
    assert_eq!(table.missing_ranks(), vec![1, 3]);
}

#[test]
fn duplicate_hosts_keep_the_first_claim_unique() {
    let mut table = MembershipTable::new(4);
    // Ranks 1 and 2 share a host; rank 3 is alone.
    table
        .register(1, "10.0.0.5:9001".parse().unwrap(), 4, "/w".into(), "u".into())
        .unwrap();
    table
        .register(2, "10.0.0.5:9002".parse().unwrap(), 4, "/w".into(), "u".into())
        .unwrap();
    table
        .register(3, "10.0.0.6:9003".parse().unwrap(), 4, "/w".into(), "u".into())
        .unwrap();

    let marked = table.mark_duplicate_hosts("10.0.0.1".parse().unwrap());
    assert_eq!(marked, 1);
    assert!(table.get(1).unwrap().unique);
    assert!(!table.get(2).unwrap().unique);
    assert!(table.get(3).unwrap().unique);
}

#[test]
fn members_on_the_coordinator_host_are_never_unique() {
    let mut table = MembershipTable::new(2);
    table
        .register(1, "10.0.0.1:9001".parse().unwrap(), 4, "/w".into(), "u".into())
        .unwrap();
    let marked = table.mark_duplicate_hosts("10.0.0.1".parse().unwrap());
    assert_eq!(marked, 1);
    assert!(!table.get(1).unwrap().unique);
}

// ===== ACK STATE TESTS =====

#[test]
fn ack_slot_records_and_clears() {
    let mut ack = AckState::default();
    assert!(!ack.matches(0));
    ack.record(3);
    assert!(ack.matches(3));
    assert!(!ack.matches(0));
    ack.clear();
    assert!(!ack.matches(3));
}

#[test]
fn ack_slot_is_last_write_wins() {
    let mut ack = AckState::default();
    ack.record(1);
    ack.record(2);
    assert!(ack.matches(2));
    assert!(!ack.matches(1));
}
