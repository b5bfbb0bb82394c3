use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;

use super::handlers::dispatch;
use crate::context::testing;

async fn peer() -> (UdpSocket, SocketAddr) {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    (socket, addr)
}

async fn recv_text(socket: &UdpSocket) -> String {
    let mut buf = [0u8; 1024];
    let (n, _) = tokio::time::timeout(Duration::from_secs(2), socket.recv_from(&mut buf))
        .await
        .expect("timed out waiting for a reply")
        .unwrap();
    String::from_utf8_lossy(&buf[..n]).into_owned()
}

async fn assert_no_reply(socket: &UdpSocket) {
    let mut buf = [0u8; 1024];
    let outcome =
        tokio::time::timeout(Duration::from_millis(200), socket.recv_from(&mut buf)).await;
    assert!(outcome.is_err(), "expected silence, got a datagram");
}

// ===== DISPATCH TESTS =====

#[tokio::test]
async fn query_is_always_acked_with_own_rank() {
    let ctx = testing::context(0, 2).await;
    let (socket, addr) = peer().await;
    dispatch(ctx, b"1".to_vec(), addr).await;
    assert_eq!(recv_text(&socket).await, "2:0");
}

#[tokio::test]
async fn malformed_datagrams_are_dropped_silently() {
    let ctx = testing::context(0, 2).await;
    let (socket, addr) = peer().await;
    dispatch(ctx.clone(), b"banana".to_vec(), addr).await;
    dispatch(ctx.clone(), b"97:1".to_vec(), addr).await;
    dispatch(ctx, Vec::new(), addr).await;
    assert_no_reply(&socket).await;
}

#[tokio::test]
async fn oversized_datagrams_are_dropped_without_acting_on_the_prefix() {
    let ctx = testing::context(1, 2).await;
    let (socket, addr) = peer().await;
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("workdir");
    std::fs::create_dir(&source).unwrap();
    let dest = dir.path().join("shared");

    // The full frame is over the wire limit; its prefix alone would be a
    // valid CREATE_LINK pointing the symlink at a wrong, shorter path.
    let frame = format!("5:{}:{}{}", source.display(), dest.display(), "x".repeat(1200));
    assert!(frame.len() > crate::net::codec::MAX_DATAGRAM);
    dispatch(ctx.clone(), frame.into_bytes(), addr).await;

    assert_no_reply(&socket).await;
    assert!(!dest.exists());
    assert!(ctx.state().symlinks.is_empty());
}

// ===== REGISTER TESTS =====

#[tokio::test]
async fn register_fills_the_slot_and_acks() {
    let ctx = testing::context(0, 3).await;
    let (socket, addr) = peer().await;
    dispatch(ctx.clone(), b"4:1:/home/alice/job:8:alice".to_vec(), addr).await;
    assert_eq!(recv_text(&socket).await, "2:0");

    let state = ctx.state();
    let member = state.members.get(1).expect("slot 1 filled");
    assert_eq!(member.addr, addr);
    assert_eq!(member.cpus, 8);
    assert_eq!(member.iwd, "/home/alice/job");
    assert_eq!(member.user, "alice");
}

#[tokio::test]
async fn reregistration_from_the_same_source_is_reacked() {
    let ctx = testing::context(0, 3).await;
    let (socket, addr) = peer().await;
    dispatch(ctx.clone(), b"4:1:/home/alice/job:8:alice".to_vec(), addr).await;
    assert_eq!(recv_text(&socket).await, "2:0");
    dispatch(ctx.clone(), b"4:1:/home/alice/job:8:alice".to_vec(), addr).await;
    assert_eq!(recv_text(&socket).await, "2:0");
    assert_eq!(ctx.state().members.registered_count(), 1);
}

#[tokio::test]
async fn register_from_a_different_source_gets_no_reply() {
    let ctx = testing::context(0, 3).await;
    let (first, first_addr) = peer().await;
    let (second, second_addr) = peer().await;
    dispatch(ctx.clone(), b"4:1:/home/alice/job:8:alice".to_vec(), first_addr).await;
    assert_eq!(recv_text(&first).await, "2:0");

    dispatch(ctx.clone(), b"4:1:/tmp/elsewhere:8:mallory".to_vec(), second_addr).await;
    assert_no_reply(&second).await;
    assert_eq!(ctx.state().members.get(1).unwrap().addr, first_addr);
}

#[tokio::test]
async fn register_with_unparsable_cpus_assumes_one() {
    let ctx = testing::context(0, 2).await;
    let (socket, addr) = peer().await;
    dispatch(ctx.clone(), b"4:1:/home/alice/job:lots:alice".to_vec(), addr).await;
    assert_eq!(recv_text(&socket).await, "2:0");
    assert_eq!(ctx.state().members.get(1).unwrap().cpus, 1);
}

#[tokio::test]
async fn workers_reject_register() {
    let ctx = testing::context(1, 2).await;
    let (socket, addr) = peer().await;
    dispatch(ctx, b"4:1:/home/alice/job:8:alice".to_vec(), addr).await;
    assert_no_reply(&socket).await;
}

// ===== ACK TESTS =====

#[tokio::test]
async fn coordinator_ack_restamps_the_registered_rank() {
    let ctx = testing::context(0, 2).await;
    let (_socket, addr) = peer().await;
    dispatch(ctx.clone(), b"4:1:/home/alice/job:8:alice".to_vec(), addr).await;

    dispatch(ctx.clone(), b"2:1".to_vec(), addr).await;
    assert!(ctx.state().ack.matches(1));
}

#[tokio::test]
async fn coordinator_ignores_acks_from_the_wrong_source() {
    let ctx = testing::context(0, 2).await;
    let (_socket, member_addr) = peer().await;
    let (_other, forged_addr) = peer().await;
    dispatch(ctx.clone(), b"4:1:/home/alice/job:8:alice".to_vec(), member_addr).await;

    dispatch(ctx.clone(), b"2:1".to_vec(), forged_addr).await;
    assert!(!ctx.state().ack.matches(1));
}

#[tokio::test]
async fn worker_accepts_acks_only_from_the_coordinator_address() {
    let ctx = testing::context(1, 2).await;
    let (_socket, coordinator_addr) = peer().await;
    let (_other, forged_addr) = peer().await;
    ctx.set_coordinator(coordinator_addr);

    dispatch(ctx.clone(), b"2:0".to_vec(), forged_addr).await;
    assert!(!ctx.state().ack.matches(0));

    dispatch(ctx.clone(), b"2:0".to_vec(), coordinator_addr).await;
    assert!(ctx.state().ack.matches(0));
}

#[tokio::test]
async fn worker_rejects_acks_claiming_a_nonzero_rank() {
    let ctx = testing::context(1, 3).await;
    let (_socket, coordinator_addr) = peer().await;
    ctx.set_coordinator(coordinator_addr);
    dispatch(ctx.clone(), b"2:2".to_vec(), coordinator_addr).await;
    assert!(!ctx.state().ack.matches(2));
}

// ===== TERM TESTS =====

#[tokio::test]
async fn forged_term_is_a_pure_no_op() {
    let ctx = testing::context(1, 2).await;
    let (_socket, coordinator_addr) = peer().await;
    let (forged, forged_addr) = peer().await;
    ctx.set_coordinator(coordinator_addr);

    // Wrong source: no ack, no cancellation, and certainly no exit (this
    // test still running is the point).
    dispatch(ctx.clone(), b"0:9".to_vec(), forged_addr).await;
    assert_no_reply(&forged).await;
    assert!(!ctx.cancel.is_cancelled());
}

#[tokio::test]
async fn accepted_term_records_the_carried_code_for_the_exiting_task() {
    let ctx = testing::context(1, 2).await;
    let (socket, coordinator_addr) = peer().await;
    ctx.set_coordinator(coordinator_addr);

    dispatch(ctx.clone(), b"0:7".to_vec(), coordinator_addr).await;
    assert_eq!(recv_text(&socket).await, "2:1");
    // The handler only records and cancels; the parked worker task is the
    // single exit path, so the carried code can never lose a race to the
    // cancellation sentinel.
    assert_eq!(ctx.state().exit_code, Some(7));
    assert!(ctx.cancel.is_cancelled());
}

#[tokio::test]
async fn term_with_an_unparsable_code_is_rejected() {
    let ctx = testing::context(1, 2).await;
    let (socket, coordinator_addr) = peer().await;
    ctx.set_coordinator(coordinator_addr);
    dispatch(ctx.clone(), b"0:abc".to_vec(), coordinator_addr).await;
    assert_no_reply(&socket).await;
    assert_eq!(ctx.state().exit_code, None);
    assert!(!ctx.cancel.is_cancelled());
}

#[tokio::test]
async fn coordinator_never_accepts_an_inbound_term() {
    let ctx = testing::context(0, 2).await;
    let (socket, addr) = peer().await;
    dispatch(ctx.clone(), b"0:9".to_vec(), addr).await;
    assert_no_reply(&socket).await;
    assert!(!ctx.cancel.is_cancelled());
}

#[tokio::test]
async fn term_with_wrong_arity_is_rejected() {
    let ctx = testing::context(1, 2).await;
    let (socket, coordinator_addr) = peer().await;
    ctx.set_coordinator(coordinator_addr);
    dispatch(ctx.clone(), b"0".to_vec(), coordinator_addr).await;
    dispatch(ctx.clone(), b"0:9:9".to_vec(), coordinator_addr).await;
    assert_no_reply(&socket).await;
}

// ===== CREATE_LINK TESTS =====

#[tokio::test]
async fn create_link_makes_the_symlink_and_acks() {
    let ctx = testing::context(1, 2).await;
    let (socket, addr) = peer().await;
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("workdir");
    std::fs::create_dir(&source).unwrap();
    let dest = dir.path().join("shared");

    let frame = format!("5:{}:{}", source.display(), dest.display());
    dispatch(ctx.clone(), frame.into_bytes(), addr).await;
    assert_eq!(recv_text(&socket).await, "2:1");
    assert_eq!(std::fs::read_link(&dest).unwrap(), source);
    assert!(ctx.state().symlinks.contains(&dest));
}

#[tokio::test]
async fn create_link_is_idempotent() {
    let ctx = testing::context(1, 2).await;
    let (socket, addr) = peer().await;
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("workdir");
    std::fs::create_dir(&source).unwrap();
    let dest = dir.path().join("shared");

    let frame = format!("5:{}:{}", source.display(), dest.display());
    dispatch(ctx.clone(), frame.clone().into_bytes(), addr).await;
    assert_eq!(recv_text(&socket).await, "2:1");
    // The retransmit is re-acked without touching the filesystem again.
    dispatch(ctx.clone(), frame.into_bytes(), addr).await;
    assert_eq!(recv_text(&socket).await, "2:1");
    assert_eq!(ctx.state().symlinks.len(), 1);
}

#[tokio::test]
async fn create_link_requires_an_existing_source() {
    let ctx = testing::context(1, 2).await;
    let (socket, addr) = peer().await;
    let dir = tempfile::tempdir().unwrap();
    let frame = format!("5:{}/nope:{}/shared", dir.path().display(), dir.path().display());
    dispatch(ctx, frame.into_bytes(), addr).await;
    assert_no_reply(&socket).await;
}

// ===== SEND_FILE TESTS =====

#[tokio::test]
async fn send_file_is_accepted_and_ignored() {
    let ctx = testing::context(0, 2).await;
    let (socket, addr) = peer().await;
    dispatch(ctx, b"3:whatever".to_vec(), addr).await;
    assert_no_reply(&socket).await;
}
