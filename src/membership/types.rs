use std::net::SocketAddr;
use std::time::Instant;

/// A registered peer in the group.
///
/// Written once at registration; only `last_alive` is re-stamped afterwards,
/// on every valid liveness signal from the recorded address. `unique` is
/// true unless another registered member shares this member's IP, and is
/// used only to avoid redundant shared-filesystem provisioning.
#[derive(Debug, Clone)]
pub struct Member {
    pub rank: u32,
    pub addr: SocketAddr,
    pub cpus: u32,
    pub iwd: String,
    pub user: String,
    pub last_alive: Instant,
    pub unique: bool,
}

/// The single-slot "last acknowledgment received" record.
///
/// Overwritten by every valid inbound `ACK`; consumed by at most one waiting
/// caller at a time. There is deliberately no queue: each process has at
/// most one outstanding ack wait.
#[derive(Debug, Default, Clone, Copy)]
pub struct AckState {
    received: bool,
    rank: u32,
}

impl AckState {
    pub fn clear(&mut self) {
        self.received = false;
        self.rank = 0;
    }

    pub fn record(&mut self, rank: u32) {
        self.received = true;
        self.rank = rank;
    }

    /// True once an ack from `rank` has been recorded since the last clear.
    pub fn matches(&self, rank: u32) -> bool {
        self.received && self.rank == rank
    }
}

/// The worker's record of the coordinator: the rendezvous address plus the
/// time of the last valid signal from it.
#[derive(Debug, Clone)]
pub struct CoordinatorView {
    pub addr: SocketAddr,
    pub last_alive: Instant,
}

impl CoordinatorView {
    pub fn new(addr: SocketAddr) -> Self {
        CoordinatorView {
            addr,
            last_alive: Instant::now(),
        }
    }
}
