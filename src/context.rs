//! Wrapper Context
//!
//! One context object per process, passed explicitly to every handler. All
//! mutable coordination state lives behind a single process-wide mutex;
//! critical sections are pure metadata mutation and never span network or
//! disk I/O. Cleanup and the keep-alive single-flight guard acquire their
//! locks non-blockingly, so a shutdown triggered mid-handler can never
//! deadlock.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::membership::types::CoordinatorView;
use crate::membership::{AckState, MembershipTable};
use crate::sharedfs::SymlinkRegistry;

/// Mutable coordination state, guarded by the one process-wide mutex.
#[derive(Debug)]
pub struct Shared {
    /// Rank-indexed registry of peers. Only the coordinator fills it.
    pub members: MembershipTable,
    /// The worker's record of the coordinator. `None` until rendezvous, and
    /// always `None` on rank 0.
    pub coordinator: Option<CoordinatorView>,
    /// Single-slot last-ack record.
    pub ack: AckState,
    /// Symlinks created on this host, consumed by cleanup.
    pub symlinks: SymlinkRegistry,
    /// Scratch directory, once created. Taken by cleanup.
    pub scratch: Option<PathBuf>,
    /// Exit code carried by an accepted `TERM`, read by the one task that
    /// actually exits the process after cancellation.
    pub exit_code: Option<i32>,
}

pub struct Context {
    pub config: Config,
    /// The one command socket, reused for every send and the receive loop.
    pub socket: Arc<UdpSocket>,
    /// Port the command socket bound to.
    pub port: u16,
    /// Best-effort outward-facing address of this host.
    pub local_ip: IpAddr,
    state: Mutex<Shared>,
    /// Non-blocking single-flight guard for keep-alive rounds. A tokio
    /// mutex because the round holds it across its settle sleep.
    pub keepalive_gate: tokio::sync::Mutex<()>,
    /// Process exit intent, set by signal watchers and the TERM handler.
    pub cancel: CancellationToken,
}

impl Context {
    pub fn new(config: Config, socket: UdpSocket, port: u16, local_ip: IpAddr) -> Arc<Self> {
        let group_size = config.nprocs;
        Arc::new(Context {
            config,
            socket: Arc::new(socket),
            port,
            local_ip,
            state: Mutex::new(Shared {
                members: MembershipTable::new(group_size),
                coordinator: None,
                ack: AckState::default(),
                symlinks: SymlinkRegistry::new(),
                scratch: None,
                exit_code: None,
            }),
            keepalive_gate: tokio::sync::Mutex::new(()),
            cancel: CancellationToken::new(),
        })
    }

    pub fn is_coordinator(&self) -> bool {
        self.config.is_coordinator()
    }

    pub fn rank(&self) -> u32 {
        self.config.rank
    }

    /// Locks the shared state. Guards must be dropped before any `await`.
    pub fn state(&self) -> MutexGuard<'_, Shared> {
        self.state.lock()
    }

    /// Non-blocking state acquisition for cleanup paths.
    pub fn try_state(&self) -> Option<MutexGuard<'_, Shared>> {
        self.state.try_lock()
    }

    /// Records the coordinator's rendezvous address (workers only).
    pub fn set_coordinator(&self, addr: SocketAddr) {
        self.state().coordinator = Some(CoordinatorView::new(addr));
    }

    /// Fire-and-forget datagram send; failures are logged, never propagated.
    /// No timeout applies: retry semantics live in the calling loops.
    pub async fn send_frame(&self, frame: &str, dest: SocketAddr) {
        if let Err(err) = self.socket.send_to(frame.as_bytes(), dest).await {
            tracing::warn!("failed to send '{}' to {}: {}", frame, dest, err);
        }
    }
}
