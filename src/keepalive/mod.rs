//! Keep-Alive Failure Detector
//!
//! Coordinator-only. A round fires when the receive loop sees a whole
//! keep-alive interval of silence: `QUERY` goes to every registered rank,
//! the round sleeps a quarter interval while acks flow back through the
//! normal handler path, then every member's last-alive is checked against
//! the timeout. A rank gone silent past the timeout escalates to the
//! termination cascade: the whole group goes down rather than running a
//! fixed-size job short-handed.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::context::Context;
use crate::net::codec;
use crate::shutdown;

/// Exit code reported when a rank exceeds the liveness timeout.
pub const KEEPALIVE_FAILURE_CODE: i32 = 250;

/// Spawns one detached round per tick. Overlap is resolved inside
/// [`run_round`] by the single-flight guard.
pub fn spawn_round(ctx: Arc<Context>) {
    tokio::spawn(async move {
        run_round(ctx).await;
    });
}

/// Executes one keep-alive round.
///
/// The guard is acquired non-blockingly: if a previous round is still
/// settling, this tick is skipped, never queued.
pub async fn run_round(ctx: Arc<Context>) {
    let Ok(_guard) = ctx.keepalive_gate.try_lock() else {
        tracing::debug!("keep-alive round already in flight, skipping tick");
        return;
    };

    let targets: Vec<(u32, SocketAddr)> = {
        let state = ctx.state();
        state
            .members
            .members()
            .map(|member| (member.rank, member.addr))
            .collect()
    };
    if targets.is_empty() {
        return;
    }

    let query = codec::query();
    for (rank, addr) in &targets {
        tracing::debug!("sending QUERY to rank {} at {}", rank, addr);
        ctx.send_frame(&query, *addr).await;
    }

    // Let acks trickle in through the handler path.
    tokio::time::sleep(ctx.config.keep_alive() / 4).await;

    let stale = ctx.state().members.stale_ranks(ctx.config.liveness_timeout());
    if let Some(rank) = stale.first() {
        tracing::warn!(
            "rank {} exceeded the {}s liveness timeout, aborting the group",
            rank,
            ctx.config.timeout
        );
        shutdown::terminate_and_exit(&ctx, KEEPALIVE_FAILURE_CODE).await;
    }
    tracing::debug!("all ranks alive");
}
