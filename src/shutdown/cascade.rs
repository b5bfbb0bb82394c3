//! Coordinator Fan-Out Shutdown
//!
//! Resends `TERM` to every registered rank until that rank's ack shows up
//! in the ack slot or the retry budget runs out. Delivery stays best-effort:
//! under sustained loss a rank may never confirm, and the cascade gives up
//! on it with a warning rather than blocking the exit.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::context::Context;
use crate::net::codec;

/// Resend attempts per rank before giving up.
pub const TERM_RETRIES: u32 = 10;

/// Poll interval while waiting for a rank's ack.
const ACK_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Sends `TERM <code>` to every registered rank except the coordinator
/// itself, confirming each via the ack slot.
pub async fn terminate_group(ctx: &Arc<Context>, return_code: i32) {
    let peers: Vec<(u32, SocketAddr)> = {
        let state = ctx.state();
        state
            .members
            .members()
            .filter(|member| member.rank != 0)
            .map(|member| (member.rank, member.addr))
            .collect()
    };

    let frame = codec::term(return_code);
    for (rank, addr) in peers {
        ctx.state().ack.clear();
        let mut confirmed = false;
        for _attempt in 0..TERM_RETRIES {
            ctx.send_frame(&frame, addr).await;
            tokio::time::sleep(ACK_POLL_INTERVAL).await;
            if ctx.state().ack.matches(rank) {
                confirmed = true;
                break;
            }
        }
        if confirmed {
            tracing::info!("rank {} confirmed termination", rank);
        } else {
            tracing::warn!(
                "rank {} never confirmed TERM after {} attempts, giving up",
                rank,
                TERM_RETRIES
            );
        }
    }
}
