//! Registration Phase
//!
//! Workers resend `REGISTER` to the coordinator until an acknowledgment
//! arrives; the coordinator polls its table until the whole group has shown
//! up or the wait budget runs out. Registration is at-least-once: the
//! coordinator treats a resend from the same source as an idempotent re-ack.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};

use crate::context::Context;
use crate::net::codec;

/// Delay between registration resends.
const RESEND_INTERVAL: Duration = Duration::from_secs(1);

/// Worker loop: register with the coordinator until acknowledged.
///
/// The loop stops only when the ack slot carries the coordinator's rank
/// *and* the coordinator's `last_alive` has moved since the loop began. The
/// second condition guards against a stale ack left in the slot by an
/// earlier exchange.
pub async fn register_with_coordinator(ctx: &Arc<Context>) -> Result<()> {
    let started = Instant::now();
    let coordinator_addr = {
        let state = ctx.state();
        let Some(coordinator) = &state.coordinator else {
            bail!("cannot register before the coordinator address is known");
        };
        coordinator.addr
    };
    let frame = codec::register(
        ctx.rank(),
        &current_dir_string(),
        detected_cpus(),
        &current_user(),
    );

    loop {
        if ctx.cancel.is_cancelled() {
            bail!("registration interrupted by shutdown");
        }
        ctx.send_frame(&frame, coordinator_addr).await;
        tokio::time::sleep(RESEND_INTERVAL).await;

        let state = ctx.state();
        let acked = state.ack.matches(0);
        let coordinator_seen = state
            .coordinator
            .as_ref()
            .map(|c| c.last_alive > started)
            .unwrap_or(false);
        if acked && coordinator_seen {
            tracing::info!("rank {} registered with the coordinator", ctx.rank());
            return Ok(());
        }
        tracing::debug!("no acknowledgment yet, resending REGISTER");
    }
}

/// Coordinator loop: wait until every worker rank has registered.
///
/// Polls once per second for at most `timeout / ka_interval` ticks. Missing
/// ranks after the budget are logged and the run proceeds without them; the
/// wait is an explicit SLA, never infinite blocking.
pub async fn wait_for_group(ctx: &Arc<Context>) -> usize {
    let expected = ctx.config.nprocs - 1;
    let budget = ctx.config.group_wait_ticks();

    for tick in 0..budget {
        if ctx.cancel.is_cancelled() {
            break;
        }
        let registered = ctx.state().members.registered_count();
        if registered >= expected {
            tracing::info!("all {} worker ranks registered", expected);
            return registered;
        }
        tracing::debug!(
            "waiting for registrations ({}/{} after {} ticks)",
            registered,
            expected,
            tick
        );
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    let state = ctx.state();
    for rank in state.members.missing_ranks() {
        tracing::warn!(
            "rank {} never registered within the wait budget; proceeding without it",
            rank
        );
    }
    state.members.registered_count()
}

/// The working directory sent in `REGISTER`; falls back to `.` when the
/// directory cannot be resolved.
pub fn current_dir_string() -> String {
    std::env::current_dir()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| String::from("."))
}

/// The username sent in `REGISTER`.
pub fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| String::from("unknown"))
}

/// CPUs advertised in `REGISTER`.
pub fn detected_cpus() -> u32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(1)
}
