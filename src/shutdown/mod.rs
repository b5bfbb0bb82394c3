//! Termination Cascade and Local Cleanup
//!
//! Shutdown enters from three places: an OS signal, the keep-alive detector
//! (coordinator), or an authenticated inbound `TERM` (workers; the handler
//! records the carried code and cancels, the parked worker task exits). The
//! coordinator fans `TERM` out to every registered rank in a bounded,
//! best-effort retry loop; everyone runs the same idempotent local cleanup
//! before exiting.

pub mod cascade;
pub mod cleanup;

pub use cascade::terminate_group;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::context::Context;


/// Runs local cleanup and exits with `code`. Never returns.
pub fn exit_process(ctx: &Context, code: i32) -> ! {
    cleanup::run(ctx);
    std::process::exit(code);
}

/// Coordinator exit path: cascade `TERM` to the group, clean up, exit.
pub async fn terminate_and_exit(ctx: &Arc<Context>, code: i32) -> ! {
    if ctx.is_coordinator() {
        cascade::terminate_group(ctx, code).await;
    }
    exit_process(ctx, code);
}

/// Installs signal watchers that record the exit intent on the cancellation
/// token. The receive loop observes the token before every blocking wait;
/// actual cleanup happens on the loop's own path, never inside the handler.
pub fn spawn_signal_watchers(cancel: CancellationToken) {
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(err) => {
                tracing::error!("unable to install SIGTERM handler: {}", err);
                return;
            }
        };
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(s) => s,
            Err(err) => {
                tracing::error!("unable to install SIGHUP handler: {}", err);
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => tracing::info!("received SIGINT"),
            _ = terminate.recv() => tracing::info!("received SIGTERM"),
            _ = hangup.recv() => tracing::info!("received SIGHUP"),
        }
        cancel.cancel();
    });
}
