//! Command Server
//!
//! The single long-lived receive loop. Workers block on the socket
//! indefinitely; the coordinator bounds each wait by the timer list so a
//! silent interval triggers a keep-alive round. Every accepted datagram is
//! handed to its own spawned task; a semaphore bounds in-flight handlers so
//! behavior under saturation is defined (excess datagrams are dropped with a
//! warning) rather than unbounded.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::context::Context;
use crate::keepalive;
use crate::net::codec::MAX_DATAGRAM;
use crate::protocol::handlers;
use crate::timer::{PeriodicTimer, TimerList};

/// Maximum number of concurrently running datagram handlers.
pub const MAX_INFLIGHT_HANDLERS: usize = 256;

/// Pause after a transient socket error before retrying the receive.
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(100);

pub struct CommandServer {
    handler_permits: Arc<Semaphore>,
}

impl Default for CommandServer {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandServer {
    pub fn new() -> Self {
        CommandServer {
            handler_permits: Arc::new(Semaphore::new(MAX_INFLIGHT_HANDLERS)),
        }
    }

    /// Runs the receive loop until the cancellation token fires.
    ///
    /// Returns normally only on cancellation; the caller decides what exit
    /// path follows. Handler tasks already spawned are never joined; they
    /// run to completion independently.
    pub async fn run(self, ctx: Arc<Context>) {
        // One byte over the limit so an oversized datagram is seen as
        // oversized instead of silently truncated to a parseable prefix.
        let mut buf = [0u8; MAX_DATAGRAM + 1];
        let mut timers = TimerList::new();
        if ctx.is_coordinator() {
            timers.add(PeriodicTimer::new(ctx.config.keep_alive()));
        }
        tracing::info!(
            "command server listening on port {} (rank {})",
            ctx.port,
            ctx.rank()
        );

        loop {
            if ctx.is_coordinator() {
                let wait = timers.next_firing().unwrap_or(ctx.config.keep_alive());
                tokio::select! {
                    _ = ctx.cancel.cancelled() => return,
                    result = tokio::time::timeout(wait, ctx.socket.recv_from(&mut buf)) => {
                        match result {
                            Ok(Ok((len, src))) => self.accept(&ctx, &buf[..len], src),
                            Ok(Err(err)) => {
                                tracing::error!("receive failed: {}", err);
                                tokio::time::sleep(RECV_ERROR_BACKOFF).await;
                            }
                            // No traffic for a whole keep-alive interval:
                            // probe the group.
                            Err(_elapsed) => keepalive::spawn_round(ctx.clone()),
                        }
                    }
                }
            } else {
                tokio::select! {
                    _ = ctx.cancel.cancelled() => return,
                    result = ctx.socket.recv_from(&mut buf) => {
                        match result {
                            Ok((len, src)) => self.accept(&ctx, &buf[..len], src),
                            Err(err) => {
                                tracing::error!("receive failed: {}", err);
                                tokio::time::sleep(RECV_ERROR_BACKOFF).await;
                            }
                        }
                    }
                }
            }
        }
    }

    /// Hands one datagram to a dedicated handler task, if a permit is free.
    fn accept(&self, ctx: &Arc<Context>, payload: &[u8], src: SocketAddr) {
        let Ok(permit) = self.handler_permits.clone().try_acquire_owned() else {
            tracing::warn!(
                "handler limit ({}) reached, dropping datagram from {}",
                MAX_INFLIGHT_HANDLERS,
                src
            );
            return;
        };
        let ctx = ctx.clone();
        let payload = payload.to_vec();
        tokio::spawn(async move {
            let _permit = permit;
            handlers::dispatch(ctx, payload, src).await;
        });
    }
}
