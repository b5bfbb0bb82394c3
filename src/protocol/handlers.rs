//! Command Handlers
//!
//! One handler per wire command. Each handler validates its exact argument
//! count and the sender's source address before touching any state; a
//! rejection is logged by [`dispatch`] and produces no reply. Lock guards
//! are always dropped before replies are sent.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::context::Context;
use crate::error::ProtocolError;
use crate::membership::RegisterOutcome;
use crate::net::codec::{self, CommandTag, Frame};
use crate::sharedfs::sanitize_path_arg;

/// Parses and routes one inbound datagram. Never returns an error to the
/// receive loop: every rejection ends here as a warning.
pub async fn dispatch(ctx: Arc<Context>, payload: Vec<u8>, src: SocketAddr) {
    let frame = match Frame::parse(&payload) {
        Ok(frame) => frame,
        Err(err) => {
            tracing::warn!("dropping datagram from {}: {}", src, err);
            return;
        }
    };
    tracing::debug!("received {} from {}", frame.tag.name(), src);

    let result = match frame.tag {
        CommandTag::Query => handle_query(&ctx, &frame, src).await,
        CommandTag::Ack => handle_ack(&ctx, &frame, src),
        CommandTag::Term => handle_term(&ctx, &frame, src).await,
        CommandTag::Register => handle_register(&ctx, &frame, src).await,
        CommandTag::CreateLink => handle_create_link(&ctx, &frame, src).await,
        CommandTag::SendFile => handle_send_file(&frame),
    };
    if let Err(err) = result {
        tracing::warn!("rejected {} from {}: {}", frame.tag.name(), src, err);
    }
}

/// `QUERY`: liveness probe. Always answered with `ACK <own rank>`.
async fn handle_query(
    ctx: &Arc<Context>,
    frame: &Frame,
    src: SocketAddr,
) -> Result<(), ProtocolError> {
    frame.expect_arity(0)?;
    ctx.send_frame(&codec::ack(ctx.rank()), src).await;
    Ok(())
}

/// `ACK <rank>`: terminal, never replied to.
///
/// On a worker the ack must originate from the recorded coordinator address
/// and re-stamps the coordinator's last-alive. On the coordinator the rank
/// must be registered and the source must match its stored address.
fn handle_ack(ctx: &Arc<Context>, frame: &Frame, src: SocketAddr) -> Result<(), ProtocolError> {
    frame.expect_arity(1)?;
    let rank = codec::parse_int(&frame.args[0])?;

    let mut state = ctx.state();
    if ctx.is_coordinator() {
        state.members.mark_alive(rank, src)?;
        state.ack.record(rank as u32);
    } else {
        if rank != 0 {
            return Err(ProtocolError::RoleViolation("an ACK from a non-coordinator rank"));
        }
        let coordinator = state
            .coordinator
            .as_mut()
            .ok_or(ProtocolError::CoordinatorUnknown)?;
        if coordinator.addr != src {
            return Err(ProtocolError::SourceMismatch {
                expected: coordinator.addr,
                actual: src,
            });
        }
        coordinator.last_alive = Instant::now();
        state.ack.record(0);
    }
    Ok(())
}

/// `TERM <return_code>`: authenticated shutdown request.
///
/// The coordinator never accepts an inbound TERM from any source. A worker
/// accepts it only from the recorded coordinator address; a forged source is
/// a pure no-op besides the log line. On acceptance the worker acks, records
/// the carried code and cancels; the parked worker task is the one place
/// that runs cleanup and exits, so the code it exits with is exactly the
/// one carried here.
async fn handle_term(
    ctx: &Arc<Context>,
    frame: &Frame,
    src: SocketAddr,
) -> Result<(), ProtocolError> {
    frame.expect_arity(1)?;
    if ctx.is_coordinator() {
        return Err(ProtocolError::RoleViolation("an inbound TERM"));
    }
    let return_code = codec::parse_int(&frame.args[0])?;

    {
        let state = ctx.state();
        let coordinator = state
            .coordinator
            .as_ref()
            .ok_or(ProtocolError::CoordinatorUnknown)?;
        if coordinator.addr != src {
            return Err(ProtocolError::SourceMismatch {
                expected: coordinator.addr,
                actual: src,
            });
        }
    }

    tracing::info!("received valid TERM from the coordinator, exiting ({return_code})");
    ctx.send_frame(&codec::ack(ctx.rank()), src).await;
    ctx.state().exit_code = Some(return_code as i32);
    ctx.cancel.cancel();
    Ok(())
}

/// `REGISTER <rank> <iwd> <cpus> <user>`: coordinator-only admission.
///
/// An already-filled slot re-registered from the identical address is an
/// idempotent re-ack; a different address is rejected without mutation. The
/// acknowledgment is sent unconditionally on both accept paths.
async fn handle_register(
    ctx: &Arc<Context>,
    frame: &Frame,
    src: SocketAddr,
) -> Result<(), ProtocolError> {
    frame.expect_arity(4)?;
    if !ctx.is_coordinator() {
        return Err(ProtocolError::RoleViolation("REGISTER"));
    }
    let rank = codec::parse_int(&frame.args[0])?;
    let iwd = sanitize_path_arg(&frame.args[1]);
    let cpus = match codec::parse_int(&frame.args[2]) {
        Ok(n) if n > 0 => n as u32,
        _ => {
            tracing::warn!("unable to parse cpu count in REGISTER, assuming 1");
            1
        }
    };
    let user = sanitize_path_arg(&frame.args[3]);

    let outcome = {
        let mut state = ctx.state();
        state.members.register(rank, src, cpus, iwd, user)?
    };
    match outcome {
        RegisterOutcome::New => {
            tracing::info!("registered rank {} at {}", rank, src);
        }
        RegisterOutcome::AlreadyRegistered => {
            tracing::info!("rank {} already registered, re-acking", rank);
        }
    }
    ctx.send_frame(&codec::ack(ctx.rank()), src).await;
    Ok(())
}

/// `CREATE_LINK <src_path> <dest_path>`: shared-filesystem provisioning.
///
/// Idempotent: a destination already in the registry is acked without
/// recreating the link. The source path must exist. Creation failure is
/// logged and rejected but never fatal to the handler.
async fn handle_create_link(
    ctx: &Arc<Context>,
    frame: &Frame,
    src: SocketAddr,
) -> Result<(), ProtocolError> {
    frame.expect_arity(2)?;
    let link_src = PathBuf::from(sanitize_path_arg(&frame.args[0]));
    let link_dest = PathBuf::from(sanitize_path_arg(&frame.args[1]));

    if !Path::new(&link_src).exists() {
        return Err(ProtocolError::MissingSource(link_src));
    }

    let already_present = ctx.state().symlinks.contains(&link_dest);
    if already_present {
        tracing::warn!("symlink at {} already exists, re-acking", link_dest.display());
        ctx.send_frame(&codec::ack(ctx.rank()), src).await;
        return Ok(());
    }

    if let Err(err) = std::os::unix::fs::symlink(&link_src, &link_dest) {
        return Err(ProtocolError::SymlinkFailed {
            dest: link_dest,
            source: err,
        });
    }
    ctx.state().symlinks.record(link_dest.clone());
    tracing::info!(
        "created symlink {} -> {}",
        link_src.display(),
        link_dest.display()
    );
    ctx.send_frame(&codec::ack(ctx.rank()), src).await;
    Ok(())
}

/// `SEND_FILE`: reserved. Accepted and ignored.
fn handle_send_file(_frame: &Frame) -> Result<(), ProtocolError> {
    tracing::info!("SEND_FILE is not implemented, ignoring");
    Ok(())
}
