//! Shared Path Provisioning
//!
//! Coordinator-side orchestration of the fake shared filesystem: decide
//! whether one is needed, derive the synthetic path, link the local working
//! directory, then ask each unique remote host to do the same via
//! `CREATE_LINK`. A host that never confirms is a warning, not a failure;
//! the payload may still run if its own view of the path is intact.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};

use crate::context::Context;
use crate::net::codec;
use crate::scratch;

/// Resend attempts per host before giving up on its link confirmation.
const LINK_RETRIES: u32 = 10;

/// Poll interval while waiting for a host's `CREATE_LINK` ack.
const ACK_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Outcome of provisioning, consumed by the payload launcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SharedFs {
    /// Every rank already shares the coordinator's working directory.
    Native,
    /// A synthetic path was provisioned; the payload runs under it.
    Synthetic(PathBuf),
}

impl SharedFs {
    /// Directory the payload should treat as its working directory.
    pub fn working_dir(&self, native_iwd: &str) -> PathBuf {
        match self {
            SharedFs::Native => PathBuf::from(native_iwd),
            SharedFs::Synthetic(path) => path.clone(),
        }
    }
}

/// True when at least one registered member reports a working directory
/// different from the coordinator's.
pub fn needs_shared_fs(ctx: &Context, coordinator_iwd: &str) -> bool {
    ctx.state()
        .members
        .members()
        .any(|member| member.iwd != coordinator_iwd)
}

/// Derives the synthetic shared path under the temp root, unique per run.
pub fn derive_shared_path(job_id: &str) -> PathBuf {
    let stamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    scratch::temp_root().join(format!("parwrap_shared_{job_id}_{stamp}"))
}

/// Job identifier for path derivation: scheduler-provided when available,
/// otherwise random.
pub fn job_id() -> String {
    match std::env::var("PARWRAP_JOB_ID") {
        Ok(id) if !id.trim().is_empty() => id.trim().to_owned(),
        _ => format!("{:08x}", rand::random::<u32>()),
    }
}

/// Provisions the fake shared filesystem for the group.
///
/// Returns [`SharedFs::Native`] when no synthetic path is required. Remote
/// links go only to hosts marked unique; co-located ranks see the link their
/// host already has.
pub async fn provision(ctx: &Arc<Context>, coordinator_iwd: &str) -> Result<SharedFs> {
    if !needs_shared_fs(ctx, coordinator_iwd) {
        tracing::debug!("all ranks share {}, no synthetic path needed", coordinator_iwd);
        return Ok(SharedFs::Native);
    }

    let shared = derive_shared_path(&job_id());
    let shared_str = shared.display().to_string();
    tracing::info!(
        "working directories differ across the group, provisioning {}",
        shared_str
    );

    // The coordinator's own host first. A failure here is fatal: the payload
    // would start in a directory that does not exist.
    std::os::unix::fs::symlink(coordinator_iwd, &shared)
        .with_context(|| format!("linking {} to {}", shared_str, coordinator_iwd))?;
    ctx.state().symlinks.record(shared.clone());

    let targets: Vec<(u32, SocketAddr, String)> = {
        let state = ctx.state();
        state
            .members
            .members()
            .filter(|member| member.unique)
            .map(|member| (member.rank, member.addr, member.iwd.clone()))
            .collect()
    };

    for (rank, addr, iwd) in targets {
        let frame = codec::create_link(&iwd, &shared_str);
        ctx.state().ack.clear();
        let mut confirmed = false;
        for _attempt in 0..LINK_RETRIES {
            ctx.send_frame(&frame, addr).await;
            tokio::time::sleep(ACK_POLL_INTERVAL).await;
            if ctx.state().ack.matches(rank) {
                confirmed = true;
                break;
            }
        }
        if confirmed {
            tracing::debug!("rank {} linked {} to {}", rank, shared_str, iwd);
        } else {
            tracing::warn!(
                "rank {} never confirmed CREATE_LINK after {} attempts",
                rank,
                LINK_RETRIES
            );
        }
    }

    Ok(SharedFs::Synthetic(shared))
}
