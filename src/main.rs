//! Wrapper entry point.
//!
//! Common setup (socket, context, signal watchers, receive loop) happens
//! once, then the process splits by rank: rank 0 runs the coordinator flow
//! that forms the group and launches the payload; every other rank runs the
//! worker flow that registers and then serves commands until told to exit.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use parwrap::config::Config;
use parwrap::context::Context;
use parwrap::exec::{self, PayloadEnv};
use parwrap::keepalive::KEEPALIVE_FAILURE_CODE;
use parwrap::membership::registration;
use parwrap::net::transport;
use parwrap::protocol::CommandServer;
use parwrap::rendezvous::{self, FileStore};
use parwrap::scratch;
use parwrap::sharedfs::provision;
use parwrap::shutdown;

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut config = Config::parse();
    init_tracing(config.verbose);
    config.validate()?;

    let (socket, port) = transport::bind_in_range(config.ports).await?;
    let local_ip = transport::local_ip().await;
    tracing::info!(
        "rank {} of {} up at {}:{}",
        config.rank,
        config.nprocs,
        local_ip,
        port
    );

    let ctx = Context::new(config, socket, port, local_ip);
    shutdown::spawn_signal_watchers(ctx.cancel.clone());
    tokio::spawn(CommandServer::new().run(ctx.clone()));

    let store = FileStore::new(ctx.config.rendezvous_file.clone());
    if ctx.is_coordinator() {
        run_coordinator(ctx, store).await
    } else {
        run_worker(ctx, store).await
    }
}

/// Rank 0: publish the command address, form the group, stage the run
/// metadata, launch the payload and propagate its exit code through the
/// termination cascade. Never returns.
async fn run_coordinator(ctx: Arc<Context>, store: FileStore) -> Result<()> {
    rendezvous::publish_coordinator(&store, &ctx)?;
    registration::wait_for_group(&ctx).await;

    let iwd = registration::current_dir_string();
    let members = {
        let mut state = ctx.state();
        let duplicates = state.members.mark_duplicate_hosts(ctx.local_ip);
        if duplicates > 0 {
            tracing::debug!("{} ranks share a host with an earlier rank", duplicates);
        }
        state.members.clone()
    };

    let shared = provision::provision(&ctx, &iwd).await?;

    let scratch_dir = scratch::create_scratch()?;
    let machine_file = scratch::write_machine_file(&scratch_dir, &members)?;
    let ssh_config = scratch::write_ssh_config(&scratch_dir, &members)?;
    let ssh_wrapper = scratch::write_ssh_wrapper(&scratch_dir)?;
    ctx.state().scratch = Some(scratch_dir.clone());

    let mut env = PayloadEnv::default();
    env.set("PARWRAP_NPROCS", ctx.config.nprocs.to_string());
    env.set("PARWRAP_MACHINE_FILE", machine_file.display().to_string());
    env.set("PARWRAP_SSH_CONFIG", ssh_config.display().to_string());
    env.set("PARWRAP_SSH_WRAPPER", ssh_wrapper.display().to_string());
    if let provision::SharedFs::Synthetic(path) = &shared {
        env.set("PARWRAP_SHARED_FS", path.display().to_string());
    }

    let working_dir = shared.working_dir(&iwd);
    let mut child = exec::launch(&ctx.config.payload, &working_dir, &env)?;

    let code = tokio::select! {
        _ = ctx.cancel.cancelled() => {
            tracing::warn!("interrupted before the payload finished, aborting the group");
            KEEPALIVE_FAILURE_CODE
        }
        status = child.wait() => {
            let code = match status {
                Ok(status) => exec::exit_code(status),
                Err(err) => {
                    tracing::error!("unable to collect the payload's exit status: {}", err);
                    1
                }
            };
            tracing::info!("payload finished with exit code {}", code);
            code
        }
    };
    shutdown::terminate_and_exit(&ctx, code).await
}

/// Worker ranks: find the coordinator, register, then serve commands until
/// cancellation. A valid `TERM` records its carried code before cancelling;
/// a local interrupt leaves it unset and exits with the failure sentinel.
async fn run_worker(ctx: Arc<Context>, store: FileStore) -> Result<()> {
    rendezvous::await_coordinator(&store, &ctx).await?;
    registration::register_with_coordinator(&ctx).await?;

    ctx.cancel.cancelled().await;
    let code = match ctx.state().exit_code {
        Some(code) => code,
        None => {
            tracing::warn!("interrupted without a TERM from the coordinator");
            KEEPALIVE_FAILURE_CODE
        }
    };
    shutdown::exit_process(&ctx, code)
}
