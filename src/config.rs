//! Wrapper Configuration
//!
//! Command line flags with environment fallbacks. The scheduler launches the
//! same binary on every rank; only `--rank` differs between invocations.
//! Everything after the flags is the payload command executed by rank 0 once
//! the group has formed.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;

/// Minimum accepted keep-alive timeout in seconds.
const MIN_TIMEOUT_SECS: u64 = 10;
/// Minimum accepted keep-alive interval in seconds.
const MIN_KA_INTERVAL_SECS: u64 = 1;

/// A `low:high` UDP port range, scanned ascending when binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    pub low: u16,
    pub high: u16,
}

impl FromStr for PortRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (low, high) = s
            .split_once(':')
            .ok_or_else(|| format!("expected low:high, got '{s}'"))?;
        let low: u16 = low.trim().parse().map_err(|_| format!("bad low port '{low}'"))?;
        let high: u16 = high
            .trim()
            .parse()
            .map_err(|_| format!("bad high port '{high}'"))?;
        if low >= high {
            return Err(format!("empty port range {low}:{high}"));
        }
        Ok(PortRange { low, high })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "parwrap", about = "UDP coordination wrapper for fixed-size parallel jobs")]
pub struct Config {
    /// Rank of this process within the group (0 is the coordinator).
    #[arg(short = 'r', long, env = "PARWRAP_RANK")]
    pub rank: u32,

    /// Total number of ranks in the group.
    #[arg(short = 'n', long = "nprocs", env = "PARWRAP_NPROCS")]
    pub nprocs: usize,

    /// UDP port range to bind the command socket in.
    #[arg(long, default_value = "51000:61000")]
    pub ports: PortRange,

    /// Seconds of silence before a rank is declared failed.
    #[arg(long, default_value_t = 300)]
    pub timeout: u64,

    /// Seconds between coordinator liveness probes.
    #[arg(long = "ka-interval", default_value_t = 30)]
    pub ka_interval: u64,

    /// Path of the shared job-attribute file used to bootstrap the
    /// coordinator address into the workers.
    #[arg(long, env = "PARWRAP_RENDEZVOUS")]
    pub rendezvous_file: PathBuf,

    /// Enable debug-level logging.
    #[arg(long)]
    pub verbose: bool,

    /// Payload command and arguments, executed by rank 0.
    #[arg(trailing_var_arg = true, required = true)]
    pub payload: Vec<String>,
}

impl Config {
    /// Clamps intervals to their minimums and rejects inconsistent values.
    pub fn validate(&mut self) -> Result<()> {
        if self.nprocs == 0 {
            bail!("the group size must be at least 1");
        }
        if (self.rank as usize) >= self.nprocs {
            bail!("rank {} is outside the group [0, {})", self.rank, self.nprocs);
        }
        if self.timeout < MIN_TIMEOUT_SECS {
            tracing::warn!(
                "timeout {}s below minimum, assuming {}s",
                self.timeout,
                MIN_TIMEOUT_SECS
            );
            self.timeout = MIN_TIMEOUT_SECS;
        }
        if self.ka_interval < MIN_KA_INTERVAL_SECS {
            tracing::warn!(
                "keep-alive interval {}s below minimum, assuming {}s",
                self.ka_interval,
                MIN_KA_INTERVAL_SECS
            );
            self.ka_interval = MIN_KA_INTERVAL_SECS;
        }
        if self.payload.is_empty() {
            bail!("no payload command passed to the wrapper");
        }
        Ok(())
    }

    pub fn is_coordinator(&self) -> bool {
        self.rank == 0
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.ka_interval)
    }

    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Number of one-second ticks the coordinator waits for registrations
    /// before proceeding without the missing ranks.
    pub fn group_wait_ticks(&self) -> u64 {
        (self.timeout / self.ka_interval).max(1)
    }
}
