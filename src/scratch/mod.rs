//! Scratch Directory Staging
//!
//! The coordinator stages run metadata for the payload in a private scratch
//! directory: the machine file listing registered hosts, a batch-mode ssh
//! configuration covering them, and a small ssh wrapper script pointing at
//! it. Cleanup removes the known files and then the directory itself;
//! leftovers are warnings, never errors.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};

use crate::membership::MembershipTable;

pub const MACHINE_FILE: &str = "machines";
pub const SSH_CONFIG: &str = "ssh_config";
pub const SSH_WRAPPER: &str = "ssh_wrapper.sh";


/// Temp root resolution: `TMP`, `TMPDIR`, `TEMPDIR`, then `/tmp`.
pub fn temp_root() -> PathBuf {
    ["TMP", "TMPDIR", "TEMPDIR"]
        .iter()
        .find_map(|var| std::env::var_os(var))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}

/// Creates a fresh scratch directory under the temp root.
pub fn create_scratch() -> Result<PathBuf> {
    let root = temp_root();
    let dir = tempfile::Builder::new()
        .prefix(".parwrap_scratch_")
        .tempdir_in(&root)
        .with_context(|| format!("creating scratch directory under {}", root.display()))?
        .keep();
    tracing::debug!("using scratch directory at {}", dir.display());
    Ok(dir)
}

/// Writes the machine file: one `ip:cpus` line per registered member.
///
/// Partially filled tables are allowed; missing ranks are simply absent.
pub fn write_machine_file(scratch: &Path, members: &MembershipTable) -> Result<PathBuf> {
    let path = scratch.join(MACHINE_FILE);
    let mut file = std::fs::File::create(&path)
        .with_context(|| format!("creating machine file {}", path.display()))?;
    for member in members.members() {
        writeln!(file, "{}:{}", member.addr.ip(), member.cpus)?;
    }
    Ok(path)
}

/// Writes a batch-mode ssh configuration listing every registered host.
pub fn write_ssh_config(scratch: &Path, members: &MembershipTable) -> Result<PathBuf> {
    let path = scratch.join(SSH_CONFIG);
    let mut file = std::fs::File::create(&path)
        .with_context(|| format!("creating ssh config {}", path.display()))?;
    writeln!(file, "BatchMode=yes")?;
    writeln!(file, "UserKnownHostsFile=/dev/null")?;
    writeln!(file, "StrictHostKeyChecking=no")?;
    writeln!(file, "ForwardX11=no")?;
    writeln!(file, "KeepAlive=yes")?;
    writeln!(file, "ServerAliveInterval=120")?;
    for member in members.members() {
        writeln!(file, "Host={}", member.addr.ip())?;
        writeln!(file, "\tUser={}", member.user)?;
        writeln!(file, "\tPort=22")?;
    }
    Ok(path)
}

/// Writes the executable ssh wrapper that applies the generated config.
pub fn write_ssh_wrapper(scratch: &Path) -> Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    let path = scratch.join(SSH_WRAPPER);
    let config = scratch.join(SSH_CONFIG);
    let mut file = std::fs::File::create(&path)
        .with_context(|| format!("creating ssh wrapper {}", path.display()))?;
    writeln!(file, "#!/bin/sh")?;
    writeln!(file, "exec ssh -F {} \"$@\"", config.display())?;
    drop(file);
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o750))
        .with_context(|| format!("marking {} executable", path.display()))?;
    Ok(path)
}

/// Best-effort removal of the scratch directory and its known files.
pub fn cleanup_scratch(scratch: &Path) {
    if !scratch.exists() {
        return;
    }
    for name in [SSH_WRAPPER, SSH_CONFIG, MACHINE_FILE] {
        let path = scratch.join(name);
        if path.exists() {
            if let Err(err) = std::fs::remove_file(&path) {
                tracing::warn!("unable to remove {}: {}", path.display(), err);
            }
        }
    }
    match std::fs::remove_dir(scratch) {
        Ok(()) => tracing::debug!("removed scratch directory {}", scratch.display()),
        Err(err) => tracing::warn!(
            "unable to remove scratch directory {}: {}",
            scratch.display(),
            err
        ),
    }
}
