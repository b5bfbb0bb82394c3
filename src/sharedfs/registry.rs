use std::path::{Path, PathBuf};

/// Append-only record of symlinks created on this host.
///
/// Entries are added under the process-wide lock by the `CREATE_LINK`
/// handler and the coordinator's own provisioning pass, and are only ever
/// removed (unlinked) during cleanup.
#[derive(Debug, Default)]
pub struct SymlinkRegistry {
    paths: Vec<PathBuf>,
}

impl SymlinkRegistry {
    pub fn new() -> Self {
        SymlinkRegistry::default()
    }

    pub fn contains(&self, dest: &Path) -> bool {
        self.paths.iter().any(|p| p == dest)
    }

    pub fn record(&mut self, dest: PathBuf) {
        self.paths.push(dest);
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Takes every recorded path, leaving the registry empty. Used by
    /// cleanup so a second invocation has nothing left to unlink.
    pub fn drain(&mut self) -> Vec<PathBuf> {
        std::mem::take(&mut self.paths)
    }
}
