//! Local Cleanup
//!
//! Idempotent, safe to invoke twice and safe on the signal path: the shared
//! lock is taken non-blockingly, so cleanup can never deadlock against an
//! in-flight handler holding it. Every step is best-effort; failures are
//! warnings, never fatal.

use crate::context::Context;
use crate::scratch;

/// Removes the scratch directory and unlinks every recorded symlink.
///
/// The scratch path and the symlink list are *taken* out of the shared
/// state, so a second invocation finds nothing left to do.
pub fn run(ctx: &Context) {
    let Some(mut state) = ctx.try_state() else {
        tracing::warn!("state lock busy during cleanup, skipping scratch and symlink removal");
        return;
    };
    let scratch_dir = state.scratch.take();
    let symlinks = state.symlinks.drain();
    drop(state);

    if let Some(dir) = scratch_dir {
        scratch::cleanup_scratch(&dir);
    }
    for path in symlinks {
        match std::fs::remove_file(&path) {
            Ok(()) => tracing::debug!("unlinked {}", path.display()),
            Err(err) => tracing::warn!("unable to unlink {}: {}", path.display(), err),
        }
    }
}
