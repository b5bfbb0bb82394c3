//! Fake Shared Filesystem
//!
//! When the ranks of a job do not share a working directory, the coordinator
//! derives one synthetic shared path and asks every unique host to symlink
//! its own working directory there. Payload programs then see the same path
//! on every machine. Hosts running more than one rank get the link once.

pub mod provision;
pub mod registry;

pub use registry::SymlinkRegistry;


/// Strips surrounding quotes and whitespace from a path argument received
/// off the wire.
pub fn sanitize_path_arg(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_owned()
}
