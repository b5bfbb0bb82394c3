//! Protocol Error Taxonomy
//!
//! Every way an inbound datagram can be rejected maps to one variant here.
//! Rejections are logged by the dispatch layer and never escalate: a bad
//! datagram produces no reply and no state change. Fatal conditions
//! (port-range exhaustion, bootstrap failures) use `anyhow` at the binary
//! layer instead.

use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("datagram does not start with an integer command tag")]
    BadTag,

    #[error("datagram of {0} bytes exceeds the wire limit")]
    Oversized(usize),

    #[error("unparsable integer argument '{0}'")]
    BadArgument(String),

    #[error("unknown command tag {0}")]
    UnknownTag(i64),

    #[error("{cmd} expects {expected} argument(s), got {got}")]
    WrongArity {
        cmd: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("rank {0} is outside the allowable range [0, {1})")]
    RankOutOfRange(i64, usize),

    #[error("rank {0} has not registered yet")]
    NotRegistered(u32),

    #[error("source {actual} does not match the recorded address {expected}")]
    SourceMismatch {
        expected: SocketAddr,
        actual: SocketAddr,
    },

    #[error("this rank does not accept {0}")]
    RoleViolation(&'static str),

    #[error("coordinator address is not known yet")]
    CoordinatorUnknown,

    #[error("symlink source {0} does not exist")]
    MissingSource(PathBuf),

    #[error("unable to create symlink at {dest}: {source}")]
    SymlinkFailed {
        dest: PathBuf,
        source: std::io::Error,
    },
}
