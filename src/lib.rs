//! parwrap: UDP coordination wrapper for fixed-size parallel jobs.
//!
//! The scheduler launches the same binary once per rank; rank 0 becomes the
//! coordinator and every other rank a worker. The subsystems:
//!
//! - `config`: command line flags with environment fallbacks
//! - `net`: the command socket and the text wire codec
//! - `protocol`: the receive loop and one handler per wire command
//! - `membership`: the rank-indexed table and the registration exchange
//! - `rendezvous`: coordinator address bootstrap via the job attributes
//! - `timer`: the periodic timer list driving the receive loop's waits
//! - `keepalive`: the coordinator's liveness probing and failure detection
//! - `sharedfs`: the symlink-based fake shared filesystem
//! - `scratch`: machine file and ssh staging for the payload
//! - `exec`: payload launch and exit-code propagation
//! - `shutdown`: the termination cascade and idempotent local cleanup

pub mod config;
pub mod context;
pub mod error;
pub mod exec;
pub mod keepalive;
pub mod membership;
pub mod net;
pub mod protocol;
pub mod rendezvous;
pub mod scratch;
pub mod sharedfs;
pub mod shutdown;
pub mod timer;
