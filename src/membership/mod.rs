//! Group Membership
//!
//! The coordinator (rank 0) owns the membership table: a fixed-size,
//! rank-indexed registry of peer metadata filled by the `REGISTER` exchange.
//! Workers own only their view of the coordinator plus the single-slot ack
//! record shared with callers awaiting a reply.
//!
//! Group size is fixed for the lifetime of the run; slots fill exactly once
//! and a filled slot's address never changes except by an idempotent
//! re-registration from the identical source.

pub mod registration;
pub mod table;
pub mod types;

pub use table::{MembershipTable, RegisterOutcome};
pub use types::{AckState, Member};

#[cfg(test)]
mod tests;
