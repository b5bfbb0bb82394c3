//! Command Protocol
//!
//! The dispatcher side of the wire protocol: a single receive loop accepts
//! datagrams off the command socket, parses them, and hands each one to its
//! own spawned task routed by command tag. Handlers validate exact arity and
//! source addresses; anything malformed or unauthorized is logged and
//! dropped with no reply and no state change.

pub mod handlers;
pub mod server;

pub use server::CommandServer;

#[cfg(test)]
mod tests;
