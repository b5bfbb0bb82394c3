//! Datagram Transport and Wire Codec
//!
//! One UDP socket per process, bound from a configurable port range and
//! reused for every send and the single receive loop. The wire format is
//! ASCII text, one command per datagram, at most [`codec::MAX_DATAGRAM`]
//! bytes.

pub mod codec;
pub mod transport;
