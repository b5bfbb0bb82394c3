//! Rank-Indexed Membership Table
//!
//! Fixed-size array of slots, one per rank, sized once at startup. Slot 0
//! belongs to the coordinator itself and is never populated through the
//! registration protocol.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::error::ProtocolError;
use crate::membership::types::Member;

/// Result of applying a `REGISTER` to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// The slot was empty and has been filled.
    New,
    /// The slot was already filled by the identical source address; nothing
    /// was mutated. The caller still acks.
    AlreadyRegistered,
}

#[derive(Debug, Clone)]
pub struct MembershipTable {
    slots: Vec<Option<Member>>,
    registered: usize,
}

impl MembershipTable {
    pub fn new(group_size: usize) -> Self {
        MembershipTable {
            slots: vec![None; group_size],
            registered: 0,
        }
    }

    pub fn group_size(&self) -> usize {
        self.slots.len()
    }

    /// Number of worker ranks currently registered (excludes rank 0).
    pub fn registered_count(&self) -> usize {
        self.registered
    }

    pub fn get(&self, rank: u32) -> Option<&Member> {
        self.slots.get(rank as usize).and_then(Option::as_ref)
    }

    /// Iterates over the filled slots in rank order.
    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    /// Ranks in `[0, group_size)` that have not registered.
    pub fn missing_ranks(&self) -> Vec<u32> {
        self.slots
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, slot)| slot.is_none())
            .map(|(rank, _)| rank as u32)
            .collect()
    }

    /// Applies a `REGISTER` from `addr` for `rank`.
    ///
    /// Worker ranks only: rank must be in `[1, group_size)`. A re-register
    /// from the identical source is an idempotent no-op; a re-register from
    /// a different source is rejected without mutating the slot.
    pub fn register(
        &mut self,
        rank: i64,
        addr: SocketAddr,
        cpus: u32,
        iwd: String,
        user: String,
    ) -> Result<RegisterOutcome, ProtocolError> {
        if rank < 1 || rank as usize >= self.slots.len() {
            return Err(ProtocolError::RankOutOfRange(rank, self.slots.len()));
        }
        let rank = rank as u32;
        match &self.slots[rank as usize] {
            Some(existing) if existing.addr == addr => Ok(RegisterOutcome::AlreadyRegistered),
            Some(existing) => Err(ProtocolError::SourceMismatch {
                expected: existing.addr,
                actual: addr,
            }),
            None => {
                self.slots[rank as usize] = Some(Member {
                    rank,
                    addr,
                    cpus,
                    iwd,
                    user,
                    last_alive: Instant::now(),
                    unique: true,
                });
                self.registered += 1;
                Ok(RegisterOutcome::New)
            }
        }
    }

    /// Re-stamps `last_alive` for a registered rank after verifying that the
    /// signal originated from the rank's recorded address (anti-spoofing).
    pub fn mark_alive(&mut self, rank: i64, addr: SocketAddr) -> Result<(), ProtocolError> {
        if rank < 0 || rank as usize >= self.slots.len() {
            return Err(ProtocolError::RankOutOfRange(rank, self.slots.len()));
        }
        let rank = rank as u32;
        match &mut self.slots[rank as usize] {
            None => Err(ProtocolError::NotRegistered(rank)),
            Some(member) if member.addr != addr => Err(ProtocolError::SourceMismatch {
                expected: member.addr,
                actual: addr,
            }),
            Some(member) => {
                member.last_alive = Instant::now();
                Ok(())
            }
        }
    }

    /// Registered ranks whose last liveness signal is older than `timeout`.
    pub fn stale_ranks(&self, timeout: Duration) -> Vec<u32> {
        let now = Instant::now();
        self.members()
            .filter(|member| now.duration_since(member.last_alive) > timeout)
            .map(|member| member.rank)
            .collect()
    }

    /// Pairwise duplicate-host detection across registered members.
    ///
    /// The coordinator's own host (`coordinator_ip`) counts as occupied:
    /// members sharing it, and later members sharing an earlier member's IP,
    /// are marked non-unique. Returns the number of members marked.
    pub fn mark_duplicate_hosts(&mut self, coordinator_ip: std::net::IpAddr) -> usize {
        let mut marked = 0;
        for i in 1..self.slots.len() {
            let Some(ip) = self.slots[i].as_ref().map(|m| m.addr.ip()) else {
                continue;
            };
            let mut duplicate = ip == coordinator_ip;
            if !duplicate {
                for j in 1..i {
                    if let Some(earlier) = self.slots[j].as_ref() {
                        if earlier.addr.ip() == ip {
                            duplicate = true;
                            break;
                        }
                    }
                }
            }
            if duplicate {
                if let Some(member) = self.slots[i].as_mut() {
                    member.unique = false;
                    marked += 1;
                }
            }
        }
        marked
    }
}
