//! # Freshness Validator
//!
//! Decides whether a block-anchored value is recent enough to trust. Two
//! independent checks: an age window against the current chain head, and a
//! per-chain monotonic floor. Once a more recent on-chain observation has been
//! seen (a confirmed receipt at block N, say), no older-block data is treated
//! as fresh again even when it is numerically within the age window.
//!
//! The floor map is the only state here; it is take-the-max-only, so the
//! `DashMap` entry update is race-free without any wider locking.

use dashmap::DashMap;
use log::debug;

/// Per-chain monotonic block floors plus the age-window check.
#[derive(Debug, Default)]
pub struct FreshnessTracker {
    floors: DashMap<u64, u64>,
}

impl FreshnessTracker {
    pub fn new() -> Self {
        Self {
            floors: DashMap::new(),
        }
    }

    /// True when `candidate_block` is usable: the current head is known, the
    /// candidate is within `max_age` blocks of it, and the candidate is not
    /// below the chain's floor.
    pub fn is_fresh(
        &self,
        chain_id: u64,
        candidate_block: u64,
        current_block: Option<u64>,
        max_age: u64,
    ) -> bool {
        let current = match current_block {
            Some(b) => b,
            None => return false,
        };
        if current.saturating_sub(candidate_block) > max_age {
            return false;
        }
        match self.floor(chain_id) {
            Some(floor) => candidate_block >= floor,
            None => true,
        }
    }

    /// Raises the chain's floor to `observed_block` if higher. Never lowers.
    pub fn raise_floor(&self, chain_id: u64, observed_block: u64) {
        self.floors
            .entry(chain_id)
            .and_modify(|floor| {
                if observed_block > *floor {
                    debug!(
                        "freshness floor for chain {} raised {} -> {}",
                        chain_id, floor, observed_block
                    );
                    *floor = observed_block;
                }
            })
            .or_insert(observed_block);
    }

    pub fn floor(&self, chain_id: u64) -> Option<u64> {
        self.floors.get(&chain_id).map(|f| *f)
    }
}
