//! Input command types for one reconstruction order.

use crate::domain::ports::{PeerAddress, StorageClass};
use crate::ec::geometry::ErasureCodingPolicy;

/// `(pool_id, block_id, generation_stamp)` plus the total byte length `L` of
/// the block group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendedBlock {
    pub pool_id: u32,
    pub block_id: u64,
    pub generation_stamp: u64,
    pub block_length: u64,
}

/// `(internal_index, peer_address)`, a surviving internal block this task
/// may read from.
#[derive(Debug, Clone)]
pub struct LiveSource {
    pub internal_index: usize,
    pub peer: PeerAddress,
}

/// `(internal_index_to_reconstruct, peer_address, storage_class)`, a
/// replacement node elected to receive a rebuilt internal block.
#[derive(Debug, Clone)]
pub struct Target {
    pub internal_index: usize,
    pub peer: PeerAddress,
    pub storage_class: StorageClass,
}

/// One reconstruction order as delivered by the command-dispatch layer.
#[derive(Debug, Clone)]
pub struct ReconstructionOrder {
    pub extended_block: ExtendedBlock,
    pub policy: ErasureCodingPolicy,
    pub live_sources: Vec<LiveSource>,
    pub targets: Vec<Target>,
}

impl ReconstructionOrder {
    /// Validates the invariants required of the input: source indices
    /// unique and sufficient, target indices disjoint from sources and
    /// bounded by parity count.
    pub fn validate(&self) -> Result<(), String> {
        use std::collections::HashSet;

        let mut source_indices = HashSet::new();
        for s in &self.live_sources {
            if !source_indices.insert(s.internal_index) {
                return Err(format!("duplicate live source index {}", s.internal_index));
            }
        }

        let min_required = crate::ec::geometry::min_required_sources(
            self.extended_block.block_length,
            &self.policy,
        );
        if self.live_sources.len() < min_required {
            return Err(format!(
                "only {} live sources, need at least {}",
                self.live_sources.len(),
                min_required
            ));
        }

        let mut target_indices = HashSet::new();
        for t in &self.targets {
            if source_indices.contains(&t.internal_index) {
                return Err(format!(
                    "target index {} overlaps a live source",
                    t.internal_index
                ));
            }
            if !target_indices.insert(t.internal_index) {
                return Err(format!("duplicate target index {}", t.internal_index));
            }
        }
        if self.targets.len() > self.policy.parity_units {
            return Err(format!(
                "{} targets exceeds parity_units {}",
                self.targets.len(),
                self.policy.parity_units
            ));
        }

        Ok(())
    }
}
