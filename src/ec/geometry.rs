//! Striped-Block Geometry
//!
//! Pure functions over `(block_length L, cell_size C, data_units D)` that
//! describe how a block group is striped across `D + P` internal blocks
//! (columns). No I/O, no allocation beyond small return values.

use crate::error::{Error, Result};

/// `(data_units D, parity_units P, cell_size C)` for one erasure-coding
/// policy. `D + P` is the total number of internal blocks per group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErasureCodingPolicy {
    pub data_units: usize,
    pub parity_units: usize,
    pub cell_size: u64,
}

impl ErasureCodingPolicy {
    pub fn new(data_units: usize, parity_units: usize, cell_size: u64) -> Result<Self> {
        if data_units == 0 {
            return Err(Error::InvalidEcConfig("data_units must be > 0".into()));
        }
        if parity_units == 0 {
            return Err(Error::InvalidEcConfig("parity_units must be > 0".into()));
        }
        if cell_size == 0 {
            return Err(Error::InvalidEcConfig("cell_size must be > 0".into()));
        }
        Ok(Self {
            data_units,
            parity_units,
            cell_size,
        })
    }

    pub fn total_units(&self) -> usize {
        self.data_units + self.parity_units
    }
}

/// `ceil(L / C)`, the number of stripe rows (cells) in the group.
pub fn cells_in_group(block_length: u64, cell_size: u64) -> u64 {
    block_length.div_ceil(cell_size)
}

/// `min(cells_in_group, D)`, how many columns actually carry a live cell,
/// and therefore the number of source buffers the decoder needs per window.
pub fn min_required_sources(block_length: u64, policy: &ErasureCodingPolicy) -> usize {
    let cells = cells_in_group(block_length, policy.cell_size);
    std::cmp::min(cells, policy.data_units as u64) as usize
}

/// Byte length of internal block (column) `i` for a group of total length
/// `L` striped with cell size `C` across `D` data columns.
///
/// Cells cycle round-robin across the `D` data columns; parity columns
/// (`i >= D`) always have the same length as data column 0 (the fullest
/// column), since every stripe row contributes a parity cell as long as the
/// row itself exists.
pub fn internal_block_length(block_length: u64, policy: &ErasureCodingPolicy, i: usize) -> u64 {
    let d = policy.data_units as u64;
    let c = policy.cell_size;
    let stripe_size = c * d;
    if stripe_size == 0 {
        return 0;
    }

    let last_stripe_data_len = block_length % stripe_size;
    if last_stripe_data_len == 0 {
        // Block length divides evenly into full stripes; every column
        // (data or parity) carries exactly the same number of cells.
        return block_length / d;
    }

    let num_stripes = (block_length - 1) / stripe_size + 1;
    (num_stripes - 1) * c + last_cell_size(last_stripe_data_len, c, policy.data_units, i)
}

/// Length of internal block `i`'s share of the final, possibly-partial
/// stripe, given `size` = the bytes spanned by that last stripe.
fn last_cell_size(size: u64, cell_size: u64, data_units: usize, i: usize) -> u64 {
    if i < data_units {
        let consumed = i as u64 * cell_size;
        if size <= consumed {
            0
        } else {
            std::cmp::min(size - consumed, cell_size)
        }
    } else {
        // Parity columns mirror data column 0's share of the last stripe.
        last_cell_size(size, cell_size, data_units, 0)
    }
}

/// Stable, deterministic identity for internal block `i` of a block group,
/// derived from the group's `(pool_id, block_id, generation_stamp)` and the
/// column index. Implementation-defined but both the source and target node
/// must agree, so we fold the column index into the low bits of the block
/// id exactly as a striped layout would place it on disk.
pub fn construct_internal_block_id(pool_id: u32, block_id: u64, generation_stamp: u64, i: usize) -> InternalBlockId {
    InternalBlockId {
        pool_id,
        block_id: block_id.wrapping_add(i as u64),
        generation_stamp,
        index: i,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InternalBlockId {
    pub pool_id: u32,
    pub block_id: u64,
    pub generation_stamp: u64,
    pub index: usize,
}

/// Round a raw configured buffer size down to a multiple of `chunk_size`,
/// never going below `chunk_size` itself.
pub fn slice_size(raw_buffer_size: u64, chunk_size: u64) -> u64 {
    if chunk_size == 0 {
        return raw_buffer_size;
    }
    let rounded = (raw_buffer_size / chunk_size) * chunk_size;
    rounded.max(chunk_size)
}
