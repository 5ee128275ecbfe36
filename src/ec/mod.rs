//! Erasure Coding
//!
//! # Components
//!
//! - **Geometry** (`geometry.rs`): pure functions over `(block_length,
//!   cell_size, data_units)` describing how a block group is striped
//!   across its `D + P` internal blocks: cell counts, per-column lengths
//!   (including the uneven last stripe), internal block identity, and the
//!   read-buffer rounding rule `slice_size`.
//!
//! - **Encoder/Decoder** (`encoder.rs`): Reed-Solomon encoding and decoding
//!   via the `reed-solomon-erasure` crate. `EcDecoder::reconstruct` is the
//!   primitive the reconstruction engine calls once per window.
//!
//! - **Reconstruction** (`reconstruction/`): the windowed reconstruction
//!   engine itself. `ReconstructionTask` runs one order end to end,
//!   `ReconstructionWorker` owns the Task Pool and the shared Reader Pool
//!   that tasks read through.

pub mod encoder;
pub mod geometry;
pub mod reconstruction;

#[cfg(test)]
mod proptest;

pub use geometry::{ErasureCodingPolicy, InternalBlockId};
pub use reconstruction::{
    ExtendedBlock, LiveSource, ReconstructionOrder, ReconstructionTask, ReconstructionWorker,
    Target, WorkerConfig,
};
