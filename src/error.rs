//! Error types for the striped-block reconstruction engine.
//!
//! Variants describe *behavior* (per-read failure, per-target failure,
//! task-fatal) rather than naming the subsystem that raised them, since a
//! reconstruction task never propagates a fault to the Worker or to other
//! tasks; everything below is fatal to one task at most.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// I/O error from a peer socket (connect, read, write, handshake).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Per-read checksum mismatch against a source peer.
    #[error("checksum mismatch reading internal block {internal_block_id} from {peer}")]
    ChecksumMismatch { internal_block_id: u64, peer: String },

    /// A single slice read exceeded the configured per-slice deadline. Not
    /// necessarily fatal: the caller schedules a replacement and discards
    /// the late completion if it ever arrives.
    #[error("slice read from {peer} timed out")]
    ReadTimeout { peer: String },

    /// Fewer than `min_required_sources` usable readers could be assembled,
    /// either at task initialization or mid-task after exhausting
    /// replacements. Fatal to the task.
    #[error("insufficient sources: have {available}, need {required}")]
    InsufficientSources { available: usize, required: usize },

    /// No target remained alive after a window's transfer phase.
    /// Fatal to the task.
    #[error("all targets dead for block group {block_id}")]
    AllTargetsDead { block_id: u64 },

    /// Every missing internal index had zero length; the task has nothing
    /// to rebuild. Not an error outcome: the Worker
    /// drops the order with a warning instead of enqueuing it.
    #[error("no valid target to reconstruct for block group {block_id}")]
    NoValidTargets { block_id: u64 },

    /// The erasure-coding policy or a block group's derived geometry is
    /// invalid (e.g. zero data/parity units, disjointness violated).
    #[error("invalid erasure-coding configuration: {0}")]
    InvalidEcConfig(String),

    /// Reed-Solomon encode/decode raised. Fatal to the task.
    #[error("erasure coding failure: {0}")]
    EcFailure(String),

    /// Fewer than `data_units` shards were available for the decoder.
    #[error("insufficient shards for decode: available {available}, required {required}")]
    InsufficientShards { available: usize, required: usize },

    /// The task thread was interrupted; outstanding reads are cancelled and
    /// the task aborts.
    #[error("reconstruction task interrupted")]
    Interrupted,

    /// Catch-all for conditions that don't fit a more specific variant
    /// (malformed control messages, pool shutdown races, etc.).
    #[error("internal error: {0}")]
    Internal(String),
}
