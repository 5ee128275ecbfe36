//! Reconstruction Task & Worker: the engine that
//! rebuilds missing internal blocks of a striped block group from its
//! surviving peers and streams the result to replacement nodes.

pub mod order;
mod reader_pool;
mod task;
mod worker;

pub use order::{ExtendedBlock, LiveSource, ReconstructionOrder, Target};
pub use reader_pool::ReaderPool;
pub use task::ReconstructionTask;
pub use worker::{ReconstructionWorker, WorkerConfig};
