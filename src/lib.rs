//! Striped-block reconstruction engine for a distributed storage node.
//!
//! Rebuilds missing internal blocks of an erasure-coded, striped block
//! group by reading a minimum-required set of surviving peers through a
//! windowed pipeline, decoding with Reed-Solomon, and streaming the
//! rebuilt bytes to replacement nodes over a checksum-framed wire
//! protocol. Routes dynamically around slow or corrupt sources as it
//! goes.
//!
//! # Modules
//!
//! - [`domain`]: ports, named interfaces to collaborators outside this
//!   crate (peer connections, block access tokens, corruption reporting).
//! - [`adapters`]: infrastructure implementations of those ports.
//! - [`net`]: wire protocol, checksum-framed packets, the streaming
//!   source reader, and the streaming target writer.
//! - [`ec`]: erasure-coding geometry, the Reed-Solomon encoder/decoder,
//!   and the reconstruction engine itself (Task + Worker).
//! - [`metrics`]: Prometheus registry and `/metrics` exposition server.
//! - [`error`]: the crate's error taxonomy.

pub mod adapters;
pub mod domain;
pub mod ec;
pub mod error;
pub mod metrics;
pub mod net;

pub use ec::reconstruction::{ReconstructionOrder, ReconstructionTask, ReconstructionWorker, WorkerConfig};
pub use error::{Error, Result};
