//! Data-Transfer Networking
//!
//! The Remote Block Reader and Target Channel adapters the Reconstruction
//! Task drives, plus the wire framing they share.

pub mod packet;
pub mod remote_reader;
pub mod target_channel;

pub use remote_reader::RemoteBlockReader;
pub use target_channel::TargetChannel;
