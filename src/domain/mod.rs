//! Domain Layer
//!
//! Contains the trait abstractions (ports) the reconstruction engine depends
//! on for its external collaborators: peer connection establishment, block
//! access-token issuance, and corruption reporting to the cluster
//! controller.

pub mod ports;

pub use ports::{
    BlockAccessToken, BlockTokenIssuer, CorruptionReport, CorruptionSink, PeerAddress,
    PeerConnectionFactory, StorageClass, TokenScope,
};
