//! Domain Ports (DDD Port/Adapter Pattern)
//!
//! The reconstruction engine treats several concerns as external
//! collaborators with named interfaces only: block access-token
//! issuance, peer connection establishment, and reporting corrupt replicas
//! back to the cluster controller. Infrastructure adapters implement these
//! traits; the engine only ever depends on the trait.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Engine (ec::reconstruction)              │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                    Ports (Traits)                    │    │
//! │  │  PeerConnectionFactory │ BlockTokenIssuer │ CorruptionSink │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Infrastructure Layer (adapters)             │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │  TcpPeerConnectionFactory │ StaticTokenIssuer │ LoggingCorruptionSink │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use tokio::net::TcpStream;

use crate::error::Result;

// =============================================================================
// Value Objects
// =============================================================================

/// Network address of a peer storage node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerAddress(pub String);

impl PeerAddress {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Storage class requested for a rebuilt replica (policy hint only; the
/// engine never interprets it).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageClass(pub String);

/// Which side of a block transfer a token authorizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenScope {
    Read,
    Write,
}

/// Opaque access token scoped to one block and one direction. Issuance and
/// validation live entirely outside this crate; the engine only carries the
/// bytes across the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockAccessToken(pub Vec<u8>);

/// A corrupt `(block, peer)` pair observed during a read, collected per
/// iteration and flushed to the cluster controller regardless of the task's
/// overall outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorruptionReport {
    pub block_id: u64,
    pub internal_index: usize,
    pub peer: PeerAddress,
}

// =============================================================================
// Peer Connection Factory Port
// =============================================================================

/// Port for opening a connection to a peer storage node. The command
/// dispatch layer and caching hints that would normally influence peer
/// selection are out of scope; this port only opens the socket.
#[async_trait]
pub trait PeerConnectionFactory: Send + Sync {
    async fn connect(&self, peer: &PeerAddress) -> Result<TcpStream>;
}

// =============================================================================
// Block Access Token Port
// =============================================================================

/// Port for obtaining a block access token scoped to a read or write of one
/// internal block. Real token issuance/validation is an authenticated
/// session handshake owned by the cluster controller; this crate
/// only needs something to hand the peer during the handshake.
#[async_trait]
pub trait BlockTokenIssuer: Send + Sync {
    async fn issue(&self, block_id: u64, scope: TokenScope) -> Result<BlockAccessToken>;
}

// =============================================================================
// Corruption Sink Port
// =============================================================================

/// Port for flushing a per-iteration corruption report to the cluster
/// controller so it can invalidate the offending replicas. The controller
/// itself is out of scope; this is the named interface the task
/// writes through.
#[async_trait]
pub trait CorruptionSink: Send + Sync {
    async fn report(&self, reports: Vec<CorruptionReport>) -> Result<()>;
}
