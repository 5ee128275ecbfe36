//! TCP Peer Connection Adapter
//!
//! Implements the `PeerConnectionFactory` port by opening a plain TCP
//! connection to a peer's data-transfer address. Connect timeout uses the
//! node's global socket timeout; per-read timeouts are handled by
//! the caller around individual slice reads, not here.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::debug;

use crate::domain::ports::{PeerAddress, PeerConnectionFactory};
use crate::error::{Error, Result};

/// Opens real TCP sockets to peer storage nodes.
#[derive(Debug, Clone)]
pub struct TcpPeerConnectionFactory {
    connect_timeout: Duration,
}

impl TcpPeerConnectionFactory {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl PeerConnectionFactory for TcpPeerConnectionFactory {
    async fn connect(&self, peer: &PeerAddress) -> Result<TcpStream> {
        debug!(peer = %peer, "opening peer connection");
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(peer.as_str()))
            .await
            .map_err(|_| Error::Internal(format!("connect to {peer} timed out")))?
            .map_err(Error::Io)?;
        stream.set_nodelay(true).ok();
        Ok(stream)
    }
}
