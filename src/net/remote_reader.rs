//! Remote Block Reader Adapter
//!
//! Opens a connection to a peer, performs a READ-scoped handshake, and
//! yields bytes of one internal block starting at a given offset in
//! checksum-chunk-sized pieces, validating each chunk's checksum as it
//! arrives.

use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tracing::debug;

use crate::domain::ports::{BlockTokenIssuer, PeerAddress, PeerConnectionFactory, TokenScope};
use crate::error::{Error, Result};
use crate::net::packet::{
    read_framed, write_framed, ChecksumDescriptor, ReadBlockReply, ReadBlockRequest,
};

/// A streaming reader over one internal block on one peer.
pub struct RemoteBlockReader {
    stream: TcpStream,
    checksum_descriptor: ChecksumDescriptor,
    peer: PeerAddress,
    internal_block_id: u64,
}

impl RemoteBlockReader {
    /// Opens a connection, performs the READ handshake, and positions the
    /// stream at `start_offset` within the internal block.
    pub async fn open(
        connector: &Arc<dyn PeerConnectionFactory>,
        tokens: &Arc<dyn BlockTokenIssuer>,
        peer: PeerAddress,
        internal_block_id: u64,
        start_offset: u64,
    ) -> Result<Self> {
        let mut stream = connector.connect(&peer).await?;
        let token = tokens.issue(internal_block_id, TokenScope::Read).await?;
        let request = ReadBlockRequest {
            internal_block_id,
            access_token: token.0,
            start_offset,
        };
        write_framed(&mut stream, &request).await?;
        let reply: ReadBlockReply = read_framed(&mut stream).await?;
        debug!(peer = %peer, internal_block_id, start_offset, "opened remote block reader");
        Ok(Self {
            stream,
            checksum_descriptor: reply.checksum_descriptor,
            peer,
            internal_block_id,
        })
    }

    pub fn checksum_descriptor(&self) -> ChecksumDescriptor {
        self.checksum_descriptor
    }

    pub fn peer(&self) -> &PeerAddress {
        &self.peer
    }

    pub fn internal_block_id(&self) -> u64 {
        self.internal_block_id
    }

    /// Reads exactly `len` bytes into `buf[..len]`, validating the
    /// checksum of every chunk as it arrives. Returns the number of bytes
    /// actually read, which is `< len` only if the peer's stream ended
    /// early (end of internal block).
    pub async fn read_slice(&mut self, buf: &mut [u8], len: usize) -> Result<usize> {
        debug_assert!(buf.len() >= len);
        let chunk_size = self.checksum_descriptor.bytes_per_checksum.max(1) as usize;
        let checksum_size = self.checksum_descriptor.checksum_size as usize;
        let mut filled = 0usize;

        while filled < len {
            let want = std::cmp::min(chunk_size, len - filled);
            let mut checksum_buf = vec![0u8; checksum_size];
            match self.stream.read_exact(&mut checksum_buf).await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(Error::Io(e)),
            }
            let data = &mut buf[filled..filled + want];
            self.stream.read_exact(data).await.map_err(Error::Io)?;

            if !crate::net::packet::verify_checksums(data, chunk_size as u32, &checksum_buf) {
                return Err(Error::ChecksumMismatch {
                    internal_block_id: self.internal_block_id,
                    peer: self.peer.to_string(),
                });
            }
            filled += want;
        }
        Ok(filled)
    }

    /// Closes the underlying socket. Best-effort: errors are swallowed, the
    /// socket is released regardless.
    pub async fn close(mut self) {
        use tokio::io::AsyncWriteExt;
        let _ = self.stream.shutdown().await;
    }
}
