//! Target Channel Adapter
//!
//! Opens a connection to a target peer, performs a WRITE-scoped handshake
//! carrying the write-block request, then accepts framed data packets for
//! transmission until an empty terminator packet is sent. No acknowledgement
//! is ever read back.

use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use tracing::debug;

use crate::domain::ports::{
    BlockTokenIssuer, PeerAddress, PeerConnectionFactory, StorageClass, TokenScope,
};
use crate::error::{Error, Result};
use crate::net::packet::{
    chunk_checksums, write_framed, ChecksumDescriptor, PacketHeader, PipelineStage,
    WriteBlockRequest,
};

/// Per-target outbound state: connected socket, running byte offset,
/// monotone packet sequence number, and an alive flag.
pub struct TargetChannel {
    stream: BufWriter<TcpStream>,
    peer: PeerAddress,
    checksum_descriptor: ChecksumDescriptor,
    block_offset: u64,
    seq_no: u64,
    alive: bool,
}

impl TargetChannel {
    /// Opens the connection and sends the write-block handshake.
    #[allow(clippy::too_many_arguments)]
    pub async fn open(
        connector: &std::sync::Arc<dyn PeerConnectionFactory>,
        tokens: &std::sync::Arc<dyn BlockTokenIssuer>,
        peer: PeerAddress,
        internal_block_id: u64,
        storage_class: StorageClass,
        source_descriptor: String,
        checksum_descriptor: ChecksumDescriptor,
    ) -> Result<Self> {
        let mut stream = connector.connect(&peer).await?;
        let token = tokens.issue(internal_block_id, TokenScope::Write).await?;
        let request = WriteBlockRequest {
            internal_block_id,
            storage_class: storage_class.0,
            access_token: token.0,
            source_descriptor,
            stage: PipelineStage::PipelineSetupCreate,
            checksum_descriptor,
        };
        write_framed(&mut stream, &request).await?;
        debug!(peer = %peer, internal_block_id, "opened target channel");
        Ok(Self {
            stream: BufWriter::new(stream),
            peer,
            checksum_descriptor,
            block_offset: 0,
            seq_no: 0,
            alive: true,
        })
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn peer(&self) -> &PeerAddress {
        &self.peer
    }

    pub fn mark_dead(&mut self) {
        self.alive = false;
    }

    /// Sends `data` as one or more data packets, each bounded by
    /// `ChecksumDescriptor::max_chunks_per_packet`. Marks the
    /// channel dead and returns the I/O error on any failure; does not
    /// retry.
    pub async fn send_data(&mut self, data: &[u8]) -> Result<()> {
        if !self.alive {
            return Err(Error::Internal(format!("target {} is dead", self.peer)));
        }
        if data.is_empty() {
            return Ok(());
        }

        let bpc = self.checksum_descriptor.bytes_per_checksum;
        let max_payload = self.checksum_descriptor.max_chunks_per_packet() * bpc as usize;
        let mut offset = 0usize;

        while offset < data.len() {
            let take = std::cmp::min(max_payload, data.len() - offset);
            let slice = &data[offset..offset + take];
            if let Err(e) = self.write_packet(self.block_offset, self.seq_no, false, slice).await {
                self.alive = false;
                return Err(e);
            }
            self.block_offset += take as u64;
            self.seq_no += 1;
            offset += take;
        }
        Ok(())
    }

    /// Sends the empty terminator packet and flushes the stream. A target
    /// that already died mid-transfer never receives a terminator
    /// (dead-means-silent).
    pub async fn send_terminator(&mut self) -> Result<()> {
        if !self.alive {
            return Ok(());
        }
        if let Err(e) = self.write_packet(self.block_offset, self.seq_no, true, &[]).await {
            self.alive = false;
            return Err(e);
        }
        if let Err(e) = self.stream.flush().await {
            self.alive = false;
            return Err(Error::Io(e));
        }
        Ok(())
    }

    async fn write_packet(
        &mut self,
        block_offset: u64,
        seq_no: u64,
        is_last: bool,
        data: &[u8],
    ) -> Result<()> {
        let header = PacketHeader {
            block_offset,
            seq_no,
            is_last,
            data_len: data.len() as u32,
        };
        write_framed(&mut self.stream, &header).await?;
        if !data.is_empty() {
            let sums = chunk_checksums(data, self.checksum_descriptor.bytes_per_checksum);
            for s in &sums {
                self.stream.write_all(s).await.map_err(Error::Io)?;
            }
            self.stream.write_all(data).await.map_err(Error::Io)?;
        }
        Ok(())
    }

    /// Closes the underlying socket. Best-effort.
    pub async fn close(mut self) {
        let _ = self.stream.flush().await;
        let _ = self.stream.get_mut().shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{StaticBlockTokenIssuer, TcpPeerConnectionFactory};
    use crate::net::packet::{read_framed, verify_checksums};
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use std::sync::Arc;

    #[tokio::test]
    async fn streams_data_then_terminator() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let bpc = 16u32;

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let _req: WriteBlockRequest = read_framed(&mut stream).await.unwrap();

            let mut packets = Vec::new();
            loop {
                let header: PacketHeader = read_framed(&mut stream).await.unwrap();
                if header.is_last {
                    packets.push((header, Vec::new()));
                    break;
                }
                let n_chunks = header.data_len.div_ceil(bpc) as usize;
                let mut sums = vec![0u8; n_chunks * 4];
                stream.read_exact(&mut sums).await.unwrap();
                let mut data = vec![0u8; header.data_len as usize];
                stream.read_exact(&mut data).await.unwrap();
                assert!(verify_checksums(&data, bpc, &sums));
                packets.push((header, data));
            }
            packets
        });

        let connector: Arc<dyn PeerConnectionFactory> =
            Arc::new(TcpPeerConnectionFactory::new(std::time::Duration::from_secs(1)));
        let tokens: Arc<dyn crate::domain::ports::BlockTokenIssuer> = Arc::new(StaticBlockTokenIssuer);
        let peer = PeerAddress::new(addr.to_string());
        let descriptor = ChecksumDescriptor::crc32c(bpc);

        let mut channel = TargetChannel::open(
            &connector,
            &tokens,
            peer,
            42,
            StorageClass("hot".into()),
            "src".into(),
            descriptor,
        )
        .await
        .unwrap();

        let payload = vec![3u8; 100];
        channel.send_data(&payload).await.unwrap();
        channel.send_terminator().await.unwrap();
        channel.close().await;

        let packets = server.await.unwrap();
        let total: usize = packets.iter().map(|(h, d)| {
            assert_eq!(d.len(), h.data_len as usize);
            d.len()
        }).sum();
        assert_eq!(total, 100);
        let last = packets.last().unwrap();
        assert!(last.0.is_last);
        assert_eq!(last.0.data_len, 0);

        // seq numbers contiguous from 0, offsets chain.
        let mut expected_offset = 0u64;
        for (i, (h, d)) in packets.iter().enumerate() {
            assert_eq!(h.seq_no, i as u64);
            assert_eq!(h.block_offset, expected_offset);
            expected_offset += d.len() as u64;
        }
    }

    #[tokio::test]
    async fn dead_channel_skips_terminator() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut stream = stream;
            let _req: WriteBlockRequest = read_framed(&mut stream).await.unwrap();
            drop(stream);
        });

        let connector: Arc<dyn PeerConnectionFactory> =
            Arc::new(TcpPeerConnectionFactory::new(std::time::Duration::from_secs(1)));
        let tokens: Arc<dyn crate::domain::ports::BlockTokenIssuer> = Arc::new(StaticBlockTokenIssuer);
        let peer = PeerAddress::new(addr.to_string());
        let descriptor = ChecksumDescriptor::crc32c(16);

        let mut channel = TargetChannel::open(
            &connector,
            &tokens,
            peer,
            1,
            StorageClass("cold".into()),
            "src".into(),
            descriptor,
        )
        .await
        .unwrap();
        channel.mark_dead();
        assert!(!channel.is_alive());
        assert!(channel.send_terminator().await.is_ok());
    }
}
