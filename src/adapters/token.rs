//! Block Access Token Adapter
//!
//! Real token issuance is owned by the cluster controller's authenticated
//! session layer. This adapter is the degenerate
//! default used wherever the engine is driven without a controller attached
//! (tests, local tooling): it mints a deterministic opaque token so the
//! handshake has something to send, without asserting anything about its
//! validity.

use async_trait::async_trait;

use crate::domain::ports::{BlockAccessToken, BlockTokenIssuer, TokenScope};
use crate::error::Result;

#[derive(Debug, Clone, Default)]
pub struct StaticBlockTokenIssuer;

#[async_trait]
impl BlockTokenIssuer for StaticBlockTokenIssuer {
    async fn issue(&self, block_id: u64, scope: TokenScope) -> Result<BlockAccessToken> {
        let tag = match scope {
            TokenScope::Read => 0u8,
            TokenScope::Write => 1u8,
        };
        let mut bytes = block_id.to_be_bytes().to_vec();
        bytes.push(tag);
        Ok(BlockAccessToken(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_and_write_tokens_for_the_same_block_differ() {
        let issuer = StaticBlockTokenIssuer;
        let read = issuer.issue(42, TokenScope::Read).await.unwrap();
        let write = issuer.issue(42, TokenScope::Write).await.unwrap();
        assert_ne!(read, write);
    }
}
