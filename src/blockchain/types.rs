//! Chain-specific types and error definitions.

use std::fmt;

use alloy::rpc::types::BlockNumberOrTag;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Chain-head tags the prober tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockTag {
    Latest,
    Safe,
    Finalized,
}

impl BlockTag {
    /// The tag as it appears in `eth_getBlockByNumber` params.
    pub fn as_rpc(self) -> BlockNumberOrTag {
        match self {
            BlockTag::Latest => BlockNumberOrTag::Latest,
            BlockTag::Safe => BlockNumberOrTag::Safe,
            BlockTag::Finalized => BlockNumberOrTag::Finalized,
        }
    }
}

impl fmt::Display for BlockTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockTag::Latest => f.write_str("latest"),
            BlockTag::Safe => f.write_str("safe"),
            BlockTag::Finalized => f.write_str("finalized"),
        }
    }
}

/// A block height, displayed the way JSON-RPC quantities are (`0x101`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockNumber(pub u64);

impl BlockNumber {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for BlockNumber {
    fn from(n: u64) -> Self {
        Self(n)
    }
}

impl From<BlockNumber> for u64 {
    fn from(n: BlockNumber) -> Self {
        n.0
    }
}

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl Serialize for BlockNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Height plus the opaque hash a node reported for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockRef {
    pub number: BlockNumber,
    pub hash: String,
}

impl BlockRef {
    pub fn new(number: u64, hash: impl Into<String>) -> Self {
        Self {
            number: BlockNumber(number),
            hash: hash.into(),
        }
    }
}

/// Errors that can occur while querying an upstream node.
#[derive(Debug, Clone, Error)]
pub enum RpcError {
    /// Connection or HTTP transport failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Call did not complete within the configured timeout.
    #[error("RPC timeout after {0} ms")]
    Timeout(u64),

    /// Upstream answered with a non-success HTTP status.
    #[error("upstream returned HTTP {0}")]
    Status(u16),

    /// Upstream answered with a JSON-RPC error object.
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Response carried neither a result nor an error, or a null result.
    #[error("missing result for {0}")]
    MissingResult(&'static str),

    /// Result was present but could not be interpreted.
    #[error("malformed {method} response: {reason}")]
    Malformed {
        method: &'static str,
        reason: String,
    },
}

/// Result type for upstream RPC operations.
pub type RpcResult<T> = Result<T, RpcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_number_display() {
        assert_eq!(BlockNumber(0x101).to_string(), "0x101");
        assert_eq!(BlockNumber(0).to_string(), "0x0");
        assert_eq!(BlockNumber::from(225u64).to_string(), "0xe1");
    }

    #[test]
    fn test_block_number_serializes_as_quantity() {
        let json = serde_json::to_string(&BlockRef::new(0xc1, "hash_0xc1")).unwrap();
        assert_eq!(json, r#"{"number":"0xc1","hash":"hash_0xc1"}"#);
    }

    #[test]
    fn test_block_tag_params() {
        assert_eq!(serde_json::to_value(BlockTag::Safe.as_rpc()).unwrap(), "safe");
        assert_eq!(BlockTag::Finalized.to_string(), "finalized");
    }

    #[test]
    fn test_error_display() {
        let err = RpcError::Timeout(1000);
        assert_eq!(err.to_string(), "RPC timeout after 1000 ms");

        let err = RpcError::Rpc {
            code: -32601,
            message: "method not found".into(),
        };
        assert!(err.to_string().contains("-32601"));
    }
}
