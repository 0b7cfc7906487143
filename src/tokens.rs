//! # Token Types
//!
//! Chain-scoped token identity used throughout the quote engine. A token is a
//! value type; two tokens are the same token exactly when they share a chain id
//! and a contract address. Decimals and symbol are display metadata and never
//! participate in equality or hashing.

use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// A token on a specific chain.
///
/// Created fresh from every quote response and discarded after trade assembly;
/// nothing in the engine persists tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    /// EVM chain id (e.g., 42161 for Arbitrum One)
    pub chain_id: u64,
    /// Token contract address
    pub address: Address,
    /// ERC-20 decimals
    pub decimals: u8,
    /// Display symbol (e.g., "WETH")
    pub symbol: String,
}

impl Token {
    pub fn new(chain_id: u64, address: Address, decimals: u8, symbol: impl Into<String>) -> Self {
        Self {
            chain_id,
            address,
            decimals,
            symbol: symbol.into(),
        }
    }

    /// True when both tokens denote the same asset on the same chain.
    pub fn is_same(&self, other: &Token) -> bool {
        self == other
    }
}

// Identity is (chain_id, address); decimals/symbol are metadata.
impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.chain_id == other.chain_id && self.address == other.address
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.chain_id.hash(state);
        self.address.hash(state);
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.symbol, self.chain_id)
    }
}
