//! # Pool Edges
//!
//! Unified representation of a single liquidity-pool hop across the protocols a
//! quoting source can return. The engine never re-derives swap math from the
//! state snapshot; it carries the snapshot through for downstream consumers
//! (display, transaction construction) untouched.
//!
//! ## Supported Protocols
//!
//! - **Constant product**: Uniswap V2-style pools (x * y = k reserves)
//! - **Concentrated liquidity**: Uniswap V3-style pools (sqrtPrice/liquidity/tick)

use crate::tokens::Token;
use ethers::types::U256;
use serde::{Deserialize, Serialize};

/// Protocol family of a pool hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProtocolKind {
    /// Uniswap V2-style constant product pool
    ConstantProduct,
    /// Uniswap V3-style concentrated liquidity pool
    ConcentratedLiquidity,
}

impl std::fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolKind::ConstantProduct => write!(f, "ConstantProduct"),
            ProtocolKind::ConcentratedLiquidity => write!(f, "ConcentratedLiquidity"),
        }
    }
}

/// Protocol-specific numeric snapshot taken verbatim from the quoting source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolState {
    /// Constant product reserves
    ConstantProduct { reserve0: U256, reserve1: U256 },
    /// Concentrated liquidity slot0 + liquidity
    ConcentratedLiquidity {
        sqrt_price_x96: U256,
        liquidity: u128,
        tick: i32,
    },
}

impl PoolState {
    pub fn kind(&self) -> ProtocolKind {
        match self {
            PoolState::ConstantProduct { .. } => ProtocolKind::ConstantProduct,
            PoolState::ConcentratedLiquidity { .. } => ProtocolKind::ConcentratedLiquidity,
        }
    }
}

/// One liquidity pool usable as a single hop in a route.
///
/// Edges are directed: `token_in` flows in, `token_out` flows out. A quoting
/// source that supports trading a pair both ways returns two edges.
///
/// Derived equality is full value equality (state snapshot included); use
/// [`PoolEdge::same_pool`] for structural pool identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolEdge {
    pub protocol_kind: ProtocolKind,
    pub token_in: Token,
    pub token_out: Token,
    /// Fee tier in basis points; only meaningful for concentrated liquidity
    /// (constant product pools carry their fixed fee here for uniformity).
    pub fee_bps: u32,
    pub pool_state: PoolState,
}

impl PoolEdge {
    /// Structural identity: (token_in, token_out, fee tier, protocol kind).
    ///
    /// Two edges between the same pair at different fee tiers are distinct
    /// pools. The state snapshot never participates in identity.
    pub fn same_pool(&self, other: &PoolEdge) -> bool {
        self.protocol_kind == other.protocol_kind
            && self.fee_bps == other.fee_bps
            && self.token_in == other.token_in
            && self.token_out == other.token_out
    }

    /// True when this edge connects `from` to `to` in that direction.
    pub fn connects(&self, from: &Token, to: &Token) -> bool {
        &self.token_in == from && &self.token_out == to
    }
}
