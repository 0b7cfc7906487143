//! # Quote Wire Format
//!
//! Serde types for the external quote-fetch collaborator. Amounts, block
//! numbers, and pool-state integers travel as strings (JSON numbers cannot
//! hold uint256), so decoding into domain types goes through `convert`.
//!
//! A "no route" reply is a structured error body with an explicit code,
//! distinguishable from transport failure; `WireErrorBody::is_no_route`
//! implements that distinction.

use crate::convert::{
    parse_address, parse_block_number, parse_decimal, parse_u128, parse_u256, ConversionError,
};
use crate::pools::{PoolEdge, PoolState, ProtocolKind};
use crate::tokens::Token;
use serde::{Deserialize, Serialize};

/// Error code a quoting service uses for an authoritative "no route" answer.
pub const NO_ROUTE_ERROR_CODE: &str = "NO_ROUTE";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireQuoteRequest {
    pub token_in_address: String,
    pub token_in_chain_id: u64,
    pub token_in_decimals: u8,
    pub token_in_symbol: String,
    pub token_out_address: String,
    pub token_out_chain_id: u64,
    pub token_out_decimals: u8,
    pub token_out_symbol: String,
    /// String-encoded integer amount in raw token units
    pub amount: String,
    /// "exactIn" | "exactOut"
    pub trade_type: String,
    pub protocol_preferences: Vec<ProtocolKind>,
    pub distribution_percent: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireToken {
    pub address: String,
    pub chain_id: u64,
    pub decimals: u8,
    pub symbol: String,
}

/// Protocol-specific state snapshot; the two shapes share no fields so an
/// untagged enum deserializes unambiguously.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged, rename_all = "camelCase")]
pub enum WirePoolState {
    #[serde(rename_all = "camelCase")]
    ConcentratedLiquidity {
        sqrt_price_x96: String,
        liquidity: String,
        tick: i32,
    },
    #[serde(rename_all = "camelCase")]
    ConstantProduct { reserve0: String, reserve1: String },
}

/// One hop of one candidate route, carrying the source's verbatim amounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireHop {
    pub protocol_kind: ProtocolKind,
    pub token_in: WireToken,
    pub token_out: WireToken,
    #[serde(default)]
    pub fee_tier: Option<u32>,
    pub pool_state: WirePoolState,
    pub amount_in: String,
    pub amount_out: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireQuoteResponse {
    /// Candidate routes, each an ordered list of hops
    pub route: Vec<Vec<WireHop>>,
    pub block_number: String,
    pub quote_amount: String,
    #[serde(default, rename = "gasUseEstimateUSD")]
    pub gas_use_estimate_usd: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireErrorBody {
    pub error_code: String,
    #[serde(default)]
    pub detail: Option<String>,
}

impl WireErrorBody {
    pub fn is_no_route(&self) -> bool {
        self.error_code == NO_ROUTE_ERROR_CODE
    }
}

impl WireToken {
    pub fn to_token(&self) -> Result<Token, ConversionError> {
        Ok(Token::new(
            self.chain_id,
            parse_address(&self.address)?,
            self.decimals,
            self.symbol.clone(),
        ))
    }

    pub fn from_token(token: &Token) -> Self {
        Self {
            address: crate::convert::address_to_string(token.address),
            chain_id: token.chain_id,
            decimals: token.decimals,
            symbol: token.symbol.clone(),
        }
    }
}

impl WirePoolState {
    pub fn to_pool_state(&self) -> Result<PoolState, ConversionError> {
        match self {
            WirePoolState::ConstantProduct { reserve0, reserve1 } => {
                Ok(PoolState::ConstantProduct {
                    reserve0: parse_u256(reserve0)?,
                    reserve1: parse_u256(reserve1)?,
                })
            }
            WirePoolState::ConcentratedLiquidity {
                sqrt_price_x96,
                liquidity,
                tick,
            } => Ok(PoolState::ConcentratedLiquidity {
                sqrt_price_x96: parse_u256(sqrt_price_x96)?,
                liquidity: parse_u128(liquidity)?,
                tick: *tick,
            }),
        }
    }
}

impl WireHop {
    pub fn to_edge(&self) -> Result<PoolEdge, ConversionError> {
        Ok(PoolEdge {
            protocol_kind: self.protocol_kind,
            token_in: self.token_in.to_token()?,
            token_out: self.token_out.to_token()?,
            fee_bps: self.fee_tier.unwrap_or(30),
            pool_state: self.pool_state.to_pool_state()?,
        })
    }
}

/// One decoded candidate route: its edges and the source's amounts for it.
#[derive(Debug, Clone)]
pub struct RawRoute {
    pub edges: Vec<PoolEdge>,
    pub amount_in: rust_decimal::Decimal,
    pub amount_out: rust_decimal::Decimal,
}

/// A decoded quote response, ready for graph building and assembly.
#[derive(Debug, Clone)]
pub struct RawQuote {
    pub routes: Vec<RawRoute>,
    pub block_number: Option<u64>,
    pub gas_use_estimate_usd: Option<rust_decimal::Decimal>,
}

impl WireQuoteResponse {
    /// Decodes into domain types. Route amounts are the first hop's input and
    /// the last hop's output, verbatim.
    pub fn decode(&self) -> Result<RawQuote, ConversionError> {
        let mut routes = Vec::with_capacity(self.route.len());
        for hops in &self.route {
            if hops.is_empty() {
                continue;
            }
            let edges = hops
                .iter()
                .map(WireHop::to_edge)
                .collect::<Result<Vec<_>, _>>()?;
            let amount_in = parse_decimal(&hops[0].amount_in)?;
            let amount_out = parse_decimal(&hops[hops.len() - 1].amount_out)?;
            routes.push(RawRoute {
                edges,
                amount_in,
                amount_out,
            });
        }
        let gas_use_estimate_usd = self
            .gas_use_estimate_usd
            .as_deref()
            .map(parse_decimal)
            .transpose()?;
        Ok(RawQuote {
            routes,
            block_number: Some(parse_block_number(&self.block_number)?),
            gas_use_estimate_usd,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn wire_token(addr: &str, symbol: &str) -> WireToken {
        WireToken {
            address: addr.into(),
            chain_id: 42161,
            decimals: 18,
            symbol: symbol.into(),
        }
    }

    fn hop(amount_in: &str, amount_out: &str) -> WireHop {
        WireHop {
            protocol_kind: ProtocolKind::ConcentratedLiquidity,
            token_in: wire_token("0x0000000000000000000000000000000000000001", "A"),
            token_out: wire_token("0x0000000000000000000000000000000000000002", "B"),
            fee_tier: Some(30),
            pool_state: WirePoolState::ConcentratedLiquidity {
                sqrt_price_x96: "79228162514264337593543950336".into(),
                liquidity: "12345".into(),
                tick: 100,
            },
            amount_in: amount_in.into(),
            amount_out: amount_out.into(),
        }
    }

    #[test]
    fn decodes_route_amounts_from_boundary_hops() {
        let resp = WireQuoteResponse {
            route: vec![vec![hop("1000", "400"), hop("400", "5000")]],
            block_number: "19000123".into(),
            quote_amount: "5000".into(),
            gas_use_estimate_usd: Some("1.25".into()),
        };
        let raw = resp.decode().unwrap();
        assert_eq!(raw.routes.len(), 1);
        assert_eq!(raw.routes[0].amount_in, Decimal::from(1000));
        assert_eq!(raw.routes[0].amount_out, Decimal::from(5000));
        assert_eq!(raw.block_number, Some(19_000_123));
        assert_eq!(raw.gas_use_estimate_usd, Some(Decimal::new(125, 2)));
    }

    #[test]
    fn untagged_pool_state_deserializes_both_shapes() {
        let v2: WirePoolState =
            serde_json::from_str(r#"{"reserve0":"10","reserve1":"20"}"#).unwrap();
        assert!(matches!(v2, WirePoolState::ConstantProduct { .. }));
        let v3: WirePoolState = serde_json::from_str(
            r#"{"sqrtPriceX96":"79228162514264337593543950336","liquidity":"1","tick":-5}"#,
        )
        .unwrap();
        assert!(matches!(v3, WirePoolState::ConcentratedLiquidity { .. }));
    }

    #[test]
    fn oversized_liquidity_is_an_error_not_a_panic() {
        // u128::MAX + 1 on the wire must decode to a typed error.
        let state = WirePoolState::ConcentratedLiquidity {
            sqrt_price_x96: "79228162514264337593543950336".into(),
            liquidity: "340282366920938463463374607431768211456".into(),
            tick: 0,
        };
        assert!(state.to_pool_state().is_err());

        let mut bad_hop = hop("1000", "5000");
        bad_hop.pool_state = state;
        let resp = WireQuoteResponse {
            route: vec![vec![bad_hop]],
            block_number: "19000123".into(),
            quote_amount: "5000".into(),
            gas_use_estimate_usd: None,
        };
        assert!(resp.decode().is_err());
    }

    #[test]
    fn no_route_code_is_detected() {
        let body: WireErrorBody =
            serde_json::from_str(r#"{"errorCode":"NO_ROUTE","detail":"thin market"}"#).unwrap();
        assert!(body.is_no_route());
        let other: WireErrorBody = serde_json::from_str(r#"{"errorCode":"RATE_LIMIT"}"#).unwrap();
        assert!(!other.is_no_route());
    }

    #[test]
    fn request_serializes_camel_case() {
        let req = WireQuoteRequest {
            token_in_address: "0x01".into(),
            token_in_chain_id: 42161,
            token_in_decimals: 18,
            token_in_symbol: "A".into(),
            token_out_address: "0x02".into(),
            token_out_chain_id: 42161,
            token_out_decimals: 6,
            token_out_symbol: "B".into(),
            amount: "1000".into(),
            trade_type: "exactIn".into(),
            protocol_preferences: vec![ProtocolKind::ConcentratedLiquidity],
            distribution_percent: 100,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("tokenInChainId"));
        assert!(json.contains("\"tradeType\":\"exactIn\""));
        assert!(json.contains("concentratedLiquidity"));
    }
}
