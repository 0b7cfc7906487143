//! # Trade Assembler
//!
//! Folds one or more priced routes into a single aggregate trade: total
//! amounts, execution price, and the worst-case amount under the allowed
//! slippage tolerance. Pure transformation; amounts are taken verbatim from
//! the quoting source and summed, never recomputed from pool state.

use crate::errors::QuoteError;
use crate::pools::ProtocolKind;
use crate::route_graph::RoutePath;
use crate::slippage::bps_to_fraction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which side of the swap the caller fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TradeType {
    /// Input amount fixed; output floats down under slippage.
    ExactInput,
    /// Output amount fixed; input floats up under slippage.
    ExactOutput,
}

impl TradeType {
    /// Wire spelling used by quoting services.
    pub fn as_wire(&self) -> &'static str {
        match self {
            TradeType::ExactInput => "exactIn",
            TradeType::ExactOutput => "exactOut",
        }
    }
}

/// Protocol homogeneity of one route, carried for downstream consumers.
/// Classification never changes the aggregation arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteKind {
    ConstantProduct,
    ConcentratedLiquidity,
    Mixed,
}

/// A path plus the amounts the quoting source priced it at.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteAmount {
    pub path: RoutePath,
    pub input_amount: Decimal,
    pub output_amount: Decimal,
}

impl RouteAmount {
    /// Homogeneous protocol kind of the path's edges, or `Mixed`.
    pub fn kind(&self) -> RouteKind {
        let mut kinds = self.path.edges.iter().map(|e| e.protocol_kind);
        match kinds.next() {
            None => RouteKind::Mixed,
            Some(first) => {
                if kinds.all(|k| k == first) {
                    match first {
                        ProtocolKind::ConstantProduct => RouteKind::ConstantProduct,
                        ProtocolKind::ConcentratedLiquidity => RouteKind::ConcentratedLiquidity,
                    }
                } else {
                    RouteKind::Mixed
                }
            }
        }
    }
}

/// One or more routes combined into a single executable swap.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateTrade {
    pub routes: Vec<RouteAmount>,
    pub route_kinds: Vec<RouteKind>,
    pub trade_type: TradeType,
    pub total_input_amount: Decimal,
    pub total_output_amount: Decimal,
    /// total_output_amount / total_input_amount
    pub execution_price: Decimal,
    /// Minimum received (exact-in) or maximum spent (exact-out) under the
    /// allowed slippage tolerance.
    pub worst_case_amount: Decimal,
    pub block_number: Option<u64>,
    pub gas_estimate_usd: Option<Decimal>,
}

/// Assembles routes into an [`AggregateTrade`].
///
/// Rejects an empty route set and any route with a non-positive amount; no
/// partial trade is ever constructed.
pub fn assemble_trade(
    routes: Vec<RouteAmount>,
    trade_type: TradeType,
    allowed_slippage_bps: u32,
    gas_estimate_usd: Option<Decimal>,
    block_number: Option<u64>,
) -> Result<AggregateTrade, QuoteError> {
    if routes.is_empty() {
        return Err(QuoteError::InvalidArguments(
            "cannot assemble a trade from zero routes".into(),
        ));
    }
    for route in &routes {
        if route.input_amount <= Decimal::ZERO || route.output_amount <= Decimal::ZERO {
            return Err(QuoteError::InvalidArguments(format!(
                "non-positive route amount: in={} out={}",
                route.input_amount, route.output_amount
            )));
        }
    }

    let total_input_amount: Decimal = routes.iter().map(|r| r.input_amount).sum();
    let total_output_amount: Decimal = routes.iter().map(|r| r.output_amount).sum();
    let execution_price = total_output_amount / total_input_amount;

    let tolerance = bps_to_fraction(allowed_slippage_bps);
    let worst_case_amount = match trade_type {
        TradeType::ExactInput => total_output_amount * (Decimal::ONE - tolerance),
        TradeType::ExactOutput => total_input_amount * (Decimal::ONE + tolerance),
    };

    let route_kinds = routes.iter().map(RouteAmount::kind).collect();

    Ok(AggregateTrade {
        routes,
        route_kinds,
        trade_type,
        total_input_amount,
        total_output_amount,
        execution_price,
        worst_case_amount,
        block_number,
        gas_estimate_usd,
    })
}
