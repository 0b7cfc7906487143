//! # Local Pathfinding Fallback
//!
//! Last-resort quoting strategy that routes over a separately-maintained
//! in-memory pool dataset instead of a remote service. The dataset is
//! refreshed independently of quote traffic and exposes the same `PoolEdge`
//! shape the wire format does, so it feeds the route graph builder directly.
//!
//! Pricing stays outside this engine: a [`PathQuoter`] collaborator turns an
//! enumerated path plus an amount into concrete input/output amounts (it owns
//! the AMM math). Paths the quoter declines are skipped.

use crate::cascade::QuoteArgs;
use crate::pools::{PoolEdge, PoolState, ProtocolKind};
use crate::route_graph::{build_paths, RoutePath};
use crate::sources::{QuoteSource, SourceError};
use crate::tokens::Token;
use crate::trade::TradeType;
use crate::wire::{RawQuote, RawRoute};
use async_trait::async_trait;
use dashmap::DashMap;
use ethers::types::Address;
use log::debug;
use rust_decimal::Decimal;
use std::sync::Arc;

/// One pool in the locally cached dataset.
#[derive(Debug, Clone)]
pub struct PoolRecord {
    pub pool_address: Address,
    pub protocol_kind: ProtocolKind,
    pub token0: Token,
    pub token1: Token,
    pub fee_bps: u32,
    pub state: PoolState,
}

/// In-memory pool dataset, keyed by pool address and refreshed out of band.
///
/// Upserts overwrite whole records (last writer wins), which is the same
/// discipline the quote cache uses; no cross-key consistency is needed.
#[derive(Debug, Default)]
pub struct PoolDataset {
    pools: DashMap<Address, PoolRecord>,
}

impl PoolDataset {
    pub fn new() -> Self {
        Self {
            pools: DashMap::new(),
        }
    }

    pub fn upsert(&self, record: PoolRecord) {
        self.pools.insert(record.pool_address, record);
    }

    pub fn remove(&self, pool_address: &Address) {
        self.pools.remove(pool_address);
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Directed edges for one chain, both directions per pool, filtered by
    /// protocol preference. Sorted by pool address so the derived route graph
    /// is deterministic regardless of map iteration order.
    pub fn edges_for(&self, chain_id: u64, preferences: &[ProtocolKind]) -> Vec<PoolEdge> {
        let mut records: Vec<PoolRecord> = self
            .pools
            .iter()
            .filter(|entry| {
                let r = entry.value();
                r.token0.chain_id == chain_id && preferences.contains(&r.protocol_kind)
            })
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by_key(|r| r.pool_address);

        let mut edges = Vec::with_capacity(records.len() * 2);
        for record in records {
            edges.push(PoolEdge {
                protocol_kind: record.protocol_kind,
                token_in: record.token0.clone(),
                token_out: record.token1.clone(),
                fee_bps: record.fee_bps,
                pool_state: record.state.clone(),
            });
            edges.push(PoolEdge {
                protocol_kind: record.protocol_kind,
                token_in: record.token1,
                token_out: record.token0,
                fee_bps: record.fee_bps,
                pool_state: record.state,
            });
        }
        edges
    }

    /// Distinct tokens present on a chain, in edge order.
    pub fn tokens_for(&self, chain_id: u64, preferences: &[ProtocolKind]) -> Vec<Token> {
        let mut tokens: Vec<Token> = Vec::new();
        for edge in self.edges_for(chain_id, preferences) {
            if !tokens.contains(&edge.token_in) {
                tokens.push(edge.token_in);
            }
            if !tokens.contains(&edge.token_out) {
                tokens.push(edge.token_out);
            }
        }
        tokens
    }
}

/// External pricing collaborator: turns a path and a fixed-side amount into
/// concrete route amounts. Returning `None` declines the path (e.g., not
/// enough liquidity), which is not an error.
pub trait PathQuoter: Send + Sync {
    fn quote_path(
        &self,
        path: &RoutePath,
        amount: Decimal,
        trade_type: TradeType,
    ) -> Option<(Decimal, Decimal)>;
}

/// Client-side pathfinding over the cached dataset, used when every remote
/// source is unreachable.
pub struct LocalRouteSource {
    dataset: Arc<PoolDataset>,
    quoter: Arc<dyn PathQuoter>,
    /// Cap on how many enumerated paths are priced per request.
    max_paths: usize,
}

impl LocalRouteSource {
    pub fn new(dataset: Arc<PoolDataset>, quoter: Arc<dyn PathQuoter>, max_paths: usize) -> Self {
        Self {
            dataset,
            quoter,
            max_paths,
        }
    }
}

#[async_trait]
impl QuoteSource for LocalRouteSource {
    fn name(&self) -> &'static str {
        "local-pathfinder"
    }

    async fn fetch_quote(&self, args: &QuoteArgs) -> Result<RawQuote, SourceError> {
        let chain_id = args.token_in.chain_id;
        let edges = self.dataset.edges_for(chain_id, &args.protocol_preferences);
        if edges.is_empty() {
            return Err(SourceError::NoRoute);
        }
        let nodes = self.dataset.tokens_for(chain_id, &args.protocol_preferences);
        let paths = build_paths(&nodes, &edges, &args.token_in, &args.token_out);
        debug!(
            "local-pathfinder: {} candidate paths over {} edges",
            paths.len(),
            edges.len()
        );

        let mut routes = Vec::new();
        for path in paths.into_iter().take(self.max_paths) {
            if let Some((amount_in, amount_out)) =
                self.quoter.quote_path(&path, args.amount, args.trade_type)
            {
                routes.push(RawRoute {
                    edges: path.edges,
                    amount_in,
                    amount_out,
                });
            }
        }

        if routes.is_empty() {
            return Err(SourceError::NoRoute);
        }
        // Local data carries no block anchor; freshness is the dataset
        // refresher's concern.
        Ok(RawQuote {
            routes,
            block_number: None,
            gas_use_estimate_usd: None,
        })
    }
}
