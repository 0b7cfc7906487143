//! # Swap Router SDK
//!
//! A Rust library for resolving swap quotes and assembling executable trades
//! against EVM decentralized exchanges. It turns a token pair, an amount, and
//! a trade direction into an aggregate trade with totals, execution price, and
//! a slippage-adjusted worst case, sourced from remote routing services with a
//! client-side pathfinding fallback.
//!
//! ## Overview
//!
//! The SDK separates quote acquisition from trade interpretation:
//!
//! - **Route Graph**: deterministic path enumeration over pool edges
//! - **Trade Assembly**: folding priced routes into one aggregate trade
//! - **Source Cascade**: ordered strategy fallback with bounded retries
//! - **Cache & Dedup**: short-TTL result cache with single-flight fetches
//! - **Freshness**: block-anchored staleness checks with monotonic floors
//!
//! ## Architecture
//!
//! ### Domain Layer
//! Value types for tokens, pool edges, routes, and assembled trades. All
//! arithmetic on quoted amounts is exact decimal; nothing is recomputed from
//! pool state.
//!
//! ### Acquisition Layer
//! `QuoteSource` implementations (remote HTTP services, the local pathfinder)
//! ordered by a cascade that retries transport failures and treats "no route"
//! as an authoritative terminal answer.
//!
//! ### Serving Layer
//! A TTL cache with in-flight deduplication, a freshness tracker, and the
//! `QuoteEngine` facade that ties them together for UI-driven callers.

// Domain Types
/// Token identity and display
pub mod tokens;
/// Pool edges and protocol-specific state snapshots
pub mod pools;
/// Route path enumeration over pool edges
pub mod route_graph;
/// Aggregate trade assembly from priced routes
pub mod trade;
/// Slippage tolerance resolution and classification
pub mod slippage;
/// Typed quote-resolution errors
pub mod errors;

// Acquisition Layer
/// Wire format for remote quoting services
pub mod wire;
/// String-to-domain conversions for wire payloads
pub mod convert;
/// The `QuoteSource` trait and the remote HTTP source
pub mod sources;
/// Client-side pathfinding fallback over a cached pool dataset
pub mod local_source;
/// Ordered strategy fallback with bounded retries
pub mod cascade;

// Serving Layer
/// TTL result cache with single-flight deduplication
pub mod cache;
/// Block-anchored freshness validation
pub mod freshness;
/// Top-level engine facade
pub mod engine;

// Settings & Configuration
/// Configuration management
pub mod settings;

// Re-exports for convenience
pub use cache::QuoteCache;
pub use cascade::{QuoteArgs, QuoteCascade, QuoteOutcome, RequestTracker};
pub use engine::QuoteEngine;
pub use errors::QuoteError;
pub use freshness::FreshnessTracker;
pub use pools::{PoolEdge, PoolState, ProtocolKind};
pub use route_graph::{build_paths, RoutePath};
pub use settings::Settings;
pub use sources::{QuoteSource, RemoteQuoteSource, SourceError};
pub use tokens::Token;
pub use trade::{assemble_trade, AggregateTrade, RouteAmount, TradeType};
