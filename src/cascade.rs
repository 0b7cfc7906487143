//! # Quote Source Cascade
//!
//! Orchestrates the ordered list of quoting strategies. Each strategy is
//! attempted with a bounded retry/backoff policy; a transport failure falls
//! through to the next strategy, while an authoritative `NoRouteFound` answer
//! terminates the cascade immediately. A successful raw quote is materialized
//! through the route graph builder and the trade assembler.
//!
//! ## State machine per resolution
//!
//! `NotStarted -> TryingStrategy(i) -> Success | NoRoute | AllFailed`
//!
//! ## Out-of-order responses
//!
//! Every resolution is tagged with the fingerprint of the arguments it was
//! started for. Callers record the fingerprint they currently want in a
//! [`RequestTracker`] and compare before applying a result, so an older,
//! slower response can never clobber a newer one.

use crate::errors::QuoteError;
use crate::pools::ProtocolKind;
use crate::route_graph::build_paths;
use crate::slippage::{SlippageInput, SlippagePolicy};
use crate::sources::{QuoteSource, SourceError};
use crate::tokens::Token;
use crate::trade::{assemble_trade, AggregateTrade, RouteAmount, TradeType};
use crate::wire::{RawQuote, WireQuoteRequest, WireToken};
use log::{debug, info, warn};
use rust_decimal::Decimal;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

/// Fully-specified swap request.
#[derive(Debug, Clone)]
pub struct QuoteArgs {
    pub token_in: Token,
    pub token_out: Token,
    /// Amount of the fixed side, in raw token units
    pub amount: Decimal,
    pub trade_type: TradeType,
    pub protocol_preferences: Vec<ProtocolKind>,
    pub distribution_percent: u32,
    pub slippage: SlippageInput,
}

impl QuoteArgs {
    pub fn new(token_in: Token, token_out: Token, amount: Decimal, trade_type: TradeType) -> Self {
        Self {
            token_in,
            token_out,
            amount,
            trade_type,
            protocol_preferences: vec![
                ProtocolKind::ConstantProduct,
                ProtocolKind::ConcentratedLiquidity,
            ],
            distribution_percent: 100,
            slippage: SlippageInput::default(),
        }
    }

    /// Rejects under-specified requests before any network activity.
    pub fn validate(&self) -> Result<(), QuoteError> {
        if self.amount <= Decimal::ZERO {
            return Err(QuoteError::InvalidArguments(
                "amount must be positive".into(),
            ));
        }
        if self.token_in == self.token_out {
            return Err(QuoteError::InvalidArguments(
                "input and output token are identical".into(),
            ));
        }
        if self.token_in.chain_id != self.token_out.chain_id {
            return Err(QuoteError::InvalidArguments(format!(
                "cross-chain pair: {} vs {}",
                self.token_in.chain_id, self.token_out.chain_id
            )));
        }
        if self.distribution_percent == 0 || self.distribution_percent > 100 {
            return Err(QuoteError::InvalidArguments(format!(
                "distribution percent out of range: {}",
                self.distribution_percent
            )));
        }
        Ok(())
    }

    /// Stable fingerprint over normalized arguments. Two requests that would
    /// produce the same quote hash identically (trailing decimal zeros are
    /// stripped before hashing).
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.token_in.hash(&mut hasher);
        self.token_out.hash(&mut hasher);
        self.amount.normalize().hash(&mut hasher);
        self.trade_type.hash(&mut hasher);
        self.protocol_preferences.hash(&mut hasher);
        self.distribution_percent.hash(&mut hasher);
        self.slippage.hash(&mut hasher);
        hasher.finish()
    }

    pub fn to_wire_request(&self) -> WireQuoteRequest {
        let token_in = WireToken::from_token(&self.token_in);
        let token_out = WireToken::from_token(&self.token_out);
        WireQuoteRequest {
            token_in_address: token_in.address,
            token_in_chain_id: token_in.chain_id,
            token_in_decimals: token_in.decimals,
            token_in_symbol: token_in.symbol,
            token_out_address: token_out.address,
            token_out_chain_id: token_out.chain_id,
            token_out_decimals: token_out.decimals,
            token_out_symbol: token_out.symbol,
            amount: self.amount.normalize().to_string(),
            trade_type: self.trade_type.as_wire().to_string(),
            protocol_preferences: self.protocol_preferences.clone(),
            distribution_percent: self.distribution_percent,
        }
    }
}

/// Terminal result of one quote resolution.
#[derive(Debug, Clone)]
pub enum QuoteOutcome {
    Success(AggregateTrade),
    /// Authoritative: a source understood the request and no route exists.
    NoRouteFound,
    Error(QuoteError),
}

impl QuoteOutcome {
    pub fn trade(&self) -> Option<&AggregateTrade> {
        match self {
            QuoteOutcome::Success(t) => Some(t),
            _ => None,
        }
    }
}

/// Per-source bounded retry policy.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_ms: 200,
            backoff_max_ms: 5_000,
        }
    }
}

/// Ordered fallback over quoting strategies.
pub struct QuoteCascade {
    sources: Vec<Arc<dyn QuoteSource>>,
    retry: RetryPolicy,
    slippage_policy: SlippagePolicy,
    /// Heuristic tolerance fed to auto-slippage resolution, when configured.
    auto_slippage_heuristic_bps: Option<u32>,
}

impl QuoteCascade {
    pub fn new(sources: Vec<Arc<dyn QuoteSource>>, retry: RetryPolicy) -> Self {
        Self {
            sources,
            retry,
            slippage_policy: SlippagePolicy::default(),
            auto_slippage_heuristic_bps: None,
        }
    }

    pub fn with_slippage_policy(mut self, policy: SlippagePolicy, heuristic_bps: Option<u32>) -> Self {
        self.slippage_policy = policy;
        self.auto_slippage_heuristic_bps = heuristic_bps;
        self
    }

    /// Resolves a quote through the strategy order.
    ///
    /// Transport failures (after the per-source retry budget) fall through to
    /// the next strategy; `NoRoute` never does.
    pub async fn resolve(&self, args: &QuoteArgs) -> QuoteOutcome {
        if let Err(e) = args.validate() {
            return QuoteOutcome::Error(e);
        }

        let mut last_failure = String::from("no quoting sources configured");
        for source in &self.sources {
            debug!("cascade: trying strategy {}", source.name());
            match self.attempt_with_retry(source.as_ref(), args).await {
                Ok(raw) => return self.materialize(args, raw),
                Err(SourceError::NoRoute) => {
                    info!("cascade: {} reported no route, terminal", source.name());
                    return QuoteOutcome::NoRouteFound;
                }
                Err(SourceError::Transport(msg)) => {
                    warn!("cascade: {} failed, falling through: {}", source.name(), msg);
                    last_failure = msg;
                }
            }
        }
        QuoteOutcome::Error(QuoteError::Transport(last_failure))
    }

    /// One strategy attempt under the bounded retry/backoff policy. Only
    /// transport failures are retried.
    async fn attempt_with_retry(
        &self,
        source: &dyn QuoteSource,
        args: &QuoteArgs,
    ) -> Result<RawQuote, SourceError> {
        let strategy = ExponentialBackoff::from_millis(self.retry.backoff_base_ms)
            .max_delay(Duration::from_millis(self.retry.backoff_max_ms))
            .map(jitter)
            .take(self.retry.max_attempts.saturating_sub(1));
        RetryIf::spawn(
            strategy,
            || source.fetch_quote(args),
            |e: &SourceError| e.is_transport(),
        )
        .await
    }

    /// Raw quote -> paths -> aggregate trade.
    ///
    /// Each raw route is reconstructed independently; a route whose hop list
    /// cannot be walked from input to output is dropped (fail soft). Zero
    /// surviving routes is an authoritative no-route outcome.
    fn materialize(&self, args: &QuoteArgs, raw: RawQuote) -> QuoteOutcome {
        let mut routes = Vec::with_capacity(raw.routes.len());
        for raw_route in raw.routes {
            let nodes = route_nodes(&raw_route.edges);
            let paths = build_paths(&nodes, &raw_route.edges, &args.token_in, &args.token_out);
            match paths.into_iter().next() {
                Some(path) => routes.push(RouteAmount {
                    path,
                    input_amount: raw_route.amount_in,
                    output_amount: raw_route.amount_out,
                }),
                None => {
                    warn!(
                        "cascade: {}",
                        QuoteError::DataInconsistency(format!(
                            "route of {} hops does not connect {} to {}",
                            raw_route.edges.len(),
                            args.token_in,
                            args.token_out
                        ))
                    );
                }
            }
        }

        if routes.is_empty() {
            return QuoteOutcome::NoRouteFound;
        }

        let decision = self.slippage_policy.resolve(
            args.slippage.auto,
            args.slippage.user_override_bps,
            self.auto_slippage_heuristic_bps,
        );
        match assemble_trade(
            routes,
            args.trade_type,
            decision.allowed_bps,
            raw.gas_use_estimate_usd,
            raw.block_number,
        ) {
            Ok(trade) => QuoteOutcome::Success(trade),
            Err(e) => QuoteOutcome::Error(e),
        }
    }
}

/// Distinct tokens referenced by a hop list, in first-seen order.
fn route_nodes(edges: &[crate::pools::PoolEdge]) -> Vec<Token> {
    let mut nodes: Vec<Token> = Vec::new();
    for edge in edges {
        for token in [&edge.token_in, &edge.token_out] {
            if !nodes.contains(token) {
                nodes.push(token.clone());
            }
        }
    }
    nodes
}

/// Records the fingerprint of the request a caller currently cares about.
///
/// A resolution that finishes after the caller has moved on compares its own
/// fingerprint against this and is discarded instead of applied.
#[derive(Debug, Default)]
pub struct RequestTracker {
    wanted: AtomicU64,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self {
            wanted: AtomicU64::new(0),
        }
    }

    pub fn set_wanted(&self, fingerprint: u64) {
        self.wanted.store(fingerprint, Ordering::Release);
    }

    pub fn is_current(&self, fingerprint: u64) -> bool {
        self.wanted.load(Ordering::Acquire) == fingerprint
    }

    /// Forget any in-flight interest (e.g., the user cleared the form).
    pub fn clear(&self) {
        self.wanted.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pools::{PoolEdge, PoolState};
    use crate::sources::RawRoute;
    use async_trait::async_trait;
    use ethers::types::{Address, U256};
    use std::sync::atomic::AtomicUsize;

    fn token(symbol: &str, byte: u8) -> Token {
        Token::new(42161, Address::from_low_u64_be(byte as u64), 18, symbol)
    }

    fn edge(from: &Token, to: &Token) -> PoolEdge {
        PoolEdge {
            protocol_kind: ProtocolKind::ConstantProduct,
            token_in: from.clone(),
            token_out: to.clone(),
            fee_bps: 30,
            pool_state: PoolState::ConstantProduct {
                reserve0: U256::from(1u64),
                reserve1: U256::from(1u64),
            },
        }
    }

    fn args() -> QuoteArgs {
        QuoteArgs::new(
            token("A", 1),
            token("B", 2),
            Decimal::from(1000),
            TradeType::ExactInput,
        )
    }

    fn one_route_quote() -> RawQuote {
        let a = token("A", 1);
        let b = token("B", 2);
        RawQuote {
            routes: vec![RawRoute {
                edges: vec![edge(&a, &b)],
                amount_in: Decimal::from(1000),
                amount_out: Decimal::from(5000),
            }],
            block_number: Some(100),
            gas_use_estimate_usd: None,
        }
    }

    /// Scripted source: pops the next canned response per call and counts
    /// invocations.
    struct ScriptedSource {
        name: &'static str,
        responses: std::sync::Mutex<Vec<Result<RawQuote, SourceError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(name: &'static str, responses: Vec<Result<RawQuote, SourceError>>) -> Arc<Self> {
            Arc::new(Self {
                name,
                responses: std::sync::Mutex::new(responses),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl QuoteSource for ScriptedSource {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn fetch_quote(&self, _args: &QuoteArgs) -> Result<RawQuote, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Err(SourceError::Transport("script exhausted".into()))
            } else {
                responses.remove(0)
            }
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            backoff_base_ms: 1,
            backoff_max_ms: 2,
        }
    }

    #[tokio::test]
    async fn invalid_args_never_hit_the_network() {
        let source = ScriptedSource::new("primary", vec![Ok(one_route_quote())]);
        let cascade = QuoteCascade::new(vec![source.clone() as Arc<dyn QuoteSource>], fast_retry());

        let mut bad = args();
        bad.amount = Decimal::ZERO;
        let outcome = cascade.resolve(&bad).await;
        assert!(matches!(
            outcome,
            QuoteOutcome::Error(QuoteError::InvalidArguments(_))
        ));
        assert_eq!(source.calls(), 0);

        let mut same = args();
        same.token_out = same.token_in.clone();
        assert!(matches!(
            cascade.resolve(&same).await,
            QuoteOutcome::Error(QuoteError::InvalidArguments(_))
        ));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn success_produces_assembled_trade() {
        let source = ScriptedSource::new("primary", vec![Ok(one_route_quote())]);
        let cascade = QuoteCascade::new(vec![source as Arc<dyn QuoteSource>], fast_retry());
        let outcome = cascade.resolve(&args()).await;
        let trade = outcome.trade().expect("expected success");
        assert_eq!(trade.total_input_amount, Decimal::from(1000));
        assert_eq!(trade.total_output_amount, Decimal::from(5000));
        assert_eq!(trade.execution_price, Decimal::from(5));
        assert_eq!(trade.block_number, Some(100));
    }

    #[tokio::test]
    async fn no_route_short_circuits_remaining_strategies() {
        let primary = ScriptedSource::new("primary", vec![Err(SourceError::NoRoute)]);
        let secondary = ScriptedSource::new("secondary", vec![Ok(one_route_quote())]);
        let cascade = QuoteCascade::new(
            vec![
                primary.clone() as Arc<dyn QuoteSource>,
                secondary.clone() as Arc<dyn QuoteSource>,
            ],
            fast_retry(),
        );

        let outcome = cascade.resolve(&args()).await;
        assert!(matches!(outcome, QuoteOutcome::NoRouteFound));
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 0, "no-route must not cascade");
    }

    #[tokio::test]
    async fn transport_failure_falls_through_to_next_strategy() {
        let primary = ScriptedSource::new(
            "primary",
            vec![
                Err(SourceError::Transport("timeout".into())),
                Err(SourceError::Transport("timeout".into())),
            ],
        );
        let secondary = ScriptedSource::new("secondary", vec![Ok(one_route_quote())]);
        let cascade = QuoteCascade::new(
            vec![
                primary.clone() as Arc<dyn QuoteSource>,
                secondary.clone() as Arc<dyn QuoteSource>,
            ],
            fast_retry(),
        );

        let outcome = cascade.resolve(&args()).await;
        assert!(outcome.trade().is_some());
        // Retry budget exhausted on primary before falling through.
        assert_eq!(primary.calls(), 2);
        assert_eq!(secondary.calls(), 1);
    }

    #[tokio::test]
    async fn transport_retry_stops_on_success() {
        let primary = ScriptedSource::new(
            "primary",
            vec![
                Err(SourceError::Transport("blip".into())),
                Ok(one_route_quote()),
            ],
        );
        let cascade = QuoteCascade::new(vec![primary.clone() as Arc<dyn QuoteSource>], fast_retry());
        let outcome = cascade.resolve(&args()).await;
        assert!(outcome.trade().is_some());
        assert_eq!(primary.calls(), 2);
    }

    #[tokio::test]
    async fn all_strategies_exhausted_is_transport_error() {
        let primary = ScriptedSource::new("primary", vec![]);
        let secondary = ScriptedSource::new("secondary", vec![]);
        let cascade = QuoteCascade::new(
            vec![
                primary as Arc<dyn QuoteSource>,
                secondary as Arc<dyn QuoteSource>,
            ],
            fast_retry(),
        );
        let outcome = cascade.resolve(&args()).await;
        assert!(matches!(
            outcome,
            QuoteOutcome::Error(QuoteError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn inconsistent_route_drops_to_no_route() {
        // The hop list connects C -> D, nothing reaches A or B.
        let c = token("C", 3);
        let d = token("D", 4);
        let raw = RawQuote {
            routes: vec![RawRoute {
                edges: vec![edge(&c, &d)],
                amount_in: Decimal::from(1000),
                amount_out: Decimal::from(5000),
            }],
            block_number: None,
            gas_use_estimate_usd: None,
        };
        let source = ScriptedSource::new("primary", vec![Ok(raw)]);
        let cascade = QuoteCascade::new(vec![source as Arc<dyn QuoteSource>], fast_retry());
        assert!(matches!(
            cascade.resolve(&args()).await,
            QuoteOutcome::NoRouteFound
        ));
    }

    #[tokio::test]
    async fn ambiguous_hop_set_materializes_first_enumerated_path() {
        // The hop list admits two walks A->B; the first enumerated path
        // (edge order: A->C first) is the one that gets the amounts.
        let a = token("A", 1);
        let b = token("B", 2);
        let c = token("C", 3);
        let raw = RawQuote {
            routes: vec![RawRoute {
                edges: vec![edge(&a, &c), edge(&c, &b), edge(&a, &b)],
                amount_in: Decimal::from(1000),
                amount_out: Decimal::from(5000),
            }],
            block_number: Some(100),
            gas_use_estimate_usd: None,
        };
        let source = ScriptedSource::new("primary", vec![Ok(raw)]);
        let cascade = QuoteCascade::new(vec![source as Arc<dyn QuoteSource>], fast_retry());
        let outcome = cascade.resolve(&args()).await;
        let trade = outcome.trade().expect("expected success");
        assert_eq!(trade.routes.len(), 1);
        assert_eq!(trade.routes[0].path.hop_count(), 2);
        assert_eq!(trade.routes[0].input_amount, Decimal::from(1000));
    }

    #[tokio::test]
    async fn sibling_routes_survive_one_bad_route() {
        let a = token("A", 1);
        let b = token("B", 2);
        let c = token("C", 3);
        let d = token("D", 4);
        let raw = RawQuote {
            routes: vec![
                RawRoute {
                    edges: vec![edge(&c, &d)],
                    amount_in: Decimal::from(1),
                    amount_out: Decimal::from(1),
                },
                RawRoute {
                    edges: vec![edge(&a, &b)],
                    amount_in: Decimal::from(1000),
                    amount_out: Decimal::from(5000),
                },
            ],
            block_number: Some(7),
            gas_use_estimate_usd: None,
        };
        let source = ScriptedSource::new("primary", vec![Ok(raw)]);
        let cascade = QuoteCascade::new(vec![source as Arc<dyn QuoteSource>], fast_retry());
        let outcome = cascade.resolve(&args()).await;
        let trade = outcome.trade().expect("good sibling should survive");
        assert_eq!(trade.routes.len(), 1);
        assert_eq!(trade.total_output_amount, Decimal::from(5000));
    }

    #[test]
    fn fingerprint_is_stable_and_normalized() {
        let a = args();
        let mut b = args();
        assert_eq!(a.fingerprint(), b.fingerprint());
        b.amount = Decimal::new(1_000_0, 1); // 1000.0
        assert_eq!(a.fingerprint(), b.fingerprint());
        b.amount = Decimal::from(999);
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn tracker_discards_outdated_results() {
        let tracker = RequestTracker::new();
        let old = args().fingerprint();
        tracker.set_wanted(old);
        assert!(tracker.is_current(old));

        let mut newer = args();
        newer.amount = Decimal::from(2000);
        tracker.set_wanted(newer.fingerprint());
        assert!(!tracker.is_current(old));
        assert!(tracker.is_current(newer.fingerprint()));
    }
}
