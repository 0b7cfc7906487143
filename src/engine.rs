//! # Quote Engine
//!
//! ## Overview
//!
//! Top-level facade tying the layers together: validated arguments go through
//! the TTL cache, the cache delegates misses to the source cascade, and the
//! resulting trades are checked against the freshness tracker before a caller
//! trusts them. One engine instance is shared across tasks; all internal state
//! is `Arc`ed and lock-free or finely locked.
//!
//! `fetch_latest` is the UI-facing entry point: it registers interest in the
//! request's fingerprint first, so a slow resolution that completes after the
//! caller has moved on to different arguments is discarded instead of shown.

use crate::cache::QuoteCache;
use crate::cascade::{QuoteArgs, QuoteCascade, QuoteOutcome, RequestTracker, RetryPolicy};
use crate::freshness::FreshnessTracker;
use crate::local_source::{LocalRouteSource, PathQuoter, PoolDataset};
use crate::settings::Settings;
use crate::sources::{QuoteSource, RemoteQuoteSource};
use crate::trade::AggregateTrade;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub struct QuoteEngine {
    settings: Arc<Settings>,
    cascade: Arc<QuoteCascade>,
    cache: Arc<QuoteCache>,
    freshness: Arc<FreshnessTracker>,
    tracker: Arc<RequestTracker>,
}

impl QuoteEngine {
    /// Builds an engine over an explicit strategy order.
    pub fn new(settings: Settings, sources: Vec<Arc<dyn QuoteSource>>) -> Self {
        let retry = RetryPolicy {
            max_attempts: settings.retry.max_attempts,
            backoff_base_ms: settings.retry.backoff_base_ms,
            backoff_max_ms: settings.retry.backoff_max_ms,
        };
        let cascade = QuoteCascade::new(sources, retry).with_slippage_policy(
            crate::slippage::SlippagePolicy::new(settings.slippage.default_bps),
            settings.slippage.auto_heuristic_bps,
        );
        let cache = QuoteCache::new(
            Duration::from_secs(settings.cache.ttl_seconds),
            settings.cache.max_entries,
        );
        Self {
            settings: Arc::new(settings),
            cascade: Arc::new(cascade),
            cache: Arc::new(cache),
            freshness: Arc::new(FreshnessTracker::new()),
            tracker: Arc::new(RequestTracker::new()),
        }
    }

    /// Builds an engine whose strategies are the configured remote services,
    /// in primary-then-secondary order.
    pub fn from_settings(settings: Settings) -> anyhow::Result<Self> {
        let sources = Self::remote_sources(&settings)?;
        info!("quote engine: {} remote source(s) configured", sources.len());
        Ok(Self::new(settings, sources))
    }

    /// Like [`from_settings`](Self::from_settings), with the client-side
    /// pathfinder appended as the last strategy when
    /// `sources.enable_local_fallback` is set. The caller supplies the pool
    /// dataset and the pricing collaborator; `sources.local_max_paths` caps
    /// how many enumerated paths the fallback prices per request.
    pub fn from_settings_with_local(
        settings: Settings,
        dataset: Arc<PoolDataset>,
        quoter: Arc<dyn PathQuoter>,
    ) -> anyhow::Result<Self> {
        let mut sources = Self::remote_sources(&settings)?;
        if settings.sources.enable_local_fallback {
            sources.push(Arc::new(LocalRouteSource::new(
                dataset,
                quoter,
                settings.sources.local_max_paths,
            )));
        }
        info!(
            "quote engine: {} source(s) configured (local fallback {})",
            sources.len(),
            if settings.sources.enable_local_fallback {
                "on"
            } else {
                "off"
            }
        );
        Ok(Self::new(settings, sources))
    }

    fn remote_sources(settings: &Settings) -> anyhow::Result<Vec<Arc<dyn QuoteSource>>> {
        let timeout = Duration::from_secs(settings.sources.request_timeout_seconds);
        let mut sources: Vec<Arc<dyn QuoteSource>> = vec![Arc::new(RemoteQuoteSource::new(
            "primary",
            settings.sources.primary_url.clone(),
            timeout,
        )?)];
        if let Some(url) = &settings.sources.secondary_url {
            sources.push(Arc::new(RemoteQuoteSource::new(
                "secondary",
                url.clone(),
                timeout,
            )?));
        }
        Ok(sources)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn cache(&self) -> &QuoteCache {
        &self.cache
    }

    /// Resolves a quote through the cache and cascade.
    pub async fn resolve_quote(&self, args: &QuoteArgs) -> QuoteOutcome {
        self.cache.get_or_fetch(args, &self.cascade).await
    }

    /// Forces a re-fetch regardless of TTL, for explicit refresh signals
    /// (the view became visible again, the user hit refresh). Still subject
    /// to in-flight dedup: joining an ongoing fetch is already "now".
    pub async fn refresh_now(&self, args: &QuoteArgs) -> QuoteOutcome {
        self.cache.invalidate(args.fingerprint());
        self.cache.get_or_fetch(args, &self.cascade).await
    }

    /// Resolves a quote and discards it if the caller's interest has moved on
    /// to a different request while this one was in flight.
    pub async fn fetch_latest(&self, args: &QuoteArgs) -> Option<QuoteOutcome> {
        let fingerprint = args.fingerprint();
        self.tracker.set_wanted(fingerprint);
        let outcome = self.cache.get_or_fetch(args, &self.cascade).await;
        if self.tracker.is_current(fingerprint) {
            Some(outcome)
        } else {
            debug!("quote engine: dropping outdated result {:#x}", fingerprint);
            None
        }
    }

    /// Whether a trade's block anchor is still recent enough to act on.
    ///
    /// A trade with no anchor (locally computed) is not block-checked here;
    /// its dataset carries its own refresh discipline.
    pub fn is_quote_fresh(&self, trade: &AggregateTrade, current_block: Option<u64>) -> bool {
        match trade.block_number {
            Some(block) => self.freshness.is_fresh(
                self.settings.chain.chain_id,
                block,
                current_block,
                self.settings.freshness.max_quote_age_blocks,
            ),
            None => true,
        }
    }

    /// [`is_quote_fresh`](Self::is_quote_fresh) as a typed result, for call
    /// sites that propagate with `?`.
    pub fn ensure_fresh(
        &self,
        trade: &AggregateTrade,
        current_block: Option<u64>,
    ) -> Result<(), crate::errors::QuoteError> {
        if self.is_quote_fresh(trade, current_block) {
            Ok(())
        } else {
            Err(crate::errors::QuoteError::Stale)
        }
    }

    /// Records a confirmed on-chain observation (a mined receipt, say). All
    /// quotes anchored below this block become permanently stale.
    pub fn record_confirmed_block(&self, block: u64) {
        self.freshness
            .raise_floor(self.settings.chain.chain_id, block);
    }

    /// Spawns a background task that re-resolves `args` on the configured
    /// interval, keeping the cache warm and publishing each outcome on the
    /// returned channel. Each poll is an ordinary cached resolution, so an
    /// interval shorter than the TTL republishes the cached outcome instead
    /// of hammering the sources. Flip the shutdown sender to stop it.
    pub fn spawn_refresh_task(
        self: &Arc<Self>,
        args: QuoteArgs,
        mut shutdown: watch::Receiver<bool>,
    ) -> (JoinHandle<()>, watch::Receiver<Option<QuoteOutcome>>) {
        let engine = Arc::clone(self);
        let (tx, rx) = watch::channel(None);
        let period = Duration::from_secs(engine.settings.cache.refresh_interval_seconds);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let outcome = engine.resolve_quote(&args).await;
                        if let QuoteOutcome::Error(e) = &outcome {
                            warn!("quote refresh failed: {}", e);
                        }
                        if tx.send(Some(outcome)).is_err() {
                            debug!("quote refresh: all subscribers gone, stopping");
                            break;
                        }
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            info!("quote refresh task shutting down");
                            break;
                        }
                    }
                }
            }
        });
        (handle, rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pools::{PoolEdge, PoolState, ProtocolKind};
    use crate::sources::{RawRoute, SourceError};
    use crate::tokens::Token;
    use crate::trade::TradeType;
    use crate::wire::RawQuote;
    use async_trait::async_trait;
    use ethers::types::{Address, U256};
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn token(symbol: &str, byte: u8) -> Token {
        Token::new(42161, Address::from_low_u64_be(byte as u64), 18, symbol)
    }

    fn args_with_amount(amount: u64) -> QuoteArgs {
        QuoteArgs::new(
            token("A", 1),
            token("B", 2),
            Decimal::from(amount),
            TradeType::ExactInput,
        )
    }

    fn quote_at_block(block: Option<u64>) -> RawQuote {
        let a = token("A", 1);
        let b = token("B", 2);
        RawQuote {
            routes: vec![RawRoute {
                edges: vec![PoolEdge {
                    protocol_kind: ProtocolKind::ConstantProduct,
                    token_in: a,
                    token_out: b,
                    fee_bps: 30,
                    pool_state: PoolState::ConstantProduct {
                        reserve0: U256::from(1u64),
                        reserve1: U256::from(1u64),
                    },
                }],
                amount_in: Decimal::from(1000),
                amount_out: Decimal::from(5000),
            }],
            block_number: block,
            gas_use_estimate_usd: None,
        }
    }

    /// Returns a canned quote; sleeps longer for amount 1000 so a competing
    /// request can overtake it.
    struct SlowForLargeAmount {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl QuoteSource for SlowForLargeAmount {
        fn name(&self) -> &'static str {
            "slow-for-large"
        }

        async fn fetch_quote(&self, args: &QuoteArgs) -> Result<RawQuote, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if args.amount >= Decimal::from(1000) {
                tokio::time::sleep(Duration::from_millis(60)).await;
            }
            Ok(quote_at_block(Some(100)))
        }
    }

    fn engine_with(source: Arc<SlowForLargeAmount>) -> Arc<QuoteEngine> {
        let mut settings = Settings::default();
        settings.retry.backoff_base_ms = 1;
        settings.retry.backoff_max_ms = 2;
        settings.cache.refresh_interval_seconds = 1;
        Arc::new(QuoteEngine::new(
            settings,
            vec![source as Arc<dyn QuoteSource>],
        ))
    }

    fn counting_source() -> Arc<SlowForLargeAmount> {
        Arc::new(SlowForLargeAmount {
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn resolve_quote_is_cached() {
        let source = counting_source();
        let engine = engine_with(source.clone());
        let args = args_with_amount(5);
        assert!(engine.resolve_quote(&args).await.trade().is_some());
        assert!(engine.resolve_quote(&args).await.trade().is_some());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refresh_now_bypasses_the_ttl() {
        let source = counting_source();
        let engine = engine_with(source.clone());
        let args = args_with_amount(5);

        assert!(engine.resolve_quote(&args).await.trade().is_some());
        assert!(engine.refresh_now(&args).await.trade().is_some());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        // The refreshed outcome is cached again afterwards.
        assert!(engine.resolve_quote(&args).await.trade().is_some());
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn overtaken_fetch_is_discarded() {
        let source = counting_source();
        let engine = engine_with(source.clone());

        let slow_engine = engine.clone();
        let slow = tokio::spawn(async move {
            slow_engine.fetch_latest(&args_with_amount(1000)).await
        });
        // Let the slow fetch register its fingerprint before overtaking it.
        tokio::time::sleep(Duration::from_millis(10)).await;
        let fast = engine.fetch_latest(&args_with_amount(5)).await;

        assert!(fast.is_some());
        assert!(slow.await.unwrap().is_none(), "stale result must be dropped");
    }

    #[tokio::test]
    async fn freshness_uses_floor_and_age() {
        let engine = engine_with(counting_source());
        let outcome = engine.resolve_quote(&args_with_amount(5)).await;
        let trade = outcome.trade().unwrap();
        assert_eq!(trade.block_number, Some(100));

        assert!(engine.is_quote_fresh(trade, Some(105)));
        assert!(!engine.is_quote_fresh(trade, Some(200)), "outside age window");
        assert!(!engine.is_quote_fresh(trade, None), "unknown head");

        engine.record_confirmed_block(150);
        assert!(
            !engine.is_quote_fresh(trade, Some(105)),
            "below the confirmed floor"
        );
        assert_eq!(
            engine.ensure_fresh(trade, Some(105)),
            Err(crate::errors::QuoteError::Stale)
        );
    }

    #[tokio::test]
    async fn unanchored_trade_is_not_block_checked() {
        let engine = engine_with(counting_source());
        let outcome = engine.resolve_quote(&args_with_amount(5)).await;
        let mut trade = outcome.trade().unwrap().clone();
        trade.block_number = None;
        assert!(engine.is_quote_fresh(&trade, None));
    }

    #[tokio::test]
    async fn refresh_task_publishes_and_stops() {
        let source = counting_source();
        let engine = engine_with(source.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let (handle, mut outcomes) =
            engine.spawn_refresh_task(args_with_amount(5), shutdown_rx);
        outcomes.changed().await.unwrap();
        assert!(outcomes.borrow().as_ref().unwrap().trade().is_some());

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
        assert!(source.calls.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn refresh_task_respects_the_cache_ttl() {
        let source = counting_source();
        let engine = engine_with(source.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // Interval (1 s) far below the TTL (10 s): the second tick must be
        // served from cache, not the source.
        let (handle, mut outcomes) =
            engine.spawn_refresh_task(args_with_amount(5), shutdown_rx);
        outcomes.changed().await.unwrap();
        outcomes.changed().await.unwrap();

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }
}
