//! # Quote Cache / Dedup Layer
//!
//! Wraps the cascade with a short-lived result cache keyed by request
//! fingerprint plus single-flight deduplication: at most one cascade runs per
//! fingerprint at a time, and every concurrent caller for that fingerprint
//! receives the same outcome.
//!
//! Entries expire after a fixed TTL and are evicted lazily on the next lookup
//! (plus a size-capped sweep, so an abandoned fingerprint cannot pin memory
//! forever). Terminal no-route outcomes are cached like successes; invalid
//! arguments never reach this layer's fetch path.

use crate::cascade::{QuoteArgs, QuoteCascade, QuoteOutcome};
use dashmap::DashMap;
use log::debug;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};

#[derive(Debug, Clone)]
struct CacheEntry {
    outcome: QuoteOutcome,
    expires_at: Instant,
}

/// Hit/miss/eviction counters for diagnostics.
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
}

impl CacheStats {
    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            self.evictions.load(Ordering::Relaxed),
        )
    }
}

type InFlightMap = Mutex<HashMap<u64, watch::Receiver<Option<QuoteOutcome>>>>;

/// TTL cache with single-flight dedup in front of a [`QuoteCascade`].
pub struct QuoteCache {
    ttl: Duration,
    max_entries: usize,
    entries: DashMap<u64, CacheEntry>,
    in_flight: InFlightMap,
    pub stats: CacheStats,
}

enum Role {
    Leader(watch::Sender<Option<QuoteOutcome>>),
    Follower(watch::Receiver<Option<QuoteOutcome>>),
}

impl QuoteCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries,
            entries: DashMap::new(),
            in_flight: Mutex::new(HashMap::new()),
            stats: CacheStats::default(),
        }
    }

    /// Serves from cache, joins an in-flight resolution, or runs the cascade.
    ///
    /// Invalid arguments short-circuit without touching the cache so a typo
    /// never occupies a fingerprint slot.
    pub async fn get_or_fetch(&self, args: &QuoteArgs, cascade: &QuoteCascade) -> QuoteOutcome {
        if let Err(e) = args.validate() {
            return QuoteOutcome::Error(e);
        }
        let fingerprint = args.fingerprint();

        loop {
            if let Some(hit) = self.lookup(fingerprint) {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                return hit;
            }

            let role = {
                let mut in_flight = self.in_flight.lock().await;
                match in_flight.get(&fingerprint) {
                    Some(rx) => Role::Follower(rx.clone()),
                    None => {
                        let (tx, rx) = watch::channel(None);
                        in_flight.insert(fingerprint, rx);
                        Role::Leader(tx)
                    }
                }
            };

            match role {
                Role::Leader(tx) => {
                    self.stats.misses.fetch_add(1, Ordering::Relaxed);
                    let outcome = cascade.resolve(args).await;
                    self.store(fingerprint, outcome.clone());
                    // Publish before unregistering so no follower can miss it.
                    let _ = tx.send(Some(outcome.clone()));
                    self.in_flight.lock().await.remove(&fingerprint);
                    return outcome;
                }
                Role::Follower(mut rx) => {
                    debug!("quote cache: joining in-flight fetch {:#x}", fingerprint);
                    loop {
                        if let Some(outcome) = rx.borrow_and_update().clone() {
                            return outcome;
                        }
                        if rx.changed().await.is_err() {
                            // Leader dropped without publishing; start over.
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Live entry for the fingerprint, evicting it if expired.
    fn lookup(&self, fingerprint: u64) -> Option<QuoteOutcome> {
        let expired = match self.entries.get(&fingerprint) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Some(entry.outcome.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove(&fingerprint);
            self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        }
        None
    }

    fn store(&self, fingerprint: u64, outcome: QuoteOutcome) {
        self.entries.insert(
            fingerprint,
            CacheEntry {
                outcome,
                expires_at: Instant::now() + self.ttl,
            },
        );
        self.maybe_evict();
    }

    /// Size-capped sweep: drop expired entries first, then oldest-expiring
    /// entries until back under the cap.
    fn maybe_evict(&self) {
        if self.entries.len() <= self.max_entries {
            return;
        }
        let now = Instant::now();
        let mut removed = 0usize;
        self.entries.retain(|_, entry| {
            let keep = entry.expires_at > now;
            if !keep {
                removed += 1;
            }
            keep
        });
        while self.entries.len() > self.max_entries {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|e| e.value().expires_at)
                .map(|e| *e.key());
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                    removed += 1;
                }
                None => break,
            }
        }
        if removed > 0 {
            debug!("quote cache: evicted {} entries", removed);
            self.stats
                .evictions
                .fetch_add(removed as u64, Ordering::Relaxed);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops one fingerprint's entry so the next lookup re-fetches.
    pub fn invalidate(&self, fingerprint: u64) {
        self.entries.remove(&fingerprint);
    }

    /// Drop every cached outcome (e.g., after a chain re-org signal).
    pub fn clear(&self) {
        self.entries.clear();
    }
}
