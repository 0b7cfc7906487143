//! # Error Taxonomy
//!
//! Typed failures surfaced by the quote engine. "No route found" is
//! deliberately absent: it is a valid terminal outcome, not an error, and lives
//! on [`crate::cascade::QuoteOutcome`] instead.

/// Failures a quote resolution can surface to callers.
///
/// Propagation policy: pure components (graph builder, assembler, freshness,
/// slippage) never retry; retry and fallback live exclusively in the cascade.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuoteError {
    /// Caller error; surfaced immediately, never retried, no network activity.
    #[error("invalid quote arguments: {0}")]
    InvalidArguments(String),

    /// Network/timeout/5xx from every configured quoting source.
    #[error("all quoting sources failed: {0}")]
    Transport(String),

    /// The quote's edges don't cover the token path the quote claims.
    /// Fail-soft at path granularity; fatal only if no path survives.
    #[error("quote response inconsistent: {0}")]
    DataInconsistency(String),

    /// Block-anchored value rejected by the freshness validator; callers
    /// should silently re-fetch rather than display.
    #[error("block-anchored quote data is stale")]
    Stale,
}
