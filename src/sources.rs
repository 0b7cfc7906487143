//! # Quote Sources
//!
//! The `QuoteSource` trait is the seam between the engine and whatever
//! actually prices a swap: remote routing services, or the local pathfinding
//! fallback in `local_source`. Sources return a decoded [`RawQuote`] or a
//! typed failure; they never retry themselves, since retry and fallback order
//! belong to the cascade.

use crate::cascade::QuoteArgs;
use crate::wire::{RawQuote, WireErrorBody, WireQuoteResponse};
use async_trait::async_trait;
use log::{debug, warn};
use std::time::Duration;

pub use crate::wire::RawRoute;

/// Failure of a single source attempt.
///
/// `NoRoute` is authoritative: the source understood the request and knows no
/// route exists, so the cascade must not fall through to another source.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    #[error("no route between the requested tokens")]
    NoRoute,
    #[error("transport failure: {0}")]
    Transport(String),
}

impl SourceError {
    pub fn is_transport(&self) -> bool {
        matches!(self, SourceError::Transport(_))
    }
}

/// A strategy capable of producing a raw quote for fully-validated arguments.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Name used for logging and fallback diagnostics.
    fn name(&self) -> &'static str;

    async fn fetch_quote(&self, args: &QuoteArgs) -> Result<RawQuote, SourceError>;
}

/// A remote quoting service spoken to over HTTPS.
pub struct RemoteQuoteSource {
    name: &'static str,
    endpoint: String,
    client: reqwest::Client,
}

impl RemoteQuoteSource {
    pub fn new(
        name: &'static str,
        endpoint: impl Into<String>,
        request_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            name,
            endpoint: endpoint.into(),
            client,
        })
    }
}

#[async_trait]
impl QuoteSource for RemoteQuoteSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch_quote(&self, args: &QuoteArgs) -> Result<RawQuote, SourceError> {
        let request = args.to_wire_request();
        debug!(
            "{}: requesting quote {} -> {} amount {}",
            self.name, args.token_in, args.token_out, args.amount
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| SourceError::Transport(format!("{}: {}", self.name, e)))?;

        let status = response.status();
        if status.is_success() {
            let body: WireQuoteResponse = response.json().await.map_err(|e| {
                SourceError::Transport(format!("{}: malformed quote body: {}", self.name, e))
            })?;
            return body.decode().map_err(|e| {
                SourceError::Transport(format!("{}: undecodable quote: {}", self.name, e))
            });
        }

        // 4xx bodies can carry the authoritative no-route code; anything else
        // (including an unparseable error body) is a transport failure.
        if status.is_client_error() {
            if let Ok(body) = response.json::<WireErrorBody>().await {
                if body.is_no_route() {
                    debug!("{}: authoritative no-route answer", self.name);
                    return Err(SourceError::NoRoute);
                }
                warn!("{}: quote rejected: {}", self.name, body.error_code);
                return Err(SourceError::Transport(format!(
                    "{}: {}",
                    self.name, body.error_code
                )));
            }
        }
        Err(SourceError::Transport(format!(
            "{}: http status {}",
            self.name, status
        )))
    }
}
