//! Provider-facing seam: the operations the engine needs from a trends
//! backend, and the raw failures a backend may surface.

use crate::types::{ByCountryPoint, Country, SeriesPoint};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};

/// The two read operations the engine performs against the data provider.
///
/// Implementations do not retry and do not classify failures; that is the
/// retry envelope's job. They do own the provider's wire quirks: timestamp
/// normalization, payload prefixes, error shapes.
#[async_trait]
pub trait TrendsProvider: Send + Sync {
    /// Interest over time for one keyword in one country, ascending by date,
    /// de-duplicated, values in `[0, 100]`.
    async fn fetch_series(
        &self,
        keyword: &str,
        country: Country,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<SeriesPoint>, UpstreamError>;

    /// One worldwide comparison query, filtered to the supported countries.
    /// Exactly three entries, missing countries filled with 0, sorted
    /// descending by value (ties by country code).
    async fn fetch_by_country(&self, keyword: &str)
        -> Result<Vec<ByCountryPoint>, UpstreamError>;
}

/// Raw connector failures, surfaced unclassified to the retry envelope.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} from {endpoint}")]
    Status { status: u16, endpoint: &'static str },

    /// The body could not be parsed as structured data. The snippet of the
    /// raw payload is part of the message: an anti-bot HTML page shows up
    /// here, and downstream classification keys on exactly that.
    #[error("response is not valid JSON: {snippet}")]
    InvalidPayload { snippet: String },

    #[error("explore response is missing the {kind} widget")]
    MissingWidget { kind: &'static str },

    /// The provider answered with a shape we recognize as "no data for this
    /// keyword". Not retryable.
    #[error("no trend data for this keyword")]
    NoData,
}

impl UpstreamError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, UpstreamError::NoData)
    }

    /// Build an `InvalidPayload` from a raw body, keeping a bounded snippet.
    pub fn invalid_payload(body: &str) -> Self {
        let snippet: String = body.chars().take(160).collect();
        UpstreamError::InvalidPayload { snippet }
    }
}

/// Normalize a provider epoch-seconds timestamp to a UTC calendar date.
pub fn epoch_to_date(epoch_secs: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(epoch_secs, 0).map(|dt| dt.date_naive())
}
