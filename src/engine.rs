//! The trend engine: composes the cache, gate, retry envelope, connector,
//! scorer and query store into the query protocol.

use crate::cache::{CacheStore, Fingerprint, ResponseCache};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::error::TrendError;
use crate::gate::UpstreamGate;
use crate::retry::{RetryError, RetryPolicy};
use crate::score::score_series;
use crate::sleeper::{Sleeper, TokioSleeper};
use crate::store::{QueryStore, TrendResult};
use crate::types::{ByCountryPoint, CacheInfo, QueryParams, SeriesPoint, TrendResponse};
use crate::upstream::{TrendsProvider, UpstreamError};
use std::sync::Arc;

/// Source tag attached to live responses.
const SOURCE_PROVIDER: &str = "google_trends";
/// Source tag prepended when a stale cache entry answers for a failed
/// upstream.
const SOURCE_STALE: &str = "stale_cache";

/// Orchestrator for trend queries.
///
/// Many logical queries may run concurrently; exactly one reaches the
/// upstream connector at a time. The cache tiers, the retry envelope and
/// the persistence protocol all hang off that invariant.
#[derive(Clone)]
pub struct TrendEngine {
    provider: Arc<dyn TrendsProvider>,
    cache: ResponseCache,
    store: Arc<dyn QueryStore>,
    gate: UpstreamGate,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

/// Missing pieces reported by [`TrendEngineBuilder::build`].
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum EngineBuildError {
    #[error("a trends provider is required")]
    MissingProvider,
    #[error("a cache store is required")]
    MissingCacheStore,
    #[error("a query store is required")]
    MissingQueryStore,
}

#[derive(Default)]
pub struct TrendEngineBuilder {
    provider: Option<Arc<dyn TrendsProvider>>,
    cache_store: Option<Arc<dyn CacheStore>>,
    query_store: Option<Arc<dyn QueryStore>>,
    config: Option<EngineConfig>,
    clock: Option<Arc<dyn Clock>>,
    sleeper: Option<Arc<dyn Sleeper>>,
}

impl TrendEngineBuilder {
    pub fn provider(mut self, provider: Arc<dyn TrendsProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.cache_store = Some(store);
        self
    }

    pub fn query_store(mut self, store: Arc<dyn QueryStore>) -> Self {
        self.query_store = Some(store);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    pub fn build(self) -> Result<TrendEngine, EngineBuildError> {
        let provider = self.provider.ok_or(EngineBuildError::MissingProvider)?;
        let cache_store = self.cache_store.ok_or(EngineBuildError::MissingCacheStore)?;
        let query_store = self.query_store.ok_or(EngineBuildError::MissingQueryStore)?;
        let config = self.config.unwrap_or_default();
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let sleeper = self.sleeper.unwrap_or_else(|| Arc::new(TokioSleeper));

        let cache = ResponseCache::new(
            cache_store,
            clock.clone(),
            config.fresh_ttl_secs,
            config.stale_ttl_secs,
        );
        let retry = RetryPolicy::from_config(&config).with_sleeper(sleeper.clone());
        let gate = UpstreamGate::new(config.gate_permits);

        Ok(TrendEngine { provider, cache, store: query_store, gate, retry, sleeper, clock, config })
    }
}

impl TrendEngine {
    pub fn builder() -> TrendEngineBuilder {
        TrendEngineBuilder::default()
    }

    /// Run one trend query.
    ///
    /// Fresh cache answers immediately. On a miss the query is recorded,
    /// the upstream is fetched under the gate and the retry envelope,
    /// the series is scored, and the result is persisted and cached. When
    /// every attempt fails, a stale cache entry is preferred over an error.
    pub async fn execute(
        &self,
        params: &QueryParams,
        request_id: &str,
    ) -> Result<TrendResponse, TrendError> {
        let fingerprint = Fingerprint::new(params);

        if let Some(mut response) = self.cache.get_fresh(&fingerprint).await {
            let ttl = self.cache.ttl(&fingerprint).await;
            tracing::debug!(%fingerprint, ttl, request_id, "fresh cache hit");
            response.cache = CacheInfo { hit: true, ttl_seconds: ttl };
            response.request_id = request_id.to_string();
            return Ok(response);
        }

        let query_id = self.store.create_running(params).await.map_err(|err| {
            tracing::error!(error = %err, request_id, "could not record query");
            TrendError::Storage(err.to_string())
        })?;
        tracing::debug!(%fingerprint, %query_id, request_id, "cache miss, querying upstream");

        let fetched = {
            let _permit = self.gate.acquire().await;
            self.fetch_under_retry(params).await
            // Permit drops here on every path, including cancellation.
        };

        match fetched {
            Ok((series, by_country)) => {
                let values: Vec<u32> = series.iter().map(|point| point.value).collect();
                let scored = score_series(&values, params.keyword(), params.country());

                let result = TrendResult {
                    scored: scored.clone(),
                    sources_used: vec![SOURCE_PROVIDER.to_string()],
                    series: series.clone(),
                    by_country: by_country.clone(),
                };
                self.persist_best_effort(&query_id, &result).await;

                let response = TrendResponse {
                    keyword: params.keyword().to_string(),
                    country: params.country(),
                    window_days: params.window_days(),
                    baseline_days: params.baseline_days(),
                    generated_at: self.clock.now(),
                    sources_used: vec![SOURCE_PROVIDER.to_string()],
                    trend_score: scored.trend_score,
                    signals: scored.signals,
                    series,
                    by_country,
                    explain: scored.explain,
                    cache: CacheInfo {
                        hit: false,
                        ttl_seconds: self.config.fresh_ttl_secs as i64,
                    },
                    request_id: request_id.to_string(),
                    age_seconds: None,
                    cached_at: None,
                };
                self.cache.set(&fingerprint, &response).await;
                Ok(response)
            }
            Err(err) => {
                let message = err.to_string();
                if let Err(store_err) = self.store.mark_error(&query_id, &message).await {
                    tracing::warn!(%query_id, error = %store_err, "could not mark query errored");
                }

                if let Some(stale) = self.cache.get_stale(&fingerprint).await {
                    tracing::warn!(
                        %fingerprint,
                        age_seconds = stale.age_seconds,
                        error = %message,
                        "upstream failed, serving stale cache"
                    );
                    let mut response = stale.response;
                    response.sources_used.insert(0, SOURCE_STALE.to_string());
                    response.age_seconds = Some(stale.age_seconds);
                    response.cached_at = Some(stale.cached_at);
                    response.cache = CacheInfo { hit: true, ttl_seconds: 0 };
                    response.request_id = request_id.to_string();
                    return Ok(response);
                }

                Err(self.map_upstream_failure(err, params))
            }
        }
    }

    /// Both upstream reads as one retried unit: series, mandatory pause,
    /// country comparison. The pause keeps even a single logical query
    /// under the provider's burst detector.
    async fn fetch_under_retry(
        &self,
        params: &QueryParams,
    ) -> Result<(Vec<SeriesPoint>, Vec<ByCountryPoint>), RetryError> {
        let end = self.clock.now().date_naive();
        let start = end - chrono::Duration::days(params.range_days() as i64 - 1);
        let keyword = params.keyword().to_string();
        let country = params.country();
        let request_delay = self.config.request_delay();

        self.retry
            .execute(|| {
                let provider = self.provider.clone();
                let sleeper = self.sleeper.clone();
                let keyword = keyword.clone();
                async move {
                    let series =
                        provider.fetch_series(&keyword, country, start, end).await?;
                    sleeper.sleep(request_delay).await;
                    let by_country = provider.fetch_by_country(&keyword).await?;
                    Ok((series, by_country))
                }
            })
            .await
    }

    async fn persist_best_effort(&self, query_id: &str, result: &TrendResult) {
        if let Err(err) = self.store.persist_result(query_id, result).await {
            tracing::warn!(query_id, error = %err, "could not persist result");
            return;
        }
        if let Err(err) = self.store.mark_done(query_id).await {
            tracing::warn!(query_id, error = %err, "could not mark query done");
        }
    }

    fn map_upstream_failure(&self, err: RetryError, params: &QueryParams) -> TrendError {
        match err {
            RetryError::Fatal(UpstreamError::NoData) => {
                TrendError::DataNotFound { keyword: params.keyword().to_string() }
            }
            RetryError::Fatal(other) => TrendError::ProviderUnavailable {
                attempts: 1,
                blocked: false,
                last_error: other.to_string(),
            },
            RetryError::Exhausted { attempts, blocked, last } => {
                if blocked {
                    tracing::warn!(
                        attempts,
                        error = %last,
                        "provider looks blocked (anti-bot response)"
                    );
                }
                TrendError::ProviderUnavailable {
                    attempts,
                    blocked,
                    last_error: last.to_string(),
                }
            }
        }
    }
}
