//! Shared fixtures: a scripted provider spy and an engine wired over
//! in-memory backends with a manual clock and a recording sleeper.
#![allow(dead_code)] // not every test binary uses every fixture

use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use trendpulse::{
    ByCountryPoint, Country, EngineConfig, ManualClock, MemoryQueryStore, MemoryStore,
    QueryParams, ResponseCache, SeriesPoint, TrackingSleeper, TrendEngine, TrendsProvider,
    UpstreamError,
};

/// What the scripted provider should do on its next calls.
#[derive(Debug, Clone)]
pub enum ProviderMode {
    Ok { series_values: Vec<u32>, by_country: Vec<ByCountryPoint> },
    FailStatus(u16),
    FailHtml,
    NoData,
}

/// Spy implementation of [`TrendsProvider`].
///
/// Counts calls, records the keywords handed to the series fetch (their
/// order is the gate admission order), and optionally parks each series
/// fetch on a semaphore so tests can control when admitted work proceeds.
pub struct ScriptedProvider {
    mode: Mutex<ProviderMode>,
    pub series_calls: AtomicUsize,
    pub by_country_calls: AtomicUsize,
    pub admitted_keywords: Mutex<Vec<String>>,
    pub hold: Option<Arc<tokio::sync::Semaphore>>,
}

impl ScriptedProvider {
    pub fn with_mode(mode: ProviderMode) -> Arc<Self> {
        Arc::new(Self {
            mode: Mutex::new(mode),
            series_calls: AtomicUsize::new(0),
            by_country_calls: AtomicUsize::new(0),
            admitted_keywords: Mutex::new(Vec::new()),
            hold: None,
        })
    }

    /// Provider that answers `values` as the series and a fixed country
    /// comparison.
    pub fn ok(values: Vec<u32>) -> Arc<Self> {
        Self::with_mode(ProviderMode::Ok {
            series_values: values,
            by_country: default_by_country(),
        })
    }

    /// Like [`ScriptedProvider::ok`], but every series fetch waits for a
    /// permit on `hold` before answering.
    pub fn ok_held(values: Vec<u32>, hold: Arc<tokio::sync::Semaphore>) -> Arc<Self> {
        Arc::new(Self {
            mode: Mutex::new(ProviderMode::Ok {
                series_values: values,
                by_country: default_by_country(),
            }),
            series_calls: AtomicUsize::new(0),
            by_country_calls: AtomicUsize::new(0),
            admitted_keywords: Mutex::new(Vec::new()),
            hold: Some(hold),
        })
    }

    pub fn set_mode(&self, mode: ProviderMode) {
        *self.mode.lock().unwrap() = mode;
    }

    fn current_mode(&self) -> ProviderMode {
        self.mode.lock().unwrap().clone()
    }

    fn fail(mode: &ProviderMode) -> Option<UpstreamError> {
        match mode {
            ProviderMode::Ok { .. } => None,
            ProviderMode::FailStatus(status) => {
                Some(UpstreamError::Status { status: *status, endpoint: "explore" })
            }
            ProviderMode::FailHtml => Some(UpstreamError::invalid_payload(
                "<!DOCTYPE html><html><body>Our systems have detected unusual traffic</body></html>",
            )),
            ProviderMode::NoData => Some(UpstreamError::NoData),
        }
    }
}

pub fn default_by_country() -> Vec<ByCountryPoint> {
    vec![
        ByCountryPoint { country: Country::MX, value: 90 },
        ByCountryPoint { country: Country::ES, value: 40 },
        ByCountryPoint { country: Country::CR, value: 10 },
    ]
}

#[async_trait]
impl TrendsProvider for ScriptedProvider {
    async fn fetch_series(
        &self,
        keyword: &str,
        _country: Country,
        _start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<SeriesPoint>, UpstreamError> {
        self.series_calls.fetch_add(1, Ordering::SeqCst);
        self.admitted_keywords.lock().unwrap().push(keyword.to_string());
        if let Some(hold) = &self.hold {
            let permit = hold.acquire().await.expect("hold semaphore closed");
            permit.forget();
        }

        let mode = self.current_mode();
        if let Some(err) = Self::fail(&mode) {
            return Err(err);
        }
        let ProviderMode::Ok { series_values, .. } = mode else { unreachable!() };

        // Contiguous daily series ending on the requested end date.
        let len = series_values.len() as i64;
        Ok(series_values
            .iter()
            .enumerate()
            .map(|(i, &value)| SeriesPoint {
                date: end - chrono::Duration::days(len - 1 - i as i64),
                value,
            })
            .collect())
    }

    async fn fetch_by_country(
        &self,
        _keyword: &str,
    ) -> Result<Vec<ByCountryPoint>, UpstreamError> {
        self.by_country_calls.fetch_add(1, Ordering::SeqCst);
        let mode = self.current_mode();
        if let Some(err) = Self::fail(&mode) {
            return Err(err);
        }
        let ProviderMode::Ok { by_country, .. } = mode else { unreachable!() };
        Ok(by_country)
    }
}

/// An engine plus handles to everything a test wants to poke.
pub struct TestEngine {
    pub engine: TrendEngine,
    pub provider: Arc<ScriptedProvider>,
    pub clock: Arc<ManualClock>,
    pub sleeper: Arc<TrackingSleeper>,
    pub queries: Arc<MemoryQueryStore>,
    pub cache: ResponseCache,
}

/// Short TTLs so tests can expire tiers by advancing the clock.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        fresh_ttl_secs: 100,
        stale_ttl_secs: 1_000,
        ..EngineConfig::default()
    }
}

pub fn engine_with(provider: Arc<ScriptedProvider>, config: EngineConfig) -> TestEngine {
    let clock =
        Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()));
    let sleeper = Arc::new(TrackingSleeper::new());
    let cache_store = Arc::new(MemoryStore::new(clock.clone()));
    let queries = Arc::new(MemoryQueryStore::new(clock.clone()));

    let cache = ResponseCache::new(
        cache_store.clone(),
        clock.clone(),
        config.fresh_ttl_secs,
        config.stale_ttl_secs,
    );

    let engine = TrendEngine::builder()
        .provider(provider.clone())
        .cache_store(cache_store)
        .query_store(queries.clone())
        .config(config)
        .clock(clock.clone())
        .sleeper(sleeper.clone())
        .build()
        .expect("test engine builds");

    TestEngine { engine, provider, clock, sleeper, queries, cache }
}

pub fn engine_ok(values: Vec<u32>) -> TestEngine {
    engine_with(ScriptedProvider::ok(values), test_config())
}

pub fn params(keyword: &str, country: Country) -> QueryParams {
    QueryParams::new(keyword, country, 30, 90).expect("valid test params")
}
