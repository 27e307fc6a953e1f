#![forbid(unsafe_code)]

//! # trendpulse
//!
//! The trend query engine of a keyword-analytics service: given a keyword
//! and a country it returns a 0–100 trend score, the underlying interest
//! series, a fixed three-country comparison, and four explanation lines.
//!
//! The upstream data provider rate-limits and anti-bots its clients, so the
//! engine is built around disciplined access to it:
//!
//! - **Concurrency gate**: at most one in-flight upstream call per process,
//!   FIFO admission
//! - **Retry envelope**: bounded attempts, exponential backoff, detection
//!   of anti-bot HTML responses (with an extra penalty delay)
//! - **Two-tier cache**: a fresh entry answered directly and a longer-lived
//!   stale entry served when the upstream is down
//! - **Deterministic scoring**: three normalized signals combined with
//!   fixed weights
//! - **Query audit store**: Running → Done | Error lifecycle with the
//!   scored result persisted transactionally
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use trendpulse::{
//!     Country, EngineConfig, GoogleTrendsClient, MemoryQueryStore, MemoryStore,
//!     QueryParams, SystemClock, TrendEngine,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let clock = Arc::new(SystemClock);
//!     let engine = TrendEngine::builder()
//!         .provider(Arc::new(GoogleTrendsClient::new()?))
//!         .cache_store(Arc::new(MemoryStore::new(clock.clone())))
//!         .query_store(Arc::new(MemoryQueryStore::new(clock)))
//!         .config(EngineConfig::from_env())
//!         .build()?;
//!
//!     let params = QueryParams::new("bitcoin", Country::MX, 30, 90)?;
//!     let response = engine.execute(&params, "req-1").await?;
//!     println!("{} scored {}", response.keyword, response.trend_score);
//!     Ok(())
//! }
//! ```

mod cache;
mod clock;
mod config;
mod engine;
mod error;
mod gate;
mod google;
mod redis_store;
mod retry;
mod score;
mod sleeper;
mod sqlite_store;
mod store;
mod types;
mod upstream;

// Re-exports
pub use cache::{
    CacheBackendError, CacheStore, Fingerprint, MemoryStore, ResponseCache, StaleHit,
    CACHE_SCHEMA_VERSION,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::EngineConfig;
pub use engine::{EngineBuildError, TrendEngine, TrendEngineBuilder};
pub use error::TrendError;
pub use gate::{GatePermit, UpstreamGate};
pub use google::GoogleTrendsClient;
pub use redis_store::RedisStore;
pub use retry::{looks_blocked, RetryError, RetryPolicy};
pub use score::{score_series, Scored};
pub use sleeper::{InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper};
pub use sqlite_store::SqliteQueryStore;
pub use store::{MemoryQueryStore, QueryStatus, QueryStore, StoreError, TrendQuery, TrendResult};
pub use types::{
    ByCountryPoint, CacheInfo, Country, QueryParams, SeriesPoint, Signals, TrendResponse,
    ValidationError, WindowDays,
};
pub use upstream::{epoch_to_date, TrendsProvider, UpstreamError};

pub mod prelude;
