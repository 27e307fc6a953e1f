//! One-line import for the common engine surface.
//!
//! ```
//! use trendpulse::prelude::*;
//! ```

pub use crate::cache::{CacheStore, Fingerprint, MemoryStore, ResponseCache};
pub use crate::clock::{Clock, SystemClock};
pub use crate::config::EngineConfig;
pub use crate::engine::{TrendEngine, TrendEngineBuilder};
pub use crate::error::TrendError;
pub use crate::gate::UpstreamGate;
pub use crate::google::GoogleTrendsClient;
pub use crate::retry::RetryPolicy;
pub use crate::score::score_series;
pub use crate::sleeper::{Sleeper, TokioSleeper};
pub use crate::store::{MemoryQueryStore, QueryStore};
pub use crate::types::{Country, QueryParams, TrendResponse};
pub use crate::upstream::{TrendsProvider, UpstreamError};
