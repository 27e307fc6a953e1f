//! Query audit store: one record per logical query with a
//! Running → Done | Error lifecycle, plus the scored outcome for Done
//! queries.

use crate::clock::Clock;
use crate::score::Scored;
use crate::types::{ByCountryPoint, QueryParams, SeriesPoint};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Lifecycle of a query record. Terminal states never transition again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    Running,
    Done,
    Error,
}

impl QueryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryStatus::Running => "running",
            QueryStatus::Done => "done",
            QueryStatus::Error => "error",
        }
    }
}

/// Audit record of one logical query.
#[derive(Debug, Clone)]
pub struct TrendQuery {
    pub id: String,
    pub keyword: String,
    pub country: String,
    pub window_days: u32,
    pub baseline_days: u32,
    pub status: QueryStatus,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

/// Scored outcome persisted 1:1 with a Done query.
#[derive(Debug, Clone)]
pub struct TrendResult {
    pub scored: Scored,
    pub sources_used: Vec<String>,
    pub series: Vec<SeriesPoint>,
    pub by_country: Vec<ByCountryPoint>,
}

#[derive(Debug, thiserror::Error)]
#[error("query store: {0}")]
pub struct StoreError(pub String);

/// Write operations the engine needs from persistence.
///
/// `create_running` is critical: its failure fails the request. The rest
/// are best-effort at the engine layer (logged, not surfaced).
#[async_trait]
pub trait QueryStore: Send + Sync {
    /// Insert a new query in Running state, returning its id.
    async fn create_running(&self, params: &QueryParams) -> Result<String, StoreError>;

    /// Write the result and both point sets, all-or-nothing.
    async fn persist_result(
        &self,
        query_id: &str,
        result: &TrendResult,
    ) -> Result<(), StoreError>;

    async fn mark_done(&self, query_id: &str) -> Result<(), StoreError>;

    async fn mark_error(&self, query_id: &str, message: &str) -> Result<(), StoreError>;
}

/// In-process [`QueryStore`] for tests and single-node use.
#[derive(Debug)]
pub struct MemoryQueryStore {
    clock: Arc<dyn Clock>,
    queries: Mutex<HashMap<String, TrendQuery>>,
    results: Mutex<HashMap<String, TrendResult>>,
}

impl MemoryQueryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock, queries: Mutex::new(HashMap::new()), results: Mutex::new(HashMap::new()) }
    }

    pub fn query(&self, query_id: &str) -> Option<TrendQuery> {
        self.queries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(query_id)
            .cloned()
    }

    pub fn result(&self, query_id: &str) -> Option<TrendResult> {
        self.results
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(query_id)
            .cloned()
    }

    pub fn queries(&self) -> Vec<TrendQuery> {
        self.queries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .cloned()
            .collect()
    }

    fn finish(
        &self,
        query_id: &str,
        status: QueryStatus,
        error_message: Option<String>,
    ) -> Result<(), StoreError> {
        let mut queries = self.queries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let query = queries
            .get_mut(query_id)
            .ok_or_else(|| StoreError(format!("unknown query id {query_id}")))?;
        if query.status != QueryStatus::Running {
            return Err(StoreError(format!(
                "query {query_id} is already {}",
                query.status.as_str()
            )));
        }
        query.status = status;
        query.finished_at = Some(self.clock.now());
        query.error_message = error_message;
        Ok(())
    }
}

#[async_trait]
impl QueryStore for MemoryQueryStore {
    async fn create_running(&self, params: &QueryParams) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let query = TrendQuery {
            id: id.clone(),
            keyword: params.keyword().to_string(),
            country: params.country().to_string(),
            window_days: params.window_days(),
            baseline_days: params.baseline_days(),
            status: QueryStatus::Running,
            created_at: self.clock.now(),
            finished_at: None,
            error_message: None,
        };
        self.queries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id.clone(), query);
        Ok(id)
    }

    async fn persist_result(
        &self,
        query_id: &str,
        result: &TrendResult,
    ) -> Result<(), StoreError> {
        let queries = self.queries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !queries.contains_key(query_id) {
            return Err(StoreError(format!("unknown query id {query_id}")));
        }
        drop(queries);
        self.results
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(query_id.to_string(), result.clone());
        Ok(())
    }

    async fn mark_done(&self, query_id: &str) -> Result<(), StoreError> {
        self.finish(query_id, QueryStatus::Done, None)
    }

    async fn mark_error(&self, query_id: &str, message: &str) -> Result<(), StoreError> {
        self.finish(query_id, QueryStatus::Error, Some(message.to_string()))
    }
}
