//! SQLite backend for the query store.

use crate::store::{QueryStore, StoreError, TrendResult};
use crate::types::QueryParams;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

/// [`QueryStore`] over a `sqlx` SQLite pool.
///
/// Four logical tables: queries, results, series points and country points,
/// the latter three keyed by query id. Result writes run in one transaction
/// so a Done query always has its complete point sets.
#[derive(Debug, Clone)]
pub struct SqliteQueryStore {
    pool: SqlitePool,
}

impl SqliteQueryStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the tables if they do not exist yet.
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        let statements = [
            "CREATE TABLE IF NOT EXISTS trend_queries (
                id TEXT PRIMARY KEY,
                keyword TEXT NOT NULL,
                country TEXT NOT NULL,
                window_days INTEGER NOT NULL,
                baseline_days INTEGER NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                finished_at TEXT,
                error_message TEXT
            )",
            "CREATE TABLE IF NOT EXISTS trend_results (
                query_id TEXT PRIMARY KEY REFERENCES trend_queries(id),
                trend_score REAL NOT NULL,
                growth_7_vs_30 REAL NOT NULL,
                slope_14d REAL NOT NULL,
                recent_peak_30d REAL NOT NULL,
                explain_lines TEXT NOT NULL,
                sources_used TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS series_points (
                query_id TEXT NOT NULL REFERENCES trend_queries(id),
                date TEXT NOT NULL,
                value INTEGER NOT NULL,
                PRIMARY KEY (query_id, date)
            )",
            "CREATE TABLE IF NOT EXISTS country_points (
                query_id TEXT NOT NULL REFERENCES trend_queries(id),
                country TEXT NOT NULL,
                value INTEGER NOT NULL,
                PRIMARY KEY (query_id, country)
            )",
        ];
        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await.map_err(to_store_error)?;
        }
        Ok(())
    }
}

fn to_store_error(err: sqlx::Error) -> StoreError {
    StoreError(err.to_string())
}

#[async_trait]
impl QueryStore for SqliteQueryStore {
    async fn create_running(&self, params: &QueryParams) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO trend_queries
               (id, keyword, country, window_days, baseline_days, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'running', ?6)",
        )
        .bind(&id)
        .bind(params.keyword())
        .bind(params.country().as_str())
        .bind(params.window_days() as i64)
        .bind(params.baseline_days() as i64)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(to_store_error)?;
        Ok(id)
    }

    async fn persist_result(
        &self,
        query_id: &str,
        result: &TrendResult,
    ) -> Result<(), StoreError> {
        let explain_lines =
            serde_json::to_string(&result.scored.explain).map_err(|e| StoreError(e.to_string()))?;
        let sources_used =
            serde_json::to_string(&result.sources_used).map_err(|e| StoreError(e.to_string()))?;

        let mut tx = self.pool.begin().await.map_err(to_store_error)?;

        sqlx::query(
            "INSERT INTO trend_results
               (query_id, trend_score, growth_7_vs_30, slope_14d, recent_peak_30d,
                explain_lines, sources_used)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(query_id)
        .bind(result.scored.trend_score)
        .bind(result.scored.signals.growth_7_vs_30)
        .bind(result.scored.signals.slope_14d)
        .bind(result.scored.signals.recent_peak_30d)
        .bind(&explain_lines)
        .bind(&sources_used)
        .execute(&mut *tx)
        .await
        .map_err(to_store_error)?;

        for point in &result.series {
            sqlx::query(
                "INSERT INTO series_points (query_id, date, value) VALUES (?1, ?2, ?3)",
            )
            .bind(query_id)
            .bind(point.date.format("%Y-%m-%d").to_string())
            .bind(point.value as i64)
            .execute(&mut *tx)
            .await
            .map_err(to_store_error)?;
        }

        for point in &result.by_country {
            sqlx::query(
                "INSERT INTO country_points (query_id, country, value) VALUES (?1, ?2, ?3)",
            )
            .bind(query_id)
            .bind(point.country.as_str())
            .bind(point.value as i64)
            .execute(&mut *tx)
            .await
            .map_err(to_store_error)?;
        }

        tx.commit().await.map_err(to_store_error)
    }

    async fn mark_done(&self, query_id: &str) -> Result<(), StoreError> {
        let updated = sqlx::query(
            "UPDATE trend_queries SET status = 'done', finished_at = ?1
             WHERE id = ?2 AND status = 'running'",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(query_id)
        .execute(&self.pool)
        .await
        .map_err(to_store_error)?;
        if updated.rows_affected() == 0 {
            return Err(StoreError(format!("query {query_id} not running")));
        }
        Ok(())
    }

    async fn mark_error(&self, query_id: &str, message: &str) -> Result<(), StoreError> {
        let updated = sqlx::query(
            "UPDATE trend_queries SET status = 'error', finished_at = ?1, error_message = ?2
             WHERE id = ?3 AND status = 'running'",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(message)
        .bind(query_id)
        .execute(&self.pool)
        .await
        .map_err(to_store_error)?;
        if updated.rows_affected() == 0 {
            return Err(StoreError(format!("query {query_id} not running")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::Scored;
    use crate::types::{ByCountryPoint, Country, SeriesPoint, Signals};
    use chrono::NaiveDate;
    use sqlx::Row;

    async fn store() -> SqliteQueryStore {
        // One connection: every pooled connection to `sqlite::memory:`
        // would otherwise get its own empty database.
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteQueryStore::new(pool);
        store.init_schema().await.unwrap();
        store
    }

    fn params() -> QueryParams {
        QueryParams::new("Bitcoin", Country::MX, 30, 90).unwrap()
    }

    fn sample_result() -> TrendResult {
        TrendResult {
            scored: Scored {
                trend_score: 68.79,
                signals: Signals { growth_7_vs_30: 1.36, slope_14d: 0.087, recent_peak_30d: 0.9 },
                explain: vec!["grew 36.0%".into()],
            },
            sources_used: vec!["google_trends".into()],
            series: vec![
                SeriesPoint { date: NaiveDate::from_ymd_opt(2025, 5, 30).unwrap(), value: 85 },
                SeriesPoint { date: NaiveDate::from_ymd_opt(2025, 5, 31).unwrap(), value: 90 },
            ],
            by_country: vec![
                ByCountryPoint { country: Country::MX, value: 90 },
                ByCountryPoint { country: Country::ES, value: 40 },
                ByCountryPoint { country: Country::CR, value: 0 },
            ],
        }
    }

    #[tokio::test]
    async fn lifecycle_round_trips_through_sqlite() {
        let store = store().await;
        let id = store.create_running(&params()).await.unwrap();

        store.persist_result(&id, &sample_result()).await.unwrap();
        store.mark_done(&id).await.unwrap();

        let row = sqlx::query("SELECT status, finished_at FROM trend_queries WHERE id = ?1")
            .bind(&id)
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(row.get::<String, _>("status"), "done");
        assert!(row.get::<Option<String>, _>("finished_at").is_some());

        let series_rows =
            sqlx::query("SELECT COUNT(*) AS n FROM series_points WHERE query_id = ?1")
                .bind(&id)
                .fetch_one(&store.pool)
                .await
                .unwrap();
        assert_eq!(series_rows.get::<i64, _>("n"), 2);

        let country_rows =
            sqlx::query("SELECT COUNT(*) AS n FROM country_points WHERE query_id = ?1")
                .bind(&id)
                .fetch_one(&store.pool)
                .await
                .unwrap();
        assert_eq!(country_rows.get::<i64, _>("n"), 3);
    }

    #[tokio::test]
    async fn persist_is_all_or_nothing() {
        let store = store().await;
        let id = store.create_running(&params()).await.unwrap();

        let mut broken = sample_result();
        // A duplicate series date violates the primary key mid-transaction.
        broken.series.push(broken.series[0]);

        assert!(store.persist_result(&id, &broken).await.is_err());

        let rows = sqlx::query("SELECT COUNT(*) AS n FROM trend_results WHERE query_id = ?1")
            .bind(&id)
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(rows.get::<i64, _>("n"), 0);

        let series_rows =
            sqlx::query("SELECT COUNT(*) AS n FROM series_points WHERE query_id = ?1")
                .bind(&id)
                .fetch_one(&store.pool)
                .await
                .unwrap();
        assert_eq!(series_rows.get::<i64, _>("n"), 0);
    }

    #[tokio::test]
    async fn mark_error_records_message_once() {
        let store = store().await;
        let id = store.create_running(&params()).await.unwrap();

        store.mark_error(&id, "retries exhausted").await.unwrap();
        assert!(store.mark_done(&id).await.is_err());

        let row = sqlx::query("SELECT status, error_message FROM trend_queries WHERE id = ?1")
            .bind(&id)
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(row.get::<String, _>("status"), "error");
        assert_eq!(row.get::<String, _>("error_message"), "retries exhausted");
    }
}
