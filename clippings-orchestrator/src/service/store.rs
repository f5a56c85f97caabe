//! Store seams for the enrichment sub-pipeline
//!
//! The batch submitter, completion poller, and result merger persist state
//! through these traits rather than touching repositories directly, so
//! their logic can be exercised against in-memory stores in tests.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;

use clippings_core::domain::enrichment::EnrichmentJob;
use clippings_core::domain::record::Record;

use crate::repository::{enrichment_repository, record_repository};

/// Persistence for externally-submitted enrichment batches
#[async_trait]
pub trait EnrichmentJobStore: Send + Sync {
    async fn create(&self, job: &EnrichmentJob) -> anyhow::Result<()>;
    async fn mark_running(&self, external_id: &str) -> anyhow::Result<()>;
    async fn mark_success(&self, external_id: &str) -> anyhow::Result<()>;
    async fn mark_failed(&self, external_id: &str, error_message: &str) -> anyhow::Result<()>;
}

/// The caller-owned record store
///
/// Reads feed the filtering stage; writes happen only from the result
/// merger (and the explicit re-fetch operation, which lives on the
/// repository directly).
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn find_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> anyhow::Result<Vec<Record>>;

    async fn mark_fetched(
        &self,
        record_id: i64,
        text: &str,
        fetched_at: chrono::DateTime<chrono::Utc>,
    ) -> anyhow::Result<()>;

    async fn mark_unavailable(&self, record_id: i64) -> anyhow::Result<()>;
}

/// Postgres-backed enrichment job store
pub struct SqlEnrichmentJobStore {
    pool: PgPool,
}

impl SqlEnrichmentJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EnrichmentJobStore for SqlEnrichmentJobStore {
    async fn create(&self, job: &EnrichmentJob) -> anyhow::Result<()> {
        enrichment_repository::create(&self.pool, job).await?;
        Ok(())
    }

    async fn mark_running(&self, external_id: &str) -> anyhow::Result<()> {
        enrichment_repository::mark_running(&self.pool, external_id).await?;
        Ok(())
    }

    async fn mark_success(&self, external_id: &str) -> anyhow::Result<()> {
        enrichment_repository::mark_success(&self.pool, external_id).await?;
        Ok(())
    }

    async fn mark_failed(&self, external_id: &str, error_message: &str) -> anyhow::Result<()> {
        enrichment_repository::mark_failed(&self.pool, external_id, error_message).await?;
        Ok(())
    }
}

/// Postgres-backed record store
pub struct SqlRecordStore {
    pool: PgPool,
}

impl SqlRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for SqlRecordStore {
    async fn find_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> anyhow::Result<Vec<Record>> {
        let records = record_repository::find_by_date_range(&self.pool, start, end).await?;
        Ok(records)
    }

    async fn mark_fetched(
        &self,
        record_id: i64,
        text: &str,
        fetched_at: chrono::DateTime<chrono::Utc>,
    ) -> anyhow::Result<()> {
        record_repository::mark_fetched(&self.pool, record_id, text, fetched_at).await?;
        Ok(())
    }

    async fn mark_unavailable(&self, record_id: i64) -> anyhow::Result<()> {
        record_repository::mark_unavailable(&self.pool, record_id).await?;
        Ok(())
    }
}
