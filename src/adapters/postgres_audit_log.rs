//! Postgres implementation of AuditLog. Insert-only.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::AuditRecord;
use crate::ports::{AuditLog, RepositoryError, RepositoryResult};

#[derive(Clone)]
pub struct PostgresAuditLog {
    pool: PgPool,
}

impl PostgresAuditLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditLog for PostgresAuditLog {
    async fn append(&self, record: &AuditRecord) -> RepositoryResult<()> {
        sqlx::query(
            r#"
            INSERT INTO document_audit_trail (
                id, transaction_id, action,
                source_document_id, source_reference, derived_document_id, derived_reference,
                total_excluding_tax, total_including_tax, currency,
                tenant_id, actor_id, recorded_at, metadata
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(record.id)
        .bind(&record.transaction_id)
        .bind(&record.action)
        .bind(record.source_document_id)
        .bind(&record.source_reference)
        .bind(record.derived_document_id)
        .bind(&record.derived_reference)
        .bind(&record.total_excluding_tax)
        .bind(&record.total_including_tax)
        .bind(&record.currency)
        .bind(record.tenant_id)
        .bind(record.actor_id)
        .bind(record.recorded_at)
        .bind(&record.metadata)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(())
    }
}
