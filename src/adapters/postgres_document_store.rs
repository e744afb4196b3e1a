//! Postgres implementation of DocumentStore.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::domain::{
    ClientSnapshot, Document, DocumentKind, DocumentPatch, FinancialSnapshot, NewDocument,
};
use crate::ports::{DateRange, DocumentFilter, DocumentStore, RepositoryError, RepositoryResult};

const COLUMNS: &str = "id, tenant_id, lead_id, kind, reference, title, status, \
    parent_document_id, total_excluding_tax, tax_amount, total_including_tax, currency, \
    client_name, client_email, client_phone, issued_on, due_on, payment_terms, \
    payment_method, content, rendered_body, created_at, updated_at";

/// Postgres-backed document store.
#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn get(&self, id: Uuid) -> RepositoryResult<Document> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {} FROM documents WHERE id = $1",
            COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.map(|r| r.into_domain())
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn insert(&self, document: &NewDocument) -> RepositoryResult<Document> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            r#"
            INSERT INTO documents (
                id, tenant_id, lead_id, kind, reference, title, status, parent_document_id,
                total_excluding_tax, tax_amount, total_including_tax, currency,
                client_name, client_email, client_phone, issued_on, due_on,
                payment_terms, payment_method, content, rendered_body, created_at, updated_at
            ) VALUES (
                gen_random_uuid(), $1, $2, $3, $4, $5, $6, $7,
                $8, $9, $10, $11,
                $12, $13, $14, $15, $16,
                $17, $18, $19, $20, $21, $21
            )
            RETURNING {}
            "#,
            COLUMNS
        ))
        .bind(document.tenant_id)
        .bind(document.lead_id)
        .bind(document.kind.as_str())
        .bind(&document.reference)
        .bind(&document.title)
        .bind(&document.status)
        .bind(document.parent_document_id)
        .bind(&document.financials.total_excluding_tax)
        .bind(&document.financials.tax_amount)
        .bind(&document.financials.total_including_tax)
        .bind(&document.financials.currency)
        .bind(&document.client.name)
        .bind(&document.client.email)
        .bind(&document.client.phone)
        .bind(document.issued_on)
        .bind(document.due_on)
        .bind(&document.payment_terms)
        .bind(&document.payment_method)
        .bind(&document.content)
        .bind(&document.rendered_body)
        .bind(document.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.into_domain())
    }

    async fn update(&self, id: Uuid, patch: &DocumentPatch) -> RepositoryResult<Document> {
        let mut query = QueryBuilder::<Postgres>::new("UPDATE documents SET updated_at = NOW()");

        if let Some(status) = &patch.status {
            query.push(", status = ").push_bind(status);
        }
        if let Some(financials) = &patch.financials {
            query
                .push(", total_excluding_tax = ")
                .push_bind(&financials.total_excluding_tax)
                .push(", tax_amount = ")
                .push_bind(&financials.tax_amount)
                .push(", total_including_tax = ")
                .push_bind(&financials.total_including_tax)
                .push(", currency = ")
                .push_bind(&financials.currency);
        }

        query
            .push(" WHERE id = ")
            .push_bind(id)
            .push(" RETURNING ")
            .push(COLUMNS);

        let row = query
            .build_query_as::<DocumentRow>()
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        row.map(|r| r.into_domain())
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn delete(&self, id: Uuid) -> RepositoryResult<()> {
        let result = sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(id.to_string()));
        }

        Ok(())
    }

    async fn find_by_parent(
        &self,
        parent_id: Uuid,
        kind: &DocumentKind,
    ) -> RepositoryResult<Vec<Document>> {
        let rows = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {} FROM documents WHERE parent_document_id = $1 AND kind = $2 \
             ORDER BY created_at DESC",
            COLUMNS
        ))
        .bind(parent_id)
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(|r| r.into_domain()).collect())
    }

    async fn find_by_tenant_and_kind(
        &self,
        tenant_id: Uuid,
        kind: &DocumentKind,
        range: &DateRange,
    ) -> RepositoryResult<Vec<Document>> {
        let rows = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {} FROM documents \
             WHERE tenant_id = $1 AND kind = $2 AND created_at >= $3 AND created_at <= $4 \
             ORDER BY created_at DESC",
            COLUMNS
        ))
        .bind(tenant_id)
        .bind(kind.as_str())
        .bind(range.from)
        .bind(range.to)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(|r| r.into_domain()).collect())
    }

    async fn find_by_tenant(
        &self,
        tenant_id: Uuid,
        filter: &DocumentFilter,
    ) -> RepositoryResult<Vec<Document>> {
        let mut query = QueryBuilder::<Postgres>::new("SELECT ");
        query
            .push(COLUMNS)
            .push(" FROM documents WHERE tenant_id = ")
            .push_bind(tenant_id);

        if let Some(kind) = &filter.kind {
            query.push(" AND kind = ").push_bind(kind.as_str());
        }
        if let Some(status) = &filter.status {
            query.push(" AND status = ").push_bind(status);
        }
        if let Some(lead_id) = filter.lead_id {
            query.push(" AND lead_id = ").push_bind(lead_id);
        }
        if let Some(range) = filter.created {
            query
                .push(" AND created_at >= ")
                .push_bind(range.from)
                .push(" AND created_at <= ")
                .push_bind(range.to);
        }
        query.push(" ORDER BY created_at DESC");

        let rows = query
            .build_query_as::<DocumentRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(|r| r.into_domain()).collect())
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct DocumentRow {
    id: Uuid,
    tenant_id: Uuid,
    lead_id: Option<Uuid>,
    kind: String,
    reference: String,
    title: String,
    status: String,
    parent_document_id: Option<Uuid>,
    total_excluding_tax: Option<bigdecimal::BigDecimal>,
    tax_amount: Option<bigdecimal::BigDecimal>,
    total_including_tax: Option<bigdecimal::BigDecimal>,
    currency: Option<String>,
    client_name: Option<String>,
    client_email: Option<String>,
    client_phone: Option<String>,
    issued_on: Option<chrono::NaiveDate>,
    due_on: Option<chrono::NaiveDate>,
    payment_terms: Option<String>,
    payment_method: Option<String>,
    content: Option<serde_json::Value>,
    rendered_body: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl DocumentRow {
    fn into_domain(self) -> Document {
        Document {
            id: self.id,
            tenant_id: self.tenant_id,
            lead_id: self.lead_id,
            kind: DocumentKind::from(self.kind),
            reference: self.reference,
            title: self.title,
            status: self.status,
            parent_document_id: self.parent_document_id,
            financials: FinancialSnapshot {
                total_excluding_tax: self.total_excluding_tax,
                tax_amount: self.tax_amount,
                total_including_tax: self.total_including_tax,
                currency: self.currency,
            },
            client: ClientSnapshot {
                name: self.client_name,
                email: self.client_email,
                phone: self.client_phone,
            },
            issued_on: self.issued_on,
            due_on: self.due_on,
            payment_terms: self.payment_terms,
            payment_method: self.payment_method,
            content: self.content,
            rendered_body: self.rendered_body,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
