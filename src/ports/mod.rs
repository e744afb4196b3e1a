//! Ports: the boundaries the conversion pipeline talks through.
//! Adapters under `crate::adapters` implement them for Postgres and in-memory use.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{AgencyProfile, AuditRecord, Document, DocumentKind, DocumentPatch, NewDocument};
use crate::rendering::RenderError;

/// Unique index on `documents.reference`.
pub const REFERENCE_UNIQUE_INDEX: &str = "idx_documents_reference";

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// A uniqueness constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Another document already carries this reference.
    #[error("Duplicate reference: {0}")]
    DuplicateReference(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("row not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
                unique_violation(db_err.constraint(), db_err.message())
            }
            other => RepositoryError::Database(other.to_string()),
        }
    }
}

/// Splits unique violations by the index that fired.
pub fn unique_violation(constraint: Option<&str>, message: &str) -> RepositoryError {
    match constraint {
        Some(REFERENCE_UNIQUE_INDEX) => RepositoryError::DuplicateReference(message.to_string()),
        _ => RepositoryError::Conflict(message.to_string()),
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Inclusive creation-time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl DateRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    /// Whole calendar days, both ends included. Without `from` the range
    /// starts at the epoch; without `to` it ends now.
    pub fn from_days(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self {
            from: from.map(day_start).unwrap_or_default(),
            to: to.map(day_end).unwrap_or_else(Utc::now),
        }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.from && at <= self.to
    }

    pub fn is_empty(&self) -> bool {
        self.from > self.to
    }
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::default()))
}

fn day_end(date: NaiveDate) -> DateTime<Utc> {
    let end = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or_default();
    Utc.from_utc_datetime(&date.and_time(end))
}

/// Narrows a tenant listing. `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentFilter {
    pub kind: Option<DocumentKind>,
    pub status: Option<String>,
    pub lead_id: Option<Uuid>,
    pub created: Option<DateRange>,
}

impl DocumentFilter {
    pub fn matches(&self, document: &Document) -> bool {
        self.kind.as_ref().map_or(true, |kind| &document.kind == kind)
            && self.status.as_ref().map_or(true, |status| &document.status == status)
            && self.lead_id.map_or(true, |lead_id| document.lead_id == Some(lead_id))
            && self.created.map_or(true, |range| range.contains(document.created_at))
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, id: Uuid) -> RepositoryResult<Document>;

    async fn insert(&self, document: &NewDocument) -> RepositoryResult<Document>;

    async fn update(&self, id: Uuid, patch: &DocumentPatch) -> RepositoryResult<Document>;

    async fn delete(&self, id: Uuid) -> RepositoryResult<()>;

    /// Documents of `kind` whose parent is `parent_id`, newest first.
    async fn find_by_parent(
        &self,
        parent_id: Uuid,
        kind: &DocumentKind,
    ) -> RepositoryResult<Vec<Document>>;

    /// Documents of `kind` owned by `tenant_id` created within `range`, newest first.
    async fn find_by_tenant_and_kind(
        &self,
        tenant_id: Uuid,
        kind: &DocumentKind,
        range: &DateRange,
    ) -> RepositoryResult<Vec<Document>>;

    /// Documents owned by `tenant_id` that pass `filter`, newest first.
    async fn find_by_tenant(
        &self,
        tenant_id: Uuid,
        filter: &DocumentFilter,
    ) -> RepositoryResult<Vec<Document>>;
}

#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(&self, record: &AuditRecord) -> RepositoryResult<()>;
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_actor_id(&self) -> Option<Uuid>;
}

/// No authenticated actor.
pub struct NoActor;

#[async_trait]
impl IdentityProvider for NoActor {
    async fn current_actor_id(&self) -> Option<Uuid> {
        None
    }
}

#[async_trait]
pub trait AgencyDirectory: Send + Sync {
    async fn profile(&self, tenant_id: Uuid) -> RepositoryResult<Option<AgencyProfile>>;
}

#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(
        &self,
        template_key: &str,
        data: &serde_json::Value,
    ) -> Result<String, RenderError>;
}

/// An active stored template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTemplate {
    pub html: String,
    pub css: Option<String>,
}

#[async_trait]
pub trait TemplateSource: Send + Sync {
    async fn template(&self, template_key: &str) -> RepositoryResult<Option<StoredTemplate>>;
}
