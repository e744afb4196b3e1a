//! List tenant documents use case.

use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use super::DocumentError;
use crate::domain::{status, Document, DocumentKind};
use crate::ports::{DateRange, DocumentFilter, DocumentStore};
use crate::validation::{
    parse_date, parse_document_id, sanitize_string, validate_enum, ValidationError,
};

/// Raw listing filters, as they arrive from a query string or the CLI.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocumentQuery {
    pub kind: Option<String>,
    pub status: Option<String>,
    pub lead_id: Option<String>,
    /// Inclusive calendar dates.
    pub from: Option<String>,
    pub to: Option<String>,
    /// Shorthand for the last N days. Excludes `from`/`to`.
    pub last_days: Option<u32>,
}

impl DocumentQuery {
    pub fn into_filter(self) -> Result<DocumentFilter, ValidationError> {
        let kind = non_blank(self.kind).map(|kind| DocumentKind::from(kind.to_lowercase()));

        let status = match non_blank(self.status) {
            Some(value) => {
                let value = value.to_lowercase();
                validate_enum("status", &value, status::ALL)?;
                Some(value)
            }
            None => None,
        };

        let lead_id = non_blank(self.lead_id)
            .map(|raw| parse_document_id("lead_id", &raw))
            .transpose()?;

        let created = match (self.last_days, self.from.is_some() || self.to.is_some()) {
            (Some(_), true) => {
                return Err(ValidationError::new("last_days", "cannot be combined with from/to"));
            }
            (Some(days), false) => {
                let now = Utc::now();
                Some(DateRange::new(now - Duration::days(i64::from(days)), now))
            }
            (None, true) => {
                let range = DateRange::from_days(
                    self.from.as_deref().map(|raw| parse_date("from", raw)).transpose()?,
                    self.to.as_deref().map(|raw| parse_date("to", raw)).transpose()?,
                );
                if range.is_empty() {
                    return Err(ValidationError::new("from", "must not be after to"));
                }
                Some(range)
            }
            (None, false) => None,
        };

        Ok(DocumentFilter {
            kind,
            status,
            lead_id,
            created,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.as_deref().map(sanitize_string).filter(|v| !v.is_empty())
}

/// A tenant's documents, newest first.
pub struct ListDocuments {
    documents: Arc<dyn DocumentStore>,
}

impl ListDocuments {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }

    pub async fn execute(
        &self,
        tenant_id: Uuid,
        query: DocumentQuery,
    ) -> Result<Vec<Document>, DocumentError> {
        let filter = query.into_filter()?;
        let documents = self.documents.find_by_tenant(tenant_id, &filter).await?;

        tracing::debug!(%tenant_id, count = documents.len(), "Listed tenant documents");

        Ok(documents)
    }
}
