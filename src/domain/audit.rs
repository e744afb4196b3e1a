//! Audit trail entry for a document conversion.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ACTION_CONVERT_QUOTE_TO_INVOICE: &str = "convert_quote_to_invoice";

/// Append-only record. Created once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub transaction_id: String,
    pub action: String,
    pub source_document_id: Uuid,
    pub source_reference: String,
    pub derived_document_id: Uuid,
    pub derived_reference: String,
    pub total_excluding_tax: Option<BigDecimal>,
    pub total_including_tax: Option<BigDecimal>,
    pub currency: Option<String>,
    pub tenant_id: Uuid,
    pub actor_id: Option<Uuid>,
    pub recorded_at: DateTime<Utc>,
    pub metadata: serde_json::Value,
}
