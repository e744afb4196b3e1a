//! Document domain entity.
//! Framework-agnostic representation of a business document (quote, invoice, ...).

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle tags.
pub mod status {
    pub const DRAFT: &str = "draft";
    pub const VALIDATED: &str = "validated";
    pub const ACCEPTED: &str = "accepted";
    pub const SIGNED: &str = "signed";
    pub const APPROVED: &str = "approved";
    pub const CONVERTED: &str = "converted";

    pub const ISSUED: &str = "issued";
    pub const PAID: &str = "paid";
    pub const OVERDUE: &str = "overdue";

    /// Quote statuses from which a conversion is expected.
    pub const CONVERTIBLE: &[&str] = &[VALIDATED, ACCEPTED, SIGNED, APPROVED];

    pub const ALL: &[&str] = &[
        DRAFT, VALIDATED, ACCEPTED, SIGNED, APPROVED, CONVERTED, ISSUED, PAID, OVERDUE,
    ];
}

/// Document kind. The set is open: unknown tags are carried as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DocumentKind {
    Quote,
    Invoice,
    Mandate,
    Report,
    Contract,
    Certificate,
    Agreement,
    Other(String),
}

impl DocumentKind {
    pub fn as_str(&self) -> &str {
        match self {
            DocumentKind::Quote => "quote",
            DocumentKind::Invoice => "invoice",
            DocumentKind::Mandate => "mandate",
            DocumentKind::Report => "report",
            DocumentKind::Contract => "contract",
            DocumentKind::Certificate => "certificate",
            DocumentKind::Agreement => "agreement",
            DocumentKind::Other(tag) => tag,
        }
    }

    /// Prefix used in human-readable references.
    pub fn reference_prefix(&self) -> &'static str {
        match self {
            DocumentKind::Quote => "DEV",
            DocumentKind::Invoice => "FAC",
            DocumentKind::Mandate => "MAN",
            DocumentKind::Report => "RAP",
            DocumentKind::Contract => "CTR",
            DocumentKind::Certificate => "ATT",
            DocumentKind::Agreement => "CNV",
            DocumentKind::Other(_) => "DOC",
        }
    }

    /// Status a freshly created document of this kind starts in.
    pub fn initial_status(&self) -> &'static str {
        match self {
            DocumentKind::Invoice => status::ISSUED,
            _ => status::DRAFT,
        }
    }

    /// Statuses a document of this kind may be moved to from `from`.
    /// `converted` never appears: only a conversion sets it.
    pub fn next_statuses(&self, from: &str) -> &'static [&'static str] {
        match (self, from) {
            (DocumentKind::Invoice, status::ISSUED) => &[status::PAID, status::OVERDUE],
            (DocumentKind::Invoice, status::OVERDUE) => &[status::PAID],
            (DocumentKind::Invoice, _) => &[],
            (_, status::DRAFT) => &[status::VALIDATED],
            (DocumentKind::Quote, status::VALIDATED) => {
                &[status::ACCEPTED, status::SIGNED, status::APPROVED]
            }
            (_, status::VALIDATED) => &[status::SIGNED],
            _ => &[],
        }
    }

    pub fn can_move(&self, from: &str, to: &str) -> bool {
        self.next_statuses(from).contains(&to)
    }
}

impl From<String> for DocumentKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "quote" => DocumentKind::Quote,
            "invoice" => DocumentKind::Invoice,
            "mandate" => DocumentKind::Mandate,
            "report" => DocumentKind::Report,
            "contract" => DocumentKind::Contract,
            "certificate" => DocumentKind::Certificate,
            "agreement" => DocumentKind::Agreement,
            _ => DocumentKind::Other(value),
        }
    }
}

impl From<&str> for DocumentKind {
    fn from(value: &str) -> Self {
        DocumentKind::from(value.to_string())
    }
}

impl From<DocumentKind> for String {
    fn from(kind: DocumentKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Financial figures copied verbatim between linked documents.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FinancialSnapshot {
    pub total_excluding_tax: Option<BigDecimal>,
    pub tax_amount: Option<BigDecimal>,
    pub total_including_tax: Option<BigDecimal>,
    pub currency: Option<String>,
}

impl FinancialSnapshot {
    /// Currency with the platform default applied.
    pub fn currency_or_default(&self) -> &str {
        self.currency
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(super::agency::DEFAULT_CURRENCY)
    }
}

/// Client details captured when the document was produced. Not live-linked.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClientSnapshot {
    #[serde(rename = "client_name")]
    pub name: Option<String>,
    #[serde(rename = "client_email")]
    pub email: Option<String>,
    #[serde(rename = "client_phone")]
    pub phone: Option<String>,
}

/// A persisted document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub lead_id: Option<Uuid>,
    pub kind: DocumentKind,
    pub reference: String,
    pub title: String,
    pub status: String,
    pub parent_document_id: Option<Uuid>,
    #[serde(flatten)]
    pub financials: FinancialSnapshot,
    #[serde(flatten)]
    pub client: ClientSnapshot,
    pub issued_on: Option<NaiveDate>,
    pub due_on: Option<NaiveDate>,
    pub payment_terms: Option<String>,
    pub payment_method: Option<String>,
    pub content: Option<serde_json::Value>,
    pub rendered_body: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// An original document is one that was not derived from another.
    pub fn is_original(&self) -> bool {
        self.parent_document_id.is_none()
    }
}

/// A document that has not been stored yet. The store assigns the id.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub tenant_id: Uuid,
    pub lead_id: Option<Uuid>,
    pub kind: DocumentKind,
    pub reference: String,
    pub title: String,
    pub status: String,
    pub parent_document_id: Option<Uuid>,
    pub financials: FinancialSnapshot,
    pub client: ClientSnapshot,
    pub issued_on: Option<NaiveDate>,
    pub due_on: Option<NaiveDate>,
    pub payment_terms: Option<String>,
    pub payment_method: Option<String>,
    pub content: Option<serde_json::Value>,
    pub rendered_body: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewDocument {
    pub fn into_document(self, id: Uuid) -> Document {
        Document {
            id,
            tenant_id: self.tenant_id,
            lead_id: self.lead_id,
            kind: self.kind,
            reference: self.reference,
            title: self.title,
            status: self.status,
            parent_document_id: self.parent_document_id,
            financials: self.financials,
            client: self.client,
            issued_on: self.issued_on,
            due_on: self.due_on,
            payment_terms: self.payment_terms,
            payment_method: self.payment_method,
            content: self.content,
            rendered_body: self.rendered_body,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// Partial update. Only `Some` fields are written.
#[derive(Debug, Clone, Default)]
pub struct DocumentPatch {
    pub status: Option<String>,
    pub financials: Option<FinancialSnapshot>,
}

impl DocumentPatch {
    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            ..Self::default()
        }
    }
}
