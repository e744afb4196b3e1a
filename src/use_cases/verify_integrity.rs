//! Verify conversion use case.
//! Read-only consistency check between a source and a document derived from it.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::Document;
use crate::ports::{DocumentStore, RepositoryError, RepositoryResult};

pub const CHECK_SOURCE_EXISTS: &str = "source_exists";
pub const CHECK_DERIVED_EXISTS: &str = "derived_exists";
pub const CHECK_LINK_CORRECT: &str = "link_correct";
pub const CHECK_AMOUNTS_MATCH: &str = "amounts_match";
pub const CHECK_CLIENT_MATCH: &str = "client_match";
pub const CHECK_TENANT_MATCH: &str = "tenant_match";

#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub checks: BTreeMap<String, bool>,
}

impl IntegrityReport {
    fn from_checks(results: Vec<(&'static str, bool)>) -> Self {
        let errors: Vec<String> = results
            .iter()
            .filter(|(_, passed)| !passed)
            .map(|(name, _)| format!("Check failed: {}", name))
            .collect();

        Self {
            valid: errors.is_empty(),
            errors,
            checks: results
                .into_iter()
                .map(|(name, passed)| (name.to_string(), passed))
                .collect(),
        }
    }

    fn store_failure(err: &RepositoryError) -> Self {
        Self {
            valid: false,
            errors: vec![err.to_string()],
            checks: BTreeMap::new(),
        }
    }
}

pub struct VerifyConversion {
    documents: Arc<dyn DocumentStore>,
}

impl VerifyConversion {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }

    pub async fn verify(&self, source_id: Uuid, derived_id: Uuid) -> IntegrityReport {
        let source = match self.lookup(source_id).await {
            Ok(document) => document,
            Err(err) => return IntegrityReport::store_failure(&err),
        };
        let derived = match self.lookup(derived_id).await {
            Ok(document) => document,
            Err(err) => return IntegrityReport::store_failure(&err),
        };

        let report = IntegrityReport::from_checks(compare(source.as_ref(), derived.as_ref()));
        if !report.valid {
            tracing::warn!(
                %source_id,
                %derived_id,
                errors = ?report.errors,
                "Conversion integrity check failed"
            );
        }
        report
    }

    /// Missing documents are a failed check, not an error.
    async fn lookup(&self, id: Uuid) -> RepositoryResult<Option<Document>> {
        match self.documents.get(id).await {
            Ok(document) => Ok(Some(document)),
            Err(RepositoryError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

fn compare(source: Option<&Document>, derived: Option<&Document>) -> Vec<(&'static str, bool)> {
    let both = source.zip(derived);
    let holds = |check: fn(&Document, &Document) -> bool| both.map_or(false, |(s, d)| check(s, d));

    vec![
        (CHECK_SOURCE_EXISTS, source.is_some()),
        (CHECK_DERIVED_EXISTS, derived.is_some()),
        (
            CHECK_LINK_CORRECT,
            holds(|s, d| d.parent_document_id == Some(s.id)),
        ),
        (
            CHECK_AMOUNTS_MATCH,
            holds(|s, d| {
                s.financials.total_excluding_tax == d.financials.total_excluding_tax
                    && s.financials.tax_amount == d.financials.tax_amount
                    && s.financials.total_including_tax == d.financials.total_including_tax
                    && s.financials.currency_or_default() == d.financials.currency_or_default()
            }),
        ),
        (
            CHECK_CLIENT_MATCH,
            holds(|s, d| s.client.name == d.client.name && s.client.email == d.client.email),
        ),
        (CHECK_TENANT_MATCH, holds(|s, d| s.tenant_id == d.tenant_id)),
    ]
}
