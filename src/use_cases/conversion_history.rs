//! Conversion history use case.
//! Lists the invoices derived from a quote and aggregates per-tenant figures.

use bigdecimal::BigDecimal;
use chrono::Datelike;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{Document, DocumentKind};
use crate::ports::{DateRange, DocumentStore, RepositoryResult};

pub const RECENT_CONVERSIONS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyConversions {
    /// `YYYY-MM`.
    pub month: String,
    pub count: usize,
    pub total_including_tax: BigDecimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversionStats {
    pub total_conversions: usize,
    pub total_excluding_tax: BigDecimal,
    pub total_including_tax: BigDecimal,
    /// Mean including-tax total, two decimals.
    pub average_total: BigDecimal,
    /// Ascending by month.
    pub by_month: Vec<MonthlyConversions>,
    /// Newest first.
    pub recent: Vec<Document>,
}

pub struct ConversionHistory {
    documents: Arc<dyn DocumentStore>,
}

impl ConversionHistory {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }

    /// Invoices derived from `source_id`, newest first.
    pub async fn history(&self, source_id: Uuid) -> RepositoryResult<Vec<Document>> {
        self.documents
            .find_by_parent(source_id, &DocumentKind::Invoice)
            .await
    }

    pub async fn stats(
        &self,
        tenant_id: Uuid,
        range: DateRange,
    ) -> RepositoryResult<ConversionStats> {
        let invoices = self
            .documents
            .find_by_tenant_and_kind(tenant_id, &DocumentKind::Invoice, &range)
            .await?;

        Ok(aggregate(invoices))
    }
}

/// Aggregates derived invoices. Invoices without a parent are ignored.
pub fn aggregate(invoices: Vec<Document>) -> ConversionStats {
    let mut conversions: Vec<Document> = invoices
        .into_iter()
        .filter(|document| !document.is_original())
        .collect();
    conversions.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let zero = BigDecimal::from(0);
    let amount = |value: &Option<BigDecimal>| value.clone().unwrap_or_else(|| zero.clone());

    let mut total_excluding_tax = zero.clone();
    let mut total_including_tax = zero.clone();
    let mut months: BTreeMap<String, (usize, BigDecimal)> = BTreeMap::new();

    for document in &conversions {
        let including = amount(&document.financials.total_including_tax);
        total_excluding_tax += amount(&document.financials.total_excluding_tax);
        total_including_tax += including.clone();

        let month = format!(
            "{:04}-{:02}",
            document.created_at.year(),
            document.created_at.month()
        );
        let entry = months.entry(month).or_insert_with(|| (0, zero.clone()));
        entry.0 += 1;
        entry.1 += including;
    }

    let total_conversions = conversions.len();
    let average_total = if total_conversions == 0 {
        zero.clone()
    } else {
        (&total_including_tax / &BigDecimal::from(total_conversions as u64)).round(2)
    };

    let by_month = months
        .into_iter()
        .map(|(month, (count, total))| MonthlyConversions {
            month,
            count,
            total_including_tax: total,
        })
        .collect();

    conversions.truncate(RECENT_CONVERSIONS);

    ConversionStats {
        total_conversions,
        total_excluding_tax,
        total_including_tax,
        average_total,
        by_month,
        recent: conversions,
    }
}
