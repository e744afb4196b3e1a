//! Assembles the data bag handed to templates.

use bigdecimal::BigDecimal;
use chrono::Utc;
use serde_json::{json, Map, Value};

use crate::domain::{AgencyProfile, AgencyType, Document, DocumentKind, NewDocument};

/// Key under which a tenant's template for `kind` is stored.
pub fn template_key(agency_type: AgencyType, kind: &DocumentKind) -> String {
    format!("{}_{}_template", agency_type.as_str(), kind.as_str())
}

/// Display title for a kind, worded for the agency's trade.
pub fn document_title(agency_type: AgencyType, kind: &DocumentKind) -> String {
    let title = match (agency_type, kind) {
        (AgencyType::RealEstate, DocumentKind::Quote) => "Real estate services quote",
        (AgencyType::RealEstate, DocumentKind::Invoice) => "Fee invoice",
        (AgencyType::RealEstate, DocumentKind::Mandate) => "Sale or rental mandate",
        (AgencyType::RealEstate, DocumentKind::Report) => "Activity report",
        (AgencyType::Marketing, DocumentKind::Quote) => "Marketing services quote",
        (AgencyType::Marketing, DocumentKind::Invoice) => "Services invoice",
        (AgencyType::Marketing, DocumentKind::Mandate) => "Management mandate",
        (AgencyType::Marketing, DocumentKind::Report) => "Performance report",
        (_, DocumentKind::Contract) => "Service contract",
        (_, other) => return format!("Document {}", other),
    };
    title.to_string()
}

pub struct RenderContext<'a> {
    document: &'a NewDocument,
    source: Option<&'a Document>,
    agency: Option<&'a AgencyProfile>,
    agency_type: AgencyType,
}

impl<'a> RenderContext<'a> {
    pub fn new(document: &'a NewDocument, agency_type: AgencyType) -> Self {
        Self {
            document,
            source: None,
            agency: None,
            agency_type,
        }
    }

    /// Document this one was derived from.
    pub fn with_source(mut self, source: &'a Document) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_agency(mut self, agency: Option<&'a AgencyProfile>) -> Self {
        if let Some(profile) = agency {
            self.agency_type = profile.agency_type;
        }
        self.agency = agency;
        self
    }

    pub fn agency_type(&self) -> AgencyType {
        self.agency_type
    }

    /// Builds the data bag. Payload keys override the computed sections.
    pub fn build(&self) -> Value {
        let doc = self.document;
        let currency = doc
            .financials
            .currency
            .clone()
            .or_else(|| self.agency.map(|a| a.currency_or_default().to_string()));

        let agency = match self.agency {
            Some(profile) => json!({
                "name": profile.name,
                "legal_address": profile.legal_address.as_deref().unwrap_or("N/A"),
                "phone": profile.phone,
                "email": profile.email,
                "siret": profile.siret,
                "logo_url": profile.logo_url,
                "agency_type": profile.agency_type.as_str(),
                "legal_mentions": profile.legal_mentions_or_default(),
            }),
            None => json!({
                "name": "Agency",
                "agency_type": self.agency_type.as_str(),
            }),
        };

        let mut bag = Map::new();
        bag.insert("agency".into(), agency);
        bag.insert(
            "document".into(),
            json!({
                "kind": doc.kind.as_str(),
                "reference": doc.reference,
                "title": doc.title,
                "heading": document_title(self.agency_type, &doc.kind),
                "issued_on": doc.issued_on.map(|d| d.to_string()),
                "due_on": doc.due_on.map(|d| d.to_string()),
                "currency": currency,
                "generated_at": Utc::now().to_rfc3339(),
            }),
        );
        bag.insert(
            "client".into(),
            json!({
                "name": doc.client.name,
                "email": doc.client.email,
                "phone": doc.client.phone,
            }),
        );
        let amount = |value: &Option<BigDecimal>| value.as_ref().map(|v| v.to_string());
        bag.insert(
            "totals".into(),
            json!({
                "excluding_tax": amount(&doc.financials.total_excluding_tax),
                "tax": amount(&doc.financials.tax_amount),
                "including_tax": amount(&doc.financials.total_including_tax),
            }),
        );
        bag.insert(
            "payment".into(),
            json!({
                "terms": doc.payment_terms,
                "method": doc.payment_method,
            }),
        );
        if let Some(source) = self.source {
            bag.insert(
                "source".into(),
                json!({
                    "id": source.id,
                    "reference": source.reference,
                }),
            );
        }

        if let Some(Value::Object(payload)) = &doc.content {
            for (key, value) in payload {
                bag.insert(key.clone(), value.clone());
            }
        }

        Value::Object(bag)
    }
}
