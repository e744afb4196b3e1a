//! Generate document use case.
//! Creates an original document for a tenant: a quote, invoice, mandate or
//! report depending on the agency's trade.

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use uuid::Uuid;

use super::convert_document::{DEFAULT_PAYMENT_METHOD, DEFAULT_PAYMENT_TERMS};
use super::DocumentError;
use crate::domain::agency::DEFAULT_CURRENCY;
use crate::domain::{
    AgencyProfile, AgencyType, ClientSnapshot, Document, DocumentKind, FinancialSnapshot,
    NewDocument,
};
use crate::ports::{AgencyDirectory, DocumentStore, Renderer, RepositoryError};
use crate::rendering::context::template_key;
use crate::rendering::{render_with_fallback, RenderContext, RenderError, RenderRequest};
use crate::utils::reference::{due_date, generate_reference, REFERENCE_RETRIES};
use crate::validation::{
    parse_date, sanitize_string, validate_currency, validate_enum, validate_max_len,
    validate_required, ValidationError,
};

/// VAT applied when the caller leaves the tax amount out.
pub const DEFAULT_TAX_RATE_PERCENT: u32 = 20;
pub const TITLE_MAX_LEN: usize = 200;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GenerationRequest {
    pub kind: String,
    pub lead_id: Option<Uuid>,
    pub title: Option<String>,
    pub client_name: Option<String>,
    pub client_email: Option<String>,
    pub client_phone: Option<String>,
    pub total_excluding_tax: Option<BigDecimal>,
    /// Computed at the default VAT rate when absent.
    pub tax_amount: Option<BigDecimal>,
    /// Excluding tax plus tax when absent.
    pub total_including_tax: Option<BigDecimal>,
    /// Agency currency, then EUR, when absent.
    pub currency: Option<String>,
    /// `YYYY-MM-DD` or RFC 3339. Today when absent.
    pub issuance_date: Option<String>,
    pub content: Option<Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationMetadata {
    pub agency_type: AgencyType,
    pub template_key: String,
    pub render_strategy: &'static str,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedDocument {
    pub success: bool,
    pub document: Document,
    pub metadata: GenerationMetadata,
}

/// Validated request, ready to be stamped with a reference.
struct Draft {
    kind: DocumentKind,
    lead_id: Option<Uuid>,
    title: String,
    client: ClientSnapshot,
    financials: FinancialSnapshot,
    issued_on: NaiveDate,
    content: Map<String, Value>,
}

impl Draft {
    fn parse(
        request: GenerationRequest,
        agency_type: AgencyType,
        agency: Option<&AgencyProfile>,
        today: NaiveDate,
    ) -> Result<Self, DocumentError> {
        let kind = sanitize_string(&request.kind).to_lowercase();
        validate_required("kind", &kind)?;
        validate_enum("kind", &kind, agency_type.document_kinds())?;
        let kind = DocumentKind::from(kind);

        let client_name = non_blank(request.client_name.as_deref());
        let mut missing = Vec::new();
        if client_name.is_none() {
            missing.push("client_name");
        }
        if requires_amounts(&kind) && request.total_excluding_tax.is_none() {
            missing.push("total_excluding_tax");
        }
        if !missing.is_empty() {
            return Err(DocumentError::MissingFields(missing));
        }
        let client_name = client_name.unwrap_or_default();

        let currency = match non_blank(request.currency.as_deref()) {
            Some(currency) => {
                validate_currency(&currency)?;
                currency
            }
            None => agency
                .map(AgencyProfile::currency_or_default)
                .unwrap_or(DEFAULT_CURRENCY)
                .to_string(),
        };

        let issued_on = match request.issuance_date.as_deref() {
            Some(raw) => parse_date("issuance_date", raw)?,
            None => today,
        };

        let title = match non_blank(request.title.as_deref()) {
            Some(title) => {
                validate_max_len("title", &title, TITLE_MAX_LEN)?;
                title
            }
            None => format!("{} - {}", kind.as_str().to_uppercase(), client_name),
        };

        let content = match request.content {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(_) => {
                return Err(ValidationError::new("content", "must be a JSON object").into())
            }
        };

        Ok(Self {
            financials: totals(
                request.total_excluding_tax,
                request.tax_amount,
                request.total_including_tax,
                currency,
            ),
            client: ClientSnapshot {
                name: Some(client_name),
                email: non_blank(request.client_email.as_deref()),
                phone: non_blank(request.client_phone.as_deref()),
            },
            kind,
            lead_id: request.lead_id,
            title,
            issued_on,
            content,
        })
    }

    fn stamp(&self, tenant_id: Uuid, reference: &str, now: DateTime<Utc>) -> NewDocument {
        let is_invoice = self.kind == DocumentKind::Invoice;

        let mut payload = self.content.clone();
        payload.insert("document_kind".into(), json!(self.kind.as_str()));
        payload.insert("generated_at".into(), json!(now.to_rfc3339()));

        NewDocument {
            tenant_id,
            lead_id: self.lead_id,
            status: self.kind.initial_status().to_string(),
            kind: self.kind.clone(),
            reference: reference.to_string(),
            title: self.title.clone(),
            parent_document_id: None,
            financials: self.financials.clone(),
            client: self.client.clone(),
            issued_on: Some(self.issued_on),
            due_on: is_invoice.then(|| due_date(self.issued_on)),
            payment_terms: is_invoice.then(|| DEFAULT_PAYMENT_TERMS.to_string()),
            payment_method: is_invoice.then(|| DEFAULT_PAYMENT_METHOD.to_string()),
            content: Some(Value::Object(payload)),
            rendered_body: None,
            created_at: now,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value.map(sanitize_string).filter(|v| !v.is_empty())
}

fn requires_amounts(kind: &DocumentKind) -> bool {
    matches!(kind, DocumentKind::Quote | DocumentKind::Invoice)
}

fn totals(
    excluding_tax: Option<BigDecimal>,
    tax: Option<BigDecimal>,
    including_tax: Option<BigDecimal>,
    currency: String,
) -> FinancialSnapshot {
    let rate = BigDecimal::from(DEFAULT_TAX_RATE_PERCENT) / BigDecimal::from(100);
    let tax = tax.or_else(|| excluding_tax.as_ref().map(|amount| (amount * &rate).round(2)));
    let including_tax = including_tax.or_else(|| match (&excluding_tax, &tax) {
        (Some(amount), Some(tax)) => Some(amount + tax),
        _ => None,
    });

    FinancialSnapshot {
        total_excluding_tax: excluding_tax,
        tax_amount: tax,
        total_including_tax: including_tax,
        currency: Some(currency),
    }
}

/// Creates original documents.
pub struct GenerateDocument {
    documents: Arc<dyn DocumentStore>,
    renderer: Arc<dyn Renderer>,
    agencies: Arc<dyn AgencyDirectory>,
    default_agency_type: AgencyType,
}

impl GenerateDocument {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        renderer: Arc<dyn Renderer>,
        agencies: Arc<dyn AgencyDirectory>,
    ) -> Self {
        Self {
            documents,
            renderer,
            agencies,
            default_agency_type: AgencyType::RealEstate,
        }
    }

    pub fn with_default_agency_type(mut self, agency_type: AgencyType) -> Self {
        self.default_agency_type = agency_type;
        self
    }

    pub async fn generate(
        &self,
        tenant_id: Uuid,
        request: GenerationRequest,
    ) -> Result<GeneratedDocument, DocumentError> {
        let agency = match self.agencies.profile(tenant_id).await {
            Ok(profile) => profile,
            Err(err) => {
                tracing::warn!(%tenant_id, error = %err, "Failed to load agency profile");
                None
            }
        };
        let agency_type = agency
            .as_ref()
            .map(|profile| profile.agency_type)
            .unwrap_or(self.default_agency_type);

        let now = Utc::now();
        let draft = Draft::parse(request, agency_type, agency.as_ref(), now.date_naive())?;
        let key = template_key(agency_type, &draft.kind);

        let mut retries = REFERENCE_RETRIES;
        let (stored, strategy) = loop {
            let reference = generate_reference(&draft.kind, now, &mut rand::thread_rng());
            let mut document = draft.stamp(tenant_id, &reference, now);

            let data = RenderContext::new(&document, agency_type)
                .with_agency(agency.as_ref())
                .build();
            let rendered = render_with_fallback(
                self.renderer.as_ref(),
                RenderRequest {
                    template_key: key.clone(),
                    kind: &document.kind,
                    data: &data,
                    precondition: agency
                        .is_none()
                        .then_some(RenderError::MissingAgencyProfile(tenant_id)),
                },
            )
            .await;
            document.rendered_body = Some(rendered.body);

            match self.documents.insert(&document).await {
                Ok(stored) => break (stored, rendered.strategy),
                Err(RepositoryError::DuplicateReference(detail)) if retries > 0 => {
                    retries -= 1;
                    tracing::warn!(
                        %tenant_id,
                        %reference,
                        detail = %detail,
                        "Reference already taken, drawing a new one"
                    );
                }
                Err(err) => return Err(DocumentError::Persistence(err.to_string())),
            }
        };

        tracing::info!(
            %tenant_id,
            document_id = %stored.id,
            kind = %stored.kind,
            reference = %stored.reference,
            render_strategy = strategy.as_str(),
            "Document generated"
        );

        Ok(GeneratedDocument {
            success: true,
            document: stored,
            metadata: GenerationMetadata {
                agency_type,
                template_key: key,
                render_strategy: strategy.as_str(),
                generated_at: now,
            },
        })
    }
}
