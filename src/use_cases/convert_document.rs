//! Convert document use case.
//! Turns a validated quote into an issued invoice linked back to it.

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::audit::ACTION_CONVERT_QUOTE_TO_INVOICE;
use crate::domain::{
    status, AgencyProfile, AgencyType, AuditRecord, Document, DocumentKind, DocumentPatch,
    FinancialSnapshot, NewDocument,
};
use crate::ports::{
    AgencyDirectory, AuditLog, DocumentStore, IdentityProvider, NoActor, Renderer,
    RepositoryError,
};
use crate::rendering::context::template_key;
use crate::rendering::{render_with_fallback, RenderContext, RenderError, RenderRequest};
use crate::utils::reference::{
    due_date, generate_reference, generate_transaction_id, REFERENCE_RETRIES,
};
use crate::validation::{
    parse_date, parse_document_id, sanitize_string, validate_currency, validate_max_len,
    validate_nonzero_amount, validate_required, ValidationError, NOTES_MAX_LEN,
};

pub const DEFAULT_PAYMENT_TERMS: &str = "30 days";
pub const DEFAULT_PAYMENT_METHOD: &str = "Bank transfer";
pub const CONVERSION_REASON: &str = "quote_to_invoice_conversion";
const AUDIT_SOURCE: &str = "conversion_service";
const AUDIT_VERSION: &str = "1.0";

/// Caller-supplied knobs for a conversion.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConversionOptions {
    /// `YYYY-MM-DD` or RFC 3339. Today when absent.
    pub issuance_date: Option<String>,
    pub notes: Option<String>,
    /// JSON object merged into the derived payload.
    pub custom_data: Option<Value>,
}

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Source document not found: {0}")]
    SourceNotFound(Uuid),

    #[error("Integrity error: {0}")]
    Integrity(String),

    #[error("Business rule violated: {0}")]
    BusinessRule(String),

    #[error("Persistence error: {0}")]
    Persistence(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionErrorKind {
    Validation,
    /// Integrity failure caused by a missing source document.
    NotFound,
    Integrity,
    BusinessRule,
    Persistence,
}

impl ConversionError {
    pub fn kind(&self) -> ConversionErrorKind {
        match self {
            ConversionError::Validation(_) => ConversionErrorKind::Validation,
            ConversionError::SourceNotFound(_) => ConversionErrorKind::NotFound,
            ConversionError::Integrity(_) => ConversionErrorKind::Integrity,
            ConversionError::BusinessRule(_) => ConversionErrorKind::BusinessRule,
            ConversionError::Persistence(_) => ConversionErrorKind::Persistence,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversionMetadata {
    pub transaction_id: String,
    pub converted_at: DateTime<Utc>,
    pub source_reference: String,
    pub derived_reference: String,
    pub total_excluding_tax: Option<BigDecimal>,
    pub total_including_tax: Option<BigDecimal>,
    pub currency: String,
    pub render_strategy: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversionSuccess {
    pub success: bool,
    pub derived: Document,
    /// The source as read before its status was updated.
    pub source: Document,
    pub metadata: ConversionMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureMetadata {
    pub source_id: String,
    pub failed_at: DateTime<Utc>,
    pub rolled_back: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversionFailure {
    pub success: bool,
    pub error: String,
    pub kind: ConversionErrorKind,
    pub transaction_id: String,
    pub metadata: FailureMetadata,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ConversionOutcome {
    Converted(Box<ConversionSuccess>),
    Failed(ConversionFailure),
}

impl ConversionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ConversionOutcome::Converted(_))
    }

    pub fn transaction_id(&self) -> &str {
        match self {
            ConversionOutcome::Converted(success) => &success.metadata.transaction_id,
            ConversionOutcome::Failed(failure) => &failure.transaction_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Stage {
    Validating,
    Rendering,
    Persisting,
    Finalizing,
}

/// What an attempt has touched so far. Drives compensation.
struct Attempt {
    transaction_id: String,
    stage: Stage,
    source: Option<Document>,
    derived_reference: Option<String>,
}

/// Quote to invoice conversion.
pub struct ConvertDocument {
    documents: Arc<dyn DocumentStore>,
    renderer: Arc<dyn Renderer>,
    audit_log: Arc<dyn AuditLog>,
    agencies: Arc<dyn AgencyDirectory>,
    identity: Arc<dyn IdentityProvider>,
    default_agency_type: AgencyType,
}

impl ConvertDocument {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        renderer: Arc<dyn Renderer>,
        audit_log: Arc<dyn AuditLog>,
        agencies: Arc<dyn AgencyDirectory>,
    ) -> Self {
        Self {
            documents,
            renderer,
            audit_log,
            agencies,
            identity: Arc::new(NoActor),
            default_agency_type: AgencyType::RealEstate,
        }
    }

    pub fn with_identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_default_agency_type(mut self, agency_type: AgencyType) -> Self {
        self.default_agency_type = agency_type;
        self
    }

    /// Same collaborators, different actor. Used per request.
    pub fn for_actor(&self, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            documents: Arc::clone(&self.documents),
            renderer: Arc::clone(&self.renderer),
            audit_log: Arc::clone(&self.audit_log),
            agencies: Arc::clone(&self.agencies),
            identity,
            default_agency_type: self.default_agency_type,
        }
    }

    /// Runs one conversion. Never fails: errors come back as
    /// [`ConversionOutcome::Failed`].
    pub async fn convert(&self, source_id: &str, options: ConversionOptions) -> ConversionOutcome {
        let transaction_id = generate_transaction_id(Utc::now(), &mut rand::thread_rng());
        let mut attempt = Attempt {
            transaction_id: transaction_id.clone(),
            stage: Stage::Validating,
            source: None,
            derived_reference: None,
        };

        tracing::info!(%transaction_id, source_id, "Starting quote to invoice conversion");

        match self.run(&mut attempt, source_id, options).await {
            Ok(success) => {
                tracing::info!(
                    %transaction_id,
                    source_id,
                    reference = %success.metadata.derived_reference,
                    "Conversion completed"
                );
                ConversionOutcome::Converted(Box::new(success))
            }
            Err(err) => {
                let rolled_back = if attempt.stage >= Stage::Persisting
                    && matches!(err, ConversionError::Persistence(_))
                {
                    self.rollback(&attempt).await;
                    true
                } else {
                    false
                };

                tracing::error!(
                    %transaction_id,
                    source_id,
                    kind = ?err.kind(),
                    error = %err,
                    rolled_back,
                    "Conversion failed"
                );

                ConversionOutcome::Failed(ConversionFailure {
                    success: false,
                    error: err.to_string(),
                    kind: err.kind(),
                    transaction_id,
                    metadata: FailureMetadata {
                        source_id: source_id.to_string(),
                        failed_at: Utc::now(),
                        rolled_back,
                    },
                })
            }
        }
    }

    async fn run(
        &self,
        attempt: &mut Attempt,
        source_id: &str,
        options: ConversionOptions,
    ) -> Result<ConversionSuccess, ConversionError> {
        let request = ValidatedRequest::parse(source_id, options)?;

        let source = self.load_source(request.source_id).await?;
        check_business_rules(&source)?;
        attempt.source = Some(source.clone());

        let now = Utc::now();
        attempt.stage = Stage::Rendering;
        let agency = self.agency_profile(source.tenant_id).await;
        let agency_type = agency
            .as_ref()
            .map(|profile| profile.agency_type)
            .unwrap_or(self.default_agency_type);

        let mut retries = REFERENCE_RETRIES;
        let (stored, strategy) = loop {
            let reference =
                generate_reference(&DocumentKind::Invoice, now, &mut rand::thread_rng());
            let mut derived = build_invoice(&source, &request, &reference, now);

            let data = RenderContext::new(&derived, agency_type)
                .with_source(&source)
                .with_agency(agency.as_ref())
                .build();
            let rendered = render_with_fallback(
                self.renderer.as_ref(),
                RenderRequest {
                    template_key: template_key(agency_type, &derived.kind),
                    kind: &derived.kind,
                    data: &data,
                    precondition: agency
                        .is_none()
                        .then_some(RenderError::MissingAgencyProfile(source.tenant_id)),
                },
            )
            .await;
            derived.rendered_body = Some(rendered.body);

            attempt.stage = Stage::Persisting;
            attempt.derived_reference = Some(reference.clone());
            match self.documents.insert(&derived).await {
                Ok(stored) => break (stored, rendered.strategy),
                Err(RepositoryError::DuplicateReference(detail)) if retries > 0 => {
                    retries -= 1;
                    tracing::warn!(
                        transaction_id = %attempt.transaction_id,
                        %reference,
                        detail = %detail,
                        "Reference already taken, drawing a new one"
                    );
                }
                Err(RepositoryError::DuplicateReference(detail)) => {
                    return Err(ConversionError::Persistence(format!(
                        "could not allocate a unique reference: {}",
                        detail
                    )));
                }
                Err(RepositoryError::Conflict(detail)) => {
                    return Err(ConversionError::Integrity(format!(
                        "derived document already exists for {} ({})",
                        source.reference, detail
                    )));
                }
                Err(err) => return Err(ConversionError::Persistence(err.to_string())),
            }
        };

        attempt.stage = Stage::Finalizing;
        if let Err(err) = self
            .documents
            .update(source.id, &DocumentPatch::status(status::CONVERTED))
            .await
        {
            tracing::warn!(
                transaction_id = %attempt.transaction_id,
                source_id = %source.id,
                error = %err,
                "Failed to mark source document as converted"
            );
        }

        let actor_id = self.identity.current_actor_id().await;
        let record = audit_record(
            &attempt.transaction_id,
            &source,
            &stored,
            actor_id,
            now,
            request.notes.as_deref(),
            strategy.as_str(),
        );
        if let Err(err) = self.audit_log.append(&record).await {
            tracing::warn!(
                transaction_id = %attempt.transaction_id,
                error = %err,
                "Failed to append conversion audit record"
            );
        }

        Ok(ConversionSuccess {
            success: true,
            metadata: ConversionMetadata {
                transaction_id: attempt.transaction_id.clone(),
                converted_at: now,
                source_reference: source.reference.clone(),
                derived_reference: stored.reference.clone(),
                total_excluding_tax: stored.financials.total_excluding_tax.clone(),
                total_including_tax: stored.financials.total_including_tax.clone(),
                currency: stored.financials.currency_or_default().to_string(),
                render_strategy: strategy.as_str(),
            },
            derived: stored,
            source,
        })
    }

    async fn load_source(&self, source_id: Uuid) -> Result<Document, ConversionError> {
        let source = match self.documents.get(source_id).await {
            Ok(document) => document,
            Err(RepositoryError::NotFound(_)) => {
                return Err(ConversionError::SourceNotFound(source_id))
            }
            Err(err) => return Err(ConversionError::Persistence(err.to_string())),
        };

        if source.kind != DocumentKind::Quote {
            return Err(ConversionError::Integrity(format!(
                "document {} is a {}, only quotes can be converted",
                source.reference, source.kind
            )));
        }

        if !source.is_original() {
            return Err(ConversionError::Integrity(format!(
                "document {} is itself derived from another document",
                source.reference
            )));
        }

        let existing = self
            .documents
            .find_by_parent(source.id, &DocumentKind::Invoice)
            .await
            .map_err(|err| ConversionError::Persistence(err.to_string()))?;
        if let Some(invoice) = existing.first() {
            return Err(ConversionError::Integrity(format!(
                "derived document already exists for {}: {}",
                source.reference, invoice.reference
            )));
        }

        Ok(source)
    }

    async fn agency_profile(&self, tenant_id: Uuid) -> Option<AgencyProfile> {
        match self.agencies.profile(tenant_id).await {
            Ok(profile) => profile,
            Err(err) => {
                tracing::warn!(%tenant_id, error = %err, "Failed to load agency profile");
                None
            }
        }
    }

    /// Best-effort compensation. Errors are logged and swallowed.
    async fn rollback(&self, attempt: &Attempt) {
        let Some(source) = attempt.source.as_ref() else {
            return;
        };
        let transaction_id = &attempt.transaction_id;
        tracing::warn!(%transaction_id, source_id = %source.id, "Rolling back conversion");

        if let Some(reference) = attempt.derived_reference.as_deref() {
            match self
                .documents
                .find_by_parent(source.id, &DocumentKind::Invoice)
                .await
            {
                Ok(candidates) => {
                    for document in candidates.iter().filter(|d| d.reference == reference) {
                        if let Err(err) = self.documents.delete(document.id).await {
                            tracing::error!(
                                %transaction_id,
                                document_id = %document.id,
                                error = %err,
                                "Rollback could not delete derived document"
                            );
                        }
                    }
                }
                Err(err) => tracing::error!(
                    %transaction_id,
                    error = %err,
                    "Rollback could not look up derived documents"
                ),
            }
        }

        match self.documents.get(source.id).await {
            Ok(current) if current.status != source.status => {
                if let Err(err) = self
                    .documents
                    .update(source.id, &DocumentPatch::status(source.status.clone()))
                    .await
                {
                    tracing::error!(
                        %transaction_id,
                        error = %err,
                        "Rollback could not restore source status"
                    );
                }
            }
            Ok(_) => {}
            Err(err) => tracing::error!(
                %transaction_id,
                error = %err,
                "Rollback could not read source document"
            ),
        }
    }
}

struct ValidatedRequest {
    source_id: Uuid,
    issued_on: NaiveDate,
    notes: Option<String>,
    custom_data: Map<String, Value>,
}

impl ValidatedRequest {
    fn parse(source_id: &str, options: ConversionOptions) -> Result<Self, ValidationError> {
        let source_id = parse_document_id("source_id", source_id)?;

        let issued_on = match options.issuance_date.as_deref() {
            Some(raw) => parse_date("issuance_date", raw)?,
            None => Utc::now().date_naive(),
        };

        let notes = match options.notes.as_deref().map(sanitize_string) {
            Some(notes) if !notes.is_empty() => {
                validate_max_len("notes", &notes, NOTES_MAX_LEN)?;
                Some(notes)
            }
            _ => None,
        };

        let custom_data = match options.custom_data {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(_) => return Err(ValidationError::new("custom_data", "must be a JSON object")),
        };

        Ok(Self {
            source_id,
            issued_on,
            notes,
            custom_data,
        })
    }
}

fn check_business_rules(source: &Document) -> Result<(), ConversionError> {
    let rule = |err: ValidationError| ConversionError::BusinessRule(err.to_string());

    if matches!(source.content, None | Some(Value::Null)) {
        return Err(ConversionError::BusinessRule(
            "quote has no content payload".to_string(),
        ));
    }

    validate_nonzero_amount(
        "total_excluding_tax",
        source.financials.total_excluding_tax.as_ref(),
    )
    .map_err(rule)?;
    validate_nonzero_amount(
        "total_including_tax",
        source.financials.total_including_tax.as_ref(),
    )
    .map_err(rule)?;
    validate_required("client_name", source.client.name.as_deref().unwrap_or_default())
        .map_err(rule)?;
    // Blank currencies fall back to the default.
    if let Some(currency) = source.financials.currency.as_deref() {
        if !currency.trim().is_empty() {
            validate_currency(currency).map_err(rule)?;
        }
    }

    if !status::CONVERTIBLE.contains(&source.status.as_str()) {
        tracing::warn!(
            source_id = %source.id,
            status = %source.status,
            "Converting a quote that has not been validated"
        );
    }

    Ok(())
}

fn text_override(custom: &Map<String, Value>, key: &str) -> Option<String> {
    custom
        .get(key)
        .and_then(Value::as_str)
        .map(sanitize_string)
        .filter(|value| !value.is_empty())
}

fn build_invoice(
    source: &Document,
    request: &ValidatedRequest,
    reference: &str,
    now: DateTime<Utc>,
) -> NewDocument {
    let kind = DocumentKind::Invoice;
    let issued_on = request.issued_on;
    let due_on = due_date(issued_on);
    let client_name = source.client.name.clone().unwrap_or_default();

    // Terms text is informational; the due date stays at the fixed offset.
    let payment_terms = text_override(&request.custom_data, "payment_terms")
        .unwrap_or_else(|| DEFAULT_PAYMENT_TERMS.to_string());
    let payment_method = text_override(&request.custom_data, "payment_method")
        .unwrap_or_else(|| DEFAULT_PAYMENT_METHOD.to_string());

    let financials = FinancialSnapshot {
        currency: Some(source.financials.currency_or_default().to_string()),
        ..source.financials.clone()
    };

    let mut payload = match &source.content {
        Some(Value::Object(map)) => map.clone(),
        _ => Map::new(),
    };
    payload.extend(request.custom_data.clone());
    payload.insert("document_kind".into(), json!(kind.as_str()));
    payload.insert("invoice_reference".into(), json!(reference));
    payload.insert("quote_reference".into(), json!(source.reference));
    payload.insert("issued_on".into(), json!(issued_on.to_string()));
    payload.insert("due_on".into(), json!(due_on.to_string()));
    payload.insert("payment_terms".into(), json!(payment_terms));
    payload.insert("payment_method".into(), json!(payment_method));
    if let Some(notes) = &request.notes {
        payload.insert("notes".into(), json!(notes));
    }
    payload.insert(
        "conversion".into(),
        json!({
            "source_id": source.id,
            "source_reference": source.reference,
            "converted_at": now.to_rfc3339(),
            "reason": CONVERSION_REASON,
        }),
    );

    NewDocument {
        tenant_id: source.tenant_id,
        lead_id: source.lead_id,
        status: kind.initial_status().to_string(),
        kind,
        reference: reference.to_string(),
        title: format!("INVOICE - {}", client_name),
        parent_document_id: Some(source.id),
        financials,
        client: source.client.clone(),
        issued_on: Some(issued_on),
        due_on: Some(due_on),
        payment_terms: Some(payment_terms),
        payment_method: Some(payment_method),
        content: Some(Value::Object(payload)),
        rendered_body: None,
        created_at: now,
    }
}

fn audit_record(
    transaction_id: &str,
    source: &Document,
    derived: &Document,
    actor_id: Option<Uuid>,
    converted_at: DateTime<Utc>,
    notes: Option<&str>,
    render_strategy: &str,
) -> AuditRecord {
    AuditRecord {
        id: Uuid::new_v4(),
        transaction_id: transaction_id.to_string(),
        action: ACTION_CONVERT_QUOTE_TO_INVOICE.to_string(),
        source_document_id: source.id,
        source_reference: source.reference.clone(),
        derived_document_id: derived.id,
        derived_reference: derived.reference.clone(),
        total_excluding_tax: derived.financials.total_excluding_tax.clone(),
        total_including_tax: derived.financials.total_including_tax.clone(),
        currency: Some(derived.financials.currency_or_default().to_string()),
        tenant_id: source.tenant_id,
        actor_id,
        recorded_at: Utc::now(),
        metadata: json!({
            "conversion_date": converted_at.to_rfc3339(),
            "source": AUDIT_SOURCE,
            "version": AUDIT_VERSION,
            "notes": notes,
            "render_strategy": render_strategy,
        }),
    }
}
