#![allow(dead_code)]

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use nexapro_core::adapters::in_memory::{
    InMemoryAgencyDirectory, InMemoryAuditLog, InMemoryDocumentStore, InMemoryTemplateSource,
};
use nexapro_core::domain::{
    status, AgencyProfile, AgencyType, AuditRecord, ClientSnapshot, Document, DocumentKind,
    DocumentPatch, FinancialSnapshot, NewDocument,
};
use nexapro_core::ports::{
    AuditLog, DateRange, DocumentFilter, DocumentStore, Renderer, RepositoryError,
    RepositoryResult, StoredTemplate,
};
use nexapro_core::rendering::{RenderError, TemplateRenderer};
use nexapro_core::use_cases::{
    ConvertDocument, GenerateDocument, ListDocuments, UpdateDocumentStatus,
};
use nexapro_core::AppState;

pub const INVOICE_TEMPLATE_KEY: &str = "real_estate_invoice_template";

pub fn decimal(value: &str) -> BigDecimal {
    BigDecimal::from_str(value).expect("valid decimal")
}

/// A validated quote ready for conversion.
pub fn quote(tenant_id: Uuid) -> Document {
    let now = Utc::now();
    Document {
        id: Uuid::new_v4(),
        tenant_id,
        lead_id: Some(Uuid::new_v4()),
        kind: DocumentKind::Quote,
        reference: format!("DEV-20240101-{}-7", now.timestamp_millis()),
        title: "Quote - Harbour loft".to_string(),
        status: status::VALIDATED.to_string(),
        parent_document_id: None,
        financials: FinancialSnapshot {
            total_excluding_tax: Some(decimal("1250.00")),
            tax_amount: Some(decimal("250.00")),
            total_including_tax: Some(decimal("1500.00")),
            currency: Some("EUR".to_string()),
        },
        client: ClientSnapshot {
            name: Some("Jane Doe".to_string()),
            email: Some("jane@example.com".to_string()),
            phone: Some("+33 6 12 34 56 78".to_string()),
        },
        issued_on: None,
        due_on: None,
        payment_terms: None,
        payment_method: None,
        content: Some(json!({
            "line_items": [
                { "label": "Agency fees", "amount": "1000.00" },
                { "label": "Photography", "amount": "250.00" }
            ]
        })),
        rendered_body: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn agency(tenant_id: Uuid) -> AgencyProfile {
    AgencyProfile {
        tenant_id,
        name: "Agence du Port".to_string(),
        agency_type: AgencyType::RealEstate,
        legal_address: Some("1 quai des Indes, 56100 Lorient".to_string()),
        phone: None,
        email: Some("contact@agenceduport.fr".to_string()),
        siret: Some("12345678900011".to_string()),
        logo_url: None,
        legal_mentions: None,
        currency: Some("EUR".to_string()),
    }
}

pub fn invoice_template() -> StoredTemplate {
    StoredTemplate {
        html: "<head></head><h1>{{ document.heading }} {{ document.reference }}</h1>\
               <p>{{ agency.name }}</p>\
               <p>{{ client.name }}</p>\
               <ul>{% for item in line_items %}<li>{{ item.label }}</li>{% endfor %}</ul>\
               <p>Total: {{ totals.including_tax }} {{ document.currency }}</p>\
               <p>Due: {{ document.due_on }}</p>"
            .to_string(),
        css: Some("h1 { font-size: 20px; }".to_string()),
    }
}

/// In-memory collaborators wired the way production wires Postgres.
pub struct Harness {
    pub tenant_id: Uuid,
    pub store: Arc<InMemoryDocumentStore>,
    pub audit: Arc<InMemoryAuditLog>,
    pub agencies: Arc<InMemoryAgencyDirectory>,
    pub templates: Arc<InMemoryTemplateSource>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(InMemoryDocumentStore::new())
    }

    pub fn with_store(store: InMemoryDocumentStore) -> Self {
        let tenant_id = Uuid::new_v4();
        let agencies = InMemoryAgencyDirectory::new();
        agencies.put(agency(tenant_id));
        let templates = InMemoryTemplateSource::new();
        templates.put(INVOICE_TEMPLATE_KEY, invoice_template());

        Self {
            tenant_id,
            store: Arc::new(store),
            audit: Arc::new(InMemoryAuditLog::new()),
            agencies: Arc::new(agencies),
            templates: Arc::new(templates),
        }
    }

    pub fn renderer(&self) -> Arc<dyn Renderer> {
        Arc::new(TemplateRenderer::new(self.templates.clone()))
    }

    pub fn converter(&self) -> ConvertDocument {
        self.converter_with(self.store.clone(), self.renderer(), self.audit.clone())
    }

    pub fn converter_with(
        &self,
        store: Arc<dyn DocumentStore>,
        renderer: Arc<dyn Renderer>,
        audit: Arc<dyn AuditLog>,
    ) -> ConvertDocument {
        ConvertDocument::new(store, renderer, audit, self.agencies.clone())
    }

    pub fn generator(&self) -> GenerateDocument {
        self.generator_with(self.store.clone())
    }

    pub fn generator_with(&self, store: Arc<dyn DocumentStore>) -> GenerateDocument {
        GenerateDocument::new(store, self.renderer(), self.agencies.clone())
    }

    pub fn status_updater(&self) -> UpdateDocumentStatus {
        UpdateDocumentStatus::new(self.store.clone())
    }

    pub fn lister(&self) -> ListDocuments {
        ListDocuments::new(self.store.clone())
    }

    pub fn app_state(&self) -> AppState {
        AppState::new(
            self.store.clone(),
            self.renderer(),
            self.audit.clone(),
            self.agencies.clone(),
            AgencyType::RealEstate,
        )
    }

    pub fn seed_quote(&self) -> Document {
        let document = quote(self.tenant_id);
        self.store.seed(document.clone());
        document
    }
}

/// Renderer that always fails.
pub struct BrokenRenderer;

#[async_trait]
impl Renderer for BrokenRenderer {
    async fn render(&self, _template_key: &str, _data: &Value) -> Result<String, RenderError> {
        Err(RenderError::Source("template service unreachable".to_string()))
    }
}

/// Audit log that rejects every record.
pub struct BrokenAuditLog;

#[async_trait]
impl AuditLog for BrokenAuditLog {
    async fn append(&self, _record: &AuditRecord) -> RepositoryResult<()> {
        Err(RepositoryError::Database("audit table unavailable".to_string()))
    }
}

/// Delegates to an in-memory store and fails selected operations.
pub struct FlakyStore {
    pub inner: Arc<InMemoryDocumentStore>,
    pub fail_insert: bool,
    pub fail_update: bool,
    /// Writes the document, then reports a failure.
    pub insert_then_fail: bool,
    pub writes: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: Arc<InMemoryDocumentStore>) -> Self {
        Self {
            inner,
            fail_insert: false,
            fail_update: false,
            insert_then_fail: false,
            writes: AtomicUsize::new(0),
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn get(&self, id: Uuid) -> RepositoryResult<Document> {
        self.inner.get(id).await
    }

    async fn insert(&self, document: &NewDocument) -> RepositoryResult<Document> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_insert {
            return Err(RepositoryError::Database("connection reset by peer".to_string()));
        }
        let stored = self.inner.insert(document).await?;
        if self.insert_then_fail {
            return Err(RepositoryError::Database(format!(
                "timeout after writing {}",
                stored.reference
            )));
        }
        Ok(stored)
    }

    async fn update(&self, id: Uuid, patch: &DocumentPatch) -> RepositoryResult<Document> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_update {
            return Err(RepositoryError::Database("update rejected".to_string()));
        }
        self.inner.update(id, patch).await
    }

    async fn delete(&self, id: Uuid) -> RepositoryResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(id).await
    }

    async fn find_by_parent(
        &self,
        parent_id: Uuid,
        kind: &DocumentKind,
    ) -> RepositoryResult<Vec<Document>> {
        self.inner.find_by_parent(parent_id, kind).await
    }

    async fn find_by_tenant_and_kind(
        &self,
        tenant_id: Uuid,
        kind: &DocumentKind,
        range: &DateRange,
    ) -> RepositoryResult<Vec<Document>> {
        self.inner.find_by_tenant_and_kind(tenant_id, kind, range).await
    }

    async fn find_by_tenant(
        &self,
        tenant_id: Uuid,
        filter: &DocumentFilter,
    ) -> RepositoryResult<Vec<Document>> {
        self.inner.find_by_tenant(tenant_id, filter).await
    }
}

/// Lets another writer take the freshly generated reference just before the
/// next `clashes` inserts.
pub struct RivalReferenceStore {
    pub inner: Arc<InMemoryDocumentStore>,
    clashes: AtomicUsize,
}

impl RivalReferenceStore {
    pub fn new(inner: Arc<InMemoryDocumentStore>, clashes: usize) -> Self {
        Self {
            inner,
            clashes: AtomicUsize::new(clashes),
        }
    }

    fn take_clash(&self) -> bool {
        self.clashes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl DocumentStore for RivalReferenceStore {
    async fn get(&self, id: Uuid) -> RepositoryResult<Document> {
        self.inner.get(id).await
    }

    async fn insert(&self, document: &NewDocument) -> RepositoryResult<Document> {
        if self.take_clash() {
            let mut rival = document.clone();
            rival.tenant_id = Uuid::new_v4();
            rival.parent_document_id = None;
            self.inner.seed(rival.into_document(Uuid::new_v4()));
        }
        self.inner.insert(document).await
    }

    async fn update(&self, id: Uuid, patch: &DocumentPatch) -> RepositoryResult<Document> {
        self.inner.update(id, patch).await
    }

    async fn delete(&self, id: Uuid) -> RepositoryResult<()> {
        self.inner.delete(id).await
    }

    async fn find_by_parent(
        &self,
        parent_id: Uuid,
        kind: &DocumentKind,
    ) -> RepositoryResult<Vec<Document>> {
        self.inner.find_by_parent(parent_id, kind).await
    }

    async fn find_by_tenant_and_kind(
        &self,
        tenant_id: Uuid,
        kind: &DocumentKind,
        range: &DateRange,
    ) -> RepositoryResult<Vec<Document>> {
        self.inner.find_by_tenant_and_kind(tenant_id, kind, range).await
    }

    async fn find_by_tenant(
        &self,
        tenant_id: Uuid,
        filter: &DocumentFilter,
    ) -> RepositoryResult<Vec<Document>> {
        self.inner.find_by_tenant(tenant_id, filter).await
    }
}
