pub mod adapters;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod health;
pub mod ports;
pub mod rendering;
pub mod startup;
pub mod use_cases;
pub mod utils;
pub mod validation;

use axum::{
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

use crate::domain::AgencyType;
use crate::health::DependencyChecker;
use crate::ports::{AgencyDirectory, AuditLog, DocumentStore, Renderer};
use crate::use_cases::{
    ConversionHistory, ConvertDocument, GenerateDocument, ListDocuments, UpdateDocumentStatus,
    VerifyConversion,
};

#[derive(Clone)]
pub struct AppState {
    pub converter: Arc<ConvertDocument>,
    pub verifier: Arc<VerifyConversion>,
    pub history: Arc<ConversionHistory>,
    pub generator: Arc<GenerateDocument>,
    pub status_updater: Arc<UpdateDocumentStatus>,
    pub lister: Arc<ListDocuments>,
    pub health_checkers: Vec<Arc<dyn DependencyChecker>>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        renderer: Arc<dyn Renderer>,
        audit_log: Arc<dyn AuditLog>,
        agencies: Arc<dyn AgencyDirectory>,
        default_agency_type: AgencyType,
    ) -> Self {
        let converter = ConvertDocument::new(
            Arc::clone(&documents),
            Arc::clone(&renderer),
            audit_log,
            Arc::clone(&agencies),
        )
        .with_default_agency_type(default_agency_type);
        let generator = GenerateDocument::new(Arc::clone(&documents), renderer, agencies)
            .with_default_agency_type(default_agency_type);

        Self {
            converter: Arc::new(converter),
            verifier: Arc::new(VerifyConversion::new(Arc::clone(&documents))),
            history: Arc::new(ConversionHistory::new(Arc::clone(&documents))),
            generator: Arc::new(generator),
            status_updater: Arc::new(UpdateDocumentStatus::new(Arc::clone(&documents))),
            lister: Arc::new(ListDocuments::new(documents)),
            health_checkers: Vec::new(),
            started_at: Instant::now(),
        }
    }

    pub fn with_health_checker(mut self, checker: Arc<dyn DependencyChecker>) -> Self {
        self.health_checkers.push(checker);
        self
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/documents/:id/convert",
            post(handlers::conversions::convert_document),
        )
        .route(
            "/documents/:id/conversions",
            get(handlers::conversions::list_conversions),
        )
        .route(
            "/documents/:id/integrity/:derived_id",
            get(handlers::conversions::verify_conversion),
        )
        .route(
            "/tenants/:tenant_id/conversions/stats",
            get(handlers::conversions::conversion_stats),
        )
        .route(
            "/tenants/:tenant_id/documents",
            get(handlers::documents::list_documents)
                .post(handlers::documents::generate_document),
        )
        .route(
            "/documents/:id/status",
            patch(handlers::documents::update_status),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
