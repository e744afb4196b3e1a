pub mod identity;
pub mod in_memory;
pub mod postgres_audit_log;
pub mod postgres_document_store;
pub mod postgres_templates;

pub use identity::StaticIdentity;
pub use postgres_audit_log::PostgresAuditLog;
pub use postgres_document_store::PostgresDocumentStore;
pub use postgres_templates::{PostgresAgencyDirectory, PostgresTemplateSource};
