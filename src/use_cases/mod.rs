//! Application use cases. Each one holds its ports behind `Arc<dyn _>`.

pub mod conversion_history;
pub mod convert_document;
pub mod document_error;
pub mod generate_document;
pub mod list_documents;
pub mod update_status;
pub mod verify_integrity;

pub use conversion_history::{ConversionHistory, ConversionStats, MonthlyConversions};
pub use convert_document::{
    ConversionErrorKind, ConversionFailure, ConversionOptions, ConversionOutcome,
    ConversionSuccess, ConvertDocument,
};
pub use document_error::DocumentError;
pub use generate_document::{GenerateDocument, GeneratedDocument, GenerationRequest};
pub use list_documents::{DocumentQuery, ListDocuments};
pub use update_status::UpdateDocumentStatus;
pub use verify_integrity::{IntegrityReport, VerifyConversion};
