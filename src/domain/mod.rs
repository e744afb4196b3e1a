//! Domain entities. No framework or storage types leak in here.

pub mod agency;
pub mod audit;
pub mod document;

pub use agency::{AgencyProfile, AgencyType};
pub use audit::AuditRecord;
pub use document::{
    status, ClientSnapshot, Document, DocumentKind, DocumentPatch, FinancialSnapshot, NewDocument,
};
