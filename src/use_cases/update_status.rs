//! Update document status use case.

use std::sync::Arc;

use super::DocumentError;
use crate::domain::{status, Document, DocumentPatch};
use crate::ports::DocumentStore;
use crate::validation::{parse_document_id, sanitize_string, validate_enum};

/// Moves a document along its kind's lifecycle.
pub struct UpdateDocumentStatus {
    documents: Arc<dyn DocumentStore>,
}

impl UpdateDocumentStatus {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }

    pub async fn execute(
        &self,
        document_id: &str,
        new_status: &str,
    ) -> Result<Document, DocumentError> {
        let id = parse_document_id("document_id", document_id)?;
        let new_status = sanitize_string(new_status).to_lowercase();
        validate_enum("status", &new_status, status::ALL)?;

        let document = self.documents.get(id).await?;
        if !document.kind.can_move(&document.status, &new_status) {
            return Err(DocumentError::InvalidTransition {
                kind: document.kind,
                from: document.status,
                to: new_status,
            });
        }

        let updated = self
            .documents
            .update(id, &DocumentPatch::status(new_status))
            .await?;

        tracing::info!(
            document_id = %id,
            kind = %updated.kind,
            from = %document.status,
            to = %updated.status,
            "Document status updated"
        );

        Ok(updated)
    }
}
