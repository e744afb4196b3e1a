//! In-process adapters. Used by the test suites and for running the pipeline
//! without a database.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::domain::{AgencyProfile, AuditRecord, Document, DocumentKind, DocumentPatch, NewDocument};
use crate::ports::{
    AgencyDirectory, AuditLog, DateRange, DocumentFilter, DocumentStore, RepositoryError,
    RepositoryResult, StoredTemplate, TemplateSource,
};

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn newest_first(mut documents: Vec<Document>) -> Vec<Document> {
    documents.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    documents
}

/// Document store backed by a hash map. Mirrors the Postgres unique indexes
/// on `reference` and on `(parent_document_id, kind)`.
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<Uuid, Document>>,
    unique_derivation: bool,
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            unique_derivation: true,
        }
    }

    /// Allows several derived documents of one kind per parent.
    pub fn without_unique_derivation() -> Self {
        Self {
            unique_derivation: false,
            ..Self::new()
        }
    }

    /// Stores a fully formed document as-is.
    pub fn seed(&self, document: Document) {
        write(&self.documents).insert(document.id, document);
    }

    pub fn snapshot(&self, id: Uuid) -> Option<Document> {
        read(&self.documents).get(&id).cloned()
    }

    pub fn all(&self) -> Vec<Document> {
        newest_first(read(&self.documents).values().cloned().collect())
    }

    pub fn len(&self) -> usize {
        read(&self.documents).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, id: Uuid) -> RepositoryResult<Document> {
        self.snapshot(id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn insert(&self, document: &NewDocument) -> RepositoryResult<Document> {
        let mut documents = write(&self.documents);

        if documents.values().any(|d| d.reference == document.reference) {
            return Err(RepositoryError::DuplicateReference(format!(
                "reference {} already exists",
                document.reference
            )));
        }

        if let (true, Some(parent_id)) = (self.unique_derivation, document.parent_document_id) {
            if documents
                .values()
                .any(|d| d.parent_document_id == Some(parent_id) && d.kind == document.kind)
            {
                return Err(RepositoryError::Conflict(format!(
                    "a {} already exists for parent {}",
                    document.kind, parent_id
                )));
            }
        }

        let stored = document.clone().into_document(Uuid::new_v4());
        documents.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update(&self, id: Uuid, patch: &DocumentPatch) -> RepositoryResult<Document> {
        let mut documents = write(&self.documents);
        let document = documents
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;

        if let Some(status) = &patch.status {
            document.status = status.clone();
        }
        if let Some(financials) = &patch.financials {
            document.financials = financials.clone();
        }
        document.updated_at = Utc::now();

        Ok(document.clone())
    }

    async fn delete(&self, id: Uuid) -> RepositoryResult<()> {
        write(&self.documents)
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }

    async fn find_by_parent(
        &self,
        parent_id: Uuid,
        kind: &DocumentKind,
    ) -> RepositoryResult<Vec<Document>> {
        let matches = read(&self.documents)
            .values()
            .filter(|d| d.parent_document_id == Some(parent_id) && &d.kind == kind)
            .cloned()
            .collect();
        Ok(newest_first(matches))
    }

    async fn find_by_tenant_and_kind(
        &self,
        tenant_id: Uuid,
        kind: &DocumentKind,
        range: &DateRange,
    ) -> RepositoryResult<Vec<Document>> {
        let matches = read(&self.documents)
            .values()
            .filter(|d| {
                d.tenant_id == tenant_id && &d.kind == kind && range.contains(d.created_at)
            })
            .cloned()
            .collect();
        Ok(newest_first(matches))
    }

    async fn find_by_tenant(
        &self,
        tenant_id: Uuid,
        filter: &DocumentFilter,
    ) -> RepositoryResult<Vec<Document>> {
        let matches = read(&self.documents)
            .values()
            .filter(|d| d.tenant_id == tenant_id && filter.matches(d))
            .cloned()
            .collect();
        Ok(newest_first(matches))
    }
}

#[derive(Default)]
pub struct InMemoryAuditLog {
    records: RwLock<Vec<AuditRecord>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        read(&self.records).clone()
    }
}

#[async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn append(&self, record: &AuditRecord) -> RepositoryResult<()> {
        write(&self.records).push(record.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryAgencyDirectory {
    profiles: RwLock<HashMap<Uuid, AgencyProfile>>,
}

impl InMemoryAgencyDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, profile: AgencyProfile) {
        write(&self.profiles).insert(profile.tenant_id, profile);
    }
}

#[async_trait]
impl AgencyDirectory for InMemoryAgencyDirectory {
    async fn profile(&self, tenant_id: Uuid) -> RepositoryResult<Option<AgencyProfile>> {
        Ok(read(&self.profiles).get(&tenant_id).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryTemplateSource {
    templates: RwLock<HashMap<String, StoredTemplate>>,
}

impl InMemoryTemplateSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, template_key: &str, template: StoredTemplate) {
        write(&self.templates).insert(template_key.to_string(), template);
    }
}

#[async_trait]
impl TemplateSource for InMemoryTemplateSource {
    async fn template(&self, template_key: &str) -> RepositoryResult<Option<StoredTemplate>> {
        Ok(read(&self.templates).get(template_key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{status, ClientSnapshot, FinancialSnapshot};
    use chrono::Duration;

    fn new_document(kind: DocumentKind, reference: &str, parent: Option<Uuid>) -> NewDocument {
        NewDocument {
            tenant_id: Uuid::nil(),
            lead_id: None,
            kind,
            reference: reference.to_string(),
            title: reference.to_string(),
            status: status::DRAFT.to_string(),
            parent_document_id: parent,
            financials: FinancialSnapshot::default(),
            client: ClientSnapshot::default(),
            issued_on: None,
            due_on: None,
            payment_terms: None,
            payment_method: None,
            content: None,
            rendered_body: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn rejects_duplicate_reference() {
        let store = InMemoryDocumentStore::new();
        store
            .insert(&new_document(DocumentKind::Quote, "DEV-1", None))
            .await
            .unwrap();

        let err = store
            .insert(&new_document(DocumentKind::Quote, "DEV-1", None))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::DuplicateReference(_)));

        // Same reference under a new parent is still a reference clash.
        let err = store
            .insert(&new_document(DocumentKind::Invoice, "DEV-1", Some(Uuid::new_v4())))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::DuplicateReference(_)));
    }

    #[tokio::test]
    async fn rejects_second_derivation_of_same_kind() {
        let store = InMemoryDocumentStore::new();
        let parent = Uuid::new_v4();
        store
            .insert(&new_document(DocumentKind::Invoice, "FAC-1", Some(parent)))
            .await
            .unwrap();

        let err = store
            .insert(&new_document(DocumentKind::Invoice, "FAC-2", Some(parent)))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        // A different kind under the same parent is fine.
        store
            .insert(&new_document(DocumentKind::Contract, "CTR-1", Some(parent)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn find_by_parent_is_newest_first() {
        let store = InMemoryDocumentStore::without_unique_derivation();
        let parent = Uuid::new_v4();
        let base = Utc::now();
        for (offset, reference) in [(0, "FAC-A"), (2, "FAC-C"), (1, "FAC-B")] {
            let mut doc = new_document(DocumentKind::Invoice, reference, Some(parent));
            doc.created_at = base + Duration::seconds(offset);
            store.insert(&doc).await.unwrap();
        }

        let found = store
            .find_by_parent(parent, &DocumentKind::Invoice)
            .await
            .unwrap();
        let references: Vec<&str> = found.iter().map(|d| d.reference.as_str()).collect();
        assert_eq!(references, vec!["FAC-C", "FAC-B", "FAC-A"]);
    }

    #[tokio::test]
    async fn update_and_delete_missing_documents_fail() {
        let store = InMemoryDocumentStore::new();
        let missing = Uuid::new_v4();
        assert!(matches!(
            store.update(missing, &DocumentPatch::status("x")).await,
            Err(RepositoryError::NotFound(_))
        ));
        assert!(matches!(
            store.delete(missing).await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn find_by_tenant_applies_filter() {
        let store = InMemoryDocumentStore::new();
        let lead = Uuid::new_v4();
        let mut quote = new_document(DocumentKind::Quote, "DEV-1", None);
        quote.lead_id = Some(lead);
        store.insert(&quote).await.unwrap();
        let mut invoice = new_document(DocumentKind::Invoice, "FAC-1", None);
        invoice.status = status::ISSUED.to_string();
        store.insert(&invoice).await.unwrap();
        let mut foreign = new_document(DocumentKind::Quote, "DEV-2", None);
        foreign.tenant_id = Uuid::new_v4();
        store.insert(&foreign).await.unwrap();

        let all = store
            .find_by_tenant(Uuid::nil(), &DocumentFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let quotes = DocumentFilter {
            kind: Some(DocumentKind::Quote),
            ..Default::default()
        };
        let found = store.find_by_tenant(Uuid::nil(), &quotes).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].reference, "DEV-1");

        let by_lead = DocumentFilter {
            lead_id: Some(lead),
            status: Some(status::ISSUED.to_string()),
            ..Default::default()
        };
        assert!(store
            .find_by_tenant(Uuid::nil(), &by_lead)
            .await
            .unwrap()
            .is_empty());

        let stale = DocumentFilter {
            created: Some(DateRange::new(
                Utc::now() - Duration::days(30),
                Utc::now() - Duration::days(7),
            )),
            ..Default::default()
        };
        assert!(store
            .find_by_tenant(Uuid::nil(), &stale)
            .await
            .unwrap()
            .is_empty());
    }
}
