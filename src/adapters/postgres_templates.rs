//! Postgres lookups feeding the renderer: stored templates and agency profiles.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{AgencyProfile, AgencyType};
use crate::ports::{
    AgencyDirectory, RepositoryError, RepositoryResult, StoredTemplate, TemplateSource,
};

#[derive(Clone)]
pub struct PostgresTemplateSource {
    pool: PgPool,
}

impl PostgresTemplateSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TemplateSource for PostgresTemplateSource {
    async fn template(&self, template_key: &str) -> RepositoryResult<Option<StoredTemplate>> {
        let row = sqlx::query_as::<_, (String, Option<String>)>(
            "SELECT template_html, template_css FROM document_templates \
             WHERE template_key = $1 AND is_active = TRUE",
        )
        .bind(template_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.map(|(html, css)| StoredTemplate { html, css }))
    }
}

#[derive(Clone)]
pub struct PostgresAgencyDirectory {
    pool: PgPool,
}

impl PostgresAgencyDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AgencyDirectory for PostgresAgencyDirectory {
    async fn profile(&self, tenant_id: Uuid) -> RepositoryResult<Option<AgencyProfile>> {
        let row = sqlx::query_as::<_, AgencyProfileRow>(
            "SELECT tenant_id, name, agency_type, legal_address, phone, email, siret, \
             logo_url, legal_mentions, currency FROM agency_profiles WHERE tenant_id = $1",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(row.map(AgencyProfileRow::into_domain))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AgencyProfileRow {
    tenant_id: Uuid,
    name: String,
    agency_type: String,
    legal_address: Option<String>,
    phone: Option<String>,
    email: Option<String>,
    siret: Option<String>,
    logo_url: Option<String>,
    legal_mentions: Option<String>,
    currency: Option<String>,
}

impl AgencyProfileRow {
    fn into_domain(self) -> AgencyProfile {
        AgencyProfile {
            tenant_id: self.tenant_id,
            name: self.name,
            agency_type: AgencyType::parse(&self.agency_type),
            legal_address: self.legal_address,
            phone: self.phone,
            email: self.email,
            siret: self.siret,
            logo_url: self.logo_url,
            legal_mentions: self.legal_mentions,
            currency: self.currency,
        }
    }
}
