use crate::adapters::{
    PostgresAgencyDirectory, PostgresAuditLog, PostgresDocumentStore, PostgresTemplateSource,
};
use crate::config::Config;
use crate::domain::DocumentKind;
use crate::health::{PostgresChecker, TemplateChecker};
use crate::rendering::context::template_key;
use crate::rendering::TemplateRenderer;
use crate::AppState;
use anyhow::{Context, Result};
use sqlx::PgPool;
use std::sync::Arc;

pub struct ValidationReport {
    pub environment: bool,
    pub database: bool,
    pub templates: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// Missing templates only degrade rendering, so they do not fail startup.
    pub fn is_valid(&self) -> bool {
        self.environment && self.database
    }

    pub fn print(&self) {
        println!("\n=== Startup Validation Report ===");
        println!("Environment Variables: {}", status(self.environment));
        println!("Database Connectivity: {}", status(self.database));
        println!("Document Templates:    {}", status(self.templates));

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  ❌ {}", error);
            }
        }

        if !self.warnings.is_empty() {
            println!("\nWarnings:");
            for warning in &self.warnings {
                println!("  ⚠️  {}", warning);
            }
        }

        println!(
            "\nOverall Status: {}",
            if self.is_valid() { "✅ PASS" } else { "❌ FAIL" }
        );
        println!("=================================\n");
    }
}

fn status(ok: bool) -> &'static str {
    if ok { "✅ OK" } else { "❌ FAIL" }
}

/// Wires the Postgres adapters into the application state.
pub fn build_state(config: &Config, pool: PgPool) -> AppState {
    let templates = Arc::new(PostgresTemplateSource::new(pool.clone()));
    let invoice_template = template_key(config.default_agency_type, &DocumentKind::Invoice);

    AppState::new(
        Arc::new(PostgresDocumentStore::new(pool.clone())),
        Arc::new(TemplateRenderer::new(templates.clone())),
        Arc::new(PostgresAuditLog::new(pool.clone())),
        Arc::new(PostgresAgencyDirectory::new(pool.clone())),
        config.default_agency_type,
    )
    .with_health_checker(Arc::new(PostgresChecker::new(pool)))
    .with_health_checker(Arc::new(TemplateChecker::new(templates, invoice_template)))
}

pub async fn validate_environment(config: &Config, pool: &PgPool) -> Result<ValidationReport> {
    let mut report = ValidationReport {
        environment: true,
        database: true,
        templates: true,
        errors: Vec::new(),
        warnings: Vec::new(),
    };

    if let Err(e) = validate_env_vars(config) {
        report.environment = false;
        report.errors.push(format!("Environment: {}", e));
    }

    if let Err(e) = validate_database(pool).await {
        report.database = false;
        report.errors.push(format!("Database: {}", e));
    }

    if report.database {
        if let Err(e) = validate_templates(pool).await {
            report.templates = false;
            report.warnings.push(format!("Templates: {}", e));
        }
    }

    Ok(report)
}

fn validate_env_vars(config: &Config) -> Result<()> {
    if config.database_url.is_empty() {
        anyhow::bail!("DATABASE_URL is empty");
    }
    if config.server_port == 0 {
        anyhow::bail!("SERVER_PORT must be greater than 0");
    }
    if config.database_max_connections == 0 {
        anyhow::bail!("DATABASE_MAX_CONNECTIONS must be greater than 0");
    }

    Ok(())
}

async fn validate_database(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .context("Failed to connect to database")?;

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .context("Failed to check migrations table")?;

    if applied == 0 {
        anyhow::bail!("No migrations applied");
    }

    Ok(())
}

async fn validate_templates(pool: &PgPool) -> Result<()> {
    let active: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM document_templates WHERE is_active")
            .fetch_one(pool)
            .await
            .context("Failed to count document templates")?;

    if active == 0 {
        anyhow::bail!("No active document templates, built-in fallbacks will be used");
    }

    Ok(())
}
