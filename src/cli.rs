use bigdecimal::BigDecimal;
use clap::{Args, Parser, Subcommand};
use sqlx::PgPool;
use uuid::Uuid;

use nexapro_core::config::Config;
use nexapro_core::use_cases::{
    ConversionOptions, ConversionOutcome, DocumentQuery, GenerationRequest,
};

#[derive(Parser)]
#[command(name = "nexapro-core")]
#[command(about = "NexaPro Core - Business document conversion service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Convert a quote into an invoice
    Convert {
        /// Source quote UUID
        #[arg(value_name = "SOURCE_ID")]
        source_id: String,

        /// Issuance date (YYYY-MM-DD), today when omitted
        #[arg(long)]
        issued_on: Option<String>,

        /// Notes copied into the invoice payload
        #[arg(long)]
        notes: Option<String>,
    },

    /// Check a derived document against its source
    Verify {
        #[arg(value_name = "SOURCE_ID")]
        source_id: Uuid,

        #[arg(value_name = "DERIVED_ID")]
        derived_id: Uuid,
    },

    /// Generate a new document for a tenant
    Generate(GenerateArgs),

    /// Move a document to a new status
    Status {
        #[arg(value_name = "DOCUMENT_ID")]
        document_id: String,

        /// Target status (validated, signed, paid, overdue, ...)
        #[arg(value_name = "STATUS")]
        status: String,
    },

    /// List a tenant's documents, newest first
    List {
        #[arg(value_name = "TENANT_ID")]
        tenant_id: Uuid,

        #[arg(long)]
        kind: Option<String>,

        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        lead_id: Option<String>,

        /// Only documents created in the last N days
        #[arg(long)]
        last_days: Option<u32>,
    },

    /// Configuration validation
    Config,
}

#[derive(Args)]
pub struct GenerateArgs {
    #[arg(value_name = "TENANT_ID")]
    pub tenant_id: Uuid,

    /// quote, invoice, mandate or report
    #[arg(long)]
    pub kind: String,

    #[arg(long)]
    pub client_name: Option<String>,

    #[arg(long)]
    pub client_email: Option<String>,

    #[arg(long)]
    pub lead_id: Option<Uuid>,

    #[arg(long)]
    pub title: Option<String>,

    /// Tax and total are derived at 20% VAT
    #[arg(long)]
    pub total_excluding_tax: Option<BigDecimal>,

    #[arg(long)]
    pub currency: Option<String>,

    /// Issuance date (YYYY-MM-DD), today when omitted
    #[arg(long)]
    pub issued_on: Option<String>,
}

impl From<GenerateArgs> for GenerationRequest {
    fn from(args: GenerateArgs) -> Self {
        GenerationRequest {
            kind: args.kind,
            lead_id: args.lead_id,
            title: args.title,
            client_name: args.client_name,
            client_email: args.client_email,
            total_excluding_tax: args.total_excluding_tax,
            currency: args.currency,
            issuance_date: args.issued_on,
            ..Default::default()
        }
    }
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = nexapro_core::db::create_pool(config).await?;

    tracing::info!("Running database migrations...");
    nexapro_core::db::run_migrations(&pool).await?;

    println!("✓ Database migrations completed");

    Ok(())
}

pub async fn handle_convert(
    config: &Config,
    pool: PgPool,
    source_id: &str,
    issued_on: Option<String>,
    notes: Option<String>,
) -> anyhow::Result<()> {
    let state = nexapro_core::startup::build_state(config, pool);
    let options = ConversionOptions {
        issuance_date: issued_on,
        notes,
        custom_data: None,
    };

    let outcome = state.converter.convert(source_id, options).await;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    match outcome {
        ConversionOutcome::Converted(success) => {
            println!(
                "✓ Quote {} converted to invoice {}",
                success.metadata.source_reference, success.metadata.derived_reference
            );
            Ok(())
        }
        ConversionOutcome::Failed(failure) => {
            anyhow::bail!("Conversion {} failed: {}", failure.transaction_id, failure.error)
        }
    }
}

pub async fn handle_verify(
    config: &Config,
    pool: PgPool,
    source_id: Uuid,
    derived_id: Uuid,
) -> anyhow::Result<()> {
    let state = nexapro_core::startup::build_state(config, pool);
    let report = state.verifier.verify(source_id, derived_id).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.valid {
        anyhow::bail!("Integrity check failed: {}", report.errors.join(", "));
    }

    println!(
        "✓ Derived document {} is consistent with {}",
        derived_id, source_id
    );
    Ok(())
}

pub async fn handle_generate(
    config: &Config,
    pool: PgPool,
    args: GenerateArgs,
) -> anyhow::Result<()> {
    let state = nexapro_core::startup::build_state(config, pool);
    let tenant_id = args.tenant_id;
    let generated = state.generator.generate(tenant_id, args.into()).await?;
    println!("{}", serde_json::to_string_pretty(&generated)?);

    let document = &generated.document;
    println!("✓ Generated {} {}", document.kind, document.reference);
    Ok(())
}

pub async fn handle_status(
    config: &Config,
    pool: PgPool,
    document_id: &str,
    status: &str,
) -> anyhow::Result<()> {
    let state = nexapro_core::startup::build_state(config, pool);
    let document = state.status_updater.execute(document_id, status).await?;

    println!(
        "✓ Document {} is now {}",
        document.reference, document.status
    );
    Ok(())
}

pub async fn handle_list(
    config: &Config,
    pool: PgPool,
    tenant_id: Uuid,
    query: DocumentQuery,
) -> anyhow::Result<()> {
    let state = nexapro_core::startup::build_state(config, pool);
    let documents = state.lister.execute(tenant_id, query).await?;

    for document in &documents {
        println!(
            "{}  {:<10} {:<10} {}  {}",
            document.created_at.format("%Y-%m-%d"),
            document.kind,
            document.status,
            document.reference,
            document.title
        );
    }
    println!("{} document(s)", documents.len());

    Ok(())
}

pub async fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Server Port: {}", config.server_port);
    println!("  Database URL: {}", mask_password(&config.database_url));
    println!("  Max Connections: {}", config.database_max_connections);
    println!("  Log Format: {:?}", config.log_format);
    println!("  Default Agency Type: {}", config.default_agency_type);

    let pool = nexapro_core::db::create_pool(config).await?;
    let report = nexapro_core::startup::validate_environment(config, &pool).await?;
    report.print();

    if !report.is_valid() {
        anyhow::bail!("Configuration is invalid");
    }

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");

    Ok(())
}

fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.rfind('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            if let Some(slash_pos) = url[..colon_pos].rfind("//") {
                let prefix = &url[..slash_pos + 2];
                let user_start = slash_pos + 2;
                let user = &url[user_start..colon_pos];
                let suffix = &url[at_pos..];
                return format!("{}{}:****{}", prefix, user, suffix);
            }
        }
    }
    url.to_string()
}
