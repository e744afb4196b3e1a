mod cli;

use clap::Parser;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::{Cli, Commands, DbCommands};
use nexapro_core::config::{Config, LogFormat};
use nexapro_core::use_cases::DocumentQuery;
use nexapro_core::{create_app, db, startup};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    init_tracing(config.log_format);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Convert {
            source_id,
            issued_on,
            notes,
        } => {
            let pool = db::create_pool(&config).await?;
            cli::handle_convert(&config, pool, &source_id, issued_on, notes).await
        }
        Commands::Verify {
            source_id,
            derived_id,
        } => {
            let pool = db::create_pool(&config).await?;
            cli::handle_verify(&config, pool, source_id, derived_id).await
        }
        Commands::Generate(args) => {
            let pool = db::create_pool(&config).await?;
            cli::handle_generate(&config, pool, args).await
        }
        Commands::Status {
            document_id,
            status,
        } => {
            let pool = db::create_pool(&config).await?;
            cli::handle_status(&config, pool, &document_id, &status).await
        }
        Commands::List {
            tenant_id,
            kind,
            status,
            lead_id,
            last_days,
        } => {
            let pool = db::create_pool(&config).await?;
            let query = DocumentQuery {
                kind,
                status,
                lead_id,
                last_days,
                ..Default::default()
            };
            cli::handle_list(&config, pool, tenant_id, query).await
        }
        Commands::Config => cli::handle_config_validate(&config).await,
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let pool = db::create_pool(&config).await?;
    db::run_migrations(&pool).await?;

    let report = startup::validate_environment(&config, &pool).await?;
    for warning in &report.warnings {
        tracing::warn!("{}", warning);
    }
    if !report.is_valid() {
        report.print();
        anyhow::bail!("Startup validation failed");
    }

    let app = create_app(startup::build_state(&config, pool));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!("listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
