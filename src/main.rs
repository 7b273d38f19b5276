//! # NFC Cards API Main Entry Point
//!
//! Serves the API by default; `migrate`, `seed` and `create-superadmin` are
//! one-shot administrative commands.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use nfc_cards::{
    config::{AppConfig, ConfigLoader},
    db,
    models::RoleName,
    repositories::{NewUser, UserRepository},
    seeds, server, telemetry,
};

/// NFC business card backend
#[derive(Parser)]
#[command(name = "nfc-cards", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run migrations, seed roles and serve the HTTP API (default)
    Serve,
    /// Apply pending database migrations and exit
    Migrate,
    /// Seed reference data (roles) and exit
    Seed,
    /// Create a user holding the superadmin role
    CreateSuperadmin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        company_id: Option<i32>,
    },
}

async fn prepare_database(config: &AppConfig) -> Result<sea_orm::DatabaseConnection> {
    let db = db::init_pool(config)
        .await
        .context("initializing database connection pool")?;
    db::run_migrations(&db).await.context("running migrations")?;
    Ok(db)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::new()
        .load()
        .context("loading configuration")?;
    telemetry::init_tracing(&config).context("initializing tracing")?;

    if let Ok(redacted) = config.redacted_json() {
        tracing::debug!(config = %redacted, "Loaded configuration");
    }
    tracing::info!(profile = %config.profile, "Configuration loaded");

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let db = prepare_database(&config).await?;
            seeds::seed_roles(&db).await.context("seeding roles")?;
            server::run_server(config, db).await
        }
        Commands::Migrate => {
            prepare_database(&config).await?;
            tracing::info!("Migrations applied");
            Ok(())
        }
        Commands::Seed => {
            let db = prepare_database(&config).await?;
            let created = seeds::seed_roles(&db).await.context("seeding roles")?;
            tracing::info!(created = created.len(), "Seeding finished");
            Ok(())
        }
        Commands::CreateSuperadmin {
            email,
            password,
            company_id,
        } => {
            let db = prepare_database(&config).await?;
            seeds::seed_roles(&db).await.context("seeding roles")?;

            let profile = UserRepository::new(&db)
                .create(
                    NewUser {
                        email,
                        password,
                        company_id,
                    },
                    &[RoleName::Superadmin],
                )
                .await
                .context("creating superadmin")?;
            tracing::info!(user_id = profile.user.id, email = %profile.user.email, "Superadmin created");
            Ok(())
        }
    }
}
