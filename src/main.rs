use anyhow::Result;
use clap::Parser;
use hirebridge::{FirestoreSource, MigrationConfig, Migrator, SupabaseTarget};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

/// One-time Firestore to Supabase migration for the recruiting marketplace.
///
/// All configuration comes from the environment (plus an optional
/// config.yaml); there are no migration flags.
#[derive(Parser)]
#[command(name = "migrate")]
#[command(version)]
#[command(about = "Migrate Firestore collections into the normalized Supabase schema")]
struct Cli {}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging first
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let Cli {} = Cli::parse();

    // Configuration errors abort before any migration work starts.
    let config = MigrationConfig::load()?;

    info!("Source: Firestore project {}", config.firebase_project_id);
    info!("Target: {}", config.supabase_url);

    let source = FirestoreSource::new(
        config.firebase_project_id.clone(),
        config.google_access_token.clone(),
    )?;
    let target = SupabaseTarget::new(
        config.supabase_url.clone(),
        &config.supabase_service_role_key,
    )?;

    let migrator = Migrator::new(source, target);
    match migrator.run().await {
        Ok(report) => {
            println!("{}", report);
            Ok(())
        }
        Err(e) => {
            error!("Migration aborted: {:#}", e);
            Err(e)
        }
    }
}
