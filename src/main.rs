use clap::Parser;
use miette::{IntoDiagnostic, Result};
use myvet::{settings, storage, web};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "myvet", version, about = "Veterinary clinic records")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    // load settings
    let settings = settings::Settings::load(&cli.config)?;
    tracing::info!(?settings, "Loaded configuration");

    // connect and migrate
    let db = storage::init(&settings.database).await?;

    ensure_admin(&db, &settings).await?;

    web::serve(settings, db).await?;
    Ok(())
}

async fn ensure_admin(db: &sea_orm::DatabaseConnection, settings: &settings::Settings) -> Result<()> {
    let created = storage::ensure_admin(
        db,
        &settings.auth.admin_username,
        &settings.auth.admin_password,
    )
    .await
    .into_diagnostic()?;

    if created {
        tracing::info!(
            username = %settings.auth.admin_username,
            "Created administrator account; change its password"
        );
    }
    Ok(())
}
