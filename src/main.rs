use std::net::SocketAddr;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use inkpost::config::{Cli, Config};
use inkpost::{build_router, db, mail, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;
    inkpost::auth::session::purge_expired(&pool)?;

    let mailer = mail::from_config(&config.mail)?;
    if config.mail.smtp_host.is_none() {
        tracing::warn!("No SMTP host configured; reset emails will only be logged");
    }

    let state = AppState::new(pool, config.clone(), mailer);
    state.pictures.ensure_default()?;

    let app = build_router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
