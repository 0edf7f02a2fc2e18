use anyhow::{Context, Result};
use clap::Parser;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use user_admin::{
    config::AppConfig, services::AppState, shutdown::GracefulShutdown, tracing as app_tracing, web::create_router,
};

/// Administrative web panel for user accounts
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Load configuration from this file instead of the `config/` directory
    #[arg(short, long, env = "APP_CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Print the effective configuration as YAML and exit
    #[arg(long)]
    print_config: bool,

    /// Write the documented configuration template to this path and exit
    #[arg(long, value_name = "PATH")]
    generate_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Some(path) = &cli.generate_config {
        AppConfig::write_template(path)?;
        println!("Configuration template written to {}", path.display());
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => AppConfig::load().context("failed to load configuration")?,
    };

    if cli.print_config {
        print!("{}", config.to_yaml()?);
        return Ok(());
    }

    let _guards = app_tracing::init_tracing(&config)?;
    config.print_summary();

    let addr = config.server.socket_addr()?;
    let drain_timeout = Duration::from_secs(config.server.graceful_shutdown_timeout_seconds);
    let seed = config.backend.seed_admin.clone();

    let state = AppState::new(config)?;
    if let Some(seed) = seed {
        state
            .services
            .seed_admin(&seed)
            .await
            .context("failed to provision the seed administrator")?;
    }

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!(%addr, "Server listening");

    let shutdown = GracefulShutdown::new(drain_timeout);
    let server = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown.shutdown_signal())
        .into_future();

    shutdown.run(server).await?;
    tracing::info!("Server stopped");

    Ok(())
}
