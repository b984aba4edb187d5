//! Vigil API server binary.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vigil_api::config::ApiConfig;

const DEFAULT_LOG_FILTER: &str = "info,vigil_api=debug,vigil_core=debug";

/// CLI arguments for the API server. Everything else comes from the environment.
#[derive(Parser, Debug)]
#[command(name = "vigil_api_server", about = "Vigil API server")]
struct Args {
    /// Port to listen on; overrides the port of `BIND_ADDR`.
    #[arg(long)]
    port: Option<u16>,

    /// PostgreSQL connection URL.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,

    /// Seconds between sweeps of expired login attempt records.
    #[arg(long, default_value_t = 60)]
    purge_interval_secs: u64,

    /// Seconds between sweeps of expired refresh session rows.
    #[arg(long, default_value_t = 3600)]
    session_purge_interval_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(DEFAULT_LOG_FILTER))?;
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    let args = Args::parse();

    let mut config = ApiConfig::from_env();
    if let Some(url) = args.database_url {
        config.pg_connection_url = url;
    }
    if let Some(port) = args.port {
        let host = config
            .bind_addr
            .rsplit_once(':')
            .map_or("127.0.0.1", |(host, _)| host);
        config.bind_addr = format!("{host}:{port}");
    }
    info!(?config, "starting vigil_api_server");

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.pg_connection_url)
        .await?;

    info!("running database migrations");
    vigil_api::migrate(&pool).await?;

    let state = vigil_api::AppState::postgres(pool, config.clone());
    state
        .throttle
        .spawn_purge_task(Duration::from_secs(args.purge_interval_secs.max(1)));
    state
        .refresh_sessions
        .spawn_purge_task(Duration::from_secs(args.session_purge_interval_secs.max(1)));

    let app = vigil_api::router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "API listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
