use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use tracing::info;
use tribunal_core::{EngineConfig, Stakeholders, StoreConfig};
use tribunal_service::{build_router, ServiceConfig, ServiceState};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StorageMode {
    Auto,
    Memory,
    Postgres,
}

#[derive(Debug, Parser)]
#[command(name = "tribunald", version, about = "Tribunal arbitration REST service")]
struct Cli {
    /// Socket address to bind, e.g. 127.0.0.1:8093
    #[arg(long, default_value = "127.0.0.1:8093")]
    listen: SocketAddr,
    /// Document persistence backend. `auto` picks postgres when a database
    /// url is configured.
    #[arg(long, value_enum, default_value_t = StorageMode::Auto, env = "TRIBUNAL_STORAGE")]
    storage: StorageMode,
    /// PostgreSQL url for case/settlement/penalty document persistence.
    #[arg(long, env = "TRIBUNAL_DATABASE_URL")]
    database_url: Option<String>,
    /// Max PostgreSQL pool connections.
    #[arg(long, default_value_t = 5, env = "TRIBUNAL_PG_MAX_CONNECTIONS")]
    pg_max_connections: u32,
    /// Treasury address receiving fees and the treasury distribution share.
    #[arg(long, default_value = "treasury-main", env = "TRIBUNAL_TREASURY_ADDRESS")]
    treasury_address: String,
    /// Jury pool distribution address.
    #[arg(long, default_value = "jury-pool-main", env = "TRIBUNAL_JURY_POOL_ADDRESS")]
    jury_pool_address: String,
    /// Precedent fund distribution address.
    #[arg(
        long,
        default_value = "precedent-fund-main",
        env = "TRIBUNAL_PRECEDENT_FUND_ADDRESS"
    )]
    precedent_fund_address: String,
}

fn resolve_storage(cli: &Cli) -> anyhow::Result<StoreConfig> {
    let resolved_url = cli
        .database_url
        .clone()
        .or_else(|| std::env::var("DATABASE_URL").ok());

    let storage = match cli.storage {
        StorageMode::Memory => StoreConfig::Memory,
        StorageMode::Postgres => {
            let database_url = resolved_url.ok_or_else(|| {
                anyhow::anyhow!("storage=postgres requires --database-url or DATABASE_URL")
            })?;
            StoreConfig::postgres(database_url, cli.pg_max_connections)
        }
        StorageMode::Auto => {
            if let Some(database_url) = resolved_url {
                StoreConfig::postgres(database_url, cli.pg_max_connections)
            } else {
                StoreConfig::Memory
            }
        }
    };

    Ok(storage)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "tribunal_service=info,info".to_string()),
        )
        .init();

    let cli = Cli::parse();
    let store = resolve_storage(&cli)?;
    let config = ServiceConfig {
        engine: EngineConfig {
            stakeholders: Stakeholders {
                treasury_address: cli.treasury_address.clone(),
                jury_pool_address: cli.jury_pool_address.clone(),
                precedent_fund_address: cli.precedent_fund_address.clone(),
            },
            store,
            ..EngineConfig::default()
        },
        ..ServiceConfig::default()
    };

    let state = ServiceState::bootstrap(config).await?;
    info!(
        "tribunal-service using {} storage",
        state.engine.store_backend()
    );
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(cli.listen).await?;
    info!("tribunal-service listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
