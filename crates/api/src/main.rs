use std::sync::Arc;

use craneledger_api::app::{build_app, services::AppServices};
use craneledger_api::config::AppConfig;
use craneledger_infra::PostgresStore;

const MAX_DB_CONNECTIONS: u32 = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    craneledger_observability::init(&config.log_level);

    let services = match config.database_url.as_deref() {
        Some(url) => {
            let store = PostgresStore::connect(url, MAX_DB_CONNECTIONS).await?;
            store.migrate().await?;
            tracing::info!("using postgres stores");
            AppServices::postgres(store, config.app_env)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory stores");
            AppServices::in_memory(config.app_env)
        }
    };

    let app = build_app(Arc::new(services));
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(
        port = config.port,
        app_env = config.app_env.as_str(),
        "CraneLedger API listening"
    );
    axum::serve(listener, app).await?;
    Ok(())
}
