use anyhow::Result;
use std::net::SocketAddr;

use fleetdesk::config::AppConfig;
use fleetdesk::create_app;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleetdesk=info,tower_http=info".into()),
        )
        .init();

    let config = AppConfig::from_env().await?;

    sqlx::migrate!("./migrations").run(&config.database_pool).await?;

    let addr: SocketAddr = config.server_address().parse()?;
    let app = create_app(config);

    tracing::info!("Starting fleetdesk server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
