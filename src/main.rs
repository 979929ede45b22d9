use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tripwire::api;
use tripwire::config::{Config, TrustedProxyMode};
use tripwire::service::{build_session_logger, connect_storage};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Loaded configuration");

    // Initialize storage
    let storage = connect_storage(&config.database).await?;
    info!("Database initialized successfully");

    let logger = Arc::new(build_session_logger(&config, Arc::clone(&storage))?);

    info!(
        "🌐 IP lookup chain: {} provider(s), forwarded address first: {}",
        config.resolver.ip_lookup_urls.len() + usize::from(config.resolver.use_forwarded_ip),
        config.resolver.use_forwarded_ip
    );
    info!("🗺️  Geolocation providers: {}", config.resolver.geo_providers.join(", "));
    info!("🛡️  Fraud checks fail {:?}", config.fraud.fail_policy);
    if matches!(config.proxy.trusted_proxy_mode, TrustedProxyMode::None) {
        info!("Client addresses taken from the socket (TRUSTED_PROXY_MODE=none)");
    }

    let router = api::create_api_router(logger, storage, config.proxy.clone());

    let api_addr = format!("{}:{}", config.api_server.host, config.api_server.port);
    let listener = tokio::net::TcpListener::bind(&api_addr).await?;
    info!("🚀 API server listening on http://{}", api_addr);
    info!("   - POST http://{}/api/sessions", api_addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
