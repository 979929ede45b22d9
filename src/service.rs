//! Wiring of resolvers, checks and the session logger from [`Config`]

use anyhow::{Context, Result};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::{Config, DatabaseBackend, DatabaseConfig, ResolverConfig};
use crate::fraud::{FraudDetector, RiskSignals, SignalPolicies};
use crate::network::{
    ForwardedIpProvider, GeoFormat, GeoProvider, GeoResolver, HttpGeoProvider, HttpIpProvider,
    IpProvider, IpResolver, MaxMindGeoProvider,
};
use crate::session::{Fingerprinter, SessionInfoAggregator, SessionLogger};
use crate::storage::{PostgresStorage, SqliteStorage, Storage};

pub async fn connect_storage(config: &DatabaseConfig) -> Result<Arc<dyn Storage>> {
    let storage: Arc<dyn Storage> = match config.backend {
        DatabaseBackend::Sqlite => {
            info!("Using SQLite storage: {}", config.url);
            Arc::new(SqliteStorage::new(&config.url, config.max_connections).await?)
        }
        DatabaseBackend::Postgres => {
            info!("Using PostgreSQL storage: {}", config.url);
            Arc::new(PostgresStorage::new(&config.url, config.max_connections).await?)
        }
    };

    storage.init().await.context("failed to initialize database")?;
    Ok(storage)
}

pub fn http_client() -> Result<Client> {
    Client::builder()
        .user_agent(concat!("tripwire/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client for IP lookups")
}

pub fn build_ip_resolver(config: &ResolverConfig, client: &Client) -> IpResolver {
    let mut providers: Vec<Arc<dyn IpProvider>> = Vec::new();
    if config.use_forwarded_ip {
        providers.push(Arc::new(ForwardedIpProvider));
    }
    for spec in &config.ip_lookup_urls {
        providers.push(Arc::new(HttpIpProvider::from_spec(client.clone(), spec)));
    }

    IpResolver::new(providers, Duration::from_millis(config.ip_timeout_ms))
}

pub fn build_geo_resolver(config: &ResolverConfig, client: &Client) -> Result<GeoResolver> {
    let mut providers: Vec<Arc<dyn GeoProvider>> = Vec::new();
    for name in &config.geo_providers {
        match name.parse::<GeoFormat>() {
            Ok(format) => providers.push(Arc::new(HttpGeoProvider::new(client.clone(), format))),
            Err(e) => warn!("Ignoring geolocation provider: {}", e),
        }
    }

    if config.geoip_city_db_path.is_some() || config.geoip_asn_db_path.is_some() {
        let local = MaxMindGeoProvider::new(
            config.geoip_city_db_path.as_deref(),
            config.geoip_asn_db_path.as_deref(),
        )?;
        providers.push(Arc::new(local));
    }

    let resolver = GeoResolver::new(providers, Duration::from_millis(config.geo_timeout_ms));
    Ok(if config.geo_cache_max_entries > 0 {
        resolver.with_cache(
            config.geo_cache_max_entries,
            Duration::from_secs(config.geo_cache_ttl_secs),
        )
    } else {
        resolver
    })
}

pub fn build_detector(
    config: &Config,
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
) -> FraudDetector {
    let signals = RiskSignals::new(
        storage,
        Arc::clone(&clock),
        SignalPolicies::uniform(config.fraud.fail_policy),
    );
    FraudDetector::new(signals, clock)
}

/// Session logger for `config`, using the system clock and SHA-256 fingerprints
pub fn build_session_logger(config: &Config, storage: Arc<dyn Storage>) -> Result<SessionLogger> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let client = http_client()?;

    let aggregator = SessionInfoAggregator::new(
        Fingerprinter::default(),
        build_ip_resolver(&config.resolver, &client),
        build_geo_resolver(&config.resolver, &client)?,
        Arc::clone(&clock),
    );
    let detector = build_detector(config, Arc::clone(&storage), Arc::clone(&clock));

    Ok(SessionLogger::new(aggregator, detector, storage, clock))
}
