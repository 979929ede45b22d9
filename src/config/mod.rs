use anyhow::Context;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::fraud::FailurePolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api_server: ServerConfig,
    pub proxy: ProxyConfig,
    pub resolver: ResolverConfig,
    pub fraud: FraudConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Sqlite,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustedProxyMode {
    /// Use the socket address only
    None,
    /// Honor Forwarded / X-Forwarded-For
    Standard,
    /// Honor CF-Connecting-IP
    Cloudflare,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub trusted_proxy_mode: TrustedProxyMode,
    /// Proxy networks skipped when walking X-Forwarded-For right to left
    #[serde(default)]
    pub trusted_proxies: Vec<IpNet>,
    /// Fixed number of proxy hops in front of the service
    #[serde(default)]
    pub num_trusted_proxies: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Put the address extracted from the request first in the IP chain
    pub use_forwarded_ip: bool,
    /// `url` or `url|field.path` entries, tried in order
    pub ip_lookup_urls: Vec<String>,
    pub ip_timeout_ms: u64,
    /// Hosted provider names (`ipapi.co`, `ip-api.com`, `ipwho.is`), tried in order
    pub geo_providers: Vec<String>,
    pub geo_timeout_ms: u64,
    /// Local databases appended after the hosted providers
    pub geoip_city_db_path: Option<String>,
    pub geoip_asn_db_path: Option<String>,
    pub geo_cache_max_entries: u64,
    pub geo_cache_ttl_secs: u64,
}

impl ResolverConfig {
    pub fn default_ip_lookup_urls() -> Vec<String> {
        vec![
            "https://api.ipify.org?format=json".to_string(),
            "https://ipapi.co/json/".to_string(),
            "https://api.myip.com".to_string(),
        ]
    }

    pub fn default_geo_providers() -> Vec<String> {
        vec!["ipapi.co".to_string(), "ip-api.com".to_string(), "ipwho.is".to_string()]
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            use_forwarded_ip: true,
            ip_lookup_urls: Self::default_ip_lookup_urls(),
            ip_timeout_ms: 3_000,
            geo_providers: Self::default_geo_providers(),
            geo_timeout_ms: 5_000,
            geoip_city_db_path: None,
            geoip_asn_db_path: None,
            geo_cache_max_entries: 10_000,
            geo_cache_ttl_secs: 3_600,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FraudConfig {
    /// Applied to every storage-backed check
    pub fail_policy: FailurePolicy,
}

fn env_list(name: &str) -> Option<Vec<String>> {
    std::env::var(name).ok().map(|v| {
        v.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend_str =
            std::env::var("DATABASE_BACKEND").unwrap_or_else(|_| "sqlite".to_string());

        let backend = match backend_str.to_lowercase().as_str() {
            "postgres" | "postgresql" => DatabaseBackend::Postgres,
            _ => DatabaseBackend::Sqlite,
        };

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./tripwire.db?mode=rwc".to_string());
        let max_connections = env_parse("DATABASE_MAX_CONNECTIONS", 10u32);

        let api_host = std::env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let api_port = std::env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .context("API_PORT must be a valid port number")?;

        let trusted_proxy_mode = match std::env::var("TRUSTED_PROXY_MODE")
            .unwrap_or_else(|_| "none".to_string())
            .to_lowercase()
            .as_str()
        {
            "none" => TrustedProxyMode::None,
            "standard" => TrustedProxyMode::Standard,
            "cloudflare" => TrustedProxyMode::Cloudflare,
            other => {
                tracing::warn!(
                    "Unknown TRUSTED_PROXY_MODE '{other}', falling back to 'none'. Supported values: none, standard, cloudflare"
                );
                TrustedProxyMode::None
            }
        };

        let trusted_proxies = env_list("TRUSTED_PROXIES")
            .unwrap_or_default()
            .into_iter()
            .filter_map(|cidr| match cidr.parse::<IpNet>() {
                Ok(net) => Some(net),
                Err(_) => {
                    tracing::warn!("Ignoring invalid TRUSTED_PROXIES entry '{cidr}'");
                    None
                }
            })
            .collect();

        let num_trusted_proxies = std::env::var("NUM_TRUSTED_PROXIES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok());

        let defaults = ResolverConfig::default();
        let resolver = ResolverConfig {
            use_forwarded_ip: std::env::var("USE_FORWARDED_IP")
                .map(|v| !matches!(v.to_lowercase().as_str(), "false" | "0" | "no"))
                .unwrap_or(defaults.use_forwarded_ip),
            ip_lookup_urls: env_list("IP_LOOKUP_URLS").unwrap_or(defaults.ip_lookup_urls),
            ip_timeout_ms: env_parse("IP_LOOKUP_TIMEOUT_MS", defaults.ip_timeout_ms),
            geo_providers: env_list("GEO_PROVIDERS").unwrap_or(defaults.geo_providers),
            geo_timeout_ms: env_parse("GEO_LOOKUP_TIMEOUT_MS", defaults.geo_timeout_ms),
            geoip_city_db_path: std::env::var("GEOIP_CITY_DB_PATH").ok(),
            geoip_asn_db_path: std::env::var("GEOIP_ASN_DB_PATH").ok(),
            geo_cache_max_entries: env_parse("GEO_CACHE_MAX_ENTRIES", defaults.geo_cache_max_entries),
            geo_cache_ttl_secs: env_parse("GEO_CACHE_TTL_SECS", defaults.geo_cache_ttl_secs),
        };

        let fail_policy = match std::env::var("FRAUD_FAIL_POLICY")
            .unwrap_or_else(|_| "open".to_string())
            .to_lowercase()
            .as_str()
        {
            "open" => FailurePolicy::Open,
            "closed" => FailurePolicy::Closed,
            other => {
                tracing::warn!(
                    "Unknown FRAUD_FAIL_POLICY '{other}', falling back to 'open'. Supported values: open, closed"
                );
                FailurePolicy::Open
            }
        };

        Ok(Config {
            database: DatabaseConfig {
                backend,
                url: database_url,
                max_connections,
            },
            api_server: ServerConfig {
                host: api_host,
                port: api_port,
            },
            proxy: ProxyConfig {
                trusted_proxy_mode,
                trusted_proxies,
                num_trusted_proxies,
            },
            resolver,
            fraud: FraudConfig { fail_policy },
        })
    }
}
