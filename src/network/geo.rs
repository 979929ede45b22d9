//! IP geolocation through an ordered chain of providers
//!
//! Each hosted provider names its fields differently, so every
//! [`GeoFormat`] carries its own request path and response parser.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use moka::future::Cache;
use reqwest::Client;
use serde::Deserialize;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::models::{GeolocationInfo, UNKNOWN_IP};
use crate::network::fallback::{first_success, NamedProvider};

pub const DEFAULT_GEO_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait GeoProvider: NamedProvider + Send + Sync {
    async fn locate(&self, ip: IpAddr) -> Result<GeolocationInfo>;
}

/// Response layouts of the supported hosted geolocation services
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoFormat {
    /// ipapi.co: `GET {base}/{ip}/json/`
    IpApiCo,
    /// ip-api.com: `GET {base}/json/{ip}`
    IpApiCom,
    /// ipwho.is: `GET {base}/{ip}`
    IpWhoIs,
}

impl GeoFormat {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            GeoFormat::IpApiCo => "https://ipapi.co",
            GeoFormat::IpApiCom => "http://ip-api.com",
            GeoFormat::IpWhoIs => "https://ipwho.is",
        }
    }

    fn request_url(&self, base_url: &str, ip: IpAddr) -> String {
        let base = base_url.trim_end_matches('/');
        match self {
            GeoFormat::IpApiCo => format!("{base}/{ip}/json/"),
            GeoFormat::IpApiCom => format!("{base}/json/{ip}"),
            GeoFormat::IpWhoIs => format!("{base}/{ip}"),
        }
    }

    fn parse(&self, body: &[u8]) -> Result<GeolocationInfo> {
        match self {
            GeoFormat::IpApiCo => serde_json::from_slice::<IpApiCoResponse>(body)
                .context("malformed ipapi.co response")?
                .into_geolocation(),
            GeoFormat::IpApiCom => serde_json::from_slice::<IpApiComResponse>(body)
                .context("malformed ip-api.com response")?
                .into_geolocation(),
            GeoFormat::IpWhoIs => serde_json::from_slice::<IpWhoIsResponse>(body)
                .context("malformed ipwho.is response")?
                .into_geolocation(),
        }
    }
}

impl std::str::FromStr for GeoFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ipapi.co" | "ipapi" => Ok(GeoFormat::IpApiCo),
            "ip-api.com" | "ip-api" => Ok(GeoFormat::IpApiCom),
            "ipwho.is" | "ipwhois" => Ok(GeoFormat::IpWhoIs),
            other => bail!("unknown geolocation provider '{other}'"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IpApiCoResponse {
    #[serde(default)]
    error: bool,
    reason: Option<String>,
    country_name: Option<String>,
    region: Option<String>,
    city: Option<String>,
    timezone: Option<String>,
    org: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

impl IpApiCoResponse {
    fn into_geolocation(self) -> Result<GeolocationInfo> {
        if self.error {
            bail!(
                "provider error: {}",
                self.reason.unwrap_or_else(|| "unspecified".to_string())
            );
        }
        Ok(GeolocationInfo {
            country: self.country_name,
            region: self.region,
            city: self.city,
            timezone: self.timezone,
            isp: self.org,
            latitude: self.latitude,
            longitude: self.longitude,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IpApiComResponse {
    status: String,
    message: Option<String>,
    country: Option<String>,
    region_name: Option<String>,
    city: Option<String>,
    timezone: Option<String>,
    isp: Option<String>,
    org: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

impl IpApiComResponse {
    fn into_geolocation(self) -> Result<GeolocationInfo> {
        if self.status != "success" {
            bail!(
                "provider error: {}",
                self.message.unwrap_or_else(|| self.status.clone())
            );
        }
        Ok(GeolocationInfo {
            country: self.country,
            region: self.region_name,
            city: self.city,
            timezone: self.timezone,
            isp: self.isp.or(self.org),
            latitude: self.lat,
            longitude: self.lon,
        })
    }
}

#[derive(Debug, Deserialize)]
struct IpWhoIsResponse {
    success: bool,
    message: Option<String>,
    country: Option<String>,
    region: Option<String>,
    city: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    timezone: Option<IpWhoIsTimezone>,
    connection: Option<IpWhoIsConnection>,
}

#[derive(Debug, Deserialize)]
struct IpWhoIsTimezone {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IpWhoIsConnection {
    isp: Option<String>,
    org: Option<String>,
}

impl IpWhoIsResponse {
    fn into_geolocation(self) -> Result<GeolocationInfo> {
        if !self.success {
            bail!(
                "provider error: {}",
                self.message.unwrap_or_else(|| "unspecified".to_string())
            );
        }
        Ok(GeolocationInfo {
            country: self.country,
            region: self.region,
            city: self.city,
            timezone: self.timezone.and_then(|tz| tz.id),
            isp: self.connection.and_then(|c| c.isp.or(c.org)),
            latitude: self.latitude,
            longitude: self.longitude,
        })
    }
}

/// Hosted geolocation service reached over HTTP
pub struct HttpGeoProvider {
    client: Client,
    base_url: String,
    format: GeoFormat,
}

impl HttpGeoProvider {
    pub fn new(client: Client, format: GeoFormat) -> Self {
        Self::with_base_url(client, format, format.default_base_url())
    }

    pub fn with_base_url(client: Client, format: GeoFormat, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            format,
        }
    }
}

impl NamedProvider for HttpGeoProvider {
    fn name(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl GeoProvider for HttpGeoProvider {
    async fn locate(&self, ip: IpAddr) -> Result<GeolocationInfo> {
        let url = self.format.request_url(&self.base_url, ip);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("unexpected status {status}");
        }

        let body = response.bytes().await.context("failed to read body")?;
        self.format.parse(&body)
    }
}

/// Ordered geolocation chain with a per-IP result cache
#[derive(Clone)]
pub struct GeoResolver {
    providers: Vec<Arc<dyn GeoProvider>>,
    timeout: Duration,
    cache: Option<Cache<IpAddr, GeolocationInfo>>,
}

impl GeoResolver {
    pub fn new(providers: Vec<Arc<dyn GeoProvider>>, timeout: Duration) -> Self {
        Self {
            providers,
            timeout,
            cache: None,
        }
    }

    /// Keep successful lookups for `ttl`, bounded to `max_entries` addresses
    pub fn with_cache(mut self, max_entries: u64, ttl: Duration) -> Self {
        self.cache = Some(
            Cache::builder()
                .max_capacity(max_entries)
                .time_to_live(ttl)
                .build(),
        );
        self
    }

    /// `None` for [`UNKNOWN_IP`], unparseable input, or when every provider fails
    pub async fn resolve_geolocation(&self, ip: &str) -> Option<GeolocationInfo> {
        if ip == UNKNOWN_IP {
            return None;
        }
        let Ok(addr) = ip.parse::<IpAddr>() else {
            debug!(ip, "skipping geolocation for unparseable address");
            return None;
        };

        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&addr).await {
                return Some(hit);
            }
        }

        let located =
            first_success("geolocation", &self.providers, self.timeout, |p| p.locate(addr)).await?;

        if let Some(cache) = &self.cache {
            cache.insert(addr, located.clone()).await;
        }

        Some(located)
    }
}
