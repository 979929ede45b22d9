//! Local geolocation using MaxMind GeoLite2/GeoIP2 MMDB files
//!
//! Useful as the last link in a geolocation chain: it needs no network and
//! answers instantly, though its data is only as fresh as the database file.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use maxminddb::{geoip2, Mmap, Reader};
use std::net::IpAddr;
use std::sync::Arc;

use crate::models::GeolocationInfo;
use crate::network::fallback::NamedProvider;
use crate::network::geo::GeoProvider;

/// Geolocation provider backed by memory-mapped City and ASN databases
#[derive(Clone)]
pub struct MaxMindGeoProvider {
    city_reader: Option<Arc<Reader<Mmap>>>,
    asn_reader: Option<Arc<Reader<Mmap>>>,
}

impl MaxMindGeoProvider {
    /// Open the databases at the given paths
    ///
    /// # Arguments
    /// * `city_path` - Optional path to a GeoLite2-City or GeoIP2-City .mmdb file
    /// * `asn_path` - Optional path to a GeoLite2-ASN .mmdb file
    pub fn new(city_path: Option<&str>, asn_path: Option<&str>) -> Result<Self> {
        let city_reader = if let Some(path) = city_path {
            let reader = unsafe { Reader::open_mmap(path) }
                .with_context(|| format!("Failed to open GeoIP City database at {}", path))?;
            Some(Arc::new(reader))
        } else {
            None
        };

        let asn_reader = if let Some(path) = asn_path {
            let reader = unsafe { Reader::open_mmap(path) }
                .with_context(|| format!("Failed to open GeoIP ASN database at {}", path))?;
            Some(Arc::new(reader))
        } else {
            None
        };

        Ok(Self {
            city_reader,
            asn_reader,
        })
    }

    /// Look up `ip`; `None` when neither database knows the address
    pub fn lookup(&self, ip: IpAddr) -> Option<GeolocationInfo> {
        let mut geo = GeolocationInfo::default();
        let mut found = false;

        if let Some(ref reader) = self.city_reader {
            if let Ok(result) = reader.lookup(ip) {
                if let Ok(Some(city)) = result.decode::<geoip2::City>() {
                    extract_from_city(&city, &mut geo);
                    found = true;
                } else if let Ok(Some(country)) = result.decode::<geoip2::Country>() {
                    // City databases are a superset of Country data
                    geo.country = country
                        .country
                        .names
                        .english
                        .or(country.country.iso_code)
                        .map(|s| s.to_string());
                    found = true;
                }
            }
        }

        if let Some(ref reader) = self.asn_reader {
            if let Ok(result) = reader.lookup(ip) {
                if let Ok(Some(asn)) = result.decode::<geoip2::Asn>() {
                    geo.isp = asn.autonomous_system_organization.map(|s| s.to_string());
                    found = found || geo.isp.is_some();
                }
            }
        }

        found.then_some(geo)
    }
}

fn extract_from_city(city: &geoip2::City, geo: &mut GeolocationInfo) {
    geo.country = city
        .country
        .names
        .english
        .or(city.country.iso_code)
        .map(|s| s.to_string());

    if let Some(subdivision) = city.subdivisions.first() {
        geo.region = subdivision.names.english.map(|s| s.to_string());
    }

    geo.city = city.city.names.english.map(|s| s.to_string());
    geo.timezone = city.location.time_zone.map(|s| s.to_string());
    geo.latitude = city.location.latitude;
    geo.longitude = city.location.longitude;
}

impl NamedProvider for MaxMindGeoProvider {
    fn name(&self) -> &str {
        "maxmind"
    }
}

#[async_trait]
impl GeoProvider for MaxMindGeoProvider {
    async fn locate(&self, ip: IpAddr) -> Result<GeolocationInfo> {
        self.lookup(ip)
            .ok_or_else(|| anyhow!("{ip} not present in local GeoIP databases"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creation_invalid_path() {
        let result = MaxMindGeoProvider::new(Some("/nonexistent/path.mmdb"), None);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_without_databases_nothing_resolves() {
        let provider = MaxMindGeoProvider::new(None, None).unwrap();
        let ip: IpAddr = "8.8.8.8".parse().unwrap();
        assert!(provider.lookup(ip).is_none());
        assert!(provider.locate(ip).await.is_err());
    }
}
