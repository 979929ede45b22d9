//! Best-effort network lookups: client IP and geolocation
//!
//! Nothing in this module returns an error to its caller. Each lookup walks
//! an ordered provider chain with a per-attempt timeout and degrades to the
//! `"unknown"` address or to no geolocation at all.

pub mod fallback;
pub mod geo;
pub mod geoip;
pub mod ip;
pub mod ip_extractor;

pub use fallback::{first_success, NamedProvider};
pub use geo::{GeoFormat, GeoProvider, GeoResolver, HttpGeoProvider, DEFAULT_GEO_TIMEOUT};
pub use geoip::MaxMindGeoProvider;
pub use ip::{ForwardedIpProvider, HttpIpProvider, IpProvider, IpResolver, DEFAULT_IP_TIMEOUT};
pub use ip_extractor::extract_client_ip;
