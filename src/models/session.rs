use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sentinel stored in place of an address when every IP lookup failed
pub const UNKNOWN_IP: &str = "unknown";

const UNKNOWN_FIELD: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionAction {
    Login,
    Signup,
}

impl SessionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionAction::Login => "login",
            SessionAction::Signup => "signup",
        }
    }
}

impl fmt::Display for SessionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionAction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "login" => Ok(SessionAction::Login),
            "signup" => Ok(SessionAction::Signup),
            other => Err(anyhow::anyhow!("unknown session action '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceType {
    Desktop,
    Mobile,
    Tablet,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Desktop => "Desktop",
            DeviceType::Mobile => "Mobile",
            DeviceType::Tablet => "Tablet",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Desktop" => Ok(DeviceType::Desktop),
            "Mobile" => Ok(DeviceType::Mobile),
            "Tablet" => Ok(DeviceType::Tablet),
            other => Err(anyhow::anyhow!("unknown device type '{other}'")),
        }
    }
}

/// Device description derived from the client environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub browser: String,
    pub browser_version: String,
    pub os: String,
    pub os_version: String,
    pub device_type: DeviceType,
    pub screen_resolution: String,
    pub color_depth: u32,
    pub language: String,
    pub platform: String,
    pub user_agent: String,
    pub cpu_cores: u32,
}

/// Lowercase hex digest identifying a browser/device configuration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceFingerprint(String);

impl DeviceFingerprint {
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 16 hex characters followed by `...`; the only form that is
    /// ever logged or written into alert details.
    pub fn truncated(&self) -> String {
        let prefix: String = self.0.chars().take(16).collect();
        format!("{prefix}...")
    }
}

impl fmt::Display for DeviceFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Geographic location information derived from an IP address
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GeolocationInfo {
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub timezone: Option<String>,
    /// ISP or organization name
    pub isp: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Point-in-time view of one login/signup attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Dotted-quad (or IPv6) address, or [`UNKNOWN_IP`]
    pub ip: String,
    pub geolocation: Option<GeolocationInfo>,
    pub device: DeviceInfo,
    pub fingerprint: DeviceFingerprint,
    pub timestamp: DateTime<Utc>,
}

impl SessionSnapshot {
    pub fn has_known_ip(&self) -> bool {
        self.ip != UNKNOWN_IP
    }
}

/// Persisted row describing one login or signup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSessionRecord {
    pub user_id: String,
    pub email: String,
    pub action: SessionAction,
    pub is_active: bool,
    pub ip: String,
    pub country: String,
    pub region: String,
    pub city: String,
    pub timezone: String,
    pub isp: String,
    pub latitude: f64,
    pub longitude: f64,
    pub browser: String,
    pub browser_version: String,
    pub os: String,
    pub os_version: String,
    pub device_type: DeviceType,
    pub screen_resolution: String,
    pub device_fingerprint: String,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
}

impl UserSessionRecord {
    /// Flatten a snapshot into a storable record. Missing geolocation
    /// fields become `"Unknown"` / `0.0`.
    pub fn from_snapshot(
        user_id: &str,
        email: &str,
        action: SessionAction,
        snapshot: &SessionSnapshot,
        created_at: DateTime<Utc>,
    ) -> Self {
        let geo = snapshot.geolocation.clone().unwrap_or_default();
        let or_unknown = |v: Option<String>| v.unwrap_or_else(|| UNKNOWN_FIELD.to_string());

        Self {
            user_id: user_id.to_string(),
            email: email.to_string(),
            action,
            is_active: true,
            ip: snapshot.ip.clone(),
            country: or_unknown(geo.country),
            region: or_unknown(geo.region),
            city: or_unknown(geo.city),
            timezone: or_unknown(geo.timezone),
            isp: or_unknown(geo.isp),
            latitude: geo.latitude.unwrap_or(0.0),
            longitude: geo.longitude.unwrap_or(0.0),
            browser: snapshot.device.browser.clone(),
            browser_version: snapshot.device.browser_version.clone(),
            os: snapshot.device.os.clone(),
            os_version: snapshot.device.os_version.clone(),
            device_type: snapshot.device.device_type,
            screen_resolution: snapshot.device.screen_resolution.clone(),
            device_fingerprint: snapshot.fingerprint.as_str().to_string(),
            user_agent: snapshot.device.user_agent.clone(),
            created_at,
        }
    }
}
