use serde::{Deserialize, Serialize};

/// Browser/runtime characteristics reported by the client at login or signup.
///
/// Every field has a default so a partial payload still yields a usable
/// fingerprint and device description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientEnvironment {
    pub user_agent: String,
    /// `"{width}x{height}"`
    pub screen_resolution: String,
    pub color_depth: u32,
    /// IANA timezone name, e.g. `Europe/Berlin`
    pub timezone: String,
    pub language: String,
    pub platform: String,
    /// Logical CPU count (`navigator.hardwareConcurrency`)
    pub hardware_concurrency: u32,
    pub max_touch_points: u32,
    /// Offset from UTC in minutes, as reported by the client
    pub timezone_offset: i32,
    /// Address the HTTP layer extracted for this caller, if any
    pub client_ip: Option<String>,
}

impl Default for ClientEnvironment {
    fn default() -> Self {
        Self {
            user_agent: "unknown".to_string(),
            screen_resolution: "unknown".to_string(),
            color_depth: 0,
            timezone: "unknown".to_string(),
            language: "unknown".to_string(),
            platform: "unknown".to_string(),
            hardware_concurrency: 0,
            max_touch_points: 0,
            timezone_offset: 0,
            client_ip: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_payload_uses_defaults() {
        let env: ClientEnvironment =
            serde_json::from_str(r#"{"user_agent": "Mozilla/5.0", "color_depth": 24}"#).unwrap();
        assert_eq!(env.user_agent, "Mozilla/5.0");
        assert_eq!(env.color_depth, 24);
        assert_eq!(env.timezone, "unknown");
        assert_eq!(env.hardware_concurrency, 0);
        assert!(env.client_ip.is_none());
    }
}
