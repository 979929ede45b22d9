//! Device description from the reported environment and user agent

use crate::models::{ClientEnvironment, DeviceInfo, DeviceType};

const UNKNOWN: &str = "Unknown";

impl DeviceInfo {
    pub fn from_environment(env: &ClientEnvironment) -> Self {
        let ua = env.user_agent.as_str();
        let (browser, browser_version) = detect_browser(ua);
        let (os, os_version) = detect_os(ua);

        Self {
            browser: browser.to_string(),
            browser_version,
            os: os.to_string(),
            os_version,
            device_type: detect_device_type(ua),
            screen_resolution: env.screen_resolution.clone(),
            color_depth: env.color_depth,
            language: env.language.clone(),
            platform: env.platform.clone(),
            user_agent: env.user_agent.clone(),
            cpu_cores: env.hardware_concurrency,
        }
    }
}

/// Dotted version number immediately following `token`
fn version_after(ua: &str, token: &str) -> Option<String> {
    let start = ua.find(token)? + token.len();
    let version: String = ua[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '_')
        .map(|c| if c == '_' { '.' } else { c })
        .collect();
    let version = version.trim_end_matches('.').to_string();
    (!version.is_empty()).then_some(version)
}

fn detect_browser(ua: &str) -> (&'static str, String) {
    // Order matters: Edge and Opera also advertise Chrome, Chrome advertises Safari
    let (name, token) = if ua.contains("Edg/") {
        ("Edge", "Edg/")
    } else if ua.contains("OPR/") {
        ("Opera", "OPR/")
    } else if ua.contains("Chrome/") {
        ("Chrome", "Chrome/")
    } else if ua.contains("Firefox/") {
        ("Firefox", "Firefox/")
    } else if ua.contains("Safari/") {
        ("Safari", "Version/")
    } else {
        return (UNKNOWN, UNKNOWN.to_string());
    };

    let version = version_after(ua, token).unwrap_or_else(|| UNKNOWN.to_string());
    (name, version)
}

fn detect_os(ua: &str) -> (&'static str, String) {
    if let Some(nt) = version_after(ua, "Windows NT ") {
        let version = match nt.as_str() {
            "10.0" => "10".to_string(),
            "6.3" => "8.1".to_string(),
            "6.2" => "8".to_string(),
            "6.1" => "7".to_string(),
            _ => nt,
        };
        return ("Windows", version);
    }
    if ua.contains("Windows") {
        return ("Windows", UNKNOWN.to_string());
    }
    // iOS user agents also contain "like Mac OS X"
    if ua.contains("iPhone") || ua.contains("iPad") || ua.contains("iPod") {
        let version = version_after(ua, " OS ").unwrap_or_else(|| UNKNOWN.to_string());
        return ("iOS", version);
    }
    if ua.contains("Mac OS X") {
        let version = version_after(ua, "Mac OS X ").unwrap_or_else(|| UNKNOWN.to_string());
        return ("macOS", version);
    }
    if ua.contains("Android") {
        let version = version_after(ua, "Android ").unwrap_or_else(|| UNKNOWN.to_string());
        return ("Android", version);
    }
    if ua.contains("Linux") {
        return ("Linux", UNKNOWN.to_string());
    }
    (UNKNOWN, UNKNOWN.to_string())
}

fn detect_device_type(ua: &str) -> DeviceType {
    let lower = ua.to_lowercase();
    let android = lower.contains("android");

    if lower.contains("ipad") || lower.contains("tablet") || (android && !lower.contains("mobile")) {
        DeviceType::Tablet
    } else if lower.contains("mobi") || lower.contains("iphone") || lower.contains("ipod") || android {
        DeviceType::Mobile
    } else {
        DeviceType::Desktop
    }
}
