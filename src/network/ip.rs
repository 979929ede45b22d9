//! Client IP resolution through an ordered chain of lookup providers

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::models::{ClientEnvironment, UNKNOWN_IP};
use crate::network::fallback::{first_success, NamedProvider};

pub const DEFAULT_IP_TIMEOUT: Duration = Duration::from_secs(3);

#[async_trait]
pub trait IpProvider: NamedProvider + Send + Sync {
    /// Public address of the client described by `env`
    async fn lookup(&self, env: &ClientEnvironment) -> Result<IpAddr>;
}

/// Uses the address the HTTP layer already extracted from the request
#[derive(Debug, Default)]
pub struct ForwardedIpProvider;

impl NamedProvider for ForwardedIpProvider {
    fn name(&self) -> &str {
        "forwarded"
    }
}

#[async_trait]
impl IpProvider for ForwardedIpProvider {
    async fn lookup(&self, env: &ClientEnvironment) -> Result<IpAddr> {
        let raw = env
            .client_ip
            .as_deref()
            .ok_or_else(|| anyhow!("no client address on the request"))?;
        raw.trim()
            .parse()
            .with_context(|| format!("invalid client address '{raw}'"))
    }
}

/// JSON "what is my IP" endpoint, e.g. `https://api.ipify.org?format=json`.
///
/// The address is read from `field`, a dot-separated path into the
/// response body (`ip`, `data.ip`, ...).
pub struct HttpIpProvider {
    client: Client,
    url: String,
    field: Vec<String>,
}

impl HttpIpProvider {
    pub fn new(client: Client, url: impl Into<String>, field: &str) -> Self {
        Self {
            client,
            url: url.into(),
            field: field.split('.').map(str::to_string).collect(),
        }
    }

    /// Parse `url` or `url|field.path`; the field defaults to `ip`
    pub fn from_spec(client: Client, spec: &str) -> Self {
        match spec.split_once('|') {
            Some((url, field)) => Self::new(client, url.trim(), field.trim()),
            None => Self::new(client, spec.trim(), "ip"),
        }
    }
}

impl NamedProvider for HttpIpProvider {
    fn name(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl IpProvider for HttpIpProvider {
    async fn lookup(&self, _env: &ClientEnvironment) -> Result<IpAddr> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .context("request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("unexpected status {status}");
        }

        let body: Value = response.json().await.context("malformed JSON body")?;
        extract_ip(&body, &self.field)
    }
}

fn extract_ip(body: &Value, field: &[String]) -> Result<IpAddr> {
    let value = field
        .iter()
        .try_fold(body, |node, key| node.get(key))
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("response has no '{}' field", field.join(".")))?;

    value
        .trim()
        .parse()
        .with_context(|| format!("'{value}' is not an IP address"))
}

/// Ordered IP lookup chain that never fails
#[derive(Clone)]
pub struct IpResolver {
    providers: Vec<Arc<dyn IpProvider>>,
    timeout: Duration,
}

impl IpResolver {
    pub fn new(providers: Vec<Arc<dyn IpProvider>>, timeout: Duration) -> Self {
        Self { providers, timeout }
    }

    /// Resolved address as a string, or [`UNKNOWN_IP`] when every provider failed
    pub async fn resolve_client_ip(&self, env: &ClientEnvironment) -> String {
        first_success("ip", &self.providers, self.timeout, |p| p.lookup(env))
            .await
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| UNKNOWN_IP.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Scripted {
        name: &'static str,
        answer: Option<&'static str>,
        delay: Duration,
    }

    impl NamedProvider for Scripted {
        fn name(&self) -> &str {
            self.name
        }
    }

    #[async_trait]
    impl IpProvider for Scripted {
        async fn lookup(&self, _env: &ClientEnvironment) -> Result<IpAddr> {
            tokio::time::sleep(self.delay).await;
            match self.answer {
                Some(ip) => Ok(ip.parse()?),
                None => bail!("provider down"),
            }
        }
    }

    fn scripted(name: &'static str, answer: Option<&'static str>, delay_secs: u64) -> Arc<dyn IpProvider> {
        Arc::new(Scripted {
            name,
            answer,
            delay: Duration::from_secs(delay_secs),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_third_provider_wins_after_timeout_and_error() {
        let resolver = IpResolver::new(
            vec![
                scripted("slow", Some("192.0.2.1"), 60),
                scripted("down", None, 0),
                scripted("good", Some("198.51.100.23"), 0),
            ],
            DEFAULT_IP_TIMEOUT,
        );

        let ip = resolver.resolve_client_ip(&ClientEnvironment::default()).await;
        assert_eq!(ip, "198.51.100.23");
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_failing_returns_unknown() {
        let resolver = IpResolver::new(
            vec![scripted("slow", Some("192.0.2.1"), 60), scripted("down", None, 0)],
            DEFAULT_IP_TIMEOUT,
        );

        let ip = resolver.resolve_client_ip(&ClientEnvironment::default()).await;
        assert_eq!(ip, UNKNOWN_IP);
    }

    #[tokio::test]
    async fn test_forwarded_provider_uses_request_address() {
        let env = ClientEnvironment {
            client_ip: Some("203.0.113.7".to_string()),
            ..Default::default()
        };
        let ip = ForwardedIpProvider.lookup(&env).await.unwrap();
        assert_eq!(ip.to_string(), "203.0.113.7");

        assert!(ForwardedIpProvider
            .lookup(&ClientEnvironment::default())
            .await
            .is_err());
    }

    #[test]
    fn test_extract_nested_field() {
        let field = vec!["data".to_string(), "ip".to_string()];
        let ip = extract_ip(&json!({"data": {"ip": "2001:db8::1"}}), &field).unwrap();
        assert_eq!(ip, "2001:db8::1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_extract_rejects_garbage() {
        let field = vec!["ip".to_string()];
        assert!(extract_ip(&json!({"ip": "not-an-ip"}), &field).is_err());
        assert!(extract_ip(&json!({"address": "192.0.2.1"}), &field).is_err());
    }

    #[test]
    fn test_spec_parsing() {
        let provider = HttpIpProvider::from_spec(Client::new(), "https://example.test/me|data.ip");
        assert_eq!(provider.url, "https://example.test/me");
        assert_eq!(provider.field, vec!["data", "ip"]);

        let provider = HttpIpProvider::from_spec(Client::new(), "https://example.test/me");
        assert_eq!(provider.field, vec!["ip"]);
    }
}
