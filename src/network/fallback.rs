//! Sequential "attempt with timeout, advance on failure" over provider lists

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Anything that can appear in a provider chain
pub trait NamedProvider {
    fn name(&self) -> &str;
}

/// Try each provider in order and return the first successful value.
///
/// Every attempt is bounded by `limit`. A timed-out attempt is dropped, which
/// abandons the in-flight request; its late response is never observed.
/// Errors and timeouts are logged and the next provider is tried. Returns
/// `None` only when every provider failed.
pub async fn first_success<'a, P, T, F, Fut>(
    kind: &str,
    providers: &'a [Arc<P>],
    limit: Duration,
    mut attempt: F,
) -> Option<T>
where
    P: NamedProvider + ?Sized,
    F: FnMut(&'a P) -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    for provider in providers {
        match tokio::time::timeout(limit, attempt(provider.as_ref())).await {
            Ok(Ok(value)) => {
                debug!(kind, provider = provider.name(), "lookup succeeded");
                return Some(value);
            }
            Ok(Err(e)) => {
                warn!(kind, provider = provider.name(), "lookup failed: {:#}", e);
            }
            Err(_) => {
                warn!(
                    kind,
                    provider = provider.name(),
                    timeout_ms = limit.as_millis() as u64,
                    "lookup timed out"
                );
            }
        }
    }

    warn!(kind, providers = providers.len(), "all providers failed");
    None
}
