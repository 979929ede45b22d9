use std::sync::Arc;
use tracing::{debug, error};

use crate::clock::Clock;
use crate::models::{
    ClientEnvironment, DeviceInfo, GeolocationInfo, SessionSnapshot, UNKNOWN_IP,
};
use crate::network::{GeoResolver, IpResolver};
use crate::session::fingerprint::Fingerprinter;

/// Builds the [`SessionSnapshot`] for one login/signup attempt
#[derive(Clone)]
pub struct SessionInfoAggregator {
    fingerprinter: Fingerprinter,
    ip_resolver: IpResolver,
    geo_resolver: GeoResolver,
    clock: Arc<dyn Clock>,
}

impl SessionInfoAggregator {
    pub fn new(
        fingerprinter: Fingerprinter,
        ip_resolver: IpResolver,
        geo_resolver: GeoResolver,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            fingerprinter,
            ip_resolver,
            geo_resolver,
            clock,
        }
    }

    /// Always returns a snapshot.
    ///
    /// Device data and the fingerprint are computed first and cannot fail.
    /// The network stage runs on its own task; if it dies the snapshot
    /// carries the unknown address and no geolocation.
    pub async fn get_session_info(&self, env: &ClientEnvironment) -> SessionSnapshot {
        let device = DeviceInfo::from_environment(env);
        let fingerprint = self.fingerprinter.generate(env);

        let (ip, geolocation) = match tokio::spawn(resolve_network(
            self.ip_resolver.clone(),
            self.geo_resolver.clone(),
            env.clone(),
        ))
        .await
        {
            Ok(resolved) => resolved,
            Err(e) => {
                error!("network lookup for session aborted: {}", e);
                (UNKNOWN_IP.to_string(), None)
            }
        };

        debug!(ip = %ip, fingerprint = %fingerprint.truncated(), "session snapshot built");

        SessionSnapshot {
            ip,
            geolocation,
            device,
            fingerprint,
            timestamp: self.clock.now(),
        }
    }
}

async fn resolve_network(
    ip_resolver: IpResolver,
    geo_resolver: GeoResolver,
    env: ClientEnvironment,
) -> (String, Option<GeolocationInfo>) {
    let ip = ip_resolver.resolve_client_ip(&env).await;
    if ip == UNKNOWN_IP {
        return (ip, None);
    }

    let geolocation = geo_resolver.resolve_geolocation(&ip).await;
    (ip, geolocation)
}
