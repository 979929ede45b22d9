//! Independent risk checks over persisted session history
//!
//! Each check issues one query against the session store and reduces the
//! result to a bounded signal. A failing query is resolved according to the
//! check's [`FailurePolicy`]; by default the check reports "no signal" so a
//! storage outage never turns into a denial of service against signups.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::models::{DeviceFingerprint, UserSessionRecord, UNKNOWN_IP};
use crate::storage::{SessionQuery, Storage};

/// Distinct accounts per IP at which the IP signal fires
pub const MAX_ACCOUNTS_PER_IP: usize = 3;
/// Distinct accounts per device at which the device signal fires
pub const MAX_ACCOUNTS_PER_DEVICE: usize = 3;
/// Signups from one IP inside the window at which velocity fires
pub const MAX_SIGNUPS_PER_WINDOW: usize = 5;
pub const VELOCITY_WINDOW_HOURS: i64 = 24;

/// What a check reports when its history query fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Report no signal (count 0)
    #[default]
    Open,
    /// Report the signal as triggered (count 0)
    Closed,
}

/// Failure policy for each storage-backed check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignalPolicies {
    pub ip_limit: FailurePolicy,
    pub device_limit: FailurePolicy,
    pub velocity: FailurePolicy,
}

impl SignalPolicies {
    pub fn uniform(policy: FailurePolicy) -> Self {
        Self {
            ip_limit: policy,
            device_limit: policy,
            velocity: policy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccountLimitCheck {
    pub exceeded: bool,
    pub count: usize,
    /// Distinct user ids that already signed up, newest first
    pub accounts: Vec<String>,
}

impl AccountLimitCheck {
    fn on_failure(policy: FailurePolicy) -> Self {
        Self {
            exceeded: policy == FailurePolicy::Closed,
            count: 0,
            accounts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VelocityCheck {
    pub suspicious: bool,
    pub recent_count: usize,
}

impl VelocityCheck {
    fn on_failure(policy: FailurePolicy) -> Self {
        Self {
            suspicious: policy == FailurePolicy::Closed,
            recent_count: 0,
        }
    }
}

/// Storage-backed risk checks
#[derive(Clone)]
pub struct RiskSignals {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    policies: SignalPolicies,
}

impl RiskSignals {
    pub fn new(storage: Arc<dyn Storage>, clock: Arc<dyn Clock>, policies: SignalPolicies) -> Self {
        Self {
            storage,
            clock,
            policies,
        }
    }

    /// Distinct accounts that already signed up from `ip`
    pub async fn check_ip_account_limit(&self, ip: &str) -> AccountLimitCheck {
        if ip == UNKNOWN_IP {
            return AccountLimitCheck::default();
        }

        let query = SessionQuery::signups().with_ip(ip);
        match self.storage.query_sessions(&query).await {
            Ok(records) => {
                let accounts = distinct_users(&records);
                let count = accounts.len();
                debug!(ip, count, "IP account check");
                AccountLimitCheck {
                    exceeded: count >= MAX_ACCOUNTS_PER_IP,
                    count,
                    accounts,
                }
            }
            Err(e) => {
                warn!(ip, policy = ?self.policies.ip_limit, "IP account check failed: {}", e);
                AccountLimitCheck::on_failure(self.policies.ip_limit)
            }
        }
    }

    /// Distinct accounts that already signed up from the device
    pub async fn check_device_account_limit(
        &self,
        fingerprint: &DeviceFingerprint,
    ) -> AccountLimitCheck {
        let query = SessionQuery::signups().with_fingerprint(fingerprint.as_str());
        match self.storage.query_sessions(&query).await {
            Ok(records) => {
                let accounts = distinct_users(&records);
                let count = accounts.len();
                debug!(fingerprint = %fingerprint.truncated(), count, "device account check");
                AccountLimitCheck {
                    exceeded: count >= MAX_ACCOUNTS_PER_DEVICE,
                    count,
                    accounts,
                }
            }
            Err(e) => {
                warn!(
                    fingerprint = %fingerprint.truncated(),
                    policy = ?self.policies.device_limit,
                    "device account check failed: {}",
                    e
                );
                AccountLimitCheck::on_failure(self.policies.device_limit)
            }
        }
    }

    /// Signups from `ip` in the trailing 24 hours
    pub async fn check_velocity(&self, ip: &str) -> VelocityCheck {
        if ip == UNKNOWN_IP {
            return VelocityCheck::default();
        }

        let since = self.clock.now() - Duration::hours(VELOCITY_WINDOW_HOURS);
        let query = SessionQuery::signups().with_ip(ip).since(since);
        match self.storage.query_sessions(&query).await {
            Ok(records) => {
                let recent_count = records.len();
                debug!(ip, recent_count, "velocity check");
                VelocityCheck {
                    suspicious: recent_count >= MAX_SIGNUPS_PER_WINDOW,
                    recent_count,
                }
            }
            Err(e) => {
                warn!(ip, policy = ?self.policies.velocity, "velocity check failed: {}", e);
                VelocityCheck::on_failure(self.policies.velocity)
            }
        }
    }
}

fn distinct_users(records: &[UserSessionRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|r| seen.insert(r.user_id.as_str()))
        .map(|r| r.user_id.clone())
        .collect()
}
