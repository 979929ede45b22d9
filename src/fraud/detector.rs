//! Weighted combination of risk signals into a score, level and alert

use std::sync::Arc;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::fraud::disposable::is_disposable_email;
use crate::fraud::signals::{AccountLimitCheck, RiskSignals, VelocityCheck};
use crate::models::{AlertDetails, DeviceFingerprint, FraudAlert, RiskLevel};

pub const IP_LIMIT_WEIGHT: u32 = 40;
pub const DEVICE_LIMIT_WEIGHT: u32 = 40;
pub const VELOCITY_WEIGHT: u32 = 30;
pub const DISPOSABLE_EMAIL_WEIGHT: u32 = 20;

/// Scores below this never produce an alert
pub const ALERT_THRESHOLD: u32 = 30;

pub fn risk_level_of(score: u32) -> RiskLevel {
    RiskLevel::from_score(score)
}

/// Outcome of scoring one signup attempt, whether or not it alerts
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    /// Uncapped sum of triggered weights (0..=130)
    pub score: u32,
    pub risk_level: RiskLevel,
    /// Triggered signal descriptions in IP, device, velocity, email order
    pub reasons: Vec<String>,
    pub details: AlertDetails,
}

impl RiskAssessment {
    pub fn reason(&self) -> String {
        self.reasons.join("; ")
    }

    pub fn warrants_alert(&self) -> bool {
        self.score >= ALERT_THRESHOLD
    }
}

pub struct FraudDetector {
    signals: RiskSignals,
    clock: Arc<dyn Clock>,
}

impl FraudDetector {
    pub fn new(signals: RiskSignals, clock: Arc<dyn Clock>) -> Self {
        Self { signals, clock }
    }

    /// Run every check concurrently and combine the results
    pub async fn assess(&self, email: &str, ip: &str, fingerprint: &DeviceFingerprint) -> RiskAssessment {
        let (ip_check, device_check, velocity_check) = tokio::join!(
            self.signals.check_ip_account_limit(ip),
            self.signals.check_device_account_limit(fingerprint),
            self.signals.check_velocity(ip),
        );
        let disposable = is_disposable_email(email);

        combine(ip_check, device_check, velocity_check, disposable, ip, fingerprint)
    }

    /// Score a signup; `None` when the score stays below the alert threshold
    pub async fn evaluate(
        &self,
        user_id: &str,
        email: &str,
        ip: &str,
        fingerprint: &DeviceFingerprint,
    ) -> Option<FraudAlert> {
        let assessment = self.assess(email, ip, fingerprint).await;
        if !assessment.warrants_alert() {
            debug!(user_id, score = assessment.score, "signup below alert threshold");
            return None;
        }

        info!(
            user_id,
            score = assessment.score,
            risk_level = %assessment.risk_level,
            "fraud alert raised"
        );

        Some(FraudAlert {
            user_id: user_id.to_string(),
            email: email.to_string(),
            risk_level: assessment.risk_level,
            reason: assessment.reason(),
            details: assessment.details,
            created_at: self.clock.now(),
        })
    }
}

fn combine(
    ip_check: AccountLimitCheck,
    device_check: AccountLimitCheck,
    velocity_check: VelocityCheck,
    disposable: bool,
    ip: &str,
    fingerprint: &DeviceFingerprint,
) -> RiskAssessment {
    let mut score = 0;
    let mut reasons = Vec::new();
    let mut details = AlertDetails {
        ip: ip.to_string(),
        fingerprint: fingerprint.truncated(),
        ..Default::default()
    };

    if ip_check.exceeded {
        score += IP_LIMIT_WEIGHT;
        reasons.push(format!(
            "Too many accounts from this IP address ({} existing accounts)",
            ip_check.count
        ));
        details.ip_accounts = Some(ip_check.accounts);
    }

    if device_check.exceeded {
        score += DEVICE_LIMIT_WEIGHT;
        reasons.push(format!(
            "Too many accounts from this device ({} existing accounts)",
            device_check.count
        ));
        details.device_accounts = Some(device_check.accounts);
    }

    if velocity_check.suspicious {
        score += VELOCITY_WEIGHT;
        reasons.push(format!(
            "Suspicious signup velocity ({} signups in the last 24 hours)",
            velocity_check.recent_count
        ));
        details.velocity_count = Some(velocity_check.recent_count as u32);
    }

    if disposable {
        score += DISPOSABLE_EMAIL_WEIGHT;
        reasons.push("Disposable email address detected".to_string());
        details.disposable_email = true;
    }

    details.risk_score = score;

    RiskAssessment {
        score,
        risk_level: risk_level_of(score),
        reasons,
        details,
    }
}
