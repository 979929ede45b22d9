//! Session logging with the signup block decision
//!
//! The block decision is computed in memory before anything is written.
//! Alert and session writes that fail are logged and swallowed; the only
//! error a caller ever sees is [`SessionError::SignupBlocked`].

use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::fraud::FraudDetector;
use crate::models::{ClientEnvironment, RiskLevel, SessionAction, UserSessionRecord};
use crate::session::aggregator::SessionInfoAggregator;
use crate::storage::Storage;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(
        "Account creation blocked due to suspicious activity: {reason}. \
         Please contact support if you believe this is an error."
    )]
    SignupBlocked { reason: String, risk_level: RiskLevel },
}

pub struct SessionLogger {
    aggregator: SessionInfoAggregator,
    detector: FraudDetector,
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
}

impl SessionLogger {
    pub fn new(
        aggregator: SessionInfoAggregator,
        detector: FraudDetector,
        storage: Arc<dyn Storage>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            aggregator,
            detector,
            storage,
            clock,
        }
    }

    /// Record a login or signup. Signups are scored first and refused when
    /// the risk level is high or critical.
    pub async fn log_user_session(
        &self,
        user_id: &str,
        email: &str,
        action: SessionAction,
        env: &ClientEnvironment,
    ) -> Result<(), SessionError> {
        let snapshot = self.aggregator.get_session_info(env).await;

        if action == SessionAction::Signup {
            if let Some(alert) = self
                .detector
                .evaluate(user_id, email, &snapshot.ip, &snapshot.fingerprint)
                .await
            {
                if let Err(e) = self.storage.insert_alert(&alert).await {
                    error!(user_id, "failed to persist fraud alert: {}", e);
                }

                if alert.risk_level.blocks_signup() {
                    warn!(
                        user_id,
                        risk_level = %alert.risk_level,
                        reason = %alert.reason,
                        "signup blocked"
                    );
                    return Err(SessionError::SignupBlocked {
                        reason: alert.reason,
                        risk_level: alert.risk_level,
                    });
                }

                warn!(
                    user_id,
                    risk_level = %alert.risk_level,
                    reason = %alert.reason,
                    "signup allowed with elevated risk"
                );
            }
        }

        let record =
            UserSessionRecord::from_snapshot(user_id, email, action, &snapshot, self.clock.now());
        match self.storage.insert_session(&record).await {
            Ok(()) => info!(user_id, action = %action, ip = %snapshot.ip, "session logged"),
            Err(e) => error!(user_id, action = %action, "failed to persist session: {}", e),
        }

        Ok(())
    }
}
