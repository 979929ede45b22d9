//! Signup risk scoring
//!
//! Three storage-backed checks (accounts per IP, accounts per device and
//! signup velocity) plus a disposable-email check feed a weighted score.
//! The score maps to a [`RiskLevel`](crate::models::RiskLevel); anything
//! from medium upward is recorded as a [`FraudAlert`](crate::models::FraudAlert).

pub mod detector;
pub mod disposable;
pub mod signals;

pub use detector::{risk_level_of, FraudDetector, RiskAssessment, ALERT_THRESHOLD};
pub use disposable::is_disposable_email;
pub use signals::{AccountLimitCheck, FailurePolicy, RiskSignals, SignalPolicies, VelocityCheck};
