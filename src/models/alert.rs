//! Fraud alert data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Risk level classification, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Map a raw score to a level, checking the highest threshold first
    pub fn from_score(score: u32) -> Self {
        if score >= 80 {
            RiskLevel::Critical
        } else if score >= 60 {
            RiskLevel::High
        } else if score >= 30 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    /// High and critical signups are refused
    pub fn blocks_signup(&self) -> bool {
        matches!(self, RiskLevel::High | RiskLevel::Critical)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            "critical" => Ok(RiskLevel::Critical),
            other => Err(anyhow::anyhow!("unknown risk level '{other}'")),
        }
    }
}

/// Per-signal evidence attached to an alert
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AlertDetails {
    /// Accounts already created from the same IP (only when that signal fired)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_accounts: Option<Vec<String>>,
    /// Accounts already created from the same device (only when that signal fired)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_accounts: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity_count: Option<u32>,
    #[serde(default)]
    pub disposable_email: bool,
    pub risk_score: u32,
    pub ip: String,
    /// Truncated fingerprint, never the full digest
    pub fingerprint: String,
}

/// Audit record written whenever a signup scores 30 or more
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudAlert {
    pub user_id: String,
    pub email: String,
    pub risk_level: RiskLevel,
    /// Triggered signal descriptions joined with `"; "`
    pub reason: String,
    pub details: AlertDetails,
    pub created_at: DateTime<Utc>,
}
