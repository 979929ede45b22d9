//! Row shapes shared by the SQL backends

use chrono::{DateTime, TimeZone, Utc};
use sqlx::FromRow;

use crate::models::{AlertDetails, FraudAlert, UserSessionRecord};
use crate::storage::StorageError;

pub(crate) const SESSION_COLUMNS: &str = "user_id, email, action, is_active, ip, country, region, \
     city, timezone, isp, latitude, longitude, browser, browser_version, os, os_version, \
     device_type, screen_resolution, device_fingerprint, user_agent, created_at";

pub(crate) const ALERT_COLUMNS: &str = "user_id, email, risk_level, reason, details, created_at";

#[derive(Debug, FromRow)]
pub(crate) struct SessionRow {
    pub user_id: String,
    pub email: String,
    pub action: String,
    pub is_active: bool,
    pub ip: String,
    pub country: String,
    pub region: String,
    pub city: String,
    pub timezone: String,
    pub isp: String,
    pub latitude: f64,
    pub longitude: f64,
    pub browser: String,
    pub browser_version: String,
    pub os: String,
    pub os_version: String,
    pub device_type: String,
    pub screen_resolution: String,
    pub device_fingerprint: String,
    pub user_agent: String,
    pub created_at: i64,
}

#[derive(Debug, FromRow)]
pub(crate) struct AlertRow {
    pub user_id: String,
    pub email: String,
    pub risk_level: String,
    pub reason: String,
    pub details: String,
    pub created_at: i64,
}

pub(crate) fn from_millis(millis: i64) -> Result<DateTime<Utc>, StorageError> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| StorageError::Corrupt(format!("timestamp {millis} out of range")))
}

impl TryFrom<SessionRow> for UserSessionRecord {
    type Error = StorageError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            action: row
                .action
                .parse()
                .map_err(|e: anyhow::Error| StorageError::Corrupt(e.to_string()))?,
            device_type: row
                .device_type
                .parse()
                .map_err(|e: anyhow::Error| StorageError::Corrupt(e.to_string()))?,
            created_at: from_millis(row.created_at)?,
            user_id: row.user_id,
            email: row.email,
            is_active: row.is_active,
            ip: row.ip,
            country: row.country,
            region: row.region,
            city: row.city,
            timezone: row.timezone,
            isp: row.isp,
            latitude: row.latitude,
            longitude: row.longitude,
            browser: row.browser,
            browser_version: row.browser_version,
            os: row.os,
            os_version: row.os_version,
            screen_resolution: row.screen_resolution,
            device_fingerprint: row.device_fingerprint,
            user_agent: row.user_agent,
        })
    }
}

impl TryFrom<AlertRow> for FraudAlert {
    type Error = StorageError;

    fn try_from(row: AlertRow) -> Result<Self, Self::Error> {
        let details: AlertDetails = serde_json::from_str(&row.details)
            .map_err(|e| StorageError::Corrupt(format!("alert details: {e}")))?;

        Ok(Self {
            risk_level: row
                .risk_level
                .parse()
                .map_err(|e: anyhow::Error| StorageError::Corrupt(e.to_string()))?,
            created_at: from_millis(row.created_at)?,
            user_id: row.user_id,
            email: row.email,
            reason: row.reason,
            details,
        })
    }
}

pub(crate) fn encode_details(alert: &FraudAlert) -> Result<String, StorageError> {
    serde_json::to_string(&alert.details).map_err(|e| StorageError::Other(e.into()))
}
