use crate::models::{FraudAlert, SessionAction, UserSessionRecord};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("stored row is malformed: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        StorageError::Other(e.into())
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Filter over the `user_sessions` collection.
///
/// Equality filters are combined with AND; `since` is an inclusive lower
/// bound on `created_at`. Results come back newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionQuery {
    pub action: Option<SessionAction>,
    pub ip: Option<String>,
    pub device_fingerprint: Option<String>,
    pub user_id: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

impl SessionQuery {
    pub fn signups() -> Self {
        Self {
            action: Some(SessionAction::Signup),
            ..Default::default()
        }
    }

    pub fn with_ip(mut self, ip: &str) -> Self {
        self.ip = Some(ip.to_string());
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: &str) -> Self {
        self.device_fingerprint = Some(fingerprint.to_string());
        self
    }

    pub fn with_user(mut self, user_id: &str) -> Self {
        self.user_id = Some(user_id.to_string());
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Append-only store for session history and fraud alerts
#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables and indexes)
    async fn init(&self) -> Result<()>;

    /// Append one login/signup record
    async fn insert_session(&self, record: &UserSessionRecord) -> StorageResult<()>;

    /// Append one fraud alert
    async fn insert_alert(&self, alert: &FraudAlert) -> StorageResult<()>;

    /// Fetch session records matching every filter in `query`
    async fn query_sessions(&self, query: &SessionQuery) -> StorageResult<Vec<UserSessionRecord>>;

    /// Most recent alerts, optionally restricted to one user
    async fn list_alerts(&self, limit: i64, user_id: Option<&str>)
        -> StorageResult<Vec<FraudAlert>>;
}
