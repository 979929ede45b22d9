use crate::models::{FraudAlert, UserSessionRecord};
use crate::storage::rows::{encode_details, AlertRow, SessionRow, ALERT_COLUMNS, SESSION_COLUMNS};
use crate::storage::{SessionQuery, Storage, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::sync::Arc;

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                email TEXT NOT NULL,
                action TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                ip TEXT NOT NULL,
                country TEXT NOT NULL,
                region TEXT NOT NULL,
                city TEXT NOT NULL,
                timezone TEXT NOT NULL,
                isp TEXT NOT NULL,
                latitude REAL NOT NULL DEFAULT 0,
                longitude REAL NOT NULL DEFAULT 0,
                browser TEXT NOT NULL,
                browser_version TEXT NOT NULL,
                os TEXT NOT NULL,
                os_version TEXT NOT NULL,
                device_type TEXT NOT NULL,
                screen_resolution TEXT NOT NULL,
                device_fingerprint TEXT NOT NULL,
                user_agent TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_ip ON user_sessions(action, ip)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_sessions_fingerprint ON user_sessions(action, device_fingerprint)",
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_user ON user_sessions(user_id)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS fraud_alerts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                email TEXT NOT NULL,
                risk_level TEXT NOT NULL,
                reason TEXT NOT NULL,
                details TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_alerts_user ON fraud_alerts(user_id)")
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn insert_session(&self, record: &UserSessionRecord) -> StorageResult<()> {
        sqlx::query(&format!(
            "INSERT INTO user_sessions ({SESSION_COLUMNS}) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(&record.user_id)
        .bind(&record.email)
        .bind(record.action.as_str())
        .bind(record.is_active)
        .bind(&record.ip)
        .bind(&record.country)
        .bind(&record.region)
        .bind(&record.city)
        .bind(&record.timezone)
        .bind(&record.isp)
        .bind(record.latitude)
        .bind(record.longitude)
        .bind(&record.browser)
        .bind(&record.browser_version)
        .bind(&record.os)
        .bind(&record.os_version)
        .bind(record.device_type.as_str())
        .bind(&record.screen_resolution)
        .bind(&record.device_fingerprint)
        .bind(&record.user_agent)
        .bind(record.created_at.timestamp_millis())
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn insert_alert(&self, alert: &FraudAlert) -> StorageResult<()> {
        let details = encode_details(alert)?;

        sqlx::query(&format!(
            "INSERT INTO fraud_alerts ({ALERT_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?)"
        ))
        .bind(&alert.user_id)
        .bind(&alert.email)
        .bind(alert.risk_level.as_str())
        .bind(&alert.reason)
        .bind(details)
        .bind(alert.created_at.timestamp_millis())
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn query_sessions(&self, query: &SessionQuery) -> StorageResult<Vec<UserSessionRecord>> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {SESSION_COLUMNS} FROM user_sessions WHERE 1 = 1"));

        if let Some(action) = query.action {
            builder.push(" AND action = ").push_bind(action.as_str());
        }
        if let Some(ip) = &query.ip {
            builder.push(" AND ip = ").push_bind(ip.clone());
        }
        if let Some(fingerprint) = &query.device_fingerprint {
            builder
                .push(" AND device_fingerprint = ")
                .push_bind(fingerprint.clone());
        }
        if let Some(user_id) = &query.user_id {
            builder.push(" AND user_id = ").push_bind(user_id.clone());
        }
        if let Some(since) = query.since {
            builder
                .push(" AND created_at >= ")
                .push_bind(since.timestamp_millis());
        }
        builder.push(" ORDER BY created_at DESC, id DESC");
        if let Some(limit) = query.limit {
            builder.push(" LIMIT ").push_bind(limit);
        }

        let rows = builder
            .build_query_as::<SessionRow>()
            .fetch_all(self.pool.as_ref())
            .await?;

        rows.into_iter().map(UserSessionRecord::try_from).collect()
    }

    async fn list_alerts(
        &self,
        limit: i64,
        user_id: Option<&str>,
    ) -> StorageResult<Vec<FraudAlert>> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {ALERT_COLUMNS} FROM fraud_alerts"));

        if let Some(user_id) = user_id {
            builder.push(" WHERE user_id = ").push_bind(user_id.to_string());
        }
        builder
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(limit);

        let rows = builder
            .build_query_as::<AlertRow>()
            .fetch_all(self.pool.as_ref())
            .await?;

        rows.into_iter().map(FraudAlert::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertDetails, DeviceType, RiskLevel, SessionAction};
    use chrono::{Duration, Utc};

    async fn setup() -> SqliteStorage {
        // A single connection keeps every query on the same in-memory database
        let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
        storage.init().await.unwrap();
        storage
    }

    fn record(user_id: &str, action: SessionAction, ip: &str, minutes_ago: i64) -> UserSessionRecord {
        UserSessionRecord {
            user_id: user_id.to_string(),
            email: format!("{user_id}@example.com"),
            action,
            is_active: true,
            ip: ip.to_string(),
            country: "Germany".to_string(),
            region: "Berlin".to_string(),
            city: "Berlin".to_string(),
            timezone: "Europe/Berlin".to_string(),
            isp: "Example ISP".to_string(),
            latitude: 52.52,
            longitude: 13.405,
            browser: "Firefox".to_string(),
            browser_version: "128.0".to_string(),
            os: "Linux".to_string(),
            os_version: "Unknown".to_string(),
            device_type: DeviceType::Desktop,
            screen_resolution: "1920x1080".to_string(),
            device_fingerprint: "fp-1".to_string(),
            user_agent: "Mozilla/5.0".to_string(),
            created_at: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[tokio::test]
    async fn test_query_sessions_filters() {
        let storage = setup().await;
        storage
            .insert_session(&record("a", SessionAction::Signup, "203.0.113.1", 5))
            .await
            .unwrap();
        storage
            .insert_session(&record("b", SessionAction::Login, "203.0.113.1", 5))
            .await
            .unwrap();
        storage
            .insert_session(&record("c", SessionAction::Signup, "198.51.100.7", 5))
            .await
            .unwrap();
        storage
            .insert_session(&record("d", SessionAction::Signup, "203.0.113.1", 60 * 48))
            .await
            .unwrap();

        let all_signups = storage
            .query_sessions(&SessionQuery::signups().with_ip("203.0.113.1"))
            .await
            .unwrap();
        assert_eq!(all_signups.len(), 2);

        let recent = storage
            .query_sessions(
                &SessionQuery::signups()
                    .with_ip("203.0.113.1")
                    .since(Utc::now() - Duration::hours(24)),
            )
            .await
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].user_id, "a");
        assert_eq!(recent[0].device_type, DeviceType::Desktop);
        assert_eq!(recent[0].action, SessionAction::Signup);
    }

    #[tokio::test]
    async fn test_alerts_round_trip_details() {
        let storage = setup().await;
        let alert = FraudAlert {
            user_id: "u1".to_string(),
            email: "u1@example.com".to_string(),
            risk_level: RiskLevel::Critical,
            reason: "first; second".to_string(),
            details: AlertDetails {
                ip_accounts: Some(vec!["x".to_string(), "y".to_string()]),
                risk_score: 80,
                ip: "203.0.113.1".to_string(),
                fingerprint: "0123456789abcdef...".to_string(),
                ..Default::default()
            },
            created_at: Utc::now(),
        };
        storage.insert_alert(&alert).await.unwrap();

        let alerts = storage.list_alerts(10, Some("u1")).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].risk_level, RiskLevel::Critical);
        assert_eq!(alerts[0].details, alert.details);

        assert!(storage.list_alerts(10, Some("nobody")).await.unwrap().is_empty());
    }
}
