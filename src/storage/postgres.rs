use crate::models::{FraudAlert, UserSessionRecord};
use crate::storage::rows::{encode_details, AlertRow, SessionRow, ALERT_COLUMNS, SESSION_COLUMNS};
use crate::storage::{SessionQuery, Storage, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::sync::Arc;

pub struct PostgresStorage {
    pool: Arc<PgPool>,
}

impl PostgresStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_sessions (
                id BIGSERIAL PRIMARY KEY,
                user_id TEXT NOT NULL,
                email TEXT NOT NULL,
                action TEXT NOT NULL,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                ip TEXT NOT NULL,
                country TEXT NOT NULL,
                region TEXT NOT NULL,
                city TEXT NOT NULL,
                timezone TEXT NOT NULL,
                isp TEXT NOT NULL,
                latitude DOUBLE PRECISION NOT NULL DEFAULT 0,
                longitude DOUBLE PRECISION NOT NULL DEFAULT 0,
                browser TEXT NOT NULL,
                browser_version TEXT NOT NULL,
                os TEXT NOT NULL,
                os_version TEXT NOT NULL,
                device_type TEXT NOT NULL,
                screen_resolution TEXT NOT NULL,
                device_fingerprint TEXT NOT NULL,
                user_agent TEXT NOT NULL,
                created_at BIGINT NOT NULL
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
                id BIGSERIAL PRIMARY KEY,
                user_id TEXT NOT NULL,
                email TEXT NOT NULL,
                risk_level TEXT NOT NULL,
                reason TEXT NOT NULL,
                details TEXT NOT NULL,
                created_at BIGINT NOT NULL
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
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
             $17, $18, $19, $20, $21)"
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
            "INSERT INTO fraud_alerts ({ALERT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)"
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
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {SESSION_COLUMNS} FROM user_sessions WHERE TRUE"));

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
        let mut builder: QueryBuilder<Postgres> =
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
