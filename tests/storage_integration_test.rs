//! Integration tests for the session and alert stores
//!
//! Tests can be filtered by database backend using the DATABASE_BACKEND environment variable:
//! - `DATABASE_BACKEND=sqlite cargo test` - Run only SQLite tests
//! - `DATABASE_BACKEND=postgres cargo test` - Run only PostgreSQL tests
//! - By default, both backends are tested (PostgreSQL only when DATABASE_URL points at one)

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use tripwire::models::{
    AlertDetails, DeviceType, FraudAlert, RiskLevel, SessionAction, UserSessionRecord,
};
use tripwire::storage::{PostgresStorage, SessionQuery, SqliteStorage, Storage};

/// Get the database backend to test from environment variable
fn should_test_backend(backend: &str) -> bool {
    match std::env::var("DATABASE_BACKEND") {
        Ok(val) => val.to_lowercase() == backend.to_lowercase(),
        Err(_) => true,
    }
}

async fn create_sqlite_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

async fn create_postgres_storage() -> Option<Arc<dyn Storage>> {
    let db_url = std::env::var("DATABASE_URL").ok()?;
    if !db_url.starts_with("postgres") {
        return None;
    }
    let storage = PostgresStorage::new(&db_url, 5).await.ok()?;
    storage.init().await.ok()?;
    Some(Arc::new(storage))
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 9, 30, 0).unwrap()
}

/// Ids are prefixed so repeated runs against a shared PostgreSQL database stay isolated
fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

fn signup(user_id: &str, ip: &str, fingerprint: &str, created_at: DateTime<Utc>) -> UserSessionRecord {
    UserSessionRecord {
        user_id: user_id.to_string(),
        email: format!("{user_id}@example.com"),
        action: SessionAction::Signup,
        is_active: true,
        ip: ip.to_string(),
        country: "Japan".to_string(),
        region: "Tokyo".to_string(),
        city: "Tokyo".to_string(),
        timezone: "Asia/Tokyo".to_string(),
        isp: "Example Broadband".to_string(),
        latitude: 35.6762,
        longitude: 139.6503,
        browser: "Chrome".to_string(),
        browser_version: "126.0.0.0".to_string(),
        os: "Android".to_string(),
        os_version: "14".to_string(),
        device_type: DeviceType::Tablet,
        screen_resolution: "800x1280".to_string(),
        device_fingerprint: fingerprint.to_string(),
        user_agent: "Mozilla/5.0 (Linux; Android 14)".to_string(),
        created_at,
    }
}

async fn run_session_queries(storage: Arc<dyn Storage>) {
    let ip = unique("ip");
    let fingerprint = unique("fp");
    let t0 = base_time();

    storage
        .insert_session(&signup("older", &ip, &fingerprint, t0))
        .await
        .unwrap();
    storage
        .insert_session(&signup("newer", &ip, &fingerprint, t0 + Duration::minutes(10)))
        .await
        .unwrap();
    let mut login = signup("newer", &ip, &fingerprint, t0 + Duration::minutes(20));
    login.action = SessionAction::Login;
    storage.insert_session(&login).await.unwrap();

    let by_ip = storage
        .query_sessions(&SessionQuery::signups().with_ip(&ip))
        .await
        .unwrap();
    let users: Vec<_> = by_ip.iter().map(|r| r.user_id.as_str()).collect();
    assert_eq!(users, vec!["newer", "older"]);

    let by_device = storage
        .query_sessions(&SessionQuery::default().with_fingerprint(&fingerprint))
        .await
        .unwrap();
    assert_eq!(by_device.len(), 3);
    assert_eq!(by_device[0].action, SessionAction::Login);

    let windowed = storage
        .query_sessions(
            &SessionQuery::signups()
                .with_ip(&ip)
                .since(t0 + Duration::minutes(10)),
        )
        .await
        .unwrap();
    assert_eq!(windowed.len(), 1);
    assert_eq!(windowed[0].user_id, "newer");

    let limited = storage
        .query_sessions(&SessionQuery::default().with_ip(&ip).limit(1))
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);

    let record = &by_ip[0];
    assert_eq!(record.device_type, DeviceType::Tablet);
    assert_eq!(record.created_at, t0 + Duration::minutes(10));
    assert!((record.latitude - 35.6762).abs() < 1e-9);
}

async fn run_alert_listing(storage: Arc<dyn Storage>) {
    let user = unique("alerted");
    for (offset, level) in [(0, RiskLevel::Medium), (5, RiskLevel::Critical)] {
        let alert = FraudAlert {
            user_id: user.clone(),
            email: format!("{user}@example.com"),
            risk_level: level,
            reason: "Disposable email address detected".to_string(),
            details: AlertDetails {
                velocity_count: Some(7),
                disposable_email: true,
                risk_score: 50,
                ip: "192.0.2.1".to_string(),
                fingerprint: "deadbeefdeadbeef...".to_string(),
                ..Default::default()
            },
            created_at: base_time() + Duration::minutes(offset),
        };
        storage.insert_alert(&alert).await.unwrap();
    }

    let alerts = storage.list_alerts(10, Some(&user)).await.unwrap();
    assert_eq!(alerts.len(), 2);
    assert_eq!(alerts[0].risk_level, RiskLevel::Critical);
    assert_eq!(alerts[1].risk_level, RiskLevel::Medium);
    assert_eq!(alerts[0].details.velocity_count, Some(7));
    assert!(alerts[0].details.ip_accounts.is_none());

    let newest_only = storage.list_alerts(1, Some(&user)).await.unwrap();
    assert_eq!(newest_only.len(), 1);
}

async fn run_concurrent_inserts(storage: Arc<dyn Storage>) {
    let ip = unique("burst");
    let mut handles = vec![];
    for i in 0..10 {
        let storage = Arc::clone(&storage);
        let ip = ip.clone();
        handles.push(tokio::spawn(async move {
            storage
                .insert_session(&signup(&format!("user{i}"), &ip, "fp-burst", base_time()))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stored = storage
        .query_sessions(&SessionQuery::signups().with_ip(&ip))
        .await
        .unwrap();
    assert_eq!(stored.len(), 10);
}

#[tokio::test]
async fn test_session_queries_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    run_session_queries(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_session_queries_postgres() {
    if !should_test_backend("postgres") {
        return;
    }
    let Some(storage) = create_postgres_storage().await else {
        return;
    };
    run_session_queries(storage).await;
}

#[tokio::test]
async fn test_alert_listing_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    run_alert_listing(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_alert_listing_postgres() {
    if !should_test_backend("postgres") {
        return;
    }
    let Some(storage) = create_postgres_storage().await else {
        return;
    };
    run_alert_listing(storage).await;
}

#[tokio::test]
async fn test_concurrent_inserts_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    run_concurrent_inserts(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_concurrent_inserts_postgres() {
    if !should_test_backend("postgres") {
        return;
    }
    let Some(storage) = create_postgres_storage().await else {
        return;
    };
    run_concurrent_inserts(storage).await;
}
