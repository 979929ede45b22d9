//! HTTP surface tests driven through the router with `tower::ServiceExt`

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;

use tripwire::api;
use tripwire::clock::{Clock, SystemClock};
use tripwire::config::{ProxyConfig, TrustedProxyMode};
use tripwire::fraud::{FailurePolicy, FraudDetector, RiskSignals, SignalPolicies};
use tripwire::models::{ClientEnvironment, DeviceType, SessionAction, UserSessionRecord};
use tripwire::network::{
    ForwardedIpProvider, GeoResolver, IpResolver, DEFAULT_GEO_TIMEOUT, DEFAULT_IP_TIMEOUT,
};
use tripwire::session::{Fingerprinter, SessionInfoAggregator, SessionLogger};
use tripwire::storage::{SqliteStorage, Storage};

/// Helper to create test storage
async fn create_test_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

fn create_test_app(storage: Arc<dyn Storage>, proxy: ProxyConfig) -> Router {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let aggregator = SessionInfoAggregator::new(
        Fingerprinter::default(),
        IpResolver::new(vec![Arc::new(ForwardedIpProvider)], DEFAULT_IP_TIMEOUT),
        GeoResolver::new(Vec::new(), DEFAULT_GEO_TIMEOUT),
        Arc::clone(&clock),
    );
    let signals = RiskSignals::new(
        Arc::clone(&storage),
        Arc::clone(&clock),
        SignalPolicies::uniform(FailurePolicy::Open),
    );
    let detector = FraudDetector::new(signals, Arc::clone(&clock));
    let logger = Arc::new(SessionLogger::new(
        aggregator,
        detector,
        Arc::clone(&storage),
        clock,
    ));
    api::create_api_router(logger, storage, proxy)
}

fn direct() -> ProxyConfig {
    ProxyConfig {
        trusted_proxy_mode: TrustedProxyMode::None,
        trusted_proxies: vec![],
        num_trusted_proxies: None,
    }
}

fn environment() -> ClientEnvironment {
    ClientEnvironment {
        user_agent: "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1".to_string(),
        screen_resolution: "390x844".to_string(),
        color_depth: 24,
        timezone: "America/New_York".to_string(),
        language: "en-US".to_string(),
        platform: "iPhone".to_string(),
        hardware_concurrency: 6,
        max_touch_points: 5,
        timezone_offset: 240,
        client_ip: None,
    }
}

fn session_request(peer: &str, body: Value) -> Request<Body> {
    let peer: SocketAddr = peer.parse().unwrap();
    let mut request = Request::builder()
        .method("POST")
        .uri("/api/sessions")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    request.extensions_mut().insert(ConnectInfo(peer));
    request
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn seeded_signup(user_id: &str, ip: &str, fingerprint: &str) -> UserSessionRecord {
    UserSessionRecord {
        user_id: user_id.to_string(),
        email: format!("{user_id}@example.com"),
        action: SessionAction::Signup,
        is_active: true,
        ip: ip.to_string(),
        country: "Unknown".to_string(),
        region: "Unknown".to_string(),
        city: "Unknown".to_string(),
        timezone: "Unknown".to_string(),
        isp: "Unknown".to_string(),
        latitude: 0.0,
        longitude: 0.0,
        browser: "Safari".to_string(),
        browser_version: "17.4".to_string(),
        os: "iOS".to_string(),
        os_version: "17.4".to_string(),
        device_type: DeviceType::Mobile,
        screen_resolution: "390x844".to_string(),
        device_fingerprint: fingerprint.to_string(),
        user_agent: "Mozilla/5.0".to_string(),
        created_at: Utc::now() - Duration::hours(1),
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app(create_test_storage().await, direct());

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["message"], "OK");
}

#[tokio::test]
async fn test_signup_is_logged_with_socket_address() {
    let storage = create_test_storage().await;
    let app = create_test_app(Arc::clone(&storage), direct());

    let response = app
        .clone()
        .oneshot(session_request(
            "198.51.100.23:50412",
            json!({
                "user_id": "carol",
                "email": "carol@example.com",
                "action": "signup",
                "environment": environment(),
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/users/carol/sessions")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let sessions = body_json(response).await;
    let sessions = sessions.as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["ip"], "198.51.100.23");
    assert_eq!(sessions[0]["action"], "signup");
    assert_eq!(sessions[0]["browser"], "Safari");
    assert_eq!(sessions[0]["os"], "iOS");
    assert_eq!(sessions[0]["device_type"], "Mobile");
}

#[tokio::test]
async fn test_forwarded_header_honored_behind_trusted_proxy() {
    let storage = create_test_storage().await;
    let proxy = ProxyConfig {
        trusted_proxy_mode: TrustedProxyMode::Standard,
        trusted_proxies: vec!["10.0.0.0/8".parse().unwrap()],
        num_trusted_proxies: None,
    };
    let app = create_test_app(Arc::clone(&storage), proxy);

    let mut request = session_request(
        "10.0.0.5:443",
        json!({
            "user_id": "dave",
            "email": "dave@example.com",
            "action": "login",
        }),
    );
    request
        .headers_mut()
        .insert("x-forwarded-for", "203.0.113.200, 10.0.0.7".parse().unwrap());

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let sessions = storage
        .query_sessions(&tripwire::storage::SessionQuery::default().with_user("dave"))
        .await
        .unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].ip, "203.0.113.200");
    assert_eq!(sessions[0].action, SessionAction::Login);
}

#[tokio::test]
async fn test_invalid_payloads_are_rejected() {
    let app = create_test_app(create_test_storage().await, direct());

    let response = app
        .clone()
        .oneshot(session_request(
            "198.51.100.1:1000",
            json!({ "user_id": "  ", "email": "x@example.com", "action": "signup" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "user_id cannot be empty");

    let response = app
        .oneshot(session_request(
            "198.51.100.1:1000",
            json!({ "user_id": "erin", "email": "not-an-email", "action": "signup" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_blocked_signup_returns_forbidden_and_alert_is_listed() {
    let storage = create_test_storage().await;
    let env = environment();
    let fingerprint = Fingerprinter::default().generate(&env);
    for user in ["f1", "f2", "f3"] {
        storage
            .insert_session(&seeded_signup(user, "192.0.2.44", fingerprint.as_str()))
            .await
            .unwrap();
    }
    let app = create_test_app(Arc::clone(&storage), direct());

    let response = app
        .clone()
        .oneshot(session_request(
            "192.0.2.44:61000",
            json!({
                "user_id": "f4",
                "email": "f4@mailinator.com",
                "action": "signup",
                "environment": env,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = body_json(response).await;
    assert_eq!(body["risk_level"], "critical");
    let error = body["error"].as_str().unwrap();
    assert!(error.starts_with("Account creation blocked due to suspicious activity"));
    assert!(error.contains("Disposable email address detected"));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/alerts?user_id=f4")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let alerts = body_json(response).await;
    let alerts = alerts.as_array().unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0]["risk_level"], "critical");
    assert_eq!(alerts[0]["details"]["risk_score"], 100);
    assert_eq!(alerts[0]["details"]["disposable_email"], true);
    assert_eq!(alerts[0]["details"]["ip"], "192.0.2.44");

    let sessions = storage
        .query_sessions(&tripwire::storage::SessionQuery::default().with_user("f4"))
        .await
        .unwrap();
    assert!(sessions.is_empty());
}
