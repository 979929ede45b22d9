use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::ProxyConfig;
use crate::models::{ClientEnvironment, FraudAlert, RiskLevel, SessionAction, UserSessionRecord};
use crate::network::extract_client_ip;
use crate::session::{SessionError, SessionLogger};
use crate::storage::{SessionQuery, Storage};

const MAX_LIST_LIMIT: i64 = 500;

pub struct AppState {
    pub logger: Arc<SessionLogger>,
    pub storage: Arc<dyn Storage>,
    pub proxy: ProxyConfig,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
}

impl ErrorResponse {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            risk_level: None,
        }
    }
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct LogSessionRequest {
    pub user_id: String,
    pub email: String,
    pub action: SessionAction,
    #[serde(default)]
    pub environment: ClientEnvironment,
}

#[derive(Deserialize)]
pub struct AlertQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub user_id: Option<String>,
}

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Log a login or signup for the calling client
pub async fn log_session(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(payload): Json<LogSessionRequest>,
) -> Result<StatusCode, ApiError> {
    if payload.user_id.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("user_id cannot be empty")),
        ));
    }
    if !payload.email.contains('@') {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("email must contain '@'")),
        ));
    }

    let mut env = payload.environment;
    env.client_ip = Some(extract_client_ip(&headers, addr.ip(), &state.proxy).to_string());

    match state
        .logger
        .log_user_session(&payload.user_id, &payload.email, payload.action, &env)
        .await
    {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) => {
            let SessionError::SignupBlocked { risk_level, .. } = &e;
            Err((
                StatusCode::FORBIDDEN,
                Json(ErrorResponse {
                    risk_level: Some(*risk_level),
                    error: e.to_string(),
                }),
            ))
        }
    }
}

/// Most recent fraud alerts
pub async fn list_alerts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AlertQuery>,
) -> Result<Json<Vec<FraudAlert>>, ApiError> {
    let limit = query.limit.clamp(1, MAX_LIST_LIMIT);
    match state
        .storage
        .list_alerts(limit, query.user_id.as_deref())
        .await
    {
        Ok(alerts) => Ok(Json(alerts)),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(format!("Failed to list alerts: {}", e))),
        )),
    }
}

/// Session history of one user, newest first
pub async fn list_user_sessions(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<UserSessionRecord>>, ApiError> {
    let limit = query.limit.clamp(1, MAX_LIST_LIMIT);
    let filter = SessionQuery::default().with_user(&user_id).limit(limit);

    match state.storage.query_sessions(&filter).await {
        Ok(sessions) => Ok(Json(sessions)),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(format!("Failed to list sessions: {}", e))),
        )),
    }
}

/// Health check endpoint
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}
