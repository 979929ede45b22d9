use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::ProxyConfig;
use crate::session::SessionLogger;
use crate::storage::Storage;

use super::handlers::{health_check, list_alerts, list_user_sessions, log_session, AppState};

pub fn create_api_router(
    logger: Arc<SessionLogger>,
    storage: Arc<dyn Storage>,
    proxy: ProxyConfig,
) -> Router {
    let state = Arc::new(AppState {
        logger,
        storage,
        proxy,
    });

    // Session logging is called straight from the browser during signup
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let api_routes = Router::new()
        .route("/sessions", post(log_session))
        .route("/alerts", get(list_alerts))
        .route("/users/{user_id}/sessions", get(list_user_sessions))
        .with_state(state);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .layer(cors)
}
