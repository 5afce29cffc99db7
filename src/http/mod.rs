//! HTTP boundary: axum router, shared state, and the uniform response
//! envelope.
//!
//! Every response is `{"status": "success", ...payload}` or
//! `{"status": "error", "error": ...}`; handlers stay thin and translate
//! typed core errors into statuses here.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::analysis::AnalysisEngine;
use crate::gateway::TradingApi;
use crate::host::HostService;
use crate::orchestrator::{OrchestrateError, Orchestrator};
use crate::random::RandomSource;
use crate::store::LocalStore;
use crate::sync::SyncError;

pub mod handlers;

pub struct AppState {
    pub store: Arc<LocalStore>,
    pub host: Arc<dyn HostService>,
    pub gateway: Arc<dyn TradingApi>,
    pub orchestrator: Orchestrator,
}

impl AppState {
    pub fn new(
        store: Arc<LocalStore>,
        host: Arc<dyn HostService>,
        gateway: Arc<dyn TradingApi>,
        analysis: Arc<dyn AnalysisEngine>,
        random: Arc<dyn RandomSource>,
    ) -> Self {
        let orchestrator = Orchestrator::new(
            store.clone(),
            host.clone(),
            gateway.clone(),
            analysis,
            random,
        );
        Self {
            store,
            host,
            gateway,
            orchestrator,
        }
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ping", get(handlers::ping))
        .route(
            "/servers",
            get(handlers::list_servers).post(handlers::register_server),
        )
        .route("/servers/:id", put(handlers::update_server))
        .route("/servers/select", post(handlers::select_server))
        .route(
            "/providers",
            get(handlers::list_providers).post(handlers::register_provider),
        )
        .route("/providers/select", post(handlers::select_provider))
        .route("/providers/:id/sync", post(handlers::sync_provider))
        .route("/catalogs", get(handlers::list_catalogs))
        .route("/catalogs/select", post(handlers::select_catalog))
        .route(
            "/cases",
            get(handlers::list_cases).post(handlers::create_case),
        )
        .route("/cases/select", post(handlers::select_case))
        .route(
            "/intentions",
            get(handlers::list_intentions).post(handlers::create_intention),
        )
        .route(
            "/intentions/:id",
            put(handlers::update_intention).delete(handlers::delete_intention),
        )
        .route("/intentions/select", post(handlers::select_intention))
        .route("/start", post(handlers::start_intention))
        .route("/schedules", get(handlers::list_schedules))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Success envelope with one named payload field.
pub(crate) fn ok_with(key: &'static str, value: Value) -> Json<Value> {
    let mut body = serde_json::Map::new();
    body.insert("status".to_string(), Value::String("success".to_string()));
    body.insert(key.to_string(), value);
    Json(Value::Object(body))
}

/// Success envelope with no payload.
pub(crate) fn ok() -> Json<Value> {
    Json(json!({ "status": "success" }))
}

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "status": "error", "error": self.message })),
        )
            .into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

impl From<OrchestrateError> for ApiError {
    fn from(err: OrchestrateError) -> Self {
        let status = match &err {
            OrchestrateError::NotFound(_) => StatusCode::NOT_FOUND,
            OrchestrateError::MissingCredential => StatusCode::BAD_REQUEST,
            OrchestrateError::ProviderLinkMissing => StatusCode::UNPROCESSABLE_ENTITY,
            OrchestrateError::NoCandidateSymbol => StatusCode::UNPROCESSABLE_ENTITY,
            OrchestrateError::AnalysisFailed(_)
            | OrchestrateError::RemoteScheduleFailed { .. } => StatusCode::BAD_GATEWAY,
            OrchestrateError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl From<SyncError> for ApiError {
    fn from(err: SyncError) -> Self {
        let status = match &err {
            SyncError::NotFound(_) => StatusCode::NOT_FOUND,
            SyncError::Upstream(_) | SyncError::Host(_) => StatusCode::BAD_GATEWAY,
            SyncError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}
