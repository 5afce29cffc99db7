use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::orchestrator::RunIntentionRequest;
use crate::store::{NewIntention, NewProvider, NewServer};
use crate::sync::sync_provider_rates;
use crate::types::{CaseId, CatalogId, IntentionId, ProviderId, ServerId};

use super::{ok, ok_with, ApiError, AppState};

type HandlerResult = Result<Json<Value>, ApiError>;

pub async fn ping() -> Json<Value> {
    Json(json!({
        "status": "success",
        "message": "pong",
        "service": "intention-trading-bot",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

// ---- servers ----

#[derive(Debug, Deserialize)]
pub struct RegisterServerRequest {
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub api_key: String,
}

pub async fn register_server(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterServerRequest>,
) -> HandlerResult {
    if body.url.trim().is_empty() {
        return Err(ApiError::bad_request("server url is required"));
    }
    url::Url::parse(&body.url).map_err(|_| ApiError::bad_request("invalid server url"))?;
    let server = state.store.insert_server(&NewServer {
        url: body.url,
        description: body.description,
        api_key: body.api_key,
    })?;
    Ok(ok_with("server", serde_json::to_value(server)?))
}

pub async fn list_servers(State(state): State<Arc<AppState>>) -> HandlerResult {
    let servers = state.store.list_servers()?;
    Ok(ok_with("servers", serde_json::to_value(servers)?))
}

#[derive(Debug, Deserialize)]
pub struct UpdateServerRequest {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub api_key: String,
}

pub async fn update_server(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateServerRequest>,
) -> HandlerResult {
    if !state
        .store
        .update_server(ServerId(id), &body.description, &body.api_key)?
    {
        return Err(ApiError::not_found("server not found"));
    }
    Ok(ok())
}

#[derive(Debug, Deserialize)]
pub struct SelectServerRequest {
    pub server_id: Option<ServerId>,
}

pub async fn select_server(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SelectServerRequest>,
) -> HandlerResult {
    if let Some(id) = body.server_id {
        if state.store.get_server(id)?.is_none() {
            return Err(ApiError::not_found("server not found"));
        }
    }
    state.store.select_server(body.server_id)?;
    Ok(ok())
}

// ---- providers ----

#[derive(Debug, Deserialize)]
pub struct RegisterProviderRequest {
    pub name: String,
    pub server_provider_id: String,
    pub server_id: ServerId,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub exchange_id: String,
}

pub async fn register_provider(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterProviderRequest>,
) -> HandlerResult {
    if state.store.get_server(body.server_id)?.is_none() {
        return Err(ApiError::not_found("server not found"));
    }
    let provider = state.store.insert_provider(&NewProvider {
        name: body.name,
        server_provider_id: body.server_provider_id,
        server_id: body.server_id,
        url: body.url,
        api_key: body.api_key,
        exchange_id: body.exchange_id,
    })?;
    Ok(ok_with("provider", serde_json::to_value(provider)?))
}

pub async fn list_providers(State(state): State<Arc<AppState>>) -> HandlerResult {
    let providers = state.store.list_providers()?;
    Ok(ok_with("providers", serde_json::to_value(providers)?))
}

#[derive(Debug, Deserialize)]
pub struct SelectProviderRequest {
    pub server_id: ServerId,
    pub provider_id: Option<ProviderId>,
}

pub async fn select_provider(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SelectProviderRequest>,
) -> HandlerResult {
    if let Some(id) = body.provider_id {
        match state.store.get_provider(id)? {
            Some(provider) if provider.server_id == body.server_id => {}
            Some(_) => {
                return Err(ApiError::bad_request(
                    "provider does not belong to that server",
                ))
            }
            None => return Err(ApiError::not_found("provider not found")),
        }
    }
    state.store.select_provider(body.server_id, body.provider_id)?;
    Ok(ok())
}

pub async fn sync_provider(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> HandlerResult {
    let report = sync_provider_rates(
        &state.store,
        state.host.as_ref(),
        state.gateway.as_ref(),
        ProviderId(id),
    )
    .await?;
    Ok(ok_with("sync", serde_json::to_value(report)?))
}

// ---- catalogs ----

/// Listing refreshes the local mirror from the host first, so newly created
/// host catalogs become selectable without a separate import step.
pub async fn list_catalogs(State(state): State<Arc<AppState>>) -> HandlerResult {
    let host_catalogs = state
        .host
        .list_catalogs()
        .await
        .map_err(|e| ApiError::bad_gateway(e.to_string()))?;
    for catalog in &host_catalogs {
        state.store.upsert_catalog(&catalog.name, catalog.id)?;
    }
    let catalogs = state.store.list_catalogs()?;
    Ok(ok_with("catalogs", serde_json::to_value(catalogs)?))
}

#[derive(Debug, Deserialize)]
pub struct SelectCatalogRequest {
    pub catalog_id: Option<CatalogId>,
}

pub async fn select_catalog(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SelectCatalogRequest>,
) -> HandlerResult {
    if let Some(id) = body.catalog_id {
        if state.store.get_catalog(id)?.is_none() {
            return Err(ApiError::not_found("catalog not found"));
        }
    }
    state.store.select_catalog(body.catalog_id)?;
    Ok(ok())
}

// ---- cases ----

#[derive(Debug, Deserialize)]
pub struct CreateCaseRequest {
    pub name: String,
    pub catalog_id: CatalogId,
}

pub async fn create_case(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateCaseRequest>,
) -> HandlerResult {
    if body.name.trim().is_empty() {
        return Err(ApiError::bad_request("case name is required"));
    }
    if state.store.get_catalog(body.catalog_id)?.is_none() {
        return Err(ApiError::not_found("catalog not found"));
    }
    let host_case = state
        .host
        .create_case(&body.name)
        .await
        .map_err(|e| ApiError::bad_gateway(e.to_string()))?;
    let case = state
        .store
        .get_or_create_case(host_case.id, &body.name, body.catalog_id)?;
    Ok(ok_with("case", serde_json::to_value(case)?))
}

pub async fn list_cases(State(state): State<Arc<AppState>>) -> HandlerResult {
    let cases = state.store.list_cases()?;
    Ok(ok_with("cases", serde_json::to_value(cases)?))
}

#[derive(Debug, Deserialize)]
pub struct SelectCaseRequest {
    pub case_id: Option<CaseId>,
}

pub async fn select_case(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SelectCaseRequest>,
) -> HandlerResult {
    if let Some(id) = body.case_id {
        if state.store.get_case(id)?.is_none() {
            return Err(ApiError::not_found("case not found"));
        }
    }
    state.store.select_case(body.case_id)?;
    Ok(ok())
}

// ---- intentions ----

#[derive(Debug, Deserialize)]
pub struct IntentionRequest {
    #[serde(default)]
    pub description: String,
    pub intention: String,
    pub hold_minutes: i64,
    pub amount: f64,
    #[serde(default)]
    pub stop_loss_percentage: f64,
    #[serde(default)]
    pub take_profit_percentage: f64,
}

impl IntentionRequest {
    fn into_new(self) -> NewIntention {
        NewIntention {
            description: self.description,
            intention: self.intention,
            hold_minutes: self.hold_minutes,
            amount: self.amount,
            stop_loss_percentage: self.stop_loss_percentage,
            take_profit_percentage: self.take_profit_percentage,
        }
    }
}

pub async fn create_intention(
    State(state): State<Arc<AppState>>,
    Json(body): Json<IntentionRequest>,
) -> HandlerResult {
    if body.intention.trim().is_empty() {
        return Err(ApiError::bad_request("intention text is required"));
    }
    let intention = state.store.insert_intention(&body.into_new())?;
    Ok(ok_with("intention", serde_json::to_value(intention)?))
}

pub async fn list_intentions(State(state): State<Arc<AppState>>) -> HandlerResult {
    let intentions = state.store.list_intentions()?;
    Ok(ok_with("intentions", serde_json::to_value(intentions)?))
}

pub async fn update_intention(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<IntentionRequest>,
) -> HandlerResult {
    if !state
        .store
        .update_intention(IntentionId(id), &body.into_new())?
    {
        return Err(ApiError::not_found("intention not found"));
    }
    Ok(ok())
}

pub async fn delete_intention(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> HandlerResult {
    if !state.store.delete_intention(IntentionId(id))? {
        return Err(ApiError::not_found("intention not found"));
    }
    Ok(ok())
}

#[derive(Debug, Deserialize)]
pub struct SelectIntentionRequest {
    pub intention_id: Option<IntentionId>,
}

pub async fn select_intention(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SelectIntentionRequest>,
) -> HandlerResult {
    if let Some(id) = body.intention_id {
        if state.store.get_intention(id)?.is_none() {
            return Err(ApiError::not_found("intention not found"));
        }
    }
    state.store.select_intention(body.intention_id)?;
    Ok(ok())
}

// ---- orchestration ----

pub async fn start_intention(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RunIntentionRequest>,
) -> HandlerResult {
    let schedule = state.orchestrator.run_intention(&body).await?;
    Ok(ok_with("schedule", serde_json::to_value(schedule)?))
}

pub async fn list_schedules(State(state): State<Arc<AppState>>) -> HandlerResult {
    let schedules = state.store.list_schedules()?;
    Ok(ok_with("schedules", serde_json::to_value(schedules)?))
}
