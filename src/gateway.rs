//! Thin client for the external trading API.
//!
//! Three calls are consumed: provider listing, symbol listing for an
//! exchange, and schedule creation. Calls are synchronous request/response
//! with a bounded timeout; a timeout or non-2xx is terminal for that call.
//! Retry policy belongs to the caller, and the caller never retries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::types::{RemoteProviderId, RemoteScheduleId, Server, Side, Symbol};

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transport-level failure: the trading API could not be reached or timed
    /// out.
    #[error("trading api unavailable: {0}")]
    Unavailable(#[source] reqwest::Error),
    /// The trading API answered with a non-2xx status.
    #[error("trading api rejected the request: status {status}")]
    Rejected { status: u16, body: String },
    /// A 2xx response did not carry the expected fields.
    #[error("unexpected trading api response: {0}")]
    Decode(String),
}

/// A provider as the trading API itself reports it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteProvider {
    pub id: RemoteProviderId,
    pub name: String,
    pub exchange_id: String,
}

/// Payload for `POST /schedules`, one leg of the buy/sell pair.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScheduleRequest {
    pub amount: f64,
    pub is_active: bool,
    pub name: String,
    pub order_type: String,
    pub provider_id: String,
    pub recurrence_type: String,
    pub scheduled_time: DateTime<Utc>,
    pub side: Side,
    pub symbol: String,
    pub stop_loss_percentage: f64,
    pub take_profit_percentage: f64,
    /// Remote id of the buy leg, set on the linked sell leg only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_schedule_id: Option<RemoteScheduleId>,
}

impl ScheduleRequest {
    /// Derive the linked sell leg from a buy leg.
    pub fn linked_sell(&self, sell_time: DateTime<Utc>, buy_id: RemoteScheduleId) -> Self {
        Self {
            side: Side::Sell,
            scheduled_time: sell_time,
            parent_schedule_id: Some(buy_id),
            ..self.clone()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteSchedule {
    pub id: RemoteScheduleId,
}

#[async_trait]
pub trait TradingApi: Send + Sync {
    async fn list_providers(&self, server: &Server) -> Result<Vec<RemoteProvider>, GatewayError>;
    async fn list_symbols(
        &self,
        server: &Server,
        exchange_id: &str,
    ) -> Result<Vec<Symbol>, GatewayError>;
    async fn create_schedule(
        &self,
        server: &Server,
        request: &ScheduleRequest,
    ) -> Result<RemoteSchedule, GatewayError>;
}

pub struct HttpTradingGateway {
    client: reqwest::Client,
}

impl HttpTradingGateway {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn endpoint(server: &Server, path: &str) -> String {
        format!("{}{}", server.url.trim_end_matches('/'), path)
    }

    async fn check(resp: reqwest::Response) -> Result<serde_json::Value, GatewayError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        resp.json()
            .await
            .map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

#[async_trait]
impl TradingApi for HttpTradingGateway {
    async fn list_providers(&self, server: &Server) -> Result<Vec<RemoteProvider>, GatewayError> {
        let resp = self
            .client
            .get(Self::endpoint(server, "/providers"))
            .header("X-API-Key", &server.api_key)
            .send()
            .await
            .map_err(GatewayError::Unavailable)?;
        let body = Self::check(resp).await?;

        // Accept both a bare array and a {providers: [..]} wrapper.
        let items = body
            .as_array()
            .or_else(|| body.pointer("/providers").and_then(|v| v.as_array()))
            .ok_or_else(|| GatewayError::Decode("provider listing is not an array".into()))?;

        let mut providers = Vec::with_capacity(items.len());
        for item in items {
            let id = item
                .pointer("/id")
                .map(stringify_id)
                .ok_or_else(|| GatewayError::Decode("provider entry missing id".into()))?;
            providers.push(RemoteProvider {
                id: RemoteProviderId(id),
                name: item
                    .pointer("/name")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                exchange_id: item
                    .pointer("/exchange_id")
                    .map(stringify_id)
                    .unwrap_or_default(),
            });
        }
        debug!(count = providers.len(), "listed remote providers");
        Ok(providers)
    }

    async fn list_symbols(
        &self,
        server: &Server,
        exchange_id: &str,
    ) -> Result<Vec<Symbol>, GatewayError> {
        let resp = self
            .client
            .get(Self::endpoint(
                server,
                &format!("/symbols/exchange/{exchange_id}"),
            ))
            .query(&[("trading_type", "spot")])
            .header("X-API-Key", &server.api_key)
            .send()
            .await
            .map_err(GatewayError::Unavailable)?;
        let body = Self::check(resp).await?;

        let symbols = body
            .pointer("/symbols")
            .and_then(|v| v.as_array())
            .ok_or_else(|| GatewayError::Decode("symbol listing missing symbols array".into()))?;
        Ok(symbols
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| Symbol(s.to_string()))
            .collect())
    }

    async fn create_schedule(
        &self,
        server: &Server,
        request: &ScheduleRequest,
    ) -> Result<RemoteSchedule, GatewayError> {
        let resp = self
            .client
            .post(Self::endpoint(server, "/schedules"))
            .bearer_auth(&server.api_key)
            .header("X-API-Key", &server.api_key)
            .json(request)
            .send()
            .await
            .map_err(GatewayError::Unavailable)?;
        let body = Self::check(resp).await?;

        let id = body
            .pointer("/id")
            .or_else(|| body.pointer("/schedule/id"))
            .map(stringify_id)
            .ok_or_else(|| GatewayError::Decode("schedule response missing id".into()))?;
        debug!(schedule_id = %id, side = request.side.as_str(), "created remote schedule");
        Ok(RemoteSchedule {
            id: RemoteScheduleId(id),
        })
    }
}

/// Remote ids arrive as numbers or strings depending on the deployment.
fn stringify_id(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
