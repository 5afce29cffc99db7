//! The "run intention" sequence.
//!
//! Resolves plugin-local identifiers to external ones, runs a host analysis
//! over the selected catalog, picks the top-ranked symbol, then submits a buy
//! and a linked sell schedule to the trading API. The two remote legs carry
//! no distributed transaction: a failed buy leg persists nothing, while a
//! failed sell leg after a successful buy leg is recorded as a partial
//! schedule so operators can reconcile against the remote system. Each leg is
//! attempted exactly once per invocation.

use std::fmt;
use std::sync::Arc;

use anyhow::Error as HostError;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::analysis::AnalysisEngine;
use crate::gateway::{GatewayError, ScheduleRequest, TradingApi};
use crate::host::HostService;
use crate::random::RandomSource;
use crate::resolver::{pick_top_rate, schedule_window};
use crate::store::{LocalStore, NewSchedule};
use crate::types::{
    CaseId, CatalogId, Entity, IntentionId, IntentionSchedule, ProviderId, RemoteProviderId,
    ScheduleStatus, Side,
};

/// Remote order names carry a slice of the intention text plus the symbol.
const ORDER_NAME_TEXT_CHARS: usize = 32;

const SETTING_CHECK_GV: &str = "ANALYSIS_ALWAYS_CHECK_GV";
const SETTING_ADVANCED: &str = "ANALYSIS_ADVANCED";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Leg {
    Buy,
    Sell,
}

impl fmt::Display for Leg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Leg::Buy => "buy",
            Leg::Sell => "sell",
        })
    }
}

#[derive(Debug, Error)]
pub enum OrchestrateError {
    #[error("{0} not found")]
    NotFound(Entity),
    #[error("selected server has no api key")]
    MissingCredential,
    #[error("provider cannot be linked to a remote provider")]
    ProviderLinkMissing,
    #[error("analysis failed: {0}")]
    AnalysisFailed(HostError),
    #[error("analysis produced no usable rate")]
    NoCandidateSymbol,
    #[error("remote {leg} scheduling failed: {source}")]
    RemoteScheduleFailed {
        leg: Leg,
        #[source]
        source: GatewayError,
    },
    #[error("store error: {0}")]
    Store(HostError),
}

/// Plugin-local identifiers naming what to trade, where, and out of which
/// catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIntentionRequest {
    pub intention_id: IntentionId,
    pub case_id: CaseId,
    pub provider_id: ProviderId,
    pub catalog_id: CatalogId,
}

pub struct Orchestrator {
    store: Arc<LocalStore>,
    host: Arc<dyn HostService>,
    gateway: Arc<dyn TradingApi>,
    analysis: Arc<dyn AnalysisEngine>,
    random: Arc<dyn RandomSource>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<LocalStore>,
        host: Arc<dyn HostService>,
        gateway: Arc<dyn TradingApi>,
        analysis: Arc<dyn AnalysisEngine>,
        random: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            store,
            host,
            gateway,
            analysis,
            random,
        }
    }

    pub async fn run_intention(
        &self,
        request: &RunIntentionRequest,
    ) -> Result<IntentionSchedule, OrchestrateError> {
        // Local lookups first, in strict order; abort on the first miss.
        let intention = self
            .store
            .get_intention(request.intention_id)
            .map_err(OrchestrateError::Store)?
            .ok_or(OrchestrateError::NotFound(Entity::Intention))?;
        let provider = self
            .store
            .get_provider(request.provider_id)
            .map_err(OrchestrateError::Store)?
            .ok_or(OrchestrateError::NotFound(Entity::Provider))?;
        let catalog = self
            .store
            .get_catalog(request.catalog_id)
            .map_err(OrchestrateError::Store)?
            .ok_or(OrchestrateError::NotFound(Entity::Catalog))?;
        let case = self
            .store
            .get_case(request.case_id)
            .map_err(OrchestrateError::Store)?
            .ok_or(OrchestrateError::NotFound(Entity::Case))?;

        info!(
            intention = %intention.intention,
            case = %case.name,
            provider = %provider.name,
            catalog = %catalog.name,
            "running intention"
        );

        // Host analysis over the catalog, keyed entirely by external ids.
        let enhanced = self
            .run_host_analysis(&intention, &case, &catalog)
            .await
            .map_err(OrchestrateError::AnalysisFailed)?;

        let top = pick_top_rate(&enhanced).ok_or(OrchestrateError::NoCandidateSymbol)?;
        let symbol = top.signature.clone();
        info!(symbol = %symbol.0, value = top.value, "analysis picked trade candidate");

        let window = schedule_window(Utc::now(), intention.hold_minutes);

        let server = self
            .store
            .selected_server()
            .map_err(OrchestrateError::Store)?
            .ok_or(OrchestrateError::NotFound(Entity::Server))?;
        if server.api_key.trim().is_empty() {
            return Err(OrchestrateError::MissingCredential);
        }

        let remote_provider_id = self.resolve_remote_provider(&server, &provider).await?;

        let buy_request = ScheduleRequest {
            amount: intention.amount,
            is_active: true,
            name: order_name(&intention.intention, &symbol.0),
            order_type: "market".to_string(),
            provider_id: remote_provider_id.0.clone(),
            recurrence_type: "none".to_string(),
            scheduled_time: window.buy_time,
            side: Side::Buy,
            symbol: symbol.0.clone(),
            stop_loss_percentage: intention.stop_loss_percentage,
            take_profit_percentage: intention.take_profit_percentage,
            parent_schedule_id: None,
        };

        // Buy leg. Nothing is persisted when it fails.
        let buy = self
            .gateway
            .create_schedule(&server, &buy_request)
            .await
            .map_err(|source| OrchestrateError::RemoteScheduleFailed {
                leg: Leg::Buy,
                source,
            })?;
        info!(buy_id = %buy.id.0, "remote buy schedule created");

        // Linked sell leg. A failure here leaves an orphaned remote buy
        // schedule, which must be recorded rather than dropped.
        let sell_request = buy_request.linked_sell(window.sell_time, buy.id.clone());
        match self.gateway.create_schedule(&server, &sell_request).await {
            Ok(sell) => {
                info!(sell_id = %sell.id.0, "remote sell schedule created");
                self.store
                    .insert_schedule(&NewSchedule {
                        intention_id: intention.id,
                        buy_datetime: window.buy_time,
                        sell_datetime: window.sell_time,
                        status: ScheduleStatus::Scheduled,
                        server_schedule_buy_id: Some(buy.id),
                        server_schedule_sell_id: Some(sell.id),
                    })
                    .map_err(OrchestrateError::Store)
            }
            Err(source) => {
                warn!(
                    buy_id = %buy.id.0,
                    error = %source,
                    "sell leg failed; recording partial schedule"
                );
                self.store
                    .insert_schedule(&NewSchedule {
                        intention_id: intention.id,
                        buy_datetime: window.buy_time,
                        sell_datetime: window.sell_time,
                        status: ScheduleStatus::SellFailed,
                        server_schedule_buy_id: Some(buy.id),
                        server_schedule_sell_id: None,
                    })
                    .map_err(OrchestrateError::Store)?;
                Err(OrchestrateError::RemoteScheduleFailed {
                    leg: Leg::Sell,
                    source,
                })
            }
        }
    }

    /// Session + analysis on the host, returning the enhanced rate set.
    async fn run_host_analysis(
        &self,
        intention: &crate::types::Intention,
        case: &crate::types::CaseRecord,
        catalog: &crate::types::Catalog,
    ) -> anyhow::Result<Vec<crate::analysis::EnhancedRate>> {
        let session = self
            .host
            .create_session(case.host_case_id, &intention.intention, &intention.description)
            .await?;
        let analysis = self
            .host
            .create_analysis(session.id, catalog.host_catalog_id, &intention.description)
            .await?;
        let rates = self
            .host
            .list_rates_from_catalog(catalog.host_catalog_id)
            .await?;

        let check_gv = self.host.get_setting(SETTING_CHECK_GV).await?;
        let advanced = self.host.get_setting(SETTING_ADVANCED).await?;

        let enhanced = self.analysis.analyze(
            analysis.id,
            &rates,
            self.random.as_ref(),
            check_gv,
            advanced,
        )?;
        self.host
            .insert_rates_for_analysis(analysis.id, &enhanced)
            .await?;
        Ok(enhanced)
    }

    /// Join the provider's mirrored remote id against the server's live
    /// provider listing. A transport failure falls back to the mirrored
    /// record; this is the only call with a fallback.
    async fn resolve_remote_provider(
        &self,
        server: &crate::types::Server,
        provider: &crate::types::Provider,
    ) -> Result<RemoteProviderId, OrchestrateError> {
        match self.gateway.list_providers(server).await {
            Ok(remote) => remote
                .into_iter()
                .find(|p| p.id.0 == provider.server_provider_id)
                .map(|p| p.id)
                .ok_or(OrchestrateError::ProviderLinkMissing),
            Err(GatewayError::Unavailable(err)) => {
                warn!(
                    error = %err,
                    "provider listing unreachable, using locally mirrored provider id"
                );
                if provider.server_provider_id.is_empty() {
                    Err(OrchestrateError::ProviderLinkMissing)
                } else {
                    Ok(RemoteProviderId(provider.server_provider_id.clone()))
                }
            }
            Err(err) => {
                warn!(error = %err, "provider listing rejected");
                Err(OrchestrateError::ProviderLinkMissing)
            }
        }
    }
}

/// Truncated intention text plus the chosen symbol, on a char boundary.
fn order_name(intention_text: &str, symbol: &str) -> String {
    let truncated = match intention_text.char_indices().nth(ORDER_NAME_TEXT_CHARS) {
        Some((idx, _)) => &intention_text[..idx],
        None => intention_text,
    };
    format!("{} {}", truncated.trim_end(), symbol)
        .trim()
        .to_string()
}
