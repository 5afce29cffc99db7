#![allow(dead_code)] // not every test crate uses every double

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;

use intention_trading_bot::analysis::{AnalysisEngine, EnhancedRate};
use intention_trading_bot::gateway::{
    GatewayError, RemoteProvider, RemoteSchedule, ScheduleRequest, TradingApi,
};
use intention_trading_bot::host::{HostAnalysis, HostCase, HostCatalog, HostService, HostSession, Rate};
use intention_trading_bot::random::RandomSource;
use intention_trading_bot::types::{
    HostAnalysisId, HostCaseId, HostCatalogId, HostRateId, HostSessionId, RemoteScheduleId, Server,
    Symbol,
};

/// In-memory host collaborator.
#[derive(Default)]
pub struct StubHost {
    pub state: Mutex<HostState>,
}

#[derive(Default)]
pub struct HostState {
    next_id: i64,
    pub catalogs: Vec<HostCatalog>,
    /// Rates per host catalog id.
    pub rates: HashMap<i64, Vec<Rate>>,
    pub sessions_created: usize,
    pub analyses_created: usize,
    pub analysis_rates: Vec<EnhancedRate>,
    pub settings: HashMap<String, bool>,
    /// When set, session creation fails, poisoning the analysis pipeline.
    pub fail_sessions: bool,
}

impl StubHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a catalog with rates and return its host id.
    pub fn seed_catalog(&self, name: &str, signatures: &[&str]) -> HostCatalogId {
        let mut state = self.state.lock();
        state.next_id += 1;
        let catalog_id = state.next_id;
        state.catalogs.push(HostCatalog {
            id: HostCatalogId(catalog_id),
            name: name.to_string(),
        });
        let rates = signatures
            .iter()
            .map(|sig| {
                state.next_id += 1;
                Rate {
                    id: HostRateId(state.next_id),
                    signature: Symbol(sig.to_string()),
                }
            })
            .collect();
        state.rates.insert(catalog_id, rates);
        HostCatalogId(catalog_id)
    }

    pub fn signatures(&self, catalog_id: HostCatalogId) -> Vec<String> {
        self.state
            .lock()
            .rates
            .get(&catalog_id.0)
            .map(|rates| rates.iter().map(|r| r.signature.0.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl HostService for StubHost {
    async fn create_case(&self, name: &str) -> Result<HostCase> {
        let mut state = self.state.lock();
        state.next_id += 1;
        Ok(HostCase {
            id: HostCaseId(state.next_id),
            name: name.to_string(),
        })
    }

    async fn create_session(
        &self,
        _case_id: HostCaseId,
        _intention: &str,
        _description: &str,
    ) -> Result<HostSession> {
        let mut state = self.state.lock();
        if state.fail_sessions {
            bail!("host refused the session");
        }
        state.next_id += 1;
        state.sessions_created += 1;
        Ok(HostSession {
            id: HostSessionId(state.next_id),
        })
    }

    async fn create_analysis(
        &self,
        _session_id: HostSessionId,
        _catalog_id: HostCatalogId,
        _note: &str,
    ) -> Result<HostAnalysis> {
        let mut state = self.state.lock();
        state.next_id += 1;
        state.analyses_created += 1;
        Ok(HostAnalysis {
            id: HostAnalysisId(state.next_id),
        })
    }

    async fn list_rates_from_catalog(&self, catalog_id: HostCatalogId) -> Result<Vec<Rate>> {
        Ok(self
            .state
            .lock()
            .rates
            .get(&catalog_id.0)
            .cloned()
            .unwrap_or_default())
    }

    async fn insert_rates_for_analysis(
        &self,
        _analysis_id: HostAnalysisId,
        rates: &[EnhancedRate],
    ) -> Result<()> {
        self.state.lock().analysis_rates.extend_from_slice(rates);
        Ok(())
    }

    async fn get_catalog_by_name(&self, name: &str) -> Result<Option<HostCatalog>> {
        Ok(self
            .state
            .lock()
            .catalogs
            .iter()
            .find(|c| c.name == name)
            .cloned())
    }

    async fn insert_catalog(&self, name: &str, _description: &str) -> Result<HostCatalog> {
        let mut state = self.state.lock();
        state.next_id += 1;
        let catalog = HostCatalog {
            id: HostCatalogId(state.next_id),
            name: name.to_string(),
        };
        state.catalogs.push(catalog.clone());
        state.rates.insert(catalog.id.0, Vec::new());
        Ok(catalog)
    }

    async fn list_catalogs(&self) -> Result<Vec<HostCatalog>> {
        Ok(self.state.lock().catalogs.clone())
    }

    async fn insert_rate(&self, catalog_id: HostCatalogId, signature: &Symbol) -> Result<Rate> {
        let mut state = self.state.lock();
        state.next_id += 1;
        let rate = Rate {
            id: HostRateId(state.next_id),
            signature: signature.clone(),
        };
        state
            .rates
            .entry(catalog_id.0)
            .or_default()
            .push(rate.clone());
        Ok(rate)
    }

    async fn delete_rate(&self, rate_id: HostRateId) -> Result<()> {
        let mut state = self.state.lock();
        for rates in state.rates.values_mut() {
            rates.retain(|r| r.id != rate_id);
        }
        Ok(())
    }

    async fn get_setting(&self, key: &str) -> Result<bool> {
        Ok(self.state.lock().settings.get(key).copied().unwrap_or(false))
    }
}

/// Analysis double returning a canned result set.
pub struct FixedAnalysis {
    pub rates: Vec<EnhancedRate>,
}

impl FixedAnalysis {
    pub fn new(rates: Vec<EnhancedRate>) -> Self {
        Self { rates }
    }
}

impl AnalysisEngine for FixedAnalysis {
    fn analyze(
        &self,
        _analysis_id: HostAnalysisId,
        _rates: &[Rate],
        _random: &dyn RandomSource,
        _check_gv: bool,
        _advanced: bool,
    ) -> Result<Vec<EnhancedRate>> {
        Ok(self.rates.clone())
    }
}

pub struct FixedRandom(pub i64);

impl RandomSource for FixedRandom {
    fn next_int(&self, _min: i64, _max: i64) -> i64 {
        self.0
    }
}

pub fn enhanced(sig: &str, value: i64) -> EnhancedRate {
    EnhancedRate {
        signature: Symbol(sig.to_string()),
        value,
        energetic_value: value,
        gv: 500,
    }
}

/// Scriptable trading-API double.
///
/// Responses pop from per-call queues; an empty queue falls back to the
/// defaults (providers/symbols) or to an auto-generated schedule id.
#[derive(Default)]
pub struct MockGateway {
    pub default_providers: Vec<RemoteProvider>,
    pub default_symbols: Vec<Symbol>,
    pub provider_responses: Mutex<VecDeque<Result<Vec<RemoteProvider>, GatewayError>>>,
    pub symbol_responses: Mutex<VecDeque<Result<Vec<Symbol>, GatewayError>>>,
    pub schedule_responses: Mutex<VecDeque<Result<RemoteSchedule, GatewayError>>>,
    pub schedule_calls: Mutex<Vec<ScheduleRequest>>,
    pub provider_list_calls: AtomicUsize,
    pub symbol_list_calls: AtomicUsize,
    next_schedule: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_providers(mut self, providers: Vec<RemoteProvider>) -> Self {
        self.default_providers = providers;
        self
    }

    pub fn with_symbols(mut self, symbols: &[&str]) -> Self {
        self.default_symbols = symbols.iter().map(|s| Symbol(s.to_string())).collect();
        self
    }

    pub fn push_schedule_response(&self, response: Result<RemoteSchedule, GatewayError>) {
        self.schedule_responses.lock().push_back(response);
    }

    pub fn push_provider_response(
        &self,
        response: Result<Vec<RemoteProvider>, GatewayError>,
    ) {
        self.provider_responses.lock().push_back(response);
    }

    pub fn push_symbol_response(&self, response: Result<Vec<Symbol>, GatewayError>) {
        self.symbol_responses.lock().push_back(response);
    }

    pub fn rejected(status: u16) -> GatewayError {
        GatewayError::Rejected {
            status,
            body: String::new(),
        }
    }
}

#[async_trait]
impl TradingApi for MockGateway {
    async fn list_providers(&self, _server: &Server) -> Result<Vec<RemoteProvider>, GatewayError> {
        self.provider_list_calls.fetch_add(1, Ordering::SeqCst);
        match self.provider_responses.lock().pop_front() {
            Some(response) => response,
            None => Ok(self.default_providers.clone()),
        }
    }

    async fn list_symbols(
        &self,
        _server: &Server,
        _exchange_id: &str,
    ) -> Result<Vec<Symbol>, GatewayError> {
        self.symbol_list_calls.fetch_add(1, Ordering::SeqCst);
        match self.symbol_responses.lock().pop_front() {
            Some(response) => response,
            None => Ok(self.default_symbols.clone()),
        }
    }

    async fn create_schedule(
        &self,
        _server: &Server,
        request: &ScheduleRequest,
    ) -> Result<RemoteSchedule, GatewayError> {
        self.schedule_calls.lock().push(request.clone());
        match self.schedule_responses.lock().pop_front() {
            Some(response) => response,
            None => {
                let n = self.next_schedule.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(RemoteSchedule {
                    id: RemoteScheduleId(format!("remote-{n}")),
                })
            }
        }
    }
}
