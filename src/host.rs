//! Host case/session/analysis collaborator.
//!
//! The host system owns cases, sessions, analyses, catalogs and their rates;
//! this module speaks its JSON API and exposes the consumed slice of it as a
//! trait so the orchestrator and rate sync can run against test doubles. Host
//! identifiers never mix with plugin-local row ids.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::analysis::EnhancedRate;
use crate::types::{HostAnalysisId, HostCaseId, HostCatalogId, HostRateId, HostSessionId, Symbol};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HostCase {
    pub id: HostCaseId,
    pub name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HostSession {
    pub id: HostSessionId,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HostAnalysis {
    pub id: HostAnalysisId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HostCatalog {
    pub id: HostCatalogId,
    pub name: String,
}

/// A tradable symbol inside a host catalog. Opaque to the core except for its
/// signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rate {
    pub id: HostRateId,
    pub signature: Symbol,
}

#[async_trait]
pub trait HostService: Send + Sync {
    async fn create_case(&self, name: &str) -> Result<HostCase>;
    async fn create_session(
        &self,
        case_id: HostCaseId,
        intention: &str,
        description: &str,
    ) -> Result<HostSession>;
    async fn create_analysis(
        &self,
        session_id: HostSessionId,
        catalog_id: HostCatalogId,
        note: &str,
    ) -> Result<HostAnalysis>;
    async fn list_rates_from_catalog(&self, catalog_id: HostCatalogId) -> Result<Vec<Rate>>;
    async fn insert_rates_for_analysis(
        &self,
        analysis_id: HostAnalysisId,
        rates: &[EnhancedRate],
    ) -> Result<()>;
    async fn get_catalog_by_name(&self, name: &str) -> Result<Option<HostCatalog>>;
    async fn insert_catalog(&self, name: &str, description: &str) -> Result<HostCatalog>;
    async fn list_catalogs(&self) -> Result<Vec<HostCatalog>>;
    async fn insert_rate(&self, catalog_id: HostCatalogId, signature: &Symbol) -> Result<Rate>;
    async fn delete_rate(&self, rate_id: HostRateId) -> Result<()>;
    /// Boolean settings default to false when the key is absent.
    async fn get_setting(&self, key: &str) -> Result<bool>;
}

/// HTTP client against the host's JSON API.
pub struct HttpHostClient {
    base: String,
    client: reqwest::Client,
}

impl HttpHostClient {
    pub fn new(base_url: &str, client: reqwest::Client) -> Self {
        Self {
            base: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

#[async_trait]
impl HostService for HttpHostClient {
    async fn create_case(&self, name: &str) -> Result<HostCase> {
        let resp = self
            .client
            .post(self.url("/case"))
            .json(&json!({ "name": name }))
            .send()
            .await
            .context("POST /case")?
            .error_for_status()
            .context("POST /case status")?;
        resp.json().await.context("parse /case json")
    }

    async fn create_session(
        &self,
        case_id: HostCaseId,
        intention: &str,
        description: &str,
    ) -> Result<HostSession> {
        let resp = self
            .client
            .post(self.url("/session"))
            .json(&json!({
                "caseId": case_id.0,
                "intention": intention,
                "description": description,
            }))
            .send()
            .await
            .context("POST /session")?
            .error_for_status()
            .context("POST /session status")?;
        resp.json().await.context("parse /session json")
    }

    async fn create_analysis(
        &self,
        session_id: HostSessionId,
        catalog_id: HostCatalogId,
        note: &str,
    ) -> Result<HostAnalysis> {
        let resp = self
            .client
            .post(self.url("/analysis"))
            .json(&json!({
                "sessionId": session_id.0,
                "catalogId": catalog_id.0,
                "note": note,
            }))
            .send()
            .await
            .context("POST /analysis")?
            .error_for_status()
            .context("POST /analysis status")?;
        resp.json().await.context("parse /analysis json")
    }

    async fn list_rates_from_catalog(&self, catalog_id: HostCatalogId) -> Result<Vec<Rate>> {
        let resp = self
            .client
            .get(self.url(&format!("/catalog/{}/rates", catalog_id.0)))
            .send()
            .await
            .context("GET catalog rates")?
            .error_for_status()
            .context("GET catalog rates status")?;
        resp.json().await.context("parse catalog rates json")
    }

    async fn insert_rates_for_analysis(
        &self,
        analysis_id: HostAnalysisId,
        rates: &[EnhancedRate],
    ) -> Result<()> {
        self.client
            .post(self.url(&format!("/analysis/{}/rates", analysis_id.0)))
            .json(rates)
            .send()
            .await
            .context("POST analysis rates")?
            .error_for_status()
            .context("POST analysis rates status")?;
        Ok(())
    }

    async fn get_catalog_by_name(&self, name: &str) -> Result<Option<HostCatalog>> {
        let resp = self
            .client
            .get(self.url("/catalog"))
            .query(&[("name", name)])
            .send()
            .await
            .context("GET /catalog")?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = resp.error_for_status().context("GET /catalog status")?;
        Ok(Some(resp.json().await.context("parse /catalog json")?))
    }

    async fn insert_catalog(&self, name: &str, description: &str) -> Result<HostCatalog> {
        let resp = self
            .client
            .post(self.url("/catalog"))
            .json(&json!({ "name": name, "description": description }))
            .send()
            .await
            .context("POST /catalog")?
            .error_for_status()
            .context("POST /catalog status")?;
        resp.json().await.context("parse /catalog json")
    }

    async fn list_catalogs(&self) -> Result<Vec<HostCatalog>> {
        let resp = self
            .client
            .get(self.url("/catalogs"))
            .send()
            .await
            .context("GET /catalogs")?
            .error_for_status()
            .context("GET /catalogs status")?;
        resp.json().await.context("parse /catalogs json")
    }

    async fn insert_rate(&self, catalog_id: HostCatalogId, signature: &Symbol) -> Result<Rate> {
        let resp = self
            .client
            .post(self.url(&format!("/catalog/{}/rate", catalog_id.0)))
            .json(&json!({ "signature": signature.0 }))
            .send()
            .await
            .context("POST catalog rate")?
            .error_for_status()
            .context("POST catalog rate status")?;
        resp.json().await.context("parse catalog rate json")
    }

    async fn delete_rate(&self, rate_id: HostRateId) -> Result<()> {
        self.client
            .delete(self.url(&format!("/rate/{}", rate_id.0)))
            .send()
            .await
            .context("DELETE rate")?
            .error_for_status()
            .context("DELETE rate status")?;
        Ok(())
    }

    async fn get_setting(&self, key: &str) -> Result<bool> {
        let resp = self
            .client
            .get(self.url(&format!("/settings/{key}")))
            .send()
            .await
            .context("GET setting")?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }
        let body: serde_json::Value = resp
            .error_for_status()
            .context("GET setting status")?
            .json()
            .await
            .context("parse setting json")?;
        Ok(body
            .pointer("/value")
            .and_then(|v| v.as_bool())
            .unwrap_or(false))
    }
}
