//! Catalog/rate reconciliation against a provider's remote symbol list.
//!
//! Membership is keyed on the rate signature. The pass deletes local rates
//! the provider no longer offers, then inserts the symbols it newly offers;
//! running it twice against unchanged remote data is a no-op.

use std::collections::HashSet;

use anyhow::Error as HostError;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::gateway::{GatewayError, TradingApi};
use crate::host::HostService;
use crate::store::LocalStore;
use crate::types::{CatalogId, Entity, ProviderId, Symbol};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{0} not found")]
    NotFound(Entity),
    /// The trading API could not deliver the symbol listing.
    #[error("upstream unavailable: {0}")]
    Upstream(#[source] GatewayError),
    #[error("host error: {0}")]
    Host(HostError),
    #[error("store error: {0}")]
    Store(HostError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub catalog_id: CatalogId,
    pub inserted: usize,
    pub deleted: usize,
    pub total_in_catalog: usize,
}

/// Reconcile the catalog named after the provider's exchange against the
/// provider's current symbol list.
pub async fn sync_provider_rates(
    store: &LocalStore,
    host: &dyn HostService,
    gateway: &dyn TradingApi,
    provider_id: ProviderId,
) -> Result<SyncReport, SyncError> {
    let provider = store
        .get_provider(provider_id)
        .map_err(SyncError::Store)?
        .ok_or(SyncError::NotFound(Entity::Provider))?;
    let server = store
        .selected_server()
        .map_err(SyncError::Store)?
        .ok_or(SyncError::NotFound(Entity::Server))?;

    let raw_symbols = gateway
        .list_symbols(&server, &provider.exchange_id)
        .await
        .map_err(SyncError::Upstream)?;

    // Remote symbols arrive possibly quoted; normalize and drop duplicates
    // while keeping the listing order for inserts.
    let mut remote_order: Vec<String> = Vec::with_capacity(raw_symbols.len());
    let mut remote: HashSet<String> = HashSet::with_capacity(raw_symbols.len());
    for symbol in &raw_symbols {
        let normalized = normalize_symbol(&symbol.0);
        if normalized.is_empty() {
            continue;
        }
        if remote.insert(normalized.clone()) {
            remote_order.push(normalized);
        }
    }

    // The catalog is named after the exchange; create it on first sync.
    let host_catalog = match host
        .get_catalog_by_name(&provider.exchange_id)
        .await
        .map_err(SyncError::Host)?
    {
        Some(catalog) => catalog,
        None => host
            .insert_catalog(
                &provider.exchange_id,
                &format!("Symbols offered by {}", provider.name),
            )
            .await
            .map_err(SyncError::Host)?,
    };
    let catalog = store
        .upsert_catalog(&host_catalog.name, host_catalog.id)
        .map_err(SyncError::Store)?;

    // Pass 1: drop local rates the provider no longer offers.
    let mut deleted = 0usize;
    for rate in host
        .list_rates_from_catalog(host_catalog.id)
        .await
        .map_err(SyncError::Host)?
    {
        if !remote.contains(&rate.signature.0) {
            host.delete_rate(rate.id).await.map_err(SyncError::Host)?;
            deleted += 1;
        }
    }

    // Pass 2: insert remote symbols missing from the pruned local set.
    let local: HashSet<String> = host
        .list_rates_from_catalog(host_catalog.id)
        .await
        .map_err(SyncError::Host)?
        .into_iter()
        .map(|rate| rate.signature.0)
        .collect();
    let mut inserted = 0usize;
    for signature in &remote_order {
        if !local.contains(signature) {
            host.insert_rate(host_catalog.id, &Symbol(signature.clone()))
                .await
                .map_err(SyncError::Host)?;
            inserted += 1;
        }
    }

    let total_in_catalog = host
        .list_rates_from_catalog(host_catalog.id)
        .await
        .map_err(SyncError::Host)?
        .len();

    info!(
        provider = %provider.name,
        exchange = %provider.exchange_id,
        inserted,
        deleted,
        total_in_catalog,
        "rate sync finished"
    );

    Ok(SyncReport {
        catalog_id: catalog.id,
        inserted,
        deleted,
        total_in_catalog,
    })
}

fn normalize_symbol(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_surrounding_quotes() {
        assert_eq!(normalize_symbol("\"BTCUSDT\""), "BTCUSDT");
        assert_eq!(normalize_symbol("'ETHUSDT'"), "ETHUSDT");
        assert_eq!(normalize_symbol(" SOLUSDT "), "SOLUSDT");
        assert_eq!(normalize_symbol("XRPUSDT"), "XRPUSDT");
    }
}
