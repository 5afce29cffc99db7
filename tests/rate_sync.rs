mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;

use common::{MockGateway, StubHost};
use intention_trading_bot::store::{LocalStore, NewProvider, NewServer};
use intention_trading_bot::sync::{sync_provider_rates, SyncError};
use intention_trading_bot::types::{Entity, ProviderId};

struct Fixture {
    store: Arc<LocalStore>,
    host: Arc<StubHost>,
    provider_id: ProviderId,
}

fn fixture() -> Fixture {
    let store = Arc::new(LocalStore::open_in_memory().unwrap());
    let server = store
        .insert_server(&NewServer {
            url: "http://trade.local".into(),
            description: String::new(),
            api_key: "key".into(),
        })
        .unwrap();
    store.select_server(Some(server.id)).unwrap();

    let provider = store
        .insert_provider(&NewProvider {
            name: "Binance".into(),
            server_provider_id: "42".into(),
            server_id: server.id,
            url: String::new(),
            api_key: String::new(),
            exchange_id: "binance".into(),
        })
        .unwrap();

    Fixture {
        store,
        host: Arc::new(StubHost::new()),
        provider_id: provider.id,
    }
}

#[tokio::test]
async fn reconciles_membership_by_signature() {
    let fx = fixture();
    let catalog_id = fx.host.seed_catalog("binance", &["A", "B", "C"]);
    let gateway = MockGateway::new().with_symbols(&["B", "C", "D"]);

    let report = sync_provider_rates(
        &fx.store,
        fx.host.as_ref(),
        &gateway,
        fx.provider_id,
    )
    .await
    .unwrap();

    assert_eq!(report.deleted, 1);
    assert_eq!(report.inserted, 1);
    assert_eq!(report.total_in_catalog, 3);

    let mut signatures = fx.host.signatures(catalog_id);
    signatures.sort();
    assert_eq!(signatures, vec!["B", "C", "D"]);
}

#[tokio::test]
async fn second_run_with_unchanged_remote_is_a_noop() {
    let fx = fixture();
    fx.host.seed_catalog("binance", &["A", "B"]);
    let gateway = MockGateway::new().with_symbols(&["B", "C"]);

    let first = sync_provider_rates(&fx.store, fx.host.as_ref(), &gateway, fx.provider_id)
        .await
        .unwrap();
    assert_eq!((first.inserted, first.deleted), (1, 1));

    let second = sync_provider_rates(&fx.store, fx.host.as_ref(), &gateway, fx.provider_id)
        .await
        .unwrap();
    assert_eq!((second.inserted, second.deleted), (0, 0));
    assert_eq!(second.total_in_catalog, 2);
}

#[tokio::test]
async fn creates_catalog_named_after_exchange_when_absent() {
    let fx = fixture();
    let gateway = MockGateway::new().with_symbols(&["BTCUSDT", "ETHUSDT"]);

    let report = sync_provider_rates(&fx.store, fx.host.as_ref(), &gateway, fx.provider_id)
        .await
        .unwrap();

    assert_eq!(report.inserted, 2);
    assert_eq!(report.total_in_catalog, 2);

    // Host-side catalog exists and the local mirror points at it.
    let host_catalog = fx
        .host
        .state
        .lock()
        .catalogs
        .iter()
        .find(|c| c.name == "binance")
        .cloned()
        .unwrap();
    let mirrored = fx
        .store
        .list_catalogs()
        .unwrap()
        .into_iter()
        .find(|c| c.host_catalog_id == host_catalog.id)
        .unwrap();
    assert_eq!(mirrored.name, "binance");
    assert_eq!(mirrored.id, report.catalog_id);
}

#[tokio::test]
async fn strips_quotes_and_duplicates_from_remote_symbols() {
    let fx = fixture();
    let catalog_id = fx.host.seed_catalog("binance", &[]);
    let gateway = MockGateway::new().with_symbols(&["\"BTCUSDT\"", "'ETHUSDT'", "BTCUSDT", ""]);

    let report = sync_provider_rates(&fx.store, fx.host.as_ref(), &gateway, fx.provider_id)
        .await
        .unwrap();

    assert_eq!(report.inserted, 2);
    let mut signatures = fx.host.signatures(catalog_id);
    signatures.sort();
    assert_eq!(signatures, vec!["BTCUSDT", "ETHUSDT"]);
}

#[tokio::test]
async fn symbol_listing_failure_is_upstream_error() {
    let fx = fixture();
    fx.host.seed_catalog("binance", &["A"]);
    let gateway = MockGateway::new();
    gateway.push_symbol_response(Err(MockGateway::rejected(502)));

    let err = sync_provider_rates(&fx.store, fx.host.as_ref(), &gateway, fx.provider_id)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Upstream(_)));

    // The stale local rate is untouched when the listing fails.
    assert_eq!(fx.host.signatures(intention_trading_bot::types::HostCatalogId(1)).len(), 1);
}

#[tokio::test]
async fn unknown_provider_is_not_found() {
    let fx = fixture();
    let gateway = MockGateway::new();

    let err = sync_provider_rates(&fx.store, fx.host.as_ref(), &gateway, ProviderId(404))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::NotFound(Entity::Provider)));
}

#[tokio::test]
async fn missing_selected_server_is_not_found() {
    let fx = fixture();
    fx.store.select_server(None).unwrap();
    let gateway = MockGateway::new().with_symbols(&["BTCUSDT"]);

    let err = sync_provider_rates(&fx.store, fx.host.as_ref(), &gateway, fx.provider_id)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::NotFound(Entity::Server)));
}
