mod common;

use common::{renamed_users_data, users_data, users_query};
use incridea_cache::{CacheInstanceManager, ExecutionContext, Selection, StoreHandle};
use incridea_query::transport::mock::MockTransport;
use incridea_query::{
    ExecutorConfig, FetchPolicy, QueryDescriptor, QueryError, QueryExecutor, QueryStatus,
    Revalidate, ViewScope,
};
use incridea_types::EntityKey;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn executor(transport: &Arc<MockTransport>) -> QueryExecutor {
    QueryExecutor::new(transport.clone())
}

async fn warm_store(transport: &Arc<MockTransport>) -> StoreHandle {
    let store = StoreHandle::new();
    let state = executor(transport)
        .execute(&users_query(FetchPolicy::NetworkOnly), &store, &ViewScope::new())
        .await;
    assert!(state.is_success());
    store
}

// ── cache-first ──────────────────────────────────────────────────

#[tokio::test]
async fn cache_first_miss_fetches_and_merges() {
    let transport = Arc::new(MockTransport::new().respond_with(users_data()));
    let store = StoreHandle::new();

    let state = executor(&transport)
        .execute(&users_query(FetchPolicy::CacheFirst), &store, &ViewScope::new())
        .await;

    assert_eq!(state.status, QueryStatus::Success);
    assert_eq!(state.data, Some(users_data()));
    assert_eq!(transport.calls(), 1);
    assert!(store.get(&EntityKey::new("User", "1")).is_some());
}

#[tokio::test]
async fn cache_first_hit_never_fetches() {
    let transport = Arc::new(MockTransport::new().respond_with(users_data()));
    let store = warm_store(&transport).await;
    assert_eq!(transport.calls(), 1);

    let state = executor(&transport)
        .execute(&users_query(FetchPolicy::CacheFirst), &store, &ViewScope::new())
        .await;

    assert!(state.is_success());
    assert_eq!(state.data, Some(users_data()));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn read_cached_is_synchronous() {
    let transport = Arc::new(MockTransport::new().respond_with(users_data()));
    let store = warm_store(&transport).await;
    let exec = executor(&transport);

    assert_eq!(
        exec.read_cached(&users_query(FetchPolicy::CacheFirst), &store),
        Some(users_data())
    );
    assert!(exec
        .read_cached(&users_query(FetchPolicy::CacheFirst), &StoreHandle::new())
        .is_none());
}

#[tokio::test(start_paused = true)]
async fn cache_first_refetches_expired_data() {
    let transport = Arc::new(MockTransport::new().respond_with(users_data()));
    let exec = QueryExecutor::with_config(
        transport.clone(),
        ExecutorConfig {
            cache_ttl: Some(Duration::from_secs(60)),
            ..Default::default()
        },
    );
    let store = StoreHandle::new();
    let query = users_query(FetchPolicy::CacheFirst);

    exec.execute(&query, &store, &ViewScope::new()).await;
    exec.execute(&query, &store, &ViewScope::new()).await;
    assert_eq!(transport.calls(), 1);

    tokio::time::advance(Duration::from_secs(61)).await;
    exec.execute(&query, &store, &ViewScope::new()).await;
    assert_eq!(transport.calls(), 2);

    // Unchanged data from the network still counts as fresh.
    exec.execute(&query, &store, &ViewScope::new()).await;
    assert_eq!(transport.calls(), 2);
}

// ── network-only ─────────────────────────────────────────────────

#[tokio::test]
async fn network_only_always_fetches() {
    let transport = Arc::new(MockTransport::new().respond_with(users_data()));
    let store = warm_store(&transport).await;

    let exec = executor(&transport);
    exec.execute(&users_query(FetchPolicy::NetworkOnly), &store, &ViewScope::new())
        .await;
    exec.execute(&users_query(FetchPolicy::NetworkOnly), &store, &ViewScope::new())
        .await;

    assert_eq!(transport.calls(), 3);
}

#[tokio::test]
async fn network_only_merges_new_values() {
    let transport = Arc::new(MockTransport::new().respond_with(users_data()));
    let store = warm_store(&transport).await;
    transport.queue_data(renamed_users_data());

    let state = executor(&transport)
        .execute(&users_query(FetchPolicy::NetworkOnly), &store, &ViewScope::new())
        .await;

    assert_eq!(state.data, Some(renamed_users_data()));
    assert_eq!(
        store.get(&EntityKey::new("User", "2")).unwrap().get("name"),
        Some(&incridea_types::FieldValue::scalar("Grace Hopper"))
    );
}

#[tokio::test]
async fn request_carries_operation_and_variables() {
    let transport = Arc::new(MockTransport::new().respond_with(users_data()));
    let query = users_query(FetchPolicy::NetworkOnly).with_variable("first", 10);

    executor(&transport)
        .execute(&query, &StoreHandle::new(), &ViewScope::new())
        .await;

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].operation_name, "GetAllUsers");
    assert_eq!(requests[0].variables.get("first"), Some(&json!(10)));
}

// ── failures ─────────────────────────────────────────────────────

#[tokio::test]
async fn network_failure_leaves_store_untouched() {
    let transport = Arc::new(MockTransport::new().respond_with(users_data()));
    let store = warm_store(&transport).await;
    let before = store.extract();
    transport.queue_failure("connection reset");

    let state = executor(&transport)
        .execute(&users_query(FetchPolicy::NetworkOnly), &store, &ViewScope::new())
        .await;

    assert_eq!(state.status, QueryStatus::Error);
    assert!(state.error.as_ref().unwrap().is_network());
    // Stale but consistent data is still offered.
    assert_eq!(state.data, Some(users_data()));
    assert_eq!(store.extract(), before);
}

#[tokio::test]
async fn failure_on_empty_store_has_no_data() {
    let transport = Arc::new(MockTransport::new().fail_with("offline"));
    let store = StoreHandle::new();

    let state = executor(&transport)
        .execute(&users_query(FetchPolicy::CacheFirst), &store, &ViewScope::new())
        .await;

    assert!(state.is_error());
    assert!(state.data.is_none());
    assert!(store.is_empty());
}

#[tokio::test]
async fn malformed_result_is_rejected_without_partial_write() {
    let transport = Arc::new(MockTransport::new().respond_with(users_data()));
    let store = warm_store(&transport).await;
    let before = store.extract();
    transport.queue_data(json!({
        "users": [
            {"__typename": "User", "id": "3", "name": "Linus"},
            {"__typename": "Bad:Tag", "id": "4", "name": "Nobody"}
        ]
    }));

    let state = executor(&transport)
        .execute(&users_query(FetchPolicy::NetworkOnly), &store, &ViewScope::new())
        .await;

    assert!(state.is_error());
    assert!(matches!(state.error.as_deref(), Some(QueryError::Cache(_))));
    assert_eq!(state.data, Some(users_data()));
    assert_eq!(store.extract(), before);
}

#[tokio::test]
async fn entities_of_different_types_may_share_an_id() {
    let selection = Selection::new()
        .object("users", Selection::new().scalar("__typename").scalar("id").scalar("name"))
        .object("events", Selection::new().scalar("__typename").scalar("id").scalar("title"));
    let query = QueryDescriptor::new(
        "Dashboard",
        "query Dashboard { users { __typename id name } events { __typename id title } }",
        selection,
    )
    .with_policy(FetchPolicy::NetworkOnly);
    let data = json!({
        "users": [{"__typename": "User", "id": "1", "name": "Ada"}],
        "events": [{"__typename": "Event", "id": "1", "title": "Hackathon"}]
    });
    let transport = Arc::new(MockTransport::new().respond_with(data.clone()));
    let store = StoreHandle::new();

    let state = executor(&transport)
        .execute(&query, &store, &ViewScope::new())
        .await;

    assert!(state.is_success());
    assert_eq!(state.data, Some(data));
    assert!(store.get(&EntityKey::new("User", "1")).is_some());
    assert!(store.get(&EntityKey::new("Event", "1")).is_some());
}

#[tokio::test(start_paused = true)]
async fn slow_fetch_times_out_as_network_error() {
    let transport = Arc::new(
        MockTransport::new()
            .respond_with(users_data())
            .with_delay(Duration::from_secs(10)),
    );
    let exec = QueryExecutor::with_config(
        transport.clone(),
        ExecutorConfig {
            request_timeout: Duration::from_secs(2),
            ..Default::default()
        },
    );
    let store = StoreHandle::new();

    let state = exec
        .execute(&users_query(FetchPolicy::NetworkOnly), &store, &ViewScope::new())
        .await;

    assert!(matches!(state.error.as_deref(), Some(QueryError::Timeout(_))));
    assert!(store.is_empty());
}

#[tokio::test]
async fn refetch_after_error_recovers() {
    let transport = Arc::new(MockTransport::new().respond_with(users_data()));
    transport.queue_failure("flaky");
    let store = StoreHandle::new();
    let exec = executor(&transport);
    let query = users_query(FetchPolicy::CacheFirst);

    assert!(exec.execute(&query, &store, &ViewScope::new()).await.is_error());
    let retried = exec.refetch(&query, &store, &ViewScope::new()).await;

    assert!(retried.is_success());
    assert_eq!(transport.calls(), 2);
}

// ── teardown ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn fetch_resolving_after_teardown_is_discarded() {
    let transport = Arc::new(
        MockTransport::new()
            .respond_with(users_data())
            .with_delay(Duration::from_secs(5)),
    );
    let exec = Arc::new(executor(&transport));
    let store = StoreHandle::new();
    let scope = ViewScope::new();

    let task = {
        let exec = exec.clone();
        let store = store.clone();
        let scope = scope.clone();
        tokio::spawn(async move {
            exec.execute(&users_query(FetchPolicy::NetworkOnly), &store, &scope)
                .await
        })
    };

    tokio::time::sleep(Duration::from_secs(1)).await;
    scope.teardown();
    let state = task.await.unwrap();

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(matches!(state.error.as_deref(), Some(QueryError::Cancelled)));
    assert_eq!(transport.calls(), 1);
    assert!(store.is_empty());
}

#[tokio::test]
async fn torn_down_scope_never_merges() {
    let transport = Arc::new(MockTransport::new().respond_with(users_data()));
    let store = StoreHandle::new();
    let scope = ViewScope::new();
    assert!(!scope.is_torn_down());
    scope.teardown();
    assert!(scope.is_torn_down());

    let state = executor(&transport)
        .execute(&users_query(FetchPolicy::NetworkOnly), &store, &scope)
        .await;

    assert!(state.is_error());
    assert!(store.is_empty());
}

// ── watch ────────────────────────────────────────────────────────

#[tokio::test]
async fn watch_moves_from_loading_to_success() {
    let transport = Arc::new(MockTransport::new().respond_with(users_data()));
    let exec = Arc::new(executor(&transport));

    let mut rx = exec.watch(
        users_query(FetchPolicy::CacheFirst),
        StoreHandle::new(),
        ViewScope::new(),
    );
    assert!(rx.borrow().is_loading());

    rx.changed().await.unwrap();
    let state = rx.borrow().clone();
    assert!(state.is_success());
    assert_eq!(state.data, Some(users_data()));
}

#[tokio::test]
async fn watch_serves_cache_hit_immediately() {
    let transport = Arc::new(MockTransport::new().respond_with(users_data()));
    let store = warm_store(&transport).await;
    let exec = Arc::new(executor(&transport));

    let rx = exec.watch(users_query(FetchPolicy::CacheFirst), store, ViewScope::new());

    assert!(rx.borrow().is_success());
    assert_eq!(transport.calls(), 1);
}

// ── hydration ordering ───────────────────────────────────────────

#[tokio::test]
async fn cache_first_waits_for_hydration_then_uses_it() {
    let transport = Arc::new(MockTransport::new().respond_with(users_data()));
    let server = warm_store(&transport).await;
    let snapshot = server.extract();

    let manager = CacheInstanceManager::new();
    let client = manager.resolve(ExecutionContext::Client);
    manager.expect_hydration(&client);

    let exec = Arc::new(executor(&transport));
    let mut rx = exec.watch(
        users_query(FetchPolicy::CacheFirst),
        client.clone(),
        ViewScope::new(),
    );
    assert!(rx.borrow().is_loading());

    tokio::task::yield_now().await;
    manager.hydrate(&client, &snapshot).unwrap();

    rx.changed().await.unwrap();
    assert!(rx.borrow().is_success());
    // Served from the hydrated store, no second fetch.
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn network_only_result_lands_after_pending_hydration() {
    let transport = Arc::new(MockTransport::new().respond_with(users_data()));
    let server = warm_store(&transport).await;
    let snapshot = server.extract();

    let manager = CacheInstanceManager::new();
    let client = manager.resolve(ExecutionContext::Client);
    manager.expect_hydration(&client);

    transport.queue_data(renamed_users_data());
    let exec = Arc::new(executor(&transport));
    let mut rx = exec.watch(
        users_query(FetchPolicy::NetworkOnly),
        client.clone(),
        ViewScope::new(),
    );

    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
    assert_eq!(transport.calls(), 2);
    assert!(rx.borrow().is_loading());
    assert!(client.is_empty());

    manager.hydrate(&client, &snapshot).unwrap();
    rx.changed().await.unwrap();

    assert_eq!(rx.borrow().data, Some(renamed_users_data()));
    assert_eq!(
        client.get(&EntityKey::new("User", "1")).unwrap().get("name"),
        Some(&incridea_types::FieldValue::scalar("Ada Lovelace"))
    );
}

#[tokio::test]
async fn refetch_waits_for_pending_hydration() {
    let transport = Arc::new(MockTransport::new().respond_with(users_data()));
    let snapshot = warm_store(&transport).await.extract();

    let manager = CacheInstanceManager::new();
    let client = manager.resolve(ExecutionContext::Client);
    manager.expect_hydration(&client);
    transport.queue_data(renamed_users_data());

    let task = {
        let exec = executor(&transport);
        let client = client.clone();
        tokio::spawn(async move {
            exec.refetch(&users_query(FetchPolicy::CacheFirst), &client, &ViewScope::new())
                .await
        })
    };
    tokio::task::yield_now().await;
    assert!(client.is_empty());

    manager.hydrate(&client, &snapshot).unwrap();
    let state = task.await.unwrap();

    assert_eq!(state.data, Some(renamed_users_data()));
}

#[tokio::test(start_paused = true)]
async fn replayed_hydration_does_not_revive_expired_cache() {
    let transport = Arc::new(MockTransport::new().respond_with(users_data()));
    let snapshot = warm_store(&transport).await.extract();
    let exec = QueryExecutor::with_config(
        transport.clone(),
        ExecutorConfig {
            cache_ttl: Some(Duration::from_secs(10)),
            ..Default::default()
        },
    );
    let manager = CacheInstanceManager::new();
    let client = manager.initialize(ExecutionContext::Client, Some(&snapshot)).unwrap();
    let query = users_query(FetchPolicy::CacheFirst);
    assert!(exec.read_cached(&query, &client).is_some());

    tokio::time::advance(Duration::from_secs(11)).await;
    assert!(exec.read_cached(&query, &client).is_none());

    let replay = manager.hydrate(&client, &snapshot).unwrap();
    assert!(replay.changed_keys.is_empty());
    assert!(exec.read_cached(&query, &client).is_none());
}

// ── prefetch-at-build ────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn prefetch_serves_shipped_data_until_interval_elapses() {
    let transport = Arc::new(MockTransport::new().respond_with(users_data()));
    let server = warm_store(&transport).await;

    let manager = CacheInstanceManager::new();
    let client = manager
        .initialize(ExecutionContext::Client, Some(&server.extract()))
        .unwrap();

    let exec = executor(&transport);
    let query = users_query(FetchPolicy::PrefetchAtBuild {
        revalidate: Revalidate::Every(Duration::from_secs(60)),
    });

    let first = exec.execute(&query, &client, &ViewScope::new()).await;
    assert_eq!(first.data, Some(users_data()));
    assert_eq!(transport.calls(), 1);

    tokio::time::advance(Duration::from_secs(30)).await;
    exec.execute(&query, &client, &ViewScope::new()).await;
    assert_eq!(transport.calls(), 1);

    transport.queue_data(renamed_users_data());
    tokio::time::advance(Duration::from_secs(31)).await;
    let refreshed = exec.execute(&query, &client, &ViewScope::new()).await;
    assert_eq!(transport.calls(), 2);
    assert_eq!(refreshed.data, Some(renamed_users_data()));

    exec.execute(&query, &client, &ViewScope::new()).await;
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn prefetch_with_zero_interval_fetches_every_request() {
    let transport = Arc::new(MockTransport::new().respond_with(users_data()));
    let store = warm_store(&transport).await;
    let exec = executor(&transport);
    let query = users_query(FetchPolicy::PrefetchAtBuild {
        revalidate: Revalidate::Every(Duration::ZERO),
    });

    exec.execute(&query, &store, &ViewScope::new()).await;
    exec.execute(&query, &store, &ViewScope::new()).await;
    assert_eq!(transport.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn prefetch_never_revalidates_when_interval_absent() {
    let transport = Arc::new(MockTransport::new().respond_with(users_data()));
    let store = warm_store(&transport).await;
    let exec = executor(&transport);
    let query = users_query(FetchPolicy::PrefetchAtBuild {
        revalidate: Revalidate::Never,
    });

    exec.execute(&query, &store, &ViewScope::new()).await;
    tokio::time::advance(Duration::from_secs(86_400)).await;
    exec.execute(&query, &store, &ViewScope::new()).await;
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn prefetch_with_empty_store_fetches() {
    let transport = Arc::new(MockTransport::new().respond_with(users_data()));
    let store = StoreHandle::new();
    let query = users_query(FetchPolicy::PrefetchAtBuild {
        revalidate: Revalidate::Never,
    });

    let state = executor(&transport)
        .execute(&query, &store, &ViewScope::new())
        .await;
    assert!(state.is_success());
    assert_eq!(transport.calls(), 1);
}
