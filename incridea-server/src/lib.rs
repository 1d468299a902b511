//! HTTP API serving Incridea page payloads.
//!
//! `GET /` serves a payload prefetched once and rebuilt after the
//! revalidation interval. `GET /ssr` renders a fresh payload per request.
//! Both embed the server store's snapshot for client hydration.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::Utc;
use incridea_cache::{CacheInstanceManager, ExecutionContext, PagePayload, Selection};
use incridea_query::{
    ExecutorConfig, FetchPolicy, QueryDescriptor, QueryError, QueryExecutor, QueryTransport,
    Revalidate, ViewScope,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Operation backing the home page.
pub const USERS_OPERATION: &str = "GetAllUsers";

const USERS_DOCUMENT: &str = "query GetAllUsers { users { __typename id name } }";

/// The home page's data requirement.
pub fn users_query(policy: FetchPolicy) -> QueryDescriptor {
    let selection = Selection::new().object(
        "users",
        Selection::new().scalar("__typename").scalar("id").scalar("name"),
    );
    QueryDescriptor::new(USERS_OPERATION, USERS_DOCUMENT, selection).with_policy(policy)
}

/// Server configuration.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// When the static payload is rebuilt.
    pub revalidate: Revalidate,
    pub executor: ExecutorConfig,
}

/// Body of a failed page request.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct HealthResponse {
    pub status: String,
}

/// Why a page could not be served.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("upstream query failed: {0}")]
    Upstream(Arc<QueryError>),

    #[error("upstream query failed")]
    NoData,
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (StatusCode::BAD_GATEWAY, Json(body)).into_response()
    }
}

struct StaticPage {
    payload: PagePayload,
    built_at: Instant,
}

/// Shared state behind the router.
pub struct AppState {
    transport: Arc<dyn QueryTransport>,
    manager: CacheInstanceManager,
    config: ServerConfig,
    static_page: Mutex<Option<StaticPage>>,
}

impl AppState {
    pub fn new(transport: Arc<dyn QueryTransport>, config: ServerConfig) -> Self {
        Self {
            transport,
            manager: CacheInstanceManager::new(),
            config,
            static_page: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Builds the static payload ahead of the first request.
    pub async fn prebuild(&self) -> Result<(), PageError> {
        self.static_payload().await.map(|_| ())
    }

    /// Runs the page query into a fresh server store and packages its
    /// snapshot.
    async fn render(&self, policy: FetchPolicy) -> Result<PagePayload, PageError> {
        let store = self.manager.resolve(ExecutionContext::Server);
        let executor = QueryExecutor::with_config(self.transport.clone(), self.config.executor.clone());
        let state = executor
            .execute(&users_query(policy), &store, &ViewScope::new())
            .await;

        if let Some(error) = state.error {
            return Err(PageError::Upstream(error));
        }
        if state.data.is_none() {
            return Err(PageError::NoData);
        }
        Ok(PagePayload::new(store.extract()).with_revalidated_at(Utc::now()))
    }

    /// Serves the static payload, rebuilding it once the revalidation
    /// interval has passed. A failed rebuild keeps the previous payload.
    async fn static_payload(&self) -> Result<PagePayload, PageError> {
        let mut page = self.static_page.lock().await;
        let now = Instant::now();

        if let Some(current) = page.as_ref() {
            if !self.config.revalidate.is_due(current.built_at, now) {
                return Ok(current.payload.clone());
            }
            debug!("Static payload due for revalidation");
        }

        let policy = FetchPolicy::PrefetchAtBuild {
            revalidate: self.config.revalidate,
        };
        match self.render(policy).await {
            Ok(payload) => {
                info!("Built static payload ({} records)", payload.snapshot().len());
                *page = Some(StaticPage {
                    payload: payload.clone(),
                    built_at: now,
                });
                Ok(payload)
            }
            Err(e) => match page.as_ref() {
                Some(stale) => {
                    warn!("Revalidation failed, serving previous payload: {}", e);
                    Ok(stale.payload.clone())
                }
                None => Err(e),
            },
        }
    }
}

async fn static_handler(State(state): State<Arc<AppState>>) -> Result<Json<PagePayload>, PageError> {
    state.static_payload().await.map(Json)
}

async fn ssr_handler(State(state): State<Arc<AppState>>) -> Result<Json<PagePayload>, PageError> {
    let payload = state
        .render(FetchPolicy::NetworkOnly)
        .await
        .inspect_err(|e| warn!("Server render failed: {}", e))?;
    Ok(Json(payload))
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Build the HTTP API router with the given state.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(static_handler))
        .route("/ssr", get(ssr_handler))
        .route("/api/v1/health", get(health_handler))
        .with_state(state)
}
