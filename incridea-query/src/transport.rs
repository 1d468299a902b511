//! Transport layer abstraction.
//!
//! The executor only needs "send this operation, get back its `data`
//! object". Implementations cover HTTP GraphQL endpoints and tests.

use crate::descriptor::QueryDescriptor;
use crate::error::{QueryError, QueryResult};
use async_trait::async_trait;
use incridea_cache::Variables;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wire body of a GraphQL operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub operation_name: String,
    pub query: String,
    #[serde(default)]
    pub variables: Variables,
}

impl From<&QueryDescriptor> for QueryRequest {
    fn from(descriptor: &QueryDescriptor) -> Self {
        Self {
            operation_name: descriptor.operation_name.clone(),
            query: descriptor.document.clone(),
            variables: descriptor.variables.clone(),
        }
    }
}

/// One entry of a GraphQL `errors` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQlError {
    pub message: String,
}

/// Wire body of a GraphQL response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphQlResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

impl GraphQlResponse {
    /// Returns `data`, or the reported errors.
    pub fn into_data(self) -> QueryResult<Value> {
        if !self.errors.is_empty() {
            return Err(QueryError::GraphQl(
                self.errors.into_iter().map(|e| e.message).collect(),
            ));
        }
        self.data
            .filter(|d| !d.is_null())
            .ok_or_else(|| QueryError::Network("response carried no data".into()))
    }
}

/// Sends query operations to a data source.
#[async_trait]
pub trait QueryTransport: Send + Sync {
    /// Returns a short name for logs.
    fn name(&self) -> &'static str;

    /// Executes one operation and returns its `data` object.
    async fn fetch(&self, request: &QueryRequest) -> QueryResult<Value>;
}

/// A mock transport for testing.
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Mutex, PoisonError};
    use std::time::Duration;

    #[derive(Debug, Clone)]
    enum Reply {
        Data(Value),
        Fail(String),
    }

    /// Scripted transport: queued replies first, then the standing reply.
    #[derive(Debug, Default)]
    pub struct MockTransport {
        queued: Mutex<VecDeque<Reply>>,
        standing: Mutex<Option<Reply>>,
        requests: Mutex<Vec<QueryRequest>>,
        delay: Mutex<Option<Duration>>,
        calls: AtomicUsize,
    }

    impl MockTransport {
        /// Creates a transport with no replies configured.
        pub fn new() -> Self {
            Self::default()
        }

        /// Answers every request with `data`.
        pub fn respond_with(self, data: Value) -> Self {
            *self.standing.lock().unwrap_or_else(PoisonError::into_inner) = Some(Reply::Data(data));
            self
        }

        /// Fails every request with a network error.
        pub fn fail_with(self, message: impl Into<String>) -> Self {
            *self.standing.lock().unwrap_or_else(PoisonError::into_inner) =
                Some(Reply::Fail(message.into()));
            self
        }

        /// Delays every reply.
        pub fn with_delay(self, delay: Duration) -> Self {
            *self.delay.lock().unwrap_or_else(PoisonError::into_inner) = Some(delay);
            self
        }

        /// Queues a one-shot data reply.
        pub fn queue_data(&self, data: Value) {
            self.queued
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push_back(Reply::Data(data));
        }

        /// Queues a one-shot failure.
        pub fn queue_failure(&self, message: impl Into<String>) {
            self.queued
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push_back(Reply::Fail(message.into()));
        }

        /// Number of fetches issued.
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        /// Requests received so far.
        pub fn requests(&self) -> Vec<QueryRequest> {
            self.requests
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }
    }

    #[async_trait]
    impl QueryTransport for MockTransport {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn fetch(&self, request: &QueryRequest) -> QueryResult<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(request.clone());

            let delay = *self.delay.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let queued = self
                .queued
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            let reply = match queued {
                Some(reply) => Some(reply),
                None => self
                    .standing
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone(),
            };

            match reply {
                Some(Reply::Data(data)) => Ok(data),
                Some(Reply::Fail(message)) => Err(QueryError::Network(message)),
                None => Err(QueryError::Network("no reply configured".into())),
            }
        }
    }
}
