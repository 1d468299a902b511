//! GraphQL over HTTP.

use crate::error::{QueryError, QueryResult};
use crate::transport::{GraphQlResponse, QueryRequest, QueryTransport};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// Posts operations to a GraphQL endpoint.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    /// Creates a transport with a default HTTP client.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    /// Creates a transport with an existing HTTP client.
    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// The endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl QueryTransport for HttpTransport {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn fetch(&self, request: &QueryRequest) -> QueryResult<Value> {
        debug!("POST {} ({})", self.endpoint, request.operation_name);

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| QueryError::Network(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(QueryError::Network(format!("HTTP {status}: {body}")));
        }

        let body: GraphQlResponse = response.json().await?;
        body.into_data()
    }
}
