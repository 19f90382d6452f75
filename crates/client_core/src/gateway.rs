use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use shared::{
    domain::HistoryId,
    error::ApiError,
    protocol::{
        history_item_route, history_route, rephrase_route, HistoryEntry, NewHistoryEntry,
        RephraseRequest, RephraseResult,
    },
};
use tracing::debug;
use url::Url;

use crate::error::GatewayError;

/// The four remote operations the session depends on. Each call is exactly
/// one request/response round trip; retries are left to the service.
#[async_trait]
pub trait RephraseGateway: Send + Sync {
    async fn submit_rephrase(
        &self,
        request: &RephraseRequest,
    ) -> Result<RephraseResult, GatewayError>;
    async fn list_history(&self) -> Result<Vec<HistoryEntry>, GatewayError>;
    async fn create_history_entry(
        &self,
        new_entry: &NewHistoryEntry,
    ) -> Result<HistoryEntry, GatewayError>;
    async fn delete_history_entry(&self, id: HistoryId) -> Result<(), GatewayError>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Api(ApiError),
    Detail { detail: String },
}

/// HTTP+JSON implementation of [`RephraseGateway`].
pub struct HttpGateway {
    http: Client,
    server_url: String,
}

impl HttpGateway {
    pub fn new(server_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(format!("failed to build http client: {e}")))?;
        Self::with_client(server_url, http)
    }

    pub fn with_client(server_url: &str, http: Client) -> Result<Self, GatewayError> {
        let parsed = Url::parse(server_url.trim()).map_err(|e| {
            GatewayError::Transport(format!("invalid server url '{server_url}': {e}"))
        })?;
        Ok(Self {
            http,
            server_url: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    fn endpoint(&self, route: &str) -> String {
        format!("{}{route}", self.server_url)
    }
}

#[async_trait]
impl RephraseGateway for HttpGateway {
    async fn submit_rephrase(
        &self,
        request: &RephraseRequest,
    ) -> Result<RephraseResult, GatewayError> {
        debug!(tone = %request.tone, "submitting rephrase");
        let response = self
            .http
            .post(self.endpoint(rephrase_route()))
            .json(request)
            .send()
            .await?;
        read_json(response).await
    }

    async fn list_history(&self) -> Result<Vec<HistoryEntry>, GatewayError> {
        let response = self.http.get(self.endpoint(history_route())).send().await?;
        read_json(response).await
    }

    async fn create_history_entry(
        &self,
        new_entry: &NewHistoryEntry,
    ) -> Result<HistoryEntry, GatewayError> {
        let response = self
            .http
            .post(self.endpoint(history_route()))
            .json(new_entry)
            .send()
            .await?;
        read_json(response).await
    }

    async fn delete_history_entry(&self, id: HistoryId) -> Result<(), GatewayError> {
        let response = self
            .http
            .delete(self.endpoint(&history_item_route(id)))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound(id));
        }
        if !response.status().is_success() {
            return Err(service_error(response).await);
        }
        Ok(())
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, GatewayError> {
    if !response.status().is_success() {
        return Err(service_error(response).await);
    }
    response
        .json::<T>()
        .await
        .map_err(|e| GatewayError::Decode(e.to_string()))
}

async fn service_error(response: Response) -> GatewayError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(ErrorBody::Api(err)) => err.message,
        Ok(ErrorBody::Detail { detail }) => detail,
        Err(_) if !body.trim().is_empty() => body.trim().to_string(),
        Err(_) => status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_string(),
    };
    GatewayError::Service {
        status: status.as_u16(),
        message,
    }
}

#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod tests;
