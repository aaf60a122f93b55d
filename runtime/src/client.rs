//! Request execution entry point used by generated call sites.
//!
//! # Design
//! `ApiClient` holds only the shared, immutable `ClientConfig` and a
//! `Transport`. Every call runs the same pipeline inside a fresh
//! `CancellableRequest`: resolve the `Authorization` header, build the
//! `RequestDescriptor`, dispatch it, and classify the response. The
//! cancellation token is checked around each suspension point so a cancelled
//! call never reaches the next stage.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, debug_span, Instrument};
use uuid::Uuid;

use crate::auth;
use crate::cancel::CancellableRequest;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::request::{ApiRequestOptions, RequestDescriptor};
use crate::response::{self, ApiResult};
use crate::transport::{self, ReqwestTransport, Transport};

/// Executes requests described by generated API methods.
#[derive(Clone)]
pub struct ApiClient {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Self {
        Self::with_transport(config, Arc::new(ReqwestTransport::default()))
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config: Arc::new(config),
            transport,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Run one call and resolve to the full `ApiResult`.
    pub fn request(&self, options: ApiRequestOptions) -> CancellableRequest<ApiResult> {
        let config = Arc::clone(&self.config);
        let transport = Arc::clone(&self.transport);
        let span = debug_span!(
            "api_request",
            request_id = %Uuid::new_v4(),
            method = %options.method,
            url = %options.url,
        );

        CancellableRequest::new(move |token| {
            async move { execute(&config, transport.as_ref(), &options, &token).await }.instrument(span)
        })
    }

    /// Run one call and resolve to the response body (or the requested
    /// response header), which is what generated methods return.
    pub fn request_value(&self, options: ApiRequestOptions) -> CancellableRequest<Value> {
        self.request(options).map(|result| Ok(result.body))
    }

    /// Like `request_value`, deserializing the body into `T`.
    pub fn request_json<T>(&self, options: ApiRequestOptions) -> CancellableRequest<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.request_value(options).map(|body| {
            serde_json::from_value(body).map_err(|e| ClientError::Deserialization(e.to_string()))
        })
    }
}

async fn execute(
    config: &ClientConfig,
    transport: &dyn Transport,
    options: &ApiRequestOptions,
    token: &CancellationToken,
) -> Result<ApiResult, ClientError> {
    if token.is_cancelled() {
        return Err(ClientError::Aborted);
    }

    let authorization = tokio::select! {
        biased;
        _ = token.cancelled() => return Err(ClientError::Aborted),
        header = auth::authorization_header(config) => header?,
    };
    if token.is_cancelled() {
        return Err(ClientError::Aborted);
    }

    let request = RequestDescriptor::build(config, options, authorization)?;
    debug!(url = %request.url, "dispatching request");

    let response = transport::dispatch(transport, request, token).await?;
    debug!(status = response.status, "received response");

    response::process(response, options, config.error_message_overrides()).map_err(|err| {
        debug!(status = err.status(), message = err.message(), "request failed");
        ClientError::from(err)
    })
}
