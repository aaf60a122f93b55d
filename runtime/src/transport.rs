//! Network transport and cancellable dispatch.
//!
//! # Design
//! `Transport` is the only place that performs I/O. It receives a fully
//! resolved `RequestDescriptor` and returns a `RawResponse` whatever the
//! status; HTTP failure statuses are classified later. `dispatch` races the
//! transport future against the request's cancellation token and drops it on
//! abort, which tears down the in-flight connection without waiting for the
//! server.

use async_trait::async_trait;
use hyper::ext::ReasonPhrase;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::form_urlencoded;

use crate::error::ClientError;
use crate::http::RawResponse;
use crate::request::{RequestBody, RequestDescriptor};

/// Performs one HTTP exchange.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: RequestDescriptor) -> Result<RawResponse, ClientError>;
}

/// `Transport` backed by `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: RequestDescriptor) -> Result<RawResponse, ClientError> {
        let headers = header_map(&request.headers)?;
        let mut builder = self
            .client
            .request(request.method.into(), &request.url)
            .headers(headers);

        builder = match request.body {
            Some(RequestBody::Json(value)) => builder.json(&value),
            Some(RequestBody::Text(text)) => builder.body(text),
            Some(RequestBody::Form(fields)) => {
                let encoded = form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(&fields)
                    .finish();
                builder.body(encoded)
            }
            None => builder,
        };

        let response = builder
            .send()
            .await
            .map_err(|e| ClientError::Transport(Box::new(e)))?;

        let status = response.status();
        let status_text = status_text(&response);
        let url = response.url().to_string();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.contains("json"));
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::Transport(Box::new(e)))?;

        Ok(RawResponse {
            url,
            status: status.as_u16(),
            status_text,
            headers,
            body: decode_body(&bytes, is_json),
        })
    }
}

/// Send `request`, giving up as soon as `token` is cancelled.
pub async fn dispatch(
    transport: &dyn Transport,
    request: RequestDescriptor,
    token: &CancellationToken,
) -> Result<RawResponse, ClientError> {
    if token.is_cancelled() {
        return Err(ClientError::Aborted);
    }

    let response = tokio::select! {
        biased;
        _ = token.cancelled() => {
            debug!("dispatch aborted");
            return Err(ClientError::Aborted);
        }
        response = transport.send(request) => response?,
    };

    // A response that lands after cancellation is discarded.
    if token.is_cancelled() {
        return Err(ClientError::Aborted);
    }
    Ok(response)
}

fn header_map(headers: &[(String, String)]) -> Result<HeaderMap, ClientError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ClientError::InvalidRequest(format!("invalid header name `{name}`: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ClientError::InvalidRequest(format!("invalid value for header `{name}`: {e}")))?;
        map.insert(name, value);
    }
    Ok(map)
}

/// Reason phrase as sent by the server. hyper only records it when it
/// differs from the canonical one.
fn status_text(response: &reqwest::Response) -> String {
    match response.extensions().get::<ReasonPhrase>() {
        Some(reason) => String::from_utf8_lossy(reason.as_bytes()).into_owned(),
        None => response.status().canonical_reason().unwrap_or_default().to_string(),
    }
}

/// Never fails: a body that claims to be JSON but is not is kept as text and
/// status classification still happens.
fn decode_body(bytes: &[u8], is_json: bool) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    if is_json {
        match serde_json::from_slice(bytes) {
            Ok(value) => return value,
            Err(e) => debug!(error = %e, "response body is not valid JSON, keeping it as text"),
        }
    }
    Value::String(String::from_utf8_lossy(bytes).into_owned())
}
