//! Deterministic HTTP fixture for exercising generated clients.
//!
//! Every route lives under `/base/api/v1.0`. The echo routes answer with a
//! JSON description of the request they received so tests can assert on
//! exactly what went over the wire.

use std::collections::BTreeMap;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{OriginalUri, Query},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpListener;
use tracing::debug;

pub const API_PREFIX: &str = "/base/api/v1.0";

/// JSON body returned by the echo routes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EchoedRequest {
    pub method: String,
    pub path: String,
    pub query: BTreeMap<String, Vec<String>>,
    pub headers: BTreeMap<String, String>,
    pub cookies: BTreeMap<String, String>,
    pub body: Value,
}

#[derive(Deserialize)]
pub struct ErrorParams {
    pub status: u16,
}

#[derive(Deserialize)]
pub struct DelayParams {
    pub ms: u64,
}

pub fn app() -> Router {
    let api = Router::new()
        .route("/simple", any(echo))
        .route("/complex", any(echo))
        .route("/parameters/{path}", any(echo))
        .route("/error", get(error))
        .route("/error-json", get(error_json))
        .route("/delay", get(delay));
    Router::new().nest(API_PREFIX, api)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn echo(method: Method, OriginalUri(uri): OriginalUri, headers: HeaderMap, body: Bytes) -> Json<EchoedRequest> {
    let query = uri.query().map(parse_query).unwrap_or_default();
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    Json(EchoedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        query,
        cookies: parse_cookies(&headers),
        headers: header_map(&headers),
        body: parse_body(&content_type, &body),
    })
}

async fn error(Query(params): Query<ErrorParams>) -> Response {
    match StatusCode::from_u16(params.status) {
        Ok(status) => {
            debug!(status = status.as_u16(), "serving fixture error");
            (status, status.canonical_reason().unwrap_or_default()).into_response()
        }
        Err(_) => (StatusCode::BAD_REQUEST, "invalid status").into_response(),
    }
}

async fn error_json(Query(params): Query<ErrorParams>) -> Response {
    match StatusCode::from_u16(params.status) {
        Ok(status) => {
            let detail = status.canonical_reason().unwrap_or_default();
            (status, Json(serde_json::json!({ "status": status.as_u16(), "detail": detail }))).into_response()
        }
        Err(_) => (StatusCode::BAD_REQUEST, "invalid status").into_response(),
    }
}

async fn delay(Query(params): Query<DelayParams>) -> Json<Value> {
    tokio::time::sleep(Duration::from_millis(params.ms)).await;
    Json(serde_json::json!({ "delayed_ms": params.ms }))
}

fn parse_query(query: &str) -> BTreeMap<String, Vec<String>> {
    let mut parsed: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        parsed.entry(key.into_owned()).or_default().push(value.into_owned());
    }
    parsed
}

fn parse_cookies(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut map: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else { continue };
        map.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    map
}

fn parse_body(content_type: &str, body: &[u8]) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    if content_type.contains("json") {
        if let Ok(value) = serde_json::from_slice(body) {
            return value;
        }
    }
    if content_type.starts_with("application/x-www-form-urlencoded") {
        let fields = url::form_urlencoded::parse(body)
            .map(|(key, value)| (key.into_owned(), Value::String(value.into_owned())))
            .collect();
        return Value::Object(fields);
    }
    Value::String(String::from_utf8_lossy(body).into_owned())
}
