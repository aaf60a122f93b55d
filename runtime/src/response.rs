//! Response classification.
//!
//! Turns a `RawResponse` into either an `ApiResult` or an `ApiError`. The
//! error message comes from the per-call override for the status, then the
//! client-level override, then `GENERIC_ERROR_MESSAGE`. The server's status
//! text never feeds the message; it is only copied into `status_text`.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::{ApiError, GENERIC_ERROR_MESSAGE};
use crate::http::RawResponse;
use crate::request::ApiRequestOptions;

/// Successful response as exposed to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResult {
    pub url: String,
    pub ok: bool,
    pub status: u16,
    pub status_text: String,
    #[serde(skip)]
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

/// Classify `response` for the call described by `options`.
pub fn process(
    response: RawResponse,
    options: &ApiRequestOptions,
    overrides: &HashMap<u16, String>,
) -> Result<ApiResult, ApiError> {
    if !is_accepted(response.status, &options.accepted_statuses) {
        let message = error_message(response.status, &options.errors, overrides);
        return Err(ApiError::new(
            message,
            response.url,
            response.status,
            response.status_text,
            response.body,
        ));
    }

    let body = match &options.response_header {
        Some(name) => response
            .header(name)
            .map(|value| Value::String(value.to_string()))
            .unwrap_or(Value::Null),
        None => response.body,
    };

    Ok(ApiResult {
        ok: (200..300).contains(&response.status),
        url: response.url,
        status: response.status,
        status_text: response.status_text,
        headers: response.headers,
        body,
    })
}

fn is_accepted(status: u16, accepted: &[u16]) -> bool {
    if accepted.is_empty() {
        (200..300).contains(&status)
    } else {
        accepted.contains(&status)
    }
}

fn error_message(status: u16, call: &HashMap<u16, String>, client: &HashMap<u16, String>) -> String {
    call.get(&status)
        .or_else(|| client.get(&status))
        .cloned()
        .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string())
}
