//! Request-execution runtime shared by generated API clients.
//!
//! # Overview
//! Generated methods describe a call as `ApiRequestOptions` and hand it to
//! `ApiClient`. The runtime resolves authentication, assembles the request,
//! dispatches it inside a `CancellableRequest`, and classifies the response
//! into an `ApiResult` or a `ClientError`.
//!
//! # Design
//! - `ClientConfig` is validated once and shared read-only across requests.
//! - Building (`RequestDescriptor::build`) and classifying
//!   (`response::process`) are pure; only `Transport` performs I/O.
//! - The token resolver is re-invoked for every request; nothing is cached.
//! - No retries: every failure surfaces to the caller as-is.

pub mod auth;
pub mod cancel;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod request;
pub mod response;
pub mod transport;

pub use auth::{FnTokenResolver, StaticToken, TokenResolver};
pub use cancel::{CancelHandle, CancellableRequest, RequestState};
pub use client::ApiClient;
pub use config::{ClientConfig, ClientConfigBuilder};
pub use error::{ApiError, BoxError, ClientError, API_ERROR_NAME, GENERIC_ERROR_MESSAGE};
pub use http::{HttpMethod, RawResponse};
pub use request::{ApiRequestOptions, RequestBody, RequestDescriptor};
pub use response::ApiResult;
pub use transport::{ReqwestTransport, Transport};
