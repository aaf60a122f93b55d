//! Authorization header resolution.
//!
//! A configured `TokenResolver` wins over basic-auth credentials. The
//! resolver is invoked once for every request and its result is never
//! cached, so a resolver that refreshes or prompts always sees each call.

use std::future::Future;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use tracing::trace;

use crate::config::ClientConfig;
use crate::error::{BoxError, ClientError};

/// Produces the bearer token for an outgoing request.
#[async_trait]
pub trait TokenResolver: Send + Sync {
    async fn resolve(&self) -> Result<String, BoxError>;
}

/// A fixed bearer token.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenResolver for StaticToken {
    async fn resolve(&self) -> Result<String, BoxError> {
        Ok(self.0.clone())
    }
}

/// Adapts an async closure into a `TokenResolver`.
///
/// ```no_run
/// use client_runtime::FnTokenResolver;
///
/// let resolver = FnTokenResolver::new(|| async { Ok("MY_TOKEN".to_string()) });
/// ```
pub struct FnTokenResolver<F> {
    resolve: F,
}

impl<F, Fut> FnTokenResolver<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, BoxError>> + Send,
{
    pub fn new(resolve: F) -> Self {
        Self { resolve }
    }
}

#[async_trait]
impl<F, Fut> TokenResolver for FnTokenResolver<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<String, BoxError>> + Send,
{
    async fn resolve(&self) -> Result<String, BoxError> {
        (self.resolve)().await
    }
}

/// Resolve the `Authorization` header value for one request, if any.
pub async fn authorization_header(config: &ClientConfig) -> Result<Option<String>, ClientError> {
    if let Some(resolver) = config.token_resolver() {
        let token = resolver.resolve().await.map_err(ClientError::TokenResolution)?;
        if !token.is_empty() {
            trace!("using bearer authorization");
            return Ok(Some(format!("Bearer {token}")));
        }
    }

    match (config.username(), config.password()) {
        (Some(username), Some(password)) => {
            trace!("using basic authorization");
            Ok(Some(basic_authorization(username, password)))
        }
        _ => Ok(None),
    }
}

/// Format `Basic <base64(username:password)>` with standard padded base64.
pub fn basic_authorization(username: &str, password: &str) -> String {
    let encoded = general_purpose::STANDARD.encode(format!("{username}:{password}"));
    format!("Basic {encoded}")
}
