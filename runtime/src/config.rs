//! Client configuration.
//!
//! # Design
//! `ClientConfig` is built once through `ClientConfigBuilder` and validated in
//! `build()`. After that it is shared read-only (behind an `Arc`) by every
//! request the client issues, so no per-request validation is needed.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use reqwest::header::{HeaderName, HeaderValue};
use tracing::warn;
use url::Url;

use crate::auth::TokenResolver;
use crate::error::ClientError;

/// Immutable configuration shared by all requests of one client.
#[derive(Clone)]
pub struct ClientConfig {
    base_url: String,
    version: Option<String>,
    token_resolver: Option<Arc<dyn TokenResolver>>,
    username: Option<String>,
    password: Option<String>,
    default_headers: Vec<(String, String)>,
    error_message_overrides: HashMap<u16, String>,
    encode_path: bool,
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Value substituted for `{api-version}` in path templates.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn token_resolver(&self) -> Option<&dyn TokenResolver> {
        self.token_resolver.as_deref()
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn default_headers(&self) -> &[(String, String)] {
        &self.default_headers
    }

    pub fn error_message_overrides(&self) -> &HashMap<u16, String> {
        &self.error_message_overrides
    }

    pub fn encode_path(&self) -> bool {
        self.encode_path
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("version", &self.version)
            .field("token_resolver", &self.token_resolver.is_some())
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("default_headers", &self.default_headers)
            .field("error_message_overrides", &self.error_message_overrides)
            .field("encode_path", &self.encode_path)
            .finish()
    }
}

/// Builder for `ClientConfig`. Only `base_url` is required.
pub struct ClientConfigBuilder {
    base_url: Option<String>,
    version: Option<String>,
    token_resolver: Option<Arc<dyn TokenResolver>>,
    username: Option<String>,
    password: Option<String>,
    default_headers: Vec<(String, String)>,
    error_message_overrides: HashMap<u16, String>,
    encode_path: bool,
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self {
            base_url: None,
            version: None,
            token_resolver: None,
            username: None,
            password: None,
            default_headers: Vec::new(),
            error_message_overrides: HashMap::new(),
            encode_path: true,
        }
    }
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn token(mut self, resolver: impl TokenResolver + 'static) -> Self {
        self.token_resolver = Some(Arc::new(resolver));
        self
    }

    pub fn token_resolver(mut self, resolver: Option<Arc<dyn TokenResolver>>) -> Self {
        self.token_resolver = resolver;
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Add a header sent with every request. Per-call headers override it.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Replace the generic message of every failure with `status`.
    pub fn error_message(mut self, status: u16, message: impl Into<String>) -> Self {
        self.error_message_overrides.insert(status, message.into());
        self
    }

    pub fn encode_path(mut self, encode: bool) -> Self {
        self.encode_path = encode;
        self
    }

    pub fn build(self) -> Result<ClientConfig, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::InvalidConfig("base url is required".to_string()))?;
        let parsed = Url::parse(&base_url)
            .map_err(|e| ClientError::InvalidConfig(format!("invalid base url `{base_url}`: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::InvalidConfig(format!(
                "unsupported scheme `{}` in base url",
                parsed.scheme()
            )));
        }

        for (name, value) in &self.default_headers {
            HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ClientError::InvalidConfig(format!("invalid header name `{name}`: {e}")))?;
            HeaderValue::from_str(value)
                .map_err(|e| ClientError::InvalidConfig(format!("invalid value for header `{name}`: {e}")))?;
        }

        // Empty strings count as unset.
        let username = self.username.filter(|u| !u.is_empty());
        let password = self.password.filter(|p| !p.is_empty());
        if username.is_some() != password.is_some() {
            warn!("only one of username/password is configured; basic auth disabled");
        }

        Ok(ClientConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            version: self.version,
            token_resolver: self.token_resolver,
            username,
            password,
            default_headers: self.default_headers,
            error_message_overrides: self.error_message_overrides,
            encode_path: self.encode_path,
        })
    }
}
