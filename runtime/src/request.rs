//! Request options supplied by generated call sites, and the builder that
//! resolves them into a `RequestDescriptor`.
//!
//! # Design
//! Generated code declares each parameter in exactly one location (path,
//! query, header, cookie, form, body) and passes optional arguments as
//! `Option`. `None` never reaches the wire: the parameter is dropped rather
//! than sent as an empty value. The builder is synchronous and does no I/O;
//! the `Authorization` value is resolved beforehand and handed in.

use std::collections::HashMap;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde_json::Value;
use url::Url;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::http::{find_header, set_header, HttpMethod};

/// Characters escaped in path parameter values. Mirrors the URL path
/// percent-encode set.
const PATH_VALUE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

const API_VERSION_PLACEHOLDER: &str = "{api-version}";

/// Everything a generated method knows about one call.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequestOptions {
    pub method: HttpMethod,
    /// Path template relative to the base URL, e.g. `/api/v{api-version}/items/{id}`.
    pub url: String,
    pub path: Vec<(String, String)>,
    pub cookies: Vec<(String, Option<Value>)>,
    pub headers: Vec<(String, Option<Value>)>,
    pub query: Vec<(String, Option<Value>)>,
    pub form_data: Vec<(String, Option<Value>)>,
    pub body: Option<Value>,
    pub media_type: Option<String>,
    /// Return this response header to the caller instead of the body.
    pub response_header: Option<String>,
    /// Per-call override messages, keyed by status code.
    pub errors: HashMap<u16, String>,
    /// Statuses treated as success. Empty means any 2xx.
    pub accepted_statuses: Vec<u16>,
}

impl ApiRequestOptions {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            path: Vec::new(),
            cookies: Vec::new(),
            headers: Vec::new(),
            query: Vec::new(),
            form_data: Vec::new(),
            body: None,
            media_type: None,
            response_header: None,
            errors: HashMap::new(),
            accepted_statuses: Vec::new(),
        }
    }

    pub fn path(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.path.push((name.into(), value.to_string()));
        self
    }

    pub fn query<V: Into<Value>>(mut self, name: impl Into<String>, value: Option<V>) -> Self {
        self.query.push((name.into(), value.map(Into::into)));
        self
    }

    pub fn header<V: Into<Value>>(mut self, name: impl Into<String>, value: Option<V>) -> Self {
        self.headers.push((name.into(), value.map(Into::into)));
        self
    }

    pub fn cookie<V: Into<Value>>(mut self, name: impl Into<String>, value: Option<V>) -> Self {
        self.cookies.push((name.into(), value.map(Into::into)));
        self
    }

    pub fn form<V: Into<Value>>(mut self, name: impl Into<String>, value: Option<V>) -> Self {
        self.form_data.push((name.into(), value.map(Into::into)));
        self
    }

    pub fn body(mut self, body: impl Into<Value>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize any `Serialize` payload as the body.
    pub fn json_body<T: serde::Serialize>(mut self, body: &T) -> Result<Self, ClientError> {
        let value = serde_json::to_value(body).map_err(|e| ClientError::Serialization(e.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    pub fn response_header(mut self, name: impl Into<String>) -> Self {
        self.response_header = Some(name.into());
        self
    }

    pub fn error(mut self, status: u16, message: impl Into<String>) -> Self {
        self.errors.insert(status, message.into());
        self
    }

    pub fn accept_status(mut self, status: u16) -> Self {
        self.accepted_statuses.push(status);
        self
    }
}

/// Encoded request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Text(String),
    /// `application/x-www-form-urlencoded` fields, in declaration order.
    Form(Vec<(String, String)>),
}

/// Fully resolved, pre-dispatch representation of one request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub method: HttpMethod,
    /// Absolute URL including the query string.
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl RequestDescriptor {
    /// Resolve `options` against `config`. `authorization` is the value
    /// produced by the auth resolver for this request, if any.
    pub fn build(
        config: &ClientConfig,
        options: &ApiRequestOptions,
        authorization: Option<String>,
    ) -> Result<Self, ClientError> {
        let url = resolve_url(config, options)?;
        let body = resolve_body(options);

        let mut headers = config.default_headers().to_vec();
        if find_header(&headers, "Accept").is_none() {
            headers.push(("Accept".to_string(), "application/json".to_string()));
        }
        for (name, value) in &options.headers {
            if let Some(value) = value.as_ref().and_then(value_to_string) {
                set_header(&mut headers, name, value);
            }
        }

        let cookie = options
            .cookies
            .iter()
            .filter_map(|(name, value)| {
                value.as_ref().and_then(value_to_string).map(|v| format!("{name}={v}"))
            })
            .collect::<Vec<_>>();
        if !cookie.is_empty() {
            set_header(&mut headers, "Cookie", cookie.join("; "));
        }

        if let Some(body) = &body {
            if find_header(&headers, "Content-Type").is_none() {
                set_header(&mut headers, "Content-Type", content_type(body, options.media_type.as_deref()));
            }
        }

        if let Some(authorization) = authorization {
            set_header(&mut headers, "Authorization", authorization);
        }

        Ok(Self {
            method: options.method,
            url,
            headers,
            body,
        })
    }
}

fn resolve_url(config: &ClientConfig, options: &ApiRequestOptions) -> Result<String, ClientError> {
    let template = match config.version() {
        Some(version) => options.url.replace(API_VERSION_PLACEHOLDER, version),
        None => options.url.clone(),
    };
    let path = resolve_path(&template, &options.path, config.encode_path())?;

    let mut url = Url::parse(&format!("{}{}", config.base_url(), path))
        .map_err(|e| ClientError::InvalidRequest(format!("invalid url for `{}`: {e}", options.url)))?;

    let pairs = encode_pairs(&options.query);
    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }
    Ok(url.into())
}

/// Substitute `{name}` placeholders in `template` with path parameters.
fn resolve_path(template: &str, params: &[(String, String)], encode: bool) -> Result<String, ClientError> {
    let mut resolved = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        resolved.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after.find('}').ok_or_else(|| {
            ClientError::InvalidRequest(format!("unterminated placeholder in `{template}`"))
        })?;
        let name = &after[..end];
        let value = params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
            .ok_or_else(|| ClientError::InvalidRequest(format!("missing path parameter `{name}`")))?;

        if encode {
            resolved.extend(utf8_percent_encode(value, PATH_VALUE));
        } else {
            resolved.push_str(value);
        }
        rest = &after[end + 1..];
    }

    resolved.push_str(rest);
    Ok(resolved)
}

fn resolve_body(options: &ApiRequestOptions) -> Option<RequestBody> {
    if options.form_data.iter().any(|(_, value)| value.is_some()) {
        return Some(RequestBody::Form(encode_pairs(&options.form_data)));
    }

    let is_json = options
        .media_type
        .as_deref()
        .is_some_and(|media_type| media_type.contains("/json"));
    match &options.body {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) if !is_json => Some(RequestBody::Text(text.clone())),
        Some(value) => Some(RequestBody::Json(value.clone())),
    }
}

fn content_type(body: &RequestBody, media_type: Option<&str>) -> String {
    match (body, media_type) {
        (RequestBody::Form(_), _) => "application/x-www-form-urlencoded".to_string(),
        (_, Some(media_type)) => media_type.to_string(),
        (RequestBody::Text(_), None) => "text/plain".to_string(),
        (RequestBody::Json(_), None) => "application/json".to_string(),
    }
}

/// Flatten optional values into string pairs. Arrays repeat the key.
fn encode_pairs(params: &[(String, Option<Value>)]) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (name, value) in params {
        match value {
            Some(Value::Array(items)) => {
                pairs.extend(items.iter().filter_map(value_to_string).map(|v| (name.clone(), v)));
            }
            Some(value) => {
                if let Some(v) = value_to_string(value) {
                    pairs.push((name.clone(), v));
                }
            }
            None => {}
        }
    }
    pairs
}

/// String form of a parameter value. `null` is treated as absent.
fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn config() -> ClientConfig {
        ClientConfig::builder()
            .base_url("http://localhost:3000/base")
            .version("1.0")
            .build()
            .unwrap()
    }

    fn header<'a>(req: &'a RequestDescriptor, name: &str) -> Option<&'a str> {
        find_header(&req.headers, name)
    }

    #[test]
    fn simple_get_has_no_body() {
        let options = ApiRequestOptions::new(HttpMethod::Get, "/api/v{api-version}/simple");
        let req = RequestDescriptor::build(&config(), &options, None).unwrap();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.url, "http://localhost:3000/base/api/v1.0/simple");
        assert!(req.body.is_none());
        assert_eq!(header(&req, "accept"), Some("application/json"));
        assert_eq!(header(&req, "content-type"), None);
        assert_eq!(header(&req, "authorization"), None);
    }

    #[test]
    fn all_parameter_locations_are_resolved() {
        let options = ApiRequestOptions::new(HttpMethod::Post, "/api/v{api-version}/parameters/{parameterPath}")
            .path("parameterPath", "valuePath")
            .header("parameterHeader", Some("valueHeader"))
            .query("parameterQuery", Some("valueQuery"))
            .form("parameterForm", Some("valueForm"))
            .cookie("parameterCookie", Some("valueCookie"))
            .body(json!({ "prop": "valueBody" }))
            .media_type("application/json");
        let req = RequestDescriptor::build(&config(), &options, Some("Bearer t".to_string())).unwrap();

        assert_eq!(
            req.url,
            "http://localhost:3000/base/api/v1.0/parameters/valuePath?parameterQuery=valueQuery"
        );
        assert_eq!(header(&req, "parameterHeader"), Some("valueHeader"));
        assert_eq!(header(&req, "cookie"), Some("parameterCookie=valueCookie"));
        assert_eq!(header(&req, "authorization"), Some("Bearer t"));
        assert_eq!(header(&req, "content-type"), Some("application/x-www-form-urlencoded"));
        assert_eq!(
            req.body,
            Some(RequestBody::Form(vec![("parameterForm".to_string(), "valueForm".to_string())]))
        );
    }

    #[test]
    fn omitted_parameters_never_reach_the_wire() {
        let options = ApiRequestOptions::new(HttpMethod::Get, "/items")
            .header("x-skip", None::<&str>)
            .query("skip", None::<&str>)
            .query("nulled", Some(Value::Null))
            .cookie("skip", None::<&str>)
            .form("skip", None::<&str>);
        let req = RequestDescriptor::build(&config(), &options, None).unwrap();
        assert_eq!(req.url, "http://localhost:3000/base/items");
        assert_eq!(header(&req, "x-skip"), None);
        assert_eq!(header(&req, "cookie"), None);
        assert!(req.body.is_none());
    }

    #[test]
    fn query_arrays_repeat_the_key() {
        let options = ApiRequestOptions::new(HttpMethod::Get, "/items")
            .query("tag", Some(json!(["a", "b"])))
            .query("limit", Some(10))
            .query("flag", Some(true));
        let req = RequestDescriptor::build(&config(), &options, None).unwrap();
        assert_eq!(req.url, "http://localhost:3000/base/items?tag=a&tag=b&limit=10&flag=true");
    }

    #[test]
    fn query_values_are_encoded() {
        let options = ApiRequestOptions::new(HttpMethod::Get, "/items").query("q", Some("a b&c"));
        let req = RequestDescriptor::build(&config(), &options, None).unwrap();
        assert_eq!(req.url, "http://localhost:3000/base/items?q=a+b%26c");
    }

    #[test]
    fn nested_body_keeps_its_structure() {
        let nested = json!({ "first": { "second": { "third": "Hello World!" } } });
        let options = ApiRequestOptions::new(HttpMethod::Get, "/api/v{api-version}/complex").body(nested.clone());
        let req = RequestDescriptor::build(&config(), &options, None).unwrap();
        assert_eq!(req.body, Some(RequestBody::Json(nested)));
        assert_eq!(header(&req, "content-type"), Some("application/json"));
    }

    #[test]
    fn string_body_is_sent_as_text() {
        let options = ApiRequestOptions::new(HttpMethod::Post, "/items").body("plain");
        let req = RequestDescriptor::build(&config(), &options, None).unwrap();
        assert_eq!(req.body, Some(RequestBody::Text("plain".to_string())));
        assert_eq!(header(&req, "content-type"), Some("text/plain"));

        let options = options.media_type("application/json");
        let req = RequestDescriptor::build(&config(), &options, None).unwrap();
        assert_eq!(req.body, Some(RequestBody::Json(json!("plain"))));
        assert_eq!(header(&req, "content-type"), Some("application/json"));
    }

    #[test]
    fn path_values_are_percent_encoded() {
        let options = ApiRequestOptions::new(HttpMethod::Get, "/items/{id}").path("id", "a b#c");
        let req = RequestDescriptor::build(&config(), &options, None).unwrap();
        assert_eq!(req.url, "http://localhost:3000/base/items/a%20b%23c");
    }

    #[test]
    fn percent_sign_in_path_value_is_escaped() {
        let options = ApiRequestOptions::new(HttpMethod::Get, "/items/{id}").path("id", "100%");
        let req = RequestDescriptor::build(&config(), &options, None).unwrap();
        assert_eq!(req.url, "http://localhost:3000/base/items/100%25");
    }

    #[test]
    fn missing_path_parameter_is_rejected() {
        let options = ApiRequestOptions::new(HttpMethod::Get, "/items/{id}");
        let err = RequestDescriptor::build(&config(), &options, None).unwrap_err();
        assert!(matches!(err, ClientError::InvalidRequest(_)));
    }

    #[test]
    fn unterminated_placeholder_is_rejected() {
        let options = ApiRequestOptions::new(HttpMethod::Get, "/items/{id").path("id", "1");
        let err = RequestDescriptor::build(&config(), &options, None).unwrap_err();
        assert!(matches!(err, ClientError::InvalidRequest(_)));
    }

    #[test]
    fn call_headers_override_defaults() {
        let config = ClientConfig::builder()
            .base_url("http://localhost:3000")
            .header("X-Client", "default")
            .build()
            .unwrap();
        let options = ApiRequestOptions::new(HttpMethod::Get, "/").header("x-client", Some("call"));
        let req = RequestDescriptor::build(&config, &options, None).unwrap();
        assert_eq!(header(&req, "X-Client"), Some("call"));
        assert_eq!(req.headers.iter().filter(|(k, _)| k.eq_ignore_ascii_case("x-client")).count(), 1);
    }

    #[test]
    fn multiple_cookies_are_joined() {
        let options = ApiRequestOptions::new(HttpMethod::Get, "/")
            .cookie("a", Some("1"))
            .cookie("b", Some(2));
        let req = RequestDescriptor::build(&config(), &options, None).unwrap();
        assert_eq!(header(&req, "cookie"), Some("a=1; b=2"));
    }

    #[test]
    fn json_body_serializes_typed_payloads() {
        #[derive(serde::Serialize)]
        struct Payload {
            prop: &'static str,
        }

        let options = ApiRequestOptions::new(HttpMethod::Post, "/items")
            .json_body(&Payload { prop: "valueBody" })
            .unwrap();
        assert_eq!(options.body, Some(json!({ "prop": "valueBody" })));
    }
}
