//! A hand-written client shaped like generator output, plus fixture server
//! startup. Each method only declares its parameters and delegates to the
//! runtime, exactly as generated call sites do.

#![allow(dead_code)]

use std::net::SocketAddr;

use client_runtime::{ApiClient, ApiRequestOptions, CancellableRequest, ClientConfig, HttpMethod};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Start the fixture server on a random port and return its address.
pub async fn start_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(fixture_server::run(listener));
    addr
}

/// Serve one canned raw HTTP/1.1 response to every connection, for status
/// lines and bodies an axum handler cannot produce.
pub async fn start_raw_server(response: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else { return };
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

pub fn base_url(addr: SocketAddr) -> String {
    format!("http://{addr}/base")
}

pub fn config(addr: SocketAddr) -> client_runtime::ClientConfigBuilder {
    ClientConfig::builder().base_url(base_url(addr)).version("1.0")
}

pub struct AppClient {
    pub simple: SimpleService,
    pub complex: ComplexService,
    pub parameters: ParametersService,
    pub error: ErrorService,
}

impl AppClient {
    pub fn new(config: ClientConfig) -> Self {
        let client = ApiClient::new(config);
        Self {
            simple: SimpleService { client: client.clone() },
            complex: ComplexService { client: client.clone() },
            parameters: ParametersService { client: client.clone() },
            error: ErrorService { client },
        }
    }
}

pub struct SimpleService {
    client: ApiClient,
}

impl SimpleService {
    pub fn get_call_without_parameters_and_response(&self) -> CancellableRequest<Value> {
        self.client
            .request_value(ApiRequestOptions::new(HttpMethod::Get, "/api/v{api-version}/simple"))
    }

    pub fn get_call_with_delay(&self, ms: u64) -> CancellableRequest<Value> {
        self.client.request_value(
            ApiRequestOptions::new(HttpMethod::Get, "/api/v{api-version}/delay").query("ms", Some(ms)),
        )
    }
}

pub struct ComplexService {
    client: ApiClient,
}

impl ComplexService {
    pub fn complex_types(&self, parameter_object: Value) -> CancellableRequest<Value> {
        self.client.request_value(
            ApiRequestOptions::new(HttpMethod::Post, "/api/v{api-version}/complex")
                .body(parameter_object)
                .media_type("application/json")
                .error(400, "400 server error")
                .error(500, "500 server error"),
        )
    }
}

pub struct ParametersService {
    client: ApiClient,
}

impl ParametersService {
    pub fn call_with_parameters(
        &self,
        parameter_header: Option<&str>,
        parameter_query: Option<&str>,
        parameter_form: Option<&str>,
        parameter_cookie: Option<&str>,
        parameter_path: &str,
        request_body: Option<Value>,
    ) -> CancellableRequest<Value> {
        let mut options = ApiRequestOptions::new(HttpMethod::Post, "/api/v{api-version}/parameters/{parameterPath}")
            .path("parameterPath", parameter_path)
            .cookie("parameterCookie", parameter_cookie)
            .header("parameterHeader", parameter_header)
            .query("parameterQuery", parameter_query)
            .form("parameterForm", parameter_form)
            .media_type("application/json");
        options.body = request_body;
        self.client.request_value(options)
    }
}

pub struct ErrorService {
    client: ApiClient,
}

impl ErrorService {
    pub fn test_error_code(&self, status: u16) -> CancellableRequest<Value> {
        self.client.request_value(
            ApiRequestOptions::new(HttpMethod::Get, "/api/v{api-version}/error")
                .query("status", Some(status))
                .error(500, "Custom message: Internal Server Error")
                .error(501, "Custom message: Not Implemented")
                .error(502, "Custom message: Bad Gateway")
                .error(503, "Custom message: Service Unavailable"),
        )
    }

    pub fn test_error_json(&self, status: u16) -> CancellableRequest<Value> {
        self.client.request_value(
            ApiRequestOptions::new(HttpMethod::Get, "/api/v{api-version}/error-json")
                .query("status", Some(status))
                .error(502, "Custom message: Bad Gateway"),
        )
    }
}
