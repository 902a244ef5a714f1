//! Outbound HTTP client for the backend (CouchDB) origin.
//!
//! One request in, one request out: no retries, no streaming. The response body
//! is buffered so handlers can relay it byte-for-byte or rewrite it.
use axum::body::Bytes;
use axum::http::{HeaderMap, Method, StatusCode};
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;

use crate::config::BackendConfig;

/// Any failure reaching or reading from the backend.
///
/// Upstream non-2xx statuses are not errors; they come back as `RelayResponse`.
#[derive(Debug, Error)]
#[error("backend transport error")]
pub struct TransportError(#[source] reqwest::Error);

#[derive(Debug, Error)]
pub enum BackendBuildError {
    #[error("failed to build backend http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Body sent to the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundBody {
    Empty,
    Json(Value),
}

#[derive(Debug, Clone)]
pub struct RelayRequest {
    pub method: Method,
    // path + query, forwarded verbatim
    pub path_and_query: String,
    pub body: OutboundBody,
}

impl RelayRequest {
    pub fn new(method: Method, path_and_query: impl Into<String>) -> Self {
        Self {
            method,
            path_and_query: path_and_query.into(),
            body: OutboundBody::Empty,
        }
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = OutboundBody::Json(body);
        self
    }
}

#[derive(Debug, Clone)]
pub struct RelayResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    origin: String,
}

impl std::fmt::Debug for BackendClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // origin may embed credentials
        f.debug_struct("BackendClient").finish_non_exhaustive()
    }
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendBuildError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            client,
            origin: config.origin.clone(),
        })
    }

    fn url_for(&self, path_and_query: &str) -> String {
        format!("{}{}", self.origin, path_and_query)
    }

    /// Send one request to the backend and buffer the full response.
    pub async fn relay(&self, req: RelayRequest) -> Result<RelayResponse, TransportError> {
        let url = self.url_for(&req.path_and_query);

        let builder = self.client.request(req.method, url);
        let builder = match req.body {
            OutboundBody::Empty => builder,
            OutboundBody::Json(body) => builder.json(&body),
        };

        let res = builder.send().await.map_err(TransportError)?;

        let status = res.status();
        let headers = res.headers().clone();
        let body = res.bytes().await.map_err(TransportError)?;

        Ok(RelayResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::header;
    use serde_json::json;
    use wiremock::matchers::{body_json, header as header_eq, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client_for(origin: &str) -> BackendClient {
        BackendClient::new(&BackendConfig {
            origin: origin.to_string(),
            timeout: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(1),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn get_forwards_path_and_query_verbatim() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/db/_all_docs"))
            .and(query_param("include_docs", "true"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(r#"{"rows":[]}"#, "application/json"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server.uri());
        let res = client
            .relay(RelayRequest::new(Method::GET, "/db/_all_docs?include_docs=true"))
            .await
            .unwrap();

        assert_eq!(res.status, StatusCode::OK);
        assert_eq!(res.body, Bytes::from_static(br#"{"rows":[]}"#));
        assert_eq!(
            res.headers.get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[tokio::test]
    async fn put_sends_json_body() {
        let mock_server = MockServer::start().await;
        let doc = json!({"_id": "flight-1", "seats": 12});

        Mock::given(method("PUT"))
            .and(path("/db/flight-1"))
            .and(header_eq("content-type", "application/json"))
            .and(body_json(&doc))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server.uri());
        let res = client
            .relay(RelayRequest::new(Method::PUT, "/db/flight-1").with_json(doc))
            .await
            .unwrap();

        assert_eq!(res.status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn upstream_error_status_is_not_a_transport_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("DELETE"))
            .and(path("/db/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "not_found"})))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server.uri());
        let res = client
            .relay(RelayRequest::new(Method::DELETE, "/db/missing"))
            .await
            .unwrap();

        assert_eq!(res.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn inline_credentials_become_basic_auth() {
        let mock_server = MockServer::start().await;

        // admin:secret
        Mock::given(method("GET"))
            .and(path("/_up"))
            .and(header_eq("authorization", "Basic YWRtaW46c2VjcmV0"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let origin = mock_server
            .uri()
            .replacen("http://", "http://admin:secret@", 1);
        let client = client_for(&origin);
        let res = client
            .relay(RelayRequest::new(Method::GET, "/_up"))
            .await
            .unwrap();

        assert_eq!(res.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn connection_failure_is_transport_error() {
        let client = client_for(&crate::test_support::unreachable_origin());
        let res = client.relay(RelayRequest::new(Method::GET, "/")).await;

        assert!(res.is_err());
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&mock_server)
            .await;

        let client = BackendClient::new(&BackendConfig {
            origin: mock_server.uri(),
            timeout: Duration::from_millis(200),
            connect_timeout: Duration::from_secs(1),
        })
        .unwrap();

        let res = client.relay(RelayRequest::new(Method::GET, "/slow")).await;
        assert!(res.is_err());
    }
}
