//! HTTP transport using hyper-util.
//!
//! [`HyperClient`] performs one exchange per call. [`Transport`] adapts any
//! [`HttpClient`] into a tower [`Service`] so the per-call middleware stack
//! can be layered on top of it.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use tower_service::Service;

use crate::{ClientConfig, Error, HttpClient, Request, Response, Result};

/// Future type for the tower services of this crate.
pub type ServiceFuture = Pin<Box<dyn Future<Output = Result<Response<Bytes>>> + Send + 'static>>;

/// Create an HTTPS connector with rustls.
///
/// Supports HTTP/1.1 and HTTP/2, trusts the Mozilla root certificates and
/// also accepts plain `http://` URLs.
fn https_connector(config: &ClientConfig) -> HttpsConnector<HttpConnector> {
    let mut http = HttpConnector::new();
    http.enforce_http(false);
    http.set_connect_timeout(Some(config.connect_timeout));

    let root_store: rustls::RootCertStore =
        webpki_roots::TLS_SERVER_ROOTS.iter().cloned().collect();

    let tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    HttpsConnectorBuilder::new()
        .with_tls_config(tls_config)
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .wrap_connector(http)
}

/// Pooled HTTP client with TLS.
///
/// Cloning is cheap and shares the connection pool.
#[derive(Clone)]
pub struct HyperClient {
    inner: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    config: ClientConfig,
}

impl std::fmt::Debug for HyperClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HyperClient {
    /// Create a new client with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    /// Create a new client with custom configuration.
    #[must_use]
    pub fn with_config(config: ClientConfig) -> Self {
        let inner = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_idle_per_host)
            .build(https_connector(&config));

        Self { inner, config }
    }

    /// Get the client configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn build_hyper_request(request: Request<Bytes>) -> Result<http::Request<Full<Bytes>>> {
        let (method, url, headers, body) = request.into_parts();

        let mut builder = http::Request::builder()
            .method(http::Method::from(method))
            .uri(url.as_str());

        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder
            .body(body.map_or_else(Full::default, Full::new))
            .map_err(|e| Error::invalid_request(e.to_string()))
    }

    /// Extract response headers, joining repeated values with `, `.
    fn extract_headers(headers: &http::HeaderMap) -> HashMap<String, String> {
        let mut extracted: HashMap<String, String> = HashMap::with_capacity(headers.keys_len());
        for (name, value) in headers {
            let Ok(value) = value.to_str() else {
                continue;
            };
            extracted
                .entry(name.as_str().to_string())
                .and_modify(|existing| {
                    existing.push_str(", ");
                    existing.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }
        extracted
    }

    #[allow(clippy::needless_pass_by_value)]
    fn map_hyper_error(err: hyper_util::client::legacy::Error) -> Error {
        let msg = err.to_string();
        let detail = std::error::Error::source(&err).map_or_else(String::new, ToString::to_string);

        if ["ssl", "tls", "certificate"]
            .iter()
            .any(|needle| msg.contains(needle) || detail.contains(needle))
        {
            return Error::tls(if detail.is_empty() { msg } else { format!("{msg}: {detail}") });
        }

        if detail.is_empty() {
            Error::connection(msg)
        } else {
            Error::connection(format!("{msg}: {detail}"))
        }
    }
}

impl Default for HyperClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient for HyperClient {
    async fn execute(&self, request: Request<Bytes>) -> Result<Response<Bytes>> {
        let hyper_request = Self::build_hyper_request(request)?;

        let response = tokio::time::timeout(self.config.timeout, self.inner.request(hyper_request))
            .await
            .map_err(|_| Error::Timeout)?
            .map_err(Self::map_hyper_error)?;

        let status = response.status().as_u16();
        let headers = Self::extract_headers(response.headers());

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| Error::connection(e.to_string()))?
            .to_bytes();

        Ok(Response::new(status, headers, body))
    }
}

/// Adapter from an [`HttpClient`] to a tower [`Service`].
#[derive(Debug)]
pub struct Transport<C> {
    http: Arc<C>,
}

impl<C> Transport<C> {
    /// Wrap a shared client.
    #[must_use]
    pub const fn new(http: Arc<C>) -> Self {
        Self { http }
    }
}

impl<C> Clone for Transport<C> {
    fn clone(&self) -> Self {
        Self {
            http: Arc::clone(&self.http),
        }
    }
}

impl<C> Service<Request<Bytes>> for Transport<C>
where
    C: HttpClient + 'static,
{
    type Response = Response<Bytes>;
    type Error = Error;
    type Future = ServiceFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Bytes>) -> Self::Future {
        let http = Arc::clone(&self.http);
        Box::pin(async move { http.execute(request).await })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn client_default() {
        let client = HyperClient::new();
        assert_eq!(client.config().timeout, Duration::from_secs(30));
    }

    #[test]
    fn client_with_config() {
        let client = HyperClient::with_config(
            ClientConfig::builder()
                .timeout(Duration::from_secs(60))
                .pool_idle_per_host(16)
                .build(),
        );

        assert_eq!(client.config().timeout, Duration::from_secs(60));
        assert_eq!(client.config().pool_idle_per_host, 16);
        assert!(format!("{client:?}").contains("HyperClient"));
    }

    #[test]
    fn repeated_headers_are_joined() {
        let mut headers = http::HeaderMap::new();
        headers.append("link", http::HeaderValue::from_static("<https://x/a?page=2>; rel=\"next\""));
        headers.append("link", http::HeaderValue::from_static("<https://x/a?page=1>; rel=\"first\""));
        headers.insert("x-total", http::HeaderValue::from_static("3"));

        let extracted = HyperClient::extract_headers(&headers);
        assert_eq!(
            extracted.get("link").map(String::as_str),
            Some("<https://x/a?page=2>; rel=\"next\", <https://x/a?page=1>; rel=\"first\"")
        );
        assert_eq!(extracted.get("x-total").map(String::as_str), Some("3"));
    }

    #[test]
    fn hyper_request_keeps_method_url_headers_and_body() {
        let url = url::Url::parse("https://gitlab.example.com/api/v4/projects").expect("valid url");
        let request = Request::builder(crate::Method::Post, url)
            .header("content-type", "application/json")
            .body(Bytes::from_static(b"{}"))
            .build();

        let hyper_request = HyperClient::build_hyper_request(request).expect("build");
        assert_eq!(hyper_request.method(), http::Method::POST);
        assert_eq!(hyper_request.uri(), "https://gitlab.example.com/api/v4/projects");
        assert_eq!(
            hyper_request.headers().get("content-type").and_then(|v| v.to_str().ok()),
            Some("application/json")
        );
    }

    #[tokio::test]
    async fn connection_refused_is_a_connection_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);

        let url = url::Url::parse(&format!("http://127.0.0.1:{port}/")).expect("valid url");
        let request = Request::builder(crate::Method::Get, url).build();
        let err = HyperClient::new().execute(request).await.expect_err("refused");
        assert!(err.is_connection(), "unexpected error: {err:?}");
    }
}
