//! HTTPS transport backed by `reqwest`.

use crate::{
    auth::application::response::client_auth::ClientAuth,
    core::{
        domain::{
            error::{OntapError, OntapResult, TransportError, TransportErrorClass},
            model::{host_options::RateLimitConfig, ontap_connection::OntapConnection},
        },
        infrastructure::transport::{HttpRequest, HttpResponse, Transport},
    },
};
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota};
use reqwest::Client;
use std::collections::BTreeMap;
use std::error::Error as _;
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{debug, trace};

/// A single pooled HTTPS client per connection.
///
/// Basic credentials are attached to each request; a client certificate is
/// installed once in the pool. Certificates are verified unless the
/// connection disables it.
#[derive(Debug)]
pub struct HttpsTransport {
    http_client: Client,
    auth: ClientAuth,
    rate_limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl HttpsTransport {
    /// # Errors
    /// Returns a `config` kind error if the rate limit is zero or the HTTP
    /// client cannot be built.
    pub fn new(
        connection: &OntapConnection,
        auth: ClientAuth,
        rate_limit: Option<RateLimitConfig>,
    ) -> OntapResult<Self> {
        let mut builder = Client::builder()
            .danger_accept_invalid_certs(!connection.validate_certs())
            .https_only(connection.is_connection_secure())
            .timeout(connection.request_timeout());
        if let Some(identity) = auth.identity() {
            builder = builder.identity(identity);
        }
        let http_client = builder
            .build()
            .map_err(|e| OntapError::config(format!("Error: cannot build HTTP client: {e}")))?;

        let rate_limiter = match rate_limit {
            Some(limit) => {
                let per_second = NonZeroU32::new(limit.requests_per_second).ok_or_else(|| {
                    OntapError::config("Error: rate_limit.requests_per_second must be > 0")
                })?;
                let burst = NonZeroU32::new(limit.burst_size)
                    .ok_or_else(|| OntapError::config("Error: rate_limit.burst_size must be > 0"))?;
                let quota = Quota::per_second(per_second).allow_burst(burst);
                Some(Arc::new(DefaultDirectRateLimiter::direct(quota)))
            }
            None => None,
        };

        Ok(Self {
            http_client,
            auth,
            rate_limiter,
        })
    }
}

/// Maps a `reqwest` failure onto a transport class.
fn classify(error: &reqwest::Error) -> TransportErrorClass {
    if error.is_timeout() {
        return TransportErrorClass::Timeout;
    }
    if error.is_decode() || error.is_body() {
        return TransportErrorClass::Decode;
    }
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string().to_ascii_lowercase();
        if text.contains("certificate") || text.contains("tls") || text.contains("handshake") {
            return TransportErrorClass::Tls;
        }
        source = cause.source();
    }
    TransportErrorClass::Connect
}

/// Renders the error with its full source chain.
fn describe(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[async_trait]
impl Transport for HttpsTransport {
    async fn request(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        let url = request.full_url();
        debug!(method = %request.method, url = %url, "sending request");

        let mut builder = self
            .http_client
            .request(request.method.into(), url.as_str())
            .timeout(request.timeout);
        builder = self.auth.apply(builder);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::new(classify(&e), describe(&e)))?;

        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::new(TransportErrorClass::Decode, describe(&e)))?
            .to_vec();
        trace!(status, bytes = body.len(), "received response");

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HostOptions;
    use crate::core::domain::model::rest_call::Verb;
    use std::time::Duration;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{basic_auth, header, method, path, query_param},
    };

    fn create_test_connection(server_url: &str) -> OntapConnection {
        let address = server_url.trim_start_matches("http://");
        let (host, port) = address.split_once(':').unwrap();
        let mut options = HostOptions::new(host);
        options.username = Some("admin".into());
        options.password = Some("netapp1!".into());
        options.use_https = false;
        options.http_port = Some(port.parse().unwrap());
        options.connection().unwrap()
    }

    fn create_test_transport(
        connection: &OntapConnection,
        rate_limit: Option<RateLimitConfig>,
    ) -> HttpsTransport {
        let auth = ClientAuth::Basic {
            username: "admin".into(),
            password: "netapp1!".into(),
        };
        HttpsTransport::new(connection, auth, rate_limit).unwrap()
    }

    #[tokio::test]
    async fn test_get_with_basic_auth_and_query() {
        let mock_server = MockServer::start().await;
        let connection = create_test_connection(&mock_server.uri());
        let transport = create_test_transport(&connection, None);

        Mock::given(method("GET"))
            .and(path("/api/cluster"))
            .and(query_param("fields", "version"))
            .and(basic_auth("admin", "netapp1!"))
            .and(header("accept", "application/json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-Test", "yes")
                    .set_body_json(serde_json::json!({"version": {"generation": 9}})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut request = HttpRequest::new(
            Verb::Get,
            connection.rest_url("cluster").unwrap(),
            Duration::from_secs(5),
        );
        request.query.insert("fields".into(), "version".into());
        request
            .headers
            .insert("accept".into(), "application/json".into());

        let response = transport.request(request).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.headers.get("x-test").map(String::as_str), Some("yes"));
        let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body["version"]["generation"], 9);
    }

    #[tokio::test]
    async fn test_non_2xx_is_an_answer() {
        let mock_server = MockServer::start().await;
        let connection = create_test_connection(&mock_server.uri());
        let transport = create_test_transport(&connection, None);

        Mock::given(method("DELETE"))
            .and(path("/api/storage/volumes/abc"))
            .respond_with(ResponseTemplate::new(404).set_body_string("gone"))
            .mount(&mock_server)
            .await;

        let request = HttpRequest::new(
            Verb::Delete,
            connection.rest_url("storage/volumes/abc").unwrap(),
            Duration::from_secs(5),
        );
        let response = transport.request(request).await.unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(response.body_text(), "gone");
        assert_eq!(response.error_class(), Some(TransportErrorClass::Http4xx));
    }

    #[tokio::test]
    async fn test_timeout_is_classified() {
        let mock_server = MockServer::start().await;
        let connection = create_test_connection(&mock_server.uri());
        let transport = create_test_transport(&connection, None);

        Mock::given(method("GET"))
            .and(path("/api/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&mock_server)
            .await;

        let request = HttpRequest::new(
            Verb::Get,
            connection.rest_url("slow").unwrap(),
            Duration::from_millis(50),
        );
        let err = transport.request(request).await.unwrap_err();
        assert_eq!(err.class, TransportErrorClass::Timeout);
    }

    #[tokio::test]
    async fn test_secure_connection_refuses_plain_http() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let address = mock_server.address();
        let mut options = HostOptions::new(address.ip().to_string());
        options.username = Some("admin".into());
        options.password = Some("netapp1!".into());
        options.http_port = Some(address.port());
        let secure = options.connection().unwrap();
        assert!(secure.is_connection_secure());
        let transport = create_test_transport(&secure, None);

        let plain = create_test_connection(&mock_server.uri());
        let request = HttpRequest::new(
            Verb::Get,
            plain.rest_url("cluster").unwrap(),
            Duration::from_secs(2),
        );
        assert!(transport.request(request).await.is_err());
    }

    #[tokio::test]
    async fn test_connection_refused_is_classified() {
        // Bound without listen: the port stays reserved and connects are refused.
        let socket = tokio::net::TcpSocket::new_v4().unwrap();
        socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let port = socket.local_addr().unwrap().port();
        let connection = create_test_connection(&format!("http://127.0.0.1:{port}"));
        let transport = create_test_transport(&connection, None);
        let request = HttpRequest::new(
            Verb::Get,
            connection.rest_url("cluster").unwrap(),
            Duration::from_secs(2),
        );
        let err = transport.request(request).await.unwrap_err();
        assert_eq!(err.class, TransportErrorClass::Connect);
        drop(socket);
    }

    #[tokio::test]
    async fn test_rate_limiting_delays_requests() {
        use std::time::Instant;

        let mock_server = MockServer::start().await;
        let connection = create_test_connection(&mock_server.uri());
        let transport = create_test_transport(
            &connection,
            Some(RateLimitConfig {
                requests_per_second: 2,
                burst_size: 2,
            }),
        );

        Mock::given(method("GET"))
            .and(path("/api/cluster"))
            .respond_with(ResponseTemplate::new(200))
            .expect(4)
            .mount(&mock_server)
            .await;

        let get = || {
            HttpRequest::new(
                Verb::Get,
                connection.rest_url("cluster").unwrap(),
                Duration::from_secs(5),
            )
        };

        let start = Instant::now();
        let (first, second) = tokio::join!(transport.request(get()), transport.request(get()));
        first.unwrap();
        second.unwrap();
        assert!(start.elapsed() < Duration::from_millis(500));

        let start = Instant::now();
        let (third, fourth) = tokio::join!(transport.request(get()), transport.request(get()));
        third.unwrap();
        fourth.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(900));
    }

    #[test]
    fn test_rejects_zero_rate_limit() {
        let mut options = HostOptions::new("cluster1");
        options.username = Some("admin".into());
        options.password = Some("pw".into());
        let connection = options.connection().unwrap();
        let auth = ClientAuth::Basic {
            username: "admin".into(),
            password: "pw".into(),
        };
        let err = HttpsTransport::new(
            &connection,
            auth,
            Some(RateLimitConfig {
                requests_per_second: 0,
                burst_size: 1,
            }),
        )
        .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Config);
    }
}
