use crate::core::domain::{
    error::{OntapError, OntapResult},
    value_object::{Credentials, OntapHost, OntapPort},
};
use std::time::Duration;
use url::Url;

/// ZAPI servlet, relative to the base URL.
pub const ZAPI_SERVLET: &str = "servlets/netapp.servlets.admin.XMLrequest_filer";

/// A validated connection: where to send requests and how to authenticate.
#[derive(Debug, Clone)]
pub struct OntapConnection {
    host: OntapHost,
    port: OntapPort,
    credentials: Credentials,
    use_https: bool,
    validate_certs: bool,
    request_timeout: Duration,
    base_url: Url,
}

impl OntapConnection {
    pub(crate) fn new(
        host: OntapHost,
        port: OntapPort,
        credentials: Credentials,
        use_https: bool,
        validate_certs: bool,
        request_timeout: Duration,
    ) -> OntapResult<Self> {
        let scheme = if use_https { "https" } else { "http" };
        let raw = format!("{}://{}:{}/", scheme, host.url_host(), port.get());
        let base_url = Url::parse(&raw)
            .map_err(|e| OntapError::config(format!("Error: invalid URL '{raw}': {e}")))?;
        Ok(Self {
            host,
            port,
            credentials,
            use_https,
            validate_certs,
            request_timeout,
            base_url,
        })
    }

    pub fn host(&self) -> &OntapHost {
        &self.host
    }

    pub fn port(&self) -> OntapPort {
        self.port
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn is_connection_secure(&self) -> bool {
        self.use_https
    }

    pub fn validate_certs(&self) -> bool {
        self.validate_certs
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// `<scheme>://<host>:<port>/`
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `<scheme>://<host>:<port>/api/<path>`
    pub fn rest_url(&self, path: &str) -> OntapResult<Url> {
        let relative = format!("api/{}", path.trim_start_matches('/'));
        self.base_url
            .join(&relative)
            .map_err(|e| OntapError::config(format!("Error: invalid REST path '{path}': {e}")))
    }

    /// The ZAPI servlet URL.
    pub fn zapi_url(&self) -> OntapResult<Url> {
        self.base_url
            .join(ZAPI_SERVLET)
            .map_err(|e| OntapError::config(format!("Error: invalid ZAPI URL: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection(host: &str) -> OntapConnection {
        OntapConnection::new(
            OntapHost::new_unchecked(host.to_string()),
            OntapPort::new_unchecked(443),
            Credentials::Basic {
                username: "admin".into(),
                password: "pw".into(),
            },
            true,
            true,
            Duration::from_secs(30),
        )
        .unwrap()
    }

    #[test]
    fn test_urls() {
        let conn = connection("cluster1.example.com");
        assert_eq!(
            conn.rest_url("storage/volumes").unwrap().as_str(),
            "https://cluster1.example.com/api/storage/volumes"
        );
        assert_eq!(
            conn.rest_url("/cluster").unwrap().as_str(),
            "https://cluster1.example.com/api/cluster"
        );
        assert_eq!(
            conn.zapi_url().unwrap().as_str(),
            "https://cluster1.example.com/servlets/netapp.servlets.admin.XMLrequest_filer"
        );
    }

    // The url crate drops the scheme's default port when serializing.
    #[test]
    fn test_ipv6_base_url() {
        let conn = connection("fd20::12");
        assert_eq!(conn.base_url().as_str(), "https://[fd20::12]/");
    }
}
