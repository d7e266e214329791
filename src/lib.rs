//! # leeca_ontap
//!
//! A shared runtime for declarative NetApp ONTAP automation modules.
//!
//! The crate gives every resource module the same plumbing:
//! - an [`OntapClient`] speaking REST (`/api/...`) and the legacy ZAPI XML
//!   protocol through one injectable [`Transport`]
//! - protocol selection and version gating ([`CapabilityGate`])
//! - REST job polling for asynchronous operations
//! - a reconcile loop ([`module::application::service::reconcile_service::NetAppModule`])
//!   that diffs desired against current state and executes the minimum action
//! - a [`module::host::ModuleHost`] boundary and test doubles in [`testing`]
//!
//! # Examples
//!
//! ```no_run
//! use leeca_ontap::{OntapClient, OntapResult, Query};
//!
//! #[tokio::main]
//! async fn main() -> OntapResult<()> {
//!     let client = OntapClient::builder()
//!         .hostname("cluster1.example.com")
//!         .credentials("admin", "secret")
//!         .validate_certs(false)
//!         .build()
//!         .await?;
//!
//!     let capabilities = client.capabilities().await?;
//!     println!("ONTAP {}", capabilities.version_label());
//!
//!     let timeout = client
//!         .get_one("private/cli/system/timeout", &Query::new(), &["timeout"])
//!         .await?;
//!     println!("{timeout:?}");
//!     Ok(())
//! }
//! ```

mod auth;
mod core;
pub mod module;
pub mod resources;
pub mod testing;

pub use crate::core::domain::error::{
    ErrorKind, OntapError, OntapResult, TransportError, TransportErrorClass, ValidationError,
};
pub use crate::core::domain::model::{
    cluster_capabilities::ClusterCapabilities,
    envelope::{ResultEnvelope, Warnings},
    host_options::{HostOptions, RateLimitConfig, UseRest},
    job::{Job, JobHandle, JobState},
    ontap_connection::OntapConnection,
    rest_call::{RestCall, RestResult, Verb},
    zapi_element::ZapiElement,
};
pub use crate::core::domain::value_object::{Credentials, OntapHost, OntapPort, OntapVersion};
pub use crate::core::infrastructure::{
    capability_gate::{CapabilityGate, Protocol, ProtocolRequirements},
    http_transport::HttpsTransport,
    job_reconciler::{JobReconciler, JobSource},
    rest_client::{AsyncOptions, JOB_RESPONSE_KEY, Query, RestClient},
    transport::{HttpRequest, HttpResponse, Transport},
    zapi_codec::{self, ZapiClient},
};

use crate::auth::application::service::auth_service::AuthService;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// A client for one ONTAP cluster, speaking both REST and ZAPI.
///
/// The client owns the transport and the cluster capability cache. It is
/// meant to be owned by a single module invocation.
pub struct OntapClient {
    options: HostOptions,
    connection: OntapConnection,
    rest: RestClient,
    zapi: ZapiClient,
    capabilities: RwLock<Option<ClusterCapabilities>>,
}

/// Builder for [`OntapClient`] configuration
#[derive(Default)]
pub struct OntapClientBuilder {
    hostname: Option<String>,
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    cert_path: Option<PathBuf>,
    key_path: Option<PathBuf>,
    use_https: Option<bool>,
    validate_certs: Option<bool>,
    use_rest: Option<UseRest>,
    request_timeout: Option<Duration>,
    rate_limit: Option<RateLimitConfig>,
    feature_flags: Vec<(String, bool)>,
    transport: Option<Arc<dyn Transport>>,
}

impl OntapClientBuilder {
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Authenticates with a PEM client certificate and key instead of a password.
    pub fn certificate(mut self, cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        self.cert_path = Some(cert_path.into());
        self.key_path = Some(key_path.into());
        self
    }

    pub fn use_https(mut self, use_https: bool) -> Self {
        self.use_https = Some(use_https);
        self
    }

    pub fn validate_certs(mut self, validate_certs: bool) -> Self {
        self.validate_certs = Some(validate_certs);
        self
    }

    pub fn use_rest(mut self, use_rest: UseRest) -> Self {
        self.use_rest = Some(use_rest);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn rate_limit(mut self, requests_per_second: u32, burst_size: u32) -> Self {
        self.rate_limit = Some(RateLimitConfig {
            requests_per_second,
            burst_size,
        });
        self
    }

    pub fn feature_flag(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.feature_flags.push((name.into(), enabled));
        self
    }

    /// Replaces the HTTPS transport, typically with a test double.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Validates the configuration and builds the client.
    ///
    /// # Errors
    /// Returns a `config` kind error if the hostname is missing or any
    /// connection option is invalid.
    pub async fn build(self) -> OntapResult<OntapClient> {
        let hostname = self.hostname.ok_or_else(|| ValidationError::Field {
            field: "hostname".to_string(),
            message: "Hostname is required".to_string(),
        })?;

        let mut options = HostOptions::new(hostname);
        options.http_port = self.port;
        options.username = self.username;
        options.password = self.password;
        options.cert_path = self.cert_path;
        options.key_path = self.key_path;
        if let Some(use_https) = self.use_https {
            options.use_https = use_https;
        }
        if let Some(validate_certs) = self.validate_certs {
            options.validate_certs = validate_certs;
        }
        if let Some(use_rest) = self.use_rest {
            options.use_rest = use_rest;
        }
        if let Some(timeout) = self.request_timeout {
            options.request_timeout = timeout;
        }
        options.rate_limit = self.rate_limit;
        for (name, enabled) in self.feature_flags {
            options.feature_flags.insert(name, Value::Bool(enabled));
        }

        match self.transport {
            Some(transport) => OntapClient::with_transport(options, transport),
            None => OntapClient::new(options).await,
        }
    }
}

impl OntapClient {
    /// Creates a new builder for OntapClient configuration
    pub fn builder() -> OntapClientBuilder {
        OntapClientBuilder::default()
    }

    /// Creates a client talking HTTPS to the host described by `options`.
    ///
    /// # Errors
    /// Returns a `config` kind error if the options are invalid, the client
    /// certificate cannot be loaded, or the HTTP client cannot be built.
    pub async fn new(options: HostOptions) -> OntapResult<Self> {
        let connection = options.connection()?;
        let auth = AuthService::new().execute(&connection).await?;
        let transport = HttpsTransport::new(&connection, auth, options.rate_limit)?;
        Self::with_transport(options, Arc::new(transport))
    }

    /// Creates a client over an arbitrary transport.
    ///
    /// # Errors
    /// Returns a `config` kind error if the options are invalid.
    pub fn with_transport(options: HostOptions, transport: Arc<dyn Transport>) -> OntapResult<Self> {
        let connection = options.connection()?;
        let trace_apis = options.feature_flag("trace_apis");
        let rest = RestClient::new(Arc::clone(&transport), connection.clone(), trace_apis);
        let zapi = ZapiClient::new(transport, connection.clone(), options.zapi_version, trace_apis);
        debug!(host = connection.host().as_str(), port = connection.port().get(), "ONTAP client ready");
        Ok(Self {
            options,
            connection,
            rest,
            zapi,
            capabilities: RwLock::new(None),
        })
    }

    pub fn host_options(&self) -> &HostOptions {
        &self.options
    }

    pub fn connection(&self) -> &OntapConnection {
        &self.connection
    }

    /// The REST half of the client, for calls the helpers below do not cover.
    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    /// Discovers the cluster version with `GET cluster?fields=version`.
    ///
    /// A successful lookup is cached for the lifetime of the client; a failed
    /// one is retried on the next call.
    ///
    /// # Errors
    /// Any REST error, or `unexpected_shape` if the record carries no version.
    pub async fn capabilities(&self) -> OntapResult<ClusterCapabilities> {
        if let Some(cached) = self.capabilities.read().await.as_ref() {
            return Ok(cached.clone());
        }
        let mut slot = self.capabilities.write().await;
        if let Some(cached) = slot.as_ref() {
            return Ok(cached.clone());
        }

        let query = Query::from([("fields".to_string(), "version".to_string())]);
        let record = self.rest.get("cluster", &query).await?;
        let capabilities = ClusterCapabilities::from_cluster_record(&record).ok_or_else(|| {
            OntapError::UnexpectedShape(format!("no version in cluster record: {record}"))
                .context("cluster")
        })?;
        info!(
            version = %capabilities.version_label(),
            supports_rest = capabilities.supports_rest,
            "discovered cluster capabilities"
        );
        *slot = Some(capabilities.clone());
        Ok(capabilities)
    }

    /// Chooses REST or ZAPI for a module invocation.
    ///
    /// The version lookup is only issued when the `use_rest` policy needs it.
    ///
    /// # Errors
    /// `config` kind errors from the capability gate; lookup errors under
    /// `use_rest: always`.
    pub async fn select_protocol(
        &self,
        requirements: &ProtocolRequirements,
        warnings: &mut Warnings,
    ) -> OntapResult<Protocol> {
        let gate = CapabilityGate::new(
            self.options.use_rest,
            self.options.feature_flag("deprecation_warning"),
        );
        let lookup = if gate.needs_version_lookup() {
            self.capabilities().await
        } else {
            Ok(ClusterCapabilities::zapi_only())
        };
        let protocol = gate.select(requirements, lookup, warnings)?;
        debug!(module = %requirements.module, protocol = %protocol, "protocol selected");
        Ok(protocol)
    }

    /// GET expecting zero or one record.
    ///
    /// # Errors
    /// `unexpected_shape` when more than one record matches the query.
    pub async fn get_one(&self, path: &str, query: &Query, fields: &[&str]) -> OntapResult<Option<Value>> {
        self.rest.get_one(path, query, fields).await
    }

    /// GET returning every matching record across pages.
    pub async fn get_many(&self, path: &str, query: &Query, fields: &[&str]) -> OntapResult<Vec<Value>> {
        self.rest.get_many(path, query, fields).await
    }

    pub async fn post_async(&self, path: &str, body: &Value, opts: &AsyncOptions) -> OntapResult<Value> {
        self.rest.post_async(path, body, opts).await
    }

    pub async fn patch_async(
        &self,
        path: &str,
        key: Option<&str>,
        body: &Value,
        opts: &AsyncOptions,
    ) -> OntapResult<Value> {
        self.rest.patch_async(path, key, body, opts).await
    }

    pub async fn delete_async(&self, path: &str, key: &str, opts: &AsyncOptions) -> OntapResult<Value> {
        self.rest.delete_async(path, key, opts).await
    }

    /// Verbs the cluster allows on `path`.
    pub async fn options(&self, path: &str) -> OntapResult<BTreeSet<String>> {
        self.rest.options(path).await
    }

    /// Invokes the ZAPI `tag`, with `tree` translated into child elements.
    ///
    /// # Errors
    /// `api` kind for a failed `results` status; errors are tagged with `tag`.
    pub async fn zapi(&self, tag: &str, tree: &Value, vserver: Option<&str>) -> OntapResult<ZapiElement> {
        self.zapi.invoke(&ZapiElement::from_value(tag, tree), vserver).await
    }

    /// Invokes an iterating ZAPI and returns the records of every page.
    pub async fn zapi_iter(
        &self,
        tag: &str,
        tree: &Value,
        vserver: Option<&str>,
    ) -> OntapResult<Vec<ZapiElement>> {
        self.zapi
            .invoke_iter(&ZapiElement::from_value(tag, tree), vserver)
            .await
    }
}

#[cfg(test)]
mod tests;
