//! Connection descriptor shared by every module.
//!
//! `HostOptions` is the raw, deserializable form of the connection options a
//! module receives; [`HostOptions::connection`] validates it into an
//! [`OntapConnection`].

use crate::core::domain::{
    error::{OntapError, OntapResult, ValidationError},
    model::ontap_connection::OntapConnection,
    value_object::{
        Credentials, OntapHost, OntapPort, serde_helpers::duration_secs,
        serde_helpers::loose_bool, validate_host, validate_port,
    },
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Default deadline for a whole module invocation.
pub const DEFAULT_MODULE_TIMEOUT: Duration = Duration::from_secs(600);
/// Ceiling for any single request, including slow deletes.
pub const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

/// Protocol selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UseRest {
    /// REST is mandatory; never fall back to ZAPI.
    #[serde(alias = "Always")]
    Always,
    /// ZAPI only.
    #[serde(alias = "Never")]
    Never,
    /// REST when the cluster and every requested option allow it.
    #[default]
    #[serde(alias = "Auto")]
    Auto,
}

/// Client side request pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_second: u32,
    pub burst_size: u32,
}

/// Feature flags with a known meaning, and their defaults.
const KNOWN_FEATURE_FLAGS: &[(&str, bool)] = &[("trace_apis", false), ("deprecation_warning", true)];

fn default_true() -> bool {
    true
}

fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

fn default_module_timeout() -> Duration {
    DEFAULT_MODULE_TIMEOUT
}

/// The connection descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostOptions {
    pub hostname: String,
    #[serde(default, alias = "user")]
    pub username: Option<String>,
    #[serde(default, alias = "pass", skip_serializing)]
    pub password: Option<String>,
    #[serde(default, alias = "cert_filepath")]
    pub cert_path: Option<PathBuf>,
    #[serde(default, alias = "key_filepath")]
    pub key_path: Option<PathBuf>,
    #[serde(default)]
    pub http_port: Option<u16>,
    #[serde(
        default = "default_true",
        alias = "https",
        deserialize_with = "loose_bool::deserialize"
    )]
    pub use_https: bool,
    #[serde(default = "default_true", deserialize_with = "loose_bool::deserialize")]
    pub validate_certs: bool,
    #[serde(default)]
    pub use_rest: UseRest,
    #[serde(default, alias = "ontapi")]
    pub zapi_version: Option<u32>,
    #[serde(default)]
    pub feature_flags: BTreeMap<String, Value>,
    #[serde(default = "default_request_timeout", with = "duration_secs")]
    pub request_timeout: Duration,
    #[serde(default = "default_module_timeout", with = "duration_secs")]
    pub module_timeout: Duration,
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,
}

impl HostOptions {
    /// Creates options for `hostname` with every other field at its default.
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            username: None,
            password: None,
            cert_path: None,
            key_path: None,
            http_port: None,
            use_https: true,
            validate_certs: true,
            use_rest: UseRest::default(),
            zapi_version: None,
            feature_flags: BTreeMap::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            module_timeout: DEFAULT_MODULE_TIMEOUT,
            rate_limit: None,
        }
    }

    /// Reads the connection options out of a module parameter map.
    pub fn from_params(params: &serde_json::Map<String, Value>) -> OntapResult<Self> {
        serde_json::from_value(Value::Object(params.clone()))
            .map_err(|e| OntapError::config(format!("Error: invalid connection options: {e}")))
    }

    /// Returns the value of a boolean feature flag, falling back to its default.
    pub fn feature_flag(&self, name: &str) -> bool {
        if let Some(value) = self.feature_flags.get(name) {
            if let Some(flag) = loose_bool::parse(value) {
                return flag;
            }
        }
        KNOWN_FEATURE_FLAGS
            .iter()
            .find(|(flag, _)| *flag == name)
            .map(|(_, default)| *default)
            .unwrap_or(false)
    }

    /// Validates the options and derives the connection.
    ///
    /// # Errors
    /// Returns a `config` kind error when:
    /// - the hostname or port is invalid
    /// - neither a password nor a certificate/key pair is given
    /// - certificate authentication is requested while HTTPS is off
    /// - a timeout or rate limit is out of range
    pub fn connection(&self) -> OntapResult<OntapConnection> {
        validate_host(&self.hostname)?;
        let port = match self.http_port {
            Some(port) => {
                validate_port(port)?;
                OntapPort::new_unchecked(port)
            }
            None => OntapPort::default_for(self.use_https),
        };

        let credentials = Credentials::resolve(
            self.username.as_deref(),
            self.password.as_deref(),
            self.cert_path.as_deref(),
            self.key_path.as_deref(),
        )?;
        if credentials.is_certificate() && !self.use_https {
            return Err(OntapError::config(
                "Error: using SSL certificate authentication requires HTTPS to be enabled.",
            ));
        }

        if self.request_timeout.is_zero() || self.request_timeout > MAX_REQUEST_TIMEOUT {
            return Err(ValidationError::Field {
                field: "request_timeout".to_string(),
                message: format!(
                    "must be between 1 and {} seconds",
                    MAX_REQUEST_TIMEOUT.as_secs()
                ),
            }
            .into());
        }
        if self.module_timeout.is_zero() {
            return Err(ValidationError::Field {
                field: "module_timeout".to_string(),
                message: "must be greater than 0".to_string(),
            }
            .into());
        }
        if let Some(limit) = self.rate_limit {
            if limit.requests_per_second == 0 || limit.burst_size == 0 {
                return Err(ValidationError::Field {
                    field: "rate_limit".to_string(),
                    message: "requests_per_second and burst_size must be greater than 0"
                        .to_string(),
                }
                .into());
            }
        }

        OntapConnection::new(
            OntapHost::new_unchecked(self.hostname.clone()),
            port,
            credentials,
            self.use_https,
            self.validate_certs,
            self.request_timeout,
        )
    }
}
