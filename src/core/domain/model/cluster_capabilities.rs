//! What the client learned about the cluster it talks to.

use crate::core::domain::value_object::OntapVersion;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Discovered once per client and cached for its lifetime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterCapabilities {
    /// `None` when the version could not be determined (REST unavailable).
    pub version: Option<OntapVersion>,
    pub supports_rest: bool,
    /// `asa` for SAN-optimized clusters, `unified` otherwise, when reported.
    pub ontap_personality: Option<String>,
    /// Minimum versions for named options, as declared by the running module.
    #[serde(default)]
    pub known_minimum_versions: BTreeMap<String, OntapVersion>,
}

impl ClusterCapabilities {
    /// Capabilities of a cluster that did not answer the version lookup.
    pub fn zapi_only() -> Self {
        Self::default()
    }

    /// Builds capabilities from a `GET cluster` record.
    ///
    /// Clusters older than 9.6 expose a partial REST API that is not usable,
    /// so they are reported as not supporting REST.
    pub fn from_cluster_record(record: &Value) -> Option<Self> {
        let version: OntapVersion =
            serde_json::from_value(record.get("version")?.clone()).ok()?;
        let ontap_personality = record
            .get("san_optimized")
            .and_then(Value::as_bool)
            .map(|asa| if asa { "asa" } else { "unified" }.to_string());
        Some(Self {
            version: Some(version),
            supports_rest: version >= OntapVersion::REST_MINIMUM,
            ontap_personality,
            known_minimum_versions: BTreeMap::new(),
        })
    }

    /// True when the cluster version is known and at least `minimum`.
    pub fn meets(&self, minimum: OntapVersion) -> bool {
        self.version.is_some_and(|v| v >= minimum)
    }

    /// Renders the version for messages, `unknown` when not discovered.
    pub fn version_label(&self) -> String {
        self.version
            .map(|v| v.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}
