//! Chooses REST or ZAPI for a module invocation and enforces version gates.

use crate::core::domain::{
    error::{OntapError, OntapResult},
    model::{cluster_capabilities::ClusterCapabilities, envelope::Warnings, host_options::UseRest},
    value_object::OntapVersion,
};
use std::fmt;
use tracing::{info, warn};

/// The protocol a module talks for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Rest,
    Zapi,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Protocol::Rest => "REST",
            Protocol::Zapi => "ZAPI",
        })
    }
}

/// What a module needs from the protocol, given the options actually used.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProtocolRequirements {
    pub module: String,
    pub zapi_supported: bool,
    /// Minimum ONTAP version for the module's REST implementation.
    pub rest_minimum: Option<OntapVersion>,
    /// Used options REST cannot express.
    pub unsupported_rest_options: Vec<String>,
    /// Used options ZAPI cannot express.
    pub rest_only_options: Vec<String>,
    /// Used options with their minimum ONTAP version under REST.
    pub partially_supported: Vec<(String, OntapVersion)>,
}

/// Protocol selection for a `use_rest` policy.
#[derive(Debug, Clone, Copy)]
pub struct CapabilityGate {
    use_rest: UseRest,
    deprecation_warning: bool,
}

impl CapabilityGate {
    pub fn new(use_rest: UseRest, deprecation_warning: bool) -> Self {
        Self {
            use_rest,
            deprecation_warning,
        }
    }

    /// Whether [`select`](Self::select) needs the cluster capabilities.
    pub fn needs_version_lookup(&self) -> bool {
        self.use_rest != UseRest::Never
    }

    /// Picks the protocol.
    ///
    /// `lookup` is the outcome of the version lookup; it is ignored for
    /// `use_rest: never`.
    ///
    /// # Errors
    /// `config` kind errors naming the option or module that cannot run on
    /// this cluster; with `use_rest: always` a failed lookup is returned as is.
    pub fn select(
        &self,
        requirements: &ProtocolRequirements,
        lookup: OntapResult<ClusterCapabilities>,
        warnings: &mut Warnings,
    ) -> OntapResult<Protocol> {
        match self.use_rest {
            UseRest::Never => self.zapi_or_fail(requirements, None),
            UseRest::Always => {
                if !requirements.unsupported_rest_options.is_empty() {
                    return Err(OntapError::config(format!(
                        "REST API currently does not support '{}'",
                        requirements.unsupported_rest_options.join(", ")
                    )));
                }
                rest_preconditions(requirements, &lookup?)?;
                Ok(Protocol::Rest)
            }
            UseRest::Auto => self.select_auto(requirements, lookup, warnings),
        }
    }

    fn select_auto(
        &self,
        requirements: &ProtocolRequirements,
        lookup: OntapResult<ClusterCapabilities>,
        warnings: &mut Warnings,
    ) -> OntapResult<Protocol> {
        let capabilities = match lookup {
            Ok(capabilities) => capabilities,
            Err(error) if requirements.zapi_supported => {
                info!(error = %error, "version lookup failed, using ZAPI");
                ClusterCapabilities::zapi_only()
            }
            Err(error) => return Err(error),
        };

        let fallback_reason = fallback_reason(requirements, &capabilities);
        if capabilities.supports_rest && fallback_reason.is_none() {
            return Ok(Protocol::Rest);
        }
        if !requirements.zapi_supported {
            rest_preconditions(requirements, &capabilities)?;
            return Ok(Protocol::Rest);
        }

        let protocol = self.zapi_or_fail(requirements, fallback_reason.as_deref())?;
        if let Some(reason) = fallback_reason {
            let message = format!("Falling back to ZAPI {reason}");
            warn!("{message}");
            warnings.push(message);
        }
        if self.deprecation_warning {
            warnings.push(format!(
                "Using ZAPI for {}: ONTAPI (ZAPI) is deprecated and will be removed, \
                 upgrade ONTAP or drop ZAPI-only options to use REST.",
                requirements.module
            ));
        }
        Ok(protocol)
    }

    fn zapi_or_fail(
        &self,
        requirements: &ProtocolRequirements,
        reason: Option<&str>,
    ) -> OntapResult<Protocol> {
        if !requirements.zapi_supported {
            return Err(OntapError::config(format!(
                "Error: {} only supports REST, and use_rest: {} was requested.",
                requirements.module,
                use_rest_label(self.use_rest)
            )));
        }
        if !requirements.rest_only_options.is_empty() {
            let mut message = format!(
                "Error: option(s) '{}' are only supported with REST",
                requirements.rest_only_options.join(", ")
            );
            if let Some(reason) = reason {
                message.push_str(&format!(", and REST cannot be used {reason}"));
            }
            message.push('.');
            return Err(OntapError::config(message));
        }
        Ok(Protocol::Zapi)
    }
}

fn use_rest_label(use_rest: UseRest) -> &'static str {
    match use_rest {
        UseRest::Always => "always",
        UseRest::Never => "never",
        UseRest::Auto => "auto",
    }
}

/// Why REST cannot serve this invocation, if a reason worth reporting exists.
fn fallback_reason(
    requirements: &ProtocolRequirements,
    capabilities: &ClusterCapabilities,
) -> Option<String> {
    if !capabilities.supports_rest {
        return None;
    }
    if !requirements.unsupported_rest_options.is_empty() {
        return Some(format!(
            "because of unsupported option(s) or option value(s) in REST: {}",
            requirements.unsupported_rest_options.join(", ")
        ));
    }
    if let Some((option, minimum)) = requirements
        .partially_supported
        .iter()
        .find(|(_, minimum)| !capabilities.meets(*minimum))
    {
        return Some(format!(
            "because of unsupported option(s) or option value(s) \"{option}\" in REST require {minimum}"
        ));
    }
    if let Some(minimum) = requirements.rest_minimum {
        if !capabilities.meets(minimum) {
            return Some(format!("because REST requires ONTAP {minimum} or later"));
        }
    }
    None
}

/// Checks everything a REST invocation needs from the cluster version.
fn rest_preconditions(
    requirements: &ProtocolRequirements,
    capabilities: &ClusterCapabilities,
) -> OntapResult<()> {
    let current = capabilities.version_label();
    if !capabilities.supports_rest {
        return Err(OntapError::config(format!(
            "Error: {} requires REST, and REST requires ONTAP {} or later. Current ONTAP version: {current}.",
            requirements.module,
            OntapVersion::REST_MINIMUM
        )));
    }
    if let Some(minimum) = requirements.rest_minimum {
        if !capabilities.meets(minimum) {
            return Err(OntapError::config(format!(
                "Error: requires ONTAP {minimum} or later. Current ONTAP version: {current}."
            )));
        }
    }
    let missing: Vec<String> = requirements
        .partially_supported
        .iter()
        .filter(|(_, minimum)| !capabilities.meets(*minimum))
        .map(|(option, minimum)| format!("ONTAP {minimum} or later for '{option}'"))
        .collect();
    if !missing.is_empty() {
        return Err(OntapError::config(format!(
            "Error: requires {}. Current ONTAP version: {current}.",
            missing.join(", ")
        )));
    }
    Ok(())
}
