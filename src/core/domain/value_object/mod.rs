mod credentials;
mod ontap_host;
mod ontap_port;
mod ontap_version;
pub(crate) mod serde_helpers;

pub use credentials::Credentials;
pub use ontap_host::OntapHost;
pub use ontap_port::OntapPort;
pub use ontap_version::OntapVersion;

// Re-export validation functions for internal use
pub(crate) use ontap_host::validate_host;
pub(crate) use ontap_port::validate_port;
