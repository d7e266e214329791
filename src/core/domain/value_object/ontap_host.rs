use crate::core::domain::error::ValidationError;
use std::net::IpAddr;

const MAX_HOSTNAME_LENGTH: usize = 253;
const MAX_LABEL_LENGTH: usize = 63;

/// A validated ONTAP management address (cluster or SVM management LIF).
///
/// Holds either an RFC 1035 hostname or an IP literal. IPv6 literals may be
/// given with or without brackets; [`OntapHost::url_host`] always returns the
/// bracketed form suitable for a URL authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OntapHost(String);

impl OntapHost {
    /// Creates a new host without validation.
    pub(crate) fn new_unchecked(host: String) -> Self {
        Self(host)
    }

    /// Validates and wraps a host.
    pub fn new(host: impl Into<String>) -> Result<Self, ValidationError> {
        let host = host.into();
        validate_host(&host)?;
        Ok(Self(host))
    }

    /// Returns the host as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the host as it must appear in a URL.
    #[must_use]
    pub fn url_host(&self) -> String {
        let bare = self.0.trim_start_matches('[').trim_end_matches(']');
        match bare.parse::<IpAddr>() {
            Ok(IpAddr::V6(_)) => format!("[{bare}]"),
            _ => bare.to_string(),
        }
    }
}

fn validate_label(label: &str) -> Result<(), ValidationError> {
    if label.is_empty() || label.len() > MAX_LABEL_LENGTH {
        return Err(ValidationError::Format(format!(
            "Label must be between 1 and {MAX_LABEL_LENGTH} characters"
        )));
    }

    if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ValidationError::Format(
            "Label can only contain alphanumeric characters and hyphens".to_string(),
        ));
    }

    if label.starts_with('-') || label.ends_with('-') {
        return Err(ValidationError::Format(
            "Label cannot start or end with hyphen".to_string(),
        ));
    }

    Ok(())
}

/// Validates a hostname or IP literal.
pub(crate) fn validate_host(host: &str) -> Result<(), ValidationError> {
    if host.is_empty() {
        return Err(ValidationError::Field {
            field: "hostname".to_string(),
            message: "Hostname cannot be empty".to_string(),
        });
    }

    let bare = host.trim_start_matches('[').trim_end_matches(']');
    if bare.parse::<IpAddr>().is_ok() {
        return Ok(());
    }

    if host.len() > MAX_HOSTNAME_LENGTH {
        return Err(ValidationError::ConstraintViolation(format!(
            "Hostname length exceeds maximum of {MAX_HOSTNAME_LENGTH} characters"
        )));
    }

    for label in host.split('.') {
        validate_label(label)?;
    }
    Ok(())
}
