use crate::core::domain::error::ValidationError;

/// A validated ONTAP management port number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OntapPort(u16);

impl OntapPort {
    /// Creates a new port without validation.
    pub(crate) fn new_unchecked(port: u16) -> Self {
        Self(port)
    }

    /// Returns the port for the scheme when none was configured.
    pub(crate) fn default_for(use_https: bool) -> Self {
        Self(if use_https { 443 } else { 80 })
    }

    /// Returns the port number.
    pub fn get(&self) -> u16 {
        self.0
    }
}

/// Validates a port number.
pub(crate) fn validate_port(port: u16) -> Result<(), ValidationError> {
    if port == 0 {
        return Err(ValidationError::Field {
            field: "http_port".to_string(),
            message: "Port cannot be 0".to_string(),
        });
    }
    // All ports 1-65535 are valid.
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_port_valid() {
        assert!(validate_port(443).is_ok());
        assert!(validate_port(8443).is_ok());
        assert!(validate_port(65535).is_ok());
    }

    #[test]
    fn test_validate_port_invalid() {
        assert!(validate_port(0).is_err());
    }

    #[test]
    fn test_port_defaults_follow_scheme() {
        assert_eq!(OntapPort::default_for(true).get(), 443);
        assert_eq!(OntapPort::default_for(false).get(), 80);
        assert_eq!(OntapPort::new_unchecked(8443).get(), 8443);
    }
}
