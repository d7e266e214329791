use crate::core::domain::error::ValidationError;
use std::fmt;
use std::path::{Path, PathBuf};

/// How the client authenticates against the cluster.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// HTTP basic authentication.
    Basic { username: String, password: String },
    /// Mutual TLS with a PEM client certificate and key.
    Certificate { cert_path: PathBuf, key_path: PathBuf },
}

impl Credentials {
    /// Resolves credentials from the raw connection options.
    ///
    /// A username/password pair wins when both a password and a certificate
    /// are present, matching how the cluster itself prioritises the
    /// `Authorization` header over the client certificate.
    pub(crate) fn resolve(
        username: Option<&str>,
        password: Option<&str>,
        cert_path: Option<&Path>,
        key_path: Option<&Path>,
    ) -> Result<Self, ValidationError> {
        match (username, password, cert_path, key_path) {
            (Some(user), Some(pass), _, _) => {
                validate_username(user)?;
                Ok(Credentials::Basic {
                    username: user.to_string(),
                    password: pass.to_string(),
                })
            }
            (None, Some(_), _, _) => Err(ValidationError::Field {
                field: "username".to_string(),
                message: "username is required when password is set".to_string(),
            }),
            (_, None, Some(cert), Some(key)) => Ok(Credentials::Certificate {
                cert_path: cert.to_path_buf(),
                key_path: key.to_path_buf(),
            }),
            (_, None, Some(_), None) => Err(ValidationError::Field {
                field: "key_path".to_string(),
                message: "key_path is required when cert_path is set".to_string(),
            }),
            (_, None, None, Some(_)) => Err(ValidationError::Field {
                field: "cert_path".to_string(),
                message: "cert_path is required when key_path is set".to_string(),
            }),
            (_, None, None, None) => Err(ValidationError::ConstraintViolation(
                "one of password or (cert_path, key_path) is required".to_string(),
            )),
        }
    }

    pub fn is_certificate(&self) -> bool {
        matches!(self, Credentials::Certificate { .. })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"********")
                .finish(),
            Credentials::Certificate {
                cert_path,
                key_path,
            } => f
                .debug_struct("Certificate")
                .field("cert_path", cert_path)
                .field("key_path", key_path)
                .finish(),
        }
    }
}

/// Validates a cluster or SVM login name.
pub(crate) fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.is_empty() {
        return Err(ValidationError::Field {
            field: "username".to_string(),
            message: "Username cannot be empty".to_string(),
        });
    }
    if username.len() > 64 {
        return Err(ValidationError::Format(format!(
            "Username length must be at most 64 characters (got {})",
            username.len()
        )));
    }
    // ONTAP accepts domain users as DOMAIN\user.
    let allowed = |c: char| {
        c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@' | '\\')
    };
    if !username.chars().all(allowed) {
        return Err(ValidationError::Format(
            "Username contains invalid characters. Allowed: alphanumeric, -, _, ., @, \\"
                .to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_credentials() {
        let creds = Credentials::resolve(Some("admin"), Some("netapp1!"), None, None).unwrap();
        assert!(!creds.is_certificate());
        assert!(!format!("{creds:?}").contains("netapp1!"));
    }

    #[test]
    fn test_certificate_credentials() {
        let creds = Credentials::resolve(
            None,
            None,
            Some(Path::new("/tmp/cert.pem")),
            Some(Path::new("/tmp/key.pem")),
        )
        .unwrap();
        assert!(creds.is_certificate());
    }

    #[test]
    fn test_missing_credentials() {
        assert!(matches!(
            Credentials::resolve(Some("admin"), None, None, None),
            Err(ValidationError::ConstraintViolation(_))
        ));
        assert!(matches!(
            Credentials::resolve(None, None, Some(Path::new("/tmp/cert.pem")), None),
            Err(ValidationError::Field { field, .. }) if field == "key_path"
        ));
        assert!(Credentials::resolve(None, Some("pw"), None, None).is_err());
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("admin").is_ok());
        assert!(validate_username("CORP\\svc_ansible").is_ok());
        assert!(validate_username("vsadmin@svm1").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("user name").is_err());
        assert!(validate_username(&"a".repeat(65)).is_err());
    }
}
