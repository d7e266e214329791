use crate::{
    auth::application::response::client_auth::ClientAuth,
    core::domain::{
        error::{OntapError, OntapResult},
        model::ontap_connection::OntapConnection,
        value_object::Credentials,
    },
};
use reqwest::Identity;
use std::path::Path;
use tracing::debug;

/// Turns validated credentials into [`ClientAuth`].
///
/// Certificate authentication reads the PEM certificate and key from disk and
/// bundles them into a single client identity.
pub struct AuthService;

impl AuthService {
    pub fn new() -> Self {
        Self
    }

    /// # Errors
    /// Returns a `config` kind error if a PEM file cannot be read or parsed.
    pub async fn execute(&self, connection: &OntapConnection) -> OntapResult<ClientAuth> {
        match connection.credentials() {
            Credentials::Basic { username, password } => {
                debug!(username = %username, "using basic authentication");
                Ok(ClientAuth::Basic {
                    username: username.clone(),
                    password: password.clone(),
                })
            }
            Credentials::Certificate {
                cert_path,
                key_path,
            } => {
                debug!(cert_path = %cert_path.display(), "using certificate authentication");
                let mut pem = self.read_pem(cert_path, "cert_path").await?;
                let key = self.read_pem(key_path, "key_path").await?;
                pem.push(b'\n');
                pem.extend_from_slice(&key);
                let identity = Identity::from_pem(&pem).map_err(|e| {
                    OntapError::config(format!("Error: failed to load client certificate: {e}"))
                })?;
                Ok(ClientAuth::Identity(identity))
            }
        }
    }

    async fn read_pem(&self, path: &Path, field: &str) -> OntapResult<Vec<u8>> {
        let content = tokio::fs::read(path).await.map_err(|e| {
            OntapError::config(format!(
                "Error: cannot read {field} '{}': {e}",
                path.display()
            ))
        })?;
        if !content.windows(11).any(|w| w == b"-----BEGIN ") {
            return Err(OntapError::config(format!(
                "Error: {field} '{}' is not a PEM file",
                path.display()
            )));
        }
        Ok(content)
    }
}

impl Default for AuthService {
    fn default() -> Self {
        Self::new()
    }
}
