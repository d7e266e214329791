use reqwest::{Identity, RequestBuilder};
use std::fmt;

/// Authentication material ready to be attached to HTTP requests.
pub enum ClientAuth {
    /// Sent as an `Authorization: Basic` header on every request.
    Basic { username: String, password: String },
    /// Presented during the TLS handshake.
    Identity(Identity),
}

impl ClientAuth {
    /// Adds per-request authentication, if any.
    pub fn apply(&self, builder: RequestBuilder) -> RequestBuilder {
        match self {
            ClientAuth::Basic { username, password } => {
                builder.basic_auth(username, Some(password))
            }
            ClientAuth::Identity(_) => builder,
        }
    }

    /// The client identity to install in the connection pool, if any.
    pub fn identity(&self) -> Option<Identity> {
        match self {
            ClientAuth::Identity(identity) => Some(identity.clone()),
            ClientAuth::Basic { .. } => None,
        }
    }
}

impl fmt::Debug for ClientAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientAuth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .finish_non_exhaustive(),
            ClientAuth::Identity(_) => f.write_str("Identity(..)"),
        }
    }
}
