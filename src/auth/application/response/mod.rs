pub mod client_auth;
