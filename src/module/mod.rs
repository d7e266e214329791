//! The reconcile runtime shared by resource modules.

pub mod application;
pub mod domain;
pub mod host;
