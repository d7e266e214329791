pub mod capability_gate;
pub mod http_transport;
pub mod job_reconciler;
pub mod rest_client;
pub mod transport;
pub mod zapi_codec;
