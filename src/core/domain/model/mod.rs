pub mod cluster_capabilities;
pub mod envelope;
pub mod host_options;
pub mod job;
pub mod ontap_connection;
pub mod rest_call;
pub mod zapi_element;
