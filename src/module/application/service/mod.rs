pub mod module_runner;
pub mod reconcile_service;
