//! Resource modules built on the shared runtime.

pub mod cli_timeout;
pub mod flexcache;
pub mod snmp_traphosts;

use crate::module::application::service::module_runner::OntapModule;
use serde_json::{Map, Value};

/// Names accepted by [`find`].
pub const MODULE_NAMES: &[&str] = &["cli_timeout", "flexcache", "snmp_traphosts"];

/// Looks up a module by name; the `na_ontap_` prefix is optional.
pub fn find(name: &str) -> Option<Box<dyn OntapModule>> {
    match name.strip_prefix("na_ontap_").unwrap_or(name) {
        "cli_timeout" => Some(Box::new(cli_timeout::CliTimeoutModule)),
        "flexcache" => Some(Box::new(flexcache::FlexcacheModule)),
        "snmp_traphosts" => Some(Box::new(snmp_traphosts::SnmpTraphostsModule)),
        _ => None,
    }
}

pub(crate) fn param_str<'a>(params: &'a Map<String, Value>, name: &str) -> Option<&'a str> {
    params.get(name).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_by_name() {
        for name in MODULE_NAMES {
            assert_eq!(find(name).unwrap().schema().name, *name);
        }
        assert!(find("na_ontap_flexcache").is_some());
        assert!(find("volume").is_none());
    }
}
