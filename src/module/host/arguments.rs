//! Validation of raw module parameters against a [`ModuleSchema`].

use crate::core::domain::{
    error::{OntapError, OntapResult},
    value_object::serde_helpers::loose_bool,
};
use crate::module::domain::schema::{ArgType, CompareKind, ModuleSchema, OptionSpec};
use serde_json::{Map, Value};

const REDACTED: &str = "VALUE_SPECIFIED_IN_NO_LOG_PARAMETER";

/// Validates `raw` against `schema`, returning the canonical parameter map.
///
/// Aliases are folded into option names, scalars are coerced to the declared
/// type, choices are enforced and defaults filled in. Options that are unset
/// (absent or `null`) and have no default are left out of the result.
///
/// # Errors
/// Returns a `config` kind error for unknown parameters, missing required
/// parameters, an alias given together with its option, values that cannot
/// be converted, and values outside the declared choices.
pub fn validate_arguments(
    schema: &ModuleSchema,
    raw: &Map<String, Value>,
) -> OntapResult<Map<String, Value>> {
    validate_level(&schema.name, &schema.options, raw, None)
}

/// Copy of `params` with every `no_log` value masked, fit for logging.
pub fn redacted(schema: &ModuleSchema, params: &Map<String, Value>) -> Map<String, Value> {
    params
        .iter()
        .map(|(key, value)| {
            let secret = schema.find(key).is_some_and(|spec| spec.no_log);
            let value = if secret && !value.is_null() {
                Value::String(REDACTED.to_string())
            } else {
                value.clone()
            };
            (key.clone(), value)
        })
        .collect()
}

fn validate_level(
    module: &str,
    options: &[OptionSpec],
    raw: &Map<String, Value>,
    parent: Option<&str>,
) -> OntapResult<Map<String, Value>> {
    let qualified = |name: &str| match parent {
        Some(parent) => format!("{parent}.{name}"),
        None => name.to_string(),
    };

    let mut folded: Map<String, Value> = Map::new();
    let mut unknown = Vec::new();
    for (key, value) in raw {
        let Some(spec) = options.iter().find(|spec| spec.answers_to(key)) else {
            unknown.push(qualified(key));
            continue;
        };
        if folded.contains_key(&spec.name) {
            return Err(OntapError::config(format!(
                "parameters are mutually exclusive: {}|{}",
                qualified(&spec.name),
                spec.aliases.join("|")
            )));
        }
        folded.insert(spec.name.clone(), value.clone());
    }
    if !unknown.is_empty() {
        unknown.sort();
        return Err(OntapError::config(format!(
            "Unsupported parameters for ({module}) module: {}.",
            unknown.join(", ")
        )));
    }

    let missing: Vec<String> = options
        .iter()
        .filter(|spec| spec.required && folded.get(&spec.name).is_none_or(Value::is_null))
        .map(|spec| qualified(&spec.name))
        .collect();
    if !missing.is_empty() {
        return Err(OntapError::config(format!(
            "missing required arguments: {}",
            missing.join(", ")
        )));
    }

    let mut validated = Map::new();
    for spec in options {
        let value = match folded.remove(&spec.name).filter(|v| !v.is_null()) {
            Some(value) => coerce(module, spec, value, &qualified(&spec.name))?,
            None => match &spec.default {
                Some(default) => default.clone(),
                None => continue,
            },
        };
        let value = check_choices(spec, value, &qualified(&spec.name))?;
        validated.insert(spec.name.clone(), value);
    }
    Ok(validated)
}

fn coerce(module: &str, spec: &OptionSpec, value: Value, name: &str) -> OntapResult<Value> {
    let coerced = match spec.arg_type {
        ArgType::Dict if !spec.suboptions.is_empty() => match &value {
            Value::Object(map) => Some(Value::Object(validate_level(
                module,
                &spec.suboptions,
                map,
                Some(name),
            )?)),
            _ => None,
        },
        ArgType::List => {
            let items: Vec<Value> = match value.clone() {
                Value::Array(items) => items,
                Value::String(s) => s
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| Value::String(s.to_string()))
                    .collect(),
                other => vec![other],
            };
            match spec.elements {
                Some(ArgType::Dict) if !spec.suboptions.is_empty() => {
                    let mut elements = Vec::with_capacity(items.len());
                    for item in items {
                        match item {
                            Value::Object(map) => elements.push(Value::Object(validate_level(
                                module,
                                &spec.suboptions,
                                &map,
                                Some(name),
                            )?)),
                            _ => return Err(conversion_error(name, &item, ArgType::Dict)),
                        }
                    }
                    Some(Value::Array(elements))
                }
                Some(element) => {
                    let mut elements = Vec::with_capacity(items.len());
                    for item in items {
                        let converted = coerce_scalar(element, &item)
                            .ok_or_else(|| conversion_error(name, &item, element))?;
                        elements.push(converted);
                    }
                    Some(Value::Array(elements))
                }
                None => Some(Value::Array(items)),
            }
        }
        arg_type => coerce_scalar(arg_type, &value),
    };
    coerced.ok_or_else(|| conversion_error(name, &value, spec.arg_type))
}

fn coerce_scalar(arg_type: ArgType, value: &Value) -> Option<Value> {
    match (arg_type, value) {
        (ArgType::Raw, v) => Some(v.clone()),
        (ArgType::Bool, v) => loose_bool::parse(v).map(Value::Bool),
        (ArgType::Int, Value::Number(n)) if n.is_i64() || n.is_u64() => Some(value.clone()),
        (ArgType::Int, Value::Number(n)) => n
            .as_f64()
            .filter(|f| f.fract() == 0.0)
            .map(|f| Value::from(f as i64)),
        (ArgType::Int, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),
        (ArgType::Str, Value::String(_)) => Some(value.clone()),
        (ArgType::Str, Value::Number(n)) => Some(Value::String(n.to_string())),
        (ArgType::Str, Value::Bool(b)) => Some(Value::String(b.to_string())),
        (ArgType::Dict, Value::Object(_)) => Some(value.clone()),
        (ArgType::List, Value::Array(_)) => Some(value.clone()),
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

fn conversion_error(name: &str, value: &Value, target: ArgType) -> OntapError {
    OntapError::config(format!(
        "argument '{name}' is of type {} and we were unable to convert to {}",
        type_name(value),
        target.as_str()
    ))
}

/// Enforces declared choices, returning the value spelled as the matching choice.
fn check_choices(spec: &OptionSpec, value: Value, name: &str) -> OntapResult<Value> {
    if spec.choices.is_empty() {
        return Ok(value);
    }
    let pick = |candidate: &Value| -> OntapResult<Value> {
        let text = match candidate {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let found = spec.choices.iter().find(|choice| {
            if spec.compare == CompareKind::CaseInsensitive {
                choice.eq_ignore_ascii_case(&text)
            } else {
                **choice == text
            }
        });
        match (found, candidate) {
            (Some(choice), Value::String(_)) => Ok(Value::String(choice.clone())),
            (Some(_), other) => Ok(other.clone()),
            (None, _) => Err(OntapError::config(format!(
                "value of {name} must be one of: {}, got: {text}",
                spec.choices.join(", ")
            ))),
        }
    };
    match value {
        Value::Array(items) => items
            .iter()
            .map(pick)
            .collect::<OntapResult<Vec<_>>>()
            .map(Value::Array),
        other => pick(&other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use serde_json::json;

    fn schema() -> ModuleSchema {
        ModuleSchema::new("snmp_traphosts")
            .option(OptionSpec::state())
            .option(OptionSpec::str("host").required().aliases(&["ip_address"]))
            .option(OptionSpec::int("timeout"))
            .option(OptionSpec::bool("enabled"))
            .option(OptionSpec::list("ports", ArgType::Int))
            .option(
                OptionSpec::str("mode")
                    .choices(&["rw", "ro"])
                    .compare(CompareKind::CaseInsensitive),
            )
            .option(OptionSpec::dict(
                "rate_limit",
                vec![OptionSpec::int("burst_size").required()],
            ))
            .option(OptionSpec::str("password").no_log())
            .with_host_options()
    }

    fn params(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_defaults_and_aliases() {
        let validated = validate_arguments(
            &schema(),
            &params(json!({"hostname": "10.0.0.1", "ip_address": "example.com", "timeout": null})),
        )
        .unwrap();
        assert_eq!(validated["host"], json!("example.com"));
        assert_eq!(validated["state"], json!("present"));
        assert_eq!(validated["use_https"], json!(true));
        assert_eq!(validated["use_rest"], json!("auto"));
        assert!(!validated.contains_key("timeout"));
        assert!(!validated.contains_key("ip_address"));
    }

    #[test]
    fn test_coercion() {
        let validated = validate_arguments(
            &schema(),
            &params(json!({
                "hostname": "h",
                "host": 42,
                "timeout": "30",
                "enabled": "yes",
                "ports": "1, 2,3",
                "https": "no",
                "rate_limit": {"burst_size": "5"}
            })),
        )
        .unwrap();
        assert_eq!(validated["host"], json!("42"));
        assert_eq!(validated["timeout"], json!(30));
        assert_eq!(validated["enabled"], json!(true));
        assert_eq!(validated["ports"], json!([1, 2, 3]));
        assert_eq!(validated["use_https"], json!(false));
        assert_eq!(validated["rate_limit"], json!({"burst_size": 5}));
    }

    #[test]
    fn test_list_shapes() {
        let mut paths = OptionSpec::list("paths", ArgType::Dict);
        paths.suboptions = vec![OptionSpec::str("path").required()];
        let schema = ModuleSchema::new("lists")
            .option(OptionSpec::new("tags", ArgType::List))
            .option(OptionSpec::list("ports", ArgType::Int))
            .option(paths);
        let validated = validate_arguments(
            &schema,
            &params(json!({
                "tags": "a,b",
                "ports": 8080,
                "paths": [{"path": "/vol1"}]
            })),
        )
        .unwrap();
        assert_eq!(validated["tags"], json!(["a", "b"]));
        assert_eq!(validated["ports"], json!([8080]));
        assert_eq!(validated["paths"], json!([{"path": "/vol1"}]));

        let err = validate_arguments(&schema, &params(json!({"paths": ["/vol1"]}))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_unknown_parameters_rejected() {
        let err = validate_arguments(
            &schema(),
            &params(json!({"hostname": "h", "host": "x", "zeta": 1, "alpha": 2})),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(
            err.to_string(),
            "Unsupported parameters for (snmp_traphosts) module: alpha, zeta."
        );
    }

    #[test]
    fn test_missing_required() {
        let err = validate_arguments(&schema(), &params(json!({"host": "x"}))).unwrap_err();
        assert_eq!(err.to_string(), "missing required arguments: hostname");

        let err = validate_arguments(
            &schema(),
            &params(json!({"hostname": "h", "host": "x", "rate_limit": {}})),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "missing required arguments: rate_limit.burst_size");
    }

    #[test]
    fn test_alias_conflict() {
        let err = validate_arguments(
            &schema(),
            &params(json!({"hostname": "h", "host": "x", "ip_address": "y"})),
        )
        .unwrap_err();
        assert!(err.to_string().starts_with("parameters are mutually exclusive: host|ip_address"));
    }

    #[test]
    fn test_choices() {
        let err = validate_arguments(
            &schema(),
            &params(json!({"hostname": "h", "host": "x", "state": "foo"})),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "value of state must be one of: present, absent, got: foo");

        let validated = validate_arguments(
            &schema(),
            &params(json!({"hostname": "h", "host": "x", "mode": "RW", "use_rest": "Always"})),
        )
        .unwrap();
        assert_eq!(validated["mode"], json!("rw"));
        assert_eq!(validated["use_rest"], json!("always"));
    }

    #[test]
    fn test_conversion_failure() {
        let err = validate_arguments(
            &schema(),
            &params(json!({"hostname": "h", "host": "x", "timeout": "soon"})),
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "argument 'timeout' is of type str and we were unable to convert to int"
        );
    }

    #[test]
    fn test_redacted_masks_no_log_values() {
        let schema = schema();
        let masked = redacted(&schema, &params(json!({"password": "secret", "host": "x"})));
        assert_eq!(masked["password"], json!(REDACTED));
        assert_eq!(masked["host"], json!("x"));
    }
}
