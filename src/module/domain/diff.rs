//! Desired versus current comparison.

use crate::module::domain::{
    normalize::normalize,
    schema::{CompareKind, ModuleSchema, OptionSpec},
};
use serde_json::{Map, Value};

/// Returns the desired values that differ from the current record.
///
/// Options that are unset, not diffable, or unknown to the current record
/// are skipped. The result is empty when no modification is needed.
pub fn get_modified_attributes(
    current: &Map<String, Value>,
    desired: &Map<String, Value>,
    schema: &ModuleSchema,
) -> Map<String, Value> {
    desired
        .iter()
        .filter(|(_, value)| !value.is_null())
        .filter_map(|(key, value)| {
            let spec = schema.find(key)?;
            if !spec.diffable || key == "state" {
                return None;
            }
            let existing = current.get(key)?;
            (!values_match(spec, existing, value)).then(|| (key.clone(), value.clone()))
        })
        .collect()
}

fn values_match(spec: &OptionSpec, current: &Value, desired: &Value) -> bool {
    match (spec.compare, current, desired) {
        (CompareKind::Nested, Value::Object(current), Value::Object(desired)) => {
            desired.iter().filter(|(_, v)| !v.is_null()).all(|(key, value)| {
                match (current.get(key), spec.suboption(key)) {
                    (None, _) => true,
                    (Some(existing), Some(sub)) => values_match(sub, existing, value),
                    (Some(existing), None) => loose_eq(existing, value),
                }
            })
        }
        (kind, Value::Array(current), Value::Array(desired)) => {
            let element = element_kind(spec);
            let current: Vec<Value> = current.iter().map(|v| normalize(element, v)).collect();
            let desired: Vec<Value> = desired.iter().map(|v| normalize(element, v)).collect();
            if kind == CompareKind::OrderedList {
                current.len() == desired.len()
                    && current.iter().zip(&desired).all(|(a, b)| loose_eq(a, b))
            } else {
                same_multiset(&current, &desired)
            }
        }
        (kind, current, desired) => loose_eq(&normalize(kind, current), &normalize(kind, desired)),
    }
}

fn element_kind(spec: &OptionSpec) -> CompareKind {
    match spec.compare {
        CompareKind::UnorderedList | CompareKind::OrderedList | CompareKind::Nested => {
            CompareKind::Plain
        }
        other => other,
    }
}

fn same_multiset(current: &[Value], desired: &[Value]) -> bool {
    if current.len() != desired.len() {
        return false;
    }
    let mut unmatched: Vec<&Value> = current.iter().collect();
    desired.iter().all(|wanted| {
        match unmatched.iter().position(|have| loose_eq(have, wanted)) {
            Some(index) => {
                unmatched.swap_remove(index);
                true
            }
            None => false,
        }
    })
}

/// Scalar equality tolerant of ZAPI's all-string values: `"30" == 30`,
/// `"true" == true`.
fn loose_eq(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (a, b) {
        (Value::String(s), other @ (Value::Number(_) | Value::Bool(_)))
        | (other @ (Value::Number(_) | Value::Bool(_)), Value::String(s)) => {
            *s == other.to_string()
        }
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => false,
    }
}
