//! Value normalization applied before comparing current and desired state.

use crate::core::domain::error::ValidationError;
use crate::module::domain::schema::CompareKind;
use serde_json::Value;
use std::net::IpAddr;

const KIB: u64 = 1024;
const SIZE_UNITS: &[(&str, u64)] = &[
    ("tb", KIB * KIB * KIB * KIB),
    ("gb", KIB * KIB * KIB),
    ("mb", KIB * KIB),
    ("kb", KIB),
    ("b", 1),
];

/// Parses `512`, `2mb`, `1GB`, ... into bytes (powers of 1024).
pub fn parse_size(input: &str) -> Result<u64, ValidationError> {
    let text = input.trim().to_ascii_lowercase();
    let split = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    let (digits, unit) = text.split_at(split);
    if digits.is_empty() {
        return Err(ValidationError::Format(format!(
            "Invalid size '{input}': expected a number with an optional b|kb|mb|gb|tb suffix"
        )));
    }
    let number: u64 = digits
        .parse()
        .map_err(|_| ValidationError::Format(format!("Invalid size '{input}': number too large")))?;
    let factor = match unit.trim() {
        "" => 1,
        unit => SIZE_UNITS
            .iter()
            .find(|(suffix, _)| *suffix == unit)
            .map(|(_, factor)| *factor)
            .ok_or_else(|| {
                ValidationError::Format(format!("Invalid size '{input}': unknown unit '{unit}'"))
            })?,
    };
    number
        .checked_mul(factor)
        .ok_or_else(|| ValidationError::Format(format!("Invalid size '{input}': too large")))
}

/// Renders bytes in the largest unit that divides them exactly.
pub fn format_size(bytes: u64) -> String {
    SIZE_UNITS
        .iter()
        .find(|(_, factor)| bytes >= *factor && bytes % factor == 0)
        .map(|(suffix, factor)| format!("{}{}", bytes / factor, suffix))
        .unwrap_or_else(|| format!("{bytes}b"))
}

/// Canonical form of an IPv4/IPv6 address, with an optional `/prefix`.
///
/// IPv6 is rendered lowercase with the longest zero run compressed.
pub fn canonical_ip(input: &str) -> Result<String, ValidationError> {
    let text = input.trim();
    let (address, prefix) = match text.split_once('/') {
        Some((address, prefix)) => (address, Some(prefix)),
        None => (text, None),
    };
    let address: IpAddr = address
        .parse()
        .map_err(|_| ValidationError::Format(format!("Invalid IP address '{input}'")))?;
    match prefix {
        None => Ok(address.to_string()),
        Some(prefix) => {
            let max = if address.is_ipv4() { 32 } else { 128 };
            let length: u8 = prefix
                .parse()
                .ok()
                .filter(|length| *length <= max)
                .ok_or_else(|| ValidationError::Format(format!("Invalid prefix length in '{input}'")))?;
            Ok(format!("{address}/{length}"))
        }
    }
}

/// Parses an ISO-8601 duration (`P1DT2H`, `PT30M`, `P2W`) or plain seconds.
///
/// Years and months have no fixed length and are rejected.
pub fn parse_duration(input: &str) -> Result<u64, ValidationError> {
    let text = input.trim().to_ascii_uppercase();
    if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
        return text
            .parse()
            .map_err(|_| ValidationError::Format(format!("Invalid duration '{input}'")));
    }
    let invalid = || ValidationError::Format(format!("Invalid ISO-8601 duration '{input}'"));
    let body = text.strip_prefix('P').ok_or_else(invalid)?;
    let (date, time) = match body.split_once('T') {
        Some((date, time)) if !time.is_empty() => (date, Some(time)),
        Some(_) => return Err(invalid()),
        None => (body, None),
    };

    let mut total: u64 = 0;
    let mut components = 0;
    let mut accumulate = |part: &str, in_time: bool| -> Result<(), ValidationError> {
        let mut number = String::new();
        for c in part.chars() {
            if c.is_ascii_digit() {
                number.push(c);
                continue;
            }
            let value: u64 = number.parse().map_err(|_| invalid())?;
            number.clear();
            let seconds = match (c, in_time) {
                ('W', false) => 7 * 86_400,
                ('D', false) => 86_400,
                ('H', true) => 3_600,
                ('M', true) => 60,
                ('S', true) => 1,
                ('Y', false) | ('M', false) => {
                    return Err(ValidationError::Format(format!(
                        "Unsupported duration '{input}': years and months are not supported"
                    )));
                }
                _ => return Err(invalid()),
            };
            total = value
                .checked_mul(seconds)
                .and_then(|v| total.checked_add(v))
                .ok_or_else(invalid)?;
            components += 1;
        }
        if number.is_empty() { Ok(()) } else { Err(invalid()) }
    };
    accumulate(date, false)?;
    if let Some(time) = time {
        accumulate(time, true)?;
    }
    if components == 0 {
        return Err(invalid());
    }
    Ok(total)
}

/// Renders seconds as an ISO-8601 duration using days, hours, minutes and seconds.
pub fn format_duration(seconds: u64) -> String {
    if seconds == 0 {
        return "PT0S".to_string();
    }
    let days = seconds / 86_400;
    let hours = seconds % 86_400 / 3_600;
    let minutes = seconds % 3_600 / 60;
    let secs = seconds % 60;

    let mut out = String::from("P");
    if days > 0 {
        out.push_str(&format!("{days}D"));
    }
    if hours + minutes + secs > 0 {
        out.push('T');
        if hours > 0 {
            out.push_str(&format!("{hours}H"));
        }
        if minutes > 0 {
            out.push_str(&format!("{minutes}M"));
        }
        if secs > 0 {
            out.push_str(&format!("{secs}S"));
        }
    }
    out
}

/// Normalizes a value for comparison. Values that cannot be interpreted in
/// the requested domain are returned unchanged and compared as given.
pub fn normalize(kind: CompareKind, value: &Value) -> Value {
    if let Value::Array(items) = value {
        return Value::Array(items.iter().map(|item| normalize(kind, item)).collect());
    }
    match (kind, value) {
        (CompareKind::CaseInsensitive, Value::String(s)) => Value::String(s.to_lowercase()),
        (CompareKind::Size, Value::String(s)) => parse_size(s)
            .map(Value::from)
            .unwrap_or_else(|_| value.clone()),
        (CompareKind::IpAddress, Value::String(s)) => canonical_ip(s)
            .map(Value::String)
            .unwrap_or_else(|_| value.clone()),
        (CompareKind::Duration, Value::String(s)) => parse_duration(s)
            .map(Value::from)
            .unwrap_or_else(|_| value.clone()),
        _ => value.clone(),
    }
}
