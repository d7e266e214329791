//! REST calls and their raw results.

use crate::core::domain::error::ValidationError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// HTTP verbs used against the ONTAP REST API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Patch,
    Delete,
    Options,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
            Verb::Options => "OPTIONS",
        }
    }

    /// True for verbs that change cluster state.
    pub fn is_mutating(&self) -> bool {
        matches!(self, Verb::Post | Verb::Patch | Verb::Delete)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Verb::Get),
            "POST" => Ok(Verb::Post),
            "PATCH" => Ok(Verb::Patch),
            "DELETE" => Ok(Verb::Delete),
            "OPTIONS" => Ok(Verb::Options),
            other => Err(ValidationError::Format(format!("Unsupported verb: {other}"))),
        }
    }
}

impl From<Verb> for reqwest::Method {
    fn from(verb: Verb) -> Self {
        match verb {
            Verb::Get => reqwest::Method::GET,
            Verb::Post => reqwest::Method::POST,
            Verb::Patch => reqwest::Method::PATCH,
            Verb::Delete => reqwest::Method::DELETE,
            Verb::Options => reqwest::Method::OPTIONS,
        }
    }
}

/// One REST request, relative to `/api/`.
#[derive(Debug, Clone, PartialEq)]
pub struct RestCall {
    pub verb: Verb,
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub body: Option<Value>,
    pub timeout: Duration,
    /// Set for POST/PATCH/DELETE carrying `return_timeout`.
    pub is_async: bool,
}

impl RestCall {
    pub fn new(verb: Verb, path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            verb,
            path: path.into().trim_start_matches('/').to_string(),
            query: BTreeMap::new(),
            body: None,
            timeout,
            is_async: false,
        }
    }

    pub fn with_query(mut self, query: BTreeMap<String, String>) -> Self {
        self.query.extend(query);
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Adds `return_timeout` and marks the call as possibly asynchronous.
    pub fn with_return_timeout(mut self, seconds: u64) -> Self {
        if seconds > 0 {
            self.query
                .insert("return_timeout".to_string(), seconds.to_string());
        }
        self.is_async = true;
        self
    }
}

/// A decoded REST answer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RestResult {
    pub http_status: u16,
    pub body: Option<Value>,
    pub headers: BTreeMap<String, String>,
}

impl RestResult {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.http_status)
    }

    /// Value of a response header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbs() {
        assert_eq!("patch".parse::<Verb>().unwrap(), Verb::Patch);
        assert!("PUT".parse::<Verb>().is_err());
        assert!(Verb::Delete.is_mutating());
        assert!(!Verb::Options.is_mutating());
        assert_eq!(Verb::Get.to_string(), "GET");
    }

    #[test]
    fn test_return_timeout() {
        let call = RestCall::new(Verb::Delete, "/storage/volumes/abc", Duration::from_secs(30))
            .with_return_timeout(15);
        assert_eq!(call.path, "storage/volumes/abc");
        assert_eq!(call.query.get("return_timeout").map(String::as_str), Some("15"));
        assert!(call.is_async);

        let no_wait = RestCall::new(Verb::Post, "svm/svms", Duration::from_secs(30))
            .with_return_timeout(0);
        assert!(!no_wait.query.contains_key("return_timeout"));
    }

    #[test]
    fn test_header_lookup() {
        let mut result = RestResult {
            http_status: 200,
            ..Default::default()
        };
        result.headers.insert("allow".into(), "GET, PATCH".into());
        assert_eq!(result.header("Allow"), Some("GET, PATCH"));
        assert!(result.is_success());
    }
}
