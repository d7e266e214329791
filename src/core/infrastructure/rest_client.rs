//! JSON verbs against `/api/`, with the records and job contracts applied.

use crate::core::{
    domain::{
        error::{OntapError, OntapResult, TransportError, TransportErrorClass},
        model::{
            host_options::MAX_REQUEST_TIMEOUT,
            job::JobHandle,
            ontap_connection::OntapConnection,
            rest_call::{RestCall, RestResult, Verb},
        },
    },
    infrastructure::{
        job_reconciler::{JobReconciler, JobSource},
        transport::{HttpRequest, Transport},
    },
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Query parameters of a REST call.
pub type Query = BTreeMap<String, String>;

/// Identifies the calling application on every REST request.
pub const CLIENT_APP_HEADER: &str = "X-Dot-Client-App";
pub const CLIENT_APP: &str = concat!("leeca_ontap/", env!("CARGO_PKG_VERSION"));
/// Key under which a successful job record is attached to a response.
pub const JOB_RESPONSE_KEY: &str = "job_response";
/// Deletes wait at most this long synchronously; the rest is job polling.
/// Large values make some ONTAP builds answer "uuid not found" for deletes.
pub const DELETE_RETURN_TIMEOUT: u64 = 15;

/// Timeouts for calls that may answer with a job.
#[derive(Debug, Clone, PartialEq)]
pub struct AsyncOptions {
    /// Seconds the server may hold the call before answering with a job.
    pub timeout: u64,
    /// Seconds to keep polling a returned job.
    pub job_timeout: u64,
    pub query: Query,
}

impl Default for AsyncOptions {
    fn default() -> Self {
        Self {
            timeout: 30,
            job_timeout: 30,
            query: Query::new(),
        }
    }
}

impl AsyncOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = seconds;
        self
    }

    pub fn with_job_timeout(mut self, seconds: u64) -> Self {
        self.job_timeout = seconds;
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }
}

/// The REST half of the client.
pub struct RestClient {
    transport: Arc<dyn Transport>,
    connection: OntapConnection,
    trace_apis: bool,
    jobs: JobReconciler,
}

impl RestClient {
    pub fn new(transport: Arc<dyn Transport>, connection: OntapConnection, trace_apis: bool) -> Self {
        Self {
            transport,
            connection,
            trace_apis,
            jobs: JobReconciler::new(),
        }
    }

    /// Executes one call.
    ///
    /// # Errors
    /// - `api` kind for an ONTAP error envelope, whatever the status
    /// - `http` kind for any other non-2xx answer
    /// - `transport` kind for transport faults and undecodable 2xx bodies
    pub async fn send(&self, call: &RestCall) -> OntapResult<RestResult> {
        let mut request = HttpRequest::new(call.verb, self.connection.rest_url(&call.path)?, call.timeout);
        request.query = call.query.clone();
        request
            .headers
            .insert("accept".into(), "application/json".into());
        request
            .headers
            .insert(CLIENT_APP_HEADER.to_ascii_lowercase(), CLIENT_APP.into());
        if let Some(body) = &call.body {
            request
                .headers
                .insert("content-type".into(), "application/json".into());
            request.body = Some(body.to_string().into_bytes());
        }

        debug!(verb = %call.verb, path = %call.path, query = ?call.query, "REST call");
        if let Some(body) = &call.body {
            if self.trace_apis {
                debug!(body = %body, "REST request body");
            } else {
                trace!(body = %body, "REST request body");
            }
        }

        let response = self.transport.request(request).await?;
        let text = response.body_text();
        if self.trace_apis {
            debug!(status = response.status, body = %text, "REST response");
        } else {
            trace!(status = response.status, body = %text, "REST response");
        }

        let parsed: Option<Value> = if text.trim().is_empty() {
            None
        } else {
            match serde_json::from_str(&text) {
                Ok(value) => Some(value),
                Err(_) if !response.is_success() => {
                    return Err(OntapError::Http {
                        status: response.status,
                        body: text,
                    });
                }
                Err(e) => {
                    return Err(TransportError::new(
                        TransportErrorClass::Decode,
                        format!("invalid JSON in response: {e}"),
                    )
                    .into());
                }
            }
        };

        if let Some(error) = parsed.as_ref().and_then(api_error) {
            return Err(error);
        }
        if !response.is_success() {
            return Err(OntapError::Http {
                status: response.status,
                body: text,
            });
        }
        Ok(RestResult {
            http_status: response.status,
            body: parsed,
            headers: response.headers,
        })
    }

    /// GET returning the raw body (`Null` when empty).
    pub async fn get(&self, path: &str, query: &Query) -> OntapResult<Value> {
        let call = RestCall::new(Verb::Get, path, self.connection.request_timeout())
            .with_query(query.clone());
        let result = self.send(&call).await.map_err(|e| e.context(path))?;
        Ok(result.body.unwrap_or(Value::Null))
    }

    /// GET expecting zero or one record.
    ///
    /// # Errors
    /// An `unexpected_shape` error when more than one record matches.
    pub async fn get_one(&self, path: &str, query: &Query, fields: &[&str]) -> OntapResult<Option<Value>> {
        let query = with_fields(query, fields);
        let body = self.get(path, &query).await?;
        zero_or_one_record(body, &query).map_err(|e| e.context(path))
    }

    /// GET returning every record, following `_links.next` across pages.
    pub async fn get_many(&self, path: &str, query: &Query, fields: &[&str]) -> OntapResult<Vec<Value>> {
        let mut records = Vec::new();
        let mut next = Some((path.to_string(), with_fields(query, fields)));
        while let Some((page_path, page_query)) = next.take() {
            let body = self.get(&page_path, &page_query).await?;
            records.extend(zero_or_more_records(&body).map_err(|e| e.context(path))?);
            if let Some(href) = body.pointer("/_links/next/href").and_then(Value::as_str) {
                next = Some(self.split_href(href).map_err(|e| e.context(path))?);
            }
        }
        Ok(records)
    }

    /// POST with `return_timeout`; a returned job is waited on.
    ///
    /// On job success the final job record is attached under `job_response`.
    pub async fn post_async(&self, path: &str, body: &Value, opts: &AsyncOptions) -> OntapResult<Value> {
        let return_timeout = opts.timeout.min(opts.job_timeout);
        let call = RestCall::new(Verb::Post, path, self.call_timeout(return_timeout))
            .with_query(opts.query.clone())
            .with_return_timeout(return_timeout)
            .with_body(body.clone());
        self.send_async(path, &call, opts.job_timeout).await
    }

    /// PATCH `path[/key]` with `return_timeout`; a returned job is waited on.
    pub async fn patch_async(
        &self,
        path: &str,
        key: Option<&str>,
        body: &Value,
        opts: &AsyncOptions,
    ) -> OntapResult<Value> {
        let path = join_key(path, key);
        let return_timeout = opts.timeout.min(opts.job_timeout);
        let call = RestCall::new(Verb::Patch, &path, self.call_timeout(return_timeout))
            .with_query(opts.query.clone())
            .with_return_timeout(return_timeout)
            .with_body(body.clone());
        self.send_async(&path, &call, opts.job_timeout).await
    }

    /// DELETE `path/key` with a short `return_timeout`, then follows the job.
    pub async fn delete_async(&self, path: &str, key: &str, opts: &AsyncOptions) -> OntapResult<Value> {
        let path = join_key(path, Some(key));
        let return_timeout = opts
            .timeout
            .min(opts.job_timeout)
            .min(DELETE_RETURN_TIMEOUT);
        let call = RestCall::new(Verb::Delete, &path, self.call_timeout(return_timeout))
            .with_query(opts.query.clone())
            .with_return_timeout(return_timeout);
        self.send_async(&path, &call, opts.job_timeout).await
    }

    /// OPTIONS, returning the verbs listed in `Allow`.
    pub async fn options(&self, path: &str) -> OntapResult<BTreeSet<String>> {
        let call = RestCall::new(Verb::Options, path, self.connection.request_timeout());
        let result = self.send(&call).await.map_err(|e| e.context(path))?;
        Ok(result
            .header("allow")
            .map(|allow| {
                allow
                    .split(',')
                    .map(|verb| verb.trim().to_ascii_uppercase())
                    .filter(|verb| !verb.is_empty())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn send_async(&self, path: &str, call: &RestCall, job_timeout: u64) -> OntapResult<Value> {
        let result = self.send(call).await.map_err(|e| e.context(path))?;
        self.follow_job(result.body, job_timeout)
            .await
            .map_err(|e| e.context(path))
    }

    /// Waits on the job a response refers to, if any.
    async fn follow_job(&self, body: Option<Value>, job_timeout: u64) -> OntapResult<Value> {
        let Some(mut response) = body else {
            return Ok(Value::Null);
        };
        let job = if let Some(job) = response.get("job") {
            Some(job.clone())
        } else if let Some(jobs) = response.get("jobs").and_then(Value::as_array) {
            let count = response
                .get("num_records")
                .and_then(Value::as_u64)
                .unwrap_or(jobs.len() as u64);
            if count > 1 {
                return Err(OntapError::UnexpectedShape(
                    "multiple jobs in progress, can't check status".to_string(),
                ));
            }
            jobs.first().cloned()
        } else {
            None
        };

        if let Some(job) = job {
            let handle = JobHandle::from_value(&job)?;
            let payload = self
                .jobs
                .wait(self, &handle, Duration::from_secs(job_timeout))
                .await?;
            if let Some(map) = response.as_object_mut() {
                map.insert(JOB_RESPONSE_KEY.to_string(), payload);
            }
        }
        Ok(response)
    }

    /// Transport timeout for a call the server may hold for `return_timeout` seconds.
    fn call_timeout(&self, return_timeout: u64) -> Duration {
        self.connection
            .request_timeout()
            .max(Duration::from_secs(return_timeout + 10))
            .min(MAX_REQUEST_TIMEOUT)
    }

    /// Splits a `/api/...?...` link into a relative path and query.
    fn split_href(&self, href: &str) -> OntapResult<(String, Query)> {
        let url = self.connection.base_url().join(href).map_err(|e| {
            OntapError::UnexpectedShape(format!("invalid next link '{href}': {e}"))
        })?;
        let path = url
            .path()
            .strip_prefix("/api/")
            .ok_or_else(|| OntapError::UnexpectedShape(format!("invalid next link '{href}'")))?
            .to_string();
        let query = url.query_pairs().into_owned().collect();
        Ok((path, query))
    }
}

#[async_trait]
impl JobSource for RestClient {
    async fn fetch_job(&self, poll_url: &str) -> OntapResult<Value> {
        self.get(poll_url, &Query::new()).await
    }
}

fn join_key(path: &str, key: Option<&str>) -> String {
    match key {
        Some(key) => format!("{}/{}", path.trim_end_matches('/'), key),
        None => path.to_string(),
    }
}

fn with_fields(query: &Query, fields: &[&str]) -> Query {
    let mut query = query.clone();
    if !fields.is_empty() {
        query.insert("fields".to_string(), fields.join(","));
    }
    query
}

/// Extracts `{"error": {"code", "message", "target"}}`.
fn api_error(body: &Value) -> Option<OntapError> {
    let error = body.get("error")?;
    let code = match error.get("code") {
        Some(Value::String(code)) => code.clone(),
        Some(Value::Number(code)) => code.to_string(),
        _ => String::new(),
    };
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string());
    let target = error
        .get("target")
        .and_then(Value::as_str)
        .map(str::to_string);
    Some(OntapError::Api {
        code,
        message,
        target,
    })
}

fn num_records(body: &Value) -> u64 {
    match body.get("records").and_then(Value::as_array) {
        Some(records) => body
            .get("num_records")
            .and_then(Value::as_u64)
            .unwrap_or(records.len() as u64),
        None => body
            .get("num_records")
            .and_then(Value::as_u64)
            .unwrap_or(1),
    }
}

fn render_query(query: &Query) -> String {
    query
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Applies the "zero or one record" contract.
pub fn zero_or_one_record(body: Value, query: &Query) -> OntapResult<Option<Value>> {
    if body.is_null() {
        return Err(OntapError::UnexpectedShape("no response".to_string()));
    }
    match num_records(&body) {
        0 => Ok(None),
        1 => match body.get("records").and_then(Value::as_array) {
            Some(records) => records.first().cloned().map(Some).ok_or_else(|| {
                OntapError::UnexpectedShape(format!("unexpected response {body}"))
            }),
            None => Ok(Some(body)),
        },
        _ => {
            let mut message = format!("unexpected response {body}");
            if !query.is_empty() {
                message.push_str(&format!(" for query: {}", render_query(query)));
            }
            Err(OntapError::UnexpectedShape(message))
        }
    }
}

/// Applies the "zero or more records" contract.
pub fn zero_or_more_records(body: &Value) -> OntapResult<Vec<Value>> {
    if body.is_null() {
        return Ok(Vec::new());
    }
    match body.get("records") {
        Some(Value::Array(records)) => Ok(records.clone()),
        Some(other) => Err(OntapError::UnexpectedShape(format!(
            "unexpected records {other}"
        ))),
        None if num_records(body) == 0 => Ok(Vec::new()),
        None => Err(OntapError::UnexpectedShape(format!(
            "unexpected response {body}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use serde_json::json;

    fn query(pairs: &[(&str, &str)]) -> Query {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_zero_or_one_record() {
        let q = Query::new();
        assert_eq!(
            zero_or_one_record(json!({"records": [], "num_records": 0}), &q).unwrap(),
            None
        );
        assert_eq!(
            zero_or_one_record(json!({"records": [{"name": "a"}], "num_records": 1}), &q).unwrap(),
            Some(json!({"name": "a"}))
        );
        // A GET by key answers with the record itself.
        assert_eq!(
            zero_or_one_record(json!({"timeout": 30}), &q).unwrap(),
            Some(json!({"timeout": 30}))
        );
        assert_eq!(zero_or_one_record(json!({"num_records": 0}), &q).unwrap(), None);
    }

    #[test]
    fn test_more_than_one_record_is_unexpected() {
        let err = zero_or_one_record(
            json!({"records": [{"name": "x"}, {"name": "x"}], "num_records": 2}),
            &query(&[("name", "x")]),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedShape);
        let message = err.to_string();
        assert!(message.contains("unexpected response"));
        assert!(message.ends_with("for query: name=x"));
    }

    #[test]
    fn test_zero_or_more_records() {
        assert!(zero_or_more_records(&json!({"num_records": 0})).unwrap().is_empty());
        assert_eq!(
            zero_or_more_records(&json!({"records": [{"a": 1}, {"a": 2}], "num_records": 2}))
                .unwrap()
                .len(),
            2
        );
        assert!(zero_or_more_records(&json!({"records": "bad"})).is_err());
    }

    #[test]
    fn test_api_error_extraction() {
        let err = api_error(&json!({"error": {"code": 917927, "message": "not found", "target": "uuid"}}))
            .unwrap();
        assert!(matches!(err, OntapError::Api { ref code, .. } if code == "917927"));
        assert!(api_error(&json!({"records": []})).is_none());
    }

    #[test]
    fn test_join_key_and_fields() {
        assert_eq!(join_key("storage/volumes", Some("abc")), "storage/volumes/abc");
        assert_eq!(join_key("private/cli/system/timeout", None), "private/cli/system/timeout");
        let q = with_fields(&Query::new(), &["name", "uuid"]);
        assert_eq!(q.get("fields").map(String::as_str), Some("name,uuid"));
    }

    #[test]
    fn test_async_options_defaults() {
        let opts = AsyncOptions::new().with_job_timeout(120).with_query("force", "true");
        assert_eq!(opts.timeout, 30);
        assert_eq!(opts.job_timeout, 120);
        assert_eq!(opts.query.get("force").map(String::as_str), Some("true"));
    }

    mod classification {
        use super::*;
        use crate::HostOptions;
        use crate::core::infrastructure::transport::{HttpResponse, MockTransport};

        fn client_answering(
            answer: impl Fn() -> Result<HttpResponse, TransportError> + Send + 'static,
        ) -> RestClient {
            let mut transport = MockTransport::new();
            transport
                .expect_request()
                .times(1)
                .returning(move |_| answer());
            let mut options = HostOptions::new("cluster1.example.com");
            options.username = Some("admin".into());
            options.password = Some("netapp1!".into());
            RestClient::new(Arc::new(transport), options.connection().unwrap(), false)
        }

        fn response(status: u16, body: &str) -> Result<HttpResponse, TransportError> {
            Ok(HttpResponse {
                status,
                headers: BTreeMap::new(),
                body: body.as_bytes().to_vec(),
            })
        }

        #[tokio::test]
        async fn test_server_error_without_envelope_is_http() {
            let client = client_answering(|| response(503, "busy"));
            let err = client.get("cluster", &Query::new()).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Http);
            assert!(err.is_transient());
        }

        #[tokio::test]
        async fn test_error_envelope_wins_over_status() {
            let client = client_answering(|| {
                response(409, r#"{"error": {"code": "2", "message": "duplicate entry"}}"#)
            });
            let err = client.get("support/snmp/traphosts", &Query::new()).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Api);
            assert!(!err.is_transient());
        }

        #[tokio::test]
        async fn test_invalid_json_on_success_is_decode_fault() {
            let client = client_answering(|| response(200, "{not json"));
            let err = client.get("cluster", &Query::new()).await.unwrap_err();
            assert!(matches!(
                err.root(),
                OntapError::Transport(TransportError { class: TransportErrorClass::Decode, .. })
            ));
        }

        #[tokio::test]
        async fn test_transport_fault_passes_through() {
            let client = client_answering(|| {
                Err(TransportError::new(TransportErrorClass::Tls, "bad certificate"))
            });
            let err = client.get("cluster", &Query::new()).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Transport);
            assert_eq!(err.to_string(), "calling: cluster: got tls error: bad certificate.");
        }
    }
}
