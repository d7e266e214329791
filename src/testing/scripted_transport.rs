use super::{
    recorder::{RecordedRequest, RequestRecorder},
    registry::{CannedResponse, ResponseRegistry},
};
use crate::core::domain::{
    error::{TransportError, TransportErrorClass},
    model::{ontap_connection::ZAPI_SERVLET, rest_call::Verb},
};
use crate::core::infrastructure::{
    transport::{HttpRequest, HttpResponse, Transport},
    zapi_codec::{decode_request, encode_document, response_envelope},
};
use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug)]
struct Expectation {
    request: RecordedRequest,
    response_name: String,
    response: CannedResponse,
}

/// A [`Transport`] that answers an ordered script.
///
/// Every request must match the next expectation, otherwise the transport
/// panics, failing the test at the offending call.
///
/// ```
/// use leeca_ontap::Verb;
/// use leeca_ontap::testing::{ResponseRegistry, ScriptedTransport};
///
/// let transport = ScriptedTransport::new(ResponseRegistry::new());
/// transport
///     .expect_rest(Verb::Get, "cluster", "is_rest_9_10_1")
///     .expect_zapi("snmp-status", "zapi_success");
/// ```
#[derive(Debug)]
pub struct ScriptedTransport {
    registry: ResponseRegistry,
    recorder: RequestRecorder,
    script: Mutex<VecDeque<Expectation>>,
}

impl ScriptedTransport {
    pub fn new(registry: ResponseRegistry) -> Self {
        Self {
            registry,
            recorder: RequestRecorder::new(),
            script: Mutex::new(VecDeque::new()),
        }
    }

    fn script(&self) -> MutexGuard<'_, VecDeque<Expectation>> {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn expect(&self, request: RecordedRequest, response_name: &str) -> &Self {
        let response = self
            .registry
            .get(response_name)
            .cloned()
            .unwrap_or_else(|| panic!("no response registered under '{response_name}'"));
        self.script().push_back(Expectation {
            request,
            response_name: response_name.to_string(),
            response,
        });
        self
    }

    /// Expects a REST call to `path` (relative to `/api/`, without query).
    ///
    /// # Panics
    /// If `response_name` is not registered.
    pub fn expect_rest(&self, verb: Verb, path: &str, response_name: &str) -> &Self {
        self.expect(RecordedRequest::rest(verb, path), response_name)
    }

    /// Expects a ZAPI call to `tag`.
    ///
    /// # Panics
    /// If `response_name` is not registered.
    pub fn expect_zapi(&self, tag: &str, response_name: &str) -> &Self {
        self.expect(RecordedRequest::zapi(tag), response_name)
    }

    pub fn recorder(&self) -> &RequestRecorder {
        &self.recorder
    }

    /// # Panics
    /// If any expectation was not consumed.
    pub fn assert_all_consumed(&self) {
        let script = self.script();
        if !script.is_empty() {
            let pending: Vec<String> = script
                .iter()
                .map(|e| format!("{} -> {}", e.request, e.response_name))
                .collect();
            panic!("unconsumed expectations: {}", pending.join(", "));
        }
    }

    fn identify(request: &HttpRequest) -> Result<RecordedRequest, TransportError> {
        if request.url.path().ends_with(ZAPI_SERVLET) {
            let body = request.body.as_deref().unwrap_or_default();
            let (api, _) = decode_request(body)
                .map_err(|e| TransportError::new(TransportErrorClass::Decode, e.to_string()))?;
            return Ok(RecordedRequest::zapi(api.name()));
        }
        let path = request.rest_path().unwrap_or(request.url.path());
        Ok(RecordedRequest::rest(request.method, path))
    }

    fn render(response: CannedResponse) -> Result<HttpResponse, TransportError> {
        match response {
            CannedResponse::Rest { status, body } => {
                let mut headers = BTreeMap::new();
                let body = match body {
                    Some(body) => {
                        headers.insert("content-type".to_string(), "application/json".to_string());
                        body.to_string().into_bytes()
                    }
                    None => Vec::new(),
                };
                Ok(HttpResponse {
                    status,
                    headers,
                    body,
                })
            }
            CannedResponse::Zapi { results } => {
                let body = encode_document(&response_envelope(results))
                    .map_err(|e| TransportError::new(TransportErrorClass::Decode, e.to_string()))?;
                Ok(HttpResponse {
                    status: 200,
                    headers: BTreeMap::from([("content-type".to_string(), "text/xml".to_string())]),
                    body,
                })
            }
            CannedResponse::Fault(error) => Err(error),
        }
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn request(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let observed = Self::identify(&request)?;
        self.recorder.record(observed.clone());
        let expectation = self.script().pop_front();
        match expectation {
            Some(expectation) if expectation.request == observed => Self::render(expectation.response),
            Some(expectation) => panic!(
                "unexpected request {observed}, expected {} (response '{}')",
                expectation.request, expectation.response_name
            ),
            None => panic!("unexpected request {observed}: script exhausted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;
    use std::time::Duration;

    fn rest_request(verb: Verb, path: &str) -> HttpRequest {
        let url = Url::parse(&format!("https://cluster.example.com/api/{path}")).unwrap();
        HttpRequest::new(verb, url, Duration::from_secs(30))
    }

    #[tokio::test]
    async fn test_answers_in_order_and_records() {
        let transport = ScriptedTransport::new(ResponseRegistry::new());
        transport
            .expect_rest(Verb::Get, "cluster", "is_rest_9_8")
            .expect_rest(Verb::Post, "storage/flexcache/flexcaches", "job_accepted");

        let first = transport.request(rest_request(Verb::Get, "cluster")).await.unwrap();
        assert_eq!(first.status, 200);
        let second = transport
            .request(rest_request(Verb::Post, "storage/flexcache/flexcaches"))
            .await
            .unwrap();
        assert_eq!(second.status, 202);

        transport.assert_all_consumed();
        assert_eq!(transport.recorder().len(), 2);
    }

    #[tokio::test]
    #[should_panic(expected = "unexpected request PATCH cluster")]
    async fn test_mismatch_panics() {
        let transport = ScriptedTransport::new(ResponseRegistry::new());
        transport.expect_rest(Verb::Get, "cluster", "is_rest_9_8");
        let _ = transport.request(rest_request(Verb::Patch, "cluster")).await;
    }

    #[tokio::test]
    async fn test_fault_is_returned_as_error() {
        let transport = ScriptedTransport::new(ResponseRegistry::new());
        transport.expect_rest(Verb::Get, "cluster", "connection_refused");
        let err = transport.request(rest_request(Verb::Get, "cluster")).await.unwrap_err();
        assert_eq!(err.class, TransportErrorClass::Connect);
    }

    #[test]
    #[should_panic(expected = "unconsumed expectations: GET cluster -> is_rest_9_8")]
    fn test_unconsumed_expectations_panic() {
        let transport = ScriptedTransport::new(ResponseRegistry::new());
        transport.expect_rest(Verb::Get, "cluster", "is_rest_9_8");
        transport.assert_all_consumed();
    }
}
