use crate::core::domain::{
    error::{TransportError, TransportErrorClass},
    model::zapi_element::ZapiElement,
};
use serde_json::{Value, json};
use std::collections::BTreeMap;

/// A canned answer.
#[derive(Debug, Clone, PartialEq)]
pub enum CannedResponse {
    /// A REST answer; `body: None` means an empty body.
    Rest { status: u16, body: Option<Value> },
    /// A ZAPI `results` element, served with HTTP 200.
    Zapi { results: ZapiElement },
    /// The transport itself fails.
    Fault(TransportError),
}

impl CannedResponse {
    pub fn rest(status: u16, body: Value) -> Self {
        CannedResponse::Rest {
            status,
            body: Some(body),
        }
    }

    /// A `passed` ZAPI result carrying `content` as children.
    pub fn zapi_passed(content: &Value) -> Self {
        let results = ZapiElement::from_value("results", content).with_attr("status", "passed");
        CannedResponse::Zapi { results }
    }

    pub fn zapi_failed(errno: i64, reason: &str) -> Self {
        let results = ZapiElement::new("results")
            .with_attr("status", "failed")
            .with_attr("errno", errno.to_string())
            .with_attr("reason", reason);
        CannedResponse::Zapi { results }
    }
}

fn version(generation: u32, major: u32, minor: u32) -> CannedResponse {
    CannedResponse::rest(
        200,
        json!({"version": {
            "generation": generation,
            "major": major,
            "minor": minor,
            "full": format!("NetApp Release {generation}.{major}.{minor}")
        }}),
    )
}

fn job(state: &str, message: &str, code: i64) -> CannedResponse {
    CannedResponse::rest(
        200,
        json!({
            "uuid": "abc",
            "state": state,
            "message": message,
            "code": code,
            "_links": {"self": {"href": "/api/cluster/jobs/abc"}}
        }),
    )
}

/// Named canned responses.
///
/// [`ResponseRegistry::new`] starts from the defaults; tests add their own
/// with [`ResponseRegistry::register`].
#[derive(Debug, Clone)]
pub struct ResponseRegistry {
    responses: BTreeMap<String, CannedResponse>,
}

impl Default for ResponseRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseRegistry {
    /// A registry holding the default responses:
    ///
    /// | name | answer |
    /// |------|--------|
    /// | `is_rest_9_6`, `is_rest_9_7`, `is_rest_9_8`, `is_rest_9_10_1` | cluster version records |
    /// | `is_rest_9_5` | a pre-REST cluster version |
    /// | `is_zapi` | the version lookup fails with 400 |
    /// | `generic_error` | 400 with an ONTAP error envelope |
    /// | `server_error` | 500 without an envelope |
    /// | `empty_good` | 200, `{}` |
    /// | `empty_body` | 200, no body |
    /// | `zero_records` | 200, no records |
    /// | `job_accepted` | 202 with a job link to `cluster/jobs/abc` |
    /// | `job_running`, `job_success`, `job_failure` | job records for `abc` |
    /// | `zapi_success` | an empty `passed` result |
    /// | `zapi_error` | a `failed` result, errno 13001 |
    /// | `connection_refused` | a transport `connect` fault |
    pub fn new() -> Self {
        let mut responses = BTreeMap::new();
        let mut add = |name: &str, response: CannedResponse| {
            responses.insert(name.to_string(), response);
        };
        add("is_rest_9_5", version(9, 5, 0));
        add("is_rest_9_6", version(9, 6, 0));
        add("is_rest_9_7", version(9, 7, 0));
        add("is_rest_9_8", version(9, 8, 0));
        add("is_rest_9_10_1", version(9, 10, 1));
        add(
            "is_zapi",
            CannedResponse::rest(400, json!({"error": {"message": "Expected error", "code": "6"}})),
        );
        add(
            "generic_error",
            CannedResponse::rest(400, json!({"error": {"message": "Expected error", "code": "1"}})),
        );
        add(
            "server_error",
            CannedResponse::Rest {
                status: 500,
                body: None,
            },
        );
        add("empty_good", CannedResponse::rest(200, json!({})));
        add(
            "empty_body",
            CannedResponse::Rest {
                status: 200,
                body: None,
            },
        );
        add(
            "zero_records",
            CannedResponse::rest(200, json!({"records": [], "num_records": 0})),
        );
        add(
            "job_accepted",
            CannedResponse::rest(
                202,
                json!({"job": {"uuid": "abc", "_links": {"self": {"href": "/api/cluster/jobs/abc"}}}}),
            ),
        );
        add("job_running", job("running", "in progress", 0));
        add("job_success", job("success", "success", 0));
        add("job_failure", job("failure", "failed to create", 460_770));
        add("zapi_success", CannedResponse::zapi_passed(&json!({})));
        add("zapi_error", CannedResponse::zapi_failed(13001, "test error"));
        add(
            "connection_refused",
            CannedResponse::Fault(TransportError::new(
                TransportErrorClass::Connect,
                "connection refused",
            )),
        );
        Self { responses }
    }

    pub fn register(&mut self, name: impl Into<String>, response: CannedResponse) -> &mut Self {
        self.responses.insert(name.into(), response);
        self
    }

    /// Registers `records` as a records payload under `name`.
    pub fn register_records(&mut self, name: impl Into<String>, records: Vec<Value>) -> &mut Self {
        let count = records.len();
        self.register(
            name,
            CannedResponse::rest(200, json!({"records": records, "num_records": count})),
        )
    }

    pub fn get(&self, name: &str) -> Option<&CannedResponse> {
        self.responses.get(name)
    }
}
