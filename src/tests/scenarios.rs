use super::support::{WidgetModule, params, scripted};
use crate::module::application::service::module_runner::ModuleRunner;
use crate::resources::{
    cli_timeout::CliTimeoutModule, flexcache::FlexcacheModule,
    snmp_traphosts::SnmpTraphostsModule,
};
use crate::testing::{CannedResponse, RecordedRequest, ResponseRegistry};
use crate::Verb;
use serde_json::json;

#[tokio::test]
async fn test_modify_cli_timeout() {
    let mut registry = ResponseRegistry::new();
    registry.register("timeout_30", CannedResponse::rest(200, json!({"timeout": 30})));
    let transport = scripted(registry);
    transport
        .expect_rest(Verb::Get, "cluster", "is_rest_9_6")
        .expect_rest(Verb::Get, "private/cli/system/timeout", "timeout_30")
        .expect_rest(Verb::Patch, "private/cli/system/timeout", "empty_good");

    let envelope = ModuleRunner::with_transport(transport.clone())
        .execute(&CliTimeoutModule, params(json!({"timeout": 0})), false)
        .await;

    assert!(envelope.changed);
    assert!(!envelope.failed, "{:?}", envelope.msg);
    assert_eq!(envelope.diff, Some(json!({"timeout": 0}).as_object().cloned().unwrap()));
    transport.assert_all_consumed();
}

#[tokio::test]
async fn test_idempotent_create_snmp_traphost() {
    let mut registry = ResponseRegistry::new();
    registry.register_records("one_traphost", vec![json!({"host": "example.com"})]);
    let transport = scripted(registry);
    transport
        .expect_rest(Verb::Get, "cluster", "is_rest_9_7")
        .expect_rest(Verb::Get, "support/snmp/traphosts", "one_traphost");

    let envelope = ModuleRunner::with_transport(transport.clone())
        .execute(
            &SnmpTraphostsModule,
            params(json!({"host": "example.com", "state": "present"})),
            false,
        )
        .await;

    assert!(!envelope.changed);
    assert!(!envelope.failed, "{:?}", envelope.msg);
    assert!(transport.recorder().mutating().is_empty());
    transport.assert_all_consumed();
}

#[tokio::test(start_paused = true)]
async fn test_async_create_with_job_success() {
    let transport = scripted(ResponseRegistry::new());
    transport
        .expect_rest(Verb::Get, "cluster", "is_rest_9_8")
        .expect_rest(Verb::Get, "storage/flexcache/flexcaches", "zero_records")
        .expect_rest(Verb::Post, "storage/flexcache/flexcaches", "job_accepted")
        .expect_rest(Verb::Get, "cluster/jobs/abc", "job_running")
        .expect_rest(Verb::Get, "cluster/jobs/abc", "job_success");

    let envelope = ModuleRunner::with_transport(transport.clone())
        .execute(
            &FlexcacheModule,
            params(json!({
                "name": "fc1",
                "vserver": "svm1",
                "origin_volume": "vol1",
                "origin_vserver": "svm0",
                "aggr_list": ["aggr1"],
                "size": "50gb"
            })),
            false,
        )
        .await;

    assert!(!envelope.failed, "{:?}", envelope.msg);
    assert!(envelope.changed);
    let job_response = envelope.job_response.unwrap();
    assert_eq!(job_response["state"], json!("success"));
    transport.assert_all_consumed();
}

#[tokio::test]
async fn test_version_gate_refusal() {
    let transport = scripted(ResponseRegistry::new());
    transport.expect_rest(Verb::Get, "cluster", "is_rest_9_6");

    let envelope = ModuleRunner::with_transport(transport.clone())
        .execute(
            &FlexcacheModule,
            params(json!({
                "name": "fc1",
                "vserver": "svm1",
                "global_file_locking_enabled": true
            })),
            false,
        )
        .await;

    assert!(envelope.failed);
    let msg = envelope.msg.unwrap();
    assert!(msg.starts_with("Error: requires ONTAP 9.10.1 or later"), "{msg}");
    assert_eq!(
        transport.recorder().requests(),
        vec![RecordedRequest::rest(Verb::Get, "cluster")]
    );
}

#[tokio::test]
async fn test_unexpected_records() {
    let mut registry = ResponseRegistry::new();
    registry.register_records(
        "two_caches",
        vec![json!({"name": "x", "uuid": "1"}), json!({"name": "x", "uuid": "2"})],
    );
    let transport = scripted(registry);
    transport
        .expect_rest(Verb::Get, "cluster", "is_rest_9_8")
        .expect_rest(Verb::Get, "storage/flexcache/flexcaches", "two_caches");

    let envelope = ModuleRunner::with_transport(transport.clone())
        .execute(&FlexcacheModule, params(json!({"name": "x", "vserver": "svm1"})), false)
        .await;

    assert!(envelope.failed);
    let msg = envelope.msg.unwrap();
    assert!(msg.contains("unexpected response"), "{msg}");
    assert!(msg.starts_with("Error fetching FlexCache x: "), "{msg}");
}

#[tokio::test]
async fn test_check_mode_modify() {
    let mut registry = ResponseRegistry::new();
    registry.register("widget_disabled", CannedResponse::rest(200, json!({"enabled": false})));
    let transport = scripted(registry);
    transport
        .expect_rest(Verb::Get, "cluster", "is_rest_9_8")
        .expect_rest(Verb::Get, "widgets/w1", "widget_disabled");

    let envelope = ModuleRunner::with_transport(transport.clone())
        .execute(&WidgetModule, params(json!({"name": "w1", "enabled": true})), true)
        .await;

    assert!(envelope.changed);
    assert!(!envelope.failed, "{:?}", envelope.msg);
    assert!(transport.recorder().mutating().is_empty());
    transport.assert_all_consumed();
}

#[tokio::test]
async fn test_zapi_create_snmp_traphost() {
    let transport = scripted(ResponseRegistry::new());
    transport
        .expect_zapi("snmp-status", "zapi_success")
        .expect_zapi("snmp-traphost-add", "zapi_success");

    let envelope = ModuleRunner::with_transport(transport.clone())
        .execute(
            &SnmpTraphostsModule,
            params(json!({"host": "example.com", "use_rest": "never", "feature_flags": {"deprecation_warning": false}})),
            false,
        )
        .await;

    assert!(!envelope.failed, "{:?}", envelope.msg);
    assert!(envelope.changed);
    assert!(envelope.warnings.is_empty());
    transport.assert_all_consumed();
}

#[tokio::test]
async fn test_zapi_error_is_prefixed() {
    let transport = scripted(ResponseRegistry::new());
    transport
        .expect_zapi("snmp-status", "zapi_success")
        .expect_zapi("snmp-traphost-add", "zapi_error");

    let envelope = ModuleRunner::with_transport(transport.clone())
        .execute(
            &SnmpTraphostsModule,
            params(json!({"host": "example.com", "use_rest": "never"})),
            false,
        )
        .await;

    assert!(envelope.failed);
    assert_eq!(
        envelope.msg.as_deref(),
        Some(
            "Error creating SNMP traphost example.com: calling: snmp-traphost-add: got \
             NetApp API failed. Reason - 13001:test error."
        )
    );
}

#[tokio::test]
async fn test_auto_falls_back_to_zapi_on_old_cluster() {
    let mut registry = ResponseRegistry::new();
    registry.register(
        "traphost_present",
        CannedResponse::zapi_passed(&json!({
            "traphosts": {"traphost-info": {"host-name": "example.com", "ip-address": "10.0.0.1"}}
        })),
    );
    let transport = scripted(registry);
    transport
        .expect_rest(Verb::Get, "cluster", "is_rest_9_6")
        .expect_zapi("snmp-status", "traphost_present");

    let envelope = ModuleRunner::with_transport(transport.clone())
        .execute(&SnmpTraphostsModule, params(json!({"host": "10.0.0.1"})), false)
        .await;

    assert!(!envelope.failed, "{:?}", envelope.msg);
    assert!(!envelope.changed);
    assert_eq!(envelope.warnings.len(), 2);
    assert!(envelope.warnings[0].starts_with("Falling back to ZAPI because REST requires ONTAP 9.7.0"));
    assert!(envelope.warnings[1].starts_with("Using ZAPI for snmp_traphosts"));
    transport.assert_all_consumed();
}

#[tokio::test]
async fn test_rest_delete_snmp_traphost() {
    let mut registry = ResponseRegistry::new();
    registry.register_records("one_traphost", vec![json!({"host": "example.com"})]);
    let transport = scripted(registry);
    transport
        .expect_rest(Verb::Get, "cluster", "is_rest_9_10_1")
        .expect_rest(Verb::Get, "support/snmp/traphosts", "one_traphost")
        .expect_rest(Verb::Delete, "support/snmp/traphosts/example.com", "empty_good");

    let envelope = ModuleRunner::with_transport(transport.clone())
        .execute(
            &SnmpTraphostsModule,
            params(json!({"ip_address": "example.com", "state": "absent"})),
            false,
        )
        .await;

    assert!(!envelope.failed, "{:?}", envelope.msg);
    assert!(envelope.changed);
    transport.assert_all_consumed();
}

#[tokio::test]
async fn test_invalid_arguments_fail_before_any_request() {
    let transport = scripted(ResponseRegistry::new());
    let envelope = ModuleRunner::with_transport(transport.clone())
        .execute(&CliTimeoutModule, params(json!({"timeout": 5, "colour": "red"})), false)
        .await;

    assert!(envelope.failed);
    assert_eq!(
        envelope.msg.as_deref(),
        Some("Unsupported parameters for (cli_timeout) module: colour.")
    );
    assert!(transport.recorder().is_empty());
}

#[tokio::test]
async fn test_check_mode_tolerates_transient_lookup_failure() {
    let transport = scripted(ResponseRegistry::new());
    transport.expect_rest(Verb::Get, "cluster", "connection_refused");

    let envelope = ModuleRunner::with_transport(transport.clone())
        .execute(
            &WidgetModule,
            params(json!({"name": "w1", "enabled": true, "use_rest": "always"})),
            true,
        )
        .await;

    assert!(!envelope.failed);
    assert!(!envelope.changed);
    assert_eq!(envelope.warnings.len(), 1);
}
