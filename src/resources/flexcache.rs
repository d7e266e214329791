//! FlexCache volumes over REST (`storage/flexcache/flexcaches`).
//!
//! Creation and deletion are asynchronous and followed through their job.
//! Size and junction path are changed on the underlying volume.

use super::param_str;
use crate::core::domain::{
    error::{OntapError, OntapResult},
    value_object::OntapVersion,
};
use crate::module::{
    application::service::{
        module_runner::{ModuleContext, OntapModule},
        reconcile_service::{Resource, ResourceHandlers},
    },
    domain::{
        normalize::{format_size, parse_size},
        schema::{ArgType, CompareKind, ModuleSchema, OptionSpec},
    },
};
use crate::{AsyncOptions, OntapClient, Query};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::sync::Arc;

const API: &str = "storage/flexcache/flexcaches";
const VOLUMES_API: &str = "storage/volumes";
const DEFAULT_TIME_OUT: u64 = 180;

pub struct FlexcacheModule;

impl OntapModule for FlexcacheModule {
    fn schema(&self) -> ModuleSchema {
        ModuleSchema::new("flexcache")
            .zapi_supported(false)
            .option(OptionSpec::state())
            .option(
                OptionSpec::str("name")
                    .required()
                    .aliases(&["volume"])
                    .not_diffable(),
            )
            .option(OptionSpec::str("vserver").required().not_diffable())
            .option(OptionSpec::str("origin_volume").not_diffable())
            .option(OptionSpec::str("origin_vserver").not_diffable())
            .option(OptionSpec::list("aggr_list", ArgType::Str).not_diffable())
            .option(OptionSpec::int("aggr_list_multiplier").not_diffable())
            .option(OptionSpec::str("size").compare(CompareKind::Size))
            .option(
                OptionSpec::str("size_unit")
                    .choices(&["b", "kb", "mb", "gb", "tb"])
                    .deprecated(Some("size"))
                    .not_diffable(),
            )
            .option(OptionSpec::str("junction_path"))
            .option(
                OptionSpec::dict(
                    "prepopulate",
                    vec![
                        OptionSpec::list("dir_paths", ArgType::Str).required(),
                        OptionSpec::list("exclude_dir_paths", ArgType::Str),
                    ],
                )
                .min_version(OntapVersion::new(9, 8, 0))
                .not_diffable(),
            )
            .option(
                OptionSpec::bool("global_file_locking_enabled")
                    .min_version(OntapVersion::new(9, 10, 1))
                    .not_diffable(),
            )
            .option(
                OptionSpec::int("time_out")
                    .default_value(json!(DEFAULT_TIME_OUT))
                    .not_diffable(),
            )
    }

    /// Folds a deprecated `size_unit` into `size`, so `size: 10, size_unit: gb`
    /// compares as `10gb`.
    fn prepare(&self, params: &mut Map<String, Value>) -> OntapResult<()> {
        let Some(unit) = param_str(params, "size_unit").map(str::to_string) else {
            return Ok(());
        };
        let Some(size) = param_str(params, "size").map(str::to_string) else {
            return Ok(());
        };
        if size.chars().all(|c| c.is_ascii_digit()) {
            let bytes = parse_size(&format!("{size}{unit}"))?;
            params.insert("size".to_string(), Value::String(format_size(bytes)));
        }
        Ok(())
    }

    fn build(&self, context: ModuleContext) -> OntapResult<Box<dyn Resource>> {
        let name = param_str(&context.params, "name")
            .ok_or_else(|| OntapError::config("missing required arguments: name"))?
            .to_string();
        let vserver = param_str(&context.params, "vserver")
            .ok_or_else(|| OntapError::config("missing required arguments: vserver"))?
            .to_string();
        let time_out = context
            .params
            .get("time_out")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_TIME_OUT);
        Ok(Box::new(Flexcache {
            client: context.client,
            name,
            vserver,
            time_out,
        }))
    }
}

struct Flexcache {
    client: Arc<OntapClient>,
    name: String,
    vserver: String,
    time_out: u64,
}

impl Flexcache {
    fn options(&self) -> AsyncOptions {
        AsyncOptions::new().with_job_timeout(self.time_out)
    }

    fn uuid<'a>(&self, current: &'a Map<String, Value>) -> OntapResult<&'a str> {
        current.get("uuid").and_then(Value::as_str).ok_or_else(|| {
            OntapError::UnexpectedShape(format!("no uuid for FlexCache {}", self.name))
        })
    }

    fn create_body(&self, desired: &Map<String, Value>) -> OntapResult<Value> {
        let (Some(origin_volume), Some(origin_vserver)) = (
            param_str(desired, "origin_volume"),
            param_str(desired, "origin_vserver"),
        ) else {
            return Err(OntapError::config(
                "Error: origin_volume and origin_vserver are required to create a FlexCache.",
            ));
        };
        let mut body = json!({
            "name": self.name,
            "svm": {"name": self.vserver},
            "origins": [{"volume": {"name": origin_volume}, "svm": {"name": origin_vserver}}],
        });
        if let Some(aggregates) = desired.get("aggr_list").and_then(Value::as_array) {
            body["aggregates"] = aggregates
                .iter()
                .map(|name| json!({"name": name}))
                .collect();
        }
        if let Some(multiplier) = desired.get("aggr_list_multiplier") {
            body["constituents_per_aggregate"] = multiplier.clone();
        }
        if let Some(size) = param_str(desired, "size") {
            body["size"] = json!(parse_size(size)?);
        }
        if let Some(path) = param_str(desired, "junction_path") {
            body["path"] = json!(path);
        }
        if let Some(prepopulate) = desired.get("prepopulate") {
            body["prepopulate"] = prepopulate.clone();
        }
        if let Some(locking) = desired.get("global_file_locking_enabled") {
            body["global_file_locking_enabled"] = locking.clone();
        }
        Ok(body)
    }
}

#[async_trait]
impl ResourceHandlers for Flexcache {
    fn describe(&self) -> String {
        format!("FlexCache {}", self.name)
    }

    async fn create(&self, desired: &Map<String, Value>) -> OntapResult<Option<Value>> {
        let body = self.create_body(desired)?;
        self.client
            .post_async(API, &body, &self.options())
            .await
            .map(Some)
    }

    async fn modify(
        &self,
        current: &Map<String, Value>,
        modify: &Map<String, Value>,
        _desired: &Map<String, Value>,
    ) -> OntapResult<Option<Value>> {
        let mut body = Map::new();
        if let Some(size) = param_str(modify, "size") {
            body.insert("size".to_string(), json!(parse_size(size)?));
        }
        if let Some(path) = param_str(modify, "junction_path") {
            body.insert("nas".to_string(), json!({"path": path}));
        }
        if body.is_empty() {
            return Ok(None);
        }
        self.client
            .patch_async(VOLUMES_API, Some(self.uuid(current)?), &Value::Object(body), &self.options())
            .await
            .map(Some)
    }

    /// Unmounts a mounted cache before deleting it.
    async fn delete(&self, current: &Map<String, Value>) -> OntapResult<Option<Value>> {
        let uuid = self.uuid(current)?;
        let mounted = param_str(current, "junction_path").is_some_and(|path| !path.is_empty());
        if mounted {
            self.client
                .patch_async(VOLUMES_API, Some(uuid), &json!({"nas": {"path": ""}}), &self.options())
                .await?;
        }
        self.client
            .delete_async(API, uuid, &self.options())
            .await
            .map(Some)
    }
}

#[async_trait]
impl Resource for Flexcache {
    async fn get_current(&self) -> OntapResult<Option<Map<String, Value>>> {
        let query = Query::from([
            ("name".to_string(), self.name.clone()),
            ("svm.name".to_string(), self.vserver.clone()),
        ]);
        let Some(record) = self
            .client
            .get_one(API, &query, &["uuid", "name", "svm.name", "size", "path", "origins", "aggregates"])
            .await?
        else {
            return Ok(None);
        };

        let mut current = Map::new();
        current.insert("uuid".to_string(), record.get("uuid").cloned().unwrap_or(Value::Null));
        current.insert("name".to_string(), json!(self.name));
        current.insert("vserver".to_string(), json!(self.vserver));
        if let Some(size) = record.get("size") {
            current.insert("size".to_string(), size.clone());
        }
        if let Some(path) = record.get("path") {
            current.insert("junction_path".to_string(), path.clone());
        }
        if let Some(origin) = record.pointer("/origins/0") {
            if let Some(volume) = origin.pointer("/volume/name") {
                current.insert("origin_volume".to_string(), volume.clone());
            }
            if let Some(svm) = origin.pointer("/svm/name") {
                current.insert("origin_vserver".to_string(), svm.clone());
            }
        }
        if let Some(aggregates) = record.get("aggregates").and_then(Value::as_array) {
            let names: Vec<Value> = aggregates
                .iter()
                .filter_map(|aggr| aggr.get("name").cloned())
                .collect();
            current.insert("aggr_list".to_string(), Value::Array(names));
        }
        Ok(Some(current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_folds_size_unit() {
        let mut params = Map::from_iter([
            ("size".to_string(), json!("10")),
            ("size_unit".to_string(), json!("gb")),
        ]);
        FlexcacheModule.prepare(&mut params).unwrap();
        assert_eq!(params["size"], json!("10gb"));

        let mut params = Map::from_iter([
            ("size".to_string(), json!("1tb")),
            ("size_unit".to_string(), json!("gb")),
        ]);
        FlexcacheModule.prepare(&mut params).unwrap();
        assert_eq!(params["size"], json!("1tb"));
    }

    #[test]
    fn test_schema_declares_version_gates() {
        let schema = FlexcacheModule.schema();
        assert!(!schema.zapi_supported);
        assert_eq!(
            schema.find("global_file_locking_enabled").unwrap().min_version,
            Some(OntapVersion::new(9, 10, 1))
        );
        assert_eq!(schema.find("time_out").unwrap().default, Some(json!(180)));
    }
}
