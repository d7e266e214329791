use crate::module::application::service::{
    module_runner::{ModuleContext, OntapModule},
    reconcile_service::{Resource, ResourceHandlers},
};
use crate::module::domain::schema::{ModuleSchema, OptionSpec};
use crate::testing::{ResponseRegistry, ScriptedTransport};
use crate::{AsyncOptions, OntapClient, OntapResult, Query};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::sync::Arc;

/// Module parameters with the connection options filled in.
pub fn params(module_params: Value) -> Map<String, Value> {
    let mut params = Map::from_iter([
        ("hostname".to_string(), json!("cluster1.example.com")),
        ("username".to_string(), json!("admin")),
        ("password".to_string(), json!("netapp1!")),
    ]);
    if let Value::Object(extra) = module_params {
        params.extend(extra);
    }
    params
}

pub fn scripted(registry: ResponseRegistry) -> Arc<ScriptedTransport> {
    Arc::new(ScriptedTransport::new(registry))
}

/// A minimal REST resource at `widgets/<name>` with one `enabled` flag.
pub struct WidgetModule;

impl OntapModule for WidgetModule {
    fn schema(&self) -> ModuleSchema {
        ModuleSchema::new("widget")
            .zapi_supported(false)
            .option(OptionSpec::str("name").required().not_diffable())
            .option(OptionSpec::bool("enabled"))
    }

    fn build(&self, context: ModuleContext) -> OntapResult<Box<dyn Resource>> {
        let name = context
            .params
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(Box::new(Widget {
            client: context.client,
            name,
        }))
    }
}

struct Widget {
    client: Arc<OntapClient>,
    name: String,
}

#[async_trait]
impl ResourceHandlers for Widget {
    fn describe(&self) -> String {
        format!("widget {}", self.name)
    }

    async fn create(&self, desired: &Map<String, Value>) -> OntapResult<Option<Value>> {
        self.client
            .post_async("widgets", &Value::Object(desired.clone()), &AsyncOptions::new())
            .await
            .map(Some)
    }

    async fn modify(
        &self,
        _current: &Map<String, Value>,
        modify: &Map<String, Value>,
        _desired: &Map<String, Value>,
    ) -> OntapResult<Option<Value>> {
        self.client
            .patch_async("widgets", Some(&self.name), &Value::Object(modify.clone()), &AsyncOptions::new())
            .await
            .map(Some)
    }

    async fn delete(&self, _current: &Map<String, Value>) -> OntapResult<Option<Value>> {
        self.client
            .delete_async("widgets", &self.name, &AsyncOptions::new())
            .await
            .map(Some)
    }
}

#[async_trait]
impl Resource for Widget {
    async fn get_current(&self) -> OntapResult<Option<Map<String, Value>>> {
        let record = self
            .client
            .get_one(&format!("widgets/{}", self.name), &Query::new(), &["enabled"])
            .await?;
        Ok(record.and_then(|r| r.as_object().cloned()))
    }
}
