//! The CLI session inactivity timeout. It always exists; the module only
//! ever modifies it.

use crate::core::domain::{
    error::{OntapError, OntapResult},
    value_object::OntapVersion,
};
use crate::module::{
    application::service::{
        module_runner::{ModuleContext, OntapModule},
        reconcile_service::{Resource, ResourceHandlers},
    },
    domain::schema::{ModuleSchema, OptionSpec},
};
use crate::{AsyncOptions, OntapClient, Query};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::sync::Arc;

const API: &str = "private/cli/system/timeout";

pub struct CliTimeoutModule;

impl OntapModule for CliTimeoutModule {
    fn schema(&self) -> ModuleSchema {
        ModuleSchema::new("cli_timeout")
            .zapi_supported(false)
            .rest_minimum(OntapVersion::REST_MINIMUM)
            .option(OptionSpec::int("timeout").required())
    }

    fn build(&self, context: ModuleContext) -> OntapResult<Box<dyn Resource>> {
        Ok(Box::new(CliTimeout {
            client: context.client,
        }))
    }
}

struct CliTimeout {
    client: Arc<OntapClient>,
}

#[async_trait]
impl ResourceHandlers for CliTimeout {
    fn describe(&self) -> String {
        "CLI session timeout".to_string()
    }

    async fn create(&self, _desired: &Map<String, Value>) -> OntapResult<Option<Value>> {
        Err(OntapError::config("the CLI session timeout cannot be created"))
    }

    async fn modify(
        &self,
        _current: &Map<String, Value>,
        modify: &Map<String, Value>,
        _desired: &Map<String, Value>,
    ) -> OntapResult<Option<Value>> {
        let body = json!({ "timeout": modify.get("timeout") });
        self.client
            .patch_async(API, None, &body, &AsyncOptions::new())
            .await
            .map(Some)
    }

    async fn delete(&self, _current: &Map<String, Value>) -> OntapResult<Option<Value>> {
        Err(OntapError::config("the CLI session timeout cannot be deleted"))
    }
}

#[async_trait]
impl Resource for CliTimeout {
    async fn get_current(&self) -> OntapResult<Option<Map<String, Value>>> {
        let record = self
            .client
            .get_one(API, &Query::new(), &["timeout"])
            .await?
            .ok_or_else(|| OntapError::UnexpectedShape("no CLI timeout record".to_string()))?;
        let timeout = record.get("timeout").cloned().unwrap_or(Value::Null);
        Ok(Some(Map::from_iter([("timeout".to_string(), timeout)])))
    }
}
