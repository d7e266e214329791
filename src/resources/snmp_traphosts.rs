//! SNMP traphosts, over REST (`support/snmp/traphosts`) or ZAPI.

use super::param_str;
use crate::core::domain::{
    error::{OntapError, OntapResult},
    value_object::OntapVersion,
};
use crate::core::infrastructure::capability_gate::Protocol;
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

const API: &str = "support/snmp/traphosts";

pub struct SnmpTraphostsModule;

impl OntapModule for SnmpTraphostsModule {
    fn schema(&self) -> ModuleSchema {
        ModuleSchema::new("snmp_traphosts")
            .zapi_supported(true)
            .rest_minimum(OntapVersion::new(9, 7, 0))
            .option(OptionSpec::state())
            .option(
                OptionSpec::str("host")
                    .required()
                    .aliases(&["ip_address"])
                    .not_diffable(),
            )
    }

    fn build(&self, context: ModuleContext) -> OntapResult<Box<dyn Resource>> {
        let host = param_str(&context.params, "host")
            .ok_or_else(|| OntapError::config("missing required arguments: host"))?
            .to_string();
        Ok(Box::new(SnmpTraphost {
            client: context.client,
            protocol: context.protocol,
            host,
        }))
    }
}

struct SnmpTraphost {
    client: Arc<OntapClient>,
    protocol: Protocol,
    host: String,
}

impl SnmpTraphost {
    fn zapi_body(&self) -> Value {
        json!({"traphosts": {"traphost-info": {"host-name": self.host}}})
    }

    async fn get_current_zapi(&self) -> OntapResult<Option<Map<String, Value>>> {
        let results = self.client.zapi("snmp-status", &json!({}), None).await?;
        let found = results
            .find("traphosts")
            .into_iter()
            .flat_map(|list| list.children_named("traphost-info"))
            .any(|info| {
                info.child_content("host-name") == Some(self.host.as_str())
                    || info.child_content("ip-address") == Some(self.host.as_str())
            });
        Ok(found.then(|| Map::from_iter([("host".to_string(), json!(self.host))])))
    }
}

#[async_trait]
impl ResourceHandlers for SnmpTraphost {
    fn describe(&self) -> String {
        format!("SNMP traphost {}", self.host)
    }

    async fn create(&self, _desired: &Map<String, Value>) -> OntapResult<Option<Value>> {
        match self.protocol {
            Protocol::Rest => self
                .client
                .post_async(API, &json!({"host": self.host}), &AsyncOptions::new())
                .await
                .map(Some),
            Protocol::Zapi => self
                .client
                .zapi("snmp-traphost-add", &self.zapi_body(), None)
                .await
                .map(|_| None),
        }
    }

    async fn modify(
        &self,
        _current: &Map<String, Value>,
        _modify: &Map<String, Value>,
        _desired: &Map<String, Value>,
    ) -> OntapResult<Option<Value>> {
        Err(OntapError::config("an SNMP traphost has no modifiable attributes"))
    }

    async fn delete(&self, _current: &Map<String, Value>) -> OntapResult<Option<Value>> {
        match self.protocol {
            Protocol::Rest => self
                .client
                .delete_async(API, &self.host, &AsyncOptions::new())
                .await
                .map(Some),
            Protocol::Zapi => self
                .client
                .zapi("snmp-traphost-delete", &self.zapi_body(), None)
                .await
                .map(|_| None),
        }
    }
}

#[async_trait]
impl Resource for SnmpTraphost {
    async fn get_current(&self) -> OntapResult<Option<Map<String, Value>>> {
        match self.protocol {
            Protocol::Rest => {
                let query = Query::from([("host".to_string(), self.host.clone())]);
                let record = self.client.get_one(API, &query, &["host"]).await?;
                Ok(record.map(|_| Map::from_iter([("host".to_string(), json!(self.host))])))
            }
            Protocol::Zapi => self.get_current_zapi().await,
        }
    }
}
