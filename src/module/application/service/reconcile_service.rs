//! The reconcile loop: fetch current state, plan, execute the minimum action.

use crate::core::domain::{
    error::{ErrorKind, OntapResult},
    model::envelope::{ResultEnvelope, Warnings},
};
use crate::core::infrastructure::rest_client::JOB_RESPONSE_KEY;
use crate::module::domain::{diff, schema::ModuleSchema};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use tracing::{debug, info};

/// The action a reconcile settles on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    Create,
    Modify,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::None => "none",
            Action::Create => "create",
            Action::Modify => "modify",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutating operations of one resource.
///
/// Each handler may return the raw response; a `job_response` entry in it is
/// surfaced in the envelope.
#[async_trait]
pub trait ResourceHandlers: Send + Sync {
    /// Human readable name used in error messages, e.g. `SNMP traphost example.com`.
    fn describe(&self) -> String;

    async fn create(&self, desired: &Map<String, Value>) -> OntapResult<Option<Value>>;

    async fn modify(
        &self,
        current: &Map<String, Value>,
        modify: &Map<String, Value>,
        desired: &Map<String, Value>,
    ) -> OntapResult<Option<Value>>;

    async fn delete(&self, current: &Map<String, Value>) -> OntapResult<Option<Value>>;
}

/// A resource that can also report its current state.
#[async_trait]
pub trait Resource: ResourceHandlers {
    /// Returns `None` when the resource does not exist.
    async fn get_current(&self) -> OntapResult<Option<Map<String, Value>>>;
}

/// The outcome of planning, before anything is executed.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub action: Action,
    pub modify: Map<String, Value>,
}

/// Per-invocation reconcile state: the schema, the validated parameters and
/// the warnings collected so far.
#[derive(Debug, Clone)]
pub struct NetAppModule {
    schema: ModuleSchema,
    params: Map<String, Value>,
    check_mode: bool,
    warnings: Warnings,
}

impl NetAppModule {
    pub fn new(schema: ModuleSchema, params: Map<String, Value>, check_mode: bool) -> Self {
        Self {
            schema,
            params,
            check_mode,
            warnings: Warnings::new(),
        }
    }

    pub fn schema(&self) -> &ModuleSchema {
        &self.schema
    }

    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    pub fn check_mode(&self) -> bool {
        self.check_mode
    }

    pub fn warnings_mut(&mut self) -> &mut Warnings {
        &mut self.warnings
    }

    /// The module's own options that are set.
    pub fn desired(&self) -> Map<String, Value> {
        self.schema.desired_state(&self.params)
    }

    /// Create when absent and wanted, delete when present and unwanted.
    ///
    /// A desired map without `state` means `present`.
    pub fn get_cd_action(
        &self,
        current: Option<&Map<String, Value>>,
        desired: &Map<String, Value>,
    ) -> Action {
        let present = desired
            .get("state")
            .and_then(Value::as_str)
            .is_none_or(|state| state == "present");
        match (current.is_some(), present) {
            (false, true) => Action::Create,
            (true, false) => Action::Delete,
            _ => Action::None,
        }
    }

    pub fn get_modified_attributes(
        &self,
        current: &Map<String, Value>,
        desired: &Map<String, Value>,
    ) -> Map<String, Value> {
        diff::get_modified_attributes(current, desired, &self.schema)
    }

    /// Decides whether a rename from `source` is needed.
    ///
    /// Returns `None` when neither exists, `Some(true)` when only the source
    /// exists and `Some(false)` when the target already exists.
    pub fn is_rename_action(
        &self,
        source: Option<&Map<String, Value>>,
        target: Option<&Map<String, Value>>,
    ) -> Option<bool> {
        match (source, target) {
            (None, None) => None,
            (Some(_), None) => Some(true),
            (_, Some(_)) => Some(false),
        }
    }

    pub fn plan(&self, current: Option<&Map<String, Value>>, desired: &Map<String, Value>) -> Plan {
        let action = self.get_cd_action(current, desired);
        let modify = match (action, current) {
            (Action::None, Some(current)) => self.get_modified_attributes(current, desired),
            _ => Map::new(),
        };
        let action = if action == Action::None && !modify.is_empty() {
            Action::Modify
        } else {
            action
        };
        Plan { action, modify }
    }

    /// Plans against `current` and executes the result through `handlers`.
    ///
    /// In check mode no handler is called. Every failure becomes a failed
    /// envelope whose message names the operation.
    pub async fn apply<H: ResourceHandlers + ?Sized>(
        &mut self,
        current: Option<&Map<String, Value>>,
        desired: &Map<String, Value>,
        handlers: &H,
    ) -> ResultEnvelope {
        self.schema
            .deprecation_warnings(&self.params, &mut self.warnings);
        let plan = self.plan(current, desired);
        let describe = handlers.describe();
        info!(
            action = plan.action.as_str(),
            resource = %describe,
            check_mode = self.check_mode,
            "reconcile planned"
        );

        let mut envelope = ResultEnvelope::changed(plan.action != Action::None);
        if plan.action == Action::Modify {
            debug!(modify = ?plan.modify, "modified attributes");
            envelope.diff = Some(plan.modify.clone());
        }
        if self.check_mode || plan.action == Action::None {
            return envelope.with_warnings(self.warnings.clone());
        }

        let empty = Map::new();
        let current = current.unwrap_or(&empty);
        let (verb, outcome) = match plan.action {
            Action::Create => ("creating", handlers.create(desired).await),
            Action::Modify => (
                "modifying",
                handlers.modify(current, &plan.modify, desired).await,
            ),
            Action::Delete => ("deleting", handlers.delete(current).await),
            Action::None => ("", Ok(None)),
        };
        match outcome {
            Ok(response) => {
                envelope.job_response = response
                    .as_ref()
                    .and_then(|r| r.get(JOB_RESPONSE_KEY))
                    .cloned();
                envelope.with_warnings(self.warnings.clone())
            }
            Err(e) => ResultEnvelope::failure(format!("Error {verb} {describe}: {e}"))
                .with_warnings(self.warnings.clone()),
        }
    }

    /// Fetches the current state of `resource` and applies `desired` to it.
    ///
    /// In check mode a fetch failure other than a `config` error is reported
    /// as a warning on an unchanged envelope.
    pub async fn reconcile<R: Resource + ?Sized>(
        &mut self,
        resource: &R,
        desired: &Map<String, Value>,
    ) -> ResultEnvelope {
        match resource.get_current().await {
            Ok(current) => self.apply(current.as_ref(), desired, resource).await,
            Err(e) => {
                let msg = format!("Error fetching {}: {e}", resource.describe());
                if self.check_mode && e.kind() != ErrorKind::Config {
                    self.warnings.push(msg);
                    ResultEnvelope::changed(false).with_warnings(self.warnings.clone())
                } else {
                    ResultEnvelope::failure(msg).with_warnings(self.warnings.clone())
                }
            }
        }
    }
}
