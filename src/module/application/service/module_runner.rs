//! Drives one module invocation from raw parameters to a single envelope.

use crate::core::domain::{
    error::{ErrorKind, OntapError, OntapResult},
    model::{envelope::ResultEnvelope, host_options::HostOptions},
};
use crate::core::infrastructure::{capability_gate::Protocol, transport::Transport};
use crate::module::{
    application::service::reconcile_service::{NetAppModule, Resource},
    domain::schema::ModuleSchema,
    host::{
        ModuleHost,
        arguments::{redacted, validate_arguments},
    },
};
use crate::OntapClient;
use serde_json::{Map, Value};
use std::io;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Everything a module needs to build its resource.
pub struct ModuleContext {
    pub client: Arc<OntapClient>,
    /// Validated parameters, connection options included.
    pub params: Map<String, Value>,
    pub protocol: Protocol,
}

/// A resource module: an option schema plus a way to bind it to a cluster.
pub trait OntapModule: Send + Sync {
    fn schema(&self) -> ModuleSchema;

    /// Rewrites validated parameters before they are compared, e.g. to fold
    /// a deprecated option into its replacement.
    ///
    /// # Errors
    /// Returns a `config` kind error for inconsistent parameters.
    fn prepare(&self, _params: &mut Map<String, Value>) -> OntapResult<()> {
        Ok(())
    }

    /// # Errors
    /// Returns a `config` kind error when the parameters cannot describe a
    /// resource for the selected protocol.
    fn build(&self, context: ModuleContext) -> OntapResult<Box<dyn Resource>>;
}

/// Runs modules: validate, connect, select a protocol, reconcile.
#[derive(Default)]
pub struct ModuleRunner {
    transport: Option<Arc<dyn Transport>>,
}

impl ModuleRunner {
    /// A runner connecting over HTTPS.
    pub fn new() -> Self {
        Self::default()
    }

    /// A runner whose clients use `transport`.
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport: Some(transport),
        }
    }

    /// Runs `module` with the host's parameters and hands the envelope back
    /// to the host.
    ///
    /// # Errors
    /// Only host I/O failures; module failures are reported through
    /// [`ModuleHost::fail`].
    pub async fn run(&self, module: &dyn OntapModule, host: &mut dyn ModuleHost) -> io::Result<()> {
        let envelope = self
            .execute(module, host.params().clone(), host.check_mode())
            .await;
        finish(host, envelope)
    }

    /// Runs `module` and returns its envelope.
    pub async fn execute(
        &self,
        module: &dyn OntapModule,
        raw: Map<String, Value>,
        check_mode: bool,
    ) -> ResultEnvelope {
        let schema = module.schema();
        let params = match validate_arguments(&schema.with_host_options(), &raw)
            .and_then(|mut params| module.prepare(&mut params).map(|()| params))
        {
            Ok(params) => params,
            Err(e) => return ResultEnvelope::failure(e.to_string()),
        };
        debug!(
            module = %schema.name,
            params = ?redacted(&schema.with_host_options(), &params),
            check_mode,
            "module invoked"
        );
        let options = match HostOptions::from_params(&params) {
            Ok(options) => options,
            Err(e) => return ResultEnvelope::failure(e.to_string()),
        };

        let deadline = options.module_timeout;
        let run = self.reconcile(module, schema, options, params, check_mode);
        match tokio::time::timeout(deadline, run).await {
            Ok(envelope) => envelope,
            Err(_) => {
                error!(seconds = deadline.as_secs(), "module timed out");
                ResultEnvelope::failure(format!(
                    "Error: module timed out after {} seconds",
                    deadline.as_secs()
                ))
            }
        }
    }

    async fn reconcile(
        &self,
        module: &dyn OntapModule,
        schema: ModuleSchema,
        options: HostOptions,
        params: Map<String, Value>,
        check_mode: bool,
    ) -> ResultEnvelope {
        let client = match &self.transport {
            Some(transport) => OntapClient::with_transport(options, Arc::clone(transport)),
            None => OntapClient::new(options).await,
        };
        let client = match client {
            Ok(client) => Arc::new(client),
            Err(e) => return ResultEnvelope::failure(e.to_string()),
        };

        let mut netapp = NetAppModule::new(schema, params, check_mode);
        let requirements = netapp.schema().protocol_requirements(netapp.params());
        let protocol = match client
            .select_protocol(&requirements, netapp.warnings_mut())
            .await
        {
            Ok(protocol) => protocol,
            Err(e) => return degrade(&mut netapp, e),
        };

        let context = ModuleContext {
            client,
            params: netapp.params().clone(),
            protocol,
        };
        let resource = match module.build(context) {
            Ok(resource) => resource,
            Err(e) => return degrade(&mut netapp, e),
        };
        let desired = netapp.desired();
        netapp.reconcile(resource.as_ref(), &desired).await
    }
}

/// A failed envelope, or in check mode an unchanged one carrying the error
/// as a warning, unless the error is a `config` error.
fn degrade(netapp: &mut NetAppModule, e: OntapError) -> ResultEnvelope {
    let mut warnings = netapp.warnings_mut().clone();
    if netapp.check_mode() && e.kind() != ErrorKind::Config {
        warn!(error = %e, "ignoring error in check mode");
        warnings.push(e.to_string());
        return ResultEnvelope::changed(false).with_warnings(warnings);
    }
    ResultEnvelope::failure(e.to_string()).with_warnings(warnings)
}

/// The single path by which a result leaves the module.
fn finish(host: &mut dyn ModuleHost, envelope: ResultEnvelope) -> io::Result<()> {
    if envelope.failed {
        host.fail(envelope)
    } else {
        host.exit(envelope)
    }
}
