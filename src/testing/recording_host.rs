use crate::core::domain::model::envelope::{ResultEnvelope, Warnings};
use crate::module::host::ModuleHost;
use serde_json::{Map, Value};
use std::io;

/// A [`ModuleHost`] that keeps the emitted envelope for inspection.
#[derive(Debug, Default)]
pub struct RecordingHost {
    params: Map<String, Value>,
    check_mode: bool,
    warnings: Warnings,
    result: Option<ResultEnvelope>,
}

impl RecordingHost {
    pub fn new(params: Map<String, Value>, check_mode: bool) -> Self {
        Self {
            params,
            check_mode,
            ..Default::default()
        }
    }

    /// The emitted envelope, host warnings included.
    pub fn result(&self) -> Option<&ResultEnvelope> {
        self.result.as_ref()
    }

    fn emit(&mut self, mut result: ResultEnvelope) -> io::Result<()> {
        if self.result.is_some() {
            return Err(io::Error::other("module result already emitted"));
        }
        let mut warnings = Warnings::new();
        for msg in result.warnings.drain(..) {
            warnings.push(msg);
        }
        warnings.extend(std::mem::take(&mut self.warnings));
        result.warnings = warnings.into_vec();
        self.result = Some(result);
        Ok(())
    }
}

impl ModuleHost for RecordingHost {
    fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    fn check_mode(&self) -> bool {
        self.check_mode
    }

    fn warn(&mut self, msg: &str) {
        self.warnings.push(msg);
    }

    fn exit(&mut self, result: ResultEnvelope) -> io::Result<()> {
        self.emit(result)
    }

    fn fail(&mut self, mut result: ResultEnvelope) -> io::Result<()> {
        result.failed = true;
        self.emit(result)
    }
}
