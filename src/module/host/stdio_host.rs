//! [`ModuleHost`] over a JSON input document and a writer.

use super::ModuleHost;
use crate::core::domain::{
    error::{OntapError, OntapResult},
    model::envelope::{ResultEnvelope, Warnings},
    value_object::serde_helpers::loose_bool,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::io::{self, Read, Write};

#[derive(Debug, Deserialize)]
struct InputDocument {
    #[serde(alias = "ANSIBLE_MODULE_ARGS")]
    params: Map<String, Value>,
    #[serde(
        default,
        alias = "_ansible_check_mode",
        deserialize_with = "loose_bool::deserialize"
    )]
    check_mode: bool,
}

/// Reads `{"params": {...}, "check_mode": bool}` and writes one JSON envelope.
#[derive(Debug)]
pub struct StdioHost<W: Write> {
    params: Map<String, Value>,
    check_mode: bool,
    warnings: Warnings,
    output: W,
    finished: bool,
}

impl<W: Write> StdioHost<W> {
    pub fn new(params: Map<String, Value>, check_mode: bool, output: W) -> Self {
        Self {
            params,
            check_mode,
            warnings: Warnings::new(),
            output,
            finished: false,
        }
    }

    /// Parses the input document from `input`.
    ///
    /// # Errors
    /// Returns a `config` kind error if the input is not a valid document.
    pub fn from_reader<R: Read>(mut input: R, output: W) -> OntapResult<Self> {
        let mut text = String::new();
        input
            .read_to_string(&mut text)
            .map_err(|e| OntapError::config(format!("Error: cannot read module input: {e}")))?;
        let document: InputDocument = serde_json::from_str(&text)
            .map_err(|e| OntapError::config(format!("Error: invalid module input: {e}")))?;
        Ok(Self::new(document.params, document.check_mode, output))
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn emit(&mut self, mut result: ResultEnvelope) -> io::Result<()> {
        if self.finished {
            return Err(io::Error::other("module result already emitted"));
        }
        let mut warnings = Warnings::new();
        for msg in result.warnings.drain(..) {
            warnings.push(msg);
        }
        warnings.extend(std::mem::take(&mut self.warnings));
        result.warnings = warnings.into_vec();

        serde_json::to_writer(&mut self.output, &result)?;
        self.output.write_all(b"\n")?;
        self.output.flush()?;
        self.finished = true;
        Ok(())
    }
}

impl<W: Write> ModuleHost for StdioHost<W> {
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
