//! Option schemas.
//!
//! A [`ModuleSchema`] describes every option a module accepts. One schema
//! value drives argument validation, protocol gating, deprecation warnings
//! and the diff.

use crate::core::{
    domain::{model::envelope::Warnings, value_object::OntapVersion},
    infrastructure::capability_gate::ProtocolRequirements,
};
use serde_json::{Map, Value, json};

/// Argument types accepted from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    Str,
    Bool,
    Int,
    List,
    Dict,
    /// Accepted as given.
    Raw,
}

impl ArgType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArgType::Str => "str",
            ArgType::Bool => "bool",
            ArgType::Int => "int",
            ArgType::List => "list",
            ArgType::Dict => "dict",
            ArgType::Raw => "raw",
        }
    }
}

/// How current and desired values of an option are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompareKind {
    #[default]
    Plain,
    CaseInsensitive,
    /// `2mb`, `1gb`, ... compared as bytes.
    Size,
    /// Compared in canonical address form.
    IpAddress,
    /// ISO-8601 durations compared as seconds.
    Duration,
    UnorderedList,
    OrderedList,
    /// Mapping compared key by key against its suboptions.
    Nested,
}

/// Schema of one option.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionSpec {
    pub name: String,
    pub arg_type: ArgType,
    /// Element type for lists.
    pub elements: Option<ArgType>,
    pub required: bool,
    pub default: Option<Value>,
    pub choices: Vec<String>,
    pub aliases: Vec<String>,
    pub no_log: bool,
    pub compare: CompareKind,
    /// `Some(replacement)` when deprecated; the replacement may be unknown.
    pub deprecated: Option<Option<String>>,
    pub rest_only: bool,
    pub zapi_only: bool,
    /// Minimum ONTAP version for this option under REST.
    pub min_version: Option<OntapVersion>,
    pub suboptions: Vec<OptionSpec>,
    /// False for options that select or address the resource rather than describe it.
    pub diffable: bool,
}

impl OptionSpec {
    pub fn new(name: impl Into<String>, arg_type: ArgType) -> Self {
        let compare = match arg_type {
            ArgType::List => CompareKind::UnorderedList,
            ArgType::Dict => CompareKind::Nested,
            _ => CompareKind::Plain,
        };
        Self {
            name: name.into(),
            arg_type,
            elements: None,
            required: false,
            default: None,
            choices: Vec::new(),
            aliases: Vec::new(),
            no_log: false,
            compare,
            deprecated: None,
            rest_only: false,
            zapi_only: false,
            min_version: None,
            suboptions: Vec::new(),
            diffable: true,
        }
    }

    pub fn str(name: impl Into<String>) -> Self {
        Self::new(name, ArgType::Str)
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, ArgType::Bool)
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, ArgType::Int)
    }

    pub fn list(name: impl Into<String>, elements: ArgType) -> Self {
        let mut spec = Self::new(name, ArgType::List);
        spec.elements = Some(elements);
        spec
    }

    pub fn dict(name: impl Into<String>, suboptions: Vec<OptionSpec>) -> Self {
        let mut spec = Self::new(name, ArgType::Dict);
        spec.suboptions = suboptions;
        spec
    }

    /// The usual `state: present|absent` option.
    pub fn state() -> Self {
        Self::str("state")
            .choices(&["present", "absent"])
            .default_value(json!("present"))
            .not_diffable()
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn choices(mut self, choices: &[&str]) -> Self {
        self.choices = choices.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn no_log(mut self) -> Self {
        self.no_log = true;
        self
    }

    pub fn compare(mut self, compare: CompareKind) -> Self {
        self.compare = compare;
        self
    }

    pub fn deprecated(mut self, replacement: Option<&str>) -> Self {
        self.deprecated = Some(replacement.map(str::to_string));
        self
    }

    pub fn rest_only(mut self) -> Self {
        self.rest_only = true;
        self
    }

    pub fn zapi_only(mut self) -> Self {
        self.zapi_only = true;
        self
    }

    pub fn min_version(mut self, version: OntapVersion) -> Self {
        self.min_version = Some(version);
        self
    }

    pub fn not_diffable(mut self) -> Self {
        self.diffable = false;
        self
    }

    pub fn suboption(&self, name: &str) -> Option<&OptionSpec> {
        self.suboptions.iter().find(|s| s.name == name)
    }

    /// Matches the canonical name or one of the aliases.
    pub fn answers_to(&self, key: &str) -> bool {
        self.name == key || self.aliases.iter().any(|a| a == key)
    }
}

/// Everything a module declares about its options and protocols.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleSchema {
    pub name: String,
    pub options: Vec<OptionSpec>,
    pub zapi_supported: bool,
    /// Minimum ONTAP version of the REST implementation.
    pub rest_minimum: Option<OntapVersion>,
}

impl ModuleSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: Vec::new(),
            zapi_supported: false,
            rest_minimum: None,
        }
    }

    pub fn option(mut self, spec: OptionSpec) -> Self {
        self.options.push(spec);
        self
    }

    pub fn zapi_supported(mut self, supported: bool) -> Self {
        self.zapi_supported = supported;
        self
    }

    pub fn rest_minimum(mut self, version: OntapVersion) -> Self {
        self.rest_minimum = Some(version);
        self
    }

    pub fn find(&self, name: &str) -> Option<&OptionSpec> {
        self.options.iter().find(|o| o.name == name)
    }

    /// The schema with the connection options appended.
    pub fn with_host_options(&self) -> ModuleSchema {
        let mut full = self.clone();
        full.options.extend(host_argument_spec());
        full
    }

    /// The module's own options from validated params, nulls dropped.
    pub fn desired_state(&self, params: &Map<String, Value>) -> Map<String, Value> {
        self.options
            .iter()
            .filter_map(|spec| {
                params
                    .get(&spec.name)
                    .filter(|v| !v.is_null())
                    .map(|v| (spec.name.clone(), v.clone()))
            })
            .collect()
    }

    /// Protocol needs derived from the options actually set.
    pub fn protocol_requirements(&self, params: &Map<String, Value>) -> ProtocolRequirements {
        let used = |spec: &&OptionSpec| {
            params.get(&spec.name).is_some_and(|v| !v.is_null())
                && spec.default.as_ref() != params.get(&spec.name)
        };
        ProtocolRequirements {
            module: self.name.clone(),
            zapi_supported: self.zapi_supported,
            rest_minimum: self.rest_minimum,
            unsupported_rest_options: self
                .options
                .iter()
                .filter(used)
                .filter(|s| s.zapi_only)
                .map(|s| s.name.clone())
                .collect(),
            rest_only_options: self
                .options
                .iter()
                .filter(used)
                .filter(|s| s.rest_only)
                .map(|s| s.name.clone())
                .collect(),
            partially_supported: self
                .options
                .iter()
                .filter(used)
                .filter_map(|s| s.min_version.map(|v| (s.name.clone(), v)))
                .collect(),
        }
    }

    /// Records one warning per deprecated option present in `params`.
    pub fn deprecation_warnings(&self, params: &Map<String, Value>, warnings: &mut Warnings) {
        for spec in &self.options {
            let Some(replacement) = &spec.deprecated else {
                continue;
            };
            if params.get(&spec.name).is_none_or(Value::is_null) {
                continue;
            }
            let message = match replacement {
                Some(replacement) => format!(
                    "option '{}' is deprecated, use '{}' instead.",
                    spec.name, replacement
                ),
                None => format!("option '{}' is deprecated.", spec.name),
            };
            warnings.push(message);
        }
    }
}

/// The connection options every module accepts.
pub fn host_argument_spec() -> Vec<OptionSpec> {
    vec![
        OptionSpec::str("hostname").required().not_diffable(),
        OptionSpec::str("username").aliases(&["user"]).not_diffable(),
        OptionSpec::str("password")
            .aliases(&["pass"])
            .no_log()
            .not_diffable(),
        OptionSpec::str("cert_path")
            .aliases(&["cert_filepath"])
            .not_diffable(),
        OptionSpec::str("key_path")
            .aliases(&["key_filepath"])
            .not_diffable(),
        OptionSpec::int("http_port").not_diffable(),
        OptionSpec::bool("use_https")
            .aliases(&["https"])
            .default_value(json!(true))
            .not_diffable(),
        OptionSpec::bool("validate_certs")
            .default_value(json!(true))
            .not_diffable(),
        OptionSpec::str("use_rest")
            .choices(&["always", "never", "auto"])
            .compare(CompareKind::CaseInsensitive)
            .default_value(json!("auto"))
            .not_diffable(),
        OptionSpec::int("zapi_version")
            .aliases(&["ontapi"])
            .not_diffable(),
        OptionSpec::dict("feature_flags", Vec::new()).not_diffable(),
        OptionSpec::int("request_timeout").not_diffable(),
        OptionSpec::int("module_timeout").not_diffable(),
        OptionSpec::dict(
            "rate_limit",
            vec![
                OptionSpec::int("requests_per_second").required(),
                OptionSpec::int("burst_size").required(),
            ],
        )
        .not_diffable(),
    ]
}
