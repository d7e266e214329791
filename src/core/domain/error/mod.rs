use std::fmt;
use thiserror::Error;

/// The main error type for ONTAP client and module operations.
///
/// Every variant maps onto one stable [`ErrorKind`]; callers that need to
/// branch on failure class should match on [`OntapError::kind`] rather than on
/// the variant, because errors are routinely wrapped in [`OntapError::Context`]
/// as they travel up through the layers.
#[derive(Error, Debug)]
pub enum OntapError {
    /// Invalid or missing option, or an incompatible combination of options.
    ///
    /// # Fields
    /// * `0` - A complete, user-facing message
    #[error("{0}")]
    Config(String),

    /// Represents validation failures of a single value or argument
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Connect, TLS, timeout and decode faults raised by the transport
    #[error("{0}")]
    Transport(#[from] TransportError),

    /// A non-2xx HTTP answer that did not carry an ONTAP error envelope
    ///
    /// # Fields
    /// * `status` - The HTTP status code
    /// * `body` - The (possibly truncated) response body
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// A structured REST error `{"error": {"code", "message", "target"}}`
    #[error("{message} (code: {code}{})", fmt_target(.target))]
    Api {
        code: String,
        message: String,
        target: Option<String>,
    },

    /// A ZAPI `results` element with `status="failed"`
    #[error("NetApp API failed. Reason - {errno}:{reason}")]
    Zapi { errno: i64, reason: String },

    /// A REST job that reached the `failure` state
    #[error("job {uuid} reported error: {message} (code: {code})")]
    Job {
        uuid: String,
        code: i64,
        message: String,
    },

    /// A REST job still not in a terminal state once the job timeout elapsed
    #[error("Timeout error: job {uuid} still {state}")]
    JobTimeout { uuid: String, state: String },

    /// The response does not match the records or job contract
    #[error("{0}")]
    UnexpectedShape(String),

    /// Tags an error with the endpoint that produced it
    #[error("calling: {endpoint}: got {source}.")]
    Context {
        endpoint: String,
        source: Box<OntapError>,
    },
}

fn fmt_target(target: &Option<String>) -> String {
    target
        .as_deref()
        .map(|t| format!(", target: {t}"))
        .unwrap_or_default()
}

/// Stable error kinds, independent of the concrete variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Config,
    Transport,
    Http,
    Api,
    Job,
    UnexpectedShape,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Config => "config",
            ErrorKind::Transport => "transport",
            ErrorKind::Http => "http",
            ErrorKind::Api => "api",
            ErrorKind::Job => "job",
            ErrorKind::UnexpectedShape => "unexpected_shape",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl OntapError {
    /// Returns the stable kind of this error, looking through context wrappers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            OntapError::Config(_) | OntapError::Validation(_) => ErrorKind::Config,
            OntapError::Transport(_) => ErrorKind::Transport,
            OntapError::Http { .. } => ErrorKind::Http,
            OntapError::Api { .. } | OntapError::Zapi { .. } => ErrorKind::Api,
            OntapError::Job { .. } | OntapError::JobTimeout { .. } => ErrorKind::Job,
            OntapError::UnexpectedShape(_) => ErrorKind::UnexpectedShape,
            OntapError::Context { source, .. } => source.kind(),
        }
    }

    /// Tags the error with the failing endpoint.
    ///
    /// Wrapping twice with the same endpoint is a no-op, so helpers can tag
    /// unconditionally.
    pub fn context(self, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        if let OntapError::Context {
            endpoint: existing, ..
        } = &self
        {
            if *existing == endpoint {
                return self;
            }
        }
        OntapError::Context {
            endpoint,
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, without any context wrappers.
    pub fn root(&self) -> &OntapError {
        match self {
            OntapError::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// True for failures that may go away on their own: transport faults and
    /// server-side 5xx answers.
    pub fn is_transient(&self) -> bool {
        match self.root() {
            OntapError::Transport(_) => true,
            OntapError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        OntapError::Config(message.into())
    }
}

/// Specialized error type for validation failures.
///
/// This enum provides detailed context about why a validation
/// failed, including field-specific errors and format violations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Represents a validation failure for a specific field
    ///
    /// # Fields
    /// * `field` - The name of the field that failed validation
    /// * `message` - A detailed message about why validation failed
    #[error("Field '{field}' validation failed: {message}")]
    Field { field: String, message: String },

    /// Represents format/syntax validation failures
    ///
    /// # Fields
    /// * `0` - Description of the format violation
    #[error("Format error: {0}")]
    Format(String),

    /// Represents violations of domain constraints
    ///
    /// # Fields
    /// * `0` - Description of the constraint violation
    #[error("Domain constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Failure classes surfaced by the transport layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorClass {
    Connect,
    Tls,
    Timeout,
    Http4xx,
    Http5xx,
    Decode,
}

impl fmt::Display for TransportErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportErrorClass::Connect => "connect",
            TransportErrorClass::Tls => "tls",
            TransportErrorClass::Timeout => "timeout",
            TransportErrorClass::Http4xx => "http-4xx",
            TransportErrorClass::Http5xx => "http-5xx",
            TransportErrorClass::Decode => "decode",
        };
        f.write_str(name)
    }
}

/// An error raised while executing a single HTTP exchange.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{class} error: {message}")]
pub struct TransportError {
    pub class: TransportErrorClass,
    pub message: String,
}

impl TransportError {
    pub fn new(class: TransportErrorClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
        }
    }
}

/// Type alias for Results that may fail with an OntapError
pub type OntapResult<T> = Result<T, OntapError>;
