//! Bramble error handling.
//!
//! Every failure mode of the framework is a variant of [`BrambleError`]. Variants
//! carry a stable `miette` diagnostic code so the CLI can render them with help
//! text. A failed assertion is *not* an error: it is an
//! [`AssertionResult`](crate::assertions::AssertionResult) with
//! `succeeded == false`. `AssertionFailed` exists only for callers that choose to
//! turn such a result into an early return.

use miette::Diagnostic;
use thiserror::Error;

pub type Result<T, E = BrambleError> = std::result::Result<T, E>;

/// Error classification used by reporters and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Authoring mistakes in a declaration.
    Authoring,
    /// Misuse of the operator registry.
    Registry,
    /// Tree shape changed between Discovery and Run.
    Consistency,
    /// Failure raised while executing a body.
    Execution,
    /// Configuration or environment problems.
    Environment,
}

#[derive(Debug, Error, Diagnostic)]
pub enum BrambleError {
    #[error("declaration '{name}' (line {line}) has no body")]
    #[diagnostic(
        code(bramble::missing_body),
        help("pass a body closure to the declaration")
    )]
    MissingBody { name: String, line: u32 },

    #[error("declaration at line {line} has a multi-line name and no body: {name:?}")]
    #[diagnostic(
        code(bramble::malformed_name),
        help("the body was probably written on the line after the name; keep the name and body together")
    )]
    MalformedName { name: String, line: u32 },

    #[error("declaration at line {line} has an empty name")]
    #[diagnostic(code(bramble::empty_name))]
    EmptyName { line: u32 },

    #[error("operator '{name}' is already registered")]
    #[diagnostic(
        code(bramble::duplicate_operator),
        help("operator names are case-insensitive; pick a distinct name")
    )]
    DuplicateOperator { name: String },

    #[error("unknown assertion operator '{name}'")]
    #[diagnostic(code(bramble::unknown_operator))]
    UnknownOperator { name: String },

    #[error("operator '{name}' cannot be negated")]
    #[diagnostic(code(bramble::non_negatable_operator))]
    NonNegatableOperator { name: String },

    #[error("operator '{name}' cannot be registered: the registry is sealed once a suite starts")]
    #[diagnostic(
        code(bramble::registry_locked),
        help("register extension operators before running any suite")
    )]
    RegistryLocked { name: String },

    #[error("discovery/run divergence in suite '{suite}': {detail}")]
    #[diagnostic(
        code(bramble::discovery_run_divergence),
        help("declarations must produce the same blocks, in the same order, on every pass")
    )]
    DiscoveryRunDivergence { suite: String, detail: String },

    #[error("{message}")]
    #[diagnostic(code(bramble::assertion_failed))]
    AssertionFailed { message: String },

    #[error("{message}")]
    #[diagnostic(code(bramble::fault))]
    Fault { message: String },

    #[error("configuration error: {message}")]
    #[diagnostic(code(bramble::config))]
    Config { message: String },

    #[error("I/O error: {0}")]
    #[diagnostic(code(bramble::io))]
    Io(#[from] std::io::Error),
}

impl BrambleError {
    /// Builds a `Fault` from any displayable message.
    pub fn fault(message: impl Into<String>) -> Self {
        BrambleError::Fault {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingBody { .. } | Self::MalformedName { .. } | Self::EmptyName { .. } => {
                ErrorCategory::Authoring
            }
            Self::DuplicateOperator { .. }
            | Self::UnknownOperator { .. }
            | Self::NonNegatableOperator { .. }
            | Self::RegistryLocked { .. } => ErrorCategory::Registry,
            Self::DiscoveryRunDivergence { .. } => ErrorCategory::Consistency,
            Self::AssertionFailed { .. } | Self::Fault { .. } => ErrorCategory::Execution,
            Self::Config { .. } | Self::Io(_) => ErrorCategory::Environment,
        }
    }

    pub fn is_divergence(&self) -> bool {
        matches!(self, Self::DiscoveryRunDivergence { .. })
    }
}

impl From<serde_yaml::Error> for BrambleError {
    fn from(e: serde_yaml::Error) -> Self {
        BrambleError::Config {
            message: e.to_string(),
        }
    }
}

/// Converts a panic payload captured by `catch_unwind` into a `Fault`.
pub(crate) fn panic_to_fault(payload: Box<dyn std::any::Any + Send>) -> BrambleError {
    let message = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "body panicked".to_string()
    };
    BrambleError::fault(format!("panic: {}", message))
}
