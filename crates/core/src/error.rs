//! Error types for routir.

use thiserror::Error;

use crate::types::Role;

/// Result type alias using routir's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for routir.
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Construction
    // =========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // =========================================================================
    // Routing
    // =========================================================================
    #[error("Service `{name}` is not registered for role `{role}`")]
    ServiceNotFound { name: String, role: Role },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Length of `{field}` ({actual}) does not match the number of queries ({expected})")]
    LengthMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },

    // =========================================================================
    // Processor lifecycle and execution
    // =========================================================================
    #[error("Processor `{0}` is not running")]
    ProcessorNotRunning(String),

    #[error("Processor `{0}` is already running")]
    ProcessorAlreadyRunning(String),

    #[error("Batch execution failed: {0}")]
    BatchExecution(String),

    #[error("Operation not supported: {0}")]
    Unsupported(String),

    // =========================================================================
    // Relay
    // =========================================================================
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Transport error: {0}")]
    Transport(String),

    // =========================================================================
    // Cache
    // =========================================================================
    #[error("Cache error: {0}")]
    Cache(String),

    // =========================================================================
    // Generic Errors
    // =========================================================================
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a not-found error for a (service, role) lookup.
    pub fn service_not_found(name: impl Into<String>, role: Role) -> Self {
        Self::ServiceNotFound {
            name: name.into(),
            role,
        }
    }

    /// Create an invalid request error.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a length mismatch error for a parallel batch argument.
    pub fn length_mismatch(field: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::LengthMismatch {
            field: field.into(),
            expected,
            actual,
        }
    }

    /// Create a batch execution error.
    pub fn batch_execution(msg: impl Into<String>) -> Self {
        Self::BatchExecution(msg.into())
    }

    /// Create a protocol violation error.
    pub fn protocol_violation(msg: impl Into<String>) -> Self {
        Self::ProtocolViolation(msg.into())
    }

    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a cache error.
    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    /// Create an unsupported-operation error.
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// The error handed to each caller of a batch that failed as a whole.
    ///
    /// Routing and validation errors keep their kind, so a caller still sees
    /// a missing service or a bad argument as such. Anything else is an engine
    /// failure and becomes `BatchExecution` with the same message.
    pub fn for_batch_caller(&self) -> Self {
        match self {
            Self::ServiceNotFound { name, role } => Self::service_not_found(name.clone(), *role),
            Self::InvalidRequest(msg) => Self::invalid_request(msg.clone()),
            Self::LengthMismatch {
                field,
                expected,
                actual,
            } => Self::length_mismatch(field.clone(), *expected, *actual),
            Self::ProcessorNotRunning(name) => Self::ProcessorNotRunning(name.clone()),
            Self::Unsupported(msg) => Self::unsupported(msg.clone()),
            Self::BatchExecution(msg) => Self::batch_execution(msg.clone()),
            other => Self::batch_execution(other.to_string()),
        }
    }

    /// Stable machine-readable code, used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::ServiceNotFound { .. } => "SERVICE_NOT_FOUND",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::LengthMismatch { .. } => "LENGTH_MISMATCH",
            Self::ProcessorNotRunning(_) => "PROCESSOR_NOT_RUNNING",
            Self::ProcessorAlreadyRunning(_) => "PROCESSOR_ALREADY_RUNNING",
            Self::BatchExecution(_) => "BATCH_EXECUTION_ERROR",
            Self::Unsupported(_) => "UNSUPPORTED",
            Self::ProtocolViolation(_) => "PROTOCOL_VIOLATION",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Cache(_) => "CACHE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Internal(_) | Self::Other(_) => "INTERNAL_ERROR",
        }
    }
}
