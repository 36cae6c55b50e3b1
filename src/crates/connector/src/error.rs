use std::io;
use std::net::SocketAddr;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

/// Result alias for caller-facing operations.
pub type CaseResult<T> = Result<T, ContractCaseError>;

/// Result alias for engine process and transport operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced to callers of the binding.
///
/// The first three variants are the engine-mediated taxonomy. `Crash` is the
/// normalized form of anything else that went wrong along the way.
#[derive(Debug, Error)]
pub enum ContractCaseError {
    /// The caller or engine setup is invalid. Not a test failure.
    #[error("{message}")]
    Configuration {
        message: String,
        location: Option<String>,
    },
    /// Internal or protocol-level fault in the engine or connector.
    #[error("{message}")]
    Core {
        message: String,
        location: Option<String>,
    },
    /// The contract assertion itself failed.
    #[error("{message}")]
    ExpectationsNotMet {
        message: String,
        location: Option<String>,
    },
    #[error("ContractCase crashed: {message}")]
    Crash {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },
}

impl ContractCaseError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        ContractCaseError::Configuration {
            message: message.into(),
            location: None,
        }
    }

    pub(crate) fn core(message: impl Into<String>) -> Self {
        ContractCaseError::Core {
            message: message.into(),
            location: None,
        }
    }

    /// Human-readable message as reported by the engine (or the binding).
    pub fn message(&self) -> &str {
        match self {
            ContractCaseError::Configuration { message, .. }
            | ContractCaseError::Core { message, .. }
            | ContractCaseError::ExpectationsNotMet { message, .. }
            | ContractCaseError::Crash { message, .. } => message,
        }
    }

    /// Source location reported alongside the failure, if any.
    pub fn location(&self) -> Option<&str> {
        match self {
            ContractCaseError::Configuration { location, .. }
            | ContractCaseError::Core { location, .. }
            | ContractCaseError::ExpectationsNotMet { location, .. } => location.as_deref(),
            ContractCaseError::Crash { .. } => None,
        }
    }

    /// True for the "red test" outcome that runners should report as an assertion failure.
    pub fn is_expectations_not_met(&self) -> bool {
        matches!(self, ContractCaseError::ExpectationsNotMet { .. })
    }
}

/// Errors that can occur while launching, attaching to, or talking to the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to spawn engine: {0}")]
    Start(String),
    #[error("engine terminated early with status {0}")]
    Exited(ExitStatus),
    #[error("failed to parse listen address from output: {0}")]
    ListenParse(String),
    #[error("engine did not report a listen address within {0:?}")]
    StartupTimeout(Duration),
    #[error("unable to attach to engine at {address}: {source}")]
    Attach {
        address: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("frame of {size} bytes exceeds the {limit} byte limit")]
    FrameTooLarge { size: usize, limit: usize },
    #[error("response id {received} does not match request id {expected}")]
    ResponseMismatch { expected: u64, received: u64 },
    #[error("malformed result envelope: {0}")]
    MalformedEnvelope(String),
    #[error("engine connection closed")]
    ConnectionClosed,
}

impl EngineError {
    pub(crate) fn start(err: impl Into<String>) -> Self {
        EngineError::Start(err.into())
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        EngineError::MalformedEnvelope(message.into())
    }

    /// Launch and attach failures are configuration-class problems, not crashes.
    pub fn is_launch_failure(&self) -> bool {
        matches!(
            self,
            EngineError::Start(_)
                | EngineError::Exited(_)
                | EngineError::ListenParse(_)
                | EngineError::StartupTimeout(_)
                | EngineError::Attach { .. }
        )
    }
}
