//! Last-resort normalization for faults raised between request construction
//! and result mapping.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;
use tracing::error;

use crate::error::{CaseResult, ContractCaseError, EngineError};

/// Anything the connector chain can fail with before normalization.
#[derive(Debug)]
pub enum BoundaryFault {
    /// Already classified; passed through untouched.
    Case(ContractCaseError),
    /// Process or transport fault.
    Engine(EngineError),
}

impl From<ContractCaseError> for BoundaryFault {
    fn from(err: ContractCaseError) -> Self {
        BoundaryFault::Case(err)
    }
}

impl From<EngineError> for BoundaryFault {
    fn from(err: EngineError) -> Self {
        BoundaryFault::Engine(err)
    }
}

impl From<serde_json::Error> for BoundaryFault {
    fn from(err: serde_json::Error) -> Self {
        BoundaryFault::Engine(EngineError::Codec(err))
    }
}

/// Panic captured while running a guarded operation.
#[derive(Debug, Error)]
#[error("panicked: {0}")]
pub struct PanicError(pub String);

/// Run `operation` and guarantee the outcome is one of the typed errors.
pub fn guard<T>(
    operation: &str,
    body: impl FnOnce() -> Result<T, BoundaryFault>,
) -> CaseResult<T> {
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(fault)) => Err(handle(operation, fault)),
        Err(payload) => Err(crash(
            operation,
            Box::new(PanicError(panic_message(payload.as_ref()))),
        )),
    }
}

/// Normalize a fault into the caller-facing taxonomy.
pub fn handle(operation: &str, fault: BoundaryFault) -> ContractCaseError {
    match fault {
        BoundaryFault::Case(err) => err,
        BoundaryFault::Engine(err) if err.is_launch_failure() => {
            error!(
                target: "contract_case::crash",
                operation,
                error = %err,
                "engine could not be started"
            );
            ContractCaseError::Configuration {
                message: format!("unable to start the ContractCase engine: {err}"),
                location: None,
            }
        }
        BoundaryFault::Engine(err) => crash(operation, Box::new(err)),
    }
}

fn crash(
    operation: &str,
    source: Box<dyn std::error::Error + Send + Sync + 'static>,
) -> ContractCaseError {
    error!(target: "contract_case::crash", operation, error = %source, "connector crashed");
    ContractCaseError::Crash {
        message: format!("{operation} failed unexpectedly: {source}"),
        source: Some(source),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
