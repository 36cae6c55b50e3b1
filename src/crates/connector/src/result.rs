//! Classification of engine result envelopes into caller-facing errors.

use serde_json::Value;

use crate::error::{CaseResult, ContractCaseError};
use crate::protocol::{ConnectorResult, FailureKind};
use crate::version::BoundaryVersions;

/// Map a result where the caller only cares about success or failure.
pub fn map_void(result: ConnectorResult) -> CaseResult<()> {
    match result {
        ConnectorResult::Success | ConnectorResult::SuccessWithAny { .. } => Ok(()),
        ConnectorResult::Failure {
            kind,
            message,
            location,
        } => Err(map_failure(&kind, message, location)),
    }
}

/// Map a result whose success carries a payload the caller needs.
pub fn map_payload(result: ConnectorResult) -> CaseResult<Value> {
    match result {
        ConnectorResult::SuccessWithAny { payload } => Ok(payload),
        ConnectorResult::Success => Err(ContractCaseError::core(
            "engine reported success without the payload this operation returns",
        )),
        ConnectorResult::Failure {
            kind,
            message,
            location,
        } => Err(map_failure(&kind, message, location)),
    }
}

/// Map the result of a begin request and check the engine's version choice.
///
/// Returns the selected version when the engine reported one.
pub fn map_begin(
    result: ConnectorResult,
    versions: &BoundaryVersions,
) -> CaseResult<Option<String>> {
    let payload = match result {
        ConnectorResult::Success => return Ok(None),
        other => map_payload(other)?,
    };

    let Some(selected) = payload.get("selectedVersion").and_then(Value::as_str) else {
        return Ok(None);
    };
    if versions.supports(selected) {
        Ok(Some(selected.to_string()))
    } else {
        Err(ContractCaseError::core(format!(
            "engine selected boundary version {selected}, but this binding only speaks {:?}",
            versions.as_slice()
        )))
    }
}

/// Build the typed error for a failure envelope. Total over every kind string.
pub fn map_failure(kind: &str, message: String, location: Option<String>) -> ContractCaseError {
    match FailureKind::decode(kind) {
        FailureKind::Broker | FailureKind::Configuration | FailureKind::Trigger => {
            ContractCaseError::Configuration { message, location }
        }
        FailureKind::Core => ContractCaseError::Core { message, location },
        FailureKind::FailedAssertion | FailureKind::VerifyReturn => {
            ContractCaseError::ExpectationsNotMet { message, location }
        }
        FailureKind::Unrecognized(raw) => ContractCaseError::Core {
            message: format!("Unhandled error kind ({raw}): {message}"),
            location,
        },
    }
}
