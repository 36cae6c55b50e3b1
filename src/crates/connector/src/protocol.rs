//! Wire types exchanged with the engine and the length-prefixed JSON framing
//! that carries them.

use std::io::{self, Read, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EngineError, EngineResult};

/// Largest frame either side will accept.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Transport-neutral configuration shape understood by the engine.
///
/// Unset options are omitted so that the engine falls back to its defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireConfig {
    pub test_run_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overwrite_file: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub print_results: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub throw_on_fail: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broker_base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broker_ci_access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broker_basic_auth: Option<WireBasicAuth>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url_under_test: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireBasicAuth {
    pub username: String,
    pub password: String,
}

/// Operation requested of the engine. Call polarity is part of the operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectorRequest {
    #[serde(rename_all = "camelCase")]
    BeginDefinition {
        config: WireConfig,
        caller_versions: Vec<String>,
    },
    RunExample {
        example: Value,
        config: WireConfig,
    },
    RunRejectingExample {
        example: Value,
        config: WireConfig,
    },
    EndRecord,
    #[serde(rename_all = "camelCase")]
    BeginVerification {
        config: WireConfig,
        caller_versions: Vec<String>,
    },
    AvailableContractDescriptions,
    RunVerification {
        config: WireConfig,
    },
    Shutdown,
}

impl ConnectorRequest {
    /// Short operation name used in logs.
    pub fn operation(&self) -> &'static str {
        match self {
            ConnectorRequest::BeginDefinition { .. } => "beginDefinition",
            ConnectorRequest::RunExample { .. } => "runExample",
            ConnectorRequest::RunRejectingExample { .. } => "runRejectingExample",
            ConnectorRequest::EndRecord => "endRecord",
            ConnectorRequest::BeginVerification { .. } => "beginVerification",
            ConnectorRequest::AvailableContractDescriptions => "availableContractDescriptions",
            ConnectorRequest::RunVerification { .. } => "runVerification",
            ConnectorRequest::Shutdown => "shutdown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub id: u64,
    pub request: ConnectorRequest,
}

/// Result envelope returned by the engine for one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "resultType")]
pub enum ConnectorResult {
    Success,
    SuccessWithAny {
        payload: Value,
    },
    Failure {
        kind: String,
        message: String,
        #[serde(default)]
        location: Option<String>,
    },
}

impl ConnectorResult {
    pub fn failure(
        kind: impl Into<String>,
        message: impl Into<String>,
        location: Option<String>,
    ) -> Self {
        ConnectorResult::Failure {
            kind: kind.into(),
            message: message.into(),
            location,
        }
    }

    /// Reject envelopes that break the failure invariant.
    pub fn validate(self) -> EngineResult<Self> {
        if let ConnectorResult::Failure { kind, message, .. } = &self {
            if message.is_empty() {
                return Err(EngineError::malformed(format!(
                    "failure of kind '{kind}' carried no message"
                )));
            }
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub id: u64,
    pub result: ConnectorResult,
}

/// Engine failure classification decoded from the wire `kind` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    Broker,
    Configuration,
    Trigger,
    Core,
    FailedAssertion,
    VerifyReturn,
    Unrecognized(String),
}

impl FailureKind {
    pub const BROKER: &'static str = "CaseBrokerError";
    pub const CONFIGURATION: &'static str = "CaseConfigurationError";
    pub const TRIGGER: &'static str = "CaseTriggerError";
    pub const CORE: &'static str = "CaseCoreError";
    pub const FAILED_ASSERTION: &'static str = "CaseFailedAssertionError";
    pub const VERIFY_RETURN: &'static str = "CaseVerifyReturnError";

    /// Decode a kind string, ignoring case and `-`/`_` separators.
    ///
    /// Never fails: anything unknown keeps its raw text in `Unrecognized`.
    pub fn decode(raw: &str) -> Self {
        let normalized: String = raw
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();

        match normalized.as_str() {
            "casebrokererror" => FailureKind::Broker,
            "caseconfigurationerror" => FailureKind::Configuration,
            "casetriggererror" => FailureKind::Trigger,
            "casecoreerror" => FailureKind::Core,
            "casefailedassertionerror" => FailureKind::FailedAssertion,
            "caseverifyreturnerror" => FailureKind::VerifyReturn,
            _ => FailureKind::Unrecognized(raw.to_string()),
        }
    }

    /// Canonical wire spelling (or the raw text for unrecognized kinds).
    pub fn as_str(&self) -> &str {
        match self {
            FailureKind::Broker => Self::BROKER,
            FailureKind::Configuration => Self::CONFIGURATION,
            FailureKind::Trigger => Self::TRIGGER,
            FailureKind::Core => Self::CORE,
            FailureKind::FailedAssertion => Self::FAILED_ASSERTION,
            FailureKind::VerifyReturn => Self::VERIFY_RETURN,
            FailureKind::Unrecognized(raw) => raw,
        }
    }
}

/// Serialize `payload` as JSON and write it with a big-endian length prefix.
pub fn write_message<W: Write, T: Serialize>(writer: &mut W, payload: &T) -> EngineResult<()> {
    let bytes = serde_json::to_vec(payload)?;
    write_frame(writer, &bytes)
}

/// Read one length-prefixed frame and decode its JSON body.
pub fn read_message<R: Read, T: DeserializeOwned>(reader: &mut R) -> EngineResult<T> {
    let frame = read_frame(reader)?;
    Ok(serde_json::from_slice(&frame)?)
}

pub fn write_frame<W: Write>(writer: &mut W, frame: &[u8]) -> EngineResult<()> {
    if frame.len() > MAX_FRAME_LEN {
        return Err(EngineError::FrameTooLarge {
            size: frame.len(),
            limit: MAX_FRAME_LEN,
        });
    }
    let len = frame.len() as u32;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(frame)?;
    writer.flush()?;
    Ok(())
}

pub fn read_frame<R: Read>(reader: &mut R) -> EngineResult<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).map_err(closed_on_eof)?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        return Err(EngineError::FrameTooLarge {
            size: len,
            limit: MAX_FRAME_LEN,
        });
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).map_err(closed_on_eof)?;
    Ok(buf)
}

fn closed_on_eof(err: io::Error) -> EngineError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        EngineError::ConnectionClosed
    } else {
        EngineError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use serde_json::json;

    use super::*;

    #[test]
    fn failure_envelope_uses_result_type_tag() {
        let envelope: ResponseEnvelope = serde_json::from_value(json!({
            "id": 7,
            "result": {
                "resultType": "Failure",
                "kind": "CaseCoreError",
                "message": "boom"
            }
        }))
        .expect("envelope should decode");

        assert_eq!(envelope.id, 7);
        assert_eq!(
            envelope.result,
            ConnectorResult::failure("CaseCoreError", "boom", None)
        );
    }

    #[test]
    fn requests_are_tagged_by_operation() {
        let value = serde_json::to_value(ConnectorRequest::BeginDefinition {
            config: WireConfig {
                test_run_id: "RUST".to_string(),
                ..WireConfig::default()
            },
            caller_versions: vec!["0.1.0".to_string()],
        })
        .expect("request should encode");

        assert_eq!(
            value,
            json!({
                "beginDefinition": {
                    "config": { "testRunId": "RUST" },
                    "callerVersions": ["0.1.0"]
                }
            })
        );
        assert_eq!(
            serde_json::to_value(ConnectorRequest::EndRecord).expect("encode"),
            json!("endRecord")
        );
    }

    #[test]
    fn truncated_frame_reports_closed_connection() {
        let mut cursor = Cursor::new(vec![0, 0, 0, 9, b'{']);
        let err = read_frame(&mut cursor).expect_err("frame is short");
        assert!(matches!(err, EngineError::ConnectionClosed));
    }

    #[test]
    fn oversized_length_prefix_is_rejected() {
        let len = (MAX_FRAME_LEN as u32 + 1).to_be_bytes();
        let mut cursor = Cursor::new(len.to_vec());
        let err = read_frame(&mut cursor).expect_err("frame is too large");
        assert!(matches!(err, EngineError::FrameTooLarge { .. }));
    }

    #[test]
    fn empty_failure_message_is_malformed() {
        let err = ConnectorResult::failure("CaseCoreError", "", None)
            .validate()
            .expect_err("message is required");
        assert!(matches!(err, EngineError::MalformedEnvelope(_)));
    }
}
