#![cfg(feature = "test-support")]
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use contract_case_connector::protocol::FailureKind;
use contract_case_connector::{EngineConfig, EngineProcess, ExampleDefinition, StateDefinition};
use serde_json::{json, Value};

pub fn fake_engine_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_fake_engine") {
        return PathBuf::from(path);
    }

    // Fallback to the workspace target directory.
    let mut path = std::env::current_exe().expect("current exe");
    path.pop(); // deps
    path.pop(); // debug or release
    path.push("fake_engine");
    if cfg!(windows) {
        path.set_extension("exe");
    }
    path
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("contract_case=debug")),
        )
        .with_test_writer()
        .try_init();
}

pub fn fake_engine_config() -> EngineConfig {
    EngineConfig::new(fake_engine_path())
}

pub fn shared_engine() -> Arc<EngineProcess> {
    shared_engine_with(fake_engine_config())
}

pub fn shared_engine_with(config: EngineConfig) -> Arc<EngineProcess> {
    init_tracing();
    Arc::new(EngineProcess::new(config))
}

fn http_mock(extra: Value) -> Value {
    let mut mock = json!({
        "_case:mock:type": "ConsumeHttpResponse",
        "request": { "method": "GET", "path": "/users/1" },
        "response": { "status": 200 }
    });
    if let (Some(target), Some(extra)) = (mock.as_object_mut(), extra.as_object()) {
        for (key, value) in extra {
            target.insert(key.clone(), value.clone());
        }
    }
    mock
}

/// Example the fake engine accepts.
pub fn passing_example() -> ExampleDefinition {
    ExampleDefinition::new(
        vec![StateDefinition::new("user 1 exists").with_variable("userId", "1")],
        http_mock(json!({})),
    )
}

/// Example the fake engine reports as the given failure.
pub fn failing_example(kind: &str, message: &str, location: Option<&str>) -> ExampleDefinition {
    ExampleDefinition::from_mock(http_mock(json!({
        "_fake:failure": { "kind": kind, "message": message, "location": location }
    })))
}

pub fn assertion_failure(message: &str) -> ExampleDefinition {
    failing_example(FailureKind::FAILED_ASSERTION, message, Some("[root].response.status"))
}

/// Example whose reply is not a valid envelope.
pub fn malformed_reply_example() -> ExampleDefinition {
    ExampleDefinition::from_mock(http_mock(json!({ "_fake:malformed": true })))
}

/// Example that makes the engine hang up without replying.
pub fn disconnect_example() -> ExampleDefinition {
    ExampleDefinition::from_mock(http_mock(json!({ "_fake:disconnect": true })))
}

/// Example whose reply announces a frame past the size limit, followed by an
/// unsolicited answer to the next request.
pub fn oversized_reply_example() -> ExampleDefinition {
    ExampleDefinition::from_mock(http_mock(json!({ "_fake:oversized": true })))
}
