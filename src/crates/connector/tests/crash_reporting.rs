use std::error::Error as _;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use contract_case_connector::crash::{guard, BoundaryFault, PanicError};
use contract_case_connector::{ContractCaseError, EngineError};

#[test]
fn values_pass_through() {
    let value = guard("noop", || Ok::<_, BoundaryFault>(42)).expect("no fault");
    assert_eq!(value, 42);
}

#[test]
fn typed_errors_are_not_rewrapped() {
    let err = guard::<()>("runExample", || {
        Err(ContractCaseError::ExpectationsNotMet {
            message: "expected 3 got 4".to_string(),
            location: Some("[root]".to_string()),
        }
        .into())
    })
    .expect_err("fault expected");

    assert!(err.is_expectations_not_met());
    assert_eq!(err.location(), Some("[root]"));
}

#[test]
fn transport_faults_become_crashes_with_cause() {
    let err = guard::<()>("runExample", || Err(EngineError::ConnectionClosed.into()))
        .expect_err("fault expected");

    match &err {
        ContractCaseError::Crash { message, .. } => {
            assert!(message.contains("runExample"), "{message}");
        }
        other => panic!("expected a crash, got {other:?}"),
    }
    let source = err.source().expect("cause should be preserved");
    assert!(source.downcast_ref::<EngineError>().is_some());
}

#[test]
fn malformed_json_becomes_a_crash() {
    let err = guard::<serde_json::Value>("decode", || {
        Ok(serde_json::from_str("{not json")?)
    })
    .expect_err("fault expected");
    assert!(matches!(err, ContractCaseError::Crash { .. }));
}

#[test]
fn launch_failures_are_configuration_errors() {
    let err = guard::<()>("start", || {
        Err(EngineError::StartupTimeout(Duration::from_millis(10)).into())
    })
    .expect_err("fault expected");
    assert!(matches!(err, ContractCaseError::Configuration { .. }));
    assert!(err.message().contains("unable to start"));
}

#[test]
fn panics_are_caught_and_normalized() {
    let err = guard::<()>("runExample", || panic!("mapper defect"))
        .expect_err("panic should be reported");

    assert!(matches!(err, ContractCaseError::Crash { .. }));
    assert!(err.message().contains("mapper defect"));
    let source = err.source().expect("panic is kept as the cause");
    assert!(source.downcast_ref::<PanicError>().is_some());
}

#[derive(Clone, Default)]
struct CapturedLog(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("log buffer").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn crashes_are_logged_under_the_crash_target() {
    let captured = CapturedLog::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("contract_case::crash=error"))
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let _ = guard::<()>("runExample", || Err(EngineError::ConnectionClosed.into()));
    });

    let output = String::from_utf8(captured.0.lock().expect("log buffer").clone())
        .expect("log output is utf-8");
    assert!(output.contains("contract_case::crash"), "{output}");
    assert!(output.contains("connector crashed"), "{output}");
}
