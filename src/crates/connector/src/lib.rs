//! Binding layer that drives the out-of-process ContractCase engine.
//!
//! One [`EngineProcess`] is shared by the whole test run. Definers and
//! verifiers start it lazily, send serialized examples with mapped
//! configuration, and turn the engine's result envelopes into
//! [`ContractCaseError`]s.
//!
//! Typical usage:
//! ```no_run
//! use std::sync::Arc;
//!
//! use contract_case_connector::{
//!     ContractCaseConfig, ContractDefiner, EngineConfig, EngineProcess, ExampleDefinition,
//! };
//! use serde_json::json;
//!
//! let engine = Arc::new(EngineProcess::new(EngineConfig::new("/path/to/case-connector")));
//! let mut definer = ContractDefiner::new(
//!     engine,
//!     ContractCaseConfig::default().with_contract_dir("case-contracts"),
//! )
//! .expect("config should be valid");
//!
//! let example = ExampleDefinition::from_mock(json!({ "_case:mock:type": "ConsumeHttpResponse" }));
//! definer.run_example(&example, None).expect("example should pass");
//! definer.end_record().expect("contract should be written");
//! ```

mod client;
mod config;
pub mod crash;
mod definer;
mod engine;
mod error;
mod example;
mod mapping;
pub mod protocol;
pub mod result;
mod session;
mod verifier;
mod version;

pub use client::ConnectorClient;
pub use config::{
    BrokerBasicAuth, ContractCaseConfig, EngineConfig, FailingExampleConfig, LogLevel,
    PublishPolicy, SuccessExampleConfig, VerificationConfig, DEFAULT_TEST_RUN_ID,
    ENGINE_ADDRESS_ENV, ENGINE_BINARY_ENV, STARTUP_TIMEOUT_ENV,
};
pub use definer::ContractDefiner;
pub use engine::{
    Connection, EngineHandle, EngineProcess, LogLine, LogStream, LOG_BUFFER_CAPACITY,
};
pub use error::{CaseResult, ContractCaseError, EngineError, EngineResult};
pub use example::{ExampleDefinition, StateDefinition};
pub use mapping::{map_config, map_failing_example, map_success_example, map_verification};
pub use session::SessionState;
pub use verifier::{ContractDescription, ContractVerifier};
pub use version::BoundaryVersions;
