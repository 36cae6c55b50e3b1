use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{ContractCaseConfig, VerificationConfig, DEFAULT_TEST_RUN_ID};
use crate::crash;
use crate::engine::EngineProcess;
use crate::error::CaseResult;
use crate::mapping;
use crate::protocol::WireConfig;
use crate::result;
use crate::session::{Session, SessionState};

/// A contract the engine can verify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractDescription {
    pub consumer_name: String,
    pub provider_name: String,
    #[serde(default)]
    pub file_path: Option<String>,
}

/// Verifies previously recorded contracts against a provider.
pub struct ContractVerifier {
    session: Session,
    config: WireConfig,
}

impl ContractVerifier {
    pub fn new(engine: Arc<EngineProcess>, config: ContractCaseConfig) -> CaseResult<Self> {
        crash::guard("createVerifier", || {
            let config = mapping::map_config(&config, DEFAULT_TEST_RUN_ID)?;
            Ok(Self {
                session: Session::new(engine),
                config,
            })
        })
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn available_contract_descriptions(&mut self) -> CaseResult<Vec<ContractDescription>> {
        crash::guard("availableContractDescriptions", || {
            let begin_config = self.config.clone();
            let outcome = self.session.call(
                |client| client.begin_verification(begin_config),
                |client| client.available_contract_descriptions(),
            )?;
            let payload = result::map_payload(outcome)?;
            Ok(serde_json::from_value(payload)?)
        })
    }

    pub fn run_verification(&mut self, config: Option<VerificationConfig>) -> CaseResult<()> {
        crash::guard("runVerification", || {
            let mapped = mapping::map_verification(config.as_ref(), &self.config.test_run_id)?;
            let begin_config = self.config.clone();
            let outcome = self.session.call(
                |client| client.begin_verification(begin_config),
                |client| client.run_verification(mapped),
            )?;
            Ok(result::map_void(outcome)?)
        })
    }
}
