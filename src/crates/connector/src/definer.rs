use std::sync::Arc;

use crate::config::{
    ContractCaseConfig, FailingExampleConfig, SuccessExampleConfig, DEFAULT_TEST_RUN_ID,
};
use crate::crash;
use crate::engine::EngineProcess;
use crate::error::CaseResult;
use crate::example::ExampleDefinition;
use crate::mapping;
use crate::protocol::WireConfig;
use crate::result;
use crate::session::{Session, SessionState};

/// Records a contract by running examples against the engine.
///
/// The session begins on the first operation and ends with [`end_record`].
///
/// [`end_record`]: ContractDefiner::end_record
pub struct ContractDefiner {
    session: Session,
    config: WireConfig,
}

impl ContractDefiner {
    /// Validate and map `config`; the engine is not contacted yet.
    pub fn new(engine: Arc<EngineProcess>, config: ContractCaseConfig) -> CaseResult<Self> {
        crash::guard("createDefiner", || {
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

    pub fn test_run_id(&self) -> &str {
        &self.config.test_run_id
    }

    /// Boundary version the engine chose, once the session is active.
    pub fn selected_version(&self) -> Option<&str> {
        self.session.selected_version()
    }

    /// Run an example that is expected to pass.
    pub fn run_example(
        &mut self,
        definition: &ExampleDefinition,
        config: Option<SuccessExampleConfig>,
    ) -> CaseResult<()> {
        crash::guard("runExample", || {
            let example = definition.to_payload()?;
            let mapped = mapping::map_success_example(config.as_ref(), &self.config.test_run_id)?;
            let begin_config = self.config.clone();
            let outcome = self.session.call(
                |client| client.begin_definition(begin_config),
                |client| client.run_example(example, mapped),
            )?;
            Ok(result::map_void(outcome)?)
        })
    }

    /// Run an example that the engine is expected to reject.
    pub fn run_throwing_example(
        &mut self,
        definition: &ExampleDefinition,
        config: Option<FailingExampleConfig>,
    ) -> CaseResult<()> {
        crash::guard("runRejectingExample", || {
            let example = definition.to_payload()?;
            let mapped = mapping::map_failing_example(config.as_ref(), &self.config.test_run_id)?;
            let begin_config = self.config.clone();
            let outcome = self.session.call(
                |client| client.begin_definition(begin_config),
                |client| client.run_rejecting_example(example, mapped),
            )?;
            Ok(result::map_void(outcome)?)
        })
    }

    /// Finish the contract. The engine writes it out before answering.
    ///
    /// Once the engine has answered, every further call is a configuration error.
    pub fn end_record(&mut self) -> CaseResult<()> {
        crash::guard("endRecord", || {
            let begin_config = self.config.clone();
            let outcome = self.session.call(
                |client| client.begin_definition(begin_config),
                |client| client.end_record(),
            )?;
            self.session.finish();
            Ok(result::map_void(outcome)?)
        })
    }
}
