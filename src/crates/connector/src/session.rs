use std::sync::Arc;

use tracing::{info, warn};

use crate::client::ConnectorClient;
use crate::crash::BoundaryFault;
use crate::engine::{EngineHandle, EngineProcess};
use crate::error::{ContractCaseError, EngineError, EngineResult};
use crate::protocol::ConnectorResult;
use crate::result;
use crate::version::BoundaryVersions;

/// Lifecycle of one binding-to-engine session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unstarted,
    Active,
    Ended,
}

/// Session bookkeeping shared by definers and verifiers.
pub(crate) struct Session {
    engine: Arc<EngineProcess>,
    handle: Option<Arc<EngineHandle>>,
    client: Option<ConnectorClient>,
    state: SessionState,
    selected_version: Option<String>,
    abandoned: Option<String>,
}

impl Session {
    pub(crate) fn new(engine: Arc<EngineProcess>) -> Self {
        Self {
            engine,
            handle: None,
            client: None,
            state: SessionState::Unstarted,
            selected_version: None,
            abandoned: None,
        }
    }

    pub(crate) fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn selected_version(&self) -> Option<&str> {
        self.selected_version.as_deref()
    }

    /// Return the client for an active session, beginning it first if needed.
    ///
    /// `begin` issues the operation that opens the session on the engine. If
    /// it fails the session stays `Unstarted`, so the next call tries again.
    fn active_client(
        &mut self,
        begin: impl FnOnce(&mut ConnectorClient) -> EngineResult<ConnectorResult>,
    ) -> Result<&mut ConnectorClient, BoundaryFault> {
        match self.state {
            SessionState::Ended => {
                let message = match &self.abandoned {
                    Some(reason) => format!(
                        "this session was abandoned after a transport failure ({reason}); \
                         create a new one to run more examples"
                    ),
                    None => "this session has already ended; create a new one to run more examples"
                        .to_string(),
                };
                return Err(ContractCaseError::configuration(message).into());
            }
            SessionState::Active => {}
            SessionState::Unstarted => {
                let handle = self.engine.start()?;
                let mut client = ConnectorClient::connect(&handle, BoundaryVersions::current())?;
                let outcome = begin(&mut client)?;
                self.selected_version = result::map_begin(outcome, client.versions())?;
                info!(
                    target: "contract_case::session",
                    engine = %handle.address(),
                    version = ?self.selected_version,
                    "session active"
                );
                self.handle = Some(handle);
                self.client = Some(client);
                self.state = SessionState::Active;
            }
        }

        self.client
            .as_mut()
            .ok_or_else(|| ContractCaseError::core("active session has no connector client").into())
    }

    /// Run one operation on the active session, beginning it first if needed.
    ///
    /// A transport fault leaves the connection out of step with the engine,
    /// so the session is abandoned and every later call is rejected.
    pub(crate) fn call(
        &mut self,
        begin: impl FnOnce(&mut ConnectorClient) -> EngineResult<ConnectorResult>,
        operation: impl FnOnce(&mut ConnectorClient) -> EngineResult<ConnectorResult>,
    ) -> Result<ConnectorResult, BoundaryFault> {
        let client = self.active_client(begin)?;
        match operation(client) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.abandon(&err);
                Err(err.into())
            }
        }
    }

    /// Mark the session ended and release its connection.
    pub(crate) fn finish(&mut self) {
        self.release();
        info!(target: "contract_case::session", "session ended");
    }

    fn abandon(&mut self, err: &EngineError) {
        warn!(target: "contract_case::session", error = %err, "abandoning session");
        self.abandoned = Some(err.to_string());
        self.release();
    }

    fn release(&mut self) {
        self.state = SessionState::Ended;
        self.client = None;
        self.handle = None;
    }
}
