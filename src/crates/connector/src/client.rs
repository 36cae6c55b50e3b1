use serde_json::Value;

use crate::engine::{Connection, EngineHandle};
use crate::error::EngineResult;
use crate::protocol::{ConnectorRequest, ConnectorResult, WireConfig};
use crate::version::BoundaryVersions;

/// Issues connector operations over one engine connection.
///
/// Returns raw result envelopes; classification is left to the result mapper.
/// Polarity is carried by the operation, never inverted here.
pub struct ConnectorClient {
    connection: Connection,
    versions: BoundaryVersions,
}

impl ConnectorClient {
    pub fn connect(handle: &EngineHandle, versions: BoundaryVersions) -> EngineResult<Self> {
        Ok(Self {
            connection: handle.connect()?,
            versions,
        })
    }

    pub fn versions(&self) -> &BoundaryVersions {
        &self.versions
    }

    pub fn begin_definition(&mut self, config: WireConfig) -> EngineResult<ConnectorResult> {
        let caller_versions = self.versions.as_slice().to_vec();
        self.connection.send(ConnectorRequest::BeginDefinition {
            config,
            caller_versions,
        })
    }

    pub fn run_example(
        &mut self,
        example: Value,
        config: WireConfig,
    ) -> EngineResult<ConnectorResult> {
        self.connection.send(ConnectorRequest::RunExample { example, config })
    }

    pub fn run_rejecting_example(
        &mut self,
        example: Value,
        config: WireConfig,
    ) -> EngineResult<ConnectorResult> {
        self.connection.send(ConnectorRequest::RunRejectingExample { example, config })
    }

    pub fn end_record(&mut self) -> EngineResult<ConnectorResult> {
        self.connection.send(ConnectorRequest::EndRecord)
    }

    pub fn begin_verification(&mut self, config: WireConfig) -> EngineResult<ConnectorResult> {
        let caller_versions = self.versions.as_slice().to_vec();
        self.connection.send(ConnectorRequest::BeginVerification {
            config,
            caller_versions,
        })
    }

    pub fn available_contract_descriptions(&mut self) -> EngineResult<ConnectorResult> {
        self.connection.send(ConnectorRequest::AvailableContractDescriptions)
    }

    pub fn run_verification(&mut self, config: WireConfig) -> EngineResult<ConnectorResult> {
        self.connection.send(ConnectorRequest::RunVerification { config })
    }
}
