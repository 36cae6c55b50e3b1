use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

/// Named provider state an example depends on, with optional variables.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateDefinition {
    #[serde(rename = "stateName")]
    pub name: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, Value>,
}

impl StateDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variables: BTreeMap::new(),
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }
}

/// One test scenario: the states it needs and the mock it exercises.
///
/// The mock description is opaque to this crate; it is built elsewhere and
/// forwarded to the engine as-is.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExampleDefinition {
    states: Vec<StateDefinition>,
    mock_description: Value,
}

impl ExampleDefinition {
    pub fn new(states: Vec<StateDefinition>, mock_description: Value) -> Self {
        Self {
            states,
            mock_description,
        }
    }

    /// Example with no provider states.
    pub fn from_mock(mock_description: Value) -> Self {
        Self::new(Vec::new(), mock_description)
    }

    pub fn states(&self) -> &[StateDefinition] {
        &self.states
    }

    pub fn mock_description(&self) -> &Value {
        &self.mock_description
    }

    /// Serialized payload sent to the engine.
    pub fn to_payload(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}
