use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{CaseResult, ContractCaseError};

/// Environment variable naming the engine binary to spawn.
pub const ENGINE_BINARY_ENV: &str = "CONTRACT_CASE_ENGINE_BINARY";
/// Environment variable naming an already-running engine to attach to.
pub const ENGINE_ADDRESS_ENV: &str = "CONTRACT_CASE_ENGINE_ADDRESS";
/// Environment variable overriding the startup timeout, in milliseconds.
pub const STARTUP_TIMEOUT_ENV: &str = "CONTRACT_CASE_STARTUP_TIMEOUT_MS";

/// Test-run identifier used when the caller does not supply one.
pub const DEFAULT_TEST_RUN_ID: &str = "RUST";

/// Process-level configuration for launching or attaching to the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Path to the engine binary to spawn.
    pub binary_path: PathBuf,
    /// Additional CLI arguments passed through to the engine.
    pub extra_args: Vec<String>,
    /// Extra environment variables applied to the child process.
    pub env: BTreeMap<String, String>,
    /// Optional working directory override for the child process.
    pub working_directory: Option<PathBuf>,
    /// Attach to an engine already listening here instead of spawning one.
    pub attach_address: Option<SocketAddr>,
    /// Upper bound on how long to wait for the engine to announce its listen address.
    pub startup_timeout: Duration,
}

impl EngineConfig {
    /// Create a new config targeting a specific engine binary.
    pub fn new(binary_path: impl Into<PathBuf>) -> Self {
        Self {
            binary_path: binary_path.into(),
            extra_args: Vec::new(),
            env: BTreeMap::new(),
            working_directory: None,
            attach_address: None,
            startup_timeout: Duration::from_secs(5),
        }
    }

    /// Create a config that attaches to an engine that is already running.
    pub fn attach(address: SocketAddr) -> Self {
        Self::new(PathBuf::new()).with_attach_address(address)
    }

    /// Build a config from the `CONTRACT_CASE_*` environment variables.
    pub fn from_env() -> CaseResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> CaseResult<Self> {
        let binary = lookup(ENGINE_BINARY_ENV).filter(|value| !value.trim().is_empty());
        let address = lookup(ENGINE_ADDRESS_ENV).filter(|value| !value.trim().is_empty());

        let mut config = match (binary, address) {
            (_, Some(address)) => {
                let address: SocketAddr = address.trim().parse().map_err(|err| {
                    ContractCaseError::configuration(format!(
                        "{ENGINE_ADDRESS_ENV} is not a socket address ({address}): {err}"
                    ))
                })?;
                Self::attach(address)
            }
            (Some(binary), None) => Self::new(binary),
            (None, None) => {
                return Err(ContractCaseError::configuration(format!(
                    "set {ENGINE_BINARY_ENV} or {ENGINE_ADDRESS_ENV} to locate the ContractCase engine"
                )))
            }
        };

        if let Some(raw) = lookup(STARTUP_TIMEOUT_ENV) {
            let millis: u64 = raw.trim().parse().map_err(|_| {
                ContractCaseError::configuration(format!(
                    "{STARTUP_TIMEOUT_ENV} must be a whole number of milliseconds, got '{raw}'"
                ))
            })?;
            config = config.with_startup_timeout(Duration::from_millis(millis));
        }

        Ok(config)
    }

    /// Add a passthrough CLI argument.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }

    /// Add an environment variable override.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Override the working directory for the spawned process.
    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    /// Attach to an engine at this address rather than spawning the binary.
    pub fn with_attach_address(mut self, address: SocketAddr) -> Self {
        self.attach_address = Some(address);
        self
    }

    /// Override the startup timeout used while waiting for the listen address.
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }
}

/// Engine log verbosity requested for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    None,
    Error,
    Warn,
    Debug,
    MaintainerDebug,
    DeepMaintainerDebug,
}

impl LogLevel {
    pub(crate) fn as_wire(self) -> &'static str {
        match self {
            LogLevel::None => "none",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Debug => "debug",
            LogLevel::MaintainerDebug => "maintainerDebug",
            LogLevel::DeepMaintainerDebug => "deepMaintainerDebug",
        }
    }
}

/// When the engine should publish contracts to the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishPolicy {
    Never,
    OnlyInCi,
    Always,
}

impl PublishPolicy {
    pub(crate) fn as_wire(self) -> &'static str {
        match self {
            PublishPolicy::Never => "NEVER",
            PublishPolicy::OnlyInCi => "ONLY_IN_CI",
            PublishPolicy::Always => "ALWAYS",
        }
    }
}

/// Username/password pair for brokers that use basic auth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerBasicAuth {
    pub username: String,
    pub password: String,
}

impl BrokerBasicAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Session-level configuration supplied when a definer or verifier is created.
#[derive(Debug, Clone, Default)]
pub struct ContractCaseConfig {
    pub test_run_id: Option<String>,
    pub contract_dir: Option<PathBuf>,
    pub contract_filename: Option<String>,
    pub overwrite_file: Option<bool>,
    pub log_level: Option<LogLevel>,
    pub print_results: Option<bool>,
    pub throw_on_fail: Option<bool>,
    pub publish: Option<PublishPolicy>,
    pub broker_base_url: Option<String>,
    pub broker_ci_access_token: Option<String>,
    pub broker_basic_auth: Option<BrokerBasicAuth>,
    pub base_url_under_test: Option<String>,
}

impl ContractCaseConfig {
    /// Override the test-run identifier attached to every request.
    pub fn with_test_run_id(mut self, id: impl Into<String>) -> Self {
        self.test_run_id = Some(id.into());
        self
    }

    pub fn with_contract_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.contract_dir = Some(dir.into());
        self
    }

    pub fn with_contract_filename(mut self, filename: impl Into<String>) -> Self {
        self.contract_filename = Some(filename.into());
        self
    }

    pub fn with_overwrite_file(mut self, overwrite: bool) -> Self {
        self.overwrite_file = Some(overwrite);
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    pub fn with_print_results(mut self, print: bool) -> Self {
        self.print_results = Some(print);
        self
    }

    pub fn with_throw_on_fail(mut self, throw: bool) -> Self {
        self.throw_on_fail = Some(throw);
        self
    }

    pub fn with_publish(mut self, policy: PublishPolicy) -> Self {
        self.publish = Some(policy);
        self
    }

    pub fn with_broker_base_url(mut self, url: impl Into<String>) -> Self {
        self.broker_base_url = Some(url.into());
        self
    }

    pub fn with_broker_ci_access_token(mut self, token: impl Into<String>) -> Self {
        self.broker_ci_access_token = Some(token.into());
        self
    }

    pub fn with_broker_basic_auth(mut self, auth: BrokerBasicAuth) -> Self {
        self.broker_basic_auth = Some(auth);
        self
    }

    pub fn with_base_url_under_test(mut self, url: impl Into<String>) -> Self {
        self.base_url_under_test = Some(url.into());
        self
    }
}

/// Per-example overrides for an example that is expected to pass.
#[derive(Debug, Clone, Default)]
pub struct SuccessExampleConfig {
    pub test_name: Option<String>,
    pub log_level: Option<LogLevel>,
    pub print_results: Option<bool>,
    pub base_url_under_test: Option<String>,
}

impl SuccessExampleConfig {
    pub fn with_test_name(mut self, name: impl Into<String>) -> Self {
        self.test_name = Some(name.into());
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    pub fn with_print_results(mut self, print: bool) -> Self {
        self.print_results = Some(print);
        self
    }

    pub fn with_base_url_under_test(mut self, url: impl Into<String>) -> Self {
        self.base_url_under_test = Some(url.into());
        self
    }
}

/// Per-example overrides for an example that is expected to be rejected.
#[derive(Debug, Clone, Default)]
pub struct FailingExampleConfig {
    pub test_name: Option<String>,
    pub log_level: Option<LogLevel>,
    pub print_results: Option<bool>,
    pub base_url_under_test: Option<String>,
    /// Substring the engine should find in the rejection message.
    pub expected_error: Option<String>,
}

impl FailingExampleConfig {
    pub fn with_test_name(mut self, name: impl Into<String>) -> Self {
        self.test_name = Some(name.into());
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    pub fn with_print_results(mut self, print: bool) -> Self {
        self.print_results = Some(print);
        self
    }

    pub fn with_base_url_under_test(mut self, url: impl Into<String>) -> Self {
        self.base_url_under_test = Some(url.into());
        self
    }

    pub fn with_expected_error(mut self, fragment: impl Into<String>) -> Self {
        self.expected_error = Some(fragment.into());
        self
    }
}

/// Overrides for a single verification run.
#[derive(Debug, Clone, Default)]
pub struct VerificationConfig {
    pub log_level: Option<LogLevel>,
    pub print_results: Option<bool>,
    pub base_url_under_test: Option<String>,
    /// Only verify contracts for this provider.
    pub provider_name: Option<String>,
}

impl VerificationConfig {
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    pub fn with_print_results(mut self, print: bool) -> Self {
        self.print_results = Some(print);
        self
    }

    pub fn with_base_url_under_test(mut self, url: impl Into<String>) -> Self {
        self.base_url_under_test = Some(url.into());
        self
    }

    pub fn with_provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = Some(name.into());
        self
    }
}
