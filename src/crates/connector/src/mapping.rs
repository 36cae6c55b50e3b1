//! Translation of caller configuration into the engine's wire shape.

use crate::config::{
    BrokerBasicAuth, ContractCaseConfig, FailingExampleConfig, PublishPolicy,
    SuccessExampleConfig, VerificationConfig,
};
use crate::error::{CaseResult, ContractCaseError};
use crate::protocol::{WireBasicAuth, WireConfig};

/// Map session-level configuration, tagging it with the test-run identifier.
pub fn map_config(config: &ContractCaseConfig, test_run_id: &str) -> CaseResult<WireConfig> {
    let test_run_id = effective_test_run_id(config, test_run_id)?;

    if config.broker_ci_access_token.is_some() && config.broker_basic_auth.is_some() {
        return Err(ContractCaseError::configuration(
            "brokerCiAccessToken and brokerBasicAuth are mutually exclusive; set only one",
        ));
    }
    if config.publish == Some(PublishPolicy::Always) && config.broker_base_url.is_none() {
        return Err(ContractCaseError::configuration(
            "publish is ALWAYS but no brokerBaseUrl was provided",
        ));
    }
    if let Some(url) = &config.broker_base_url {
        check_url("brokerBaseUrl", url)?;
    }
    if let Some(url) = &config.base_url_under_test {
        check_url("baseUrlUnderTest", url)?;
    }

    Ok(WireConfig {
        test_run_id,
        contract_dir: config
            .contract_dir
            .as_ref()
            .map(|dir| dir.display().to_string()),
        contract_filename: config.contract_filename.clone(),
        overwrite_file: config.overwrite_file,
        log_level: config.log_level.map(|level| level.as_wire().to_string()),
        print_results: config.print_results,
        throw_on_fail: config.throw_on_fail,
        publish: config.publish.map(|policy| policy.as_wire().to_string()),
        broker_base_url: config.broker_base_url.clone(),
        broker_ci_access_token: config.broker_ci_access_token.clone(),
        broker_basic_auth: config
            .broker_basic_auth
            .as_ref()
            .map(map_basic_auth)
            .transpose()?,
        base_url_under_test: config.base_url_under_test.clone(),
        ..WireConfig::default()
    })
}

/// Map per-example overrides for an example expected to pass.
pub fn map_success_example(
    config: Option<&SuccessExampleConfig>,
    test_run_id: &str,
) -> CaseResult<WireConfig> {
    let mut wire = base_config(test_run_id)?;
    let Some(config) = config else {
        return Ok(wire);
    };

    if let Some(url) = &config.base_url_under_test {
        check_url("baseUrlUnderTest", url)?;
    }
    wire.test_name = config.test_name.clone();
    wire.log_level = config.log_level.map(|level| level.as_wire().to_string());
    wire.print_results = config.print_results;
    wire.base_url_under_test = config.base_url_under_test.clone();
    Ok(wire)
}

/// Map per-example overrides for an example expected to be rejected.
pub fn map_failing_example(
    config: Option<&FailingExampleConfig>,
    test_run_id: &str,
) -> CaseResult<WireConfig> {
    let mut wire = base_config(test_run_id)?;
    let Some(config) = config else {
        return Ok(wire);
    };

    if let Some(url) = &config.base_url_under_test {
        check_url("baseUrlUnderTest", url)?;
    }
    if matches!(&config.expected_error, Some(fragment) if fragment.trim().is_empty()) {
        return Err(ContractCaseError::configuration(
            "expectedError was set but empty; omit it to accept any rejection",
        ));
    }
    wire.test_name = config.test_name.clone();
    wire.log_level = config.log_level.map(|level| level.as_wire().to_string());
    wire.print_results = config.print_results;
    wire.base_url_under_test = config.base_url_under_test.clone();
    wire.expected_error = config.expected_error.clone();
    Ok(wire)
}

/// Map overrides for a single verification run.
pub fn map_verification(
    config: Option<&VerificationConfig>,
    test_run_id: &str,
) -> CaseResult<WireConfig> {
    let mut wire = base_config(test_run_id)?;
    let Some(config) = config else {
        return Ok(wire);
    };

    if let Some(url) = &config.base_url_under_test {
        check_url("baseUrlUnderTest", url)?;
    }
    wire.log_level = config.log_level.map(|level| level.as_wire().to_string());
    wire.print_results = config.print_results;
    wire.base_url_under_test = config.base_url_under_test.clone();
    wire.provider_name = config.provider_name.clone();
    Ok(wire)
}

fn base_config(test_run_id: &str) -> CaseResult<WireConfig> {
    if test_run_id.trim().is_empty() {
        return Err(ContractCaseError::configuration("testRunId must not be empty"));
    }
    Ok(WireConfig {
        test_run_id: test_run_id.to_string(),
        ..WireConfig::default()
    })
}

fn effective_test_run_id(config: &ContractCaseConfig, fallback: &str) -> CaseResult<String> {
    let id = config.test_run_id.as_deref().unwrap_or(fallback);
    if id.trim().is_empty() {
        return Err(ContractCaseError::configuration("testRunId must not be empty"));
    }
    Ok(id.to_string())
}

fn map_basic_auth(auth: &BrokerBasicAuth) -> CaseResult<WireBasicAuth> {
    if auth.username.trim().is_empty() {
        return Err(ContractCaseError::configuration("brokerBasicAuth requires a username"));
    }
    Ok(WireBasicAuth {
        username: auth.username.clone(),
        password: auth.password.clone(),
    })
}

fn check_url(field: &str, url: &str) -> CaseResult<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ContractCaseError::configuration(format!(
            "{field} must be an http(s) URL, got '{url}'"
        )))
    }
}
