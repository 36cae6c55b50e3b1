use contract_case_connector::protocol::{WireBasicAuth, WireConfig};
use contract_case_connector::{
    map_config, map_failing_example, map_success_example, map_verification, BrokerBasicAuth,
    ContractCaseConfig, ContractCaseError, FailingExampleConfig, LogLevel, PublishPolicy,
    SuccessExampleConfig, VerificationConfig,
};
use serde_json::json;

fn assert_configuration_error(err: ContractCaseError, fragment: &str) {
    match &err {
        ContractCaseError::Configuration { message, .. } => {
            assert!(message.contains(fragment), "'{message}' lacks '{fragment}'")
        }
        other => panic!("expected a configuration error, got {other:?}"),
    }
}

#[test]
fn session_config_carries_test_run_id_and_set_options() {
    let config = ContractCaseConfig::default()
        .with_contract_dir("case-contracts")
        .with_log_level(LogLevel::MaintainerDebug)
        .with_publish(PublishPolicy::OnlyInCi)
        .with_broker_base_url("https://broker.example.com")
        .with_broker_basic_auth(BrokerBasicAuth::new("ci", "secret"))
        .with_print_results(false);

    let wire = map_config(&config, "RUST").expect("config should map");

    assert_eq!(wire.test_run_id, "RUST");
    assert_eq!(wire.contract_dir.as_deref(), Some("case-contracts"));
    assert_eq!(wire.log_level.as_deref(), Some("maintainerDebug"));
    assert_eq!(wire.publish.as_deref(), Some("ONLY_IN_CI"));
    assert_eq!(
        wire.broker_basic_auth,
        Some(WireBasicAuth {
            username: "ci".to_string(),
            password: "secret".to_string(),
        })
    );
    assert_eq!(wire.print_results, Some(false));
}

#[test]
fn unset_options_are_omitted_on_the_wire() {
    let wire = map_config(&ContractCaseConfig::default(), "RUST").expect("config should map");
    assert_eq!(
        serde_json::to_value(&wire).expect("encode"),
        json!({ "testRunId": "RUST" })
    );
}

#[test]
fn caller_test_run_id_overrides_default() {
    let config = ContractCaseConfig::default().with_test_run_id("worker-7");
    let wire = map_config(&config, "RUST").expect("config should map");
    assert_eq!(wire.test_run_id, "worker-7");
}

#[test]
fn mapping_leaves_input_untouched() {
    let config = ContractCaseConfig::default().with_contract_filename("pact.case.json");
    let before = format!("{config:?}");
    let _ = map_config(&config, "RUST").expect("config should map");
    assert_eq!(format!("{config:?}"), before);
}

#[test]
fn conflicting_broker_credentials_are_rejected() {
    let config = ContractCaseConfig::default()
        .with_broker_ci_access_token("token")
        .with_broker_basic_auth(BrokerBasicAuth::new("ci", "secret"));
    let err = map_config(&config, "RUST").expect_err("credentials conflict");
    assert_configuration_error(err, "mutually exclusive");
}

#[test]
fn always_publish_needs_a_broker() {
    let config = ContractCaseConfig::default().with_publish(PublishPolicy::Always);
    let err = map_config(&config, "RUST").expect_err("no broker to publish to");
    assert_configuration_error(err, "brokerBaseUrl");
}

#[test]
fn urls_must_be_http() {
    let config = ContractCaseConfig::default().with_broker_base_url("broker.local:9292");
    assert_configuration_error(
        map_config(&config, "RUST").expect_err("missing scheme"),
        "brokerBaseUrl",
    );

    let example = SuccessExampleConfig::default().with_base_url_under_test("ftp://mock");
    assert_configuration_error(
        map_success_example(Some(&example), "RUST").expect_err("wrong scheme"),
        "baseUrlUnderTest",
    );
}

#[test]
fn empty_test_run_id_is_rejected_everywhere() {
    let config = ContractCaseConfig::default().with_test_run_id("  ");
    assert_configuration_error(map_config(&config, "RUST").expect_err("blank id"), "testRunId");
    assert_configuration_error(
        map_success_example(None, "").expect_err("blank id"),
        "testRunId",
    );
    assert_configuration_error(
        map_failing_example(None, "").expect_err("blank id"),
        "testRunId",
    );
    assert_configuration_error(map_verification(None, "").expect_err("blank id"), "testRunId");
}

#[test]
fn basic_auth_needs_a_username() {
    let config = ContractCaseConfig::default().with_broker_basic_auth(BrokerBasicAuth::new("", "pw"));
    assert_configuration_error(map_config(&config, "RUST").expect_err("no username"), "username");
}

#[test]
fn absent_example_config_maps_to_defaults() {
    let expected = WireConfig {
        test_run_id: "RUST".to_string(),
        ..WireConfig::default()
    };
    assert_eq!(map_success_example(None, "RUST").expect("maps"), expected);
    assert_eq!(map_failing_example(None, "RUST").expect("maps"), expected);
    assert_eq!(map_verification(None, "RUST").expect("maps"), expected);
}

#[test]
fn example_configs_are_tagged_and_mapped() {
    let success = SuccessExampleConfig::default()
        .with_test_name("returns the user")
        .with_log_level(LogLevel::Warn);
    let wire = map_success_example(Some(&success), "RUST").expect("maps");
    assert_eq!(wire.test_run_id, "RUST");
    assert_eq!(wire.test_name.as_deref(), Some("returns the user"));
    assert_eq!(wire.log_level.as_deref(), Some("warn"));

    let failing = FailingExampleConfig::default().with_expected_error("404");
    let wire = map_failing_example(Some(&failing), "RUST").expect("maps");
    assert_eq!(wire.test_run_id, "RUST");
    assert_eq!(wire.expected_error.as_deref(), Some("404"));

    let verification = VerificationConfig::default().with_provider_name("user-service");
    let wire = map_verification(Some(&verification), "RUST").expect("maps");
    assert_eq!(wire.provider_name.as_deref(), Some("user-service"));
}

#[test]
fn blank_expected_error_is_rejected() {
    let failing = FailingExampleConfig::default().with_expected_error(" ");
    assert_configuration_error(
        map_failing_example(Some(&failing), "RUST").expect_err("blank fragment"),
        "expectedError",
    );
}
