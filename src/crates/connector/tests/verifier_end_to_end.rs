#![cfg(feature = "test-support")]

#[path = "connector_support.rs"]
mod support;

use std::fs;
use std::path::Path;

use contract_case_connector::{
    ContractCaseConfig, ContractCaseError, ContractVerifier, SessionState, VerificationConfig,
};
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};

use support::shared_engine;

fn write_contract(dir: &Path, name: &str, contract: Value) {
    fs::write(
        dir.join(name),
        serde_json::to_vec_pretty(&contract).expect("contract encodes"),
    )
    .expect("contract written");
}

fn contracts_dir() -> TempDir {
    let dir = tempdir().expect("temp contract dir");
    write_contract(
        dir.path(),
        "a-web-users.case.json",
        json!({ "consumerName": "web", "providerName": "users", "examples": [] }),
    );
    write_contract(
        dir.path(),
        "b-mobile-billing.case.json",
        json!({ "consumerName": "mobile", "providerName": "billing", "examples": [] }),
    );
    fs::write(dir.path().join("notes.txt"), "not a contract").expect("noise written");
    dir
}

fn verifier_for(dir: &TempDir) -> ContractVerifier {
    ContractVerifier::new(
        shared_engine(),
        ContractCaseConfig::default().with_contract_dir(dir.path()),
    )
    .expect("valid config")
}

#[test]
fn lists_available_contracts() {
    let dir = contracts_dir();
    let mut verifier = verifier_for(&dir);
    assert_eq!(verifier.state(), SessionState::Unstarted);

    let descriptions = verifier
        .available_contract_descriptions()
        .expect("descriptions should load");

    assert_eq!(verifier.state(), SessionState::Active);
    let pairs: Vec<_> = descriptions
        .iter()
        .map(|d| (d.consumer_name.as_str(), d.provider_name.as_str()))
        .collect();
    assert_eq!(pairs, [("web", "users"), ("mobile", "billing")]);
    assert!(descriptions.iter().all(|d| d.file_path.is_some()));
}

#[test]
fn verification_passes_for_clean_contracts() {
    let dir = contracts_dir();
    let mut verifier = verifier_for(&dir);
    verifier
        .run_verification(None)
        .expect("verification should pass");
}

#[test]
fn failed_verification_reports_contract_location() {
    let dir = contracts_dir();
    write_contract(
        dir.path(),
        "c-web-orders.case.json",
        json!({
            "consumerName": "web",
            "providerName": "orders",
            "_fake:verifyFailure": "expected status 200 but got 500"
        }),
    );
    let mut verifier = verifier_for(&dir);

    let err = verifier
        .run_verification(Some(VerificationConfig::default().with_provider_name("orders")))
        .expect_err("provider does not honour the contract");

    assert!(err.is_expectations_not_met(), "{err:?}");
    assert_eq!(err.message(), "expected status 200 but got 500");
    assert!(err
        .location()
        .is_some_and(|location| location.ends_with("c-web-orders.case.json")));
}

#[test]
fn unknown_provider_is_a_configuration_error() {
    let dir = contracts_dir();
    let mut verifier = verifier_for(&dir);

    let err = verifier
        .run_verification(Some(VerificationConfig::default().with_provider_name("nobody")))
        .expect_err("nothing to verify");
    assert!(matches!(err, ContractCaseError::Configuration { .. }), "{err:?}");
}

#[test]
fn missing_contract_dir_is_a_configuration_error() {
    let mut verifier = ContractVerifier::new(shared_engine(), ContractCaseConfig::default())
        .expect("valid config");

    let err = verifier
        .available_contract_descriptions()
        .expect_err("no contract dir");
    assert!(matches!(err, ContractCaseError::Configuration { .. }), "{err:?}");
}
