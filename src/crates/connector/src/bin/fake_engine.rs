use std::fs;
use std::io::Write;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use contract_case_connector::protocol::{
    read_message, write_frame, write_message, ConnectorRequest, ConnectorResult, FailureKind,
    RequestEnvelope, ResponseEnvelope, WireConfig,
};
use contract_case_connector::ContractDescription;
use serde_json::{json, Value};

const SUPPORTED_VERSIONS: &[&str] = &["0.1.0", "0.0.1"];
const LOCATION: &str = "fake engine";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var_os("FAKE_ENGINE_EXIT_IMMEDIATELY").is_some() {
        eprintln!("fake engine refusing to start");
        std::process::exit(3);
    }
    if let Some(delay) = env_millis("FAKE_ENGINE_STARTUP_DELAY_MS") {
        thread::sleep(delay);
    }

    let bind_addr = bind_addr_from_args()?;
    let listener = TcpListener::bind(bind_addr)?;
    let addr = listener.local_addr()?;
    println!("listening on {addr}");

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                thread::spawn(move || serve_connection(stream));
            }
            Err(err) => {
                eprintln!("fake engine accept failed: {err}");
                break;
            }
        }
    }
    Ok(())
}

fn bind_addr_from_args() -> Result<SocketAddr, Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--bind-addr" {
            let value = args.next().ok_or("--bind-addr needs a value")?;
            return Ok(value.parse()?);
        }
        if let Some(value) = arg.strip_prefix("--bind-addr=") {
            return Ok(value.parse()?);
        }
    }
    Ok("127.0.0.1:0".parse()?)
}

fn env_millis(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .map(Duration::from_millis)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Definition,
    Verification,
}

#[derive(Default)]
struct ConnectionState {
    mode: Option<Mode>,
    config: WireConfig,
    examples: Vec<Value>,
    ended: bool,
}

/// What to send back for one request.
enum Reply {
    Result(ConnectorResult),
    Malformed,
    /// Announce a frame past the size limit, then answer the next request early.
    Oversized,
    Disconnect,
}

fn serve_connection(mut stream: TcpStream) {
    let mut state = ConnectionState::default();
    loop {
        let envelope: RequestEnvelope = match read_message(&mut stream) {
            Ok(envelope) => envelope,
            Err(_) => return,
        };
        eprintln!("fake engine: {} #{}", envelope.request.operation(), envelope.id);

        let shutdown = matches!(envelope.request, ConnectorRequest::Shutdown);
        let reply = handle_request(&mut state, envelope.request);
        let written = match reply {
            Reply::Result(result) => write_message(
                &mut stream,
                &ResponseEnvelope {
                    id: envelope.id,
                    result,
                },
            ),
            Reply::Malformed => write_frame(&mut stream, b"this is not an envelope"),
            Reply::Oversized => stream
                .write_all(&(32u32 * 1024 * 1024).to_be_bytes())
                .map_err(Into::into)
                .and_then(|()| {
                    write_message(
                        &mut stream,
                        &ResponseEnvelope {
                            id: envelope.id + 1,
                            result: ConnectorResult::Success,
                        },
                    )
                }),
            Reply::Disconnect => return,
        };
        if written.is_err() {
            return;
        }
        if shutdown {
            std::process::exit(0);
        }
    }
}

fn handle_request(state: &mut ConnectionState, request: ConnectorRequest) -> Reply {
    if state.ended && !matches!(request, ConnectorRequest::Shutdown) {
        return failure(FailureKind::CONFIGURATION, "session already ended");
    }

    match request {
        ConnectorRequest::BeginDefinition {
            config,
            caller_versions,
        } => begin(state, Mode::Definition, config, &caller_versions),
        ConnectorRequest::BeginVerification {
            config,
            caller_versions,
        } => begin(state, Mode::Verification, config, &caller_versions),
        ConnectorRequest::RunExample { example, config } => {
            if state.mode != Some(Mode::Definition) {
                return failure(FailureKind::CORE, "runExample called before beginDefinition");
            }
            if let Some(reply) = scripted_transport_fault(&example) {
                return reply;
            }
            if let Some(expected) = &config.test_name {
                eprintln!("fake engine: running '{expected}'");
            }
            match scripted_failure(&example) {
                Some(result) => Reply::Result(result),
                None => {
                    state.examples.push(example);
                    Reply::Result(ConnectorResult::Success)
                }
            }
        }
        ConnectorRequest::RunRejectingExample { example, config } => {
            if state.mode != Some(Mode::Definition) {
                return failure(
                    FailureKind::CORE,
                    "runRejectingExample called before beginDefinition",
                );
            }
            if let Some(reply) = scripted_transport_fault(&example) {
                return reply;
            }
            match scripted_failure(&example) {
                Some(ConnectorResult::Failure { message, .. }) => match &config.expected_error {
                    Some(fragment) if !message.contains(fragment.as_str()) => failure(
                        FailureKind::FAILED_ASSERTION,
                        &format!(
                            "Expected a rejection containing '{fragment}', but the example failed with: {message}"
                        ),
                    ),
                    _ => {
                        state.examples.push(example);
                        Reply::Result(ConnectorResult::Success)
                    }
                },
                _ => failure(
                    FailureKind::FAILED_ASSERTION,
                    "Expected the example to be rejected, but it passed",
                ),
            }
        }
        ConnectorRequest::EndRecord => {
            if state.mode != Some(Mode::Definition) {
                return failure(FailureKind::CORE, "endRecord called before beginDefinition");
            }
            state.ended = true;
            match write_contract(state) {
                Ok(()) => Reply::Result(ConnectorResult::Success),
                Err(err) => failure(
                    FailureKind::CONFIGURATION,
                    &format!("unable to write contract: {err}"),
                ),
            }
        }
        ConnectorRequest::AvailableContractDescriptions => {
            if state.mode != Some(Mode::Verification) {
                return failure(
                    FailureKind::CORE,
                    "availableContractDescriptions called before beginVerification",
                );
            }
            match contract_dir(&state.config).map(|dir| list_contracts(&dir, None)) {
                Some(Ok(contracts)) => {
                    let descriptions: Vec<ContractDescription> =
                        contracts.into_iter().map(|(description, _)| description).collect();
                    Reply::Result(ConnectorResult::SuccessWithAny {
                        payload: json!(descriptions),
                    })
                }
                Some(Err(err)) => failure(
                    FailureKind::CONFIGURATION,
                    &format!("unable to read contracts: {err}"),
                ),
                None => failure(FailureKind::CONFIGURATION, "no contractDir configured"),
            }
        }
        ConnectorRequest::RunVerification { config } => {
            if state.mode != Some(Mode::Verification) {
                return failure(
                    FailureKind::CORE,
                    "runVerification called before beginVerification",
                );
            }
            verify(state, &config)
        }
        ConnectorRequest::Shutdown => Reply::Result(ConnectorResult::Success),
    }
}

fn begin(
    state: &mut ConnectionState,
    mode: Mode,
    config: WireConfig,
    caller_versions: &[String],
) -> Reply {
    if config.test_run_id.is_empty() {
        return failure(FailureKind::CONFIGURATION, "missing testRunId");
    }
    let selected = std::env::var("FAKE_ENGINE_SELECTED_VERSION").ok().or_else(|| {
        caller_versions
            .iter()
            .find(|version| SUPPORTED_VERSIONS.contains(&version.as_str()))
            .cloned()
    });
    let Some(selected) = selected else {
        return failure(FailureKind::CORE, "no compatible boundary version");
    };

    state.mode = Some(mode);
    state.config = config;
    Reply::Result(ConnectorResult::SuccessWithAny {
        payload: json!({ "selectedVersion": selected }),
    })
}

fn scripted_transport_fault(example: &Value) -> Option<Reply> {
    let mock = example.get("mockDescription")?;
    if mock.get("_fake:disconnect").is_some() {
        return Some(Reply::Disconnect);
    }
    if mock.get("_fake:malformed").is_some() {
        return Some(Reply::Malformed);
    }
    if mock.get("_fake:oversized").is_some() {
        return Some(Reply::Oversized);
    }
    None
}

fn scripted_failure(example: &Value) -> Option<ConnectorResult> {
    let failure = example.get("mockDescription")?.get("_fake:failure")?;
    let kind = failure.get("kind").and_then(Value::as_str).unwrap_or("");
    let message = failure.get("message").and_then(Value::as_str).unwrap_or("");
    let location = failure
        .get("location")
        .and_then(Value::as_str)
        .map(str::to_string);
    Some(ConnectorResult::failure(kind, message, location))
}

fn contract_dir(config: &WireConfig) -> Option<PathBuf> {
    config.contract_dir.as_ref().map(PathBuf::from)
}

fn write_contract(state: &ConnectionState) -> std::io::Result<()> {
    let Some(dir) = contract_dir(&state.config) else {
        return Ok(());
    };
    fs::create_dir_all(&dir)?;
    let filename = state
        .config
        .contract_filename
        .clone()
        .unwrap_or_else(|| format!("{}-contract.case.json", state.config.test_run_id));
    let path = dir.join(filename);
    if path.exists() && state.config.overwrite_file == Some(false) {
        return Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("{} already exists", path.display()),
        ));
    }
    let contract = json!({
        "consumerName": state.config.test_run_id,
        "providerName": "unknown provider",
        "examples": state.examples,
    });
    fs::write(path, serde_json::to_vec_pretty(&contract)?)
}

fn list_contracts(
    dir: &Path,
    provider: Option<&str>,
) -> std::io::Result<Vec<(ContractDescription, Value)>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.to_string_lossy().ends_with(".case.json"))
        .collect();
    paths.sort();

    let mut contracts = Vec::new();
    for path in paths {
        let contract: Value = serde_json::from_slice(&fs::read(&path)?)?;
        let description = ContractDescription {
            consumer_name: contract
                .get("consumerName")
                .and_then(Value::as_str)
                .unwrap_or("unknown consumer")
                .to_string(),
            provider_name: contract
                .get("providerName")
                .and_then(Value::as_str)
                .unwrap_or("unknown provider")
                .to_string(),
            file_path: Some(path.display().to_string()),
        };
        if provider.is_some_and(|name| name != description.provider_name) {
            continue;
        }
        contracts.push((description, contract));
    }
    Ok(contracts)
}

fn verify(state: &ConnectionState, config: &WireConfig) -> Reply {
    let Some(dir) = contract_dir(&state.config) else {
        return failure(FailureKind::CONFIGURATION, "no contractDir configured");
    };
    let contracts = match list_contracts(&dir, config.provider_name.as_deref()) {
        Ok(contracts) => contracts,
        Err(err) => {
            return failure(
                FailureKind::CONFIGURATION,
                &format!("unable to read contracts: {err}"),
            )
        }
    };
    if contracts.is_empty() {
        return failure(FailureKind::CONFIGURATION, "No contracts found to verify");
    }

    for (description, contract) in contracts {
        if let Some(message) = contract.get("_fake:verifyFailure").and_then(Value::as_str) {
            return Reply::Result(ConnectorResult::failure(
                FailureKind::FAILED_ASSERTION,
                message,
                description.file_path,
            ));
        }
    }
    Reply::Result(ConnectorResult::Success)
}

fn failure(kind: &str, message: &str) -> Reply {
    Reply::Result(ConnectorResult::failure(
        kind,
        message,
        Some(LOCATION.to_string()),
    ))
}
