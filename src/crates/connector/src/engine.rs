use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::net::{SocketAddr, TcpStream};
use std::process::{Child, Command, Stdio};
use std::sync::{mpsc, Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::protocol::{
    read_message, write_message, ConnectorRequest, ConnectorResult, RequestEnvelope,
    ResponseEnvelope,
};

/// Most recent engine log lines kept in memory; older lines are dropped.
pub const LOG_BUFFER_CAPACITY: usize = 1024;

/// Origin stream for captured log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

/// Single captured log line with its source.
#[derive(Debug, Clone)]
pub struct LogLine {
    pub stream: LogStream,
    pub line: String,
}

/// Owns the single shared engine for a test run.
///
/// Construct one, share it behind an `Arc`, and hand it to every definer and
/// verifier. The first `start` launches (or attaches to) the engine; later
/// calls return the same handle.
pub struct EngineProcess {
    config: EngineConfig,
    handle: Mutex<Option<Arc<EngineHandle>>>,
}

impl EngineProcess {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            handle: Mutex::new(None),
        }
    }

    /// Ensure the engine is running and reachable, returning the shared handle.
    ///
    /// Concurrent callers serialize on the latch, so only the first one
    /// launches. A failed launch leaves the latch empty for a later retry.
    pub fn start(&self) -> EngineResult<Arc<EngineHandle>> {
        let mut slot = self.handle.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = slot.as_ref() {
            return Ok(Arc::clone(handle));
        }

        let handle = Arc::new(EngineHandle::launch(&self.config)?);
        info!(
            target: "contract_case::engine",
            address = %handle.address(),
            pid = ?handle.pid(),
            "engine ready"
        );
        *slot = Some(Arc::clone(&handle));
        Ok(handle)
    }

    /// The started handle, if `start` has succeeded.
    pub fn handle(&self) -> Option<Arc<EngineHandle>> {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_started(&self) -> bool {
        self.handle().is_some()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// Live reference to a spawned or attached engine.
///
/// Only `EngineProcess` creates these. A spawned engine is shut down when the
/// last handle is dropped; an attached one is left running.
pub struct EngineHandle {
    address: SocketAddr,
    pid: Option<u32>,
    child: Mutex<Option<Child>>,
    log_buffer: Arc<Mutex<VecDeque<LogLine>>>,
    log_collector: Mutex<Option<thread::JoinHandle<()>>>,
}

impl EngineHandle {
    fn launch(config: &EngineConfig) -> EngineResult<Self> {
        match config.attach_address {
            Some(address) => Self::attach(address, config.startup_timeout),
            None => Self::spawn(config),
        }
    }

    fn attach(address: SocketAddr, timeout: Duration) -> EngineResult<Self> {
        debug!(target: "contract_case::engine", %address, "attaching to running engine");
        TcpStream::connect_timeout(&address, timeout)
            .map_err(|source| EngineError::Attach { address, source })?;

        Ok(Self {
            address,
            pid: None,
            child: Mutex::new(None),
            log_buffer: Arc::new(Mutex::new(VecDeque::new())),
            log_collector: Mutex::new(None),
        })
    }

    fn spawn(config: &EngineConfig) -> EngineResult<Self> {
        let mut cmd = Command::new(&config.binary_path);
        let mut args = config.extra_args.clone();
        let has_bind_arg = args
            .iter()
            .any(|arg| arg == "--bind-addr" || arg.starts_with("--bind-addr="));
        if !has_bind_arg {
            args.push("--bind-addr".to_string());
            args.push("127.0.0.1:0".to_string());
        }
        cmd.args(args);

        if let Some(dir) = &config.working_directory {
            cmd.current_dir(dir);
        }
        cmd.envs(&config.env);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        debug!(
            target: "contract_case::engine",
            binary = %config.binary_path.display(),
            "spawning engine"
        );
        let mut child = cmd.spawn().map_err(|err| {
            EngineError::start(format!("{}: {err}", config.binary_path.display()))
        })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::start("failed to capture stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::start("failed to capture stderr"))?;

        let (log_tx, log_rx) = mpsc::channel();
        spawn_log_reader(stdout, LogStream::Stdout, log_tx.clone());
        spawn_log_reader(stderr, LogStream::Stderr, log_tx);

        let log_buffer = Arc::new(Mutex::new(VecDeque::new()));
        let address =
            match wait_for_listen_address(&mut child, &log_rx, &log_buffer, config.startup_timeout)
            {
                Ok(address) => address,
                Err(err) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(err);
                }
            };
        let log_collector = spawn_log_collector(log_rx, log_buffer.clone());

        Ok(Self {
            address,
            pid: Some(child.id()),
            child: Mutex::new(Some(child)),
            log_buffer,
            log_collector: Mutex::new(Some(log_collector)),
        })
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Process id of a spawned engine; `None` when attached.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Open a new connection to the engine. Each session owns its own.
    pub fn connect(&self) -> EngineResult<Connection> {
        Connection::open(self.address)
    }

    /// Return the captured engine log lines, up to [`LOG_BUFFER_CAPACITY`] of the latest.
    pub fn logs(&self) -> Vec<LogLine> {
        self.log_buffer
            .lock()
            .map(|buffer| buffer.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn shutdown(&mut self) {
        let child = self
            .child
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(mut child) = child else {
            return;
        };

        let timeout = Duration::from_secs(2);
        if let Ok(mut connection) = Connection::open(self.address) {
            let _ = connection.stream.set_read_timeout(Some(timeout));
            let _ = connection.send(ConnectorRequest::Shutdown);
        }
        let start = Instant::now();
        let mut exited = false;
        while start.elapsed() < timeout {
            if let Ok(Some(_status)) = child.try_wait() {
                exited = true;
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }

        if !exited {
            warn!(
                target: "contract_case::engine",
                pid = child.id(),
                "engine ignored shutdown request; killing"
            );
            let _ = child.kill();
            let _ = child.wait();
        }

        let collector = self
            .log_collector
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = collector {
            let _ = handle.join();
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Framed request/response connection to the engine.
///
/// At most one call is in flight at a time; `send` blocks until the engine
/// answers or the transport fails.
pub struct Connection {
    stream: TcpStream,
    next_id: u64,
}

impl Connection {
    fn open(address: SocketAddr) -> EngineResult<Self> {
        let stream = TcpStream::connect(address)?;
        stream.set_nodelay(true)?;
        Ok(Self { stream, next_id: 1 })
    }

    pub fn send(&mut self, request: ConnectorRequest) -> EngineResult<ConnectorResult> {
        let id = self.next_id;
        self.next_id += 1;
        let operation = request.operation();
        debug!(target: "contract_case::connector", id, operation, "sending request");

        write_message(&mut self.stream, &RequestEnvelope { id, request })?;
        let response: ResponseEnvelope = read_message(&mut self.stream)?;
        if response.id != id {
            return Err(EngineError::ResponseMismatch {
                expected: id,
                received: response.id,
            });
        }

        debug!(
            target: "contract_case::connector",
            id,
            operation,
            result = ?response.result,
            "received result"
        );
        response.result.validate()
    }
}

fn spawn_log_reader<R: std::io::Read + Send + 'static>(
    reader: R,
    stream: LogStream,
    tx: mpsc::Sender<LogLine>,
) {
    thread::spawn(move || {
        let buf_reader = BufReader::new(reader);
        for line in buf_reader.lines().map_while(Result::ok) {
            let _ = tx.send(LogLine {
                stream,
                line: line.trim().to_string(),
            });
        }
    });
}

fn wait_for_listen_address(
    child: &mut Child,
    log_rx: &mpsc::Receiver<LogLine>,
    log_buffer: &Arc<Mutex<VecDeque<LogLine>>>,
    timeout: Duration,
) -> EngineResult<SocketAddr> {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if let Some(status) = child.try_wait()? {
            return Err(EngineError::Exited(status));
        }

        match log_rx.recv_timeout(Duration::from_millis(50)) {
            Ok(line) => {
                if let Ok(mut buffer) = log_buffer.lock() {
                    push_log(&mut buffer, line.clone());
                }
                if let Some(addr) = parse_listen_line(&line.line)? {
                    return Ok(addr);
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    // Both pipes closing usually means the process is on its way out.
    for _ in 0..50 {
        if let Some(status) = child.try_wait()? {
            return Err(EngineError::Exited(status));
        }
        if start.elapsed() >= timeout {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    Err(EngineError::StartupTimeout(timeout))
}

/// Find the announced address in a log line.
///
/// Lines without the marker are `Ok(None)`; a marker followed by garbage is an error.
fn parse_listen_line(line: &str) -> EngineResult<Option<SocketAddr>> {
    let needle = "listening on";
    let lower = line.to_ascii_lowercase();
    let Some(idx) = lower.find(needle) else {
        return Ok(None);
    };
    let after = line[idx + needle.len()..].trim();
    after
        .parse()
        .map(Some)
        .map_err(|_| EngineError::ListenParse(line.to_string()))
}

fn spawn_log_collector(
    log_rx: mpsc::Receiver<LogLine>,
    buffer: Arc<Mutex<VecDeque<LogLine>>>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while let Ok(line) = log_rx.recv() {
            debug!(target: "contract_case::engine", stream = ?line.stream, "{}", line.line);
            if let Ok(mut guard) = buffer.lock() {
                push_log(&mut guard, line);
            }
        }
    })
}

fn push_log(buffer: &mut VecDeque<LogLine>, line: LogLine) {
    if buffer.len() == LOG_BUFFER_CAPACITY {
        buffer.pop_front();
    }
    buffer.push_back(line);
}
