//! MockRobot onboard software simulator
//!
//! Speaks the same text protocol as the arm's controller so the driver can be
//! exercised without hardware:
//! - `home`, `pick%<n>`, `place%<n>` - start a process, reply with its id, or
//!   `-1` while another process is running
//! - `status%<id>` - reply with the process status literal
//!
//! Processes run for a fixed duration. Picks and places at a location outside
//! the configured range still start, but end `Terminated With Error`.

use std::collections::BTreeMap;
use std::io;
use std::net::SocketAddr;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::{Duration, Instant};

use codee::Decoder;
use mockrobot_common::codec::PercentCodec;
use mockrobot_common::{Command, Location, ProcessId, ProcessKind, ProcessStatus};
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::{debug, error, info, warn};

/// Reply to a process-starting command while another process is running.
pub const BUSY_REPLY: &str = "-1";
/// Reply to `status` for an id the device never handed out.
pub const UNKNOWN_PROCESS_REPLY: &str = "Unknown Process";
/// Reply to anything that is not a valid command.
pub const UNKNOWN_COMMAND_REPLY: &str = "Unknown Command";

const HISTORY_LEN: usize = 100;
const MAX_PROCESSES: usize = 100;

/// How the simulated device behaves.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimulatorSettings {
    /// How long every process stays `In Progress`.
    pub process_duration: Duration,
    /// Locations the arm can reach.
    pub locations: RangeInclusive<i64>,
}

impl Default for SimulatorSettings {
    fn default() -> Self {
        Self {
            process_duration: Duration::from_secs(2),
            locations: 1..=17,
        }
    }
}

#[derive(Debug)]
struct SimProcess {
    kind: ProcessKind,
    started: Instant,
    fails: bool,
}

/// Simulator state - tracks processes and command history
#[derive(Debug)]
pub struct DeviceState {
    settings: SimulatorSettings,
    next_id: u64,
    running: Option<ProcessId>,
    processes: BTreeMap<ProcessId, SimProcess>,
    command_history: Vec<String>,
}

impl DeviceState {
    /// A freshly powered device with no processes.
    pub fn new(settings: SimulatorSettings) -> Self {
        Self {
            settings,
            next_id: 1,
            running: None,
            processes: BTreeMap::new(),
            command_history: Vec::new(),
        }
    }

    /// Answers one request as the device would at time `now`.
    pub fn handle(&mut self, request: &str, now: Instant) -> String {
        self.add_command(request.to_string());
        self.refresh(now);

        let command: Command = match PercentCodec::decode(request) {
            Ok(command) => command,
            Err(err) => {
                warn!("Rejecting `{}`: {}", request, err);
                return UNKNOWN_COMMAND_REPLY.to_string();
            }
        };

        match command {
            Command::Home => self.start(ProcessKind::Home, None, now),
            Command::Pick(location) => self.start(ProcessKind::Pick, Some(location), now),
            Command::Place(location) => self.start(ProcessKind::Place, Some(location), now),
            Command::Status(id) => match self.status(id, now) {
                Some(status) => status.as_wire().to_string(),
                None => UNKNOWN_PROCESS_REPLY.to_string(),
            },
        }
    }

    /// Status of `id` at time `now`, `None` if the id was never handed out or
    /// is older than the last 100 processes.
    pub fn status(&self, id: ProcessId, now: Instant) -> Option<ProcessStatus> {
        self.processes.get(&id).map(|process| self.status_of(process, now))
    }

    /// The process currently blocking new commands, if any.
    pub fn running(&self) -> Option<ProcessId> {
        self.running
    }

    /// Requests received so far, oldest first (the last 100 are kept).
    pub fn command_history(&self) -> &[String] {
        &self.command_history
    }

    fn start(&mut self, kind: ProcessKind, location: Option<Location>, now: Instant) -> String {
        if let Some(running) = self.running {
            info!("{} refused: process {} still running", kind, running);
            return BUSY_REPLY.to_string();
        }

        let fails = location.is_some_and(|Location(n)| !self.settings.locations.contains(&n));
        let id = ProcessId::new(self.next_id);
        self.next_id += 1;
        self.processes.insert(
            id,
            SimProcess {
                kind,
                started: now,
                fails,
            },
        );
        self.running = Some(id);
        while self.processes.len() > MAX_PROCESSES {
            self.processes.pop_first();
        }

        match location {
            Some(location) => info!("{} process {} started at location {}", kind, id, location),
            None => info!("{} process {} started", kind, id),
        }
        if fails {
            warn!("Location out of reach; process {} will terminate with error", id);
        }
        id.to_string()
    }

    fn status_of(&self, process: &SimProcess, now: Instant) -> ProcessStatus {
        if now.saturating_duration_since(process.started) < self.settings.process_duration {
            ProcessStatus::InProgress
        } else if process.fails {
            ProcessStatus::TerminatedWithError
        } else {
            ProcessStatus::FinishedSuccessfully
        }
    }

    fn refresh(&mut self, now: Instant) {
        let Some(id) = self.running else {
            return;
        };
        if let Some(process) = self.processes.get(&id) {
            let status = self.status_of(process, now);
            if status.is_terminal() {
                debug!("{} process {} done: {}", process.kind, id, status);
                self.running = None;
            }
        }
    }

    fn add_command(&mut self, cmd: String) {
        self.command_history.push(cmd);
        if self.command_history.len() > HISTORY_LEN {
            self.command_history.remove(0);
        }
    }
}

/// The device state shared by every connection.
pub type SharedState = Arc<Mutex<DeviceState>>;

/// A TCP server playing the part of the arm's controller.
pub struct Simulator {
    listener: TcpListener,
    state: SharedState,
}

impl Simulator {
    /// Binds the listening socket.
    pub async fn bind(addr: impl ToSocketAddrs, settings: SimulatorSettings) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            state: Arc::new(Mutex::new(DeviceState::new(settings))),
        })
    }

    /// Address the simulator accepts connections on.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Shared device state, for inspection.
    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    /// Accepts connections until the task is dropped. Every connection talks
    /// to the same device.
    pub async fn run(self) -> io::Result<()> {
        loop {
            let (stream, peer) = self.listener.accept().await?;
            info!("Client connected: {}", peer);
            tokio::spawn(serve_connection(stream, peer, self.state.clone()));
        }
    }
}

async fn serve_connection(mut stream: TcpStream, peer: SocketAddr, state: SharedState) {
    let mut buffer = vec![0; 1024];
    loop {
        let read = match stream.read(&mut buffer).await {
            Ok(0) => {
                info!("Client disconnected: {}", peer);
                break;
            }
            Ok(read) => read,
            Err(err) => {
                error!("Read from {} failed: {}", peer, err);
                break;
            }
        };

        let request = String::from_utf8_lossy(&buffer[..read]);
        let reply = state.lock().handle(&request, Instant::now());
        debug!("{} -> `{}`", request, reply);

        if let Err(err) = stream.write_all(reply.as_bytes()).await {
            error!("Write to {} failed: {}", peer, err);
            break;
        }
    }
}
