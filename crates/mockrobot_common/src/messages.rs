use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

use crate::error::ProtocolError;

/// Status strings exactly as the onboard software sends them.
pub const STATUS_IN_PROGRESS: &str = "In Progress";
/// Terminal success literal.
pub const STATUS_FINISHED_SUCCESSFULLY: &str = "Finished Successfully";
/// Terminal failure literal.
pub const STATUS_TERMINATED_WITH_ERROR: &str = "Terminated With Error";

/// A location on the deck the arm can pick from or place to.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Location(pub i64);

impl Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Serialize, Deserialize, Hash, PartialEq, Eq, Clone, Copy, Debug, PartialOrd, Ord)]
/// Identifier of a process accepted by the device.
///
/// Always non-negative: negative replies are rejections and never become a
/// [`ProcessId`].
pub struct ProcessId(u64);

impl ProcessId {
    /// Wraps a raw identifier.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw identifier as sent on the wire.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a process is doing on the arm.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProcessKind {
    /// Homing sequence started by `Initialize`.
    Home,
    /// Picking up from a source location.
    Pick,
    /// Putting down at a destination location.
    Place,
}

impl Display for ProcessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessKind::Home => "Home",
            ProcessKind::Pick => "Pick",
            ProcessKind::Place => "Place",
        };
        f.write_str(name)
    }
}

/// Status of a process as reported by `status%<id>`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProcessStatus {
    /// Still running.
    InProgress,
    /// Terminal: completed.
    FinishedSuccessfully,
    /// Terminal: the device gave up.
    TerminatedWithError,
}

impl ProcessStatus {
    /// Whether no further change is possible.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProcessStatus::InProgress)
    }

    /// The wire literal for this status.
    pub fn as_wire(&self) -> &'static str {
        match self {
            ProcessStatus::InProgress => STATUS_IN_PROGRESS,
            ProcessStatus::FinishedSuccessfully => STATUS_FINISHED_SUCCESSFULLY,
            ProcessStatus::TerminatedWithError => STATUS_TERMINATED_WITH_ERROR,
        }
    }
}

impl Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// One asynchronous remote operation accepted by the device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Process {
    id: ProcessId,
    kind: ProcessKind,
    status: ProcessStatus,
}

impl Process {
    /// A freshly accepted process. The device only hands out ids for work it started.
    pub fn started(id: ProcessId, kind: ProcessKind) -> Self {
        Self {
            id,
            kind,
            status: ProcessStatus::InProgress,
        }
    }

    /// Id the device assigned when the process started.
    pub fn id(&self) -> ProcessId {
        self.id
    }

    /// Which command started the process.
    pub fn kind(&self) -> ProcessKind {
        self.kind
    }

    /// Last status recorded; fixed once it is terminal.
    pub fn status(&self) -> ProcessStatus {
        self.status
    }

    /// Records a polled status.
    ///
    /// A terminal status is final; a poll reporting anything else afterwards is
    /// a protocol violation and leaves the recorded status untouched.
    pub fn record(&mut self, status: ProcessStatus) -> Result<(), ProtocolError> {
        if self.status.is_terminal() && status != self.status {
            return Err(ProtocolError::TerminalStatusChanged { process_id: self.id });
        }
        self.status = status;
        Ok(())
    }
}

/// Reply to a process-starting command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcessReply {
    /// The device started a process with this id.
    Accepted(ProcessId),
    /// The device refused: another process is already running.
    Rejected(i64),
}

impl From<i64> for ProcessReply {
    fn from(raw: i64) -> Self {
        match u64::try_from(raw) {
            Ok(id) => ProcessReply::Accepted(ProcessId::new(id)),
            Err(_) => ProcessReply::Rejected(raw),
        }
    }
}

/// A command understood by the onboard software.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Move to the home position. Replies with a process id.
    Home,
    /// Pick from a location. Replies with a process id.
    Pick(Location),
    /// Place at a location. Replies with a process id.
    Place(Location),
    /// Query a process. Replies with a status literal.
    Status(ProcessId),
}

impl Command {
    /// Command name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Home => "home",
            Command::Pick(_) => "pick",
            Command::Place(_) => "place",
            Command::Status(_) => "status",
        }
    }

    /// Ordered parameters in their wire form.
    pub fn params(&self) -> Vec<String> {
        match self {
            Command::Home => Vec::new(),
            Command::Pick(location) | Command::Place(location) => vec![location.to_string()],
            Command::Status(id) => vec![id.to_string()],
        }
    }

    /// The kind of process this command starts, `None` for `status`.
    pub fn process_kind(&self) -> Option<ProcessKind> {
        match self {
            Command::Home => Some(ProcessKind::Home),
            Command::Pick(_) => Some(ProcessKind::Pick),
            Command::Place(_) => Some(ProcessKind::Place),
            Command::Status(_) => None,
        }
    }
}
