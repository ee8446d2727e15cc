//! Error taxonomy for the MockRobot driver.
//!
//! Every public driver operation returns [`DriverError`] on failure. The UI
//! boundary turns it into a plain description with `to_string()`, so the
//! `Display` text of each variant is what the operator reads.

use std::time::Duration;

use thiserror::Error;

use crate::messages::{ProcessId, ProcessKind};

/// Result type alias using [`DriverError`].
pub type Result<T> = std::result::Result<T, DriverError>;

/// Top level error returned by driver operations.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The transport could not be opened, or failed while in use.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// The call is not legal in the current lifecycle state.
    #[error(transparent)]
    Sequence(#[from] SequenceError),

    /// The operation request was rejected before contacting the device.
    #[error("Validation Error: {0}")]
    Validation(#[from] ValidationError),

    /// The device sent something the protocol does not allow.
    #[error("Protocol Error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The device answered a process-starting command with a negative id.
    #[error(
        "device rejected `{command}` (reply {reply}): another process is already running, \
         wait for it to complete and try again"
    )]
    DeviceRejection {
        /// Wire form of the rejected command.
        command: String,
        /// The negative identifier the device returned.
        reply: i64,
    },

    /// The process reached `Terminated With Error`.
    #[error("{kind} process {process_id} terminated with error")]
    ProcessFailure {
        /// Identifier of the failed process.
        process_id: ProcessId,
        /// What the process was doing.
        kind: ProcessKind,
    },

    /// The polling ceiling elapsed before the process reached a terminal status.
    #[error(
        "{kind} process {process_id} did not finish within {ceiling:?}; it may still be running \
         on the device, consider a hard reset of the instrument"
    )]
    Timeout {
        /// Identifier of the process that was being tracked.
        process_id: ProcessId,
        /// What the process was doing.
        kind: ProcessKind,
        /// The ceiling that was exceeded.
        ceiling: Duration,
    },

    /// `Abort` was called while the operation was in flight.
    #[error("operation aborted")]
    Aborted,
}

impl DriverError {
    /// Whether this error means the connection itself is gone.
    ///
    /// Fatal errors end the session: the driver drops the link and returns to
    /// `Disconnected` instead of reverting to `Connected`/`Ready`. A reply
    /// timeout counts, since a late reply would be read as the answer to the
    /// next request.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DriverError::Connection(
                ConnectionError::Closed | ConnectionError::Io(_) | ConnectionError::ReplyTimeout { .. }
            )
        )
    }
}

/// Failures of the transport layer.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// `OpenConnection` was called while a session is open.
    #[error(
        "already connected to {address}; press 'Abort' to close the current connection before \
         opening a new one"
    )]
    AlreadyConnected {
        /// Address of the open session.
        address: String,
    },

    /// The remote host could not be reached.
    #[error("failed to connect to {address}: {source}")]
    Unreachable {
        /// Address that was dialed.
        address: String,
        /// Underlying socket error.
        #[source]
        source: std::io::Error,
    },

    /// Connecting took longer than the configured timeout.
    #[error("timed out after {}ms connecting to {address}", timeout.as_millis())]
    ConnectTimeout {
        /// Address that was dialed.
        address: String,
        /// The configured connect timeout.
        timeout: Duration,
    },

    /// No reply arrived within the configured reply timeout. The connection
    /// is dropped, since a late reply would answer the next request.
    #[error(
        "timed out after {}ms waiting for a reply to `{request}`; connection closed, open it \
         again to continue",
        timeout.as_millis()
    )]
    ReplyTimeout {
        /// The request that went unanswered.
        request: String,
        /// The configured reply timeout.
        timeout: Duration,
    },

    /// The peer closed the connection.
    #[error("connection closed by the device")]
    Closed,

    /// I/O error on an open connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Calls issued in a lifecycle state that forbids them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SequenceError {
    /// No connection is open.
    #[error("not connected")]
    NotConnected,

    /// The arm has not been homed in this session.
    #[error("not initialized")]
    NotInitialized,

    /// Another `Initialize`/`ExecuteOperation` is in flight.
    #[error("operation already in progress")]
    OperationInProgress,
}

/// Problems with an operation request detected before any device contact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The operation name is not one of Pick, Place, Transfer.
    #[error("invalid operation `{0}`; supported operations are Pick, Place, and Transfer")]
    UnknownOperation(String),

    /// The parameter arrays are not index aligned.
    #[error("{names} parameter names but {values} parameter values")]
    MismatchedParameters {
        /// Length of the name array.
        names: usize,
        /// Length of the value array.
        values: usize,
    },

    /// A parameter name other than `Source Location`/`Destination Location`.
    #[error(
        "invalid parameter name `{0}`; valid names are \"Source Location\" and \
         \"Destination Location\""
    )]
    UnknownParameter(String),

    /// The same parameter name appeared twice.
    #[error("parameter `{0}` given more than once")]
    DuplicateParameter(&'static str),

    /// The value is not an integer location.
    #[error("invalid value `{value}` for `{name}`; expected an integer location")]
    InvalidValue {
        /// Parameter the value was given for.
        name: &'static str,
        /// The raw value.
        value: String,
    },

    /// The location is outside the configured range.
    #[error("location {value} for `{name}` is outside the valid range {min}..={max}")]
    LocationOutOfRange {
        /// Parameter the value was given for.
        name: &'static str,
        /// The parsed location.
        value: i64,
        /// Lowest valid location.
        min: i64,
        /// Highest valid location.
        max: i64,
    },

    /// The operation needs a parameter that was not supplied.
    #[error("{operation} requires parameter `{name}`")]
    MissingParameter {
        /// Operation being validated.
        operation: &'static str,
        /// The missing parameter.
        name: &'static str,
    },
}

/// Wire-level protocol violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A command name or parameter contains the `%` separator.
    #[error("`{0}` contains the reserved separator '%'")]
    ReservedSeparator(String),

    /// A process-starting command got a reply that is not an integer.
    #[error("expected a process id, got `{0}`")]
    MalformedProcessId(String),

    /// A status query got a reply outside the three status literals.
    #[error("unexpected status reply `{0}`")]
    UnknownStatus(String),

    /// The command name is not one the onboard software understands, or does
    /// not start a process where one was expected.
    #[error("unknown command `{0}`")]
    UnknownCommand(String),

    /// A known command with the wrong number of parameters or an unparsable one.
    #[error("malformed `{name}` command: `{request}`")]
    MalformedCommand {
        /// Name of the command.
        name: &'static str,
        /// The full request as received.
        request: String,
    },

    /// A reply was not valid UTF-8.
    #[error("reply is not valid text")]
    InvalidEncoding,

    /// A terminal process reported a different status later.
    #[error("process {process_id} changed status after reaching a terminal state")]
    TerminalStatusChanged {
        /// Process whose status changed.
        process_id: ProcessId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_errors_use_plain_descriptions() {
        let err: DriverError = SequenceError::OperationInProgress.into();
        assert_eq!(err.to_string(), "operation already in progress");
        let err: DriverError = SequenceError::NotInitialized.into();
        assert_eq!(err.to_string(), "not initialized");
        let err: DriverError = SequenceError::NotConnected.into();
        assert_eq!(err.to_string(), "not connected");
    }

    #[test]
    fn timeouts_print_sub_second_durations() {
        let err = DriverError::Timeout {
            process_id: ProcessId::new(4),
            kind: ProcessKind::Pick,
            ceiling: Duration::from_millis(250),
        };
        assert!(err.to_string().starts_with("Pick process 4 did not finish within 250ms;"));

        let err = DriverError::Timeout {
            process_id: ProcessId::new(1),
            kind: ProcessKind::Home,
            ceiling: Duration::from_secs(120),
        };
        assert!(err.to_string().contains("within 120s;"));
    }

    #[test]
    fn reply_timeout_says_the_connection_is_gone() {
        let err = DriverError::from(ConnectionError::ReplyTimeout {
            request: "status%7".into(),
            timeout: Duration::from_millis(1000),
        });
        assert_eq!(
            err.to_string(),
            "timed out after 1000ms waiting for a reply to `status%7`; connection closed, open it \
             again to continue"
        );
    }

    #[test]
    fn only_transport_failures_are_fatal() {
        assert!(DriverError::from(ConnectionError::Closed).is_fatal());
        assert!(
            DriverError::from(ConnectionError::Io(std::io::ErrorKind::BrokenPipe.into())).is_fatal()
        );
        assert!(
            DriverError::from(ConnectionError::ReplyTimeout {
                request: "home".into(),
                timeout: Duration::from_secs(1),
            })
            .is_fatal()
        );
        assert!(!DriverError::from(ConnectionError::AlreadyConnected { address: "a".into() }).is_fatal());
        assert!(!DriverError::from(ProtocolError::UnknownStatus("?".into())).is_fatal());
        assert!(!DriverError::Aborted.is_fatal());
    }
}
