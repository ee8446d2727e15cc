#![deny(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    clippy::unwrap_used
)]

/*!
A device driver for the MockRobot arm.

The onboard software speaks a small text protocol over TCP: `home`, `pick%N`
and `place%N` start a process and answer with its id, `status%id` reports how
that process is doing. This crate wraps it in a lifecycle the laboratory
scheduler understands:

`Disconnected -> Connected -> Initializing -> Ready <-> Busy`

Every call can be issued from any task; [`MockRobotDriver::abort`] is always
available and cancels whatever is in flight.

## Example
```rust,no_run
use mockrobot::{DriverSettings, TcpDriver, TcpTransport};

#[tokio::main]
async fn main() -> mockrobot::Result<()> {
    let driver = TcpDriver::new(TcpTransport, DriverSettings::default());

    driver.open_connection("192.168.0.20").await?;
    driver.initialize().await?;
    driver
        .execute_operation(
            "Transfer",
            &["Source Location", "Destination Location"],
            &["10", "5"],
        )
        .await?;
    driver.abort().await
}
```

Tests and simulations can swap the TCP socket for a [`ScriptedTransport`],
which answers from a queue of canned replies.
*/

/// A string-returning facade over the driver.
pub mod bridge;
/// The driver state machine, its sessions and the process tracker.
pub mod managers;
/// A transport answering from a script, for tests and dry runs.
pub mod scripted;
/// Driver settings and how to load them.
pub mod settings;
/// A TCP transport built on `async-net`.
#[cfg(feature = "tcp")]
pub mod tcp;

pub use async_trait::async_trait;
pub use bridge::DriverBridge;
pub use managers::{DriverState, MockRobotDriver, Transport};
pub use mockrobot_common::{
    Command, ConnectionError, DriverError, Location, Operation, OperationRequest, ParameterName,
    Process, ProcessId, ProcessKind, ProcessStatus, ProtocolError, Result, SequenceError,
    ValidationError, codec,
};
pub use scripted::{ScriptedReply, ScriptedTransport};
pub use settings::{DriverSettings, SettingsError};
#[cfg(feature = "tcp")]
pub use tcp::TcpTransport;

/// A driver talking to the arm over TCP.
#[cfg(feature = "tcp")]
pub type TcpDriver = MockRobotDriver<TcpTransport>;
