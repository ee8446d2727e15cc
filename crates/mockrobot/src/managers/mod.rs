use std::fmt::{self, Display};
use std::sync::Arc;

use async_trait::async_trait;
use mockrobot_common::Result;
use parking_lot::Mutex;

use crate::DriverSettings;

/// The lifecycle state machine and its operations.
pub mod driver;
/// A connected session: the transport link plus its cancellation signal.
pub mod session;
/// Polling of in-flight processes.
pub mod tracker;

pub use session::{CancelSignal, Session};
pub use tracker::{ProcessTracker, StatusProbe, TrackOutcome};

/// Lifecycle state of the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DriverState {
    /// No connection is open.
    Disconnected,
    /// Connected, but the arm has not been homed.
    Connected,
    /// The homing process is running.
    Initializing,
    /// Homed and idle; operations may be executed.
    Ready,
    /// An operation is running.
    Busy,
}

impl Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A byte-stream transport to the onboard software.
///
/// Implementations only move strings: framing and timeouts live here, while
/// encoding and decoding stay with the codec. The driver owns the link; the
/// transport never keeps its own reference to it.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Name of the transport, used in logs.
    const TRANSPORT_NAME: &'static str;

    /// An open connection.
    type Link: Send + 'static;

    /// Opens a connection to `address` on the configured port.
    async fn connect(&self, address: &str, settings: &DriverSettings) -> Result<Self::Link>;

    /// Sends one request and waits for its single reply.
    async fn round_trip(
        link: &mut Self::Link,
        request: &str,
        settings: &DriverSettings,
    ) -> Result<String>;

    /// Closes the connection. Closing an already closed link is not an error.
    async fn close(link: &mut Self::Link);
}

/// Driver for one MockRobot arm.
///
/// All operations take `&self`; share the driver behind an [`Arc`] to call
/// [`MockRobotDriver::abort`] while another task is inside
/// [`MockRobotDriver::execute_operation`].
pub struct MockRobotDriver<T: Transport> {
    transport: T,
    settings: DriverSettings,
    tracker: ProcessTracker,
    lifecycle: Mutex<Lifecycle<T::Link>>,
}

impl<T: Transport> fmt::Debug for MockRobotDriver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lifecycle = self.lifecycle.lock();
        write!(
            f,
            "MockRobotDriver [{} via {}]",
            lifecycle.phase.state(),
            T::TRANSPORT_NAME
        )
    }
}

/// The current phase, tagged with the session it belongs to.
///
/// Every phase except `Disconnected` carries the session, so a connected
/// state without a link cannot be represented.
enum Phase<L> {
    Disconnected,
    Connected(Arc<Session<L>>),
    Initializing(Arc<Session<L>>),
    Ready(Arc<Session<L>>),
    Busy(Arc<Session<L>>),
}

impl<L> Phase<L> {
    fn state(&self) -> DriverState {
        match self {
            Phase::Disconnected => DriverState::Disconnected,
            Phase::Connected(_) => DriverState::Connected,
            Phase::Initializing(_) => DriverState::Initializing,
            Phase::Ready(_) => DriverState::Ready,
            Phase::Busy(_) => DriverState::Busy,
        }
    }

    fn session(&self) -> Option<&Arc<Session<L>>> {
        match self {
            Phase::Disconnected => None,
            Phase::Connected(session)
            | Phase::Initializing(session)
            | Phase::Ready(session)
            | Phase::Busy(session) => Some(session),
        }
    }

    fn into_session(self) -> Option<Arc<Session<L>>> {
        match self {
            Phase::Disconnected => None,
            Phase::Connected(session)
            | Phase::Initializing(session)
            | Phase::Ready(session)
            | Phase::Busy(session) => Some(session),
        }
    }
}

struct Lifecycle<L> {
    phase: Phase<L>,
    /// Bumped by every `abort`, so a connect that was in flight can tell it
    /// has been overtaken.
    epoch: u64,
}
