use std::sync::Arc;

use async_trait::async_trait;
use codee::Encoder;
use mockrobot_common::codec::{PercentCodec, decode_process_id, decode_status};
use mockrobot_common::error::{ConnectionError, ProtocolError, SequenceError};
use mockrobot_common::{
    Command, DriverError, OperationRequest, Process, ProcessId, ProcessReply, ProcessStatus,
    Result,
};
use tracing::{debug, error, info, warn};

use super::{
    DriverState, Lifecycle, MockRobotDriver, Phase, ProcessTracker, Session, StatusProbe,
    TrackOutcome, Transport,
};
use crate::DriverSettings;

impl<T: Transport> MockRobotDriver<T> {
    /// Creates a disconnected driver.
    pub fn new(transport: T, settings: DriverSettings) -> Self {
        Self {
            transport,
            tracker: ProcessTracker::from_settings(&settings),
            settings,
            lifecycle: parking_lot::Mutex::new(Lifecycle {
                phase: Phase::Disconnected,
                epoch: 0,
            }),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DriverState {
        self.lifecycle.lock().phase.state()
    }

    /// Address of the open connection, if any.
    pub fn address(&self) -> Option<String> {
        self.lifecycle
            .lock()
            .phase
            .session()
            .map(|session| session.address().to_string())
    }

    /// Settings the driver was built with.
    pub fn settings(&self) -> &DriverSettings {
        &self.settings
    }

    /// The transport used for new connections.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Opens the connection to the onboard software at `address`.
    ///
    /// Fails with [`ConnectionError::AlreadyConnected`] while a session is
    /// open. On any failure the driver stays `Disconnected`.
    pub async fn open_connection(&self, address: &str) -> Result<()> {
        info!("OpenConnection: {}", address);

        let epoch = {
            let lifecycle = self.lifecycle.lock();
            if let Some(session) = lifecycle.phase.session() {
                return Err(ConnectionError::AlreadyConnected {
                    address: session.address().to_string(),
                }
                .into());
            }
            lifecycle.epoch
        };

        let link = match self.transport.connect(address, &self.settings).await {
            Ok(link) => link,
            Err(err) => {
                error!("Failed to connect to {}: {}", address, err);
                return Err(err);
            }
        };
        let session = Arc::new(Session::new(address.to_string(), link));

        // The lock was released while connecting: another open may have won,
        // or an abort may have been issued in the meantime.
        let rejected = {
            let mut lifecycle = self.lifecycle.lock();
            if let Some(current) = lifecycle.phase.session() {
                Some(DriverError::from(ConnectionError::AlreadyConnected {
                    address: current.address().to_string(),
                }))
            } else if lifecycle.epoch != epoch {
                Some(DriverError::Aborted)
            } else {
                lifecycle.phase = Phase::Connected(session.clone());
                None
            }
        };

        if let Some(err) = rejected {
            warn!("Discarding new connection to {}: {}", address, err);
            session.close::<T>().await;
            return Err(err);
        }

        info!(
            "Connection established on {} port {} via {}",
            address,
            self.settings.port,
            T::TRANSPORT_NAME
        );
        Ok(())
    }

    /// Homes the arm.
    ///
    /// Allowed from `Connected` and, to re-home, from `Ready`. The driver is
    /// `Initializing` while the home process runs and ends up `Ready` on
    /// success. A rejected `home` leaves the previous state in place; any
    /// other failure falls back to `Connected`.
    pub async fn initialize(&self) -> Result<()> {
        info!("Initialize");

        let (session, was_ready) = {
            let mut lifecycle = self.lifecycle.lock();
            let (session, was_ready) = match &lifecycle.phase {
                Phase::Disconnected => return Err(SequenceError::NotConnected.into()),
                Phase::Initializing(_) | Phase::Busy(_) => {
                    return Err(SequenceError::OperationInProgress.into());
                }
                Phase::Connected(session) => (session.clone(), false),
                Phase::Ready(session) => {
                    warn!("MockRobot already initialized; homing again");
                    (session.clone(), true)
                }
            };
            lifecycle.phase = Phase::Initializing(session.clone());
            (session, was_ready)
        };

        let outcome = self.run(&session, Command::Home).await;

        let next = match &outcome {
            Ok(()) => Phase::Ready(session.clone()),
            Err(DriverError::DeviceRejection { .. }) if was_ready => Phase::Ready(session.clone()),
            Err(_) => Phase::Connected(session.clone()),
        };
        let outcome = self.settle(&session, outcome, next).await;

        if outcome.is_ok() {
            info!("Initialization finished successfully");
        }
        outcome
    }

    /// Validates and runs a Pick, Place or Transfer from the UI's parallel
    /// parameter arrays.
    ///
    /// The lifecycle check comes first, then request validation; neither
    /// touches the device.
    pub async fn execute_operation<N, V>(&self, operation: &str, names: &[N], values: &[V]) -> Result<()>
    where
        N: AsRef<str>,
        V: AsRef<str>,
    {
        info!(
            "ExecuteOperation: {} {:?} {:?}",
            operation,
            names.iter().map(|name| name.as_ref()).collect::<Vec<&str>>(),
            values.iter().map(|value| value.as_ref()).collect::<Vec<&str>>()
        );

        Self::ready_check(self.state())?;
        let request =
            OperationRequest::from_parallel(operation, names, values, &self.settings.location_range())?;
        self.execute(request).await
    }

    /// Runs a validated request.
    ///
    /// The driver is `Busy` until every command has run; commands run one
    /// after the other and the first failure stops the sequence, so a
    /// Transfer never places after a failed pick. The driver returns to
    /// `Ready` unless the connection itself was lost.
    pub async fn execute(&self, request: OperationRequest) -> Result<()> {
        let session = {
            let mut lifecycle = self.lifecycle.lock();
            Self::ready_check(lifecycle.phase.state())?;
            let Some(session) = lifecycle.phase.session().cloned() else {
                return Err(SequenceError::NotInitialized.into());
            };
            lifecycle.phase = Phase::Busy(session.clone());
            session
        };

        let commands = request.translate();
        debug!("{} expands to {:?}", request.operation(), commands);

        let mut outcome = Ok(());
        for command in commands {
            outcome = self.run(&session, command).await;
            if outcome.is_err() {
                break;
            }
        }

        let next = Phase::Ready(session.clone());
        let outcome = self.settle(&session, outcome, next).await;
        if outcome.is_ok() {
            info!("{} finished successfully", request.operation());
        }
        outcome
    }

    /// Closes the connection and returns to `Disconnected`, whatever the
    /// current state. An operation in flight stops at its next suspension
    /// point and reports [`DriverError::Aborted`]. Never fails.
    pub async fn abort(&self) -> Result<()> {
        info!("Abort");

        let session = {
            let mut lifecycle = self.lifecycle.lock();
            lifecycle.epoch += 1;
            std::mem::replace(&mut lifecycle.phase, Phase::Disconnected).into_session()
        };

        match session {
            Some(session) => {
                session.cancel_signal().cancel();
                session.close::<T>().await;
                info!("Connection to {} aborted", session.address());
            }
            None => debug!("Abort with no open connection"),
        }
        Ok(())
    }

    fn ready_check(state: DriverState) -> Result<()> {
        match state {
            DriverState::Ready => Ok(()),
            DriverState::Busy => Err(SequenceError::OperationInProgress.into()),
            DriverState::Disconnected | DriverState::Connected | DriverState::Initializing => {
                Err(SequenceError::NotInitialized.into())
            }
        }
    }

    /// Submits one process-starting command and tracks it to the end.
    async fn run(&self, session: &Session<T::Link>, command: Command) -> Result<()> {
        let Some(kind) = command.process_kind() else {
            return Err(ProtocolError::UnknownCommand(command.name().to_string()).into());
        };

        let reply = session.send::<T>(&command, &self.settings).await?;
        let process_id = match ProcessReply::from(decode_process_id(&reply)?) {
            ProcessReply::Accepted(id) => id,
            ProcessReply::Rejected(raw) => {
                let command = PercentCodec::encode(&command)?;
                error!("Device rejected `{}` with {}", command, raw);
                return Err(DriverError::DeviceRejection { command, reply: raw });
            }
        };
        info!("{} process started. ProcessID: {}", kind, process_id);

        let mut process = Process::started(process_id, kind);
        let mut probe = SessionProbe::<T> {
            session,
            settings: &self.settings,
        };
        let outcome = self
            .tracker
            .track(&mut process, &mut probe, session.cancel_signal())
            .await?;

        match outcome {
            TrackOutcome::Finished(ProcessStatus::FinishedSuccessfully) => Ok(()),
            TrackOutcome::Finished(_) => Err(DriverError::ProcessFailure { process_id, kind }),
            TrackOutcome::TimedOut { ceiling, .. } => Err(DriverError::Timeout {
                process_id,
                kind,
                ceiling,
            }),
            TrackOutcome::Cancelled => Err(DriverError::Aborted),
        }
    }

    /// Moves out of `Initializing`/`Busy` once an operation is over.
    ///
    /// If the session was aborted meanwhile, nothing is touched and the
    /// caller gets [`DriverError::Aborted`] whatever the device said. Fatal
    /// transport errors end the session instead of moving to `next`.
    async fn settle(&self, session: &Arc<Session<T::Link>>, outcome: Result<()>, next: Phase<T::Link>) -> Result<()> {
        let fatal = outcome.as_ref().err().is_some_and(DriverError::is_fatal);

        let still_current = {
            let mut lifecycle = self.lifecycle.lock();
            let current = lifecycle
                .phase
                .session()
                .is_some_and(|current| Arc::ptr_eq(current, session));
            if current {
                lifecycle.phase = if fatal { Phase::Disconnected } else { next };
            }
            current
        };

        if !still_current {
            debug!("Session was aborted while the operation was running");
            return Err(DriverError::Aborted);
        }

        if let Err(err) = &outcome {
            error!("{}", err);
        }
        if fatal {
            warn!("Connection to {} lost", session.address());
            session.close::<T>().await;
        }
        outcome
    }
}

/// Status queries over the session's link, for the duration of one `track`.
struct SessionProbe<'a, T: Transport> {
    session: &'a Session<T::Link>,
    settings: &'a DriverSettings,
}

#[async_trait]
impl<'a, T: Transport> StatusProbe for SessionProbe<'a, T> {
    async fn query(&mut self, process_id: ProcessId) -> Result<ProcessStatus> {
        let reply = self
            .session
            .send::<T>(&Command::Status(process_id), self.settings)
            .await?;
        let status = decode_status(&reply)?;
        debug!("Status of process_id {}: {}", process_id, status);
        Ok(status)
    }
}
