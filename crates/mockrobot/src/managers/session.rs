use std::future::Future;

use codee::Encoder;
use mockrobot_common::codec::PercentCodec;
use mockrobot_common::{Command, DriverError, Result};
use tokio::sync::{Mutex, watch};
use tracing::{debug, trace};

use super::Transport;
use crate::DriverSettings;

/// One-shot cancellation flag observed by every suspension point of an
/// operation.
#[derive(Debug)]
pub struct CancelSignal {
    tx: watch::Sender<bool>,
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelSignal {
    /// A signal that has not fired.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// Fires the signal. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Whether [`Self::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the signal has fired.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Runs `fut` unless the signal fires first, in which case the future is
    /// dropped and [`DriverError::Aborted`] is returned.
    pub async fn guard<F, R>(&self, fut: F) -> Result<R>
    where
        F: Future<Output = Result<R>>,
    {
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(DriverError::Aborted),
            result = fut => result,
        }
    }
}

/// An open connection to the arm, from `OpenConnection` to `Abort`.
///
/// The link sits behind an async lock so a single round trip owns it at a
/// time; nothing outside the session keeps it between calls.
pub struct Session<L> {
    address: String,
    link: Mutex<L>,
    cancel: CancelSignal,
}

impl<L: Send + 'static> Session<L> {
    pub(crate) fn new(address: String, link: L) -> Self {
        Self {
            address,
            link: Mutex::new(link),
            cancel: CancelSignal::new(),
        }
    }

    /// Address the session is connected to.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Cancellation signal fired by `Abort`.
    pub fn cancel_signal(&self) -> &CancelSignal {
        &self.cancel
    }

    /// Encodes `command`, sends it and returns the raw reply.
    ///
    /// Gives up with [`DriverError::Aborted`] as soon as the session is
    /// cancelled, releasing the link.
    pub(crate) async fn send<T>(&self, command: &Command, settings: &DriverSettings) -> Result<String>
    where
        T: Transport<Link = L>,
    {
        let request = PercentCodec::encode(command)?;
        self.cancel
            .guard(async {
                let mut link = self.link.lock().await;
                debug!("Sending `{}` to {}", request, self.address);
                let reply = T::round_trip(&mut link, &request, settings).await?;
                trace!("Reply to `{}`: {:?}", request, reply);
                Ok(reply)
            })
            .await
    }

    /// Closes the link once no round trip holds it.
    pub(crate) async fn close<T>(&self)
    where
        T: Transport<Link = L>,
    {
        let mut link = self.link.lock().await;
        T::close(&mut link).await;
        debug!("Closed {} link to {}", T::TRANSPORT_NAME, self.address);
    }
}
