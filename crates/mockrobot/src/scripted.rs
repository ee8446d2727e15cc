use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use crate::{DriverSettings, async_trait, managers::Transport};
use mockrobot_common::error::ConnectionError;
use mockrobot_common::Result;
use parking_lot::Mutex;
use tracing::{debug, trace};

/// One scripted answer from the fake device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptedReply {
    /// Reply immediately with this text.
    Text(String),
    /// Reply with this text after a delay.
    Delayed(Duration, String),
    /// Never reply; the round trip fails once the reply timeout elapses.
    Silence,
    /// The device closes the connection.
    Hangup,
}

impl ScriptedReply {
    /// An immediate text reply.
    pub fn text(reply: impl Into<String>) -> Self {
        Self::Text(reply.into())
    }
}

impl From<&str> for ScriptedReply {
    fn from(reply: &str) -> Self {
        Self::text(reply)
    }
}

#[derive(Debug, Default)]
struct Script {
    replies: VecDeque<ScriptedReply>,
    idle: Option<String>,
    refuse: bool,
    connect_delay: Option<Duration>,
    requests: Vec<String>,
    connects: Vec<String>,
    closes: usize,
}

/// In-memory transport that answers every request from a script.
///
/// Clones share the same script, so a test can keep one handle to inspect
/// what the driver sent while the driver owns the other. Once the script
/// runs dry the idle reply is used, or silence when there is none.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl std::fmt::Debug for ScriptedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let script = self.script.lock();
        write!(
            f,
            "ScriptedTransport [{} queued, {} sent]",
            script.replies.len(),
            script.requests.len()
        )
    }
}

impl ScriptedTransport {
    /// A transport with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport answering with `replies`, in order.
    pub fn with_replies<I, R>(replies: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<ScriptedReply>,
    {
        let transport = Self::new();
        transport.push_all(replies);
        transport
    }

    /// Queues one more reply.
    pub fn push(&self, reply: impl Into<ScriptedReply>) {
        self.script.lock().replies.push_back(reply.into());
    }

    /// Queues several replies.
    pub fn push_all<I, R>(&self, replies: I)
    where
        I: IntoIterator<Item = R>,
        R: Into<ScriptedReply>,
    {
        self.script
            .lock()
            .replies
            .extend(replies.into_iter().map(Into::into));
    }

    /// Reply used once the script is exhausted.
    pub fn set_idle_reply(&self, reply: Option<&str>) {
        self.script.lock().idle = reply.map(str::to_string);
    }

    /// Makes every following `connect` fail as if the host were unreachable.
    pub fn refuse_connections(&self, refuse: bool) {
        self.script.lock().refuse = refuse;
    }

    /// Makes every following `connect` take `delay` before completing.
    pub fn delay_connections(&self, delay: Option<Duration>) {
        self.script.lock().connect_delay = delay;
    }

    /// Requests received so far, in wire form.
    pub fn requests(&self) -> Vec<String> {
        self.script.lock().requests.clone()
    }

    /// Addresses connected to so far.
    pub fn connects(&self) -> Vec<String> {
        self.script.lock().connects.clone()
    }

    /// Number of links closed so far.
    pub fn closes(&self) -> usize {
        self.script.lock().closes
    }

    /// Replies still queued.
    pub fn remaining(&self) -> usize {
        self.script.lock().replies.len()
    }
}

/// A connection handed out by [`ScriptedTransport`].
#[derive(Debug)]
pub struct ScriptedLink {
    script: Arc<Mutex<Script>>,
    open: bool,
}

#[async_trait]
impl Transport for ScriptedTransport {
    const TRANSPORT_NAME: &'static str = "Scripted";

    type Link = ScriptedLink;

    async fn connect(&self, address: &str, settings: &DriverSettings) -> Result<Self::Link> {
        let delay = self.script.lock().connect_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut script = self.script.lock();
        if script.refuse {
            return Err(ConnectionError::Unreachable {
                address: address.to_string(),
                source: io::ErrorKind::ConnectionRefused.into(),
            }
            .into());
        }
        script.connects.push(address.to_string());
        debug!("Scripted connection to {}:{}", address, settings.port);

        Ok(ScriptedLink {
            script: self.script.clone(),
            open: true,
        })
    }

    async fn round_trip(link: &mut Self::Link, request: &str, settings: &DriverSettings) -> Result<String> {
        if !link.open {
            return Err(ConnectionError::Closed.into());
        }

        let reply = {
            let mut script = link.script.lock();
            script.requests.push(request.to_string());
            match script.replies.pop_front() {
                Some(reply) => reply,
                None => match &script.idle {
                    Some(idle) => ScriptedReply::Text(idle.clone()),
                    None => ScriptedReply::Silence,
                },
            }
        };
        trace!("Scripted reply to `{}`: {:?}", request, reply);

        match reply {
            ScriptedReply::Text(text) => Ok(text),
            ScriptedReply::Delayed(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            ScriptedReply::Silence => {
                let timeout = settings.reply_timeout();
                tokio::time::sleep(timeout).await;
                Err(ConnectionError::ReplyTimeout {
                    request: request.to_string(),
                    timeout,
                }
                .into())
            }
            ScriptedReply::Hangup => {
                link.open = false;
                Err(ConnectionError::Closed.into())
            }
        }
    }

    async fn close(link: &mut Self::Link) {
        if link.open {
            link.open = false;
            link.script.lock().closes += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockrobot_common::DriverError;

    fn settings() -> DriverSettings {
        DriverSettings {
            reply_timeout_ms: 5,
            ..DriverSettings::default()
        }
    }

    #[tokio::test]
    async fn replies_come_from_the_script_then_the_idle_reply() {
        let transport = ScriptedTransport::with_replies(["42", "In Progress"]);
        transport.set_idle_reply(Some("Finished Successfully"));
        let settings = settings();

        let mut link = transport.connect("10.0.0.7", &settings).await.unwrap();
        assert_eq!(ScriptedTransport::round_trip(&mut link, "home", &settings).await.unwrap(), "42");
        assert_eq!(
            ScriptedTransport::round_trip(&mut link, "status%42", &settings).await.unwrap(),
            "In Progress"
        );
        assert_eq!(
            ScriptedTransport::round_trip(&mut link, "status%42", &settings).await.unwrap(),
            "Finished Successfully"
        );

        assert_eq!(transport.requests(), ["home", "status%42", "status%42"]);
        assert_eq!(transport.connects(), ["10.0.0.7"]);
    }

    #[tokio::test]
    async fn silence_becomes_a_reply_timeout() {
        let transport = ScriptedTransport::new();
        let settings = settings();
        let mut link = transport.connect("host", &settings).await.unwrap();

        let err = ScriptedTransport::round_trip(&mut link, "home", &settings).await.unwrap_err();
        assert!(matches!(
            err,
            DriverError::Connection(ConnectionError::ReplyTimeout { .. })
        ));
    }

    #[tokio::test]
    async fn hangup_closes_the_link_for_good() {
        let transport = ScriptedTransport::with_replies([ScriptedReply::Hangup, "7".into()]);
        let settings = settings();
        let mut link = transport.connect("host", &settings).await.unwrap();

        for _ in 0..2 {
            let err = ScriptedTransport::round_trip(&mut link, "home", &settings).await.unwrap_err();
            assert!(matches!(err, DriverError::Connection(ConnectionError::Closed)));
        }
        assert_eq!(transport.remaining(), 1);

        // The peer already hung up, so there is nothing left to close.
        ScriptedTransport::close(&mut link).await;
        assert_eq!(transport.closes(), 0);
    }

    #[tokio::test]
    async fn refused_connections_are_unreachable() {
        let transport = ScriptedTransport::new();
        transport.refuse_connections(true);

        let err = transport.connect("host", &settings()).await.unwrap_err();
        assert!(matches!(
            err,
            DriverError::Connection(ConnectionError::Unreachable { .. })
        ));
        assert!(transport.connects().is_empty());
    }
}
