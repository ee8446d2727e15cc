use std::net::Shutdown;

use crate::{DriverSettings, async_trait, managers::Transport};
use async_net::TcpStream;
use futures_lite::{AsyncReadExt, AsyncWriteExt};
use mockrobot_common::error::{ConnectionError, ProtocolError};
use mockrobot_common::Result;
use tracing::{debug, error, info, trace, warn};

#[derive(Default, Debug, Clone, Copy)]
/// Talks to the onboard software over a plain TCP socket.
///
/// Requests go out unframed; a reply is whatever a single read returns, up to
/// [`DriverSettings::max_reply_length`] bytes.
pub struct TcpTransport;

/// An open TCP connection plus its read buffer.
#[derive(Debug)]
pub struct TcpLink {
    stream: TcpStream,
    buffer: Vec<u8>,
}

impl TcpLink {
    /// The underlying stream.
    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }
}

#[async_trait]
impl Transport for TcpTransport {
    const TRANSPORT_NAME: &'static str = "TCP";

    type Link = TcpLink;

    async fn connect(&self, address: &str, settings: &DriverSettings) -> Result<Self::Link> {
        info!("Beginning connection to {}:{}", address, settings.port);
        let timeout = settings.connect_timeout();

        let stream = match tokio::time::timeout(timeout, TcpStream::connect((address, settings.port))).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(ConnectionError::Unreachable {
                    address: address.to_string(),
                    source,
                }
                .into());
            }
            Err(_) => {
                return Err(ConnectionError::ConnectTimeout {
                    address: address.to_string(),
                    timeout,
                }
                .into());
            }
        };

        if let Err(err) = stream.set_nodelay(true) {
            warn!("Could not disable Nagle on {}: {}", address, err);
        }
        match stream.peer_addr() {
            Ok(addr) => debug!("Connected to: {:?}", addr),
            Err(err) => debug!("Connected, peer address unavailable: {}", err),
        }

        Ok(TcpLink {
            stream,
            buffer: vec![0; settings.max_reply_length],
        })
    }

    async fn round_trip(link: &mut Self::Link, request: &str, settings: &DriverSettings) -> Result<String> {
        trace!("Writing {} bytes", request.len());
        link.stream
            .write_all(request.as_bytes())
            .await
            .map_err(ConnectionError::Io)?;
        link.stream.flush().await.map_err(ConnectionError::Io)?;

        let timeout = settings.reply_timeout();
        let read = match tokio::time::timeout(timeout, link.stream.read(&mut link.buffer)).await {
            Ok(read) => read.map_err(ConnectionError::Io)?,
            Err(_) => {
                error!("No reply to `{}` within {:?}", request, timeout);
                return Err(ConnectionError::ReplyTimeout {
                    request: request.to_string(),
                    timeout,
                }
                .into());
            }
        };

        if read == 0 {
            // EOF, meaning the TCP stream has closed.
            info!("Device closed the connection");
            return Err(ConnectionError::Closed.into());
        }
        trace!("Read {} bytes", read);

        match std::str::from_utf8(&link.buffer[..read]) {
            Ok(reply) => Ok(reply.to_string()),
            Err(_) => Err(ProtocolError::InvalidEncoding.into()),
        }
    }

    async fn close(link: &mut Self::Link) {
        if let Err(err) = link.stream.close().await {
            trace!("Closing TCP stream: {}", err);
        }
        // Already shut down by the peer is fine.
        let _ = link.stream.shutdown(Shutdown::Both);
    }
}
