use crate::protocol::{MAX_FRAME_BYTES, Request, Response};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use keygrid::cache::InvalidationMessage;
use keygrid::ports::PeerBroadcaster;
use shared::{Error, Result};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(2);

/// Delivers one invalidation message per connection. Retry and backoff are
/// the coordinator's job; a failure here is one failed attempt.
pub struct TcpPeerBroadcaster {
    io_timeout: Duration,
}

impl TcpPeerBroadcaster {
    pub fn new(io_timeout: Duration) -> Self {
        Self { io_timeout }
    }
}

impl Default for TcpPeerBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_IO_TIMEOUT)
    }
}

#[async_trait]
impl PeerBroadcaster for TcpPeerBroadcaster {
    async fn send(&self, peer: &str, message: &InvalidationMessage) -> Result<()> {
        let stream = timeout(self.io_timeout, TcpStream::connect(peer))
            .await
            .map_err(|_| Error::Propagation(format!("connect to {peer} timed out")))?
            .map_err(|e| Error::Propagation(format!("connect to {peer} failed: {e}")))?;
        stream.set_nodelay(true).ok();

        let codec = LengthDelimitedCodec::builder()
            .length_field_length(4)
            .max_frame_length(MAX_FRAME_BYTES)
            .new_codec();
        let mut framed = Framed::new(stream, codec);

        framed
            .send(Request::from_message(message).encode())
            .await
            .map_err(|e| Error::Propagation(format!("send to {peer} failed: {e}")))?;

        let frame = timeout(self.io_timeout, framed.next())
            .await
            .map_err(|_| Error::Propagation(format!("{peer} did not acknowledge in time")))?
            .ok_or_else(|| Error::Propagation(format!("{peer} closed the connection")))?
            .map_err(|e| Error::Propagation(format!("read from {peer} failed: {e}")))?;

        match Response::decode(frame.freeze()).map_err(Error::Propagation)? {
            Response::Ok => Ok(()),
            Response::Error { msg } => Err(Error::Propagation(format!(
                "{peer} rejected invalidation: {msg}"
            ))),
            Response::Pong => Err(Error::Propagation(format!(
                "{peer} sent an unexpected response"
            ))),
        }
    }
}
