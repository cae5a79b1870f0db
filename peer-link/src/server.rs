use crate::protocol::{MAX_FRAME_BYTES, Request, Response};
use futures::{SinkExt, StreamExt};
use keygrid::cache::InvalidationCoordinator;
use std::fmt::Debug;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// Accept loop for inbound peer invalidations. Runs until the listener
/// fails; each connection is handled on its own task.
pub async fn serve<V>(
    listener: TcpListener,
    coordinator: Arc<InvalidationCoordinator<V>>,
) -> std::io::Result<()>
where
    V: Debug + Send + Sync + Clone + 'static,
{
    loop {
        let (socket, addr) = listener.accept().await?;
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            tracing::debug!(%addr, "peer connected");

            if let Err(err) = process_connection(socket, coordinator).await {
                tracing::warn!(%addr, error = %err, "peer connection error");
            }
        });
    }
}

async fn process_connection<V>(
    socket: TcpStream,
    coordinator: Arc<InvalidationCoordinator<V>>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    V: Debug + Send + Sync + Clone + 'static,
{
    socket.set_nodelay(true).ok();

    // 4-byte big-endian length prefix splits the stream into frames.
    let codec = LengthDelimitedCodec::builder()
        .length_field_length(4)
        .max_frame_length(MAX_FRAME_BYTES)
        .new_codec();

    let mut framed = Framed::new(socket, codec);

    while let Some(frame_result) = framed.next().await {
        let frame = frame_result?;

        let request = match Request::decode(frame.freeze()) {
            Ok(req) => req,
            Err(e) => {
                tracing::warn!(error = %e, "failed to decode peer request");
                framed.send(Response::Error { msg: e }.encode()).await?;
                continue;
            }
        };

        let response = match request {
            Request::Ping => Response::Pong,

            invalidate @ Request::Invalidate { .. } => {
                // into_message always succeeds for Invalidate.
                let Some(message) = invalidate.into_message() else {
                    continue;
                };
                match coordinator.apply_remote(message).await {
                    Ok(()) => Response::Ok,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to apply remote invalidation");
                        Response::Error { msg: e.to_string() }
                    }
                }
            }
        };

        framed.send(response.encode()).await?;
    }

    Ok(())
}
