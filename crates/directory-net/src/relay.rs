//! Duplex link to the local relay process
//!
//! Inbound frames are directory record broadcasts. Outbound frames (our own
//! record, and accepted broadcasts being flooded on) go through an mpsc
//! queue drained by a writer task, so senders never touch the socket.

use crate::framing::{FrameCodec, FrameError};
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::path::Path;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, warn};

/// Outbound queue depth
const OUTBOUND_QUEUE: usize = 256;

/// Relay link errors
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),
    #[error("Relay link closed")]
    Closed,
}

/// Connect to the relay's Unix domain socket
pub async fn connect(
    socket_path: impl AsRef<Path>,
) -> Result<(RelaySender, RelayReceiver<UnixStream>), RelayError> {
    let stream = UnixStream::connect(socket_path.as_ref()).await?;
    Ok(split(stream))
}

/// Split any duplex stream into a queued sender and a frame receiver.
///
/// Spawns the writer task; must be called inside a tokio runtime.
pub fn split<S>(stream: S) -> (RelaySender, RelayReceiver<S>)
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let (sink, stream) = Framed::new(stream, FrameCodec::new()).split();
    let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE);

    tokio::spawn(write_loop(sink, rx));

    (RelaySender { tx }, RelayReceiver { stream })
}

async fn write_loop<S>(
    mut sink: SplitSink<Framed<S, FrameCodec>, Bytes>,
    mut rx: mpsc::Receiver<Bytes>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(frame) = rx.recv().await {
        let len = frame.len();
        if let Err(e) = sink.send(frame).await {
            warn!("Relay write failed: {}", e);
            break;
        }
        debug!("Sent {} byte frame to relay", len);
    }
}

/// Cloneable handle for queueing outbound frames
#[derive(Clone, Debug)]
pub struct RelaySender {
    tx: mpsc::Sender<Bytes>,
}

impl RelaySender {
    /// Queue a frame for the relay
    pub async fn send(&self, frame: impl Into<Bytes>) -> Result<(), RelayError> {
        self.tx
            .send(frame.into())
            .await
            .map_err(|_| RelayError::Closed)
    }
}

/// Inbound half of the relay link
pub struct RelayReceiver<S> {
    stream: SplitStream<Framed<S, FrameCodec>>,
}

impl<S> RelayReceiver<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Next inbound frame; `None` once the relay hangs up
    pub async fn recv(&mut self) -> Option<Result<Bytes, FrameError>> {
        self.stream.next().await
    }
}
