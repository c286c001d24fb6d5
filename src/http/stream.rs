//! Chunked response bodies produced by a handler-supplied writer.
//!
//! # Responsibilities
//! - Hand handlers a [`StreamWriter`] that buffers writes and sends them
//!   to the client on [`StreamWriter::flush`]
//! - Turn the writer's channel into a streaming `axum` body
//!
//! # Design Decisions
//! - The producer runs on its own task; the response head is returned as
//!   soon as the task is spawned, so the timeout guard bounds only the
//!   handler, not the transfer
//! - Whatever is still buffered when the producer returns `Ok` is flushed;
//!   an `Err` aborts the body so the client sees a truncated transfer
//! - Responses carry a [`StreamedBody`] marker so the capture step records
//!   status and headers without draining the stream

use std::future::Future;
use std::sync::{Arc, Mutex};

use axum::body::{Body, Bytes};
use axum::http::StatusCode;
use axum::response::Response;
use tokio::sync::mpsc;

use crate::error::{Error, Result};

/// Chunks in flight before writers wait on the client.
const CHANNEL_DEPTH: usize = 16;

type Chunk = std::result::Result<Bytes, std::io::Error>;

/// Response extension marking a body that must not be buffered.
#[derive(Debug, Clone, Copy)]
pub struct StreamedBody;

/// Write half of a streamed response.
#[derive(Clone)]
pub struct StreamWriter {
    tx: mpsc::Sender<Chunk>,
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl StreamWriter {
    fn new(tx: mpsc::Sender<Chunk>) -> Self {
        Self {
            tx,
            buffer: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Buffer `data`, returning the number of bytes accepted.
    pub fn write(&self, data: impl AsRef<[u8]>) -> usize {
        let data = data.as_ref();
        self.lock().extend_from_slice(data);
        data.len()
    }

    pub fn write_str(&self, text: &str) -> usize {
        self.write(text.as_bytes())
    }

    /// Send everything buffered so far to the client.
    pub async fn flush(&self) -> Result<()> {
        let chunk = std::mem::take(&mut *self.lock());
        if chunk.is_empty() {
            return Ok(());
        }
        self.tx.send(Ok(Bytes::from(chunk))).await.map_err(|_| Error::StreamClosed)
    }

    /// Whether the client has stopped reading.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn abort(&self, reason: &Error) {
        let _ = self.tx.send(Err(std::io::Error::other(reason.to_string()))).await;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<u8>> {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for StreamWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamWriter")
            .field("buffered", &self.lock().len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Build a response whose body is fed by `produce`.
pub(crate) fn stream_response<F, Fut>(status: StatusCode, produce: F) -> Response
where
    F: FnOnce(StreamWriter) -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Chunk>(CHANNEL_DEPTH);
    let writer = StreamWriter::new(tx);
    let tail = writer.clone();

    tokio::spawn(async move {
        let outcome = match produce(writer).await {
            Ok(()) => tail.flush().await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(()) => {}
            Err(Error::StreamClosed) => tracing::debug!("Client stopped reading a streamed response"),
            Err(e) => {
                tracing::warn!(error = %e, "Streamed response aborted");
                tail.abort(&e).await;
            }
        }
    });

    let chunks = futures_util::stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|chunk| (chunk, rx)) });
    let mut response = Response::new(Body::from_stream(chunks));
    *response.status_mut() = status;
    response.extensions_mut().insert(StreamedBody);
    response
}
