//! FIFO request pipelining over a single connection
//!
//! The protocol carries no request IDs: the server answers strictly in the
//! order requests arrive. The pipeline exploits that by splitting the socket
//! into a writer task and a reader task joined by a bounded queue of
//! expectations. Submitters enqueue encoded bytes plus the operation tags
//! those bytes contain; the writer sends the bytes and forwards the tags; the
//! reader decodes one response per tag and completes the submitter's channel.
//! Whatever order submissions enter the write queue is the order responses
//! come back in.
//!
//! A batch is written as one contiguous buffer and completed as one unit, so
//! its responses are never interleaved with another submitter's.
//!
//! # Example
//!
//! ```rust,ignore
//! use quotr_client::{Pipeline, PipelineConfig};
//! use quotr_protocol::{Request, ValueSize};
//!
//! let pipeline = Pipeline::connect("localhost:9000", ValueSize::U16, PipelineConfig::default()).await?;
//! let response = pipeline.send(Request::Query { key: "user:42".into() }).await?;
//! pipeline.close();
//! ```

use crate::framing::FrameReader;
use crate::{Error, Result};
use bytes::{Bytes, BytesMut};
use quotr_protocol::{Request, RequestType, Response, ValueSize};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, trace, warn};

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for a pipelined connection
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Idle limit while waiting for the next response byte
    pub read_timeout: Duration,
    /// Capacity of the submit and expectation queues
    pub queue_depth: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(60),
            queue_depth: 1024,
        }
    }
}

impl PipelineConfig {
    /// Create a new builder
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }
}

/// Builder for PipelineConfig
#[derive(Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    /// Set the TCP connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the per-response read timeout
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// Set the queue capacity
    pub fn queue_depth(mut self, depth: usize) -> Self {
        self.config.queue_depth = depth;
        self
    }

    /// Build the configuration
    pub fn build(self) -> PipelineConfig {
        self.config
    }
}

// ============================================================================
// Queue entries
// ============================================================================

/// One submission travelling to the writer task
struct PendingWrite {
    /// Encoded request bytes, one or more requests back to back
    data: Bytes,
    /// Operation tag per request, in write order
    ops: Vec<RequestType>,
    /// Channel completed with all responses of the batch, or one error
    response_tx: oneshot::Sender<Result<Vec<Response>>>,
}

/// A written submission awaiting its responses
struct PendingRead {
    ops: Vec<RequestType>,
    response_tx: oneshot::Sender<Result<Vec<Response>>>,
}

// ============================================================================
// Pipeline
// ============================================================================

/// A single pipelined connection to a quotr server
pub struct Pipeline {
    inner: Arc<PipelineInner>,
}

struct PipelineInner {
    request_tx: mpsc::Sender<PendingWrite>,
    shutdown: watch::Sender<bool>,
    size: ValueSize,
}

impl Clone for Pipeline {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Pipeline {
    /// Connect to a server and start the writer and reader tasks.
    pub async fn connect(addr: &str, size: ValueSize, config: PipelineConfig) -> Result<Self> {
        let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::Timeout(format!("connect to {addr}")))?
            .map_err(|e| Error::ConnectionError(e.to_string()))?;

        // Small request/response exchanges; latency over throughput.
        stream
            .set_nodelay(true)
            .map_err(|e| Error::ConnectionError(format!("Failed to set TCP_NODELAY: {e}")))?;

        debug!(addr, value_size = size.width(), "pipeline connected");

        let (read_half, write_half) = stream.into_split();
        let (request_tx, request_rx) = mpsc::channel(config.queue_depth);
        let (pending_tx, pending_rx) = mpsc::channel(config.queue_depth);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let writer_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            writer_task(write_half, request_rx, pending_tx, writer_shutdown).await;
        });

        let read_timeout = config.read_timeout;
        tokio::spawn(async move {
            reader_task(read_half, pending_rx, size, read_timeout, shutdown_rx).await;
        });

        Ok(Self {
            inner: Arc::new(PipelineInner {
                request_tx,
                shutdown: shutdown_tx,
                size,
            }),
        })
    }

    /// Negotiated field width for this connection.
    pub fn value_size(&self) -> ValueSize {
        self.inner.size
    }

    /// Send one request and wait for its response.
    pub async fn send(&self, request: Request) -> Result<Response> {
        let mut responses = self.send_batch(std::slice::from_ref(&request)).await?;
        // A completed batch carries exactly one response per request.
        responses.pop().ok_or(Error::ConnectionClosed)
    }

    /// Send several requests as one write and wait for all their responses.
    ///
    /// The batch occupies consecutive positions in the pipeline, so its
    /// responses arrive contiguously and in order.
    pub async fn send_batch(&self, requests: &[Request]) -> Result<Vec<Response>> {
        if requests.is_empty() {
            return Err(Error::EmptyBatch);
        }

        let mut data = BytesMut::new();
        let mut ops = Vec::with_capacity(requests.len());
        for request in requests {
            request.encode_into(self.inner.size, &mut data)?;
            ops.push(request.request_type());
        }

        let (response_tx, response_rx) = oneshot::channel();
        self.inner
            .request_tx
            .send(PendingWrite {
                data: data.freeze(),
                ops,
                response_tx,
            })
            .await
            .map_err(|_| Error::ConnectionClosed)?;

        match response_rx.await {
            Ok(result) => result,
            Err(_) => Err(Error::ConnectionClosed),
        }
    }

    /// Signal the background tasks to stop. Idempotent; in-flight
    /// submissions complete with [`Error::ConnectionClosed`].
    pub fn close(&self) {
        let _ = self.inner.shutdown.send(true);
    }

    /// Whether the pipeline still accepts submissions.
    pub fn is_open(&self) -> bool {
        !self.inner.request_tx.is_closed()
    }
}

// ============================================================================
// Writer Task
// ============================================================================

/// Writes submissions to the socket and forwards their expectations to the
/// reader in the same order.
async fn writer_task(
    mut write_half: tokio::net::tcp::OwnedWriteHalf,
    mut request_rx: mpsc::Receiver<PendingWrite>,
    pending_tx: mpsc::Sender<PendingRead>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let write = tokio::select! {
            req = request_rx.recv() => {
                match req {
                    Some(req) => req,
                    None => break, // All senders dropped
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
                continue;
            }
        };

        if let Err(e) = write_half.write_all(&write.data).await {
            warn!("write failed: {}", e);
            let _ = write
                .response_tx
                .send(Err(Error::ConnectionError(e.to_string())));
            break;
        }
        trace!(bytes = write.data.len(), requests = write.ops.len(), "wrote batch");

        // Reader gone means responses can never be delivered.
        let pending = PendingRead {
            ops: write.ops,
            response_tx: write.response_tx,
        };
        if pending_tx.send(pending).await.is_err() {
            break;
        }
    }

    // Fail whatever is still queued behind us.
    request_rx.close();
    while let Ok(write) = request_rx.try_recv() {
        let _ = write.response_tx.send(Err(Error::ConnectionClosed));
    }
    debug!("writer task stopped");
}

// ============================================================================
// Reader Task
// ============================================================================

/// Decodes responses in expectation order and completes submitter channels.
async fn reader_task(
    read_half: tokio::net::tcp::OwnedReadHalf,
    mut pending_rx: mpsc::Receiver<PendingRead>,
    size: ValueSize,
    read_timeout: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut reader = FrameReader::new(read_half);

    loop {
        let pending = tokio::select! {
            pending = pending_rx.recv() => {
                match pending {
                    Some(pending) => pending,
                    None => break, // Writer gone and queue drained
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
                continue;
            }
        };

        let mut responses = Vec::with_capacity(pending.ops.len());
        let mut failure = None;
        for op in &pending.ops {
            match tokio::time::timeout(read_timeout, reader.next_response(*op, size)).await {
                Ok(Ok(response)) => responses.push(response),
                Ok(Err(e)) => {
                    failure = Some(e);
                    break;
                }
                Err(_) => {
                    failure = Some(Error::Timeout("response read".into()));
                    break;
                }
            }
        }

        match failure {
            None => {
                let _ = pending.response_tx.send(Ok(responses));
            }
            Some(e) => {
                // Stream position is unrecoverable past a decode failure or
                // timeout; tear the connection down.
                warn!("read failed: {}", e);
                let _ = pending.response_tx.send(Err(e));
                break;
            }
        }
    }

    // Everything already written but not yet answered is lost.
    pending_rx.close();
    while let Ok(pending) = pending_rx.try_recv() {
        let _ = pending.response_tx.send(Err(Error::ConnectionClosed));
    }
    debug!("reader task stopped");
}

// ============================================================================
// Tests
// ============================================================================
