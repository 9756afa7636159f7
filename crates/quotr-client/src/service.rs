//! High-level client facade
//!
//! [`Service`] owns a small pool of [`Pipeline`] connections to one server
//! and spreads submissions across them round-robin. Every protocol operation
//! gets a typed method that unwraps the matching response variant.
//!
//! # Example
//!
//! ```rust,ignore
//! use quotr_client::{Service, ServiceConfig};
//! use quotr_protocol::{TtlType, ValueSize};
//!
//! let service = Service::connect(
//!     ServiceConfig::builder()
//!         .host("127.0.0.1")
//!         .port(9000)
//!         .value_size(ValueSize::U16)
//!         .connections(4)
//!         .build(),
//! )
//! .await?;
//!
//! service.insert("user:42", 60, TtlType::Seconds, 60).await?;
//! let quota = service.query("user:42").await?;
//! service.close();
//! ```

use crate::pipeline::{Pipeline, PipelineConfig};
use crate::{Error, Result};
use quotr_protocol::{
    AttributeType, ChangeType, ChannelResponse, ChannelsResponse, ConnectionId,
    ConnectionResponse, ConnectionsResponse, GetResponse, InfoResponse, ListResponse,
    QueryResponse, Request, Response, StatResponse, StatsResponse, StatusResponse, TtlType,
    ValueSize, WhoamiResponse,
};
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for a [`Service`]
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Field width the server was started with
    pub value_size: ValueSize,
    /// Number of pooled connections
    pub connections: usize,
    /// Per-connection settings
    pub pipeline: PipelineConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9000,
            value_size: ValueSize::default(),
            connections: 1,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Create a new builder
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }

    fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Builder for ServiceConfig
#[derive(Default)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    /// Set the server host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the server port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the negotiated field width
    pub fn value_size(mut self, size: ValueSize) -> Self {
        self.config.value_size = size;
        self
    }

    /// Set the pool size
    pub fn connections(mut self, connections: usize) -> Self {
        self.config.connections = connections;
        self
    }

    /// Set the TCP connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.pipeline.connect_timeout = timeout;
        self
    }

    /// Set the per-response read timeout
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.pipeline.read_timeout = timeout;
        self
    }

    /// Set the per-connection queue capacity
    pub fn queue_depth(mut self, depth: usize) -> Self {
        self.config.pipeline.queue_depth = depth;
        self
    }

    /// Build the configuration
    pub fn build(self) -> ServiceConfig {
        self.config
    }
}

// ============================================================================
// Service
// ============================================================================

/// Pooled client for one quotr server
pub struct Service {
    pipelines: Vec<Pipeline>,
    cursor: AtomicUsize,
}

impl Service {
    /// Open all pooled connections. Fails if any single connect fails.
    pub async fn connect(config: ServiceConfig) -> Result<Self> {
        if config.connections == 0 {
            return Err(Error::NoConnections);
        }

        let addr = config.addr();
        let mut pipelines = Vec::with_capacity(config.connections);
        for _ in 0..config.connections {
            pipelines.push(
                Pipeline::connect(&addr, config.value_size, config.pipeline.clone()).await?,
            );
        }

        debug!(addr = %addr, connections = pipelines.len(), "service connected");

        Ok(Self {
            pipelines,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Next pipeline in round-robin order.
    fn pipeline(&self) -> &Pipeline {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.pipelines.len();
        &self.pipelines[index]
    }

    /// Send one request on the next pooled connection.
    pub async fn send(&self, request: Request) -> Result<Response> {
        self.pipeline().send(request).await
    }

    /// Send a batch on the next pooled connection. The whole batch shares
    /// one connection, so its responses stay contiguous and ordered.
    pub async fn send_batch(&self, requests: &[Request]) -> Result<Vec<Response>> {
        self.pipeline().send_batch(requests).await
    }

    /// Stop all pooled connections. Idempotent.
    pub fn close(&self) {
        for pipeline in &self.pipelines {
            pipeline.close();
        }
    }

    // ------------------------------------------------------------------
    // Typed operations
    // ------------------------------------------------------------------

    /// Create a quota counter. A success reports the counter's state the
    /// same way QUERY does.
    pub async fn insert(
        &self,
        key: impl Into<String>,
        quota: u64,
        ttl_type: TtlType,
        ttl: u64,
    ) -> Result<QueryResponse> {
        match self
            .send(Request::Insert {
                key: key.into(),
                quota,
                ttl_type,
                ttl,
            })
            .await?
        {
            Response::Query(response) => Ok(response),
            _ => Err(Error::UnexpectedResponse),
        }
    }

    /// Read a counter's remaining quota and ttl.
    pub async fn query(&self, key: impl Into<String>) -> Result<QueryResponse> {
        match self.send(Request::Query { key: key.into() }).await? {
            Response::Query(response) => Ok(response),
            _ => Err(Error::UnexpectedResponse),
        }
    }

    /// Patch, increase, or decrease a counter's quota or ttl.
    pub async fn update(
        &self,
        key: impl Into<String>,
        attribute: AttributeType,
        change: ChangeType,
        value: u64,
    ) -> Result<StatusResponse> {
        match self
            .send(Request::Update {
                key: key.into(),
                attribute,
                change,
                value,
            })
            .await?
        {
            Response::Status(response) => Ok(response),
            _ => Err(Error::UnexpectedResponse),
        }
    }

    /// Remove a key.
    pub async fn purge(&self, key: impl Into<String>) -> Result<StatusResponse> {
        match self.send(Request::Purge { key: key.into() }).await? {
            Response::Status(response) => Ok(response),
            _ => Err(Error::UnexpectedResponse),
        }
    }

    /// Store a raw value buffer.
    pub async fn set(
        &self,
        key: impl Into<String>,
        ttl_type: TtlType,
        ttl: u64,
        value: impl Into<Bytes>,
    ) -> Result<StatusResponse> {
        match self
            .send(Request::Set {
                key: key.into(),
                ttl_type,
                ttl,
                value: value.into(),
            })
            .await?
        {
            Response::Status(response) => Ok(response),
            _ => Err(Error::UnexpectedResponse),
        }
    }

    /// Read back a stored value buffer.
    pub async fn get(&self, key: impl Into<String>) -> Result<GetResponse> {
        match self.send(Request::Get { key: key.into() }).await? {
            Response::Get(response) => Ok(response),
            _ => Err(Error::UnexpectedResponse),
        }
    }

    /// Enumerate all keys.
    pub async fn list(&self) -> Result<ListResponse> {
        match self.send(Request::List).await? {
            Response::List(response) => Ok(response),
            _ => Err(Error::UnexpectedResponse),
        }
    }

    /// Server-wide counters.
    pub async fn info(&self) -> Result<InfoResponse> {
        match self.send(Request::Info).await? {
            Response::Info(response) => Ok(response),
            _ => Err(Error::UnexpectedResponse),
        }
    }

    /// Read/write metrics for one key.
    pub async fn stat(&self, key: impl Into<String>) -> Result<StatResponse> {
        match self.send(Request::Stat { key: key.into() }).await? {
            Response::Stat(response) => Ok(response),
            _ => Err(Error::UnexpectedResponse),
        }
    }

    /// Read/write metrics for every key.
    pub async fn stats(&self) -> Result<StatsResponse> {
        match self.send(Request::Stats).await? {
            Response::Stats(response) => Ok(response),
            _ => Err(Error::UnexpectedResponse),
        }
    }

    /// Enumerate live connections.
    pub async fn connections(&self) -> Result<ConnectionsResponse> {
        match self.send(Request::Connections).await? {
            Response::Connections(response) => Ok(response),
            _ => Err(Error::UnexpectedResponse),
        }
    }

    /// Describe one connection.
    pub async fn connection(&self, id: ConnectionId) -> Result<ConnectionResponse> {
        match self.send(Request::Connection { id }).await? {
            Response::Connection(response) => Ok(response),
            _ => Err(Error::UnexpectedResponse),
        }
    }

    /// Enumerate pub/sub channels.
    pub async fn channels(&self) -> Result<ChannelsResponse> {
        match self.send(Request::Channels).await? {
            Response::Channels(response) => Ok(response),
            _ => Err(Error::UnexpectedResponse),
        }
    }

    /// Describe one channel's subscribers.
    pub async fn channel(&self, name: impl Into<String>) -> Result<ChannelResponse> {
        match self.send(Request::Channel { name: name.into() }).await? {
            Response::Channel(response) => Ok(response),
            _ => Err(Error::UnexpectedResponse),
        }
    }

    /// The server's identifier for the connection the request lands on.
    pub async fn whoami(&self) -> Result<WhoamiResponse> {
        match self.send(Request::Whoami).await? {
            Response::Whoami(response) => Ok(response),
            _ => Err(Error::UnexpectedResponse),
        }
    }
}
