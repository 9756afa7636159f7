//! Typed response families
//!
//! Every response starts with a 1-byte status flag. Families whose payload is
//! only present on success are modelled as explicit `Failure` / `Success`
//! branches so that absent fields are a type-level fact rather than scattered
//! null checks.

use crate::types::{
    ConnectionId, ConnectionKind, ConnectionType, KeyType, RequestType, TtlType, METRIC_ORDER,
};
use bytes::Bytes;
use std::net::IpAddr;

/// One decoded response, tagged by the operation family it answers.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Status(StatusResponse),
    Query(QueryResponse),
    Get(GetResponse),
    List(ListResponse),
    Stat(StatResponse),
    Stats(StatsResponse),
    Info(InfoResponse),
    Connections(ConnectionsResponse),
    Connection(ConnectionResponse),
    Channels(ChannelsResponse),
    Channel(ChannelResponse),
    Whoami(WhoamiResponse),
}

impl Response {
    /// Whether the server reported the operation as successful.
    ///
    /// `false` is a normal business outcome (key absent, quota exhausted),
    /// not a transport or protocol failure.
    pub fn is_success(&self) -> bool {
        match self {
            Response::Status(r) => r.success,
            Response::Query(r) => matches!(r, QueryResponse::Success { .. }),
            Response::Get(r) => matches!(r, GetResponse::Success { .. }),
            Response::List(r) => matches!(r, ListResponse::Success { .. }),
            Response::Stat(r) => matches!(r, StatResponse::Success { .. }),
            Response::Stats(r) => matches!(r, StatsResponse::Success { .. }),
            Response::Info(r) => matches!(r, InfoResponse::Success(_)),
            Response::Connections(r) => matches!(r, ConnectionsResponse::Success { .. }),
            Response::Connection(r) => matches!(r, ConnectionResponse::Success(_)),
            Response::Channels(r) => matches!(r, ChannelsResponse::Success { .. }),
            Response::Channel(r) => matches!(r, ChannelResponse::Success { .. }),
            Response::Whoami(r) => r.success,
        }
    }
}

/// Bare status flag (UPDATE, PURGE, SET)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusResponse {
    pub success: bool,
}

/// Quota/ttl snapshot (QUERY, and INSERT on success)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryResponse {
    Failure,
    Success {
        quota: u64,
        ttl_type: TtlType,
        ttl: u64,
    },
}

/// Stored value read-back (GET)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GetResponse {
    Failure,
    Success {
        ttl_type: TtlType,
        ttl: u64,
        value: Bytes,
    },
}

/// One key as enumerated by LIST
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRecord {
    pub key: Bytes,
    pub key_type: KeyType,
    pub ttl_type: TtlType,
    pub ttl: u64,
    pub bytes_used: u64,
}

/// Key enumeration (LIST); fragments are flattened in stream order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListResponse {
    Failure,
    Success { keys: Vec<KeyRecord> },
}

/// Read/write counters for one key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyMetrics {
    pub reads_per_minute: u64,
    pub writes_per_minute: u64,
    pub total_reads: u64,
    pub total_writes: u64,
}

/// Metrics for a single key (STAT)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatResponse {
    Failure,
    Success { metrics: KeyMetrics },
}

/// Metrics row from STATS, carrying the key name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStats {
    pub key: Bytes,
    pub metrics: KeyMetrics,
}

/// Metrics for every key (STATS); fragments are flattened in stream order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatsResponse {
    Failure,
    Success { keys: Vec<KeyStats> },
}

/// Lifetime/per-minute counter pair for one operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OperationMetrics {
    pub total: u64,
    pub per_minute: u64,
}

/// Fixed-order table of per-operation values, indexed by [`METRIC_ORDER`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationTable<T>(pub(crate) [T; 18]);

impl<T> OperationTable<T> {
    pub fn new(values: [T; 18]) -> Self {
        Self(values)
    }

    /// Value for one operation; `None` for EVENT, which carries no metrics.
    pub fn get(&self, op: RequestType) -> Option<&T> {
        METRIC_ORDER
            .iter()
            .position(|candidate| *candidate == op)
            .map(|index| &self.0[index])
    }

    /// Rows paired with their operation, in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (RequestType, &T)> {
        METRIC_ORDER.iter().copied().zip(self.0.iter())
    }
}

/// Server-wide counters (INFO success payload)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub now: u64,
    pub total_requests: u64,
    pub total_requests_per_minute: u64,
    pub requests: OperationTable<OperationMetrics>,
    pub total_read: u64,
    pub total_read_per_minute: u64,
    pub total_write: u64,
    pub total_write_per_minute: u64,
    pub total_keys: u64,
    pub total_counters: u64,
    pub total_buffers: u64,
    pub total_allocated_bytes_on_counters: u64,
    pub total_allocated_bytes_on_buffers: u64,
    pub total_subscriptions: u64,
    pub total_channels: u64,
    pub started_at: u64,
    pub total_connections: u64,
    /// Raw 16-byte version blob as sent by the server
    pub version: [u8; 16],
}

impl ServerInfo {
    /// Version blob rendered as text, trailing NULs stripped.
    pub fn version_str(&self) -> String {
        let end = self
            .version
            .iter()
            .rposition(|b| *b != 0)
            .map_or(0, |i| i + 1);
        String::from_utf8_lossy(&self.version[..end]).into_owned()
    }
}

/// Server-wide counters (INFO)
#[derive(Debug, Clone, PartialEq)]
pub enum InfoResponse {
    Failure,
    Success(Box<ServerInfo>),
}

/// One live connection as described by CONNECTION / CONNECTIONS.
///
/// `consumed_bytes` is only reported by single-connection lookups; the
/// CONNECTIONS listing omits it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRecord {
    pub id: ConnectionId,
    pub connection_type: ConnectionType,
    pub kind: ConnectionKind,
    pub ip: IpAddr,
    pub port: u16,
    pub connected_at: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub published_bytes: u64,
    pub received_bytes: u64,
    pub allocated_bytes: u64,
    pub consumed_bytes: Option<u64>,
    pub requests: OperationTable<u64>,
}

/// Single connection lookup (CONNECTION)
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionResponse {
    Failure,
    Success(Box<ConnectionRecord>),
}

/// Connection enumeration (CONNECTIONS); fragments flattened in stream order
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionsResponse {
    Failure,
    Success { connections: Vec<ConnectionRecord> },
}

/// One pub/sub channel as enumerated by CHANNELS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRecord {
    pub name: Bytes,
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub subscriptions: u64,
}

/// Channel enumeration (CHANNELS)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelsResponse {
    Failure,
    Success { channels: Vec<ChannelRecord> },
}

/// One subscriber of a channel (CHANNEL)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriberRecord {
    pub id: ConnectionId,
    pub subscribed_at: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
}

/// Single channel lookup (CHANNEL)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelResponse {
    Failure,
    Success {
        subscribers: Vec<SubscriberRecord>,
    },
}

/// The caller's own connection identifier (WHOAMI).
///
/// The identifier bytes are present on the wire regardless of the status
/// flag, so this family is a plain struct rather than a two-branch enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WhoamiResponse {
    pub success: bool,
    pub id: ConnectionId,
}
