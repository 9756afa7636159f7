//! Quotr Wire Protocol
//!
//! This crate defines the binary wire format spoken by quotr servers: request
//! encoding and incremental response decoding for the quota, buffer, and
//! introspection operations. It is pure serialization with no I/O; the
//! transport lives in quotr-client.
//!
//! # Value size
//!
//! Quota, TTL, and buffer-length fields share one negotiated width
//! ([`ValueSize`]: 1, 2, 4, or 8 bytes). Both sides of a connection must use
//! the same width; it is configuration, not handshake. All multi-byte
//! integers are little-endian.
//!
//! # Example
//!
//! ```rust
//! use quotr_protocol::{Decoded, Request, RequestType, TtlType, ValueSize};
//!
//! let request = Request::Query { key: "user:42".into() };
//! let bytes = request.to_bytes(ValueSize::U16)?;
//! assert_eq!(bytes[0], RequestType::Query.tag());
//!
//! // status=1, quota=7, ttl_type=SECONDS, ttl=59
//! let wire = [1u8, 7, 0, TtlType::Seconds as u8, 59, 0];
//! let decoded = quotr_protocol::decode_response(&wire, RequestType::Query, ValueSize::U16)?;
//! assert!(matches!(decoded, Decoded::Complete { consumed: 6, .. }));
//! # Ok::<(), quotr_protocol::ProtocolError>(())
//! ```

mod codec;
mod error;
mod request;
mod response;
mod types;

pub use codec::{decode_response, Decoded, INFO_RESPONSE_LEN, MAX_RESPONSE_SIZE, WHOAMI_RESPONSE_LEN};
pub use error::{ProtocolError, Result};
pub use request::Request;
pub use response::{
    ChannelRecord, ChannelResponse, ChannelsResponse, ConnectionRecord, ConnectionResponse,
    ConnectionsResponse, GetResponse, InfoResponse, KeyMetrics, KeyRecord, KeyStats, ListResponse,
    OperationMetrics, OperationTable, QueryResponse, Response, ServerInfo, StatResponse,
    StatsResponse, StatusResponse, SubscriberRecord, WhoamiResponse,
};
pub use types::{
    AttributeType, ChangeType, ConnectionId, ConnectionKind, ConnectionType, IpVersion, KeyType,
    RequestType, TtlType, ValueSize, METRIC_ORDER,
};
