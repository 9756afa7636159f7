//! Request variants and their wire encoding
//!
//! Every request serializes to a self-describing byte sequence: a 1-byte
//! operation tag, fixed-width numerics at the configured [`ValueSize`], and
//! length-prefixed strings. Key and channel-name prefixes are always a single
//! byte; the SET value prefix uses the configured width.

use crate::error::{ProtocolError, Result};
use crate::types::{AttributeType, ChangeType, ConnectionId, RequestType, TtlType, ValueSize};
use bytes::{BufMut, Bytes, BytesMut};

/// A typed request to the server.
///
/// Variants carry only the fields their wire format needs. Building one is
/// infallible; contract violations (oversized keys, values that do not fit
/// the configured width) surface from [`Request::encode_into`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Create a quota counter
    Insert {
        key: String,
        quota: u64,
        ttl_type: TtlType,
        ttl: u64,
    },
    /// Read a counter's remaining quota and ttl
    Query { key: String },
    /// Patch/increase/decrease a counter's quota or ttl
    Update {
        key: String,
        attribute: AttributeType,
        change: ChangeType,
        value: u64,
    },
    /// Remove a key
    Purge { key: String },
    /// Store a raw value buffer
    Set {
        key: String,
        ttl_type: TtlType,
        ttl: u64,
        value: Bytes,
    },
    /// Read back a stored value buffer
    Get { key: String },
    /// Enumerate all keys
    List,
    /// Server-wide counters
    Info,
    /// Per-key read/write metrics
    Stat { key: String },
    /// Read/write metrics for every key
    Stats,
    /// Enumerate live connections
    Connections,
    /// Describe one connection
    Connection { id: ConnectionId },
    /// Enumerate pub/sub channels
    Channels,
    /// Describe one channel's subscribers
    Channel { name: String },
    /// The server's identifier for this connection
    Whoami,
}

impl Request {
    /// Operation tag, which also selects the response shape the server
    /// replies with.
    pub fn request_type(&self) -> RequestType {
        match self {
            Request::Insert { .. } => RequestType::Insert,
            Request::Query { .. } => RequestType::Query,
            Request::Update { .. } => RequestType::Update,
            Request::Purge { .. } => RequestType::Purge,
            Request::Set { .. } => RequestType::Set,
            Request::Get { .. } => RequestType::Get,
            Request::List => RequestType::List,
            Request::Info => RequestType::Info,
            Request::Stat { .. } => RequestType::Stat,
            Request::Stats => RequestType::Stats,
            Request::Connections => RequestType::Connections,
            Request::Connection { .. } => RequestType::Connection,
            Request::Channels => RequestType::Channels,
            Request::Channel { .. } => RequestType::Channel,
            Request::Whoami => RequestType::Whoami,
        }
    }

    /// Append this request's wire bytes to `buf`.
    pub fn encode_into(&self, size: ValueSize, buf: &mut BytesMut) -> Result<()> {
        buf.put_u8(self.request_type().tag());

        match self {
            Request::Insert {
                key,
                quota,
                ttl_type,
                ttl,
            } => {
                put_sized(buf, size, "quota", *quota)?;
                buf.put_u8(*ttl_type as u8);
                put_sized(buf, size, "ttl", *ttl)?;
                put_key(buf, key.as_bytes())?;
            }
            Request::Query { key }
            | Request::Purge { key }
            | Request::Get { key }
            | Request::Stat { key } => {
                put_key(buf, key.as_bytes())?;
            }
            Request::Update {
                key,
                attribute,
                change,
                value,
            } => {
                buf.put_u8(*attribute as u8);
                buf.put_u8(*change as u8);
                put_sized(buf, size, "value", *value)?;
                put_key(buf, key.as_bytes())?;
            }
            Request::Set {
                key,
                ttl_type,
                ttl,
                value,
            } => {
                buf.put_u8(*ttl_type as u8);
                put_sized(buf, size, "ttl", *ttl)?;
                check_key(key.as_bytes())?;
                buf.put_u8(key.len() as u8);
                put_sized(buf, size, "value length", value.len() as u64)?;
                buf.put_slice(key.as_bytes());
                buf.put_slice(value);
            }
            Request::Connection { id } => {
                buf.put_slice(id.as_bytes());
            }
            Request::Channel { name } => {
                put_key(buf, name.as_bytes())?;
            }
            Request::List
            | Request::Info
            | Request::Stats
            | Request::Connections
            | Request::Channels
            | Request::Whoami => {}
        }

        Ok(())
    }

    /// Convenience wrapper returning a freshly allocated buffer.
    pub fn to_bytes(&self, size: ValueSize) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        self.encode_into(size, &mut buf)?;
        Ok(buf.freeze())
    }
}

fn check_key(key: &[u8]) -> Result<()> {
    if key.is_empty() {
        return Err(ProtocolError::EmptyKey);
    }
    if key.len() > u8::MAX as usize {
        return Err(ProtocolError::KeyTooLong(key.len()));
    }
    Ok(())
}

fn put_key(buf: &mut BytesMut, key: &[u8]) -> Result<()> {
    check_key(key)?;
    buf.put_u8(key.len() as u8);
    buf.put_slice(key);
    Ok(())
}

fn put_sized(buf: &mut BytesMut, size: ValueSize, field: &'static str, value: u64) -> Result<()> {
    if value > size.max_value() {
        return Err(ProtocolError::ValueOutOfRange {
            field,
            value,
            max: size.max_value(),
        });
    }
    buf.put_uint_le(value, size.width());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(request: &Request, size: ValueSize) -> Vec<u8> {
        request.to_bytes(size).unwrap().to_vec()
    }

    #[test]
    fn insert_layout_u16() {
        let request = Request::Insert {
            key: "ab".into(),
            quota: 7,
            ttl_type: TtlType::Seconds,
            ttl: 60,
        };
        assert_eq!(
            encode(&request, ValueSize::U16),
            vec![0x01, 7, 0, 0x04, 60, 0, 2, b'a', b'b'],
        );
    }

    #[test]
    fn insert_layout_u64() {
        let request = Request::Insert {
            key: "k".into(),
            quota: 0x0102030405060708,
            ttl_type: TtlType::Minutes,
            ttl: 1,
        };
        assert_eq!(
            encode(&request, ValueSize::U64),
            vec![
                0x01, // tag
                0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01, // quota LE
                0x05, // minutes
                1, 0, 0, 0, 0, 0, 0, 0, // ttl LE
                1, b'k',
            ],
        );
    }

    #[test]
    fn query_purge_get_stat_share_key_only_layout() {
        for (request, tag) in [
            (Request::Query { key: "xy".into() }, 0x02),
            (Request::Purge { key: "xy".into() }, 0x04),
            (Request::Get { key: "xy".into() }, 0x06),
            (Request::Stat { key: "xy".into() }, 0x09),
        ] {
            assert_eq!(
                encode(&request, ValueSize::U32),
                vec![tag, 2, b'x', b'y'],
            );
        }
    }

    #[test]
    fn update_layout() {
        let request = Request::Update {
            key: "k".into(),
            attribute: AttributeType::Quota,
            change: ChangeType::Decrease,
            value: 7,
        };
        assert_eq!(
            encode(&request, ValueSize::U16),
            vec![0x03, 0x00, 0x02, 7, 0, 1, b'k'],
        );
    }

    #[test]
    fn set_packs_both_lengths_before_payloads() {
        let request = Request::Set {
            key: "ab".into(),
            ttl_type: TtlType::Seconds,
            ttl: 5,
            value: Bytes::from_static(b"xyz"),
        };
        assert_eq!(
            encode(&request, ValueSize::U16),
            vec![0x05, 0x04, 5, 0, 2, 3, 0, b'a', b'b', b'x', b'y', b'z'],
        );
    }

    #[test]
    fn tag_only_requests() {
        for (request, tag) in [
            (Request::List, 0x07),
            (Request::Info, 0x08),
            (Request::Stats, 0x0A),
            (Request::Connections, 0x0E),
            (Request::Channels, 0x10),
            (Request::Whoami, 0x12),
        ] {
            assert_eq!(encode(&request, ValueSize::U16), vec![tag]);
        }
    }

    #[test]
    fn connection_carries_raw_id() {
        let id = ConnectionId::from_bytes([9; 16]);
        let bytes = encode(&Request::Connection { id }, ValueSize::U16);
        assert_eq!(bytes[0], 0x0F);
        assert_eq!(&bytes[1..], &[9; 16]);
        assert_eq!(bytes.len(), 17);
    }

    #[test]
    fn channel_layout() {
        let request = Request::Channel { name: "ch".into() };
        assert_eq!(encode(&request, ValueSize::U16), vec![0x11, 2, b'c', b'h']);
    }

    #[test]
    fn rejects_oversized_key() {
        let request = Request::Query {
            key: "k".repeat(256),
        };
        assert!(matches!(
            request.to_bytes(ValueSize::U16),
            Err(ProtocolError::KeyTooLong(256)),
        ));
    }

    #[test]
    fn rejects_empty_key() {
        let request = Request::Purge { key: String::new() };
        assert!(matches!(
            request.to_bytes(ValueSize::U16),
            Err(ProtocolError::EmptyKey),
        ));
    }

    #[test]
    fn rejects_value_wider_than_configured_size() {
        let request = Request::Insert {
            key: "k".into(),
            quota: 300,
            ttl_type: TtlType::Seconds,
            ttl: 1,
        };
        assert!(matches!(
            request.to_bytes(ValueSize::U8),
            Err(ProtocolError::ValueOutOfRange { field: "quota", .. }),
        ));

        // The same quota fits at 16 bits.
        assert!(request.to_bytes(ValueSize::U16).is_ok());
    }

    #[test]
    fn set_value_length_must_fit_width() {
        let request = Request::Set {
            key: "k".into(),
            ttl_type: TtlType::Seconds,
            ttl: 1,
            value: Bytes::from(vec![0u8; 300]),
        };
        assert!(matches!(
            request.to_bytes(ValueSize::U8),
            Err(ProtocolError::ValueOutOfRange { .. }),
        ));
    }
}
