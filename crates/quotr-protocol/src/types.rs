//! Scalar wire types shared by requests and responses

use crate::error::ProtocolError;

/// Byte width used for every size-class integer on the wire (quota, ttl,
/// value lengths). The client and the server build must agree on it; decoding
/// with the wrong width corrupts the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ValueSize {
    /// 8-bit unsigned fields
    U8,
    /// 16-bit unsigned fields
    #[default]
    U16,
    /// 32-bit unsigned fields
    U32,
    /// 64-bit unsigned fields
    U64,
}

impl ValueSize {
    /// Width of one size-class field, in bytes
    pub const fn width(self) -> usize {
        match self {
            ValueSize::U8 => 1,
            ValueSize::U16 => 2,
            ValueSize::U32 => 4,
            ValueSize::U64 => 8,
        }
    }

    /// Largest value representable at this width
    pub const fn max_value(self) -> u64 {
        match self {
            ValueSize::U8 => u8::MAX as u64,
            ValueSize::U16 => u16::MAX as u64,
            ValueSize::U32 => u32::MAX as u64,
            ValueSize::U64 => u64::MAX,
        }
    }

    /// Look up a size by its byte width (1, 2, 4 or 8)
    pub const fn from_width(width: usize) -> Option<Self> {
        match width {
            1 => Some(ValueSize::U8),
            2 => Some(ValueSize::U16),
            4 => Some(ValueSize::U32),
            8 => Some(ValueSize::U64),
            _ => None,
        }
    }
}

/// Operation tag carried in the first byte of every request.
///
/// Each tag also fixes the shape family of its response, which is what the
/// framing layer uses to know how many bytes to expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RequestType {
    Insert = 0x01,
    Query = 0x02,
    Update = 0x03,
    Purge = 0x04,
    Set = 0x05,
    Get = 0x06,
    List = 0x07,
    Info = 0x08,
    Stat = 0x09,
    Stats = 0x0A,
    Subscribe = 0x0B,
    Unsubscribe = 0x0C,
    Publish = 0x0D,
    Connections = 0x0E,
    Connection = 0x0F,
    Channels = 0x10,
    Channel = 0x11,
    Whoami = 0x12,
    Event = 0x13,
}

impl RequestType {
    /// Wire tag for this operation
    pub const fn tag(self) -> u8 {
        self as u8
    }

    pub const fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            0x01 => RequestType::Insert,
            0x02 => RequestType::Query,
            0x03 => RequestType::Update,
            0x04 => RequestType::Purge,
            0x05 => RequestType::Set,
            0x06 => RequestType::Get,
            0x07 => RequestType::List,
            0x08 => RequestType::Info,
            0x09 => RequestType::Stat,
            0x0A => RequestType::Stats,
            0x0B => RequestType::Subscribe,
            0x0C => RequestType::Unsubscribe,
            0x0D => RequestType::Publish,
            0x0E => RequestType::Connections,
            0x0F => RequestType::Connection,
            0x10 => RequestType::Channels,
            0x11 => RequestType::Channel,
            0x12 => RequestType::Whoami,
            0x13 => RequestType::Event,
            _ => return None,
        })
    }
}

/// Order in which the server emits per-operation metric rows inside INFO and
/// connection records. EVENT carries no metrics and is absent.
pub const METRIC_ORDER: [RequestType; 18] = [
    RequestType::Insert,
    RequestType::Query,
    RequestType::Update,
    RequestType::Purge,
    RequestType::Get,
    RequestType::Set,
    RequestType::List,
    RequestType::Info,
    RequestType::Stats,
    RequestType::Stat,
    RequestType::Subscribe,
    RequestType::Unsubscribe,
    RequestType::Publish,
    RequestType::Channel,
    RequestType::Channels,
    RequestType::Whoami,
    RequestType::Connection,
    RequestType::Connections,
];

/// Unit of a TTL field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TtlType {
    Nanoseconds = 0x01,
    Microseconds = 0x02,
    Milliseconds = 0x03,
    Seconds = 0x04,
    Minutes = 0x05,
    Hours = 0x06,
}

impl TtlType {
    pub(crate) fn from_byte(value: u8) -> Result<Self, ProtocolError> {
        Ok(match value {
            0x01 => TtlType::Nanoseconds,
            0x02 => TtlType::Microseconds,
            0x03 => TtlType::Milliseconds,
            0x04 => TtlType::Seconds,
            0x05 => TtlType::Minutes,
            0x06 => TtlType::Hours,
            _ => return Err(ProtocolError::invalid_enum("ttl type", value)),
        })
    }
}

/// Counter attribute targeted by an UPDATE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AttributeType {
    Quota = 0x00,
    Ttl = 0x01,
}

/// Arithmetic applied by an UPDATE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ChangeType {
    Patch = 0x00,
    Increase = 0x01,
    Decrease = 0x02,
}

/// Storage class of a key, as reported by LIST
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum KeyType {
    /// Quota counter created by INSERT
    Counter = 0x00,
    /// Raw value buffer created by SET
    Buffer = 0x01,
}

impl KeyType {
    pub(crate) fn from_byte(value: u8) -> Result<Self, ProtocolError> {
        Ok(match value {
            0x00 => KeyType::Counter,
            0x01 => KeyType::Buffer,
            _ => return Err(ProtocolError::invalid_enum("key type", value)),
        })
    }
}

/// Transport a connection record arrived over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionType {
    Tcp = 0x00,
    Unix = 0x01,
}

impl ConnectionType {
    pub(crate) fn from_byte(value: u8) -> Result<Self, ProtocolError> {
        Ok(match value {
            0x00 => ConnectionType::Tcp,
            0x01 => ConnectionType::Unix,
            _ => return Err(ProtocolError::invalid_enum("connection type", value)),
        })
    }
}

/// Role of a connection record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionKind {
    Client = 0x00,
    Agent = 0x01,
}

impl ConnectionKind {
    pub(crate) fn from_byte(value: u8) -> Result<Self, ProtocolError> {
        Ok(match value {
            0x00 => ConnectionKind::Client,
            0x01 => ConnectionKind::Agent,
            _ => return Err(ProtocolError::invalid_enum("connection kind", value)),
        })
    }
}

/// IP version selector preceding the 16-byte address field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum IpVersion {
    V4 = 0x04,
    V6 = 0x06,
}

impl IpVersion {
    pub(crate) fn from_byte(value: u8) -> Result<Self, ProtocolError> {
        Ok(match value {
            0x04 => IpVersion::V4,
            0x06 => IpVersion::V6,
            _ => return Err(ProtocolError::invalid_enum("ip version", value)),
        })
    }
}

/// Opaque 16-byte identifier the server assigns to each connection.
///
/// Rendered as 32 lowercase hex characters, which is also the accepted
/// parse format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId([u8; 16]);

impl ConnectionId {
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl std::str::FromStr for ConnectionId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = hex::decode(s).map_err(|_| ProtocolError::InvalidConnectionId)?;
        let bytes: [u8; 16] = raw
            .try_into()
            .map_err(|_| ProtocolError::InvalidConnectionId)?;
        Ok(Self(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_size_width_and_max() {
        assert_eq!(ValueSize::U8.width(), 1);
        assert_eq!(ValueSize::U16.width(), 2);
        assert_eq!(ValueSize::U32.width(), 4);
        assert_eq!(ValueSize::U64.width(), 8);

        assert_eq!(ValueSize::U8.max_value(), 255);
        assert_eq!(ValueSize::U16.max_value(), 65_535);
        assert_eq!(ValueSize::U64.max_value(), u64::MAX);

        assert_eq!(ValueSize::from_width(4), Some(ValueSize::U32));
        assert_eq!(ValueSize::from_width(3), None);
    }

    #[test]
    fn request_type_tags_round_trip() {
        for tag in 0x01..=0x13u8 {
            let op = RequestType::from_tag(tag).expect("known tag");
            assert_eq!(op.tag(), tag);
        }
        assert_eq!(RequestType::from_tag(0x00), None);
        assert_eq!(RequestType::from_tag(0x14), None);
    }

    #[test]
    fn metric_order_covers_all_but_event() {
        assert_eq!(METRIC_ORDER.len(), 18);
        assert!(!METRIC_ORDER.contains(&RequestType::Event));
        let mut seen = std::collections::HashSet::new();
        for op in METRIC_ORDER {
            assert!(seen.insert(op), "{op:?} listed twice");
        }
    }

    #[test]
    fn ttl_type_rejects_unknown_byte() {
        assert!(TtlType::from_byte(0x04).is_ok());
        assert!(TtlType::from_byte(0x00).is_err());
        assert!(TtlType::from_byte(0x07).is_err());
    }

    #[test]
    fn connection_id_hex_round_trip() {
        let id = ConnectionId::from_bytes([0xAB; 16]);
        let text = id.to_string();
        assert_eq!(text, "ab".repeat(16));
        assert_eq!(text.parse::<ConnectionId>().unwrap(), id);
        assert!("not-hex".parse::<ConnectionId>().is_err());
        assert!("abcd".parse::<ConnectionId>().is_err());
    }
}
