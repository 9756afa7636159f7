//! Response decoding
//!
//! Decoders are length-aware and partial-tolerant: every field read checks
//! `remaining >= width` first and reports the exact shortfall through
//! [`Decoded::Incomplete`] instead of reading out of bounds. Callers
//! accumulate more bytes and retry; a retry always restarts from the front of
//! the buffer, so decoding is a pure function of (bytes so far, operation,
//! value size).
//!
//! Fragmented families (LIST, STATS, CHANNELS, CONNECTIONS) validate each
//! fragment's whole byte budget before trusting its record count, so a
//! malformed stream claiming an absurd count is rejected rather than
//! buffered.

use crate::error::ProtocolError;
use crate::response::{
    ChannelRecord, ChannelResponse, ChannelsResponse, ConnectionRecord, ConnectionResponse,
    ConnectionsResponse, GetResponse, InfoResponse, KeyMetrics, KeyRecord, KeyStats, ListResponse,
    OperationMetrics, OperationTable, QueryResponse, Response, ServerInfo, StatResponse,
    StatsResponse, StatusResponse, WhoamiResponse,
};
use crate::types::{
    ConnectionId, ConnectionKind, ConnectionType, IpVersion, KeyType, RequestType, TtlType,
    ValueSize,
};
use bytes::Bytes;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Maximum bytes one response may claim (64 MiB). A declared fragment or
/// value budget above this is a protocol error, not an allocation.
pub const MAX_RESPONSE_SIZE: usize = 64 * 1024 * 1024;

/// Fixed wire length of an INFO response, success or not.
pub const INFO_RESPONSE_LEN: usize = 433;

/// Fixed wire length of a WHOAMI response, success or not.
pub const WHOAMI_RESPONSE_LEN: usize = 17;

/// Progress of one decode attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// A full response was decoded from the first `consumed` bytes.
    Complete { response: Response, consumed: usize },
    /// At least `needed` more bytes are required before the next field of
    /// this response can be read.
    Incomplete { needed: usize },
}

/// Decode one response for `op` from the front of `buf`.
///
/// Returns [`Decoded::Incomplete`] when the buffer is too short, and an error
/// when the bytes cannot belong to any valid response for the operation (in
/// which case the stream position is unrecoverable).
pub fn decode_response(
    buf: &[u8],
    op: RequestType,
    size: ValueSize,
) -> Result<Decoded, ProtocolError> {
    let mut cur = Cursor::new(buf);

    let result = match op {
        RequestType::Update | RequestType::Purge | RequestType::Set => {
            decode_status(&mut cur).map(Response::Status)
        }
        RequestType::Insert | RequestType::Query => {
            decode_query(&mut cur, size).map(Response::Query)
        }
        RequestType::Get => decode_get(&mut cur, size).map(Response::Get),
        RequestType::List => decode_list(&mut cur, size).map(Response::List),
        RequestType::Stat => decode_stat(&mut cur).map(Response::Stat),
        RequestType::Stats => decode_stats(&mut cur).map(Response::Stats),
        RequestType::Info => decode_info(&mut cur).map(Response::Info),
        RequestType::Connections => decode_connections(&mut cur).map(Response::Connections),
        RequestType::Connection => decode_connection(&mut cur).map(Response::Connection),
        RequestType::Channels => decode_channels(&mut cur).map(Response::Channels),
        RequestType::Channel => decode_channel(&mut cur).map(Response::Channel),
        RequestType::Whoami => decode_whoami(&mut cur).map(Response::Whoami),
        RequestType::Subscribe
        | RequestType::Unsubscribe
        | RequestType::Publish
        | RequestType::Event => Err(ProtocolError::UnsupportedOperation(op).into()),
    };

    match result {
        Ok(response) => Ok(Decoded::Complete {
            response,
            consumed: cur.pos,
        }),
        Err(DecodeError::Incomplete { needed }) => Ok(Decoded::Incomplete { needed }),
        Err(DecodeError::Protocol(err)) => Err(err),
    }
}

// ============================================================================
// Per-family decoders
// ============================================================================

fn decode_status(cur: &mut Cursor<'_>) -> Result<StatusResponse, DecodeError> {
    let success = cur.status()?;
    Ok(StatusResponse { success })
}

fn decode_query(cur: &mut Cursor<'_>, size: ValueSize) -> Result<QueryResponse, DecodeError> {
    if !cur.status()? {
        return Ok(QueryResponse::Failure);
    }
    let quota = cur.uint(size)?;
    let ttl_type = TtlType::from_byte(cur.u8()?)?;
    let ttl = cur.uint(size)?;
    Ok(QueryResponse::Success {
        quota,
        ttl_type,
        ttl,
    })
}

fn decode_get(cur: &mut Cursor<'_>, size: ValueSize) -> Result<GetResponse, DecodeError> {
    if !cur.status()? {
        return Ok(GetResponse::Failure);
    }
    let ttl_type = TtlType::from_byte(cur.u8()?)?;
    let ttl = cur.uint(size)?;
    let value_len = budget(cur.uint(size)?, 1)?;
    let value = cur.copy_bytes(value_len)?;
    Ok(GetResponse::Success {
        ttl_type,
        ttl,
        value,
    })
}

fn decode_list(cur: &mut Cursor<'_>, size: ValueSize) -> Result<ListResponse, DecodeError> {
    if !cur.status()? {
        return Ok(ListResponse::Failure);
    }

    let fragments = fragment_count(cur)?;
    let mut keys = Vec::new();

    for _ in 0..fragments {
        cur.skip(8)?; // fragment index
        let count = cur.u64()?;
        // key_len + key_type + ttl_type + ttl + bytes_used
        let header_width = 3 + 8 + size.width();
        cur.require(budget(count, header_width)?)?;

        let mut headers = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let key_len = cur.u8()? as usize;
            let key_type = KeyType::from_byte(cur.u8()?)?;
            let ttl_type = TtlType::from_byte(cur.u8()?)?;
            let ttl = cur.u64()?;
            let bytes_used = cur.uint(size)?;
            headers.push((key_len, key_type, ttl_type, ttl, bytes_used));
        }

        // Names are packed contiguously after the fixed block.
        let names_len: usize = headers.iter().map(|h| h.0).sum();
        cur.require(names_len)?;
        for (key_len, key_type, ttl_type, ttl, bytes_used) in headers {
            let key = cur.copy_bytes(key_len)?;
            keys.push(KeyRecord {
                key,
                key_type,
                ttl_type,
                ttl,
                bytes_used,
            });
        }
    }

    Ok(ListResponse::Success { keys })
}

fn decode_stat(cur: &mut Cursor<'_>) -> Result<StatResponse, DecodeError> {
    if !cur.status()? {
        return Ok(StatResponse::Failure);
    }
    let metrics = decode_key_metrics(cur)?;
    Ok(StatResponse::Success { metrics })
}

fn decode_stats(cur: &mut Cursor<'_>) -> Result<StatsResponse, DecodeError> {
    if !cur.status()? {
        return Ok(StatsResponse::Failure);
    }

    let fragments = fragment_count(cur)?;
    let mut keys = Vec::new();

    for _ in 0..fragments {
        cur.skip(8)?; // fragment index
        let count = cur.u64()?;
        // key_len + four u64 counters
        cur.require(budget(count, 1 + 32)?)?;

        let mut headers = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let key_len = cur.u8()? as usize;
            let metrics = decode_key_metrics(cur)?;
            headers.push((key_len, metrics));
        }

        let names_len: usize = headers.iter().map(|h| h.0).sum();
        cur.require(names_len)?;
        for (key_len, metrics) in headers {
            let key = cur.copy_bytes(key_len)?;
            keys.push(KeyStats { key, metrics });
        }
    }

    Ok(StatsResponse::Success { keys })
}

fn decode_key_metrics(cur: &mut Cursor<'_>) -> Result<KeyMetrics, DecodeError> {
    Ok(KeyMetrics {
        reads_per_minute: cur.u64()?,
        writes_per_minute: cur.u64()?,
        total_reads: cur.u64()?,
        total_writes: cur.u64()?,
    })
}

fn decode_info(cur: &mut Cursor<'_>) -> Result<InfoResponse, DecodeError> {
    // INFO is fixed-width regardless of status.
    cur.require(INFO_RESPONSE_LEN)?;
    if !cur.status()? {
        cur.skip(INFO_RESPONSE_LEN - 1)?;
        return Ok(InfoResponse::Failure);
    }

    let now = cur.u64()?;
    let total_requests = cur.u64()?;
    let total_requests_per_minute = cur.u64()?;

    let mut rows = [OperationMetrics::default(); 18];
    for row in &mut rows {
        row.total = cur.u64()?;
        row.per_minute = cur.u64()?;
    }

    let info = ServerInfo {
        now,
        total_requests,
        total_requests_per_minute,
        requests: OperationTable::new(rows),
        total_read: cur.u64()?,
        total_read_per_minute: cur.u64()?,
        total_write: cur.u64()?,
        total_write_per_minute: cur.u64()?,
        total_keys: cur.u64()?,
        total_counters: cur.u64()?,
        total_buffers: cur.u64()?,
        total_allocated_bytes_on_counters: cur.u64()?,
        total_allocated_bytes_on_buffers: cur.u64()?,
        total_subscriptions: cur.u64()?,
        total_channels: cur.u64()?,
        started_at: cur.u64()?,
        total_connections: cur.u64()?,
        version: cur.array::<16>()?,
    };

    Ok(InfoResponse::Success(Box::new(info)))
}

/// Fixed width of one connection record inside a CONNECTIONS fragment
/// (id + 3 enum bytes + ip + port + 6 attribute counters + 18 per-operation
/// counters). Single-connection lookups add one more counter.
const CONNECTIONS_RECORD_LEN: usize = 16 + 3 + 16 + 2 + 8 * 6 + 8 * 18;

fn decode_connection(cur: &mut Cursor<'_>) -> Result<ConnectionResponse, DecodeError> {
    if !cur.status()? {
        return Ok(ConnectionResponse::Failure);
    }
    cur.require(CONNECTIONS_RECORD_LEN + 8)?;
    let record = decode_connection_record(cur, true)?;
    Ok(ConnectionResponse::Success(Box::new(record)))
}

fn decode_connections(cur: &mut Cursor<'_>) -> Result<ConnectionsResponse, DecodeError> {
    if !cur.status()? {
        return Ok(ConnectionsResponse::Failure);
    }

    let fragments = fragment_count(cur)?;
    let mut connections = Vec::new();

    for _ in 0..fragments {
        cur.skip(8)?; // fragment index
        let count = cur.u64()?;
        cur.require(budget(count, CONNECTIONS_RECORD_LEN)?)?;
        for _ in 0..count {
            connections.push(decode_connection_record(cur, false)?);
        }
    }

    Ok(ConnectionsResponse::Success { connections })
}

fn decode_connection_record(
    cur: &mut Cursor<'_>,
    with_consumed: bool,
) -> Result<ConnectionRecord, DecodeError> {
    let id = ConnectionId::from_bytes(cur.array::<16>()?);
    let connection_type = ConnectionType::from_byte(cur.u8()?)?;
    let kind = ConnectionKind::from_byte(cur.u8()?)?;
    let ip_version = IpVersion::from_byte(cur.u8()?)?;
    let ip_bytes = cur.array::<16>()?;
    let ip = match ip_version {
        IpVersion::V4 => IpAddr::V4(Ipv4Addr::new(
            ip_bytes[0],
            ip_bytes[1],
            ip_bytes[2],
            ip_bytes[3],
        )),
        IpVersion::V6 => IpAddr::V6(Ipv6Addr::from(ip_bytes)),
    };
    let port = cur.u16()?;
    let connected_at = cur.u64()?;
    let read_bytes = cur.u64()?;
    let write_bytes = cur.u64()?;
    let published_bytes = cur.u64()?;
    let received_bytes = cur.u64()?;
    let allocated_bytes = cur.u64()?;
    let consumed_bytes = if with_consumed {
        Some(cur.u64()?)
    } else {
        None
    };

    let mut requests = [0u64; 18];
    for slot in &mut requests {
        *slot = cur.u64()?;
    }

    Ok(ConnectionRecord {
        id,
        connection_type,
        kind,
        ip,
        port,
        connected_at,
        read_bytes,
        write_bytes,
        published_bytes,
        received_bytes,
        allocated_bytes,
        consumed_bytes,
        requests: OperationTable::new(requests),
    })
}

fn decode_channels(cur: &mut Cursor<'_>) -> Result<ChannelsResponse, DecodeError> {
    if !cur.status()? {
        return Ok(ChannelsResponse::Failure);
    }

    let fragments = fragment_count(cur)?;
    let mut channels = Vec::new();

    for _ in 0..fragments {
        cur.skip(8)?; // fragment index
        let count = cur.u64()?;
        // name_len + read_bytes + write_bytes + subscriptions
        cur.require(budget(count, 1 + 24)?)?;

        let mut headers = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let name_len = cur.u8()? as usize;
            let read_bytes = cur.u64()?;
            let write_bytes = cur.u64()?;
            let subscriptions = cur.u64()?;
            headers.push((name_len, read_bytes, write_bytes, subscriptions));
        }

        let names_len: usize = headers.iter().map(|h| h.0).sum();
        cur.require(names_len)?;
        for (name_len, read_bytes, write_bytes, subscriptions) in headers {
            let name = cur.copy_bytes(name_len)?;
            channels.push(ChannelRecord {
                name,
                read_bytes,
                write_bytes,
                subscriptions,
            });
        }
    }

    Ok(ChannelsResponse::Success { channels })
}

fn decode_channel(cur: &mut Cursor<'_>) -> Result<ChannelResponse, DecodeError> {
    if !cur.status()? {
        return Ok(ChannelResponse::Failure);
    }

    let count = cur.u64()?;
    // id + subscribed_at + read_bytes + write_bytes
    cur.require(budget(count, 16 + 24)?)?;

    let mut subscribers = Vec::with_capacity(count as usize);
    for _ in 0..count {
        subscribers.push(crate::response::SubscriberRecord {
            id: ConnectionId::from_bytes(cur.array::<16>()?),
            subscribed_at: cur.u64()?,
            read_bytes: cur.u64()?,
            write_bytes: cur.u64()?,
        });
    }

    Ok(ChannelResponse::Success { subscribers })
}

fn decode_whoami(cur: &mut Cursor<'_>) -> Result<WhoamiResponse, DecodeError> {
    // WHOAMI is fixed-width regardless of status.
    cur.require(WHOAMI_RESPONSE_LEN)?;
    let success = cur.status()?;
    let id = ConnectionId::from_bytes(cur.array::<16>()?);
    Ok(WhoamiResponse { success, id })
}

// ============================================================================
// Helpers
// ============================================================================

/// Fragment count header, bounded so a hostile count cannot drive an
/// unbounded require loop (each fragment needs at least its two u64 headers).
fn fragment_count(cur: &mut Cursor<'_>) -> Result<u64, DecodeError> {
    let fragments = cur.u64()?;
    budget(fragments, 16)?;
    Ok(fragments)
}

/// `count * width` as a byte budget, rejected when it exceeds
/// [`MAX_RESPONSE_SIZE`].
fn budget(count: u64, width: usize) -> Result<usize, DecodeError> {
    match count.checked_mul(width as u64) {
        Some(total) if total <= MAX_RESPONSE_SIZE as u64 => Ok(total as usize),
        Some(total) => Err(ProtocolError::ResponseTooLarge {
            declared: total.min(usize::MAX as u64) as usize,
            max: MAX_RESPONSE_SIZE,
        }
        .into()),
        None => Err(ProtocolError::ResponseTooLarge {
            declared: usize::MAX,
            max: MAX_RESPONSE_SIZE,
        }
        .into()),
    }
}

#[derive(Debug)]
enum DecodeError {
    Incomplete { needed: usize },
    Protocol(ProtocolError),
}

impl From<ProtocolError> for DecodeError {
    fn from(err: ProtocolError) -> Self {
        DecodeError::Protocol(err)
    }
}

/// Forward-only reader over the accumulated buffer. Every read checks the
/// remaining length first and reports the exact shortfall.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Fail with the missing byte count unless `n` bytes are available.
    fn require(&self, n: usize) -> Result<(), DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::Incomplete {
                needed: n - self.remaining(),
            });
        }
        Ok(())
    }

    fn skip(&mut self, n: usize) -> Result<(), DecodeError> {
        self.require(n)?;
        self.pos += n;
        Ok(())
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        self.require(1)?;
        let value = self.buf[self.pos];
        self.pos += 1;
        Ok(value)
    }

    /// Status flag: 1 is success, anything else failure.
    fn status(&mut self) -> Result<bool, DecodeError> {
        Ok(self.u8()? == 1)
    }

    fn u16(&mut self) -> Result<u16, DecodeError> {
        Ok(self.uint_width(2)? as u16)
    }

    fn u64(&mut self) -> Result<u64, DecodeError> {
        self.uint_width(8)
    }

    fn uint(&mut self, size: ValueSize) -> Result<u64, DecodeError> {
        self.uint_width(size.width())
    }

    fn uint_width(&mut self, width: usize) -> Result<u64, DecodeError> {
        self.require(width)?;
        let mut value = 0u64;
        for (i, byte) in self.buf[self.pos..self.pos + width].iter().enumerate() {
            value |= (*byte as u64) << (8 * i);
        }
        self.pos += width;
        Ok(value)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        self.require(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        Ok(out)
    }

    fn copy_bytes(&mut self, n: usize) -> Result<Bytes, DecodeError> {
        self.require(n)?;
        let out = Bytes::copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(out)
    }
}
