//! In-process mock server for client integration tests
//!
//! Speaks just enough of the wire protocol (at `ValueSize::U16`) to exercise
//! the pipeline and service layers: stateful counters and buffers, answered
//! strictly in request order on each connection.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Once};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn".into()),
            )
            .with_test_writer()
            .try_init();
    });
}

#[derive(Debug, Clone)]
struct Counter {
    quota: u64,
    ttl_type: u8,
    ttl: u64,
}

#[derive(Debug, Clone)]
struct Buffer {
    ttl_type: u8,
    ttl: u64,
    value: Vec<u8>,
}

#[derive(Default)]
struct State {
    counters: BTreeMap<Vec<u8>, Counter>,
    buffers: BTreeMap<Vec<u8>, Buffer>,
}

/// Start a mock server; returns its address. Lives until the runtime drops.
pub async fn spawn_server() -> anyhow::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?.to_string();
    let state = Arc::new(Mutex::new(State::default()));
    let next_connection = Arc::new(AtomicU64::new(1));

    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                return;
            };
            let state = Arc::clone(&state);
            let id = next_connection.fetch_add(1, Ordering::Relaxed);
            tokio::spawn(async move {
                let _ = handle_connection(socket, state, id).await;
            });
        }
    });

    Ok(addr)
}

/// Start a server that reads one request and then drops the connection
/// without answering.
#[allow(dead_code)] // Not every test binary exercises disconnects
pub async fn spawn_flaky_server() -> anyhow::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?.to_string();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 64];
                let _ = socket.read(&mut buf).await;
                // Drop without replying.
            });
        }
    });

    Ok(addr)
}

async fn handle_connection(
    socket: TcpStream,
    state: Arc<Mutex<State>>,
    connection_id: u64,
) -> anyhow::Result<()> {
    let (read_half, mut write_half) = socket.into_split();
    let mut reader = BufReader::new(read_half);

    loop {
        let tag = match reader.read_u8().await {
            Ok(tag) => tag,
            Err(_) => return Ok(()), // peer closed
        };

        let reply = match tag {
            0x01 => {
                // INSERT: quota(2) ttl_type(1) ttl(2) key_len(1) key
                let quota = reader.read_u16_le().await? as u64;
                let ttl_type = reader.read_u8().await?;
                let ttl = reader.read_u16_le().await? as u64;
                let key = read_key(&mut reader).await?;

                let mut state = state.lock().await;
                if state.counters.contains_key(&key) {
                    vec![0]
                } else {
                    state.counters.insert(
                        key,
                        Counter {
                            quota,
                            ttl_type,
                            ttl,
                        },
                    );
                    query_success(quota, ttl_type, ttl)
                }
            }
            0x02 => {
                // QUERY: key_len(1) key
                let key = read_key(&mut reader).await?;
                let state = state.lock().await;
                match state.counters.get(&key) {
                    Some(c) => query_success(c.quota, c.ttl_type, c.ttl),
                    None => vec![0],
                }
            }
            0x03 => {
                // UPDATE: attr(1) change(1) value(2) key_len(1) key
                let attribute = reader.read_u8().await?;
                let change = reader.read_u8().await?;
                let value = reader.read_u16_le().await? as u64;
                let key = read_key(&mut reader).await?;

                let mut state = state.lock().await;
                match state.counters.get_mut(&key) {
                    Some(c) => {
                        let field = if attribute == 0 {
                            &mut c.quota
                        } else {
                            &mut c.ttl
                        };
                        match change {
                            0 => {
                                *field = value;
                                vec![1]
                            }
                            1 => {
                                *field += value;
                                vec![1]
                            }
                            // A decrease past zero is refused, not clamped.
                            _ if value > *field => vec![0],
                            _ => {
                                *field -= value;
                                vec![1]
                            }
                        }
                    }
                    None => vec![0],
                }
            }
            0x04 => {
                // PURGE: key_len(1) key
                let key = read_key(&mut reader).await?;
                let mut state = state.lock().await;
                let removed =
                    state.counters.remove(&key).is_some() || state.buffers.remove(&key).is_some();
                vec![if removed { 1 } else { 0 }]
            }
            0x05 => {
                // SET: ttl_type(1) ttl(2) key_len(1) value_len(2) key value
                let ttl_type = reader.read_u8().await?;
                let ttl = reader.read_u16_le().await? as u64;
                let key_len = reader.read_u8().await? as usize;
                let value_len = reader.read_u16_le().await? as usize;
                let mut key = vec![0u8; key_len];
                reader.read_exact(&mut key).await?;
                let mut value = vec![0u8; value_len];
                reader.read_exact(&mut value).await?;

                let mut state = state.lock().await;
                state.buffers.insert(
                    key,
                    Buffer {
                        ttl_type,
                        ttl,
                        value,
                    },
                );
                vec![1]
            }
            0x06 => {
                // GET: key_len(1) key
                let key = read_key(&mut reader).await?;
                let state = state.lock().await;
                match state.buffers.get(&key) {
                    Some(b) => {
                        let mut reply = vec![1, b.ttl_type];
                        reply.extend_from_slice(&(b.ttl as u16).to_le_bytes());
                        reply.extend_from_slice(&(b.value.len() as u16).to_le_bytes());
                        reply.extend_from_slice(&b.value);
                        reply
                    }
                    None => vec![0],
                }
            }
            0x07 => {
                // LIST: tag only
                let state = state.lock().await;
                list_reply(&state)
            }
            0x12 => {
                // WHOAMI: tag only, fixed 17-byte reply
                let mut reply = vec![1];
                let mut id = [0u8; 16];
                id[..8].copy_from_slice(&connection_id.to_le_bytes());
                reply.extend_from_slice(&id);
                reply
            }
            other => panic!("mock server got unexpected tag {other:#04x}"),
        };

        write_half.write_all(&reply).await?;
    }
}

async fn read_key(
    reader: &mut BufReader<tokio::net::tcp::OwnedReadHalf>,
) -> anyhow::Result<Vec<u8>> {
    let len = reader.read_u8().await? as usize;
    let mut key = vec![0u8; len];
    reader.read_exact(&mut key).await?;
    Ok(key)
}

fn query_success(quota: u64, ttl_type: u8, ttl: u64) -> Vec<u8> {
    let mut reply = vec![1];
    reply.extend_from_slice(&(quota as u16).to_le_bytes());
    reply.push(ttl_type);
    reply.extend_from_slice(&(ttl as u16).to_le_bytes());
    reply
}

fn list_reply(state: &State) -> Vec<u8> {
    let counters = state.counters.iter().map(|(key, c)| {
        (key.clone(), 0u8, c.ttl_type, c.ttl, 8u64)
    });
    let buffers = state.buffers.iter().map(|(key, b)| {
        (key.clone(), 1u8, b.ttl_type, b.ttl, b.value.len() as u64)
    });
    let records: Vec<_> = counters.chain(buffers).collect();

    let mut reply = vec![1];
    if records.is_empty() {
        reply.extend_from_slice(&0u64.to_le_bytes());
        return reply;
    }

    reply.extend_from_slice(&1u64.to_le_bytes()); // one fragment
    reply.extend_from_slice(&0u64.to_le_bytes()); // fragment index
    reply.extend_from_slice(&(records.len() as u64).to_le_bytes());
    for (key, key_type, ttl_type, ttl, bytes_used) in &records {
        reply.push(key.len() as u8);
        reply.push(*key_type);
        reply.push(*ttl_type);
        reply.extend_from_slice(&ttl.to_le_bytes());
        reply.extend_from_slice(&(*bytes_used as u16).to_le_bytes());
    }
    for (key, ..) in &records {
        reply.extend_from_slice(key);
    }
    reply
}
