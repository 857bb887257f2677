//! JSON-RPC Chain Client
//!
//! Talks to an Ethereum node over WebSocket (`eth_call`, `eth_getLogs`,
//! `eth_blockNumber`). Contract calls are ABI-encoded by hand: every
//! value the coordinator reads is a static 32-byte word except the player
//! list, which is a dynamic `address[]`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::{ChainError, DelegateKey, GameChain, RevealEvent, RoomInfo, RoomPhase};
use crate::core::address::{Address, AddressError, RoomId};
use crate::core::hash::{keccak256, selector};

/// `getRoomInfo(uint256) -> (address host, uint8 phase, uint256 dayCount, uint256 playerCount)`
const GET_ROOM_INFO: &str = "getRoomInfo(uint256)";
/// `getPlayers(uint256) -> address[]`
const GET_PLAYERS: &str = "getPlayers(uint256)";
/// `isAlive(uint256,address) -> bool`
const IS_ALIVE: &str = "isAlive(uint256,address)";
/// `detectiveTargets(uint256,address) -> address`
const DETECTIVE_TARGETS: &str = "detectiveTargets(uint256,address)";
/// `sessionKeys(address) -> (address key, uint256 expiresAt)`
const SESSION_KEYS: &str = "sessionKeys(address)";
/// `DetectiveRevealed(uint256 indexed roomId, address indexed detective, address target)`
const DETECTIVE_REVEALED: &str = "DetectiveRevealed(uint256,address,address)";

type Reply = oneshot::Sender<Result<Value, ChainError>>;
type Pending = Arc<Mutex<HashMap<u64, Reply>>>;

/// RPC client configuration.
#[derive(Clone, Debug)]
pub struct RpcConfig {
    /// Node WebSocket URL.
    pub url: String,
    /// Game contract address.
    pub contract: Address,
    /// Per-request deadline.
    pub request_timeout: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8545".to_string(),
            contract: Address::ZERO,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl RpcConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Result<Self, AddressError> {
        let defaults = Self::default();
        Ok(Self {
            url: std::env::var("CHAIN_RPC_URL").unwrap_or(defaults.url),
            contract: match std::env::var("GAME_CONTRACT_ADDRESS") {
                Ok(v) => v.parse()?,
                Err(_) => defaults.contract,
            },
            request_timeout: std::env::var("CHAIN_RPC_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    id: Option<u64>,
    result: Option<Value>,
    error: Option<RpcErrorBody>,
}

impl RpcResponse {
    fn into_result(self) -> Result<Value, ChainError> {
        if let Some(err) = self.error {
            return Err(ChainError::Rpc { code: err.code, message: err.message });
        }
        self.result
            .ok_or_else(|| ChainError::Decode("response has neither result nor error".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcLog {
    block_number: String,
    data: String,
    topics: Vec<String>,
}

/// One open node socket.
///
/// A writer task drains `outgoing` into the sink; a reader task routes each
/// reply to the waiting request by JSON-RPC id. When the socket closes the
/// reader drops every pending sender, so waiters see a transport error.
struct Connection {
    outgoing: mpsc::Sender<String>,
    pending: Pending,
    reader: JoinHandle<()>,
}

impl Connection {
    async fn open(url: &str) -> Result<Self, ChainError> {
        let (ws, _) = connect_async(url).await.map_err(|e| ChainError::Transport(e.to_string()))?;
        let (mut sink, mut stream) = ws.split();
        let (outgoing, mut outgoing_rx) = mpsc::channel::<String>(64);
        let pending: Pending = Arc::default();

        let writer = tokio::spawn(async move {
            while let Some(text) = outgoing_rx.recv().await {
                if let Err(e) = sink.send(Message::Text(text)).await {
                    warn!("Chain socket write failed: {}", e);
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let routes = pending.clone();
        let reader = tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                let text = match msg {
                    Ok(Message::Text(t)) => t,
                    Ok(Message::Binary(b)) => match String::from_utf8(b) {
                        Ok(t) => t,
                        Err(e) => {
                            debug!("Ignoring non-UTF-8 frame: {}", e);
                            continue;
                        }
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!("Chain socket read failed: {}", e);
                        break;
                    }
                };
                let response: RpcResponse = match serde_json::from_str(&text) {
                    Ok(r) => r,
                    Err(e) => {
                        debug!("Ignoring unparseable frame: {}", e);
                        continue;
                    }
                };
                // Subscription notifications carry no id
                let Some(id) = response.id else { continue };
                if let Some(reply) = routes.lock().await.remove(&id) {
                    let _ = reply.send(response.into_result());
                }
            }
            writer.abort();
            routes.lock().await.clear();
        });

        Ok(Self { outgoing, pending, reader })
    }

    fn is_closed(&self) -> bool {
        self.outgoing.is_closed() || self.reader.is_finished()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Game contract reader over a single lazily-opened WebSocket.
///
/// Requests are multiplexed on the socket and matched to replies by id,
/// so a slow call never holds up the others. Any transport failure drops
/// the socket; the next request reconnects.
pub struct RpcChain {
    config: RpcConfig,
    conn: Mutex<Option<Arc<Connection>>>,
    next_id: AtomicU64,
}

impl RpcChain {
    /// Create a client. No connection is made until the first request.
    pub fn new(config: RpcConfig) -> Self {
        Self {
            config,
            conn: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    async fn connection(&self) -> Result<Arc<Connection>, ChainError> {
        let mut slot = self.conn.lock().await;
        if let Some(conn) = slot.as_ref().filter(|c| !c.is_closed()) {
            return Ok(conn.clone());
        }
        let conn = Arc::new(Connection::open(&self.config.url).await?);
        info!("Connected to chain node at {}", self.config.url);
        *slot = Some(conn.clone());
        Ok(conn)
    }

    async fn drop_connection(&self, conn: &Arc<Connection>, reason: &str) {
        let mut slot = self.conn.lock().await;
        if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, conn)) {
            warn!("Dropping chain connection: {}", reason);
            *slot = None;
        }
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ChainError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });

        let conn = self.connection().await?;
        let (reply_tx, reply_rx) = oneshot::channel();
        conn.pending.lock().await.insert(id, reply_tx);

        if conn.outgoing.send(payload.to_string()).await.is_err() {
            conn.pending.lock().await.remove(&id);
            self.drop_connection(&conn, "writer closed").await;
            return Err(ChainError::Transport("connection closed".to_string()));
        }

        match timeout(self.config.request_timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                self.drop_connection(&conn, "connection closed").await;
                Err(ChainError::Transport("connection closed".to_string()))
            }
            Err(_) => {
                conn.pending.lock().await.remove(&id);
                let reason = format!("{} timed out", method);
                self.drop_connection(&conn, &reason).await;
                Err(ChainError::Transport(reason))
            }
        }
    }

    async fn eth_call(&self, data: Vec<u8>) -> Result<Vec<u8>, ChainError> {
        let params = json!([
            { "to": self.config.contract.to_string(), "data": format!("0x{}", hex::encode(data)) },
            "latest"
        ]);
        let value = self.request("eth_call", params).await?;
        decode_hex_bytes(value.as_str().unwrap_or_default())
    }
}

impl GameChain for RpcChain {
    async fn room(&self, room_id: RoomId) -> Result<RoomInfo, ChainError> {
        let out = self.eth_call(encode_call(GET_ROOM_INFO, &[uint_word(room_id)])).await?;
        let host = Address::from_word(&word_at(&out, 0)?);
        let phase = word_u64(&word_at(&out, 1)?)?;
        let day_count = word_u64(&word_at(&out, 2)?)?;
        let player_count = word_u64(&word_at(&out, 3)?)?;
        if host.is_zero() && player_count == 0 {
            return Err(ChainError::RoomNotFound(room_id));
        }
        let phase = u8::try_from(phase).map_err(|_| ChainError::Decode(format!("phase {} out of range", phase)))?;
        Ok(RoomInfo {
            id: room_id,
            host,
            phase: RoomPhase::try_from(phase)?,
            day_count,
            player_count: player_count as u32,
        })
    }

    async fn players(&self, room_id: RoomId) -> Result<Vec<Address>, ChainError> {
        let out = self.eth_call(encode_call(GET_PLAYERS, &[uint_word(room_id)])).await?;
        decode_address_array(&out)
    }

    async fn is_alive(&self, room_id: RoomId, player: Address) -> Result<bool, ChainError> {
        let out = self
            .eth_call(encode_call(IS_ALIVE, &[uint_word(room_id), player.to_word()]))
            .await?;
        Ok(word_u64(&word_at(&out, 0)?)? != 0)
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        let value = self.request("eth_blockNumber", json!([])).await?;
        parse_quantity(value.as_str().unwrap_or_default())
    }

    async fn reveal_events(
        &self,
        room_id: RoomId,
        detective: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RevealEvent>, ChainError> {
        let filter = json!([{
            "address": self.config.contract.to_string(),
            "fromBlock": format!("{:#x}", from_block),
            "toBlock": format!("{:#x}", to_block),
            "topics": [
                format!("0x{}", hex::encode(keccak256(DETECTIVE_REVEALED.as_bytes()))),
                format!("0x{}", hex::encode(uint_word(room_id))),
                format!("0x{}", hex::encode(detective.to_word())),
            ],
        }]);
        let value = self.request("eth_getLogs", filter).await?;
        let logs: Vec<RpcLog> = serde_json::from_value(value).map_err(|e| ChainError::Decode(e.to_string()))?;
        debug!("eth_getLogs {}..={} returned {} logs", from_block, to_block, logs.len());

        logs.iter().map(decode_reveal_log).collect()
    }

    async fn revealed_target(&self, room_id: RoomId, detective: Address) -> Result<Option<Address>, ChainError> {
        let out = self
            .eth_call(encode_call(DETECTIVE_TARGETS, &[uint_word(room_id), detective.to_word()]))
            .await?;
        let target = Address::from_word(&word_at(&out, 0)?);
        Ok((!target.is_zero()).then_some(target))
    }

    async fn delegate_of(&self, player: Address) -> Result<Option<DelegateKey>, ChainError> {
        let out = self.eth_call(encode_call(SESSION_KEYS, &[player.to_word()])).await?;
        let key = Address::from_word(&word_at(&out, 0)?);
        let expires_at = word_u64(&word_at(&out, 1)?)?;
        Ok((!key.is_zero()).then_some(DelegateKey { key, expires_at }))
    }
}

// =============================================================================
// ABI HELPERS
// =============================================================================

fn uint_word(value: u64) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

fn encode_call(signature: &str, args: &[[u8; 32]]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 32 * args.len());
    data.extend_from_slice(&selector(signature));
    for arg in args {
        data.extend_from_slice(arg);
    }
    data
}

/// 32-byte word at a word index.
fn word_at(data: &[u8], index: usize) -> Result<[u8; 32], ChainError> {
    word_at_byte(data, index * 32)
}

fn word_at_byte(data: &[u8], offset: usize) -> Result<[u8; 32], ChainError> {
    let slice = data
        .get(offset..offset + 32)
        .ok_or_else(|| ChainError::Decode(format!("return data too short for word at byte {}", offset)))?;
    let mut word = [0u8; 32];
    word.copy_from_slice(slice);
    Ok(word)
}

/// Interpret a word as u64, rejecting larger values.
fn word_u64(word: &[u8; 32]) -> Result<u64, ChainError> {
    if word[..24].iter().any(|b| *b != 0) {
        return Err(ChainError::Decode("uint does not fit in u64".to_string()));
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&word[24..]);
    Ok(u64::from_be_bytes(bytes))
}

fn decode_address_array(data: &[u8]) -> Result<Vec<Address>, ChainError> {
    let offset = word_u64(&word_at(data, 0)?)? as usize;
    let len = word_u64(&word_at_byte(data, offset)?)? as usize;
    (0..len)
        .map(|i| word_at_byte(data, offset + 32 * (i + 1)).map(|w| Address::from_word(&w)))
        .collect()
}

fn decode_hex_bytes(s: &str) -> Result<Vec<u8>, ChainError> {
    hex::decode(s.trim_start_matches("0x")).map_err(|e| ChainError::Decode(e.to_string()))
}

fn parse_quantity(s: &str) -> Result<u64, ChainError> {
    u64::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|e| ChainError::Decode(format!("bad quantity {:?}: {}", s, e)))
}

fn decode_reveal_log(log: &RpcLog) -> Result<RevealEvent, ChainError> {
    let topic = log
        .topics
        .get(2)
        .ok_or_else(|| ChainError::Decode("reveal log missing detective topic".to_string()))?;
    let detective_word = word_at(&decode_hex_bytes(topic)?, 0)?;
    let data = decode_hex_bytes(&log.data)?;
    Ok(RevealEvent {
        block_number: parse_quantity(&log.block_number)?,
        detective: Address::from_word(&detective_word),
        target: Address::from_word(&word_at(&data, 0)?),
    })
}
