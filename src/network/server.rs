//! WebSocket Coordinator Server
//!
//! Async WebSocket server in front of the [`Coordinator`]. Each request
//! is dispatched on its own task, so a seconds-long proof never holds up
//! other requests on the same connection.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::time::interval;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};

use crate::chain::GameChain;
use crate::network::protocol::{ClientEnvelope, ClientMessage, ServerEnvelope, ServerError, ServerMessage};
use crate::proof::ProofBackend;
use crate::service::Coordinator;
use crate::store::KvStore;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Connections silent for this long are dropped.
    pub idle_timeout: Duration,
    /// How often idle connections and expired keys are swept.
    pub cleanup_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
            idle_timeout: Duration::from_secs(300),
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Result<Self, CoordinatorServerError> {
        let defaults = Self::default();
        let bind_addr = match std::env::var("COORD_BIND_ADDR") {
            Ok(v) => v
                .parse()
                .map_err(|e| CoordinatorServerError::Config(format!("COORD_BIND_ADDR {:?}: {}", v, e)))?,
            Err(_) => defaults.bind_addr,
        };
        Ok(Self {
            bind_addr,
            max_connections: std::env::var("COORD_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_connections),
            ..defaults
        })
    }
}

/// Server errors.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// Bad configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Connected client state.
struct ConnectedClient {
    /// Last request received.
    last_activity: Instant,
    /// Requests handled so far.
    requests: u64,
    /// Fired when the cleanup loop evicts the connection.
    evict: Option<oneshot::Sender<()>>,
}

type Clients = Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>;

/// The coordinator server.
pub struct CoordinatorServer<C, K, P> {
    /// Server configuration.
    config: ServerConfig,
    /// Request handler.
    coordinator: Arc<Coordinator<C, K, P>>,
    /// Connected clients.
    clients: Clients,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl<C: GameChain, K: KvStore, P: ProofBackend> CoordinatorServer<C, K, P> {
    /// Create a new server.
    pub fn new(config: ServerConfig, coordinator: Arc<Coordinator<C, K, P>>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            coordinator,
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Bind the configured address and serve until shutdown.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), CoordinatorServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!("Coordinator listening on {}", self.config.bind_addr);
        self.serve(listener).await
    }

    /// Serve connections from an already-bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), CoordinatorServerError> {
        let cleanup_clients = self.clients.clone();
        let cleanup_coordinator = self.coordinator.clone();
        let cleanup_config = self.config.clone();

        // Spawn cleanup task
        let cleanup_handle = tokio::spawn(async move {
            Self::run_cleanup_loop(cleanup_clients, cleanup_coordinator, cleanup_config).await;
        });

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let clients_count = self.clients.read().await.len();
                            if clients_count >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        cleanup_handle.abort();
        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let clients = self.clients.clone();
        let coordinator = self.coordinator.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerEnvelope>(64);
            let (evict_tx, mut evict_rx) = oneshot::channel::<()>();

            // Register client
            clients.write().await.insert(addr, ConnectedClient {
                last_activity: Instant::now(),
                requests: 0,
                evict: Some(evict_tx),
            });

            // Spawn message sender task
            let sender_task = tokio::spawn(async move {
                while let Some(envelope) = msg_rx.recv().await {
                    let text = match envelope.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                let _ = ws_sender.close().await;
            });

            // Handle incoming messages
            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let envelope = match ClientEnvelope::parse(&text) {
                                    Ok(e) => e,
                                    Err(rejected) => {
                                        debug!("Rejected frame from {}: {}", addr, rejected.error.message);
                                        let _ = msg_tx.send(rejected.into_envelope()).await;
                                        continue;
                                    }
                                };

                                // Update activity
                                if let Some(client) = clients.write().await.get_mut(&addr) {
                                    client.last_activity = Instant::now();
                                    client.requests += 1;
                                }

                                let coordinator = coordinator.clone();
                                let tx = msg_tx.clone();
                                tokio::spawn(async move {
                                    let message = handle_request(coordinator.as_ref(), envelope.message).await;
                                    let _ = tx.send(ServerEnvelope { id: envelope.id, message }).await;
                                });
                            }
                            Some(Ok(Message::Binary(_))) => {
                                let reply = ServerMessage::Error(ServerError::invalid_message("binary frames are not supported"));
                                let _ = msg_tx.send(ServerEnvelope::unsolicited(reply)).await;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                error!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = &mut evict_rx => {
                        info!("Evicting idle client {}", addr);
                        break;
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = msg_tx.send(ServerEnvelope::unsolicited(ServerMessage::Shutdown {
                            reason: "Server shutting down".to_string(),
                        })).await;
                        break;
                    }
                }
            }

            // Let the writer flush what is queued, then stop it
            drop(msg_tx);
            if tokio::time::timeout(Duration::from_secs(1), sender_task).await.is_err() {
                debug!("Writer for {} did not drain in time", addr);
            }

            let served = clients.write().await.remove(&addr).map(|c| c.requests).unwrap_or(0);
            info!("Client {} cleaned up after {} requests", addr, served);
        });
    }

    /// Background cleanup: idle connections and expired store keys.
    async fn run_cleanup_loop(clients: Clients, coordinator: Arc<Coordinator<C, K, P>>, config: ServerConfig) {
        let mut interval = interval(config.cleanup_interval);

        loop {
            interval.tick().await;

            let now = Instant::now();
            let idle: Vec<oneshot::Sender<()>> = {
                let mut clients = clients.write().await;
                clients
                    .iter_mut()
                    .filter(|(_, c)| now.duration_since(c.last_activity) > config.idle_timeout)
                    .filter_map(|(_, c)| c.evict.take())
                    .collect()
            };
            for evict in idle {
                let _ = evict.send(());
            }

            match coordinator.purge_expired().await {
                Ok(0) => {}
                Ok(n) => info!("Purged {} expired keys", n),
                Err(e) => warn!("Expired key purge failed: {}", e),
            }
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

/// Run one request against the coordinator and build the reply.
pub async fn handle_request<C: GameChain, K: KvStore, P: ProofBackend>(
    coordinator: &Coordinator<C, K, P>,
    message: ClientMessage,
) -> ServerMessage {
    let result = match message {
        ClientMessage::GetDiscussionState(query) => coordinator
            .discussion_state(query.room_id, query.day_count, query.player_address)
            .await
            .map(ServerMessage::DiscussionState),
        ClientMessage::DiscussionAction(request) => coordinator
            .discussion_action(request.room_id, request.day_count, request.action, request.player_address)
            .await
            .map(ServerMessage::DiscussionState),
        ClientMessage::RevealSecret(request) => coordinator
            .reveal_secret(request)
            .await
            .map(ServerMessage::SecretStored),
        ClientMessage::Investigate(request) => coordinator
            .investigate(request)
            .await
            .map(ServerMessage::InvestigationResult),
        ClientMessage::NightSummary(query) => coordinator
            .night_summary(query.room_id)
            .await
            .map(ServerMessage::NightSummary),
        ClientMessage::CheckWin(query) => coordinator.check_win(query.room_id).await.map(ServerMessage::WinCheck),
        ClientMessage::Ping { timestamp } => Ok(ServerMessage::Pong {
            timestamp,
            server_time: coordinator.now_ms(),
        }),
    };

    result.unwrap_or_else(|e| {
        debug!("Request failed: {}", e);
        ServerMessage::Error(ServerError::from(&e))
    })
}
