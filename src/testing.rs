//! In-crate test doubles: a scriptable chain, a controllable clock,
//! throwaway wallets and a fake prover.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use k256::ecdsa::SigningKey;
use tokio::sync::RwLock;

use crate::auth::address_of;
use crate::chain::{ChainError, DelegateKey, GameChain, RevealEvent, RoomInfo, RoomPhase};
use crate::core::address::{Address, RoomId};
use crate::core::clock::Clock;
use crate::core::hash::personal_message_hash;
use crate::proof::{CircuitInputs, Groth16Proof, ProofBackend, ProofError, SnarkProof};

// =============================================================================
// CLOCK
// =============================================================================

/// Clock that only moves when told to.
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    pub fn new(now_ms: u64) -> Self {
        Self { now_ms: AtomicU64::new(now_ms) }
    }

    pub fn advance_ms(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

// =============================================================================
// WALLETS
// =============================================================================

/// Throwaway secp256k1 wallet.
pub struct TestWallet {
    pub key: SigningKey,
    pub address: Address,
}

impl TestWallet {
    pub fn random() -> Self {
        let key = SigningKey::random(&mut rand::rngs::OsRng);
        let address = address_of(key.verifying_key());
        Self { key, address }
    }
}

/// `personal_sign` a message, returning `0x` + r || s || v.
pub fn sign(wallet: &TestWallet, message: &str) -> String {
    let digest = personal_message_hash(message);
    let (signature, recovery_id) = wallet
        .key
        .sign_prehash_recoverable(&digest)
        .expect("signing a 32-byte digest");
    let mut bytes = signature.to_bytes().to_vec();
    bytes.push(recovery_id.to_byte() + 27);
    format!("0x{}", hex::encode(bytes))
}

// =============================================================================
// CHAIN
// =============================================================================

#[derive(Default)]
struct ChainState {
    rooms: BTreeMap<RoomId, RoomInfo>,
    players: BTreeMap<RoomId, Vec<Address>>,
    dead: BTreeSet<(RoomId, Address)>,
    events: Vec<(RoomId, RevealEvent)>,
    targets: BTreeMap<(RoomId, Address), Address>,
    delegates: BTreeMap<Address, DelegateKey>,
    block_number: u64,
    failing_blocks: Vec<u64>,
    log_queries: usize,
    offline: bool,
}

/// Scriptable in-memory game contract.
#[derive(Default)]
pub struct MockChain {
    state: RwLock<ChainState>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_room(&self, room_id: RoomId, host: Address, phase: RoomPhase, players: &[Address]) {
        let mut s = self.state.write().await;
        s.rooms.insert(room_id, RoomInfo {
            id: room_id,
            host,
            phase,
            day_count: 1,
            player_count: players.len() as u32,
        });
        s.players.insert(room_id, players.to_vec());
    }

    pub async fn set_phase(&self, room_id: RoomId, phase: RoomPhase) {
        if let Some(room) = self.state.write().await.rooms.get_mut(&room_id) {
            room.phase = phase;
        }
    }

    pub async fn set_day(&self, room_id: RoomId, day: u64) {
        if let Some(room) = self.state.write().await.rooms.get_mut(&room_id) {
            room.day_count = day;
        }
    }

    pub async fn kill(&self, room_id: RoomId, player: Address) {
        self.state.write().await.dead.insert((room_id, player));
    }

    pub async fn set_block_number(&self, block: u64) {
        self.state.write().await.block_number = block;
    }

    pub async fn push_reveal_event(&self, room_id: RoomId, block: u64, detective: Address, target: Address) {
        self.state.write().await.events.push((room_id, RevealEvent {
            block_number: block,
            detective,
            target,
        }));
    }

    pub async fn set_revealed_target(&self, room_id: RoomId, detective: Address, target: Address) {
        self.state.write().await.targets.insert((room_id, detective), target);
    }

    pub async fn register_delegate(&self, player: Address, key: Address, expires_at: u64) {
        self.state.write().await.delegates.insert(player, DelegateKey { key, expires_at });
    }

    /// Make the log query covering `block` fail.
    pub async fn fail_log_range_containing(&self, block: u64) {
        self.state.write().await.failing_blocks.push(block);
    }

    /// Fail every call with a transport error.
    pub async fn set_offline(&self, offline: bool) {
        self.state.write().await.offline = offline;
    }

    pub async fn log_queries(&self) -> usize {
        self.state.read().await.log_queries
    }

    async fn check_online(&self) -> Result<(), ChainError> {
        if self.state.read().await.offline {
            return Err(ChainError::Transport("node unreachable".to_string()));
        }
        Ok(())
    }
}

impl GameChain for MockChain {
    async fn room(&self, room_id: RoomId) -> Result<RoomInfo, ChainError> {
        self.check_online().await?;
        self.state
            .read()
            .await
            .rooms
            .get(&room_id)
            .cloned()
            .ok_or(ChainError::RoomNotFound(room_id))
    }

    async fn players(&self, room_id: RoomId) -> Result<Vec<Address>, ChainError> {
        self.check_online().await?;
        Ok(self.state.read().await.players.get(&room_id).cloned().unwrap_or_default())
    }

    async fn is_alive(&self, room_id: RoomId, player: Address) -> Result<bool, ChainError> {
        self.check_online().await?;
        Ok(!self.state.read().await.dead.contains(&(room_id, player)))
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        self.check_online().await?;
        Ok(self.state.read().await.block_number)
    }

    async fn reveal_events(
        &self,
        room_id: RoomId,
        detective: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RevealEvent>, ChainError> {
        self.check_online().await?;
        let mut s = self.state.write().await;
        s.log_queries += 1;
        if s.failing_blocks.iter().any(|b| (from_block..=to_block).contains(b)) {
            return Err(ChainError::Rpc { code: -32005, message: "query returned more than 10000 results".into() });
        }
        Ok(s.events
            .iter()
            .filter(|(room, e)| {
                *room == room_id && e.detective == detective && (from_block..=to_block).contains(&e.block_number)
            })
            .map(|(_, e)| e.clone())
            .collect())
    }

    async fn revealed_target(&self, room_id: RoomId, detective: Address) -> Result<Option<Address>, ChainError> {
        self.check_online().await?;
        Ok(self.state.read().await.targets.get(&(room_id, detective)).copied())
    }

    async fn delegate_of(&self, player: Address) -> Result<Option<DelegateKey>, ChainError> {
        self.check_online().await?;
        Ok(self.state.read().await.delegates.get(&player).copied())
    }
}

// =============================================================================
// PROVER
// =============================================================================

/// Fake prover echoing its inputs as public signals.
pub struct MockProver {
    delay: Duration,
    fail: bool,
    calls: AtomicUsize,
}

impl MockProver {
    pub fn instant() -> Self {
        Self::slow(Duration::ZERO)
    }

    pub fn slow(delay: Duration) -> Self {
        Self { delay, fail: false, calls: AtomicUsize::new(0) }
    }

    pub fn failing() -> Self {
        Self { delay: Duration::ZERO, fail: true, calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ProofBackend for MockProver {
    async fn prove(&self, inputs: &CircuitInputs) -> Result<SnarkProof, ProofError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(ProofError::Backend("constraint not satisfied".to_string()));
        }
        let s = |v: &str| v.to_string();
        Ok(SnarkProof {
            proof: Groth16Proof {
                pi_a: vec![s("1"), s("2"), s("1")],
                pi_b: vec![vec![s("3"), s("4")], vec![s("5"), s("6")], vec![s("1"), s("0")]],
                pi_c: vec![s("7"), s("8"), s("1")],
                protocol: s("groth16"),
                curve: s("bn128"),
            },
            public_signals: vec![inputs.room_id.clone(), inputs.mafia_count.clone(), inputs.town_count.clone()],
        })
    }
}

// =============================================================================
// SIGNATURES
// =============================================================================

/// Verifier that gives the same answer for every signature.
pub struct StaticVerifier(pub bool);

impl crate::auth::SignatureVerifier for StaticVerifier {
    fn verify(&self, _address: Address, _message: &str, _signature: &str) -> bool {
        self.0
    }
}
