//! Coordinator Service
//!
//! One method per client operation. Every handler reads what it needs
//! from the chain and the store, applies the pure rules in `game/`, and
//! returns exactly one [`CoordError`] kind on failure.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    COORDINATOR                               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  mod.rs        - Coordinator, config                         │
//! │  types.rs      - Request / response payloads                 │
//! │  discussion.rs - discussion_state, discussion_action         │
//! │  secrets.rs    - reveal_secret, investigate, night_summary   │
//! │  win.rs        - check_win                                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing here holds a lock across requests. Racing callers are
//! absorbed by the scheduler's advance guard and by the win check being
//! a pure recomputation.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::SignatureVerifier;
use crate::chain::{GameChain, LogSearchConfig};
use crate::core::clock::Clock;
use crate::game::DiscussionTiming;
use crate::proof::{ProofBackend, DEFAULT_PROOF_TIMEOUT};
use crate::store::{DiscussionStore, KvStore, SecretStore, StoreError, DEFAULT_TTL};

pub mod discussion;
pub mod secrets;
pub mod types;
pub mod win;

pub use types::{
    DiscussionAction, DiscussionView, InvestigateRequest, InvestigateResponse, RevealSecretRequest,
    RevealSecretResponse, WinCheckResponse,
};

/// Coordinator tuning.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Discussion timers.
    pub timing: DiscussionTiming,
    /// Event log search bounds.
    pub log_search: LogSearchConfig,
    /// Deadline for one win proof.
    pub proof_timeout: Duration,
    /// Lifetime of stored secrets and discussion state.
    pub store_ttl: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            timing: DiscussionTiming::default(),
            log_search: LogSearchConfig::default(),
            proof_timeout: DEFAULT_PROOF_TIMEOUT,
            store_ttl: DEFAULT_TTL,
        }
    }
}

impl CoordinatorConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let secs = |name: &str| std::env::var(name).ok().and_then(|v| v.parse::<u64>().ok());

        Self {
            timing: DiscussionTiming {
                speaker_ms: secs("DISCUSSION_SPEAKER_SECS")
                    .map(|s| s * 1000)
                    .unwrap_or(defaults.timing.speaker_ms),
                ..defaults.timing
            },
            log_search: LogSearchConfig::from_env(),
            proof_timeout: secs("PROOF_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.proof_timeout),
            store_ttl: secs("SECRET_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.store_ttl),
        }
    }
}

/// The coordination service.
pub struct Coordinator<C, K, P> {
    chain: Arc<C>,
    kv: Arc<K>,
    secrets: SecretStore<K>,
    discussions: DiscussionStore<K>,
    prover: Arc<P>,
    verifier: Arc<dyn SignatureVerifier>,
    clock: Arc<dyn Clock>,
    config: CoordinatorConfig,
}

impl<C: GameChain, K: KvStore, P: ProofBackend> Coordinator<C, K, P> {
    /// Wire up a coordinator.
    pub fn new(
        chain: Arc<C>,
        kv: Arc<K>,
        prover: Arc<P>,
        verifier: Arc<dyn SignatureVerifier>,
        clock: Arc<dyn Clock>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            chain,
            secrets: SecretStore::with_ttl(kv.clone(), config.store_ttl),
            discussions: DiscussionStore::with_ttl(kv.clone(), config.store_ttl),
            kv,
            prover,
            verifier,
            clock,
            config,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Secret store (for operators clearing finished rooms).
    pub fn secrets(&self) -> &SecretStore<K> {
        &self.secrets
    }

    /// Coordinator time (ms).
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Drop expired keys from the backing store.
    pub async fn purge_expired(&self) -> Result<usize, StoreError> {
        self.kv.purge_expired().await
    }
}

#[cfg(test)]
pub(crate) mod harness {
    use super::*;
    use crate::auth::Eip191Verifier;
    use crate::store::MemoryStore;
    use crate::testing::{ManualClock, MockChain, MockProver};

    pub const T0: u64 = 1_700_000_000_000;

    pub type TestCoordinator = Coordinator<MockChain, MemoryStore, MockProver>;

    pub struct Harness {
        pub coord: TestCoordinator,
        pub chain: Arc<MockChain>,
        pub clock: Arc<ManualClock>,
        pub prover: Arc<MockProver>,
        pub kv: Arc<MemoryStore>,
    }

    pub fn harness_with(verifier: Arc<dyn SignatureVerifier>, prover: MockProver, config: CoordinatorConfig) -> Harness {
        let clock = Arc::new(ManualClock::new(T0));
        let chain = Arc::new(MockChain::new());
        let kv = Arc::new(MemoryStore::with_clock(clock.clone()));
        let prover = Arc::new(prover);
        let coord = Coordinator::new(
            chain.clone(),
            kv.clone(),
            prover.clone(),
            verifier,
            clock.clone(),
            config,
        );
        Harness { coord, chain, clock, prover, kv }
    }

    pub fn harness() -> Harness {
        harness_with(Arc::new(Eip191Verifier), MockProver::instant(), CoordinatorConfig::default())
    }
}
