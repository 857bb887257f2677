//! Win Proof Pipeline
//!
//! Turns a decided win tally into a Groth16 proof the on-chain verifier
//! accepts.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PROOF PIPELINE                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  mod.rs      - Circuit inputs, ProofBackend trait, timeout  │
//! │  snarkjs.rs  - snarkjs CLI backend (child process)          │
//! │  calldata.rs - (proof, signals) -> verifier calldata        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Proofs are ephemeral: nothing here is persisted, so a timed-out or
//! failed attempt leaves no trace and a retry starts from scratch.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::core::address::RoomId;

pub mod calldata;
pub mod snarkjs;

pub use calldata::{format_calldata, ProofCalldata};
pub use snarkjs::{SnarkjsBackend, SnarkjsConfig};

/// Default deadline for one proof.
pub const DEFAULT_PROOF_TIMEOUT: Duration = Duration::from_secs(30);

/// Proof pipeline errors.
#[derive(Debug, Error)]
pub enum ProofError {
    /// Proof generation overran its deadline.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    /// Prover process or library failed.
    #[error("backend failure: {0}")]
    Backend(String),
    /// Prover produced output we could not parse.
    #[error("malformed proof: {0}")]
    Malformed(String),
    /// Filesystem error while staging inputs/outputs.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Public circuit inputs for the win statement.
///
/// Field elements are passed as decimal strings, the witness
/// generator's native JSON format.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitInputs {
    /// Room identifier.
    pub room_id: String,
    /// Alive mafia.
    pub mafia_count: String,
    /// Alive town.
    pub town_count: String,
}

impl CircuitInputs {
    /// Build inputs from a tally.
    pub fn new(room_id: RoomId, mafia_count: u32, town_count: u32) -> Self {
        Self {
            room_id: room_id.to_string(),
            mafia_count: mafia_count.to_string(),
            town_count: town_count.to_string(),
        }
    }
}

/// Groth16 proof in snarkjs JSON layout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Groth16Proof {
    /// G1 point A (projective: x, y, z).
    pub pi_a: Vec<String>,
    /// G2 point B (projective, each coordinate an Fp2 pair).
    pub pi_b: Vec<Vec<String>>,
    /// G1 point C.
    pub pi_c: Vec<String>,
    /// "groth16".
    #[serde(default)]
    pub protocol: String,
    /// "bn128".
    #[serde(default)]
    pub curve: String,
}

/// Proof plus the public signals it commits to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnarkProof {
    /// The proof.
    pub proof: Groth16Proof,
    /// Public signals, in circuit order.
    pub public_signals: Vec<String>,
}

/// A zero-knowledge proving backend.
pub trait ProofBackend: Send + Sync + 'static {
    /// Produce a proof for the given inputs.
    ///
    /// Dropping the returned future must abandon the work.
    fn prove(&self, inputs: &CircuitInputs) -> impl Future<Output = Result<SnarkProof, ProofError>> + Send;
}

/// Prove under a deadline and format the result as verifier calldata.
pub async fn prove_with_timeout<P: ProofBackend>(
    backend: &P,
    inputs: &CircuitInputs,
    deadline: Duration,
) -> Result<ProofCalldata, ProofError> {
    let started = std::time::Instant::now();
    let proof = match timeout(deadline, backend.prove(inputs)).await {
        Ok(result) => result?,
        Err(_) => {
            warn!("Proof for room {} timed out after {:?}", inputs.room_id, deadline);
            return Err(ProofError::Timeout(deadline));
        }
    };
    info!("Proof for room {} generated in {:?}", inputs.room_id, started.elapsed());
    format_calldata(&proof)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockProver;

    #[test]
    fn test_circuit_inputs_json() {
        let json = serde_json::to_string(&CircuitInputs::new(42, 1, 3)).unwrap();
        assert_eq!(json, r#"{"roomId":"42","mafiaCount":"1","townCount":"3"}"#);
    }

    #[tokio::test]
    async fn test_prove_with_timeout_success() {
        let prover = MockProver::instant();
        let calldata = prove_with_timeout(&prover, &CircuitInputs::new(1, 0, 3), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(calldata.inputs, vec!["1", "0", "3"]);
        assert_eq!(prover.calls(), 1);
    }

    #[tokio::test]
    async fn test_prove_with_timeout_expires() {
        let prover = MockProver::slow(Duration::from_secs(5));
        let result = prove_with_timeout(&prover, &CircuitInputs::new(1, 0, 3), Duration::from_millis(20)).await;
        assert!(matches!(result, Err(ProofError::Timeout(_))));
    }
}
