//! snarkjs Proving Backend
//!
//! Shells out to `snarkjs groth16 fullprove` (witness generation and
//! proving in one step). Each request gets its own uuid-named work
//! directory, removed when the request finishes or is cancelled. The child
//! process is spawned with `kill_on_drop`, so a timeout that drops the
//! future also stops the prover.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::debug;
use uuid::Uuid;

use super::{CircuitInputs, Groth16Proof, ProofBackend, ProofError, SnarkProof};

/// Paths for the snarkjs backend.
#[derive(Clone, Debug)]
pub struct SnarkjsConfig {
    /// `snarkjs` executable.
    pub binary: PathBuf,
    /// Compiled circuit (witness generator).
    pub wasm: PathBuf,
    /// Proving key.
    pub zkey: PathBuf,
    /// Parent directory for per-request scratch space.
    pub work_dir: PathBuf,
}

impl Default for SnarkjsConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("snarkjs"),
            wasm: PathBuf::from("circuits/win_check.wasm"),
            zkey: PathBuf::from("circuits/win_check_final.zkey"),
            work_dir: std::env::temp_dir().join("mafia-proofs"),
        }
    }
}

impl SnarkjsConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            binary: std::env::var("SNARKJS_BIN").map(PathBuf::from).unwrap_or(defaults.binary),
            wasm: std::env::var("CIRCUIT_WASM").map(PathBuf::from).unwrap_or(defaults.wasm),
            zkey: std::env::var("CIRCUIT_ZKEY").map(PathBuf::from).unwrap_or(defaults.zkey),
            work_dir: std::env::var("PROOF_WORK_DIR").map(PathBuf::from).unwrap_or(defaults.work_dir),
        }
    }
}

/// Scratch directory. Removed explicitly once proving finishes; if the
/// request is cancelled first, the drop hands removal to the blocking pool.
struct WorkDir {
    path: Option<PathBuf>,
}

impl WorkDir {
    async fn create(parent: &Path) -> Result<Self, ProofError> {
        let path = parent.join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&path).await?;
        Ok(Self { path: Some(path) })
    }

    fn path(&self) -> &Path {
        self.path.as_deref().unwrap_or(Path::new(""))
    }

    async fn remove(mut self) {
        if let Some(path) = self.path.take() {
            if let Err(e) = tokio::fs::remove_dir_all(&path).await {
                debug!("Could not remove proof dir {}: {}", path.display(), e);
            }
        }
    }
}

fn remove_blocking(path: &Path) {
    if let Err(e) = std::fs::remove_dir_all(path) {
        debug!("Could not remove proof dir {}: {}", path.display(), e);
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        let Some(path) = self.path.take() else { return };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || remove_blocking(&path));
            }
            Err(_) => remove_blocking(&path),
        }
    }
}

/// Groth16 prover backed by the snarkjs CLI.
#[derive(Clone, Debug)]
pub struct SnarkjsBackend {
    config: SnarkjsConfig,
}

impl SnarkjsBackend {
    /// Create a backend.
    pub fn new(config: SnarkjsConfig) -> Self {
        Self { config }
    }

    async fn run(&self, dir: &Path, inputs: &CircuitInputs) -> Result<SnarkProof, ProofError> {
        let input_path = dir.join("input.json");
        let proof_path = dir.join("proof.json");
        let public_path = dir.join("public.json");

        let input_json = serde_json::to_vec(inputs).map_err(|e| ProofError::Malformed(e.to_string()))?;
        tokio::fs::write(&input_path, input_json).await?;

        let output = Command::new(&self.config.binary)
            .arg("groth16")
            .arg("fullprove")
            .arg(&input_path)
            .arg(&self.config.wasm)
            .arg(&self.config.zkey)
            .arg(&proof_path)
            .arg(&public_path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ProofError::Backend(format!("failed to spawn {}: {}", self.config.binary.display(), e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ProofError::Backend(format!("snarkjs exited with {}: {}", output.status, stderr.trim())));
        }

        let proof: Groth16Proof = serde_json::from_slice(&tokio::fs::read(&proof_path).await?)
            .map_err(|e| ProofError::Malformed(format!("proof.json: {}", e)))?;
        let public_signals: Vec<String> = serde_json::from_slice(&tokio::fs::read(&public_path).await?)
            .map_err(|e| ProofError::Malformed(format!("public.json: {}", e)))?;

        Ok(SnarkProof { proof, public_signals })
    }
}

impl ProofBackend for SnarkjsBackend {
    async fn prove(&self, inputs: &CircuitInputs) -> Result<SnarkProof, ProofError> {
        let dir = WorkDir::create(&self.config.work_dir).await?;
        debug!("Proving room {} in {}", inputs.room_id, dir.path().display());
        let result = self.run(dir.path(), inputs).await;
        dir.remove().await;
        result
    }
}
