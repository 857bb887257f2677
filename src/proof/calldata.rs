//! Verifier Calldata
//!
//! Rearranges a snarkjs proof into the argument layout a generated
//! Solidity Groth16 verifier takes:
//! `verifyProof(uint[2] a, uint[2][2] b, uint[2] c, uint[] input)`.
//! The G2 point's Fp2 coordinates are stored `(c0, c1)` by snarkjs but
//! the precompile wants `(c1, c0)`, so each pair of `b` is swapped.

use serde::{Deserialize, Serialize};

use super::{ProofError, SnarkProof};

/// Solidity verifier arguments, as decimal strings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofCalldata {
    /// `uint[2] a`
    pub a: [String; 2],
    /// `uint[2][2] b`
    pub b: [[String; 2]; 2],
    /// `uint[2] c`
    pub c: [String; 2],
    /// `uint[] input`
    pub inputs: Vec<String>,
}

fn field(values: &[String], index: usize, name: &str) -> Result<String, ProofError> {
    let value = values
        .get(index)
        .ok_or_else(|| ProofError::Malformed(format!("{}[{}] missing", name, index)))?;
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ProofError::Malformed(format!("{}[{}] is not a decimal field element", name, index)));
    }
    Ok(value.clone())
}

/// Convert a proof and its public signals to calldata.
pub fn format_calldata(proof: &SnarkProof) -> Result<ProofCalldata, ProofError> {
    let p = &proof.proof;
    let b_row = |row: usize| -> Result<[String; 2], ProofError> {
        let pair = p
            .pi_b
            .get(row)
            .ok_or_else(|| ProofError::Malformed(format!("pi_b[{}] missing", row)))?;
        Ok([field(pair, 1, "pi_b")?, field(pair, 0, "pi_b")?])
    };

    let inputs = (0..proof.public_signals.len())
        .map(|i| field(&proof.public_signals, i, "publicSignals"))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ProofCalldata {
        a: [field(&p.pi_a, 0, "pi_a")?, field(&p.pi_a, 1, "pi_a")?],
        b: [b_row(0)?, b_row(1)?],
        c: [field(&p.pi_c, 0, "pi_c")?, field(&p.pi_c, 1, "pi_c")?],
        inputs,
    })
}
