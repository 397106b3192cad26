//! Server-side digest oracle.
//!
//! The target for a message is the first `nbits` bits of SHA-256(secret ‖ msg),
//! written as a `0`/`1` string. Proofs are compared in constant time.
//!
//! Configuration is read once into a [`VerifierConfig`] and handed to the
//! [`Verifier`]; nothing here consults the environment on its own.

use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;
use thiserror::Error;

pub const MIN_NBITS: i64 = 1;
pub const MAX_NBITS: i64 = 64;

/// Random bytes per challenge message (hex-encoded on the wire).
pub const CHALLENGE_MSG_BYTES: usize = 4;

pub const DEFAULT_SECRET: &str = "super_secret_demo_key";

/// Request rejected by the verifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifierError {
    #[error("nbits must be in 1..=64, got {0}")]
    InvalidBitLength(i64),

    #[error("proof_bits must be binary")]
    NonBinaryProof,

    #[error("proof_bits must have length {expected}, got {actual}")]
    ProofLengthMismatch { expected: usize, actual: usize },

    #[error("debug disclosure is disabled")]
    DebugDisabled,
}

impl VerifierError {
    /// HTTP status the transport should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            VerifierError::DebugDisabled => 403,
            _ => 400,
        }
    }
}

/// Process-wide verifier settings.
#[derive(Clone)]
pub struct VerifierConfig {
    pub secret: Vec<u8>,
    /// Enables `/challenge_debug`.
    pub debug: bool,
    /// Appends a capability flag to successful verifications.
    pub ctf: bool,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            secret: DEFAULT_SECRET.as_bytes().to_vec(),
            debug: false,
            ctf: false,
        }
    }
}

impl fmt::Debug for VerifierConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifierConfig")
            .field("secret", &"<redacted>")
            .field("debug", &self.debug)
            .field("ctf", &self.ctf)
            .finish()
    }
}

impl VerifierConfig {
    /// Reads `LAB_SECRET`, `LAB_DEBUG` and `LAB_CTF`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Flags are on only for `"1"`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup("LAB_SECRET")
            .map(String::into_bytes)
            .unwrap_or_else(|| DEFAULT_SECRET.as_bytes().to_vec());
        Self {
            secret,
            debug: lookup("LAB_DEBUG").as_deref() == Some("1"),
            ctf: lookup("LAB_CTF").as_deref() == Some("1"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeResponse {
    pub msg: String,
    pub nbits: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugRequest {
    pub msg: String,
    pub nbits: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugResponse {
    pub target: String,
    pub nbits: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub msg: String,
    pub proof_bits: String,
    pub nbits: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub ok: bool,
    pub nbits: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,
}

fn check_nbits(nbits: i64) -> Result<usize, VerifierError> {
    if (MIN_NBITS..=MAX_NBITS).contains(&nbits) {
        Ok(nbits as usize)
    } else {
        Err(VerifierError::InvalidBitLength(nbits))
    }
}

/// First `nbits` bits of SHA-256(secret ‖ msg) as a `0`/`1` string.
pub fn truncated_digest(secret: &[u8], msg: &str, nbits: i64) -> Result<String, VerifierError> {
    let bits = check_nbits(nbits)?;
    let mut hasher = Sha256::new();
    hasher.update(secret);
    hasher.update(msg.as_bytes());
    let digest = hasher.finalize();

    let mut out: String = digest
        .iter()
        .take(bits.div_ceil(8))
        .map(|b| format!("{b:08b}"))
        .collect();
    out.truncate(bits);
    Ok(out)
}

/// Capability token bound to a message. Never contains the proof.
pub fn capability_flag(msg: &str) -> String {
    format!("flag{{grover_ok::{msg}}}")
}

#[derive(Clone, Debug)]
pub struct Verifier {
    config: VerifierConfig,
}

impl Verifier {
    pub fn new(config: VerifierConfig) -> Self {
        Self { config }
    }

    /// Issues a fresh random message for an `nbits`-bit proof.
    pub fn challenge<R: Rng + ?Sized>(
        &self,
        nbits: i64,
        rng: &mut R,
    ) -> Result<ChallengeResponse, VerifierError> {
        check_nbits(nbits)?;
        let mut bytes = [0u8; CHALLENGE_MSG_BYTES];
        rng.fill(&mut bytes[..]);
        Ok(ChallengeResponse {
            msg: hex::encode(bytes),
            nbits,
        })
    }

    /// Reveals the target. Only available with the debug flag.
    pub fn challenge_debug(&self, req: &DebugRequest) -> Result<DebugResponse, VerifierError> {
        if !self.config.debug {
            return Err(VerifierError::DebugDisabled);
        }
        let target = truncated_digest(&self.config.secret, &req.msg, req.nbits)?;
        Ok(DebugResponse {
            target,
            nbits: req.nbits,
        })
    }

    pub fn verify(&self, req: &VerifyRequest) -> Result<VerifyResponse, VerifierError> {
        let bits = check_nbits(req.nbits)?;
        if req.proof_bits.chars().any(|c| c != '0' && c != '1') {
            return Err(VerifierError::NonBinaryProof);
        }
        if req.proof_bits.len() != bits {
            return Err(VerifierError::ProofLengthMismatch {
                expected: bits,
                actual: req.proof_bits.len(),
            });
        }

        let target = truncated_digest(&self.config.secret, &req.msg, req.nbits)?;
        let ok: bool = target.as_bytes().ct_eq(req.proof_bits.as_bytes()).into();

        let flag = (ok && self.config.ctf).then(|| capability_flag(&req.msg));
        Ok(VerifyResponse {
            ok,
            nbits: req.nbits,
            flag,
        })
    }
}
