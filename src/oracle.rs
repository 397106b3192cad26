//! Attacker-side view of the digest oracle.
//!
//! [`LocalOracle`] wraps an in-process [`Verifier`]; [`HttpOracle`] talks to a
//! running verifier service. Both report a wrong proof as `Ok(false)` and keep
//! network trouble in its own error variant so callers never mistake one for
//! the other.

use std::sync::Mutex;
use std::time::Duration;

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::verifier::{
    ChallengeResponse, DebugRequest, DebugResponse, Verifier, VerifierError, VerifyRequest,
    VerifyResponse,
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    /// Connection refused, reset, or timed out.
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("verifier rejected request ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    #[error("malformed verifier response: {0}")]
    Malformed(String),
}

impl From<VerifierError> for OracleError {
    fn from(e: VerifierError) -> Self {
        OracleError::Rejected {
            status: e.status_code(),
            detail: e.to_string(),
        }
    }
}

/// A message to prove knowledge of, and the proof length in bits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub msg: String,
    pub nbits: u32,
}

impl Challenge {
    pub fn new(msg: impl Into<String>, nbits: u32) -> Self {
        Self {
            msg: msg.into(),
            nbits,
        }
    }
}

impl TryFrom<ChallengeResponse> for Challenge {
    type Error = OracleError;

    fn try_from(resp: ChallengeResponse) -> Result<Self, Self::Error> {
        let nbits = u32::try_from(resp.nbits)
            .map_err(|_| OracleError::Malformed(format!("nbits {} out of range", resp.nbits)))?;
        Ok(Challenge::new(resp.msg, nbits))
    }
}

pub trait DigestOracle {
    /// Requests a fresh challenge for an `nbits`-bit proof.
    fn challenge(&self, nbits: u32) -> Result<Challenge, OracleError>;

    /// Debug-only disclosure of the target pattern.
    fn disclose_target(&self, challenge: &Challenge) -> Result<String, OracleError>;

    /// `Ok(false)` is a legitimate negative, not an error.
    fn verify(&self, challenge: &Challenge, proof_bits: &str) -> Result<bool, OracleError>;
}

impl<T: DigestOracle + ?Sized> DigestOracle for &T {
    fn challenge(&self, nbits: u32) -> Result<Challenge, OracleError> {
        (**self).challenge(nbits)
    }

    fn disclose_target(&self, challenge: &Challenge) -> Result<String, OracleError> {
        (**self).disclose_target(challenge)
    }

    fn verify(&self, challenge: &Challenge, proof_bits: &str) -> Result<bool, OracleError> {
        (**self).verify(challenge, proof_bits)
    }
}

/// In-process oracle. Challenge messages come from a seeded ChaCha20 stream.
pub struct LocalOracle {
    verifier: Verifier,
    rng: Mutex<ChaCha20Rng>,
}

impl LocalOracle {
    pub fn new(verifier: Verifier) -> Self {
        Self {
            verifier,
            rng: Mutex::new(ChaCha20Rng::from_entropy()),
        }
    }

    pub fn with_seed(verifier: Verifier, seed: u64) -> Self {
        Self {
            verifier,
            rng: Mutex::new(ChaCha20Rng::seed_from_u64(seed)),
        }
    }
}

impl DigestOracle for LocalOracle {
    fn challenge(&self, nbits: u32) -> Result<Challenge, OracleError> {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.verifier.challenge(nbits as i64, &mut *rng)?.try_into()
    }

    fn disclose_target(&self, challenge: &Challenge) -> Result<String, OracleError> {
        let resp = self.verifier.challenge_debug(&DebugRequest {
            msg: challenge.msg.clone(),
            nbits: challenge.nbits as i64,
        })?;
        Ok(resp.target)
    }

    fn verify(&self, challenge: &Challenge, proof_bits: &str) -> Result<bool, OracleError> {
        let resp = self.verifier.verify(&VerifyRequest {
            msg: challenge.msg.clone(),
            proof_bits: proof_bits.to_string(),
            nbits: challenge.nbits as i64,
        })?;
        Ok(resp.ok)
    }
}

/// Client for the verifier's HTTP API.
pub struct HttpOracle {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpOracle {
    /// Every request is bounded by `timeout`; expiry surfaces as [`OracleError::Transport`].
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, OracleError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::Transport(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn transport(e: reqwest::Error) -> OracleError {
    OracleError::Transport(e.to_string())
}

fn decode<T: DeserializeOwned>(resp: reqwest::blocking::Response) -> Result<T, OracleError> {
    let status = resp.status();
    if !status.is_success() {
        let detail = resp
            .json::<serde_json::Value>()
            .ok()
            .and_then(|body| body.get("detail").and_then(|d| d.as_str()).map(str::to_string))
            .unwrap_or_else(|| status.to_string());
        return Err(OracleError::Rejected {
            status: status.as_u16(),
            detail,
        });
    }
    resp.json::<T>().map_err(|e| {
        if e.is_decode() {
            OracleError::Malformed(e.to_string())
        } else {
            transport(e)
        }
    })
}

impl DigestOracle for HttpOracle {
    fn challenge(&self, nbits: u32) -> Result<Challenge, OracleError> {
        let resp = self
            .client
            .get(self.url(&format!("/challenge?nbits={nbits}")))
            .send()
            .map_err(transport)?;
        decode::<ChallengeResponse>(resp)?.try_into()
    }

    fn disclose_target(&self, challenge: &Challenge) -> Result<String, OracleError> {
        let resp = self
            .client
            .post(self.url("/challenge_debug"))
            .json(&DebugRequest {
                msg: challenge.msg.clone(),
                nbits: challenge.nbits as i64,
            })
            .send()
            .map_err(transport)?;
        Ok(decode::<DebugResponse>(resp)?.target)
    }

    fn verify(&self, challenge: &Challenge, proof_bits: &str) -> Result<bool, OracleError> {
        let resp = self
            .client
            .post(self.url("/verify"))
            .json(&VerifyRequest {
                msg: challenge.msg.clone(),
                proof_bits: proof_bits.to_string(),
                nbits: challenge.nbits as i64,
            })
            .send()
            .map_err(transport)?;
        let verdict: VerifyResponse = decode(resp)?;
        if verdict.flag.is_some() {
            tracing::info!("verifier issued a capability token");
        }
        Ok(verdict.ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verifier::VerifierConfig;

    fn local(debug: bool) -> LocalOracle {
        LocalOracle::with_seed(
            Verifier::new(VerifierConfig {
                debug,
                ..VerifierConfig::default()
            }),
            7,
        )
    }

    #[test]
    fn test_local_challenge_is_seeded() {
        let a = local(false).challenge(6).unwrap();
        let b = local(false).challenge(6).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.nbits, 6);
        assert_eq!(a.msg.len(), 8);
    }

    #[test]
    fn test_local_verify_negative_is_not_error() {
        let oracle = local(false);
        let challenge = Challenge::new("abcd1234", 3);
        assert_eq!(oracle.verify(&challenge, "111"), Ok(true));
        assert_eq!(oracle.verify(&challenge, "011"), Ok(false));
    }

    #[test]
    fn test_local_maps_rejections() {
        let oracle = local(false);
        let challenge = Challenge::new("abcd1234", 3);
        assert!(matches!(
            oracle.verify(&challenge, "0110"),
            Err(OracleError::Rejected { status: 400, .. })
        ));
        assert!(matches!(
            oracle.disclose_target(&challenge),
            Err(OracleError::Rejected { status: 403, .. })
        ));
        assert!(matches!(
            oracle.challenge(0),
            Err(OracleError::Rejected { status: 400, .. })
        ));
    }

    #[test]
    fn test_local_disclosure_in_debug() {
        let oracle = local(true);
        assert_eq!(
            oracle.disclose_target(&Challenge::new("abcd1234", 3)).unwrap(),
            "111"
        );
    }

    #[test]
    fn test_challenge_from_response_rejects_negative_nbits() {
        let bad = ChallengeResponse {
            msg: "00".into(),
            nbits: -1,
        };
        assert!(matches!(
            Challenge::try_from(bad),
            Err(OracleError::Malformed(_))
        ));
    }

    #[test]
    fn test_http_base_url_trimmed() {
        let oracle = HttpOracle::new("http://127.0.0.1:8008/", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(oracle.base_url(), "http://127.0.0.1:8008");
        assert_eq!(oracle.url("/verify"), "http://127.0.0.1:8008/verify");
    }
}
