//! # grover-attack - amplitude amplification against a truncated-digest verifier
//!
//! A verifier accepts a proof for message `m` when it equals the first `n`
//! bits of SHA-256(secret ‖ m). Brute force costs ~2ⁿ verification calls; this
//! crate models the quadratic speed-up an attacker with a quantum executor
//! gets, end to end:
//!
//! 1. **Templates** (`templates`) - marking and diffusion operators for an n-bit pattern
//! 2. **Assembly** (`assembler`) - superposition, `k` mark/amplify rounds, measurement
//! 3. **Planning** (`planner`) - `k_opt = ⌊π/4·√2ⁿ⌋` and a clamped grid around it
//! 4. **Orchestration** (`attack`) - trials, seeds, candidate ranking, verification
//!
//! ## Modules
//!
//! - [`circuit`] - Gates, circuits and the `UnitaryOperator` capability
//! - [`executor`] - Executor contract, state-vector simulator, seeded transpiler
//! - [`seeds`] - Keccak-derived per-(trial, k) seeds
//! - [`verifier`] - Server-side digest, challenge, debug disclosure and verify
//! - [`server`] - HTTP/1.1 front end for the verifier
//! - [`oracle`] - Attacker-side clients (in-process and HTTP)

pub mod assembler;
pub mod attack;
pub mod circuit;
pub mod executor;
pub mod oracle;
pub mod planner;
pub mod seeds;
pub mod server;
pub mod templates;
pub mod verifier;

pub use assembler::{assemble, assemble_with};
pub use attack::{
    Attack, AttackConfig, AttackError, AttackOutcome, AttackPhase, AttackStats, CandidatePolicy,
    Deployment, ExecutorFailurePolicy,
};
pub use circuit::{Circuit, CircuitError, Gate, Operator, UnitaryOperator};
pub use executor::{Candidate, Counts, ExecutorError, QuantumExecutor, StateVectorSimulator};
pub use oracle::{Challenge, DigestOracle, HttpOracle, LocalOracle, OracleError};
pub use planner::{iteration_grid, optimal_iterations, IterationGrid};
pub use seeds::TrialSeeds;
pub use templates::{build_amplification_operator, build_marking_operator};
pub use verifier::{truncated_digest, Verifier, VerifierConfig, VerifierError};
