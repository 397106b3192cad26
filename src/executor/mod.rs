//! Quantum execution backend.
//!
//! The orchestrator only sees [`QuantumExecutor`]: hand it a circuit, a shot
//! count and seeds, get back a frequency table. [`StateVectorSimulator`] is the
//! bundled backend; anything else that honours the contract can replace it.

mod counts;
mod statevector;
mod transpile;

pub use counts::{Candidate, Counts};
pub use statevector::{
    StateVector, StateVectorSimulator, DEFAULT_MAX_QUBITS, MAX_SUPPORTED_QUBITS,
};
pub use transpile::transpile;

use crate::circuit::{Circuit, CircuitError};
use crate::seeds::TrialSeeds;
use thiserror::Error;

/// The backend could not run a circuit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    #[error("circuit needs {requested} qubits, backend supports at most {max}")]
    UnsupportedQubitCount { requested: usize, max: usize },

    #[error("shot count must be at least 1")]
    ZeroShots,

    #[error("circuit {0} has no measurements")]
    NoMeasurements(String),

    #[error("invalid circuit: {0}")]
    Circuit(#[from] CircuitError),
}

/// Runs circuits and reports observed outcome frequencies.
///
/// Implementations must return counts summing to `shots`, keyed by the
/// classical register read as a bit string (highest classical bit first), and
/// must be deterministic for equal seeds.
pub trait QuantumExecutor {
    fn run(&self, circuit: &Circuit, shots: u64, seeds: TrialSeeds)
        -> Result<Counts, ExecutorError>;
}

impl<T: QuantumExecutor + ?Sized> QuantumExecutor for &T {
    fn run(
        &self,
        circuit: &Circuit,
        shots: u64,
        seeds: TrialSeeds,
    ) -> Result<Counts, ExecutorError> {
        (**self).run(circuit, shots, seeds)
    }
}
