//! Full attack circuit: uniform superposition, `k` rounds of marking followed
//! by amplification, then measurement of every qubit into the matching
//! classical slot.

use crate::circuit::{Circuit, CircuitError, UnitaryOperator};
use crate::templates::{build_amplification_operator, build_marking_operator};

pub const CIRCUIT_NAME: &str = "grover";

/// Assembles the search circuit for `target_bits` with `iterations` rounds.
/// Zero rounds are clamped to one.
pub fn assemble(n: usize, target_bits: &str, iterations: usize) -> Result<Circuit, CircuitError> {
    let marking = build_marking_operator(n, target_bits)?;
    let amplification = build_amplification_operator(n)?;
    assemble_with(n, &marking, &amplification, iterations)
}

/// Same as [`assemble`] for caller-provided operators.
pub fn assemble_with<M, D>(
    n: usize,
    marking: &M,
    amplification: &D,
    iterations: usize,
) -> Result<Circuit, CircuitError>
where
    M: UnitaryOperator + ?Sized,
    D: UnitaryOperator + ?Sized,
{
    if n < 1 {
        return Err(CircuitError::InvalidQubitCount(n));
    }
    let qubits: Vec<usize> = (0..n).collect();
    let mut circuit = Circuit::new(CIRCUIT_NAME, n, n);

    circuit.h_all(0..n)?;
    for _ in 0..iterations.max(1) {
        circuit.append(marking, &qubits)?;
        circuit.append(amplification, &qubits)?;
    }
    circuit.measure_all()?;

    Ok(circuit)
}
