//! Dense state-vector simulation.
//!
//! Basis index bit `q` holds the value of qubit `q`. Memory grows as 2^n
//! complex amplitudes, which is what bounds [`DEFAULT_MAX_QUBITS`].

use num_complex::Complex64;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::collections::HashMap;
use std::f64::consts::FRAC_1_SQRT_2;

use super::{transpile, Counts, ExecutorError, QuantumExecutor};
use crate::circuit::{Circuit, CircuitError, Gate};
use crate::seeds::TrialSeeds;

/// Largest register the bundled simulator accepts by default (16 MiB of amplitudes).
pub const DEFAULT_MAX_QUBITS: usize = 20;

/// Hard ceiling regardless of configuration (16 GiB of amplitudes).
pub const MAX_SUPPORTED_QUBITS: usize = 30;

/// Pure state of an n-qubit register.
#[derive(Clone, Debug, PartialEq)]
pub struct StateVector {
    num_qubits: usize,
    amplitudes: Vec<Complex64>,
}

impl StateVector {
    /// |0...0⟩
    pub fn zero(num_qubits: usize) -> Self {
        Self::basis(num_qubits, 0)
    }

    /// Computational basis state |index⟩.
    ///
    /// # Panics
    /// If `index >= 2^num_qubits`.
    pub fn basis(num_qubits: usize, index: usize) -> Self {
        let mut amplitudes = vec![Complex64::new(0.0, 0.0); 1 << num_qubits];
        amplitudes[index] = Complex64::new(1.0, 0.0);
        Self {
            num_qubits,
            amplitudes,
        }
    }

    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    pub fn amplitudes(&self) -> &[Complex64] {
        &self.amplitudes
    }

    pub fn apply_gate(&mut self, gate: &Gate) {
        match gate {
            Gate::H(q) => {
                let bit = 1usize << q;
                for i in 0..self.amplitudes.len() {
                    if i & bit == 0 {
                        let a = self.amplitudes[i];
                        let b = self.amplitudes[i | bit];
                        self.amplitudes[i] = (a + b) * FRAC_1_SQRT_2;
                        self.amplitudes[i | bit] = (a - b) * FRAC_1_SQRT_2;
                    }
                }
            }
            Gate::X(q) => self.flip_where(0, 1usize << q),
            Gate::Z(q) => {
                let bit = 1usize << q;
                for (i, amp) in self.amplitudes.iter_mut().enumerate() {
                    if i & bit != 0 {
                        *amp = -*amp;
                    }
                }
            }
            Gate::Mcx { controls, target } => {
                let mask = controls.iter().fold(0usize, |m, c| m | (1 << c));
                self.flip_where(mask, 1usize << target);
            }
        }
    }

    /// Applies every gate of `circuit`; measurements are ignored.
    pub fn apply_circuit(&mut self, circuit: &Circuit) {
        for gate in &circuit.gates {
            self.apply_gate(gate);
        }
    }

    /// Squared magnitudes, indexed by basis state.
    pub fn probabilities(&self) -> Vec<f64> {
        self.amplitudes.iter().map(|a| a.norm_sqr()).collect()
    }

    pub fn total_probability(&self) -> f64 {
        self.amplitudes.iter().map(|a| a.norm_sqr()).sum()
    }

    /// Swaps amplitude pairs differing in `target_bit` whenever every bit of
    /// `control_mask` is set.
    fn flip_where(&mut self, control_mask: usize, target_bit: usize) {
        for i in 0..self.amplitudes.len() {
            if i & control_mask == control_mask && i & target_bit == 0 {
                self.amplitudes.swap(i, i | target_bit);
            }
        }
    }
}

/// Exact simulator that samples shots from the final outcome distribution.
#[derive(Clone, Debug)]
pub struct StateVectorSimulator {
    max_qubits: usize,
    optimization_level: u8,
}

impl Default for StateVectorSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl StateVectorSimulator {
    pub fn new() -> Self {
        Self {
            max_qubits: DEFAULT_MAX_QUBITS,
            optimization_level: 2,
        }
    }

    /// Clamped to [`MAX_SUPPORTED_QUBITS`].
    pub fn with_max_qubits(mut self, max: usize) -> Self {
        self.max_qubits = max.min(MAX_SUPPORTED_QUBITS);
        self
    }

    pub fn with_optimization_level(mut self, level: u8) -> Self {
        self.optimization_level = level;
        self
    }

    pub fn max_qubits(&self) -> usize {
        self.max_qubits
    }

    fn check(&self, circuit: &Circuit, shots: u64) -> Result<(), ExecutorError> {
        if circuit.num_qubits == 0 {
            return Err(CircuitError::InvalidQubitCount(0).into());
        }
        if circuit.num_qubits > self.max_qubits {
            return Err(ExecutorError::UnsupportedQubitCount {
                requested: circuit.num_qubits,
                max: self.max_qubits,
            });
        }
        if shots == 0 {
            return Err(ExecutorError::ZeroShots);
        }
        if circuit.measurements.is_empty() {
            return Err(ExecutorError::NoMeasurements(circuit.name.clone()));
        }
        for gate in &circuit.gates {
            gate.validate(circuit.num_qubits)?;
        }
        for m in &circuit.measurements {
            if m.qubit >= circuit.num_qubits {
                return Err(CircuitError::QubitOutOfRange {
                    qubit: m.qubit,
                    num_qubits: circuit.num_qubits,
                }
                .into());
            }
            if m.clbit >= circuit.num_clbits {
                return Err(CircuitError::ClbitOutOfRange {
                    clbit: m.clbit,
                    num_clbits: circuit.num_clbits,
                }
                .into());
            }
        }
        Ok(())
    }
}

impl QuantumExecutor for StateVectorSimulator {
    fn run(
        &self,
        circuit: &Circuit,
        shots: u64,
        seeds: TrialSeeds,
    ) -> Result<Counts, ExecutorError> {
        self.check(circuit, shots)?;

        let compiled = transpile(circuit, self.optimization_level, seeds.transpiler);
        let mut state = StateVector::zero(compiled.num_qubits);
        state.apply_circuit(&compiled);

        let mut cumulative = state.probabilities();
        let mut acc = 0.0;
        for p in cumulative.iter_mut() {
            acc += *p;
            *p = acc;
        }
        let last = cumulative.len() - 1;

        let mut rng = ChaCha20Rng::seed_from_u64(seeds.simulator);
        let mut order: Vec<usize> = Vec::new();
        let mut tally: HashMap<usize, u64> = HashMap::new();
        for _ in 0..shots {
            let r = rng.gen::<f64>() * acc;
            let index = cumulative.partition_point(|&c| c <= r).min(last);
            let hits = tally.entry(index).or_insert_with(|| {
                order.push(index);
                0
            });
            *hits += 1;
        }

        Ok(order
            .into_iter()
            .map(|index| (readout(&compiled, index), tally[&index]))
            .collect())
    }
}

/// Classical register contents for basis state `index`, highest clbit first.
fn readout(circuit: &Circuit, index: usize) -> String {
    let width = circuit.num_clbits;
    let mut register = vec!['0'; width];
    for m in &circuit.measurements {
        if (index >> m.qubit) & 1 == 1 {
            register[width - 1 - m.clbit] = '1';
        }
    }
    register.into_iter().collect()
}
