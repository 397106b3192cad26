//! Quantum circuit representation for the attack templates.
//!
//! Only the gates the marking and amplification templates need are modelled:
//! Hadamard, Pauli-X, Pauli-Z and a multi-controlled NOT. Every one of them is
//! self-inverse. Measurements are terminal and kept apart from the gate list.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Malformed circuit or template input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CircuitError {
    #[error("qubit count must be at least 1, got {0}")]
    InvalidQubitCount(usize),

    #[error("target pattern has {actual} bits, expected {expected}")]
    TargetLengthMismatch { expected: usize, actual: usize },

    #[error("target pattern contains non-binary character {0:?}")]
    NonBinaryTarget(char),

    #[error("qubit {qubit} out of range for {num_qubits}-qubit circuit")]
    QubitOutOfRange { qubit: usize, num_qubits: usize },

    #[error("classical bit {clbit} out of range for {num_clbits} classical bits")]
    ClbitOutOfRange { clbit: usize, num_clbits: usize },

    #[error("qubit {0} used more than once in a single gate")]
    DuplicateQubit(usize),

    #[error("operator {operator} acts on {expected} qubits, got {actual}")]
    ArityMismatch {
        operator: String,
        expected: usize,
        actual: usize,
    },

    #[error("circuit {0} has classical bits or measurements and cannot become an operator")]
    NotUnitary(String),
}

/// A single gate. Qubit indices are local to the circuit holding the gate.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gate {
    H(usize),
    X(usize),
    Z(usize),
    /// Multi-controlled NOT. With no controls it is a plain X.
    Mcx { controls: Vec<usize>, target: usize },
}

impl Gate {
    /// All qubits touched by this gate, target last.
    pub fn qubits(&self) -> Vec<usize> {
        match self {
            Gate::H(q) | Gate::X(q) | Gate::Z(q) => vec![*q],
            Gate::Mcx { controls, target } => {
                let mut qubits = controls.clone();
                qubits.push(*target);
                qubits
            }
        }
    }

    /// Check if two gates share a qubit (can't be reordered)
    pub fn collides(&self, other: &Gate) -> bool {
        let ours = self.qubits();
        other.qubits().iter().any(|q| ours.contains(q))
    }

    /// Rewrites qubit indices through `map` (local index -> circuit index).
    pub fn remap(&self, map: &[usize]) -> Gate {
        match self {
            Gate::H(q) => Gate::H(map[*q]),
            Gate::X(q) => Gate::X(map[*q]),
            Gate::Z(q) => Gate::Z(map[*q]),
            Gate::Mcx { controls, target } => Gate::Mcx {
                controls: controls.iter().map(|c| map[*c]).collect(),
                target: map[*target],
            },
        }
    }

    pub(crate) fn validate(&self, num_qubits: usize) -> Result<(), CircuitError> {
        let qubits = self.qubits();
        let mut seen = HashSet::with_capacity(qubits.len());
        for &qubit in &qubits {
            if qubit >= num_qubits {
                return Err(CircuitError::QubitOutOfRange { qubit, num_qubits });
            }
            if !seen.insert(qubit) {
                return Err(CircuitError::DuplicateQubit(qubit));
            }
        }
        Ok(())
    }
}

/// Readout of `qubit` into classical slot `clbit`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement {
    pub qubit: usize,
    pub clbit: usize,
}

/// An executable circuit: gates in application order, then measurements.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Circuit {
    pub name: String,
    pub num_qubits: usize,
    pub num_clbits: usize,
    pub gates: Vec<Gate>,
    pub measurements: Vec<Measurement>,
}

impl Circuit {
    pub fn new(name: impl Into<String>, num_qubits: usize, num_clbits: usize) -> Self {
        Self {
            name: name.into(),
            num_qubits,
            num_clbits,
            gates: Vec::new(),
            measurements: Vec::new(),
        }
    }

    pub fn add_gate(&mut self, gate: Gate) -> Result<(), CircuitError> {
        gate.validate(self.num_qubits)?;
        self.gates.push(gate);
        Ok(())
    }

    pub fn h(&mut self, qubit: usize) -> Result<(), CircuitError> {
        self.add_gate(Gate::H(qubit))
    }

    pub fn x(&mut self, qubit: usize) -> Result<(), CircuitError> {
        self.add_gate(Gate::X(qubit))
    }

    pub fn z(&mut self, qubit: usize) -> Result<(), CircuitError> {
        self.add_gate(Gate::Z(qubit))
    }

    pub fn mcx(&mut self, controls: &[usize], target: usize) -> Result<(), CircuitError> {
        self.add_gate(Gate::Mcx {
            controls: controls.to_vec(),
            target,
        })
    }

    /// Hadamard on every listed qubit.
    pub fn h_all(&mut self, qubits: impl IntoIterator<Item = usize>) -> Result<(), CircuitError> {
        qubits.into_iter().try_for_each(|q| self.h(q))
    }

    /// Pauli-X on every listed qubit.
    pub fn x_all(&mut self, qubits: impl IntoIterator<Item = usize>) -> Result<(), CircuitError> {
        qubits.into_iter().try_for_each(|q| self.x(q))
    }

    /// Appends `operator` acting on `qubits`, where `qubits[i]` receives the
    /// operator's local qubit `i`.
    pub fn append<U>(&mut self, operator: &U, qubits: &[usize]) -> Result<(), CircuitError>
    where
        U: UnitaryOperator + ?Sized,
    {
        operator.apply(self, qubits)
    }

    pub fn measure(&mut self, qubit: usize, clbit: usize) -> Result<(), CircuitError> {
        if qubit >= self.num_qubits {
            return Err(CircuitError::QubitOutOfRange {
                qubit,
                num_qubits: self.num_qubits,
            });
        }
        if clbit >= self.num_clbits {
            return Err(CircuitError::ClbitOutOfRange {
                clbit,
                num_clbits: self.num_clbits,
            });
        }
        self.measurements.push(Measurement { qubit, clbit });
        Ok(())
    }

    /// Measures qubit `i` into classical bit `i` for every qubit.
    pub fn measure_all(&mut self) -> Result<(), CircuitError> {
        (0..self.num_qubits).try_for_each(|q| self.measure(q, q))
    }

    pub fn gate_count(&self) -> usize {
        self.gates.len()
    }

    /// Converts a measurement-free circuit into a reusable operator.
    pub fn into_operator(self) -> Result<Operator, CircuitError> {
        if self.num_clbits > 0 || !self.measurements.is_empty() {
            return Err(CircuitError::NotUnitary(self.name));
        }
        // `gates` is public; re-check before anything remaps them
        for gate in &self.gates {
            gate.validate(self.num_qubits)?;
        }
        Ok(Operator {
            name: self.name,
            num_qubits: self.num_qubits,
            gates: self.gates,
        })
    }
}

/// A sub-circuit that can be placed onto any ordered set of circuit qubits.
pub trait UnitaryOperator {
    fn name(&self) -> &str;

    fn num_qubits(&self) -> usize;

    /// Appends this operator to `circuit`, mapping local qubit `i` onto `qubits[i]`.
    fn apply(&self, circuit: &mut Circuit, qubits: &[usize]) -> Result<(), CircuitError>;
}

/// Fixed gate sequence acting on `num_qubits` local qubits. No classical bits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Operator {
    name: String,
    num_qubits: usize,
    gates: Vec<Gate>,
}

impl Operator {
    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    /// Expands the operator into a standalone circuit on its own qubits.
    pub fn to_circuit(&self) -> Circuit {
        Circuit {
            name: self.name.clone(),
            num_qubits: self.num_qubits,
            num_clbits: 0,
            gates: self.gates.clone(),
            measurements: Vec::new(),
        }
    }
}

impl UnitaryOperator for Operator {
    fn name(&self) -> &str {
        &self.name
    }

    fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    fn apply(&self, circuit: &mut Circuit, qubits: &[usize]) -> Result<(), CircuitError> {
        if qubits.len() != self.num_qubits {
            return Err(CircuitError::ArityMismatch {
                operator: self.name.clone(),
                expected: self.num_qubits,
                actual: qubits.len(),
            });
        }
        // Validate everything first so a failed append leaves the circuit untouched.
        let mapped: Vec<Gate> = self.gates.iter().map(|g| g.remap(qubits)).collect();
        for gate in &mapped {
            gate.validate(circuit.num_qubits)?;
        }
        circuit.gates.extend(mapped);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_gate_rejects_out_of_range() {
        let mut circuit = Circuit::new("c", 2, 0);
        assert_eq!(
            circuit.h(2),
            Err(CircuitError::QubitOutOfRange {
                qubit: 2,
                num_qubits: 2
            })
        );
        assert!(circuit.gates.is_empty());
    }

    #[test]
    fn test_mcx_rejects_duplicate_qubits() {
        let mut circuit = Circuit::new("c", 3, 0);
        assert_eq!(circuit.mcx(&[0, 1], 1), Err(CircuitError::DuplicateQubit(1)));
        assert_eq!(circuit.mcx(&[0, 0], 2), Err(CircuitError::DuplicateQubit(0)));
    }

    #[test]
    fn test_gate_collision() {
        let mcx = Gate::Mcx {
            controls: vec![0, 1],
            target: 2,
        };
        assert!(mcx.collides(&Gate::H(1)));
        assert!(mcx.collides(&Gate::X(2)));
        assert!(!mcx.collides(&Gate::Z(3)));
        assert!(!Gate::H(0).collides(&Gate::H(1)));
    }

    #[test]
    fn test_append_remaps_qubits() {
        let mut sub = Circuit::new("sub", 2, 0);
        sub.h(0).unwrap();
        sub.mcx(&[0], 1).unwrap();
        let op = sub.into_operator().unwrap();

        let mut circuit = Circuit::new("main", 4, 0);
        circuit.append(&op, &[3, 1]).unwrap();
        assert_eq!(
            circuit.gates,
            vec![
                Gate::H(3),
                Gate::Mcx {
                    controls: vec![3],
                    target: 1
                }
            ]
        );
    }

    #[test]
    fn test_append_arity_mismatch() {
        let op = Circuit::new("op", 3, 0).into_operator().unwrap();
        let mut circuit = Circuit::new("main", 3, 0);
        let err = circuit.append(&op, &[0, 1]).unwrap_err();
        assert_eq!(
            err,
            CircuitError::ArityMismatch {
                operator: "op".into(),
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn test_failed_append_leaves_circuit_untouched() {
        let mut sub = Circuit::new("sub", 2, 0);
        sub.h(0).unwrap();
        sub.h(1).unwrap();
        let op = sub.into_operator().unwrap();

        let mut circuit = Circuit::new("main", 2, 0);
        assert!(circuit.append(&op, &[0, 5]).is_err());
        assert!(circuit.gates.is_empty());
    }

    #[test]
    fn test_measured_circuit_is_not_an_operator() {
        let mut circuit = Circuit::new("m", 1, 1);
        circuit.measure_all().unwrap();
        assert_eq!(
            circuit.into_operator(),
            Err(CircuitError::NotUnitary("m".into()))
        );
    }

    #[test]
    fn test_measure_bounds() {
        let mut circuit = Circuit::new("m", 2, 1);
        assert!(circuit.measure(0, 0).is_ok());
        assert_eq!(
            circuit.measure(1, 1),
            Err(CircuitError::ClbitOutOfRange {
                clbit: 1,
                num_clbits: 1
            })
        );
    }

    #[test]
    fn test_into_operator_revalidates_gates() {
        let mut circuit = Circuit::new("raw", 2, 0);
        circuit.gates.push(Gate::H(5));
        assert_eq!(
            circuit.into_operator(),
            Err(CircuitError::QubitOutOfRange {
                qubit: 5,
                num_qubits: 2
            })
        );

        let mut dup = Circuit::new("dup", 3, 0);
        dup.gates.push(Gate::Mcx {
            controls: vec![1],
            target: 1,
        });
        assert_eq!(dup.into_operator(), Err(CircuitError::DuplicateQubit(1)));
    }
}
