//! Marking oracle and diffusion templates.
//!
//! Both templates act on exactly `n` qubits and contain no measurement. Bit
//! strings are read with the leftmost character describing the highest qubit,
//! so character `i` of an n-bit pattern refers to qubit `n - 1 - i`. The same
//! convention is used for measured outcomes.

use crate::circuit::{Circuit, CircuitError, Operator};

pub const MARKING_NAME: &str = "Oracle";
pub const AMPLIFICATION_NAME: &str = "Diffusion";

/// Validates an n-bit pattern and returns the qubits whose target bit is 0.
pub fn zero_positions(n: usize, target_bits: &str) -> Result<Vec<usize>, CircuitError> {
    if n < 1 {
        return Err(CircuitError::InvalidQubitCount(n));
    }
    if let Some(c) = target_bits.chars().find(|c| *c != '0' && *c != '1') {
        return Err(CircuitError::NonBinaryTarget(c));
    }
    if target_bits.len() != n {
        return Err(CircuitError::TargetLengthMismatch {
            expected: n,
            actual: target_bits.len(),
        });
    }
    Ok(target_bits
        .bytes()
        .rev()
        .enumerate()
        .filter(|(_, b)| *b == b'0')
        .map(|(qubit, _)| qubit)
        .collect())
}

/// Flips the sign of the |1...1⟩ component: H on the last qubit around an
/// (n-1)-controlled NOT. For n = 1 this reduces to H·X·H = Z.
fn phase_flip_all_ones(circuit: &mut Circuit, n: usize) -> Result<(), CircuitError> {
    let last = n - 1;
    let controls: Vec<usize> = (0..last).collect();
    circuit.h(last)?;
    circuit.mcx(&controls, last)?;
    circuit.h(last)
}

/// Operator negating the amplitude of the basis state equal to `target_bits`
/// and leaving every other amplitude untouched.
pub fn build_marking_operator(n: usize, target_bits: &str) -> Result<Operator, CircuitError> {
    let zeros = zero_positions(n, target_bits)?;
    let mut circuit = Circuit::new(MARKING_NAME, n, 0);
    circuit.x_all(zeros.iter().copied())?;
    phase_flip_all_ones(&mut circuit, n)?;
    circuit.x_all(zeros.iter().copied())?;
    circuit.into_operator()
}

/// Reflection about the uniform superposition (up to global phase).
pub fn build_amplification_operator(n: usize) -> Result<Operator, CircuitError> {
    if n < 1 {
        return Err(CircuitError::InvalidQubitCount(n));
    }
    let mut circuit = Circuit::new(AMPLIFICATION_NAME, n, 0);
    circuit.h_all(0..n)?;
    circuit.x_all(0..n)?;
    phase_flip_all_ones(&mut circuit, n)?;
    circuit.x_all(0..n)?;
    circuit.h_all(0..n)?;
    circuit.into_operator()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{Gate, UnitaryOperator};
    use crate::executor::StateVector;
    use num_complex::Complex64;

    const EPS: f64 = 1e-9;

    /// Column `j` is the operator applied to basis state |j⟩.
    fn unitary(op: &Operator) -> Vec<Vec<Complex64>> {
        let n = op.num_qubits();
        let circuit = op.to_circuit();
        (0..1usize << n)
            .map(|j| {
                let mut state = StateVector::basis(n, j);
                state.apply_circuit(&circuit);
                state.amplitudes().to_vec()
            })
            .collect()
    }

    fn index_of(bits: &str) -> usize {
        usize::from_str_radix(bits, 2).unwrap()
    }

    fn all_patterns(n: usize) -> Vec<String> {
        (0..1usize << n)
            .map(|i| format!("{:0width$b}", i, width = n))
            .collect()
    }

    #[test]
    fn test_marking_flips_only_target() {
        for n in 1..=4 {
            for target in all_patterns(n) {
                let op = build_marking_operator(n, &target).unwrap();
                let u = unitary(&op);
                let t = index_of(&target);
                for (j, column) in u.iter().enumerate() {
                    let expected = if j == t { -1.0 } else { 1.0 };
                    for (i, amp) in column.iter().enumerate() {
                        let want = if i == j { expected } else { 0.0 };
                        assert!(
                            (amp.re - want).abs() < EPS && amp.im.abs() < EPS,
                            "n={n} target={target} entry ({i},{j}) = {amp}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_marking_is_self_inverse() {
        for n in 1..=4 {
            for target in all_patterns(n) {
                let op = build_marking_operator(n, &target).unwrap();
                let mut twice = op.to_circuit();
                twice.append(&op, &(0..n).collect::<Vec<_>>()).unwrap();
                for j in 0..1usize << n {
                    let mut state = StateVector::basis(n, j);
                    state.apply_circuit(&twice);
                    assert!((state.amplitudes()[j].re - 1.0).abs() < EPS);
                    assert!((state.total_probability() - 1.0).abs() < EPS);
                }
            }
        }
    }

    #[test]
    fn test_amplification_reflects_about_mean() {
        // D = -(2|s><s| - I): entries are -(2/N - δ_ij) up to a global phase.
        for n in 1..=4 {
            let u = unitary(&build_amplification_operator(n).unwrap());
            let size = (1usize << n) as f64;
            let phase = if (u[0][0].re - (1.0 - 2.0 / size)).abs() < EPS {
                1.0
            } else {
                -1.0
            };
            for (j, column) in u.iter().enumerate() {
                for (i, amp) in column.iter().enumerate() {
                    let delta = if i == j { 1.0 } else { 0.0 };
                    let want = phase * (delta - 2.0 / size);
                    assert!(
                        (amp.re - want).abs() < EPS && amp.im.abs() < EPS,
                        "n={n} entry ({i},{j}) = {amp}, want {want}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_operators_preserve_probability() {
        let op = build_amplification_operator(3).unwrap();
        let mark = build_marking_operator(3, "101").unwrap();
        let mut state = StateVector::zero(3);
        for q in 0..3 {
            state.apply_gate(&Gate::H(q));
        }
        state.apply_circuit(&mark.to_circuit());
        state.apply_circuit(&op.to_circuit());
        assert!((state.total_probability() - 1.0).abs() < EPS);
    }

    #[test]
    fn test_single_qubit_marking_is_phase_flip() {
        let one = build_marking_operator(1, "1").unwrap();
        assert_eq!(
            one.gates(),
            &[
                Gate::H(0),
                Gate::Mcx {
                    controls: vec![],
                    target: 0
                },
                Gate::H(0)
            ]
        );
        let zero = build_marking_operator(1, "0").unwrap();
        assert_eq!(zero.gates().first(), Some(&Gate::X(0)));
        assert_eq!(zero.gates().last(), Some(&Gate::X(0)));
    }

    #[test]
    fn test_zero_positions_bit_order() {
        // "100": qubit 2 is 1, qubits 0 and 1 are 0
        assert_eq!(zero_positions(3, "100").unwrap(), vec![0, 1]);
        assert_eq!(zero_positions(3, "011").unwrap(), vec![2]);
    }

    #[test]
    fn test_invalid_inputs() {
        assert_eq!(
            build_marking_operator(0, ""),
            Err(CircuitError::InvalidQubitCount(0))
        );
        assert_eq!(
            build_marking_operator(3, "10"),
            Err(CircuitError::TargetLengthMismatch {
                expected: 3,
                actual: 2
            })
        );
        assert_eq!(
            build_marking_operator(3, "1x0"),
            Err(CircuitError::NonBinaryTarget('x'))
        );
        assert_eq!(
            build_amplification_operator(0),
            Err(CircuitError::InvalidQubitCount(0))
        );
    }

    #[test]
    fn test_templates_have_no_classical_bits() {
        let op = build_amplification_operator(2).unwrap();
        let circuit = op.to_circuit();
        assert_eq!(circuit.num_clbits, 0);
        assert!(circuit.measurements.is_empty());
        assert_eq!(op.name(), AMPLIFICATION_NAME);
    }
}
