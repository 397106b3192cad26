//! Peephole compilation applied before simulation.
//!
//! Every gate in [`Gate`] is self-inverse, so two identical adjacent gates
//! cancel. At level 2 a seeded pass also reorders neighbouring gates that act
//! on disjoint qubits, which can bring further pairs together. Neither pass
//! changes the circuit's unitary.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::circuit::{Circuit, Gate};

const COMMUTATION_ROUNDS: usize = 4;

/// Returns an equivalent circuit optimized at `optimization_level` (0, 1 or 2+).
pub fn transpile(circuit: &Circuit, optimization_level: u8, seed: u64) -> Circuit {
    let mut compiled = circuit.clone();
    if optimization_level == 0 {
        return compiled;
    }

    cancel_adjacent_pairs(&mut compiled.gates);

    if optimization_level >= 2 {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        for _ in 0..COMMUTATION_ROUNDS {
            commute_randomly(&mut compiled.gates, &mut rng);
            cancel_adjacent_pairs(&mut compiled.gates);
        }
    }

    compiled
}

/// Remove adjacent duplicate gates; returns how many pairs were dropped.
fn cancel_adjacent_pairs(gates: &mut Vec<Gate>) -> usize {
    let mut cancellations = 0;
    let mut i = 0;
    while i < gates.len().saturating_sub(1) {
        if gates[i] == gates[i + 1] {
            gates.drain(i..=i + 1);
            cancellations += 1;
            i = i.saturating_sub(1);
        } else {
            i += 1;
        }
    }
    cancellations
}

/// One sweep swapping each non-colliding neighbour pair with probability 1/2.
fn commute_randomly<R: Rng>(gates: &mut [Gate], rng: &mut R) {
    for i in 0..gates.len().saturating_sub(1) {
        if !gates[i].collides(&gates[i + 1]) && rng.gen_bool(0.5) {
            gates.swap(i, i + 1);
        }
    }
}
