//! Amplification round planning.
//!
//! Success probability peaks sharply at `(π/4)·√(2ⁿ)` rounds and falls off on
//! both sides, so the attack explores a small grid of scaled round counts
//! instead of a single guess.

use std::collections::BTreeSet;
use std::f64::consts::PI;
use std::num::ParseFloatError;

/// Lower clamp for a scaling factor. NaN is treated as this value.
pub const ALPHA_MIN: f64 = 0.2;
/// Upper clamp for a scaling factor.
pub const ALPHA_MAX: f64 = 1.0;

/// `max(1, ⌊(π/4)·√(2ⁿ)⌋)`
pub fn optimal_iterations(n: u32) -> usize {
    let space = 2f64.powi(n as i32);
    ((PI / 4.0 * space.sqrt()).floor() as usize).max(1)
}

/// Strictly ascending, duplicate-free round counts, each at least 1.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IterationGrid(Vec<usize>);

impl IterationGrid {
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn clamp_alpha(alpha: f64) -> f64 {
    if alpha.is_nan() {
        ALPHA_MIN
    } else {
        alpha.clamp(ALPHA_MIN, ALPHA_MAX)
    }
}

/// `max(1, ⌊a·k_opt⌋)` for every clamped `a`, deduplicated and sorted.
pub fn iteration_grid(n: u32, alphas: &[f64]) -> IterationGrid {
    let k_opt = optimal_iterations(n) as f64;
    let ks: BTreeSet<usize> = alphas
        .iter()
        .map(|&a| ((clamp_alpha(a) * k_opt).floor() as usize).max(1))
        .collect();
    IterationGrid(ks.into_iter().collect())
}

/// Parses a comma-separated list such as `"0.35,0.45,0.55"`.
pub fn parse_alpha_list(s: &str) -> Result<Vec<f64>, ParseFloatError> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::parse::<f64>)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_optimal_iterations_values() {
        assert_eq!(optimal_iterations(1), 1); // π/4·√2 ≈ 1.11
        assert_eq!(optimal_iterations(2), 1); // π/4·2 ≈ 1.57
        assert_eq!(optimal_iterations(3), 2); // ≈ 2.22
        assert_eq!(optimal_iterations(4), 3); // ≈ 3.14
        assert_eq!(optimal_iterations(6), 6); // ≈ 6.28
        assert_eq!(optimal_iterations(10), 25); // ≈ 25.13
    }

    #[test]
    fn test_optimal_iterations_monotonic() {
        let mut prev = 0;
        for n in 0..=64 {
            let k = optimal_iterations(n);
            assert!(k >= 1);
            assert!(k >= prev, "n={n}: {k} < {prev}");
            prev = k;
        }
    }

    #[test]
    fn test_default_grid_for_six_bits() {
        // k_opt = 6: 0.35→2, 0.45→2, 0.55→3
        let grid = iteration_grid(6, &[0.35, 0.45, 0.55]);
        assert_eq!(grid.as_slice(), &[2, 3]);
    }

    #[test]
    fn test_grid_clamps_out_of_range_alphas() {
        // k_opt(10) = 25: clamped to 0.2 → 5, clamped to 1.0 → 25
        let grid = iteration_grid(10, &[-3.0, 0.0, 7.5, f64::NAN]);
        assert_eq!(grid.as_slice(), &[5, 25]);
    }

    #[test]
    fn test_grid_empty_for_no_alphas() {
        assert!(iteration_grid(4, &[]).is_empty());
    }

    #[test]
    fn test_parse_alpha_list() {
        assert_eq!(
            parse_alpha_list("0.35, 0.45,0.55").unwrap(),
            vec![0.35, 0.45, 0.55]
        );
        assert!(parse_alpha_list("0.3,abc").is_err());
        assert!(parse_alpha_list("").unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn prop_grid_strictly_ascending_and_positive(
            n in 1u32..=64,
            alphas in proptest::collection::vec(-10.0f64..10.0, 0..12),
        ) {
            let grid = iteration_grid(n, &alphas);
            let ks = grid.as_slice();
            prop_assert!(ks.iter().all(|&k| k >= 1));
            prop_assert!(ks.windows(2).all(|w| w[0] < w[1]));
            prop_assert!(ks.iter().all(|&k| k <= optimal_iterations(n)));
            prop_assert!(ks.len() <= alphas.len());
        }
    }
}
