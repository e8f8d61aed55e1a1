//! Panzeri & Treves finite-sampling bias correction.
//!
//! The plug-in entropy of a histogram built from `N` samples underestimates the
//! true entropy. To first order the shortfall is `(R - 1) / (2 N ln 2)` bits,
//! where `R` is the number of bins with non-zero probability under the *true*
//! distribution. `R` is unknown: the sample only shows `Rnaive` occupied bins,
//! and with few samples some relevant bins are simply never hit.
//!
//! This module estimates `R` by Bayesian extrapolation. Starting from
//! `R = Rnaive`, it adds hypothesized unobserved bins one at a time, spreads a
//! prior mass `gamma` uniformly over them, and computes the number of bins one
//! would *expect* to see occupied in a sample of size `N`. The search keeps the
//! `R` whose expected occupancy tracks the observed `Rnaive` most closely.
//!
//! References:
//! - S. Panzeri, A. Treves (1996), "Analytical estimates of limited sampling
//!   biases in different information measures", Network 7, 87-107.
//! - G. Pola, S. Schultz, R. Petersen, S. Panzeri (2003), "A practical guide to
//!   information analysis of spike trains".

use std::f64::consts::LN_2;

use log::{debug, trace};
use serde::Serialize;

use crate::error::{InfoError, Result};

/// Relative tolerance for the `sum(counts) == N` consistency check.
const COUNT_SUM_TOLERANCE: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Outcome of the occupancy search behind a bias estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OccupancyEstimate {
    /// Total number of possible bins (`Rtot`).
    pub total_bins: usize,
    /// Sample size (`N`).
    pub samples: f64,
    /// Bins observed at least once (`Rnaive`).
    pub naive_occupied: usize,
    /// Estimated bins occupied under the true distribution (`R`).
    pub estimated_occupied: usize,
    /// First-order entropy bias in bits.
    pub bias_bits: f64,
}

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// Panzeri-Treves entropy bias (bits) for a histogram of `n` samples spread over
/// `total_bins` possible bins.
///
/// `counts` lists the per-bin counts; bins past `counts.len()` (up to
/// `total_bins`) are treated as empty.
pub fn estimate_bias(counts: &[f64], n: f64, total_bins: usize) -> Result<f64> {
    estimate_occupancy(counts, n, total_bins).map(|est| est.bias_bits)
}

/// Same computation as [`estimate_bias`], also reporting `Rnaive` and the
/// estimated occupancy `R`.
pub fn estimate_occupancy(counts: &[f64], n: f64, total_bins: usize) -> Result<OccupancyEstimate> {
    let probs = validate(counts, n, total_bins)?;
    Ok(occupancy_from_probs(&probs, n, total_bins))
}

/// Apply the bias correction to every column of a column-major
/// `total_bins x samples.len()` count matrix, column `k` holding a histogram of
/// `samples[k]` samples (typically one column per stimulus).
///
/// All columns are validated before any estimate is computed.
pub fn estimate_bias_columns(
    counts: &[f64],
    total_bins: usize,
    samples: &[f64],
) -> Result<Vec<f64>> {
    if total_bins == 0 {
        return Err(InfoError::invalid("total_bins must be at least 1"));
    }
    if counts.len() != total_bins * samples.len() {
        return Err(InfoError::invalid(format!(
            "count matrix has {} entries, expected {total_bins} bins x {} columns",
            counts.len(),
            samples.len()
        )));
    }

    let columns = counts
        .chunks_exact(total_bins)
        .zip(samples)
        .map(|(column, &n)| validate(column, n, total_bins).map(|probs| (probs, n)))
        .collect::<Result<Vec<_>>>()?;

    Ok(columns
        .iter()
        .map(|(probs, n)| occupancy_from_probs(probs, *n, total_bins).bias_bits)
        .collect())
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

/// Check preconditions and return the normalized probabilities of the occupied
/// bins.
fn validate(counts: &[f64], n: f64, total_bins: usize) -> Result<Vec<f64>> {
    if !(n.is_finite() && n > 0.0) {
        return Err(InfoError::invalid(format!("sample size must be positive, got {n}")));
    }
    if total_bins == 0 {
        return Err(InfoError::invalid("total_bins must be at least 1"));
    }
    if let Some((i, c)) = counts
        .iter()
        .enumerate()
        .find(|&(_, c)| !(c.is_finite() && *c >= 0.0))
    {
        return Err(InfoError::invalid(format!(
            "count at bin {i} must be finite and non-negative, got {c}"
        )));
    }

    let probs: Vec<f64> = counts.iter().filter(|&&c| c > 0.0).map(|&c| (c / n).min(1.0)).collect();
    if probs.is_empty() {
        return Err(InfoError::invalid("histogram has no occupied bins"));
    }
    if probs.len() > total_bins {
        return Err(InfoError::invalid(format!(
            "{} occupied bins exceed total_bins = {total_bins}",
            probs.len()
        )));
    }

    let total: f64 = counts.iter().sum();
    if (total - n).abs() > COUNT_SUM_TOLERANCE * n.max(1.0) {
        return Err(InfoError::invalid(format!(
            "bin counts sum to {total} but sample size is {n}"
        )));
    }

    Ok(probs)
}

fn occupancy_from_probs(probs: &[f64], n: f64, total_bins: usize) -> OccupancyEstimate {
    let naive = probs.len();
    let estimated = if naive == total_bins {
        total_bins
    } else {
        search_occupancy(probs, n, total_bins)
    };
    let bias_bits = (estimated as f64 - 1.0) / (2.0 * n * LN_2);

    debug!(
        "panzeri-treves: N={n}, Rtot={total_bins}, Rnaive={naive}, R={estimated}, bias={bias_bits:.6} bits"
    );

    OccupancyEstimate {
        total_bins,
        samples: n,
        naive_occupied: naive,
        estimated_occupied: estimated,
        bias_bits,
    }
}

/// Grow `R` from `Rnaive` while the expected occupancy keeps moving closer to
/// the observed one. Requires `1 <= Rnaive < Rtot`.
fn search_occupancy(probs: &[f64], n: f64, total_bins: usize) -> usize {
    let naive = probs.len();
    let naive_f = naive as f64;

    let mut expected = naive_f - probs.iter().map(|p| (1.0 - p).powf(n)).sum::<f64>();
    let mut delta_previous = total_bins as f64;
    let mut delta = (naive_f - expected).abs();

    // Prior mass per hypothesized unobserved bin.
    let gamma_unit = 1.0 - (n / (n + naive_f)).powf(1.0 / n);

    // Counts sum to N, so every p is in (0, 1] and delta < Rnaive < Rtot on
    // entry: the loop runs at least once and the decrement below never goes
    // under Rnaive.
    let mut r = naive;
    while delta < delta_previous && r < total_bins {
        r += 1;

        let unobserved = (r - naive) as f64;
        let gamma = unobserved * gamma_unit;

        expected = probs
            .iter()
            .map(|p| {
                let p_bayes = (p * n + 1.0) / (n + naive_f) * (1.0 - gamma);
                1.0 - (1.0 - p_bayes).powf(n)
            })
            .sum();

        let p_bayes = gamma / unobserved;
        expected += unobserved * (1.0 - (1.0 - p_bayes).powf(n));

        delta_previous = delta;
        delta = (naive_f - expected).abs();
        trace!("panzeri-treves search: R={r}, Rexpected={expected}, delta={delta}");
    }

    // Undo the last step unless the search stopped at the Rtot ceiling while
    // still improving.
    r -= 1;
    if delta < delta_previous {
        r += 1;
    }
    r
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(r: usize, n: f64) -> f64 {
        (r as f64 - 1.0) / (2.0 * n * LN_2)
    }

    #[test]
    fn test_full_occupancy_shortcut() {
        let est = estimate_occupancy(&[3.0, 1.0, 2.0, 4.0], 10.0, 4).unwrap();
        assert_eq!(est.naive_occupied, 4);
        assert_eq!(est.estimated_occupied, 4);
        assert_eq!(est.bias_bits, 3.0 / (20.0 * LN_2));
    }

    #[test]
    fn test_worked_example_two_of_four() {
        let bias = estimate_bias(&[5.0, 5.0, 0.0, 0.0], 10.0, 4).unwrap();
        let ceiling = bits(4, 10.0);
        assert!(bias > 0.0);
        assert!(bias < ceiling, "bias {bias} should be under {ceiling}");
        // The first hypothesized bin already overshoots, so R stays at Rnaive.
        let est = estimate_occupancy(&[5.0, 5.0, 0.0, 0.0], 10.0, 4).unwrap();
        assert_eq!(est.estimated_occupied, 2);
        assert!((bias - bits(2, 10.0)).abs() < 1e-15);
    }

    #[test]
    fn test_search_stops_inside_range() {
        // delta shrinks through R = 6 and grows again at R = 7.
        let counts = [1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let est = estimate_occupancy(&counts, 3.0, 8).unwrap();
        assert_eq!(est.naive_occupied, 3);
        assert_eq!(est.estimated_occupied, 6);
    }

    #[test]
    fn test_search_truncated_at_ceiling_keeps_last_value() {
        // Still improving when R reaches Rtot: the tie-break re-increments.
        let est = estimate_occupancy(&[1.0, 1.0, 1.0, 0.0], 3.0, 4).unwrap();
        assert_eq!(est.estimated_occupied, 4);

        let est = estimate_occupancy(&[1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 0.0, 0.0], 6.0, 8).unwrap();
        assert_eq!(est.estimated_occupied, 8);
    }

    #[test]
    fn test_single_bin_gives_zero_bias() {
        let est = estimate_occupancy(&[3.0, 0.0], 3.0, 2).unwrap();
        assert_eq!(est.estimated_occupied, 1);
        assert_eq!(est.bias_bits, 0.0);
    }

    #[test]
    fn test_missing_trailing_bins_are_empty() {
        let short = estimate_bias(&[5.0, 5.0], 10.0, 4).unwrap();
        let padded = estimate_bias(&[5.0, 5.0, 0.0, 0.0], 10.0, 4).unwrap();
        assert_eq!(short, padded);
    }

    #[test]
    fn test_bias_shrinks_with_more_samples() {
        let shape = [2.0, 1.0, 1.0];
        let mut last = f64::INFINITY;
        for k in 1..=8 {
            let counts: Vec<f64> = shape.iter().map(|c| c * k as f64).collect();
            let n: f64 = counts.iter().sum();
            let bias = estimate_bias(&counts, n, 16).unwrap();
            assert!(bias >= 0.0);
            assert!(bias <= last, "bias grew from {last} to {bias} at k={k}");
            last = bias;
        }
    }

    #[test]
    fn test_rejects_bad_sample_size() {
        for n in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = estimate_bias(&[1.0, 1.0], n, 2).unwrap_err();
            assert!(matches!(err, InfoError::InvalidArgument(_)));
        }
    }

    #[test]
    fn test_rejects_negative_count() {
        let err = estimate_bias(&[1.0, -1.0, 2.0], 2.0, 3).unwrap_err();
        assert!(err.to_string().contains("bin 1"));
    }

    #[test]
    fn test_rejects_counts_exceeding_sample_size() {
        // A single bin holding more than N would push p above 1.
        for (counts, n, total_bins) in [
            (&[25.0][..], 2.5, 3),
            (&[30.0, 1.0][..], 3.0, 5),
            (&[5.0, 5.0][..], 12.0, 4),
        ] {
            let err = estimate_occupancy(counts, n, total_bins).unwrap_err();
            assert!(err.to_string().contains("sum to"), "{err}");
        }
        // Summation rounding stays within tolerance.
        let counts = [0.1, 0.2, 0.7];
        assert!(estimate_bias(&counts, 1.0, 4).unwrap() >= 0.0);
    }

    #[test]
    fn test_rejects_zero_bins_and_overfull_histogram() {
        assert!(estimate_bias(&[1.0], 1.0, 0).is_err());
        assert!(estimate_bias(&[1.0, 1.0, 1.0], 3.0, 2).is_err());
        assert!(estimate_bias(&[0.0, 0.0], 1.0, 2).is_err());
    }

    #[test]
    fn test_columns_match_single_estimates() {
        let counts = [5.0, 5.0, 0.0, 0.0, 1.0, 1.0, 1.0, 0.0];
        let biases = estimate_bias_columns(&counts, 4, &[10.0, 3.0]).unwrap();
        assert_eq!(biases.len(), 2);
        assert_eq!(biases[0], estimate_bias(&counts[..4], 10.0, 4).unwrap());
        assert_eq!(biases[1], estimate_bias(&counts[4..], 3.0, 4).unwrap());
    }

    #[test]
    fn test_columns_reject_shape_mismatch_and_bad_column() {
        assert!(estimate_bias_columns(&[1.0, 1.0, 1.0], 2, &[2.0]).is_err());
        // Second column is invalid: nothing is returned for the first either.
        let err = estimate_bias_columns(&[1.0, 1.0, 1.0, 1.0], 2, &[2.0, 0.0]).unwrap_err();
        assert!(matches!(err, InfoError::InvalidArgument(_)));
    }
}
