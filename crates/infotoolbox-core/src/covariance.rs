//! Streaming per-stimulus and pooled response covariance.
//!
//! One pass over all trials builds, for every stimulus, the scatter matrix
//! (sum of outer products of mean-centred channel responses) of the trials
//! assigned to it, plus the pooled scatter matrix of all trials around the
//! grand mean. Matrices are unnormalized: divide by `Nt[s] - 1` (or
//! `totNt - 1`) for the unbiased covariance.
//!
//! # Two-level mean handling
//!
//! While a stimulus fills, its accumulator holds raw second moments. When the
//! stimulus completes, that *raw* sum is added to the pooled accumulator and
//! only then is the stimulus mean removed locally. The pooled accumulator
//! therefore never sees per-stimulus means; the grand mean is removed from it
//! once, after the very last trial.
//!
//! # Bootstrap
//!
//! With `bootstrap = true`, each trial is dealt to a stimulus drawn by a
//! [`StimulusAssigner`], so stimulus `s` still receives exactly `Nt[s]` trials
//! but from a shuffled source. This yields the null distribution of any
//! statistic built on the per-stimulus matrices. The pooled matrix is
//! invariant under the shuffle.

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::bootstrap::{Assignment, StimulusAssigner};
use crate::error::{InfoError, Result};
use crate::tensor::ResponseTensor;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Options for [`aggregate_with_config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CovarianceConfig {
    /// Shuffle stimulus labels while preserving trial quotas.
    pub bootstrap: bool,
    /// Seed for the bootstrap draws. `None` uses the thread-local RNG.
    pub seed: Option<u64>,
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Output of one aggregation pass. All matrices are column-major and
/// symmetric in the channel indices.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CovarianceEstimate {
    pub channels: usize,
    pub stimuli: usize,
    /// `channels x channels x stimuli`, element `(c1, c2, s)` at
    /// `c1 + c2*channels + s*channels*channels`.
    pub per_stimulus: Vec<f64>,
    /// `channels x channels`, element `(c1, c2)` at `c1 + c2*channels`.
    pub pooled: Vec<f64>,
    /// `stimuli x channels`, element `(s, c)` at `s + c*stimuli`.
    pub per_stimulus_diag: Vec<f64>,
    /// `channels` pooled variances (scatter diagonal).
    pub pooled_diag: Vec<f64>,
    /// Trials each stimulus received during the pass.
    pub trials_assigned: Vec<usize>,
}

impl CovarianceEstimate {
    pub fn per_stimulus_at(&self, c1: usize, c2: usize, s: usize) -> f64 {
        self.per_stimulus[c1 + c2 * self.channels + s * self.channels * self.channels]
    }

    /// The full `channels x channels` matrix of stimulus `s`.
    pub fn per_stimulus_matrix(&self, s: usize) -> &[f64] {
        let size = self.channels * self.channels;
        &self.per_stimulus[s * size..(s + 1) * size]
    }

    pub fn pooled_at(&self, c1: usize, c2: usize) -> f64 {
        self.pooled[c1 + c2 * self.channels]
    }

    pub fn per_stimulus_diag_at(&self, s: usize, c: usize) -> f64 {
        self.per_stimulus_diag[s + c * self.stimuli]
    }
}

// ---------------------------------------------------------------------------
// Public entry points
// ---------------------------------------------------------------------------

/// Compute per-stimulus and pooled scatter matrices in a single pass.
///
/// `trial_counts[s]` is the number of valid trial slots of stimulus `s` and
/// must lie in `1..=responses.max_trials()`; the counts must sum to
/// `total_trials`. `rng` is only drawn from when `bootstrap` is set.
pub fn aggregate_covariance<R: Rng + ?Sized>(
    responses: &ResponseTensor,
    trial_counts: &[usize],
    total_trials: usize,
    bootstrap: bool,
    rng: &mut R,
) -> Result<CovarianceEstimate> {
    validate(responses, trial_counts, total_trials)?;

    let stimuli = responses.stimuli();
    debug!(
        "covariance pass: channels={}, stimuli={stimuli}, trials={total_trials}, bootstrap={bootstrap}",
        responses.channels()
    );

    let mut acc = Accumulator::new(responses.channels(), stimuli);
    let mut assigner = bootstrap.then(|| StimulusAssigner::new(trial_counts));

    for (s, &quota) in trial_counts.iter().enumerate() {
        for t in 0..quota {
            let (target, completed) = match assigner.as_mut() {
                Some(assigner) => {
                    let a = draw_target(assigner, rng)?;
                    (a.stimulus, a.completed)
                }
                None => (s, t + 1 == quota),
            };

            acc.accumulate(responses.trial(t, s), target);

            if completed {
                acc.finalize_stimulus(target, trial_counts[target]);
            }
            if s == stimuli - 1 && t == quota - 1 {
                acc.finalize_pooled(total_trials);
            }
        }
    }

    // Without bootstrap every stimulus keeps exactly its own trials.
    let trials_assigned = match &assigner {
        Some(assigner) => assigner.filled().to_vec(),
        None => trial_counts.to_vec(),
    };
    Ok(acc.into_estimate(trials_assigned))
}

/// [`aggregate_covariance`] with the total trial count derived from
/// `trial_counts` and the randomness source built from `config`.
pub fn aggregate_with_config(
    responses: &ResponseTensor,
    trial_counts: &[usize],
    config: &CovarianceConfig,
) -> Result<CovarianceEstimate> {
    let total_trials = trial_counts.iter().sum();
    match config.seed {
        Some(seed) => aggregate_covariance(
            responses,
            trial_counts,
            total_trials,
            config.bootstrap,
            &mut StdRng::seed_from_u64(seed),
        ),
        None => aggregate_covariance(
            responses,
            trial_counts,
            total_trials,
            config.bootstrap,
            &mut rand::rng(),
        ),
    }
}

/// Run `replicates` independent bootstrap passes.
///
/// Each replicate draws from its own `StdRng` stream, seeded from a master
/// generator initialized with `seed`, and writes its own output buffers, so
/// the result is reproducible for a given seed.
pub fn bootstrap_replicates(
    responses: &ResponseTensor,
    trial_counts: &[usize],
    replicates: usize,
    seed: u64,
) -> Result<Vec<CovarianceEstimate>> {
    if replicates == 0 {
        return Err(InfoError::invalid("replicates must be at least 1"));
    }
    let total_trials = trial_counts.iter().sum();
    validate(responses, trial_counts, total_trials)?;

    let mut master = StdRng::seed_from_u64(seed);
    (0..replicates)
        .map(|_| {
            let mut rng = StdRng::from_rng(&mut master);
            aggregate_covariance(responses, trial_counts, total_trials, true, &mut rng)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

/// Next bootstrap target. Quotas sum to the trial count, so the assigner only
/// runs dry if the caller's counts and the pass disagree.
fn draw_target<R: Rng + ?Sized>(
    assigner: &mut StimulusAssigner,
    rng: &mut R,
) -> Result<Assignment> {
    assigner
        .assign(rng)
        .ok_or_else(|| InfoError::invalid("bootstrap quotas exhausted before the last trial"))
}

fn validate(responses: &ResponseTensor, trial_counts: &[usize], total_trials: usize) -> Result<()> {
    let stimuli = responses.stimuli();
    let max_trials = responses.max_trials();

    if trial_counts.len() != stimuli {
        return Err(InfoError::invalid(format!(
            "{} trial counts given for {stimuli} stimuli",
            trial_counts.len()
        )));
    }
    if let Some((s, &nt)) = trial_counts
        .iter()
        .enumerate()
        .find(|&(_, &nt)| nt == 0 || nt > max_trials)
    {
        return Err(InfoError::invalid(format!(
            "stimulus {s} has {nt} trials, expected 1..={max_trials}"
        )));
    }
    if total_trials == 0 {
        return Err(InfoError::invalid("total trial count must be positive"));
    }
    let sum: usize = trial_counts.iter().sum();
    if sum != total_trials {
        return Err(InfoError::invalid(format!(
            "trial counts sum to {sum}, expected {total_trials}"
        )));
    }
    Ok(())
}

/// Running sums for one pass. Only the upper triangle (`c1 <= c2`) is
/// accumulated; the lower one is filled in on finalization.
struct Accumulator {
    channels: usize,
    stimuli: usize,
    per_stimulus: Vec<f64>,
    pooled: Vec<f64>,
    per_stimulus_diag: Vec<f64>,
    pooled_diag: Vec<f64>,
    stimulus_sums: Vec<f64>,
    pooled_sums: Vec<f64>,
}

impl Accumulator {
    fn new(channels: usize, stimuli: usize) -> Self {
        Self {
            channels,
            stimuli,
            per_stimulus: vec![0.0; channels * channels * stimuli],
            pooled: vec![0.0; channels * channels],
            per_stimulus_diag: vec![0.0; stimuli * channels],
            pooled_diag: vec![0.0; channels],
            stimulus_sums: vec![0.0; channels * stimuli],
            pooled_sums: vec![0.0; channels],
        }
    }

    fn accumulate(&mut self, response: &[f64], target: usize) {
        let nc = self.channels;
        let base = target * nc * nc;
        for c1 in 0..nc {
            for c2 in c1..nc {
                self.per_stimulus[base + c1 + c2 * nc] += response[c1] * response[c2];
            }
        }
        for (c, &x) in response.iter().enumerate() {
            self.stimulus_sums[target * nc + c] += x;
            self.pooled_sums[c] += x;
        }
    }

    /// Stimulus `target` just received its last trial.
    fn finalize_stimulus(&mut self, target: usize, quota: usize) {
        let nc = self.channels;
        let base = target * nc * nc;
        let sums = &self.stimulus_sums[target * nc..(target + 1) * nc];
        let n = quota as f64;
        for c1 in 0..nc {
            for c2 in c1..nc {
                let idx = base + c1 + c2 * nc;
                self.pooled[c1 + c2 * nc] += self.per_stimulus[idx];
                self.per_stimulus[idx] -= sums[c1] * sums[c2] / n;

                let value = self.per_stimulus[idx];
                if c1 == c2 {
                    self.per_stimulus_diag[target + c1 * self.stimuli] = value;
                } else {
                    self.per_stimulus[base + c2 + c1 * nc] = value;
                }
            }
        }
    }

    /// The last trial of the pass has been accumulated and its stimulus
    /// finalized.
    fn finalize_pooled(&mut self, total_trials: usize) {
        let nc = self.channels;
        let n = total_trials as f64;
        for c1 in 0..nc {
            for c2 in c1..nc {
                let idx = c1 + c2 * nc;
                self.pooled[idx] -= self.pooled_sums[c1] * self.pooled_sums[c2] / n;

                let value = self.pooled[idx];
                if c1 == c2 {
                    self.pooled_diag[c1] = value;
                } else {
                    self.pooled[c2 + c1 * nc] = value;
                }
            }
        }
    }

    fn into_estimate(self, trials_assigned: Vec<usize>) -> CovarianceEstimate {
        CovarianceEstimate {
            channels: self.channels,
            stimuli: self.stimuli,
            per_stimulus: self.per_stimulus,
            pooled: self.pooled,
            per_stimulus_diag: self.per_stimulus_diag,
            pooled_diag: self.pooled_diag,
            trials_assigned,
        }
    }
}
