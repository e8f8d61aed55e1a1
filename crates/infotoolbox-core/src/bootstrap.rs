//! Quota-preserving stimulus-label bootstrap.
//!
//! Trials are dealt out one at a time to stimuli drawn uniformly from those
//! whose quota is not yet met. A stimulus leaves the candidate list the moment
//! its quota fills: its slot is overwritten with the last live entry and the
//! live count shrinks. Every stimulus `s` therefore ends up with exactly
//! `quotas[s]` trials, while which source trials it gets is shuffled.

use rand::Rng;

/// Where a trial was sent and whether that completed the target's quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assignment {
    pub stimulus: usize,
    pub completed: bool,
}

/// Candidate list plus per-stimulus fill counters for one bootstrap pass.
#[derive(Debug, Clone)]
pub struct StimulusAssigner {
    quotas: Vec<usize>,
    filled: Vec<usize>,
    candidates: Vec<usize>,
    live: usize,
}

impl StimulusAssigner {
    /// Stimuli with a zero quota never enter the candidate list.
    pub fn new(quotas: &[usize]) -> Self {
        let candidates: Vec<usize> = (0..quotas.len()).filter(|&s| quotas[s] > 0).collect();
        Self {
            quotas: quotas.to_vec(),
            filled: vec![0; quotas.len()],
            live: candidates.len(),
            candidates,
        }
    }

    /// Draw the target stimulus for the next trial.
    ///
    /// Returns `None` once every quota is met.
    pub fn assign<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<Assignment> {
        if self.live == 0 {
            return None;
        }
        let end = self.live - 1;
        let slot = rng.random_range(0..=end);
        let stimulus = self.candidates[slot];

        self.filled[stimulus] += 1;
        let completed = self.filled[stimulus] == self.quotas[stimulus];
        if completed {
            self.candidates[slot] = self.candidates[end];
            self.live = end;
        }
        Some(Assignment {
            stimulus,
            completed,
        })
    }

    /// Trials dealt to each stimulus so far.
    pub fn filled(&self) -> &[usize] {
        &self.filled
    }

    /// Stimuli still below quota.
    pub fn remaining(&self) -> &[usize] {
        &self.candidates[..self.live]
    }

    pub fn is_exhausted(&self) -> bool {
        self.live == 0
    }
}
