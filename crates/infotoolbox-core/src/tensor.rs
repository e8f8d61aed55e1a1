//! Response storage for multi-channel, multi-trial, multi-stimulus recordings.

use crate::error::{InfoError, Result};

/// Responses indexed by (channel, trial slot, stimulus).
///
/// Stored column-major with the channel index running fastest, so element
/// `(c, t, s)` lives at `c + t*channels + s*channels*max_trials` and the
/// channel vector of one trial is a contiguous slice. Only the first
/// `trial_counts[s]` slots of stimulus `s` carry data; the rest are padding.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseTensor {
    data: Vec<f64>,
    channels: usize,
    max_trials: usize,
    stimuli: usize,
}

impl ResponseTensor {
    /// Wrap a flat buffer. All dimensions must be non-zero and `data` must hold
    /// exactly `channels * max_trials * stimuli` values.
    pub fn new(data: Vec<f64>, channels: usize, max_trials: usize, stimuli: usize) -> Result<Self> {
        if channels == 0 || max_trials == 0 || stimuli == 0 {
            return Err(InfoError::invalid(format!(
                "tensor dimensions must be non-zero, got {channels} x {max_trials} x {stimuli}"
            )));
        }
        let expected = channels
            .checked_mul(max_trials)
            .and_then(|v| v.checked_mul(stimuli))
            .ok_or_else(|| InfoError::invalid("tensor dimensions overflow"))?;
        if data.len() != expected {
            return Err(InfoError::invalid(format!(
                "tensor buffer has {} values, expected {channels} x {max_trials} x {stimuli} = {expected}",
                data.len()
            )));
        }
        Ok(Self {
            data,
            channels,
            max_trials,
            stimuli,
        })
    }

    /// Build a tensor by evaluating `f(channel, trial, stimulus)` for every cell.
    pub fn from_fn(
        channels: usize,
        max_trials: usize,
        stimuli: usize,
        mut f: impl FnMut(usize, usize, usize) -> f64,
    ) -> Result<Self> {
        let mut data = Vec::new();
        for s in 0..stimuli {
            for t in 0..max_trials {
                for c in 0..channels {
                    data.push(f(c, t, s));
                }
            }
        }
        Self::new(data, channels, max_trials, stimuli)
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn max_trials(&self) -> usize {
        self.max_trials
    }

    pub fn stimuli(&self) -> usize {
        self.stimuli
    }

    /// Response of channel `c` on trial slot `t` of stimulus `s`.
    pub fn get(&self, c: usize, t: usize, s: usize) -> f64 {
        self.data[self.offset(t, s) + c]
    }

    /// All channel responses of trial slot `t` of stimulus `s`.
    pub fn trial(&self, t: usize, s: usize) -> &[f64] {
        let start = self.offset(t, s);
        &self.data[start..start + self.channels]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    fn offset(&self, t: usize, s: usize) -> usize {
        (t + s * self.max_trials) * self.channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_is_channel_fastest() {
        let r = ResponseTensor::from_fn(2, 3, 2, |c, t, s| (100 * s + 10 * t + c) as f64).unwrap();
        assert_eq!(&r.as_slice()[..4], &[0.0, 1.0, 10.0, 11.0]);
        assert_eq!(r.get(1, 2, 1), 121.0);
        assert_eq!(r.trial(1, 1), &[110.0, 111.0]);
    }

    #[test]
    fn test_rejects_bad_shapes() {
        assert!(ResponseTensor::new(vec![], 0, 1, 1).is_err());
        assert!(ResponseTensor::new(vec![1.0; 5], 2, 1, 3).is_err());
        assert!(ResponseTensor::new(vec![1.0; 6], 2, 1, 3).is_ok());
    }
}
