//! # infotoolbox-core
//!
//! Numerical building blocks for information analysis of multi-channel,
//! multi-trial, multi-stimulus recordings (LFP, EEG, spike trains).
//!
//! Two independent estimators:
//!
//! - **Bias correction** ([`estimate_bias`]): the Panzeri & Treves (1996)
//!   first-order limited-sampling bias of a plug-in entropy, with the number
//!   of truly occupied bins estimated by Bayesian extrapolation.
//! - **Covariance aggregation** ([`aggregate_covariance`]): per-stimulus and
//!   pooled scatter matrices in one streaming pass, optionally under a
//!   quota-preserving shuffle of stimulus labels (bootstrap).
//!
//! ## Quick Start
//!
//! ```
//! use infotoolbox_core::{CovarianceConfig, ResponseTensor, aggregate_with_config, estimate_bias};
//!
//! // 10 samples seen in 2 of 4 possible bins.
//! let bias = estimate_bias(&[5.0, 5.0, 0.0, 0.0], 10.0, 4).unwrap();
//! assert!(bias > 0.0);
//!
//! // 2 channels, 1 trial per stimulus, 2 stimuli.
//! let responses = ResponseTensor::new(vec![1.0, 2.0, 3.0, 4.0], 2, 1, 2).unwrap();
//! let cov = aggregate_with_config(&responses, &[1, 1], &CovarianceConfig::default()).unwrap();
//! assert_eq!(cov.pooled_at(0, 1), 2.0);
//! ```
//!
//! Every input check happens before any computation; a malformed call returns
//! [`InfoError::InvalidArgument`] and nothing else.

pub mod bias;
pub mod bootstrap;
pub mod covariance;
pub mod error;
pub mod tensor;

pub use bias::{OccupancyEstimate, estimate_bias, estimate_bias_columns, estimate_occupancy};
pub use bootstrap::{Assignment, StimulusAssigner};
pub use covariance::{
    CovarianceConfig, CovarianceEstimate, aggregate_covariance, aggregate_with_config,
    bootstrap_replicates,
};
pub use error::{InfoError, Result};
pub use tensor::ResponseTensor;

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
