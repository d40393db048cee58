//! Activation Kernel
//!
//! ACT-R base-level activation: how frequently and recently a memory has
//! been accessed determines how ready it is to surface.
//!
//! `B(m) = ln[Σ max(1, Δt_k)^(-d)]`
//!
//! Where `Δt_k` is seconds since access k and `d` is the decay exponent
//! (≈0.5 for human-like forgetting). The 1-second floor on elapsed time
//! avoids singularities when several accesses share a timestamp and caps
//! the activation of just-accessed items.
//!
//! Retrieval probability is the logistic of activation against a
//! threshold: `P = 1 / (1 + e^((τ - A) / s))`. It gates candidates; it
//! never re-ranks them.

use serde::{Deserialize, Serialize};

/// Configuration for activation calculations.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActivationConfig {
	/// `d` in the forgetting equation (default: 0.5)
	pub decay: f64,
	/// `τ` (tau), the retrieval threshold
	pub threshold: f64,
	/// `s`, the noise/temperature parameter
	pub noise: f64,
}

impl Default for ActivationConfig {
	fn default() -> Self {
		Self {
			decay: 0.5,
			threshold: 0.0,
			noise: 0.25,
		}
	}
}

/// Compute base-level activation from an access history.
///
/// Timestamps are milliseconds; elapsed time is floored at one second.
/// An empty history yields 0 — a never-accessed item is neutral, not
/// infinitely forgotten (creation normally writes the first access, so
/// this only matters for rows imported from elsewhere).
///
/// More accesses always raise activation; a growing `now_ms` with a fixed
/// history always lowers it.
#[must_use]
pub fn base_level(access_timestamps_ms: &[f64], now_ms: f64, decay: f64) -> f64 {
	if access_timestamps_ms.is_empty() {
		return 0.0;
	}

	let sum: f64 = access_timestamps_ms
		.iter()
		.map(|&timestamp| {
			let elapsed_s = (now_ms - timestamp).max(1000.0) / 1000.0;
			elapsed_s.powf(-decay)
		})
		.sum();

	sum.ln()
}

/// Batch compute base-level activation for multiple access histories.
#[must_use]
pub fn base_level_batch(histories: &[Vec<f64>], now_ms: f64, decay: f64) -> Vec<f64> {
	histories
		.iter()
		.map(|timestamps| base_level(timestamps, now_ms, decay))
		.collect()
}

/// Probability of successful retrieval.
///
/// `P(recall) = 1 / (1 + e^((τ - A) / s))`
///
/// A logistic centered on the threshold: at `A = τ` the probability is
/// exactly 0.5, and higher activation approaches 1.
#[inline]
#[must_use]
pub fn retrieval_probability(activation: f64, threshold: f64, noise: f64) -> f64 {
	let exponent = (threshold - activation) / noise;
	1.0 / (1.0 + exponent.exp())
}
