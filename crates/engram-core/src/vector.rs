//! Vector Kernel
//!
//! Similarity primitives for the retrieval pipeline.
//!
//! Embeddings are stored as `f32` (what providers emit); all arithmetic
//! here runs in `f64`. Stored vectors are expected to be L2-normalized,
//! but the kernel still guards against zero-norm inputs (similarity 0)
//! and clamps results into [-1, 1].
//!
//! Unlike a plain nearest-neighbor scan, mismatched dimensions are an
//! explicit error rather than a silent zero — a probe from one embedding
//! model scored against vectors from another is a bug upstream, and the
//! migration bookkeeping (see `lifecycle`) exists to prevent it.

use crate::error::{EngramError, Result};

/// Dot product of two equal-dimension vectors.
///
/// # Errors
///
/// Returns [`EngramError::DimensionMismatch`] when lengths differ.
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> Result<f64> {
	if a.len() != b.len() {
		return Err(EngramError::DimensionMismatch {
			expected: a.len(),
			actual: b.len(),
		});
	}

	Ok(a
		.iter()
		.zip(b.iter())
		.fold(0.0_f64, |acc, (&ai, &bi)| f64::from(ai).mul_add(f64::from(bi), acc)))
}

/// L2 norm of a vector.
#[inline]
#[must_use]
pub fn l2_norm(v: &[f32]) -> f64 {
	v.iter()
		.fold(0.0_f64, |acc, &x| f64::from(x).mul_add(f64::from(x), acc))
		.sqrt()
}

/// Cosine similarity between two vectors, clamped to [-1, 1].
///
/// Zero-norm inputs yield 0 rather than NaN.
///
/// # Errors
///
/// Returns [`EngramError::DimensionMismatch`] when lengths differ.
pub fn cosine(a: &[f32], b: &[f32]) -> Result<f64> {
	if a.len() != b.len() {
		return Err(EngramError::DimensionMismatch {
			expected: a.len(),
			actual: b.len(),
		});
	}

	let (dot_product, norm_a_sq, norm_b_sq) =
		a.iter()
			.zip(b.iter())
			.fold((0.0_f64, 0.0_f64, 0.0_f64), |(dp, na, nb), (&ai, &bi)| {
				let (ai, bi) = (f64::from(ai), f64::from(bi));
				(ai.mul_add(bi, dp), ai.mul_add(ai, na), bi.mul_add(bi, nb))
			});

	let magnitude = norm_a_sq.sqrt() * norm_b_sq.sqrt();
	if magnitude == 0.0 {
		Ok(0.0)
	} else {
		Ok((dot_product / magnitude).clamp(-1.0, 1.0))
	}
}

/// Cosine similarity of a probe against many traces, order preserved.
///
/// Numerically equivalent to n independent [`cosine`] calls; the probe
/// norm is computed once.
///
/// # Errors
///
/// Returns [`EngramError::DimensionMismatch`] if any trace's length
/// differs from the probe's.
pub fn cosine_batch(probe: &[f32], traces: &[Vec<f32>]) -> Result<Vec<f64>> {
	let probe_norm = l2_norm(probe);
	if probe_norm == 0.0 {
		// Still validate dimensions so batch and single agree on errors.
		for trace in traces {
			if trace.len() != probe.len() {
				return Err(EngramError::DimensionMismatch {
					expected: probe.len(),
					actual: trace.len(),
				});
			}
		}
		return Ok(vec![0.0; traces.len()]);
	}

	traces
		.iter()
		.map(|trace| {
			if trace.len() != probe.len() {
				return Err(EngramError::DimensionMismatch {
					expected: probe.len(),
					actual: trace.len(),
				});
			}

			let (dot_product, trace_norm_sq) = probe
				.iter()
				.zip(trace.iter())
				.fold((0.0_f64, 0.0_f64), |(dp, tn), (&pi, &ti)| {
					let (pi, ti) = (f64::from(pi), f64::from(ti));
					(pi.mul_add(ti, dp), ti.mul_add(ti, tn))
				});

			let trace_norm = trace_norm_sq.sqrt();
			if trace_norm == 0.0 {
				Ok(0.0)
			} else {
				Ok((dot_product / (probe_norm * trace_norm)).clamp(-1.0, 1.0))
			}
		})
		.collect()
}

/// MINERVA 2's nonlinear activation function.
///
/// `A(i) = S(i)³`
///
/// Cubing emphasizes strong matches and suppresses weak ones, preserving
/// sign for negative similarities. This is what lets a partial cue surface
/// only the memories that genuinely match it.
#[inline]
#[must_use]
pub fn nonlinear_activation(similarity: f64) -> f64 {
	similarity.powi(3)
}

/// Verify a vector is unit-length within `tolerance` (strict mode).
///
/// # Errors
///
/// Returns [`EngramError::Invariant`] when the norm strays from 1 by more
/// than `tolerance`, or when the vector is empty.
pub fn ensure_unit(v: &[f32], tolerance: f64) -> Result<()> {
	if v.is_empty() {
		return Err(EngramError::Invariant("empty vector".into()));
	}
	let norm = l2_norm(v);
	if (norm - 1.0).abs() > tolerance {
		return Err(EngramError::Invariant(format!(
			"expected unit vector, norm was {norm:.6}"
		)));
	}
	Ok(())
}
