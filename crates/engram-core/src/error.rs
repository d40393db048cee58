//! Error types shared across the engine.
//!
//! The failure policy is recover-at-the-pipeline-boundary:
//!
//! - Vector math over incompatible dimensions is fatal to that call.
//! - A missing or failed probe embedding is recovered locally by falling
//!   back to base-level ranking; it never aborts retrieval.
//! - Absent entities are negative results (`Ok(None)` / `Ok(false)`) at the
//!   API surface, not errors.
//! - Invariant violations are fatal and carry enough context to diagnose.
//! - Background sweeps log and continue; they never propagate.

use thiserror::Error;

use crate::embedder::EmbedderError;
use crate::store::StoreError;

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum EngramError {
	/// Vector operation over incompatible dimensions.
	#[error("dimension mismatch: expected {expected}, got {actual}")]
	DimensionMismatch {
		/// Dimensionality of the left-hand / probe vector.
		expected: usize,
		/// Dimensionality of the offending vector.
		actual: usize,
	},

	/// The probe embedding could not be produced.
	///
	/// Retrieval recovers from this internally; it only escapes when a
	/// caller asks for an embedding directly.
	#[error("embedding unavailable: {0}")]
	MissingEmbedding(String),

	/// The external embedding provider failed or timed out.
	#[error("embedding provider failed")]
	Provider(#[from] EmbedderError),

	/// A referenced entity does not exist.
	#[error("not found: {0}")]
	NotFound(String),

	/// Internal inconsistency (non-unit vector in strict mode, non-finite
	/// timestamp, out-of-range weight).
	#[error("invariant violation: {0}")]
	Invariant(String),

	/// Backing-store failure.
	#[error(transparent)]
	Store(#[from] StoreError),
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, EngramError>;
