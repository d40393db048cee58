//! Embedder Contract
//!
//! The engine never computes embeddings itself — it consumes a provider
//! through this trait. Providers are expected to return L2-normalized
//! vectors tagged with the producing model, enforce their own timeout
//! (30 s is a sensible ceiling), and fail cleanly: a provider error never
//! corrupts engine state, it only downgrades retrieval to base-level
//! ranking for that call.

use thiserror::Error;

/// One embedded text: the vector plus the model that produced it.
#[derive(Debug, Clone)]
pub struct EmbedOutput {
	/// L2-normalized vector
	pub vector: Vec<f32>,
	/// Producer tag, e.g. `"bge-base-en-v1.5"`
	pub model: String,
}

/// Errors an embedding provider may raise.
#[derive(Debug, Error)]
pub enum EmbedderError {
	/// The provider failed (network, inference, serialization).
	#[error("provider failure: {0}")]
	Provider(String),

	/// The provider gave up after its configured timeout.
	#[error("provider timed out after {0} ms")]
	Timeout(u64),
}

/// A pluggable text → vector provider.
pub trait Embedder: Send + Sync {
	/// Embed a single text.
	///
	/// # Errors
	///
	/// Returns an [`EmbedderError`] on provider failure or timeout.
	fn embed(&self, text: &str) -> Result<EmbedOutput, EmbedderError>;

	/// Embed a batch of texts, order preserved.
	///
	/// # Errors
	///
	/// Returns the first provider failure encountered.
	fn embed_batch(&self, texts: &[&str]) -> Result<Vec<EmbedOutput>, EmbedderError> {
		texts.iter().map(|text| self.embed(text)).collect()
	}

	/// Embed with a caller deadline (ms since epoch). Providers that can
	/// enforce deadlines override this; the default ignores it.
	///
	/// # Errors
	///
	/// Returns an [`EmbedderError`] on provider failure or timeout.
	fn embed_with_deadline(
		&self,
		text: &str,
		_deadline_ms: Option<f64>,
	) -> Result<EmbedOutput, EmbedderError> {
		self.embed(text)
	}

	/// Tag of the model this provider currently produces.
	fn model(&self) -> &str;
}


#[cfg(test)]
mod tests {
	use super::fixtures::StaticEmbedder;
	use super::*;

	#[test]
	fn batch_preserves_order() {
		let mut embedder = StaticEmbedder::new("test-model");
		embedder.insert("a", vec![1.0, 0.0]);
		embedder.insert("b", vec![0.0, 1.0]);

		let outputs = embedder.embed_batch(&["a", "b"]).unwrap();
		assert_eq!(outputs[0].vector, vec![1.0, 0.0]);
		assert_eq!(outputs[1].vector, vec![0.0, 1.0]);
	}

	#[test]
	fn default_deadline_delegates_to_embed() {
		let embedder = StaticEmbedder::with_default("test-model", vec![1.0]);
		let out = embedder.embed_with_deadline("anything", Some(123.0)).unwrap();
		assert_eq!(out.model, "test-model");
	}
}
