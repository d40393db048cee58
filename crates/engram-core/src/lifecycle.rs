//! Embedding Lifecycle
//!
//! The active embedding model changes over a deployment's lifetime —
//! a migration from a hosted provider to a local one, or a model upgrade
//! with a different dimensionality. Stored vectors are only comparable to
//! probes from the model that produced them, so on a model change the
//! stale vectors are invalidated in bulk and their owners drift back in
//! through lazy background regeneration.
//!
//! Text and visual embeddings are separate spaces with identical
//! contracts; migrating one never touches the other.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::embedder::Embedder;
use crate::error::Result;
use crate::model::EmbeddingRecord;
use crate::store::MemoryStore;

/// Which embedding table an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbeddingSpace {
	/// Embeddings of textual memories
	Text,
	/// Embeddings of visual memories
	Visual,
}

impl EmbeddingSpace {
	/// Human-readable name for logs.
	#[must_use]
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Text => "text",
			Self::Visual => "visual",
		}
	}
}

/// Count stored embeddings whose model tag differs from `model`.
///
/// # Errors
///
/// Propagates store failures.
pub fn count_not_matching(
	store: &dyn MemoryStore,
	space: EmbeddingSpace,
	model: &str,
) -> Result<u64> {
	let count = match space {
		EmbeddingSpace::Text => store.count_embeddings_not_matching(model)?,
		EmbeddingSpace::Visual => store.count_visual_embeddings_not_matching(model)?,
	};
	Ok(count)
}

/// Delete embeddings whose model tag differs from `model`; their owners
/// become pending and are picked up by regeneration.
///
/// # Errors
///
/// Propagates store failures.
pub fn invalidate_not_matching(
	store: &dyn MemoryStore,
	space: EmbeddingSpace,
	model: &str,
) -> Result<u64> {
	let deleted = match space {
		EmbeddingSpace::Text => store.delete_embeddings_not_matching(model)?,
		EmbeddingSpace::Visual => store.delete_visual_embeddings_not_matching(model)?,
	};
	info!(space = space.as_str(), model, deleted, "invalidated stale embeddings");
	Ok(deleted)
}

/// Number of owners with no embedding row.
///
/// # Errors
///
/// Propagates store failures.
pub fn pending_count(store: &dyn MemoryStore, space: EmbeddingSpace) -> Result<u64> {
	let count = match space {
		EmbeddingSpace::Text => store.pending_embedding_count()?,
		EmbeddingSpace::Visual => store.pending_visual_embedding_count()?,
	};
	Ok(count)
}

/// Insert or replace one owner's embedding. Dimensionality may change
/// freely between replacements.
///
/// # Errors
///
/// Propagates store failures (including an absent owner).
pub fn store_embedding(
	store: &dyn MemoryStore,
	space: EmbeddingSpace,
	owner_id: &str,
	vector: Vec<f32>,
	model: &str,
) -> Result<()> {
	let record = EmbeddingRecord {
		owner_id: owner_id.to_owned(),
		vector,
		model: model.to_owned(),
	};
	match space {
		EmbeddingSpace::Text => store.put_embedding(&record)?,
		EmbeddingSpace::Visual => store.put_visual_embedding(&record)?,
	}
	Ok(())
}

/// Outcome of one background regeneration batch.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RegenerationReport {
	/// Owners pulled from the pending page
	pub attempted: usize,
	/// Embeddings successfully produced and stored
	pub regenerated: usize,
	/// Owners that failed this round (left pending for the next)
	pub failed: usize,
}

/// Regenerate up to `batch_size` missing embeddings.
///
/// Text owners are embedded by content, visual owners by description.
/// Per-item failures are logged and skipped — a background sweep must
/// never let one bad row stall the queue. The failed owners stay pending
/// and will be retried on a later batch.
///
/// # Errors
///
/// Propagates store failures on the batch fetch itself.
pub fn regenerate_batch(
	store: &dyn MemoryStore,
	space: EmbeddingSpace,
	embedder: &dyn Embedder,
	batch_size: usize,
) -> Result<RegenerationReport> {
	let pending: Vec<(String, String)> = match space {
		EmbeddingSpace::Text => store
			.memories_without_embeddings(batch_size)?
			.into_iter()
			.map(|m| (m.id, m.content))
			.collect(),
		EmbeddingSpace::Visual => store
			.visuals_without_embeddings(batch_size)?
			.into_iter()
			.map(|v| (v.id, v.description))
			.collect(),
	};

	let mut report = RegenerationReport {
		attempted: pending.len(),
		..RegenerationReport::default()
	};

	for (owner_id, text) in pending {
		match embedder.embed(&text) {
			Ok(output) => {
				match store_embedding(store, space, &owner_id, output.vector, &output.model) {
					Ok(()) => report.regenerated += 1,
					Err(error) => {
						warn!(%owner_id, %error, "failed to store regenerated embedding");
						report.failed += 1;
					}
				}
			}
			Err(error) => {
				warn!(%owner_id, %error, "embedding regeneration failed; will retry");
				report.failed += 1;
			}
		}
	}

	if report.attempted > 0 {
		info!(
			space = space.as_str(),
			attempted = report.attempted,
			regenerated = report.regenerated,
			failed = report.failed,
			"regeneration batch complete"
		);
	}

	Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
	use super::*;
	use crate::embedder::fixtures::{FailingEmbedder, StaticEmbedder};
	use crate::model::{make_gist, Memory, MemoryKind, VisualMemory};
	use crate::store::{MemStore, MemoryStore as _};

	fn seed_with_model(store: &MemStore, count: usize, model: &str) {
		for i in 0..count {
			let id = format!("m{i}");
			store
				.put_memory(&Memory {
					id: id.clone(),
					content: format!("memory {i}"),
					gist: make_gist(&format!("memory {i}")),
					kind: MemoryKind::Learning,
					emotional_weight: 0.5,
					tags: Vec::new(),
					project_id: None,
					access_count: 0,
					created_at_ms: 0.0,
				})
				.unwrap();
			store
				.put_embedding(&crate::model::EmbeddingRecord {
					owner_id: id,
					vector: vec![1.0, 0.0],
					model: model.to_owned(),
				})
				.unwrap();
		}
	}

	#[test]
	fn migration_round_trip() {
		let store = MemStore::new();
		seed_with_model(&store, 10, "old");

		let stale = count_not_matching(&store, EmbeddingSpace::Text, "new").unwrap();
		assert_eq!(stale, 10);

		let deleted = invalidate_not_matching(&store, EmbeddingSpace::Text, "new").unwrap();
		assert_eq!(deleted, stale);
		assert_eq!(pending_count(&store, EmbeddingSpace::Text).unwrap(), 10);
		assert_eq!(count_not_matching(&store, EmbeddingSpace::Text, "new").unwrap(), 0);

		// Regenerate in batches of 4: 4 + 4 + 2.
		let embedder = StaticEmbedder::with_default("new", vec![0.0, 1.0, 0.0]);
		let mut regenerated = 0;
		while pending_count(&store, EmbeddingSpace::Text).unwrap() > 0 {
			let report = regenerate_batch(&store, EmbeddingSpace::Text, &embedder, 4).unwrap();
			assert_eq!(report.failed, 0);
			regenerated += report.regenerated;
		}

		assert_eq!(regenerated, 10);
		assert_eq!(count_not_matching(&store, EmbeddingSpace::Text, "new").unwrap(), 0);
		assert_eq!(pending_count(&store, EmbeddingSpace::Text).unwrap(), 0);

		// The replacement changed dimensionality, as migrations may.
		let record = store.embedding("m0").unwrap().unwrap();
		assert_eq!(record.vector.len(), 3);
		assert_eq!(record.model, "new");
	}

	#[test]
	fn spaces_do_not_interfere() {
		let store = MemStore::new();
		seed_with_model(&store, 3, "text-old");
		store
			.put_visual(&VisualMemory {
				id: "v0".into(),
				description: "sunset over the bay".into(),
				emotional_weight: 0.5,
				created_at_ms: 0.0,
			})
			.unwrap();
		store
			.put_visual_embedding(&crate::model::EmbeddingRecord {
				owner_id: "v0".into(),
				vector: vec![0.5, 0.5],
				model: "clip-old".into(),
			})
			.unwrap();

		let deleted = invalidate_not_matching(&store, EmbeddingSpace::Visual, "clip-new").unwrap();
		assert_eq!(deleted, 1);
		assert_eq!(pending_count(&store, EmbeddingSpace::Visual).unwrap(), 1);

		// Text space untouched by the visual migration.
		assert_eq!(pending_count(&store, EmbeddingSpace::Text).unwrap(), 0);
		assert_eq!(
			count_not_matching(&store, EmbeddingSpace::Text, "text-old").unwrap(),
			0
		);
	}

	#[test]
	fn visual_regeneration_embeds_descriptions() {
		let store = MemStore::new();
		store
			.put_visual(&VisualMemory {
				id: "v0".into(),
				description: "a whiteboard diagram".into(),
				emotional_weight: 0.5,
				created_at_ms: 0.0,
			})
			.unwrap();

		let mut embedder = StaticEmbedder::new("clip-new");
		embedder.insert("a whiteboard diagram", vec![1.0, 0.0]);

		let report = regenerate_batch(&store, EmbeddingSpace::Visual, &embedder, 10).unwrap();
		assert_eq!(report.regenerated, 1);
		assert!(store.visual_embedding("v0").unwrap().is_some());
	}

	#[test]
	fn regeneration_failures_are_swallowed_and_retried_later() {
		let store = MemStore::new();
		seed_with_model(&store, 2, "old");
		let _ = invalidate_not_matching(&store, EmbeddingSpace::Text, "new").unwrap();

		let report = regenerate_batch(&store, EmbeddingSpace::Text, &FailingEmbedder, 10).unwrap();
		assert_eq!(report.attempted, 2);
		assert_eq!(report.failed, 2);
		assert_eq!(report.regenerated, 0);

		// Still pending: nothing was lost.
		assert_eq!(pending_count(&store, EmbeddingSpace::Text).unwrap(), 2);
	}
}
