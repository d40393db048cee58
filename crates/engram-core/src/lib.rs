//! # Engram Core
//!
//! A cognitive retrieval engine for an assistant's long-term memory.
//! Given a probe and a store of previously encoded items, it returns the
//! memories most likely to be *useful* — not merely most similar.
//!
//! ## Why cognitive ranking?
//!
//! Nearest-neighbor search treats memory as a database. Human memory
//! doesn't work that way: what surfaces depends on how often and how
//! recently you've used a memory, what it's associated with, and how much
//! it mattered — not just how well it matches the cue. This engine blends
//! four signals from the cognitive-science literature:
//!
//! 1. **Probe similarity with MINERVA 2 emphasis** — `A(i) = S(i)³`,
//!    so strong matches dominate and weak ones fade
//! 2. **ACT-R base-level activation** — `B(m) = ln[Σ Δt_k^(-d)]`,
//!    recency and frequency from the access history
//! 3. **Spreading activation** — one hop through the association graph,
//!    normalized by node fan
//! 4. **Emotional salience** — a multiplier on the probe term
//!
//! Retrieval is reinforcing: returned memories are themselves accessed,
//! which raises their future base-level activation.
//!
//! Alongside ranking, the crate maintains **location memory** (asymptotic
//! path familiarity with passive decay, activity binding, and co-access
//! associations) and **embedding lifecycle** bookkeeping (bulk
//! invalidation and lazy regeneration when the active embedding model
//! changes).
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use engram_core::lifecycle::EmbeddingSpace;
//! use engram_core::{Engine, MemStore, Probe, QueryInput, StoreMemoryInput};
//!
//! # fn main() -> engram_core::Result<()> {
//! let engine = Engine::with_store(Arc::new(MemStore::new()));
//!
//! let learned = engine.store_memory(
//! 	StoreMemoryInput {
//! 		content: "The scheduler deadlocks when the queue drains".into(),
//! 		..StoreMemoryInput::default()
//! 	},
//! 	1_000.0,
//! )?;
//!
//! // No embedder is wired here, so attach a vector by hand; hosts
//! // normally configure an `Embedder` and this happens at store time.
//! engine.store_embedding(EmbeddingSpace::Text, &learned.id, vec![1.0, 0.0, 0.0], "fixture")?;
//!
//! let outcome = engine.query(&QueryInput::new(Probe::Vector(&[1.0, 0.0, 0.0])), 2_000.0)?;
//! assert_eq!(outcome.results[0].memory.id, learned.id);
//! # Ok(())
//! # }
//! ```
//!
//! ## Design constraints
//!
//! - All state lives in the backing store ([`store::MemoryStore`]); the
//!   engine itself is stateless and freely shared across threads.
//! - No clock access: every operation takes `now_ms`, so identical
//!   inputs always produce identical rankings (replayable by tests).
//! - The embedding provider is external ([`embedder::Embedder`]); its
//!   failures degrade retrieval to recency ranking instead of erroring.
//! - Background work (decay sweeps, embedding regeneration) is plain
//!   methods the host schedules; errors there are logged, never raised.
//!
//! ## References
//!
//! - Anderson, J. R. (1983). *The Architecture of Cognition* — ACT-R
//! - Hintzman, D. L. (1988). *MINERVA 2: A simulation model of human
//!   memory*
//! - O'Keefe, J. & Nadel, L. (1978). *The Hippocampus as a Cognitive
//!   Map* — place cells and familiarity

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::needless_return)]

pub mod activation;
pub mod embedder;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod location;
pub mod model;
pub mod retrieval;
pub mod spreading;
pub mod store;
pub mod vector;

pub use activation::{base_level, retrieval_probability, ActivationConfig};
pub use embedder::{EmbedOutput, Embedder, EmbedderError};
pub use engine::{
	Engine, EngineConfig, QueryInput, RecordLocationInput, StoreMemoryInput, StoreVisualInput,
};
pub use error::{EngramError, Result};
pub use model::{Association, Location, Memory, MemoryKind, Project, VisualMemory};
pub use retrieval::{
	AssembledContext, ContextConfig, Probe, RankingMode, RetrievalConfig, RetrievalOutcome,
	RetrievedMemory,
};
pub use store::{MemStore, MemoryFilter, MemoryStore, StoreError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use super::*;

	#[test]
	fn crate_level_round_trip() {
		let engine = Engine::with_store(Arc::new(MemStore::new()));
		let memory = engine
			.store_memory(
				StoreMemoryInput {
					content: "remember this".into(),
					..StoreMemoryInput::default()
				},
				1_000.0,
			)
			.expect("store");

		let loaded = engine.get_memory(&memory.id).expect("get").expect("present");
		assert_eq!(loaded.content, "remember this");

		assert!(engine.forget(&memory.id).expect("forget"));
		assert!(engine.get_memory(&memory.id).expect("get").is_none());
	}
}
