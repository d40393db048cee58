//! Basic Memory Retrieval Example
//!
//! Demonstrates the engine end to end:
//! 1. Store a few memories
//! 2. Attach embeddings (standing in for a real `Embedder`)
//! 3. Query with a probe and inspect the cognitive ranking
//!
//! Run with: `cargo run --example basic_retrieval`

use std::sync::Arc;

use engram_core::lifecycle::EmbeddingSpace;
use engram_core::{Engine, MemStore, MemoryKind, Probe, QueryInput, StoreMemoryInput};

fn main() -> engram_core::Result<()> {
	let engine = Engine::with_store(Arc::new(MemStore::new()));

	const HOUR_MS: f64 = 3_600_000.0;
	const DAY_MS: f64 = 86_400_000.0;
	let now = 100.0 * DAY_MS;

	// Three memories about different topics, stored at different times.
	// In practice the vectors come from an embedding model; here they are
	// hand-picked so the geometry is easy to read.
	let entries: [(&str, MemoryKind, Vec<f32>, f64); 3] = [
		(
			"The flaky websocket test fails when the proxy buffers frames",
			MemoryKind::Bug,
			vec![1.0, 0.1, 0.0],
			now - HOUR_MS, // seen an hour ago
		),
		(
			"Decided to pin the tokio version until the scheduler fix lands",
			MemoryKind::Decision,
			vec![0.2, 1.0, 0.1],
			now - 2.0 * DAY_MS,
		),
		(
			"The proxy strips the upgrade header on retries",
			MemoryKind::Learning,
			vec![0.9, 0.3, 0.1],
			now - 20.0 * DAY_MS, // old, but relevant
		),
	];

	let mut ids = Vec::new();
	for (content, kind, vector, stored_at) in entries {
		let memory = engine.store_memory(
			StoreMemoryInput {
				content: content.into(),
				kind,
				..StoreMemoryInput::default()
			},
			stored_at,
		)?;
		engine.store_embedding(EmbeddingSpace::Text, &memory.id, vector, "example")?;
		ids.push(memory.id);
	}

	// Link the bug and the old learning: they came up together.
	let _ = engine.associate(&ids[0], &ids[2], 0.8, "semantic", now - HOUR_MS)?;

	// Probe: something websocket/proxy shaped.
	let probe = [0.95_f32, 0.2, 0.05];
	let outcome = engine.query(&QueryInput::new(Probe::Vector(&probe)), now)?;

	println!("=== Cognitive ranking ({:?}) ===\n", outcome.mode);
	for (rank, item) in outcome.results.iter().enumerate() {
		println!(
			"{}. [{}] {}",
			rank + 1,
			item.memory.kind,
			item.memory.gist
		);
		println!(
			"   sim {:.3} | probe {:.3} | base {:.3} | spread {:.3} | score {:.3} | p {:.3}",
			item.similarity,
			item.probe_activation,
			item.base_level,
			item.spreading,
			item.score,
			item.probability
		);
	}

	Ok(())
}
