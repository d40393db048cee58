//! Spreading Kernel
//!
//! Memories don't exist in isolation: a probe that activates one memory
//! leaks activation into its associates. For a memory m with incident
//! edge set E:
//!
//! `S(m) = (1/|E|) · Σ strength(e) · max(0, cos(probe, emb(other(e))))`
//!
//! `|E|` counts every incident edge in either direction — the ACT-R fan
//! effect: the more associates a memory has, the less each one
//! contributes. Edges whose far endpoint has no usable embedding still
//! count in the fan; they just contribute nothing.
//!
//! Spreading is deliberately one hop. Multi-hop spread over-retrieves and
//! costs a graph walk per candidate; a two-hop neighbor contributes
//! exactly zero here.

use std::collections::HashMap;

use smallvec::SmallVec;

use crate::model::{Association, EmbeddingRecord};
use crate::vector::cosine;

/// Ids of the far endpoints of every edge touching `memory_id`.
///
/// Self-loops are dropped; duplicates are preserved (each edge spreads
/// independently).
#[must_use]
pub fn neighbor_ids<'a>(memory_id: &str, edges: &'a [Association]) -> SmallVec<[&'a str; 8]> {
	edges
		.iter()
		.filter(|e| e.source_id != e.target_id)
		.filter_map(|e| {
			if e.source_id == memory_id {
				Some(e.target_id.as_str())
			} else if e.target_id == memory_id {
				Some(e.source_id.as_str())
			} else {
				None
			}
		})
		.collect()
}

/// One-hop spreading activation from `memory_id`'s associates toward the
/// probe.
///
/// `edges` holds every association touching the memory (both directions);
/// `embeddings` maps neighbor ids to their stored vectors. Neighbors
/// missing from the map, or whose vectors don't match the probe's
/// dimension, contribute zero but still widen the fan.
///
/// Cost is O(deg(m) · D) for embedding dimension D.
#[must_use]
pub fn spread(
	memory_id: &str,
	edges: &[Association],
	probe: &[f32],
	embeddings: &HashMap<String, EmbeddingRecord>,
) -> f64 {
	let mut fan = 0_u32;
	let mut sum = 0.0_f64;

	for edge in edges {
		if edge.source_id == edge.target_id {
			continue;
		}
		let other = if edge.source_id == memory_id {
			&edge.target_id
		} else if edge.target_id == memory_id {
			&edge.source_id
		} else {
			continue;
		};

		fan += 1;

		if let Some(record) = embeddings.get(other) {
			if let Ok(sim) = cosine(probe, &record.vector) {
				sum += edge.strength * sim.max(0.0);
			}
		}
	}

	if fan == 0 {
		0.0
	} else {
		sum / f64::from(fan)
	}
}
