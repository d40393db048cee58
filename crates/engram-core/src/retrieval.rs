//! Retrieval Pipeline
//!
//! The complete ranking pass, blending four signals:
//!
//! 1. Probe similarity with MINERVA 2 emphasis: `sim³`
//! 2. ACT-R base-level activation from the access history
//! 3. One-hop spreading activation through the association graph
//! 4. Emotional salience, as a multiplier on the probe term
//!
//! `score = w_p · probe + w_b · base + w_s · spread`
//!
//! The logistic retrieval probability gates candidates; the score ranks
//! them. Returned items are reinforced: retrieval is itself an access,
//! stamped with the single `now` captured at call entry. Nothing else is
//! written — ranking is stateless beyond that append.
//!
//! When the probe can't be embedded (no provider, provider failure, past
//! deadline) the pipeline degrades to pure base-level ranking instead of
//! failing; a missing candidate embedding just skips that candidate.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::activation::{base_level, retrieval_probability};
use crate::embedder::Embedder;
use crate::error::{EngramError, Result};
use crate::model::{Memory, MemoryKind};
use crate::spreading::{neighbor_ids, spread};
use crate::store::{MemoryFilter, MemoryStore};
use crate::vector::{cosine, ensure_unit, nonlinear_activation};

/// Unit-norm tolerance applied in strict mode.
const STRICT_UNIT_TOLERANCE: f64 = 1e-3;

/// Configuration for retrieval.
///
/// The three weights are used exactly as given — they conventionally sum
/// to 1 but are never normalized, since hosts tune them independently.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetrievalConfig {
	/// Maximum results to return
	pub max_results: usize,
	/// Minimum retrieval probability to include
	pub min_probability: f64,
	/// `d`, base-level decay exponent
	pub decay: f64,
	/// `s`, logistic noise parameter
	pub noise: f64,
	/// `τ`, logistic threshold
	pub threshold: f64,
	/// Weight of the (emphasized) probe similarity
	pub probe_weight: f64,
	/// Weight of base-level activation
	pub base_level_weight: f64,
	/// Weight of spreading activation
	pub spreading_weight: f64,
	/// Reject non-unit caller-supplied probe vectors
	pub strict: bool,
}

impl Default for RetrievalConfig {
	fn default() -> Self {
		Self {
			max_results: 10,
			min_probability: 0.1,
			decay: 0.5,
			noise: 0.25,
			threshold: 0.0,
			probe_weight: 0.4,
			base_level_weight: 0.3,
			spreading_weight: 0.3,
			strict: false,
		}
	}
}

/// What to search with: raw text (embedded on the fly) or a vector the
/// host already has.
#[derive(Debug, Clone, Copy)]
pub enum Probe<'a> {
	/// Natural-language probe, embedded via the configured provider
	Text(&'a str),
	/// Pre-computed probe vector
	Vector(&'a [f32]),
}

/// A retrieval request: the probe plus scope filters.
#[derive(Debug, Clone)]
pub struct RetrievalRequest<'a> {
	/// What to search with
	pub probe: Probe<'a>,
	/// Restrict to one memory kind
	pub kind: Option<MemoryKind>,
	/// Restrict to one project scope (by id)
	pub project_id: Option<String>,
	/// Absolute deadline (ms); past it, embedding is skipped entirely
	pub deadline_ms: Option<f64>,
}

impl<'a> RetrievalRequest<'a> {
	/// Unfiltered request for a probe.
	#[must_use]
	pub const fn new(probe: Probe<'a>) -> Self {
		Self {
			probe,
			kind: None,
			project_id: None,
			deadline_ms: None,
		}
	}
}

/// How the ranking was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RankingMode {
	/// Full cognitive blend of similarity, recency, and association
	Cognitive,
	/// Probe embedding was unavailable; ranked by base level alone
	RecencyFallback,
}

/// A ranked memory with its score breakdown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedMemory {
	/// The memory, as read at call time (reinforcement not reflected)
	pub memory: Memory,
	/// Raw cosine similarity to the probe (0 in fallback mode)
	pub similarity: f64,
	/// Cubed similarity after emotional modulation
	pub probe_activation: f64,
	/// Base-level activation from the access history
	pub base_level: f64,
	/// One-hop spreading activation
	pub spreading: f64,
	/// Blended score used for ranking
	pub score: f64,
	/// Logistic retrieval probability of the score
	pub probability: f64,
	/// Estimated retrieval latency, `1000·e^(-score)` ms
	pub latency_ms: f64,
	/// Most recent access before this call (tie-break key)
	pub last_accessed_ms: f64,
}

/// Result of one retrieval call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalOutcome {
	/// Ranked results, best first
	pub results: Vec<RetrievedMemory>,
	/// How the ranking was produced
	pub mode: RankingMode,
}

fn validate_weights(config: &RetrievalConfig) -> Result<()> {
	for (name, weight) in [
		("probe_weight", config.probe_weight),
		("base_level_weight", config.base_level_weight),
		("spreading_weight", config.spreading_weight),
	] {
		if !weight.is_finite() || weight < 0.0 {
			return Err(EngramError::Invariant(format!(
				"{name} must be a non-negative finite number, got {weight}"
			)));
		}
	}
	Ok(())
}

/// Resolve the probe to a vector, or `None` to fall back to base-level
/// ranking. Only strict-mode violations on caller-supplied vectors are
/// hard errors.
fn resolve_probe(
	request: &RetrievalRequest<'_>,
	embedder: Option<&dyn Embedder>,
	config: &RetrievalConfig,
	now_ms: f64,
) -> Result<Option<Vec<f32>>> {
	match request.probe {
		Probe::Vector(v) => {
			if config.strict {
				ensure_unit(v, STRICT_UNIT_TOLERANCE)?;
			}
			Ok(Some(v.to_vec()))
		}
		Probe::Text(text) => {
			let Some(embedder) = embedder else {
				debug!("no embedder configured; ranking by base level");
				return Ok(None);
			};
			if let Some(deadline) = request.deadline_ms {
				if now_ms >= deadline {
					debug!("deadline already passed; ranking by base level");
					return Ok(None);
				}
			}
			match embedder.embed_with_deadline(text, request.deadline_ms) {
				Ok(output) => Ok(Some(output.vector)),
				Err(error) => {
					debug!(%error, "probe embedding failed; ranking by base level");
					Ok(None)
				}
			}
		}
	}
}

/// Run the full retrieval pipeline.
///
/// Deterministic for a fixed store snapshot, configuration, probe, and
/// `now_ms`: ties break on most recent access, then id.
///
/// # Errors
///
/// Fails on store errors, malformed weights, or (strict mode) a non-unit
/// probe vector. Provider failures are not errors here — they downgrade
/// to the recency fallback.
pub fn retrieve(
	store: &dyn MemoryStore,
	embedder: Option<&dyn Embedder>,
	request: &RetrievalRequest<'_>,
	config: &RetrievalConfig,
	now_ms: f64,
) -> Result<RetrievalOutcome> {
	validate_weights(config)?;

	let probe_vec = resolve_probe(request, embedder, config, now_ms)?;
	let mode = if probe_vec.is_some() {
		RankingMode::Cognitive
	} else {
		RankingMode::RecencyFallback
	};

	let filter = MemoryFilter {
		kind: request.kind,
		project_id: request.project_id.clone(),
	};
	let candidates = store.memories(&filter)?;
	if candidates.is_empty() {
		return Ok(RetrievalOutcome {
			results: Vec::new(),
			mode,
		});
	}

	let ids: Vec<String> = candidates.iter().map(|m| m.id.clone()).collect();
	let candidate_embeddings = match &probe_vec {
		Some(_) => store.embeddings(&ids)?,
		None => HashMap::new(),
	};

	let mut scored: Vec<RetrievedMemory> = Vec::with_capacity(candidates.len());

	for memory in candidates {
		let history = store.access_history(&memory.id)?;
		let last_accessed_ms = history.iter().copied().fold(f64::NEG_INFINITY, f64::max);
		let base = base_level(&history, now_ms, config.decay);

		let (similarity, probe_activation, spreading) = match &probe_vec {
			None => (0.0, 0.0, 0.0),
			Some(probe) => {
				let Some(record) = candidate_embeddings.get(&memory.id) else {
					debug!(memory_id = %memory.id, "candidate has no embedding; skipped");
					continue;
				};
				let similarity = match cosine(probe, &record.vector) {
					Ok(sim) => sim,
					Err(error) => {
						debug!(memory_id = %memory.id, %error, "stale embedding dimensionality; skipped");
						continue;
					}
				};

				let emotional_multiplier = 1.0 + (memory.emotional_weight - 0.5);
				let probe_activation = nonlinear_activation(similarity) * emotional_multiplier;

				let edges = store.associations_touching(&memory.id)?;
				let spreading = if edges.is_empty() {
					0.0
				} else {
					let neighbors: Vec<String> = neighbor_ids(&memory.id, &edges)
						.iter()
						.map(|id| (*id).to_owned())
						.collect();
					let neighbor_embeddings = store.embeddings(&neighbors)?;
					spread(&memory.id, &edges, probe, &neighbor_embeddings)
				};

				(similarity, probe_activation, spreading)
			}
		};

		let score = match mode {
			RankingMode::Cognitive => {
				config.probe_weight.mul_add(
					probe_activation,
					config
						.base_level_weight
						.mul_add(base, config.spreading_weight * spreading),
				)
			}
			RankingMode::RecencyFallback => base,
		};

		let probability = retrieval_probability(score, config.threshold, config.noise);

		// The probability gate applies only to the cognitive blend; the
		// fallback promises best-effort recency ranking, not confidence.
		if mode == RankingMode::Cognitive && probability < config.min_probability {
			continue;
		}

		scored.push(RetrievedMemory {
			memory,
			similarity,
			probe_activation,
			base_level: base,
			spreading,
			score,
			probability,
			latency_ms: 1000.0 * (-score).exp(),
			last_accessed_ms,
		});
	}

	scored.sort_by(|a, b| {
		b.score
			.total_cmp(&a.score)
			.then_with(|| b.last_accessed_ms.total_cmp(&a.last_accessed_ms))
			.then_with(|| a.memory.id.cmp(&b.memory.id))
	});
	scored.truncate(config.max_results);

	// Retrieval reinforcement: every returned item is accessed, all with
	// the same timestamp. Items filtered out above are not reinforced.
	for item in &scored {
		store.append_access(&item.memory.id, now_ms)?;
	}

	Ok(RetrievalOutcome {
		results: scored,
		mode,
	})
}

// ============================================================================
// Context assembly
// ============================================================================

/// Configuration for task-context assembly.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContextConfig {
	/// Candidates to pull from retrieval
	pub max_candidates: usize,
	/// Raw-similarity floor (ignored in fallback mode)
	pub min_similarity: f64,
	/// Token budget for included gists
	pub token_budget: usize,
	/// Rough chars-per-token estimate
	pub chars_per_token: usize,
}

impl Default for ContextConfig {
	fn default() -> Self {
		Self {
			max_candidates: 10,
			min_similarity: 0.3,
			token_budget: 300,
			chars_per_token: 4,
		}
	}
}

/// Memories selected for a task context, within budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledContext {
	/// Selected memories, ranked
	pub memories: Vec<RetrievedMemory>,
	/// Estimated tokens consumed by the selected gists
	pub token_estimate: usize,
	/// One-line summary, e.g. `"3 memories, ~120 tokens"`
	pub summary: String,
}

fn estimate_tokens(text: &str, chars_per_token: usize) -> usize {
	text.chars().count().div_ceil(chars_per_token.max(1))
}

/// Assemble a task context: retrieve, floor on raw similarity, then take
/// the longest ranked prefix of gists that fits the token budget.
///
/// # Errors
///
/// Propagates retrieval errors.
pub fn assemble_context(
	store: &dyn MemoryStore,
	embedder: Option<&dyn Embedder>,
	request: &RetrievalRequest<'_>,
	retrieval: &RetrievalConfig,
	context: &ContextConfig,
	now_ms: f64,
) -> Result<AssembledContext> {
	let mut config = retrieval.clone();
	config.max_results = context.max_candidates;

	let outcome = retrieve(store, embedder, request, &config, now_ms)?;

	let mut selected = Vec::new();
	let mut used_tokens = 0_usize;

	for item in outcome.results {
		if outcome.mode == RankingMode::Cognitive && item.similarity < context.min_similarity {
			continue;
		}
		let cost = estimate_tokens(&item.memory.gist, context.chars_per_token);
		if used_tokens + cost > context.token_budget {
			break;
		}
		used_tokens += cost;
		selected.push(item);
	}

	let summary = format!("{} memories, ~{} tokens", selected.len(), used_tokens);
	debug!(%summary, "assembled context");

	Ok(AssembledContext {
		memories: selected,
		token_estimate: used_tokens,
		summary,
	})
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
	use super::*;
	use crate::embedder::fixtures::{FailingEmbedder, StaticEmbedder};
	use crate::model::{make_gist, Association, EmbeddingRecord};
	use crate::store::MemStore;

	const HOUR_MS: f64 = 3_600_000.0;
	const DAY_MS: f64 = 86_400_000.0;

	fn seed(
		store: &MemStore,
		id: &str,
		content: &str,
		vector: Option<Vec<f32>>,
		accesses: &[f64],
	) {
		let memory = Memory {
			id: id.to_owned(),
			content: content.to_owned(),
			gist: make_gist(content),
			kind: MemoryKind::Learning,
			emotional_weight: 0.5,
			tags: Vec::new(),
			project_id: None,
			access_count: 0,
			created_at_ms: accesses.first().copied().unwrap_or(0.0),
		};
		use crate::store::MemoryStore as _;
		store.put_memory(&memory).unwrap();
		for &ts in accesses {
			store.append_access(id, ts).unwrap();
		}
		if let Some(vector) = vector {
			store
				.put_embedding(&EmbeddingRecord {
					owner_id: id.to_owned(),
					vector,
					model: "test-model".into(),
				})
				.unwrap();
		}
	}

	fn open_config() -> RetrievalConfig {
		RetrievalConfig {
			min_probability: 0.0,
			..RetrievalConfig::default()
		}
	}

	fn ranked_ids(outcome: &RetrievalOutcome) -> Vec<&str> {
		outcome.results.iter().map(|r| r.memory.id.as_str()).collect()
	}

	#[test]
	fn empty_store_yields_empty_result() {
		let store = MemStore::new();
		let request = RetrievalRequest::new(Probe::Vector(&[1.0, 0.0]));
		let outcome = retrieve(&store, None, &request, &RetrievalConfig::default(), 1_000.0).unwrap();
		assert!(outcome.results.is_empty());
	}

	#[test]
	fn similarity_orders_equal_recency() {
		let store = MemStore::new();
		let now = 10.0 * DAY_MS;
		seed(&store, "hit", "about rust", Some(vec![1.0, 0.0]), &[now - HOUR_MS]);
		seed(&store, "miss", "about tea", Some(vec![0.0, 1.0]), &[now - HOUR_MS]);

		let request = RetrievalRequest::new(Probe::Vector(&[1.0, 0.0]));
		let outcome = retrieve(&store, None, &request, &open_config(), now).unwrap();

		assert_eq!(outcome.mode, RankingMode::Cognitive);
		assert_eq!(ranked_ids(&outcome), vec!["hit", "miss"]);
	}

	#[test]
	fn text_probe_without_embedder_falls_back_to_recency() {
		let store = MemStore::new();
		let now = 10.0 * DAY_MS;
		seed(&store, "old", "x", Some(vec![1.0, 0.0]), &[now - 5.0 * DAY_MS]);
		seed(&store, "new", "y", Some(vec![0.0, 1.0]), &[now - HOUR_MS]);

		let request = RetrievalRequest::new(Probe::Text("anything"));
		let outcome = retrieve(&store, None, &request, &open_config(), now).unwrap();

		assert_eq!(outcome.mode, RankingMode::RecencyFallback);
		assert_eq!(ranked_ids(&outcome), vec!["new", "old"]);
	}

	#[test]
	fn failing_embedder_falls_back_instead_of_erroring() {
		let store = MemStore::new();
		let now = 10.0 * DAY_MS;
		seed(&store, "a", "x", None, &[now - HOUR_MS]);

		let request = RetrievalRequest::new(Probe::Text("anything"));
		let outcome =
			retrieve(&store, Some(&FailingEmbedder), &request, &open_config(), now).unwrap();

		assert_eq!(outcome.mode, RankingMode::RecencyFallback);
		assert_eq!(ranked_ids(&outcome), vec!["a"]);
	}

	#[test]
	fn expired_deadline_skips_the_embedder() {
		let store = MemStore::new();
		let now = 10.0 * DAY_MS;
		seed(&store, "a", "x", Some(vec![1.0, 0.0]), &[now - HOUR_MS]);

		// This embedder would succeed, but the deadline forbids calling it.
		let embedder = StaticEmbedder::with_default("test-model", vec![1.0, 0.0]);
		let request = RetrievalRequest {
			deadline_ms: Some(now - 1.0),
			..RetrievalRequest::new(Probe::Text("anything"))
		};
		let outcome = retrieve(&store, Some(&embedder), &request, &open_config(), now).unwrap();

		assert_eq!(outcome.mode, RankingMode::RecencyFallback);
	}

	#[test]
	fn candidates_without_embeddings_are_skipped_in_similarity_mode() {
		let store = MemStore::new();
		let now = 10.0 * DAY_MS;
		seed(&store, "with", "x", Some(vec![1.0, 0.0]), &[now - HOUR_MS]);
		seed(&store, "without", "y", None, &[now - HOUR_MS]);

		let request = RetrievalRequest::new(Probe::Vector(&[1.0, 0.0]));
		let outcome = retrieve(&store, None, &request, &open_config(), now).unwrap();

		assert_eq!(ranked_ids(&outcome), vec!["with"]);
	}

	#[test]
	fn probability_gate_filters_weak_candidates() {
		let store = MemStore::new();
		let now = 100.0 * DAY_MS;
		// Orthogonal and a month stale: strongly negative score.
		seed(&store, "weak", "x", Some(vec![0.0, 1.0]), &[now - 30.0 * DAY_MS]);

		let request = RetrievalRequest::new(Probe::Vector(&[1.0, 0.0]));
		let outcome =
			retrieve(&store, None, &request, &RetrievalConfig::default(), now).unwrap();
		assert!(outcome.results.is_empty());

		// Filtered-out candidates are not reinforced.
		use crate::store::MemoryStore as _;
		assert_eq!(store.access_history("weak").unwrap().len(), 1);
	}

	#[test]
	fn returned_items_share_one_access_timestamp() {
		let store = MemStore::new();
		let now = 10.0 * DAY_MS;
		seed(&store, "a", "x", Some(vec![1.0, 0.0]), &[now - HOUR_MS]);
		seed(&store, "b", "y", Some(vec![0.9, 0.1]), &[now - HOUR_MS]);

		let request = RetrievalRequest::new(Probe::Vector(&[1.0, 0.0]));
		let outcome = retrieve(&store, None, &request, &open_config(), now).unwrap();
		assert_eq!(outcome.results.len(), 2);

		use crate::store::MemoryStore as _;
		for id in ["a", "b"] {
			let history = store.access_history(id).unwrap();
			assert_eq!(history.len(), 2);
			assert_eq!(history[1], now);
		}
	}

	#[test]
	fn truncation_spares_unreturned_items_from_reinforcement() {
		let store = MemStore::new();
		let now = 10.0 * DAY_MS;
		seed(&store, "first", "x", Some(vec![1.0, 0.0]), &[now - HOUR_MS]);
		seed(&store, "second", "y", Some(vec![0.5, 0.5]), &[now - HOUR_MS]);

		let config = RetrievalConfig {
			max_results: 1,
			..open_config()
		};
		let request = RetrievalRequest::new(Probe::Vector(&[1.0, 0.0]));
		let outcome = retrieve(&store, None, &request, &config, now).unwrap();
		assert_eq!(ranked_ids(&outcome), vec!["first"]);

		use crate::store::MemoryStore as _;
		assert_eq!(store.access_history("first").unwrap().len(), 2);
		assert_eq!(store.access_history("second").unwrap().len(), 1);
	}

	#[test]
	fn ranking_is_deterministic_across_identical_snapshots() {
		let build = || {
			let store = MemStore::new();
			let now = 10.0 * DAY_MS;
			for (id, vector) in [
				("m1", vec![0.8_f32, 0.6]),
				("m2", vec![0.6_f32, 0.8]),
				("m3", vec![1.0_f32, 0.0]),
			] {
				seed(&store, id, "content", Some(vector), &[now - HOUR_MS]);
			}
			(store, now)
		};

		let (store_a, now) = build();
		let (store_b, _) = build();
		let request = RetrievalRequest::new(Probe::Vector(&[1.0, 0.0]));

		let a = retrieve(&store_a, None, &request, &open_config(), now).unwrap();
		let b = retrieve(&store_b, None, &request, &open_config(), now).unwrap();

		assert_eq!(ranked_ids(&a), ranked_ids(&b));
		for (ra, rb) in a.results.iter().zip(b.results.iter()) {
			assert_eq!(ra.score, rb.score);
			assert_eq!(ra.probability, rb.probability);
		}
	}

	#[test]
	fn exact_ties_break_by_id() {
		let store = MemStore::new();
		let now = 10.0 * DAY_MS;
		let ts = now - HOUR_MS;
		seed(&store, "b", "x", Some(vec![1.0, 0.0]), &[ts]);
		seed(&store, "a", "x", Some(vec![1.0, 0.0]), &[ts]);

		let request = RetrievalRequest::new(Probe::Vector(&[1.0, 0.0]));
		let outcome = retrieve(&store, None, &request, &open_config(), now).unwrap();
		assert_eq!(ranked_ids(&outcome), vec!["a", "b"]);
	}

	#[test]
	fn emotional_weight_modulates_the_probe_term() {
		let store = MemStore::new();
		let now = 10.0 * DAY_MS;
		let ts = now - HOUR_MS;
		seed(&store, "charged", "x", Some(vec![1.0, 0.0]), &[ts]);
		seed(&store, "flat", "x", Some(vec![1.0, 0.0]), &[ts]);

		use crate::store::MemoryStore as _;
		let mut charged = store.memory("charged").unwrap().unwrap();
		charged.emotional_weight = 1.0;
		store.put_memory(&charged).unwrap();

		let request = RetrievalRequest::new(Probe::Vector(&[1.0, 0.0]));
		let outcome = retrieve(&store, None, &request, &open_config(), now).unwrap();

		assert_eq!(ranked_ids(&outcome), vec!["charged", "flat"]);
		assert!(outcome.results[0].probe_activation > outcome.results[1].probe_activation);
	}

	#[test]
	fn negative_weights_are_rejected() {
		let store = MemStore::new();
		let config = RetrievalConfig {
			probe_weight: -0.1,
			..RetrievalConfig::default()
		};
		let request = RetrievalRequest::new(Probe::Vector(&[1.0, 0.0]));
		assert!(matches!(
			retrieve(&store, None, &request, &config, 0.0),
			Err(EngramError::Invariant(_))
		));
	}

	#[test]
	fn strict_mode_rejects_non_unit_probe() {
		let store = MemStore::new();
		let config = RetrievalConfig {
			strict: true,
			..RetrievalConfig::default()
		};
		let request = RetrievalRequest::new(Probe::Vector(&[3.0, 4.0]));
		assert!(matches!(
			retrieve(&store, None, &request, &config, 0.0),
			Err(EngramError::Invariant(_))
		));
	}

	#[test]
	fn spreading_lifts_associated_memories() {
		let store = MemStore::new();
		let now = 10.0 * DAY_MS;
		let ts = now - HOUR_MS;
		seed(&store, "m0", "anchor", Some(vec![1.0, 0.0]), &[ts]);
		seed(&store, "m1", "associate", Some(vec![0.3, 0.954]), &[ts]);
		seed(&store, "m2", "slightly closer", Some(vec![0.35, 0.937]), &[ts]);

		use crate::store::MemoryStore as _;
		store
			.upsert_association(&Association {
				source_id: "m0".into(),
				target_id: "m1".into(),
				strength: 0.9,
				kind: "semantic".into(),
				last_reinforced_ms: ts,
			})
			.unwrap();

		let request = RetrievalRequest::new(Probe::Vector(&[1.0, 0.0]));
		let outcome = retrieve(&store, None, &request, &open_config(), now).unwrap();

		// m1's link to the perfect match outweighs m2's small similarity edge.
		assert_eq!(ranked_ids(&outcome), vec!["m0", "m1", "m2"]);
	}

	#[test]
	fn context_respects_similarity_floor_and_budget() {
		let store = MemStore::new();
		let now = 10.0 * DAY_MS;
		let ts = now - HOUR_MS;
		let long_gist = "w".repeat(600); // ~150 tokens at 4 chars/token
		seed(&store, "m1", &long_gist, Some(vec![1.0, 0.0]), &[ts]);
		seed(&store, "m2", &long_gist, Some(vec![0.9, 0.436]), &[ts]);
		seed(&store, "m3", &long_gist, Some(vec![0.8, 0.6]), &[ts]);
		seed(&store, "far", &long_gist, Some(vec![0.0, 1.0]), &[ts]);

		let request = RetrievalRequest::new(Probe::Vector(&[1.0, 0.0]));
		// Gists cap at 150 chars ⇒ 38 tokens each; a budget of 80 fits two.
		let config = ContextConfig {
			token_budget: 80,
			..ContextConfig::default()
		};
		let context =
			assemble_context(&store, None, &request, &open_config(), &config, now).unwrap();

		// Two gists fit the budget; the orthogonal memory is dropped by
		// the similarity floor regardless of budget.
		assert_eq!(context.memories.len(), 2);
		assert_eq!(context.token_estimate, 76);
		assert_eq!(context.summary, "2 memories, ~76 tokens");
		assert!(context.memories.iter().all(|m| m.similarity >= 0.3));
	}

	#[test]
	fn context_in_fallback_mode_skips_similarity_floor() {
		let store = MemStore::new();
		let now = 10.0 * DAY_MS;
		seed(&store, "a", "short gist", None, &[now - HOUR_MS]);

		let request = RetrievalRequest::new(Probe::Text("anything"));
		let context = assemble_context(
			&store,
			None,
			&request,
			&open_config(),
			&ContextConfig::default(),
			now,
		)
		.unwrap();

		assert_eq!(context.memories.len(), 1);
	}
}
