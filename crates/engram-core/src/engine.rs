//! Engine
//!
//! The host-facing facade: a [`MemoryStore`] plus an optional
//! [`Embedder`], wired through the kernels into the text-memory,
//! location-memory, visual, and lifecycle APIs.
//!
//! The engine holds no mutable state of its own — everything lives in the
//! store, so an `Engine` is cheap to share across threads. It also never
//! reads a clock: every operation takes `now_ms`, which keeps ranking
//! replay-deterministic and leaves background cadences to the host (the
//! intervals in [`EngineConfig`] are hints for the host's scheduler, not
//! timers the engine runs).

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::embedder::Embedder;
use crate::error::{EngramError, Result};
use crate::lifecycle::{self, EmbeddingSpace, RegenerationReport};
use crate::location::{
	self, ActivityInference, ActivityType, LocationConfig,
};
use crate::model::{
	make_gist, new_id, Association, Location, LocationAccess, LocationAssociation, Memory,
	MemoryKind, Project, VisualMemory,
};
use crate::retrieval::{
	assemble_context, retrieve, AssembledContext, ContextConfig, Probe, RetrievalConfig,
	RetrievalOutcome, RetrievalRequest,
};
use crate::store::MemoryStore;

// ============================================================================
// Configuration
// ============================================================================

/// Engine-wide configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
	/// Retrieval pipeline tunables
	pub retrieval: RetrievalConfig,
	/// Location-memory tunables
	pub location: LocationConfig,
	/// Context-assembly tunables
	pub context: ContextConfig,
	/// Suggested cadence for the host's decay sweep (ms)
	pub decay_interval_ms: f64,
	/// Suggested cadence for the host's regeneration sweep (ms)
	pub regen_interval_ms: f64,
	/// Owners regenerated per sweep batch
	pub regen_batch_size: usize,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			retrieval: RetrievalConfig::default(),
			location: LocationConfig::default(),
			context: ContextConfig::default(),
			decay_interval_ms: 60.0 * 60.0 * 1000.0,
			regen_interval_ms: 5_000.0,
			regen_batch_size: 10,
		}
	}
}

// ============================================================================
// Inputs and results
// ============================================================================

/// Input for storing a textual memory.
#[derive(Debug, Clone, Default)]
pub struct StoreMemoryInput {
	/// Full text
	pub content: String,
	/// Optional gist; generated from content when absent, clamped either way
	pub gist: Option<String>,
	/// Kind of memory
	pub kind: MemoryKind,
	/// Emotional salience in [0, 1]; defaults to 0.5
	pub emotional_weight: Option<f64>,
	/// Free-form tags
	pub tags: Vec<String>,
	/// Project scope by absolute path; created on first use
	pub project_path: Option<String>,
}

/// Input for a retrieval query.
#[derive(Debug, Clone)]
pub struct QueryInput<'a> {
	/// What to search with
	pub probe: Probe<'a>,
	/// Restrict to one kind
	pub kind: Option<MemoryKind>,
	/// Restrict to one project scope by path
	pub project_path: Option<&'a str>,
	/// Absolute deadline (ms) for the probe-embedding step
	pub deadline_ms: Option<f64>,
}

impl<'a> QueryInput<'a> {
	/// Unfiltered query for a probe.
	#[must_use]
	pub const fn new(probe: Probe<'a>) -> Self {
		Self {
			probe,
			kind: None,
			project_path: None,
			deadline_ms: None,
		}
	}
}

/// Per-kind memory count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KindCount {
	/// The kind
	pub kind: MemoryKind,
	/// How many memories have it
	pub count: u64,
}

/// Snapshot statistics over the text-memory tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStats {
	/// Total memories
	pub total: u64,
	/// Breakdown by kind
	pub by_kind: Vec<KindCount>,
	/// Memories with a current embedding
	pub embedded: u64,
	/// Memories awaiting (re)embedding
	pub pending_embeddings: u64,
	/// Association edges
	pub associations: u64,
}

/// Input for recording a location access.
#[derive(Debug, Clone)]
pub struct RecordLocationInput<'a> {
	/// Absolute path accessed
	pub path: &'a str,
	/// Project scope by path; created on first use
	pub project_path: Option<&'a str>,
	/// Caller-written context line
	pub context: &'a str,
	/// Tool that performed the access, if any
	pub tool_name: Option<&'a str>,
	/// Explicit activity type, overriding inference
	pub activity: Option<ActivityType>,
	/// Whether the caller navigated directly (no search needed)
	pub direct: bool,
	/// Task descriptor, when the host tracks one
	pub task: Option<&'a str>,
	/// Human description of the location
	pub description: Option<&'a str>,
}

/// Result of recording a location access.
#[derive(Debug, Clone)]
pub struct LocationRecord {
	/// The location after the access
	pub location: Location,
	/// How the activity type was determined
	pub inference: ActivityInference,
	/// Number of co-access edges reinforced by this access
	pub co_accessed: usize,
}

/// A location associated with a seed, with the edge strength.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociatedLocation {
	/// The far endpoint
	pub location: Location,
	/// Edge strength in [0, 1]
	pub strength: f64,
}

/// A location ranked by how often an activity touched it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityUsage {
	/// The location
	pub location: Location,
	/// Accesses with the queried activity
	pub count: u64,
}

/// Snapshot statistics over the location tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationStats {
	/// Total locations
	pub total: u64,
	/// Pinned locations
	pub pinned: u64,
	/// Locations at or above the well-known threshold
	pub well_known: u64,
	/// Mean familiarity (0 when empty)
	pub avg_familiarity: f64,
	/// Sum of access counts
	pub total_accesses: u64,
}

/// Input for storing a visual memory.
#[derive(Debug, Clone, Default)]
pub struct StoreVisualInput {
	/// What the image or frame shows
	pub description: String,
	/// Emotional salience in [0, 1]; defaults to 0.5
	pub emotional_weight: Option<f64>,
}

// ============================================================================
// Engine
// ============================================================================

/// The cognitive retrieval engine.
pub struct Engine {
	store: Arc<dyn MemoryStore>,
	embedder: Option<Arc<dyn Embedder>>,
	config: EngineConfig,
}

fn validate_unit_interval(name: &str, value: f64) -> Result<f64> {
	if !value.is_finite() || !(0.0..=1.0).contains(&value) {
		return Err(EngramError::Invariant(format!(
			"{name} must be within [0, 1], got {value}"
		)));
	}
	Ok(value)
}

/// Canonical unordered-pair ordering for location edges.
fn pair_key<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
	if a <= b {
		(a, b)
	} else {
		(b, a)
	}
}

impl Engine {
	/// Build an engine over a store and an optional embedding provider.
	#[must_use]
	pub fn new(
		store: Arc<dyn MemoryStore>,
		embedder: Option<Arc<dyn Embedder>>,
		config: EngineConfig,
	) -> Self {
		Self {
			store,
			embedder,
			config,
		}
	}

	/// Build an embedder-less engine with default configuration. Text
	/// probes will rank by recency until a provider is attached.
	#[must_use]
	pub fn with_store(store: Arc<dyn MemoryStore>) -> Self {
		Self::new(store, None, EngineConfig::default())
	}

	/// The engine's configuration.
	#[must_use]
	pub const fn config(&self) -> &EngineConfig {
		&self.config
	}

	/// Direct access to the backing store.
	#[must_use]
	pub fn store(&self) -> &dyn MemoryStore {
		self.store.as_ref()
	}

	fn embedder(&self) -> Option<&dyn Embedder> {
		self.embedder.as_deref()
	}

	/// Look up a project by path, creating it on first use.
	fn ensure_project(&self, path: &str) -> Result<String> {
		if let Some(project) = self.store.project_by_path(path)? {
			return Ok(project.id);
		}
		let name = path
			.rsplit('/')
			.find(|segment| !segment.is_empty())
			.unwrap_or(path)
			.to_owned();
		let project = Project {
			id: new_id(),
			name,
			path: path.to_owned(),
		};
		self.store.put_project(&project)?;
		Ok(project.id)
	}

	/// Resolve a project path to a scope id without creating anything.
	/// Unknown paths resolve to a fresh id that matches no rows, so the
	/// query scans an empty scope rather than silently widening.
	fn project_scope(&self, path: Option<&str>) -> Result<Option<String>> {
		match path {
			None => Ok(None),
			Some(path) => Ok(Some(
				self.store
					.project_by_path(path)?
					.map_or_else(new_id, |project| project.id),
			)),
		}
	}

	// ========================================================================
	// Text memory API
	// ========================================================================

	/// Store a textual memory. Creation counts as its first access, and
	/// the content is embedded immediately when a provider is configured;
	/// otherwise the memory stays pending for background regeneration.
	///
	/// # Errors
	///
	/// Fails on store errors or an out-of-range emotional weight.
	/// Embedding failures are not errors — the memory is stored pending.
	pub fn store_memory(&self, input: StoreMemoryInput, now_ms: f64) -> Result<Memory> {
		let emotional_weight = match input.emotional_weight {
			Some(w) => validate_unit_interval("emotional_weight", w)?,
			None => 0.5,
		};
		let project_id = match &input.project_path {
			Some(path) => Some(self.ensure_project(path)?),
			None => None,
		};
		let gist = match &input.gist {
			Some(gist) => make_gist(gist),
			None => make_gist(&input.content),
		};

		let memory = Memory {
			id: new_id(),
			content: input.content,
			gist,
			kind: input.kind,
			emotional_weight,
			tags: input.tags,
			project_id,
			access_count: 0,
			created_at_ms: now_ms,
		};
		self.store.put_memory(&memory)?;
		self.store.append_access(&memory.id, now_ms)?;

		if let Some(embedder) = self.embedder() {
			match embedder.embed(&memory.content) {
				Ok(output) => lifecycle::store_embedding(
					self.store.as_ref(),
					EmbeddingSpace::Text,
					&memory.id,
					output.vector,
					&output.model,
				)?,
				Err(error) => {
					warn!(memory_id = %memory.id, %error, "embedding at store time failed; left pending");
				}
			}
		}

		self.store
			.memory(&memory.id)?
			.ok_or_else(|| EngramError::NotFound(format!("memory {}", memory.id)))
	}

	/// Load a memory by id.
	///
	/// # Errors
	///
	/// Propagates store failures.
	pub fn get_memory(&self, id: &str) -> Result<Option<Memory>> {
		Ok(self.store.memory(id)?)
	}

	/// Delete a memory and everything cascading from it (embedding,
	/// access history, associations). Returns whether it existed.
	///
	/// # Errors
	///
	/// Propagates store failures.
	pub fn forget(&self, id: &str) -> Result<bool> {
		Ok(self.store.delete_memory(id)?)
	}

	/// Run the cognitive retrieval pipeline.
	///
	/// # Errors
	///
	/// Fails on store errors or malformed configuration; provider
	/// failures fall back to recency ranking instead.
	pub fn query(&self, input: &QueryInput<'_>, now_ms: f64) -> Result<RetrievalOutcome> {
		let request = RetrievalRequest {
			probe: input.probe,
			kind: input.kind,
			project_id: self.project_scope(input.project_path)?,
			deadline_ms: input.deadline_ms,
		};
		retrieve(
			self.store.as_ref(),
			self.embedder(),
			&request,
			&self.config.retrieval,
			now_ms,
		)
	}

	/// Assemble a task context: top candidates by cognitive rank, floored
	/// on raw similarity, fitted to the token budget.
	///
	/// # Errors
	///
	/// Propagates retrieval errors.
	pub fn context(&self, input: &QueryInput<'_>, now_ms: f64) -> Result<AssembledContext> {
		let request = RetrievalRequest {
			probe: input.probe,
			kind: input.kind,
			project_id: self.project_scope(input.project_path)?,
			deadline_ms: input.deadline_ms,
		};
		assemble_context(
			self.store.as_ref(),
			self.embedder(),
			&request,
			&self.config.retrieval,
			&self.config.context,
			now_ms,
		)
	}

	/// Create or re-weight an association between two memories.
	///
	/// # Errors
	///
	/// Fails with [`EngramError::NotFound`] when either endpoint is
	/// absent, or [`EngramError::Invariant`] on an out-of-range strength.
	pub fn associate(
		&self,
		source_id: &str,
		target_id: &str,
		strength: f64,
		kind: &str,
		now_ms: f64,
	) -> Result<Association> {
		let strength = validate_unit_interval("strength", strength)?;
		for id in [source_id, target_id] {
			if self.store.memory(id)?.is_none() {
				return Err(EngramError::NotFound(format!("memory {id}")));
			}
		}
		let assoc = Association {
			source_id: source_id.to_owned(),
			target_id: target_id.to_owned(),
			strength,
			kind: kind.to_owned(),
			last_reinforced_ms: now_ms,
		};
		self.store.upsert_association(&assoc)?;
		Ok(assoc)
	}

	/// Snapshot statistics over the text-memory tables.
	///
	/// # Errors
	///
	/// Propagates store failures.
	pub fn memory_stats(&self) -> Result<MemoryStats> {
		let total = self.store.memory_count()?;
		let pending = self.store.pending_embedding_count()?;
		let mut by_kind = Vec::with_capacity(MemoryKind::ALL.len());
		for kind in MemoryKind::ALL {
			let filter = crate::store::MemoryFilter {
				kind: Some(kind),
				project_id: None,
			};
			let count = self.store.memories(&filter)?.len() as u64;
			if count > 0 {
				by_kind.push(KindCount { kind, count });
			}
		}
		Ok(MemoryStats {
			total,
			by_kind,
			embedded: total.saturating_sub(pending),
			pending_embeddings: pending,
			associations: self.store.association_count()?,
		})
	}

	// ========================================================================
	// Location memory API
	// ========================================================================

	/// Record an access to a path: create or update the location, restore
	/// its familiarity onto the curve, bind the activity context, and
	/// reinforce co-access edges with every other location touched inside
	/// the co-access window.
	///
	/// # Errors
	///
	/// Propagates store failures.
	pub fn record_location_access(
		&self,
		input: &RecordLocationInput<'_>,
		now_ms: f64,
	) -> Result<LocationRecord> {
		let config = &self.config.location;
		let project_id = match input.project_path {
			Some(path) => Some(self.ensure_project(path)?),
			None => None,
		};

		let mut loc = match self
			.store
			.location_by_path(input.path, project_id.as_deref())?
		{
			Some(existing) => existing,
			None => Location {
				id: new_id(),
				path: input.path.to_owned(),
				project_id,
				description: None,
				access_count: 0,
				last_accessed_ms: now_ms,
				familiarity: 0.0,
				peak_familiarity: 0.0,
				direct_access_count: 0,
				searches_saved: 0,
				pinned: false,
				last_decayed_ms: None,
			},
		};

		let inference = location::infer_activity(input.context, input.tool_name, input.activity);

		loc.access_count = loc.access_count.saturating_add(1);
		if input.direct {
			loc.direct_access_count = loc.direct_access_count.saturating_add(1);
			loc.searches_saved = loc.searches_saved.saturating_add(1);
		}
		// An access puts familiarity back on the curve; decay only holds
		// between accesses.
		loc.familiarity = location::familiarity(loc.access_count, config);
		loc.peak_familiarity = loc.peak_familiarity.max(loc.familiarity);
		loc.last_accessed_ms = now_ms;
		if let Some(description) = input.description {
			loc.description = Some(description.to_owned());
		}
		self.store.put_location(&loc)?;

		self.store.append_location_access(&LocationAccess {
			location_id: loc.id.clone(),
			context: input.context.to_owned(),
			activity: inference.activity,
			direct: input.direct,
			task: input.task.map(str::to_owned),
			timestamp_ms: now_ms,
		})?;

		let co_accessed = self.reinforce_co_access(&loc, &inference, input.task, now_ms)?;

		debug!(
			path = %loc.path,
			familiarity = loc.familiarity,
			activity = %inference.activity,
			co_accessed,
			"recorded location access"
		);

		Ok(LocationRecord {
			location: loc,
			inference,
			co_accessed,
		})
	}

	/// Strengthen edges between the just-accessed location and every
	/// other location seen inside the co-access window, graded by shared
	/// task and shared activity.
	fn reinforce_co_access(
		&self,
		loc: &Location,
		inference: &ActivityInference,
		task: Option<&str>,
		now_ms: f64,
	) -> Result<usize> {
		let config = &self.config.location;
		let window_start = now_ms - config.co_access_window_ms;
		let recent = self.store.location_accesses_since(window_start)?;

		// Latest qualifying access per other location.
		let mut latest: HashMap<&str, &LocationAccess> = HashMap::new();
		for access in &recent {
			if access.location_id == loc.id || access.timestamp_ms > now_ms {
				continue;
			}
			let slot = latest.entry(access.location_id.as_str()).or_insert(access);
			if access.timestamp_ms > slot.timestamp_ms {
				*slot = access;
			}
		}

		let mut reinforced = 0;
		for (other_id, other_access) in latest {
			let same_task = matches!((task, other_access.task.as_deref()), (Some(a), Some(b)) if a == b);
			let same_activity = inference.activity != ActivityType::Unknown
				&& other_access.activity == inference.activity;
			let delta = location::association_delta(same_task, same_activity, config);

			let (k0, k1) = pair_key(&loc.id, other_id);
			let existing = self.store.location_association(k0, k1)?;
			let assoc = match existing {
				Some(mut edge) => {
					edge.strength = location::reinforced_strength(edge.strength, delta);
					edge.co_access_count = edge.co_access_count.saturating_add(1);
					edge.last_coaccess_ms = now_ms;
					edge
				}
				None => LocationAssociation {
					source_id: k0.to_owned(),
					target_id: k1.to_owned(),
					strength: location::reinforced_strength(0.0, delta),
					co_access_count: 1,
					last_coaccess_ms: now_ms,
				},
			};
			self.store.put_location_association(&assoc)?;
			reinforced += 1;
		}

		Ok(reinforced)
	}

	/// Load a location by path within an optional project scope.
	///
	/// # Errors
	///
	/// Propagates store failures.
	pub fn location(&self, path: &str, project_path: Option<&str>) -> Result<Option<Location>> {
		let project_id = self.lookup_project_id(project_path)?;
		if project_path.is_some() && project_id.is_none() {
			return Ok(None);
		}
		Ok(self.store.location_by_path(path, project_id.as_deref())?)
	}

	fn lookup_project_id(&self, project_path: Option<&str>) -> Result<Option<String>> {
		match project_path {
			None => Ok(None),
			Some(path) => Ok(self.store.project_by_path(path)?.map(|p| p.id)),
		}
	}

	/// Locations whose path contains the pattern.
	///
	/// # Errors
	///
	/// Propagates store failures.
	pub fn find_locations(&self, pattern: &str) -> Result<Vec<Location>> {
		Ok(self.store.find_locations(pattern)?)
	}

	/// All known locations.
	///
	/// # Errors
	///
	/// Propagates store failures.
	pub fn all_locations(&self) -> Result<Vec<Location>> {
		Ok(self.store.locations()?)
	}

	/// Most recently accessed locations, newest first.
	///
	/// # Errors
	///
	/// Propagates store failures.
	pub fn recent_locations(&self, limit: usize) -> Result<Vec<Location>> {
		let mut locations = self.store.locations()?;
		locations.sort_by(|a, b| {
			b.last_accessed_ms
				.total_cmp(&a.last_accessed_ms)
				.then_with(|| a.id.cmp(&b.id))
		});
		locations.truncate(limit);
		Ok(locations)
	}

	/// Recent access contexts for a location, newest first. Unknown paths
	/// yield an empty list.
	///
	/// # Errors
	///
	/// Propagates store failures.
	pub fn location_contexts(
		&self,
		path: &str,
		project_path: Option<&str>,
		limit: usize,
	) -> Result<Vec<LocationAccess>> {
		match self.location(path, project_path)? {
			None => Ok(Vec::new()),
			Some(loc) => Ok(self.store.location_accesses(&loc.id, limit)?),
		}
	}

	/// Locations associated with a path, strongest edge first, each with
	/// its current familiarity.
	///
	/// # Errors
	///
	/// Propagates store failures.
	pub fn associated_locations(
		&self,
		path: &str,
		project_path: Option<&str>,
	) -> Result<Vec<AssociatedLocation>> {
		let Some(seed) = self.location(path, project_path)? else {
			return Ok(Vec::new());
		};

		let mut edges = self.store.location_associations_touching(&seed.id)?;
		edges.sort_by(|a, b| b.strength.total_cmp(&a.strength));

		let mut results = Vec::with_capacity(edges.len());
		for edge in edges {
			let other_id = if edge.source_id == seed.id {
				&edge.target_id
			} else {
				&edge.source_id
			};
			if let Some(location) = self.store.location(other_id)? {
				results.push(AssociatedLocation {
					location,
					strength: edge.strength,
				});
			}
		}
		Ok(results)
	}

	/// Locations ranked by how often the given activity touched them.
	///
	/// # Errors
	///
	/// Propagates store failures.
	pub fn locations_by_activity(
		&self,
		activity: ActivityType,
		limit: usize,
	) -> Result<Vec<ActivityUsage>> {
		let accesses = self.store.location_accesses_since(f64::NEG_INFINITY)?;
		let mut counts: HashMap<&str, u64> = HashMap::new();
		for access in &accesses {
			if access.activity == activity {
				*counts.entry(access.location_id.as_str()).or_insert(0) += 1;
			}
		}

		let mut ranked: Vec<(String, u64)> = counts
			.into_iter()
			.map(|(id, count)| (id.to_owned(), count))
			.collect();
		ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
		ranked.truncate(limit);

		let mut results = Vec::with_capacity(ranked.len());
		for (id, count) in ranked {
			if let Some(location) = self.store.location(&id)? {
				results.push(ActivityUsage { location, count });
			}
		}
		Ok(results)
	}

	/// Pin or unpin a location. Pinned locations never decay and are
	/// never reported as orphans. Returns the updated location, or `None`
	/// when the path is unknown.
	///
	/// # Errors
	///
	/// Propagates store failures.
	pub fn set_pinned(
		&self,
		path: &str,
		project_path: Option<&str>,
		pinned: bool,
	) -> Result<Option<Location>> {
		match self.location(path, project_path)? {
			None => Ok(None),
			Some(mut loc) => {
				loc.pinned = pinned;
				self.store.put_location(&loc)?;
				Ok(Some(loc))
			}
		}
	}

	/// Run one familiarity decay pass over every location, returning the
	/// number changed.
	///
	/// Idempotent within a stale window: each pass stamps the rows it
	/// touches, and stamped rows are ineligible until the window elapses
	/// again. When enabled, co-access edges between two locations that
	/// both decayed in this pass are weakened by the same factor.
	///
	/// # Errors
	///
	/// Propagates store failures.
	pub fn decay_familiarity(&self, now_ms: f64) -> Result<u64> {
		let config = &self.config.location;
		let mut changed_ids: Vec<String> = Vec::new();

		for mut loc in self.store.locations()? {
			let outcome = location::decayed_familiarity(&loc, now_ms, config);
			if !outcome.changed {
				continue;
			}
			loc.familiarity = outcome.familiarity;
			loc.last_decayed_ms = Some(now_ms);
			self.store.put_location(&loc)?;
			changed_ids.push(loc.id);
		}

		if config.decay_associations && changed_ids.len() > 1 {
			let changed: std::collections::HashSet<&str> =
				changed_ids.iter().map(String::as_str).collect();
			let mut seen: std::collections::HashSet<(String, String)> =
				std::collections::HashSet::new();
			for id in &changed_ids {
				for mut edge in self.store.location_associations_touching(id)? {
					let key = (edge.source_id.clone(), edge.target_id.clone());
					if !seen.insert(key) {
						continue;
					}
					if changed.contains(edge.source_id.as_str())
						&& changed.contains(edge.target_id.as_str())
					{
						edge.strength *= 1.0 - config.decay_factor;
						self.store.put_location_association(&edge)?;
					}
				}
			}
		}

		info!(changed = changed_ids.len(), "familiarity decay pass complete");
		Ok(changed_ids.len() as u64)
	}

	/// Locations familiar enough to matter but idle past the orphan
	/// window — candidates for "does this file still exist?".
	///
	/// # Errors
	///
	/// Propagates store failures.
	pub fn orphaned_locations(&self, now_ms: f64) -> Result<Vec<Location>> {
		let config = &self.config.location;
		Ok(self
			.store
			.locations()?
			.into_iter()
			.filter(|loc| location::is_orphaned(loc, now_ms, config))
			.collect())
	}

	/// Merge a renamed path into its successor.
	///
	/// Only the old path exists → rename in place, keeping counters and
	/// edges. Both exist → combine (counters sum, familiarity takes the
	/// max, edges union with strengths capped, contexts follow), then
	/// drop the old row. Neither exists → `Ok(None)`.
	///
	/// # Errors
	///
	/// Propagates store failures.
	pub fn merge_locations(
		&self,
		old_path: &str,
		new_path: &str,
		project_path: Option<&str>,
		now_ms: f64,
	) -> Result<Option<Location>> {
		let project_id = self.lookup_project_id(project_path)?;
		if project_path.is_some() && project_id.is_none() {
			return Ok(None);
		}
		let scope = project_id.as_deref();

		let old = self.store.location_by_path(old_path, scope)?;
		let new = self.store.location_by_path(new_path, scope)?;

		match (old, new) {
			(None, None) => Ok(None),
			(None, Some(new)) => Ok(Some(new)),
			(Some(mut old), None) => {
				old.path = new_path.to_owned();
				self.store.put_location(&old)?;
				info!(old_path, new_path, "renamed location");
				Ok(Some(old))
			}
			(Some(old), Some(new)) => {
				let merged = location::merge_into(&old, &new);

				// Union the old row's edges onto the survivor.
				for edge in self.store.location_associations_touching(&old.id)? {
					let other = if edge.source_id == old.id {
						&edge.target_id
					} else {
						&edge.source_id
					};
					if other == &new.id {
						continue; // an old↔new edge would become a self-loop
					}
					let (k0, k1) = pair_key(&new.id, other);
					let combined = match self.store.location_association(k0, k1)? {
						Some(existing) => LocationAssociation {
							source_id: k0.to_owned(),
							target_id: k1.to_owned(),
							strength: (existing.strength + edge.strength).min(1.0),
							co_access_count: existing
								.co_access_count
								.saturating_add(edge.co_access_count),
							last_coaccess_ms: existing.last_coaccess_ms.max(edge.last_coaccess_ms),
						},
						None => LocationAssociation {
							source_id: k0.to_owned(),
							target_id: k1.to_owned(),
							strength: edge.strength,
							co_access_count: edge.co_access_count,
							last_coaccess_ms: edge.last_coaccess_ms,
						},
					};
					self.store.put_location_association(&combined)?;
				}

				let moved = self.store.reassign_location_accesses(&old.id, &new.id)?;
				let _ = self.store.delete_location(&old.id)?;
				self.store.put_location(&merged)?;

				info!(old_path, new_path, moved_contexts = moved, at = now_ms, "merged locations");
				Ok(Some(merged))
			}
		}
	}

	/// Snapshot statistics over the location tables.
	///
	/// # Errors
	///
	/// Propagates store failures.
	pub fn location_stats(&self) -> Result<LocationStats> {
		let locations = self.store.locations()?;
		let total = locations.len() as u64;
		let pinned = locations.iter().filter(|l| l.pinned).count() as u64;
		let well_known = locations
			.iter()
			.filter(|l| location::is_well_known(l.familiarity, &self.config.location))
			.count() as u64;
		let familiarity_sum: f64 = locations.iter().map(|l| l.familiarity).sum();
		let total_accesses: u64 = locations
			.iter()
			.map(|l| u64::from(l.access_count))
			.sum();

		Ok(LocationStats {
			total,
			pinned,
			well_known,
			avg_familiarity: if locations.is_empty() {
				0.0
			} else {
				familiarity_sum / locations.len() as f64
			},
			total_accesses,
		})
	}

	// ========================================================================
	// Visual memory API
	// ========================================================================

	/// Store a visual memory, embedding its description when a provider
	/// is configured.
	///
	/// # Errors
	///
	/// Fails on store errors or an out-of-range emotional weight.
	pub fn store_visual(&self, input: StoreVisualInput, now_ms: f64) -> Result<VisualMemory> {
		let emotional_weight = match input.emotional_weight {
			Some(w) => validate_unit_interval("emotional_weight", w)?,
			None => 0.5,
		};
		let visual = VisualMemory {
			id: new_id(),
			description: input.description,
			emotional_weight,
			created_at_ms: now_ms,
		};
		self.store.put_visual(&visual)?;

		if let Some(embedder) = self.embedder() {
			match embedder.embed(&visual.description) {
				Ok(output) => lifecycle::store_embedding(
					self.store.as_ref(),
					EmbeddingSpace::Visual,
					&visual.id,
					output.vector,
					&output.model,
				)?,
				Err(error) => {
					warn!(visual_id = %visual.id, %error, "visual embedding failed; left pending");
				}
			}
		}

		Ok(visual)
	}

	/// Load a visual memory by id.
	///
	/// # Errors
	///
	/// Propagates store failures.
	pub fn get_visual(&self, id: &str) -> Result<Option<VisualMemory>> {
		Ok(self.store.visual(id)?)
	}

	/// Delete a visual memory and its embedding. Returns whether it
	/// existed.
	///
	/// # Errors
	///
	/// Propagates store failures.
	pub fn forget_visual(&self, id: &str) -> Result<bool> {
		Ok(self.store.delete_visual(id)?)
	}

	// ========================================================================
	// Embedding lifecycle API
	// ========================================================================

	/// Count stored embeddings in a space whose model tag differs.
	///
	/// # Errors
	///
	/// Propagates store failures.
	pub fn embeddings_not_matching(&self, space: EmbeddingSpace, model: &str) -> Result<u64> {
		lifecycle::count_not_matching(self.store.as_ref(), space, model)
	}

	/// Invalidate embeddings in a space whose model tag differs; their
	/// owners become pending.
	///
	/// # Errors
	///
	/// Propagates store failures.
	pub fn invalidate_embeddings(&self, space: EmbeddingSpace, model: &str) -> Result<u64> {
		lifecycle::invalidate_not_matching(self.store.as_ref(), space, model)
	}

	/// Owners in a space with no embedding row.
	///
	/// # Errors
	///
	/// Propagates store failures.
	pub fn pending_embeddings(&self, space: EmbeddingSpace) -> Result<u64> {
		lifecycle::pending_count(self.store.as_ref(), space)
	}

	/// Insert or replace one owner's embedding (hosts that embed out of
	/// band, e.g. from a batch job). Dimensionality may change freely.
	///
	/// # Errors
	///
	/// Propagates store failures, including an absent owner.
	pub fn store_embedding(
		&self,
		space: EmbeddingSpace,
		owner_id: &str,
		vector: Vec<f32>,
		model: &str,
	) -> Result<()> {
		lifecycle::store_embedding(self.store.as_ref(), space, owner_id, vector, model)
	}

	/// Regenerate one batch of missing embeddings (the host's
	/// regeneration sweep body). Without a provider this is a no-op.
	///
	/// # Errors
	///
	/// Propagates store failures on the batch fetch; per-item failures
	/// are logged and counted, never raised.
	pub fn regenerate_embeddings(&self, space: EmbeddingSpace) -> Result<RegenerationReport> {
		let Some(embedder) = self.embedder() else {
			warn!("no embedder configured; regeneration skipped");
			return Ok(RegenerationReport::default());
		};
		lifecycle::regenerate_batch(
			self.store.as_ref(),
			space,
			embedder,
			self.config.regen_batch_size,
		)
	}

	// ========================================================================
	// Background sweep wrappers (log-and-continue)
	// ========================================================================

	/// Decay sweep body for a host scheduler: never propagates errors.
	pub fn run_decay_sweep(&self, now_ms: f64) -> u64 {
		match self.decay_familiarity(now_ms) {
			Ok(changed) => changed,
			Err(error) => {
				warn!(%error, "decay sweep failed; will retry next interval");
				0
			}
		}
	}

	/// Regeneration sweep body for a host scheduler: never propagates
	/// errors.
	pub fn run_regeneration_sweep(&self, space: EmbeddingSpace) -> RegenerationReport {
		match self.regenerate_embeddings(space) {
			Ok(report) => report,
			Err(error) => {
				warn!(%error, "regeneration sweep failed; will retry next interval");
				RegenerationReport::default()
			}
		}
	}
}
