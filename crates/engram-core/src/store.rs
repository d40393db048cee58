//! Persistence Adapter
//!
//! [`MemoryStore`] is the contract the engine consumes from its backing
//! store; [`MemStore`] is the in-memory reference implementation used by
//! tests and embedded hosts.
//!
//! ## Contract
//!
//! - Implementations are `Send + Sync` and take `&self`: the engine may be
//!   called from many threads against one store.
//! - Writes are short transactions; reads may run at snapshot isolation.
//!   A read never returns duplicate or partial rows, but may miss a row
//!   committed concurrently — the engine tolerates mildly stale reads.
//! - Deleting a memory cascades to its embedding, its access history, and
//!   every association touching it. Deleting a project cascades to
//!   nothing: scoped rows keep their data through project renames.
//! - Durable implementations need secondary indexes on
//!   `(memory.project_id)`, `(memory.kind)`, `(access.memory_id,
//!   timestamp)`, `(embedding.model)`, `(location.path, project_id)`
//!   unique, and both association endpoints. The `(embedding.model)`
//!   index matters most: migration queries must not degrade to full
//!   scans.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use parking_lot::RwLock;
use thiserror::Error;

use crate::model::{
	Association, EmbeddingRecord, Location, LocationAccess, LocationAssociation, Memory,
	MemoryKind, Project, VisualMemory,
};

/// Errors raised by a backing store.
#[derive(Debug, Error)]
pub enum StoreError {
	/// Backend failure (I/O, corrupt row, transaction abort).
	#[error("store backend error: {0}")]
	Backend(String),

	/// A referenced row does not exist.
	#[error("row not found: {0}")]
	NotFound(String),

	/// A uniqueness constraint would be violated.
	#[error("conflict: {0}")]
	Conflict(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Filter for loading memories in scope.
#[derive(Debug, Clone, Default)]
pub struct MemoryFilter {
	/// Restrict to one kind
	pub kind: Option<MemoryKind>,
	/// Restrict to one project scope
	pub project_id: Option<String>,
}

/// The backing-store contract the engine operates against.
pub trait MemoryStore: Send + Sync {
	// === Memories ===

	/// Insert or replace a memory row.
	fn put_memory(&self, memory: &Memory) -> StoreResult<()>;

	/// Load a memory by id.
	fn memory(&self, id: &str) -> StoreResult<Option<Memory>>;

	/// Delete a memory; cascades to embedding, accesses, and associations.
	/// Returns whether a row existed.
	fn delete_memory(&self, id: &str) -> StoreResult<bool>;

	/// Load all memories matching the filter.
	fn memories(&self, filter: &MemoryFilter) -> StoreResult<Vec<Memory>>;

	/// Total number of memories.
	fn memory_count(&self) -> StoreResult<u64>;

	// === Access records (append-only per memory) ===

	/// Append an access timestamp and bump the memory's access count.
	fn append_access(&self, memory_id: &str, timestamp_ms: f64) -> StoreResult<()>;

	/// Full access history for a memory, oldest first. Missing rows yield
	/// an empty history.
	fn access_history(&self, memory_id: &str) -> StoreResult<Vec<f64>>;

	// === Associations (directed rows, symmetric reads) ===

	/// Insert or overwrite the edge keyed by its ordered `(source,
	/// target)` pair.
	fn upsert_association(&self, assoc: &Association) -> StoreResult<()>;

	/// Every edge where the memory is source or target.
	fn associations_touching(&self, memory_id: &str) -> StoreResult<Vec<Association>>;

	/// Total number of association rows.
	fn association_count(&self) -> StoreResult<u64>;

	// === Text embeddings ===

	/// Insert or replace the owner's embedding; dimensionality may change
	/// between replacements. The owner must exist.
	fn put_embedding(&self, record: &EmbeddingRecord) -> StoreResult<()>;

	/// Load the embedding for one owner.
	fn embedding(&self, owner_id: &str) -> StoreResult<Option<EmbeddingRecord>>;

	/// Batch load embeddings for a set of owners; absent owners are simply
	/// missing from the map.
	fn embeddings(&self, owner_ids: &[String]) -> StoreResult<HashMap<String, EmbeddingRecord>>;

	/// Count embeddings whose model tag differs.
	fn count_embeddings_not_matching(&self, model: &str) -> StoreResult<u64>;

	/// Delete embeddings whose model tag differs, returning the count.
	fn delete_embeddings_not_matching(&self, model: &str) -> StoreResult<u64>;

	/// Number of memories with no embedding row.
	fn pending_embedding_count(&self) -> StoreResult<u64>;

	/// Stable page of memories awaiting (re)embedding.
	fn memories_without_embeddings(&self, limit: usize) -> StoreResult<Vec<Memory>>;

	// === Visual memories and their embedding space ===

	/// Insert or replace a visual memory row.
	fn put_visual(&self, visual: &VisualMemory) -> StoreResult<()>;

	/// Load a visual memory by id.
	fn visual(&self, id: &str) -> StoreResult<Option<VisualMemory>>;

	/// Delete a visual memory; cascades to its embedding.
	fn delete_visual(&self, id: &str) -> StoreResult<bool>;

	/// Insert or replace a visual embedding; the owner must exist.
	fn put_visual_embedding(&self, record: &EmbeddingRecord) -> StoreResult<()>;

	/// Load one visual embedding.
	fn visual_embedding(&self, owner_id: &str) -> StoreResult<Option<EmbeddingRecord>>;

	/// Count visual embeddings whose model tag differs.
	fn count_visual_embeddings_not_matching(&self, model: &str) -> StoreResult<u64>;

	/// Delete visual embeddings whose model tag differs, returning the
	/// count.
	fn delete_visual_embeddings_not_matching(&self, model: &str) -> StoreResult<u64>;

	/// Number of visual memories with no embedding row.
	fn pending_visual_embedding_count(&self) -> StoreResult<u64>;

	/// Stable page of visual memories awaiting (re)embedding.
	fn visuals_without_embeddings(&self, limit: usize) -> StoreResult<Vec<VisualMemory>>;

	// === Projects ===

	/// Insert or replace a project; paths are unique.
	fn put_project(&self, project: &Project) -> StoreResult<()>;

	/// Load a project by id.
	fn project(&self, id: &str) -> StoreResult<Option<Project>>;

	/// Load a project by its absolute path.
	fn project_by_path(&self, path: &str) -> StoreResult<Option<Project>>;

	/// Delete a project row. Scoped memories and locations are preserved.
	fn delete_project(&self, id: &str) -> StoreResult<bool>;

	// === Locations ===

	/// Insert or replace a location; `(path, project_id)` is unique.
	fn put_location(&self, location: &Location) -> StoreResult<()>;

	/// Load a location by id.
	fn location(&self, id: &str) -> StoreResult<Option<Location>>;

	/// Load a location by exact `(path, project)` pair.
	fn location_by_path(
		&self,
		path: &str,
		project_id: Option<&str>,
	) -> StoreResult<Option<Location>>;

	/// Delete a location; cascades to its accesses and associations.
	fn delete_location(&self, id: &str) -> StoreResult<bool>;

	/// All locations.
	fn locations(&self) -> StoreResult<Vec<Location>>;

	/// Locations whose path contains the pattern.
	fn find_locations(&self, pattern: &str) -> StoreResult<Vec<Location>>;

	// === Location accesses (append-only log) ===

	/// Append one access record.
	fn append_location_access(&self, access: &LocationAccess) -> StoreResult<()>;

	/// Most recent accesses for one location, newest first.
	fn location_accesses(&self, location_id: &str, limit: usize) -> StoreResult<Vec<LocationAccess>>;

	/// All accesses (any location) at or after `since_ms`, used for the
	/// co-access window.
	fn location_accesses_since(&self, since_ms: f64) -> StoreResult<Vec<LocationAccess>>;

	/// Re-point access records from one location id to another (rename
	/// merge support).
	fn reassign_location_accesses(&self, from_id: &str, to_id: &str) -> StoreResult<u64>;

	// === Location associations ===

	/// Insert or overwrite the edge keyed by its ordered `(source,
	/// target)` pair.
	fn put_location_association(&self, assoc: &LocationAssociation) -> StoreResult<()>;

	/// Load one edge by its ordered pair.
	fn location_association(
		&self,
		source_id: &str,
		target_id: &str,
	) -> StoreResult<Option<LocationAssociation>>;

	/// Every edge where the location is source or target.
	fn location_associations_touching(
		&self,
		location_id: &str,
	) -> StoreResult<Vec<LocationAssociation>>;
}

// ============================================================================
// In-memory reference implementation
// ============================================================================

#[derive(Default)]
struct Inner {
	memories: BTreeMap<String, Memory>,
	accesses: BTreeMap<String, Vec<f64>>,
	associations: BTreeMap<(String, String), Association>,
	embeddings: BTreeMap<String, EmbeddingRecord>,
	/// model tag → owner ids; the in-memory stand-in for the
	/// `(embedding.model)` secondary index
	embeddings_by_model: BTreeMap<String, BTreeSet<String>>,
	visuals: BTreeMap<String, VisualMemory>,
	visual_embeddings: BTreeMap<String, EmbeddingRecord>,
	visual_embeddings_by_model: BTreeMap<String, BTreeSet<String>>,
	projects: BTreeMap<String, Project>,
	locations: BTreeMap<String, Location>,
	location_accesses: Vec<LocationAccess>,
	location_associations: BTreeMap<(String, String), LocationAssociation>,
}

/// In-memory [`MemoryStore`] backed by ordered maps.
///
/// Iteration order is id order, which keeps pagination and test output
/// deterministic. One `RwLock` guards the whole state: every trait method
/// is a single short critical section, so readers always see a consistent
/// snapshot.
#[derive(Default)]
pub struct MemStore {
	inner: RwLock<Inner>,
}

impl MemStore {
	/// Create an empty store.
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}
}

fn remove_from_model_index(index: &mut BTreeMap<String, BTreeSet<String>>, record: &EmbeddingRecord) {
	if let Some(owners) = index.get_mut(&record.model) {
		let _ = owners.remove(&record.owner_id);
		if owners.is_empty() {
			let _ = index.remove(&record.model);
		}
	}
}

fn count_not_matching(index: &BTreeMap<String, BTreeSet<String>>, model: &str) -> u64 {
	index
		.iter()
		.filter(|(tag, _)| tag.as_str() != model)
		.map(|(_, owners)| owners.len() as u64)
		.sum()
}

impl MemoryStore for MemStore {
	fn put_memory(&self, memory: &Memory) -> StoreResult<()> {
		let mut inner = self.inner.write();
		let _ = inner.memories.insert(memory.id.clone(), memory.clone());
		Ok(())
	}

	fn memory(&self, id: &str) -> StoreResult<Option<Memory>> {
		Ok(self.inner.read().memories.get(id).cloned())
	}

	fn delete_memory(&self, id: &str) -> StoreResult<bool> {
		let mut inner = self.inner.write();
		if inner.memories.remove(id).is_none() {
			return Ok(false);
		}
		let _ = inner.accesses.remove(id);
		if let Some(record) = inner.embeddings.remove(id) {
			remove_from_model_index(&mut inner.embeddings_by_model, &record);
		}
		inner
			.associations
			.retain(|(source, target), _| source != id && target != id);
		Ok(true)
	}

	fn memories(&self, filter: &MemoryFilter) -> StoreResult<Vec<Memory>> {
		let inner = self.inner.read();
		Ok(inner
			.memories
			.values()
			.filter(|m| filter.kind.is_none_or(|kind| m.kind == kind))
			.filter(|m| {
				filter
					.project_id
					.as_ref()
					.is_none_or(|project| m.project_id.as_deref() == Some(project.as_str()))
			})
			.cloned()
			.collect())
	}

	fn memory_count(&self) -> StoreResult<u64> {
		Ok(self.inner.read().memories.len() as u64)
	}

	fn append_access(&self, memory_id: &str, timestamp_ms: f64) -> StoreResult<()> {
		let mut inner = self.inner.write();
		let memory = inner
			.memories
			.get_mut(memory_id)
			.ok_or_else(|| StoreError::NotFound(format!("memory {memory_id}")))?;
		memory.access_count = memory.access_count.saturating_add(1);
		inner
			.accesses
			.entry(memory_id.to_owned())
			.or_default()
			.push(timestamp_ms);
		Ok(())
	}

	fn access_history(&self, memory_id: &str) -> StoreResult<Vec<f64>> {
		Ok(self
			.inner
			.read()
			.accesses
			.get(memory_id)
			.cloned()
			.unwrap_or_default())
	}

	fn upsert_association(&self, assoc: &Association) -> StoreResult<()> {
		let mut inner = self.inner.write();
		if !inner.memories.contains_key(&assoc.source_id) {
			return Err(StoreError::NotFound(format!("memory {}", assoc.source_id)));
		}
		if !inner.memories.contains_key(&assoc.target_id) {
			return Err(StoreError::NotFound(format!("memory {}", assoc.target_id)));
		}
		let key = (assoc.source_id.clone(), assoc.target_id.clone());
		let _ = inner.associations.insert(key, assoc.clone());
		Ok(())
	}

	fn associations_touching(&self, memory_id: &str) -> StoreResult<Vec<Association>> {
		let inner = self.inner.read();
		Ok(inner
			.associations
			.values()
			.filter(|a| a.source_id == memory_id || a.target_id == memory_id)
			.cloned()
			.collect())
	}

	fn association_count(&self) -> StoreResult<u64> {
		Ok(self.inner.read().associations.len() as u64)
	}

	fn put_embedding(&self, record: &EmbeddingRecord) -> StoreResult<()> {
		let mut inner = self.inner.write();
		if !inner.memories.contains_key(&record.owner_id) {
			return Err(StoreError::NotFound(format!("memory {}", record.owner_id)));
		}
		if let Some(previous) = inner.embeddings.remove(&record.owner_id) {
			remove_from_model_index(&mut inner.embeddings_by_model, &previous);
		}
		let _ = inner
			.embeddings
			.insert(record.owner_id.clone(), record.clone());
		let _ = inner
			.embeddings_by_model
			.entry(record.model.clone())
			.or_default()
			.insert(record.owner_id.clone());
		Ok(())
	}

	fn embedding(&self, owner_id: &str) -> StoreResult<Option<EmbeddingRecord>> {
		Ok(self.inner.read().embeddings.get(owner_id).cloned())
	}

	fn embeddings(&self, owner_ids: &[String]) -> StoreResult<HashMap<String, EmbeddingRecord>> {
		let inner = self.inner.read();
		Ok(owner_ids
			.iter()
			.filter_map(|id| inner.embeddings.get(id).map(|r| (id.clone(), r.clone())))
			.collect())
	}

	fn count_embeddings_not_matching(&self, model: &str) -> StoreResult<u64> {
		Ok(count_not_matching(&self.inner.read().embeddings_by_model, model))
	}

	fn delete_embeddings_not_matching(&self, model: &str) -> StoreResult<u64> {
		let mut inner = self.inner.write();
		let stale: Vec<String> = inner
			.embeddings_by_model
			.iter()
			.filter(|(tag, _)| tag.as_str() != model)
			.flat_map(|(_, owners)| owners.iter().cloned())
			.collect();
		for owner in &stale {
			if let Some(record) = inner.embeddings.remove(owner) {
				remove_from_model_index(&mut inner.embeddings_by_model, &record);
			}
		}
		Ok(stale.len() as u64)
	}

	fn pending_embedding_count(&self) -> StoreResult<u64> {
		let inner = self.inner.read();
		Ok(inner
			.memories
			.keys()
			.filter(|id| !inner.embeddings.contains_key(*id))
			.count() as u64)
	}

	fn memories_without_embeddings(&self, limit: usize) -> StoreResult<Vec<Memory>> {
		let inner = self.inner.read();
		Ok(inner
			.memories
			.values()
			.filter(|m| !inner.embeddings.contains_key(&m.id))
			.take(limit)
			.cloned()
			.collect())
	}

	fn put_visual(&self, visual: &VisualMemory) -> StoreResult<()> {
		let mut inner = self.inner.write();
		let _ = inner.visuals.insert(visual.id.clone(), visual.clone());
		Ok(())
	}

	fn visual(&self, id: &str) -> StoreResult<Option<VisualMemory>> {
		Ok(self.inner.read().visuals.get(id).cloned())
	}

	fn delete_visual(&self, id: &str) -> StoreResult<bool> {
		let mut inner = self.inner.write();
		if inner.visuals.remove(id).is_none() {
			return Ok(false);
		}
		if let Some(record) = inner.visual_embeddings.remove(id) {
			remove_from_model_index(&mut inner.visual_embeddings_by_model, &record);
		}
		Ok(true)
	}

	fn put_visual_embedding(&self, record: &EmbeddingRecord) -> StoreResult<()> {
		let mut inner = self.inner.write();
		if !inner.visuals.contains_key(&record.owner_id) {
			return Err(StoreError::NotFound(format!("visual {}", record.owner_id)));
		}
		if let Some(previous) = inner.visual_embeddings.remove(&record.owner_id) {
			remove_from_model_index(&mut inner.visual_embeddings_by_model, &previous);
		}
		let _ = inner
			.visual_embeddings
			.insert(record.owner_id.clone(), record.clone());
		let _ = inner
			.visual_embeddings_by_model
			.entry(record.model.clone())
			.or_default()
			.insert(record.owner_id.clone());
		Ok(())
	}

	fn visual_embedding(&self, owner_id: &str) -> StoreResult<Option<EmbeddingRecord>> {
		Ok(self.inner.read().visual_embeddings.get(owner_id).cloned())
	}

	fn count_visual_embeddings_not_matching(&self, model: &str) -> StoreResult<u64> {
		Ok(count_not_matching(
			&self.inner.read().visual_embeddings_by_model,
			model,
		))
	}

	fn delete_visual_embeddings_not_matching(&self, model: &str) -> StoreResult<u64> {
		let mut inner = self.inner.write();
		let stale: Vec<String> = inner
			.visual_embeddings_by_model
			.iter()
			.filter(|(tag, _)| tag.as_str() != model)
			.flat_map(|(_, owners)| owners.iter().cloned())
			.collect();
		for owner in &stale {
			if let Some(record) = inner.visual_embeddings.remove(owner) {
				remove_from_model_index(&mut inner.visual_embeddings_by_model, &record);
			}
		}
		Ok(stale.len() as u64)
	}

	fn pending_visual_embedding_count(&self) -> StoreResult<u64> {
		let inner = self.inner.read();
		Ok(inner
			.visuals
			.keys()
			.filter(|id| !inner.visual_embeddings.contains_key(*id))
			.count() as u64)
	}

	fn visuals_without_embeddings(&self, limit: usize) -> StoreResult<Vec<VisualMemory>> {
		let inner = self.inner.read();
		Ok(inner
			.visuals
			.values()
			.filter(|v| !inner.visual_embeddings.contains_key(&v.id))
			.take(limit)
			.cloned()
			.collect())
	}

	fn put_project(&self, project: &Project) -> StoreResult<()> {
		let mut inner = self.inner.write();
		let clash = inner
			.projects
			.values()
			.any(|p| p.path == project.path && p.id != project.id);
		if clash {
			return Err(StoreError::Conflict(format!(
				"project path {} already registered",
				project.path
			)));
		}
		let _ = inner.projects.insert(project.id.clone(), project.clone());
		Ok(())
	}

	fn project(&self, id: &str) -> StoreResult<Option<Project>> {
		Ok(self.inner.read().projects.get(id).cloned())
	}

	fn project_by_path(&self, path: &str) -> StoreResult<Option<Project>> {
		let inner = self.inner.read();
		Ok(inner.projects.values().find(|p| p.path == path).cloned())
	}

	fn delete_project(&self, id: &str) -> StoreResult<bool> {
		Ok(self.inner.write().projects.remove(id).is_some())
	}

	fn put_location(&self, location: &Location) -> StoreResult<()> {
		let mut inner = self.inner.write();
		let clash = inner.locations.values().any(|l| {
			l.path == location.path && l.project_id == location.project_id && l.id != location.id
		});
		if clash {
			return Err(StoreError::Conflict(format!(
				"location path {} already registered in this scope",
				location.path
			)));
		}
		let _ = inner.locations.insert(location.id.clone(), location.clone());
		Ok(())
	}

	fn location(&self, id: &str) -> StoreResult<Option<Location>> {
		Ok(self.inner.read().locations.get(id).cloned())
	}

	fn location_by_path(
		&self,
		path: &str,
		project_id: Option<&str>,
	) -> StoreResult<Option<Location>> {
		let inner = self.inner.read();
		Ok(inner
			.locations
			.values()
			.find(|l| l.path == path && l.project_id.as_deref() == project_id)
			.cloned())
	}

	fn delete_location(&self, id: &str) -> StoreResult<bool> {
		let mut inner = self.inner.write();
		if inner.locations.remove(id).is_none() {
			return Ok(false);
		}
		inner.location_accesses.retain(|a| a.location_id != id);
		inner
			.location_associations
			.retain(|(source, target), _| source != id && target != id);
		Ok(true)
	}

	fn locations(&self) -> StoreResult<Vec<Location>> {
		Ok(self.inner.read().locations.values().cloned().collect())
	}

	fn find_locations(&self, pattern: &str) -> StoreResult<Vec<Location>> {
		let inner = self.inner.read();
		Ok(inner
			.locations
			.values()
			.filter(|l| l.path.contains(pattern))
			.cloned()
			.collect())
	}

	fn append_location_access(&self, access: &LocationAccess) -> StoreResult<()> {
		let mut inner = self.inner.write();
		if !inner.locations.contains_key(&access.location_id) {
			return Err(StoreError::NotFound(format!("location {}", access.location_id)));
		}
		inner.location_accesses.push(access.clone());
		Ok(())
	}

	fn location_accesses(&self, location_id: &str, limit: usize) -> StoreResult<Vec<LocationAccess>> {
		let inner = self.inner.read();
		Ok(inner
			.location_accesses
			.iter()
			.rev()
			.filter(|a| a.location_id == location_id)
			.take(limit)
			.cloned()
			.collect())
	}

	fn location_accesses_since(&self, since_ms: f64) -> StoreResult<Vec<LocationAccess>> {
		let inner = self.inner.read();
		Ok(inner
			.location_accesses
			.iter()
			.filter(|a| a.timestamp_ms >= since_ms)
			.cloned()
			.collect())
	}

	fn reassign_location_accesses(&self, from_id: &str, to_id: &str) -> StoreResult<u64> {
		let mut inner = self.inner.write();
		let mut moved = 0;
		for access in &mut inner.location_accesses {
			if access.location_id == from_id {
				access.location_id = to_id.to_owned();
				moved += 1;
			}
		}
		Ok(moved)
	}

	fn put_location_association(&self, assoc: &LocationAssociation) -> StoreResult<()> {
		let mut inner = self.inner.write();
		let key = (assoc.source_id.clone(), assoc.target_id.clone());
		let _ = inner.location_associations.insert(key, assoc.clone());
		Ok(())
	}

	fn location_association(
		&self,
		source_id: &str,
		target_id: &str,
	) -> StoreResult<Option<LocationAssociation>> {
		let inner = self.inner.read();
		Ok(inner
			.location_associations
			.get(&(source_id.to_owned(), target_id.to_owned()))
			.cloned())
	}

	fn location_associations_touching(
		&self,
		location_id: &str,
	) -> StoreResult<Vec<LocationAssociation>> {
		let inner = self.inner.read();
		Ok(inner
			.location_associations
			.values()
			.filter(|a| a.source_id == location_id || a.target_id == location_id)
			.cloned()
			.collect())
	}
}
