//! Data Model
//!
//! The entities the engine ranks and maintains. A persistent backing
//! store (see [`crate::store`]) holds them; nothing here touches I/O.
//!
//! Two invariants worth calling out:
//!
//! - Every [`Memory`] has at least one access record — creation counts as
//!   the first access, so base-level activation is always defined.
//! - At most one embedding row exists per owner, tagged with the model
//!   that produced it; replacing it may change dimensionality.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::location::ActivityType;

/// Hard cap on gist length, in characters.
pub const GIST_MAX_CHARS: usize = 150;

/// Mint a fresh opaque id.
#[must_use]
pub fn new_id() -> String {
	Uuid::new_v4().to_string()
}

// ============================================================================
// Memories
// ============================================================================

/// What kind of thing a memory records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
	/// Something learned about the world or the codebase
	#[default]
	Learning,
	/// A decision and (ideally) its rationale
	Decision,
	/// Background context worth resurfacing
	Context,
	/// A bug: symptom, cause, or both
	Bug,
	/// A solution that worked
	Solution,
	/// A conversational exchange
	Conversation,
}

impl MemoryKind {
	/// All kinds, in a stable order (used by stats).
	pub const ALL: [Self; 6] = [
		Self::Learning,
		Self::Decision,
		Self::Context,
		Self::Bug,
		Self::Solution,
		Self::Conversation,
	];

	/// String representation.
	#[must_use]
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Learning => "learning",
			Self::Decision => "decision",
			Self::Context => "context",
			Self::Bug => "bug",
			Self::Solution => "solution",
			Self::Conversation => "conversation",
		}
	}

	/// Parse from a string name; unknown names fall back to `Learning`.
	#[must_use]
	pub fn parse_name(s: &str) -> Self {
		match s.to_lowercase().as_str() {
			"decision" => Self::Decision,
			"context" => Self::Context,
			"bug" => Self::Bug,
			"solution" => Self::Solution,
			"conversation" => Self::Conversation,
			_ => Self::Learning,
		}
	}
}

impl std::fmt::Display for MemoryKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

/// A textual item the engine may later surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
	/// Opaque stable id
	pub id: String,
	/// Full text
	pub content: String,
	/// Short summary, at most [`GIST_MAX_CHARS`] characters
	pub gist: String,
	/// What kind of thing this records
	pub kind: MemoryKind,
	/// Emotional salience in [0, 1]; 0.5 is neutral
	pub emotional_weight: f64,
	/// Free-form tags
	pub tags: Vec<String>,
	/// Optional project scope
	pub project_id: Option<String>,
	/// Total access count (monotonic; creation counts)
	pub access_count: u32,
	/// Creation timestamp (ms since epoch)
	pub created_at_ms: f64,
}

/// Produce a gist from content: whitespace-collapsed prefix capped at
/// [`GIST_MAX_CHARS`] characters, with an ellipsis when truncated.
#[must_use]
pub fn make_gist(content: &str) -> String {
	let mut collapsed = String::with_capacity(content.len().min(GIST_MAX_CHARS * 4));
	for (i, word) in content.split_whitespace().enumerate() {
		if i > 0 {
			collapsed.push(' ');
		}
		collapsed.push_str(word);
	}

	if collapsed.chars().count() <= GIST_MAX_CHARS {
		return collapsed;
	}

	let mut gist: String = collapsed.chars().take(GIST_MAX_CHARS - 1).collect();
	gist.push('…');
	gist
}

// ============================================================================
// Embeddings
// ============================================================================

/// A unit vector owned by exactly one memory (or visual memory), tagged
/// with the model that produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
	/// Owning memory id
	pub owner_id: String,
	/// L2-normalized vector
	pub vector: Vec<f32>,
	/// Producer tag, e.g. `"bge-base-en-v1.5"`
	pub model: String,
}

// ============================================================================
// Associations
// ============================================================================

/// A weighted directed edge between two memories.
///
/// Stored directed, read symmetrically: retrieval treats `(a → b)` as
/// incident to both endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Association {
	/// Source memory id
	pub source_id: String,
	/// Target memory id
	pub target_id: String,
	/// Strength in [0, 1]
	pub strength: f64,
	/// Edge kind, e.g. `"semantic"` or `"temporal"`
	pub kind: String,
	/// When the edge was last created or re-weighted (ms)
	pub last_reinforced_ms: f64,
}

// ============================================================================
// Projects
// ============================================================================

/// Named scope grouping memories and locations by an absolute path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
	/// Opaque stable id
	pub id: String,
	/// Human name
	pub name: String,
	/// Absolute path; unique across projects
	pub path: String,
}

// ============================================================================
// Locations
// ============================================================================

/// A known file path with learned familiarity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
	/// Opaque stable id
	pub id: String,
	/// Absolute path
	pub path: String,
	/// Optional project scope
	pub project_id: Option<String>,
	/// Human description
	pub description: Option<String>,
	/// Number of recorded accesses (monotonic)
	pub access_count: u32,
	/// Timestamp of the most recent access (ms)
	pub last_accessed_ms: f64,
	/// Familiarity in [0, 1], asymptotic in access count, minus decay
	pub familiarity: f64,
	/// Highest familiarity ever reached (drives the sticky decay floor)
	pub peak_familiarity: f64,
	/// Accesses made directly, without searching first
	pub direct_access_count: u32,
	/// Cumulative searches avoided by direct navigation
	pub searches_saved: u32,
	/// Pinned locations never decay and are never orphans
	pub pinned: bool,
	/// When a decay pass last touched this row (ms); gates idempotence
	pub last_decayed_ms: Option<f64>,
}

/// One recorded access to a location, with its bound context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationAccess {
	/// The accessed location
	pub location_id: String,
	/// Caller-written context line
	pub context: String,
	/// Inferred or explicit activity type
	pub activity: ActivityType,
	/// Whether the caller navigated directly (no search)
	pub direct: bool,
	/// Task descriptor, when the host tracks one
	pub task: Option<String>,
	/// Access timestamp (ms)
	pub timestamp_ms: f64,
}

/// A weighted edge between two co-accessed locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationAssociation {
	/// One endpoint (canonically the lexicographically smaller id)
	pub source_id: String,
	/// The other endpoint
	pub target_id: String,
	/// Strength in [0, 1], additive per co-occurrence
	pub strength: f64,
	/// Number of co-accesses observed
	pub co_access_count: u32,
	/// When the pair was last co-accessed (ms)
	pub last_coaccess_ms: f64,
}

// ============================================================================
// Visual memories
// ============================================================================

/// Owner entity for the visual embedding space.
///
/// The visual space shares the text space's contracts (one embedding per
/// owner, model tagging, migration) but lives in its own table; migrating
/// one space never touches the other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualMemory {
	/// Opaque stable id
	pub id: String,
	/// What the image or frame shows
	pub description: String,
	/// Emotional salience in [0, 1]; 0.5 is neutral
	pub emotional_weight: f64,
	/// Creation timestamp (ms)
	pub created_at_ms: f64,
}
