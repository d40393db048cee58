//! Location Memory
//!
//! Spatial memory for AI systems: how an assistant develops intuitions
//! about file paths through repeated exposure.
//!
//! ## Biological Basis
//!
//! **Hippocampal Place Cells** (O'Keefe & Nadel, 1978)
//! - Neurons that fire when you're in a specific location
//! - Familiarity grows with repeated exposure, with diminishing returns:
//!   `f(n) = 1 - 1/(1 + α·n)`
//!
//! **Entorhinal Cortex** (Moser et al., 2008)
//! - Binds context to spatial memory — *where* plus *what you were doing*
//! - Each access carries an activity type (reading, writing, debugging…)
//!
//! **Procedural Memory** (Squire, 1992)
//! - Direct file access without searching first signals true familiarity;
//!   the engine counts the searches it saved
//!
//! **Associative Networks** (Hebb, 1949)
//! - Files touched for the same task wire together; shared task context
//!   links strongly, mere temporal proximity links weakly
//!
//! The functions here are pure kernels over [`LocationConfig`]; the
//! engine owns the store round-trips.

use serde::{Deserialize, Serialize};

use crate::model::Location;

/// Milliseconds per day.
pub const MS_PER_DAY: f64 = 24.0 * 60.0 * 60.0 * 1000.0;

// ============================================================================
// Types
// ============================================================================

/// Activity type bound to a location access (entorhinal context binding).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
	/// Examining code without modification
	Reading,
	/// Creating or modifying code
	Writing,
	/// Investigating issues or errors
	Debugging,
	/// Restructuring existing code
	Refactoring,
	/// Code review or audit
	Reviewing,
	/// Could not be determined
	#[default]
	Unknown,
}

impl ActivityType {
	/// String representation.
	#[must_use]
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Reading => "reading",
			Self::Writing => "writing",
			Self::Debugging => "debugging",
			Self::Refactoring => "refactoring",
			Self::Reviewing => "reviewing",
			Self::Unknown => "unknown",
		}
	}

	/// Parse from a string name; unknown names map to `Unknown`.
	#[must_use]
	pub fn parse_name(s: &str) -> Self {
		match s.to_lowercase().as_str() {
			"reading" => Self::Reading,
			"writing" => Self::Writing,
			"debugging" => Self::Debugging,
			"refactoring" => Self::Refactoring,
			"reviewing" => Self::Reviewing,
			_ => Self::Unknown,
		}
	}
}

impl std::fmt::Display for ActivityType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

/// How an activity type was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InferenceSource {
	/// Caller explicitly provided the activity type
	Explicit,
	/// Inferred from keywords in the context text
	Keyword,
	/// Inferred from a tool name (Read, Edit, …)
	Tool,
	/// Fallback when nothing else matched
	Default,
}

/// Result of activity type inference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityInference {
	/// The inferred activity type
	pub activity: ActivityType,
	/// How it was determined
	pub source: InferenceSource,
	/// Confidence level (0-1)
	pub confidence: f64,
}

/// Configuration for location-memory behavior.
///
/// The co-access deltas and decay parameters are tunables, not constants:
/// observed host behavior varies here, so everything is exposed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
	/// Familiarity curve coefficient α: `f(n) = 1 - 1/(1 + α·n)`
	pub familiarity_alpha: f64,
	/// Familiarity at or above this is "well-known"
	pub well_known_threshold: f64,

	/// Days without access (or decay) before a decay pass applies
	pub stale_threshold_days: f64,
	/// Fraction of familiarity removed per eligible decay pass
	pub decay_factor: f64,
	/// Peak familiarity above this earns the elevated floor
	pub sticky_threshold: f64,
	/// Decay floor for ordinary locations
	pub base_floor: f64,
	/// Decay floor for locations that were once well-practiced
	pub well_known_floor: f64,
	/// Whether a decay pass also weakens stale co-access edges
	pub decay_associations: bool,

	/// Orphan detection: minimum familiarity to be worth flagging
	pub orphan_min_familiarity: f64,
	/// Orphan detection: days without access
	pub orphan_stale_days: f64,

	/// Co-access strength delta: same task, same activity
	pub delta_task_same_activity: f64,
	/// Co-access strength delta: same task only
	pub delta_task_only: f64,
	/// Co-access strength delta: same activity only
	pub delta_activity_only: f64,
	/// Co-access strength delta: temporal proximity alone
	pub delta_baseline: f64,
	/// Window within which two accesses count as co-access (ms)
	pub co_access_window_ms: f64,
}

impl Default for LocationConfig {
	fn default() -> Self {
		Self {
			familiarity_alpha: 0.1,
			well_known_threshold: 0.7,
			stale_threshold_days: 30.0,
			decay_factor: 0.1,
			sticky_threshold: 0.8,
			base_floor: 0.1,
			well_known_floor: 0.4,
			decay_associations: true,
			orphan_min_familiarity: 0.4,
			orphan_stale_days: 60.0,
			delta_task_same_activity: 0.20,
			delta_task_only: 0.15,
			delta_activity_only: 0.10,
			delta_baseline: 0.05,
			co_access_window_ms: 5.0 * 60.0 * 1000.0,
		}
	}
}

// ============================================================================
// Familiarity
// ============================================================================

/// Familiarity after `access_count` accesses.
///
/// `f(n) = 1 - 1/(1 + α·n)` — zero at n=0, 0.5 at n=10 (α=0.1),
/// asymptotically approaching 1. Hippocampal trace strengthening shows
/// the same diminishing returns with repeated exposure.
///
/// # Examples
///
/// ```
/// use engram_core::location::{familiarity, LocationConfig};
///
/// let config = LocationConfig::default();
/// assert!((familiarity(1, &config) - 0.091).abs() < 0.001);
/// assert!((familiarity(10, &config) - 0.5).abs() < 0.001);
/// assert!(familiarity(100, &config) > 0.9);
/// ```
#[inline]
#[must_use]
pub fn familiarity(access_count: u32, config: &LocationConfig) -> f64 {
	let n = f64::from(access_count);
	1.0 - 1.0 / config.familiarity_alpha.mul_add(n, 1.0)
}

/// Check familiarity against the well-known threshold.
#[inline]
#[must_use]
pub fn is_well_known(familiarity: f64, config: &LocationConfig) -> bool {
	familiarity >= config.well_known_threshold
}

// ============================================================================
// Passive decay
// ============================================================================

/// Result of evaluating decay for one location.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DecayOutcome {
	/// Familiarity after the pass
	pub familiarity: f64,
	/// Whether the pass lowered it
	pub changed: bool,
}

/// Evaluate one decay pass for a location.
///
/// A location is eligible when neither an access nor a previous decay
/// pass has touched it within the stale window; that gate is what makes
/// back-to-back passes idempotent while still letting familiarity step
/// down once per window until it reaches its floor.
///
/// The floor is sticky: a location whose familiarity ever exceeded
/// `sticky_threshold` keeps the elevated `well_known_floor` — a place you
/// once knew cold never fully fades.
///
/// Pinned locations and rows with corrupt timestamps never decay.
#[must_use]
pub fn decayed_familiarity(location: &Location, now_ms: f64, config: &LocationConfig) -> DecayOutcome {
	let unchanged = DecayOutcome {
		familiarity: location.familiarity,
		changed: false,
	};

	if location.pinned {
		return unchanged;
	}

	if !location.last_accessed_ms.is_finite() || location.last_accessed_ms < 0.0 {
		return unchanged;
	}

	let touched_ms = match location.last_decayed_ms {
		Some(decayed) if decayed > location.last_accessed_ms => decayed,
		_ => location.last_accessed_ms,
	};

	let days_idle = (now_ms - touched_ms) / MS_PER_DAY;
	if days_idle < config.stale_threshold_days {
		return unchanged;
	}

	let floor = if location.peak_familiarity > config.sticky_threshold {
		config.well_known_floor
	} else {
		config.base_floor
	};

	let decayed = (location.familiarity * (1.0 - config.decay_factor)).max(floor);
	DecayOutcome {
		familiarity: decayed,
		changed: decayed < location.familiarity,
	}
}

/// Orphan predicate: familiar enough to matter, idle long enough to ask
/// whether it still exists. Pinned locations are exempt.
#[inline]
#[must_use]
pub fn is_orphaned(location: &Location, now_ms: f64, config: &LocationConfig) -> bool {
	if location.pinned {
		return false;
	}
	let days_idle = (now_ms - location.last_accessed_ms) / MS_PER_DAY;
	location.familiarity >= config.orphan_min_familiarity && days_idle > config.orphan_stale_days
}

// ============================================================================
// Activity inference
// ============================================================================

/// Infer activity type from context text and/or tool name.
///
/// Precedence (entorhinal context binding: intent beats action):
/// 1. Explicit (caller-provided)
/// 2. Keyword in the context text
/// 3. Tool name (Read/Edit/Write…)
/// 4. `Unknown`
///
/// "Reading a file to debug" is debugging, not reading — keywords carry
/// intent, tool names only record the action taken.
///
/// # Examples
///
/// ```
/// use engram_core::location::{infer_activity, ActivityType, InferenceSource};
///
/// let result = infer_activity("debugging the issue", Some("Read"), None);
/// assert_eq!(result.activity, ActivityType::Debugging);
/// assert_eq!(result.source, InferenceSource::Keyword);
///
/// let result = infer_activity("opening the file", Some("Read"), None);
/// assert_eq!(result.activity, ActivityType::Reading);
/// assert_eq!(result.source, InferenceSource::Tool);
/// ```
#[must_use]
pub fn infer_activity(
	context: &str,
	tool_name: Option<&str>,
	explicit: Option<ActivityType>,
) -> ActivityInference {
	// 1. Explicit always wins
	if let Some(activity) = explicit {
		if activity != ActivityType::Unknown {
			return ActivityInference {
				activity,
				source: InferenceSource::Explicit,
				confidence: 1.0,
			};
		}
	}

	// 2. Keyword-based inference (intent indicators)
	let lower = context.to_lowercase();

	let keyword_table: &[(ActivityType, &[&str], f64)] = &[
		(
			ActivityType::Debugging,
			&["debug", "fix", "bug", "issue", "error", "trace"],
			0.9,
		),
		(
			ActivityType::Refactoring,
			&["refactor", "clean", "reorganize", "restructure"],
			0.9,
		),
		(
			ActivityType::Reviewing,
			&["review", "understand", "check", "examine", "audit"],
			0.8,
		),
		(
			ActivityType::Writing,
			&["implement", "add", "create", "write", "build"],
			0.7,
		),
		(
			ActivityType::Reading,
			&["read", "look", "see", "view", "inspect"],
			0.6,
		),
	];

	for (activity, keywords, confidence) in keyword_table {
		if keywords.iter().any(|kw| lower.contains(kw)) {
			return ActivityInference {
				activity: *activity,
				source: InferenceSource::Keyword,
				confidence: *confidence,
			};
		}
	}

	// 3. Tool-based inference (action, not intent)
	if let Some(tool) = tool_name {
		let tool_activity = match tool {
			"Read" | "Grep" | "Glob" => Some(ActivityType::Reading),
			"Edit" | "Write" => Some(ActivityType::Writing),
			_ => None,
		};

		if let Some(activity) = tool_activity {
			return ActivityInference {
				activity,
				source: InferenceSource::Tool,
				confidence: 0.5,
			};
		}
	}

	// 4. Default fallback
	ActivityInference {
		activity: ActivityType::Unknown,
		source: InferenceSource::Default,
		confidence: 0.0,
	}
}

// ============================================================================
// Co-access associations
// ============================================================================

/// Strength delta earned by one co-access, by association quality.
///
/// Shared task context is a clear conceptual link; shared activity alone
/// is probable; temporal proximity alone is merely possible.
#[inline]
#[must_use]
pub fn association_delta(same_task: bool, same_activity: bool, config: &LocationConfig) -> f64 {
	match (same_task, same_activity) {
		(true, true) => config.delta_task_same_activity,
		(true, false) => config.delta_task_only,
		(false, true) => config.delta_activity_only,
		(false, false) => config.delta_baseline,
	}
}

/// Apply a co-access delta, capped at 1.0.
#[inline]
#[must_use]
pub fn reinforced_strength(current: f64, delta: f64) -> f64 {
	(current + delta).min(1.0)
}

// ============================================================================
// Rename merging
// ============================================================================

/// Combine an old location's record into a new one (rename merge).
///
/// Counters sum, familiarity takes the max, pinning survives from either
/// side; identity (id, path, project) stays the new location's.
#[must_use]
pub fn merge_into(old: &Location, new: &Location) -> Location {
	Location {
		id: new.id.clone(),
		path: new.path.clone(),
		project_id: new.project_id.clone(),
		description: new.description.clone().or_else(|| old.description.clone()),
		access_count: old.access_count.saturating_add(new.access_count),
		last_accessed_ms: old.last_accessed_ms.max(new.last_accessed_ms),
		familiarity: old.familiarity.max(new.familiarity),
		peak_familiarity: old.peak_familiarity.max(new.peak_familiarity),
		direct_access_count: old.direct_access_count.saturating_add(new.direct_access_count),
		searches_saved: old.searches_saved.saturating_add(new.searches_saved),
		pinned: old.pinned || new.pinned,
		last_decayed_ms: match (old.last_decayed_ms, new.last_decayed_ms) {
			(Some(a), Some(b)) => Some(a.max(b)),
			(a, b) => a.or(b),
		},
	}
}

#[cfg(test)]
#[allow(clippy::float_cmp, clippy::suboptimal_flops)]
mod tests {
	use super::*;
	use crate::model::new_id;

	fn location(familiarity_value: f64, last_accessed_ms: f64) -> Location {
		Location {
			id: new_id(),
			path: "/src/main.rs".into(),
			project_id: None,
			description: None,
			access_count: 10,
			last_accessed_ms,
			familiarity: familiarity_value,
			peak_familiarity: familiarity_value,
			direct_access_count: 0,
			searches_saved: 0,
			pinned: false,
			last_decayed_ms: None,
		}
	}

	#[test]
	fn familiarity_curve_matches_model() {
		let config = LocationConfig::default();

		assert_eq!(familiarity(0, &config), 0.0);
		assert!((familiarity(1, &config) - 0.091).abs() < 0.001);
		assert!((familiarity(10, &config) - 0.5).abs() < 0.001);
		assert!((familiarity(100, &config) - 0.909).abs() < 0.001);

		// Monotonic, concave, asymptote 1
		assert!(familiarity(1000, &config) > 0.99);
		assert!(familiarity(1000, &config) < 1.0);
		let step_early = familiarity(2, &config) - familiarity(1, &config);
		let step_late = familiarity(50, &config) - familiarity(49, &config);
		assert!(step_early > step_late);
	}

	#[test]
	fn well_known_needs_roughly_23_accesses() {
		let config = LocationConfig::default();
		assert!(!is_well_known(familiarity(22, &config), &config));
		assert!(is_well_known(familiarity(24, &config), &config));
	}

	#[test]
	fn decay_skips_fresh_locations() {
		let config = LocationConfig::default();
		let now = 100.0 * MS_PER_DAY;
		let loc = location(0.8, now - 10.0 * MS_PER_DAY);

		let outcome = decayed_familiarity(&loc, now, &config);
		assert!(!outcome.changed);
		assert_eq!(outcome.familiarity, 0.8);
	}

	#[test]
	fn decay_applies_after_stale_window() {
		let config = LocationConfig::default();
		let now = 100.0 * MS_PER_DAY;
		let loc = location(0.5, now - 30.0 * MS_PER_DAY);

		let outcome = decayed_familiarity(&loc, now, &config);
		assert!(outcome.changed);
		assert!((outcome.familiarity - 0.45).abs() < 1e-12);
	}

	#[test]
	fn decay_is_idempotent_within_a_window() {
		let config = LocationConfig::default();
		let now = 100.0 * MS_PER_DAY;
		let mut loc = location(0.5, now - 35.0 * MS_PER_DAY);

		let first = decayed_familiarity(&loc, now, &config);
		assert!(first.changed);
		loc.familiarity = first.familiarity;
		loc.last_decayed_ms = Some(now);

		// Same pass again, or a minute later: nothing further happens.
		let second = decayed_familiarity(&loc, now + 60_000.0, &config);
		assert!(!second.changed);
		assert_eq!(second.familiarity, first.familiarity);
	}

	#[test]
	fn decay_stabilizes_at_base_floor() {
		let config = LocationConfig::default();
		let mut loc = location(0.5, 0.0);
		let mut now = 0.0;

		// Repeated windows walk familiarity down to the floor, never below.
		for _ in 0..40 {
			now += 31.0 * MS_PER_DAY;
			let outcome = decayed_familiarity(&loc, now, &config);
			loc.familiarity = outcome.familiarity;
			loc.last_decayed_ms = Some(now);
		}

		assert_eq!(loc.familiarity, config.base_floor);
	}

	#[test]
	fn sticky_floor_protects_once_well_known() {
		let config = LocationConfig::default();
		let mut loc = location(0.9, 0.0);
		loc.peak_familiarity = 0.9; // exceeded sticky threshold 0.8
		let mut now = 0.0;

		for _ in 0..40 {
			now += 31.0 * MS_PER_DAY;
			let outcome = decayed_familiarity(&loc, now, &config);
			loc.familiarity = outcome.familiarity;
			loc.last_decayed_ms = Some(now);
		}

		assert_eq!(loc.familiarity, config.well_known_floor);
	}

	#[test]
	fn pinned_never_decays() {
		let config = LocationConfig::default();
		let now = 365.0 * MS_PER_DAY;
		let mut loc = location(0.5, 0.0);
		loc.pinned = true;

		let outcome = decayed_familiarity(&loc, now, &config);
		assert!(!outcome.changed);
		assert_eq!(outcome.familiarity, 0.5);
	}

	#[test]
	fn corrupt_timestamps_are_left_alone() {
		let config = LocationConfig::default();
		let now = 100.0 * MS_PER_DAY;

		for bad in [f64::NAN, f64::INFINITY, -1000.0] {
			let loc = location(0.7, bad);
			let outcome = decayed_familiarity(&loc, now, &config);
			assert!(!outcome.changed);
			assert_eq!(outcome.familiarity, 0.7);
		}
	}

	#[test]
	fn orphan_requires_familiarity_and_staleness() {
		let config = LocationConfig::default();
		let now = 200.0 * MS_PER_DAY;

		let familiar_stale = location(0.5, now - 61.0 * MS_PER_DAY);
		assert!(is_orphaned(&familiar_stale, now, &config));

		let unfamiliar_stale = location(0.2, now - 61.0 * MS_PER_DAY);
		assert!(!is_orphaned(&unfamiliar_stale, now, &config));

		let familiar_fresh = location(0.5, now - 10.0 * MS_PER_DAY);
		assert!(!is_orphaned(&familiar_fresh, now, &config));

		let mut pinned = location(0.5, now - 61.0 * MS_PER_DAY);
		pinned.pinned = true;
		assert!(!is_orphaned(&pinned, now, &config));
	}

	#[test]
	fn inference_precedence() {
		// 1. Explicit wins over everything
		let result = infer_activity("reading code", Some("Read"), Some(ActivityType::Debugging));
		assert_eq!(result.activity, ActivityType::Debugging);
		assert_eq!(result.source, InferenceSource::Explicit);

		// 2. Keyword wins over tool
		let result = infer_activity("fix the flaky test", Some("Read"), None);
		assert_eq!(result.activity, ActivityType::Debugging);
		assert_eq!(result.source, InferenceSource::Keyword);

		// 3. Tool inference when no keywords
		let result = infer_activity("opening the file", Some("Edit"), None);
		assert_eq!(result.activity, ActivityType::Writing);
		assert_eq!(result.source, InferenceSource::Tool);

		// 4. Default fallback
		let result = infer_activity("doing stuff", None, None);
		assert_eq!(result.activity, ActivityType::Unknown);
		assert_eq!(result.source, InferenceSource::Default);
	}

	#[test]
	fn explicit_unknown_falls_through() {
		let result = infer_activity("refactor the parser", None, Some(ActivityType::Unknown));
		assert_eq!(result.activity, ActivityType::Refactoring);
		assert_eq!(result.source, InferenceSource::Keyword);
	}

	#[test]
	fn delta_table_orders_by_quality() {
		let config = LocationConfig::default();

		let both = association_delta(true, true, &config);
		let task = association_delta(true, false, &config);
		let activity = association_delta(false, true, &config);
		let neither = association_delta(false, false, &config);

		assert_eq!(both, 0.20);
		assert_eq!(task, 0.15);
		assert_eq!(activity, 0.10);
		assert_eq!(neither, 0.05);
	}

	#[test]
	fn reinforcement_caps_at_one() {
		assert_eq!(reinforced_strength(0.5, 0.2), 0.7);
		assert_eq!(reinforced_strength(0.95, 0.2), 1.0);
	}

	#[test]
	fn merge_sums_counters_and_keeps_max_familiarity() {
		let mut old = location(0.8, 1_000.0);
		old.access_count = 20;
		old.searches_saved = 4;
		old.pinned = true;
		let mut new = location(0.3, 2_000.0);
		new.access_count = 3;
		new.searches_saved = 1;

		let merged = merge_into(&old, &new);
		assert_eq!(merged.id, new.id);
		assert_eq!(merged.path, new.path);
		assert_eq!(merged.access_count, 23);
		assert_eq!(merged.searches_saved, 5);
		assert_eq!(merged.familiarity, 0.8);
		assert_eq!(merged.last_accessed_ms, 2_000.0);
		assert!(merged.pinned);
	}

	#[test]
	fn activity_names_round_trip() {
		for activity in [
			ActivityType::Reading,
			ActivityType::Writing,
			ActivityType::Debugging,
			ActivityType::Refactoring,
			ActivityType::Reviewing,
			ActivityType::Unknown,
		] {
			assert_eq!(ActivityType::parse_name(activity.as_str()), activity);
		}
	}
}
