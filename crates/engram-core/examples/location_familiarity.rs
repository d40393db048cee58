//! Location Familiarity Example
//!
//! Shows the location-memory lifecycle: familiarity growth over repeated
//! accesses, co-access association, passive decay, and rename merging.
//!
//! Run with: `cargo run --example location_familiarity`

#![allow(clippy::expect_used)] // demo code

use std::sync::Arc;

use engram_core::{Engine, MemStore, RecordLocationInput};

fn main() -> engram_core::Result<()> {
	let engine = Engine::with_store(Arc::new(MemStore::new()));

	const DAY_MS: f64 = 86_400_000.0;
	let start = 10.0 * DAY_MS;

	// Work a file repeatedly while debugging one task; touch its test
	// file alongside it.
	println!("=== Familiarity growth ===");
	for i in 0..12 {
		let now = start + f64::from(i) * 60_000.0;
		let record = engine.record_location_access(
			&RecordLocationInput {
				path: "/src/scheduler.rs",
				project_path: Some("/repos/engram"),
				context: "fix the wakeup race",
				tool_name: Some("Edit"),
				activity: None,
				direct: i > 3, // after a few visits we stop searching for it
				task: Some("fix-wakeup-race"),
				description: None,
			},
			now,
		)?;
		if i % 4 == 0 {
			println!(
				"  access {:2}: familiarity {:.3} ({} via {:?})",
				i + 1,
				record.location.familiarity,
				record.inference.activity,
				record.inference.source
			);
		}

		let _ = engine.record_location_access(
			&RecordLocationInput {
				path: "/src/scheduler_tests.rs",
				project_path: Some("/repos/engram"),
				context: "fix the wakeup race",
				tool_name: Some("Edit"),
				activity: None,
				direct: false,
				task: Some("fix-wakeup-race"),
				description: None,
			},
			now + 5_000.0,
		)?;
	}

	let loc = engine
		.location("/src/scheduler.rs", Some("/repos/engram"))?
		.expect("just recorded");
	println!(
		"\nafter 12 accesses: familiarity {:.3}, searches saved {}",
		loc.familiarity, loc.searches_saved
	);

	println!("\n=== Co-access associations ===");
	for assoc in engine.associated_locations("/src/scheduler.rs", Some("/repos/engram"))? {
		println!(
			"  {} (strength {:.2}, familiarity {:.3})",
			assoc.location.path, assoc.strength, assoc.location.familiarity
		);
	}

	// Months pass with no access: familiarity decays toward its floor.
	println!("\n=== Passive decay ===");
	let mut now = start + 40.0 * DAY_MS;
	for month in 1..=4 {
		let changed = engine.decay_familiarity(now)?;
		let loc = engine
			.location("/src/scheduler.rs", Some("/repos/engram"))?
			.expect("still known");
		println!(
			"  month {month}: decayed {changed} location(s), familiarity {:.3}",
			loc.familiarity
		);
		now += 31.0 * DAY_MS;
	}

	// The file gets renamed; its history follows.
	println!("\n=== Rename merge ===");
	let merged = engine
		.merge_locations(
			"/src/scheduler.rs",
			"/src/runtime/scheduler.rs",
			Some("/repos/engram"),
			now,
		)?
		.expect("old path existed");
	println!(
		"  {} now carries {} accesses, familiarity {:.3}",
		merged.path, merged.access_count, merged.familiarity
	);

	Ok(())
}
