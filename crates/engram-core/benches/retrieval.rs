//! Benchmarks for the full retrieval pipeline
//!
//! End-to-end retrieval over the in-memory store with:
//! - Various memory counts (100, 500, 1000)
//! - Various embedding dimensions (384, 768)
//! - With and without association edges
//!
//! Retrieval reinforces returned items (it appends access records), so
//! each measurement runs against a freshly seeded store.

#![allow(clippy::expect_used)] // Fine in benchmarks

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use engram_core::model::{Association, EmbeddingRecord, Memory, MemoryKind};
use engram_core::retrieval::{retrieve, Probe, RetrievalConfig, RetrievalRequest};
use engram_core::store::{MemStore, MemoryStore};
use rand::Rng;

const NOW_MS: f64 = 1.0e12;

fn normalized(dimensions: usize, rng: &mut impl Rng) -> Vec<f32> {
	let mut vec: Vec<f32> = (0..dimensions).map(|_| rng.gen::<f32>()).collect();
	let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
	if norm > 0.0 {
		for x in &mut vec {
			*x /= norm;
		}
	}
	vec
}

fn seeded_store(memories: usize, dimensions: usize, associations: usize) -> MemStore {
	let mut rng = rand::thread_rng();
	let store = MemStore::new();

	for i in 0..memories {
		let id = format!("m{i:05}");
		store
			.put_memory(&Memory {
				id: id.clone(),
				content: format!("memory number {i}"),
				gist: format!("memory number {i}"),
				kind: MemoryKind::Learning,
				emotional_weight: 0.5,
				tags: Vec::new(),
				project_id: None,
				access_count: 0,
				created_at_ms: NOW_MS - 30.0 * 86_400_000.0,
			})
			.expect("put memory");

		let accesses = rng.gen_range(1..15);
		for _ in 0..accesses {
			let ts = NOW_MS - rng.gen::<f64>() * 7.0 * 86_400_000.0;
			store.append_access(&id, ts).expect("append access");
		}

		store
			.put_embedding(&EmbeddingRecord {
				owner_id: id,
				vector: normalized(dimensions, &mut rng),
				model: "bench".into(),
			})
			.expect("put embedding");
	}

	let mut added = 0;
	while added < associations {
		let source = rng.gen_range(0..memories);
		let target = rng.gen_range(0..memories);
		if source == target {
			continue;
		}
		store
			.upsert_association(&Association {
				source_id: format!("m{source:05}"),
				target_id: format!("m{target:05}"),
				strength: rng.gen::<f64>().mul_add(0.8, 0.1),
				kind: "semantic".into(),
				last_reinforced_ms: NOW_MS,
			})
			.expect("upsert association");
		added += 1;
	}

	store
}

fn bench_retrieval_scaling(c: &mut Criterion) {
	let mut group = c.benchmark_group("retrieve/memories");
	let config = RetrievalConfig::default();
	let mut rng = rand::thread_rng();

	for memories in [100, 500, 1000] {
		let probe = normalized(384, &mut rng);
		let _ = group.bench_with_input(
			BenchmarkId::from_parameter(memories),
			&memories,
			|b, &memories| {
				b.iter_batched(
					|| seeded_store(memories, 384, 0),
					|store| {
						let request = RetrievalRequest::new(Probe::Vector(&probe));
						retrieve(black_box(&store), None, &request, &config, NOW_MS)
							.expect("retrieve")
					},
					BatchSize::LargeInput,
				);
			},
		);
	}
	group.finish();
}

fn bench_retrieval_dimensions(c: &mut Criterion) {
	let mut group = c.benchmark_group("retrieve/dimensions");
	let config = RetrievalConfig::default();
	let mut rng = rand::thread_rng();

	for dimensions in [384, 768] {
		let probe = normalized(dimensions, &mut rng);
		let _ = group.bench_with_input(
			BenchmarkId::from_parameter(dimensions),
			&dimensions,
			|b, &dimensions| {
				b.iter_batched(
					|| seeded_store(500, dimensions, 0),
					|store| {
						let request = RetrievalRequest::new(Probe::Vector(&probe));
						retrieve(black_box(&store), None, &request, &config, NOW_MS)
							.expect("retrieve")
					},
					BatchSize::LargeInput,
				);
			},
		);
	}
	group.finish();
}

fn bench_retrieval_with_spreading(c: &mut Criterion) {
	let mut group = c.benchmark_group("retrieve/associations");
	let config = RetrievalConfig::default();
	let mut rng = rand::thread_rng();
	let probe = normalized(384, &mut rng);

	for associations in [0, 500, 2000] {
		let _ = group.bench_with_input(
			BenchmarkId::from_parameter(associations),
			&associations,
			|b, &associations| {
				b.iter_batched(
					|| seeded_store(500, 384, associations),
					|store| {
						let request = RetrievalRequest::new(Probe::Vector(&probe));
						retrieve(black_box(&store), None, &request, &config, NOW_MS)
							.expect("retrieve")
					},
					BatchSize::LargeInput,
				);
			},
		);
	}
	group.finish();
}

criterion_group!(
	benches,
	bench_retrieval_scaling,
	bench_retrieval_dimensions,
	bench_retrieval_with_spreading
);
criterion_main!(benches);
