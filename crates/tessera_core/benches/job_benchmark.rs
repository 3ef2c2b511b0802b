//! # Job Execution Benchmark
//!
//! Frame throughput of one job across worker counts: wake, partition,
//! process, barrier.
//!
//! Run with: `cargo bench --package tessera_core --bench job_benchmark`

// Benchmarks don't need docs
#![allow(missing_docs)]

use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tessera_core::{Chunk, Entity, Job, Quantity, System, SystemRef};

const COMPONENT_COUNT: u32 = 100_000;

#[derive(Clone, Copy, Default)]
struct Particle {
    pos: [f32; 2],
    vel: [f32; 2],
}

fn integrate(chunk: Chunk<'_, Particle>) -> Vec<Entity> {
    for component in chunk.components() {
        let mut p = component.lock();
        p.pos[0] += p.vel[0] * 0.016;
        p.pos[1] += p.vel[1] * 0.016;
    }
    Vec::new()
}

fn particles() -> SystemRef {
    let system = Arc::new(System::<Particle, _>::new(
        "particles",
        Quantity::One,
        integrate,
    ));
    for id in 0..COMPONENT_COUNT {
        system.create_with(
            Entity::from_raw(id),
            Particle {
                pos: [0.0; 2],
                vel: [1.0, -1.0],
            },
        )
        .unwrap();
    }
    system
}

/// Benchmark: one frame over 100k components.
fn bench_execute(c: &mut Criterion) {
    let mut group = c.benchmark_group("job_execute_100k");
    group.throughput(Throughput::Elements(u64::from(COMPONENT_COUNT)));

    for workers in [1usize, 2, 4, 8] {
        let mut job = Job::new("bench", vec![particles()], workers).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, _| {
            b.iter(|| job.execute().unwrap());
        });
    }

    group.finish();
}

/// Benchmark: wake + barrier cost with nothing to process.
fn bench_empty_frame(c: &mut Criterion) {
    let mut job = Job::new("empty", Vec::new(), 4).unwrap();

    c.bench_function("job_empty_frame_4_workers", |b| {
        b.iter(|| job.execute().unwrap());
    });
}

criterion_group!(benches, bench_execute, bench_empty_frame);
criterion_main!(benches);
