use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use tm_runtime::transport::{
    messages::{InsMessage, PlantOutputs},
    ring_buffer::RingBuffer,
};

fn ring_write_bench(c: &mut Criterion) {
    let ring = RingBuffer::<PlantOutputs>::in_process(8).unwrap();
    let state = PlantOutputs {
        north: 1.0,
        down: -10.0,
        main_rotor_speed: 400.0,
        ..Default::default()
    };

    c.bench_function("ring_write_plant_outputs", |b| {
        b.iter(|| ring.write(black_box(&state)))
    });
}

fn ring_read_bench(c: &mut Criterion) {
    let ring = RingBuffer::<InsMessage>::in_process(8).unwrap();
    for i in 0..20 {
        ring.write(&InsMessage {
            north: i as f32,
            ..Default::default()
        });
    }

    let mut group = c.benchmark_group("ring_read");
    group.bench_function("latest", |b| b.iter(|| black_box(ring.read())));
    group.bench_function("snapshot", |b| b.iter(|| black_box(ring.snapshot())));
    group.finish();
}

criterion_group!(benches, ring_write_bench, ring_read_bench);
criterion_main!(benches);
