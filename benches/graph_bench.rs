//! Benchmarks for the pull engine and the convolution engine.
//!
//! Run with: cargo bench
//!
//! Reference timing at 44.1kHz:
//!   - 64 samples  = 1.45ms deadline
//!   - 128 samples = 2.90ms deadline
//!   - 256 samples = 5.80ms deadline
//!   - 512 samples = 11.6ms deadline

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use pullgraph::dsp::Convolver;
use pullgraph::{AudioConfig, Graph};

/// Common block sizes used in audio applications.
const BLOCK_SIZES: &[usize] = &[64, 128, 256, 512];

fn bench_pull_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph/pull_chain");

    for &size in BLOCK_SIZES {
        let mut graph = Graph::new(AudioConfig::new(44_100, size));
        let source = graph.add_source(1, |t, out| out[0] = (t as f32 * 0.01).sin());
        let gain = graph.add_transform(1, 1, |ins, _, outs| outs[0] = ins[0] * 0.5);
        let sink = graph.add_sink(1, |_, frame| {
            black_box(frame[0]);
        });

        let source_out = graph.channel(source, 0).unwrap();
        let gain_out = graph.channel(gain, 0).unwrap();
        graph
            .inputs(gain)
            .unwrap()
            .set_input(0, Some(source_out))
            .unwrap();
        graph
            .inputs(sink)
            .unwrap()
            .set_input(0, Some(gain_out))
            .unwrap();

        group.bench_with_input(BenchmarkId::new("src_gain_sink", size), &size, |b, _| {
            b.iter(|| {
                graph.pull_block(sink, size).unwrap();
            })
        });
    }
    group.finish();
}

fn bench_convolver(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/convolver");

    // a 100ms impulse at 44.1kHz
    let impulse: Vec<f32> = (0..4410)
        .map(|i| (-(i as f32) / 800.0).exp() * ((i * 31 % 17) as f32 / 17.0 - 0.5))
        .collect();

    for &size in BLOCK_SIZES {
        let mut conv = Convolver::new(&impulse, size).unwrap();
        let input: Vec<f32> = (0..size).map(|i| (i as f32 * 0.02).sin()).collect();
        let mut output = vec![0.0f32; size];

        group.bench_with_input(BenchmarkId::new("overlap_add", size), &size, |b, _| {
            b.iter(|| {
                conv.process_block(black_box(&input), black_box(&mut output))
                    .unwrap();
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_pull_chain, bench_convolver);
criterion_main!(benches);
