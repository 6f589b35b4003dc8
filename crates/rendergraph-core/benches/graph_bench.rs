//! Criterion benchmarks for render-graph traversal
//!
//! Run with: cargo bench -p rendergraph-core
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rendergraph_core::{
    AudioBus, AudioNode, AudioProcessor, ContextOptions, NodeType, OutputChannels, ProcessScope,
    RENDER_QUANTUM_FRAMES, RenderContext,
};

const FAN_OUT: &[usize] = &[1, 4, 16, 64];

struct Tone {
    phase: f32,
}

impl AudioProcessor for Tone {
    fn process(&mut self, scope: &mut ProcessScope<'_>) {
        let step = 440.0 / scope.sample_rate();
        let bus = scope.output_mut(0);
        let mut phase = self.phase;
        for sample in bus.channel_mut(0).iter_mut() {
            *sample = (phase * std::f32::consts::TAU).sin() * 0.1;
            phase = (phase + step).fract();
        }
        self.phase = phase;
    }

    fn reset(&mut self) {
        self.phase = 0.0;
    }
}

struct Scale(f32);

impl AudioProcessor for Scale {
    fn process(&mut self, scope: &mut ProcessScope<'_>) {
        let (input, output) = scope.input_and_output(0, 0);
        for c in 0..output.number_of_channels() {
            for (out, s) in output.channel_mut(c).iter_mut().zip(input.channel(c)) {
                *out = s * self.0;
            }
        }
    }

    fn reset(&mut self) {}
}

/// One tone fanned out to `branches` gain nodes, all summed at the destination.
fn fan_out_graph(branches: usize) -> (RenderContext, Vec<AudioNode>) {
    let context = RenderContext::new(ContextOptions::default()).unwrap();
    let destination = context.destination();
    let tone = context.create_node(NodeType::Oscillator, Box::new(Tone { phase: 0.0 }));
    tone.add_output(OutputChannels::Fixed(1)).unwrap();

    let mut nodes = vec![tone.clone()];
    for _ in 0..branches {
        let gain = context.create_node(NodeType::Gain, Box::new(Scale(0.5)));
        gain.add_input().unwrap();
        gain.add_output(OutputChannels::FollowInput(0)).unwrap();
        tone.connect(&gain, 0, 0).unwrap();
        gain.connect(&destination, 0, 0).unwrap();
        nodes.push(gain);
    }
    (context, nodes)
}

fn bench_render_quantum(c: &mut Criterion) {
    let mut group = c.benchmark_group("RenderQuantum");

    for &branches in FAN_OUT {
        group.bench_with_input(
            BenchmarkId::new("fan_out", branches),
            &branches,
            |b, &branches| {
                let (context, _nodes) = fan_out_graph(branches);
                let mut out = AudioBus::new(2, RENDER_QUANTUM_FRAMES);
                b.iter(|| {
                    context.render_quantum(black_box(&mut out));
                });
            },
        );
    }

    group.finish();
}

fn bench_topology_mutation(c: &mut Criterion) {
    let mut group = c.benchmark_group("Topology");

    group.bench_function("connect_disconnect", |b| {
        let (context, nodes) = fan_out_graph(4);
        let destination = context.destination();
        let tone = &nodes[0];
        b.iter(|| {
            tone.connect(black_box(&destination), 0, 0).unwrap();
            tone.disconnect_from(black_box(&destination)).unwrap();
        });
    });

    group.bench_function("create_and_release", |b| {
        let context = RenderContext::new(ContextOptions::default()).unwrap();
        b.iter(|| {
            let node = context.create_node(NodeType::Gain, Box::new(Scale(1.0)));
            drop(black_box(node));
        });
    });

    group.finish();
}

criterion_group!(benches, bench_render_quantum, bench_topology_mutation);
criterion_main!(benches);
