//! Integration tests for the concrete node kinds.

use proptest::prelude::*;
use rendergraph_core::{
    AudioBus, ContextOptions, GraphError, NodeType, RENDER_QUANTUM_FRAMES, RenderContext,
};
use rendergraph_nodes::ContextExt;

fn context() -> RenderContext {
    RenderContext::new(ContextOptions::default()).unwrap()
}

/// Renders `quanta` quanta and returns the first left sample of each.
fn first_samples(context: &RenderContext, quanta: usize) -> Vec<f32> {
    let mut out = AudioBus::new(2, RENDER_QUANTUM_FRAMES);
    (0..quanta)
        .map(|_| {
            context.render_quantum(&mut out);
            out.channel(0)[0]
        })
        .collect()
}

#[test]
fn gain_tracks_parameter_changes() {
    let context = context();
    let source = context.create_constant_source(0.8, None).unwrap();
    let gain = context.create_gain(0.5).unwrap();
    source.connect(&gain, 0, 0).unwrap();
    gain.connect(&context.destination(), 0, 0).unwrap();

    assert_eq!(first_samples(&context, 1), vec![0.4]);
    gain.gain().set(0.0);
    assert_eq!(first_samples(&context, 1), vec![0.0]);
    source.offset().set(1.0);
    gain.gain().set(2.0);
    assert_eq!(first_samples(&context, 1), vec![2.0]);
}

#[test]
fn feedback_loop_through_delay() {
    let context = context();
    let delay = context.create_delay(1.0, 1).unwrap();
    delay
        .delay_time()
        .set(RENDER_QUANTUM_FRAMES as f32 / context.sample_rate());
    let feedback = context.create_gain(0.5).unwrap();
    let impulse = context
        .create_constant_source(1.0, Some(RENDER_QUANTUM_FRAMES as u64))
        .unwrap();

    impulse.connect(&delay, 0, 0).unwrap();
    delay.connect(&feedback, 0, 0).unwrap();
    feedback.connect(&delay, 0, 0).unwrap();
    delay.connect(&context.destination(), 0, 0).unwrap();
    drop(impulse);

    // Each trip round the loop costs the delay plus one quantum for the
    // back-edge.
    assert_eq!(
        first_samples(&context, 6),
        vec![0.0, 1.0, 0.0, 0.5, 0.0, 0.25]
    );
    assert_eq!(context.node_counts().get(&NodeType::ConstantSource), None);
}

#[test]
fn merger_and_splitter_route_channels() {
    let context = context();
    let left = context.create_constant_source(1.0, None).unwrap();
    let right = context.create_constant_source(2.0, None).unwrap();
    let merger = context.create_channel_merger(2).unwrap();
    let splitter = context.create_channel_splitter(2).unwrap();

    left.connect(&merger, 0, 0).unwrap();
    right.connect(&merger, 0, 1).unwrap();
    merger.connect(&splitter, 0, 0).unwrap();
    splitter.connect(&context.destination(), 1, 0).unwrap();

    assert_eq!(merger.output_channel_count(0), Ok(2));
    assert_eq!(splitter.input_channel_count(0), Ok(2));
    assert_eq!(splitter.number_of_outputs(), 2);
    assert_eq!(first_samples(&context, 1), vec![2.0]);
}

#[test]
fn inspector_is_pulled_without_consumers() {
    let context = context();
    let source = context.create_constant_source(-0.75, None).unwrap();
    let inspector = context.create_inspector().unwrap();
    source.connect(&inspector, 0, 0).unwrap();

    first_samples(&context, 3);
    assert_eq!(inspector.quanta(), 3);
    assert_eq!(inspector.peak(), 0.75);
}

#[test]
fn one_shot_oscillator_is_finalized() {
    let context = context();
    let oscillator = context
        .create_oscillator(440.0, Some(2 * RENDER_QUANTUM_FRAMES as u64))
        .unwrap();
    oscillator.connect(&context.destination(), 0, 0).unwrap();
    drop(oscillator);

    let mut out = AudioBus::new(2, RENDER_QUANTUM_FRAMES);
    context.render_quantum(&mut out);
    assert!(out.peak() > 0.5);
    context.render_quantum(&mut out);
    assert_eq!(context.node_counts().get(&NodeType::Oscillator), None);

    context.render_quantum(&mut out);
    assert!(out.is_silent());
}

#[test]
fn delay_rejects_bad_configuration() {
    let context = context();
    assert!(matches!(
        context.create_delay(0.0, 1),
        Err(GraphError::InvalidState(_))
    ));
    assert!(matches!(
        context.create_delay(f64::NAN, 1),
        Err(GraphError::InvalidState(_))
    ));
    assert!(matches!(
        context.create_delay(1.0, 0),
        Err(GraphError::InvalidChannelCount(0))
    ));
    assert!(matches!(
        context.create_channel_splitter(64),
        Err(GraphError::InvalidChannelCount(64))
    ));
}

proptest! {
    #[test]
    fn gain_scales_its_input(offset in -1.0f32..1.0, gain in -4.0f32..4.0) {
        let context = context();
        let source = context.create_constant_source(offset, None).unwrap();
        let node = context.create_gain(gain).unwrap();
        source.connect(&node, 0, 0).unwrap();
        node.connect(&context.destination(), 0, 0).unwrap();

        let mut out = AudioBus::new(2, RENDER_QUANTUM_FRAMES);
        context.render_quantum(&mut out);
        prop_assert_eq!(out.channel(0)[0], offset * gain);
        prop_assert_eq!(out.channel(1)[RENDER_QUANTUM_FRAMES - 1], offset * gain);
    }
}
