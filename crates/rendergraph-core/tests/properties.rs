//! Property tests for scheduling, channel resolution and reference counting.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use proptest::prelude::*;
use rendergraph_core::{
    AudioBus, AudioNode, AudioProcessor, ContextOptions, NodeType, OutputChannels, ProcessScope,
    RENDER_QUANTUM_FRAMES, RefType, RenderContext,
};

struct Counting(Arc<AtomicUsize>);

impl AudioProcessor for Counting {
    fn process(&mut self, scope: &mut ProcessScope<'_>) {
        self.0.fetch_add(1, Ordering::SeqCst);
        for o in 0..scope.number_of_outputs() {
            let bus = scope.output_mut(o);
            for c in 0..bus.number_of_channels() {
                bus.channel_mut(c).fill(0.5);
            }
        }
    }

    fn reset(&mut self) {}
}

fn node(context: &RenderContext, inputs: usize, output: OutputChannels) -> (AudioNode, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let node = context.create_node(NodeType::Custom, Box::new(Counting(Arc::clone(&calls))));
    for _ in 0..inputs {
        node.add_input().unwrap();
    }
    node.add_output(output).unwrap();
    (node, calls)
}

proptest! {
    #[test]
    fn fan_out_processes_once_per_quantum(branches in 1usize..8, depth in 1usize..4, quanta in 1usize..6) {
        let context = RenderContext::new(ContextOptions::default()).unwrap();
        let destination = context.destination();
        let (root, root_calls) = node(&context, 0, OutputChannels::Fixed(1));

        let mut counters = Vec::new();
        let mut keep = Vec::new();
        for _ in 0..branches {
            let mut upstream = root.clone();
            for _ in 0..depth {
                let (n, calls) = node(&context, 1, OutputChannels::FollowInput(0));
                upstream.connect(&n, 0, 0).unwrap();
                counters.push(calls);
                keep.push(upstream);
                upstream = n;
            }
            upstream.connect(&destination, 0, 0).unwrap();
            keep.push(upstream);
        }

        let mut out = AudioBus::new(2, RENDER_QUANTUM_FRAMES);
        for _ in 0..quanta {
            context.render_quantum(&mut out);
        }
        prop_assert_eq!(root_calls.load(Ordering::SeqCst), quanta);
        for calls in &counters {
            prop_assert_eq!(calls.load(Ordering::SeqCst), quanta);
        }
    }

    #[test]
    fn max_mode_resolves_to_widest_input(widths in prop::collection::vec(1usize..=8, 1..6)) {
        let context = RenderContext::new(ContextOptions::default()).unwrap();
        let (mixer, _) = node(&context, 1, OutputChannels::FollowInput(0));
        let sources: Vec<_> = widths
            .iter()
            .map(|&w| node(&context, 0, OutputChannels::Fixed(w)).0)
            .collect();

        for (k, source) in sources.iter().enumerate() {
            source.connect(&mixer, 0, 0).unwrap();
            let expected = widths[..=k].iter().copied().max().unwrap();
            prop_assert_eq!(mixer.input_channel_count(0), Ok(expected));
            prop_assert_eq!(mixer.output_channel_count(0), Ok(expected));
        }
    }

    #[test]
    fn max_mode_resolves_through_following_chain(
        widths in prop::collection::vec(1usize..=8, 1..5),
        depth in 1usize..6,
    ) {
        let context = RenderContext::new(ContextOptions::default()).unwrap();
        let (head, _) = node(&context, 1, OutputChannels::FollowInput(0));
        let mut chain = vec![head];
        for _ in 1..depth {
            let (next, _) = node(&context, 1, OutputChannels::FollowInput(0));
            chain.last().unwrap().connect(&next, 0, 0).unwrap();
            chain.push(next);
        }
        let tail = chain.last().unwrap();
        tail.connect(&context.destination(), 0, 0).unwrap();

        let sources: Vec<_> = widths
            .iter()
            .map(|&w| node(&context, 0, OutputChannels::Fixed(w)).0)
            .collect();
        for source in &sources {
            source.connect(&chain[0], 0, 0).unwrap();
        }
        let expected = widths.iter().copied().max().unwrap();

        prop_assert_eq!(tail.input_channel_count(0), Ok(expected));
        prop_assert_eq!(tail.output_channel_count(0), Ok(expected));

        let mut out = AudioBus::new(2, RENDER_QUANTUM_FRAMES);
        context.render_quantum(&mut out);
        prop_assert_eq!(tail.input_channel_count(0), Ok(expected));
        prop_assert_eq!(tail.output_channel_count(0), Ok(expected));
    }

    #[test]
    fn connection_refs_match_distinct_edges(edges in prop::collection::vec((0usize..4, 0usize..4), 0..24)) {
        let context = RenderContext::new(ContextOptions::default()).unwrap();
        let nodes: Vec<_> = (0..4)
            .map(|_| node(&context, 1, OutputChannels::Fixed(1)).0)
            .collect();

        for &(from, to) in &edges {
            nodes[from].connect(&nodes[to], 0, 0).unwrap();
        }

        let distinct: BTreeSet<_> = edges.iter().copied().collect();
        for (index, n) in nodes.iter().enumerate() {
            let touching: u32 = distinct
                .iter()
                .map(|&(from, to)| u32::from(from == index) + u32::from(to == index))
                .sum();
            prop_assert_eq!(n.ref_count(RefType::Connection), touching);
        }

        for n in &nodes {
            n.disconnect_all().unwrap();
        }
        for n in &nodes {
            prop_assert_eq!(n.ref_count(RefType::Connection), 0);
            prop_assert_eq!(n.ref_count(RefType::Normal), 1);
        }
    }
}
