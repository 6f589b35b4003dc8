//! The demo graph rendered by the CLI.
//!
//! ```text
//! voice 0 ─┐
//! voice 1 ─┼─> bus ─┬───────────────> destination
//!   ...    │        ├─> delay ─┬────> destination
//! pings ───┘        │   ^      v
//!                   │   └─ feedback
//!                   └─> inspector (pulled automatically)
//! ```

use rendergraph_config::GraphSection;
use rendergraph_core::{GraphError, RENDER_QUANTUM_FRAMES, RenderContext};
use rendergraph_nodes::{ContextExt, DelayNode, GainNode, InspectorNode, OscillatorNode};

/// Ratio between neighbouring voices.
const VOICE_INTERVAL: f32 = 1.5;

/// How long a ping oscillator plays before it finishes.
pub const PING_FRAMES: u64 = 16 * RENDER_QUANTUM_FRAMES as u64;

/// Handles to the long-lived nodes of the demo graph.
pub struct DemoGraph {
    context: RenderContext,
    voices: Vec<OscillatorNode>,
    muted: Vec<bool>,
    bus: GainNode,
    feedback: Option<(DelayNode, GainNode)>,
    inspector: InspectorNode,
    pings: u64,
}

impl DemoGraph {
    /// Builds the graph on `context` and connects it to the destination.
    pub fn build(context: &RenderContext, section: &GraphSection) -> Result<Self, GraphError> {
        let destination = context.destination();
        let bus = context.create_gain(section.gain)?;
        bus.connect(&destination, 0, 0)?;

        let mut voices = Vec::with_capacity(section.voices);
        let mut frequency = section.base_frequency;
        for _ in 0..section.voices {
            let voice = context.create_oscillator(frequency, None)?;
            voice.connect(&bus, 0, 0)?;
            voices.push(voice);
            frequency *= VOICE_INTERVAL;
        }

        let feedback = if section.feedback_delay > 0.0 {
            let delay = context.create_delay(f64::from(section.feedback_delay), 1)?;
            delay.delay_time().set(section.feedback_delay);
            let gain = context.create_gain(section.feedback)?;
            bus.connect(&delay, 0, 0)?;
            delay.connect(&gain, 0, 0)?;
            gain.connect(&delay, 0, 0)?;
            delay.connect(&destination, 0, 0)?;
            Some((delay, gain))
        } else {
            None
        };

        let inspector = context.create_inspector()?;
        bus.connect(&inspector, 0, 0)?;

        tracing::info!(
            voices = voices.len(),
            feedback = feedback.is_some(),
            "demo graph built"
        );

        Ok(Self {
            context: context.clone(),
            muted: vec![false; voices.len()],
            voices,
            bus,
            feedback,
            inspector,
            pings: 0,
        })
    }

    /// Number of permanent voices.
    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Whether the voice is currently disconnected from the bus.
    pub fn is_muted(&self, voice: usize) -> bool {
        self.muted.get(voice).copied().unwrap_or(false)
    }

    /// Whether the delay feedback loop was built.
    pub fn has_feedback(&self) -> bool {
        self.feedback.is_some()
    }

    /// Peak level seen by the inspector in the last quantum.
    pub fn peak(&self) -> f32 {
        self.inspector.peak()
    }

    /// One-shot oscillators started so far.
    pub fn pings(&self) -> u64 {
        self.pings
    }

    /// Starts a one-shot oscillator an octave above `voice` and toggles
    /// `voice` on or off the bus, both in one locked step.
    ///
    /// The ping's handle is dropped here, so the node is finalized once it
    /// finishes playing.
    pub fn step(&mut self, voice: usize) -> Result<(), GraphError> {
        if self.voices.is_empty() {
            return Ok(());
        }
        let index = voice % self.voices.len();
        let frequency = self.voices[index].frequency().get() * 2.0;
        let ping = self.context.create_oscillator(frequency, Some(PING_FRAMES))?;

        let mut graph = self.context.lock();
        graph.connect(&ping, &self.bus, 0, 0)?;
        if self.muted[index] {
            graph.connect(&self.voices[index], &self.bus, 0, 0)?;
        } else {
            graph.disconnect_from(&self.voices[index], &self.bus)?;
        }
        drop(graph);

        self.muted[index] = !self.muted[index];
        self.pings += 1;
        tracing::debug!(
            voice = index,
            muted = self.muted[index],
            ping = %ping.id(),
            "demo graph step"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rendergraph_core::{AudioBus, ContextOptions, NodeType};

    fn render(context: &RenderContext, quanta: u64) -> AudioBus {
        let mut out = AudioBus::new(2, RENDER_QUANTUM_FRAMES);
        for _ in 0..quanta {
            context.render_quantum(&mut out);
        }
        out
    }

    #[test]
    fn builds_every_node() {
        let context = RenderContext::new(ContextOptions::default()).unwrap();
        let demo = DemoGraph::build(&context, &GraphSection::default()).unwrap();
        let counts = context.node_counts();

        assert_eq!(demo.voice_count(), 4);
        assert!(demo.has_feedback());
        assert_eq!(counts.get(&NodeType::Oscillator), Some(&4));
        assert_eq!(counts.get(&NodeType::Gain), Some(&2));
        assert_eq!(counts.get(&NodeType::Delay), Some(&1));
        assert_eq!(counts.get(&NodeType::BasicInspector), Some(&1));

        let out = render(&context, 1);
        assert!(out.peak() > 0.0);
        assert!(demo.peak() > 0.0);
    }

    #[test]
    fn zero_delay_skips_feedback_loop() {
        let context = RenderContext::new(ContextOptions::default()).unwrap();
        let section = GraphSection {
            feedback_delay: 0.0,
            ..GraphSection::default()
        };
        let demo = DemoGraph::build(&context, &section).unwrap();
        assert!(!demo.has_feedback());
        assert_eq!(context.node_counts().get(&NodeType::Delay), None);
    }

    #[test]
    fn step_toggles_voice_and_finalizes_ping() {
        let context = RenderContext::new(ContextOptions::default()).unwrap();
        let mut demo = DemoGraph::build(&context, &GraphSection::default()).unwrap();
        render(&context, 1);

        demo.step(1).unwrap();
        assert!(demo.is_muted(1));
        assert!(demo.voices[1].is_disabled());
        assert_eq!(context.node_counts().get(&NodeType::Oscillator), Some(&5));

        render(&context, PING_FRAMES / RENDER_QUANTUM_FRAMES as u64 + 1);
        assert_eq!(context.node_counts().get(&NodeType::Oscillator), Some(&4));

        demo.step(1).unwrap();
        assert!(!demo.is_muted(1));
        assert!(!demo.voices[1].is_disabled());
        assert_eq!(demo.pings(), 2);
    }
}
