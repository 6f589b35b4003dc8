//! The per-kind processing trait.
//!
//! The graph engine never knows what a node *does*. Each node kind
//! (oscillator, gain, delay, destination, ...) implements [`AudioProcessor`]
//! and the scheduler drives it through that interface alone.
//!
//! ## Design Decisions
//!
//! - **Inputs are ready**: by the time [`process()`](AudioProcessor::process)
//!   runs, every input bus already holds the summed, channel-converted signal
//!   of the current quantum.
//! - **Real-time safe**: `process()` runs on the render thread with the graph
//!   lock held. It must not block, lock or allocate.
//! - **Silence shortcut**: when every input is silent and
//!   [`propagates_silence()`](AudioProcessor::propagates_silence) holds, the
//!   scheduler zero-fills the outputs instead of calling `process()`.

use crate::bus::AudioBus;
use crate::port::{NodeInput, NodeOutput};

/// Processing behavior of one node kind.
///
/// # Example
///
/// ```rust
/// use rendergraph_core::{AudioProcessor, ProcessScope};
///
/// /// Halves its input.
/// struct Attenuate;
///
/// impl AudioProcessor for Attenuate {
///     fn process(&mut self, scope: &mut ProcessScope<'_>) {
///         let (input, output) = scope.input_and_output(0, 0);
///         for channel in 0..output.number_of_channels() {
///             let src = input.channel(channel);
///             for (out, s) in output.channel_mut(channel).iter_mut().zip(src) {
///                 *out = s * 0.5;
///             }
///         }
///     }
///
///     fn reset(&mut self) {}
/// }
/// ```
pub trait AudioProcessor: Send {
    /// Renders one quantum from the input buses into the output buses.
    fn process(&mut self, scope: &mut ProcessScope<'_>);

    /// Clears DSP state (delay lines, filter memory) without touching settings.
    fn reset(&mut self);

    /// Seconds of non-silent output that may follow continuous silent input.
    fn tail_time(&self) -> f64 {
        0.0
    }

    /// Seconds between non-silent input and the corresponding output, caused
    /// by the processing algorithm itself.
    fn latency_time(&self) -> f64 {
        0.0
    }

    /// Returns true if silent input would produce silent output right now.
    ///
    /// `last_non_silent_time` is the end time of the last quantum whose inputs
    /// carried signal. The default accounts for tail and latency.
    fn propagates_silence(&self, last_non_silent_time: f64, current_time: f64) -> bool {
        last_non_silent_time + self.latency_time() + self.tail_time() < current_time
    }

    /// Called when the node is initialized. Allocate kernels here, not in `new`.
    fn initialize(&mut self, _sample_rate: f32) {}

    /// Called when the node is uninitialized or finalized.
    fn uninitialize(&mut self) {}

    /// Returns true once a one-shot source has played out.
    ///
    /// A finished node with no control-side handles is disconnected after the
    /// quantum so that it can be finalized.
    fn is_finished(&self) -> bool {
        false
    }

    /// Returns true for nodes that must be processed every quantum even when
    /// nothing downstream pulls them (analysers, inspectors).
    fn requires_automatic_pull(&self) -> bool {
        false
    }

    /// Called once, under the graph lock, just before the node is dropped.
    fn did_become_marked_for_deletion(&mut self) {}
}

/// The view of a node's ports handed to [`AudioProcessor::process`].
pub struct ProcessScope<'a> {
    inputs: &'a [NodeInput],
    outputs: &'a mut [NodeOutput],
    frames: usize,
    current_time: f64,
    sample_rate: f32,
}

impl<'a> ProcessScope<'a> {
    pub(crate) fn new(
        inputs: &'a [NodeInput],
        outputs: &'a mut [NodeOutput],
        frames: usize,
        current_time: f64,
        sample_rate: f32,
    ) -> Self {
        Self {
            inputs,
            outputs,
            frames,
            current_time,
            sample_rate,
        }
    }

    /// Number of frames to render this quantum.
    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Context time in seconds at the start of the quantum.
    #[inline]
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Node sample rate in Hz.
    #[inline]
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Number of input ports.
    #[inline]
    pub fn number_of_inputs(&self) -> usize {
        self.inputs.len()
    }

    /// Number of output ports.
    #[inline]
    pub fn number_of_outputs(&self) -> usize {
        self.outputs.len()
    }

    /// Returns the summed bus of input `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= number_of_inputs()`.
    #[inline]
    pub fn input(&self, index: usize) -> &AudioBus {
        &self.inputs[index].bus
    }

    /// Returns the bus of output `index` for writing.
    ///
    /// # Panics
    ///
    /// Panics if `index >= number_of_outputs()`.
    #[inline]
    pub fn output_mut(&mut self, index: usize) -> &mut AudioBus {
        &mut self.outputs[index].bus
    }

    /// Borrows input `input` and output `output` at the same time.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range.
    #[inline]
    pub fn input_and_output(&mut self, input: usize, output: usize) -> (&AudioBus, &mut AudioBus) {
        (&self.inputs[input].bus, &mut self.outputs[output].bus)
    }
}
