//! Channel routing nodes: splitter and merger.

use rendergraph_core::{AudioProcessor, ProcessScope};

/// Routes each channel of its single input to its own mono output.
pub struct ChannelSplitter;

impl AudioProcessor for ChannelSplitter {
    fn process(&mut self, scope: &mut ProcessScope<'_>) {
        let frames = scope.frames();
        for o in 0..scope.number_of_outputs() {
            let (input, output) = scope.input_and_output(0, o);
            let dst = &mut output.channel_mut(0)[..frames];
            if o < input.number_of_channels() {
                dst.copy_from_slice(&input.channel(o)[..frames]);
            } else {
                dst.fill(0.0);
            }
        }
    }

    fn reset(&mut self) {}
}

/// Collects one mono input per channel into a single multi-channel output.
pub struct ChannelMerger;

impl AudioProcessor for ChannelMerger {
    fn process(&mut self, scope: &mut ProcessScope<'_>) {
        let frames = scope.frames();
        for i in 0..scope.number_of_inputs() {
            let (input, output) = scope.input_and_output(i, 0);
            if i >= output.number_of_channels() {
                break;
            }
            let dst = &mut output.channel_mut(i)[..frames];
            if input.number_of_channels() > 0 {
                dst.copy_from_slice(&input.channel(0)[..frames]);
            } else {
                dst.fill(0.0);
            }
        }
    }

    fn reset(&mut self) {}
}
