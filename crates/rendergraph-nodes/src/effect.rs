//! Effect nodes: gain and delay.

use std::sync::Arc;

use libm::roundf;
use rendergraph_core::{AudioProcessor, ProcessScope, RENDER_QUANTUM_FRAMES};

use crate::param::Param;

/// Multiplies its input by a gain parameter.
///
/// The output follows the input's resolved channel count.
pub struct Gain {
    gain: Arc<Param>,
}

impl Gain {
    /// Creates a gain processor reading `gain` every quantum.
    pub fn new(gain: Arc<Param>) -> Self {
        Self { gain }
    }
}

impl AudioProcessor for Gain {
    fn process(&mut self, scope: &mut ProcessScope<'_>) {
        let gain = self.gain.get();
        let frames = scope.frames();
        let (input, output) = scope.input_and_output(0, 0);
        for c in 0..output.number_of_channels() {
            let src = &input.channel(c)[..frames];
            for (out, s) in output.channel_mut(c)[..frames].iter_mut().zip(src) {
                *out = s * gain;
            }
        }
    }

    fn reset(&mut self) {}
}

/// Fixed-channel delay line.
///
/// The input is configured with an explicit channel count so the ring buffers
/// can be sized once, in [`initialize()`](AudioProcessor::initialize). With a
/// delay of at least one render quantum it breaks the same-quantum dependency
/// of a feedback loop.
pub struct Delay {
    delay_time: Arc<Param>,
    max_delay_time: f64,
    channels: usize,
    lines: Vec<Vec<f32>>,
    write: usize,
    sample_rate: f32,
}

impl Delay {
    /// Creates a delay of `channels` channels holding up to `max_delay_time`
    /// seconds. `delay_time` is read in seconds.
    pub fn new(delay_time: Arc<Param>, max_delay_time: f64, channels: usize) -> Self {
        Self {
            delay_time,
            max_delay_time,
            channels,
            lines: Vec::new(),
            write: 0,
            sample_rate: 0.0,
        }
    }

    fn line_length(&self) -> usize {
        self.lines.first().map_or(0, Vec::len)
    }
}

impl AudioProcessor for Delay {
    fn initialize(&mut self, sample_rate: f32) {
        let max_frames = (self.max_delay_time * f64::from(sample_rate)).ceil() as usize;
        let length = max_frames + RENDER_QUANTUM_FRAMES + 1;
        self.lines = vec![vec![0.0; length]; self.channels];
        self.write = 0;
        self.sample_rate = sample_rate;
        #[cfg(feature = "tracing")]
        tracing::debug!(
            "delay_init: {} channels, {length} frames per line",
            self.channels
        );
    }

    fn uninitialize(&mut self) {
        self.lines = Vec::new();
    }

    fn process(&mut self, scope: &mut ProcessScope<'_>) {
        let length = self.line_length();
        if length == 0 {
            return;
        }
        let frames = scope.frames();
        let delay = roundf(self.delay_time.get() * self.sample_rate) as usize;
        let delay = delay.min(length - 1);

        let (input, output) = scope.input_and_output(0, 0);
        let channels = self.channels.min(output.number_of_channels());
        for c in 0..channels {
            let line = &mut self.lines[c];
            let src = input.channel(c);
            let dst = output.channel_mut(c);
            let mut write = self.write;
            for frame in 0..frames {
                line[write] = src[frame];
                let read = (write + length - delay) % length;
                dst[frame] = line[read];
                write = (write + 1) % length;
            }
        }
        for c in channels..output.number_of_channels() {
            output.channel_mut(c).fill(0.0);
        }
        self.write = (self.write + frames) % length;
    }

    fn reset(&mut self) {
        for line in &mut self.lines {
            line.fill(0.0);
        }
        self.write = 0;
    }

    fn tail_time(&self) -> f64 {
        self.max_delay_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_sizes_lines_on_initialize() {
        let mut delay = Delay::new(Arc::new(Param::new(0.0, 0.0, 1.0)), 0.5, 2);
        assert_eq!(delay.line_length(), 0);
        delay.initialize(1000.0);
        assert_eq!(delay.lines.len(), 2);
        assert_eq!(delay.line_length(), 500 + RENDER_QUANTUM_FRAMES + 1);
        delay.uninitialize();
        assert_eq!(delay.line_length(), 0);
    }

    #[test]
    fn delay_reports_tail() {
        let delay = Delay::new(Arc::new(Param::new(0.1, 0.0, 1.0)), 1.0, 1);
        assert_eq!(delay.tail_time(), 1.0);
    }
}
