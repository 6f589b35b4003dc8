//! Source nodes: constant offset and sine oscillator.
//!
//! Both can run forever or stop after a fixed number of frames. A stopped
//! source reports itself finished; if nobody holds its handle the graph then
//! disconnects and finalizes it.

use std::sync::Arc;

use libm::sinf;
use rendergraph_core::{AudioProcessor, ProcessScope};

use crate::param::Param;

/// Remaining playback length of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Playback {
    remaining: Option<u64>,
}

impl Playback {
    pub(crate) fn new(stop_after: Option<u64>) -> Self {
        Self {
            remaining: stop_after,
        }
    }

    /// Consumes up to `frames` frames and returns how many are audible.
    fn advance(&mut self, frames: usize) -> usize {
        match &mut self.remaining {
            None => frames,
            Some(remaining) => {
                let audible = (*remaining).min(frames as u64) as usize;
                *remaining -= audible as u64;
                audible
            }
        }
    }

    fn is_finished(&self) -> bool {
        self.remaining == Some(0)
    }
}

/// Emits a constant offset on a single channel.
pub struct ConstantSource {
    offset: Arc<Param>,
    playback: Playback,
}

impl ConstantSource {
    /// Creates a constant source reading `offset` every quantum.
    pub fn new(offset: Arc<Param>, stop_after: Option<u64>) -> Self {
        Self {
            offset,
            playback: Playback::new(stop_after),
        }
    }
}

impl AudioProcessor for ConstantSource {
    fn process(&mut self, scope: &mut ProcessScope<'_>) {
        let frames = scope.frames();
        let audible = self.playback.advance(frames);
        let value = self.offset.get();
        let out = scope.output_mut(0);
        for c in 0..out.number_of_channels() {
            let channel = out.channel_mut(c);
            channel[..audible].fill(value);
            channel[audible..frames].fill(0.0);
        }
    }

    fn reset(&mut self) {}

    fn is_finished(&self) -> bool {
        self.playback.is_finished()
    }
}

/// Sine oscillator.
pub struct Oscillator {
    frequency: Arc<Param>,
    phase: f32,
    playback: Playback,
}

impl Oscillator {
    /// Creates an oscillator reading `frequency` (Hz) every quantum.
    pub fn new(frequency: Arc<Param>, stop_after: Option<u64>) -> Self {
        Self {
            frequency,
            phase: 0.0,
            playback: Playback::new(stop_after),
        }
    }
}

impl AudioProcessor for Oscillator {
    fn process(&mut self, scope: &mut ProcessScope<'_>) {
        let frames = scope.frames();
        let audible = self.playback.advance(frames);
        let step = self.frequency.get() / scope.sample_rate();
        let out = scope.output_mut(0);

        let mut phase = self.phase;
        let channel = out.channel_mut(0);
        for sample in &mut channel[..audible] {
            *sample = sinf(phase * core::f32::consts::TAU);
            phase = (phase + step).fract();
        }
        channel[audible..frames].fill(0.0);
        self.phase = phase;

        for c in 1..out.number_of_channels() {
            out.channel_mut(c)[..frames].fill(0.0);
        }
    }

    fn reset(&mut self) {
        self.phase = 0.0;
    }

    fn is_finished(&self) -> bool {
        self.playback.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endless_playback_is_always_audible() {
        let mut playback = Playback::new(None);
        assert_eq!(playback.advance(128), 128);
        assert!(!playback.is_finished());
    }

    #[test]
    fn bounded_playback_runs_out() {
        let mut playback = Playback::new(Some(200));
        assert_eq!(playback.advance(128), 128);
        assert!(!playback.is_finished());
        assert_eq!(playback.advance(128), 72);
        assert!(playback.is_finished());
        assert_eq!(playback.advance(128), 0);
    }
}
