//! Pass-through node that meters its input.
//!
//! An inspector is processed every quantum even when its output feeds
//! nothing, so a meter stays live while it is only tapped off a signal path.

use core::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use atomic_float::AtomicF32;
use rendergraph_core::{AudioProcessor, ProcessScope};

/// Readings published by an [`Inspector`] for the control thread.
#[derive(Debug, Default)]
pub struct InspectorState {
    peak: AtomicF32,
    quanta: AtomicU64,
}

impl InspectorState {
    /// Peak absolute sample of the most recent quantum.
    pub fn peak(&self) -> f32 {
        self.peak.load(Ordering::Acquire)
    }

    /// Number of quanta the inspector has seen.
    pub fn quanta(&self) -> u64 {
        self.quanta.load(Ordering::Acquire)
    }
}

/// Copies input 0 to output 0 and records its peak level.
pub struct Inspector {
    state: Arc<InspectorState>,
}

impl Inspector {
    /// Creates an inspector publishing into `state`.
    pub fn new(state: Arc<InspectorState>) -> Self {
        Self { state }
    }
}

impl AudioProcessor for Inspector {
    fn process(&mut self, scope: &mut ProcessScope<'_>) {
        let peak = scope.input(0).peak();
        let (input, output) = scope.input_and_output(0, 0);
        for c in 0..output.number_of_channels() {
            output.channel_mut(c).copy_from_slice(input.channel(c));
        }
        self.state.peak.store(peak, Ordering::Release);
        self.state.quanta.fetch_add(1, Ordering::AcqRel);
    }

    fn reset(&mut self) {
        self.state.peak.store(0.0, Ordering::Release);
    }

    // Counts silent quanta too.
    fn propagates_silence(&self, _last_non_silent_time: f64, _current_time: f64) -> bool {
        false
    }

    fn requires_automatic_pull(&self) -> bool {
        true
    }
}
