//! Per-channel audio storage for one render quantum.
//!
//! An [`AudioBus`] holds `number_of_channels` planar channels of `length`
//! frames each, plus a silence flag that lets the scheduler skip work for
//! nodes whose inputs carry nothing.
//!
//! Summing one bus into another converts between channel counts according to
//! a [`ChannelInterpretation`]: `Discrete` truncates or zero-pads channel by
//! channel, `Speakers` applies the standard mono/stereo/quad/5.1 up- and
//! down-mix matrices and falls back to discrete mixing for other layouts.
//!
//! Channel storage is retained when the channel count shrinks, so a port whose
//! count oscillates does not reallocate in the render path.

use crate::channel::ChannelInterpretation;

const MONO: usize = 1;
const STEREO: usize = 2;
const QUAD: usize = 4;
const FIVE_ONE: usize = 6;

const SQRT_HALF: f32 = core::f32::consts::FRAC_1_SQRT_2;

/// One entry of a speaker mixing matrix: `(destination, source, gain)`.
type MixTerm = (usize, usize, f32);

/// Returns the speaker mixing matrix for a source/destination layout pair.
///
/// Channel order follows the usual layout conventions: stereo is `L R`, quad
/// is `L R SL SR`, and 5.1 is `L R C LFE SL SR`.
fn speaker_matrix(source: usize, destination: usize) -> Option<&'static [MixTerm]> {
    let matrix: &'static [MixTerm] = match (source, destination) {
        // Up-mix
        (MONO, STEREO) | (MONO, QUAD) => &[(0, 0, 1.0), (1, 0, 1.0)],
        (MONO, FIVE_ONE) => &[(2, 0, 1.0)],
        (STEREO, QUAD) | (STEREO, FIVE_ONE) => &[(0, 0, 1.0), (1, 1, 1.0)],
        (QUAD, FIVE_ONE) => &[(0, 0, 1.0), (1, 1, 1.0), (4, 2, 1.0), (5, 3, 1.0)],
        // Down-mix
        (STEREO, MONO) => &[(0, 0, 0.5), (0, 1, 0.5)],
        (QUAD, MONO) => &[(0, 0, 0.25), (0, 1, 0.25), (0, 2, 0.25), (0, 3, 0.25)],
        (FIVE_ONE, MONO) => &[
            (0, 0, SQRT_HALF),
            (0, 1, SQRT_HALF),
            (0, 2, 1.0),
            (0, 4, 0.5),
            (0, 5, 0.5),
        ],
        (QUAD, STEREO) => &[(0, 0, 0.5), (0, 2, 0.5), (1, 1, 0.5), (1, 3, 0.5)],
        (FIVE_ONE, STEREO) => &[
            (0, 0, 1.0),
            (0, 2, SQRT_HALF),
            (0, 4, SQRT_HALF),
            (1, 1, 1.0),
            (1, 2, SQRT_HALF),
            (1, 5, SQRT_HALF),
        ],
        (FIVE_ONE, QUAD) => &[
            (0, 0, 1.0),
            (0, 2, SQRT_HALF),
            (1, 1, 1.0),
            (1, 2, SQRT_HALF),
            (2, 4, 1.0),
            (3, 5, 1.0),
        ],
        _ => return None,
    };
    Some(matrix)
}

/// Planar multi-channel audio buffer covering one render quantum.
#[derive(Debug, Clone)]
pub struct AudioBus {
    channels: Vec<Vec<f32>>,
    active: usize,
    length: usize,
    silent: bool,
}

impl AudioBus {
    /// Creates a silent bus with the given channel count and frame length.
    pub fn new(number_of_channels: usize, length: usize) -> Self {
        Self {
            channels: (0..number_of_channels).map(|_| vec![0.0; length]).collect(),
            active: number_of_channels,
            length,
            silent: true,
        }
    }

    /// Creates a bus with no channels and no storage.
    ///
    /// Ports hold an empty bus until their node is initialized.
    pub fn empty() -> Self {
        Self::new(0, 0)
    }

    /// Returns the number of active channels.
    #[inline]
    pub fn number_of_channels(&self) -> usize {
        self.active
    }

    /// Returns the number of frames per channel.
    #[inline]
    pub fn length(&self) -> usize {
        self.length
    }

    /// Changes the active channel count.
    ///
    /// Storage for channels beyond the current capacity is allocated; storage
    /// is never released when shrinking. New channels start silent.
    pub fn set_number_of_channels(&mut self, number_of_channels: usize) {
        while self.channels.len() < number_of_channels {
            self.channels.push(vec![0.0; self.length]);
        }
        for channel in &mut self.channels[self.active.min(number_of_channels)..number_of_channels] {
            channel.fill(0.0);
        }
        self.active = number_of_channels;
    }

    /// Returns the samples of channel `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= number_of_channels()`.
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        assert!(index < self.active, "channel {index} out of range");
        &self.channels[index]
    }

    /// Returns the samples of channel `index` for writing.
    ///
    /// Writing through this slice makes the bus non-silent.
    ///
    /// # Panics
    ///
    /// Panics if `index >= number_of_channels()`.
    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        assert!(index < self.active, "channel {index} out of range");
        self.silent = false;
        &mut self.channels[index]
    }

    /// Returns true if the bus is known to contain only zeros.
    #[inline]
    pub fn is_silent(&self) -> bool {
        self.silent
    }

    /// Marks the bus as carrying signal without touching its samples.
    #[inline]
    pub fn clear_silent_flag(&mut self) {
        self.silent = false;
    }

    /// Fills every active channel with zeros and marks the bus silent.
    pub fn zero(&mut self) {
        if !self.silent {
            for channel in &mut self.channels[..self.active] {
                channel.fill(0.0);
            }
        }
        self.silent = true;
    }

    /// Replaces this bus's contents with `source`, converting channel counts.
    pub fn copy_from(&mut self, source: &AudioBus, interpretation: ChannelInterpretation) {
        self.zero();
        self.sum_from(source, interpretation);
    }

    /// Adds `source` into this bus, converting channel counts.
    ///
    /// A silent source leaves the bus untouched.
    pub fn sum_from(&mut self, source: &AudioBus, interpretation: ChannelInterpretation) {
        if source.is_silent() {
            return;
        }
        let frames = self.length.min(source.length);
        let (src_channels, dst_channels) = (source.active, self.active);

        let matrix = if interpretation == ChannelInterpretation::Speakers
            && src_channels != dst_channels
        {
            speaker_matrix(src_channels, dst_channels)
        } else {
            None
        };

        match matrix {
            Some(terms) => {
                for &(dst, src, gain) in terms {
                    mix_into(
                        &mut self.channels[dst][..frames],
                        &source.channels[src][..frames],
                        gain,
                    );
                }
            }
            None => {
                for index in 0..src_channels.min(dst_channels) {
                    mix_into(
                        &mut self.channels[index][..frames],
                        &source.channels[index][..frames],
                        1.0,
                    );
                }
            }
        }
        self.silent = false;
    }

    /// Multiplies every active channel by `gain`.
    pub fn scale(&mut self, gain: f32) {
        if self.silent {
            return;
        }
        for channel in &mut self.channels[..self.active] {
            for sample in channel.iter_mut() {
                *sample *= gain;
            }
        }
    }

    /// Returns the largest absolute sample value across active channels.
    pub fn peak(&self) -> f32 {
        if self.silent {
            return 0.0;
        }
        self.channels[..self.active]
            .iter()
            .flat_map(|channel| channel.iter())
            .fold(0.0_f32, |peak, &s| peak.max(s.abs()))
    }
}

impl Default for AudioBus {
    fn default() -> Self {
        Self::empty()
    }
}

#[inline]
fn mix_into(dst: &mut [f32], src: &[f32], gain: f32) {
    if gain == 1.0 {
        for (d, s) in dst.iter_mut().zip(src) {
            *d += *s;
        }
    } else {
        for (d, s) in dst.iter_mut().zip(src) {
            *d += *s * gain;
        }
    }
}
