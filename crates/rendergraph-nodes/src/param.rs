//! Lock-free node parameters.
//!
//! A [`Param`] is shared between a node handle on the control thread and the
//! node's processor on the render thread. Writes never block the render
//! thread; the processor reads the latest value once per quantum.

use core::sync::atomic::Ordering;

use atomic_float::AtomicF32;

/// A clamped `f32` parameter readable from the render thread without locking.
#[derive(Debug)]
pub struct Param {
    value: AtomicF32,
    default: f32,
    min: f32,
    max: f32,
}

impl Param {
    /// Creates a parameter with the given default and inclusive range.
    pub fn new(default: f32, min: f32, max: f32) -> Self {
        debug_assert!(min <= max, "parameter range is inverted");
        Self {
            value: AtomicF32::new(default.clamp(min, max)),
            default,
            min,
            max,
        }
    }

    /// Returns the current value.
    #[inline]
    pub fn get(&self) -> f32 {
        self.value.load(Ordering::Acquire)
    }

    /// Sets the value, clamped to the parameter range. Non-finite values are
    /// ignored.
    #[inline]
    pub fn set(&self, value: f32) {
        if value.is_finite() {
            self.value.store(value.clamp(self.min, self.max), Ordering::Release);
        }
    }

    /// Restores the default value.
    pub fn reset(&self) {
        self.set(self.default);
    }

    /// Returns the default value.
    pub fn default_value(&self) -> f32 {
        self.default
    }

    /// Returns the inclusive `(min, max)` range.
    pub fn range(&self) -> (f32, f32) {
        (self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_clamps_to_range() {
        let param = Param::new(1.0, 0.0, 2.0);
        param.set(5.0);
        assert_eq!(param.get(), 2.0);
        param.set(-1.0);
        assert_eq!(param.get(), 0.0);
    }

    #[test]
    fn non_finite_values_are_ignored() {
        let param = Param::new(0.5, 0.0, 1.0);
        param.set(f32::NAN);
        param.set(f32::INFINITY);
        assert_eq!(param.get(), 0.5);
    }

    #[test]
    fn reset_restores_default() {
        let param = Param::new(0.25, 0.0, 1.0);
        param.set(0.75);
        param.reset();
        assert_eq!(param.get(), 0.25);
        assert_eq!(param.range(), (0.0, 1.0));
    }
}
