//! Dual reference counting for graph nodes.
//!
//! A node is owned by two independent domains. Control-side handles hold
//! [`RefType::Normal`] references; every graph edge holds a
//! [`RefType::Connection`] reference on both of its endpoints. A source whose
//! last handle was dropped keeps playing while it is connected, and a
//! connected node whose owner lost interest can still be torn down once the
//! graph lets go of it.
//!
//! Counting is lock-free and callable from any thread. Reaching zero on both
//! counters only *marks* the node; the owning context finalizes it later
//! under the graph lock.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Which ownership domain a reference belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefType {
    /// Control-side handle (script/API reference).
    Normal,
    /// Live graph edge touching the node.
    Connection,
}

/// Outcome of releasing a reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub enum Release {
    /// At least one counter is still non-zero (or the node was already marked).
    Referenced,
    /// This release left both counters at zero and marked the node for deletion.
    Unreferenced,
}

/// Script-side and connection-side reference counters of one node.
///
/// Both counters are read after each decrement, so all accesses use
/// sequentially consistent ordering: two threads releasing the last reference
/// of each kind at the same time cannot both miss the other's decrement.
#[derive(Debug, Default)]
pub struct DualRefCount {
    normal: AtomicU32,
    connection: AtomicU32,
    marked: AtomicBool,
}

impl DualRefCount {
    /// Creates a counter pair with both counts at zero.
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    fn counter(&self, ref_type: RefType) -> &AtomicU32 {
        match ref_type {
            RefType::Normal => &self.normal,
            RefType::Connection => &self.connection,
        }
    }

    #[inline]
    fn other(&self, ref_type: RefType) -> &AtomicU32 {
        match ref_type {
            RefType::Normal => &self.connection,
            RefType::Connection => &self.normal,
        }
    }

    /// Adds a reference of the given kind. Returns the new count.
    pub fn add_ref(&self, ref_type: RefType) -> u32 {
        debug_assert!(
            !self.is_marked_for_deletion(),
            "{ref_type:?} reference added to a node marked for deletion"
        );
        self.counter(ref_type).fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Releases a reference of the given kind.
    ///
    /// Releasing a reference that was never added is a contract violation:
    /// debug builds panic, release builds leave the counter at zero.
    pub fn release(&self, ref_type: RefType) -> Release {
        let previous = self
            .counter(ref_type)
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                Some(n.saturating_sub(1))
            })
            .unwrap_or_else(|n| n);
        debug_assert!(
            previous > 0,
            "{ref_type:?} reference released without a matching add_ref"
        );

        if previous == 1
            && self.other(ref_type).load(Ordering::SeqCst) == 0
            && !self.marked.swap(true, Ordering::SeqCst)
        {
            Release::Unreferenced
        } else {
            Release::Referenced
        }
    }

    /// Returns the number of control-side references.
    #[inline]
    pub fn script_refs(&self) -> u32 {
        self.normal.load(Ordering::SeqCst)
    }

    /// Returns the number of connection references.
    #[inline]
    pub fn connection_refs(&self) -> u32 {
        self.connection.load(Ordering::SeqCst)
    }

    /// Returns the count for the given reference kind.
    #[inline]
    pub fn count(&self, ref_type: RefType) -> u32 {
        self.counter(ref_type).load(Ordering::SeqCst)
    }

    /// Returns true when both counters are zero.
    #[inline]
    pub fn is_unreferenced(&self) -> bool {
        self.script_refs() == 0 && self.connection_refs() == 0
    }

    /// Returns true once a release has left both counters at zero.
    #[inline]
    pub fn is_marked_for_deletion(&self) -> bool {
        self.marked.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn counters_are_independent() {
        let refs = DualRefCount::new();
        assert_eq!(refs.add_ref(RefType::Normal), 1);
        assert_eq!(refs.add_ref(RefType::Connection), 1);
        assert_eq!(refs.add_ref(RefType::Connection), 2);
        assert_eq!(refs.script_refs(), 1);
        assert_eq!(refs.connection_refs(), 2);
    }

    #[test]
    fn script_release_with_live_connection_keeps_node() {
        let refs = DualRefCount::new();
        refs.add_ref(RefType::Normal);
        refs.add_ref(RefType::Connection);
        assert_eq!(refs.release(RefType::Normal), Release::Referenced);
        assert!(!refs.is_marked_for_deletion());
        assert_eq!(refs.release(RefType::Connection), Release::Unreferenced);
        assert!(refs.is_marked_for_deletion());
    }

    #[test]
    fn connection_release_with_live_handle_keeps_node() {
        let refs = DualRefCount::new();
        refs.add_ref(RefType::Normal);
        refs.add_ref(RefType::Connection);
        assert_eq!(refs.release(RefType::Connection), Release::Referenced);
        assert!(!refs.is_unreferenced());
        assert_eq!(refs.release(RefType::Normal), Release::Unreferenced);
    }

    #[test]
    fn unreferenced_is_reported_once() {
        let refs = DualRefCount::new();
        refs.add_ref(RefType::Normal);
        assert_eq!(refs.release(RefType::Normal), Release::Unreferenced);
        assert!(refs.is_unreferenced());
        assert!(refs.is_marked_for_deletion());
    }

    #[test]
    #[should_panic]
    #[cfg(debug_assertions)]
    fn underflow_panics_in_debug() {
        let refs = DualRefCount::new();
        let _ = refs.release(RefType::Connection);
    }

    #[test]
    fn concurrent_release_marks_exactly_once() {
        for _ in 0..200 {
            let refs = Arc::new(DualRefCount::new());
            refs.add_ref(RefType::Normal);
            refs.add_ref(RefType::Connection);

            let a = {
                let refs = Arc::clone(&refs);
                thread::spawn(move || refs.release(RefType::Normal))
            };
            let b = {
                let refs = Arc::clone(&refs);
                thread::spawn(move || refs.release(RefType::Connection))
            };
            let outcomes = [a.join().unwrap(), b.join().unwrap()];
            let unreferenced = outcomes
                .iter()
                .filter(|&&r| r == Release::Unreferenced)
                .count();
            assert_eq!(unreferenced, 1);
            assert!(refs.is_marked_for_deletion());
        }
    }
}
