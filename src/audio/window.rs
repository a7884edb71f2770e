//! # Sliding Fragment Window
//!
//! A bounded FIFO of the most recently decoded fragments. Inserting into a
//! full window evicts the oldest fragment first, so the window always holds
//! the last `W` fragments in arrival order.
//!
//! ## Ownership:
//! Owned exclusively by the per-connection ingestion actor. The actor's
//! single-threaded message dispatch serializes pushes, and renders work from
//! a [`snapshot`](SlidingWindow::snapshot) taken before any handoff to a
//! background task, so an in-flight render never observes a concurrent
//! eviction.

use crate::audio::decoder::Fragment;
use std::collections::VecDeque;

/// Bounded, ordered buffer of the most recent fragments (oldest first).
#[derive(Debug)]
pub struct SlidingWindow {
    fragments: VecDeque<Fragment>,
    capacity: usize,
}

impl SlidingWindow {
    /// Create a window holding at most `capacity` fragments.
    pub fn new(capacity: usize) -> Self {
        Self {
            fragments: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a fragment at the tail, evicting from the head first when the
    /// window is already at capacity. `len() <= capacity` holds on return.
    pub fn push(&mut self, fragment: Fragment) {
        if self.fragments.len() == self.capacity {
            self.fragments.pop_front();
        }
        self.fragments.push_back(fragment);
    }

    /// Whether the window has accumulated exactly `capacity` fragments.
    pub fn is_full(&self) -> bool {
        self.fragments.len() == self.capacity
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Clone the current contents oldest-first without mutating the window.
    ///
    /// The window persists across renders: each render sees the contents at
    /// that moment, and the next push simply rotates one fragment through.
    pub fn snapshot(&self) -> Vec<Fragment> {
        self.fragments.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(seq: u64) -> Fragment {
        Fragment {
            samples: vec![seq as i16; 4],
            seq,
        }
    }

    #[test]
    fn test_len_never_exceeds_capacity() {
        let mut window = SlidingWindow::new(3);
        for seq in 0..20 {
            window.push(fragment(seq));
            assert!(window.len() <= 3);
        }
    }

    #[test]
    fn test_fills_before_reporting_full() {
        let mut window = SlidingWindow::new(3);
        assert!(!window.is_full());
        window.push(fragment(0));
        window.push(fragment(1));
        assert!(!window.is_full());
        window.push(fragment(2));
        assert!(window.is_full());
    }

    #[test]
    fn test_retains_last_w_in_arrival_order() {
        let mut window = SlidingWindow::new(3);
        for seq in 0..10 {
            window.push(fragment(seq));
        }
        let seqs: Vec<u64> = window.snapshot().iter().map(|f| f.seq).collect();
        assert_eq!(seqs, vec![7, 8, 9]);
    }

    #[test]
    fn test_snapshot_does_not_consume() {
        let mut window = SlidingWindow::new(3);
        for seq in 0..3 {
            window.push(fragment(seq));
        }

        let first = window.snapshot();
        let second = window.snapshot();
        assert_eq!(first, second);
        assert!(window.is_full());

        // The next push still rotates normally after snapshots.
        window.push(fragment(3));
        let seqs: Vec<u64> = window.snapshot().iter().map(|f| f.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }
}
