//! Single-channel frames and the live window of recent frames.
use ndarray::Array3;
use serde::{Deserialize, Serialize};

/// Shape of a single-channel 8-bit frame.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
pub struct FrameShape {
    /// Number of rows.
    pub height: usize,

    /// Number of columns.
    pub width: usize,
}

impl FrameShape {
    /// Constructs a frame shape.
    pub fn new(height: usize, width: usize) -> Self {
        Self { height, width }
    }

    /// Number of pixels (bytes) in a frame.
    pub fn len(&self) -> usize {
        self.height * self.width
    }

    /// Returns `true` if the frame has no pixel.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for FrameShape {
    /// Preprocessed Atari screen.
    fn default() -> Self {
        Self::new(84, 84)
    }
}

/// The `n_stack` most recent frames seen by the acting policy.
///
/// Frames are kept in a ring; [`FrameHistory::stack`] returns them in
/// chronological order.
#[derive(Debug, Clone)]
pub struct FrameHistory {
    shape: FrameShape,
    frames: Vec<Vec<u8>>,
    // Slot where the next frame will be written.
    next: usize,
    // Number of distinct frames in the ring.
    size: usize,
}

impl FrameHistory {
    /// Constructs an empty history of `n_stack` frames.
    pub fn new(n_stack: usize, shape: FrameShape) -> Self {
        Self {
            shape,
            frames: vec![vec![0; shape.len()]; n_stack],
            next: 0,
            size: 0,
        }
    }

    /// Pushes a frame, dropping the oldest one when the window is full.
    pub fn push(&mut self, frame: &[u8]) {
        let n_stack = self.frames.len();
        self.frames[self.next].copy_from_slice(frame);
        self.next = (self.next + 1) % n_stack;
        self.size = (self.size + 1).min(n_stack);
    }

    /// Returns `true` when the window holds `n_stack` frames.
    pub fn is_ready(&self) -> bool {
        self.size == self.frames.len()
    }

    /// Forgets all frames, typically at the start of an episode.
    pub fn clear(&mut self) {
        self.next = 0;
        self.size = 0;
        self.frames.iter_mut().for_each(|f| f.iter_mut().for_each(|p| *p = 0));
    }

    /// Returns the window as a `[n_stack, height, width]` array, oldest frame first.
    ///
    /// Missing frames (before [`FrameHistory::is_ready`]) are all zero.
    pub fn stack(&self) -> Array3<u8> {
        let n_stack = self.frames.len();
        let missing = n_stack - self.size;
        let FrameShape { height, width } = self.shape;

        Array3::from_shape_fn((n_stack, height, width), |(k, r, c)| {
            if k < missing {
                return 0;
            }
            // (k - missing)-th real frame, oldest first
            let slot = (self.next + n_stack - self.size + k - missing) % n_stack;
            self.frames[slot][r * width + c]
        })
    }

    /// Number of stacked frames.
    pub fn n_stack(&self) -> usize {
        self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(v: u8) -> Vec<u8> {
        vec![v; 4]
    }

    #[test]
    fn test_history_chronological_order() {
        let mut h = FrameHistory::new(3, FrameShape::new(2, 2));
        h.push(&frame(1));
        assert!(!h.is_ready());
        let s = h.stack();
        assert_eq!(s.index_axis(ndarray::Axis(0), 0).sum(), 0);
        assert_eq!(s[[2, 0, 0]], 1);

        h.push(&frame(2));
        h.push(&frame(3));
        h.push(&frame(4));
        assert!(h.is_ready());
        let s = h.stack();
        assert_eq!([s[[0, 0, 0]], s[[1, 1, 1]], s[[2, 0, 1]]], [2, 3, 4]);

        h.clear();
        assert!(!h.is_ready());
        assert_eq!(h.stack().sum(), 0);
    }
}
