//! Frame composition: turning sub-rectangle rasters into full-canvas images.
//!
//! Each decoded frame only covers part of the canvas and carries a disposal
//! method describing what happens to its rectangle *after* it was shown.
//! The compositor maintains a running canvas, applies the previous frame's
//! disposal before overlaying the next frame, and either caches every
//! composed frame (default) or recomposes on demand (memory-optimized).

use crate::data::{ComposedFrame, DisposalMethod, RawFrame};

/// Incremental canvas reconstruction over a decoded frame sequence.
///
/// In the default mode every frame is pre-composited once and cached, so
/// `frame_at` is a plain lookup. In memory-optimized mode only the running
/// canvas (plus at most one `RestorePrevious` snapshot) is kept; requesting
/// a frame behind the current position recomposes from frame 0.
///
/// Composition is deterministic: the image returned for frame `i` depends
/// only on the frames and their disposal history, never on the order of
/// previous requests.
pub struct Compositor {
    optimize_memory: bool,
    /// Running canvas: the composed image of frame `position`
    canvas: ComposedFrame,
    /// Pre-overlay pixels of a frame with `RestorePrevious` disposal
    snapshot: Option<Vec<u8>>,
    /// Index of the frame currently applied to the canvas
    position: Option<usize>,
    /// Pre-composited frames (default mode only)
    cache: Vec<ComposedFrame>,
}

impl Compositor {
    /// Create a compositor for a canvas of the given size.
    pub fn new(width: u16, height: u16, optimize_memory: bool) -> Self {
        Self {
            optimize_memory,
            canvas: ComposedFrame::blank(width, height),
            snapshot: None,
            position: None,
            cache: Vec::new(),
        }
    }

    /// Whether this compositor recomposes on demand.
    #[inline]
    pub fn optimize_memory(&self) -> bool {
        self.optimize_memory
    }

    /// Drop all composed state, keeping the canvas size.
    pub fn reset(&mut self) {
        self.canvas = ComposedFrame::blank(self.canvas.width, self.canvas.height);
        self.snapshot = None;
        self.position = None;
        self.cache.clear();
    }

    /// Feed one newly decoded frame, in stream order.
    ///
    /// `frames` is the frame store including the new frame; the compositor
    /// advances its running canvas by exactly one frame. In the default
    /// mode the result is cached.
    pub fn push(&mut self, frames: &[RawFrame]) {
        self.apply_next(frames);
        if !self.optimize_memory {
            self.cache.push(self.canvas.clone());
        }
    }

    /// Get the composed full-canvas image for `index`.
    ///
    /// Returns None when the index is out of range. In memory-optimized
    /// mode this may recompose from frame 0 (backward seek) or advance the
    /// running canvas (forward seek).
    pub fn frame_at(&mut self, frames: &[RawFrame], index: usize) -> Option<&ComposedFrame> {
        if index >= frames.len() {
            return None;
        }
        if !self.optimize_memory {
            return self.cache.get(index);
        }

        match self.position {
            Some(p) if p == index => {}
            Some(p) if p < index => {
                while self.position != Some(index) {
                    self.apply_next(frames);
                }
            }
            _ => {
                // Behind the current position (or nothing composed yet):
                // replay the disposal history from the start
                self.clear_canvas();
                while self.position != Some(index) {
                    self.apply_next(frames);
                }
            }
        }
        Some(&self.canvas)
    }

    fn clear_canvas(&mut self) {
        self.canvas.pixels.fill(0);
        self.snapshot = None;
        self.position = None;
    }

    /// Advance the running canvas by one frame: dispose of the current
    /// frame, then overlay the next one.
    fn apply_next(&mut self, frames: &[RawFrame]) {
        let next = self.position.map_or(0, |p| p + 1);
        if next >= frames.len() {
            return;
        }

        if let Some(p) = self.position {
            self.dispose(&frames[p]);
        }

        let frame = &frames[next];
        if frame.disposal == DisposalMethod::RestorePrevious {
            self.snapshot = Some(self.canvas.pixels.clone());
        }
        self.overlay(frame);
        self.position = Some(next);
    }

    /// Apply a displayed frame's disposal method to the canvas.
    fn dispose(&mut self, frame: &RawFrame) {
        match frame.disposal {
            DisposalMethod::None | DisposalMethod::DoNotDispose => {}
            DisposalMethod::RestoreBackground => {
                self.clear_rect(frame.x, frame.y, frame.width, frame.height);
            }
            DisposalMethod::RestorePrevious => {
                if let Some(snapshot) = self.snapshot.take() {
                    self.canvas.pixels = snapshot;
                }
            }
        }
    }

    /// Fill a canvas rectangle with transparency.
    fn clear_rect(&mut self, x: u16, y: u16, width: u16, height: u16) {
        let cw = self.canvas.width as usize;
        let ch = self.canvas.height as usize;
        for row in y as usize..(y as usize + height as usize).min(ch) {
            let start = (row * cw + x as usize).min(row * cw + cw);
            let end = (row * cw + x as usize + width as usize).min(row * cw + cw);
            self.canvas.pixels[start * 4..end * 4].fill(0);
        }
    }

    /// Overlay a frame's rectangle onto the canvas, resolving palette
    /// indices to RGBA and skipping transparent pixels.
    fn overlay(&mut self, frame: &RawFrame) {
        let cw = self.canvas.width as usize;
        let ch = self.canvas.height as usize;
        let fw = frame.width as usize;

        for row in 0..frame.height as usize {
            let cy = frame.y as usize + row;
            if cy >= ch {
                break;
            }
            for col in 0..fw {
                let cx = frame.x as usize + col;
                if cx >= cw {
                    break;
                }
                let pixel = row * fw + col;
                if pixel >= frame.indices.len() {
                    return;
                }
                let index = frame.indices[pixel];
                if frame.transparent_index == Some(index) {
                    continue;
                }
                // An index outside the palette leaves the canvas pixel alone
                if let Some((r, g, b)) = frame.color_table.rgb_at(index) {
                    let i = (cy * cw + cx) * 4;
                    self.canvas.pixels[i..i + 4].copy_from_slice(&[r, g, b, 255]);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ColorTable;

    const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];
    const RED: [u8; 4] = [255, 0, 0, 255];
    const GREEN: [u8; 4] = [0, 255, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];

    fn palette() -> ColorTable {
        ColorTable::from_rgb(vec![255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255])
    }

    fn solid(x: u16, y: u16, w: u16, h: u16, index: u8, disposal: DisposalMethod) -> RawFrame {
        RawFrame {
            x,
            y,
            width: w,
            height: h,
            delay: 0.1,
            disposal,
            transparent_index: None,
            interlaced: false,
            indices: vec![index; w as usize * h as usize],
            color_table: palette(),
        }
    }

    #[test]
    fn test_single_full_canvas_frame() {
        let frames = vec![solid(0, 0, 4, 4, 0, DisposalMethod::None)];
        let mut compositor = Compositor::new(4, 4, false);
        compositor.push(&frames);

        let composed = compositor.frame_at(&frames, 0).unwrap();
        assert_eq!((composed.width, composed.height), (4, 4));
        for row in 0..4 {
            for col in 0..4 {
                assert_eq!(composed.rgba_at(row, col), Some(RED));
            }
        }
    }

    #[test]
    fn test_overlay_keeps_underlying_canvas() {
        let frames = vec![
            solid(0, 0, 4, 4, 0, DisposalMethod::DoNotDispose),
            solid(1, 1, 2, 2, 1, DisposalMethod::None),
        ];
        let mut compositor = Compositor::new(4, 4, false);
        compositor.push(&frames[..1]);
        compositor.push(&frames);

        let composed = compositor.frame_at(&frames, 1).unwrap();
        assert_eq!(composed.rgba_at(0, 0), Some(RED));
        assert_eq!(composed.rgba_at(1, 1), Some(GREEN));
        assert_eq!(composed.rgba_at(2, 2), Some(GREEN));
        assert_eq!(composed.rgba_at(3, 3), Some(RED));
    }

    #[test]
    fn test_restore_background_clears_previous_rect() {
        // Frame 0 covers (0,0,4,4) and asks for background restore; frame 1
        // only overlays (2,2,2,2). The rest of frame 0's rectangle must be
        // transparent after composing frame 1.
        let frames = vec![
            solid(0, 0, 4, 4, 0, DisposalMethod::RestoreBackground),
            solid(2, 2, 2, 2, 1, DisposalMethod::None),
        ];
        let mut compositor = Compositor::new(8, 8, false);
        compositor.push(&frames[..1]);
        compositor.push(&frames);

        let composed = compositor.frame_at(&frames, 1).unwrap();
        for row in 0..4 {
            for col in 0..4 {
                let inside_new = (2..4).contains(&row) && (2..4).contains(&col);
                let expected = if inside_new { GREEN } else { TRANSPARENT };
                assert_eq!(composed.rgba_at(row, col), Some(expected), "at {},{}", row, col);
            }
        }
        // Outside frame 0's rectangle nothing was ever drawn
        assert_eq!(composed.rgba_at(5, 5), Some(TRANSPARENT));
    }

    #[test]
    fn test_restore_previous_reverts_canvas() {
        let frames = vec![
            solid(0, 0, 8, 8, 0, DisposalMethod::None),
            solid(0, 0, 2, 2, 1, DisposalMethod::RestorePrevious),
            solid(6, 6, 2, 2, 2, DisposalMethod::None),
        ];
        let mut compositor = Compositor::new(8, 8, false);
        compositor.push(&frames[..1]);
        compositor.push(&frames[..2]);
        compositor.push(&frames);

        // While frame 1 is shown, its rectangle is green
        let composed = compositor.frame_at(&frames, 1).unwrap();
        assert_eq!(composed.rgba_at(0, 0), Some(GREEN));

        // After disposal, everything outside frame 2's own rectangle is
        // back to the pre-frame-1 state
        let composed = compositor.frame_at(&frames, 2).unwrap();
        assert_eq!(composed.rgba_at(0, 0), Some(RED));
        assert_eq!(composed.rgba_at(1, 1), Some(RED));
        assert_eq!(composed.rgba_at(6, 6), Some(BLUE));
        assert_eq!(composed.rgba_at(5, 5), Some(RED));
    }

    #[test]
    fn test_transparent_pixels_show_through() {
        let mut overlay = solid(0, 0, 4, 4, 1, DisposalMethod::None);
        overlay.transparent_index = Some(1);
        // Checkerboard: indices 1 (transparent) and 2 (blue)
        overlay.indices = (0..16).map(|i| if i % 2 == 0 { 1 } else { 2 }).collect();

        let frames = vec![solid(0, 0, 4, 4, 0, DisposalMethod::None), overlay];
        let mut compositor = Compositor::new(4, 4, false);
        compositor.push(&frames[..1]);
        compositor.push(&frames);

        let composed = compositor.frame_at(&frames, 1).unwrap();
        assert_eq!(composed.rgba_at(0, 0), Some(RED));
        assert_eq!(composed.rgba_at(0, 1), Some(BLUE));
        assert_eq!(composed.rgba_at(0, 2), Some(RED));
    }

    #[test]
    fn test_memory_optimized_matches_cached_mode() {
        let frames = vec![
            solid(0, 0, 8, 8, 0, DisposalMethod::RestoreBackground),
            solid(2, 2, 4, 4, 1, DisposalMethod::RestorePrevious),
            solid(0, 0, 2, 2, 2, DisposalMethod::None),
            solid(4, 4, 2, 2, 3, DisposalMethod::None),
        ];

        let mut cached = Compositor::new(8, 8, false);
        for i in 0..frames.len() {
            cached.push(&frames[..i + 1]);
        }
        let mut on_demand = Compositor::new(8, 8, true);

        for i in 0..frames.len() {
            let expected = cached.frame_at(&frames, i).unwrap().clone();
            assert_eq!(on_demand.frame_at(&frames, i), Some(&expected), "frame {}", i);
        }
    }

    #[test]
    fn test_memory_optimized_backward_seek_is_deterministic() {
        let frames = vec![
            solid(0, 0, 4, 4, 0, DisposalMethod::None),
            solid(0, 0, 2, 2, 1, DisposalMethod::RestoreBackground),
            solid(2, 2, 2, 2, 2, DisposalMethod::None),
        ];
        let mut compositor = Compositor::new(4, 4, true);

        let last = compositor.frame_at(&frames, 2).unwrap().clone();
        let first = compositor.frame_at(&frames, 0).unwrap().clone();
        assert_eq!(compositor.frame_at(&frames, 2), Some(&last));
        assert_eq!(compositor.frame_at(&frames, 0), Some(&first));
    }

    #[test]
    fn test_frame_rect_clipped_to_canvas() {
        // Rectangle sticking out past the canvas edge must not panic
        let frames = vec![solid(3, 3, 4, 4, 0, DisposalMethod::None)];
        let mut compositor = Compositor::new(4, 4, false);
        compositor.push(&frames);

        let composed = compositor.frame_at(&frames, 0).unwrap();
        assert_eq!(composed.rgba_at(3, 3), Some(RED));
        assert_eq!(composed.rgba_at(0, 0), Some(TRANSPARENT));
    }

    #[test]
    fn test_out_of_range_index() {
        let frames = vec![solid(0, 0, 2, 2, 0, DisposalMethod::None)];
        let mut compositor = Compositor::new(2, 2, false);
        compositor.push(&frames);
        assert!(compositor.frame_at(&frames, 1).is_none());
    }
}
