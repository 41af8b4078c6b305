// Drawing surfaces and the gesture-aware session that records their history.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::HistoryStack;
use crate::metrics;

/// RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba([0, 0, 0, 0]);
}

/// Largest brush side accepted by `PixelCanvas::stroke_line`.
pub const MAX_BRUSH: u32 = 256;

/// Immutable capture of a whole surface. Cloning shares the pixel buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    width: u32,
    height: u32,
    pixels: Arc<[u8]>,
}

impl Snapshot {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major RGBA bytes.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

/// Something that owns a pixel buffer. History code only ever captures and
/// restores whole buffers through this trait.
pub trait CanvasSurface {
    fn capture(&self) -> Snapshot;

    fn apply(&mut self, snapshot: &Snapshot);
}

/// In-memory RGBA surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelCanvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl PixelCanvas {
    /// A fully transparent canvas.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        let i = self.offset(x, y)?;
        let mut px = [0u8; 4];
        px.copy_from_slice(&self.pixels[i..i + 4]);
        Some(Rgba(px))
    }

    /// Points outside the canvas are ignored.
    pub fn set_pixel(&mut self, x: i64, y: i64, color: Rgba) {
        let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) else {
            return;
        };
        if let Some(i) = self.offset(x, y) {
            self.pixels[i..i + 4].copy_from_slice(&color.0);
        }
    }

    /// Fill an axis-aligned rectangle, clipped to the canvas.
    pub fn fill_rect(&mut self, x: i64, y: i64, width: u32, height: u32, color: Rgba) {
        let (w, h) = (i64::from(self.width), i64::from(self.height));
        let x0 = x.clamp(0, w);
        let x1 = x.saturating_add(i64::from(width)).clamp(0, w);
        let y0 = y.clamp(0, h);
        let y1 = y.saturating_add(i64::from(height)).clamp(0, h);
        if x0 >= x1 {
            return;
        }

        let row_bytes = self.width as usize * 4;
        for py in y0..y1 {
            let row = py as usize * row_bytes;
            let span = &mut self.pixels[row + x0 as usize * 4..row + x1 as usize * 4];
            for px in span.chunks_exact_mut(4) {
                px.copy_from_slice(&color.0);
            }
        }
    }

    /// Draw a line with a square brush of side `thickness` (at most `MAX_BRUSH`).
    ///
    /// The segment is first clipped to the canvas grown by the brush radius.
    pub fn stroke_line(&mut self, from: (i64, i64), to: (i64, i64), thickness: u32, color: Rgba) {
        let thickness = thickness.clamp(1, MAX_BRUSH);
        let half = i64::from(thickness) / 2;
        let lo = -half - 1;
        let hi = (
            i64::from(self.width) + half + 1,
            i64::from(self.height) + half + 1,
        );
        let Some((from, to)) = clip_segment(from, to, (lo, lo), hi) else {
            return;
        };

        let (mut x, mut y) = from;
        let dx = (to.0 - x).abs();
        let dy = -(to.1 - y).abs();
        let sx = if x < to.0 { 1 } else { -1 };
        let sy = if y < to.1 { 1 } else { -1 };
        let mut err = dx + dy;

        loop {
            self.fill_rect(x - half, y - half, thickness, thickness, color);
            if x == to.0 && y == to.1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x += sx;
            }
            if e2 <= dx {
                err += dx;
                y += sy;
            }
        }
    }

    fn offset(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some((y as usize * self.width as usize + x as usize) * 4)
    }
}

/// Clip the segment `from..to` to the box `lo..=hi` (Liang-Barsky).
///
/// Returns `None` when the segment misses the box. Endpoints already inside
/// the box come back unchanged.
fn clip_segment(
    from: (i64, i64),
    to: (i64, i64),
    lo: (i64, i64),
    hi: (i64, i64),
) -> Option<((i64, i64), (i64, i64))> {
    let (x0, y0) = (from.0 as f64, from.1 as f64);
    let (dx, dy) = (to.0 as f64 - x0, to.1 as f64 - y0);
    let mut t0 = 0.0_f64;
    let mut t1 = 1.0_f64;

    let edges = [
        (-dx, x0 - lo.0 as f64),
        (dx, hi.0 as f64 - x0),
        (-dy, y0 - lo.1 as f64),
        (dy, hi.1 as f64 - y0),
    ];
    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
        } else if p < 0.0 {
            t0 = t0.max(q / p);
        } else {
            t1 = t1.min(q / p);
        }
    }
    if t0 > t1 {
        return None;
    }

    let at = |t: f64| {
        if t == 0.0 {
            from
        } else if t == 1.0 {
            to
        } else {
            ((x0 + t * dx).round() as i64, (y0 + t * dy).round() as i64)
        }
    };
    Some((at(t0), at(t1)))
}

impl CanvasSurface for PixelCanvas {
    fn capture(&self) -> Snapshot {
        Snapshot {
            width: self.width,
            height: self.height,
            pixels: Arc::from(self.pixels.as_slice()),
        }
    }

    fn apply(&mut self, snapshot: &Snapshot) {
        self.width = snapshot.width;
        self.height = snapshot.height;
        self.pixels.clear();
        self.pixels.extend_from_slice(&snapshot.pixels);
    }
}

/// A surface plus its history, with in-progress gestures kept out of history.
///
/// During a gesture every `preview` restores the pre-gesture snapshot before
/// drawing, so the live buffer only ever shows one preview at a time. Only
/// `finish_gesture` records a history entry.
pub struct DrawingSession<C> {
    surface: C,
    history: HistoryStack<Snapshot>,
    gesture_base: Option<Snapshot>,
}

impl<C: CanvasSurface> DrawingSession<C> {
    pub fn new(surface: C, cap: usize) -> Self {
        let history = HistoryStack::with_capacity(surface.capture(), cap);
        Self {
            surface,
            history,
            gesture_base: None,
        }
    }

    /// Replace the active surface (e.g. a different map) and start a fresh history.
    pub fn switch_canvas(&mut self, surface: C) {
        self.surface = surface;
        self.gesture_base = None;
        self.history.reset(self.surface.capture());
    }

    pub fn begin_gesture(&mut self) {
        self.gesture_base = Some(self.history.current().clone());
    }

    pub fn in_gesture(&self) -> bool {
        self.gesture_base.is_some()
    }

    /// Redraw the in-progress gesture from the pre-gesture state.
    pub fn preview(&mut self, draw: impl FnOnce(&mut C)) {
        let base = self
            .gesture_base
            .get_or_insert_with(|| self.history.current().clone());
        self.surface.apply(base);
        draw(&mut self.surface);
    }

    /// Draw the final gesture result and record it once.
    pub fn finish_gesture(&mut self, draw: impl FnOnce(&mut C)) {
        let base = self
            .gesture_base
            .take()
            .unwrap_or_else(|| self.history.current().clone());
        self.surface.apply(&base);
        draw(&mut self.surface);
        self.history.commit(self.surface.capture());
        metrics::HISTORY_COMMITS_TOTAL.inc();
    }

    /// Abandon the in-progress gesture and restore the pre-gesture state.
    pub fn cancel_gesture(&mut self) {
        if let Some(base) = self.gesture_base.take() {
            self.surface.apply(&base);
        }
    }

    /// Returns whether the surface changed.
    pub fn undo(&mut self) -> bool {
        self.cancel_gesture();
        match self.history.undo() {
            Some(snapshot) => {
                self.surface.apply(snapshot);
                true
            }
            None => false,
        }
    }

    /// Returns whether the surface changed.
    pub fn redo(&mut self) -> bool {
        self.cancel_gesture();
        match self.history.redo() {
            Some(snapshot) => {
                self.surface.apply(snapshot);
                true
            }
            None => false,
        }
    }

    pub fn surface(&self) -> &C {
        &self.surface
    }

    pub fn history(&self) -> &HistoryStack<Snapshot> {
        &self.history
    }
}
