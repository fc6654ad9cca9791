//! Graphics state tracking for operator legality and color arity.
//!
//! The compiler does not evaluate the full graphics state; it tracks
//! only what validation needs: which mode the stream is in (so `Tj`
//! outside `BT` can be rejected) and the current stroke/fill color
//! space bindings (so `SC`/`scn` arity can be checked). Bindings are
//! saved and restored with `q`/`Q` like the rest of the graphics state.

use crate::color_space::ColorSpaceBinding;

/// The coarse interpreter mode, driving operator legality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GraphicsMode {
    /// Between objects: most operators are legal.
    #[default]
    Page,
    /// Inside a path object (after `m`/`re`, before a painting operator).
    Path,
    /// Inside a text object (`BT` ... `ET`).
    Text,
}

impl GraphicsMode {
    pub fn describe(&self) -> &'static str {
        match self {
            GraphicsMode::Page => "page",
            GraphicsMode::Path => "path",
            GraphicsMode::Text => "text",
        }
    }
}

/// The save/restorable slice of tracker state.
#[derive(Debug, Clone, Default)]
pub struct TrackerState {
    pub stroke_space: ColorSpaceBinding,
    pub fill_space: ColorSpaceBinding,
}

/// Tracks mode and color space bindings across a compile.
///
/// The mode itself is deliberately not saved by `q`: a `Q` inside a
/// path or text object does not end it.
#[derive(Debug, Default)]
pub struct Tracker {
    pub mode: GraphicsMode,
    current: TrackerState,
    stack: Vec<TrackerState>,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// `q`.
    pub fn save(&mut self) {
        self.stack.push(self.current.clone());
    }

    /// `Q`. Returns false when there was nothing to restore.
    pub fn restore(&mut self) -> bool {
        match self.stack.pop() {
            Some(state) => {
                self.current = state;
                true
            }
            None => false,
        }
    }

    /// Depth of unmatched `q` operators.
    pub fn save_depth(&self) -> usize {
        self.stack.len()
    }

    pub fn stroke_space(&self) -> &ColorSpaceBinding {
        &self.current.stroke_space
    }

    pub fn fill_space(&self) -> &ColorSpaceBinding {
        &self.current.fill_space
    }

    pub fn set_stroke_space(&mut self, space: ColorSpaceBinding) {
        self.current.stroke_space = space;
    }

    pub fn set_fill_space(&mut self, space: ColorSpaceBinding) {
        self.current.fill_space = space;
    }

    /// Reset both bindings, as at the start of a fresh compile.
    pub fn reset_spaces(&mut self) {
        self.current = TrackerState::default();
    }
}
