//! Compilation artifacts: the immutable outputs of compiling content
//! streams, shared between threads behind `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::command::Command;
use crate::error::CompileWarning;
use crate::geometry::{Matrix, Rect};
use crate::sink::ContentSink;

/// A fully compiled content stream.
///
/// Owns the flat command list (marked-content regions nest inside their
/// own command), the warnings collected along the way, and the numeric
/// precision observed in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledContent {
    /// Commands in stream order.
    pub commands: Vec<Command>,
    /// Largest number of fractional digits seen on any real operand.
    /// Useful when re-serializing: emitting with this precision loses
    /// nothing the source had.
    pub detected_precision: u8,
    /// Warnings recorded during compilation.
    pub warnings: Vec<CompileWarning>,
}

impl CompiledContent {
    /// An empty compiled stream.
    pub fn empty() -> Self {
        Self {
            commands: Vec::new(),
            detected_precision: 0,
            warnings: Vec::new(),
        }
    }

    /// Replay every command against a sink, in order.
    pub fn replay(&self, sink: &mut dyn ContentSink) {
        for command in &self.commands {
            command.execute(sink);
        }
    }
}

/// A compiled page: content plus the page-level geometry inherited down
/// the page tree.
#[derive(Debug, Clone)]
pub struct CompiledPage {
    pub content: CompiledContent,
    /// MediaBox, inherited if absent on the page node.
    pub media_box: Rect,
    /// CropBox, if present anywhere up the tree.
    pub crop_box: Option<Rect>,
    /// Page rotation in degrees, a multiple of 90.
    pub rotation: i64,
}

/// A compiled form XObject.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledForm {
    pub content: CompiledContent,
    /// The form's BBox entry.
    pub bbox: Option<Rect>,
    /// The form's Matrix entry (identity when absent).
    pub matrix: Matrix,
}

/// A compiled tiling pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPattern {
    pub content: CompiledContent,
    pub bbox: Option<Rect>,
    /// Pattern matrix mapping pattern space to the default coordinate
    /// space of the page or form it is used on.
    pub matrix: Matrix,
    pub x_step: f64,
    pub y_step: f64,
    /// 1 for colored patterns, 2 for uncolored.
    pub paint_type: i64,
    pub tiling_type: i64,
}

/// A compiled Type3 font: every character procedure compiled as a
/// content stream, keyed by glyph name from the CharProcs dictionary.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledType3Font {
    pub glyphs: HashMap<String, Arc<CompiledContent>>,
    /// FontMatrix mapping glyph space to text space.
    pub font_matrix: Matrix,
}

impl CompiledType3Font {
    /// The compiled procedure for a glyph name, if present.
    pub fn glyph(&self, name: &str) -> Option<&Arc<CompiledContent>> {
        self.glyphs.get(name)
    }
}

/// One appearance state of an annotation.
#[derive(Debug, Clone)]
pub enum AppearanceVariant {
    /// The appearance entry is a single form.
    Single(Arc<CompiledForm>),
    /// The appearance entry is a sub-dictionary of state name to form
    /// (check boxes, radio buttons).
    Named(HashMap<String, Arc<CompiledForm>>),
}

impl AppearanceVariant {
    /// Resolve this variant for a given appearance state, if any.
    pub fn for_state(&self, state: Option<&str>) -> Option<&Arc<CompiledForm>> {
        match self {
            AppearanceVariant::Single(form) => Some(form),
            AppearanceVariant::Named(map) => state.and_then(|s| map.get(s)),
        }
    }
}

/// A compiled annotation: its rectangle and whichever appearance
/// streams it declares.
#[derive(Debug, Clone)]
pub struct CompiledAnnotation {
    pub rect: Rect,
    /// The normal (N) appearance.
    pub normal: Option<AppearanceVariant>,
    /// The rollover (R) appearance.
    pub rollover: Option<AppearanceVariant>,
    /// The down (D) appearance.
    pub down: Option<AppearanceVariant>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::NullSink;

    fn content_with(commands: Vec<Command>) -> CompiledContent {
        CompiledContent {
            commands,
            detected_precision: 2,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn empty_content_has_no_commands() {
        let c = CompiledContent::empty();
        assert!(c.commands.is_empty());
        assert_eq!(c.detected_precision, 0);
        assert!(c.warnings.is_empty());
    }

    #[test]
    fn replay_visits_all_commands() {
        #[derive(Default)]
        struct Counter {
            n: usize,
        }
        impl ContentSink for Counter {
            fn save_state(&mut self) {
                self.n += 1;
            }
            fn restore_state(&mut self) {
                self.n += 1;
            }
        }

        let content = content_with(vec![Command::SaveState, Command::RestoreState]);
        let mut sink = Counter::default();
        content.replay(&mut sink);
        assert_eq!(sink.n, 2);
    }

    #[test]
    fn type3_glyph_lookup() {
        let mut glyphs = HashMap::new();
        glyphs.insert(
            "a".to_string(),
            Arc::new(content_with(vec![Command::SetGlyphWidth { wx: 500.0, wy: 0.0 }])),
        );
        let font = CompiledType3Font {
            glyphs,
            font_matrix: Matrix::new(0.001, 0.0, 0.0, 0.001, 0.0, 0.0),
        };
        assert!(font.glyph("a").is_some());
        assert!(font.glyph("b").is_none());
    }

    #[test]
    fn appearance_single_ignores_state() {
        let form = Arc::new(CompiledForm {
            content: CompiledContent::empty(),
            bbox: None,
            matrix: Matrix::identity(),
        });
        let variant = AppearanceVariant::Single(Arc::clone(&form));
        assert!(variant.for_state(None).is_some());
        assert!(variant.for_state(Some("Off")).is_some());
    }

    #[test]
    fn appearance_named_requires_matching_state() {
        let form = Arc::new(CompiledForm {
            content: CompiledContent::empty(),
            bbox: None,
            matrix: Matrix::identity(),
        });
        let mut map = HashMap::new();
        map.insert("On".to_string(), Arc::clone(&form));
        let variant = AppearanceVariant::Named(map);
        assert!(variant.for_state(Some("On")).is_some());
        assert!(variant.for_state(Some("Off")).is_none());
        assert!(variant.for_state(None).is_none());
    }

    #[test]
    fn replay_empty_content_is_noop() {
        CompiledContent::empty().replay(&mut NullSink);
    }
}
