//! The [`ContentSink`] trait: the seam between compiled command lists
//! and whatever consumes them (renderers, text extractors, analyzers).
//!
//! Every method has a no-op default, so a consumer implements only the
//! callbacks it cares about. Replaying a [`Command`](crate::command::Command)
//! list calls these in stream order; nesting operators arrive as balanced
//! begin/end pairs.

use std::sync::Arc;

use crate::artifact::{CompiledForm, CompiledType3Font};
use crate::command::{MarkedContentProps, PatternPaint, TextElement};
use crate::error::CompileWarning;
use crate::geometry::Matrix;
use crate::image::{ImageRef, InlineImage};

/// Receiver for replayed content stream commands.
///
/// The trait is object-safe; compilers and replays take `&mut dyn
/// ContentSink`.
#[allow(unused_variables)]
pub trait ContentSink {
    // --- Graphics state ---

    /// `q`
    fn save_state(&mut self) {}
    /// `Q`
    fn restore_state(&mut self) {}
    /// `cm`
    fn concat_matrix(&mut self, matrix: &Matrix) {}
    /// `w`
    fn set_line_width(&mut self, width: f64) {}
    /// `J`
    fn set_line_cap(&mut self, cap: i64) {}
    /// `j`
    fn set_line_join(&mut self, join: i64) {}
    /// `M`
    fn set_miter_limit(&mut self, limit: f64) {}
    /// `d`
    fn set_dash_pattern(&mut self, array: &[f64], phase: f64) {}
    /// `ri`
    fn set_rendering_intent(&mut self, intent: &str) {}
    /// `i`
    fn set_flatness(&mut self, flatness: f64) {}
    /// `gs` — `type3_font` is present when the ExtGState selects a Type3 font.
    fn set_ext_g_state(&mut self, name: &str, type3_font: Option<&CompiledType3Font>) {}

    // --- Path construction ---

    /// `m`
    fn move_to(&mut self, x: f64, y: f64) {}
    /// `l`
    fn line_to(&mut self, x: f64, y: f64) {}
    /// `c`
    fn curve_to(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, x3: f64, y3: f64) {}
    /// `v`
    fn curve_to_v(&mut self, x2: f64, y2: f64, x3: f64, y3: f64) {}
    /// `y`
    fn curve_to_y(&mut self, x1: f64, y1: f64, x3: f64, y3: f64) {}
    /// `h`
    fn close_path(&mut self) {}
    /// `re`
    fn rectangle(&mut self, x: f64, y: f64, width: f64, height: f64) {}

    // --- Path painting and clipping ---

    /// `S`
    fn stroke(&mut self) {}
    /// `s`
    fn close_stroke(&mut self) {}
    /// `f` / `F`
    fn fill(&mut self) {}
    /// `f*`
    fn fill_even_odd(&mut self) {}
    /// `B`
    fn fill_stroke(&mut self) {}
    /// `B*`
    fn fill_stroke_even_odd(&mut self) {}
    /// `b`
    fn close_fill_stroke(&mut self) {}
    /// `b*`
    fn close_fill_stroke_even_odd(&mut self) {}
    /// `n`
    fn end_path(&mut self) {}
    /// `W`
    fn clip(&mut self) {}
    /// `W*`
    fn clip_even_odd(&mut self) {}

    // --- Color ---

    /// `CS`
    fn set_stroke_color_space(&mut self, name: &str, components: usize) {}
    /// `cs`
    fn set_fill_color_space(&mut self, name: &str, components: usize) {}
    /// `SC`
    fn set_stroke_color(&mut self, components: &[f64]) {}
    /// `sc`
    fn set_fill_color(&mut self, components: &[f64]) {}
    /// `SCN`
    fn set_stroke_color_extended(&mut self, components: &[f64], pattern: Option<&PatternPaint>) {}
    /// `scn`
    fn set_fill_color_extended(&mut self, components: &[f64], pattern: Option<&PatternPaint>) {}
    /// `G`
    fn set_stroke_gray(&mut self, gray: f64) {}
    /// `g`
    fn set_fill_gray(&mut self, gray: f64) {}
    /// `RG`
    fn set_stroke_rgb(&mut self, r: f64, g: f64, b: f64) {}
    /// `rg`
    fn set_fill_rgb(&mut self, r: f64, g: f64, b: f64) {}
    /// `K`
    fn set_stroke_cmyk(&mut self, c: f64, m: f64, y: f64, k: f64) {}
    /// `k`
    fn set_fill_cmyk(&mut self, c: f64, m: f64, y: f64, k: f64) {}
    /// `sh`
    fn paint_shading(&mut self, name: &str) {}

    // --- Text ---

    /// `BT`
    fn begin_text(&mut self) {}
    /// `ET`
    fn end_text(&mut self) {}
    /// `Tc`
    fn set_char_spacing(&mut self, spacing: f64) {}
    /// `Tw`
    fn set_word_spacing(&mut self, spacing: f64) {}
    /// `Tz`
    fn set_horizontal_scaling(&mut self, scale: f64) {}
    /// `TL`
    fn set_leading(&mut self, leading: f64) {}
    /// `Tf` — `type3_font` is present when the selected font is Type3.
    fn select_font(&mut self, name: &str, size: f64, type3_font: Option<&CompiledType3Font>) {}
    /// `Tr`
    fn set_render_mode(&mut self, mode: i64) {}
    /// `Ts`
    fn set_rise(&mut self, rise: f64) {}
    /// `Td`
    fn move_text(&mut self, tx: f64, ty: f64) {}
    /// `TD`
    fn move_text_set_leading(&mut self, tx: f64, ty: f64) {}
    /// `Tm`
    fn set_text_matrix(&mut self, matrix: &Matrix) {}
    /// `T*`
    fn next_line(&mut self) {}
    /// `Tj` (also reached through `'` and `"` after their state updates).
    fn show_text(&mut self, text: &[u8]) {}
    /// `TJ`
    fn show_text_adjusted(&mut self, elements: &[TextElement]) {}
    /// `d0`
    fn set_glyph_width(&mut self, wx: f64, wy: f64) {}
    /// `d1`
    fn set_glyph_width_bbox(&mut self, wx: f64, wy: f64, llx: f64, lly: f64, urx: f64, ury: f64) {}

    // --- XObjects and images ---

    /// `Do` with an image XObject.
    fn draw_image(&mut self, image: &ImageRef) {}
    /// `Do` with a form XObject.
    fn draw_form(&mut self, name: &str, form: &Arc<CompiledForm>) {}
    /// `BI ... ID ... EI`
    fn draw_inline_image(&mut self, image: &InlineImage) {}

    // --- Marked content ---

    /// `MP` / `DP`
    fn mark_point(&mut self, tag: &str, props: Option<&MarkedContentProps>) {}
    /// `BMC` / `BDC`
    fn begin_marked_content(&mut self, tag: &str, props: Option<&MarkedContentProps>) {}
    /// `EMC`
    fn end_marked_content(&mut self) {}

    // --- Compatibility ---

    /// `BX`
    fn begin_compatibility(&mut self) {}
    /// `EX`
    fn end_compatibility(&mut self) {}

    // --- Diagnostics ---

    /// Called for each warning recorded during compilation when a replay
    /// forwards them; never called during command replay itself.
    fn on_warning(&mut self, warning: &CompileWarning) {}
}

/// A sink that ignores everything. Useful as a placeholder.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ContentSink for NullSink {}
