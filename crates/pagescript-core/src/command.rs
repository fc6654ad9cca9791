//! The compiled command list: one immutable command per executed operator.
//!
//! A [`Command`] is a closed enum over the content stream operator set.
//! Each value is self-contained — named resources are resolved at compile
//! time and the resolved artifact (compiled form, pattern, Type3 font,
//! image metadata) travels with the command — so replaying a command list
//! against a [`ContentSink`](crate::sink::ContentSink) needs no document
//! access.

use std::sync::Arc;

use crate::artifact::{CompiledForm, CompiledPattern, CompiledType3Font};
use crate::geometry::Matrix;
use crate::image::{ImageRef, InlineImage};
use crate::operand::Operand;
use crate::sink::ContentSink;

/// Coarse command category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CmdType {
    /// Graphics state: q/Q/cm/w/J/j/M/d/ri/i/gs.
    State,
    /// Color and shading: CS/cs/SC/sc/SCN/scn/G/g/RG/rg/K/k/sh.
    Texture,
    /// Raster images: Do (image XObject) and BI…EI.
    Image,
    /// Form XObjects: Do (form XObject).
    Form,
    /// Text object, state, positioning, and showing operators.
    Text,
    /// Path construction, painting, and clipping.
    Path,
    /// Marked content: MP/DP/BMC/BDC…EMC.
    Markup,
    /// Compatibility sections: BX/EX.
    Special,
}

/// One element of a `TJ` show-text array.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TextElement {
    /// A string to show.
    Text(Vec<u8>),
    /// A position adjustment in thousandths of text space units.
    Adjust(f64),
}

/// Property list attached to `BDC`/`DP`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MarkedContentProps {
    /// Dictionary written inline in the content stream.
    Inline(Vec<(String, Operand)>),
    /// Name resolved against the resources' Properties dictionary.
    Named {
        /// The name used in the content stream.
        name: String,
        /// The resolved dictionary entries.
        dict: Vec<(String, Operand)>,
    },
}

impl MarkedContentProps {
    /// True when the properties came from the resource dictionary.
    pub fn is_named(&self) -> bool {
        matches!(self, MarkedContentProps::Named { .. })
    }
}

/// Pattern reference set by `SCN`/`scn` in a Pattern color space.
#[derive(Debug, Clone)]
pub struct PatternPaint {
    /// Pattern name in the resource dictionary.
    pub name: String,
    /// The compiled tiling pattern; `None` for shading patterns, whose
    /// geometry the sink fetches by name.
    pub pattern: Option<Arc<CompiledPattern>>,
}

impl PartialEq for PatternPaint {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// A single compiled content stream operator.
///
/// Variants carry exactly the payload the operator consumed; structural
/// variants (`MarkedContent`) own the commands emitted between their
/// opening and closing operators.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // --- Graphics state (State) ---
    /// `q`
    SaveState,
    /// `Q`
    RestoreState,
    /// `cm`
    ConcatMatrix(Matrix),
    /// `w`
    SetLineWidth(f64),
    /// `J`
    SetLineCap(i64),
    /// `j`
    SetLineJoin(i64),
    /// `M`
    SetMiterLimit(f64),
    /// `d`
    SetDashPattern { array: Vec<f64>, phase: f64 },
    /// `ri`
    SetRenderingIntent(String),
    /// `i`
    SetFlatness(f64),
    /// `gs` — the ExtGState stays in the document; a Type3 font referenced
    /// from it is compiled eagerly so the sink can replay glyphs.
    SetExtGState {
        name: String,
        type3_font: Option<Arc<CompiledType3Font>>,
    },

    // --- Path construction (Path) ---
    /// `m`
    MoveTo { x: f64, y: f64 },
    /// `l`
    LineTo { x: f64, y: f64 },
    /// `c`
    CurveTo { x1: f64, y1: f64, x2: f64, y2: f64, x3: f64, y3: f64 },
    /// `v` — first control point is the current point.
    CurveToV { x2: f64, y2: f64, x3: f64, y3: f64 },
    /// `y` — second control point is the final point.
    CurveToY { x1: f64, y1: f64, x3: f64, y3: f64 },
    /// `h`
    ClosePath,
    /// `re`
    Rectangle { x: f64, y: f64, width: f64, height: f64 },

    // --- Path painting and clipping (Path) ---
    /// `S`
    Stroke,
    /// `s`
    CloseStroke,
    /// `f` / `F`
    Fill,
    /// `f*`
    FillEvenOdd,
    /// `B`
    FillStroke,
    /// `B*`
    FillStrokeEvenOdd,
    /// `b`
    CloseFillStroke,
    /// `b*`
    CloseFillStrokeEvenOdd,
    /// `n`
    EndPath,
    /// `W`
    Clip,
    /// `W*`
    ClipEvenOdd,

    // --- Color (Texture) ---
    /// `CS`
    SetStrokeColorSpace { name: String, components: usize },
    /// `cs`
    SetFillColorSpace { name: String, components: usize },
    /// `SC`
    SetStrokeColor(Vec<f64>),
    /// `sc`
    SetFillColor(Vec<f64>),
    /// `SCN`
    SetStrokeColorExtended {
        components: Vec<f64>,
        pattern: Option<PatternPaint>,
    },
    /// `scn`
    SetFillColorExtended {
        components: Vec<f64>,
        pattern: Option<PatternPaint>,
    },
    /// `G`
    SetStrokeGray(f64),
    /// `g`
    SetFillGray(f64),
    /// `RG`
    SetStrokeRgb(f64, f64, f64),
    /// `rg`
    SetFillRgb(f64, f64, f64),
    /// `K`
    SetStrokeCmyk(f64, f64, f64, f64),
    /// `k`
    SetFillCmyk(f64, f64, f64, f64),
    /// `sh`
    PaintShading(String),

    // --- Text (Text) ---
    /// `BT`
    BeginText,
    /// `ET`
    EndText,
    /// `Tc`
    SetCharSpacing(f64),
    /// `Tw`
    SetWordSpacing(f64),
    /// `Tz`
    SetHorizontalScaling(f64),
    /// `TL`
    SetLeading(f64),
    /// `Tf` — a Type3 font's character procedures are compiled eagerly.
    SelectFont {
        name: String,
        size: f64,
        type3_font: Option<Arc<CompiledType3Font>>,
    },
    /// `Tr`
    SetRenderMode(i64),
    /// `Ts`
    SetRise(f64),
    /// `Td`
    MoveText { tx: f64, ty: f64 },
    /// `TD`
    MoveTextSetLeading { tx: f64, ty: f64 },
    /// `Tm`
    SetTextMatrix(Matrix),
    /// `T*`
    NextLine,
    /// `Tj`
    ShowText(Vec<u8>),
    /// `'`
    NextLineShowText(Vec<u8>),
    /// `"`
    NextLineShowTextSpaced {
        word_spacing: f64,
        char_spacing: f64,
        text: Vec<u8>,
    },
    /// `TJ`
    ShowTextAdjusted(Vec<TextElement>),
    /// `d0`
    SetGlyphWidth { wx: f64, wy: f64 },
    /// `d1`
    SetGlyphWidthBBox {
        wx: f64,
        wy: f64,
        llx: f64,
        lly: f64,
        urx: f64,
        ury: f64,
    },

    // --- XObjects and images (Image / Form) ---
    /// `Do` with an image XObject.
    DrawImage(ImageRef),
    /// `Do` with a form XObject; the form body is compiled recursively.
    DrawForm {
        name: String,
        form: Arc<CompiledForm>,
    },
    /// `BI … ID … EI`
    DrawInlineImage(InlineImage),

    // --- Marked content (Markup) ---
    /// `MP`
    MarkPoint(String),
    /// `DP`
    MarkPointWithProps {
        tag: String,
        props: MarkedContentProps,
    },
    /// A `BMC`/`BDC` … `EMC` region. Owns the commands emitted between
    /// the brackets; they appear nowhere else in the flat list.
    MarkedContent {
        tag: String,
        props: Option<MarkedContentProps>,
        commands: Vec<Command>,
    },

    // --- Compatibility (Special) ---
    /// `BX`
    BeginCompatibility,
    /// `EX`
    EndCompatibility,
}

impl Command {
    /// Coarse category of this command.
    pub fn cmd_type(&self) -> CmdType {
        use Command::*;
        match self {
            SaveState | RestoreState | ConcatMatrix(_) | SetLineWidth(_) | SetLineCap(_)
            | SetLineJoin(_) | SetMiterLimit(_) | SetDashPattern { .. }
            | SetRenderingIntent(_) | SetFlatness(_) | SetExtGState { .. } => CmdType::State,

            MoveTo { .. } | LineTo { .. } | CurveTo { .. } | CurveToV { .. }
            | CurveToY { .. } | ClosePath | Rectangle { .. } | Stroke | CloseStroke | Fill
            | FillEvenOdd | FillStroke | FillStrokeEvenOdd | CloseFillStroke
            | CloseFillStrokeEvenOdd | EndPath | Clip | ClipEvenOdd => CmdType::Path,

            SetStrokeColorSpace { .. } | SetFillColorSpace { .. } | SetStrokeColor(_)
            | SetFillColor(_) | SetStrokeColorExtended { .. } | SetFillColorExtended { .. }
            | SetStrokeGray(_) | SetFillGray(_) | SetStrokeRgb(..) | SetFillRgb(..)
            | SetStrokeCmyk(..) | SetFillCmyk(..) | PaintShading(_) => CmdType::Texture,

            BeginText | EndText | SetCharSpacing(_) | SetWordSpacing(_)
            | SetHorizontalScaling(_) | SetLeading(_) | SelectFont { .. } | SetRenderMode(_)
            | SetRise(_) | MoveText { .. } | MoveTextSetLeading { .. } | SetTextMatrix(_)
            | NextLine | ShowText(_) | NextLineShowText(_) | NextLineShowTextSpaced { .. }
            | ShowTextAdjusted(_) | SetGlyphWidth { .. } | SetGlyphWidthBBox { .. } => {
                CmdType::Text
            }

            DrawImage(_) | DrawInlineImage(_) => CmdType::Image,
            DrawForm { .. } => CmdType::Form,

            MarkPoint(_) | MarkPointWithProps { .. } | MarkedContent { .. } => CmdType::Markup,

            BeginCompatibility | EndCompatibility => CmdType::Special,
        }
    }

    /// The content stream keyword this command was compiled from.
    pub fn operator(&self) -> &'static str {
        use Command::*;
        match self {
            SaveState => "q",
            RestoreState => "Q",
            ConcatMatrix(_) => "cm",
            SetLineWidth(_) => "w",
            SetLineCap(_) => "J",
            SetLineJoin(_) => "j",
            SetMiterLimit(_) => "M",
            SetDashPattern { .. } => "d",
            SetRenderingIntent(_) => "ri",
            SetFlatness(_) => "i",
            SetExtGState { .. } => "gs",
            MoveTo { .. } => "m",
            LineTo { .. } => "l",
            CurveTo { .. } => "c",
            CurveToV { .. } => "v",
            CurveToY { .. } => "y",
            ClosePath => "h",
            Rectangle { .. } => "re",
            Stroke => "S",
            CloseStroke => "s",
            Fill => "f",
            FillEvenOdd => "f*",
            FillStroke => "B",
            FillStrokeEvenOdd => "B*",
            CloseFillStroke => "b",
            CloseFillStrokeEvenOdd => "b*",
            EndPath => "n",
            Clip => "W",
            ClipEvenOdd => "W*",
            SetStrokeColorSpace { .. } => "CS",
            SetFillColorSpace { .. } => "cs",
            SetStrokeColor(_) => "SC",
            SetFillColor(_) => "sc",
            SetStrokeColorExtended { .. } => "SCN",
            SetFillColorExtended { .. } => "scn",
            SetStrokeGray(_) => "G",
            SetFillGray(_) => "g",
            SetStrokeRgb(..) => "RG",
            SetFillRgb(..) => "rg",
            SetStrokeCmyk(..) => "K",
            SetFillCmyk(..) => "k",
            PaintShading(_) => "sh",
            BeginText => "BT",
            EndText => "ET",
            SetCharSpacing(_) => "Tc",
            SetWordSpacing(_) => "Tw",
            SetHorizontalScaling(_) => "Tz",
            SetLeading(_) => "TL",
            SelectFont { .. } => "Tf",
            SetRenderMode(_) => "Tr",
            SetRise(_) => "Ts",
            MoveText { .. } => "Td",
            MoveTextSetLeading { .. } => "TD",
            SetTextMatrix(_) => "Tm",
            NextLine => "T*",
            ShowText(_) => "Tj",
            NextLineShowText(_) => "'",
            NextLineShowTextSpaced { .. } => "\"",
            ShowTextAdjusted(_) => "TJ",
            SetGlyphWidth { .. } => "d0",
            SetGlyphWidthBBox { .. } => "d1",
            DrawImage(_) | DrawForm { .. } => "Do",
            DrawInlineImage(_) => "BI",
            MarkPoint(_) => "MP",
            MarkPointWithProps { .. } => "DP",
            MarkedContent { .. } => "BDC",
            BeginCompatibility => "BX",
            EndCompatibility => "EX",
        }
    }

    /// True when this command embeds a reference resolved from the
    /// resource dictionary (relevant when re-serializing: those names
    /// must exist in the target resources).
    pub fn needs_resources(&self) -> bool {
        use Command::*;
        match self {
            SetExtGState { .. } | SelectFont { .. } | DrawImage(_) | DrawForm { .. }
            | PaintShading(_) => true,
            SetStrokeColorSpace { name, .. } | SetFillColorSpace { name, .. } => {
                !matches!(name.as_str(), "DeviceGray" | "DeviceRGB" | "DeviceCMYK" | "Pattern")
            }
            SetStrokeColorExtended { pattern, .. } | SetFillColorExtended { pattern, .. } => {
                pattern.is_some()
            }
            MarkPointWithProps { props, .. } => props.is_named(),
            MarkedContent { props, .. } => {
                props.as_ref().is_some_and(MarkedContentProps::is_named)
            }
            _ => false,
        }
    }

    /// Replay this command against a drawing sink.
    ///
    /// Marked-content regions bracket their children between
    /// `begin_marked_content` and `end_marked_content`; the composite
    /// show-text operators (`'`, `"`) expand to the same sink calls the
    /// equivalent operator sequence would make.
    pub fn execute(&self, sink: &mut dyn ContentSink) {
        use Command::*;
        match self {
            SaveState => sink.save_state(),
            RestoreState => sink.restore_state(),
            ConcatMatrix(m) => sink.concat_matrix(m),
            SetLineWidth(w) => sink.set_line_width(*w),
            SetLineCap(c) => sink.set_line_cap(*c),
            SetLineJoin(j) => sink.set_line_join(*j),
            SetMiterLimit(m) => sink.set_miter_limit(*m),
            SetDashPattern { array, phase } => sink.set_dash_pattern(array, *phase),
            SetRenderingIntent(intent) => sink.set_rendering_intent(intent),
            SetFlatness(f) => sink.set_flatness(*f),
            SetExtGState { name, type3_font } => {
                sink.set_ext_g_state(name, type3_font.as_deref())
            }

            MoveTo { x, y } => sink.move_to(*x, *y),
            LineTo { x, y } => sink.line_to(*x, *y),
            CurveTo { x1, y1, x2, y2, x3, y3 } => sink.curve_to(*x1, *y1, *x2, *y2, *x3, *y3),
            CurveToV { x2, y2, x3, y3 } => sink.curve_to_v(*x2, *y2, *x3, *y3),
            CurveToY { x1, y1, x3, y3 } => sink.curve_to_y(*x1, *y1, *x3, *y3),
            ClosePath => sink.close_path(),
            Rectangle { x, y, width, height } => sink.rectangle(*x, *y, *width, *height),
            Stroke => sink.stroke(),
            CloseStroke => sink.close_stroke(),
            Fill => sink.fill(),
            FillEvenOdd => sink.fill_even_odd(),
            FillStroke => sink.fill_stroke(),
            FillStrokeEvenOdd => sink.fill_stroke_even_odd(),
            CloseFillStroke => sink.close_fill_stroke(),
            CloseFillStrokeEvenOdd => sink.close_fill_stroke_even_odd(),
            EndPath => sink.end_path(),
            Clip => sink.clip(),
            ClipEvenOdd => sink.clip_even_odd(),

            SetStrokeColorSpace { name, components } => {
                sink.set_stroke_color_space(name, *components)
            }
            SetFillColorSpace { name, components } => {
                sink.set_fill_color_space(name, *components)
            }
            SetStrokeColor(c) => sink.set_stroke_color(c),
            SetFillColor(c) => sink.set_fill_color(c),
            SetStrokeColorExtended { components, pattern } => {
                sink.set_stroke_color_extended(components, pattern.as_ref())
            }
            SetFillColorExtended { components, pattern } => {
                sink.set_fill_color_extended(components, pattern.as_ref())
            }
            SetStrokeGray(g) => sink.set_stroke_gray(*g),
            SetFillGray(g) => sink.set_fill_gray(*g),
            SetStrokeRgb(r, g, b) => sink.set_stroke_rgb(*r, *g, *b),
            SetFillRgb(r, g, b) => sink.set_fill_rgb(*r, *g, *b),
            SetStrokeCmyk(c, m, y, k) => sink.set_stroke_cmyk(*c, *m, *y, *k),
            SetFillCmyk(c, m, y, k) => sink.set_fill_cmyk(*c, *m, *y, *k),
            PaintShading(name) => sink.paint_shading(name),

            BeginText => sink.begin_text(),
            EndText => sink.end_text(),
            SetCharSpacing(v) => sink.set_char_spacing(*v),
            SetWordSpacing(v) => sink.set_word_spacing(*v),
            SetHorizontalScaling(v) => sink.set_horizontal_scaling(*v),
            SetLeading(v) => sink.set_leading(*v),
            SelectFont { name, size, type3_font } => {
                sink.select_font(name, *size, type3_font.as_deref())
            }
            SetRenderMode(m) => sink.set_render_mode(*m),
            SetRise(v) => sink.set_rise(*v),
            MoveText { tx, ty } => sink.move_text(*tx, *ty),
            MoveTextSetLeading { tx, ty } => sink.move_text_set_leading(*tx, *ty),
            SetTextMatrix(m) => sink.set_text_matrix(m),
            NextLine => sink.next_line(),
            ShowText(text) => sink.show_text(text),
            NextLineShowText(text) => {
                sink.next_line();
                sink.show_text(text);
            }
            NextLineShowTextSpaced { word_spacing, char_spacing, text } => {
                sink.set_word_spacing(*word_spacing);
                sink.set_char_spacing(*char_spacing);
                sink.next_line();
                sink.show_text(text);
            }
            ShowTextAdjusted(elements) => sink.show_text_adjusted(elements),
            SetGlyphWidth { wx, wy } => sink.set_glyph_width(*wx, *wy),
            SetGlyphWidthBBox { wx, wy, llx, lly, urx, ury } => {
                sink.set_glyph_width_bbox(*wx, *wy, *llx, *lly, *urx, *ury)
            }

            DrawImage(image) => sink.draw_image(image),
            DrawForm { name, form } => sink.draw_form(name, form),
            DrawInlineImage(image) => sink.draw_inline_image(image),

            MarkPoint(tag) => sink.mark_point(tag, None),
            MarkPointWithProps { tag, props } => sink.mark_point(tag, Some(props)),
            MarkedContent { tag, props, commands } => {
                sink.begin_marked_content(tag, props.as_ref());
                for command in commands {
                    command.execute(sink);
                }
                sink.end_marked_content();
            }

            BeginCompatibility => sink.begin_compatibility(),
            EndCompatibility => sink.end_compatibility(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::ContentSink;

    // --- Recording sink used across the command tests ---

    #[derive(Default)]
    struct RecordingSink {
        calls: Vec<String>,
    }

    impl ContentSink for RecordingSink {
        fn save_state(&mut self) {
            self.calls.push("save".to_string());
        }
        fn restore_state(&mut self) {
            self.calls.push("restore".to_string());
        }
        fn set_word_spacing(&mut self, v: f64) {
            self.calls.push(format!("Tw {v}"));
        }
        fn set_char_spacing(&mut self, v: f64) {
            self.calls.push(format!("Tc {v}"));
        }
        fn next_line(&mut self) {
            self.calls.push("T*".to_string());
        }
        fn show_text(&mut self, text: &[u8]) {
            self.calls.push(format!("Tj {}", String::from_utf8_lossy(text)));
        }
        fn begin_marked_content(&mut self, tag: &str, _props: Option<&MarkedContentProps>) {
            self.calls.push(format!("BDC {tag}"));
        }
        fn end_marked_content(&mut self) {
            self.calls.push("EMC".to_string());
        }
        fn move_to(&mut self, x: f64, y: f64) {
            self.calls.push(format!("m {x} {y}"));
        }
        fn stroke(&mut self) {
            self.calls.push("S".to_string());
        }
    }

    // --- Classification ---

    #[test]
    fn cmd_type_classification() {
        assert_eq!(Command::SaveState.cmd_type(), CmdType::State);
        assert_eq!(Command::MoveTo { x: 0.0, y: 0.0 }.cmd_type(), CmdType::Path);
        assert_eq!(Command::Stroke.cmd_type(), CmdType::Path);
        assert_eq!(Command::SetFillGray(0.5).cmd_type(), CmdType::Texture);
        assert_eq!(Command::PaintShading("Sh0".to_string()).cmd_type(), CmdType::Texture);
        assert_eq!(Command::BeginText.cmd_type(), CmdType::Text);
        assert_eq!(Command::MarkPoint("P".to_string()).cmd_type(), CmdType::Markup);
        assert_eq!(Command::BeginCompatibility.cmd_type(), CmdType::Special);
    }

    #[test]
    fn operator_names_round_trip_sample() {
        assert_eq!(Command::SaveState.operator(), "q");
        assert_eq!(Command::FillEvenOdd.operator(), "f*");
        assert_eq!(Command::NextLine.operator(), "T*");
        assert_eq!(Command::ShowTextAdjusted(vec![]).operator(), "TJ");
        assert_eq!(Command::EndCompatibility.operator(), "EX");
    }

    // --- Resource tracking ---

    #[test]
    fn device_color_space_needs_no_resources() {
        let cmd = Command::SetFillColorSpace {
            name: "DeviceRGB".to_string(),
            components: 3,
        };
        assert!(!cmd.needs_resources());
    }

    #[test]
    fn named_color_space_needs_resources() {
        let cmd = Command::SetFillColorSpace {
            name: "CS0".to_string(),
            components: 4,
        };
        assert!(cmd.needs_resources());
    }

    #[test]
    fn pattern_paint_needs_resources() {
        let with_pattern = Command::SetFillColorExtended {
            components: vec![],
            pattern: Some(PatternPaint {
                name: "P0".to_string(),
                pattern: None,
            }),
        };
        let plain = Command::SetFillColorExtended {
            components: vec![0.5],
            pattern: None,
        };
        assert!(with_pattern.needs_resources());
        assert!(!plain.needs_resources());
    }

    #[test]
    fn named_props_need_resources_inline_do_not() {
        let named = Command::MarkPointWithProps {
            tag: "Span".to_string(),
            props: MarkedContentProps::Named {
                name: "MC0".to_string(),
                dict: vec![],
            },
        };
        let inline = Command::MarkPointWithProps {
            tag: "Span".to_string(),
            props: MarkedContentProps::Inline(vec![]),
        };
        assert!(named.needs_resources());
        assert!(!inline.needs_resources());
    }

    #[test]
    fn shading_and_font_need_resources() {
        assert!(Command::PaintShading("Sh0".to_string()).needs_resources());
        assert!(
            Command::SelectFont {
                name: "F1".to_string(),
                size: 12.0,
                type3_font: None,
            }
            .needs_resources()
        );
        assert!(!Command::SetLineWidth(1.0).needs_resources());
    }

    // --- Execute ---

    #[test]
    fn execute_simple_commands() {
        let mut sink = RecordingSink::default();
        Command::SaveState.execute(&mut sink);
        Command::MoveTo { x: 1.0, y: 2.0 }.execute(&mut sink);
        Command::Stroke.execute(&mut sink);
        Command::RestoreState.execute(&mut sink);
        assert_eq!(sink.calls, vec!["save", "m 1 2", "S", "restore"]);
    }

    #[test]
    fn execute_marked_content_brackets_children() {
        let region = Command::MarkedContent {
            tag: "P".to_string(),
            props: None,
            commands: vec![
                Command::ShowText(b"a".to_vec()),
                Command::ShowText(b"b".to_vec()),
            ],
        };
        let mut sink = RecordingSink::default();
        region.execute(&mut sink);
        assert_eq!(sink.calls, vec!["BDC P", "Tj a", "Tj b", "EMC"]);
    }

    #[test]
    fn execute_quote_expands_to_next_line_then_show() {
        let mut sink = RecordingSink::default();
        Command::NextLineShowText(b"hi".to_vec()).execute(&mut sink);
        assert_eq!(sink.calls, vec!["T*", "Tj hi"]);
    }

    #[test]
    fn execute_double_quote_sets_spacing_first() {
        let mut sink = RecordingSink::default();
        Command::NextLineShowTextSpaced {
            word_spacing: 1.0,
            char_spacing: 2.0,
            text: b"x".to_vec(),
        }
        .execute(&mut sink);
        assert_eq!(sink.calls, vec!["Tw 1", "Tc 2", "T*", "Tj x"]);
    }
}
