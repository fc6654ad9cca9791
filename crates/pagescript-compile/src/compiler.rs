//! The content stream compiler: token loop, operator dispatch, state
//! validation, error recovery, and recursive sub-compilation.
//!
//! The compiler is best-effort by default. Malformed syntax, wrong
//! operand shapes, and operators illegal in the current graphics mode
//! become [`CompileWarning`]s and the stream is resynchronized; only
//! structural failures (unresolvable resources, recursion past the
//! limit at the top level, oversized streams) abort a compile. With
//! [`CompileOptions::strict_mode`] set, degradations outside `BX`/`EX`
//! sections escalate to errors instead.

use std::sync::Arc;

use lopdf::{Object, ObjectId, Stream};
use pagescript_core::{
    CompileOptions, CompileWarning, CompileWarningCode, CompiledContent, CompiledForm,
    CompiledPattern, CompiledType3Font, Command, ContentError, ImageRef, MarkedContentProps,
    Matrix, Operand, PatternPaint, TextElement,
};
use tracing::{debug, trace};

use crate::cache::CompileCache;
use crate::color_space::ColorSpaceBinding;
use crate::inline_image::read_inline_image;
use crate::lexer::{Lexer, Token};
use crate::objects::{MAX_OPERATOR_LEN, parse_operand};
use crate::resources::{Resources, dict_to_operands, matrix_from, rect_from, resolve_ref};
use crate::state::{GraphicsMode, Tracker};

/// How many operands an operator consumes.
#[derive(Debug, Clone, Copy)]
enum Arity {
    Fixed(usize),
    /// `SC`: one number per component of the stroke color space.
    StrokeColor,
    /// `sc`: one number per component of the fill color space.
    FillColor,
    /// `SCN`: like `SC`, plus a trailing pattern name in Pattern spaces.
    StrokeColorExtended,
    /// `scn`: like `sc`, plus a trailing pattern name in Pattern spaces.
    FillColorExtended,
}

/// Which graphics modes an operator may appear in.
#[derive(Debug, Clone, Copy)]
enum Legality {
    PageOnly,
    PathOnly,
    TextOnly,
    PageOrText,
    PageOrPath,
    Any,
}

impl Legality {
    fn allows(self, mode: GraphicsMode) -> bool {
        match self {
            Legality::PageOnly => mode == GraphicsMode::Page,
            Legality::PathOnly => mode == GraphicsMode::Path,
            Legality::TextOnly => mode == GraphicsMode::Text,
            Legality::PageOrText => matches!(mode, GraphicsMode::Page | GraphicsMode::Text),
            Legality::PageOrPath => matches!(mode, GraphicsMode::Page | GraphicsMode::Path),
            Legality::Any => true,
        }
    }
}

struct OpInfo {
    arity: Arity,
    legal: Legality,
    /// Mode after a successful dispatch, when the operator changes it.
    next: Option<GraphicsMode>,
}

fn op_info(name: &str) -> Option<OpInfo> {
    use Arity::*;
    use GraphicsMode::*;
    use Legality::*;

    let info = |arity, legal, next| Some(OpInfo { arity, legal, next });
    match name {
        // Graphics state.
        "q" | "Q" => info(Fixed(0), PageOnly, None),
        "cm" => info(Fixed(6), PageOnly, None),
        "w" | "J" | "j" | "M" | "ri" | "i" | "gs" => info(Fixed(1), PageOrText, None),
        "d" => info(Fixed(2), PageOrText, None),

        // Path construction.
        "m" | "l" => info(Fixed(2), PageOrPath, Some(Path)),
        "c" => info(Fixed(6), PageOrPath, Some(Path)),
        "v" | "y" => info(Fixed(4), PageOrPath, Some(Path)),
        "h" => info(Fixed(0), PageOrPath, Some(Path)),
        "re" => info(Fixed(4), PageOrPath, Some(Path)),

        // Path painting and clipping.
        "S" | "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" | "n" => {
            info(Fixed(0), PathOnly, Some(Page))
        }
        "W" | "W*" => info(Fixed(0), PathOnly, Some(Path)),

        // Color.
        "CS" | "cs" => info(Fixed(1), PageOrText, None),
        "SC" => info(StrokeColor, PageOrText, None),
        "sc" => info(FillColor, PageOrText, None),
        "SCN" => info(StrokeColorExtended, PageOrText, None),
        "scn" => info(FillColorExtended, PageOrText, None),
        "G" | "g" => info(Fixed(1), PageOrText, None),
        "RG" | "rg" => info(Fixed(3), PageOrText, None),
        "K" | "k" => info(Fixed(4), PageOrText, None),
        "sh" => info(Fixed(1), PageOnly, None),

        // Text.
        "BT" => info(Fixed(0), PageOnly, Some(Text)),
        "ET" => info(Fixed(0), TextOnly, Some(Page)),
        "Tc" | "Tw" | "Tz" | "TL" | "Tr" | "Ts" => info(Fixed(1), PageOrText, None),
        "Tf" => info(Fixed(2), PageOrText, None),
        "Td" | "TD" => info(Fixed(2), TextOnly, None),
        "Tm" => info(Fixed(6), TextOnly, None),
        "T*" => info(Fixed(0), TextOnly, None),
        "Tj" | "'" | "TJ" => info(Fixed(1), TextOnly, None),
        "\"" => info(Fixed(3), TextOnly, None),
        "d0" => info(Fixed(2), PageOnly, None),
        "d1" => info(Fixed(6), PageOnly, None),

        // XObjects, images, shading.
        "Do" => info(Fixed(1), PageOnly, None),
        "BI" => info(Fixed(0), PageOnly, None),

        // Marked content.
        "MP" | "BMC" => info(Fixed(1), PageOrText, None),
        "DP" | "BDC" => info(Fixed(2), PageOrText, None),
        "EMC" => info(Fixed(0), PageOrText, None),

        // Compatibility.
        "BX" | "EX" => info(Fixed(0), Any, None),

        _ => None,
    }
}

/// An open `BMC`/`BDC` region: the command list grows flat until the
/// matching `EMC` splices everything after `start` into one command.
struct MarkedFrame {
    tag: String,
    props: Option<MarkedContentProps>,
    start: usize,
}

/// Non-structural errors degrade to warnings; the returned code decides
/// which, and `None` means the error is fatal to the compile.
fn recoverable_code(err: &ContentError) -> Option<CompileWarningCode> {
    match err {
        ContentError::WrongType { .. } => Some(CompileWarningCode::OperandMismatch),
        ContentError::RecursionLimit { .. } => Some(CompileWarningCode::IgnoredOperator),
        ContentError::Syntax(_)
        | ContentError::IllegalToken { .. }
        | ContentError::UnexpectedEof(_)
        | ContentError::FilterInvalid(_) => Some(CompileWarningCode::ResyncPerformed),
        ContentError::MissingResource { .. } | ContentError::Other(_) => None,
    }
}

pub(crate) struct Compiler<'a> {
    lexer: Lexer<'a>,
    resources: Resources<'a>,
    options: &'a CompileOptions,
    cache: CompileCache,
    depth: usize,
    tracker: Tracker,
    stack: Vec<Operand>,
    commands: Vec<Command>,
    warnings: Vec<CompileWarning>,
    marked: Vec<MarkedFrame>,
    compat_depth: usize,
}

impl<'a> Compiler<'a> {
    fn new(
        data: &'a [u8],
        resources: Resources<'a>,
        options: &'a CompileOptions,
        cache: CompileCache,
        depth: usize,
    ) -> Self {
        Self {
            lexer: Lexer::new(data),
            resources,
            options,
            cache,
            depth,
            tracker: Tracker::new(),
            stack: Vec::new(),
            commands: Vec::new(),
            warnings: Vec::new(),
            marked: Vec::new(),
            compat_depth: 0,
        }
    }

    fn run(mut self) -> Result<CompiledContent, ContentError> {
        loop {
            match self.lexer.next_token() {
                Ok(None) => break,
                Ok(Some((offset, Token::Keyword(keyword)))) => match keyword.as_str() {
                    "true" => self.stack.push(Operand::Boolean(true)),
                    "false" => self.stack.push(Operand::Boolean(false)),
                    "null" => self.stack.push(Operand::Null),
                    op if op.len() <= MAX_OPERATOR_LEN => self.dispatch(op, offset)?,
                    op => {
                        let err = ContentError::IllegalToken {
                            token: op.to_string(),
                            offset,
                        };
                        self.degrade_stream_error(err, offset)?;
                    }
                },
                Ok(Some((offset, token))) => {
                    match parse_operand(&mut self.lexer, offset, token) {
                        Ok(operand) => self.stack.push(operand),
                        Err(err) => self.degrade_stream_error(err, offset)?,
                    }
                }
                Err(err) => {
                    let offset = self.lexer.pos().saturating_sub(1);
                    self.degrade_stream_error(err, offset)?;
                }
            }
        }
        self.finish()
    }

    // --- Warnings and strict-mode escalation ---

    fn warn(&mut self, warning: CompileWarning) {
        trace!(warning = %warning, "compile degradation");
        if self.options.collect_warnings {
            self.warnings.push(warning);
        }
    }

    /// Record a degradation, or fail outright in strict mode. Inside a
    /// `BX`/`EX` section degradations never escalate.
    fn degrade(&mut self, warning: CompileWarning, err: ContentError) -> Result<(), ContentError> {
        if self.options.strict_mode && self.compat_depth == 0 {
            return Err(err);
        }
        self.warn(warning);
        Ok(())
    }

    /// A lexer or operand-parse failure: degrade, then resynchronize.
    fn degrade_stream_error(
        &mut self,
        err: ContentError,
        offset: usize,
    ) -> Result<(), ContentError> {
        let warning = CompileWarning {
            code: CompileWarningCode::ResyncPerformed,
            description: err.to_string(),
            operator: None,
            offset: Some(offset),
        };
        self.degrade(warning, err)?;
        self.recover();
        Ok(())
    }

    // --- Dispatch ---

    fn dispatch(&mut self, op: &str, offset: usize) -> Result<(), ContentError> {
        let Some(info) = op_info(op) else {
            self.stack.clear();
            let warning = CompileWarning::at_operator(
                CompileWarningCode::IgnoredOperator,
                format!("unknown operator {op}"),
                op,
                offset,
            );
            return self.degrade(
                warning,
                ContentError::IllegalToken {
                    token: op.to_string(),
                    offset,
                },
            );
        };

        if !info.legal.allows(self.tracker.mode) {
            // An illegal BI still owns the bytes through its EI; consume
            // them so the sample data is not lexed as operators.
            if op == "BI" {
                let _ = read_inline_image(&mut self.lexer, &self.resources);
            }
            self.stack.clear();
            let warning = CompileWarning::at_operator(
                CompileWarningCode::IgnoredOperator,
                format!(
                    "operator {op} not allowed in {} mode",
                    self.tracker.mode.describe()
                ),
                op,
                offset,
            );
            return self.degrade(
                warning,
                ContentError::Syntax(format!(
                    "operator {op} not allowed in {} mode",
                    self.tracker.mode.describe()
                )),
            );
        }

        let needed = self.arity_count(info.arity);
        if self.stack.len() < needed {
            let found = self.stack.len();
            self.stack.clear();
            let warning = CompileWarning::at_operator(
                CompileWarningCode::OperandMismatch,
                format!("operator {op} needs {needed} operands, found {found}"),
                op,
                offset,
            );
            return self.degrade(
                warning,
                ContentError::Syntax(format!(
                    "operator {op} needs {needed} operands, found {found}"
                )),
            );
        }
        if self.stack.len() > needed {
            let excess = self.stack.len() - needed;
            let warning = CompileWarning::at_operator(
                CompileWarningCode::OperandMismatch,
                format!("{excess} excess operands before {op}"),
                op,
                offset,
            );
            self.degrade(
                warning,
                ContentError::Syntax(format!("{excess} excess operands before {op}")),
            )?;
        }
        let ops = self.stack.split_off(self.stack.len() - needed);
        self.stack.clear();

        match self.build_command(op, &ops, offset) {
            Ok(()) => {
                if let Some(next) = info.next {
                    self.tracker.mode = next;
                }
                Ok(())
            }
            Err(err) => match recoverable_code(&err) {
                Some(code) => {
                    let resync = code == CompileWarningCode::ResyncPerformed;
                    let warning =
                        CompileWarning::at_operator(code, err.to_string(), op, offset);
                    self.degrade(warning, err)?;
                    if resync {
                        self.recover();
                    }
                    Ok(())
                }
                None => Err(err),
            },
        }
    }

    fn arity_count(&self, arity: Arity) -> usize {
        let extended = |space: &ColorSpaceBinding| {
            space.n_components() + usize::from(space.is_pattern())
        };
        match arity {
            Arity::Fixed(n) => n,
            Arity::StrokeColor => self.tracker.stroke_space().n_components(),
            Arity::FillColor => self.tracker.fill_space().n_components(),
            Arity::StrokeColorExtended => extended(self.tracker.stroke_space()),
            Arity::FillColorExtended => extended(self.tracker.fill_space()),
        }
    }

    fn emit(&mut self, command: Command) {
        self.commands.push(command);
    }

    // --- Command construction ---

    fn build_command(
        &mut self,
        op: &str,
        ops: &[Operand],
        offset: usize,
    ) -> Result<(), ContentError> {
        let f = |i: usize| ops[i].as_f64();
        let int = |i: usize| ops[i].as_i64();
        let name = |i: usize| ops[i].as_name().map(str::to_string);
        let string = |i: usize| ops[i].as_string_bytes().map(<[u8]>::to_vec);

        match op {
            // --- Graphics state ---
            "q" => {
                self.tracker.save();
                self.emit(Command::SaveState);
            }
            "Q" => {
                if self.tracker.restore() {
                    self.emit(Command::RestoreState);
                } else {
                    let warning = CompileWarning::at_operator(
                        CompileWarningCode::UnbalancedRestore,
                        "Q without matching q",
                        op,
                        offset,
                    );
                    self.degrade(
                        warning,
                        ContentError::Syntax("Q without matching q".to_string()),
                    )?;
                }
            }
            "cm" => self.emit(Command::ConcatMatrix(Matrix::new(
                f(0)?,
                f(1)?,
                f(2)?,
                f(3)?,
                f(4)?,
                f(5)?,
            ))),
            "w" => self.emit(Command::SetLineWidth(f(0)?)),
            "J" => self.emit(Command::SetLineCap(int(0)?)),
            "j" => self.emit(Command::SetLineJoin(int(0)?)),
            "M" => self.emit(Command::SetMiterLimit(f(0)?)),
            "d" => {
                let array = ops[0]
                    .as_array()?
                    .iter()
                    .map(Operand::as_f64)
                    .collect::<Result<Vec<_>, _>>()?;
                self.emit(Command::SetDashPattern { array, phase: f(1)? });
            }
            "ri" => self.emit(Command::SetRenderingIntent(name(0)?)),
            "i" => self.emit(Command::SetFlatness(f(0)?)),
            "gs" => {
                let gs_name = name(0)?;
                let dict = self.resources.ext_g_state(&gs_name)?;
                let type3_font = self.ext_g_state_type3(dict)?;
                self.emit(Command::SetExtGState {
                    name: gs_name,
                    type3_font,
                });
            }

            // --- Path construction ---
            "m" => self.emit(Command::MoveTo { x: f(0)?, y: f(1)? }),
            "l" => self.emit(Command::LineTo { x: f(0)?, y: f(1)? }),
            "c" => self.emit(Command::CurveTo {
                x1: f(0)?,
                y1: f(1)?,
                x2: f(2)?,
                y2: f(3)?,
                x3: f(4)?,
                y3: f(5)?,
            }),
            "v" => self.emit(Command::CurveToV {
                x2: f(0)?,
                y2: f(1)?,
                x3: f(2)?,
                y3: f(3)?,
            }),
            "y" => self.emit(Command::CurveToY {
                x1: f(0)?,
                y1: f(1)?,
                x3: f(2)?,
                y3: f(3)?,
            }),
            "h" => self.emit(Command::ClosePath),
            "re" => self.emit(Command::Rectangle {
                x: f(0)?,
                y: f(1)?,
                width: f(2)?,
                height: f(3)?,
            }),

            // --- Path painting and clipping ---
            "S" => self.emit(Command::Stroke),
            "s" => self.emit(Command::CloseStroke),
            "f" | "F" => self.emit(Command::Fill),
            "f*" => self.emit(Command::FillEvenOdd),
            "B" => self.emit(Command::FillStroke),
            "B*" => self.emit(Command::FillStrokeEvenOdd),
            "b" => self.emit(Command::CloseFillStroke),
            "b*" => self.emit(Command::CloseFillStrokeEvenOdd),
            "n" => self.emit(Command::EndPath),
            "W" => self.emit(Command::Clip),
            "W*" => self.emit(Command::ClipEvenOdd),

            // --- Color ---
            "CS" | "cs" => {
                let space_name = name(0)?;
                let binding = self.resolve_color_space(&space_name)?;
                let components = binding.n_components();
                if op == "CS" {
                    self.tracker.set_stroke_space(binding);
                    self.emit(Command::SetStrokeColorSpace {
                        name: space_name,
                        components,
                    });
                } else {
                    self.tracker.set_fill_space(binding);
                    self.emit(Command::SetFillColorSpace {
                        name: space_name,
                        components,
                    });
                }
            }
            "SC" | "sc" => {
                let components = ops
                    .iter()
                    .map(Operand::as_f64)
                    .collect::<Result<Vec<_>, _>>()?;
                if op == "SC" {
                    self.emit(Command::SetStrokeColor(components));
                } else {
                    self.emit(Command::SetFillColor(components));
                }
            }
            "SCN" | "scn" => {
                let stroke = op == "SCN";
                let is_pattern = if stroke {
                    self.tracker.stroke_space().is_pattern()
                } else {
                    self.tracker.fill_space().is_pattern()
                };
                let (numbers, pattern) = if is_pattern {
                    let pattern_name = ops
                        .last()
                        .ok_or_else(|| ContentError::WrongType {
                            expected: "pattern name",
                            found: "nothing",
                        })?
                        .as_name()?
                        .to_string();
                    let numbers = ops[..ops.len() - 1]
                        .iter()
                        .map(Operand::as_f64)
                        .collect::<Result<Vec<_>, _>>()?;
                    let pattern = self.resolve_pattern(&pattern_name)?;
                    (
                        numbers,
                        Some(PatternPaint {
                            name: pattern_name,
                            pattern,
                        }),
                    )
                } else {
                    let numbers = ops
                        .iter()
                        .map(Operand::as_f64)
                        .collect::<Result<Vec<_>, _>>()?;
                    (numbers, None)
                };
                if stroke {
                    self.emit(Command::SetStrokeColorExtended {
                        components: numbers,
                        pattern,
                    });
                } else {
                    self.emit(Command::SetFillColorExtended {
                        components: numbers,
                        pattern,
                    });
                }
            }
            "G" | "g" => {
                let gray = f(0)?;
                if op == "G" {
                    self.tracker.set_stroke_space(ColorSpaceBinding::DeviceGray);
                    self.emit(Command::SetStrokeGray(gray));
                } else {
                    self.tracker.set_fill_space(ColorSpaceBinding::DeviceGray);
                    self.emit(Command::SetFillGray(gray));
                }
            }
            "RG" | "rg" => {
                let (r, g, b) = (f(0)?, f(1)?, f(2)?);
                if op == "RG" {
                    self.tracker.set_stroke_space(ColorSpaceBinding::DeviceRgb);
                    self.emit(Command::SetStrokeRgb(r, g, b));
                } else {
                    self.tracker.set_fill_space(ColorSpaceBinding::DeviceRgb);
                    self.emit(Command::SetFillRgb(r, g, b));
                }
            }
            "K" | "k" => {
                let (c, m, y, kk) = (f(0)?, f(1)?, f(2)?, f(3)?);
                if op == "K" {
                    self.tracker.set_stroke_space(ColorSpaceBinding::DeviceCmyk);
                    self.emit(Command::SetStrokeCmyk(c, m, y, kk));
                } else {
                    self.tracker.set_fill_space(ColorSpaceBinding::DeviceCmyk);
                    self.emit(Command::SetFillCmyk(c, m, y, kk));
                }
            }
            "sh" => {
                let shading_name = name(0)?;
                self.resources.shading(&shading_name)?;
                self.emit(Command::PaintShading(shading_name));
            }

            // --- Text ---
            "BT" => self.emit(Command::BeginText),
            "ET" => self.emit(Command::EndText),
            "Tc" => self.emit(Command::SetCharSpacing(f(0)?)),
            "Tw" => self.emit(Command::SetWordSpacing(f(0)?)),
            "Tz" => self.emit(Command::SetHorizontalScaling(f(0)?)),
            "TL" => self.emit(Command::SetLeading(f(0)?)),
            "Tf" => {
                let font_name = name(0)?;
                let size = f(1)?;
                let (id, dict) = self.resources.font(&font_name)?;
                let type3_font = if is_type3(dict) {
                    Some(self.compile_type3(id, dict)?)
                } else {
                    None
                };
                self.emit(Command::SelectFont {
                    name: font_name,
                    size,
                    type3_font,
                });
            }
            "Tr" => self.emit(Command::SetRenderMode(int(0)?)),
            "Ts" => self.emit(Command::SetRise(f(0)?)),
            "Td" => self.emit(Command::MoveText { tx: f(0)?, ty: f(1)? }),
            "TD" => self.emit(Command::MoveTextSetLeading { tx: f(0)?, ty: f(1)? }),
            "Tm" => self.emit(Command::SetTextMatrix(Matrix::new(
                f(0)?,
                f(1)?,
                f(2)?,
                f(3)?,
                f(4)?,
                f(5)?,
            ))),
            "T*" => self.emit(Command::NextLine),
            "Tj" => self.emit(Command::ShowText(string(0)?)),
            "'" => self.emit(Command::NextLineShowText(string(0)?)),
            "\"" => self.emit(Command::NextLineShowTextSpaced {
                word_spacing: f(0)?,
                char_spacing: f(1)?,
                text: string(2)?,
            }),
            "TJ" => {
                let elements = ops[0]
                    .as_array()?
                    .iter()
                    .map(|element| match element {
                        Operand::Integer(_) | Operand::Real(_) => {
                            Ok(TextElement::Adjust(element.as_f64()?))
                        }
                        Operand::LiteralString(b) | Operand::HexString(b) => {
                            Ok(TextElement::Text(b.clone()))
                        }
                        other => Err(ContentError::WrongType {
                            expected: "string or number in TJ array",
                            found: other.tag(),
                        }),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                self.emit(Command::ShowTextAdjusted(elements));
            }
            "d0" => self.emit(Command::SetGlyphWidth { wx: f(0)?, wy: f(1)? }),
            "d1" => self.emit(Command::SetGlyphWidthBBox {
                wx: f(0)?,
                wy: f(1)?,
                llx: f(2)?,
                lly: f(3)?,
                urx: f(4)?,
                ury: f(5)?,
            }),

            // --- XObjects and images ---
            "Do" => {
                let xobject_name = name(0)?;
                let (id, stream) = self.resources.xobject(&xobject_name)?;
                let subtype = stream
                    .dict
                    .get(b"Subtype")
                    .ok()
                    .and_then(|o| o.as_name().ok());
                match subtype {
                    Some(b"Image") => {
                        let image = image_ref(&xobject_name, stream)?;
                        self.emit(Command::DrawImage(image));
                    }
                    Some(b"Form") => {
                        let form = self.compile_form(id, stream)?;
                        self.emit(Command::DrawForm {
                            name: xobject_name,
                            form,
                        });
                    }
                    _ => {
                        let warning = CompileWarning::at_operator(
                            CompileWarningCode::IgnoredOperator,
                            format!("XObject /{xobject_name} has unsupported subtype"),
                            op,
                            offset,
                        );
                        self.degrade(
                            warning,
                            ContentError::Syntax(format!(
                                "XObject /{xobject_name} has unsupported subtype"
                            )),
                        )?;
                    }
                }
            }
            "BI" => {
                let image = read_inline_image(&mut self.lexer, &self.resources)?;
                self.emit(Command::DrawInlineImage(image));
            }

            // --- Marked content ---
            "MP" => self.emit(Command::MarkPoint(name(0)?)),
            "DP" => {
                let tag = name(0)?;
                let props = self.marked_content_props(&ops[1])?;
                self.emit(Command::MarkPointWithProps { tag, props });
            }
            "BMC" => self.marked.push(MarkedFrame {
                tag: name(0)?,
                props: None,
                start: self.commands.len(),
            }),
            "BDC" => {
                let tag = name(0)?;
                let props = self.marked_content_props(&ops[1])?;
                self.marked.push(MarkedFrame {
                    tag,
                    props: Some(props),
                    start: self.commands.len(),
                });
            }
            "EMC" => {
                if self.marked.is_empty() {
                    let warning = CompileWarning::at_operator(
                        CompileWarningCode::UnbalancedRestore,
                        "EMC without matching BMC/BDC",
                        op,
                        offset,
                    );
                    self.degrade(
                        warning,
                        ContentError::Syntax("EMC without matching BMC/BDC".to_string()),
                    )?;
                } else {
                    self.splice_marked();
                }
            }

            // --- Compatibility ---
            "BX" => {
                self.compat_depth += 1;
                self.emit(Command::BeginCompatibility);
            }
            "EX" => {
                if self.compat_depth == 0 {
                    let warning = CompileWarning::at_operator(
                        CompileWarningCode::UnbalancedRestore,
                        "EX without matching BX",
                        op,
                        offset,
                    );
                    self.degrade(
                        warning,
                        ContentError::Syntax("EX without matching BX".to_string()),
                    )?;
                } else {
                    self.compat_depth -= 1;
                    self.emit(Command::EndCompatibility);
                }
            }

            // op_info and build_command cover the same set.
            _ => unreachable!("operator {op} has op_info but no builder"),
        }
        Ok(())
    }

    fn splice_marked(&mut self) {
        let frame = self.marked.pop().expect("caller checked");
        let children = self.commands.split_off(frame.start);
        self.commands.push(Command::MarkedContent {
            tag: frame.tag,
            props: frame.props,
            commands: children,
        });
    }

    fn marked_content_props(
        &mut self,
        operand: &Operand,
    ) -> Result<MarkedContentProps, ContentError> {
        match operand {
            Operand::Dictionary(entries) => Ok(MarkedContentProps::Inline(entries.clone())),
            Operand::Name(props_name) => {
                let dict = self.resources.properties(props_name)?;
                Ok(MarkedContentProps::Named {
                    name: props_name.clone(),
                    dict: dict_to_operands(self.resources.doc(), dict, 0),
                })
            }
            other => Err(ContentError::WrongType {
                expected: "property list name or dictionary",
                found: other.tag(),
            }),
        }
    }

    fn resolve_color_space(&self, space_name: &str) -> Result<ColorSpaceBinding, ContentError> {
        if let Some(binding) = ColorSpaceBinding::from_device_name(space_name) {
            return Ok(binding);
        }
        let obj = self.resources.color_space(space_name)?;
        ColorSpaceBinding::resolve(obj, self.resources.doc())
    }

    // --- Recursive sub-compiles ---

    fn resolve_pattern(
        &mut self,
        pattern_name: &str,
    ) -> Result<Option<Arc<CompiledPattern>>, ContentError> {
        let (id, obj) = self.resources.pattern(pattern_name)?;
        let pattern_type = match obj {
            Object::Stream(s) => s.dict.get(b"PatternType").ok().and_then(|o| o.as_i64().ok()),
            Object::Dictionary(d) => d.get(b"PatternType").ok().and_then(|o| o.as_i64().ok()),
            _ => None,
        };
        match pattern_type {
            Some(1) => {
                let Object::Stream(stream) = obj else {
                    return Err(ContentError::Other(format!(
                        "tiling pattern /{pattern_name} is not a stream"
                    )));
                };
                let compiled = self.compile_tiling(id, stream)?;
                Ok(Some(compiled))
            }
            // Shading patterns have no content stream to compile; the
            // sink fetches the shading geometry by name.
            Some(2) => Ok(None),
            _ => Err(ContentError::Other(format!(
                "pattern /{pattern_name} has no valid PatternType"
            ))),
        }
    }

    fn compile_tiling(
        &self,
        id: Option<ObjectId>,
        stream: &Stream,
    ) -> Result<Arc<CompiledPattern>, ContentError> {
        let cache = self.cache.clone();
        let build = || {
            compile_pattern_stream(
                stream,
                self.resources,
                self.options,
                &cache,
                self.depth + 1,
            )
        };
        match id {
            Some(id) => self.cache.pattern_or_compile(id, build),
            None => Ok(Arc::new(build()?)),
        }
    }

    fn compile_form(
        &self,
        id: Option<ObjectId>,
        stream: &Stream,
    ) -> Result<Arc<CompiledForm>, ContentError> {
        let cache = self.cache.clone();
        let build = || {
            compile_form_stream(stream, self.resources, self.options, &cache, self.depth + 1)
        };
        match id {
            Some(id) => self.cache.form_or_compile(id, build),
            None => Ok(Arc::new(build()?)),
        }
    }

    fn compile_type3(
        &self,
        id: Option<ObjectId>,
        font: &lopdf::Dictionary,
    ) -> Result<Arc<CompiledType3Font>, ContentError> {
        let cache = self.cache.clone();
        let build = || {
            compile_type3_font(font, self.resources, self.options, &cache, self.depth + 1)
        };
        match id {
            Some(id) => self.cache.type3_font_or_compile(id, build),
            None => Ok(Arc::new(build()?)),
        }
    }

    /// A Type3 font selected through an ExtGState `Font` entry.
    fn ext_g_state_type3(
        &self,
        dict: &lopdf::Dictionary,
    ) -> Result<Option<Arc<CompiledType3Font>>, ContentError> {
        let Ok(font_entry) = dict.get(b"Font") else {
            return Ok(None);
        };
        let doc = self.resources.doc();
        let Object::Array(entry) = resolve_ref(doc, font_entry) else {
            return Ok(None);
        };
        let Some(font_obj) = entry.first() else {
            return Ok(None);
        };
        let id = match font_obj {
            Object::Reference(id) => Some(*id),
            _ => None,
        };
        let Object::Dictionary(font) = resolve_ref(doc, font_obj) else {
            return Ok(None);
        };
        if is_type3(font) {
            Ok(Some(self.compile_type3(id, font)?))
        } else {
            Ok(None)
        }
    }

    // --- Error recovery ---

    /// Resynchronize after a degradation: discard operands, and in path
    /// or text mode scan forward to the operator that closes the object.
    fn recover(&mut self) {
        self.stack.clear();
        match self.tracker.mode {
            GraphicsMode::Page => {}
            GraphicsMode::Text => {
                let found = self.scan_for(|k| k == "ET");
                self.emit(Command::EndText);
                self.tracker.mode = GraphicsMode::Page;
                if found.is_none() {
                    self.warn(CompileWarning::with_code(
                        CompileWarningCode::UnterminatedSection,
                        "text object never closed; ET supplied",
                    ));
                }
            }
            GraphicsMode::Path => {
                let found = self.scan_for(|k| {
                    matches!(k, "S" | "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" | "n")
                });
                let paint = match found.as_deref() {
                    Some("S") => Command::Stroke,
                    Some("s") => Command::CloseStroke,
                    Some("f") | Some("F") => Command::Fill,
                    Some("f*") => Command::FillEvenOdd,
                    Some("B") => Command::FillStroke,
                    Some("B*") => Command::FillStrokeEvenOdd,
                    Some("b") => Command::CloseFillStroke,
                    Some("b*") => Command::CloseFillStrokeEvenOdd,
                    _ => Command::EndPath,
                };
                if found.is_none() {
                    self.warn(CompileWarning::with_code(
                        CompileWarningCode::UnterminatedSection,
                        "path object never painted; n supplied",
                    ));
                }
                self.emit(paint);
                self.tracker.mode = GraphicsMode::Page;
            }
        }
    }

    /// Skip tokens until a keyword matches, consuming it. Lexer errors
    /// during the scan are ignored; each consumes at least one byte.
    fn scan_for(&mut self, target: impl Fn(&str) -> bool) -> Option<String> {
        loop {
            match self.lexer.next_token() {
                Ok(None) => return None,
                Ok(Some((_, Token::Keyword(k)))) if target(&k) => return Some(k),
                Ok(Some(_)) | Err(_) => {}
            }
        }
    }

    // --- End of stream ---

    fn finish(mut self) -> Result<CompiledContent, ContentError> {
        if !self.stack.is_empty() {
            let count = self.stack.len();
            self.warn(CompileWarning::with_code(
                CompileWarningCode::OperandMismatch,
                format!("{count} operands left at end of stream"),
            ));
        }

        match self.tracker.mode {
            GraphicsMode::Text => {
                self.emit(Command::EndText);
                self.warn(CompileWarning::with_code(
                    CompileWarningCode::UnterminatedSection,
                    "text object still open at end of stream; ET supplied",
                ));
            }
            GraphicsMode::Path => {
                self.emit(Command::EndPath);
                self.warn(CompileWarning::with_code(
                    CompileWarningCode::UnterminatedSection,
                    "path object still open at end of stream; n supplied",
                ));
            }
            GraphicsMode::Page => {}
        }

        while !self.marked.is_empty() {
            let tag = self.marked.last().map(|f| f.tag.clone()).unwrap_or_default();
            self.splice_marked();
            self.warn(CompileWarning::with_code(
                CompileWarningCode::UnterminatedSection,
                format!("marked content /{tag} still open at end of stream; EMC supplied"),
            ));
        }

        if self.compat_depth > 0 {
            for _ in 0..self.compat_depth {
                self.emit(Command::EndCompatibility);
            }
            self.warn(CompileWarning::with_code(
                CompileWarningCode::UnterminatedSection,
                format!(
                    "{} compatibility sections still open at end of stream",
                    self.compat_depth
                ),
            ));
        }

        let open_saves = self.tracker.save_depth();
        if open_saves > 0 {
            for _ in 0..open_saves {
                self.emit(Command::RestoreState);
            }
            self.warn(CompileWarning::with_code(
                CompileWarningCode::UnterminatedSection,
                format!("{open_saves} graphics states still saved at end of stream; Q supplied"),
            ));
        }

        Ok(CompiledContent {
            commands: self.commands,
            detected_precision: self.lexer.max_fraction_digits(),
            warnings: self.warnings,
        })
    }
}

fn is_type3(font: &lopdf::Dictionary) -> bool {
    matches!(font.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Type3")
}

fn image_ref(name: &str, stream: &Stream) -> Result<ImageRef, ContentError> {
    let dim = |key: &[u8]| {
        stream
            .dict
            .get(key)
            .ok()
            .and_then(|o| o.as_i64().ok())
            .filter(|v| (0..=i64::from(u32::MAX)).contains(v))
            .map(|v| v as u32)
            .ok_or_else(|| {
                ContentError::Other(format!(
                    "image XObject /{name} missing {}",
                    String::from_utf8_lossy(key)
                ))
            })
    };
    let width = dim(b"Width")?;
    let height = dim(b"Height")?;

    let color_space = match stream.dict.get(b"ColorSpace") {
        Ok(Object::Name(n)) => Some(String::from_utf8_lossy(n).into_owned()),
        Ok(Object::Array(arr)) => match arr.first() {
            Some(Object::Name(n)) => Some(String::from_utf8_lossy(n).into_owned()),
            _ => None,
        },
        _ => None,
    };
    let bits_per_component = stream
        .dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .map(|v| v as u32);
    // With a filter chain, the last entry is the image codec itself.
    let filter = match stream.dict.get(b"Filter") {
        Ok(Object::Name(n)) => Some(String::from_utf8_lossy(n).into_owned()),
        Ok(Object::Array(arr)) => match arr.last() {
            Some(Object::Name(n)) => Some(String::from_utf8_lossy(n).into_owned()),
            _ => None,
        },
        _ => None,
    };
    let image_mask = matches!(stream.dict.get(b"ImageMask"), Ok(Object::Boolean(true)));

    Ok(ImageRef {
        name: name.to_string(),
        width,
        height,
        color_space,
        bits_per_component,
        filter,
        image_mask,
    })
}

/// Compile one content stream at a given recursion depth.
pub(crate) fn compile_stream_data(
    data: &[u8],
    resources: Resources<'_>,
    options: &CompileOptions,
    cache: &CompileCache,
    depth: usize,
) -> Result<CompiledContent, ContentError> {
    if depth > options.max_recursion_depth {
        return Err(ContentError::RecursionLimit {
            depth,
            limit: options.max_recursion_depth,
        });
    }
    if data.len() > options.max_stream_bytes {
        return Err(ContentError::Other(format!(
            "content stream of {} bytes exceeds limit of {}",
            data.len(),
            options.max_stream_bytes
        )));
    }
    debug!(bytes = data.len(), depth, "compiling content stream");
    Compiler::new(data, resources, options, cache.clone(), depth).run()
}

fn stream_content(stream: &Stream) -> Vec<u8> {
    stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone())
}

fn sub_resources<'a>(
    dict: &'a lopdf::Dictionary,
    parent: Resources<'a>,
) -> Resources<'a> {
    let doc = parent.doc();
    match dict.get(b"Resources").ok().map(|o| resolve_ref(doc, o)) {
        Some(Object::Dictionary(own)) => Resources::new(doc, Some(own)),
        // Absent Resources inherit from the invoking context.
        _ => parent,
    }
}

pub(crate) fn compile_form_stream(
    stream: &Stream,
    parent: Resources<'_>,
    options: &CompileOptions,
    cache: &CompileCache,
    depth: usize,
) -> Result<CompiledForm, ContentError> {
    let doc = parent.doc();
    let data = stream_content(stream);
    let resources = sub_resources(&stream.dict, parent);
    let content = compile_stream_data(&data, resources, options, cache, depth)?;
    let bbox = stream.dict.get(b"BBox").ok().and_then(|o| rect_from(doc, o));
    let matrix = stream
        .dict
        .get(b"Matrix")
        .ok()
        .and_then(|o| matrix_from(doc, o))
        .unwrap_or_default();
    Ok(CompiledForm {
        content,
        bbox,
        matrix,
    })
}

pub(crate) fn compile_pattern_stream(
    stream: &Stream,
    parent: Resources<'_>,
    options: &CompileOptions,
    cache: &CompileCache,
    depth: usize,
) -> Result<CompiledPattern, ContentError> {
    let doc = parent.doc();
    let data = stream_content(stream);
    let resources = sub_resources(&stream.dict, parent);
    let content = compile_stream_data(&data, resources, options, cache, depth)?;

    let bbox = stream.dict.get(b"BBox").ok().and_then(|o| rect_from(doc, o));
    let matrix = stream
        .dict
        .get(b"Matrix")
        .ok()
        .and_then(|o| matrix_from(doc, o))
        .unwrap_or_default();
    let step = |key: &[u8], fallback: f64| {
        stream
            .dict
            .get(key)
            .ok()
            .and_then(|o| match resolve_ref(doc, o) {
                Object::Integer(i) => Some(*i as f64),
                Object::Real(r) => Some(f64::from(*r)),
                _ => None,
            })
            .unwrap_or(fallback)
    };
    let x_step = step(b"XStep", bbox.map_or(1.0, |b| b.width()));
    let y_step = step(b"YStep", bbox.map_or(1.0, |b| b.height()));
    let int_entry = |key: &[u8], fallback: i64| {
        stream
            .dict
            .get(key)
            .ok()
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(fallback)
    };
    Ok(CompiledPattern {
        content,
        bbox,
        matrix,
        x_step,
        y_step,
        paint_type: int_entry(b"PaintType", 1),
        tiling_type: int_entry(b"TilingType", 1),
    })
}

pub(crate) fn compile_type3_font(
    font: &lopdf::Dictionary,
    parent: Resources<'_>,
    options: &CompileOptions,
    cache: &CompileCache,
    depth: usize,
) -> Result<CompiledType3Font, ContentError> {
    if depth > options.max_recursion_depth {
        return Err(ContentError::RecursionLimit {
            depth,
            limit: options.max_recursion_depth,
        });
    }
    let doc = parent.doc();
    let resources = sub_resources(font, parent);
    let font_matrix = font
        .get(b"FontMatrix")
        .ok()
        .and_then(|o| matrix_from(doc, o))
        .unwrap_or(Matrix::new(0.001, 0.0, 0.0, 0.001, 0.0, 0.0));

    let mut glyphs = std::collections::HashMap::new();
    if let Ok(char_procs) = font.get(b"CharProcs") {
        if let Object::Dictionary(procs) = resolve_ref(doc, char_procs) {
            for (glyph_name, proc_obj) in procs.iter() {
                let Object::Stream(proc_stream) = resolve_ref(doc, proc_obj) else {
                    continue;
                };
                let data = stream_content(proc_stream);
                let content = compile_stream_data(&data, resources, options, cache, depth)?;
                glyphs.insert(
                    String::from_utf8_lossy(glyph_name).into_owned(),
                    Arc::new(content),
                );
            }
        }
    }
    debug!(glyphs = glyphs.len(), "compiled Type3 font");
    Ok(CompiledType3Font {
        glyphs,
        font_matrix,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Dictionary, Document};
    use pagescript_core::CmdType;

    fn compile(src: &[u8]) -> CompiledContent {
        let doc = Document::with_version("1.7");
        let resources = Resources::new(&doc, None);
        compile_stream_data(
            src,
            resources,
            &CompileOptions::default(),
            &CompileCache::new(),
            0,
        )
        .unwrap()
    }

    fn compile_with<'a>(
        doc: &'a Document,
        resources: &'a Dictionary,
        src: &[u8],
        options: &CompileOptions,
    ) -> Result<CompiledContent, ContentError> {
        compile_stream_data(
            src,
            Resources::new(doc, Some(resources)),
            options,
            &CompileCache::new(),
            0,
        )
    }

    fn codes(content: &CompiledContent) -> Vec<&str> {
        content.warnings.iter().map(|w| w.code.as_str()).collect()
    }

    // --- Basic dispatch ---

    #[test]
    fn simple_state_commands() {
        let content = compile(b"q 1 0 0 1 10 20 cm Q");
        assert_eq!(
            content.commands,
            vec![
                Command::SaveState,
                Command::ConcatMatrix(Matrix::new(1.0, 0.0, 0.0, 1.0, 10.0, 20.0)),
                Command::RestoreState,
            ]
        );
        assert!(content.warnings.is_empty());
    }

    #[test]
    fn path_and_paint() {
        let content = compile(b"0 0 10 10 re W n 5 5 m 7 7 l S");
        assert_eq!(
            content.commands,
            vec![
                Command::Rectangle {
                    x: 0.0,
                    y: 0.0,
                    width: 10.0,
                    height: 10.0
                },
                Command::Clip,
                Command::EndPath,
                Command::MoveTo { x: 5.0, y: 5.0 },
                Command::LineTo { x: 7.0, y: 7.0 },
                Command::Stroke,
            ]
        );
        assert!(content.warnings.is_empty());
    }

    #[test]
    fn text_object_with_quote_operators() {
        let content = compile(b"BT 14 TL 1 0 0 1 72 720 Tm (a) Tj (b) ' 1 2 (c) \" ET");
        assert_eq!(content.commands.len(), 7);
        assert_eq!(content.commands[0], Command::BeginText);
        assert_eq!(content.commands[3], Command::ShowText(b"a".to_vec()));
        assert_eq!(content.commands[4], Command::NextLineShowText(b"b".to_vec()));
        assert_eq!(
            content.commands[5],
            Command::NextLineShowTextSpaced {
                word_spacing: 1.0,
                char_spacing: 2.0,
                text: b"c".to_vec(),
            }
        );
        assert_eq!(content.commands[6], Command::EndText);
    }

    #[test]
    fn tj_array_mixes_text_and_adjustments() {
        let content = compile(b"BT [(ab) -120 (c)] TJ ET");
        assert_eq!(
            content.commands[1],
            Command::ShowTextAdjusted(vec![
                TextElement::Text(b"ab".to_vec()),
                TextElement::Adjust(-120.0),
                TextElement::Text(b"c".to_vec()),
            ])
        );
    }

    // --- Precision tracking ---

    #[test]
    fn detected_precision_is_high_water_mark() {
        let content = compile(b"BT 12.3456 0 Td (x) Tj ET 1.5 w");
        assert_eq!(content.detected_precision, 4);
    }

    #[test]
    fn integer_only_stream_has_zero_precision() {
        let content = compile(b"1 0 0 1 5 5 cm");
        assert_eq!(content.detected_precision, 0);
    }

    // --- Operand validation ---

    #[test]
    fn missing_operands_drop_the_operator() {
        let content = compile(b"1 0 cm 2 w");
        assert_eq!(content.commands, vec![Command::SetLineWidth(2.0)]);
        assert_eq!(codes(&content), vec!["OPERAND_MISMATCH"]);
    }

    #[test]
    fn excess_operands_warn_but_execute() {
        let content = compile(b"7 9 q Q");
        assert_eq!(
            content.commands,
            vec![Command::SaveState, Command::RestoreState]
        );
        assert_eq!(codes(&content), vec!["OPERAND_MISMATCH"]);
    }

    #[test]
    fn wrong_operand_type_drops_the_operator() {
        let content = compile(b"(str) w 2 w");
        assert_eq!(content.commands, vec![Command::SetLineWidth(2.0)]);
        assert_eq!(codes(&content), vec!["OPERAND_MISMATCH"]);
    }

    #[test]
    fn operands_left_at_eof_warn() {
        let content = compile(b"q Q 1 2");
        assert_eq!(codes(&content), vec!["OPERAND_MISMATCH"]);
    }

    // --- Mode legality ---

    #[test]
    fn show_text_outside_text_object_is_dropped() {
        let content = compile(b"(lost) Tj 1 w");
        assert_eq!(content.commands, vec![Command::SetLineWidth(1.0)]);
        assert_eq!(codes(&content), vec!["IGNORED_OPERATOR"]);
    }

    #[test]
    fn nested_bt_is_dropped() {
        let content = compile(b"BT BT (x) Tj ET");
        assert_eq!(
            content.commands,
            vec![
                Command::BeginText,
                Command::ShowText(b"x".to_vec()),
                Command::EndText,
            ]
        );
        assert_eq!(codes(&content), vec!["IGNORED_OPERATOR"]);
    }

    #[test]
    fn unknown_operator_clears_pending_operands() {
        let content = compile(b"1 2 zz 3 w");
        assert_eq!(content.commands, vec![Command::SetLineWidth(3.0)]);
        assert_eq!(codes(&content), vec!["IGNORED_OPERATOR"]);
    }

    // --- Balance ---

    #[test]
    fn bare_restore_is_dropped() {
        let content = compile(b"Q 1 w");
        assert_eq!(content.commands, vec![Command::SetLineWidth(1.0)]);
        assert_eq!(codes(&content), vec!["UNBALANCED_RESTORE"]);
    }

    #[test]
    fn open_save_is_closed_at_eof() {
        let content = compile(b"q q Q 1 w");
        assert_eq!(
            content.commands,
            vec![
                Command::SaveState,
                Command::SaveState,
                Command::RestoreState,
                Command::SetLineWidth(1.0),
                Command::RestoreState,
            ]
        );
        assert_eq!(codes(&content), vec!["UNTERMINATED_SECTION"]);
    }

    #[test]
    fn saves_and_restores_balance_in_output() {
        let content = compile(b"q q q Q Q Q Q q");
        let saves = content
            .commands
            .iter()
            .filter(|c| **c == Command::SaveState)
            .count();
        let restores = content
            .commands
            .iter()
            .filter(|c| **c == Command::RestoreState)
            .count();
        assert_eq!(saves, restores);
    }

    #[test]
    fn unterminated_text_object_closed_at_eof() {
        let content = compile(b"BT (x) Tj");
        assert_eq!(*content.commands.last().unwrap(), Command::EndText);
        assert!(codes(&content).contains(&"UNTERMINATED_SECTION"));
    }

    // --- Marked content ---

    #[test]
    fn marked_content_splices_children() {
        let content = compile(b"1 w /Fig BMC 2 w EMC 3 w");
        assert_eq!(
            content.commands,
            vec![
                Command::SetLineWidth(1.0),
                Command::MarkedContent {
                    tag: "Fig".to_string(),
                    props: None,
                    commands: vec![Command::SetLineWidth(2.0)],
                },
                Command::SetLineWidth(3.0),
            ]
        );
        assert!(content.warnings.is_empty());
    }

    #[test]
    fn marked_content_nests() {
        let content = compile(b"/A BMC /B BMC 1 w EMC EMC");
        let Command::MarkedContent { tag, commands, .. } = &content.commands[0] else {
            panic!("expected marked content");
        };
        assert_eq!(tag, "A");
        assert!(matches!(
            commands[0],
            Command::MarkedContent { ref tag, .. } if tag == "B"
        ));
    }

    #[test]
    fn bdc_with_inline_properties() {
        let content = compile(b"/Span << /ActualText (hi) >> BDC EMC");
        let Command::MarkedContent { props, .. } = &content.commands[0] else {
            panic!("expected marked content");
        };
        assert!(matches!(props, Some(MarkedContentProps::Inline(_))));
    }

    #[test]
    fn bare_emc_is_dropped() {
        let content = compile(b"EMC 1 w");
        assert_eq!(content.commands, vec![Command::SetLineWidth(1.0)]);
        assert_eq!(codes(&content), vec!["UNBALANCED_RESTORE"]);
    }

    #[test]
    fn unterminated_marked_content_closed_at_eof() {
        let content = compile(b"/Fig BMC 1 w");
        assert!(matches!(content.commands[0], Command::MarkedContent { .. }));
        assert!(codes(&content).contains(&"UNTERMINATED_SECTION"));
    }

    // --- Compatibility sections ---

    #[test]
    fn unknown_operator_in_compat_section_warns_only() {
        let options = CompileOptions {
            strict_mode: true,
            ..CompileOptions::default()
        };
        let doc = Document::with_version("1.7");
        let resources = Dictionary::new();
        let content =
            compile_with(&doc, &resources, b"BX 1 2 zzz EX 1 w", &options).unwrap();
        assert_eq!(
            content.commands,
            vec![
                Command::BeginCompatibility,
                Command::EndCompatibility,
                Command::SetLineWidth(1.0),
            ]
        );
        assert_eq!(codes(&content), vec!["IGNORED_OPERATOR"]);
    }

    #[test]
    fn unknown_operator_outside_compat_fails_strict() {
        let options = CompileOptions {
            strict_mode: true,
            ..CompileOptions::default()
        };
        let doc = Document::with_version("1.7");
        let resources = Dictionary::new();
        let err = compile_with(&doc, &resources, b"1 2 zzz", &options).unwrap_err();
        assert!(matches!(err, ContentError::IllegalToken { .. }));
    }

    #[test]
    fn bare_ex_clamps() {
        let content = compile(b"EX BX EX 1 w");
        assert_eq!(
            content.commands,
            vec![
                Command::BeginCompatibility,
                Command::EndCompatibility,
                Command::SetLineWidth(1.0),
            ]
        );
        assert_eq!(codes(&content), vec!["UNBALANCED_RESTORE"]);
    }

    // --- Color spaces and arity ---

    #[test]
    fn device_color_shortcuts() {
        let content = compile(b"0.5 g 1 0 0 RG 0 0 0 1 k");
        assert_eq!(
            content.commands,
            vec![
                Command::SetFillGray(0.5),
                Command::SetStrokeRgb(1.0, 0.0, 0.0),
                Command::SetFillCmyk(0.0, 0.0, 0.0, 1.0),
            ]
        );
    }

    #[test]
    fn sc_arity_follows_selected_space() {
        let content = compile(b"/DeviceRGB cs 1 0 0 sc");
        assert_eq!(
            content.commands,
            vec![
                Command::SetFillColorSpace {
                    name: "DeviceRGB".to_string(),
                    components: 3
                },
                Command::SetFillColor(vec![1.0, 0.0, 0.0]),
            ]
        );
        assert!(content.warnings.is_empty());
    }

    #[test]
    fn sc_with_wrong_count_is_dropped() {
        let content = compile(b"/DeviceRGB cs 1 0 sc 1 w");
        assert_eq!(content.commands.len(), 2);
        assert_eq!(*content.commands.last().unwrap(), Command::SetLineWidth(1.0));
        assert_eq!(codes(&content), vec!["OPERAND_MISMATCH"]);
    }

    #[test]
    fn color_space_binding_restored_by_q() {
        // Inside q/Q the fill space is RGB (3 components); after Q it is
        // back to DeviceGray (1 component).
        let content = compile(b"q /DeviceRGB cs 1 0 0 sc Q 0.5 sc");
        assert_eq!(
            *content.commands.last().unwrap(),
            Command::SetFillColor(vec![0.5])
        );
        assert!(content.warnings.is_empty());
    }

    #[test]
    fn scn_without_pattern_space_takes_numbers_only() {
        let content = compile(b"/DeviceCMYK cs 0 0 0 1 scn");
        assert_eq!(
            *content.commands.last().unwrap(),
            Command::SetFillColorExtended {
                components: vec![0.0, 0.0, 0.0, 1.0],
                pattern: None,
            }
        );
    }

    // --- Resources: fonts, XObjects, shadings, patterns ---

    fn doc_with_resources() -> (Document, Dictionary) {
        let mut doc = Document::with_version("1.7");

        let mut font = Dictionary::new();
        font.set("Type", Object::Name(b"Font".to_vec()));
        font.set("Subtype", Object::Name(b"Type1".to_vec()));
        font.set("BaseFont", Object::Name(b"Helvetica".to_vec()));
        let font_id = doc.add_object(Object::Dictionary(font));

        let mut image_dict = Dictionary::new();
        image_dict.set("Type", Object::Name(b"XObject".to_vec()));
        image_dict.set("Subtype", Object::Name(b"Image".to_vec()));
        image_dict.set("Width", Object::Integer(8));
        image_dict.set("Height", Object::Integer(4));
        image_dict.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
        image_dict.set("BitsPerComponent", Object::Integer(8));
        image_dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
        let image_id = doc.add_object(Object::Stream(Stream::new(image_dict, vec![0u8; 4])));

        let mut form_dict = Dictionary::new();
        form_dict.set("Type", Object::Name(b"XObject".to_vec()));
        form_dict.set("Subtype", Object::Name(b"Form".to_vec()));
        form_dict.set(
            "BBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(100),
                Object::Integer(50),
            ]),
        );
        let form_id = doc.add_object(Object::Stream(Stream::new(
            form_dict,
            b"0 0 100 50 re f".to_vec(),
        )));

        let mut pattern_dict = Dictionary::new();
        pattern_dict.set("PatternType", Object::Integer(1));
        pattern_dict.set("PaintType", Object::Integer(1));
        pattern_dict.set(
            "BBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(4),
                Object::Integer(4),
            ]),
        );
        let pattern_id = doc.add_object(Object::Stream(Stream::new(
            pattern_dict,
            b"0 0 2 2 re f".to_vec(),
        )));

        let mut shading = Dictionary::new();
        shading.set("ShadingType", Object::Integer(2));
        let shading_id = doc.add_object(Object::Dictionary(shading));

        let mut fonts = Dictionary::new();
        fonts.set("F1", Object::Reference(font_id));
        let mut xobjects = Dictionary::new();
        xobjects.set("Im0", Object::Reference(image_id));
        xobjects.set("Fm0", Object::Reference(form_id));
        let mut patterns = Dictionary::new();
        patterns.set("P0", Object::Reference(pattern_id));
        let mut shadings = Dictionary::new();
        shadings.set("Sh0", Object::Reference(shading_id));

        let mut resources = Dictionary::new();
        resources.set("Font", Object::Dictionary(fonts));
        resources.set("XObject", Object::Dictionary(xobjects));
        resources.set("Pattern", Object::Dictionary(patterns));
        resources.set("Shading", Object::Dictionary(shadings));
        (doc, resources)
    }

    #[test]
    fn select_font_resolves_resource() {
        let (doc, resources) = doc_with_resources();
        let content = compile_with(
            &doc,
            &resources,
            b"BT /F1 12 Tf (x) Tj ET",
            &CompileOptions::default(),
        )
        .unwrap();
        assert_eq!(
            content.commands[1],
            Command::SelectFont {
                name: "F1".to_string(),
                size: 12.0,
                type3_font: None,
            }
        );
    }

    #[test]
    fn missing_font_is_fatal() {
        let (doc, resources) = doc_with_resources();
        let err = compile_with(
            &doc,
            &resources,
            b"BT /F9 12 Tf ET",
            &CompileOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ContentError::MissingResource { .. }));
    }

    #[test]
    fn draw_image_flattens_metadata() {
        let (doc, resources) = doc_with_resources();
        let content =
            compile_with(&doc, &resources, b"/Im0 Do", &CompileOptions::default()).unwrap();
        assert_eq!(
            content.commands,
            vec![Command::DrawImage(ImageRef {
                name: "Im0".to_string(),
                width: 8,
                height: 4,
                color_space: Some("DeviceRGB".to_string()),
                bits_per_component: Some(8),
                filter: Some("DCTDecode".to_string()),
                image_mask: false,
            })]
        );
    }

    #[test]
    fn draw_form_compiles_body() {
        let (doc, resources) = doc_with_resources();
        let content =
            compile_with(&doc, &resources, b"/Fm0 Do", &CompileOptions::default()).unwrap();
        let Command::DrawForm { name, form } = &content.commands[0] else {
            panic!("expected DrawForm");
        };
        assert_eq!(name, "Fm0");
        assert_eq!(form.content.commands.len(), 2);
        assert_eq!(form.bbox.unwrap().width(), 100.0);
        assert_eq!(form.content.commands[0].cmd_type(), CmdType::Path);
    }

    #[test]
    fn repeated_form_draws_share_one_artifact() {
        let (doc, resources) = doc_with_resources();
        let content = compile_with(
            &doc,
            &resources,
            b"/Fm0 Do /Fm0 Do",
            &CompileOptions::default(),
        )
        .unwrap();
        let forms: Vec<_> = content
            .commands
            .iter()
            .filter_map(|c| match c {
                Command::DrawForm { form, .. } => Some(form),
                _ => None,
            })
            .collect();
        assert_eq!(forms.len(), 2);
        assert!(Arc::ptr_eq(forms[0], forms[1]));
    }

    #[test]
    fn scn_with_tiling_pattern_compiles_it_once() {
        let (doc, resources) = doc_with_resources();
        let content = compile_with(
            &doc,
            &resources,
            b"/Pattern cs /P0 scn /P0 scn",
            &CompileOptions::default(),
        )
        .unwrap();
        let patterns: Vec<_> = content
            .commands
            .iter()
            .filter_map(|c| match c {
                Command::SetFillColorExtended {
                    pattern: Some(p), ..
                } => p.pattern.as_ref(),
                _ => None,
            })
            .collect();
        assert_eq!(patterns.len(), 2);
        assert!(Arc::ptr_eq(patterns[0], patterns[1]));
        assert_eq!(patterns[0].x_step, 4.0);
    }

    #[test]
    fn paint_shading_validates_resource() {
        let (doc, resources) = doc_with_resources();
        let content =
            compile_with(&doc, &resources, b"/Sh0 sh", &CompileOptions::default()).unwrap();
        assert_eq!(
            content.commands,
            vec![Command::PaintShading("Sh0".to_string())]
        );
        assert!(
            compile_with(&doc, &resources, b"/Sh9 sh", &CompileOptions::default()).is_err()
        );
    }

    #[test]
    fn self_referential_form_stops_at_recursion_limit() {
        let mut doc = Document::with_version("1.7");
        let form_id = doc.new_object_id();

        let mut xobjects = Dictionary::new();
        xobjects.set("Fm0", Object::Reference(form_id));
        let mut own_resources = Dictionary::new();
        own_resources.set("XObject", Object::Dictionary(xobjects.clone()));

        let mut form_dict = Dictionary::new();
        form_dict.set("Subtype", Object::Name(b"Form".to_vec()));
        form_dict.set("Resources", Object::Dictionary(own_resources));
        doc.objects.insert(
            form_id,
            Object::Stream(Stream::new(form_dict, b"/Fm0 Do".to_vec())),
        );

        let mut resources = Dictionary::new();
        resources.set("XObject", Object::Dictionary(xobjects));

        let options = CompileOptions {
            max_recursion_depth: 4,
            ..CompileOptions::default()
        };
        let content = compile_with(&doc, &resources, b"/Fm0 Do 1 w", &options).unwrap();
        // The draw is dropped with a warning instead of hanging.
        assert_eq!(*content.commands.last().unwrap(), Command::SetLineWidth(1.0));
        assert!(codes(&content).contains(&"IGNORED_OPERATOR"));
    }

    #[test]
    fn type3_font_glyphs_are_compiled() {
        let mut doc = Document::with_version("1.7");
        let glyph_id = doc.add_object(Object::Stream(Stream::new(
            Dictionary::new(),
            b"500 0 d0 0 0 m 10 10 l S".to_vec(),
        )));
        let mut char_procs = Dictionary::new();
        char_procs.set("a", Object::Reference(glyph_id));
        let mut font = Dictionary::new();
        font.set("Subtype", Object::Name(b"Type3".to_vec()));
        font.set("CharProcs", Object::Dictionary(char_procs));
        font.set(
            "FontMatrix",
            Object::Array(vec![
                Object::Real(0.01),
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(0.01),
                Object::Integer(0),
                Object::Integer(0),
            ]),
        );
        let font_id = doc.add_object(Object::Dictionary(font));
        let mut fonts = Dictionary::new();
        fonts.set("T3", Object::Reference(font_id));
        let mut resources = Dictionary::new();
        resources.set("Font", Object::Dictionary(fonts));

        let content = compile_with(
            &doc,
            &resources,
            b"BT /T3 10 Tf (a) Tj ET",
            &CompileOptions::default(),
        )
        .unwrap();
        let Command::SelectFont { type3_font, .. } = &content.commands[1] else {
            panic!("expected SelectFont");
        };
        let font = type3_font.as_ref().expect("Type3 font compiled");
        assert!((font.font_matrix.a - 0.01).abs() < 1e-6);
        let glyph = font.glyph("a").expect("glyph a");
        assert_eq!(
            glyph.commands[0],
            Command::SetGlyphWidth { wx: 500.0, wy: 0.0 }
        );
    }

    // --- Inline images through the dispatcher ---

    #[test]
    fn inline_image_becomes_a_command() {
        let content = compile(b"q BI /W 2 /H 2 /BPC 8 /CS /G ID \x00\xff\xff\x00 EI Q");
        assert_eq!(content.commands.len(), 3);
        let Command::DrawInlineImage(image) = &content.commands[1] else {
            panic!("expected inline image");
        };
        assert_eq!(image.data, vec![0x00, 0xFF, 0xFF, 0x00]);
        assert!(content.warnings.is_empty());
    }

    #[test]
    fn broken_inline_image_degrades_to_warning() {
        // No EI candidate decodes; the reader consumes to end of stream
        // and the compile survives with a resync warning.
        let content = compile(b"BI /W 2 /H 2 /BPC 8 /CS /G /F /AHx ID zz EI");
        assert!(content.commands.is_empty());
        assert!(codes(&content).contains(&"RESYNC_PERFORMED"));
    }

    #[test]
    fn broken_inline_image_resumes_after_recovered_terminator() {
        // The unfiltered reader seeks past the next plausible EI when
        // the expected byte count is not followed by one, so compilation
        // resumes at real operators.
        let content = compile(b"BI /W 1 /H 1 /BPC 8 /CS /G ID \x00 garbage EI 1 w");
        assert_eq!(content.commands, vec![Command::SetLineWidth(1.0)]);
        assert!(codes(&content).contains(&"RESYNC_PERFORMED"));
    }

    // --- Resynchronization ---

    #[test]
    fn text_mode_error_resyncs_to_et() {
        let content = compile(b"BT (hi) Tj ) 12 garbage ET 1 w");
        assert_eq!(
            content.commands,
            vec![
                Command::BeginText,
                Command::ShowText(b"hi".to_vec()),
                Command::EndText,
                Command::SetLineWidth(1.0),
            ]
        );
        assert!(codes(&content).contains(&"RESYNC_PERFORMED"));
    }

    #[test]
    fn path_mode_error_resyncs_to_paint() {
        let content = compile(b"0 0 5 5 re ) junk S 1 w");
        assert_eq!(
            content.commands,
            vec![
                Command::Rectangle {
                    x: 0.0,
                    y: 0.0,
                    width: 5.0,
                    height: 5.0
                },
                Command::Stroke,
                Command::SetLineWidth(1.0),
            ]
        );
        assert!(codes(&content).contains(&"RESYNC_PERFORMED"));
    }

    #[test]
    fn page_mode_error_drops_operands_and_continues() {
        let content = compile(b"1 2 ) 3 w");
        assert_eq!(content.commands, vec![Command::SetLineWidth(3.0)]);
    }

    #[test]
    fn strict_mode_escalates_syntax_errors() {
        let doc = Document::with_version("1.7");
        let resources = Dictionary::new();
        let options = CompileOptions {
            strict_mode: true,
            ..CompileOptions::default()
        };
        assert!(compile_with(&doc, &resources, b"BT (hi) Tj ) ET", &options).is_err());
    }

    // --- Limits ---

    #[test]
    fn oversized_stream_is_rejected() {
        let doc = Document::with_version("1.7");
        let resources = Dictionary::new();
        let options = CompileOptions {
            max_stream_bytes: 4,
            ..CompileOptions::default()
        };
        assert!(compile_with(&doc, &resources, b"1 0 0 1 0 0 cm", &options).is_err());
    }
}
