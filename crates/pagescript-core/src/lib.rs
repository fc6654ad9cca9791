//! Core data model for pagescript-rs.
//!
//! This crate defines the vocabulary the compiler produces and consumers
//! read: [`Command`] lists and the artifacts that own them
//! ([`CompiledContent`], [`CompiledPage`], [`CompiledForm`],
//! [`CompiledPattern`], [`CompiledType3Font`], [`CompiledAnnotation`]),
//! the [`ContentSink`] replay trait, operand and geometry primitives, and
//! the error/warning/option types shared across the workspace.
//!
//! It has no document-format dependencies; the companion
//! `pagescript-compile` crate does the actual compiling.

pub mod artifact;
pub mod command;
pub mod error;
pub mod geometry;
pub mod image;
pub mod operand;
pub mod sink;

pub use artifact::{
    AppearanceVariant, CompiledAnnotation, CompiledContent, CompiledForm, CompiledPage,
    CompiledPattern, CompiledType3Font,
};
pub use command::{CmdType, Command, MarkedContentProps, PatternPaint, TextElement};
pub use error::{CompileOptions, CompileWarning, CompileWarningCode, ContentError};
pub use geometry::{Matrix, Rect};
pub use image::{ImageRef, InlineImage};
pub use operand::{Operand, dict_get};
pub use sink::{ContentSink, NullSink};
