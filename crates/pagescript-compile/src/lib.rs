//! Compiles PDF content streams into replayable command lists.
//!
//! The input is raw content stream bytes (or a page, form, pattern,
//! Type3 font, or annotation inside a [`lopdf::Document`]); the output
//! is a [`pagescript_core::CompiledContent`]: a validated, balanced
//! command list that can be replayed against any
//! [`pagescript_core::ContentSink`] without further error handling.
//!
//! Compilation is best-effort. Malformed operators become warnings and
//! the stream is resynchronized at the next object boundary; strict
//! mode turns those degradations into errors. Nested form XObjects,
//! tiling patterns, and Type3 fonts are compiled recursively through a
//! shared [`CompileCache`], so each document object is compiled once no
//! matter how many times it is drawn.
//!
//! ```no_run
//! use lopdf::Document;
//! use pagescript_compile::{CompileCache, CompileOptions, compile_page};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let doc = Document::load("report.pdf")?;
//! let cache = CompileCache::new();
//! let options = CompileOptions::default();
//! for (_, page_id) in doc.get_pages() {
//!     let page = compile_page(&doc, page_id, &options, &cache)?;
//!     println!(
//!         "{} commands, {} warnings",
//!         page.content.commands.len(),
//!         page.content.warnings.len()
//!     );
//! }
//! # Ok(())
//! # }
//! ```

mod cache;
mod color_space;
mod compiler;
mod error;
mod filters;
mod inline_image;
mod lexer;
mod objects;
mod page;
mod resources;
mod state;

pub use cache::CompileCache;
pub use color_space::ColorSpaceBinding;
pub use error::CompileError;
pub use page::{
    compile_annotation, compile_form, compile_page, compile_pattern, compile_stream,
    compile_type3_font,
};
pub use resources::Resources;

// Core types callers need alongside the entry points.
pub use pagescript_core::{
    CompileOptions, CompileWarning, CompileWarningCode, CompiledAnnotation, CompiledContent,
    CompiledForm, CompiledPage, CompiledPattern, CompiledType3Font, Command, ContentError,
    ContentSink,
};
