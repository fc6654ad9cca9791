//! Document-level entry points: compiling pages, forms, patterns,
//! Type3 fonts, and annotation appearance streams out of a
//! [`lopdf::Document`].
//!
//! Page attributes (MediaBox, CropBox, Rotate, Resources) are resolved
//! up the page tree here, so the artifacts carry denormalized geometry
//! and the caller never touches inheritance.

use std::collections::HashMap;
use std::sync::Arc;

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use pagescript_core::{
    AppearanceVariant, CompileOptions, CompiledAnnotation, CompiledContent, CompiledForm,
    CompiledPage, CompiledPattern, CompiledType3Font, ContentError, Rect,
};
use tracing::debug;

use crate::cache::CompileCache;
use crate::compiler::{
    compile_form_stream, compile_pattern_stream, compile_stream_data, compile_type3_font as
    compile_type3_font_dict,
};
use crate::error::CompileError;
use crate::resources::{Resources, rect_from, resolve_ref};

/// Compile raw content stream bytes against a resource dictionary.
///
/// The lowest-level entry point; [`compile_page`] and friends build on
/// the same machinery with document plumbing added.
pub fn compile_stream(
    doc: &Document,
    resources: Option<&Dictionary>,
    data: &[u8],
    options: &CompileOptions,
    cache: &CompileCache,
) -> Result<CompiledContent, CompileError> {
    check_size(data.len(), options)?;
    let resources = Resources::new(doc, resources);
    Ok(compile_stream_data(data, resources, options, cache, 0)?)
}

/// Compile one page by object id.
///
/// Resolves inherited attributes, concatenates a multi-part Contents
/// array, and compiles the result.
pub fn compile_page(
    doc: &Document,
    page_id: ObjectId,
    options: &CompileOptions,
    cache: &CompileCache,
) -> Result<CompiledPage, CompileError> {
    let page = doc.get_object(page_id)?.as_dict()?;

    let media_box = inherited(doc, page, b"MediaBox")
        .and_then(|obj| rect_from(doc, obj))
        // US Letter, the conventional fallback for pages without one.
        .unwrap_or(Rect::new(0.0, 0.0, 612.0, 792.0));
    let crop_box = inherited(doc, page, b"CropBox").and_then(|obj| rect_from(doc, obj));
    let rotation = inherited(doc, page, b"Rotate")
        .and_then(|obj| obj.as_i64().ok())
        .unwrap_or(0);
    let resources_dict = inherited(doc, page, b"Resources").and_then(|obj| obj.as_dict().ok());

    let data = page_contents(doc, page, options)?;
    debug!(
        page = ?page_id,
        bytes = data.len(),
        "compiling page content"
    );
    let resources = Resources::new(doc, resources_dict);
    let content = compile_stream_data(&data, resources, options, cache, 0)?;

    Ok(CompiledPage {
        content,
        media_box,
        crop_box,
        rotation,
    })
}

/// Compile a form XObject by object id, through the cache.
pub fn compile_form(
    doc: &Document,
    form_id: ObjectId,
    parent_resources: Option<&Dictionary>,
    options: &CompileOptions,
    cache: &CompileCache,
) -> Result<Arc<CompiledForm>, CompileError> {
    let stream = as_stream(doc, form_id, "form XObject")?;
    let parent = Resources::new(doc, parent_resources);
    let compiled = cache.form_or_compile(form_id, || {
        compile_form_stream(stream, parent, options, cache, 1)
    })?;
    Ok(compiled)
}

/// Compile a tiling pattern by object id, through the cache.
///
/// Shading patterns carry no content stream and are rejected as
/// malformed here; the compiler's `scn` path represents them by name.
pub fn compile_pattern(
    doc: &Document,
    pattern_id: ObjectId,
    options: &CompileOptions,
    cache: &CompileCache,
) -> Result<Arc<CompiledPattern>, CompileError> {
    let stream = as_stream(doc, pattern_id, "tiling pattern")?;
    let pattern_type = stream
        .dict
        .get(b"PatternType")
        .ok()
        .and_then(|o| o.as_i64().ok());
    if pattern_type != Some(1) {
        return Err(CompileError::Malformed {
            kind: "tiling pattern",
            detail: format!("PatternType is {pattern_type:?}, expected 1"),
        });
    }
    let parent = Resources::new(doc, None);
    let compiled = cache.pattern_or_compile(pattern_id, || {
        compile_pattern_stream(stream, parent, options, cache, 1)
    })?;
    Ok(compiled)
}

/// Compile a Type3 font by object id, every CharProc up front, through
/// the cache.
pub fn compile_type3_font(
    doc: &Document,
    font_id: ObjectId,
    options: &CompileOptions,
    cache: &CompileCache,
) -> Result<Arc<CompiledType3Font>, CompileError> {
    let font = doc.get_object(font_id)?.as_dict()?;
    let parent = Resources::new(doc, None);
    let compiled = cache.type3_font_or_compile(font_id, || {
        compile_type3_font_dict(font, parent, options, cache, 1)
    })?;
    Ok(compiled)
}

/// Compile an annotation's appearance streams.
///
/// Each of the N (normal), R (rollover), and D (down) entries is either
/// a single form or a sub-dictionary mapping appearance state names to
/// forms; absent entries stay `None`.
pub fn compile_annotation(
    doc: &Document,
    annotation_id: ObjectId,
    options: &CompileOptions,
    cache: &CompileCache,
) -> Result<CompiledAnnotation, CompileError> {
    let annotation = doc.get_object(annotation_id)?.as_dict()?;
    let rect = annotation
        .get(b"Rect")
        .ok()
        .and_then(|obj| rect_from(doc, obj))
        .ok_or_else(|| CompileError::Malformed {
            kind: "annotation",
            detail: "missing or malformed Rect".to_string(),
        })?;

    let appearances = annotation
        .get(b"AP")
        .ok()
        .map(|obj| resolve_ref(doc, obj));
    let (normal, rollover, down) = match appearances {
        Some(Object::Dictionary(ap)) => (
            appearance_variant(doc, ap, b"N", options, cache)?,
            appearance_variant(doc, ap, b"R", options, cache)?,
            appearance_variant(doc, ap, b"D", options, cache)?,
        ),
        _ => (None, None, None),
    };

    Ok(CompiledAnnotation {
        rect,
        normal,
        rollover,
        down,
    })
}

fn appearance_variant(
    doc: &Document,
    ap: &Dictionary,
    key: &[u8],
    options: &CompileOptions,
    cache: &CompileCache,
) -> Result<Option<AppearanceVariant>, CompileError> {
    let Ok(entry) = ap.get(key) else {
        return Ok(None);
    };
    let id = reference_id(entry);
    match resolve_ref(doc, entry) {
        Object::Stream(stream) => {
            let form = cached_form(doc, id, stream, options, cache)?;
            Ok(Some(AppearanceVariant::Single(form)))
        }
        Object::Dictionary(states) => {
            let mut map = HashMap::new();
            for (state, value) in states.iter() {
                let value_id = reference_id(value);
                let Object::Stream(stream) = resolve_ref(doc, value) else {
                    continue;
                };
                let form = cached_form(doc, value_id, stream, options, cache)?;
                map.insert(String::from_utf8_lossy(state).into_owned(), form);
            }
            Ok(Some(AppearanceVariant::Named(map)))
        }
        _ => Ok(None),
    }
}

fn cached_form(
    doc: &Document,
    id: Option<ObjectId>,
    stream: &Stream,
    options: &CompileOptions,
    cache: &CompileCache,
) -> Result<Arc<CompiledForm>, ContentError> {
    let parent = Resources::new(doc, None);
    let build = || compile_form_stream(stream, parent, options, cache, 1);
    match id {
        Some(id) => cache.form_or_compile(id, build),
        None => Ok(Arc::new(build()?)),
    }
}

fn reference_id(obj: &Object) -> Option<ObjectId> {
    match obj {
        Object::Reference(id) => Some(*id),
        _ => None,
    }
}

fn as_stream<'a>(
    doc: &'a Document,
    id: ObjectId,
    kind: &'static str,
) -> Result<&'a Stream, CompileError> {
    match doc.get_object(id)? {
        Object::Stream(stream) => Ok(stream),
        _ => Err(CompileError::Malformed {
            kind,
            detail: "expected a stream".to_string(),
        }),
    }
}

fn check_size(actual: usize, options: &CompileOptions) -> Result<(), CompileError> {
    if actual > options.max_stream_bytes {
        return Err(CompileError::StreamTooLarge {
            actual,
            limit: options.max_stream_bytes,
        });
    }
    Ok(())
}

/// Walk `Parent` links until `key` is found. The hop limit breaks
/// cyclic page trees.
fn inherited<'a>(doc: &'a Document, page: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    let mut node = page;
    for _ in 0..64 {
        if let Ok(obj) = node.get(key) {
            return Some(resolve_ref(doc, obj));
        }
        match node.get(b"Parent").ok().map(|o| resolve_ref(doc, o)) {
            Some(Object::Dictionary(parent)) => node = parent,
            _ => return None,
        }
    }
    None
}

/// Concatenate the page's Contents streams, decompressed, joined with a
/// newline so tokens never merge across part boundaries.
fn page_contents(
    doc: &Document,
    page: &Dictionary,
    options: &CompileOptions,
) -> Result<Vec<u8>, CompileError> {
    let Ok(contents) = page.get(b"Contents") else {
        return Ok(Vec::new());
    };
    let parts: Vec<&Object> = match resolve_ref(doc, contents) {
        Object::Array(parts) => parts.iter().collect(),
        single => vec![single],
    };

    let mut data = Vec::new();
    for part in parts {
        let Object::Stream(stream) = resolve_ref(doc, part) else {
            return Err(CompileError::Malformed {
                kind: "page",
                detail: "Contents entry is not a stream".to_string(),
            });
        };
        let bytes = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        if !data.is_empty() {
            data.push(b'\n');
        }
        data.extend_from_slice(&bytes);
        check_size(data.len(), options)?;
    }
    Ok(data)
}
