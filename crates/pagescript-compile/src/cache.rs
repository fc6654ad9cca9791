//! Shared cache for recursively compiled artifacts.
//!
//! Forms, tiling patterns, and Type3 fonts are compiled once per
//! document object and shared by `Arc` afterwards, so a form drawn from
//! fifty pages costs one compile and every `DrawForm` command holds the
//! same allocation.
//!
//! The lock is never held across a compile: a looked-up miss releases
//! the mutex, compiles, and re-locks to insert. Two threads may race to
//! compile the same object; the first insert wins and the loser's
//! result is dropped, which keeps the artifact-identity guarantee
//! without serializing independent compiles.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use lopdf::ObjectId;
use pagescript_core::{CompiledForm, CompiledPattern, CompiledType3Font, ContentError};

#[derive(Default)]
struct CacheInner {
    forms: HashMap<ObjectId, Arc<CompiledForm>>,
    patterns: HashMap<ObjectId, Arc<CompiledPattern>>,
    type3_fonts: HashMap<ObjectId, Arc<CompiledType3Font>>,
}

/// Cache shared by every sub-compile of one document.
///
/// Cloning is cheap and clones see the same entries.
#[derive(Clone, Default)]
pub struct CompileCache {
    inner: Arc<Mutex<CacheInner>>,
}

macro_rules! cached {
    ($get:ident, $insert:ident, $field:ident, $artifact:ty) => {
        pub(crate) fn $get(&self, id: ObjectId) -> Option<Arc<$artifact>> {
            self.inner.lock().expect("cache poisoned").$field.get(&id).cloned()
        }

        /// Insert unless another thread got there first; either way the
        /// returned artifact is the one every caller will see.
        pub(crate) fn $insert(&self, id: ObjectId, artifact: Arc<$artifact>) -> Arc<$artifact> {
            let mut inner = self.inner.lock().expect("cache poisoned");
            Arc::clone(inner.$field.entry(id).or_insert(artifact))
        }
    };
}

impl CompileCache {
    pub fn new() -> Self {
        Self::default()
    }

    cached!(get_form, insert_form, forms, CompiledForm);
    cached!(get_pattern, insert_pattern, patterns, CompiledPattern);
    cached!(get_type3_font, insert_type3_font, type3_fonts, CompiledType3Font);

    /// Number of cached artifacts across all kinds.
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().expect("cache poisoned");
        inner.forms.len() + inner.patterns.len() + inner.type3_fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get-or-compile for forms, releasing the lock while `compile` runs.
    pub(crate) fn form_or_compile<F>(
        &self,
        id: ObjectId,
        compile: F,
    ) -> Result<Arc<CompiledForm>, ContentError>
    where
        F: FnOnce() -> Result<CompiledForm, ContentError>,
    {
        if let Some(hit) = self.get_form(id) {
            return Ok(hit);
        }
        let compiled = Arc::new(compile()?);
        Ok(self.insert_form(id, compiled))
    }

    pub(crate) fn pattern_or_compile<F>(
        &self,
        id: ObjectId,
        compile: F,
    ) -> Result<Arc<CompiledPattern>, ContentError>
    where
        F: FnOnce() -> Result<CompiledPattern, ContentError>,
    {
        if let Some(hit) = self.get_pattern(id) {
            return Ok(hit);
        }
        let compiled = Arc::new(compile()?);
        Ok(self.insert_pattern(id, compiled))
    }

    pub(crate) fn type3_font_or_compile<F>(
        &self,
        id: ObjectId,
        compile: F,
    ) -> Result<Arc<CompiledType3Font>, ContentError>
    where
        F: FnOnce() -> Result<CompiledType3Font, ContentError>,
    {
        if let Some(hit) = self.get_type3_font(id) {
            return Ok(hit);
        }
        let compiled = Arc::new(compile()?);
        Ok(self.insert_type3_font(id, compiled))
    }
}
