//! Named resource lookup against a page or form Resources dictionary.
//!
//! Every category accessor fails with [`ContentError::MissingResource`]
//! when the name does not resolve; the compiler treats those failures as
//! fatal rather than warnings, because a command list with dangling
//! references would misrender silently.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use pagescript_core::{ContentError, Matrix, Operand, Rect};

/// Follow reference chains to the underlying object.
///
/// Chains deeper than a handful of hops only occur in hostile files;
/// they resolve to the last reachable object.
pub fn resolve_ref<'a>(doc: &'a Document, mut obj: &'a Object) -> &'a Object {
    for _ in 0..8 {
        match obj {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(next) => obj = next,
                Err(_) => return obj,
            },
            _ => return obj,
        }
    }
    obj
}

/// A view over one Resources dictionary.
#[derive(Clone, Copy)]
pub struct Resources<'a> {
    doc: &'a Document,
    dict: Option<&'a Dictionary>,
}

impl<'a> Resources<'a> {
    pub fn new(doc: &'a Document, dict: Option<&'a Dictionary>) -> Self {
        Self { doc, dict }
    }

    pub fn doc(&self) -> &'a Document {
        self.doc
    }

    pub fn dict(&self) -> Option<&'a Dictionary> {
        self.dict
    }

    /// Look up `name` in the sub-dictionary for `category`, returning the
    /// resolved object and the id of the reference it sat behind (if any).
    fn lookup(
        &self,
        category: &[u8],
        kind: &'static str,
        name: &str,
    ) -> Result<(Option<ObjectId>, &'a Object), ContentError> {
        let missing = || ContentError::MissingResource {
            kind,
            name: name.to_string(),
        };
        let dict = self.dict.ok_or_else(missing)?;
        let category_obj = dict.get(category).map_err(|_| missing())?;
        let category_dict = match resolve_ref(self.doc, category_obj) {
            Object::Dictionary(d) => d,
            _ => return Err(missing()),
        };
        let entry = category_dict.get(name.as_bytes()).map_err(|_| missing())?;
        let id = match entry {
            Object::Reference(id) => Some(*id),
            _ => None,
        };
        Ok((id, resolve_ref(self.doc, entry)))
    }

    /// An ExtGState dictionary (`gs`).
    pub fn ext_g_state(&self, name: &str) -> Result<&'a Dictionary, ContentError> {
        let (_, obj) = self.lookup(b"ExtGState", "ExtGState", name)?;
        obj.as_dict().map_err(|_| ContentError::WrongType {
            expected: "ExtGState dictionary",
            found: "other object",
        })
    }

    /// A font dictionary (`Tf`), with its object id for cache keying.
    pub fn font(&self, name: &str) -> Result<(Option<ObjectId>, &'a Dictionary), ContentError> {
        let (id, obj) = self.lookup(b"Font", "Font", name)?;
        let dict = obj.as_dict().map_err(|_| ContentError::WrongType {
            expected: "font dictionary",
            found: "other object",
        })?;
        Ok((id, dict))
    }

    /// An XObject stream (`Do`), with its object id for cache keying.
    pub fn xobject(&self, name: &str) -> Result<(Option<ObjectId>, &'a Stream), ContentError> {
        let (id, obj) = self.lookup(b"XObject", "XObject", name)?;
        match obj {
            Object::Stream(stream) => Ok((id, stream)),
            _ => Err(ContentError::WrongType {
                expected: "XObject stream",
                found: "other object",
            }),
        }
    }

    /// A pattern object (`scn` with a Pattern space), with its object id.
    pub fn pattern(&self, name: &str) -> Result<(Option<ObjectId>, &'a Object), ContentError> {
        self.lookup(b"Pattern", "Pattern", name)
    }

    /// A color space object (`CS`/`cs` with a non-device name).
    pub fn color_space(&self, name: &str) -> Result<&'a Object, ContentError> {
        let (_, obj) = self.lookup(b"ColorSpace", "ColorSpace", name)?;
        Ok(obj)
    }

    /// A shading object (`sh`). Only existence is validated.
    pub fn shading(&self, name: &str) -> Result<&'a Object, ContentError> {
        let (_, obj) = self.lookup(b"Shading", "Shading", name)?;
        Ok(obj)
    }

    /// A property list (`BDC`/`DP` with a name operand).
    pub fn properties(&self, name: &str) -> Result<&'a Dictionary, ContentError> {
        let (_, obj) = self.lookup(b"Properties", "Properties", name)?;
        obj.as_dict().map_err(|_| ContentError::WrongType {
            expected: "property list dictionary",
            found: "other object",
        })
    }
}

/// Numeric array helper: `[n n n n]` entries resolved to f64.
pub(crate) fn numbers_from(doc: &Document, obj: &Object) -> Option<Vec<f64>> {
    let arr = match resolve_ref(doc, obj) {
        Object::Array(arr) => arr,
        _ => return None,
    };
    arr.iter()
        .map(|o| match resolve_ref(doc, o) {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(r) => Some(f64::from(*r)),
            _ => None,
        })
        .collect()
}

pub(crate) fn rect_from(doc: &Document, obj: &Object) -> Option<Rect> {
    let nums = numbers_from(doc, obj)?;
    match nums.as_slice() {
        [x0, y0, x1, y1] => Some(Rect::new(*x0, *y0, *x1, *y1)),
        _ => None,
    }
}

pub(crate) fn matrix_from(doc: &Document, obj: &Object) -> Option<Matrix> {
    let nums = numbers_from(doc, obj)?;
    match nums.as_slice() {
        [a, b, c, d, e, f] => Some(Matrix::new(*a, *b, *c, *d, *e, *f)),
        _ => None,
    }
}

/// Convert a document object to an [`Operand`] tree, following
/// references. Streams and over-deep nests become `Null`.
pub(crate) fn object_to_operand(doc: &Document, obj: &Object, depth: usize) -> Operand {
    if depth > 8 {
        return Operand::Null;
    }
    match resolve_ref(doc, obj) {
        Object::Null => Operand::Null,
        Object::Boolean(b) => Operand::Boolean(*b),
        Object::Integer(i) => Operand::Integer(*i),
        Object::Real(r) => Operand::Real(f64::from(*r)),
        Object::Name(n) => Operand::Name(String::from_utf8_lossy(n).into_owned()),
        Object::String(bytes, _) => Operand::LiteralString(bytes.clone()),
        Object::Array(arr) => Operand::Array(
            arr.iter()
                .map(|o| object_to_operand(doc, o, depth + 1))
                .collect(),
        ),
        Object::Dictionary(dict) => Operand::Dictionary(dict_to_operands(doc, dict, depth + 1)),
        Object::Stream(_) | Object::Reference(_) => Operand::Null,
    }
}

pub(crate) fn dict_to_operands(
    doc: &Document,
    dict: &Dictionary,
    depth: usize,
) -> Vec<(String, Operand)> {
    dict.iter()
        .map(|(key, value)| {
            (
                String::from_utf8_lossy(key).into_owned(),
                object_to_operand(doc, value, depth),
            )
        })
        .collect()
}
