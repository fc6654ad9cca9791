//! Color space resolution.
//!
//! The compiler only needs two facts about a color space: how many
//! components its colors carry (so `SC`/`sc`/`SCN`/`scn` arity can be
//! validated) and whether it is a Pattern space (so the trailing pattern
//! name operand is expected). [`ColorSpaceBinding`] captures exactly
//! that, resolved from names and color space arrays in the document.

use lopdf::{Document, Object};
use pagescript_core::ContentError;

/// A color space reduced to what operand validation needs.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorSpaceBinding {
    /// DeviceGray (1 component).
    DeviceGray,
    /// DeviceRGB (3 components).
    DeviceRgb,
    /// DeviceCMYK (4 components).
    DeviceCmyk,
    /// CalGray (1 component).
    CalGray,
    /// CalRGB (3 components).
    CalRgb,
    /// Lab (3 components).
    Lab,
    /// ICCBased with its declared N.
    IccBased(usize),
    /// Indexed (colors are single index values).
    Indexed,
    /// Separation (single tint component).
    Separation,
    /// DeviceN with the length of its names array.
    DeviceN(usize),
    /// Pattern, optionally with an underlying space for uncolored
    /// patterns.
    Pattern(Option<Box<ColorSpaceBinding>>),
}

impl ColorSpaceBinding {
    /// Number of numeric components a color in this space carries.
    ///
    /// For Pattern spaces this is the underlying space's count (zero
    /// when there is none); the pattern name operand is extra.
    pub fn n_components(&self) -> usize {
        match self {
            ColorSpaceBinding::DeviceGray
            | ColorSpaceBinding::CalGray
            | ColorSpaceBinding::Indexed
            | ColorSpaceBinding::Separation => 1,
            ColorSpaceBinding::DeviceRgb | ColorSpaceBinding::CalRgb | ColorSpaceBinding::Lab => 3,
            ColorSpaceBinding::DeviceCmyk => 4,
            ColorSpaceBinding::IccBased(n) | ColorSpaceBinding::DeviceN(n) => *n,
            ColorSpaceBinding::Pattern(underlying) => {
                underlying.as_ref().map_or(0, |u| u.n_components())
            }
        }
    }

    pub fn is_pattern(&self) -> bool {
        matches!(self, ColorSpaceBinding::Pattern(_))
    }

    /// Resolve one of the four spaces nameable directly in a content
    /// stream without a resource entry.
    pub fn from_device_name(name: &str) -> Option<Self> {
        match name {
            "DeviceGray" => Some(ColorSpaceBinding::DeviceGray),
            "DeviceRGB" => Some(ColorSpaceBinding::DeviceRgb),
            "DeviceCMYK" => Some(ColorSpaceBinding::DeviceCmyk),
            "Pattern" => Some(ColorSpaceBinding::Pattern(None)),
            _ => None,
        }
    }

    /// Resolve a color space object (a name, an array, or a reference to
    /// either) from the document.
    pub fn resolve(obj: &Object, doc: &Document) -> Result<Self, ContentError> {
        match obj {
            Object::Name(name) => {
                let name = String::from_utf8_lossy(name);
                Self::from_device_name(&name).ok_or_else(|| ContentError::Other(format!(
                    "unresolvable color space name /{name}"
                )))
            }
            Object::Array(arr) => Self::resolve_array(arr, doc),
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(resolved) => Self::resolve(resolved, doc),
                Err(e) => Err(ContentError::Other(format!(
                    "dangling color space reference: {e}"
                ))),
            },
            other => Err(ContentError::WrongType {
                expected: "color space name or array",
                found: type_name(other),
            }),
        }
    }

    fn resolve_array(arr: &[Object], doc: &Document) -> Result<Self, ContentError> {
        let family = match arr.first() {
            Some(Object::Name(n)) => String::from_utf8_lossy(n).into_owned(),
            Some(Object::Reference(id)) => match doc.get_object(*id) {
                Ok(Object::Name(n)) => String::from_utf8_lossy(n).into_owned(),
                _ => {
                    return Err(ContentError::Other(
                        "color space array head is not a name".to_string(),
                    ));
                }
            },
            _ => {
                return Err(ContentError::Other(
                    "empty or headless color space array".to_string(),
                ));
            }
        };

        match family.as_str() {
            "DeviceGray" | "G" => Ok(ColorSpaceBinding::DeviceGray),
            "DeviceRGB" | "RGB" => Ok(ColorSpaceBinding::DeviceRgb),
            "DeviceCMYK" | "CMYK" => Ok(ColorSpaceBinding::DeviceCmyk),
            "CalGray" => Ok(ColorSpaceBinding::CalGray),
            "CalRGB" => Ok(ColorSpaceBinding::CalRgb),
            "Lab" => Ok(ColorSpaceBinding::Lab),
            "ICCBased" => Ok(ColorSpaceBinding::IccBased(icc_component_count(arr, doc)?)),
            "Indexed" | "I" => Ok(ColorSpaceBinding::Indexed),
            "Separation" => Ok(ColorSpaceBinding::Separation),
            "DeviceN" => {
                let names = arr.get(1).map(|o| resolve_ref(o, doc));
                match names {
                    Some(Object::Array(names)) => Ok(ColorSpaceBinding::DeviceN(names.len())),
                    _ => Err(ContentError::Other(
                        "DeviceN color space without names array".to_string(),
                    )),
                }
            }
            "Pattern" => {
                let underlying = match arr.get(1) {
                    Some(obj) => Some(Box::new(Self::resolve(obj, doc)?)),
                    None => None,
                };
                Ok(ColorSpaceBinding::Pattern(underlying))
            }
            other => Err(ContentError::Other(format!(
                "unknown color space family /{other}"
            ))),
        }
    }
}

impl Default for ColorSpaceBinding {
    /// The initial stroke and fill color space of every content stream.
    fn default() -> Self {
        ColorSpaceBinding::DeviceGray
    }
}

fn icc_component_count(arr: &[Object], doc: &Document) -> Result<usize, ContentError> {
    let stream = arr.get(1).map(|o| resolve_ref(o, doc));
    let Some(Object::Stream(stream)) = stream else {
        return Err(ContentError::Other(
            "ICCBased color space without profile stream".to_string(),
        ));
    };
    match stream.dict.get(b"N") {
        Ok(Object::Integer(n)) if (1..=32).contains(n) => Ok(*n as usize),
        _ => Err(ContentError::Other(
            "ICCBased profile stream without valid /N".to_string(),
        )),
    }
}

fn resolve_ref<'a>(obj: &'a Object, doc: &'a Document) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

fn type_name(obj: &Object) -> &'static str {
    match obj {
        Object::Null => "null",
        Object::Boolean(_) => "boolean",
        Object::Integer(_) => "integer",
        Object::Real(_) => "real",
        Object::Name(_) => "name",
        Object::String(..) => "string",
        Object::Array(_) => "array",
        Object::Dictionary(_) => "dictionary",
        Object::Stream(_) => "stream",
        Object::Reference(_) => "reference",
    }
}
