//! Denormalized image metadata carried by draw commands.
//!
//! The compiler flattens the information a renderer needs out of the
//! XObject or inline-image dictionary at compile time, so replaying a
//! command requires no further document access.

/// Metadata for an image XObject placed with `Do`.
///
/// The pixel data itself stays in the document; the sink receives the
/// name to fetch it by, plus everything needed to interpret it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImageRef {
    /// XObject name in the resource dictionary (e.g. "Im0").
    pub name: String,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Color space name (e.g. "DeviceRGB"), if declared.
    pub color_space: Option<String>,
    /// Bits per component, if declared.
    pub bits_per_component: Option<u32>,
    /// Stream filter name (e.g. "DCTDecode", "FlateDecode"), if any.
    pub filter: Option<String>,
    /// Whether this is a stencil mask rather than a full image.
    pub image_mask: bool,
}

/// An image embedded directly in the content stream (`BI ... ID ... EI`).
///
/// Dictionary keys and filter/color-space names are stored in their full
/// (unabbreviated) forms. `data` holds the sample bytes after the filter
/// chain has been applied where the filters are decodable; for opaque
/// compressed formats (DCTDecode and friends) it holds the transport-
/// decoded payload unchanged.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InlineImage {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Bits per component (1 for image masks).
    pub bits_per_component: u32,
    /// Full color space name, if declared.
    pub color_space: Option<String>,
    /// Number of color components per sample.
    pub components: u32,
    /// Whether this is a stencil mask.
    pub image_mask: bool,
    /// Filter chain in application order, full names.
    pub filters: Vec<String>,
    /// Decode array, if declared.
    pub decode: Option<Vec<f64>>,
    /// Interpolation flag.
    pub interpolate: bool,
    /// Sample data (see type docs for filter handling).
    pub data: Vec<u8>,
    /// Number of raw bytes consumed from the stream between `ID` and `EI`.
    pub raw_len: usize,
}

impl InlineImage {
    /// Expected decoded length in bytes: `ceil(W·BPC·N / 8) · H`.
    pub fn expected_len(&self) -> usize {
        let row_bits = self.width as usize * self.bits_per_component as usize
            * self.components as usize;
        row_bits.div_ceil(8) * self.height as usize
    }
}
