//! Inline image reading (`BI ... ID ... EI`).
//!
//! Inline image data carries no declared length, and nothing stops the
//! two bytes `EI` from appearing inside it. The reader therefore works
//! in two gears:
//!
//! * unfiltered data has a computable size, so exactly that many bytes
//!   are taken and the trailing `EI` is verified;
//! * filtered data is found by scanning for each plausible `EI` in turn
//!   and test-decoding the bytes before it, accepting the first
//!   candidate whose decode produces at least the expected sample count
//!   without being cut short.
//!
//! Scanning stops once a candidate's raw span grows past
//! [`RUNAWAY_FACTOR`] times the expected size: at that point the stream
//! is taken to be damaged rather than merely ambiguous.

use pagescript_core::{ContentError, InlineImage, Operand, dict_get};

use crate::color_space::ColorSpaceBinding;
use crate::filters::{decode_chain, is_opaque_filter};
use crate::lexer::{Lexer, Token, is_whitespace};
use crate::objects::parse_operand;
use crate::resources::Resources;

/// A candidate raw span longer than this multiple of the expected
/// decoded size fails the image instead of being test-decoded.
pub(crate) const RUNAWAY_FACTOR: usize = 4;

/// Floor for the runaway cutoff, so tiny images still tolerate filter
/// framing overhead (hex terminators, ASCII85 markers).
const RUNAWAY_MIN: usize = 64;

/// Read one inline image. The lexer is positioned just past the `BI`
/// keyword on entry and just past the terminating `EI` on success.
pub(crate) fn read_inline_image(
    lexer: &mut Lexer<'_>,
    resources: &Resources<'_>,
) -> Result<InlineImage, ContentError> {
    let entries = read_image_dict(lexer)?;
    let params = ImageParams::from_entries(&entries, resources)?;

    lexer.skip_inline_data_separator();
    let data_start = lexer.pos();
    let expected = params.expected_len()?;

    if params.filters.is_empty() {
        read_unfiltered(lexer, data_start, expected, params)
    } else {
        read_filtered(lexer, data_start, expected, params)
    }
}

/// Dictionary entries between `BI` and `ID`, keys and value names
/// expanded to their full forms.
fn read_image_dict(lexer: &mut Lexer<'_>) -> Result<Vec<(String, Operand)>, ContentError> {
    let mut entries = Vec::new();
    loop {
        let Some((offset, token)) = lexer.next_token()? else {
            return Err(ContentError::UnexpectedEof(
                "stream ended inside an inline image dictionary".to_string(),
            ));
        };
        let key = match token {
            Token::Keyword(k) if k == "ID" => return Ok(entries),
            Token::Name(n) => expand_key(&n).to_string(),
            other => {
                return Err(ContentError::IllegalToken {
                    token: format!("{} as inline image key", other.describe()),
                    offset,
                });
            }
        };
        let Some((value_offset, value_token)) = lexer.next_token()? else {
            return Err(ContentError::UnexpectedEof(format!(
                "inline image dictionary ended after key /{key}"
            )));
        };
        let value = parse_operand(lexer, value_offset, value_token)?;
        entries.push((key, value));
    }
}

fn expand_key(key: &str) -> &str {
    match key {
        "W" => "Width",
        "H" => "Height",
        "BPC" => "BitsPerComponent",
        "CS" => "ColorSpace",
        "F" => "Filter",
        "D" => "Decode",
        "DP" => "DecodeParms",
        "IM" => "ImageMask",
        "I" => "Interpolate",
        "L" => "Length",
        other => other,
    }
}

fn expand_color_space(name: &str) -> &str {
    match name {
        "G" => "DeviceGray",
        "RGB" => "DeviceRGB",
        "CMYK" => "DeviceCMYK",
        "I" => "Indexed",
        other => other,
    }
}

fn expand_filter(name: &str) -> &str {
    match name {
        "AHx" => "ASCIIHexDecode",
        "A85" => "ASCII85Decode",
        "LZW" => "LZWDecode",
        "Fl" => "FlateDecode",
        "RL" => "RunLengthDecode",
        "CCF" => "CCITTFaxDecode",
        "DCT" => "DCTDecode",
        other => other,
    }
}

/// Validated image parameters, ready to pair with sample data.
struct ImageParams {
    width: u32,
    height: u32,
    bits_per_component: u32,
    color_space: Option<String>,
    components: u32,
    image_mask: bool,
    filters: Vec<String>,
    decode: Option<Vec<f64>>,
    interpolate: bool,
}

impl ImageParams {
    fn from_entries(
        entries: &[(String, Operand)],
        resources: &Resources<'_>,
    ) -> Result<Self, ContentError> {
        let width = required_dimension(entries, "Width")?;
        let height = required_dimension(entries, "Height")?;

        let image_mask = match dict_get(entries, "ImageMask") {
            Some(op) => op.as_bool()?,
            None => false,
        };

        let bits_per_component = match dict_get(entries, "BitsPerComponent") {
            Some(op) => {
                let bpc = op.as_i64()?;
                if !matches!(bpc, 1 | 2 | 4 | 8 | 16) {
                    return Err(ContentError::Syntax(format!(
                        "inline image BitsPerComponent {bpc} is not 1, 2, 4, 8, or 16"
                    )));
                }
                bpc as u32
            }
            None if image_mask => 1,
            None => {
                return Err(ContentError::Syntax(
                    "inline image missing BitsPerComponent".to_string(),
                ));
            }
        };
        if image_mask && bits_per_component != 1 {
            return Err(ContentError::Syntax(
                "inline image mask must have 1 bit per component".to_string(),
            ));
        }

        let color_space = match dict_get(entries, "ColorSpace") {
            Some(op) => Some(expand_color_space(op.as_name()?).to_string()),
            None => None,
        };

        let components = if image_mask {
            1
        } else {
            match color_space.as_deref() {
                Some("DeviceGray") | Some("CalGray") | Some("Indexed") => 1,
                Some("DeviceRGB") | Some("CalRGB") | Some("Lab") => 3,
                Some("DeviceCMYK") => 4,
                Some(named) => {
                    let obj = resources.color_space(named)?;
                    ColorSpaceBinding::resolve(obj, resources.doc())?.n_components() as u32
                }
                None => {
                    return Err(ContentError::Syntax(
                        "inline image missing ColorSpace".to_string(),
                    ));
                }
            }
        };

        let filters = match dict_get(entries, "Filter") {
            Some(Operand::Name(n)) => vec![expand_filter(n).to_string()],
            Some(Operand::Array(arr)) => arr
                .iter()
                .map(|op| Ok(expand_filter(op.as_name()?).to_string()))
                .collect::<Result<Vec<_>, ContentError>>()?,
            Some(other) => {
                return Err(ContentError::WrongType {
                    expected: "filter name or array",
                    found: other.tag(),
                });
            }
            None => Vec::new(),
        };

        let decode = match dict_get(entries, "Decode") {
            Some(op) => Some(
                op.as_array()?
                    .iter()
                    .map(Operand::as_f64)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            None => None,
        };

        let interpolate = match dict_get(entries, "Interpolate") {
            Some(op) => op.as_bool()?,
            None => false,
        };

        Ok(Self {
            width,
            height,
            bits_per_component,
            color_space,
            components,
            image_mask,
            filters,
            decode,
            interpolate,
        })
    }

    /// Decoded sample size, `ceil(W·BPC·N / 8) · H`.
    fn expected_len(&self) -> Result<usize, ContentError> {
        let row_bits = (self.width as usize)
            .checked_mul(self.bits_per_component as usize)
            .and_then(|v| v.checked_mul(self.components as usize));
        row_bits
            .map(|bits| bits.div_ceil(8))
            .and_then(|row| row.checked_mul(self.height as usize))
            .ok_or_else(|| {
                ContentError::Syntax("inline image dimensions overflow".to_string())
            })
    }

    fn into_image(self, data: Vec<u8>, raw_len: usize) -> InlineImage {
        InlineImage {
            width: self.width,
            height: self.height,
            bits_per_component: self.bits_per_component,
            color_space: self.color_space,
            components: self.components,
            image_mask: self.image_mask,
            filters: self.filters,
            decode: self.decode,
            interpolate: self.interpolate,
            data,
            raw_len,
        }
    }
}

fn required_dimension(entries: &[(String, Operand)], key: &str) -> Result<u32, ContentError> {
    let value = dict_get(entries, key)
        .ok_or_else(|| ContentError::Syntax(format!("inline image missing {key}")))?
        .as_i64()?;
    if (1..=i64::from(u32::MAX)).contains(&value) {
        Ok(value as u32)
    } else {
        Err(ContentError::Syntax(format!(
            "inline image {key} {value} out of range"
        )))
    }
}

/// Unfiltered data: take exactly the computed byte count, then demand
/// the closing `EI`.
fn read_unfiltered(
    lexer: &mut Lexer<'_>,
    data_start: usize,
    expected: usize,
    params: ImageParams,
) -> Result<InlineImage, ContentError> {
    let data = lexer.data();
    let data_end = data_start + expected;
    if data_end > data.len() {
        lexer.seek(data.len());
        return Err(ContentError::UnexpectedEof(format!(
            "inline image needs {expected} data bytes but the stream ends first"
        )));
    }

    let mut terminator = data_end;
    while terminator < data.len() && is_whitespace(data[terminator]) {
        terminator += 1;
    }
    let at_ei = data[terminator..].starts_with(b"EI")
        && data
            .get(terminator + 2)
            .is_none_or(|&b| !crate::lexer::is_regular(b));
    if !at_ei {
        // Leave the lexer past the next plausible terminator so the
        // caller resumes at real operators instead of raw sample bytes.
        match lexer.find_ei(data_end) {
            Some(ei) => lexer.seek(ei + 2),
            None => lexer.seek(data.len()),
        }
        return Err(ContentError::Syntax(format!(
            "inline image data at offset {data_start} is not followed by EI"
        )));
    }

    lexer.seek(terminator + 2);
    Ok(params.into_image(data[data_start..data_end].to_vec(), expected))
}

/// Filtered data: test-decode up to each plausible `EI` in turn.
fn read_filtered(
    lexer: &mut Lexer<'_>,
    data_start: usize,
    expected: usize,
    params: ImageParams,
) -> Result<InlineImage, ContentError> {
    let data = lexer.data();
    let cutoff = expected.saturating_mul(RUNAWAY_FACTOR).max(RUNAWAY_MIN);
    let terminal_opaque = params.filters.last().is_some_and(|f| is_opaque_filter(f));

    let mut search = data_start;
    while let Some(ei) = lexer.find_ei(search) {
        let mut raw_end = ei;
        while raw_end > data_start && is_whitespace(data[raw_end - 1]) {
            raw_end -= 1;
        }
        let raw = &data[data_start..raw_end];

        if raw.len() > cutoff && !terminal_opaque {
            lexer.seek(ei + 2);
            return Err(ContentError::FilterInvalid(format!(
                "inline image data grew past {cutoff} bytes without a valid decode"
            )));
        }

        match decode_chain(raw, &params.filters) {
            // Opaque payloads cannot be validated: the first plausible
            // terminator wins.
            Ok(out) if !out.fully_decoded => {
                lexer.seek(ei + 2);
                return Ok(params.into_image(out.data, raw.len()));
            }
            Ok(out) => {
                let last_candidate = lexer.find_ei(ei + 2).is_none();
                if out.data.len() >= expected && (!out.truncated || last_candidate) {
                    lexer.seek(ei + 2);
                    return Ok(params.into_image(out.data, raw.len()));
                }
            }
            Err(_) => {}
        }
        search = ei + 2;
    }

    lexer.seek(data.len());
    Err(ContentError::UnexpectedEof(
        "inline image data has no valid EI terminator".to_string(),
    ))
}
