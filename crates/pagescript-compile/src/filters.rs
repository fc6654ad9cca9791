//! Stream filter decoders for inline image data.
//!
//! ASCIIHexDecode, ASCII85Decode, and RunLengthDecode are implemented
//! directly; FlateDecode goes through [`flate2`] and LZWDecode through
//! [`weezl`]. Compressed raster formats (DCTDecode, CCITTFaxDecode,
//! JPXDecode, JBIG2Decode) are opaque: the chain stops there and hands
//! the transport-decoded payload through unchanged.
//!
//! Each decoder reports whether the input ran out before the filter's
//! own end-of-data marker. That flag is what lets the inline image
//! reader distinguish "this candidate `EI` split the data short" from a
//! genuinely complete payload.

use flate2::{Decompress, FlushDecompress, Status};
use pagescript_core::ContentError;

/// Output of one decoder or a whole chain.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutput {
    pub data: Vec<u8>,
    /// The input ended before the filter saw its end-of-data marker.
    pub truncated: bool,
    /// False when the chain stopped at an opaque compressed format.
    pub fully_decoded: bool,
}

/// True for filters whose output we cannot (and need not) decode.
pub fn is_opaque_filter(name: &str) -> bool {
    matches!(
        name,
        "DCTDecode" | "CCITTFaxDecode" | "JPXDecode" | "JBIG2Decode"
    )
}

/// Apply a filter chain in order.
///
/// Stops early at the first opaque filter; any decodable filter that
/// rejects its input fails the whole chain.
pub fn decode_chain(data: &[u8], filters: &[String]) -> Result<FilterOutput, ContentError> {
    let mut current = data.to_vec();
    let mut truncated = false;
    for (i, name) in filters.iter().enumerate() {
        if is_opaque_filter(name) {
            if i + 1 != filters.len() {
                return Err(ContentError::FilterInvalid(format!(
                    "filter /{name} must be last in the chain"
                )));
            }
            return Ok(FilterOutput {
                data: current,
                truncated,
                fully_decoded: false,
            });
        }
        let out = match name.as_str() {
            "ASCIIHexDecode" => ascii_hex_decode(&current)?,
            "ASCII85Decode" => ascii85_decode(&current)?,
            "RunLengthDecode" => run_length_decode(&current)?,
            "LZWDecode" => lzw_decode(&current)?,
            "FlateDecode" => flate_decode(&current)?,
            other => {
                return Err(ContentError::FilterInvalid(format!(
                    "unknown filter /{other}"
                )));
            }
        };
        truncated |= out.truncated;
        current = out.data;
    }
    Ok(FilterOutput {
        data: current,
        truncated,
        fully_decoded: true,
    })
}

/// ASCIIHexDecode: hex pairs, whitespace ignored, `>` terminates, an odd
/// final digit is padded with zero.
pub fn ascii_hex_decode(input: &[u8]) -> Result<FilterOutput, ContentError> {
    let mut out = Vec::with_capacity(input.len() / 2);
    let mut pending: Option<u8> = None;
    for &b in input {
        match b {
            b'>' => {
                if let Some(hi) = pending {
                    out.push(hi << 4);
                }
                return Ok(FilterOutput {
                    data: out,
                    truncated: false,
                    fully_decoded: true,
                });
            }
            b if b.is_ascii_whitespace() || b == 0 => {}
            b => {
                let v = match b {
                    b'0'..=b'9' => b - b'0',
                    b'a'..=b'f' => b - b'a' + 10,
                    b'A'..=b'F' => b - b'A' + 10,
                    _ => {
                        return Err(ContentError::FilterInvalid(format!(
                            "non-hex byte {:#04x} in ASCIIHexDecode data",
                            b
                        )));
                    }
                };
                match pending.take() {
                    Some(hi) => out.push(hi << 4 | v),
                    None => pending = Some(v),
                }
            }
        }
    }
    if let Some(hi) = pending {
        out.push(hi << 4);
    }
    Ok(FilterOutput {
        data: out,
        truncated: true,
        fully_decoded: true,
    })
}

/// ASCII85Decode: base-85 groups of 5 chars to 4 bytes, `z` for a zero
/// group, `~>` terminates. A leading `<~` is tolerated.
pub fn ascii85_decode(input: &[u8]) -> Result<FilterOutput, ContentError> {
    let mut input = input;
    if input.starts_with(b"<~") {
        input = &input[2..];
    }

    let mut out = Vec::with_capacity(input.len() * 4 / 5);
    let mut group = [0u8; 5];
    let mut len = 0usize;
    let mut terminated = false;

    let mut iter = input.iter().peekable();
    while let Some(&b) = iter.next() {
        match b {
            b'~' => {
                if iter.peek() == Some(&&b'>') {
                    terminated = true;
                }
                break;
            }
            b'z' if len == 0 => out.extend_from_slice(&[0, 0, 0, 0]),
            b'!'..=b'u' => {
                group[len] = b - b'!';
                len += 1;
                if len == 5 {
                    push_ascii85_group(&group, 5, &mut out)?;
                    len = 0;
                }
            }
            b if b.is_ascii_whitespace() || b == 0 => {}
            _ => {
                return Err(ContentError::FilterInvalid(format!(
                    "invalid byte {:#04x} in ASCII85Decode data",
                    b
                )));
            }
        }
    }

    match len {
        0 => {}
        1 => {
            return Err(ContentError::FilterInvalid(
                "dangling single character in ASCII85Decode group".to_string(),
            ));
        }
        n => {
            // Pad the partial group with 'u' and keep n-1 output bytes.
            for slot in group.iter_mut().skip(n) {
                *slot = 84;
            }
            push_ascii85_group(&group, n, &mut out)?;
        }
    }
    Ok(FilterOutput {
        data: out,
        truncated: !terminated,
        fully_decoded: true,
    })
}

fn push_ascii85_group(group: &[u8; 5], chars: usize, out: &mut Vec<u8>) -> Result<(), ContentError> {
    let mut value: u32 = 0;
    for &digit in group {
        value = value
            .checked_mul(85)
            .and_then(|v| v.checked_add(digit as u32))
            .ok_or_else(|| {
                ContentError::FilterInvalid("ASCII85Decode group overflows 32 bits".to_string())
            })?;
    }
    let bytes = value.to_be_bytes();
    out.extend_from_slice(&bytes[..chars - 1]);
    Ok(())
}

/// RunLengthDecode: `L <= 127` copies `L+1` literal bytes, `L >= 129`
/// repeats the next byte `257-L` times, `128` is end of data.
pub fn run_length_decode(input: &[u8]) -> Result<FilterOutput, ContentError> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0usize;
    while i < input.len() {
        let length = input[i];
        i += 1;
        match length {
            128 => {
                return Ok(FilterOutput {
                    data: out,
                    truncated: false,
                    fully_decoded: true,
                });
            }
            0..=127 => {
                let count = length as usize + 1;
                if i + count > input.len() {
                    out.extend_from_slice(&input[i..]);
                    return Ok(FilterOutput {
                        data: out,
                        truncated: true,
                        fully_decoded: true,
                    });
                }
                out.extend_from_slice(&input[i..i + count]);
                i += count;
            }
            129..=255 => {
                let Some(&byte) = input.get(i) else {
                    return Ok(FilterOutput {
                        data: out,
                        truncated: true,
                        fully_decoded: true,
                    });
                };
                i += 1;
                out.extend(std::iter::repeat_n(byte, 257 - length as usize));
            }
        }
    }
    // Ran off the end without the EOD byte.
    Ok(FilterOutput {
        data: out,
        truncated: true,
        fully_decoded: true,
    })
}

/// LZWDecode with the PDF default `EarlyChange 1` (TIFF-compatible).
pub fn lzw_decode(input: &[u8]) -> Result<FilterOutput, ContentError> {
    let mut decoder =
        weezl::decode::Decoder::with_tiff_size_switch(weezl::BitOrder::Msb, 8);
    let mut out = Vec::with_capacity(input.len() * 2);
    let mut consumed = 0usize;
    loop {
        let start = out.len();
        out.resize(start + 16 * 1024, 0);
        let result = decoder.decode_bytes(&input[consumed..], &mut out[start..]);
        consumed += result.consumed_in;
        out.truncate(start + result.consumed_out);
        match result.status {
            Ok(weezl::LzwStatus::Done) => {
                return Ok(FilterOutput {
                    data: out,
                    truncated: false,
                    fully_decoded: true,
                });
            }
            Ok(weezl::LzwStatus::Ok) => {}
            Ok(weezl::LzwStatus::NoProgress) => {
                return Ok(FilterOutput {
                    data: out,
                    truncated: true,
                    fully_decoded: true,
                });
            }
            Err(e) => {
                return Err(ContentError::FilterInvalid(format!("LZWDecode: {e}")));
            }
        }
    }
}

/// FlateDecode (zlib-wrapped deflate).
pub fn flate_decode(input: &[u8]) -> Result<FilterOutput, ContentError> {
    let mut decompress = Decompress::new(true);
    let mut out = Vec::with_capacity(input.len().saturating_mul(4).max(1024));
    loop {
        let consumed = decompress.total_in() as usize;
        let status = decompress
            .decompress_vec(&input[consumed..], &mut out, FlushDecompress::Finish)
            .map_err(|e| ContentError::FilterInvalid(format!("FlateDecode: {e}")))?;
        match status {
            Status::StreamEnd => {
                return Ok(FilterOutput {
                    data: out,
                    truncated: false,
                    fully_decoded: true,
                });
            }
            Status::Ok | Status::BufError => {
                if out.len() == out.capacity() {
                    out.reserve(32 * 1024);
                    continue;
                }
                // Output space remains but the stream never ended: the
                // input was cut short.
                return Ok(FilterOutput {
                    data: out,
                    truncated: true,
                    fully_decoded: true,
                });
            }
        }
    }
}
