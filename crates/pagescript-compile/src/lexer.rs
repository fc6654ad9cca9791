//! Pull lexer over raw content stream bytes.
//!
//! Produces one token at a time so the compiler can switch modes
//! mid-stream: inline image data is read as raw bytes between tokens,
//! and error recovery scans forward from a known byte position.
//!
//! Error contract: a failed [`Lexer::next_token`] call has always
//! consumed at least one byte, so callers that loop on the lexer make
//! progress no matter how mangled the input is.

use pagescript_core::ContentError;

/// A lexical token from a content stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Integer number.
    Integer(i64),
    /// Real number, remembering how many fractional digits were written.
    Real {
        value: f64,
        fraction_digits: u8,
    },
    /// Name object, without the leading `/`.
    Name(String),
    /// Literal string `( ... )`, escapes resolved.
    LiteralString(Vec<u8>),
    /// Hex string `< ... >`, decoded to bytes.
    HexString(Vec<u8>),
    /// `[`
    BeginArray,
    /// `]`
    EndArray,
    /// `<<`
    BeginDictionary,
    /// `>>`
    EndDictionary,
    /// A bare keyword: an operator, or `true`/`false`/`null`.
    Keyword(String),
}

impl Token {
    /// Short description for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Token::Integer(i) => format!("integer {i}"),
            Token::Real { value, .. } => format!("real {value}"),
            Token::Name(n) => format!("/{n}"),
            Token::LiteralString(_) => "literal string".to_string(),
            Token::HexString(_) => "hex string".to_string(),
            Token::BeginArray => "[".to_string(),
            Token::EndArray => "]".to_string(),
            Token::BeginDictionary => "<<".to_string(),
            Token::EndDictionary => ">>".to_string(),
            Token::Keyword(k) => k.clone(),
        }
    }
}

/// PDF whitespace: null, tab, LF, FF, CR, space.
pub(crate) fn is_whitespace(b: u8) -> bool {
    matches!(b, 0x00 | 0x09 | 0x0A | 0x0C | 0x0D | 0x20)
}

/// PDF delimiters: `( ) < > [ ] { } / %`.
pub(crate) fn is_delimiter(b: u8) -> bool {
    matches!(b, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

/// A regular character: neither whitespace nor delimiter.
pub(crate) fn is_regular(b: u8) -> bool {
    !is_whitespace(b) && !is_delimiter(b)
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Token-at-a-time lexer over a content stream byte slice.
pub struct Lexer<'a> {
    data: &'a [u8],
    pos: usize,
    max_fraction_digits: u8,
}

impl<'a> Lexer<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            max_fraction_digits: 0,
        }
    }

    /// The largest number of fractional digits seen on any real lexed so
    /// far, wherever it appeared.
    pub fn max_fraction_digits(&self) -> u8 {
        self.max_fraction_digits
    }

    /// Current byte offset.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Jump to an absolute byte offset (clamped to the end).
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.data.len());
    }

    /// The underlying bytes.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// True once every byte (minus trailing whitespace and comments) is
    /// consumed.
    pub fn at_end(&mut self) -> bool {
        self.skip_whitespace_and_comments();
        self.pos >= self.data.len()
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(b) = self.peek() {
            if is_whitespace(b) {
                self.pos += 1;
            } else if b == b'%' {
                while let Some(b) = self.peek() {
                    self.pos += 1;
                    if b == b'\n' || b == b'\r' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    /// The next token with its starting byte offset, or `None` at end of
    /// stream.
    pub fn next_token(&mut self) -> Result<Option<(usize, Token)>, ContentError> {
        self.skip_whitespace_and_comments();
        let start = self.pos;
        let Some(b) = self.peek() else {
            return Ok(None);
        };

        let token = match b {
            b'[' => {
                self.pos += 1;
                Token::BeginArray
            }
            b']' => {
                self.pos += 1;
                Token::EndArray
            }
            b'/' => {
                self.pos += 1;
                self.lex_name(start)?
            }
            b'(' => {
                self.pos += 1;
                self.lex_literal_string(start)?
            }
            b'<' => {
                if self.data.get(self.pos + 1) == Some(&b'<') {
                    self.pos += 2;
                    Token::BeginDictionary
                } else {
                    self.pos += 1;
                    self.lex_hex_string(start)?
                }
            }
            b'>' => {
                if self.data.get(self.pos + 1) == Some(&b'>') {
                    self.pos += 2;
                    Token::EndDictionary
                } else {
                    self.pos += 1;
                    return Err(ContentError::IllegalToken {
                        token: ">".to_string(),
                        offset: start,
                    });
                }
            }
            b')' | b'{' | b'}' => {
                self.pos += 1;
                return Err(ContentError::IllegalToken {
                    token: (b as char).to_string(),
                    offset: start,
                });
            }
            b'+' | b'-' | b'.' | b'0'..=b'9' => self.lex_number(start)?,
            _ => self.lex_keyword(),
        };
        Ok(Some((start, token)))
    }

    fn lex_name(&mut self, start: usize) -> Result<Token, ContentError> {
        let mut name = Vec::new();
        while let Some(b) = self.peek() {
            if !is_regular(b) {
                break;
            }
            self.pos += 1;
            if b == b'#' {
                let hi = self.peek().and_then(hex_value);
                let lo = self.data.get(self.pos + 1).copied().and_then(hex_value);
                match (hi, lo) {
                    (Some(hi), Some(lo)) => {
                        self.pos += 2;
                        name.push(hi << 4 | lo);
                    }
                    _ => {
                        return Err(ContentError::Syntax(format!(
                            "bad #-escape in name at offset {start}"
                        )));
                    }
                }
            } else {
                name.push(b);
            }
        }
        match String::from_utf8(name) {
            Ok(s) => Ok(Token::Name(s)),
            // Non-UTF-8 name bytes get the lossy treatment rather than a
            // hard failure; they still compare stably for resource lookup.
            Err(e) => Ok(Token::Name(
                String::from_utf8_lossy(e.as_bytes()).into_owned(),
            )),
        }
    }

    fn lex_literal_string(&mut self, start: usize) -> Result<Token, ContentError> {
        let mut out = Vec::new();
        let mut depth = 1usize;
        while let Some(b) = self.peek() {
            self.pos += 1;
            match b {
                b'(' => {
                    depth += 1;
                    out.push(b);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(Token::LiteralString(out));
                    }
                    out.push(b);
                }
                b'\\' => {
                    let Some(esc) = self.peek() else { break };
                    self.pos += 1;
                    match esc {
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'b' => out.push(0x08),
                        b'f' => out.push(0x0C),
                        b'(' | b')' | b'\\' => out.push(esc),
                        b'0'..=b'7' => {
                            let mut value = (esc - b'0') as u16;
                            for _ in 0..2 {
                                match self.peek() {
                                    Some(d @ b'0'..=b'7') => {
                                        self.pos += 1;
                                        value = value * 8 + (d - b'0') as u16;
                                    }
                                    _ => break,
                                }
                            }
                            out.push(value as u8);
                        }
                        // Backslash before a line break continues the
                        // string without a byte.
                        b'\r' => {
                            if self.peek() == Some(b'\n') {
                                self.pos += 1;
                            }
                        }
                        b'\n' => {}
                        // Unknown escape: the backslash is dropped.
                        other => out.push(other),
                    }
                }
                // A raw end-of-line inside a string reads as \n.
                b'\r' => {
                    if self.peek() == Some(b'\n') {
                        self.pos += 1;
                    }
                    out.push(b'\n');
                }
                _ => out.push(b),
            }
        }
        Err(ContentError::UnexpectedEof(format!(
            "unterminated literal string starting at offset {start}"
        )))
    }

    fn lex_hex_string(&mut self, start: usize) -> Result<Token, ContentError> {
        let mut out = Vec::new();
        let mut pending: Option<u8> = None;
        while let Some(b) = self.peek() {
            self.pos += 1;
            if b == b'>' {
                // Odd digit count: the final nibble is padded with zero.
                if let Some(hi) = pending {
                    out.push(hi << 4);
                }
                return Ok(Token::HexString(out));
            }
            if is_whitespace(b) {
                continue;
            }
            match hex_value(b) {
                Some(v) => match pending.take() {
                    Some(hi) => out.push(hi << 4 | v),
                    None => pending = Some(v),
                },
                None => {
                    return Err(ContentError::Syntax(format!(
                        "non-hex byte {:?} in hex string at offset {}",
                        b as char,
                        self.pos - 1
                    )));
                }
            }
        }
        Err(ContentError::UnexpectedEof(format!(
            "unterminated hex string starting at offset {start}"
        )))
    }

    fn lex_number(&mut self, start: usize) -> Result<Token, ContentError> {
        // Consume the entire run of number characters first so a
        // malformed token is fully skipped.
        let mut end = self.pos;
        while end < self.data.len() && matches!(self.data[end], b'+' | b'-' | b'.' | b'0'..=b'9') {
            end += 1;
        }
        let run = &self.data[self.pos..end];
        self.pos = end;

        let mut idx = 0;
        let negative = match run.first() {
            Some(b'-') => {
                idx = 1;
                true
            }
            Some(b'+') => {
                idx = 1;
                false
            }
            _ => false,
        };

        let mut int_digits = 0usize;
        let mut integer: i64 = 0;
        let mut overflowed = false;
        while idx < run.len() && run[idx].is_ascii_digit() {
            let d = (run[idx] - b'0') as i64;
            integer = match integer.checked_mul(10).and_then(|v| v.checked_add(d)) {
                Some(v) => v,
                None => {
                    overflowed = true;
                    integer
                }
            };
            int_digits += 1;
            idx += 1;
        }

        if idx == run.len() {
            if int_digits == 0 || overflowed {
                return Err(ContentError::Syntax(format!(
                    "malformed number {:?} at offset {start}",
                    String::from_utf8_lossy(run)
                )));
            }
            return Ok(Token::Integer(if negative { -integer } else { integer }));
        }

        if run[idx] != b'.' {
            return Err(ContentError::Syntax(format!(
                "malformed number {:?} at offset {start}",
                String::from_utf8_lossy(run)
            )));
        }
        idx += 1;

        let mut frac_digits = 0usize;
        let mut frac: f64 = 0.0;
        let mut scale: f64 = 1.0;
        while idx < run.len() && run[idx].is_ascii_digit() {
            scale /= 10.0;
            frac += (run[idx] - b'0') as f64 * scale;
            frac_digits += 1;
            idx += 1;
        }

        // Anything left over means a second sign or dot in the run.
        if idx != run.len() || (int_digits == 0 && frac_digits == 0) {
            return Err(ContentError::Syntax(format!(
                "malformed number {:?} at offset {start}",
                String::from_utf8_lossy(run)
            )));
        }

        let magnitude = integer as f64 + frac;
        let fraction_digits = frac_digits.min(u8::MAX as usize) as u8;
        self.max_fraction_digits = self.max_fraction_digits.max(fraction_digits);
        Ok(Token::Real {
            value: if negative { -magnitude } else { magnitude },
            fraction_digits,
        })
    }

    fn lex_keyword(&mut self) -> Token {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if !is_regular(b) {
                break;
            }
            self.pos += 1;
        }
        Token::Keyword(String::from_utf8_lossy(&self.data[start..self.pos]).into_owned())
    }

    /// Skip the single whitespace byte separating `ID` from inline image
    /// data. CRLF counts as one separator; anything else leaves the
    /// position alone (the data starts immediately).
    pub fn skip_inline_data_separator(&mut self) {
        match self.peek() {
            Some(b'\r') => {
                self.pos += 1;
                if self.peek() == Some(b'\n') {
                    self.pos += 1;
                }
            }
            Some(b) if is_whitespace(b) => {
                self.pos += 1;
            }
            _ => {}
        }
    }

    /// Find the next plausible `EI` keyword at or after `from`: the two
    /// bytes `EI` preceded by whitespace (or stream start) and followed
    /// by whitespace, a delimiter, or end of stream.
    pub fn find_ei(&self, from: usize) -> Option<usize> {
        let data = self.data;
        let mut i = from;
        while i + 2 <= data.len() {
            if data[i] == b'E'
                && data[i + 1] == b'I'
                && (i == 0 || is_whitespace(data[i - 1]))
                && data.get(i + 2).is_none_or(|&b| !is_regular(b))
            {
                return Some(i);
            }
            i += 1;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &[u8]) -> Vec<Token> {
        let mut lexer = Lexer::new(input);
        let mut out = Vec::new();
        while let Some((_, t)) = lexer.next_token().unwrap() {
            out.push(t);
        }
        out
    }

    // --- Numbers ---

    #[test]
    fn integers() {
        assert_eq!(
            tokens(b"42 -7 +3 0"),
            vec![
                Token::Integer(42),
                Token::Integer(-7),
                Token::Integer(3),
                Token::Integer(0)
            ]
        );
    }

    #[test]
    fn reals_track_fraction_digits() {
        assert_eq!(
            tokens(b"12.3456"),
            vec![Token::Real {
                value: 12.3456,
                fraction_digits: 4
            }]
        );
        assert_eq!(
            tokens(b".5 4. -.002"),
            vec![
                Token::Real {
                    value: 0.5,
                    fraction_digits: 1
                },
                Token::Real {
                    value: 4.0,
                    fraction_digits: 0
                },
                Token::Real {
                    value: -0.002,
                    fraction_digits: 3
                },
            ]
        );
    }

    #[test]
    fn malformed_number_errors_but_consumes() {
        let mut lexer = Lexer::new(b"1.2.3 q");
        assert!(lexer.next_token().is_err());
        // The whole malformed run was consumed.
        let (_, t) = lexer.next_token().unwrap().unwrap();
        assert_eq!(t, Token::Keyword("q".to_string()));
    }

    // --- Names ---

    #[test]
    fn names() {
        assert_eq!(
            tokens(b"/F1 /DeviceRGB /"),
            vec![
                Token::Name("F1".to_string()),
                Token::Name("DeviceRGB".to_string()),
                Token::Name(String::new()),
            ]
        );
    }

    #[test]
    fn name_hash_escape() {
        assert_eq!(tokens(b"/A#20B"), vec![Token::Name("A B".to_string())]);
    }

    // --- Strings ---

    #[test]
    fn literal_string_with_escapes() {
        assert_eq!(
            tokens(b"(a\\(b\\)c\\n\\101)"),
            vec![Token::LiteralString(b"a(b)c\nA".to_vec())]
        );
    }

    #[test]
    fn literal_string_balanced_parens() {
        assert_eq!(
            tokens(b"(a(b)c)"),
            vec![Token::LiteralString(b"a(b)c".to_vec())]
        );
    }

    #[test]
    fn literal_string_unterminated() {
        let mut lexer = Lexer::new(b"(abc");
        assert!(matches!(
            lexer.next_token(),
            Err(ContentError::UnexpectedEof(_))
        ));
    }

    #[test]
    fn hex_string_pads_odd_nibble() {
        assert_eq!(
            tokens(b"<48656C6C6F> <4 1> <AB5>"),
            vec![
                Token::HexString(b"Hello".to_vec()),
                Token::HexString(vec![0x41]),
                Token::HexString(vec![0xAB, 0x50]),
            ]
        );
    }

    // --- Structure tokens ---

    #[test]
    fn arrays_and_dictionaries() {
        assert_eq!(
            tokens(b"[1 2] << /W 3 >>"),
            vec![
                Token::BeginArray,
                Token::Integer(1),
                Token::Integer(2),
                Token::EndArray,
                Token::BeginDictionary,
                Token::Name("W".to_string()),
                Token::Integer(3),
                Token::EndDictionary,
            ]
        );
    }

    #[test]
    fn bare_close_paren_is_illegal() {
        let mut lexer = Lexer::new(b") q");
        assert!(matches!(
            lexer.next_token(),
            Err(ContentError::IllegalToken { .. })
        ));
        let (_, t) = lexer.next_token().unwrap().unwrap();
        assert_eq!(t, Token::Keyword("q".to_string()));
    }

    #[test]
    fn bare_close_angle_is_illegal() {
        let mut lexer = Lexer::new(b"> q");
        assert!(lexer.next_token().is_err());
        assert!(lexer.next_token().unwrap().is_some());
    }

    // --- Keywords and comments ---

    #[test]
    fn keywords_and_star_forms() {
        assert_eq!(
            tokens(b"q BT f* T* true"),
            vec![
                Token::Keyword("q".to_string()),
                Token::Keyword("BT".to_string()),
                Token::Keyword("f*".to_string()),
                Token::Keyword("T*".to_string()),
                Token::Keyword("true".to_string()),
            ]
        );
    }

    #[test]
    fn comments_skipped() {
        assert_eq!(
            tokens(b"q % comment to end of line\nQ"),
            vec![Token::Keyword("q".to_string()), Token::Keyword("Q".to_string())]
        );
    }

    #[test]
    fn offsets_reported() {
        let mut lexer = Lexer::new(b"  42 /F1");
        let (off, _) = lexer.next_token().unwrap().unwrap();
        assert_eq!(off, 2);
        let (off, _) = lexer.next_token().unwrap().unwrap();
        assert_eq!(off, 5);
    }

    // --- Inline image helpers ---

    #[test]
    fn separator_skips_one_byte_or_crlf() {
        let mut lexer = Lexer::new(b"\r\nDATA");
        lexer.skip_inline_data_separator();
        assert_eq!(lexer.pos(), 2);

        let mut lexer = Lexer::new(b" DATA");
        lexer.skip_inline_data_separator();
        assert_eq!(lexer.pos(), 1);

        let mut lexer = Lexer::new(b"DATA");
        lexer.skip_inline_data_separator();
        assert_eq!(lexer.pos(), 0);
    }

    #[test]
    fn find_ei_requires_boundaries() {
        let lexer = Lexer::new(b"xxEIxx EI Q");
        // The embedded EI has no whitespace before or after it.
        assert_eq!(lexer.find_ei(0), Some(7));
    }

    #[test]
    fn find_ei_at_end_of_stream() {
        let lexer = Lexer::new(b"data EI");
        assert_eq!(lexer.find_ei(0), Some(5));
    }

    #[test]
    fn find_ei_none_when_absent() {
        let lexer = Lexer::new(b"no end in sight");
        assert_eq!(lexer.find_ei(0), None);
    }

    #[test]
    fn max_fraction_digits_tracks_high_water_mark() {
        let mut lexer = Lexer::new(b"1.5 [12.3456 2] 0.25");
        while lexer.next_token().unwrap().is_some() {}
        assert_eq!(lexer.max_fraction_digits(), 4);
    }

    #[test]
    fn at_end_skips_trailing_whitespace() {
        let mut lexer = Lexer::new(b"q   \n% trailing\n");
        lexer.next_token().unwrap();
        assert!(lexer.at_end());
    }
}
