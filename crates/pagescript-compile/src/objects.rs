//! Builds [`Operand`] values out of lexer tokens.
//!
//! Arrays in content streams carry scalars only: numbers, strings,
//! names, `true`/`false`/`null`. A nested array or dictionary inside an
//! array is malformed and fails the construct. Dictionary values are
//! unrestricted (inline image DecodeParms nest freely).

use pagescript_core::{ContentError, Operand};

use crate::lexer::{Lexer, Token};

/// Operators are at most three characters; any longer keyword that is
/// not a value keyword cannot be valid.
pub(crate) const MAX_OPERATOR_LEN: usize = 3;

/// Convert a value keyword, or report it as not one.
fn keyword_operand(keyword: &str, offset: usize) -> Result<Operand, ContentError> {
    match keyword {
        "true" => Ok(Operand::Boolean(true)),
        "false" => Ok(Operand::Boolean(false)),
        "null" => Ok(Operand::Null),
        other => Err(ContentError::IllegalToken {
            token: other.to_string(),
            offset,
        }),
    }
}

/// Build one operand starting from an already-read token.
///
/// `BeginArray` and `BeginDictionary` recurse through the lexer until
/// their closing token; everything else maps directly.
pub(crate) fn parse_operand(
    lexer: &mut Lexer<'_>,
    offset: usize,
    token: Token,
) -> Result<Operand, ContentError> {
    match token {
        Token::Integer(i) => Ok(Operand::Integer(i)),
        Token::Real { value, .. } => Ok(Operand::Real(value)),
        Token::Name(n) => Ok(Operand::Name(n)),
        Token::LiteralString(b) => Ok(Operand::LiteralString(b)),
        Token::HexString(b) => Ok(Operand::HexString(b)),
        Token::Keyword(k) => keyword_operand(&k, offset),
        Token::BeginArray => parse_array(lexer, offset),
        Token::BeginDictionary => parse_dictionary(lexer, offset),
        Token::EndArray => Err(ContentError::IllegalToken {
            token: "]".to_string(),
            offset,
        }),
        Token::EndDictionary => Err(ContentError::IllegalToken {
            token: ">>".to_string(),
            offset,
        }),
    }
}

fn parse_array(lexer: &mut Lexer<'_>, start: usize) -> Result<Operand, ContentError> {
    let mut elements = Vec::new();
    loop {
        let Some((offset, token)) = lexer.next_token()? else {
            return Err(ContentError::UnexpectedEof(format!(
                "array starting at offset {start} never closed"
            )));
        };
        let element = match token {
            Token::EndArray => return Ok(Operand::Array(elements)),
            Token::Integer(i) => Operand::Integer(i),
            Token::Real { value, .. } => Operand::Real(value),
            Token::Name(n) => Operand::Name(n),
            Token::LiteralString(b) => Operand::LiteralString(b),
            Token::HexString(b) => Operand::HexString(b),
            Token::Keyword(k) => keyword_operand(&k, offset)?,
            Token::BeginArray | Token::BeginDictionary => {
                return Err(ContentError::IllegalToken {
                    token: format!("{} inside array", token.describe()),
                    offset,
                });
            }
            Token::EndDictionary => {
                return Err(ContentError::IllegalToken {
                    token: ">> inside array".to_string(),
                    offset,
                });
            }
        };
        elements.push(element);
    }
}

fn parse_dictionary(lexer: &mut Lexer<'_>, start: usize) -> Result<Operand, ContentError> {
    let mut entries = Vec::new();
    loop {
        let Some((offset, token)) = lexer.next_token()? else {
            return Err(ContentError::UnexpectedEof(format!(
                "dictionary starting at offset {start} never closed"
            )));
        };
        let key = match token {
            Token::EndDictionary => return Ok(Operand::Dictionary(entries)),
            Token::Name(n) => n,
            other => {
                return Err(ContentError::IllegalToken {
                    token: format!("{} as dictionary key", other.describe()),
                    offset,
                });
            }
        };
        let Some((value_offset, value_token)) = lexer.next_token()? else {
            return Err(ContentError::UnexpectedEof(format!(
                "dictionary starting at offset {start} ended after key /{key}"
            )));
        };
        let value = parse_operand(lexer, value_offset, value_token)?;
        entries.push((key, value));
    }
}
