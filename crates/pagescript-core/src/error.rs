//! Error, warning, and option types for pagescript-rs.
//!
//! Provides [`ContentError`] for conditions that stop the current parse
//! attempt, [`CompileWarning`] for non-fatal issues recorded during
//! best-effort compilation, and [`CompileOptions`] for configuring
//! strictness and resource limits.

use std::fmt;

/// Error raised while lexing, validating, or building commands from a
/// content stream.
///
/// Most variants are recoverable at the compiler's top-level loop (the
/// stream is resynchronized and compilation continues); resource and
/// recursion errors are structural and abort the affected compile.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentError {
    /// Malformed content stream syntax (unterminated string, bad number, ...).
    Syntax(String),
    /// A token appeared where it is not legal (bare `]`, long keyword, ...).
    IllegalToken {
        /// Short description of the offending token.
        token: String,
        /// Byte offset in the content stream.
        offset: usize,
    },
    /// An operand had the wrong type for the operator consuming it.
    WrongType {
        /// The operand type the operator expected.
        expected: &'static str,
        /// The operand type actually found.
        found: &'static str,
    },
    /// A named resource was absent from the resource dictionary.
    MissingResource {
        /// Resource category (e.g. "Font", "XObject").
        kind: &'static str,
        /// The name that failed to resolve.
        name: String,
    },
    /// The stream ended in the middle of a construct.
    UnexpectedEof(String),
    /// Inline image data could not be decoded through its filter chain.
    FilterInvalid(String),
    /// Nested form/pattern/font compilation exceeded the configured depth.
    RecursionLimit {
        /// Depth at which the breach occurred.
        depth: usize,
        /// The configured limit.
        limit: usize,
    },
    /// Any other error not covered by specific variants.
    Other(String),
}

impl fmt::Display for ContentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentError::Syntax(msg) => write!(f, "syntax error: {msg}"),
            ContentError::IllegalToken { token, offset } => {
                write!(f, "illegal token {token:?} at offset {offset}")
            }
            ContentError::WrongType { expected, found } => {
                write!(f, "operand type mismatch: expected {expected}, found {found}")
            }
            ContentError::MissingResource { kind, name } => {
                write!(f, "missing {kind} resource /{name}")
            }
            ContentError::UnexpectedEof(msg) => write!(f, "unexpected end of stream: {msg}"),
            ContentError::FilterInvalid(msg) => write!(f, "invalid filter data: {msg}"),
            ContentError::RecursionLimit { depth, limit } => {
                write!(f, "recursion depth {depth} exceeds limit {limit}")
            }
            ContentError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ContentError {}

/// Machine-readable warning code categorizing a compile-time degradation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "type", content = "detail")
)]
pub enum CompileWarningCode {
    /// An operator was dropped (unknown, or illegal in the current state).
    IgnoredOperator,
    /// The operand stack did not match the operator's expected shape.
    OperandMismatch,
    /// A restore (`Q`) or `EMC` had no matching opening operator.
    UnbalancedRestore,
    /// A `q`, `BT`, or marked-content section was still open at end of stream.
    UnterminatedSection,
    /// The parser resynchronized after a malformed construct.
    ResyncPerformed,
    /// Any other warning not covered by specific variants.
    Other(String),
}

impl CompileWarningCode {
    /// Returns the string tag for this warning code.
    pub fn as_str(&self) -> &str {
        match self {
            CompileWarningCode::IgnoredOperator => "IGNORED_OPERATOR",
            CompileWarningCode::OperandMismatch => "OPERAND_MISMATCH",
            CompileWarningCode::UnbalancedRestore => "UNBALANCED_RESTORE",
            CompileWarningCode::UnterminatedSection => "UNTERMINATED_SECTION",
            CompileWarningCode::ResyncPerformed => "RESYNC_PERFORMED",
            CompileWarningCode::Other(_) => "OTHER",
        }
    }
}

impl fmt::Display for CompileWarningCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-fatal issue recorded during compilation.
///
/// Warnings make silent data loss observable: every dropped operator,
/// unbalanced bracket, and resynchronization leaves one behind, while the
/// compile itself still produces a best-effort command list.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompileWarning {
    /// Machine-readable warning code.
    pub code: CompileWarningCode,
    /// Human-readable description.
    pub description: String,
    /// The operator keyword involved, if applicable.
    pub operator: Option<String>,
    /// Byte offset in the content stream, if known.
    pub offset: Option<usize>,
}

impl CompileWarning {
    /// Create a warning with just a description.
    ///
    /// Uses [`CompileWarningCode::Other`] as the default code.
    pub fn new(description: impl Into<String>) -> Self {
        let desc = description.into();
        Self {
            code: CompileWarningCode::Other(desc.clone()),
            description: desc,
            operator: None,
            offset: None,
        }
    }

    /// Create a warning with a specific code and description.
    pub fn with_code(code: CompileWarningCode, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
            operator: None,
            offset: None,
        }
    }

    /// Create a warning attached to an operator occurrence.
    pub fn at_operator(
        code: CompileWarningCode,
        description: impl Into<String>,
        operator: impl Into<String>,
        offset: usize,
    ) -> Self {
        Self {
            code,
            description: description.into(),
            operator: Some(operator.into()),
            offset: Some(offset),
        }
    }
}

impl fmt::Display for CompileWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.description)?;
        if let Some(ref op) = self.operator {
            write!(f, " [operator {op}]")?;
        }
        if let Some(offset) = self.offset {
            write!(f, " [offset {offset}]")?;
        }
        Ok(())
    }
}

/// Options controlling compilation behavior and resource limits.
///
/// Provides sensible defaults. The limits prevent pathological documents
/// (cyclic form graphs, runaway inline images, giant streams) from
/// consuming unbounded time or memory.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Escalate dropped-operator warnings to hard errors (default: false).
    ///
    /// Operators inside a `BX`/`EX` compatibility section are dropped
    /// silently regardless of this setting.
    pub strict_mode: bool,
    /// Maximum nesting depth for form/pattern/Type3 sub-compiles (default: 16).
    pub max_recursion_depth: usize,
    /// Maximum content stream bytes to process (default: 100 MB).
    pub max_stream_bytes: usize,
    /// Whether to collect warnings during compilation (default: true).
    pub collect_warnings: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            strict_mode: false,
            max_recursion_depth: 16,
            max_stream_bytes: 100 * 1024 * 1024,
            collect_warnings: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- ContentError display ---

    #[test]
    fn content_error_syntax_display() {
        let err = ContentError::Syntax("unterminated string".to_string());
        assert_eq!(err.to_string(), "syntax error: unterminated string");
    }

    #[test]
    fn content_error_illegal_token_display() {
        let err = ContentError::IllegalToken {
            token: "]".to_string(),
            offset: 42,
        };
        assert_eq!(err.to_string(), "illegal token \"]\" at offset 42");
    }

    #[test]
    fn content_error_wrong_type_display() {
        let err = ContentError::WrongType {
            expected: "number",
            found: "name",
        };
        assert_eq!(
            err.to_string(),
            "operand type mismatch: expected number, found name"
        );
    }

    #[test]
    fn content_error_missing_resource_display() {
        let err = ContentError::MissingResource {
            kind: "Font",
            name: "F1".to_string(),
        };
        assert_eq!(err.to_string(), "missing Font resource /F1");
    }

    #[test]
    fn content_error_recursion_limit_display() {
        let err = ContentError::RecursionLimit {
            depth: 17,
            limit: 16,
        };
        assert_eq!(err.to_string(), "recursion depth 17 exceeds limit 16");
    }

    #[test]
    fn content_error_implements_std_error() {
        let err: Box<dyn std::error::Error> =
            Box::new(ContentError::Other("test".to_string()));
        assert!(err.to_string().contains("test"));
    }

    // --- Warning codes ---

    #[test]
    fn warning_code_tags() {
        assert_eq!(CompileWarningCode::IgnoredOperator.as_str(), "IGNORED_OPERATOR");
        assert_eq!(CompileWarningCode::OperandMismatch.as_str(), "OPERAND_MISMATCH");
        assert_eq!(
            CompileWarningCode::UnbalancedRestore.as_str(),
            "UNBALANCED_RESTORE"
        );
        assert_eq!(
            CompileWarningCode::UnterminatedSection.as_str(),
            "UNTERMINATED_SECTION"
        );
        assert_eq!(CompileWarningCode::ResyncPerformed.as_str(), "RESYNC_PERFORMED");
        assert_eq!(
            CompileWarningCode::Other("custom".to_string()).as_str(),
            "OTHER"
        );
    }

    // --- Warning construction and display ---

    #[test]
    fn warning_new_defaults_to_other() {
        let w = CompileWarning::new("something odd");
        assert_eq!(w.code, CompileWarningCode::Other("something odd".to_string()));
        assert!(w.operator.is_none());
        assert!(w.offset.is_none());
    }

    #[test]
    fn warning_at_operator_display() {
        let w = CompileWarning::at_operator(
            CompileWarningCode::IgnoredOperator,
            "unknown operator",
            "XYZ",
            17,
        );
        assert_eq!(
            w.to_string(),
            "[IGNORED_OPERATOR] unknown operator [operator XYZ] [offset 17]"
        );
    }

    #[test]
    fn warning_with_code_display() {
        let w = CompileWarning::with_code(CompileWarningCode::UnbalancedRestore, "bare Q");
        assert_eq!(w.to_string(), "[UNBALANCED_RESTORE] bare Q");
    }

    // --- Options ---

    #[test]
    fn options_defaults() {
        let opts = CompileOptions::default();
        assert!(!opts.strict_mode);
        assert_eq!(opts.max_recursion_depth, 16);
        assert_eq!(opts.max_stream_bytes, 100 * 1024 * 1024);
        assert!(opts.collect_warnings);
    }

    #[test]
    fn options_custom_values() {
        let opts = CompileOptions {
            strict_mode: true,
            max_recursion_depth: 4,
            max_stream_bytes: 1024,
            collect_warnings: false,
        };
        assert!(opts.strict_mode);
        assert_eq!(opts.max_recursion_depth, 4);
        assert_eq!(opts.max_stream_bytes, 1024);
        assert!(!opts.collect_warnings);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn warning_serde_round_trip() {
        let w = CompileWarning::at_operator(
            CompileWarningCode::OperandMismatch,
            "expected 2 operands",
            "Td",
            9,
        );
        let json = serde_json::to_string(&w).unwrap();
        let back: CompileWarning = serde_json::from_str(&json).unwrap();
        assert_eq!(w, back);
    }
}
