use miette::Diagnostic;
use smol_str::SmolStr;
use thiserror::Error as ThisError;

/// One failure shape per origin: parse-time shape violations caught by
/// validate, coercion and type mismatches raised by render/compile, and
/// failures reported by host-registered kinds (via [`Error::message`]).
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum ErrorKind {
    #[error("too many children for `{symbol}`: at most {max} allowed, found {found}")]
    TooManyChildren {
        symbol: SmolStr,
        max: usize,
        found: usize,
    },
    #[error("missing operand {index} for `{symbol}`")]
    MissingOperand { symbol: SmolStr, index: usize },
    #[error("operand of `{symbol}` did not evaluate to a value")]
    UnexpectedStructural { symbol: SmolStr },
    #[error("invalid operand types for `{symbol}`: {lhs} and {rhs}")]
    InvalidOperands {
        symbol: SmolStr,
        lhs: &'static str,
        rhs: &'static str,
    },
    #[error("arithmetic error in `{symbol}`")]
    Arithmetic { symbol: SmolStr },
    #[error("`{symbol}` cannot be lowered: no compile rule registered")]
    CompileUnsupported { symbol: SmolStr },
    #[error("{0}")]
    Message(String),
}

/// A template-authoring diagnostic, carrying the source position of the node
/// that raised it.
///
/// Every raise aborts the current render/compile/optimize call and propagates
/// to the embedding boundary; the core never retries or substitutes defaults.
/// Caller contract violations (leaf accessors on structural nodes) panic
/// instead — they are programmer errors, not diagnostics.
#[derive(Debug, Clone, PartialEq, ThisError)]
#[error("{kind}")]
pub struct Error {
    pub kind: ErrorKind,
    pub line: u32,
    pub column: u32,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self::at(0, 0, kind)
    }

    pub fn at(line: u32, column: u32, kind: ErrorKind) -> Self {
        Error { kind, line, column }
    }

    /// Free-form diagnostic, the escape hatch for host-registered kinds and
    /// driver contexts.
    pub fn message(line: u32, column: u32, message: impl Into<String>) -> Self {
        Self::at(line, column, ErrorKind::Message(message.into()))
    }
}

impl Diagnostic for Error {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let code = match self.kind {
            ErrorKind::TooManyChildren { .. } => "stencil_core::too_many_children",
            ErrorKind::MissingOperand { .. } => "stencil_core::missing_operand",
            ErrorKind::UnexpectedStructural { .. } => "stencil_core::unexpected_structural",
            ErrorKind::InvalidOperands { .. } => "stencil_core::invalid_operands",
            ErrorKind::Arithmetic { .. } => "stencil_core::arithmetic",
            ErrorKind::CompileUnsupported { .. } => "stencil_core::compile_unsupported",
            ErrorKind::Message(_) => "stencil_core::message",
        };
        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let help = match &self.kind {
            ErrorKind::TooManyChildren { symbol, max, .. } => Some(format!(
                "`{symbol}` accepts at most {max} operands. Check the construct's argument list."
            )),
            ErrorKind::MissingOperand { symbol, index } => Some(format!(
                "`{symbol}` requires an operand at position {index}."
            )),
            ErrorKind::UnexpectedStructural { .. } => {
                Some("An operand could not be reduced to a value.".to_string())
            }
            ErrorKind::InvalidOperands { .. } => {
                Some("Check the types of the operands.".to_string())
            }
            ErrorKind::Arithmetic { .. } => {
                Some("Division by zero or integer overflow.".to_string())
            }
            ErrorKind::CompileUnsupported { symbol } => Some(format!(
                "Register a compile rule for `{symbol}` or render it instead."
            )),
            ErrorKind::Message(_) => None,
        };
        help.map(|h| Box::new(h) as Box<dyn std::fmt::Display>)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(
        ErrorKind::TooManyChildren { symbol: "(".into(), max: 1, found: 2 },
        "too many children for `(`: at most 1 allowed, found 2"
    )]
    #[case(
        ErrorKind::MissingOperand { symbol: "+".into(), index: 1 },
        "missing operand 1 for `+`"
    )]
    #[case(
        ErrorKind::InvalidOperands { symbol: "+".into(), lhs: "string", rhs: "int" },
        "invalid operand types for `+`: string and int"
    )]
    #[case(ErrorKind::Message("boom".to_string()), "boom")]
    fn test_error_display(#[case] kind: ErrorKind, #[case] expected: &str) {
        let error = Error::at(1, 2, kind);
        assert_eq!(error.to_string(), expected);
        assert_eq!((error.line, error.column), (1, 2));
    }

    #[test]
    fn test_diagnostic_code_and_help() {
        let error = Error::new(ErrorKind::Arithmetic { symbol: "/".into() });
        assert_eq!(
            error.code().map(|c| c.to_string()),
            Some("stencil_core::arithmetic".to_string())
        );
        assert!(error.help().is_some());

        let custom = Error::message(0, 0, "host failure");
        assert!(custom.help().is_none());
    }
}
