use thiserror::Error;

pub type Result<T, E = ExpressionError> = std::result::Result<T, E>;

/// Every way configuring, parsing or evaluating an expression can fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpressionError {
    /// A registration conflicts with an existing one or uses an invalid label.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The input contains text that starts no literal, identifier or known symbol.
    #[error("lex error at offset {offset}: {message}")]
    Lex { offset: usize, message: String },

    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    /// An operator or function received the wrong number of operands.
    #[error("`{label}` expects {expected} operand(s) but got {found}{}", at_offset(.offset))]
    Arity {
        label: String,
        expected: usize,
        found: usize,
        offset: Option<usize>,
    },

    #[error("unknown symbol `{symbol}` at offset {offset}")]
    UnknownSymbol { symbol: String, offset: usize },

    #[error("variable `{0}` is not bound")]
    UnboundVariable(String),

    #[error("invalid expression: nothing to evaluate")]
    InvalidExpression,

    /// A domain compute function rejected its inputs.
    #[error("`{label}` failed: {message}")]
    Compute { label: String, message: String },
}

fn at_offset(offset: &Option<usize>) -> String {
    offset
        .map(|offset| format!(" at offset {}", offset))
        .unwrap_or_default()
}

impl ExpressionError {
    pub(crate) fn syntax(offset: usize, message: impl Into<String>) -> Self {
        ExpressionError::Syntax {
            offset,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity_message_mentions_offset_only_when_known() {
        let at_parse = ExpressionError::Arity {
            label: "+".to_string(),
            expected: 2,
            found: 1,
            offset: Some(4),
        };
        assert_eq!(
            at_parse.to_string(),
            "`+` expects 2 operand(s) but got 1 at offset 4"
        );

        let at_eval = ExpressionError::Arity {
            label: "log".to_string(),
            expected: 2,
            found: 3,
            offset: None,
        };
        assert_eq!(at_eval.to_string(), "`log` expects 2 operand(s) but got 3");
    }
}
