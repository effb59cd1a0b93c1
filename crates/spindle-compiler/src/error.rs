use spindle_common::{Diagnostic, Span};
use thiserror::Error;

/// Errors raised while lowering a statement tree.
///
/// Every variant names the node (conversation) and source line it came from.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    /// Token arity mismatch, or a fragment count other than expected after
    /// expression codegen. Fatal for the whole source unit.
    #[error("malformed expression in node '{conversation}' at line {line}: {message}")]
    MalformedExpression {
        conversation: String,
        line: u32,
        message: String,
    },

    /// A statement appeared outside its valid structural position.
    /// Fatal for the whole source unit.
    #[error("invalid statement tree in node '{conversation}' at line {line}: {message}")]
    InvalidAst {
        conversation: String,
        line: u32,
        message: String,
    },

    /// A recognized construct that cannot be expressed in the dialogue graph.
    /// Only the offending conversation is dropped.
    #[error("unsupported construct in node '{conversation}' at line {line}: {message}")]
    Unsupported {
        conversation: String,
        line: u32,
        message: String,
    },
}

impl CompileError {
    pub fn conversation(&self) -> &str {
        match self {
            CompileError::MalformedExpression { conversation, .. }
            | CompileError::InvalidAst { conversation, .. }
            | CompileError::Unsupported { conversation, .. } => conversation,
        }
    }

    pub fn line(&self) -> u32 {
        match self {
            CompileError::MalformedExpression { line, .. }
            | CompileError::InvalidAst { line, .. }
            | CompileError::Unsupported { line, .. } => *line,
        }
    }

    /// Whether the error aborts every conversation of its source unit.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, CompileError::Unsupported { .. })
    }

    pub fn to_diagnostic(&self, file: &str) -> Diagnostic {
        let message = match self {
            CompileError::MalformedExpression { message, .. } => {
                format!("malformed expression: {}", message)
            }
            CompileError::InvalidAst { message, .. } => {
                format!("invalid statement tree: {}", message)
            }
            CompileError::Unsupported { message, .. } => message.clone(),
        };
        Diagnostic::error(message)
            .with_conversation(self.conversation())
            .with_span(Span::new(file, self.line()))
    }
}

/// Error produced by expression codegen before the statement context is known.
/// Lowering attaches the node name and line via [`ExprError::at`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("{0}")]
    Malformed(String),
    #[error("{0}")]
    Unsupported(String),
}

impl ExprError {
    pub fn at(self, conversation: &str, line: u32) -> CompileError {
        match self {
            ExprError::Malformed(message) => CompileError::MalformedExpression {
                conversation: conversation.to_string(),
                line,
                message,
            },
            ExprError::Unsupported(message) => CompileError::Unsupported {
                conversation: conversation.to_string(),
                line,
                message,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;
