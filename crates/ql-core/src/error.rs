use crate::types::SourceSpan;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
#[error("{code}: {message}")]
pub struct QuestError {
    pub code: String,
    pub message: String,
    pub span: Option<SourceSpan>,
}

impl QuestError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            span: None,
        }
    }

    pub fn with_span(
        code: impl Into<String>,
        message: impl Into<String>,
        span: SourceSpan,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            span: Some(span),
        }
    }

    /// Attaches a span when one is known, leaving the error untouched otherwise.
    pub fn at(mut self, span: Option<&SourceSpan>) -> Self {
        if self.span.is_none() {
            self.span = span.cloned();
        }
        self
    }
}
