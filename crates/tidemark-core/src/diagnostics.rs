//! Warnings and errors surfaced by the diagnostics-carrying parse API.

use serde::{Deserialize, Serialize};

use crate::document::Document;

/// A parsed document bundled with whatever diagnostics the parse produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseResult {
    pub document: Document,
    pub diagnostics: ParseDiagnostics,
}

impl ParseResult {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            diagnostics: ParseDiagnostics::default(),
        }
    }
}

/// Diagnostics collected during one parse pass.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParseDiagnostics {
    pub warnings: Vec<ParseWarning>,
    pub errors: Vec<ParseError>,
}

impl ParseDiagnostics {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Non-fatal structural anomaly. The parse still yields a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParseWarning {
    /// Nesting went past the configured limit; the oversized subtree
    /// was truncated.
    DepthLimitExceeded {
        max_tree_depth: usize,
        /// The depth the input actually reached.
        exceeded_depth: usize,
    },
}

/// Fatal failure. The diagnostics-carrying API catches these and returns
/// an empty document instead of propagating.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ParseError {
    #[error("parser failure: {message}")]
    ParserFailure { message: String },
}
