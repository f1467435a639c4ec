use std::fmt;

use thiserror::Error;

use crate::parser::span::Location;

/// Result type for jembed operations
pub type Result<T> = std::result::Result<T, Error>;

/// The five diagnostic families a compilation can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    Lexical,
    Syntax,
    Semantic,
    ClassNotFound,
    Internal,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticKind::Lexical => "lexical error",
            DiagnosticKind::Syntax => "syntax error",
            DiagnosticKind::Semantic => "semantic error",
            DiagnosticKind::ClassNotFound => "class not found",
            DiagnosticKind::Internal => "internal compiler error",
        };
        f.write_str(name)
    }
}

/// One entry of the ordered diagnostic list produced in batch mode.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub line: usize,
    pub column: usize,
    /// Conflicting overload candidates, if any
    pub candidates: Vec<String>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}: {}", self.line, self.column, self.kind, self.message)?;
        for candidate in &self.candidates {
            write!(f, "\n    candidate: {}", candidate)?;
        }
        Ok(())
    }
}

/// Error types for the jembed compiler
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Lexical error at line {}, column {}: {message}", .location.line, .location.column)]
    Lexical { message: String, location: Location },

    #[error("Syntax error at line {}, column {}: expected {expected}, found {found}", .location.line, .location.column)]
    Syntax {
        expected: String,
        found: String,
        location: Location,
    },

    #[error("Semantic error at line {}, column {}: {message}", .location.line, .location.column)]
    Semantic {
        message: String,
        location: Location,
        candidates: Vec<String>,
    },

    #[error("Class not found: {name}")]
    ClassNotFound { name: String },

    #[error("Malformed class file: {message}")]
    ClassFormat { message: String },

    #[error("Internal compiler error: {message}")]
    Internal { message: String },

    #[error("{} error(s):\n{}", .0.len(), render_diagnostics(.0))]
    Diagnostics(Vec<Diagnostic>),
}

fn render_diagnostics(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

impl Error {
    pub fn lexical(message: impl Into<String>, location: Location) -> Self {
        Self::Lexical { message: message.into(), location }
    }

    pub fn syntax(expected: impl Into<String>, found: impl Into<String>, location: Location) -> Self {
        Self::Syntax {
            expected: expected.into(),
            found: found.into(),
            location,
        }
    }

    pub fn semantic(message: impl Into<String>, location: Location) -> Self {
        Self::Semantic {
            message: message.into(),
            location,
            candidates: Vec::new(),
        }
    }

    pub fn ambiguous(message: impl Into<String>, location: Location, candidates: Vec<String>) -> Self {
        Self::Semantic {
            message: message.into(),
            location,
            candidates,
        }
    }

    pub fn class_not_found(name: impl Into<String>) -> Self {
        Self::ClassNotFound { name: name.into() }
    }

    pub fn class_format(message: impl Into<String>) -> Self {
        Self::ClassFormat { message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        log::error!("internal compiler error: {}", message);
        Self::Internal { message }
    }

    pub fn kind(&self) -> DiagnosticKind {
        match self {
            Error::Lexical { .. } => DiagnosticKind::Lexical,
            Error::Syntax { .. } => DiagnosticKind::Syntax,
            Error::Semantic { .. } => DiagnosticKind::Semantic,
            Error::ClassNotFound { .. } | Error::ClassFormat { .. } | Error::Io(_) => DiagnosticKind::ClassNotFound,
            Error::Internal { .. } => DiagnosticKind::Internal,
            Error::Diagnostics(list) => list.first().map(|d| d.kind).unwrap_or(DiagnosticKind::Internal),
        }
    }

    /// Source position of the error, when it has one.
    pub fn location(&self) -> Option<Location> {
        match self {
            Error::Lexical { location, .. }
            | Error::Syntax { location, .. }
            | Error::Semantic { location, .. } => Some(*location),
            _ => None,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.kind() == DiagnosticKind::Internal
    }

    /// Flattens this error into the ordered `{kind, message, line, column}` list.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        match self {
            Error::Diagnostics(list) => list.clone(),
            other => vec![other.to_diagnostic()],
        }
    }

    fn to_diagnostic(&self) -> Diagnostic {
        let (line, column) = self
            .location()
            .map(|l| (l.line, l.column))
            .unwrap_or((0, 0));
        let message = match self {
            Error::Lexical { message, .. } | Error::Semantic { message, .. } => message.clone(),
            Error::Syntax { expected, found, .. } => format!("expected {}, found {}", expected, found),
            Error::ClassNotFound { name } => format!("cannot find class {}", name),
            Error::ClassFormat { message } | Error::Internal { message } => message.clone(),
            Error::Io(e) => e.to_string(),
            Error::Diagnostics(_) => self.to_string(),
        };
        let candidates = match self {
            Error::Semantic { candidates, .. } => candidates.clone(),
            _ => Vec::new(),
        };
        Diagnostic {
            kind: self.kind(),
            message,
            line,
            column,
            candidates,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn semantic_error_flattens_to_one_diagnostic() {
        let err = Error::semantic("cannot find symbol: x", Location::new(3, 7, 40));
        let diags = err.diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].kind, DiagnosticKind::Semantic);
        assert_eq!((diags[0].line, diags[0].column), (3, 7));
        assert!(err.to_string().contains("line 3, column 7"));
    }

    #[test]
    fn class_not_found_has_no_position() {
        let err = Error::class_not_found("a.b.C");
        assert_eq!(err.kind(), DiagnosticKind::ClassNotFound);
        assert!(err.location().is_none());
    }
}
