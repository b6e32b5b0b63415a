//! Evaluation diagnostics.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Byte range in the pattern text.
pub type Span = Range<usize>;

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Informational note
    Info,
    /// Suspicious but accepted
    Warning,
    /// Prevents evaluation
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => f.write_str("INFO"),
            Severity::Warning => f.write_str("WARNING"),
            Severity::Error => f.write_str("ERROR"),
        }
    }
}

/// One-based line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Line number
    pub line: usize,
    /// Column number, counted in characters
    pub column: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A message about the pattern text, surfaced verbatim to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Severity
    pub severity: Severity,
    /// Message text
    pub message: String,
    /// Position in the pattern text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    /// Underlying cause
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl Diagnostic {
    /// Error diagnostic
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            location: None,
            cause: None,
        }
    }

    /// Warning diagnostic
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(message)
        }
    }

    /// Attach a location
    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Attach a cause
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// True for error severity
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.severity)?;
        if let Some(location) = self.location {
            write!(f, " ({location})")?;
        }
        write!(f, ": {}", self.message)?;
        if let Some(cause) = &self.cause {
            write!(f, "\n    {cause}")?;
        }
        Ok(())
    }
}

/// Maps byte offsets to line/column positions.
#[derive(Debug, Clone)]
pub struct LineIndex<'src> {
    source: &'src str,
    line_starts: Vec<usize>,
}

impl<'src> LineIndex<'src> {
    /// Index a source text
    pub fn new(source: &'src str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            source,
            line_starts,
        }
    }

    /// Location of a byte offset
    pub fn locate(&self, offset: usize) -> SourceLocation {
        let offset = offset.min(self.source.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let start = self.line_starts[line];
        let column = self
            .source
            .get(start..offset)
            .map_or(offset - start, |prefix| prefix.chars().count());

        SourceLocation {
            line: line + 1,
            column: column + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_index() {
        let index = LineIndex::new("ab\ncd\n\nx");

        assert_eq!(index.locate(0), SourceLocation { line: 1, column: 1 });
        assert_eq!(index.locate(4), SourceLocation { line: 2, column: 2 });
        assert_eq!(index.locate(6), SourceLocation { line: 3, column: 1 });
        assert_eq!(index.locate(7), SourceLocation { line: 4, column: 1 });
        assert_eq!(index.locate(100), SourceLocation { line: 4, column: 2 });
    }

    #[test]
    fn test_diagnostic_display() {
        let diagnostic = Diagnostic::error("Unresolved reference: foo")
            .at(SourceLocation { line: 2, column: 5 })
            .with_cause("no such name");

        assert_eq!(
            diagnostic.to_string(),
            "ERROR (2:5): Unresolved reference: foo\n    no such name"
        );
        assert!(!Diagnostic::warning("unused").is_error());
    }
}
