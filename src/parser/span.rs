use std::fmt;

/// Represents a location in source code
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Location {
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed)
    pub column: usize,
    /// Byte offset from start of input
    pub offset: usize,
}

impl Location {
    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Self { line, column, offset }
    }

    /// Location of the first character of an input
    pub fn start() -> Self {
        Self { line: 1, column: 1, offset: 0 }
    }

    pub fn to(&self, end: Location) -> Span {
        Span::new(*self, end)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Represents a span of source code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// Start location (inclusive)
    pub start: Location,
    /// End location (exclusive)
    pub end: Location,
}

impl Span {
    pub fn new(start: Location, end: Location) -> Self {
        Self { start, end }
    }

    pub fn single(location: Location) -> Self {
        Self { start: location, end: location }
    }

    pub fn len(&self) -> usize {
        self.end.offset.saturating_sub(self.start.offset)
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Smallest span covering both `self` and `other`
    pub fn merge(&self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn source_text<'a>(&self, source: &'a str) -> &'a str {
        if self.start.offset >= source.len() {
            return "";
        }
        let end_offset = self.end.offset.min(source.len());
        &source[self.start.offset..end_offset]
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start.line == self.end.line {
            write!(f, "{}:{}-{}", self.start.line, self.start.column, self.end.column)
        } else {
            write!(f, "{}:{}-{}:{}", self.start.line, self.start.column, self.end.line, self.end.column)
        }
    }
}

/// Trait for syntax nodes that know where they came from
pub trait HasSpan {
    fn span(&self) -> Span;

    fn location(&self) -> Location {
        self.span().start
    }
}

impl HasSpan for Span {
    fn span(&self) -> Span {
        *self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_covers_both_spans() {
        let a = Span::new(Location::new(1, 1, 0), Location::new(1, 4, 3));
        let b = Span::new(Location::new(2, 1, 10), Location::new(2, 6, 15));
        let m = a.merge(b);
        assert_eq!(m.start.offset, 0);
        assert_eq!(m.end.offset, 15);
        assert_eq!(m.len(), 15);
    }

    #[test]
    fn source_text_is_clamped() {
        let span = Span::new(Location::new(1, 3, 2), Location::new(1, 99, 99));
        assert_eq!(span.source_text("abcdef"), "cdef");
    }
}
