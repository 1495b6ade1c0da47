//! Byte-offset source locations.
//!
//! A comparison run loads exactly two files and parses each on its
//! own, so a span carries offsets only; which file it points into
//! travels alongside it (the pipeline's `file_index`, the diagnostic
//! renderer's filename argument).

/// A half-open byte range into one source file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn dummy() -> Self {
        Self { start: 0, end: 0 }
    }

    /// The smallest span covering both, e.g. a statement built from a
    /// loop header and its indented body.
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// A value annotated with its source span.
#[derive(Clone, Debug)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }

    pub fn dummy(node: T) -> Self {
        Self {
            node,
            span: Span::dummy(),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Spanned<U> {
        Spanned {
            node: f(self.node),
            span: self.span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_covers_header_and_body() {
        let header = Span::new(10, 19);
        let body = Span::new(24, 40);
        assert_eq!(header.merge(body), Span::new(10, 40));
        assert_eq!(body.merge(header), Span::new(10, 40));
    }

    #[test]
    fn test_merge_of_nested_spans_keeps_the_outer() {
        let outer = Span::new(0, 50);
        let inner = Span::new(12, 20);
        assert_eq!(outer.merge(inner), outer);
    }

    #[test]
    fn test_map_keeps_the_span() {
        let name = Spanned::new("fact_it".to_string(), Span::new(4, 11));
        let len = name.map(|n| n.len());
        assert_eq!(len.node, 7);
        assert_eq!(len.span, Span::new(4, 11));
    }
}
