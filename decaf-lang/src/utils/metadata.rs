pub type Span = std::ops::Range<usize>;

/// A span tied to the file it came from, as ariadne wants it.
#[derive(Clone, Debug, PartialEq)]
pub struct Location {
    pub span: Span,
    pub path: String,
}

impl Location {
    pub fn new(span: Span, path: &str) -> Self {
        Self {
            span,
            path: path.to_string(),
        }
    }
}

impl ariadne::Span for Location {
    type SourceId = String;

    fn source(&self) -> &Self::SourceId {
        &self.path
    }

    fn start(&self) -> usize {
        self.span.start
    }

    fn end(&self) -> usize {
        self.span.end
    }
}

pub(crate) const ANONYMOUS_SOURCE: &str = "(anonymous)";
