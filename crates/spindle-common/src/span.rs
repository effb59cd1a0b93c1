use std::ops::Range;

/// A location in a narrative script: the file and the 1-based source line.
///
/// Statement trees arrive from the reader with line numbers only, so a span
/// here never carries columns. Renderers that need byte offsets recover them
/// with [`Span::byte_range`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Span {
    /// Script file path as given in the reader bundle.
    pub file: String,
    /// 1-based line number, 0 when unknown.
    pub line: u32,
}

impl Span {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    /// Create a dummy span for compiler-generated nodes.
    pub fn dummy() -> Self {
        Self::default()
    }

    pub fn is_dummy(&self) -> bool {
        self.file.is_empty() && self.line == 0
    }

    /// Byte range of this span's line within `source`, without the line break.
    ///
    /// Returns `None` when the line lies outside the source.
    pub fn byte_range(&self, source: &str) -> Option<Range<usize>> {
        if self.line == 0 {
            return None;
        }
        let mut offset = 0;
        for (index, text) in source.split_inclusive('\n').enumerate() {
            if index + 1 == self.line as usize {
                let trimmed = text.trim_end_matches(['\n', '\r']);
                return Some(offset..offset + trimmed.len());
            }
            offset += text.len();
        }
        None
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_shows_file_and_line() {
        assert_eq!(Span::new("intro.yarn", 12).to_string(), "intro.yarn:12");
    }

    #[test]
    fn byte_range_finds_line() {
        let source = "title: Start\n---\nMae: Hello\r\n===\n";
        let span = Span::new("a.yarn", 3);
        let range = span.byte_range(source).unwrap();
        assert_eq!(&source[range], "Mae: Hello");
    }

    #[test]
    fn byte_range_out_of_bounds() {
        assert!(Span::new("a.yarn", 9).byte_range("one\ntwo").is_none());
        assert!(Span::dummy().byte_range("one").is_none());
    }
}
