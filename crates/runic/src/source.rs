use std::{borrow::Cow, io, path::Path};

/// A named input buffer. The content always ends with a newline; one is
/// appended on construction when missing, so the lexer never has to guard
/// byte lookahead at the very end of a token.
#[derive(Clone, Debug)]
pub struct SourceFile {
    pub name: String,
    text: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, text: impl Into<Vec<u8>>) -> SourceFile {
        let mut text = text.into();
        if text.last() != Some(&b'\n') {
            text.push(b'\n');
        }
        SourceFile {
            name: name.into(),
            text,
        }
    }

    pub fn read(path: &Path) -> io::Result<SourceFile> {
        let text = std::fs::read(path)?;
        Ok(SourceFile::new(path.display().to_string(), text))
    }

    pub fn text(&self) -> &[u8] {
        &self.text
    }

    pub fn len(&self) -> u32 {
        self.text.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// The bytes covered by a location, clamped to the buffer.
    pub fn slice(&self, loc: Location) -> &[u8] {
        let start = (loc.pos as usize).min(self.text.len());
        let end = (loc.pos as usize + loc.len as usize).min(self.text.len());
        &self.text[start..end]
    }

    pub fn slice_str(&self, loc: Location) -> Cow<'_, str> {
        String::from_utf8_lossy(self.slice(loc))
    }
}

/// A byte span plus the 1-indexed line it starts on. Diagnostics only; the
/// engine keys everything by token index, never by location.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct Location {
    pub pos: u32,
    pub len: u32,
    pub line: u32,
}

impl Location {
    pub fn new(pos: u32, len: u32, line: u32) -> Location {
        Location { pos, len, line }
    }

    pub fn end(self) -> u32 {
        self.pos + self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_missing_newline() {
        let file = SourceFile::new("t", "abc");
        assert_eq!(file.text(), b"abc\n");
        let file = SourceFile::new("t", "abc\n");
        assert_eq!(file.text(), b"abc\n");
    }

    #[test]
    fn empty_input_becomes_single_newline() {
        let file = SourceFile::new("t", "");
        assert_eq!(file.text(), b"\n");
    }

    #[test]
    fn slice_is_clamped() {
        let file = SourceFile::new("t", "hello");
        assert_eq!(file.slice(Location::new(0, 5, 1)), b"hello");
        assert_eq!(file.slice(Location::new(3, 100, 1)), b"lo\n");
        assert_eq!(file.slice_str(Location::new(0, 2, 1)), "he");
    }
}
