use std::borrow::Cow;

use num_bigint::BigInt;

use crate::{
    keytab::{Keytab, KeywordHandle},
    source::{Location, SourceFile},
};

/// Token classes. The discriminant doubles as the index into per-rule
/// FIRST-token bitmaps, so the order is part of the wire-in-memory contract.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u16)]
pub enum TokenKind {
    Keyword,
    Ident,
    Integer,
    Float,
    Bool,
    Str,
    /// Single-quoted string; produced only while reading `.syn` files.
    WeakStr,
    Eof,
    RandUint,
    IntType,
    UintType,
}

impl TokenKind {
    pub const COUNT: usize = 11;

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// The reserved grammar keyword naming this token class, where one
    /// exists (`INTEGER`, `IDENT`, ...). Used by the grammar printer.
    pub fn grammar_name(self) -> &'static str {
        match self {
            TokenKind::Eof => "EOF",
            TokenKind::Ident => "IDENT",
            TokenKind::Integer => "INTEGER",
            TokenKind::Float => "FLOAT",
            TokenKind::Str => "STRING",
            TokenKind::RandUint => "RANDUINT",
            TokenKind::IntType => "INTTYPE",
            TokenKind::UintType => "UINTTYPE",
            TokenKind::Keyword => "KEYWORD",
            TokenKind::WeakStr => "WEAKSTRING",
            TokenKind::Bool => "BOOL",
        }
    }
}

/// A fixed-width set of token classes; the FIRST-token bitmap of a rule.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct TokenSet(u16);

impl TokenSet {
    pub fn new() -> TokenSet {
        TokenSet::default()
    }
    pub fn insert(&mut self, kind: TokenKind) {
        self.0 |= 1 << kind.index();
    }
    pub fn contains(self, kind: TokenKind) -> bool {
        self.0 & (1 << kind.index()) != 0
    }
    pub fn union_with(&mut self, other: TokenSet) {
        self.0 |= other.0;
    }
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Payload of a token. String bodies stay raw bytes: escape sequences may
/// produce content that is not UTF-8.
#[derive(Clone, Debug, PartialEq)]
pub enum TokenValue {
    None,
    Ident(String),
    Integer(BigInt),
    Float(f64),
    Bool(bool),
    Str(Vec<u8>),
    /// Bit width of a `u<N>` / `i<N>` / `rand<N>` type token.
    Width(BigInt),
}

#[derive(Clone, Debug)]
pub struct Token {
    pub kind: TokenKind,
    pub loc: Location,
    /// Set for `TokenKind::Keyword` tokens only.
    pub keyword: Option<KeywordHandle>,
    pub value: TokenValue,
}

impl Token {
    pub fn new(kind: TokenKind, loc: Location, value: TokenValue) -> Token {
        Token {
            kind,
            loc,
            keyword: None,
            value,
        }
    }

    pub fn keyword(keyword: KeywordHandle, loc: Location) -> Token {
        Token {
            kind: TokenKind::Keyword,
            loc,
            keyword: Some(keyword),
            value: TokenValue::None,
        }
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }

    /// True when this token is the keyword spelled `name`.
    pub fn is_keyword(&self, name: &str, keytab: &Keytab) -> bool {
        match self.keyword {
            Some(keyword) => keytab.name(keyword) == name,
            None => false,
        }
    }

    pub fn ident(&self) -> Option<&str> {
        match &self.value {
            TokenValue::Ident(name) => Some(name),
            _ => None,
        }
    }

    pub fn integer(&self) -> Option<&BigInt> {
        match &self.value {
            TokenValue::Integer(value) => Some(value),
            _ => None,
        }
    }

    /// The verbatim source text of this token, `"EOF"` for the EOF token.
    pub fn text<'a>(&self, source: &'a SourceFile) -> Cow<'a, str> {
        if self.kind == TokenKind::Eof {
            return Cow::Borrowed("EOF");
        }
        source.slice_str(self.loc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_set_basics() {
        let mut set = TokenSet::new();
        assert!(set.is_empty());
        set.insert(TokenKind::Integer);
        set.insert(TokenKind::UintType);
        assert!(set.contains(TokenKind::Integer));
        assert!(set.contains(TokenKind::UintType));
        assert!(!set.contains(TokenKind::Ident));

        let mut other = TokenSet::new();
        other.insert(TokenKind::Eof);
        other.union_with(set);
        assert!(other.contains(TokenKind::Eof) && other.contains(TokenKind::Integer));
    }

    #[test]
    fn eof_text() {
        let source = SourceFile::new("t", "x");
        let token = Token::new(TokenKind::Eof, Location::new(1, 0, 1), TokenValue::None);
        assert_eq!(token.text(&source), "EOF");
    }

    #[test]
    fn keyword_accessor() {
        let mut keytab = Keytab::new();
        let kw = keytab.intern("if");
        let token = Token::keyword(kw, Location::new(0, 2, 1));
        assert!(token.is_keyword("if", &keytab));
        assert!(!token.is_keyword("else", &keytab));

        let eof = Token::new(TokenKind::Eof, Location::default(), TokenValue::None);
        assert!(!eof.is_keyword("if", &keytab));
    }
}
