use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::{
    chars::{self, Char},
    error::Error,
    keytab::Keytab,
    source::{Location, SourceFile},
    token::{Token, TokenKind, TokenValue},
};

/// The tokenizer. One lexer instance walks one [`SourceFile`] against one
/// keyword table; the grammar compiler and the PEG engine each attach their
/// own.
///
/// Newlines are tokens, not whitespace: every keytab carries the synthetic
/// `"\n"` keyword and [`Lexer::next_token`] emits it, bumping the line
/// counter as the only place line numbers advance.
pub struct Lexer<'a> {
    file: &'a SourceFile,
    keytab: &'a Keytab,
    pos: u32,
    len: u32,
    line: u32,
    start: u32,
    pub allow_ident_underscores: bool,
    pub use_weak_strings: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(file: &'a SourceFile, keytab: &'a Keytab) -> Lexer<'a> {
        Lexer {
            file,
            keytab,
            pos: 0,
            len: file.len(),
            line: 1,
            start: 0,
            allow_ident_underscores: false,
            use_weak_strings: false,
        }
    }

    pub fn eof(&self) -> bool {
        self.pos >= self.len
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    /// Reads the next token. At end of input this returns an EOF token, over
    /// and over; it never fails there, so callers may drain freely.
    pub fn next_token(&mut self) -> Result<Token, Error> {
        if self.eof() {
            return Ok(self.eof_token());
        }

        // The file ends in a newline, so after skipping intra-line space a
        // character is always left to dispatch on (a block comment running
        // to the end of input is caught by the validity check below).
        self.skip_space();
        self.start = self.pos;
        let char = self.read_char();
        self.check_valid(char)?;

        let c = self.byte_at(char.pos);
        if c == b'"' || (self.use_weak_strings && c == b'\'') {
            return self.string_token(c);
        } else if c == b'\'' {
            return self.char_literal();
        } else if chars::is_digit(c) {
            return self.number();
        } else if c == b'\\' {
            return Ok(self.escaped_ident());
        }

        if let Some(token) = self.width_type() {
            return Ok(token);
        }

        if self.is_ident_start(char) {
            return Ok(self.ident_or_keyword());
        }

        self.operator()
    }

    pub fn eof_token(&self) -> Token {
        Token::new(
            TokenKind::Eof,
            Location::new(self.len, 0, self.line),
            TokenValue::None,
        )
    }

    fn src(&self) -> &'a [u8] {
        self.file.text()
    }

    fn byte_at(&self, pos: u32) -> u8 {
        self.src().get(pos as usize).copied().unwrap_or(0)
    }

    fn read_char(&mut self) -> Char {
        let char = chars::char_at(self.src(), self.pos);
        self.pos += u32::from(char.len);
        char
    }

    fn check_valid(&self, char: Char) -> Result<(), Error> {
        if !char.valid {
            return Err(self.error("Invalid character"));
        }
        Ok(())
    }

    fn location(&self) -> Location {
        Location::new(self.start, self.pos - self.start, self.line)
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::Lex {
            file: self.file.name.clone(),
            line: self.line,
            message: message.into(),
        }
    }

    // Whitespace and comments.

    /// Skips whitespace and comments, but never newlines.
    fn skip_space(&mut self) {
        self.raw_skip_space();
        loop {
            if self.input_has(b"//") {
                self.skip_line_comment();
            } else if self.input_has(b"/*") {
                self.skip_block_comment();
            } else {
                break;
            }
            self.raw_skip_space();
        }
    }

    fn raw_skip_space(&mut self) {
        while self.pos < self.len && chars::is_whitespace(self.byte_at(self.pos)) {
            self.pos += 1;
        }
    }

    fn skip_line_comment(&mut self) {
        while self.pos < self.len && self.byte_at(self.pos) != b'\n' {
            self.pos += 1;
        }
    }

    /// Block comments nest. Newlines inside are consumed without producing
    /// newline tokens.
    fn skip_block_comment(&mut self) {
        let mut depth = 1;
        self.pos += 2;
        while self.pos < self.len && depth != 0 {
            if self.input_has(b"/*") {
                depth += 1;
                self.pos += 2;
            } else if self.input_has(b"*/") {
                depth -= 1;
                self.pos += 2;
            } else {
                self.pos += 1;
            }
        }
    }

    fn input_has(&self, text: &[u8]) -> bool {
        let pos = self.pos as usize;
        self.src()[pos..].starts_with(text)
    }

    // Strings and character literals.

    fn string_token(&mut self, target: u8) -> Result<Token, Error> {
        let mut body = Vec::new();

        loop {
            if self.eof() {
                return Err(self.error("End of file while reading string"));
            }
            let char = self.read_char();
            let c = self.byte_at(char.pos);
            if c == target {
                break;
            }
            if c == b'\\' {
                body.push(self.escaped_char(target == b'\'')?);
            } else {
                let start = char.pos as usize;
                body.extend_from_slice(&self.src()[start..start + char.len as usize]);
            }
        }

        let kind = if self.use_weak_strings && target == b'\'' {
            TokenKind::WeakStr
        } else {
            TokenKind::Str
        };
        Ok(Token::new(kind, self.location(), TokenValue::Str(body)))
    }

    /// The byte after a backslash. `single_quotes` selects which quote
    /// character may be escaped.
    fn escaped_char(&mut self, single_quotes: bool) -> Result<u8, Error> {
        let char = self.read_char();
        let c = self.byte_at(char.pos);

        let escaped = match c {
            b'a' => 0x07,
            b'b' => 0x08,
            b'e' => 0x1b,
            b'f' => 0x0c,
            b'n' => b'\n',
            b'r' => b'\r',
            b't' => b'\t',
            b'v' => 0x0b,
            b'\\' => b'\\',
            b'"' if !single_quotes => b'"',
            b'\'' if single_quotes => b'\'',
            b'0' => 0,
            b'x' => {
                let hi = self.read_char();
                let lo = self.read_char();
                let hi = self.byte_at(hi.pos);
                let lo = self.byte_at(lo.pos);
                if !chars::is_hex_digit(hi) || !chars::is_hex_digit(lo) {
                    return Err(self.error("Non-hex digit in hexadecimal escape sequence"));
                }
                chars::hex_pair(hi, lo)
            }
            _ => return Err(self.error("Invalid escape sequence")),
        };
        Ok(escaped)
    }

    /// A single-quoted character produces an integer token holding the byte.
    fn char_literal(&mut self) -> Result<Token, Error> {
        let char = self.read_char();
        self.check_valid(char)?;
        if char.len != 1 {
            return Err(self.error("Only single-byte characters can be used in single quotes"));
        }

        let mut c = self.byte_at(char.pos);
        if c == b'\\' {
            c = self.escaped_char(true)?;
        }

        self.expect_byte(b'\'')?;
        Ok(Token::new(
            TokenKind::Integer,
            self.location(),
            TokenValue::Integer(BigInt::from(c)),
        ))
    }

    fn expect_byte(&mut self, expected: u8) -> Result<(), Error> {
        let char = self.read_char();
        let c = self.byte_at(char.pos);
        if c != expected {
            return Err(self.error(format!(
                "Expected {}, got {}",
                expected as char, c as char
            )));
        }
        Ok(())
    }

    // Numbers.

    fn number(&mut self) -> Result<Token, Error> {
        self.pos = self.start;

        let mut value = self.raw_integer();
        if self.pos >= self.len {
            return Ok(self.integer_suffix(value));
        }

        let c = self.byte_at(self.pos);
        if c == b'.' || c == b'f' || c == b'e' || c == b'E' {
            return self.float(value);
        }

        if c == b'x' && self.pos == self.start + 1 && self.byte_at(self.start) == b'0' {
            self.pos += 1;
            value = self.hex_integer();
        }

        Ok(self.integer_suffix(value))
    }

    /// Decimal digits with underscores ignored.
    fn raw_integer(&mut self) -> BigInt {
        let mut value = BigInt::from(0u32);
        while self.pos < self.len {
            let c = self.byte_at(self.pos);
            if chars::is_digit(c) || c == b'_' {
                self.pos += 1;
                if c != b'_' {
                    value = value * 10u32 + u32::from(c - b'0');
                }
            } else {
                break;
            }
        }
        value
    }

    fn hex_integer(&mut self) -> BigInt {
        let mut value = BigInt::from(0u32);
        while self.pos < self.len {
            let c = self.byte_at(self.pos);
            if chars::is_hex_digit(c) || c == b'_' {
                self.pos += 1;
                if c != b'_' {
                    value = value * 16u32 + u32::from(chars::hex_digit(c));
                }
            } else {
                break;
            }
        }
        value
    }

    /// Consumes a trailing `i<N>`/`u<N>` width and throws it away; the token
    /// carries only the value. A width that fails to parse is left in place
    /// for identifier lexing.
    fn integer_suffix(&mut self, value: BigInt) -> Token {
        if self.pos < self.len {
            let c = self.byte_at(self.pos);
            if c == b'i' || c == b'u' {
                let saved = self.pos;
                self.pos += 1;
                if self.width_spec().is_none() {
                    self.pos = saved;
                }
            }
        }
        Token::new(
            TokenKind::Integer,
            self.location(),
            TokenValue::Integer(value),
        )
    }

    /// The `<N>` of a width-bearing token: a nonzero decimal not larger than
    /// 0xFFFF and not running into an identifier character. Anything else is
    /// not a width spec; the caller rewinds.
    fn width_spec(&mut self) -> Option<u32> {
        if self.pos >= self.len {
            return None;
        }
        if !(b'1'..=b'9').contains(&self.byte_at(self.pos)) {
            return None;
        }

        let width = self.raw_integer();
        if width > BigInt::from(0xFFFFu32) {
            return None;
        }

        if self.pos < self.len {
            let char = chars::char_at(self.src(), self.pos);
            if self.is_ident_start(char) {
                return None;
            }
        }

        width.to_u32()
    }

    fn float(&mut self, int_part: BigInt) -> Result<Token, Error> {
        let mut frac = BigInt::from(0u32);
        let mut frac_digits = 0u32;
        let mut exp = 0i32;

        let mut c = self.byte_at(self.pos);
        if c == b'.' {
            self.pos += 1;
            frac_digits = self.count_digits();
            frac = self.raw_integer();
            c = self.byte_at(self.pos);
        }

        if c == b'e' || c == b'E' {
            self.pos += 1;
            let mut negate = false;
            if self.pos < self.len && self.byte_at(self.pos) == b'-' {
                self.pos += 1;
                negate = true;
            }
            if self.pos >= self.len || !chars::is_digit(self.byte_at(self.pos)) {
                return Err(self.error("Missing exponent after 'e' in floating point number"));
            }
            let value = self.raw_integer();
            exp = value.to_i32().unwrap_or(i32::MAX);
            if negate {
                exp = -exp;
            }
            c = self.byte_at(self.pos);
        }

        if c == b'f' {
            self.pos += 1;
            let width = self.raw_integer();
            if width != BigInt::from(32u32) && width != BigInt::from(64u32) {
                return Err(self.error(
                    "Only 32 and 64 bit floating point numbers are currently supported.",
                ));
            }
        }

        let int_float = int_part.to_f64().unwrap_or(f64::MAX);
        let frac_float = frac.to_f64().unwrap_or(f64::MAX);
        let mut value = int_float + frac_float / 10f64.powi(frac_digits as i32);
        value *= 10f64.powi(exp);

        Ok(Token::new(
            TokenKind::Float,
            self.location(),
            TokenValue::Float(value),
        ))
    }

    fn count_digits(&mut self) -> u32 {
        let mut count = 0;
        while self.pos + count < self.len && chars::is_digit(self.byte_at(self.pos + count)) {
            count += 1;
        }
        count
    }

    // Identifiers, keywords, operators.

    fn is_ident_start(&self, char: Char) -> bool {
        let c = self.byte_at(char.pos);
        chars::is_ascii_alpha(c)
            || char.len > 1
            || (self.allow_ident_underscores && (c == b'_' || c == b'$'))
    }

    /// `\name` is always an identifier, even when `name` is a registered
    /// keyword. The backslash is excluded from the name.
    fn escaped_ident(&mut self) -> Token {
        self.start = self.pos;
        while self.pos < self.len {
            let char = self.read_char();
            let c = self.byte_at(char.pos);
            if chars::is_whitespace(c) || c == b'\n' {
                self.pos = char.pos;
                break;
            }
        }

        let name = self.token_text();
        Token::new(TokenKind::Ident, self.location(), TokenValue::Ident(name))
    }

    /// Tokens like `u32`, `i64`, `rand256`. Rewinds and declines when no
    /// valid width follows, letting identifier lexing have the text.
    fn width_type(&mut self) -> Option<Token> {
        let saved = self.pos;

        let kind = if self.token_starts_with(b"rand") {
            self.pos += 3;
            TokenKind::RandUint
        } else if self.token_starts_with(b"i") {
            TokenKind::IntType
        } else if self.token_starts_with(b"u") {
            TokenKind::UintType
        } else {
            return None;
        };

        match self.width_spec() {
            Some(width) => Some(Token::new(
                kind,
                self.location(),
                TokenValue::Width(BigInt::from(width)),
            )),
            None => {
                self.pos = saved;
                None
            }
        }
    }

    fn token_starts_with(&self, text: &[u8]) -> bool {
        self.src()[self.start as usize..].starts_with(text)
    }

    fn ident_or_keyword(&mut self) -> Token {
        while self.pos < self.len {
            let char = self.read_char();
            let c = self.byte_at(char.pos);
            let continues = chars::is_ascii_alpha(c)
                || char.len > 1
                || chars::is_digit(c)
                || (self.allow_ident_underscores && (c == b'_' || c == b'$'));
            if !continues {
                self.pos = char.pos;
                break;
            }
        }

        let name = self.token_text();
        match self.keytab.lookup(&name) {
            Some(keyword) => Token::keyword(keyword, self.location()),
            None => Token::new(TokenKind::Ident, self.location(), TokenValue::Ident(name)),
        }
    }

    /// Operators are matched longest-first: the registered keyword of 4, 3,
    /// 2, then 1 characters. The newline keyword advances the line counter.
    fn operator(&mut self) -> Result<Token, Error> {
        for n in [4u32, 3, 2, 1] {
            self.pos = self.start;
            for _ in 0..n {
                self.read_char();
            }
            let name = self.token_text();
            if let Some(keyword) = self.keytab.lookup(&name) {
                let token = Token::keyword(keyword, self.location());
                if n == 1 && name == "\n" {
                    self.line += 1;
                }
                return Ok(token);
            }
        }
        Err(self.error("Unrecognized operator"))
    }

    fn token_text(&self) -> String {
        let slice = &self.src()[self.start as usize..self.pos as usize];
        String::from_utf8_lossy(slice).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(text: &str) -> SourceFile {
        SourceFile::new("testdata/test", text.as_bytes().to_vec())
    }

    fn drain(text: &str) -> Vec<Token> {
        let file = file(text);
        let keytab = Keytab::new();
        let mut lexer = Lexer::new(&file, &keytab);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.next_token().expect("lex failure");
            let eof = token.is_eof();
            tokens.push(token);
            if eof {
                break;
            }
        }
        tokens
    }

    fn integers(text: &str) -> Vec<BigInt> {
        drain(text)
            .iter()
            .filter_map(|t| t.integer().cloned())
            .collect()
    }

    #[test]
    fn empty_input_is_newline_then_eof() {
        let tokens = drain("");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].kind, TokenKind::Keyword);
        assert_eq!(tokens[1].kind, TokenKind::Eof);
    }

    #[test]
    fn string_escapes() {
        let tokens = drain(r#""\a\b\e\f\n\r\t\v\\\"\0""#);
        let TokenValue::Str(body) = &tokens[0].value else {
            panic!("expected string, got {:?}", tokens[0]);
        };
        assert_eq!(
            body,
            &vec![0x07, 0x08, 0x1b, 0x0c, 0x0a, 0x0d, 0x09, 0x0b, b'\\', b'"', 0]
        );
    }

    #[test]
    fn hex_escape_in_string() {
        let tokens = drain(r#""\x41\xde""#);
        let TokenValue::Str(body) = &tokens[0].value else {
            panic!();
        };
        assert_eq!(body, &vec![0x41, 0xde]);
    }

    #[test]
    fn unterminated_string_fails() {
        let file = file("\"abc");
        let keytab = Keytab::new();
        let mut lexer = Lexer::new(&file, &keytab);
        assert!(lexer.next_token().is_err());
    }

    #[test]
    fn overlong_encoding_is_a_lex_error() {
        let file = SourceFile::new("t", vec![0xc0, 0x80]);
        let keytab = Keytab::new();
        let mut lexer = Lexer::new(&file, &keytab);
        let err = lexer.next_token().unwrap_err();
        assert!(matches!(err, Error::Lex { .. }), "{err}");
    }

    #[test]
    fn bidi_control_is_a_lex_error() {
        for c in ['\u{202A}', '\u{202E}', '\u{2066}', '\u{2069}'] {
            let file = SourceFile::new("t", c.to_string().into_bytes());
            let keytab = Keytab::new();
            let mut lexer = Lexer::new(&file, &keytab);
            assert!(lexer.next_token().is_err(), "U+{:04X}", c as u32);
        }
    }

    #[test]
    fn char_literals() {
        let values = integers(r"'\a' '\b' '\e' '\f' '\n' '\r' '\t' '\v' '\\' '\x27' '\0' '\xde'");
        let expected = [7u8, 8, 0x1b, 0x0c, 0x0a, 0x0d, 0x09, 0x0b, b'\\', 0x27, 0, 0xde];
        assert_eq!(values.len(), expected.len());
        for (value, expected) in values.iter().zip(expected) {
            assert_eq!(value, &BigInt::from(expected));
        }
    }

    #[test]
    fn integers_with_width_suffixes() {
        let values = integers(
            "0 1u2 3i3 57896044618658097711785492504343953926634992332820282019728792003956564819949u256",
        );
        assert_eq!(values[0], BigInt::from(0u32));
        assert_eq!(values[1], BigInt::from(1u32));
        assert_eq!(values[2], BigInt::from(3u32));
        assert_eq!(
            values[3],
            "57896044618658097711785492504343953926634992332820282019728792003956564819949"
                .parse::<BigInt>()
                .unwrap()
        );
    }

    #[test]
    fn underscores_in_integers_are_ignored() {
        let values = integers("1_000_000 12_34");
        assert_eq!(values[0], BigInt::from(1_000_000u32));
        assert_eq!(values[1], BigInt::from(1234u32));
    }

    #[test]
    fn hex_integers() {
        let values = integers(
            "0x0 0xau4 0x3i3 0x7fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffed 0xffffu256",
        );
        assert_eq!(values[0], BigInt::from(0u32));
        assert_eq!(values[1], BigInt::from(0xau32));
        assert_eq!(values[2], BigInt::from(3u32));
        assert_eq!(values[3].to_str_radix(16), "7fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffed");
        assert_eq!(values[4], BigInt::from(0xffffu32));
    }

    #[test]
    fn oversized_width_is_not_a_suffix() {
        // 99999 > 0xFFFF: the suffix is not a suffix, and the remainder
        // lexes as an identifier.
        let tokens = drain("1u99999");
        assert_eq!(tokens[0].kind, TokenKind::Integer);
        assert_eq!(tokens[1].kind, TokenKind::Ident);
        assert_eq!(tokens[1].ident(), Some("u99999"));
    }

    #[test]
    fn floats() {
        let tokens = drain("0. 3.14 0.999e3 2.4e-24 123456789.123456789 1f32 2.5f64");
        let expected = [0.0, 3.14, 999.0, 2.4e-24, 123456789.123456789, 1.0, 2.5];
        let floats: Vec<f64> = tokens
            .iter()
            .filter_map(|t| match t.value {
                TokenValue::Float(f) => Some(f),
                _ => None,
            })
            .collect();
        assert_eq!(floats.len(), expected.len());
        for (value, expected) in floats.iter().zip(expected) {
            let diff = (value - expected).abs();
            assert!(diff <= expected.abs() * 1e-10 + 1e-300, "{value} vs {expected}");
        }
    }

    #[test]
    fn float_errors() {
        let file = file("1e");
        let keytab = Keytab::new();
        let mut lexer = Lexer::new(&file, &keytab);
        assert!(lexer.next_token().is_err());

        let file = SourceFile::new("t", "1.5f16");
        let mut lexer = Lexer::new(&file, &keytab);
        assert!(lexer.next_token().is_err());
    }

    #[test]
    fn escaped_idents() {
        let tokens = drain("\\if \\+ \\test");
        let names: Vec<_> = tokens.iter().filter_map(|t| t.ident()).collect();
        assert_eq!(names, vec!["if", "+", "test"]);
    }

    #[test]
    fn plain_idents() {
        let tokens = drain("schön a123 test");
        let names: Vec<_> = tokens.iter().filter_map(|t| t.ident()).collect();
        assert_eq!(names, vec!["schön", "a123", "test"]);
    }

    #[test]
    fn underscore_idents_when_enabled() {
        let source = file("$sch_ön $a1_23 _test");
        let keytab = Keytab::new();
        let mut lexer = Lexer::new(&source, &keytab);
        lexer.allow_ident_underscores = true;
        let mut names = Vec::new();
        loop {
            let token = lexer.next_token().unwrap();
            if token.is_eof() {
                break;
            }
            if let Some(name) = token.ident() {
                names.push(name.to_owned());
            }
        }
        assert_eq!(names, vec!["$sch_ön", "$a1_23", "_test"]);
    }

    #[test]
    fn width_types() {
        let tokens = drain("u32 i6 rand1_024");
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).take(3).collect();
        assert_eq!(
            kinds,
            vec![TokenKind::UintType, TokenKind::IntType, TokenKind::RandUint]
        );
        let widths: Vec<_> = tokens
            .iter()
            .filter_map(|t| match &t.value {
                TokenValue::Width(w) => Some(w.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(widths, vec![BigInt::from(32u32), BigInt::from(6u32), BigInt::from(1024u32)]);
    }

    #[test]
    fn width_type_followed_by_ident_char_is_an_ident() {
        let tokens = drain("u32x u0");
        assert_eq!(tokens[0].ident(), Some("u32x"));
        assert_eq!(tokens[1].ident(), Some("u0"));
    }

    #[test]
    fn line_comments() {
        let tokens = drain("// Empty line\n1 2 3 // No more on this line\n// Comment above line.\n4 5");
        let summary: Vec<String> = tokens
            .iter()
            .map(|t| match &t.value {
                TokenValue::Integer(v) => v.to_string(),
                _ if t.kind == TokenKind::Keyword => "\\n".to_owned(),
                _ => "eof".to_owned(),
            })
            .collect();
        assert_eq!(
            summary,
            vec!["\\n", "1", "2", "3", "\\n", "\\n", "4", "5", "\\n", "eof"]
        );
    }

    #[test]
    fn nested_block_comments() {
        let tokens = drain("/* Empty /* line\n */1 */2 3 /* No more on this line*/\n/* Comment above line.\n4*/ 5");
        let summary: Vec<String> = tokens
            .iter()
            .map(|t| match &t.value {
                TokenValue::Integer(v) => v.to_string(),
                _ if t.kind == TokenKind::Keyword => "\\n".to_owned(),
                _ => "eof".to_owned(),
            })
            .collect();
        assert_eq!(summary, vec!["2", "3", "\\n", "5", "\\n", "eof"]);
    }

    #[test]
    fn keywords_and_operators() {
        let source = file("if := x :");
        let mut keytab = Keytab::new();
        let kw_if = keytab.intern("if");
        let kw_assign = keytab.intern(":=");
        let kw_colon = keytab.intern(":");
        let mut lexer = Lexer::new(&source, &keytab);

        let token = lexer.next_token().unwrap();
        assert_eq!(token.keyword, Some(kw_if));
        assert!(token.is_keyword("if", &keytab));
        assert!(!token.is_keyword(":=", &keytab));
        assert_eq!(lexer.next_token().unwrap().keyword, Some(kw_assign));
        assert_eq!(lexer.next_token().unwrap().ident(), Some("x"));
        assert_eq!(lexer.next_token().unwrap().keyword, Some(kw_colon));
    }

    #[test]
    fn unknown_operator_fails() {
        let source = file("^");
        let keytab = Keytab::new();
        let mut lexer = Lexer::new(&source, &keytab);
        assert!(lexer.next_token().is_err());
    }

    #[test]
    fn weak_strings_only_when_enabled() {
        let source = file("'abc'");
        let keytab = Keytab::new();
        let mut lexer = Lexer::new(&source, &keytab);
        lexer.use_weak_strings = true;
        let token = lexer.next_token().unwrap();
        assert_eq!(token.kind, TokenKind::WeakStr);
        assert_eq!(token.value, TokenValue::Str(b"abc".to_vec()));
    }

    #[test]
    fn newline_tracks_line_numbers() {
        let source = file("a\nb\nc");
        let keytab = Keytab::new();
        let mut lexer = Lexer::new(&source, &keytab);
        let a = lexer.next_token().unwrap();
        assert_eq!(a.loc.line, 1);
        lexer.next_token().unwrap(); // newline
        let b = lexer.next_token().unwrap();
        assert_eq!(b.loc.line, 2);
        lexer.next_token().unwrap();
        let c = lexer.next_token().unwrap();
        assert_eq!(c.loc.line, 3);
    }
}
