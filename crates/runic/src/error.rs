use std::fmt::{self, Display};

/// Everything that can go wrong between reading a grammar and handing back a
/// tree. Lexer and grammar errors carry the file and 1-indexed line they were
/// detected at; an input-syntax error carries the line of the furthest token
/// the parser reached.
#[derive(Debug)]
pub enum Error {
    Lex {
        file: String,
        line: u32,
        message: String,
    },
    GrammarSyntax {
        file: String,
        line: u32,
        message: String,
    },
    UndefinedRule {
        file: String,
        line: u32,
        name: String,
    },
    InputSyntax {
        file: String,
        line: u32,
    },
}

impl Error {
    pub fn line(&self) -> u32 {
        match self {
            Error::Lex { line, .. }
            | Error::GrammarSyntax { line, .. }
            | Error::UndefinedRule { line, .. }
            | Error::InputSyntax { line, .. } => *line,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Lex { file, line, message } => {
                write!(f, "{file}:{line}: {message}")
            }
            Error::GrammarSyntax { file, line, message } => {
                write!(f, "{file}:{line}: {message}")
            }
            Error::UndefinedRule { file, line, name } => {
                write!(f, "{file}:{line}: undefined rule '{name}'")
            }
            Error::InputSyntax { file, line } => {
                write!(f, "{file}: syntax error at line {line}")
            }
        }
    }
}

impl std::error::Error for Error {}
