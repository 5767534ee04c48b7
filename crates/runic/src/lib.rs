//! A PEG parser runtime: grammars are compiled from `.syn` files at runtime
//! and interpreted by a packrat engine with memoized results, FIRST-set
//! pruning, and seed-grow handling of direct left recursion. Rules declared
//! with `:` and literals written with single quotes are weak and dissolve
//! during AST simplification.
//!
//! ```no_run
//! use runic::{Grammar, ParseOptions, SourceFile};
//!
//! let grammar = Grammar::compile(&SourceFile::new("expr.syn", "E := E \"+\" T | T\nT := INTEGER"))?;
//! let tree = grammar.parse(SourceFile::new("input", "1+2+3"), &ParseOptions::default())?;
//! println!("{}", tree.render(&grammar));
//! # Ok::<(), runic::Error>(())
//! ```

pub mod chars;
mod compile;
pub mod engine;
pub mod error;
pub mod grammar;
pub mod handle;
pub mod keytab;
pub mod lexer;
pub mod source;
pub mod token;
pub mod tree;

pub use engine::ParseOptions;
pub use error::Error;
pub use grammar::Grammar;
pub use source::SourceFile;
pub use tree::{Node, Tree};
