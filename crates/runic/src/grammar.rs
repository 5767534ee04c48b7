use std::collections::HashMap;

use crate::{
    engine::{self, ParseOptions},
    error::Error,
    handle::{HandleBitset, HandleVec},
    keytab::{Keytab, KeywordHandle},
    source::{Location, SourceFile},
    token::{TokenKind, TokenSet},
    tree::Tree,
};

crate::simple_handle! { pub RuleHandle, pub PexprHandle }

/// A parsing expression. The tree is held in the grammar's pexpr arena;
/// children are handles.
#[derive(Debug)]
pub struct Pexpr {
    pub kind: PexprKind,
    pub loc: Location,
    /// The source spelled this expression inside parentheses; preserved so
    /// rendering round-trips.
    pub has_parens: bool,
}

#[derive(Debug)]
pub enum PexprKind {
    /// A rule referenced by name. `rule` is populated by nonterminal
    /// binding after all rules are read.
    Nonterm {
        name: String,
        rule: Option<RuleHandle>,
    },
    /// Any token of a built-in class (`INTEGER`, `IDENT`, ...).
    Term { token: TokenKind },
    /// One specific keyword. `weak` iff the literal was single-quoted.
    Keyword { keyword: KeywordHandle, weak: bool },
    Empty,
    Sequence(Vec<PexprHandle>),
    Choice(Vec<PexprHandle>),
    ZeroOrMore(PexprHandle),
    OneOrMore(PexprHandle),
    Optional(PexprHandle),
    And(PexprHandle),
    Not(PexprHandle),
}

impl Pexpr {
    /// True for weak keyword literals; such matches are left out of the
    /// parse tree.
    pub fn is_weak(&self) -> bool {
        matches!(self.kind, PexprKind::Keyword { weak: true, .. })
    }
}

/// One grammar rule. The first declared rule is the start rule; a rule
/// declared with `:` instead of `:=` is weak and dissolves during AST
/// simplification.
#[derive(Debug)]
pub struct Rule {
    pub name: String,
    pub weak: bool,
    pub loc: Location,
    pub body: PexprHandle,
    /// FIRST sets, filled in by the compiler. Pruning only; matching never
    /// decides through them.
    pub first_keywords: HandleBitset<KeywordHandle>,
    pub first_tokens: TokenSet,
    pub can_be_empty: bool,
    /// Some pexpr names this rule; unreferenced non-start rules warn.
    pub referenced: bool,
}

/// A compiled grammar: the rule and pexpr arenas, the target-language
/// keyword table, and the start rule. Immutable once compiled; parsing
/// shares it freely.
#[derive(Debug)]
pub struct Grammar {
    pub rules: HandleVec<RuleHandle, Rule>,
    pub pexprs: HandleVec<PexprHandle, Pexpr>,
    pub rule_names: HashMap<String, RuleHandle>,
    pub keytab: Keytab,
    pub start: RuleHandle,
    /// Width of the FIRST-keyword bitmaps, captured when compilation stops
    /// interning keywords.
    pub(crate) num_keywords: u32,
    /// Some pexpr matches the newline keyword. When false, input newlines
    /// are dropped during token materialization.
    pub(crate) newline_matters: bool,
}

impl Grammar {
    /// Compiles a `.syn` grammar file.
    pub fn compile(file: &SourceFile) -> Result<Grammar, Error> {
        crate::compile::compile(file)
    }

    /// Parses an input file with this grammar, producing a (optionally
    /// simplified) tree or the line of the furthest token reached.
    pub fn parse(&self, file: SourceFile, options: &ParseOptions) -> Result<Tree, Error> {
        engine::run(self, file, options)
    }

    pub fn rule_named(&self, name: &str) -> Option<RuleHandle> {
        self.rule_names.get(name).copied()
    }

    /// Re-emits the grammar, one `name := expr` / `name : expr` line per
    /// rule, preserving parenthesization and weak-literal quoting. The
    /// output parses back to a grammar that renders identically.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for rule in self.rules.iter() {
            out.push_str(&rule.name);
            out.push_str(if rule.weak { " : " } else { " := " });
            self.render_pexpr(rule.body, &mut out);
            out.push('\n');
        }
        out
    }

    fn render_pexpr(&self, handle: PexprHandle, out: &mut String) {
        let pexpr = &self.pexprs[handle];
        if pexpr.has_parens {
            out.push('(');
        }
        match &pexpr.kind {
            PexprKind::Nonterm { name, .. } => out.push_str(name),
            PexprKind::Term { token } => out.push_str(token.grammar_name()),
            PexprKind::Keyword { keyword, weak } => {
                let quote = if *weak { '\'' } else { '"' };
                push_keyword_literal(out, self.keytab.name(*keyword), quote);
            }
            PexprKind::Empty => out.push_str("EMPTY"),
            PexprKind::Sequence(children) => {
                for (i, &child) in children.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    self.render_pexpr(child, out);
                }
            }
            PexprKind::Choice(children) => {
                for (i, &child) in children.iter().enumerate() {
                    if i > 0 {
                        out.push_str(" | ");
                    }
                    self.render_pexpr(child, out);
                }
            }
            PexprKind::ZeroOrMore(child) => {
                self.render_pexpr(*child, out);
                out.push('*');
            }
            PexprKind::OneOrMore(child) => {
                self.render_pexpr(*child, out);
                out.push('+');
            }
            PexprKind::Optional(child) => {
                self.render_pexpr(*child, out);
                out.push('?');
            }
            PexprKind::And(child) => {
                out.push('&');
                self.render_pexpr(*child, out);
            }
            PexprKind::Not(child) => {
                out.push('!');
                self.render_pexpr(*child, out);
            }
        }
        if pexpr.has_parens {
            out.push(')');
        }
    }
}

/// Emits a quoted keyword literal, re-escaping the bytes the lexer's escape
/// sequences can produce. Only the active delimiter needs quoting; the other
/// quote character is legal in the body.
fn push_keyword_literal(out: &mut String, name: &str, quote: char) {
    out.push(quote);
    for c in name.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            c if c == quote => {
                out.push('\\');
                out.push(quote);
            }
            '\x07' => out.push_str("\\a"),
            '\x08' => out.push_str("\\b"),
            '\x1b' => out.push_str("\\e"),
            '\x0c' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\x0b' => out.push_str("\\v"),
            '\0' => out.push_str("\\0"),
            c if (c as u32) < 0x20 || c == '\x7f' => {
                out.push_str(&format!("\\x{:02x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
}
