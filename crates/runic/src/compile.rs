//! Reads a `.syn` grammar file into a [`Grammar`].
//!
//! The reader is a recursive-descent parser with two-token lookahead over a
//! lexer configured for weak strings. Newline tokens are skipped: a rule is
//! never terminated by a line break, only by a following `IDENT :=` /
//! `IDENT :` pair or the end of the file.

use std::collections::HashMap;

use crate::{
    error::Error,
    grammar::{Grammar, Pexpr, PexprHandle, PexprKind, Rule, RuleHandle},
    handle::{HandleBitset, HandleVec, TypedHandle},
    keytab::{Keytab, KeywordHandle},
    lexer::Lexer,
    source::{Location, SourceFile},
    token::{Token, TokenKind, TokenSet, TokenValue},
};

pub(crate) fn compile(file: &SourceFile) -> Result<Grammar, Error> {
    let mut syn_keytab = Keytab::new();
    let kw = SynKeywords::build(&mut syn_keytab);

    let mut lexer = Lexer::new(file, &syn_keytab);
    lexer.use_weak_strings = true;

    let mut reader = Reader {
        file,
        lexer,
        kw,
        peeked: [None, None],
        pexprs: HandleVec::new(),
        rules: HandleVec::new(),
        rule_names: HashMap::new(),
        keytab: Keytab::new(),
        newline_matters: false,
    };
    reader.rules()?;
    reader.finish()
}

/// The fixed keywords of the grammar language itself. The newline keyword is
/// implicit in every keytab; the rest are interned here, once.
struct SynKeywords {
    newline: KeywordHandle,
    colon: KeywordHandle,
    colon_eq: KeywordHandle,
    pipe: KeywordHandle,
    open_paren: KeywordHandle,
    close_paren: KeywordHandle,
    star: KeywordHandle,
    plus: KeywordHandle,
    question: KeywordHandle,
    and: KeywordHandle,
    not: KeywordHandle,
    empty: KeywordHandle,
    eof: KeywordHandle,
    ident: KeywordHandle,
    integer: KeywordHandle,
    float: KeywordHandle,
    string: KeywordHandle,
    randuint: KeywordHandle,
    inttype: KeywordHandle,
    uinttype: KeywordHandle,
}

impl SynKeywords {
    fn build(keytab: &mut Keytab) -> SynKeywords {
        SynKeywords {
            newline: keytab.newline(),
            colon: keytab.intern(":"),
            colon_eq: keytab.intern(":="),
            pipe: keytab.intern("|"),
            open_paren: keytab.intern("("),
            close_paren: keytab.intern(")"),
            star: keytab.intern("*"),
            plus: keytab.intern("+"),
            question: keytab.intern("?"),
            and: keytab.intern("&"),
            not: keytab.intern("!"),
            empty: keytab.intern("EMPTY"),
            eof: keytab.intern("EOF"),
            ident: keytab.intern("IDENT"),
            integer: keytab.intern("INTEGER"),
            float: keytab.intern("FLOAT"),
            string: keytab.intern("STRING"),
            randuint: keytab.intern("RANDUINT"),
            inttype: keytab.intern("INTTYPE"),
            uinttype: keytab.intern("UINTTYPE"),
        }
    }

    /// Maps a reserved terminal keyword (`INTEGER`, `EOF`, ...) to the token
    /// class it matches.
    fn token_class(&self, keyword: KeywordHandle) -> Option<TokenKind> {
        if keyword == self.eof {
            Some(TokenKind::Eof)
        } else if keyword == self.ident {
            Some(TokenKind::Ident)
        } else if keyword == self.integer {
            Some(TokenKind::Integer)
        } else if keyword == self.float {
            Some(TokenKind::Float)
        } else if keyword == self.string {
            Some(TokenKind::Str)
        } else if keyword == self.randuint {
            Some(TokenKind::RandUint)
        } else if keyword == self.inttype {
            Some(TokenKind::IntType)
        } else if keyword == self.uinttype {
            Some(TokenKind::UintType)
        } else {
            None
        }
    }
}

/// Kind, keyword, and location of a buffered token; enough for every
/// lookahead decision without holding a borrow on the reader.
#[derive(Clone, Copy)]
struct Peeked {
    kind: TokenKind,
    keyword: Option<KeywordHandle>,
    loc: Location,
}

struct Reader<'a> {
    file: &'a SourceFile,
    lexer: Lexer<'a>,
    kw: SynKeywords,
    peeked: [Option<Token>; 2],
    pexprs: HandleVec<PexprHandle, Pexpr>,
    rules: HandleVec<RuleHandle, Rule>,
    rule_names: HashMap<String, RuleHandle>,
    /// The target-language keytab, filled from string literals.
    keytab: Keytab,
    newline_matters: bool,
}

impl<'a> Reader<'a> {
    // Token plumbing.

    /// Next token straight from the lexer, newline tokens skipped.
    fn raw_next(&mut self) -> Result<Token, Error> {
        loop {
            let token = self.lexer.next_token()?;
            if token.keyword == Some(self.kw.newline) {
                continue;
            }
            return Ok(token);
        }
    }

    fn next(&mut self) -> Result<Token, Error> {
        if let Some(token) = self.peeked[0].take() {
            self.peeked[0] = self.peeked[1].take();
            return Ok(token);
        }
        self.raw_next()
    }

    /// Looks ahead one or two tokens without consuming.
    fn peek(&mut self, depth: usize) -> Result<Peeked, Error> {
        debug_assert!(depth == 1 || depth == 2);
        if self.peeked[0].is_none() {
            self.peeked[0] = Some(self.raw_next()?);
        }
        if depth == 2 && self.peeked[1].is_none() {
            self.peeked[1] = Some(self.raw_next()?);
        }
        let token = self.peeked[depth - 1].as_ref().expect("lookahead filled");
        Ok(Peeked {
            kind: token.kind,
            keyword: token.keyword,
            loc: token.loc,
        })
    }

    fn peek_is_keyword(&mut self, keyword: KeywordHandle) -> Result<bool, Error> {
        let token = self.peek(1)?;
        Ok(token.keyword == Some(keyword))
    }

    fn syntax_error(&self, loc: Location, message: impl Into<String>) -> Error {
        Error::GrammarSyntax {
            file: self.file.name.clone(),
            line: loc.line,
            message: message.into(),
        }
    }

    // Rule boundaries.

    /// A rule ends at logical EOF or when the next rule's `name :=` /
    /// `name :` shows up in the two-token window.
    fn end_of_rule(&mut self) -> Result<bool, Error> {
        if self.lexer.eof() && self.peeked[0].is_none() && self.peeked[1].is_none() {
            return Ok(true);
        }

        let second = self.peek(2)?;
        if second.kind == TokenKind::Eof {
            let first = self.peek(1)?;
            return Ok(first.kind == TokenKind::Eof);
        }

        Ok(second.keyword == Some(self.kw.colon) || second.keyword == Some(self.kw.colon_eq))
    }

    /// A sequence additionally ends before `|` or `)`. Unhandled token kinds
    /// (INTEGER, FLOAT, ...) do not end a sequence.
    fn end_of_sequence(&mut self) -> Result<bool, Error> {
        if self.end_of_rule()? {
            return Ok(true);
        }
        let token = self.peek(1)?;
        Ok(match token.kind {
            TokenKind::Keyword => {
                token.keyword == Some(self.kw.pipe) || token.keyword == Some(self.kw.close_paren)
            }
            TokenKind::Ident | TokenKind::Str | TokenKind::WeakStr => false,
            TokenKind::Eof => true,
            _ => false,
        })
    }

    // Grammar productions.

    fn rules(&mut self) -> Result<(), Error> {
        while !self.lexer.eof() {
            self.rule()?;
        }
        Ok(())
    }

    fn rule(&mut self) -> Result<(), Error> {
        let ident = self.next()?;
        let TokenValue::Ident(name) = ident.value else {
            return Err(self.syntax_error(ident.loc, "expected rule name"));
        };

        let op = self.next()?;
        let weak = if op.keyword == Some(self.kw.colon) {
            true
        } else if op.keyword == Some(self.kw.colon_eq) {
            false
        } else {
            return Err(self.syntax_error(op.loc, "expected ':' or ':=' after rule name"));
        };

        let body = self.pexpr()?;

        if !self.end_of_rule()? {
            let stray = self.peek(1)?;
            return Err(self.syntax_error(stray.loc, "unexpected token at end of rule"));
        }

        let handle = self.rules.push(Rule {
            name: name.clone(),
            weak,
            loc: ident.loc,
            body,
            first_keywords: HandleBitset::new(),
            first_tokens: TokenSet::new(),
            can_be_empty: false,
            referenced: false,
        });
        // A redefinition shadows the earlier rule for lookup; both render.
        self.rule_names.insert(name, handle);
        Ok(())
    }

    fn pexpr(&mut self) -> Result<PexprHandle, Error> {
        self.choice()
    }

    fn choice(&mut self) -> Result<PexprHandle, Error> {
        let first = self.sequence()?;
        if !self.peek_is_keyword(self.kw.pipe)? {
            return Ok(first);
        }

        let loc = self.pexprs[first].loc;
        let mut children = vec![first];
        while self.peek_is_keyword(self.kw.pipe)? {
            self.next()?;
            children.push(self.sequence()?);
        }
        Ok(self.push(PexprKind::Choice(children), loc))
    }

    fn sequence(&mut self) -> Result<PexprHandle, Error> {
        let first = self.prefix()?;
        if self.end_of_sequence()? {
            return Ok(first);
        }

        let loc = self.pexprs[first].loc;
        let mut children = vec![first];
        while !self.end_of_sequence()? {
            children.push(self.prefix()?);
        }
        Ok(self.push(PexprKind::Sequence(children), loc))
    }

    fn prefix(&mut self) -> Result<PexprHandle, Error> {
        let token = self.peek(1)?;
        let make_and = token.keyword == Some(self.kw.and);
        let make_not = token.keyword == Some(self.kw.not);
        if make_and || make_not {
            let op = self.next()?;
            let child = self.postfix()?;
            let kind = if make_and {
                PexprKind::And(child)
            } else {
                PexprKind::Not(child)
            };
            return Ok(self.push(kind, op.loc));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<PexprHandle, Error> {
        let base = self.basic()?;
        if self.end_of_rule()? {
            return Ok(base);
        }

        let token = self.peek(1)?;
        let kind = if token.keyword == Some(self.kw.question) {
            Some(PexprKind::Optional(base))
        } else if token.keyword == Some(self.kw.star) {
            Some(PexprKind::ZeroOrMore(base))
        } else if token.keyword == Some(self.kw.plus) {
            Some(PexprKind::OneOrMore(base))
        } else {
            None
        };

        match kind {
            Some(kind) => {
                let op = self.next()?;
                Ok(self.push(kind, op.loc))
            }
            None => Ok(base),
        }
    }

    fn basic(&mut self) -> Result<PexprHandle, Error> {
        let token = self.next()?;
        match token.kind {
            TokenKind::Ident => {
                let TokenValue::Ident(name) = token.value else {
                    unreachable!("ident token without a name");
                };
                Ok(self.push(PexprKind::Nonterm { name, rule: None }, token.loc))
            }
            TokenKind::Str | TokenKind::WeakStr => {
                let TokenValue::Str(body) = token.value else {
                    unreachable!("string token without a body");
                };
                let name = String::from_utf8_lossy(&body);
                let keyword = self.keytab.intern(&name);
                if keyword == self.keytab.newline() {
                    self.newline_matters = true;
                }
                let weak = token.kind == TokenKind::WeakStr;
                Ok(self.push(PexprKind::Keyword { keyword, weak }, token.loc))
            }
            TokenKind::Keyword => {
                let keyword = token.keyword.expect("keyword token without a keyword");
                if keyword == self.kw.empty {
                    return Ok(self.push(PexprKind::Empty, token.loc));
                }
                if keyword == self.kw.open_paren {
                    return self.paren();
                }
                match self.kw.token_class(keyword) {
                    Some(class) => Ok(self.push(PexprKind::Term { token: class }, token.loc)),
                    None => Err(self.syntax_error(token.loc, "unexpected keyword in rule body")),
                }
            }
            _ => Err(self.syntax_error(token.loc, "unexpected token in rule body")),
        }
    }

    fn paren(&mut self) -> Result<PexprHandle, Error> {
        let inner = self.pexpr()?;
        let close = self.next()?;
        if close.keyword != Some(self.kw.close_paren) {
            return Err(self.syntax_error(close.loc, "expected ')'"));
        }
        self.pexprs[inner].has_parens = true;
        Ok(inner)
    }

    fn push(&mut self, kind: PexprKind, loc: Location) -> PexprHandle {
        self.pexprs.push(Pexpr {
            kind,
            loc,
            has_parens: false,
        })
    }

    // Post-compilation passes.

    fn finish(mut self) -> Result<Grammar, Error> {
        if self.rules.is_empty() {
            return Err(self.syntax_error(
                Location::new(0, 0, 1),
                "grammar defines no rules",
            ));
        }

        let num_keywords = self.keytab.len() as u32;
        self.bind_nonterms()?;
        self.check_unused_rules();
        find_first_sets(&mut self.rules, &self.pexprs);

        Ok(Grammar {
            start: self.rules.iter_keys().next().expect("at least one rule"),
            rules: self.rules,
            pexprs: self.pexprs,
            rule_names: self.rule_names,
            keytab: self.keytab,
            num_keywords,
            newline_matters: self.newline_matters,
        })
    }

    /// Binds every `Nonterm` to its rule. All undefined references are
    /// logged; the first one is returned as the error.
    fn bind_nonterms(&mut self) -> Result<(), Error> {
        let mut first_undefined = None;
        for index in 0..self.pexprs.len() {
            let handle = PexprHandle::new(index);
            let loc = self.pexprs[handle].loc;
            if let PexprKind::Nonterm { name, rule } = &mut self.pexprs[handle].kind {
                match self.rule_names.get(name.as_str()) {
                    Some(&target) => {
                        *rule = Some(target);
                        self.rules[target].referenced = true;
                    }
                    None => {
                        log::error!(
                            "{}:{}: undefined rule '{}'",
                            self.file.name,
                            loc.line,
                            name
                        );
                        if first_undefined.is_none() {
                            first_undefined = Some(Error::UndefinedRule {
                                file: self.file.name.clone(),
                                line: loc.line,
                                name: name.clone(),
                            });
                        }
                    }
                }
            }
        }
        match first_undefined {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Rules nothing refers to are suspicious but legal; the start rule is
    /// exempt.
    fn check_unused_rules(&self) {
        for (handle, rule) in self.rules.iter_kv() {
            if handle.index() != 0 && !rule.referenced {
                log::warn!(
                    "{}:{}: unused rule '{}'",
                    self.file.name,
                    rule.loc.line,
                    rule.name
                );
            }
        }
    }
}

// FIRST sets.

#[derive(Clone, Copy, PartialEq, Eq)]
enum FirstState {
    Unvisited,
    InProgress,
    Done,
}

/// Computes per-rule FIRST sets and nullability. A rule re-entered while its
/// own set is being computed contributes its (still empty) partial set: the
/// recursive path would have to consume through the rule itself first, so it
/// adds nothing. That makes direct left recursion safe here.
fn find_first_sets(
    rules: &mut HandleVec<RuleHandle, Rule>,
    pexprs: &HandleVec<PexprHandle, Pexpr>,
) {
    let count = rules.len();
    let mut sets = FirstSets {
        keywords: vec![HandleBitset::new(); count],
        tokens: vec![TokenSet::new(); count],
        empty: vec![false; count],
        state: vec![FirstState::Unvisited; count],
    };

    for index in 0..count {
        sets.rule(rules, pexprs, RuleHandle::new(index));
    }

    for (index, rule) in rules.iter_mut().enumerate() {
        rule.first_keywords = std::mem::take(&mut sets.keywords[index]);
        rule.first_tokens = sets.tokens[index];
        rule.can_be_empty = sets.empty[index];
    }
}

struct FirstSets {
    keywords: Vec<HandleBitset<KeywordHandle>>,
    tokens: Vec<TokenSet>,
    empty: Vec<bool>,
    state: Vec<FirstState>,
}

impl FirstSets {
    fn rule(
        &mut self,
        rules: &HandleVec<RuleHandle, Rule>,
        pexprs: &HandleVec<PexprHandle, Pexpr>,
        handle: RuleHandle,
    ) {
        let index = handle.index();
        if self.state[index] != FirstState::Unvisited {
            return;
        }
        self.state[index] = FirstState::InProgress;

        let mut keywords = HandleBitset::new();
        let mut tokens = TokenSet::new();
        let empty = self.pexpr(rules, pexprs, rules[handle].body, &mut keywords, &mut tokens);

        self.keywords[index] = keywords;
        self.tokens[index] = tokens;
        self.empty[index] = empty;
        self.state[index] = FirstState::Done;
    }

    /// Adds this pexpr's FIRST contribution and reports whether it can match
    /// the empty string.
    fn pexpr(
        &mut self,
        rules: &HandleVec<RuleHandle, Rule>,
        pexprs: &HandleVec<PexprHandle, Pexpr>,
        handle: PexprHandle,
        keywords: &mut HandleBitset<KeywordHandle>,
        tokens: &mut TokenSet,
    ) -> bool {
        match &pexprs[handle].kind {
            PexprKind::Nonterm { rule, .. } => {
                let Some(rule) = *rule else {
                    unreachable!("unbound nonterminal survived binding");
                };
                self.rule(rules, pexprs, rule);
                keywords.union_with(&self.keywords[rule.index()]);
                tokens.union_with(self.tokens[rule.index()]);
                self.empty[rule.index()]
            }
            PexprKind::Term { token } => {
                tokens.insert(*token);
                false
            }
            PexprKind::Keyword { keyword, .. } => {
                keywords.insert(*keyword);
                false
            }
            PexprKind::Empty | PexprKind::And(_) | PexprKind::Not(_) => true,
            PexprKind::Sequence(children) => {
                for &child in children {
                    if !self.pexpr(rules, pexprs, child, keywords, tokens) {
                        return false;
                    }
                }
                true
            }
            PexprKind::Choice(children) => {
                let mut empty = false;
                for &child in children {
                    if self.pexpr(rules, pexprs, child, keywords, tokens) {
                        empty = true;
                    }
                }
                empty
            }
            PexprKind::ZeroOrMore(child) | PexprKind::Optional(child) => {
                self.pexpr(rules, pexprs, *child, keywords, tokens);
                true
            }
            PexprKind::OneOrMore(child) => self.pexpr(rules, pexprs, *child, keywords, tokens),
        }
    }
}
