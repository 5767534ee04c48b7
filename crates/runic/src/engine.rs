//! The packrat engine: memoized rule matching over a materialized token
//! vector, with the seed-grow treatment of direct left recursion from
//! Warth, Douglass and Millstein (2008).
//!
//! All positions are token indices. The whole input is tokenized before any
//! matching; a parse succeeds only when the start rule's match extends
//! through the EOF token index, so partial matches of the input fail with
//! the line of the furthest token reached.

use std::collections::HashMap;

use crate::{
    error::Error,
    grammar::{Grammar, PexprHandle, PexprKind, RuleHandle},
    handle::{HandleVec, TypedHandle},
    lexer::Lexer,
    source::SourceFile,
    token::Token,
    tree::{self, Node, Tree},
};

crate::simple_handle! { pub ResultHandle }

/// Outcome of one match attempt: whether it succeeded, and the token index
/// it stopped at. Zero-width matches (lookahead, EMPTY) succeed with
/// `end == pos`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Match {
    pub success: bool,
    pub end: u32,
}

impl Match {
    fn fail(pos: u32) -> Match {
        Match {
            success: false,
            end: pos,
        }
    }
    fn at(pos: u32) -> Match {
        Match {
            success: true,
            end: pos,
        }
    }
}

/// Evaluation state of a memo entry. `recursion` is sticky: once the rule
/// observes itself beneath itself at this position it stays flagged through
/// every grow iteration.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum ResultState {
    /// The rule body is being evaluated at this position right now; a memo
    /// hit in this state is direct left recursion.
    Pending { recursion: bool },
    Complete { recursion: bool },
}

impl ResultState {
    fn recursion(self) -> bool {
        match self {
            ResultState::Pending { recursion } | ResultState::Complete { recursion } => recursion,
        }
    }
}

/// One memo entry: the match of `rule` starting at token `pos`, plus its
/// place in the tree of successful matches the tree builder walks.
pub struct ParseResult {
    pub rule: RuleHandle,
    pub pos: u32,
    pub result: Match,
    state: ResultState,
    pub(crate) parent: Option<ResultHandle>,
    pub(crate) children: Vec<ResultHandle>,
}

#[derive(Clone, Copy, Debug)]
pub struct ParseOptions {
    pub allow_ident_underscores: bool,
    pub simplify: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            allow_ident_underscores: false,
            simplify: true,
        }
    }
}

pub(crate) fn run(grammar: &Grammar, file: SourceFile, options: &ParseOptions) -> Result<Tree, Error> {
    let tokens = tokenize(grammar, &file, options.allow_ident_underscores)?;
    let token_count = tokens.len() as u32;

    let mut memo = HandleVec::new();
    for _ in 0..grammar.rules.len() {
        memo.push(HashMap::new());
    }

    let mut engine = Engine {
        grammar,
        matched: vec![None; tokens.len()],
        tokens,
        results: HandleVec::new(),
        memo,
        max_token_pos: 0,
    };

    let result = engine.match_rule(None, grammar.start, 0);

    // The match must reach the EOF token (consuming it is also fine, for
    // grammars that name EOF explicitly).
    if !result.success || result.end < token_count - 1 {
        let pos = engine.max_token_pos.min(token_count - 1);
        let line = engine.tokens[pos as usize].loc.line;
        return Err(Error::InputSyntax {
            file: file.name.clone(),
            line,
        });
    }

    let mut root = match engine.memo[grammar.start].get(&0) {
        Some(&handle) => tree::build(&engine, handle),
        // The start rule matched emptily through FIRST-set pruning; there is
        // no memo entry and nothing was consumed.
        None => Node::empty(grammar.start),
    };

    if options.simplify {
        tree::simplify(&mut root, grammar);
    }

    Ok(Tree {
        source: file,
        tokens: engine.tokens,
        root,
    })
}

/// Drains the lexer up front; everything downstream works on token indices.
/// When no pexpr in the grammar mentions the newline keyword, newline tokens
/// are dropped here and the grammar is newline-insensitive.
fn tokenize(
    grammar: &Grammar,
    file: &SourceFile,
    allow_ident_underscores: bool,
) -> Result<Vec<Token>, Error> {
    let mut lexer = Lexer::new(file, &grammar.keytab);
    lexer.allow_ident_underscores = allow_ident_underscores;

    let newline = grammar.keytab.newline();
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        if !grammar.newline_matters && token.keyword == Some(newline) {
            continue;
        }
        let eof = token.is_eof();
        tokens.push(token);
        if eof {
            return Ok(tokens);
        }
    }
}

pub(crate) struct Engine<'g> {
    pub(crate) grammar: &'g Grammar,
    pub(crate) tokens: Vec<Token>,
    /// Which pexpr matched each token, filled during matching and read by
    /// the tree builder.
    pub(crate) matched: Vec<Option<PexprHandle>>,
    pub(crate) results: HandleVec<ResultHandle, ParseResult>,
    /// Per-rule memo table keyed by token position.
    memo: HandleVec<RuleHandle, HashMap<u32, ResultHandle>>,
    max_token_pos: u32,
}

impl<'g> Engine<'g> {
    fn match_rule(&mut self, parent: Option<ResultHandle>, rule: RuleHandle, pos: u32) -> Match {
        if let Some(&found) = self.memo[rule].get(&pos) {
            let entry = &mut self.results[found];
            match entry.state {
                ResultState::Pending { .. } => {
                    // Direct left recursion: report it and hand back the
                    // current seed.
                    entry.state = ResultState::Pending { recursion: true };
                    return entry.result;
                }
                ResultState::Complete { .. } => {
                    let result = entry.result;
                    if result.success && entry.parent.is_none() {
                        if let Some(parent) = parent {
                            self.attach(parent, found);
                        }
                    }
                    return result;
                }
            }
        }

        // FIRST-set prune: a token that cannot begin this rule matches only
        // the empty expansion. No memo entry and no tree node are made.
        if (pos as usize) < self.tokens.len() {
            let token = &self.tokens[pos as usize];
            let target = &self.grammar.rules[rule];
            let pruned = match token.keyword {
                Some(keyword) => {
                    debug_assert!(keyword.index() < self.grammar.num_keywords as usize);
                    !target.first_keywords.contains(keyword)
                }
                None => !target.first_tokens.contains(token.kind),
            };
            if pruned {
                return Match {
                    success: target.can_be_empty,
                    end: pos,
                };
            }
        }

        // Plant a failure seed, then grow it while the body keeps producing
        // longer matches through the recursive reference.
        let mut current = self.alloc_result(parent, rule, pos, Match::fail(pos));
        let mut best = Match::fail(pos);
        let body = self.grammar.rules[rule].body;

        loop {
            self.set_pending(current, true);
            let attempt = self.match_pexpr(current, body, pos);
            self.set_pending(current, false);

            let progressed = attempt.success && attempt.end > best.end;
            if progressed {
                best = attempt;
                self.results[current].result = best;
                if self.results[current].state.recursion() {
                    current = self.promote(current, rule);
                }
            }
            if !progressed || !self.results[current].state.recursion() {
                break;
            }
        }
        best
    }

    fn set_pending(&mut self, handle: ResultHandle, pending: bool) {
        let entry = &mut self.results[handle];
        let recursion = entry.state.recursion();
        entry.state = if pending {
            ResultState::Pending { recursion }
        } else {
            ResultState::Complete { recursion }
        };
    }

    fn alloc_result(
        &mut self,
        parent: Option<ResultHandle>,
        rule: RuleHandle,
        pos: u32,
        result: Match,
    ) -> ResultHandle {
        let handle = self.results.push(ParseResult {
            rule,
            pos,
            result,
            state: ResultState::Complete { recursion: false },
            parent,
            children: Vec::new(),
        });
        self.memo[rule].insert(pos, handle);
        if let Some(parent) = parent {
            self.results[parent].children.push(handle);
        }
        handle
    }

    /// The grow step: the old entry leaves the memo slot and is re-parented
    /// beneath a fresh entry holding the longer match, so each iteration of
    /// a left-recursive rule keeps the tree built by the previous one.
    fn promote(&mut self, old: ResultHandle, rule: RuleHandle) -> ResultHandle {
        let (pos, result, recursion, parent) = {
            let entry = &self.results[old];
            (entry.pos, entry.result, entry.state.recursion(), entry.parent)
        };

        self.memo[rule].remove(&pos);
        if let Some(parent) = parent {
            self.detach(parent, old);
        }

        let promoted = self.alloc_result(parent, rule, pos, result);
        self.results[promoted].state = ResultState::Complete { recursion };
        self.attach(promoted, old);
        promoted
    }

    fn attach(&mut self, parent: ResultHandle, child: ResultHandle) {
        self.results[parent].children.push(child);
        self.results[child].parent = Some(parent);
    }

    fn detach(&mut self, parent: ResultHandle, child: ResultHandle) {
        let children = &mut self.results[parent].children;
        if let Some(index) = children.iter().rposition(|&c| c == child) {
            children.remove(index);
        }
        self.results[child].parent = None;
    }

    /// Wraps the dispatch with the two bookkeeping duties shared by every
    /// expression: tracking the furthest successful position, and rolling
    /// back sub-results attached during an attempt that then failed, so the
    /// result tree accumulates only successful prefixes.
    fn match_pexpr(&mut self, parent: ResultHandle, pexpr: PexprHandle, pos: u32) -> Match {
        let checkpoint = self.results[parent].children.len();
        let result = self.match_pexpr_impl(parent, pexpr, pos);

        if result.success {
            self.max_token_pos = self.max_token_pos.max(result.end);
        } else {
            while self.results[parent].children.len() > checkpoint {
                let child = self.results[parent]
                    .children
                    .pop()
                    .expect("children above checkpoint");
                self.results[child].parent = None;
            }
        }
        result
    }

    fn match_pexpr_impl(&mut self, parent: ResultHandle, pexpr: PexprHandle, pos: u32) -> Match {
        if pos as usize >= self.tokens.len() {
            return Match::fail(pos);
        }

        let grammar = self.grammar;
        match &grammar.pexprs[pexpr].kind {
            PexprKind::Nonterm { rule, .. } => {
                let Some(rule) = *rule else {
                    unreachable!("unbound nonterminal reached the engine");
                };
                self.match_rule(Some(parent), rule, pos)
            }
            PexprKind::Term { token } => {
                if self.tokens[pos as usize].kind == *token {
                    self.matched[pos as usize] = Some(pexpr);
                    Match::at(pos + 1)
                } else {
                    Match::fail(pos)
                }
            }
            PexprKind::Keyword { keyword, .. } => {
                if self.tokens[pos as usize].keyword == Some(*keyword) {
                    self.matched[pos as usize] = Some(pexpr);
                    Match::at(pos + 1)
                } else {
                    Match::fail(pos)
                }
            }
            PexprKind::Empty => Match::at(pos),
            PexprKind::Sequence(children) => {
                let mut current = pos;
                for &child in children {
                    let result = self.match_pexpr(parent, child, current);
                    if !result.success {
                        return Match::fail(pos);
                    }
                    current = result.end;
                    if current as usize >= self.tokens.len() {
                        // Input exhausted; the remaining children could not
                        // match anything anyway.
                        return result;
                    }
                }
                Match::at(current)
            }
            PexprKind::Choice(children) => {
                for &child in children {
                    let result = self.match_pexpr(parent, child, pos);
                    if result.success {
                        return result;
                    }
                }
                Match::fail(pos)
            }
            PexprKind::ZeroOrMore(child) => {
                let child = *child;
                let mut last = Match::at(pos);
                loop {
                    let result = self.match_pexpr(parent, child, last.end);
                    if !result.success {
                        break;
                    }
                    let progressed = result.end > last.end;
                    last = result;
                    if !progressed {
                        // A nullable body matched zero tokens; iterating
                        // again would never terminate.
                        break;
                    }
                }
                last
            }
            PexprKind::OneOrMore(child) => {
                let child = *child;
                let mut last = Match::fail(pos);
                loop {
                    let result = self.match_pexpr(parent, child, last.end);
                    if !result.success {
                        break;
                    }
                    let progressed = result.end > last.end;
                    last = result;
                    if !progressed {
                        break;
                    }
                }
                last
            }
            PexprKind::Optional(child) => {
                let result = self.match_pexpr(parent, *child, pos);
                if result.success {
                    result
                } else {
                    Match::at(pos)
                }
            }
            PexprKind::And(child) => {
                let result = self.match_pexpr(parent, *child, pos);
                Match {
                    success: result.success,
                    end: pos,
                }
            }
            PexprKind::Not(child) => {
                let result = self.match_pexpr(parent, *child, pos);
                Match {
                    success: !result.success,
                    end: pos,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Grammar;

    fn grammar(text: &str) -> Grammar {
        Grammar::compile(&SourceFile::new("test.syn", text)).expect("grammar should compile")
    }

    fn parse(grammar_text: &str, input: &str) -> Result<String, Error> {
        let g = grammar(grammar_text);
        let tree = g.parse(SourceFile::new("input", input), &ParseOptions::default())?;
        Ok(tree.render(&g))
    }

    fn rendered(grammar_text: &str, input: &str) -> String {
        parse(grammar_text, input).expect("input should parse")
    }

    #[test]
    fn keyword_sequence() {
        assert_eq!(
            rendered("rule := \"hello\" \"world\"", "hello world"),
            "rule(\"hello\" \"world\")"
        );
    }

    #[test]
    fn ordered_choice() {
        let g = "rule := \"foo\" | \"bar\"";
        assert_eq!(rendered(g, "foo"), "rule(\"foo\")");
        assert_eq!(rendered(g, "bar"), "rule(\"bar\")");
    }

    #[test]
    fn nested_strong_rules_stay_nested() {
        assert_eq!(
            rendered("expr := term\nterm := INTEGER", "42"),
            "expr(term(42))"
        );
    }

    #[test]
    fn left_recursion_is_left_associative() {
        let output = rendered("E := E \"+\" T | T\nT := INTEGER", "1+2+3");
        // The leftmost '+' is structurally innermost-first: 1+2 groups
        // before +3. The seed of the grow loop survives as the innermost
        // E wrapper.
        assert_eq!(output, "E(E(E(E(T(1)) \"+\" T(2)) \"+\" T(3)))");
    }

    #[test]
    fn left_recursion_single_term() {
        // One grow iteration runs even though nothing grows, so the seed
        // ends up beneath one promoted wrapper.
        assert_eq!(
            rendered("E := E \"+\" T | T\nT := INTEGER", "7"),
            "E(E(T(7)))"
        );
    }

    #[test]
    fn weak_rule_and_weak_keyword_vanish() {
        assert_eq!(rendered("rule : 'a'", "a"), "rule()");
    }

    #[test]
    fn invalid_utf8_input_is_a_lex_error() {
        let g = grammar("rule := \"a\"");
        let err = g
            .parse(
                SourceFile::new("input", vec![0xc0, 0x80]),
                &ParseOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Lex { .. }), "{err:?}");
    }

    #[test]
    fn failure_reports_furthest_line() {
        let g = "rule := \"a\" \"b\"";
        let err = parse(g, "a\nc").unwrap_err();
        match err {
            Error::InputSyntax { line, .. } => assert_eq!(line, 2),
            other => panic!("expected InputSyntax, got {other:?}"),
        }
    }

    #[test]
    fn trailing_input_fails() {
        let err = parse("rule := \"a\"", "a b").unwrap_err();
        assert!(matches!(err, Error::InputSyntax { .. }), "{err:?}");
    }

    #[test]
    fn lookahead_consumes_nothing() {
        assert_eq!(rendered("rule := !\"x\" IDENT", "y"), "rule(y)");
        assert_eq!(rendered("rule := &IDENT IDENT", "y"), "rule(y)");
        assert!(parse("rule := !\"x\" IDENT", "x").is_err());
    }

    #[test]
    fn nullable_repetition_terminates() {
        let g = "rule := (\"x\"?)*";
        assert_eq!(rendered(g, ""), "rule()");
        assert_eq!(rendered(g, "x"), "rule(\"x\")");
        assert_eq!(rendered(g, "x x"), "rule(\"x\" \"x\")");
    }

    #[test]
    fn one_or_more_requires_one() {
        let g = "rule := \"x\"+";
        assert!(parse(g, "").is_err());
        assert_eq!(rendered(g, "x x x"), "rule(\"x\" \"x\" \"x\")");
    }

    #[test]
    fn optional_matches_either_way() {
        let g = "rule := \"a\" \"b\"?";
        assert_eq!(rendered(g, "a"), "rule(\"a\")");
        assert_eq!(rendered(g, "a b"), "rule(\"a\" \"b\")");
    }

    #[test]
    fn empty_input_on_nullable_grammar() {
        assert_eq!(rendered("rule := \"x\"*", ""), "rule()");
    }

    #[test]
    fn newline_sensitive_grammar_sees_newlines() {
        let g = "lines := (IDENT '\\n')+";
        assert_eq!(rendered(g, "a\nb"), "lines(a b)");
        // Missing the trailing newline on the last line is fine: one is
        // appended when the file is read.
        assert_eq!(rendered(g, "a"), "lines(a)");
    }

    #[test]
    fn newline_insensitive_grammar_ignores_newlines() {
        let g = "rule := \"a\" \"b\"";
        assert_eq!(rendered(g, "a\nb"), "rule(\"a\" \"b\")");
    }

    #[test]
    fn token_classes_match() {
        let g = "rule := IDENT INTEGER FLOAT STRING";
        assert_eq!(
            rendered(g, "name 42 1.5 \"text\""),
            "rule(name 42 1.5 \"text\")"
        );
    }

    #[test]
    fn width_type_tokens_match() {
        let g = "rule := UINTTYPE INTTYPE RANDUINT";
        assert_eq!(rendered(g, "u32 i64 rand256"), "rule(u32 i64 rand256)");
    }

    #[test]
    fn explicit_eof_term() {
        let g = "rule := \"a\" EOF";
        assert_eq!(rendered(g, "a"), "rule(\"a\" EOF)");
    }

    #[test]
    fn backtracking_across_choice() {
        // The first alternative consumes "a" then dies; the second must see
        // the original position again.
        let g = "rule := \"a\" \"b\" | \"a\" \"c\"";
        assert_eq!(rendered(g, "a c"), "rule(\"a\" \"c\")");
    }

    #[test]
    fn memoized_subrule_reattaches() {
        // `item` at position 0 is matched by the failing first alternative,
        // then reused from the memo by the second.
        let g = "rule := item \"x\" | item \"y\"\nitem := IDENT";
        assert_eq!(rendered(g, "a y"), "rule(item(a) \"y\")");
    }

    #[test]
    fn char_literal_matches_integer_class() {
        assert_eq!(rendered("rule := INTEGER", "'\\x27'"), "rule('\\x27')");
    }

    #[test]
    fn mini_language_end_to_end() {
        let g = "goal := statement+\n\
                 statement := IDENT '=' expr '\\n'\n\
                 expr := expr \"+\" term | term\n\
                 term : INTEGER | IDENT";
        let output = rendered(g, "x = 1 + 2\ny = x\n");
        // The weak '=' and '\n' keywords vanish, the weak term rule
        // dissolves into its tokens, and the additions nest left.
        assert_eq!(
            output,
            "goal(statement(x expr(expr(expr(1) \"+\" 2))) statement(y expr(expr(x))))"
        );
    }

    #[test]
    fn rendered_grammar_parses_identically() {
        let text = "goal := entry+\n\
                    entry := IDENT '=' value ';'\n\
                    value : INTEGER | IDENT";
        let first = grammar(text);
        let second = grammar(&first.render());
        assert_eq!(first.render(), second.render());

        let input = "a = 1; b = a;";
        let options = ParseOptions::default();
        let out1 = first
            .parse(SourceFile::new("input", input), &options)
            .unwrap()
            .render(&first);
        let out2 = second
            .parse(SourceFile::new("input", input), &options)
            .unwrap()
            .render(&second);
        assert_eq!(out1, out2);
    }
}
