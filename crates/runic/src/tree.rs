//! Materializes the tree of successful matches into AST nodes and applies
//! the weak-rule/weak-keyword simplification pass.

use crate::{
    engine::{Engine, ResultHandle},
    grammar::{Grammar, RuleHandle},
    source::SourceFile,
    token::{Token, TokenKind},
};

/// The parse result handed to the caller. Owns the token vector and the
/// source buffer; nodes index into them. Independent of the grammar except
/// for rule handles, so it must not outlive the grammar it was parsed with.
#[derive(Debug)]
pub struct Tree {
    pub source: SourceFile,
    pub tokens: Vec<Token>,
    pub root: Node,
}

/// One AST node: a rule match, a single token, or (after merging) both.
/// A node carrying a token has no children.
#[derive(Debug)]
pub struct Node {
    pub rule: Option<RuleHandle>,
    pub token: Option<usize>,
    pub children: Vec<Node>,
}

impl Node {
    pub(crate) fn empty(rule: RuleHandle) -> Node {
        Node {
            rule: Some(rule),
            token: None,
            children: Vec::new(),
        }
    }

    pub fn rule_name<'g>(&self, grammar: &'g Grammar) -> Option<&'g str> {
        self.rule.map(|rule| grammar.rules[rule].name.as_str())
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Builds the node tree rooted at a ParseResult. Between the nodes of
/// successive child results, token leaves are injected for every token in
/// the gap that was matched by a non-weak pexpr; weak keywords never reach
/// the tree.
pub(crate) fn build(engine: &Engine, handle: ResultHandle) -> Node {
    let entry = &engine.results[handle];
    let mut children = Vec::new();

    let mut pos = entry.pos;
    for &child in &entry.children {
        let child_entry = &engine.results[child];
        push_token_leaves(engine, &mut children, pos, child_entry.pos);
        children.push(build(engine, child));
        pos = child_entry.result.end;
    }
    push_token_leaves(engine, &mut children, pos, entry.result.end);

    Node {
        rule: Some(entry.rule),
        token: None,
        children,
    }
}

fn push_token_leaves(engine: &Engine, out: &mut Vec<Node>, start: u32, end: u32) {
    let end = end.min(engine.tokens.len() as u32);
    for index in start..end {
        if let Some(pexpr) = engine.matched[index as usize] {
            if !engine.grammar.pexprs[pexpr].is_weak() {
                out.push(Node {
                    rule: None,
                    token: Some(index as usize),
                    children: Vec::new(),
                });
            }
        }
    }
}

/// Post-order simplification. Childless children whose rule is absent or
/// weak and which carry no token are pruned (a token in the tree always came
/// through a strong pexpr). A sole child then merges into its parent unless
/// the parent is a strong-rule node and the child is a strong-rule node,
/// carries a token, or has more than one child of its own. Merging moves the
/// grandchildren up, adopts the child's token, and, when the parent is weak
/// or rule-less, adopts the child's rule identity.
pub(crate) fn simplify(node: &mut Node, grammar: &Grammar) {
    for child in &mut node.children {
        simplify(child, grammar);
    }

    node.children.retain(|child| {
        if !child.children.is_empty() || child.token.is_some() {
            return true;
        }
        child.rule.is_some_and(|rule| !grammar.rules[rule].weak)
    });

    if node.children.len() == 1 {
        let parent_strong = node.rule.is_some_and(|rule| !grammar.rules[rule].weak);
        let child_strong = node.children[0]
            .rule
            .is_some_and(|rule| !grammar.rules[rule].weak);

        if parent_strong && (child_strong || node.children[0].token.is_some()) {
            return;
        }
        if parent_strong && node.children[0].children.len() > 1 {
            return;
        }

        let child = node.children.remove(0);
        node.token = child.token;
        if child.rule.is_some() && !parent_strong {
            node.rule = child.rule;
        }
        node.children = child.children;
    }
}

impl Tree {
    /// Canonical S-expression dump: each rule node as `name(children...)`,
    /// keyword tokens double-quoted, everything else verbatim source text.
    pub fn render(&self, grammar: &Grammar) -> String {
        let mut out = String::new();
        let mut space = false;
        self.render_node(&self.root, grammar, &mut out, &mut space);
        out
    }

    fn render_node(&self, node: &Node, grammar: &Grammar, out: &mut String, space: &mut bool) {
        if let Some(index) = node.token {
            if *space {
                out.push(' ');
            }
            let token = &self.tokens[index];
            let quoted = token.kind == TokenKind::Keyword;
            if quoted {
                out.push('"');
            }
            out.push_str(&token.text(&self.source));
            if quoted {
                out.push('"');
            }
            *space = true;
            return;
        }

        if let Some(rule) = node.rule {
            if *space {
                out.push(' ');
            }
            out.push_str(&grammar.rules[rule].name);
            out.push('(');
            let mut inner = false;
            for child in &node.children {
                self.render_node(child, grammar, out, &mut inner);
            }
            out.push(')');
            *space = true;
            return;
        }

        for child in &node.children {
            self.render_node(child, grammar, out, space);
        }
    }
}
