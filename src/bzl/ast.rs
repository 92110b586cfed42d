//! Syntax tree for the build-file dialect.
//!
//! Nodes carry their comments in three positions: `before` (own-line comments
//! above the node), `suffix` (same-line, after the node), and `after`
//! (own-line comments trailing inside a closing delimiter). Keeping comments
//! on the nodes is what lets edits round-trip without losing user notes.

/// Comments attached to a node. Text is stored raw, including the leading `#`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Comments {
    pub before: Vec<String>,
    pub suffix: Vec<String>,
    pub after: Vec<String>,
}

impl Comments {
    pub fn is_empty(&self) -> bool {
        self.before.is_empty() && self.suffix.is_empty() && self.after.is_empty()
    }

    /// True if any `before` or `suffix` comment is exactly `# keep`.
    /// `after` comments never count.
    pub fn has_keep(&self) -> bool {
        self.before.iter().chain(self.suffix.iter()).any(|c| is_keep(c))
    }
}

/// Exact-match test for the keep marker. `# keep it` does not qualify.
pub fn is_keep(comment: &str) -> bool {
    comment.trim_start_matches('#').trim() == "keep"
}

#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub comments: Comments,
    pub line: usize,
}

impl Expr {
    pub fn new(kind: ExprKind) -> Expr {
        Expr {
            kind,
            comments: Comments::default(),
            line: 0,
        }
    }

    pub fn string(value: &str) -> Expr {
        Expr::new(ExprKind::Str {
            value: value.to_string(),
            triple: false,
        })
    }

    pub fn ident(name: &str) -> Expr {
        Expr::new(ExprKind::Ident(name.to_string()))
    }

    pub fn list(elems: Vec<Expr>) -> Expr {
        Expr::new(ExprKind::List { elems })
    }

    /// String payload, if this node is a string literal.
    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Str { value, .. } => Some(value),
            _ => None,
        }
    }

    /// String list payload, if this node is a list of string literals.
    pub fn as_string_list(&self) -> Option<Vec<String>> {
        match &self.kind {
            ExprKind::List { elems } => elems
                .iter()
                .map(|e| e.as_str().map(str::to_string))
                .collect(),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Str { value: String, triple: bool },
    Int(i64),
    Ident(String),
    List { elems: Vec<Expr> },
    Dict { entries: Vec<KeyValue> },
    Call { func: Box<Expr>, args: Vec<Arg> },
    /// Left-associative binary operator chain, `+` in practice.
    BinOp { op: char, lhs: Box<Expr>, rhs: Box<Expr> },
    /// Unary negation of a literal or expression.
    Neg(Box<Expr>),
}

/// One `key: value` entry of a dict literal.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyValue {
    pub key: Expr,
    pub value: Expr,
    pub comments: Comments,
}

/// One argument of a call: positional (`name` is None) or keyword.
/// `stars` preserves `*args` / `**kwargs` splats found in macro calls.
#[derive(Clone, Debug, PartialEq)]
pub struct Arg {
    pub name: Option<String>,
    pub value: Expr,
    pub comments: Comments,
    pub stars: u8,
}

impl Arg {
    pub fn positional(value: Expr) -> Arg {
        Arg {
            name: None,
            value,
            comments: Comments::default(),
            stars: 0,
        }
    }

    pub fn keyword(name: &str, value: Expr) -> Arg {
        Arg {
            name: Some(name.to_string()),
            value,
            comments: Comments::default(),
            stars: 0,
        }
    }

    /// Keep marker on the argument itself or trailing its value.
    pub fn has_keep(&self) -> bool {
        self.comments.has_keep() || self.value.comments.has_keep()
    }
}

/// A symbol bound by a `load` statement: `local` is the name in this file,
/// `remote` the name inside the loaded module. They differ only for aliases.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadSym {
    pub local: String,
    pub remote: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoadStmt {
    pub module: String,
    pub syms: Vec<LoadSym>,
    pub comments: Comments,
    pub line: usize,
}

impl LoadStmt {
    pub fn new(module: &str) -> LoadStmt {
        LoadStmt {
            module: module.to_string(),
            syms: Vec::new(),
            comments: Comments::default(),
            line: 0,
        }
    }

    pub fn has(&self, local: &str) -> bool {
        self.syms.iter().any(|s| s.local == local)
    }

    pub fn add(&mut self, sym: &str) {
        if !self.has(sym) {
            self.syms.push(LoadSym {
                local: sym.to_string(),
                remote: sym.to_string(),
            });
        }
    }

    /// Canonical ordering: symbols sorted by local name, duplicates dropped.
    pub fn normalize(&mut self) {
        self.syms.sort_by(|a, b| a.local.cmp(&b.local));
        self.syms.dedup_by(|a, b| a.local == b.local);
    }
}

/// Top-level function in a macro (`.bzl`) file. The parameter list is kept
/// verbatim; only the body is structured.
#[derive(Clone, Debug, PartialEq)]
pub struct DefStmt {
    pub name: String,
    pub params: String,
    pub body: Vec<Stmt>,
    pub comments: Comments,
    pub line: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    /// Standalone comment block separated from any statement.
    Comment(Vec<String>),
    Load(LoadStmt),
    Expr(Expr),
    /// Top-level assignment, `SRCS = [...]`. Kept verbatim, never generated.
    Assign {
        lhs: Expr,
        rhs: Expr,
        comments: Comments,
    },
    Def(DefStmt),
    Pass(Comments),
}

/// A parsed build or macro file body.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Ast {
    pub stmts: Vec<Stmt>,
}

impl Ast {
    /// All comment text reachable from top-level statements, in file order.
    /// Used for directive scanning; nested expression comments are included
    /// only for rule calls' own comment positions.
    pub fn comment_lines(&self) -> Vec<String> {
        let mut out = Vec::new();
        for stmt in &self.stmts {
            collect_stmt_comments(stmt, &mut out);
        }
        out
    }
}

fn collect_stmt_comments(stmt: &Stmt, out: &mut Vec<String>) {
    match stmt {
        Stmt::Comment(lines) => out.extend(lines.iter().cloned()),
        Stmt::Load(l) => out.extend(l.comments.before.iter().cloned()),
        Stmt::Expr(e) => {
            out.extend(e.comments.before.iter().cloned());
            out.extend(e.comments.suffix.iter().cloned());
        }
        Stmt::Assign { comments, .. } => out.extend(comments.before.iter().cloned()),
        Stmt::Def(d) => {
            out.extend(d.comments.before.iter().cloned());
            for s in &d.body {
                collect_stmt_comments(s, out);
            }
        }
        Stmt::Pass(c) => out.extend(c.before.iter().cloned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keep_marker_is_exact() {
        assert!(is_keep("# keep"));
        assert!(is_keep("#keep"));
        assert!(is_keep("#   keep"));
        assert!(!is_keep("# keep this one"));
        assert!(!is_keep("# keepsake"));
    }

    #[test]
    fn arg_keep_checks_value_suffix() {
        let mut arg = Arg::keyword("srcs", Expr::list(vec![Expr::string("a.go")]));
        assert!(!arg.has_keep());
        arg.value.comments.suffix.push("# keep".to_string());
        assert!(arg.has_keep());
    }

    #[test]
    fn after_comments_never_keep() {
        let mut c = Comments::default();
        c.after.push("# keep".to_string());
        assert!(!c.has_keep());
        c.suffix.push("# keep".to_string());
        assert!(c.has_keep());
    }

    #[test]
    fn load_normalize_sorts_and_dedupes() {
        let mut l = LoadStmt::new("@rules//:def.bzl");
        l.add("go_test");
        l.add("go_library");
        l.add("go_test");
        l.normalize();
        let names: Vec<&str> = l.syms.iter().map(|s| s.local.as_str()).collect();
        assert_eq!(names, vec!["go_library", "go_test"]);
    }
}
