//! Recursive-descent parser producing the comment-bearing [`Ast`].
//!
//! Comment attachment rules:
//! - own-line comments directly above a node become its `before` comments;
//!   a blank line breaks the attachment and leaves a standalone block
//! - a comment on the same line as a node's last token becomes its `suffix`
//! - own-line comments trailing inside a closing bracket land in `after`
//! - a comment on the open-paren line of a multi-line call attaches to the
//!   callee identifier, not the call, so it never reads as a rule marker

use super::ParseError;
use super::ast::{Arg, Ast, Comments, DefStmt, Expr, ExprKind, KeyValue, LoadStmt, LoadSym, Stmt};
use super::lexer::{Tok, TokKind, tokenize};

pub fn parse(input: &str) -> Result<Ast, ParseError> {
    let toks = tokenize(input)?;
    let mut p = Parser {
        input,
        toks,
        pos: 0,
        last_line: 0,
    };
    let stmts = p.parse_stmts(0, true)?;
    Ok(Ast { stmts })
}

struct Parser<'a> {
    input: &'a str,
    toks: Vec<Tok>,
    pos: usize,
    last_line: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> &Tok {
        &self.toks[self.pos.min(self.toks.len() - 1)]
    }

    fn next(&mut self) -> Tok {
        let t = self.toks[self.pos.min(self.toks.len() - 1)].clone();
        if self.pos < self.toks.len() - 1 {
            self.pos += 1;
        }
        self.last_line = t.line;
        t
    }

    fn expect_punct(&mut self, c: char) -> Result<(), ParseError> {
        let t = self.next();
        match t.kind {
            TokKind::Punct(p) if p == c => Ok(()),
            other => Err(ParseError::syntax(
                t.line,
                format!("expected {:?}, found {:?}", c, other),
            )),
        }
    }

    /// Consume a same-line comment following the last token, if any.
    fn take_suffix(&mut self) -> Option<String> {
        if let TokKind::Comment(text) = &self.peek().kind {
            if self.peek().line == self.last_line {
                let text = text.clone();
                self.next();
                return Some(text);
            }
        }
        None
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek().kind, TokKind::Newline) {
            self.next();
        }
    }

    /// Parse a run of statements. `min_col` bounds indentation for def
    /// bodies; `top` enables `def` and blank-line separation of comments.
    fn parse_stmts(&mut self, min_col: usize, top: bool) -> Result<Vec<Stmt>, ParseError> {
        let mut stmts = Vec::new();
        // Own-line comments waiting for a statement: (text, line).
        let mut pending: Vec<(String, usize)> = Vec::new();

        loop {
            self.skip_newlines();
            let tok = self.peek().clone();
            match tok.kind {
                TokKind::Eof => {
                    flush_pending(&mut stmts, &mut pending, usize::MAX);
                    break;
                }
                TokKind::Comment(text) => {
                    if tok.col <= min_col && !top {
                        flush_pending(&mut stmts, &mut pending, usize::MAX);
                        break;
                    }
                    self.next();
                    pending.push((text, tok.line));
                    continue;
                }
                _ => {}
            }
            if !top && tok.col <= min_col {
                flush_pending(&mut stmts, &mut pending, usize::MAX);
                break;
            }

            // Split pending comments on blank lines: only the run touching
            // this statement attaches; earlier runs are standalone blocks.
            let before = flush_pending(&mut stmts, &mut pending, tok.line);

            let mut stmt = match tok.kind {
                TokKind::Def if top => Stmt::Def(self.parse_def(tok.col)?),
                TokKind::Pass => {
                    self.next();
                    Stmt::Pass(Comments::default())
                }
                _ => {
                    let expr = self.parse_expr()?;
                    if matches!(self.peek().kind, TokKind::Punct('=')) {
                        self.next();
                        let rhs = self.parse_expr()?;
                        Stmt::Assign {
                            lhs: expr,
                            rhs,
                            comments: Comments::default(),
                        }
                    } else {
                        match as_load(&expr) {
                            Some(load) => Stmt::Load(load),
                            None => Stmt::Expr(expr),
                        }
                    }
                }
            };
            attach_before(&mut stmt, before);
            if let Some(suffix) = self.take_suffix() {
                attach_suffix(&mut stmt, suffix);
            }
            stmts.push(stmt);
        }
        Ok(stmts)
    }

    fn parse_def(&mut self, def_col: usize) -> Result<DefStmt, ParseError> {
        let def_tok = self.next(); // `def`
        let name = match self.next() {
            Tok {
                kind: TokKind::Ident(name),
                ..
            } => name,
            t => {
                return Err(ParseError::syntax(
                    t.line,
                    "expected function name after def".to_string(),
                ));
            }
        };
        let open = self.next();
        if !matches!(open.kind, TokKind::Punct('(')) {
            return Err(ParseError::syntax(open.line, "expected ( after def name".to_string()));
        }
        // Capture the parameter list verbatim between the parens.
        let mut depth = 1usize;
        let params_start = self.peek().offset;
        let mut params_end = params_start;
        loop {
            let t = self.next();
            match t.kind {
                TokKind::Punct('(') | TokKind::Punct('[') | TokKind::Punct('{') => depth += 1,
                TokKind::Punct(')') | TokKind::Punct(']') | TokKind::Punct('}') => {
                    depth -= 1;
                    if depth == 0 {
                        params_end = t.offset;
                        break;
                    }
                }
                TokKind::Eof => {
                    return Err(ParseError::syntax(t.line, "unterminated def".to_string()));
                }
                _ => {}
            }
        }
        let params = self.raw_slice(params_start, params_end);
        self.expect_punct(':')?;
        let body = self.parse_stmts(def_col, false)?;
        Ok(DefStmt {
            name,
            params,
            body,
            comments: Comments::default(),
            line: def_tok.line,
        })
    }

    fn raw_slice(&self, start: usize, end: usize) -> String {
        self.input
            .get(start..end)
            .unwrap_or_default()
            .trim()
            .to_string()
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_primary()?;
        loop {
            // A `+` chain may wrap across lines inside brackets; comments
            // between operands attach to the left operand.
            while let TokKind::Comment(text) = &self.peek().kind {
                if !self.plus_follows_comments() {
                    break;
                }
                let text = text.clone();
                let same_line = self.peek().line == self.last_line;
                self.next();
                if same_line {
                    lhs.comments.suffix.push(text);
                } else {
                    lhs.comments.after.push(text);
                }
            }
            if let TokKind::Punct('+') = self.peek().kind {
                self.next();
                let rhs = self.parse_primary()?;
                let line = lhs.line;
                lhs = Expr {
                    kind: ExprKind::BinOp {
                        op: '+',
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                    comments: Comments::default(),
                    line,
                };
            } else {
                break;
            }
        }
        Ok(lhs)
    }

    /// Look past a run of comments for a `+` without consuming anything.
    fn plus_follows_comments(&self) -> bool {
        let mut i = self.pos;
        while i < self.toks.len() {
            match &self.toks[i].kind {
                TokKind::Comment(_) | TokKind::Newline => i += 1,
                TokKind::Punct('+') => return true,
                _ => return false,
            }
        }
        false
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        // Own-line comments ahead of an operand attach as its before-comments.
        let mut lead: Vec<String> = Vec::new();
        while let TokKind::Comment(text) = &self.peek().kind {
            if self.peek().line == self.last_line {
                break;
            }
            lead.push(text.clone());
            self.next();
        }
        let tok = self.next();
        let mut expr = match tok.kind {
            TokKind::Str { value, triple } => Expr {
                kind: ExprKind::Str { value, triple },
                comments: Comments::default(),
                line: tok.line,
            },
            TokKind::Int(v) => Expr {
                kind: ExprKind::Int(v),
                comments: Comments::default(),
                line: tok.line,
            },
            TokKind::Ident(name) => Expr {
                kind: ExprKind::Ident(name),
                comments: Comments::default(),
                line: tok.line,
            },
            TokKind::Punct('-') => {
                let inner = self.parse_primary()?;
                match inner.kind {
                    ExprKind::Int(v) => Expr {
                        kind: ExprKind::Int(-v),
                        comments: Comments::default(),
                        line: tok.line,
                    },
                    _ => Expr {
                        kind: ExprKind::Neg(Box::new(inner)),
                        comments: Comments::default(),
                        line: tok.line,
                    },
                }
            }
            TokKind::Punct('(') => {
                let inner = self.parse_expr()?;
                self.expect_punct(')')?;
                inner
            }
            TokKind::Punct('[') => self.parse_list(tok.line)?,
            TokKind::Punct('{') => self.parse_dict(tok.line)?,
            other => {
                return Err(ParseError::syntax(
                    tok.line,
                    format!("unexpected token {:?}", other),
                ));
            }
        };

        // Postfix: calls, including chained `select({...})(...)` shapes.
        while let TokKind::Punct('(') = self.peek().kind {
            expr = self.parse_call(expr)?;
        }
        if !lead.is_empty() {
            let mut lead = lead;
            lead.append(&mut expr.comments.before);
            expr.comments.before = lead;
        }
        Ok(expr)
    }

    fn parse_call(&mut self, mut func: Expr) -> Result<Expr, ParseError> {
        let open = self.next(); // '('
        let call_line = func.line;
        // Comment on the open-paren line belongs to the callee, not the call.
        if let TokKind::Comment(text) = &self.peek().kind {
            if self.peek().line == open.line {
                let text = text.clone();
                self.next();
                func.comments.suffix.push(text);
            }
        }

        let mut args: Vec<Arg> = Vec::new();
        let mut after: Vec<String> = Vec::new();
        loop {
            let mut before: Vec<String> = Vec::new();
            // Own-line comments: before-comments of the next argument, or
            // trailing comments of the call if ')' follows.
            while let TokKind::Comment(text) = &self.peek().kind {
                let text = text.clone();
                self.next();
                before.push(text);
            }
            if let TokKind::Punct(')') = self.peek().kind {
                self.next();
                after = before;
                break;
            }

            let mut stars = 0u8;
            while let TokKind::Punct('*') = self.peek().kind {
                self.next();
                stars += 1;
            }
            let name = self.peek_kwarg_name();
            let value = self.parse_expr()?;
            let mut arg = Arg {
                name,
                value,
                comments: Comments {
                    before,
                    suffix: Vec::new(),
                    after: Vec::new(),
                },
                stars,
            };
            if let Some(c) = self.take_suffix() {
                arg.value.comments.suffix.push(c);
            }
            match self.peek().kind.clone() {
                TokKind::Punct(',') => {
                    self.next();
                    if let Some(c) = self.take_suffix() {
                        arg.comments.suffix.push(c);
                    }
                    args.push(arg);
                }
                TokKind::Punct(')') => {
                    self.next();
                    args.push(arg);
                    break;
                }
                other => {
                    return Err(ParseError::syntax(
                        self.peek().line,
                        format!("expected , or ) in call, found {:?}", other),
                    ));
                }
            }
        }

        Ok(Expr {
            kind: ExprKind::Call {
                func: Box::new(func),
                args,
            },
            comments: Comments {
                before: Vec::new(),
                suffix: Vec::new(),
                after,
            },
            line: call_line,
        })
    }

    /// If the next tokens are `ident =`, consume them and return the name.
    fn peek_kwarg_name(&mut self) -> Option<String> {
        let name = match (self.toks.get(self.pos), self.toks.get(self.pos + 1)) {
            (Some(a), Some(b)) => match (&a.kind, &b.kind) {
                (TokKind::Ident(name), TokKind::Punct('=')) => Some(name.clone()),
                _ => None,
            },
            _ => None,
        }?;
        self.next();
        self.next();
        Some(name)
    }

    fn parse_list(&mut self, line: usize) -> Result<Expr, ParseError> {
        let mut elems: Vec<Expr> = Vec::new();
        let mut after: Vec<String> = Vec::new();
        loop {
            let mut before: Vec<String> = Vec::new();
            while let TokKind::Comment(text) = &self.peek().kind {
                let text = text.clone();
                self.next();
                before.push(text);
            }
            if let TokKind::Punct(']') = self.peek().kind {
                self.next();
                after = before;
                break;
            }
            let mut elem = self.parse_expr()?;
            elem.comments.before = before;
            if let Some(c) = self.take_suffix() {
                elem.comments.suffix.push(c);
            }
            match self.peek().kind.clone() {
                TokKind::Punct(',') => {
                    self.next();
                    if let Some(c) = self.take_suffix() {
                        elem.comments.suffix.push(c);
                    }
                    elems.push(elem);
                }
                TokKind::Punct(']') => {
                    self.next();
                    elems.push(elem);
                    break;
                }
                other => {
                    return Err(ParseError::syntax(
                        self.peek().line,
                        format!("expected , or ] in list, found {:?}", other),
                    ));
                }
            }
        }
        Ok(Expr {
            kind: ExprKind::List { elems },
            comments: Comments {
                before: Vec::new(),
                suffix: Vec::new(),
                after,
            },
            line,
        })
    }

    fn parse_dict(&mut self, line: usize) -> Result<Expr, ParseError> {
        let mut entries: Vec<KeyValue> = Vec::new();
        let mut after: Vec<String> = Vec::new();
        loop {
            let mut before: Vec<String> = Vec::new();
            while let TokKind::Comment(text) = &self.peek().kind {
                let text = text.clone();
                self.next();
                before.push(text);
            }
            if let TokKind::Punct('}') = self.peek().kind {
                self.next();
                after = before;
                break;
            }
            let key = self.parse_expr()?;
            self.expect_punct(':')?;
            let value = self.parse_expr()?;
            let mut kv = KeyValue {
                key,
                value,
                comments: Comments {
                    before,
                    suffix: Vec::new(),
                    after: Vec::new(),
                },
            };
            if let Some(c) = self.take_suffix() {
                kv.value.comments.suffix.push(c);
            }
            match self.peek().kind.clone() {
                TokKind::Punct(',') => {
                    self.next();
                    if let Some(c) = self.take_suffix() {
                        kv.comments.suffix.push(c);
                    }
                    entries.push(kv);
                }
                TokKind::Punct('}') => {
                    self.next();
                    entries.push(kv);
                    break;
                }
                other => {
                    return Err(ParseError::syntax(
                        self.peek().line,
                        format!("expected , or }} in dict, found {:?}", other),
                    ));
                }
            }
        }
        Ok(Expr {
            kind: ExprKind::Dict { entries },
            comments: Comments {
                before: Vec::new(),
                suffix: Vec::new(),
                after,
            },
            line,
        })
    }
}

/// Attach the run of comments touching `stmt_line`; earlier runs separated by
/// blank lines become standalone blocks. Returns the attaching run.
fn flush_pending(
    stmts: &mut Vec<Stmt>,
    pending: &mut Vec<(String, usize)>,
    stmt_line: usize,
) -> Vec<String> {
    if pending.is_empty() {
        return Vec::new();
    }
    // Group into adjacency runs.
    let mut runs: Vec<Vec<(String, usize)>> = Vec::new();
    for (text, line) in pending.drain(..) {
        match runs.last_mut() {
            Some(run) if run.last().map(|(_, l)| l + 1) == Some(line) => {
                run.push((text, line));
            }
            _ => runs.push(vec![(text, line)]),
        }
    }
    let mut attach = Vec::new();
    let last_touches = runs
        .last()
        .and_then(|run| run.last())
        .map(|(_, l)| l + 1 == stmt_line)
        .unwrap_or(false);
    let take = if last_touches { runs.len() - 1 } else { runs.len() };
    for run in runs.drain(..take) {
        stmts.push(Stmt::Comment(run.into_iter().map(|(t, _)| t).collect()));
    }
    if last_touches {
        if let Some(run) = runs.pop() {
            attach = run.into_iter().map(|(t, _)| t).collect();
        }
    }
    attach
}

fn attach_before(stmt: &mut Stmt, before: Vec<String>) {
    if before.is_empty() {
        return;
    }
    match stmt {
        Stmt::Expr(e) => e.comments.before = before,
        Stmt::Load(l) => l.comments.before = before,
        Stmt::Assign { comments, .. } => comments.before = before,
        Stmt::Def(d) => d.comments.before = before,
        Stmt::Pass(c) => c.before = before,
        Stmt::Comment(lines) => {
            let mut all = before;
            all.append(lines);
            *lines = all;
        }
    }
}

fn attach_suffix(stmt: &mut Stmt, suffix: String) {
    match stmt {
        Stmt::Expr(e) => e.comments.suffix.push(suffix),
        Stmt::Load(l) => l.comments.suffix.push(suffix),
        Stmt::Assign { comments, .. } => comments.suffix.push(suffix),
        Stmt::Def(d) => d.comments.suffix.push(suffix),
        Stmt::Pass(c) => c.suffix.push(suffix),
        Stmt::Comment(_) => {}
    }
}

/// Recognize `load("module", "a", alias = "b")` calls.
fn as_load(expr: &Expr) -> Option<LoadStmt> {
    let ExprKind::Call { func, args } = &expr.kind else {
        return None;
    };
    let ExprKind::Ident(name) = &func.kind else {
        return None;
    };
    if name != "load" || args.is_empty() {
        return None;
    }
    let module = args[0].value.as_str()?.to_string();
    let mut syms = Vec::new();
    for arg in &args[1..] {
        let remote = arg.value.as_str()?.to_string();
        let local = arg.name.clone().unwrap_or_else(|| remote.clone());
        syms.push(LoadSym { local, remote });
    }
    Some(LoadStmt {
        module,
        syms,
        comments: expr.comments.clone(),
        line: expr.line,
    })
}
