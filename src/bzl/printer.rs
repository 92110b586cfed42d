//! Canonical renderer for the build-file AST.
//!
//! Output conventions: 4-space indentation, trailing commas in multi-line
//! literals, double-quoted strings, load symbols alphabetized. Rendering the
//! same AST twice produces identical bytes, which is what makes repeated
//! generator runs idempotent.

use super::ast::{Arg, Ast, Comments, DefStmt, Expr, ExprKind, KeyValue, LoadStmt, Stmt};

const INDENT: usize = 4;

pub fn format_ast(ast: &Ast) -> String {
    let mut out = String::new();
    write_stmts(&mut out, &ast.stmts, 0);
    out
}

fn write_stmts(out: &mut String, stmts: &[Stmt], indent: usize) {
    let mut prev: Option<&Stmt> = None;
    for stmt in stmts {
        if let Some(p) = prev {
            if !(matches!(p, Stmt::Load(_)) && matches!(stmt, Stmt::Load(_))) {
                out.push('\n');
            }
        }
        write_stmt(out, stmt, indent);
        prev = Some(stmt);
    }
}

fn write_stmt(out: &mut String, stmt: &Stmt, indent: usize) {
    match stmt {
        Stmt::Comment(lines) => {
            for line in lines {
                pad(out, indent);
                out.push_str(line);
                out.push('\n');
            }
        }
        Stmt::Load(load) => write_load(out, load, indent),
        Stmt::Expr(e) => {
            write_before(out, &e.comments, indent);
            pad(out, indent);
            write_expr(out, e, indent);
            write_suffix(out, &e.comments);
            out.push('\n');
        }
        Stmt::Assign { lhs, rhs, comments } => {
            write_before(out, comments, indent);
            pad(out, indent);
            write_expr(out, lhs, indent);
            out.push_str(" = ");
            write_expr(out, rhs, indent);
            write_suffix(out, comments);
            out.push('\n');
        }
        Stmt::Def(def) => write_def(out, def, indent),
        Stmt::Pass(comments) => {
            write_before(out, comments, indent);
            pad(out, indent);
            out.push_str("pass");
            write_suffix(out, comments);
            out.push('\n');
        }
    }
}

fn write_load(out: &mut String, load: &LoadStmt, indent: usize) {
    write_before(out, &load.comments, indent);
    pad(out, indent);
    out.push_str("load(");
    out.push_str(&quote(&load.module));
    let mut syms = load.syms.clone();
    syms.sort_by(|a, b| a.local.cmp(&b.local));
    syms.dedup_by(|a, b| a.local == b.local);
    for sym in &syms {
        out.push_str(", ");
        if sym.local == sym.remote {
            out.push_str(&quote(&sym.remote));
        } else {
            out.push_str(&sym.local);
            out.push_str(" = ");
            out.push_str(&quote(&sym.remote));
        }
    }
    out.push(')');
    write_suffix(out, &load.comments);
    out.push('\n');
}

fn write_def(out: &mut String, def: &DefStmt, indent: usize) {
    write_before(out, &def.comments, indent);
    pad(out, indent);
    out.push_str("def ");
    out.push_str(&def.name);
    out.push('(');
    out.push_str(&def.params);
    out.push_str("):");
    write_suffix(out, &def.comments);
    out.push('\n');
    if def.body.is_empty() {
        pad(out, indent + INDENT);
        out.push_str("pass\n");
    } else {
        write_stmts(out, &def.body, indent + INDENT);
    }
}

/// Render an expression starting at the current output position.
/// Continuation lines are indented relative to `indent`.
fn write_expr(out: &mut String, e: &Expr, indent: usize) {
    match &e.kind {
        ExprKind::Str { value, triple } => {
            if *triple {
                out.push_str("\"\"\"");
                out.push_str(value);
                out.push_str("\"\"\"");
            } else {
                out.push_str(&quote(value));
            }
        }
        ExprKind::Int(v) => out.push_str(&v.to_string()),
        ExprKind::Ident(name) => out.push_str(name),
        ExprKind::Neg(inner) => {
            out.push('-');
            write_expr(out, inner, indent);
        }
        ExprKind::List { elems } => write_list(out, elems, &e.comments, indent),
        ExprKind::Dict { entries } => write_dict(out, entries, &e.comments, indent),
        ExprKind::Call { func, args } => write_call(out, func, args, &e.comments, indent),
        ExprKind::BinOp { op, lhs, rhs } => {
            write_expr(out, lhs, indent);
            // Comments captured between operands move to their own lines.
            if lhs.comments.suffix.is_empty() && lhs.comments.after.is_empty() {
                out.push(' ');
                out.push(*op);
                out.push(' ');
            } else {
                out.push(' ');
                out.push(*op);
                out.push('\n');
                for c in lhs.comments.suffix.iter().chain(lhs.comments.after.iter()) {
                    pad(out, indent + INDENT);
                    out.push_str(c);
                    out.push('\n');
                }
                pad(out, indent + INDENT);
            }
            write_expr(out, rhs, indent);
        }
    }
}

fn list_is_multiline(elems: &[Expr], comments: &Comments) -> bool {
    if !comments.after.is_empty() {
        return true;
    }
    match elems.len() {
        0 => false,
        1 => !elems[0].comments.is_empty() || !matches!(elems[0].kind, ExprKind::Str { .. }),
        _ => true,
    }
}

fn write_list(out: &mut String, elems: &[Expr], comments: &Comments, indent: usize) {
    if elems.is_empty() {
        out.push_str("[]");
        return;
    }
    if !list_is_multiline(elems, comments) {
        out.push('[');
        write_expr(out, &elems[0], indent);
        out.push(']');
        return;
    }
    out.push_str("[\n");
    let inner = indent + INDENT;
    for elem in elems {
        write_before(out, &elem.comments, inner);
        pad(out, inner);
        write_expr(out, elem, inner);
        out.push(',');
        write_suffix(out, &elem.comments);
        out.push('\n');
    }
    write_after(out, comments, inner);
    pad(out, indent);
    out.push(']');
}

fn write_dict(out: &mut String, entries: &[KeyValue], comments: &Comments, indent: usize) {
    if entries.is_empty() {
        out.push_str("{}");
        return;
    }
    out.push_str("{\n");
    let inner = indent + INDENT;
    for kv in entries {
        write_before(out, &kv.comments, inner);
        pad(out, inner);
        write_expr(out, &kv.key, inner);
        out.push_str(": ");
        write_expr(out, &kv.value, inner);
        out.push(',');
        write_suffix(out, &kv.value.comments);
        write_suffix(out, &kv.comments);
        out.push('\n');
    }
    write_after(out, comments, inner);
    pad(out, indent);
    out.push('}');
}

fn call_is_multiline(func: &Expr, args: &[Arg], comments: &Comments) -> bool {
    if !comments.after.is_empty() || !func.comments.suffix.is_empty() {
        return true;
    }
    args.iter().any(|a| {
        a.name.is_some() || !a.comments.is_empty() || !a.value.comments.before.is_empty()
    })
}

fn write_call(out: &mut String, func: &Expr, args: &[Arg], comments: &Comments, indent: usize) {
    write_expr(out, func, indent);
    out.push('(');
    if args.is_empty() {
        out.push(')');
        return;
    }
    if !call_is_multiline(func, args, comments) {
        // Short form: glob(["*.go"]), select({...}).
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            write_arg_inline(out, arg, indent);
        }
        out.push(')');
        return;
    }
    write_suffix(out, &func.comments);
    out.push('\n');
    let inner = indent + INDENT;
    for arg in args {
        write_before(out, &arg.comments, inner);
        write_before(out, &arg.value.comments, inner);
        pad(out, inner);
        write_arg_inline(out, arg, inner);
        out.push(',');
        write_suffix(out, &arg.value.comments);
        write_suffix(out, &arg.comments);
        out.push('\n');
    }
    write_after(out, comments, inner);
    pad(out, indent);
    out.push(')');
}

fn write_arg_inline(out: &mut String, arg: &Arg, indent: usize) {
    for _ in 0..arg.stars {
        out.push('*');
    }
    if let Some(name) = &arg.name {
        out.push_str(name);
        out.push_str(" = ");
    }
    write_expr(out, &arg.value, indent);
}

fn write_before(out: &mut String, comments: &Comments, indent: usize) {
    for c in &comments.before {
        pad(out, indent);
        out.push_str(c);
        out.push('\n');
    }
}

fn write_after(out: &mut String, comments: &Comments, indent: usize) {
    for c in &comments.after {
        pad(out, indent);
        out.push_str(c);
        out.push('\n');
    }
}

fn write_suffix(out: &mut String, comments: &Comments) {
    for c in &comments.suffix {
        out.push_str("  ");
        out.push_str(c);
    }
}

fn pad(out: &mut String, indent: usize) {
    for _ in 0..indent {
        out.push(' ');
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}
