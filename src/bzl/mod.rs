//! Parser and printer for the declarative build-file dialect.
//!
//! The grammar is the Python-subset used by Bazel-style build files: `load`,
//! function calls with positional and keyword arguments, lists, dicts,
//! string/integer literals, `select(...)`, `+` concatenation, and comments.
//! Parsing is comment-preserving; printing is canonical (see [`printer`]).

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod printer;

pub use ast::{Arg, Ast, Comments, DefStmt, Expr, ExprKind, KeyValue, LoadStmt, LoadSym, Stmt};
pub use parser::parse;
pub use printer::format_ast;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line {line}: {msg}")]
    Syntax { line: usize, msg: String },
}

impl ParseError {
    pub fn syntax(line: usize, msg: String) -> ParseError {
        ParseError::Syntax { line, msg }
    }
}
