//! Go build constraints: filename suffixes and constraint comments.
//!
//! A file's applicability to a platform combines `_<os>`, `_<arch>`, and
//! `_test` filename suffixes with `//go:build` expressions (and the legacy
//! `// +build` lines), evaluated against a tag set, an OS, and an
//! architecture with ordinary boolean algebra.

use std::collections::BTreeSet;

use crate::platform::{is_known_arch, is_known_os};

/// Operating systems the `unix` tag covers.
const UNIX_OS: &[&str] = &[
    "android", "darwin", "dragonfly", "freebsd", "illumos", "ios", "linux", "netbsd", "openbsd",
    "solaris",
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Constraint {
    Tag(String),
    Not(Box<Constraint>),
    And(Vec<Constraint>),
    Or(Vec<Constraint>),
}

impl Constraint {
    pub fn eval(&self, tags: &BTreeSet<String>, os: &str, arch: &str) -> bool {
        match self {
            Constraint::Tag(tag) => eval_tag(tag, tags, os, arch),
            Constraint::Not(inner) => !inner.eval(tags, os, arch),
            Constraint::And(parts) => parts.iter().all(|p| p.eval(tags, os, arch)),
            Constraint::Or(parts) => parts.iter().any(|p| p.eval(tags, os, arch)),
        }
    }
}

fn eval_tag(tag: &str, tags: &BTreeSet<String>, os: &str, arch: &str) -> bool {
    if is_known_os(tag) {
        return tag == os;
    }
    if is_known_arch(tag) {
        return tag == arch;
    }
    match tag {
        "unix" => UNIX_OS.contains(&os),
        "cgo" => true,
        _ if tag.starts_with("go1") => true,
        _ => tags.contains(tag),
    }
}

/// Parse the expression following `//go:build`. Returns None on syntax the
/// parser does not recognize; callers then treat the file as unconstrained.
pub fn parse_go_build(expr: &str) -> Option<Constraint> {
    let toks = lex(expr)?;
    let mut p = ExprParser { toks, pos: 0 };
    let c = p.parse_or()?;
    if p.pos != p.toks.len() {
        return None;
    }
    Some(c)
}

/// Parse one legacy `// +build` line: space separates alternatives (OR),
/// comma separates requirements (AND), `!` negates.
pub fn parse_plus_build(line: &str) -> Option<Constraint> {
    let mut alts = Vec::new();
    for word in line.split_whitespace() {
        let mut reqs = Vec::new();
        for term in word.split(',') {
            let (neg, tag) = match term.strip_prefix('!') {
                Some(t) => (true, t),
                None => (false, term),
            };
            if tag.is_empty() {
                return None;
            }
            let c = Constraint::Tag(tag.to_string());
            reqs.push(if neg { Constraint::Not(Box::new(c)) } else { c });
        }
        alts.push(if reqs.len() == 1 {
            reqs.remove(0)
        } else {
            Constraint::And(reqs)
        });
    }
    if alts.is_empty() {
        return None;
    }
    Some(if alts.len() == 1 {
        alts.remove(0)
    } else {
        Constraint::Or(alts)
    })
}

#[derive(Debug, PartialEq)]
enum Tok {
    Ident(String),
    Not,
    And,
    Or,
    LParen,
    RParen,
}

fn lex(expr: &str) -> Option<Vec<Tok>> {
    let mut toks = Vec::new();
    let bytes = expr.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b' ' | b'\t' => i += 1,
            b'!' => {
                toks.push(Tok::Not);
                i += 1;
            }
            b'&' if i + 1 < bytes.len() && bytes[i + 1] == b'&' => {
                toks.push(Tok::And);
                i += 2;
            }
            b'|' if i + 1 < bytes.len() && bytes[i + 1] == b'|' => {
                toks.push(Tok::Or);
                i += 2;
            }
            b'(' => {
                toks.push(Tok::LParen);
                i += 1;
            }
            b')' => {
                toks.push(Tok::RParen);
                i += 1;
            }
            c if c.is_ascii_alphanumeric() || c == b'_' || c == b'.' => {
                let start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'.')
                {
                    i += 1;
                }
                toks.push(Tok::Ident(expr[start..i].to_string()));
            }
            _ => return None,
        }
    }
    Some(toks)
}

struct ExprParser {
    toks: Vec<Tok>,
    pos: usize,
}

impl ExprParser {
    fn parse_or(&mut self) -> Option<Constraint> {
        let mut parts = vec![self.parse_and()?];
        while matches!(self.toks.get(self.pos), Some(Tok::Or)) {
            self.pos += 1;
            parts.push(self.parse_and()?);
        }
        Some(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Constraint::Or(parts)
        })
    }

    fn parse_and(&mut self) -> Option<Constraint> {
        let mut parts = vec![self.parse_unary()?];
        while matches!(self.toks.get(self.pos), Some(Tok::And)) {
            self.pos += 1;
            parts.push(self.parse_unary()?);
        }
        Some(if parts.len() == 1 {
            parts.remove(0)
        } else {
            Constraint::And(parts)
        })
    }

    fn parse_unary(&mut self) -> Option<Constraint> {
        match self.toks.get(self.pos) {
            Some(Tok::Not) => {
                self.pos += 1;
                Some(Constraint::Not(Box::new(self.parse_unary()?)))
            }
            Some(Tok::LParen) => {
                self.pos += 1;
                let inner = self.parse_or()?;
                if !matches!(self.toks.get(self.pos), Some(Tok::RParen)) {
                    return None;
                }
                self.pos += 1;
                Some(inner)
            }
            Some(Tok::Ident(name)) => {
                let c = Constraint::Tag(name.clone());
                self.pos += 1;
                Some(c)
            }
            _ => None,
        }
    }
}

/// Constraints read from a file name: `foo_linux_amd64_test.go`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilenameConstraint {
    pub goos: Option<String>,
    pub goarch: Option<String>,
    pub is_test: bool,
}

pub fn from_filename(name: &str) -> FilenameConstraint {
    let stem = match name.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => name,
    };
    let mut parts: Vec<&str> = stem.split('_').collect();
    let mut out = FilenameConstraint::default();
    if parts.len() > 1 && parts.last() == Some(&"test") {
        out.is_test = true;
        parts.pop();
    }
    if parts.len() > 1 {
        if let Some(last) = parts.last() {
            if is_known_arch(last) {
                out.goarch = Some(last.to_string());
                parts.pop();
            }
        }
    }
    if parts.len() > 1 {
        if let Some(last) = parts.last() {
            if is_known_os(last) {
                out.goos = Some(last.to_string());
                parts.pop();
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn filename_constraints() {
        assert_eq!(from_filename("foo.go"), FilenameConstraint::default());
        assert_eq!(
            from_filename("foo_linux.go"),
            FilenameConstraint {
                goos: Some("linux".to_string()),
                goarch: None,
                is_test: false
            }
        );
        assert_eq!(
            from_filename("foo_linux_amd64_test.go"),
            FilenameConstraint {
                goos: Some("linux".to_string()),
                goarch: Some("amd64".to_string()),
                is_test: true
            }
        );
        assert_eq!(
            from_filename("foo_amd64.go"),
            FilenameConstraint {
                goos: None,
                goarch: Some("amd64".to_string()),
                is_test: false
            }
        );
        // A bare constraint word is a file name, not a constraint.
        assert_eq!(from_filename("linux.go"), FilenameConstraint::default());
        assert_eq!(from_filename("amd64_test.go").is_test, true);
    }

    #[test]
    fn go_build_expressions() {
        let c = parse_go_build("linux && amd64").expect("parse");
        assert!(c.eval(&tags(&[]), "linux", "amd64"));
        assert!(!c.eval(&tags(&[]), "linux", "arm64"));

        let c = parse_go_build("!windows").expect("parse");
        assert!(c.eval(&tags(&[]), "linux", "amd64"));
        assert!(!c.eval(&tags(&[]), "windows", "amd64"));

        let c = parse_go_build("(linux || darwin) && !custom").expect("parse");
        assert!(c.eval(&tags(&[]), "darwin", "arm64"));
        assert!(!c.eval(&tags(&["custom"]), "darwin", "arm64"));
    }

    #[test]
    fn plus_build_lines() {
        // Space is OR, comma is AND.
        let c = parse_plus_build("linux darwin").expect("parse");
        assert!(c.eval(&tags(&[]), "linux", "amd64"));
        assert!(c.eval(&tags(&[]), "darwin", "amd64"));
        assert!(!c.eval(&tags(&[]), "windows", "amd64"));

        let c = parse_plus_build("linux,amd64").expect("parse");
        assert!(c.eval(&tags(&[]), "linux", "amd64"));
        assert!(!c.eval(&tags(&[]), "linux", "arm"));
    }

    #[test]
    fn special_tags() {
        let c = parse_go_build("unix").expect("parse");
        assert!(c.eval(&tags(&[]), "linux", "amd64"));
        assert!(!c.eval(&tags(&[]), "windows", "amd64"));

        let c = parse_go_build("go1.18").expect("parse");
        assert!(c.eval(&tags(&[]), "linux", "amd64"));

        let c = parse_go_build("mytag").expect("parse");
        assert!(c.eval(&tags(&["mytag"]), "linux", "amd64"));
        assert!(!c.eval(&tags(&[]), "linux", "amd64"));
    }

    #[test]
    fn malformed_expression_is_none() {
        assert!(parse_go_build("linux &&").is_none());
        assert!(parse_go_build("(linux").is_none());
    }
}
