//! Single-file inspection for Go sources.
//!
//! Lightweight line scanning, no full parser: package clause, imports
//! (single and block form), `//go:build` and `// +build` constraints,
//! `//go:embed` patterns, and the cgo preamble. Good enough to generate and
//! resolve rules without a Go toolchain.

use std::collections::BTreeSet;
use std::path::Path;

use super::constraints::{
    Constraint, FilenameConstraint, from_filename, parse_go_build, parse_plus_build,
};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Ext {
    Go,
    Asm,
    C,
    #[default]
    Unknown,
}

pub fn classify_ext(name: &str) -> Ext {
    match name.rsplit_once('.').map(|(_, e)| e) {
        Some("go") => Ext::Go,
        Some("s") | Some("S") => Ext::Asm,
        Some("c") | Some("cc") | Some("cpp") | Some("cxx") | Some("h") | Some("hh")
        | Some("hpp") | Some("m") | Some("mm") => Ext::C,
        _ => Ext::Unknown,
    }
}

#[derive(Clone, Debug, Default)]
pub struct FileInfo {
    pub name: String,
    pub ext: Ext,
    pub package: String,
    pub is_test: bool,
    /// Package clause is `<package>_test`.
    pub is_external_test: bool,
    pub imports: Vec<String>,
    pub embeds: Vec<String>,
    pub is_cgo: bool,
    pub copts: Vec<String>,
    pub clinkopts: Vec<String>,
    pub goos: Option<String>,
    pub goarch: Option<String>,
    pub constraint: Option<Constraint>,
}

impl FileInfo {
    /// Whether this file builds for the given tags/os/arch.
    pub fn applies(&self, tags: &BTreeSet<String>, os: &str, arch: &str) -> bool {
        if let Some(goos) = &self.goos {
            if goos != os {
                return false;
            }
        }
        if let Some(goarch) = &self.goarch {
            if goarch != arch {
                return false;
            }
        }
        match &self.constraint {
            Some(c) => c.eval(tags, os, arch),
            None => true,
        }
    }

    pub fn is_constrained(&self) -> bool {
        self.goos.is_some() || self.goarch.is_some() || self.constraint.is_some()
    }
}

/// Inspect one file by name and content. Non-Go sources get filename-derived
/// metadata only.
pub fn file_info(name: &str, content: &str) -> FileInfo {
    let FilenameConstraint {
        goos,
        goarch,
        is_test,
    } = from_filename(name);
    let mut info = FileInfo {
        name: name.to_string(),
        goos,
        goarch,
        is_test,
        ..FileInfo::default()
    };
    info.ext = classify_ext(name);
    if info.ext == Ext::Go {
        scan_go(content, &mut info);
    }
    info
}

/// Read and inspect a file on disk. Read failures log and fall back to
/// filename-derived metadata.
pub fn file_info_from_disk(dir: &Path, name: &str) -> FileInfo {
    match std::fs::read_to_string(dir.join(name)) {
        Ok(content) => file_info(name, &content),
        Err(err) => {
            eprintln!("[springbok][warn] {}: {}", dir.join(name).display(), err);
            file_info(name, "")
        }
    }
}

fn scan_go(content: &str, info: &mut FileInfo) {
    let mut in_import_block = false;
    let mut in_block_comment = false;
    let mut seen_package = false;
    let mut plus_build: Vec<Constraint> = Vec::new();
    let mut go_build: Option<Constraint> = None;
    // Comment lines directly above an import statement; holds the cgo
    // preamble when `import "C"` follows.
    let mut comment_run: Vec<String> = Vec::new();

    for line in content.lines() {
        let trimmed = line.trim();

        if in_block_comment {
            let text = match trimmed.find("*/") {
                Some(end) => {
                    in_block_comment = false;
                    &trimmed[..end]
                }
                None => trimmed,
            };
            comment_run.push(text.trim().to_string());
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix("/*") {
            match rest.find("*/") {
                Some(end) => comment_run.push(rest[..end].trim().to_string()),
                None => {
                    in_block_comment = true;
                    comment_run.push(rest.trim().to_string());
                }
            }
            continue;
        }

        if let Some(comment) = trimmed.strip_prefix("//") {
            if !seen_package {
                if let Some(expr) = comment.strip_prefix("go:build") {
                    go_build = go_build.take().or_else(|| parse_go_build(expr.trim()));
                } else if let Some(expr) = comment.strip_prefix(" +build") {
                    if let Some(c) = parse_plus_build(expr.trim()) {
                        plus_build.push(c);
                    }
                }
            }
            if let Some(patterns) = comment.strip_prefix("go:embed") {
                info.embeds.extend(parse_embed_patterns(patterns));
            }
            comment_run.push(comment.trim().to_string());
            continue;
        }

        if trimmed.is_empty() {
            comment_run.clear();
            continue;
        }

        if !seen_package {
            if let Some(rest) = trimmed.strip_prefix("package ") {
                let name = rest.split_whitespace().next().unwrap_or("");
                info.package = name.to_string();
                info.is_external_test = name.ends_with("_test");
                seen_package = true;
                comment_run.clear();
                continue;
            }
        }

        if trimmed.starts_with("import (") || trimmed == "import(" {
            in_import_block = true;
            comment_run.clear();
            continue;
        }
        if in_import_block {
            if trimmed.starts_with(')') {
                in_import_block = false;
                comment_run.clear();
                continue;
            }
            if let Some(path) = extract_import_path(trimmed) {
                record_import(info, &path, &comment_run);
            }
            continue;
        }
        if trimmed.starts_with("import ") {
            if let Some(path) = extract_import_path(trimmed.trim_start_matches("import").trim()) {
                record_import(info, &path, &comment_run);
            }
            comment_run.clear();
            continue;
        }

        // Any other code line breaks a comment run.
        comment_run.clear();
    }

    // `//go:build` wins over legacy lines; multiple `+build` lines AND.
    info.constraint = go_build.or_else(|| match plus_build.len() {
        0 => None,
        1 => plus_build.pop(),
        _ => Some(Constraint::And(plus_build)),
    });
}

fn record_import(info: &mut FileInfo, path: &str, comment_run: &[String]) {
    if path == "C" {
        info.is_cgo = true;
        parse_cgo_preamble(comment_run, info);
        return;
    }
    if !info.imports.iter().any(|i| i == path) {
        info.imports.push(path.to_string());
    }
}

/// Accept both quote styles: "pkg/path" or `pkg/path`.
fn extract_import_path(segment: &str) -> Option<String> {
    let quote_start = segment.find(&['"', '`'][..])?;
    let quote = segment.as_bytes()[quote_start];
    let tail = &segment[quote_start + 1..];
    let path_end = tail.find(quote as char)?;
    let path = tail[..path_end].trim();
    if path.is_empty() {
        None
    } else {
        Some(path.to_string())
    }
}

/// `#cgo [constraints] CFLAGS: -DX` lines in the comment block above
/// `import "C"`. Per-line constraints are not tracked; flags fold into the
/// generic option lists.
fn parse_cgo_preamble(lines: &[String], info: &mut FileInfo) {
    for line in lines {
        let Some(rest) = line.trim().strip_prefix("#cgo") else {
            continue;
        };
        let Some((head, flags)) = rest.split_once(':') else {
            continue;
        };
        let directive = head.split_whitespace().last().unwrap_or("");
        let values: Vec<String> = flags.split_whitespace().map(str::to_string).collect();
        match directive {
            "CFLAGS" | "CPPFLAGS" | "CXXFLAGS" => {
                for v in values {
                    if !info.copts.contains(&v) {
                        info.copts.push(v);
                    }
                }
            }
            "LDFLAGS" => {
                for v in values {
                    if !info.clinkopts.contains(&v) {
                        info.clinkopts.push(v);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Split `//go:embed` patterns; double-quoted patterns may contain spaces.
fn parse_embed_patterns(rest: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut chars = rest.trim().chars().peekable();
    let mut current = String::new();
    let mut in_quote = false;
    while let Some(c) = chars.next() {
        match c {
            '"' if !in_quote => in_quote = true,
            '"' if in_quote => {
                in_quote = false;
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
            }
            c if c.is_whitespace() && !in_quote => {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_package_and_imports() {
        let src = r#"
package app

import (
    "fmt"
    util "example.com/util"
    _ "example.com/blank"
)

import "example.com/single"

func main() {}
"#;
        let info = file_info("main.go", src);
        assert_eq!(info.package, "app");
        assert_eq!(
            info.imports,
            vec![
                "fmt".to_string(),
                "example.com/util".to_string(),
                "example.com/blank".to_string(),
                "example.com/single".to_string(),
            ]
        );
        assert!(!info.is_test);
        assert!(!info.is_cgo);
    }

    #[test]
    fn detects_test_files() {
        let info = file_info("app_test.go", "package app\n");
        assert!(info.is_test);
        assert!(!info.is_external_test);

        let info = file_info("app_ext_test.go", "package app_test\n");
        assert!(info.is_test);
        assert!(info.is_external_test);
    }

    #[test]
    fn reads_build_constraints() {
        let src = "//go:build linux && amd64\n\npackage app\n";
        let info = file_info("a.go", src);
        let tags = BTreeSet::new();
        assert!(info.applies(&tags, "linux", "amd64"));
        assert!(!info.applies(&tags, "darwin", "amd64"));

        let src = "// +build linux darwin\n\npackage app\n";
        let info = file_info("a.go", src);
        assert!(info.applies(&tags, "darwin", "arm64"));
        assert!(!info.applies(&tags, "windows", "amd64"));
    }

    #[test]
    fn filename_and_expr_combine() {
        let src = "//go:build cgo\n\npackage app\n";
        let info = file_info("a_linux.go", src);
        let tags = BTreeSet::new();
        assert_eq!(info.goos.as_deref(), Some("linux"));
        assert!(info.applies(&tags, "linux", "amd64"));
        assert!(!info.applies(&tags, "windows", "amd64"));
    }

    #[test]
    fn collects_embed_patterns() {
        let src = "package app\n\n//go:embed static/* \"with space.txt\"\nvar fs embed.FS\n\n//go:embed single.txt\nvar one string\n";
        let info = file_info("a.go", src);
        assert_eq!(
            info.embeds,
            vec![
                "static/*".to_string(),
                "with space.txt".to_string(),
                "single.txt".to_string()
            ]
        );
    }

    #[test]
    fn parses_cgo_preamble() {
        let src = r#"package app

// #cgo CFLAGS: -DPNG_DEBUG=1
// #cgo LDFLAGS: -lpng
// #include <png.h>
import "C"
"#;
        let info = file_info("a.go", src);
        assert!(info.is_cgo);
        assert_eq!(info.copts, vec!["-DPNG_DEBUG=1".to_string()]);
        assert_eq!(info.clinkopts, vec!["-lpng".to_string()]);
        assert!(info.imports.is_empty());
    }

    #[test]
    fn non_go_files_get_filename_metadata() {
        let info = file_info("asm_linux_amd64.s", "");
        assert_eq!(info.ext, Ext::Asm);
        assert_eq!(info.goos.as_deref(), Some("linux"));
        assert_eq!(info.goarch.as_deref(), Some("amd64"));
    }
}
