//! `//go:embed` pattern expansion.
//!
//! Patterns are rooted at the owning directory and match package inputs
//! (regular and declared generated files) plus files in subdirectories that
//! do not themselves form a package. Directory patterns include everything
//! beneath them except hidden entries (leading `.` or `_`). A pattern that
//! matches nothing is an error.

use std::collections::BTreeSet;
use std::path::Path;

use globset::GlobBuilder;
use walkdir::WalkDir;

/// Expand embed patterns to concrete file paths, relative to `dir`.
pub fn expand_embeds(
    dir: &Path,
    rel: &str,
    patterns: &[String],
    regular_files: &[String],
    gen_files: &[String],
    subdirs: &[String],
    build_file_names: &[String],
) -> Vec<String> {
    let mut candidates: BTreeSet<String> = BTreeSet::new();
    for name in regular_files.iter().chain(gen_files.iter()) {
        if !hidden(name) {
            candidates.insert(name.clone());
        }
    }
    for sub in subdirs {
        if hidden(sub) || is_package(&dir.join(sub), build_file_names) {
            continue;
        }
        collect_subdir(dir, sub, build_file_names, &mut candidates);
    }

    let mut out: BTreeSet<String> = BTreeSet::new();
    for pattern in patterns {
        let dir_prefix = format!("{}/", pattern.trim_end_matches('/'));
        let as_dir: Vec<&String> = candidates
            .iter()
            .filter(|c| c.starts_with(&dir_prefix) || *c == pattern)
            .collect();
        if dir.join(pattern).is_dir() {
            let mut any = false;
            for c in &as_dir {
                out.insert((*c).clone());
                any = true;
            }
            if !any {
                eprintln!(
                    "[springbok][warn] {}: embed pattern {:?} matches no files",
                    if rel.is_empty() { "." } else { rel },
                    pattern
                );
            }
            continue;
        }

        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map(|g| g.compile_matcher());
        match glob {
            Ok(matcher) => {
                let mut any = false;
                for c in &candidates {
                    if matcher.is_match(c) {
                        out.insert(c.clone());
                        any = true;
                    }
                }
                if !any {
                    eprintln!(
                        "[springbok][warn] {}: embed pattern {:?} matches no files",
                        if rel.is_empty() { "." } else { rel },
                        pattern
                    );
                }
            }
            Err(err) => eprintln!(
                "[springbok][warn] {}: embed pattern {:?}: {}",
                if rel.is_empty() { "." } else { rel },
                pattern,
                err
            ),
        }
    }
    out.into_iter().collect()
}

fn hidden(name: &str) -> bool {
    name.split('/')
        .any(|seg| seg.starts_with('.') || seg.starts_with('_'))
}

/// A directory is a package of its own when it has a build file or any Go
/// source; its files are not embeddable from the parent.
fn is_package(dir: &Path, build_file_names: &[String]) -> bool {
    for name in build_file_names {
        if dir.join(name).is_file() {
            return true;
        }
    }
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .any(|e| e.file_name().to_string_lossy().ends_with(".go")),
        Err(_) => false,
    }
}

fn collect_subdir(
    dir: &Path,
    sub: &str,
    build_file_names: &[String],
    out: &mut BTreeSet<String>,
) {
    let base = dir.join(sub);
    let walker = WalkDir::new(&base).min_depth(1).into_iter();
    for entry in walker.filter_entry(|e| {
        let name = e.file_name().to_string_lossy();
        if name.starts_with('.') || name.starts_with('_') {
            return false;
        }
        if e.file_type().is_dir() && is_package(e.path(), build_file_names) {
            return false;
        }
        true
    }) {
        let Ok(entry) = entry else { continue };
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(rel_path) = entry.path().strip_prefix(dir) {
            out.insert(rel_path.to_string_lossy().replace('\\', "/"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn literal_and_glob_patterns() {
        let tmp = TempDir::new().expect("tmp");
        let got = expand_embeds(
            tmp.path(),
            "pkg",
            &strings(&["config.json", "*.tmpl"]),
            &strings(&["a.tmpl", "b.tmpl", "config.json", "main.go"]),
            &[],
            &[],
            &strings(&["BUILD.bazel"]),
        );
        assert_eq!(got, strings(&["a.tmpl", "b.tmpl", "config.json"]));
    }

    #[test]
    fn glob_does_not_cross_directories() {
        let tmp = TempDir::new().expect("tmp");
        fs::create_dir_all(tmp.path().join("static")).expect("mkdir");
        fs::write(tmp.path().join("static/app.css"), "").expect("write");
        let got = expand_embeds(
            tmp.path(),
            "pkg",
            &strings(&["*.css"]),
            &strings(&["root.css"]),
            &[],
            &strings(&["static"]),
            &strings(&["BUILD.bazel"]),
        );
        assert_eq!(got, strings(&["root.css"]));
    }

    #[test]
    fn directory_pattern_includes_subtree_without_hidden() {
        let tmp = TempDir::new().expect("tmp");
        fs::create_dir_all(tmp.path().join("static/img")).expect("mkdir");
        fs::write(tmp.path().join("static/app.css"), "").expect("write");
        fs::write(tmp.path().join("static/img/logo.png"), "").expect("write");
        fs::write(tmp.path().join("static/.secret"), "").expect("write");
        fs::write(tmp.path().join("static/_draft.css"), "").expect("write");

        let got = expand_embeds(
            tmp.path(),
            "pkg",
            &strings(&["static"]),
            &[],
            &[],
            &strings(&["static"]),
            &strings(&["BUILD.bazel"]),
        );
        assert_eq!(got, strings(&["static/app.css", "static/img/logo.png"]));
    }

    #[test]
    fn package_subdirs_are_not_embeddable() {
        let tmp = TempDir::new().expect("tmp");
        fs::create_dir_all(tmp.path().join("helper")).expect("mkdir");
        fs::write(tmp.path().join("helper/helper.go"), "package helper\n").expect("write");
        fs::write(tmp.path().join("helper/data.txt"), "").expect("write");

        let got = expand_embeds(
            tmp.path(),
            "pkg",
            &strings(&["helper/data.txt"]),
            &[],
            &[],
            &strings(&["helper"]),
            &strings(&["BUILD.bazel"]),
        );
        assert!(got.is_empty());
    }

    #[test]
    fn generated_files_are_candidates() {
        let tmp = TempDir::new().expect("tmp");
        let got = expand_embeds(
            tmp.path(),
            "pkg",
            &strings(&["gen.json"]),
            &[],
            &strings(&["gen.json"]),
            &[],
            &strings(&["BUILD.bazel"]),
        );
        assert_eq!(got, strings(&["gen.json"]));
    }
}
