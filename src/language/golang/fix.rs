//! Kind migrations for existing Go build files.
//!
//! Two fixers run before merging: the retired `cgo_library` kind collapses
//! into `go_library` (squash, nothing discarded), and legacy
//! `go_default_library` naming migrates to import-based names when that
//! convention is active.

use crate::bzl::Expr;
use crate::config::Config;
use crate::merger::squash_rules;
use crate::rules::File;

use super::NamingConvention;

pub fn fix_file(c: &Config, file: &mut File) {
    fix_cgo_library(file);
    if c.go.naming == NamingConvention::Import {
        fix_legacy_names(file);
    }
}

/// `cgo_library` used to be a separate kind; its sources now live on
/// `go_library` with `cgo = True`.
fn fix_cgo_library(file: &mut File) {
    let Some(cgo_idx) = file
        .rules
        .iter()
        .position(|r| !r.is_deleted() && r.kind() == "cgo_library")
    else {
        return;
    };
    if file.rules[cgo_idx].should_keep() {
        return;
    }
    let lib_idx = file
        .rules
        .iter()
        .position(|r| !r.is_deleted() && r.kind() == "go_library");
    match lib_idx {
        Some(lib_idx) => {
            let cgo_rule = file.rules[cgo_idx].clone();
            match squash_rules(&cgo_rule, &mut file.rules[lib_idx]) {
                Ok(()) => {
                    file.rules[lib_idx].set_attr("cgo", true);
                    file.rules[cgo_idx].delete();
                }
                Err(err) => {
                    eprintln!(
                        "[springbok][warn] {}: cannot squash cgo_library: {}",
                        file.path.display(),
                        err
                    );
                }
            }
        }
        None => {
            file.rules[cgo_idx].set_kind("go_library");
            file.rules[cgo_idx].set_attr("cgo", true);
        }
    }
}

/// Rename `go_default_library` / `go_default_test` to names derived from the
/// rule's import path, updating same-file `embed` references.
fn fix_legacy_names(file: &mut File) {
    let mut renames: Vec<(String, String)> = Vec::new();
    for rule in &mut file.rules {
        if rule.is_deleted() || rule.should_keep() {
            continue;
        }
        let new_name = match (rule.kind(), rule.name().as_str()) {
            ("go_library", "go_default_library") => {
                let Some(importpath) = rule.attr_string("importpath") else {
                    continue;
                };
                importpath.rsplit('/').next().unwrap_or(&importpath).to_string()
            }
            _ => continue,
        };
        if new_name.is_empty() {
            continue;
        }
        renames.push(("go_default_library".to_string(), new_name.clone()));
        rule.set_attr("name", new_name.as_str());
        // The conventional test name follows the library.
        renames.push(("go_default_test".to_string(), format!("{}_test", new_name)));
    }

    for (old, new) in &renames {
        for rule in &mut file.rules {
            if rule.is_deleted() {
                continue;
            }
            if rule.name() == *old && rule.kind() == "go_test" && old == "go_default_test" {
                rule.set_attr("name", new.as_str());
            }
            let old_ref = format!(":{}", old);
            if let Some(embeds) = rule.attr_strings("embed") {
                if embeds.iter().any(|e| e == &old_ref) {
                    let updated: Vec<String> = embeds
                        .iter()
                        .map(|e| {
                            if e == &old_ref {
                                format!(":{}", new)
                            } else {
                                e.clone()
                            }
                        })
                        .collect();
                    rule.set_attr_expr(
                        "embed",
                        Expr::list(updated.iter().map(|e| Expr::string(e)).collect()),
                    );
                }
            }
        }
    }
}
