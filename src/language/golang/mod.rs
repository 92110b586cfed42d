//! The Go front end: source inspection, rule generation, and resolution.

use std::collections::BTreeSet;

use crate::config::Config;
use crate::index::RuleIndex;
use crate::label::Label;
use crate::resolve::{ImportSpec, RemoteCache};
use crate::rules::{File, LoadInfo, Rule};

use super::{GenerateArgs, GenerateResult, KindInfo, Language};

pub mod constraints;
pub mod embed;
pub mod fileinfo;
pub mod fix;
pub mod generate;
pub mod package;
pub mod resolve;

/// How imports with no in-repo target become labels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DepMode {
    /// `@repo//path` labels under external repositories.
    #[default]
    External,
    /// `//vendor/<importpath>` labels.
    Vendored,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NamingConvention {
    /// Rules named after the import path (`foo`, `foo_test`).
    #[default]
    Import,
    /// Legacy `go_default_library` / `go_default_test` names.
    GoDefault,
}

#[derive(Clone, Debug, Default)]
pub struct GoConfig {
    /// Import-path prefix mapped to the repository root (or `prefix_rel`).
    pub prefix: String,
    pub prefix_set: bool,
    /// Directory the prefix directive appeared in.
    pub prefix_rel: String,
    /// Prefix for `importmap` on vendored libraries.
    pub importmap_prefix: String,
    /// Generic build tags considered true.
    pub build_tags: BTreeSet<String>,
    pub dep_mode: DepMode,
    pub naming: NamingConvention,
}

pub const GO_KIND_NAMES: &[&str] = &["go_library", "go_binary", "go_test"];

static GO_KINDS: &[(&str, KindInfo)] = &[
    (
        "go_library",
        KindInfo {
            match_attrs: &["importpath"],
            non_empty_attrs: &["srcs", "deps", "embed", "embedsrcs"],
            mergeable_attrs: &[
                "srcs",
                "embed",
                "embedsrcs",
                "cgo",
                "copts",
                "clinkopts",
                "importpath",
                "importmap",
            ],
            resolve_attrs: &["deps"],
            importable: true,
        },
    ),
    (
        "go_binary",
        KindInfo {
            match_attrs: &["embed"],
            non_empty_attrs: &["srcs", "deps", "embed"],
            mergeable_attrs: &["srcs", "embed", "embedsrcs", "cgo", "copts", "clinkopts"],
            resolve_attrs: &["deps"],
            importable: false,
        },
    ),
    (
        "go_test",
        KindInfo {
            match_attrs: &["embed"],
            non_empty_attrs: &["srcs", "deps", "embed"],
            mergeable_attrs: &["srcs", "embed", "embedsrcs"],
            resolve_attrs: &["deps"],
            importable: false,
        },
    ),
];

pub struct GoLanguage;

impl Language for GoLanguage {
    fn name(&self) -> &'static str {
        "go"
    }

    fn known_directives(&self) -> &'static [&'static str] {
        &[
            "prefix",
            "importmap_prefix",
            "build_tags",
            "external",
            "go_naming",
        ]
    }

    fn configure(&self, c: &mut Config, rel: &str, file: Option<&File>) {
        let Some(file) = file else { return };
        for d in &file.directives {
            match d.key.as_str() {
                "prefix" => {
                    c.go.prefix = d.value.clone();
                    c.go.prefix_set = true;
                    c.go.prefix_rel = rel.to_string();
                }
                "importmap_prefix" => c.go.importmap_prefix = d.value.clone(),
                "build_tags" => {
                    c.go.build_tags = d
                        .value
                        .split(',')
                        .map(|t| t.trim().to_string())
                        .filter(|t| !t.is_empty())
                        .collect();
                }
                "external" => match d.value.as_str() {
                    "external" => c.go.dep_mode = DepMode::External,
                    "vendored" => c.go.dep_mode = DepMode::Vendored,
                    other => eprintln!(
                        "[springbok][warn] external directive wants external|vendored, got {:?}",
                        other
                    ),
                },
                "go_naming" => match d.value.as_str() {
                    "import" => c.go.naming = NamingConvention::Import,
                    "go_default_library" => c.go.naming = NamingConvention::GoDefault,
                    other => eprintln!(
                        "[springbok][warn] go_naming directive wants import|go_default_library, got {:?}",
                        other
                    ),
                },
                _ => {}
            }
        }
    }

    fn kinds(&self) -> &'static [(&'static str, KindInfo)] {
        GO_KINDS
    }

    fn loads(&self) -> Vec<LoadInfo> {
        vec![LoadInfo {
            name: "@io_bazel_rules_go//go:def.bzl".to_string(),
            symbols: GO_KIND_NAMES.iter().map(|s| s.to_string()).collect(),
        }]
    }

    fn generate(&self, args: GenerateArgs<'_>) -> GenerateResult {
        generate::generate(&args)
    }

    fn imports(&self, _c: &Config, rule: &Rule, _file: &File) -> Vec<ImportSpec> {
        match rule.attr_string("importpath") {
            Some(importpath) if !importpath.is_empty() => {
                vec![ImportSpec::new("go", &importpath)]
            }
            _ => Vec::new(),
        }
    }

    fn embeds(&self, rule: &Rule, from: &Label) -> Vec<Label> {
        rule.attr_strings("embed")
            .unwrap_or_default()
            .iter()
            .filter_map(|s| Label::parse(s).ok())
            .map(|l| l.abs(&from.repo, &from.pkg))
            .collect()
    }

    fn resolve(
        &self,
        c: &Config,
        ix: &RuleIndex,
        rc: &dyn RemoteCache,
        rule: &mut Rule,
        from: &Label,
    ) {
        resolve::resolve_go(c, ix, rc, rule, from);
    }

    fn fix(&self, c: &Config, file: &mut File) {
        fix::fix_file(c, file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn configure_reads_directives() {
        let file = File::parse(
            "# springbok:prefix example.com/repo\n# springbok:build_tags foo,bar\n# springbok:external vendored\n# springbok:go_naming go_default_library\n",
            Path::new("BUILD.bazel"),
            "",
        )
        .expect("parse");
        let mut c = Config::new(Path::new("/repo"));
        GoLanguage.configure(&mut c, "", Some(&file));
        assert_eq!(c.go.prefix, "example.com/repo");
        assert!(c.go.prefix_set);
        assert!(c.go.build_tags.contains("foo") && c.go.build_tags.contains("bar"));
        assert_eq!(c.go.dep_mode, DepMode::Vendored);
        assert_eq!(c.go.naming, NamingConvention::GoDefault);
    }

    #[test]
    fn imports_expose_importpath() {
        let file = File::parse(
            "go_library(\n    name = \"lib\",\n    importpath = \"example.com/x\",\n)\n",
            Path::new("x/BUILD.bazel"),
            "x",
        )
        .expect("parse");
        let c = Config::new(Path::new("/repo"));
        let specs = GoLanguage.imports(&c, &file.rules[0], &file);
        assert_eq!(specs, vec![ImportSpec::new("go", "example.com/x")]);
    }

    #[test]
    fn embeds_resolve_relative_labels() {
        let file = File::parse(
            "go_test(\n    name = \"lib_test\",\n    embed = [\":lib\"],\n)\n",
            Path::new("x/BUILD.bazel"),
            "x",
        )
        .expect("parse");
        let from = Label::new("x", "lib_test");
        let embeds = GoLanguage.embeds(&file.rules[0], &from);
        assert_eq!(embeds, vec![Label::new("x", "lib")]);
    }
}
