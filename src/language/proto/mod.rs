//! The proto front end: `proto_library` generation and resolution.

use std::collections::BTreeMap;

use crate::config::Config;
use crate::index::RuleIndex;
use crate::label::Label;
use crate::merger::merge_resolved_attr;
use crate::platform::PlatformStrings;
use crate::resolve::{ImportSpec, RemoteCache, find_override};
use crate::rules::{File, LoadInfo, PrivateValue, Rule};

use super::{GenerateArgs, GenerateResult, KindInfo, Language};

pub mod fileinfo;
pub mod known;

use fileinfo::{ProtoFileInfo, proto_file_info};

/// How protos group into rules.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ProtoMode {
    /// One `proto_library` per directory.
    #[default]
    Default,
    /// One `proto_library` per proto package.
    Package,
    /// No generation.
    Disable,
}

#[derive(Clone, Debug, Default)]
pub struct ProtoConfig {
    pub mode: ProtoMode,
}

static PROTO_KINDS: &[(&str, KindInfo)] = &[(
    "proto_library",
    KindInfo {
        match_attrs: &["srcs"],
        non_empty_attrs: &["srcs"],
        mergeable_attrs: &["srcs", "import_prefix", "strip_import_prefix"],
        resolve_attrs: &["deps"],
        importable: true,
    },
)];

pub struct ProtoLanguage;

impl Language for ProtoLanguage {
    fn name(&self) -> &'static str {
        "proto"
    }

    fn known_directives(&self) -> &'static [&'static str] {
        &["proto"]
    }

    fn configure(&self, c: &mut Config, _rel: &str, file: Option<&File>) {
        let Some(file) = file else { return };
        for d in &file.directives {
            if d.key != "proto" {
                continue;
            }
            match d.value.as_str() {
                "default" => c.proto.mode = ProtoMode::Default,
                "package" => c.proto.mode = ProtoMode::Package,
                "disable" => c.proto.mode = ProtoMode::Disable,
                other => eprintln!(
                    "[springbok][warn] proto directive wants default|package|disable, got {:?}",
                    other
                ),
            }
        }
    }

    fn kinds(&self) -> &'static [(&'static str, KindInfo)] {
        PROTO_KINDS
    }

    fn loads(&self) -> Vec<LoadInfo> {
        vec![LoadInfo {
            name: "@rules_proto//proto:defs.bzl".to_string(),
            symbols: vec!["proto_library".to_string()],
        }]
    }

    fn generate(&self, args: GenerateArgs<'_>) -> GenerateResult {
        generate(&args)
    }

    fn imports(&self, _c: &Config, rule: &Rule, file: &File) -> Vec<ImportSpec> {
        // A proto_library provides its source files at their repo-relative
        // paths, which is how other protos import them.
        rule.attr_strings("srcs")
            .unwrap_or_default()
            .iter()
            .map(|src| {
                let path = if file.pkg.is_empty() {
                    src.clone()
                } else {
                    format!("{}/{}", file.pkg, src)
                };
                ImportSpec::new("proto", &path)
            })
            .collect()
    }

    fn embeds(&self, _rule: &Rule, _from: &Label) -> Vec<Label> {
        Vec::new()
    }

    fn resolve(
        &self,
        c: &Config,
        ix: &RuleIndex,
        _rc: &dyn RemoteCache,
        rule: &mut Rule,
        from: &Label,
    ) {
        let Some(imports) = rule
            .private_attr("_imports")
            .and_then(|v| v.as_strings())
            .map(|v| v.to_vec())
        else {
            return;
        };
        let own_srcs: Vec<String> = rule
            .attr_strings("srcs")
            .unwrap_or_default()
            .iter()
            .map(|src| {
                if from.pkg.is_empty() {
                    src.clone()
                } else {
                    format!("{}/{}", from.pkg, src)
                }
            })
            .collect();

        let carrier = PlatformStrings::from_generic(imports);
        let deps = carrier.map_filter(|imp| {
            resolve_proto_import(c, ix, imp, from, &own_srcs)
                .map(|label| label.rel(&from.repo, &from.pkg).to_string())
        });
        merge_resolved_attr(rule, "deps", deps.to_expr());
    }

    fn fix(&self, _c: &Config, _file: &mut File) {}
}

fn resolve_proto_import(
    c: &Config,
    ix: &RuleIndex,
    imp: &str,
    from: &Label,
    own_srcs: &[String],
) -> Option<Label> {
    let spec = ImportSpec::new("proto", imp);
    if let Some(label) = find_override(c, &spec) {
        return Some(label.abs(&from.repo, &from.pkg));
    }
    if let Some(label) = known::well_known_label(imp) {
        return Label::parse(label).ok();
    }
    if own_srcs.iter().any(|s| s == imp) {
        return None;
    }
    let hits = ix.lookup(&spec, from, &[]);
    match hits.len() {
        0 => {
            eprintln!(
                "[springbok][warn] {}: proto import {:?} not found",
                from, imp
            );
            None
        }
        1 => hits.into_iter().next(),
        _ => {
            eprintln!(
                "[springbok][warn] {}: proto import {:?} is ambiguous",
                from, imp
            );
            None
        }
    }
}

fn generate(args: &GenerateArgs<'_>) -> GenerateResult {
    let c = args.config;
    let mut r#gen: Vec<Rule> = Vec::new();

    if c.proto.mode != ProtoMode::Disable {
        let mut infos: Vec<ProtoFileInfo> = Vec::new();
        for name in args.regular_files {
            if !name.ends_with(".proto") {
                continue;
            }
            match std::fs::read_to_string(args.dir.join(name)) {
                Ok(content) => infos.push(proto_file_info(name, &content)),
                Err(err) => {
                    eprintln!(
                        "[springbok][warn] {}: {}",
                        args.dir.join(name).display(),
                        err
                    );
                    infos.push(proto_file_info(name, ""));
                }
            }
        }
        for name in args.gen_files {
            if name.ends_with(".proto") && !args.regular_files.iter().any(|f| f == name) {
                infos.push(proto_file_info(name, ""));
            }
        }
        r#gen = rules_for_protos(args, infos);
    }

    let mut empty: Vec<Rule> = Vec::new();
    if let Some(file) = args.file {
        for idx in file.rule_indexes() {
            let rule = &file.rules[idx];
            if rule.kind() != "proto_library" {
                continue;
            }
            let name = rule.name();
            if r#gen.iter().any(|g| g.name() == name) {
                continue;
            }
            empty.push(Rule::new("proto_library", &name));
        }
    }
    GenerateResult { r#gen, empty }
}

fn rules_for_protos(args: &GenerateArgs<'_>, infos: Vec<ProtoFileInfo>) -> Vec<Rule> {
    if infos.is_empty() {
        return Vec::new();
    }
    let dir_name = match args.rel.rsplit('/').next() {
        Some(d) if !d.is_empty() => d,
        _ => "root",
    };

    // Group by proto package in package mode, everything together otherwise.
    let mut groups: BTreeMap<String, Vec<&ProtoFileInfo>> = BTreeMap::new();
    match args.config.proto.mode {
        ProtoMode::Package => {
            for info in &infos {
                let key = if info.package.is_empty() {
                    dir_name.to_string()
                } else {
                    info.package
                        .rsplit('.')
                        .next()
                        .unwrap_or(dir_name)
                        .to_string()
                };
                groups.entry(key).or_default().push(info);
            }
        }
        _ => {
            let packages: Vec<&str> = {
                let mut p: Vec<&str> = infos
                    .iter()
                    .filter(|i| !i.package.is_empty())
                    .map(|i| i.package.as_str())
                    .collect();
                p.sort();
                p.dedup();
                p
            };
            let key = match packages.as_slice() {
                [single] => single.rsplit('.').next().unwrap_or(dir_name).to_string(),
                _ => dir_name.to_string(),
            };
            groups.insert(key, infos.iter().collect());
        }
    }

    let mut out = Vec::new();
    for (base, group) in groups {
        let name = format!("{}_proto", base);
        let mut srcs: Vec<String> = group.iter().map(|i| i.name.clone()).collect();
        srcs.sort();
        let mut imports: Vec<String> = group
            .iter()
            .flat_map(|i| i.imports.iter().cloned())
            .collect();
        imports.sort();
        imports.dedup();

        let mut rule = Rule::new("proto_library", &name);
        rule.set_attr("srcs", srcs);
        rule.set_attr("visibility", vec!["//visibility:public".to_string()]);
        rule.set_private_attr("_imports", PrivateValue::Strings(imports));
        rule.set_private_attr("_lang", PrivateValue::Str("proto".to_string()));
        out.push(rule);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn generate_in(dir: &Path, rel: &str, files: &[&str], config: &Config) -> GenerateResult {
        let regular: Vec<String> = files.iter().map(|f| f.to_string()).collect();
        ProtoLanguage.generate(GenerateArgs {
            config,
            dir,
            rel,
            file: None,
            subdirs: &[],
            regular_files: &regular,
            gen_files: &[],
            other_gen: &[],
            other_empty: &[],
        })
    }

    #[test]
    fn generates_one_rule_per_directory() {
        let tmp = TempDir::new().expect("tmp");
        fs::write(
            tmp.path().join("a.proto"),
            "syntax = \"proto3\";\npackage example.api;\n",
        )
        .expect("write");
        fs::write(
            tmp.path().join("b.proto"),
            "syntax = \"proto3\";\npackage example.api;\nimport \"other/c.proto\";\n",
        )
        .expect("write");

        let c = Config::new(tmp.path());
        let result = generate_in(tmp.path(), "api", &["a.proto", "b.proto"], &c);
        assert_eq!(result.r#gen.len(), 1);
        let rule = &result.r#gen[0];
        assert_eq!(rule.name(), "api_proto");
        assert_eq!(
            rule.attr_strings("srcs"),
            Some(vec!["a.proto".to_string(), "b.proto".to_string()])
        );
        assert_eq!(
            rule.private_attr("_imports").and_then(|v| v.as_strings().map(|s| s.to_vec())),
            Some(vec!["other/c.proto".to_string()])
        );
    }

    #[test]
    fn package_mode_splits_rules() {
        let tmp = TempDir::new().expect("tmp");
        fs::write(tmp.path().join("a.proto"), "package one;\n").expect("write");
        fs::write(tmp.path().join("b.proto"), "package two;\n").expect("write");

        let mut c = Config::new(tmp.path());
        c.proto.mode = ProtoMode::Package;
        let result = generate_in(tmp.path(), "api", &["a.proto", "b.proto"], &c);
        let names: Vec<String> = result.r#gen.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["one_proto".to_string(), "two_proto".to_string()]);
    }

    #[test]
    fn disable_mode_generates_nothing() {
        let tmp = TempDir::new().expect("tmp");
        fs::write(tmp.path().join("a.proto"), "package one;\n").expect("write");
        let mut c = Config::new(tmp.path());
        c.proto.mode = ProtoMode::Disable;
        let result = generate_in(tmp.path(), "api", &["a.proto"], &c);
        assert!(result.r#gen.is_empty());
    }

    #[test]
    fn resolve_uses_well_known_and_index() {
        let mut ix = RuleIndex::new();
        ix.add_entry(
            "proto",
            "proto_library",
            Label::new("other", "other_proto"),
            vec![ImportSpec::new("proto", "other/c.proto")],
            Vec::new(),
        );
        ix.finish();

        let mut rule = Rule::new("proto_library", "api_proto");
        rule.set_attr("srcs", vec!["a.proto".to_string()]);
        rule.set_private_attr(
            "_imports",
            PrivateValue::Strings(vec![
                "google/protobuf/timestamp.proto".to_string(),
                "other/c.proto".to_string(),
                "api/a.proto".to_string(),
            ]),
        );
        let c = Config::new(Path::new("/repo"));
        let from = Label::new("api", "api_proto");
        ProtoLanguage.resolve(&c, &ix, &crate::resolve::NoRemoteCache, &mut rule, &from);
        assert_eq!(
            rule.attr_strings("deps"),
            Some(vec![
                "//other:other_proto".to_string(),
                "@com_google_protobuf//:timestamp_proto".to_string(),
            ])
        );
    }
}
