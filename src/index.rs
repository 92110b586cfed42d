//! Repository-wide rule index.
//!
//! Built during pass 1 from every generated and pre-existing rule, then
//! frozen; pass 2 resolves import strings against it. Lookup applies the
//! precedence ladder: vendored candidates shadow non-vendored ones for
//! referrers the vendor root is visible to, same-package candidates beat
//! cross-package ones, and anything in the referrer's embed chain is
//! dropped.

use std::collections::{HashMap, HashSet};

use crate::config::Config;
use crate::label::Label;
use crate::language::{kind_info, language_for_kind};
use crate::resolve::ImportSpec;
use crate::rules::{File, Rule};

#[derive(Clone, Debug)]
pub struct IndexedRule {
    pub label: Label,
    pub kind: String,
    pub lang: String,
    pub embeds: Vec<Label>,
    pub vendor_root: Option<String>,
}

#[derive(Default)]
pub struct RuleIndex {
    rules: Vec<IndexedRule>,
    by_import: HashMap<ImportSpec, Vec<usize>>,
    /// embedded label -> direct embedder, computed by `finish`.
    embedders: HashMap<Label, Label>,
    finished: bool,
}

impl RuleIndex {
    pub fn new() -> RuleIndex {
        RuleIndex::default()
    }

    /// Record a rule from a visited file. Non-importable kinds (tests,
    /// binaries) are skipped: they resolve imports but provide none, and
    /// their embed edges must not hijack the libraries they embed.
    pub fn add_rule(&mut self, c: &Config, rule: &Rule, file: &File) {
        let Some(lang) = language_for_kind(rule.kind()) else {
            return;
        };
        let Some(info) = kind_info(rule.kind()) else {
            return;
        };
        if !info.importable {
            return;
        }
        let label = Label::new(&file.pkg, &rule.name());
        let embeds = lang.embeds(rule, &label);
        let imports = lang.imports(c, rule, file);
        self.add_entry(lang.name(), rule.kind(), label, imports, embeds);
    }

    /// Low-level insertion; `add_rule` is the usual front door.
    pub fn add_entry(
        &mut self,
        lang: &str,
        kind: &str,
        label: Label,
        imports: Vec<ImportSpec>,
        embeds: Vec<Label>,
    ) {
        debug_assert!(!self.finished, "index is frozen after finish");
        let id = self.rules.len();
        self.rules.push(IndexedRule {
            vendor_root: vendor_root(&label.pkg),
            label,
            kind: kind.to_string(),
            lang: lang.to_string(),
            embeds,
        });
        for spec in imports {
            self.by_import.entry(spec).or_default().push(id);
        }
    }

    /// Freeze the index: compute the embedded-by relation used to surface
    /// the outermost embedder on lookup.
    pub fn finish(&mut self) {
        for rule in &self.rules {
            for embedded in &rule.embeds {
                self.embedders
                    .insert(embedded.clone(), rule.label.clone());
            }
        }
        self.finished = true;
    }

    fn outermost(&self, label: &Label) -> Label {
        let mut current = label.clone();
        let mut seen: HashSet<Label> = HashSet::new();
        while let Some(up) = self.embedders.get(&current) {
            if !seen.insert(current.clone()) {
                break;
            }
            current = up.clone();
        }
        current
    }

    /// Raw candidates for an import spec, embed chains collapsed.
    pub fn candidates(&self, spec: &ImportSpec) -> Vec<Label> {
        let mut out: Vec<Label> = self
            .by_import
            .get(spec)
            .map(|ids| {
                ids.iter()
                    .map(|&id| self.outermost(&self.rules[id].label))
                    .collect()
            })
            .unwrap_or_default();
        out.sort();
        out.dedup();
        out
    }

    /// Candidates filtered by referrer position. More than one survivor
    /// means the import is ambiguous; the caller logs and emits nothing.
    pub fn lookup(&self, spec: &ImportSpec, from: &Label, from_embeds: &[Label]) -> Vec<Label> {
        let Some(ids) = self.by_import.get(spec) else {
            return Vec::new();
        };

        struct Candidate {
            label: Label,
            vendor_root: Option<String>,
        }
        let mut cands: Vec<Candidate> = Vec::new();
        for &id in ids {
            let label = self.outermost(&self.rules[id].label);
            if &label == from || from_embeds.contains(&label) {
                continue;
            }
            cands.push(Candidate {
                vendor_root: vendor_root(&label.pkg),
                label,
            });
        }

        // Vendored candidates shadow non-vendored ones when visible; the
        // deepest visible vendor root wins.
        let visible_vendored: Vec<&Candidate> = cands
            .iter()
            .filter(|c| {
                c.vendor_root
                    .as_deref()
                    .map(|root| vendor_visible(&from.pkg, root))
                    .unwrap_or(false)
            })
            .collect();
        let mut labels: Vec<Label> = if !visible_vendored.is_empty() {
            let deepest = visible_vendored
                .iter()
                .map(|c| c.vendor_root.as_deref().unwrap_or("").len())
                .max()
                .unwrap_or(0);
            visible_vendored
                .iter()
                .filter(|c| c.vendor_root.as_deref().unwrap_or("").len() == deepest)
                .map(|c| c.label.clone())
                .collect()
        } else {
            cands
                .iter()
                .filter(|c| c.vendor_root.is_none())
                .map(|c| c.label.clone())
                .collect()
        };

        // Same-package candidates take priority over cross-package ones.
        if labels.iter().any(|l| l.pkg == from.pkg && l.repo == from.repo) {
            labels.retain(|l| l.pkg == from.pkg && l.repo == from.repo);
        }

        labels.sort();
        labels.dedup();
        labels
    }
}

/// The vendor root of a package path, when it has one:
/// `x/vendor/github.com/y` -> `x/vendor`.
fn vendor_root(pkg: &str) -> Option<String> {
    let mut root: Option<String> = None;
    let mut prefix = String::new();
    for seg in pkg.split('/') {
        if !prefix.is_empty() {
            prefix.push('/');
        }
        prefix.push_str(seg);
        if seg == "vendor" {
            root = Some(prefix.clone());
        }
    }
    root
}

/// A vendor root `x/vendor` serves referrers inside `x` (the repo root when
/// `x` is empty).
fn vendor_visible(from_pkg: &str, root: &str) -> bool {
    let parent = root
        .strip_suffix("vendor")
        .map(|p| p.trim_end_matches('/'))
        .unwrap_or("");
    parent.is_empty() || from_pkg == parent || from_pkg.starts_with(&format!("{}/", parent))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(imp: &str) -> ImportSpec {
        ImportSpec::new("go", imp)
    }

    fn lib(pkg: &str) -> Label {
        let name = pkg.rsplit('/').next().unwrap_or(pkg);
        Label::new(pkg, name)
    }

    #[test]
    fn lookup_returns_indexed_label() {
        let mut ix = RuleIndex::new();
        ix.add_entry("go", "go_library", lib("x"), vec![spec("example.com/x")], Vec::new());
        ix.finish();
        let from = Label::new("b", "b");
        assert_eq!(ix.lookup(&spec("example.com/x"), &from, &[]), vec![lib("x")]);
        // The raw candidate set is a superset of every populated entry.
        assert!(ix.candidates(&spec("example.com/x")).contains(&lib("x")));
    }

    #[test]
    fn vendored_shadows_top_level() {
        let mut ix = RuleIndex::new();
        ix.add_entry("go", "go_library", lib("x"), vec![spec("example.com/x")], Vec::new());
        ix.add_entry(
            "go",
            "go_library",
            lib("vendor/example.com/x"),
            vec![spec("example.com/x")],
            Vec::new(),
        );
        ix.finish();

        // Visible from the repo root and from any package.
        let from_root = Label::new("", "root");
        assert_eq!(
            ix.lookup(&spec("example.com/x"), &from_root, &[]),
            vec![lib("vendor/example.com/x")]
        );
        let from_foo = Label::new("foo", "foo");
        assert_eq!(
            ix.lookup(&spec("example.com/x"), &from_foo, &[]),
            vec![lib("vendor/example.com/x")]
        );
    }

    #[test]
    fn deepest_visible_vendor_wins() {
        let mut ix = RuleIndex::new();
        ix.add_entry(
            "go",
            "go_library",
            lib("vendor/example.com/x"),
            vec![spec("example.com/x")],
            Vec::new(),
        );
        ix.add_entry(
            "go",
            "go_library",
            lib("sub/vendor/example.com/x"),
            vec![spec("example.com/x")],
            Vec::new(),
        );
        ix.finish();

        let from_sub = Label::new("sub/app", "app");
        assert_eq!(
            ix.lookup(&spec("example.com/x"), &from_sub, &[]),
            vec![lib("sub/vendor/example.com/x")]
        );
        // Outside `sub`, only the root vendor tree is visible.
        let from_other = Label::new("other", "other");
        assert_eq!(
            ix.lookup(&spec("example.com/x"), &from_other, &[]),
            vec![lib("vendor/example.com/x")]
        );
    }

    #[test]
    fn same_package_preferred_and_self_dropped() {
        let mut ix = RuleIndex::new();
        ix.add_entry("go", "go_library", lib("a"), vec![spec("example.com/a")], Vec::new());
        ix.add_entry(
            "go",
            "go_library",
            Label::new("a", "other"),
            vec![spec("example.com/a")],
            Vec::new(),
        );
        ix.finish();

        // Self-reference never resolves to itself.
        let from_self = lib("a");
        assert_eq!(
            ix.lookup(&spec("example.com/a"), &from_self, &[]),
            vec![Label::new("a", "other")]
        );
    }

    #[test]
    fn ambiguity_surfaces_as_multiple_labels() {
        let mut ix = RuleIndex::new();
        ix.add_entry("go", "go_library", lib("one"), vec![spec("example.com/dup")], Vec::new());
        ix.add_entry("go", "go_library", lib("two"), vec![spec("example.com/dup")], Vec::new());
        ix.finish();
        let from = Label::new("z", "z");
        assert_eq!(ix.lookup(&spec("example.com/dup"), &from, &[]).len(), 2);
    }

    #[test]
    fn embed_chain_bubbles_to_outermost() {
        let mut ix = RuleIndex::new();
        ix.add_entry(
            "go",
            "go_library",
            Label::new("lib", "inner"),
            vec![spec("example.com/lib")],
            Vec::new(),
        );
        ix.add_entry(
            "go",
            "go_library",
            Label::new("lib", "outer"),
            Vec::new(),
            vec![Label::new("lib", "inner")],
        );
        ix.finish();
        let from = Label::new("app", "app");
        assert_eq!(
            ix.lookup(&spec("example.com/lib"), &from, &[]),
            vec![Label::new("lib", "outer")]
        );
    }

    #[test]
    fn referrer_embeds_are_dropped() {
        let mut ix = RuleIndex::new();
        ix.add_entry(
            "go",
            "go_library",
            Label::new("lib", "lib"),
            vec![spec("example.com/lib")],
            Vec::new(),
        );
        ix.finish();
        let from = Label::new("lib", "lib_test");
        let embeds = vec![Label::new("lib", "lib")];
        assert!(ix.lookup(&spec("example.com/lib"), &from, &embeds).is_empty());
    }

    #[test]
    fn vendor_root_detection() {
        assert_eq!(vendor_root("vendor/x"), Some("vendor".to_string()));
        assert_eq!(vendor_root("a/vendor/x/y"), Some("a/vendor".to_string()));
        assert_eq!(
            vendor_root("a/vendor/b/vendor/x"),
            Some("a/vendor/b/vendor".to_string())
        );
        assert_eq!(vendor_root("plain/pkg"), None);
    }
}
