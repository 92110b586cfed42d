//! Go dependency resolution: private import lists become `deps` labels.

use crate::config::Config;
use crate::index::RuleIndex;
use crate::label::Label;
use crate::merger::merge_resolved_attr;
use crate::resolve::{ImportSpec, RemoteCache, find_override, import_path_to_repo_name};
use crate::rules::Rule;

use super::DepMode;

/// Go-style standard library test: the first path element of a stdlib
/// import never contains a dot.
pub fn is_standard(imp: &str) -> bool {
    let first = imp.split('/').next().unwrap_or(imp);
    !first.contains('.')
}

/// Resolve every import in the rule's private `_imports` carrier and merge
/// the result into `deps`. Platform-conditional imports produce
/// platform-conditional deps.
pub fn resolve_go(
    c: &Config,
    ix: &RuleIndex,
    rc: &dyn RemoteCache,
    rule: &mut Rule,
    from: &Label,
) {
    let Some(imports) = rule
        .private_attr("_imports")
        .and_then(|v| v.as_platform())
        .cloned()
    else {
        return;
    };
    let own_importpath = rule.attr_string("importpath").unwrap_or_default();
    let embeds: Vec<Label> = rule
        .attr_strings("embed")
        .unwrap_or_default()
        .iter()
        .filter_map(|s| Label::parse(s).ok())
        .map(|l| l.abs(&from.repo, &from.pkg))
        .collect();

    let deps = imports.map_filter(|imp| {
        resolve_import(c, ix, rc, imp, from, &own_importpath, &embeds)
            .map(|label| label.rel(&from.repo, &from.pkg).to_string())
    });
    merge_resolved_attr(rule, "deps", deps.to_expr());
}

fn resolve_import(
    c: &Config,
    ix: &RuleIndex,
    rc: &dyn RemoteCache,
    imp: &str,
    from: &Label,
    own_importpath: &str,
    embeds: &[Label],
) -> Option<Label> {
    // Explicit overrides take absolute precedence.
    let spec = ImportSpec::new("go", imp);
    if let Some(label) = find_override(c, &spec) {
        return Some(label.abs(&from.repo, &from.pkg));
    }
    if imp == "C" || is_standard(imp) {
        return None;
    }
    // Importing yourself (or a target you embed) is never a dependency.
    if imp == own_importpath {
        return None;
    }

    let hits = ix.lookup(&spec, from, embeds);
    match hits.len() {
        0 => {}
        1 => return hits.into_iter().next(),
        _ => {
            eprintln!(
                "[springbok][warn] {}: import {:?} is ambiguous: {}",
                from,
                imp,
                hits.iter()
                    .map(|l| l.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            return None;
        }
    }

    match c.go.dep_mode {
        DepMode::External => Some(external_label(c, rc, imp)),
        DepMode::Vendored => Some(vendored_label(imp)),
    }
}

fn vendored_label(imp: &str) -> Label {
    let name = imp.rsplit('/').next().unwrap_or(imp);
    Label::new(&format!("vendor/{}", imp), name)
}

/// Label under an external repository. The remote cache names the root when
/// it can; otherwise the root is guessed from well-known host shapes.
fn external_label(c: &Config, rc: &dyn RemoteCache, imp: &str) -> Label {
    let root = rc
        .root_for_import(imp, c.verbose)
        .map(|r| r.root_path)
        .unwrap_or_else(|| guess_root(imp));
    let repo = import_path_to_repo_name(&root);
    let pkg = imp
        .strip_prefix(&root)
        .map(|rest| rest.trim_start_matches('/'))
        .unwrap_or("");
    let name = if pkg.is_empty() {
        root.rsplit('/').next().unwrap_or(&root)
    } else {
        pkg.rsplit('/').next().unwrap_or(pkg)
    };
    Label::external(&repo, pkg, name)
}

/// Hosts whose repositories live at `host/user/repo`.
const THREE_PART_HOSTS: &[&str] = &[
    "github.com",
    "gitlab.com",
    "bitbucket.org",
    "golang.org",
    "gopkg.in",
];

fn guess_root(imp: &str) -> String {
    let parts: Vec<&str> = imp.split('/').collect();
    if let Some(host) = parts.first() {
        if THREE_PART_HOSTS.contains(host) && parts.len() >= 3 {
            return parts[..3].join("/");
        }
    }
    imp.to_string()
}
