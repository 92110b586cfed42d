//! Cross-package import resolution support.
//!
//! Holds the pieces shared by every language resolver: import specs, the
//! `# springbok:resolve` override table carried on the config chain, and the
//! injected remote-metadata interface.

use crate::config::Config;
use crate::label::Label;
use crate::rules::File;

/// An import as seen by one language: `(language tag, import string)`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ImportSpec {
    pub lang: String,
    pub imp: String,
}

impl ImportSpec {
    pub fn new(lang: &str, imp: &str) -> ImportSpec {
        ImportSpec {
            lang: lang.to_string(),
            imp: imp.to_string(),
        }
    }
}

/// Resolution overrides, inherited down the directory tree. Deeper
/// directives win, so lookup scans from the back.
#[derive(Clone, Debug, Default)]
pub struct ResolveConfig {
    pub overrides: Vec<(ImportSpec, Label)>,
}

/// Apply `resolve` directives:
/// `# springbok:resolve <lang> <import> <label>` or, with an explicit source
/// language, `# springbok:resolve <lang> <source-lang> <import> <label>`.
pub fn configure(c: &mut Config, _rel: &str, file: Option<&File>) {
    let Some(file) = file else { return };
    for d in &file.directives {
        if d.key != "resolve" {
            continue;
        }
        let fields: Vec<&str> = d.value.split_whitespace().collect();
        let (lang, imp, label) = match fields.len() {
            3 => (fields[0], fields[1], fields[2]),
            4 => (fields[0], fields[2], fields[3]),
            _ => {
                eprintln!(
                    "[springbok][warn] malformed resolve directive: {:?}",
                    d.value
                );
                continue;
            }
        };
        match Label::parse(label) {
            Ok(parsed) => c
                .resolve
                .overrides
                .push((ImportSpec::new(lang, imp), parsed)),
            Err(err) => eprintln!(
                "[springbok][warn] resolve directive label {:?}: {}",
                label, err
            ),
        }
    }
}

/// Explicit override for an import, if any. Takes absolute precedence.
pub fn find_override(c: &Config, spec: &ImportSpec) -> Option<Label> {
    c.resolve
        .overrides
        .iter()
        .rev()
        .find(|(s, _)| s == spec)
        .map(|(_, l)| l.clone())
}

/// Repository root metadata for an external import, as reported by the
/// injected cache. All fields are opaque to the core.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteRoot {
    pub repo_name: String,
    pub root_path: String,
    pub vcs: String,
}

/// Injected interface for external package metadata. Implementations own
/// their concurrency and retry behavior; the core never goes to the network.
pub trait RemoteCache {
    fn root_for_import(&self, importpath: &str, verbose: bool) -> Option<RemoteRoot>;
    fn head_commit(&self, remote: &str, vcs: &str) -> Option<String>;
}

/// The default cache: knows nothing.
pub struct NoRemoteCache;

impl RemoteCache for NoRemoteCache {
    fn root_for_import(&self, _importpath: &str, _verbose: bool) -> Option<RemoteRoot> {
        None
    }

    fn head_commit(&self, _remote: &str, _vcs: &str) -> Option<String> {
        None
    }
}

/// Derive an external repository name from an import path:
/// `github.com/foo/bar-baz` becomes `com_github_foo_bar_baz`.
pub fn import_path_to_repo_name(importpath: &str) -> String {
    let mut components: Vec<String> = Vec::new();
    let mut segments = importpath.split('/');
    if let Some(host) = segments.next() {
        let mut host_parts: Vec<&str> = host.split('.').collect();
        host_parts.reverse();
        components.extend(host_parts.iter().map(|p| p.to_string()));
    }
    components.extend(segments.map(str::to_string));
    components
        .join("_")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
