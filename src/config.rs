//! Per-directory configuration, inherited by cloning.
//!
//! A single [`Config`] is built at startup, then cloned on every directory
//! descent; directives in a build file mutate the clone and apply from that
//! directory down. Optional defaults load from `.springbok/config.toml`.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::language::golang::GoConfig;
use crate::language::proto::ProtoConfig;
use crate::resolve::ResolveConfig;
use crate::rules::File;
use crate::walk::WalkConfig;

/// Default build-file names, tried in order.
pub const DEFAULT_BUILD_FILE_NAMES: &[&str] = &["BUILD.bazel", "BUILD"];

#[derive(Clone, Debug)]
pub struct Config {
    /// Canonical absolute path of the repository root.
    pub repo_root: PathBuf,
    /// Build-file names tried in order during discovery.
    pub build_file_names: Vec<String>,
    /// Escalate recoverable diagnostics to fatal errors.
    pub strict: bool,
    pub verbose: bool,
    pub walk: WalkConfig,
    pub resolve: ResolveConfig,
    pub go: GoConfig,
    pub proto: ProtoConfig,
}

impl Config {
    pub fn new(repo_root: &Path) -> Config {
        Config {
            repo_root: repo_root.to_path_buf(),
            build_file_names: DEFAULT_BUILD_FILE_NAMES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            strict: false,
            verbose: false,
            walk: WalkConfig::default(),
            resolve: ResolveConfig::default(),
            go: GoConfig::default(),
            proto: ProtoConfig::default(),
        }
    }
}

/// Directive keys owned by the core (not any language).
pub const CORE_DIRECTIVES: &[&str] = &["build_file_name", "exclude", "follow", "ignore", "resolve"];

/// Warn about unrecognized directive keys, with a did-you-mean nudge for
/// near-misses. Returns false under strict mode when an unknown key is seen.
pub fn check_directives(config: &Config, rel: &str, file: &File, known: &[&str]) -> bool {
    let mut ok = true;
    for d in &file.directives {
        if known.contains(&d.key.as_str()) {
            continue;
        }
        let suggestion = known
            .iter()
            .map(|k| (strsim::levenshtein(k, &d.key), *k))
            .min()
            .filter(|(dist, _)| *dist <= 2)
            .map(|(_, k)| format!(" (did you mean {:?}?)", k))
            .unwrap_or_default();
        eprintln!(
            "[springbok][warn] {}: unknown directive {:?}{}",
            if rel.is_empty() { "." } else { rel },
            d.key,
            suggestion
        );
        if config.strict {
            ok = false;
        }
    }
    ok
}

/// Optional workspace defaults, `.springbok/config.toml`.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub generate: GenerateDefaults,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct GenerateDefaults {
    /// Overrides the build-file discovery order.
    #[serde(default)]
    pub build_file_names: Vec<String>,
    /// Import-path prefix, as if `# springbok:prefix` were set at the root.
    #[serde(default)]
    pub prefix: String,
    /// Extra exclude patterns applied from the root.
    #[serde(default)]
    pub excludes: Vec<String>,
    #[serde(default)]
    pub strict: bool,
}

impl ConfigFile {
    /// Load from `.springbok/config.toml` in the given root directory.
    /// Returns defaults if the file doesn't exist or is invalid.
    pub fn load(root: &Path) -> Self {
        let path = root.join(".springbok").join("config.toml");
        Self::load_from_path(&path)
    }

    pub fn load_from_path(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("[springbok][warn] failed to parse {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                eprintln!("[springbok][warn] failed to read {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Fold the file's defaults into a fresh config.
    pub fn apply(&self, config: &mut Config) {
        if !self.generate.build_file_names.is_empty() {
            config.build_file_names = self.generate.build_file_names.clone();
        }
        if !self.generate.prefix.is_empty() {
            config.go.prefix = self.generate.prefix.clone();
            config.go.prefix_set = true;
        }
        for pattern in &self.generate.excludes {
            config.walk.excludes.push(pattern.clone());
        }
        if self.generate.strict {
            config.strict = true;
        }
    }
}
