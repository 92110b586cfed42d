//! The two-pass pipeline driver.
//!
//! Pass 1 walks the repository: per directory it runs the fixers, asks every
//! language to generate rules, and merges them into the existing build file
//! (resolver-owned attributes untouched). The rule index is built from the
//! merged state. Pass 2 resolves each generated rule's imports into its
//! `deps`, fixes loads, and writes changed files atomically.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use serde::Serialize;

use crate::config::{self, Config, ConfigFile};
use crate::index::RuleIndex;
use crate::label::Label;
use crate::language::{self, GenerateArgs, LANGUAGES, LoadInfo};
use crate::merger;
use crate::resolve::{self, RemoteCache};
use crate::rules::{File, Rule};
use crate::walk::{self, Mode, WalkEvent};

/// What to do with changed build files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Action {
    /// Rewrite files in place.
    #[default]
    Fix,
    /// Print changed files to stdout.
    Print,
    /// Report what would change, touch nothing.
    DryRun,
}

#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    /// Directories to update, relative to the root (empty: the whole tree).
    pub dirs: Vec<PathBuf>,
    /// Update subtrees of the given directories rather than just them.
    pub recursive: bool,
    pub action: Action,
    pub strict: bool,
    pub verbose: bool,
    /// CLI override for build-file discovery names.
    pub build_file_names: Option<Vec<String>>,
    /// CLI override for the import-path prefix.
    pub prefix: Option<String>,
}

impl RunOptions {
    pub fn new() -> RunOptions {
        RunOptions {
            recursive: true,
            ..RunOptions::default()
        }
    }
}

/// Machine-readable summary of one run.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub schema: &'static str,
    pub version: &'static str,
    pub generated_at: String,
    pub root: String,
    pub dirs_visited: usize,
    pub rules_generated: usize,
    pub files_written: Vec<String>,
    pub errors: Vec<String>,
}

impl RunReport {
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

struct DirResult {
    rel: String,
    config: Config,
    file: File,
    update: bool,
    /// Indexes into `file.rules` for rules awaiting resolution.
    pending: Vec<usize>,
}

/// Run the generator over the repository rooted at `root`.
pub fn run(root: &Path, opts: &RunOptions, rc: &dyn RemoteCache) -> anyhow::Result<RunReport> {
    let root = root
        .canonicalize()
        .with_context(|| format!("repository root {}", root.display()))?;

    let mut cfg = Config::new(&root);
    ConfigFile::load(&root).apply(&mut cfg);
    if let Some(names) = &opts.build_file_names {
        cfg.build_file_names = names.clone();
    }
    if let Some(prefix) = &opts.prefix {
        cfg.go.prefix = prefix.clone();
        cfg.go.prefix_set = true;
    }
    cfg.strict = cfg.strict || opts.strict;
    cfg.verbose = opts.verbose;
    cfg.walk.ignore_exact = Arc::new(walk::load_ignore_file(&root));

    let dirs = rels_for(&root, &opts.dirs)?;
    let mode = if opts.recursive {
        Mode::VisitAllUpdateSubdirs
    } else {
        Mode::VisitAllUpdateDirs
    };

    let known_directives: Vec<&'static str> = config::CORE_DIRECTIVES
        .iter()
        .copied()
        .chain(LANGUAGES.iter().flat_map(|l| l.known_directives().iter().copied()))
        .collect();

    let mut results: Vec<DirResult> = Vec::new();
    let mut errors: Vec<String> = Vec::new();
    let mut fatal = false;
    let mut visited = 0usize;
    let mut rules_generated = 0usize;

    {
        let mut configure_all = |c: &mut Config, rel: &str, file: Option<&File>| {
            walk::configure(c, rel, file);
            resolve::configure(c, rel, file);
            for lang in LANGUAGES {
                lang.configure(c, rel, file);
            }
            if let Some(f) = file {
                if !config::check_directives(c, rel, f, &known_directives) {
                    fatal = true;
                }
            }
        };

        let mut callback = |event: WalkEvent| {
            visited += 1;
            let WalkEvent {
                dir,
                rel,
                config: dir_cfg,
                update,
                file,
                subdirs,
                regular_files,
                gen_files,
                error,
            } = event;
            if error {
                errors.push(format!(
                    "{}: build file error, directory not updated",
                    if rel.is_empty() { "." } else { rel.as_str() }
                ));
            }
            let mut file = file.unwrap_or_else(|| {
                let name = dir_cfg
                    .build_file_names
                    .first()
                    .map(String::as_str)
                    .unwrap_or("BUILD.bazel");
                File::new_empty(&dir.join(name), &rel)
            });

            let mut pending: Vec<usize> = Vec::new();
            if update {
                for lang in LANGUAGES {
                    lang.fix(&dir_cfg, &mut file);
                }
                let mut all_gen: Vec<Rule> = Vec::new();
                let mut all_empty: Vec<Rule> = Vec::new();
                for lang in LANGUAGES {
                    let result = lang.generate(GenerateArgs {
                        config: &dir_cfg,
                        dir: &dir,
                        rel: &rel,
                        file: Some(&file),
                        subdirs: &subdirs,
                        regular_files: &regular_files,
                        gen_files: &gen_files,
                        other_gen: &all_gen,
                        other_empty: &all_empty,
                    });
                    all_gen.extend(result.r#gen);
                    all_empty.extend(result.empty);
                }
                let positions =
                    merger::merge_file(all_gen, all_empty, &mut file, &language::kind_info);
                pending = positions.into_iter().flatten().collect();
                rules_generated += pending.len();
            }

            results.push(DirResult {
                rel,
                config: dir_cfg,
                file,
                update,
                pending,
            });
        };

        walk::walk(&cfg, mode, &dirs, &mut configure_all, &mut callback);
    }

    if fatal && (cfg.strict || opts.strict) {
        bail!("unknown directives in strict mode");
    }
    if cfg.strict && !errors.is_empty() {
        bail!("{}", errors.join("; "));
    }

    // Every rule visible after pass 1 feeds the index.
    let mut ix = RuleIndex::new();
    for dr in &results {
        for idx in dr.file.rule_indexes() {
            ix.add_rule(&dr.config, &dr.file.rules[idx], &dr.file);
        }
    }
    ix.finish();

    // Pass 2: resolve, fix loads, write.
    let load_infos: Vec<LoadInfo> = LANGUAGES.iter().flat_map(|l| l.loads()).collect();
    let mut files_written: Vec<String> = Vec::new();
    for dr in &mut results {
        if !dr.update {
            continue;
        }
        for &idx in &dr.pending {
            if dr.file.rules[idx].is_deleted() {
                continue;
            }
            let name = dr.file.rules[idx].name();
            let from = Label::new(&dr.rel, &name);
            let lang = dr.file.rules[idx]
                .private_attr("_lang")
                .and_then(|v| v.as_str())
                .and_then(language::language_by_name)
                .or_else(|| language::language_for_kind(dr.file.rules[idx].kind()));
            if let Some(lang) = lang {
                lang.resolve(&dr.config, &ix, rc, &mut dr.file.rules[idx], &from);
            }
        }
        dr.file.fix_loads(&load_infos);

        let content = dr.file.format();
        // A file that never existed and has nothing to say stays unwritten.
        if dr.file.original.is_none() && dr.file.ast.stmts.is_empty() {
            continue;
        }
        let unchanged = dr.file.original.as_deref() == Some(content.as_str());
        if unchanged {
            continue;
        }
        let shown = dr
            .file
            .path
            .strip_prefix(&root)
            .unwrap_or(&dr.file.path)
            .to_string_lossy()
            .to_string();
        match opts.action {
            Action::Fix => {
                write_atomic(&dr.file.path, &content)?;
                if opts.verbose {
                    eprintln!("[springbok] wrote {}", shown);
                }
            }
            Action::Print => {
                print!("# {}\n{}", shown, content);
            }
            Action::DryRun => {
                eprintln!("[springbok] would write {}", shown);
            }
        }
        files_written.push(shown);
    }

    Ok(RunReport {
        schema: "springbok-run",
        version: env!("CARGO_PKG_VERSION"),
        generated_at: chrono::Utc::now().to_rfc3339(),
        root: root.to_string_lossy().to_string(),
        dirs_visited: visited,
        rules_generated,
        files_written,
        errors,
    })
}

fn rels_for(root: &Path, dirs: &[PathBuf]) -> anyhow::Result<Vec<String>> {
    if dirs.is_empty() {
        return Ok(vec![String::new()]);
    }
    let mut out = Vec::new();
    for dir in dirs {
        let abs = if dir.is_absolute() {
            dir.clone()
        } else {
            root.join(dir)
        };
        let canon = abs
            .canonicalize()
            .with_context(|| format!("directory {}", dir.display()))?;
        let rel = canon
            .strip_prefix(root)
            .with_context(|| format!("{} is outside the repository", dir.display()))?;
        out.push(rel.to_string_lossy().replace('\\', "/"));
    }
    Ok(out)
}

fn write_atomic(path: &Path, content: &str) -> anyhow::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("temp file in {}", dir.display()))?;
    tmp.write_all(content.as_bytes())?;
    tmp.persist(path)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
