//! Repository traversal.
//!
//! The tree is read concurrently into an in-memory trie (build files parsed
//! along the way), then a sequential pass clones configuration down and runs
//! the callback bottom-up, children before parents, in lexicographic order.
//! That split keeps the rule index and the merge step free of data races.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::{Glob, GlobSet, GlobSetBuilder};
use rayon::prelude::*;

use crate::config::Config;
use crate::rules::File;

/// Which directories get visited and which get the update flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Visit everything; update the given directories and their subtrees.
    VisitAllUpdateSubdirs,
    /// Visit everything; update only the given directories.
    VisitAllUpdateDirs,
    /// Visit only the given directories (ancestors supply config).
    UpdateDirs,
    /// Visit the given directories and their subtrees.
    UpdateSubdirs,
}

/// Walker-owned configuration, inherited by cloning.
#[derive(Clone, Debug, Default)]
pub struct WalkConfig {
    /// Accumulated exclude patterns, repo-root relative.
    pub excludes: Vec<String>,
    /// Symlink-follow whitelist patterns, repo-root relative.
    pub follow: Vec<String>,
    /// Generation suppressed from this directory down.
    pub ignore: bool,
    /// Literal paths from the root ignore file.
    pub ignore_exact: Arc<HashSet<String>>,
}

/// What the per-directory callback receives.
pub struct WalkEvent {
    pub dir: PathBuf,
    pub rel: String,
    pub config: Config,
    /// Whether this directory's build file may be rewritten.
    pub update: bool,
    pub file: Option<File>,
    pub subdirs: Vec<String>,
    pub regular_files: Vec<String>,
    /// Outputs declared by existing rules (`out` / `outs`).
    pub gen_files: Vec<String>,
    /// A recoverable error was recorded for this directory.
    pub error: bool,
}

/// Apply walker directives to the configuration for this directory.
pub fn configure(c: &mut Config, rel: &str, file: Option<&File>) {
    let Some(file) = file else { return };
    for d in &file.directives {
        match d.key.as_str() {
            "exclude" => c.walk.excludes.push(join_pattern(rel, &d.value)),
            "follow" => c.walk.follow.push(join_pattern(rel, &d.value)),
            "ignore" => c.walk.ignore = d.value.is_empty() || d.value == "true",
            "build_file_name" => {
                c.build_file_names = d
                    .value
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            }
            _ => {}
        }
    }
}

/// Load the repository-root ignore file: one literal path per line, `#`
/// comments and blank lines skipped, trailing slashes stripped. A missing or
/// unreadable file is not an error.
pub fn load_ignore_file(root: &Path) -> HashSet<String> {
    let path = root.join(".springbokignore");
    let Ok(content) = fs::read_to_string(&path) else {
        return HashSet::new();
    };
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|l| l.trim_end_matches('/').to_string())
        .collect()
}

/// Walk the repository. `dirs` are repo-relative paths selecting what to
/// update per `mode` (empty string means the root). `configure` runs
/// top-down on each cloned config; `callback` runs post-order.
pub fn walk(
    config: &Config,
    mode: Mode,
    dirs: &[String],
    configure_fn: &mut dyn FnMut(&mut Config, &str, Option<&File>),
    callback: &mut dyn FnMut(WalkEvent),
) {
    let state = ReadState {
        build_file_names: config.build_file_names.clone(),
        excludes: config.walk.excludes.clone(),
        exclude_set: compile(&config.walk.excludes),
        follow: config.walk.follow.clone(),
        follow_set: compile(&config.walk.follow),
        ignore_exact: config.walk.ignore_exact.clone(),
    };
    let prune = Prune { mode, dirs };
    let root = read_tree(&config.repo_root, "", &state, &Vec::new(), &prune);
    visit(config, root, mode, dirs, configure_fn, callback);
}

fn visit(
    parent: &Config,
    node: DirNode,
    mode: Mode,
    dirs: &[String],
    configure_fn: &mut dyn FnMut(&mut Config, &str, Option<&File>),
    callback: &mut dyn FnMut(WalkEvent),
) {
    let mut c = parent.clone();
    configure_fn(&mut c, &node.rel, node.file.as_ref());

    let DirNode {
        rel,
        subdirs,
        regular_files,
        file,
        parse_err,
        read_err,
    } = node;

    let subdir_names: Vec<String> = subdirs
        .iter()
        .map(|d| d.rel.rsplit('/').next().unwrap_or(&d.rel).to_string())
        .collect();
    for child in subdirs {
        visit(&c, child, mode, dirs, configure_fn, callback);
    }

    if !should_call(mode, &rel, dirs) {
        return;
    }
    let error = parse_err || read_err;
    let update = should_update(mode, &rel, dirs) && !error && !c.walk.ignore;
    let gen_files = file
        .as_ref()
        .map(File::generated_file_names)
        .unwrap_or_default();
    let dir = if rel.is_empty() {
        c.repo_root.clone()
    } else {
        c.repo_root.join(&rel)
    };
    callback(WalkEvent {
        dir,
        rel,
        config: c,
        update,
        file,
        subdirs: subdir_names,
        regular_files,
        gen_files,
        error,
    });
}

fn is_under(rel: &str, dir: &str) -> bool {
    dir.is_empty() || rel == dir || rel.starts_with(&format!("{}/", dir))
}

fn is_ancestor(rel: &str, dir: &str) -> bool {
    rel.is_empty() || dir == rel || dir.starts_with(&format!("{}/", rel))
}

fn should_call(mode: Mode, rel: &str, dirs: &[String]) -> bool {
    match mode {
        Mode::VisitAllUpdateSubdirs | Mode::VisitAllUpdateDirs => true,
        Mode::UpdateDirs => dirs.iter().any(|d| d == rel),
        Mode::UpdateSubdirs => dirs.iter().any(|d| is_under(rel, d)),
    }
}

fn should_update(mode: Mode, rel: &str, dirs: &[String]) -> bool {
    match mode {
        Mode::VisitAllUpdateSubdirs | Mode::UpdateSubdirs => {
            dirs.iter().any(|d| is_under(rel, d))
        }
        Mode::VisitAllUpdateDirs | Mode::UpdateDirs => dirs.iter().any(|d| d == rel),
    }
}

struct Prune<'a> {
    mode: Mode,
    dirs: &'a [String],
}

impl Prune<'_> {
    /// Whether the reader should descend into `rel`.
    fn descend(&self, rel: &str) -> bool {
        match self.mode {
            Mode::VisitAllUpdateSubdirs | Mode::VisitAllUpdateDirs => true,
            Mode::UpdateDirs => self.dirs.iter().any(|d| is_ancestor(rel, d)),
            Mode::UpdateSubdirs => self
                .dirs
                .iter()
                .any(|d| is_ancestor(rel, d) || is_under(rel, d)),
        }
    }
}

/// One node of the concurrently-read directory trie.
struct DirNode {
    rel: String,
    subdirs: Vec<DirNode>,
    regular_files: Vec<String>,
    file: Option<File>,
    parse_err: bool,
    read_err: bool,
}

#[derive(Clone)]
struct ReadState {
    build_file_names: Vec<String>,
    excludes: Vec<String>,
    exclude_set: Option<Arc<GlobSet>>,
    follow: Vec<String>,
    follow_set: Option<Arc<GlobSet>>,
    ignore_exact: Arc<HashSet<String>>,
}

impl ReadState {
    fn excluded(&self, rel_path: &str) -> bool {
        if self.ignore_exact.contains(rel_path) {
            return true;
        }
        self.exclude_set
            .as_ref()
            .map(|s| s.is_match(rel_path))
            .unwrap_or(false)
    }

    fn followed(&self, rel_path: &str) -> bool {
        self.follow_set
            .as_ref()
            .map(|s| s.is_match(rel_path))
            .unwrap_or(false)
    }
}

/// Build a globset from user patterns, warning on invalid ones.
pub fn build_globset(patterns: &[String]) -> Option<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    let mut added = false;
    for pat in patterns {
        if pat.trim().is_empty() {
            continue;
        }
        match Glob::new(pat) {
            Ok(glob) => {
                builder.add(glob);
                added = true;
            }
            Err(err) => eprintln!("[springbok][warn] invalid glob '{}': {}", pat, err),
        }
    }
    if !added { None } else { builder.build().ok() }
}

fn compile(patterns: &[String]) -> Option<Arc<GlobSet>> {
    build_globset(patterns).map(Arc::new)
}

pub fn join_pattern(rel: &str, pattern: &str) -> String {
    if rel.is_empty() {
        pattern.to_string()
    } else {
        format!("{}/{}", rel, pattern)
    }
}

fn read_tree(
    dir: &Path,
    rel: &str,
    state: &ReadState,
    ancestors: &Vec<PathBuf>,
    prune: &Prune<'_>,
) -> DirNode {
    let mut node = DirNode {
        rel: rel.to_string(),
        subdirs: Vec::new(),
        regular_files: Vec::new(),
        file: None,
        parse_err: false,
        read_err: false,
    };

    // The canonical ancestor chain breaks cycles introduced by followed
    // symlinks: re-entering any directory already on the path is refused.
    let canon = fs::canonicalize(dir).ok();
    let mut chain = ancestors.clone();
    if let Some(c) = &canon {
        chain.push(c.clone());
    }

    let entries = match fs::read_dir(dir) {
        Ok(iter) => {
            let mut entries: Vec<fs::DirEntry> = iter.filter_map(Result::ok).collect();
            entries.sort_by_key(|e| e.file_name());
            entries
        }
        Err(err) => {
            eprintln!("[springbok][warn] {}: {}", dir.display(), err);
            node.read_err = true;
            return node;
        }
    };
    let names: Vec<String> = entries
        .iter()
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();

    // Build-file discovery: configured names in order, first hit wins.
    for candidate in &state.build_file_names {
        if !names.iter().any(|n| n == candidate) {
            continue;
        }
        let path = dir.join(candidate);
        if !path.is_file() {
            continue;
        }
        match fs::read_to_string(&path) {
            Ok(content) => match File::parse(&content, &path, rel) {
                Ok(file) => node.file = Some(file),
                Err(err) => {
                    eprintln!("[springbok][warn] {}: {}", path.display(), err);
                    node.parse_err = true;
                }
            },
            Err(err) => {
                eprintln!("[springbok][warn] {}: {}", path.display(), err);
                node.parse_err = true;
            }
        }
        break;
    }

    // This directory's directives shape what its entries see.
    let mut child_state = state.clone();
    if let Some(file) = &node.file {
        let mut changed_excludes = false;
        let mut changed_follow = false;
        for d in &file.directives {
            match d.key.as_str() {
                "exclude" => {
                    child_state.excludes.push(join_pattern(rel, &d.value));
                    changed_excludes = true;
                }
                "follow" => {
                    child_state.follow.push(join_pattern(rel, &d.value));
                    changed_follow = true;
                }
                "build_file_name" => {
                    child_state.build_file_names = d
                        .value
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect();
                }
                _ => {}
            }
        }
        if changed_excludes {
            child_state.exclude_set = compile(&child_state.excludes);
        }
        if changed_follow {
            child_state.follow_set = compile(&child_state.follow);
        }
    }

    let mut child_dirs: Vec<(PathBuf, String)> = Vec::new();
    for (entry, name) in entries.iter().zip(names.iter()) {
        if name == ".git" {
            continue;
        }
        let rel_entry = join_pattern(rel, name);
        if child_state.excluded(&rel_entry) {
            continue;
        }
        let path = entry.path();
        let Ok(ft) = entry.file_type() else { continue };

        if ft.is_symlink() {
            // Links to files list as files; links to directories are
            // ignored unless whitelisted by a follow directive.
            let Ok(meta) = fs::metadata(&path) else { continue };
            if meta.is_file() {
                node.regular_files.push(name.clone());
            } else if meta.is_dir() && child_state.followed(&rel_entry) {
                match fs::canonicalize(&path) {
                    Ok(target) if chain.contains(&target) => continue,
                    Ok(_) => child_dirs.push((path, rel_entry)),
                    Err(_) => continue,
                }
            }
            continue;
        }
        if ft.is_file() {
            node.regular_files.push(name.clone());
            continue;
        }
        if ft.is_dir() && prune.descend(&rel_entry) {
            child_dirs.push((path, rel_entry));
        }
    }

    // Bounded fan-out: the thread pool caps concurrent directory reads.
    node.subdirs = child_dirs
        .into_par_iter()
        .map(|(path, rel_entry)| read_tree(&path, &rel_entry, &child_state, &chain, prune))
        .collect();
    node.subdirs.sort_by(|a, b| a.rel.cmp(&b.rel));
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, "").expect("write");
    }

    fn collect_walk(root: &Path, mode: Mode, dirs: &[String]) -> Vec<(String, bool)> {
        let mut config = Config::new(root);
        config.walk.ignore_exact = Arc::new(load_ignore_file(root));
        let mut seen = Vec::new();
        walk(
            &config,
            mode,
            dirs,
            &mut configure,
            &mut |event: WalkEvent| {
                seen.push((event.rel.clone(), event.update));
            },
        );
        seen
    }

    #[test]
    fn callbacks_run_post_order_lexicographic() {
        let tmp = TempDir::new().expect("tmp");
        let root = tmp.path();
        touch(&root.join("b/deep/x.go"));
        touch(&root.join("a/y.go"));
        touch(&root.join("z.go"));

        let seen = collect_walk(root, Mode::VisitAllUpdateSubdirs, &[String::new()]);
        let rels: Vec<&str> = seen.iter().map(|(r, _)| r.as_str()).collect();
        assert_eq!(rels, vec!["a", "b/deep", "b", ""]);
        assert!(seen.iter().all(|(_, update)| *update));
    }

    #[test]
    fn git_dir_always_excluded() {
        let tmp = TempDir::new().expect("tmp");
        let root = tmp.path();
        touch(&root.join(".git/config"));
        touch(&root.join("pkg/a.go"));

        let seen = collect_walk(root, Mode::VisitAllUpdateSubdirs, &[String::new()]);
        let rels: Vec<&str> = seen.iter().map(|(r, _)| r.as_str()).collect();
        assert_eq!(rels, vec!["pkg", ""]);
    }

    #[test]
    fn exclude_directive_prunes_subtree() {
        let tmp = TempDir::new().expect("tmp");
        let root = tmp.path();
        fs::write(
            root.join("BUILD.bazel"),
            "# springbok:exclude skipme\n",
        )
        .expect("write build");
        touch(&root.join("skipme/a.go"));
        touch(&root.join("kept/b.go"));

        let seen = collect_walk(root, Mode::VisitAllUpdateSubdirs, &[String::new()]);
        let rels: Vec<&str> = seen.iter().map(|(r, _)| r.as_str()).collect();
        assert_eq!(rels, vec!["kept", ""]);
    }

    #[test]
    fn exclude_glob_filters_files() {
        let tmp = TempDir::new().expect("tmp");
        let root = tmp.path();
        fs::write(
            root.join("BUILD.bazel"),
            "# springbok:exclude **/*.pb.go\n",
        )
        .expect("write build");
        touch(&root.join("sub/a.pb.go"));
        touch(&root.join("sub/c.go"));

        let config = Config::new(root);
        let mut files_by_rel: Vec<(String, Vec<String>)> = Vec::new();
        walk(
            &config,
            Mode::VisitAllUpdateSubdirs,
            &[String::new()],
            &mut configure,
            &mut |event: WalkEvent| {
                files_by_rel.push((event.rel.clone(), event.regular_files.clone()));
            },
        );
        let sub = files_by_rel
            .iter()
            .find(|(rel, _)| rel == "sub")
            .expect("sub visited");
        assert_eq!(sub.1, vec!["c.go".to_string()]);
    }

    #[test]
    fn ignore_file_excludes_literal_paths() {
        let tmp = TempDir::new().expect("tmp");
        let root = tmp.path();
        fs::write(root.join(".springbokignore"), "# comment\n\nvendor_cache/\n").expect("write");
        touch(&root.join("vendor_cache/a.go"));
        touch(&root.join("kept/b.go"));

        let seen = collect_walk(root, Mode::VisitAllUpdateSubdirs, &[String::new()]);
        let rels: Vec<&str> = seen.iter().map(|(r, _)| r.as_str()).collect();
        assert_eq!(rels, vec!["kept", ""]);
    }

    #[test]
    fn update_dirs_mode_limits_callbacks() {
        let tmp = TempDir::new().expect("tmp");
        let root = tmp.path();
        touch(&root.join("a/x.go"));
        touch(&root.join("a/sub/y.go"));
        touch(&root.join("b/z.go"));

        let seen = collect_walk(root, Mode::UpdateDirs, &["a".to_string()]);
        let rels: Vec<(&str, bool)> = seen.iter().map(|(r, u)| (r.as_str(), *u)).collect();
        assert_eq!(rels, vec![("a", true)]);
    }

    #[test]
    fn update_subdirs_mode_updates_subtree() {
        let tmp = TempDir::new().expect("tmp");
        let root = tmp.path();
        touch(&root.join("a/x.go"));
        touch(&root.join("a/sub/y.go"));
        touch(&root.join("b/z.go"));

        let seen = collect_walk(root, Mode::UpdateSubdirs, &["a".to_string()]);
        let rels: Vec<(&str, bool)> = seen.iter().map(|(r, u)| (r.as_str(), *u)).collect();
        assert_eq!(rels, vec![("a/sub", true), ("a", true)]);
    }

    #[test]
    fn visit_all_update_dirs_flags_only_given() {
        let tmp = TempDir::new().expect("tmp");
        let root = tmp.path();
        touch(&root.join("a/x.go"));
        touch(&root.join("b/z.go"));

        let seen = collect_walk(root, Mode::VisitAllUpdateDirs, &["a".to_string()]);
        let rels: Vec<(&str, bool)> = seen.iter().map(|(r, u)| (r.as_str(), *u)).collect();
        assert_eq!(rels, vec![("a", true), ("b", false), ("", false)]);
    }

    #[test]
    fn parse_error_suppresses_update() {
        let tmp = TempDir::new().expect("tmp");
        let root = tmp.path();
        fs::write(root.join("BUILD.bazel"), "go_library(name = )\n").expect("write");
        touch(&root.join("a.go"));

        let seen = collect_walk(root, Mode::VisitAllUpdateSubdirs, &[String::new()]);
        assert_eq!(seen, vec![(String::new(), false)]);
    }

    #[test]
    fn ignore_directive_suppresses_update() {
        let tmp = TempDir::new().expect("tmp");
        let root = tmp.path();
        fs::create_dir_all(root.join("sub")).expect("mkdir");
        fs::write(root.join("sub/BUILD.bazel"), "# springbok:ignore\n").expect("write");
        touch(&root.join("sub/a.go"));

        let seen = collect_walk(root, Mode::VisitAllUpdateSubdirs, &[String::new()]);
        let sub = seen.iter().find(|(r, _)| r == "sub").expect("sub visited");
        assert!(!sub.1);
        let top = seen.iter().find(|(r, _)| r.is_empty()).expect("root");
        assert!(top.1);
    }

    #[test]
    #[cfg(unix)]
    fn symlink_dirs_ignored_unless_followed() {
        use std::os::unix::fs::symlink;
        let tmp = TempDir::new().expect("tmp");
        let root = tmp.path();
        touch(&root.join("real/a.go"));
        symlink(root.join("real"), root.join("linked")).expect("symlink");

        let seen = collect_walk(root, Mode::VisitAllUpdateSubdirs, &[String::new()]);
        let rels: Vec<&str> = seen.iter().map(|(r, _)| r.as_str()).collect();
        assert!(!rels.contains(&"linked"));

        fs::write(root.join("BUILD.bazel"), "# springbok:follow linked\n").expect("write");
        let seen = collect_walk(root, Mode::VisitAllUpdateSubdirs, &[String::new()]);
        let rels: Vec<&str> = seen.iter().map(|(r, _)| r.as_str()).collect();
        assert!(rels.contains(&"linked"));
        assert!(rels.contains(&"real"));
    }

    #[test]
    #[cfg(unix)]
    fn followed_symlink_cycles_are_broken() {
        use std::os::unix::fs::symlink;
        let tmp = TempDir::new().expect("tmp");
        let root = tmp.path();
        touch(&root.join("a/x.go"));
        symlink(root, root.join("a/loop")).expect("symlink");
        fs::write(root.join("BUILD.bazel"), "# springbok:follow **\n").expect("write");

        // Finishes without recursing forever.
        let seen = collect_walk(root, Mode::VisitAllUpdateSubdirs, &[String::new()]);
        assert!(seen.iter().any(|(r, _)| r == "a"));
    }
}
