//! Rule generation for one directory of Go sources.

use crate::config::Config;
use crate::language::{GenerateArgs, GenerateResult};
use crate::rules::{PrivateValue, Rule};

use super::embed::expand_embeds;
use super::fileinfo::{Ext, classify_ext, file_info, file_info_from_disk};
use super::package::{GoPackage, build_package};
use super::NamingConvention;

pub fn generate(args: &GenerateArgs<'_>) -> GenerateResult {
    let c = args.config;
    let mut infos = Vec::new();
    for name in args.regular_files {
        if args.config.build_file_names.iter().any(|b| b == name) {
            continue;
        }
        if classify_ext(name) == Ext::Unknown {
            continue;
        }
        infos.push(file_info_from_disk(args.dir, name));
    }
    for name in args.gen_files {
        if classify_ext(name) == Ext::Unknown {
            continue;
        }
        if args.regular_files.iter().any(|f| f == name) {
            continue;
        }
        // Declared outputs may not exist yet; filename metadata suffices.
        infos.push(file_info(name, ""));
    }

    let importpath = import_path(c, args.rel);
    let mut r#gen: Vec<Rule> = Vec::new();
    if let Some(pkg) = build_package(c, args.rel, &infos) {
        r#gen = rules_for_package(args, &pkg, &importpath);
    }

    // Deletion markers for every conventional name we could have used but
    // didn't. Rules with other names are left to the merger's match logic.
    let base = conventional_base(args.rel, &importpath);
    let mut candidates: Vec<(&str, String)> = match c.go.naming {
        NamingConvention::Import => vec![
            ("go_library", base.clone()),
            ("go_library", format!("{}_lib", base)),
            ("go_binary", base.clone()),
            ("go_test", format!("{}_test", base)),
        ],
        NamingConvention::GoDefault => vec![
            ("go_library", "go_default_library".to_string()),
            ("go_binary", base.clone()),
            ("go_test", "go_default_test".to_string()),
        ],
    };
    candidates.retain(|(kind, name)| {
        !r#gen.iter().any(|g| g.kind() == *kind && g.name() == *name)
    });
    let empty: Vec<Rule> = candidates
        .into_iter()
        .map(|(kind, name)| Rule::new(kind, &name))
        .collect();

    GenerateResult { r#gen, empty }
}

fn conventional_base(rel: &str, importpath: &str) -> String {
    let base = if importpath.is_empty() {
        rel.rsplit('/').next().unwrap_or("lib")
    } else {
        importpath.rsplit('/').next().unwrap_or("lib")
    };
    if base.is_empty() {
        "lib".to_string()
    } else {
        base.to_string()
    }
}

fn rules_for_package(args: &GenerateArgs<'_>, pkg: &GoPackage, importpath: &str) -> Vec<Rule> {
    let c = args.config;
    let base = conventional_base(args.rel, importpath);

    let (lib_name, bin_name, test_name) = match c.go.naming {
        NamingConvention::Import => {
            if pkg.has_main {
                (format!("{}_lib", base), base.clone(), format!("{}_test", base))
            } else {
                (base.clone(), base.clone(), format!("{}_test", base))
            }
        }
        NamingConvention::GoDefault => (
            "go_default_library".to_string(),
            base.clone(),
            "go_default_test".to_string(),
        ),
    };

    let mut out = Vec::new();
    let have_library = !pkg.library.is_empty();

    if have_library {
        let mut lib = Rule::new("go_library", &lib_name);
        lib.set_attr("srcs", pkg.library.srcs.clone());
        if !pkg.library.embed_patterns.is_empty() {
            let embedsrcs = expand_embeds(
                args.dir,
                args.rel,
                &pkg.library.embed_patterns,
                args.regular_files,
                args.gen_files,
                args.subdirs,
                &c.build_file_names,
            );
            lib.set_attr("embedsrcs", embedsrcs);
        }
        if !importpath.is_empty() {
            lib.set_attr("importpath", importpath);
        }
        if let Some(importmap) = import_map(c, args.rel, importpath) {
            lib.set_attr("importmap", importmap);
        }
        if pkg.library.cgo {
            lib.set_attr("cgo", true);
            lib.set_attr("copts", pkg.library.copts.clone());
            lib.set_attr("clinkopts", pkg.library.clinkopts.clone());
        }
        let visibility = if pkg.has_main {
            "//visibility:private".to_string()
        } else {
            default_visibility(args.rel)
        };
        lib.set_attr("visibility", vec![visibility]);
        lib.set_private_attr("_imports", PrivateValue::Platform(pkg.library.imports.clone()));
        lib.set_private_attr("_lang", PrivateValue::Str("go".to_string()));
        out.push(lib);
    }

    if pkg.has_main && have_library {
        let mut bin = Rule::new("go_binary", &bin_name);
        bin.set_attr("embed", vec![format!(":{}", lib_name)]);
        bin.set_attr("visibility", vec!["//visibility:public".to_string()]);
        bin.set_private_attr("_lang", PrivateValue::Str("go".to_string()));
        out.push(bin);
    }

    if !pkg.test.is_empty() {
        let mut test = Rule::new("go_test", &test_name);
        test.set_attr("srcs", pkg.test.srcs.clone());
        if pkg.has_internal_test && have_library {
            test.set_attr("embed", vec![format!(":{}", lib_name)]);
        }
        test.set_private_attr("_imports", PrivateValue::Platform(pkg.test.imports.clone()));
        test.set_private_attr("_lang", PrivateValue::Str("go".to_string()));
        out.push(test);
    }

    out
}

/// The Go import path for a directory: prefix plus the path below where the
/// prefix was set; vendored packages use the path after `vendor/`.
pub fn import_path(c: &Config, rel: &str) -> String {
    if let Some(vendored) = path_after_vendor(rel) {
        return vendored;
    }
    let below = if c.go.prefix_rel.is_empty() {
        rel
    } else if rel == c.go.prefix_rel {
        ""
    } else {
        rel.strip_prefix(&format!("{}/", c.go.prefix_rel))
            .unwrap_or(rel)
    };
    match (c.go.prefix.is_empty(), below.is_empty()) {
        (true, _) => below.to_string(),
        (false, true) => c.go.prefix.clone(),
        (false, false) => format!("{}/{}", c.go.prefix, below),
    }
}

fn path_after_vendor(rel: &str) -> Option<String> {
    let mut result = None;
    let segs: Vec<&str> = rel.split('/').collect();
    for (i, seg) in segs.iter().enumerate() {
        if *seg == "vendor" && i + 1 < segs.len() {
            result = Some(segs[i + 1..].join("/"));
        }
    }
    result
}

fn import_map(c: &Config, rel: &str, importpath: &str) -> Option<String> {
    if c.go.importmap_prefix.is_empty() || path_after_vendor(rel).is_none() {
        return None;
    }
    Some(format!("{}/{}", c.go.importmap_prefix, importpath))
}

/// Libraries under an `internal` directory are only importable from the
/// subtree rooted at its parent.
fn default_visibility(rel: &str) -> String {
    let segs: Vec<&str> = rel.split('/').collect();
    let internal_pos = segs.iter().rposition(|s| *s == "internal");
    match internal_pos {
        Some(pos) => format!("//{}:__subpackages__", segs[..pos].join("/")),
        None => "//visibility:public".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn config_with_prefix(prefix: &str) -> Config {
        let mut c = Config::new(Path::new("/repo"));
        c.go.prefix = prefix.to_string();
        c.go.prefix_set = true;
        c
    }

    #[test]
    fn import_paths() {
        let c = config_with_prefix("example.com/repo");
        assert_eq!(import_path(&c, ""), "example.com/repo");
        assert_eq!(import_path(&c, "a/b"), "example.com/repo/a/b");
        assert_eq!(
            import_path(&c, "vendor/github.com/x/y"),
            "github.com/x/y"
        );
        assert_eq!(
            import_path(&c, "sub/vendor/github.com/x/y"),
            "github.com/x/y"
        );

        let bare = Config::new(Path::new("/repo"));
        assert_eq!(import_path(&bare, "a/b"), "a/b");
    }

    #[test]
    fn internal_visibility() {
        assert_eq!(default_visibility("a/b"), "//visibility:public");
        assert_eq!(
            default_visibility("a/internal/b"),
            "//a:__subpackages__"
        );
        assert_eq!(default_visibility("internal/x"), "//:__subpackages__");
    }
}
