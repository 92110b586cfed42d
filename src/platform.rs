//! Platform-conditional string carriers.
//!
//! Attribute values like sources and dependencies are frequently conditional
//! on the target platform. [`PlatformStrings`] is the composite carrier for
//! that shape: a generic list plus per-OS, per-architecture, and per-platform
//! buckets. It converts to the build-file form
//! `[...] + select({...}) + select({...})` and back (see the merger).

use std::collections::BTreeMap;

use once_cell::sync::Lazy;

use crate::bzl::{Expr, ExprKind, KeyValue};

/// Operating systems understood by filename suffixes and constraint tags.
pub const KNOWN_OS: &[&str] = &[
    "android", "darwin", "dragonfly", "freebsd", "illumos", "ios", "js", "linux", "netbsd",
    "openbsd", "plan9", "solaris", "windows",
];

/// CPU architectures understood by filename suffixes and constraint tags.
pub const KNOWN_ARCH: &[&str] = &[
    "386", "amd64", "arm", "arm64", "mips", "mips64", "mips64le", "mipsle", "ppc64", "ppc64le",
    "riscv64", "s390x", "wasm",
];

/// The select key namespace for platform constraints.
pub const CONSTRAINT_PREFIX: &str = "@io_bazel_rules_go//go/platform:";

/// The catch-all select branch, always ordered last.
pub const CONDITIONS_DEFAULT: &str = "//conditions:default";

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn new(os: &str, arch: &str) -> Platform {
        Platform {
            os: os.to_string(),
            arch: arch.to_string(),
        }
    }

    pub fn tag(&self) -> String {
        format!("{}_{}", self.os, self.arch)
    }
}

/// The os/arch pairs a constrained file is evaluated against.
pub static DEFAULT_PLATFORMS: Lazy<Vec<Platform>> = Lazy::new(|| {
    let pairs: &[(&str, &str)] = &[
        ("android", "386"),
        ("android", "amd64"),
        ("android", "arm"),
        ("android", "arm64"),
        ("darwin", "amd64"),
        ("darwin", "arm64"),
        ("dragonfly", "amd64"),
        ("freebsd", "386"),
        ("freebsd", "amd64"),
        ("freebsd", "arm"),
        ("illumos", "amd64"),
        ("ios", "amd64"),
        ("ios", "arm64"),
        ("js", "wasm"),
        ("linux", "386"),
        ("linux", "amd64"),
        ("linux", "arm"),
        ("linux", "arm64"),
        ("linux", "mips"),
        ("linux", "mips64"),
        ("linux", "mips64le"),
        ("linux", "mipsle"),
        ("linux", "ppc64"),
        ("linux", "ppc64le"),
        ("linux", "riscv64"),
        ("linux", "s390x"),
        ("netbsd", "386"),
        ("netbsd", "amd64"),
        ("netbsd", "arm"),
        ("openbsd", "386"),
        ("openbsd", "amd64"),
        ("openbsd", "arm"),
        ("plan9", "386"),
        ("plan9", "amd64"),
        ("plan9", "arm"),
        ("solaris", "amd64"),
        ("windows", "386"),
        ("windows", "amd64"),
        ("windows", "arm64"),
    ];
    pairs.iter().map(|(os, arch)| Platform::new(os, arch)).collect()
});

pub fn is_known_os(name: &str) -> bool {
    KNOWN_OS.contains(&name)
}

pub fn is_known_arch(name: &str) -> bool {
    KNOWN_ARCH.contains(&name)
}

pub fn constraint_label(tag: &str) -> String {
    format!("{}{}", CONSTRAINT_PREFIX, tag)
}

/// Which select dimension a constraint key belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectDim {
    Os,
    Arch,
    Platform,
    Unknown,
}

/// Classify a select key (`@.../go/platform:linux_amd64`) by its tag.
pub fn classify_select_key(key: &str) -> SelectDim {
    if key == CONDITIONS_DEFAULT {
        return SelectDim::Unknown;
    }
    let tag = key.rsplit(':').next().unwrap_or(key);
    if is_known_os(tag) {
        return SelectDim::Os;
    }
    if is_known_arch(tag) {
        return SelectDim::Arch;
    }
    if let Some((os, arch)) = tag.split_once('_') {
        if is_known_os(os) && is_known_arch(arch) {
            return SelectDim::Platform;
        }
    }
    SelectDim::Unknown
}

/// Conditional string lists: a generic list plus os, arch, and os/arch maps.
/// Keys are plain tags (`linux`, `amd64`, `linux_amd64`); they become
/// constraint labels only when converting to an expression.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlatformStrings {
    pub generic: Vec<String>,
    pub os: BTreeMap<String, Vec<String>>,
    pub arch: BTreeMap<String, Vec<String>>,
    pub platform: BTreeMap<String, Vec<String>>,
}

impl PlatformStrings {
    pub fn new() -> PlatformStrings {
        PlatformStrings::default()
    }

    pub fn from_generic(values: Vec<String>) -> PlatformStrings {
        PlatformStrings {
            generic: values,
            ..PlatformStrings::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.generic.is_empty()
            && self.os.values().all(Vec::is_empty)
            && self.arch.values().all(Vec::is_empty)
            && self.platform.values().all(Vec::is_empty)
    }

    pub fn add_generic(&mut self, v: String) {
        self.generic.push(v);
    }

    pub fn add_os(&mut self, os: &str, v: String) {
        self.os.entry(os.to_string()).or_default().push(v);
    }

    pub fn add_arch(&mut self, arch: &str, v: String) {
        self.arch.entry(arch.to_string()).or_default().push(v);
    }

    pub fn add_platform(&mut self, tag: &str, v: String) {
        self.platform.entry(tag.to_string()).or_default().push(v);
    }

    /// All strings across every bucket, in bucket order.
    pub fn iter_all(&self) -> impl Iterator<Item = &String> {
        self.generic
            .iter()
            .chain(self.os.values().flatten())
            .chain(self.arch.values().flatten())
            .chain(self.platform.values().flatten())
    }

    /// Apply `f` to every string, dropping `None` results; each bucket is
    /// sorted and deduplicated afterwards. Empty buckets disappear.
    pub fn map_filter(&self, f: impl Fn(&str) -> Option<String>) -> PlatformStrings {
        let apply = |values: &Vec<String>| -> Vec<String> {
            let mut out: Vec<String> = values.iter().filter_map(|v| f(v)).collect();
            out.sort();
            out.dedup();
            out
        };
        let map_bucket = |m: &BTreeMap<String, Vec<String>>| -> BTreeMap<String, Vec<String>> {
            m.iter()
                .filter_map(|(k, vs)| {
                    let mapped = apply(vs);
                    if mapped.is_empty() {
                        None
                    } else {
                        Some((k.clone(), mapped))
                    }
                })
                .collect()
        };
        PlatformStrings {
            generic: apply(&self.generic),
            os: map_bucket(&self.os),
            arch: map_bucket(&self.arch),
            platform: map_bucket(&self.platform),
        }
    }

    /// Build the `list + select + select + select` expression. Returns None
    /// when every bucket is empty. Each select carries a default branch.
    pub fn to_expr(&self) -> Option<Expr> {
        let mut parts: Vec<Expr> = Vec::new();
        if !self.generic.is_empty() {
            let mut values = self.generic.clone();
            values.sort();
            values.dedup();
            parts.push(Expr::list(
                values.iter().map(|v| Expr::string(v)).collect(),
            ));
        }
        for bucket in [&self.os, &self.arch, &self.platform] {
            if bucket.values().all(Vec::is_empty) || bucket.is_empty() {
                continue;
            }
            parts.push(select_expr(bucket));
        }
        if parts.is_empty() {
            return None;
        }
        if parts.len() == 1 && !self.generic.is_empty() {
            return parts.pop();
        }
        // An empty leading list keeps concatenation shapes uniform.
        if self.generic.is_empty() {
            parts.insert(0, Expr::list(Vec::new()));
        }
        let mut iter = parts.into_iter();
        let first = iter.next()?;
        Some(iter.fold(first, |lhs, rhs| {
            Expr::new(ExprKind::BinOp {
                op: '+',
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            })
        }))
    }
}

fn select_expr(bucket: &BTreeMap<String, Vec<String>>) -> Expr {
    let mut entries: Vec<KeyValue> = bucket
        .iter()
        .filter(|(_, vs)| !vs.is_empty())
        .map(|(tag, vs)| {
            let mut values = vs.clone();
            values.sort();
            values.dedup();
            KeyValue {
                key: Expr::string(&constraint_label(tag)),
                value: Expr::list(values.iter().map(|v| Expr::string(v)).collect()),
                comments: Default::default(),
            }
        })
        .collect();
    entries.push(KeyValue {
        key: Expr::string(CONDITIONS_DEFAULT),
        value: Expr::list(Vec::new()),
        comments: Default::default(),
    });
    Expr::new(ExprKind::Call {
        func: Box::new(Expr::ident("select")),
        args: vec![crate::bzl::Arg::positional(Expr::new(ExprKind::Dict {
            entries,
        }))],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bzl::format_ast;
    use crate::bzl::{Ast, Stmt};

    fn render(e: Expr) -> String {
        format_ast(&Ast {
            stmts: vec![Stmt::Expr(e)],
        })
    }

    #[test]
    fn classifies_select_keys() {
        assert_eq!(
            classify_select_key("@io_bazel_rules_go//go/platform:linux"),
            SelectDim::Os
        );
        assert_eq!(
            classify_select_key("@io_bazel_rules_go//go/platform:amd64"),
            SelectDim::Arch
        );
        assert_eq!(
            classify_select_key("@io_bazel_rules_go//go/platform:linux_amd64"),
            SelectDim::Platform
        );
        assert_eq!(classify_select_key("//conditions:default"), SelectDim::Unknown);
        assert_eq!(classify_select_key("//some:config"), SelectDim::Unknown);
    }

    #[test]
    fn generic_only_renders_plain_list() {
        let ps = PlatformStrings::from_generic(vec!["b.go".to_string(), "a.go".to_string()]);
        let got = render(ps.to_expr().expect("expr"));
        assert_eq!(got, "[\n    \"a.go\",\n    \"b.go\",\n]\n");
    }

    #[test]
    fn os_bucket_renders_select_with_default() {
        let mut ps = PlatformStrings::new();
        ps.add_generic("a.go".to_string());
        ps.add_os("linux", "l.go".to_string());
        let got = render(ps.to_expr().expect("expr"));
        assert!(got.starts_with("[\"a.go\"] + select({\n"));
        assert!(got.contains("\"@io_bazel_rules_go//go/platform:linux\": [\"l.go\"],\n"));
        assert!(got.contains("\"//conditions:default\": [],\n"));
    }

    #[test]
    fn empty_generic_gets_placeholder_list() {
        let mut ps = PlatformStrings::new();
        ps.add_os("windows", "w.go".to_string());
        let got = render(ps.to_expr().expect("expr"));
        assert!(got.starts_with("[] + select({\n"));
    }

    #[test]
    fn map_filter_drops_and_dedupes() {
        let mut ps = PlatformStrings::new();
        ps.add_generic("fmt".to_string());
        ps.add_generic("example.com/x".to_string());
        ps.add_os("linux", "example.com/x".to_string());
        let mapped = ps.map_filter(|imp| {
            if imp == "fmt" {
                None
            } else {
                Some(format!("//vendor/{}", imp))
            }
        });
        assert_eq!(mapped.generic, vec!["//vendor/example.com/x".to_string()]);
        assert_eq!(
            mapped.os.get("linux"),
            Some(&vec!["//vendor/example.com/x".to_string()])
        );
    }

    #[test]
    fn empty_carrier_yields_no_expr() {
        assert!(PlatformStrings::new().to_expr().is_none());
    }
}
