//! Grouping inspected files into one buildable Go package.
//!
//! Each file lands in a platform bucket: generic when unconstrained, an OS
//! or architecture bucket when its constraint matches entire rows or columns
//! of the platform matrix, and per-platform entries otherwise.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::Config;
use crate::platform::{DEFAULT_PLATFORMS, Platform, PlatformStrings};

use super::fileinfo::{Ext, FileInfo};

#[derive(Clone, Debug, Default)]
pub struct GoTarget {
    pub srcs: PlatformStrings,
    pub imports: PlatformStrings,
    pub copts: Vec<String>,
    pub clinkopts: Vec<String>,
    pub embed_patterns: Vec<String>,
    pub cgo: bool,
}

impl GoTarget {
    pub fn is_empty(&self) -> bool {
        self.srcs.is_empty()
    }

    fn add(&mut self, info: &FileInfo, bucket: &Bucket) {
        add_to_bucket(&mut self.srcs, bucket, info.name.clone());
        for imp in &info.imports {
            add_to_bucket(&mut self.imports, bucket, imp.clone());
        }
        for pattern in &info.embeds {
            if !self.embed_patterns.contains(pattern) {
                self.embed_patterns.push(pattern.clone());
            }
        }
        if info.is_cgo {
            self.cgo = true;
        }
        for opt in &info.copts {
            if !self.copts.contains(opt) {
                self.copts.push(opt.clone());
            }
        }
        for opt in &info.clinkopts {
            if !self.clinkopts.contains(opt) {
                self.clinkopts.push(opt.clone());
            }
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct GoPackage {
    pub name: String,
    pub has_main: bool,
    pub library: GoTarget,
    pub test: GoTarget,
    /// Test files whose package clause matches the library package.
    pub has_internal_test: bool,
}

#[derive(Debug, PartialEq)]
enum Bucket {
    Generic,
    Os(Vec<String>),
    Arch(Vec<String>),
    Platform(Vec<Platform>),
    Never,
}

fn add_to_bucket(ps: &mut PlatformStrings, bucket: &Bucket, value: String) {
    match bucket {
        Bucket::Generic => {
            if !ps.generic.contains(&value) {
                ps.add_generic(value);
            }
        }
        Bucket::Os(oses) => {
            for os in oses {
                ps.add_os(os, value.clone());
            }
        }
        Bucket::Arch(arches) => {
            for arch in arches {
                ps.add_arch(arch, value.clone());
            }
        }
        Bucket::Platform(platforms) => {
            for p in platforms {
                ps.add_platform(&p.tag(), value.clone());
            }
        }
        Bucket::Never => {}
    }
}

fn classify(info: &FileInfo, tags: &BTreeSet<String>) -> Bucket {
    if !info.is_constrained() {
        return Bucket::Generic;
    }
    let matching: Vec<&Platform> = DEFAULT_PLATFORMS
        .iter()
        .filter(|p| info.applies(tags, &p.os, &p.arch))
        .collect();
    if matching.is_empty() {
        return Bucket::Never;
    }
    if matching.len() == DEFAULT_PLATFORMS.len() {
        return Bucket::Generic;
    }

    // Whole-OS rows?
    let mut by_os: BTreeMap<&str, usize> = BTreeMap::new();
    for p in &matching {
        *by_os.entry(p.os.as_str()).or_default() += 1;
    }
    let os_rows_complete = by_os.iter().all(|(os, &count)| {
        DEFAULT_PLATFORMS.iter().filter(|p| p.os == *os).count() == count
    });
    if os_rows_complete {
        return Bucket::Os(by_os.keys().map(|s| s.to_string()).collect());
    }

    // Whole-arch columns?
    let mut by_arch: BTreeMap<&str, usize> = BTreeMap::new();
    for p in &matching {
        *by_arch.entry(p.arch.as_str()).or_default() += 1;
    }
    let arch_cols_complete = by_arch.iter().all(|(arch, &count)| {
        DEFAULT_PLATFORMS.iter().filter(|p| p.arch == *arch).count() == count
    });
    if arch_cols_complete {
        return Bucket::Arch(by_arch.keys().map(|s| s.to_string()).collect());
    }

    Bucket::Platform(matching.into_iter().cloned().collect())
}

/// Assemble the package for one directory. Returns None when the directory
/// holds no buildable Go sources, or when multiple packages collide and none
/// matches the directory name.
pub fn build_package(c: &Config, rel: &str, infos: &[FileInfo]) -> Option<GoPackage> {
    let go_files: Vec<&FileInfo> = infos.iter().filter(|i| i.ext == Ext::Go).collect();
    if go_files.is_empty() {
        return None;
    }

    // Logical package per file; external tests belong to the package they
    // test.
    let mut package_names: BTreeSet<String> = BTreeSet::new();
    for info in &go_files {
        if info.package.is_empty() {
            continue;
        }
        let name = info
            .package
            .strip_suffix("_test")
            .unwrap_or(&info.package)
            .to_string();
        package_names.insert(name);
    }
    if package_names.is_empty() {
        return None;
    }

    let dir_name = rel.rsplit('/').next().unwrap_or(rel);
    let chosen = if package_names.len() == 1 {
        package_names.iter().next().cloned()?
    } else if package_names.contains(dir_name) {
        eprintln!(
            "[springbok][warn] {}: multiple Go packages ({}); choosing {:?}",
            if rel.is_empty() { "." } else { rel },
            package_names.iter().cloned().collect::<Vec<_>>().join(", "),
            dir_name
        );
        dir_name.to_string()
    } else if package_names.contains("main") {
        eprintln!(
            "[springbok][warn] {}: multiple Go packages; choosing \"main\"",
            if rel.is_empty() { "." } else { rel }
        );
        "main".to_string()
    } else {
        eprintln!(
            "[springbok][warn] {}: multiple Go packages ({}) and none matches the directory; skipping",
            if rel.is_empty() { "." } else { rel },
            package_names.iter().cloned().collect::<Vec<_>>().join(", ")
        );
        return None;
    };

    let mut pkg = GoPackage {
        name: chosen.clone(),
        ..GoPackage::default()
    };
    let cgo = go_files
        .iter()
        .any(|i| i.is_cgo && belongs(i, &chosen) && !i.is_test);

    for info in infos {
        match info.ext {
            Ext::Go => {
                if !belongs(info, &chosen) {
                    continue;
                }
                let bucket = classify(info, &c.go.build_tags);
                if bucket == Bucket::Never {
                    continue;
                }
                if info.is_test {
                    if !info.is_external_test {
                        pkg.has_internal_test = true;
                    }
                    pkg.test.add(info, &bucket);
                } else {
                    if info.package == "main" {
                        pkg.has_main = true;
                    }
                    pkg.library.add(info, &bucket);
                }
            }
            Ext::Asm => {
                let bucket = classify(info, &c.go.build_tags);
                if bucket != Bucket::Never {
                    pkg.library.add(info, &bucket);
                }
            }
            Ext::C => {
                // C sources and headers ride along only for cgo packages.
                if cgo {
                    let bucket = classify(info, &c.go.build_tags);
                    if bucket != Bucket::Never {
                        pkg.library.add(info, &bucket);
                    }
                }
            }
            Ext::Unknown => {}
        }
    }
    Some(pkg)
}

fn belongs(info: &FileInfo, chosen: &str) -> bool {
    let base = info.package.strip_suffix("_test").unwrap_or(&info.package);
    base == chosen || info.package.is_empty()
}
