//! The polymorphic surface each language front end implements.
//!
//! Languages are registered statically; dispatch is by rule kind. A language
//! inspects source files, emits rule skeletons with unresolved imports in
//! private attributes, and later resolves those imports against the index.

use std::path::Path;

use crate::config::Config;
use crate::index::RuleIndex;
use crate::label::Label;
use crate::resolve::{ImportSpec, RemoteCache};
use crate::rules::{File, Rule};

pub mod golang;
pub mod proto;

pub use crate::rules::LoadInfo;

/// Static, per-kind facts the merger and index need.
#[derive(Clone, Copy, Debug)]
pub struct KindInfo {
    /// Attributes that identify a rule besides its name.
    pub match_attrs: &'static [&'static str],
    /// A rule with none of these present is empty and may be deleted.
    pub non_empty_attrs: &'static [&'static str],
    /// Attributes merged with the algebra instead of overwritten.
    pub mergeable_attrs: &'static [&'static str],
    /// Attributes whose final value comes from the resolver.
    pub resolve_attrs: &'static [&'static str],
    /// Whether cross-package imports may resolve to this kind.
    pub importable: bool,
}

/// Everything a language sees for one directory.
pub struct GenerateArgs<'a> {
    pub config: &'a Config,
    pub dir: &'a Path,
    pub rel: &'a str,
    pub file: Option<&'a File>,
    pub subdirs: &'a [String],
    pub regular_files: &'a [String],
    pub gen_files: &'a [String],
    /// Rules generated by languages earlier in the registry, this directory.
    pub other_gen: &'a [Rule],
    pub other_empty: &'a [Rule],
}

#[derive(Default)]
pub struct GenerateResult {
    /// Rules to insert or merge.
    pub r#gen: Vec<Rule>,
    /// Rules that are no longer generated here; matching existing rules are
    /// deleted (subject to keep).
    pub empty: Vec<Rule>,
}

pub trait Language: Sync {
    fn name(&self) -> &'static str;

    fn known_directives(&self) -> &'static [&'static str];

    /// Apply this language's directives to the per-directory config clone.
    fn configure(&self, c: &mut Config, rel: &str, file: Option<&File>);

    /// The kinds this language owns.
    fn kinds(&self) -> &'static [(&'static str, KindInfo)];

    fn loads(&self) -> Vec<LoadInfo>;

    fn generate(&self, args: GenerateArgs<'_>) -> GenerateResult;

    /// What an existing rule provides to importers (for the index).
    fn imports(&self, c: &Config, rule: &Rule, file: &File) -> Vec<ImportSpec>;

    /// Labels whose sources this rule absorbs (`embed` chains).
    fn embeds(&self, rule: &Rule, from: &Label) -> Vec<Label>;

    /// Fill the rule's resolved attributes from its private import list.
    fn resolve(
        &self,
        c: &Config,
        ix: &RuleIndex,
        rc: &dyn RemoteCache,
        rule: &mut Rule,
        from: &Label,
    );

    /// Apply kind migrations to an existing file before merging.
    fn fix(&self, c: &Config, file: &mut File);
}

static GO: golang::GoLanguage = golang::GoLanguage;
static PROTO: proto::ProtoLanguage = proto::ProtoLanguage;

/// Registered languages, generation order. Proto runs first so other
/// languages can see its output in `other_gen`.
pub static LANGUAGES: &[&(dyn Language)] = &[&PROTO, &GO];

/// Kind table lookup across every registered language.
pub fn kind_info(kind: &str) -> Option<&'static KindInfo> {
    for lang in LANGUAGES {
        for (k, info) in lang.kinds() {
            if *k == kind {
                return Some(info);
            }
        }
    }
    None
}

/// The language whose kind table contains `kind`.
pub fn language_for_kind(kind: &str) -> Option<&'static dyn Language> {
    for lang in LANGUAGES {
        if lang.kinds().iter().any(|(k, _)| *k == kind) {
            return Some(*lang);
        }
    }
    None
}

/// The language registered under `name`.
pub fn language_by_name(name: &str) -> Option<&'static dyn Language> {
    LANGUAGES.iter().copied().find(|l| l.name() == name)
}
