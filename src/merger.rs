//! Merge freshly generated rules into an existing build file.
//!
//! The algebra honors user edits: elements and attributes marked `# keep`
//! survive regeneration byte-for-byte, destination comments ride along on
//! matched elements, and rules marked `# keep` are never touched at all.

use std::collections::{BTreeMap, HashSet};

use thiserror::Error;

use crate::bzl::{Arg, Ast, Comments, Expr, ExprKind, KeyValue, Stmt};
use crate::language::KindInfo;
use crate::platform::{CONDITIONS_DEFAULT, SelectDim, classify_select_key};
use crate::rules::{File, Rule};

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("attribute shape does not match the merge pattern: {0}")]
    Shape(String),
    #[error("conflicting scalar values {0:?} and {1:?}")]
    Conflict(String, String),
}

/// Which attribute set a merge pass operates on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// After generation: everything except resolver-owned attributes.
    PreResolve,
    /// After resolution: only resolver-owned attributes.
    PostResolve,
}

/// Merge `gen` rules and deletions (`empty`) into `file`.
///
/// Returns, for each generated rule, the index it occupies in `file.rules`,
/// or `None` when the existing rule is marked `# keep` and was left alone.
pub fn merge_file(
    r#gen: Vec<Rule>,
    empty: Vec<Rule>,
    file: &mut File,
    kinds: &dyn Fn(&str) -> Option<&'static KindInfo>,
) -> Vec<Option<usize>> {
    let mut positions = Vec::with_capacity(r#gen.len());
    let mut matched: HashSet<usize> = HashSet::new();
    for rule in r#gen {
        let info = kinds(rule.kind());
        match find_match(file, &rule, info) {
            None => {
                let idx = file.insert_rule(rule);
                matched.insert(idx);
                positions.push(Some(idx));
            }
            Some(idx) => {
                matched.insert(idx);
                if file.rules[idx].should_keep() {
                    positions.push(None);
                    continue;
                }
                merge_rule(&rule, &mut file.rules[idx], info, Phase::PreResolve);
                positions.push(Some(idx));
            }
        }
    }

    // Deletions apply only to rules no generated rule claimed.
    for e in empty {
        let Some(idx) = file.find_rule(e.kind(), &e.name()) else {
            continue;
        };
        if matched.contains(&idx) || file.rules[idx].should_keep() {
            continue;
        }
        let Some(info) = kinds(e.kind()) else {
            continue;
        };
        reduce_to_kept(&mut file.rules[idx], info);
        if rule_is_empty(&file.rules[idx], info) {
            file.rules[idx].delete();
        }
    }
    positions
}

/// Match by `(kind, name)`, falling back to the kind's match attributes so a
/// renamed rule with the same identity (say, the same `importpath`) merges
/// instead of being duplicated.
fn find_match(file: &File, rule: &Rule, info: Option<&KindInfo>) -> Option<usize> {
    if let Some(idx) = file.find_rule(rule.kind(), &rule.name()) {
        return Some(idx);
    }
    let info = info?;
    for attr in info.match_attrs {
        let Some(value) = rule.attr_string(attr) else {
            continue;
        };
        let hit = file.rules.iter().position(|r| {
            !r.is_deleted() && r.kind() == rule.kind() && r.attr_string(attr) == Some(value.clone())
        });
        if hit.is_some() {
            return hit;
        }
    }
    None
}

/// Merge one generated rule into its existing counterpart.
pub fn merge_rule(r#gen: &Rule, old: &mut Rule, info: Option<&KindInfo>, phase: Phase) {
    let mergeable: HashSet<&str> = info
        .map(|i| i.mergeable_attrs.iter().copied().collect())
        .unwrap_or_default();
    let resolved: HashSet<&str> = info
        .map(|i| i.resolve_attrs.iter().copied().collect())
        .unwrap_or_default();

    let mut names: Vec<String> = r#gen.attr_names();
    for name in old.attr_names() {
        // Mergeable attributes are generator-owned: absent from the fresh
        // rule means reduce-to-kept.
        if mergeable.contains(name.as_str()) && !names.contains(&name) {
            names.push(name);
        }
    }

    for name in names {
        if name == "name" {
            continue;
        }
        if name == "visibility" && old.attr("visibility").is_some() {
            continue;
        }
        let owned_by_resolver = resolved.contains(name.as_str());
        match phase {
            Phase::PreResolve if owned_by_resolver => continue,
            Phase::PostResolve if !owned_by_resolver => continue,
            _ => {}
        }
        if old.attr_is_kept(&name) {
            continue;
        }
        let gen_expr = r#gen.attr(&name);
        if mergeable.contains(name.as_str()) || owned_by_resolver {
            let old_expr = old.attr(&name);
            match merge_exprs(gen_expr, old_expr) {
                Ok(Some(merged)) => old.set_attr_expr(&name, merged),
                Ok(None) => old.del_attr(&name),
                Err(err) => {
                    eprintln!(
                        "[springbok][warn] {}: attribute {:?} left unchanged: {}",
                        old.name(),
                        name,
                        err
                    );
                }
            }
        } else {
            // Non-mergeable: generated value overwrites.
            match gen_expr {
                Some(e) => old.set_attr_expr(&name, e.clone()),
                None => {}
            }
        }
    }

    // Private attributes travel with the merge so the resolver finds them.
    for (key, value) in r#gen.private_iter() {
        old.set_private_attr(key, value.clone());
    }
}

/// Merge a resolver-produced value into a rule attribute.
pub fn merge_resolved_attr(rule: &mut Rule, attr: &str, gen_value: Option<Expr>) {
    if rule.should_keep() || rule.attr_is_kept(attr) {
        return;
    }
    match merge_exprs(gen_value.as_ref(), rule.attr(attr)) {
        Ok(Some(merged)) => rule.set_attr_expr(attr, merged),
        Ok(None) => rule.del_attr(attr),
        Err(err) => {
            eprintln!(
                "[springbok][warn] {}: attribute {:?} left unchanged: {}",
                rule.name(),
                attr,
                err
            );
        }
    }
}

/// Strip a rule down to its kept pieces (used when a kind is no longer
/// generated here).
fn reduce_to_kept(rule: &mut Rule, info: &KindInfo) {
    for attr in info.mergeable_attrs.iter().chain(info.resolve_attrs.iter()) {
        if rule.attr_is_kept(attr) {
            continue;
        }
        match merge_exprs(None, rule.attr(attr)) {
            Ok(Some(reduced)) => rule.set_attr_expr(attr, reduced),
            Ok(None) => rule.del_attr(attr),
            Err(_) => {}
        }
    }
}

fn rule_is_empty(rule: &Rule, info: &KindInfo) -> bool {
    info.non_empty_attrs.iter().all(|a| rule.attr(a).is_none())
}

/// The attribute merge algebra. `None` means "attribute absent".
pub fn merge_exprs(r#gen: Option<&Expr>, old: Option<&Expr>) -> Result<Option<Expr>, MergeError> {
    let Some(old) = old else {
        return Ok(r#gen.cloned());
    };
    // Scalars: source wins unless the destination value is marked kept.
    if is_scalar(old) && r#gen.map(is_scalar).unwrap_or(true) {
        if old.comments.has_keep() {
            return Ok(Some(old.clone()));
        }
        return Ok(r#gen.cloned().or(None));
    }

    let old_parts = decompose(old)?;
    let gen_parts = match r#gen {
        Some(g) => decompose(g)?,
        None => Decomposed::default(),
    };

    let plain = merge_lists(&gen_parts.plain, &old_parts.plain);
    let os = merge_dicts(&gen_parts.os, &old_parts.os)?;
    let arch = merge_dicts(&gen_parts.arch, &old_parts.arch)?;
    let platform = merge_dicts(&gen_parts.platform, &old_parts.platform)?;

    Ok(recompose(plain, os, arch, platform))
}

fn is_scalar(e: &Expr) -> bool {
    matches!(
        e.kind,
        ExprKind::Str { .. } | ExprKind::Int(_) | ExprKind::Ident(_) | ExprKind::Neg(_)
    )
}

/// A platform-strings shaped value: plain list + one select per dimension.
#[derive(Default)]
struct Decomposed {
    plain: Vec<Expr>,
    os: Vec<KeyValue>,
    arch: Vec<KeyValue>,
    platform: Vec<KeyValue>,
}

fn decompose(e: &Expr) -> Result<Decomposed, MergeError> {
    let mut out = Decomposed::default();
    let mut parts: Vec<&Expr> = Vec::new();
    flatten_concat(e, &mut parts);
    for part in parts {
        match &part.kind {
            ExprKind::List { elems } => out.plain.extend(elems.iter().cloned()),
            ExprKind::Call { func, args } => {
                let ExprKind::Ident(name) = &func.kind else {
                    return Err(MergeError::Shape("call is not select".to_string()));
                };
                if name != "select" || args.len() != 1 {
                    return Err(MergeError::Shape(format!("unmergeable call {}", name)));
                }
                let ExprKind::Dict { entries } = &args[0].value.kind else {
                    return Err(MergeError::Shape("select without dict".to_string()));
                };
                let dim = entries
                    .iter()
                    .map(|kv| kv.key.as_str().map(classify_select_key))
                    .find(|d| !matches!(d, Some(SelectDim::Unknown) | None))
                    .flatten()
                    .unwrap_or(SelectDim::Unknown);
                let slot = match dim {
                    SelectDim::Os => &mut out.os,
                    SelectDim::Arch => &mut out.arch,
                    SelectDim::Platform => &mut out.platform,
                    SelectDim::Unknown => {
                        return Err(MergeError::Shape(
                            "select keys not recognized".to_string(),
                        ));
                    }
                };
                if !slot.is_empty() {
                    return Err(MergeError::Shape("duplicate select dimension".to_string()));
                }
                slot.extend(entries.iter().cloned());
            }
            _ => return Err(MergeError::Shape("not a list/select shape".to_string())),
        }
    }
    Ok(out)
}

fn flatten_concat<'a>(e: &'a Expr, out: &mut Vec<&'a Expr>) {
    match &e.kind {
        ExprKind::BinOp { op: '+', lhs, rhs } => {
            flatten_concat(lhs, out);
            flatten_concat(rhs, out);
        }
        _ => out.push(e),
    }
}

/// Canonical comparison key for a list element.
fn expr_key(e: &Expr) -> String {
    match &e.kind {
        ExprKind::Str { value, .. } => value.clone(),
        ExprKind::Ident(name) => name.clone(),
        ExprKind::Int(v) => v.to_string(),
        _ => {
            let ast = Ast {
                stmts: vec![Stmt::Expr(strip_comments(e))],
            };
            crate::bzl::format_ast(&ast).trim_end().to_string()
        }
    }
}

fn strip_comments(e: &Expr) -> Expr {
    let mut e = e.clone();
    e.comments = Comments::default();
    e
}

/// List merge: source∩destination (destination comments preserved), then
/// destination elements marked keep, then the remaining source elements.
fn merge_lists(r#gen: &[Expr], old: &[Expr]) -> Vec<Expr> {
    let old_by_key: BTreeMap<String, &Expr> =
        old.iter().map(|e| (expr_key(e), e)).collect();
    let gen_keys: HashSet<String> = r#gen.iter().map(expr_key).collect();

    let mut merged: Vec<Expr> = Vec::new();
    let mut present: HashSet<String> = HashSet::new();

    for g in r#gen {
        let key = expr_key(g);
        if let Some(o) = old_by_key.get(&key) {
            if o.comments.has_keep() {
                continue; // surfaces with the kept block below
            }
            if present.insert(key) {
                merged.push((*o).clone());
            }
        }
    }
    for o in old {
        if o.comments.has_keep() {
            let key = expr_key(o);
            if present.insert(key) {
                merged.push(o.clone());
            }
        }
    }
    for g in r#gen {
        let key = expr_key(g);
        if !present.contains(&key) && gen_keys.contains(&key) {
            present.insert(key);
            merged.push(g.clone());
        }
    }
    merged
}

/// Dict merge keyed by string; values merge as lists; the default branch is
/// ordered last. Entries marked keep survive untouched.
fn merge_dicts(r#gen: &[KeyValue], old: &[KeyValue]) -> Result<Vec<KeyValue>, MergeError> {
    let mut keys: Vec<String> = Vec::new();
    let mut gen_map: BTreeMap<String, &KeyValue> = BTreeMap::new();
    let mut old_map: BTreeMap<String, &KeyValue> = BTreeMap::new();
    for kv in r#gen {
        let key = kv
            .key
            .as_str()
            .ok_or_else(|| MergeError::Shape("non-string dict key".to_string()))?;
        if !keys.contains(&key.to_string()) {
            keys.push(key.to_string());
        }
        gen_map.insert(key.to_string(), kv);
    }
    for kv in old {
        let key = kv
            .key
            .as_str()
            .ok_or_else(|| MergeError::Shape("non-string dict key".to_string()))?;
        if !keys.contains(&key.to_string()) {
            keys.push(key.to_string());
        }
        old_map.insert(key.to_string(), kv);
    }

    keys.sort();
    // Default branch last.
    if let Some(pos) = keys.iter().position(|k| k == CONDITIONS_DEFAULT) {
        let d = keys.remove(pos);
        keys.push(d);
    }

    let mut out: Vec<KeyValue> = Vec::new();
    for key in keys {
        let g = gen_map.get(&key);
        let o = old_map.get(&key);
        if let Some(o) = o {
            if o.comments.has_keep() || o.value.comments.has_keep() {
                out.push((*o).clone());
                continue;
            }
        }
        let g_elems = g.map(|kv| list_elems(&kv.value)).unwrap_or_default();
        let o_elems = o.map(|kv| list_elems(&kv.value)).unwrap_or_default();
        let merged = merge_lists(&g_elems, &o_elems);
        if merged.is_empty() && key != CONDITIONS_DEFAULT {
            continue;
        }
        let comments = o.map(|kv| kv.comments.clone()).unwrap_or_default();
        out.push(KeyValue {
            key: Expr::string(&key),
            value: Expr::list(merged),
            comments,
        });
    }
    // A dict holding only an empty default is an empty dict.
    let only_default = out.len() == 1
        && out[0].key.as_str() == Some(CONDITIONS_DEFAULT)
        && list_elems(&out[0].value).is_empty();
    if only_default {
        out.clear();
    }
    Ok(out)
}

fn list_elems(e: &Expr) -> Vec<Expr> {
    match &e.kind {
        ExprKind::List { elems } => elems.clone(),
        _ => vec![e.clone()],
    }
}

fn recompose(
    plain: Vec<Expr>,
    os: Vec<KeyValue>,
    arch: Vec<KeyValue>,
    platform: Vec<KeyValue>,
) -> Option<Expr> {
    let mut parts: Vec<Expr> = Vec::new();
    if !plain.is_empty() {
        parts.push(Expr::list(plain));
    }
    for dict in [os, arch, platform] {
        if dict.is_empty() {
            continue;
        }
        parts.push(Expr::new(ExprKind::Call {
            func: Box::new(Expr::ident("select")),
            args: vec![Arg::positional(Expr::new(ExprKind::Dict { entries: dict }))],
        }));
    }
    if parts.is_empty() {
        return None;
    }
    if parts.len() > 1 && !matches!(parts[0].kind, ExprKind::List { .. }) {
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

/// Union two rules into `dst` without discarding anything. Used by kind
/// migrations where two rules collapse into one.
pub fn squash_rules(src: &Rule, dst: &mut Rule) -> Result<(), MergeError> {
    for name in src.attr_names() {
        if name == "name" {
            continue;
        }
        let s = src.attr(&name).cloned();
        match dst.attr(&name).cloned() {
            None => {
                if let Some(s) = s {
                    dst.set_attr_expr(&name, s);
                }
            }
            Some(d) => {
                let s = s.unwrap_or_else(|| Expr::list(Vec::new()));
                let merged = squash_exprs(&s, &d)?;
                dst.set_attr_expr(&name, merged);
            }
        }
    }
    let mut comments = src.comments.clone();
    dst.comments.before.append(&mut comments.before);
    dst.comments.suffix.append(&mut comments.suffix);
    dst.comments.after.append(&mut comments.after);
    Ok(())
}

fn squash_exprs(src: &Expr, dst: &Expr) -> Result<Expr, MergeError> {
    match (&src.kind, &dst.kind) {
        (ExprKind::List { elems: s }, ExprKind::List { elems: d }) => {
            let mut out = d.clone();
            let keys: HashSet<String> = d.iter().map(expr_key).collect();
            for e in s {
                if !keys.contains(&expr_key(e)) {
                    out.push(e.clone());
                }
            }
            Ok(Expr::list(out))
        }
        (ExprKind::Str { value: s, .. }, ExprKind::Str { value: d, .. }) => {
            if s == d {
                Ok(dst.clone())
            } else {
                Err(MergeError::Conflict(s.clone(), d.clone()))
            }
        }
        (ExprKind::Dict { entries: s }, ExprKind::Dict { entries: d }) => {
            let merged = merge_dicts(s, d)?;
            Ok(Expr::new(ExprKind::Dict { entries: merged }))
        }
        _ => Err(MergeError::Shape("cannot squash these shapes".to_string())),
    }
}
