//! Structured, edit-preserving view over build files.
//!
//! A [`File`] wraps a parsed build (or macro) file and exposes its loads and
//! rules as mutable working copies. Untouched statements round-trip through
//! the printer unchanged; edits are reconciled back into the syntax tree by
//! [`File::sync`]. Private attributes carry data between pipeline phases and
//! never appear in output.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::bzl::{
    self, Arg, Ast, Comments, DefStmt, Expr, ExprKind, LoadStmt, ParseError, Stmt,
};

pub mod value;
pub use value::{PrivateValue, Value};

/// Directive comments look like `# springbok:<key> <value>`.
pub const DIRECTIVE_PREFIX: &str = "springbok";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Directive {
    pub key: String,
    pub value: String,
}

/// Parse one comment line as a directive, if it is one.
pub fn parse_directive(comment: &str) -> Option<Directive> {
    let text = comment.trim_start_matches('#').trim_start();
    let rest = text.strip_prefix(DIRECTIVE_PREFIX)?.strip_prefix(':')?;
    let mut parts = rest.splitn(2, [' ', '\t']);
    let key = parts.next()?.trim().to_string();
    if key.is_empty() {
        return None;
    }
    let value = parts.next().unwrap_or("").trim().to_string();
    Some(Directive { key, value })
}

/// Which symbols a kind requires from which module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadInfo {
    pub name: String,
    pub symbols: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct Load {
    pub stmt: LoadStmt,
    index: Option<usize>,
    deleted: bool,
    updated: bool,
}

impl Load {
    pub fn new(module: &str) -> Load {
        Load {
            stmt: LoadStmt::new(module),
            index: None,
            deleted: false,
            updated: false,
        }
    }

    pub fn module(&self) -> &str {
        &self.stmt.module
    }
}

/// Working copy of one rule call.
#[derive(Clone, Debug)]
pub struct Rule {
    kind: String,
    positional: Vec<Arg>,
    attrs: BTreeMap<String, Arg>,
    pub comments: Comments,
    func_comments: Comments,
    private: BTreeMap<String, PrivateValue>,
    index: Option<usize>,
    deleted: bool,
    updated: bool,
}

impl Rule {
    pub fn new(kind: &str, name: &str) -> Rule {
        let mut rule = Rule {
            kind: kind.to_string(),
            positional: Vec::new(),
            attrs: BTreeMap::new(),
            comments: Comments::default(),
            func_comments: Comments::default(),
            private: BTreeMap::new(),
            index: None,
            deleted: false,
            updated: true,
        };
        if !name.is_empty() {
            rule.attrs
                .insert("name".to_string(), Arg::keyword("name", Expr::string(name)));
        }
        rule
    }

    fn from_expr(expr: &Expr, index: usize) -> Option<Rule> {
        let ExprKind::Call { func, args } = &expr.kind else {
            return None;
        };
        let ExprKind::Ident(kind) = &func.kind else {
            return None;
        };
        let mut positional = Vec::new();
        let mut attrs = BTreeMap::new();
        for arg in args {
            match &arg.name {
                Some(name) => {
                    attrs.insert(name.clone(), arg.clone());
                }
                None => positional.push(arg.clone()),
            }
        }
        Some(Rule {
            kind: kind.clone(),
            positional,
            attrs,
            comments: expr.comments.clone(),
            func_comments: func.comments.clone(),
            private: BTreeMap::new(),
            index: Some(index),
            deleted: false,
            updated: false,
        })
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn set_kind(&mut self, kind: &str) {
        self.kind = kind.to_string();
        self.updated = true;
    }

    pub fn name(&self) -> String {
        self.attr_string("name").unwrap_or_default()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn delete(&mut self) {
        self.deleted = true;
    }

    /// Rule-level keep marker: a `# keep` above the call or trailing its
    /// closing paren. A comment on the open-paren line never counts.
    pub fn should_keep(&self) -> bool {
        self.comments.has_keep()
    }

    pub fn attr(&self, name: &str) -> Option<&Expr> {
        self.attrs.get(name).map(|a| &a.value)
    }

    pub fn attr_arg(&self, name: &str) -> Option<&Arg> {
        self.attrs.get(name)
    }

    pub fn attr_names(&self) -> Vec<String> {
        self.attrs.keys().cloned().collect()
    }

    pub fn attr_string(&self, name: &str) -> Option<String> {
        self.attr(name).and_then(|e| e.as_str()).map(str::to_string)
    }

    pub fn attr_strings(&self, name: &str) -> Option<Vec<String>> {
        self.attr(name).and_then(|e| e.as_string_list())
    }

    pub fn attr_is_kept(&self, name: &str) -> bool {
        self.attrs.get(name).map(Arg::has_keep).unwrap_or(false)
    }

    /// Set an attribute from a typed value. Values that convert to nothing
    /// (empty lists) remove the attribute. Comments on an existing argument
    /// survive the new value.
    pub fn set_attr(&mut self, name: &str, value: impl Into<Value>) {
        match value.into().into_expr() {
            Some(expr) => self.set_attr_expr(name, expr),
            None => self.del_attr(name),
        }
    }

    pub fn set_attr_expr(&mut self, name: &str, expr: Expr) {
        match self.attrs.get_mut(name) {
            Some(arg) => arg.value = expr,
            None => {
                self.attrs
                    .insert(name.to_string(), Arg::keyword(name, expr));
            }
        }
        self.updated = true;
    }

    pub fn del_attr(&mut self, name: &str) {
        if self.attrs.remove(name).is_some() {
            self.updated = true;
        }
    }

    pub fn private_attr(&self, name: &str) -> Option<&PrivateValue> {
        self.private.get(name)
    }

    pub fn set_private_attr(&mut self, name: &str, value: PrivateValue) {
        self.private.insert(name.to_string(), value);
    }

    pub fn private_iter(&self) -> impl Iterator<Item = (&str, &PrivateValue)> {
        self.private.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Rebuild the call expression: positional args first, then `name`, then
    /// the remaining attributes alphabetically.
    pub fn to_expr(&self) -> Expr {
        let mut func = Expr::ident(&self.kind);
        func.comments = self.func_comments.clone();
        let mut args: Vec<Arg> = self.positional.clone();
        if let Some(name) = self.attrs.get("name") {
            args.push(name.clone());
        }
        for (attr, arg) in &self.attrs {
            if attr != "name" {
                args.push(arg.clone());
            }
        }
        Expr {
            kind: ExprKind::Call {
                func: Box::new(func),
                args,
            },
            comments: self.comments.clone(),
            line: 0,
        }
    }
}

/// A build file (or a named macro body) with its loads, rules, and
/// directives.
#[derive(Debug, Default)]
pub struct File {
    pub path: PathBuf,
    pub pkg: String,
    pub macro_name: Option<String>,
    pub ast: Ast,
    pub loads: Vec<Load>,
    pub rules: Vec<Rule>,
    pub directives: Vec<Directive>,
    pub original: Option<String>,
}

impl File {
    /// Parse a build file from its contents.
    pub fn parse(content: &str, path: &Path, pkg: &str) -> Result<File, ParseError> {
        let ast = bzl::parse(content)?;
        let mut file = File {
            path: path.to_path_buf(),
            pkg: pkg.to_string(),
            macro_name: None,
            ast,
            loads: Vec::new(),
            rules: Vec::new(),
            directives: Vec::new(),
            original: Some(content.to_string()),
        };
        file.extract();
        Ok(file)
    }

    /// Parse a macro file and focus on the body of `defname` as if it were a
    /// build file. The function is created empty when missing.
    pub fn parse_macro(
        content: &str,
        path: &Path,
        pkg: &str,
        defname: &str,
    ) -> Result<File, ParseError> {
        let mut ast = bzl::parse(content)?;
        let exists = ast
            .stmts
            .iter()
            .any(|s| matches!(s, Stmt::Def(d) if d.name == defname));
        if !exists {
            ast.stmts.push(Stmt::Def(DefStmt {
                name: defname.to_string(),
                params: String::new(),
                body: Vec::new(),
                comments: Comments::default(),
                line: 0,
            }));
        }
        let mut file = File {
            path: path.to_path_buf(),
            pkg: pkg.to_string(),
            macro_name: Some(defname.to_string()),
            ast,
            loads: Vec::new(),
            rules: Vec::new(),
            directives: Vec::new(),
            original: Some(content.to_string()),
        };
        file.extract();
        Ok(file)
    }

    /// A file that does not exist on disk yet.
    pub fn new_empty(path: &Path, pkg: &str) -> File {
        File {
            path: path.to_path_buf(),
            pkg: pkg.to_string(),
            ..File::default()
        }
    }

    fn extract(&mut self) {
        for (i, stmt) in self.ast.stmts.iter().enumerate() {
            match stmt {
                Stmt::Load(l) => self.loads.push(Load {
                    stmt: l.clone(),
                    index: Some(i),
                    deleted: false,
                    updated: false,
                }),
                Stmt::Expr(e) => {
                    if self.macro_name.is_none() {
                        if let Some(rule) = Rule::from_expr(e, i) {
                            self.rules.push(rule);
                        }
                    }
                }
                _ => {}
            }
        }
        if let Some(body) = self.macro_body() {
            let extracted: Vec<Rule> = body
                .iter()
                .enumerate()
                .filter_map(|(i, stmt)| match stmt {
                    Stmt::Expr(e) => Rule::from_expr(e, i),
                    _ => None,
                })
                .collect();
            self.rules.extend(extracted);
        }
        self.directives = self
            .ast
            .comment_lines()
            .iter()
            .filter_map(|c| parse_directive(c))
            .collect();
    }

    fn macro_body(&self) -> Option<&Vec<Stmt>> {
        let name = self.macro_name.as_ref()?;
        self.ast.stmts.iter().find_map(|s| match s {
            Stmt::Def(d) if &d.name == name => Some(&d.body),
            _ => None,
        })
    }

    /// Indices of live rules.
    pub fn rule_indexes(&self) -> Vec<usize> {
        (0..self.rules.len())
            .filter(|&i| !self.rules[i].deleted)
            .collect()
    }

    pub fn find_rule(&self, kind: &str, name: &str) -> Option<usize> {
        self.rules
            .iter()
            .position(|r| !r.deleted && r.kind == kind && r.name() == name)
    }

    /// Attach a generated rule to this file. It is placed after existing
    /// rules on the next sync.
    pub fn insert_rule(&mut self, rule: Rule) -> usize {
        let mut rule = rule;
        rule.index = None;
        rule.updated = true;
        self.rules.push(rule);
        self.rules.len() - 1
    }

    /// File names declared as generated outputs by existing rules.
    pub fn generated_file_names(&self) -> Vec<String> {
        let mut out = Vec::new();
        for rule in self.rules.iter().filter(|r| !r.deleted) {
            if let Some(v) = rule.attr_string("out") {
                out.push(v);
            }
            if let Some(vs) = rule.attr_strings("outs") {
                out.extend(vs);
            }
        }
        out.sort();
        out.dedup();
        out
    }

    /// Reconcile in-memory edits with the syntax tree: replace updated rule
    /// statements, drop deleted ones, splice in new loads and rules, and
    /// collapse or expand `pass` in macro bodies.
    pub fn sync(&mut self) {
        enum Action {
            Delete,
            Replace(Stmt),
        }
        let in_macro = self.macro_name.is_some();

        let mut top_actions: HashMap<usize, Action> = HashMap::new();
        let mut body_actions: HashMap<usize, Action> = HashMap::new();
        for load in &self.loads {
            if let Some(i) = load.index {
                if load.deleted {
                    top_actions.insert(i, Action::Delete);
                } else if load.updated {
                    top_actions.insert(i, Action::Replace(Stmt::Load(load.stmt.clone())));
                }
            }
        }
        for rule in &self.rules {
            if let Some(i) = rule.index {
                let actions = if in_macro {
                    &mut body_actions
                } else {
                    &mut top_actions
                };
                if rule.deleted {
                    actions.insert(i, Action::Delete);
                } else if rule.updated {
                    actions.insert(i, Action::Replace(Stmt::Expr(rule.to_expr())));
                }
            }
        }

        // Rebuild the top-level statement list.
        let old = std::mem::take(&mut self.ast.stmts);
        let mut remap_top: Vec<Option<usize>> = vec![None; old.len()];
        let mut stmts: Vec<Stmt> = Vec::new();
        for (i, stmt) in old.into_iter().enumerate() {
            match top_actions.remove(&i) {
                Some(Action::Delete) => {}
                Some(Action::Replace(s)) => {
                    remap_top[i] = Some(stmts.len());
                    stmts.push(s);
                }
                None => {
                    remap_top[i] = Some(stmts.len());
                    stmts.push(stmt);
                }
            }
        }

        // New loads go after existing loads, or after the leading comments.
        let new_loads: Vec<usize> = (0..self.loads.len())
            .filter(|&i| self.loads[i].index.is_none() && !self.loads[i].deleted)
            .collect();
        if !new_loads.is_empty() {
            let mut pos = 0;
            for (i, stmt) in stmts.iter().enumerate() {
                match stmt {
                    Stmt::Load(_) => pos = i + 1,
                    Stmt::Comment(_) if pos == i => pos = i + 1,
                    _ => break,
                }
            }
            let count = new_loads.len();
            for r in remap_top.iter_mut().flatten() {
                if *r >= pos {
                    *r += count;
                }
            }
            for (off, li) in new_loads.into_iter().enumerate() {
                let mut stmt = self.loads[li].stmt.clone();
                stmt.normalize();
                stmts.insert(pos + off, Stmt::Load(stmt));
                self.loads[li].index = Some(pos + off);
            }
        }

        // Renumber surviving loads and append new rules.
        self.loads.retain(|l| !l.deleted);
        for load in &mut self.loads {
            if let Some(i) = load.index {
                if i < remap_top.len() {
                    load.index = remap_top[i];
                }
            }
            load.updated = false;
        }

        if in_macro {
            self.ast.stmts = stmts;
            self.sync_macro_body(body_actions
                .into_iter()
                .map(|(i, a)| (i, matches!(a, Action::Delete), match a {
                    Action::Replace(s) => Some(s),
                    Action::Delete => None,
                }))
                .collect());
            return;
        }

        // File mode: new rules append at the end.
        self.rules.retain(|r| !r.deleted);
        for rule in &mut self.rules {
            match rule.index {
                Some(i) if i < remap_top.len() => rule.index = remap_top[i],
                Some(_) | None => {}
            }
        }
        for rule in &mut self.rules {
            if rule.index.is_none() {
                rule.index = Some(stmts.len());
                stmts.push(Stmt::Expr(rule.to_expr()));
            }
            rule.updated = false;
        }
        self.ast.stmts = stmts;
    }

    fn sync_macro_body(&mut self, actions: Vec<(usize, bool, Option<Stmt>)>) {
        let name = match &self.macro_name {
            Some(n) => n.clone(),
            None => return,
        };
        let Some(def) = self.ast.stmts.iter_mut().find_map(|s| match s {
            Stmt::Def(d) if d.name == name => Some(d),
            _ => None,
        }) else {
            return;
        };

        let mut action_map: HashMap<usize, (bool, Option<Stmt>)> = actions
            .into_iter()
            .map(|(i, del, stmt)| (i, (del, stmt)))
            .collect();
        let old = std::mem::take(&mut def.body);
        let mut remap: Vec<Option<usize>> = vec![None; old.len()];
        let mut body: Vec<Stmt> = Vec::new();
        for (i, stmt) in old.into_iter().enumerate() {
            if matches!(stmt, Stmt::Pass(_)) {
                continue;
            }
            match action_map.remove(&i) {
                Some((true, _)) => {}
                Some((false, Some(s))) => {
                    remap[i] = Some(body.len());
                    body.push(s);
                }
                _ => {
                    remap[i] = Some(body.len());
                    body.push(stmt);
                }
            }
        }

        self.rules.retain(|r| !r.deleted);
        for rule in &mut self.rules {
            match rule.index {
                Some(i) if i < remap.len() => rule.index = remap[i],
                Some(_) | None => {}
            }
        }
        for rule in &mut self.rules {
            if rule.index.is_none() {
                rule.index = Some(body.len());
                body.push(Stmt::Expr(rule.to_expr()));
            }
            rule.updated = false;
        }
        if body.is_empty() {
            body.push(Stmt::Pass(Comments::default()));
        }
        def.body = body;
    }

    /// Render the file to bytes (sync included).
    pub fn format(&mut self) -> String {
        self.sync();
        bzl::format_ast(&self.ast)
    }

    /// Reconcile load statements with the kinds actually used: add missing
    /// loads, drop managed symbols that are no longer referenced, and merge
    /// loads of the same module.
    pub fn fix_loads(&mut self, infos: &[LoadInfo]) {
        let known: HashSet<&str> = infos
            .iter()
            .flat_map(|i| i.symbols.iter().map(String::as_str))
            .collect();
        let kinds_used: HashSet<String> = self
            .rules
            .iter()
            .filter(|r| !r.deleted)
            .map(|r| r.kind.clone())
            .collect();

        // Drop managed symbols that nothing references.
        for load in &mut self.loads {
            if load.deleted {
                continue;
            }
            let before = load.stmt.syms.len();
            load.stmt
                .syms
                .retain(|s| !known.contains(s.local.as_str()) || kinds_used.contains(&s.local));
            if load.stmt.syms.len() != before {
                load.updated = true;
            }
            if load.stmt.syms.is_empty() {
                load.deleted = true;
            }
        }

        // Merge duplicate loads of the same module.
        let mut seen: HashMap<String, usize> = HashMap::new();
        for i in 0..self.loads.len() {
            if self.loads[i].deleted {
                continue;
            }
            let module = self.loads[i].stmt.module.clone();
            match seen.get(&module) {
                Some(&first) => {
                    let syms = self.loads[i].stmt.syms.clone();
                    for sym in syms {
                        if !self.loads[first].stmt.has(&sym.local) {
                            self.loads[first].stmt.syms.push(sym);
                        }
                    }
                    self.loads[first].stmt.normalize();
                    self.loads[first].updated = true;
                    self.loads[i].deleted = true;
                }
                None => {
                    seen.insert(module, i);
                }
            }
        }

        let loaded: HashSet<String> = self
            .loads
            .iter()
            .filter(|l| !l.deleted)
            .flat_map(|l| l.stmt.syms.iter().map(|s| s.local.clone()))
            .collect();

        // Add loads for kinds in use that nothing provides yet.
        let mut needed: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for info in infos {
            for sym in &info.symbols {
                if kinds_used.contains(sym) && !loaded.contains(sym) {
                    needed.entry(info.name.as_str()).or_default().insert(sym.as_str());
                }
            }
        }
        for (module, syms) in needed {
            let idx = match seen.get(module).filter(|&&i| !self.loads[i].deleted) {
                Some(&i) => i,
                None => {
                    self.loads.push(Load::new(module));
                    self.loads.len() - 1
                }
            };
            for sym in syms {
                self.loads[idx].stmt.add(sym);
            }
            self.loads[idx].stmt.normalize();
            self.loads[idx].updated = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::PlatformStrings;

    fn parse_file(src: &str) -> File {
        File::parse(src, Path::new("pkg/BUILD.bazel"), "pkg").expect("parse")
    }

    #[test]
    fn parses_directives() {
        let d = parse_directive("# springbok:prefix example.com/repo").expect("directive");
        assert_eq!(d.key, "prefix");
        assert_eq!(d.value, "example.com/repo");

        let d = parse_directive("# springbok:proto disable").expect("directive");
        assert_eq!(d.key, "proto");
        assert_eq!(d.value, "disable");

        assert!(parse_directive("# just a comment").is_none());
        assert!(parse_directive("# springbok: broken").is_none());
    }

    #[test]
    fn file_extracts_rules_and_loads() {
        let file = parse_file(
            "load(\"@io_bazel_rules_go//go:def.bzl\", \"go_library\")\n\n# springbok:prefix example.com/x\n\ngo_library(\n    name = \"lib\",\n    srcs = [\"a.go\"],\n)\n",
        );
        assert_eq!(file.loads.len(), 1);
        assert_eq!(file.rules.len(), 1);
        assert_eq!(file.rules[0].kind(), "go_library");
        assert_eq!(file.rules[0].name(), "lib");
        assert_eq!(file.directives.len(), 1);
        assert_eq!(file.directives[0].key, "prefix");
    }

    #[test]
    fn set_attr_preserves_comments_and_sorts() {
        let mut file = parse_file(
            "go_library(\n    name = \"lib\",\n    visibility = [\"//visibility:public\"],\n)\n",
        );
        file.rules[0].set_attr("srcs", vec!["a.go".to_string(), "b.go".to_string()]);
        file.rules[0].set_attr("importpath", "example.com/x/lib");
        let out = file.format();
        let name_pos = out.find("name =").expect("name");
        let imp_pos = out.find("importpath =").expect("importpath");
        let srcs_pos = out.find("srcs =").expect("srcs");
        let vis_pos = out.find("visibility =").expect("visibility");
        assert!(name_pos < imp_pos && imp_pos < srcs_pos && srcs_pos < vis_pos);
    }

    #[test]
    fn insert_rule_appends_after_existing() {
        let mut file = parse_file("go_library(\n    name = \"lib\",\n)\n");
        let mut rule = Rule::new("go_test", "lib_test");
        rule.set_attr("srcs", vec!["lib_test.go".to_string()]);
        file.insert_rule(rule);
        let out = file.format();
        assert!(out.find("go_library").expect("lib") < out.find("go_test").expect("test"));
    }

    #[test]
    fn delete_rule_removes_statement() {
        let mut file = parse_file(
            "go_library(\n    name = \"a\",\n)\n\ngo_library(\n    name = \"b\",\n)\n",
        );
        let i = file.find_rule("go_library", "a").expect("rule a");
        file.rules[i].delete();
        let out = file.format();
        assert!(!out.contains("\"a\""));
        assert!(out.contains("\"b\""));
    }

    #[test]
    fn untouched_rules_keep_their_comments() {
        let src = "# keep\ngo_library(\n    name = \"lib\",\n    srcs = [\"hand.go\"],  # chosen by hand\n)\n";
        let mut file = parse_file(src);
        assert!(file.rules[0].should_keep());
        assert_eq!(file.format(), src);
    }

    #[test]
    fn keep_detection_on_attrs() {
        let file = parse_file(
            "go_library(\n    name = \"lib\",\n    # keep\n    srcs = [\"a.go\"],\n    deps = [\":x\"],  # keep\n)\n",
        );
        assert!(file.rules[0].attr_is_kept("srcs"));
        assert!(file.rules[0].attr_is_kept("deps"));
        assert!(!file.rules[0].attr_is_kept("name"));
    }

    #[test]
    fn private_attrs_never_print() {
        let mut file = parse_file("go_library(\n    name = \"lib\",\n)\n");
        file.rules[0].set_private_attr(
            "_imports",
            PrivateValue::Platform(PlatformStrings::from_generic(vec!["fmt".to_string()])),
        );
        let out = file.format();
        assert!(!out.contains("_imports"));
        assert!(!out.contains("fmt"));
    }

    #[test]
    fn fix_loads_adds_and_removes() {
        let infos = vec![LoadInfo {
            name: "@io_bazel_rules_go//go:def.bzl".to_string(),
            symbols: vec![
                "go_library".to_string(),
                "go_binary".to_string(),
                "go_test".to_string(),
            ],
        }];
        let mut file = parse_file(
            "load(\"@io_bazel_rules_go//go:def.bzl\", \"go_binary\")\n\ngo_library(\n    name = \"lib\",\n)\n",
        );
        file.fix_loads(&infos);
        let out = file.format();
        assert!(out.contains("load(\"@io_bazel_rules_go//go:def.bzl\", \"go_library\")"));
        assert!(!out.contains("go_binary"));
    }

    #[test]
    fn fix_loads_merges_same_module() {
        let infos = vec![LoadInfo {
            name: "@io_bazel_rules_go//go:def.bzl".to_string(),
            symbols: vec!["go_library".to_string(), "go_test".to_string()],
        }];
        let mut file = parse_file(
            "load(\"@io_bazel_rules_go//go:def.bzl\", \"go_library\")\nload(\"@io_bazel_rules_go//go:def.bzl\", \"go_test\")\n\ngo_library(\n    name = \"lib\",\n)\n\ngo_test(\n    name = \"lib_test\",\n)\n",
        );
        file.fix_loads(&infos);
        let out = file.format();
        let occurrences = out.matches("load(").count();
        assert_eq!(occurrences, 1);
        assert!(out.contains("\"go_library\", \"go_test\""));
    }

    #[test]
    fn fix_loads_keeps_unmanaged_symbols() {
        let infos = vec![LoadInfo {
            name: "@io_bazel_rules_go//go:def.bzl".to_string(),
            symbols: vec!["go_library".to_string()],
        }];
        let mut file = parse_file(
            "load(\"//tools:custom.bzl\", \"my_macro\")\n\ngo_library(\n    name = \"lib\",\n)\n",
        );
        file.fix_loads(&infos);
        let out = file.format();
        assert!(out.contains("my_macro"));
        assert!(out.contains("go_library"));
    }

    #[test]
    fn macro_file_round_trip() {
        let src = "load(\"@bazel_gazelle//:deps.bzl\", \"go_repository\")\n\ndef go_deps():\n    go_repository(\n        name = \"com_example_dep\",\n        importpath = \"example.com/dep\",\n    )\n";
        let mut file =
            File::parse_macro(src, Path::new("deps.bzl"), "", "go_deps").expect("parse");
        assert_eq!(file.rules.len(), 1);
        assert_eq!(file.rules[0].name(), "com_example_dep");
        assert_eq!(file.format(), src);
    }

    #[test]
    fn macro_body_collapses_to_pass() {
        let src = "def go_deps():\n    go_repository(\n        name = \"dep\",\n    )\n";
        let mut file =
            File::parse_macro(src, Path::new("deps.bzl"), "", "go_deps").expect("parse");
        file.rules[0].delete();
        assert_eq!(file.format(), "def go_deps():\n    pass\n");
    }

    #[test]
    fn macro_pass_expands_when_rule_added() {
        let src = "def go_deps():\n    pass\n";
        let mut file =
            File::parse_macro(src, Path::new("deps.bzl"), "", "go_deps").expect("parse");
        file.insert_rule(Rule::new("go_repository", "dep"));
        let out = file.format();
        assert!(!out.contains("pass"));
        assert!(out.contains("go_repository"));
    }

    #[test]
    fn missing_macro_is_created() {
        let mut file =
            File::parse_macro("", Path::new("deps.bzl"), "", "go_deps").expect("parse");
        file.insert_rule(Rule::new("go_repository", "dep"));
        let out = file.format();
        assert!(out.contains("def go_deps():"));
        assert!(out.contains("go_repository"));
    }

    #[test]
    fn generated_files_from_outs() {
        let file = parse_file(
            "genrule(\n    name = \"gen\",\n    outs = [\"gen.go\"],\n    cmd = \"...\",\n)\n\ngenrule(\n    name = \"one\",\n    out = \"single.go\",\n    cmd = \"...\",\n)\n",
        );
        assert_eq!(
            file.generated_file_names(),
            vec!["gen.go".to_string(), "single.go".to_string()]
        );
    }
}
