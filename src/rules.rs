// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![allow(clippy::expect_used)] // static patterns below are known to compile

use crate::zero::ZeroValues;

use std::collections::{BTreeMap, BTreeSet};

use indexmap::IndexSet;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, warn};

lazy_static! {
    static ref QUALIFIED: Regex =
        Regex::new(r"^(?:(.*)/([\w\d_-]+)(?:#([\w\d]+))?\.)?([*\w\d]+)$").expect("qualified name");
    static ref NON_WORD: Regex = Regex::new(r"[^\w\d_]+").expect("non word");
    static ref WORD: Regex = Regex::new(r"[\w\d_]+").expect("word");
    static ref PRAGMA: Regex =
        Regex::new(r"// \+build [!]?genx.*|//go:build .*genx.*|//go:generate genx.*")
            .expect("pragma");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RuleKind {
    Type,
    Field,
    Func,
    Selector,
}

impl RuleKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Type => "type",
            Self::Field => "field",
            Self::Func => "func",
            Self::Selector => "selector",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "type" => Some(Self::Type),
            "field" => Some(Self::Field),
            "func" => Some(Self::Func),
            "selector" => Some(Self::Selector),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    Delete,
    Rename(String),
    /// A target living in another package, spelled the way the source
    /// refers to it. Its import is tracked in the rule table.
    Qualify(String),
}

impl Rule {
    pub fn is_delete(&self) -> bool {
        matches!(self, Self::Delete)
    }

    /// The replacement text, None for Delete.
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Delete => None,
            Self::Rename(name) => Some(name),
            Self::Qualify(selector) => Some(selector),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QualifiedName {
    pub display: String,
    pub import_path: String,
    pub import_alias: String,
}

/// Decomposes `name`, `path/pkg.Name`, `path/pkg#alias.Name` and their
/// pointer forms. Anything else is taken literally.
pub fn parse_qualified(s: &str) -> QualifiedName {
    let (star, rest) = match s.strip_prefix('*') {
        Some(rest) if rest.contains('/') => ("*", rest),
        _ => ("", s),
    };

    let Some(caps) = QUALIFIED.captures(rest) else {
        return QualifiedName {
            display: s.to_string(),
            ..Default::default()
        };
    };
    let group = |i| caps.get(i).map_or("", |m| m.as_str());
    let (dir, pkg, alias, name) = (group(1), group(2), group(3), group(4));

    if pkg.is_empty() {
        return QualifiedName {
            display: s.to_string(),
            ..Default::default()
        };
    }

    let qualifier = if alias.is_empty() { pkg } else { alias };
    let display = match name.strip_prefix('*') {
        Some(name) => format!("*{qualifier}.{name}"),
        None => format!("{star}{qualifier}.{name}"),
    };
    QualifiedName {
        display,
        import_path: format!("{dir}/{pkg}"),
        import_alias: alias.to_string(),
    }
}

pub fn clean_name(s: &str) -> String {
    NON_WORD.replace_all(s, "").into_owned()
}

/// Upper-cases every letter that starts a word.
pub fn title(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut boundary = true;
    for c in s.chars() {
        if boundary && c.is_alphabetic() {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        boundary = !(c.is_alphanumeric() || c == '_');
    }
    out
}

pub fn builtin_title(name: &str) -> Option<&'static str> {
    Some(match name {
        "string" => "String",
        "byte" => "Byte",
        "[]byte" => "Bytes",
        "rune" => "Rune",
        "int" => "Int",
        "uint" => "Uint",
        "int8" => "Int8",
        "uint8" => "Uint8",
        "int16" => "Int16",
        "uint16" => "Uint16",
        "int32" => "Int32",
        "uint32" => "Uint32",
        "int64" => "Int64",
        "uint64" => "Uint64",
        "float32" => "Float32",
        "float64" => "Float64",
        "complex64" => "Cmplx64",
        "complex128" => "Cmplx128",
        "interface{}" | "Interface" => "Iface",
        _ => return None,
    })
}

/// How a target reads when it becomes part of a larger identifier.
pub fn ident_form(target: &str) -> String {
    match builtin_title(target) {
        Some(t) => t.to_string(),
        None => clean_name(&title(target)),
    }
}

pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Import path to alias, empty alias meaning the package's own name.
#[derive(Debug, Clone, Default)]
pub struct ImportTable(BTreeMap<String, String>);

impl ImportTable {
    pub fn insert(&mut self, path: &str, alias: &str) {
        self.0.insert(path.to_string(), alias.to_string());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Feature labels selecting which conditionally built files take part.
#[derive(Debug, Clone)]
pub struct BuildTagSet(IndexSet<String>);

impl Default for BuildTagSet {
    fn default() -> Self {
        Self(IndexSet::from(["genx".to_string()]))
    }
}

impl BuildTagSet {
    pub fn insert(&mut self, tag: impl Into<String>) {
        self.0.insert(tag.into());
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }
}

#[derive(Debug, Clone)]
struct CommentFilter {
    re: Regex,
    replace: String,
}

/// Ordered find/replace filters applied to every comment.
#[derive(Debug, Clone)]
pub struct CommentFilterSet {
    filters: Vec<CommentFilter>,
}

impl Default for CommentFilterSet {
    fn default() -> Self {
        Self {
            filters: vec![CommentFilter {
                re: PRAGMA.clone(),
                replace: String::new(),
            }],
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Matches `name` as a whole word. `\b` is only placed at edges that are
/// word characters so that names such as `interface{}` still match.
pub fn whole_word(name: &str) -> String {
    let mut pattern = String::new();
    if name.starts_with(is_word_char) {
        pattern.push_str(r"\b");
    }
    pattern.push_str(&regex::escape(name));
    if name.ends_with(is_word_char) {
        pattern.push_str(r"\b");
    }
    pattern
}

/// True when nothing but comment markers and whitespace are left.
pub fn is_blank_comment(text: &str) -> bool {
    let body = match text.strip_prefix("//") {
        Some(rest) => rest,
        None => text
            .strip_prefix("/*")
            .map(|rest| rest.strip_suffix("*/").unwrap_or(rest))
            .unwrap_or(text),
    };
    body.trim().is_empty()
}

impl CommentFilterSet {
    pub fn scrub(&mut self, name: &str) {
        match Regex::new(&whole_word(name)) {
            Ok(re) => self.filters.push(CommentFilter {
                re,
                replace: String::new(),
            }),
            Err(e) => warn!("cannot scrub `{name}` from comments: {e}"),
        }
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Runs every filter in order. None means the comment is to be deleted.
    pub fn apply(&self, text: &str) -> Option<String> {
        Self::run(&self.filters, text)
    }

    fn run(filters: &[CommentFilter], text: &str) -> Option<String> {
        let mut text = text.to_string();
        for f in filters {
            let next = f.re.replace_all(&text, f.replace.as_str());
            if next != text {
                if is_blank_comment(&next) {
                    return None;
                }
                text = next.into_owned();
            }
        }
        Some(text)
    }
}

/// Identifier text substitution derived from the non-delete rules.
#[derive(Debug, Clone, Default)]
pub struct Substitution {
    // (name, identifier form, target), longest name first.
    entries: Vec<(String, String, String)>,
}

impl Substitution {
    fn push(&mut self, name: &str, target: &str) {
        self.entries
            .push((name.to_string(), ident_form(target), target.to_string()));
    }

    fn finish(&mut self) {
        self.entries
            .sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        self.entries.dedup_by(|a, b| a.0 == b.0);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replaces rule names occurring inside `s`, scanning left to right,
    /// longest name first, without overlaps.
    pub fn replace(&self, s: &str) -> String {
        if self.entries.is_empty() {
            return s.to_string();
        }
        let mut out = String::with_capacity(s.len());
        let mut rest = s;
        'scan: while let Some(c) = rest.chars().next() {
            for (name, ident, _) in &self.entries {
                if !name.is_empty() && rest.starts_with(name.as_str()) {
                    out.push_str(ident);
                    rest = &rest[name.len()..];
                    continue 'scan;
                }
            }
            out.push(c);
            rest = &rest[c.len_utf8()..];
        }
        out
    }

    /// Comment text: names that are not identifiers are replaced literally,
    /// whole words naming a rule become its target and any other word goes
    /// through identifier substitution.
    pub fn comment(&self, text: &str) -> String {
        if self.entries.is_empty() {
            return text.to_string();
        }
        let mut text = text.to_string();
        for (name, _, target) in self.entries.iter().filter(|e| !is_identifier(&e.0)) {
            text = text.replace(name.as_str(), target);
        }
        WORD.replace_all(&text, |caps: &regex::Captures| {
            let word = &caps[0];
            match self.entries.iter().find(|e| e.0 == word) {
                Some((_, _, target)) => target.clone(),
                None => self.replace(word),
            }
        })
        .into_owned()
    }
}

/// The normalized rule table together with the state derived from it.
#[derive(Debug, Clone, Default)]
pub struct Rules {
    types: BTreeMap<String, Rule>,
    fields: BTreeMap<String, Rule>,
    funcs: BTreeMap<String, Rule>,
    selectors: BTreeMap<String, Rule>,
    retired: BTreeSet<String>,

    pub imports: ImportTable,
    pub build_tags: BuildTagSet,
    pub filters: CommentFilterSet,
    pub subst: Substitution,
    pub zero: ZeroValues,
}

impl Rules {
    /// Builds the table from `kind:name` keys and target strings. An empty
    /// target or `-` deletes. Nothing is ever rejected: unknown kinds are
    /// treated as types and unparsable targets are used verbatim.
    pub fn new<I, K, V>(raw: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let raw: BTreeMap<String, String> = raw
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().trim().to_string()))
            .collect();

        let mut rules = Self::default();
        for (key, target) in &raw {
            let (kind, name) = match key.split_once(':') {
                Some((kind, name)) => match RuleKind::parse(kind) {
                    Some(kind) => (kind, name),
                    None => {
                        warn!("unknown rule kind `{kind}` in `{key}`, treating it as a type");
                        (RuleKind::Type, name)
                    }
                },
                None => {
                    warn!("rule `{key}` has no kind, treating it as a type");
                    (RuleKind::Type, key.as_str())
                }
            };
            rules.add(kind, name.trim(), target);
        }
        rules.subst.finish();
        rules
    }

    fn add(&mut self, kind: RuleKind, name: &str, target: &str) {
        let rule = if target.is_empty() || target == "-" {
            Rule::Delete
        } else {
            let q = parse_qualified(target);
            if q.import_path.is_empty() {
                Rule::Rename(q.display)
            } else {
                self.imports.insert(&q.import_path, &q.import_alias);
                Rule::Qualify(q.display)
            }
        };
        debug!("rule {}:{name} => {rule:?}", kind.as_str());

        match (&rule, kind) {
            (Rule::Delete, _) => self.filters.scrub(name),
            (_, RuleKind::Type) => {
                let target = rule.target().unwrap_or_default();
                let csel = clean_name(target);
                let kw = clean_name(name).to_lowercase();
                if csel != "interface" && builtin_title(&csel).is_some() {
                    self.build_tags.insert(format!("genx_{kw}_builtin"));
                }
                self.build_tags.insert(format!("genx_{kw}_{csel}"));
                self.zero.register(target);
            }
            _ => (),
        }

        if let (Some(target), RuleKind::Type | RuleKind::Field | RuleKind::Func) =
            (rule.target(), kind)
        {
            self.subst.push(name, target);
        }
        if kind == RuleKind::Field {
            self.selectors.insert(format!(".{name}"), rule.clone());
        }
        self.table_mut(kind).insert(name.to_string(), rule);
    }

    fn table(&self, kind: RuleKind) -> &BTreeMap<String, Rule> {
        match kind {
            RuleKind::Type => &self.types,
            RuleKind::Field => &self.fields,
            RuleKind::Func => &self.funcs,
            RuleKind::Selector => &self.selectors,
        }
    }

    fn table_mut(&mut self, kind: RuleKind) -> &mut BTreeMap<String, Rule> {
        match kind {
            RuleKind::Type => &mut self.types,
            RuleKind::Field => &mut self.fields,
            RuleKind::Func => &mut self.funcs,
            RuleKind::Selector => &mut self.selectors,
        }
    }

    pub fn get(&self, kind: RuleKind, name: &str) -> Option<&Rule> {
        self.table(kind).get(name)
    }

    pub fn is_deleted(&self, kind: RuleKind, name: &str) -> bool {
        self.get(kind, name).is_some_and(Rule::is_delete)
    }

    /// Rename target for `name`, None when unset or deleted.
    pub fn target(&self, kind: RuleKind, name: &str) -> Option<&str> {
        self.get(kind, name).and_then(Rule::target)
    }

    /// The rule a type declaration of `name` observes. Once retired, every
    /// further declaration of the name is deleted.
    pub fn type_decl(&self, name: &str) -> Option<Rule> {
        if self.retired.contains(name) {
            return Some(Rule::Delete);
        }
        self.types.get(name).cloned()
    }

    pub fn retire(&mut self, name: &str) {
        debug!("retiring type declaration `{name}`");
        self.retired.insert(name.to_string());
    }

    /// Sorted `kind:name=target` lines, deletes shown as `-`.
    pub fn ordered(&self) -> Vec<String> {
        let kinds = [
            RuleKind::Type,
            RuleKind::Field,
            RuleKind::Func,
            RuleKind::Selector,
        ];
        let mut out: Vec<String> = kinds
            .iter()
            .flat_map(|kind| {
                self.table(*kind).iter().map(move |(name, rule)| {
                    format!("{}:{name}={}", kind.as_str(), rule.target().unwrap_or("-"))
                })
            })
            .collect();
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(display: &str, path: &str, alias: &str) -> QualifiedName {
        QualifiedName {
            display: display.to_string(),
            import_path: path.to_string(),
            import_alias: alias.to_string(),
        }
    }

    #[test]
    fn qualified_names() {
        assert_eq!(parse_qualified("uint64"), q("uint64", "", ""));
        assert_eq!(parse_qualified("*Node"), q("*Node", "", ""));
        assert_eq!(
            parse_qualified("github.com/OneOfOne/cmap.CMap"),
            q("cmap.CMap", "github.com/OneOfOne/cmap", "")
        );
        assert_eq!(
            parse_qualified("github.com/OneOfOne/cmap.*CMap"),
            q("*cmap.CMap", "github.com/OneOfOne/cmap", "")
        );
        assert_eq!(
            parse_qualified("*github.com/OneOfOne/cmap.CMap"),
            q("*cmap.CMap", "github.com/OneOfOne/cmap", "")
        );
        assert_eq!(
            parse_qualified("github.com/OneOfOne/cmap/bad_pkg_name#hashers.Fnv32"),
            q(
                "hashers.Fnv32",
                "github.com/OneOfOne/cmap/bad_pkg_name",
                "hashers"
            )
        );
    }

    #[test]
    fn malformed_targets_are_literal() {
        for s in ["interface{}", "map[string]int", "[]byte", "hashers.Fnv32", "a b", "x/"] {
            assert_eq!(parse_qualified(s), q(s, "", ""), "{s}");
        }

        let rules = Rules::new([("type:T", "map[string]int"), ("selector:a.b", "x/")]);
        assert_eq!(
            rules.get(RuleKind::Type, "T"),
            Some(&Rule::Rename("map[string]int".to_string()))
        );
        assert_eq!(rules.target(RuleKind::Selector, "a.b"), Some("x/"));
        assert!(rules.imports.is_empty());
    }

    #[test]
    fn unknown_kind_is_a_type() {
        let rules = Rules::new([("KT", "string"), ("typo:VT", "int")]);
        assert_eq!(rules.target(RuleKind::Type, "KT"), Some("string"));
        assert_eq!(rules.target(RuleKind::Type, "VT"), Some("int"));
    }

    #[test]
    fn delete_targets() {
        let rules = Rules::new([("type:A", "-"), ("func:B", ""), ("field:C", " - ")]);
        assert!(rules.is_deleted(RuleKind::Type, "A"));
        assert!(rules.is_deleted(RuleKind::Func, "B"));
        assert!(rules.is_deleted(RuleKind::Field, "C"));
        assert!(rules.is_deleted(RuleKind::Selector, ".C"));
        // Pragma filter plus one scrub per delete.
        assert_eq!(rules.filters.len(), 4);
        assert!(rules.subst.is_empty());
    }

    #[test]
    fn build_tags() {
        let rules = Rules::new([
            ("type:KT", "string"),
            ("type:VT", "interface{}"),
            ("type:N", "*github.com/x/y.Node"),
        ]);
        let tags: Vec<_> = rules.build_tags.iter().cloned().collect();
        assert_eq!(
            tags,
            vec![
                "genx",
                "genx_kt_builtin",
                "genx_kt_string",
                "genx_n_yNode",
                "genx_vt_interface",
            ]
        );
        assert!(rules
            .imports
            .iter()
            .any(|(p, a)| p == "github.com/x/y" && a.is_empty()));
        assert_eq!(
            rules.get(RuleKind::Type, "N"),
            Some(&Rule::Qualify("*y.Node".to_string()))
        );
    }

    #[test]
    fn field_rules_derive_selectors() {
        let rules = Rules::new([("field:Call", "NewFuncName")]);
        assert_eq!(
            rules.target(RuleKind::Selector, ".Call"),
            Some("NewFuncName")
        );
        assert_eq!(
            rules.ordered(),
            vec!["field:Call=NewFuncName", "selector:.Call=NewFuncName"]
        );
    }

    #[test]
    fn retired_declarations() {
        let mut rules = Rules::new([("type:KT", "string")]);
        assert_eq!(rules.type_decl("KT"), Some(Rule::Rename("string".into())));
        rules.retire("KT");
        assert_eq!(rules.type_decl("KT"), Some(Rule::Delete));
        // Uses still see the rename.
        assert_eq!(rules.target(RuleKind::Type, "KT"), Some("string"));
    }

    #[test]
    fn substitution_prefers_longest_names() {
        let rules = Rules::new([
            ("type:K", "int"),
            ("type:KT", "uint64"),
            ("type:VT", "*cmap.CMap"),
        ]);
        assert_eq!(rules.subst.replace("KTSet"), "Uint64Set");
        assert_eq!(rules.subst.replace("NewKVT"), "NewIntCmapCMap");
        assert_eq!(rules.subst.replace("plain"), "plain");
    }

    #[test]
    fn comment_text() {
        let rules = Rules::new([("type:KT", "uint64"), ("type:interface{}", "int")]);
        assert_eq!(
            rules.subst.comment("// KTSet holds KT values, any interface{}."),
            "// Uint64Set holds uint64 values, any int."
        );
    }

    #[test]
    fn comment_filters() {
        let rules = Rules::new([("type:interface{}", "-"), ("func:DoStuff", "-")]);
        let f = &rules.filters;
        assert_eq!(f.apply("// +build !genx"), None);
        assert_eq!(f.apply("//go:build !genx_t_builtin"), None);
        assert_eq!(f.apply("//go:generate genx -t T=int"), None);
        assert_eq!(f.apply("// DoStuff"), None);
        assert_eq!(f.apply("/* interface{} */"), None);
        assert_eq!(
            f.apply("// DoStuff does stuff"),
            Some("//  does stuff".to_string())
        );
        assert_eq!(
            f.apply("// DoStuffLater stays"),
            Some("// DoStuffLater stays".to_string())
        );
        assert_eq!(f.apply("//"), Some("//".to_string()));
    }

    #[test]
    fn titles() {
        assert_eq!(title("uint64"), "Uint64");
        assert_eq!(title("*cmap.cMap"), "*Cmap.CMap");
        assert_eq!(ident_form("map[string]int"), "MapStringInt");
        assert_eq!(ident_form("[]byte"), "Bytes");
        assert_eq!(ident_form("NewFuncName"), "NewFuncName");
    }
}
