// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::{Ast, DeclKeyword, Node, NodeId};
use crate::lexer::Source;
use crate::parser::parse_file;
use crate::printer::print_file;

use std::collections::BTreeSet;
use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};
use tracing::{debug, warn};

/// Final formatting stage applied to every generated file.
pub trait Formatter: std::fmt::Debug {
    fn format(&self, name: &str, src: &str) -> Result<String>;
}

/// Re-parses the output, organizes its imports and prints it again.
#[derive(Debug, Clone, Copy, Default)]
pub struct Canonical;

impl Formatter for Canonical {
    fn format(&self, name: &str, src: &str) -> Result<String> {
        let source = Source::from_contents(name.to_string(), src.to_string())?;
        let mut ast = Ast::new();
        let file = parse_file(&mut ast, &source)?;
        organize_imports(&mut ast, file, true);
        Ok(print_file(&ast, file))
    }
}

/// Pipes the output through a command such as `gofmt` or `goimports`.
#[derive(Debug, Clone)]
pub struct External {
    program: String,
    args: Vec<String>,
}

impl External {
    pub fn new(cmdline: &str) -> Result<Self> {
        let mut parts = cmdline.split_whitespace().map(str::to_string);
        let Some(program) = parts.next() else {
            bail!("empty formatter command");
        };
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl Formatter for External {
    fn format(&self, name: &str, src: &str) -> Result<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("cannot run `{}`", self.program))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(src.as_bytes())?;
        }
        let output = child.wait_with_output()?;
        if !output.status.success() {
            bail!(
                "`{}` failed on {name}: {}",
                self.program,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8(output.stdout)?)
    }
}

/// Formats `src`, falling back to it unchanged when the formatter fails.
pub fn format_or_keep(formatter: &dyn Formatter, name: &str, src: &str) -> String {
    match formatter.format(name, src) {
        Ok(out) => out,
        Err(e) => {
            warn!("{name}: formatting failed, keeping printed output: {e:#}");
            src.to_string()
        }
    }
}

fn unquote(path: &str) -> &str {
    path.trim_matches(|c| c == '"' || c == '`')
}

fn is_major_version(elem: &str) -> bool {
    elem.strip_prefix('v')
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

/// The package name an import is assumed to bind when it has no alias.
pub fn assumed_name(path: &str) -> String {
    let mut elems = unquote(path).rsplit('/');
    let mut last = elems.next().unwrap_or_default();
    if is_major_version(last) {
        if let Some(prev) = elems.next() {
            last = prev;
        }
    }
    let last = last.strip_prefix("go-").unwrap_or(last);
    let end = last
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(last.len());
    last[..end].to_string()
}

/// Standard library paths have no dot in their first element.
pub fn is_std(path: &str) -> bool {
    !unquote(path)
        .split('/')
        .next()
        .unwrap_or_default()
        .contains('.')
}

struct Import {
    name: Option<String>,
    path: String,
    doc: Option<NodeId>,
    trailing: Option<NodeId>,
}

fn collect_imports(ast: &Ast, specs: &[NodeId], imports: &mut Vec<Import>) {
    for id in specs {
        match ast.get(*id) {
            Node::ImportSpec { doc, name, path } => imports.push(Import {
                name: name.and_then(|n| ast.ident_name(n)).map(str::to_string),
                path: path.clone(),
                doc: *doc,
                trailing: None,
            }),
            Node::CommentGroup { trailing: true, .. } => {
                if let Some(last) = imports.last_mut() {
                    last.trailing.get_or_insert(*id);
                }
            }
            _ => (),
        }
    }
}

fn used_qualifiers(ast: &Ast, decls: &[NodeId]) -> BTreeSet<String> {
    decls
        .iter()
        .flat_map(|d| ast.descendants(*d))
        .filter_map(|id| match ast.get(id) {
            Node::Selector { x, .. } => ast.ident_name(*x).map(str::to_string),
            _ => None,
        })
        .collect()
}

/// Collapses every import declaration of `file` into a single one placed
/// ahead of all other declarations, deduplicated and sorted with the
/// standard library group first. With `drop_unused`, imports whose package
/// name is never used as a qualifier are removed; blank and dot imports
/// always stay.
pub fn organize_imports(ast: &mut Ast, file: NodeId, drop_unused: bool) {
    let Node::File { decls, .. } = ast.get(file).clone() else {
        return;
    };

    let mut imports = vec![];
    let mut rest = vec![];
    let mut at = None;
    let mut decl_doc = None;
    let mut after_import = false;
    for id in decls {
        match ast.get(id) {
            Node::GenDecl {
                keyword: DeclKeyword::Import,
                doc,
                specs,
                ..
            } => {
                // Imports go before the first declaration, wherever the
                // first import block was found.
                at.get_or_insert_with(|| {
                    rest.iter()
                        .position(|d| !ast.is_comment_group(*d))
                        .unwrap_or(rest.len())
                });
                decl_doc = decl_doc.or(*doc);
                collect_imports(ast, specs, &mut imports);
                after_import = true;
            }
            Node::CommentGroup { trailing: true, .. } if after_import => {
                if let Some(last) = imports.last_mut() {
                    last.trailing.get_or_insert(id);
                }
                after_import = false;
            }
            _ => {
                rest.push(id);
                after_import = false;
            }
        }
    }
    let Some(at) = at else {
        return;
    };

    let mut seen = BTreeSet::new();
    imports.retain(|i| seen.insert((i.name.clone(), unquote(&i.path).to_string())));
    if drop_unused {
        let used = used_qualifiers(ast, &rest);
        imports.retain(|i| {
            let keep = match i.name.as_deref() {
                Some("_") | Some(".") => true,
                Some(name) => used.contains(name),
                None => unquote(&i.path) == "C" || used.contains(&assumed_name(&i.path)),
            };
            if !keep {
                debug!("dropping unused import {}", i.path);
            }
            keep
        });
    }
    imports.sort_by(|a, b| {
        (!is_std(&a.path), unquote(&a.path)).cmp(&(!is_std(&b.path), unquote(&b.path)))
    });

    if !imports.is_empty() {
        // Specs get consecutive line numbers with a gap between the groups
        // so that the printer separates them by one blank line.
        let mut line = 1;
        let mut group = None;
        let mut specs = vec![];
        for imp in &imports {
            let std = is_std(&imp.path);
            if group.is_some_and(|g| g != std) {
                line += 1;
            }
            group = Some(std);
            if let Some(doc) = imp.doc {
                let n = match ast.get(doc) {
                    Node::CommentGroup { list, .. } => list.len().max(1) as u32,
                    _ => 1,
                };
                ast.set_lines(doc, line, line + n - 1);
                line += n;
            }
            let name = imp.name.as_deref().map(|n| ast.ident(n));
            let spec = ast.alloc(
                Node::ImportSpec {
                    doc: imp.doc,
                    name,
                    path: imp.path.clone(),
                },
                line,
                line,
            );
            specs.push(spec);
            if let Some(trailing) = imp.trailing {
                ast.set_lines(trailing, line, line);
                specs.push(trailing);
            }
            line += 1;
        }
        let grouped = specs.len() != 1 || imports[0].doc.is_some();
        let decl = ast.synth(Node::GenDecl {
            doc: decl_doc,
            keyword: DeclKeyword::Import,
            specs,
            grouped,
        });
        rest.insert(at, decl);
    }

    if let Node::File { decls, .. } = ast.get_mut(file) {
        *decls = rest;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assumed_names() {
        assert_eq!(assumed_name("\"fmt\""), "fmt");
        assert_eq!(assumed_name("\"net/http\""), "http");
        assert_eq!(assumed_name("\"github.com/a/cmap/v2\""), "cmap");
        assert_eq!(assumed_name("\"gopkg.in/yaml.v3\""), "yaml");
        assert_eq!(assumed_name("\"github.com/mattn/go-sqlite3\""), "sqlite3");
        assert!(is_std("\"encoding/json\""));
        assert!(!is_std("\"github.com/a/b\""));
    }

    #[test]
    fn imports_are_merged_sorted_and_pruned() -> Result<()> {
        let src = r#"package p

import "strings"

import (
	"github.com/x/cmap"
	"fmt" // printing
	"os"
	_ "embed"
	"strings"
)

func f() string {
	fmt.Println(cmap.New())
	return strings.TrimSpace("")
}
"#;
        let out = Canonical.format("p.go", src)?;
        assert_eq!(
            out,
            r#"package p

import (
	_ "embed"
	"fmt" // printing
	"strings"

	"github.com/x/cmap"
)

func f() string {
	fmt.Println(cmap.New())
	return strings.TrimSpace("")
}
"#
        );
        assert_eq!(Canonical.format("p.go", &out)?, out);
        Ok(())
    }

    #[test]
    fn single_import_stays_ungrouped() -> Result<()> {
        let src = "package p\n\nimport (\n\t\"fmt\"\n)\n\nvar _ = fmt.Sprint\n";
        assert_eq!(
            Canonical.format("p.go", src)?,
            "package p\n\nimport \"fmt\"\n\nvar _ = fmt.Sprint\n"
        );
        Ok(())
    }

    #[test]
    fn broken_source_is_kept() {
        let src = "package p\n\nfunc {\n";
        assert_eq!(format_or_keep(&Canonical, "p.go", src), src);
    }
}
