// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::*;
use crate::config::RuleConfig;
use crate::constraint::{is_test_file, select_files, TagSet};
use crate::error::ProcessError;
use crate::format::{format_or_keep, organize_imports, Canonical, Formatter};
use crate::lexer::Source;
use crate::parser::parse_file;
use crate::printer::print_file;
use crate::rules::Rules;
use crate::walker::{VisitedSet, Walker};

use std::io::Write;
use std::path::Path;
use std::rc::Rc;

use tracing::{debug, info};

/// The generator: a rule table plus the state carried across the files
/// of a run.
#[derive(Debug)]
pub struct Engine {
    rules: Rules,
    pkg_name: String,
    extra_tags: Vec<String>,
    formatter: Rc<dyn Formatter>,
    command: String,
}

/// One transformed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFile {
    pub name: String,
    pub src: String,
    command: String,
}

/// The transformed files of a package, in file name order.
#[derive(Debug, Clone)]
pub struct ParsedPackage {
    pub name: String,
    pub files: Vec<ParsedFile>,
    formatter: Rc<dyn Formatter>,
    command: String,
}

fn is_stdout(path: &Path) -> bool {
    path == Path::new("-") || path == Path::new("/dev/stdout")
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

impl ParsedFile {
    pub fn new(name: impl Into<String>, src: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            src: src.into(),
            command: "genx".to_string(),
        }
    }

    /// Generated-file notice and the constraints keeping genx from picking
    /// the output up as a template again.
    pub fn banner(&self) -> String {
        format!(
            "// Code generated by genx. DO NOT EDIT.\n\
             // Any changes will be lost if this file is regenerated.\n\
             // cmd: {}\n\n\
             //go:build !genx\n\
             // +build !genx\n\n",
            self.command
        )
    }

    /// Writes banner and source to `path`; `-` and `/dev/stdout` mean
    /// standard output.
    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ProcessError> {
        let path = path.as_ref();
        let contents = format!("{}{}", self.banner(), self.src);
        if is_stdout(path) {
            let mut out = std::io::stdout().lock();
            return out
                .write_all(contents.as_bytes())
                .map_err(|e| ProcessError::io(path, e));
        }
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| ProcessError::io(dir, e))?;
        }
        info!("writing {}", path.display());
        std::fs::write(path, contents).map_err(|e| ProcessError::io(path, e))
    }
}

impl ParsedPackage {
    pub fn write_package<P: AsRef<Path>>(&self, dir: P) -> Result<(), ProcessError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| ProcessError::io(dir, e))?;
        for file in &self.files {
            file.write_file(dir.join(&file.name))?;
        }
        Ok(())
    }

    /// Concatenates the test files (`tests`) or the other files into one.
    /// Later files lose their package clause and their imports are hoisted
    /// into a single import block.
    pub fn merge_all(&self, tests: bool) -> Result<ParsedFile, ProcessError> {
        let files: Vec<&ParsedFile> = self
            .files
            .iter()
            .filter(|f| is_test_file(&f.name) == tests)
            .collect();
        let Some(first) = files.first() else {
            return Err(ProcessError::NothingToMerge(self.name.clone()));
        };

        let mut ast = Ast::new();
        let mut root = None;
        let mut offset = 0;
        let mut partial = String::new();
        for file in &files {
            partial.push_str(&file.src);
            let parsed = Source::from_contents(file.name.clone(), file.src.clone())
                .and_then(|source| parse_file(&mut ast, &source));
            let id = match parsed {
                Ok(id) => id,
                Err(e) => return Err(ProcessError::parse(&file.name, e, partial)),
            };
            ast.shift_lines(id, offset);
            offset += file.src.lines().count() as u32 + 1;

            let Some(target) = root else {
                root = Some(id);
                continue;
            };
            debug!("merging {} into {}", file.name, first.name);
            let Node::File { decls, .. } = ast.get(id).clone() else {
                continue;
            };
            if let Node::File { decls: merged, .. } = ast.get_mut(target) {
                merged.extend(decls);
            }
        }

        let Some(root) = root else {
            return Err(ProcessError::NothingToMerge(self.name.clone()));
        };
        organize_imports(&mut ast, root, false);
        let printed = print_file(&ast, root);
        Ok(ParsedFile {
            name: first.name.clone(),
            src: format_or_keep(self.formatter.as_ref(), &first.name, &printed),
            command: self.command.clone(),
        })
    }

    pub fn write_all_merged<P: AsRef<Path>>(&self, path: P, tests: bool) -> Result<(), ProcessError> {
        self.merge_all(tests)?.write_file(path)
    }
}

impl Engine {
    /// `rules` are `kind:name` keys with their targets. An empty `pkg_name`
    /// adopts the package name of the first processed file.
    pub fn new<I, K, V>(pkg_name: &str, rules: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Self {
            rules: Rules::new(rules),
            pkg_name: pkg_name.to_string(),
            extra_tags: vec![],
            formatter: Rc::new(Canonical),
            command: "genx".to_string(),
        }
    }

    pub fn from_config(config: &RuleConfig) -> Self {
        let mut engine = Self::new(config.name.as_deref().unwrap_or_default(), config.raw_rules());
        engine.add_build_tags(config.tags.iter());
        engine
    }

    pub fn with_formatter(mut self, formatter: Rc<dyn Formatter>) -> Self {
        self.formatter = formatter;
        self
    }

    /// The invocation recorded in the banner of written files.
    pub fn set_command(&mut self, command: impl Into<String>) {
        self.command = command.into();
    }

    pub fn add_build_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extra_tags.extend(
            tags.into_iter()
                .map(|t| t.as_ref().trim().to_string())
                .filter(|t| !t.is_empty()),
        );
    }

    /// Tags derived from the rules followed by the extra tags.
    pub fn build_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.rules.build_tags.iter().cloned().collect();
        for tag in &self.extra_tags {
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }
        tags
    }

    pub fn pkg_name(&self) -> &str {
        &self.pkg_name
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    /// Normalized rules as sorted `kind:name=target` lines.
    pub fn ordered_rules(&self) -> Vec<String> {
        self.rules.ordered()
    }

    pub fn process_source(&mut self, name: &str, src: &str) -> Result<ParsedFile, ProcessError> {
        let source = Source::from_contents(name.to_string(), src.to_string())
            .map_err(|e| ProcessError::parse(name, e, ""))?;
        let mut files = self.run(vec![(name.to_string(), source)])?;
        files
            .pop()
            .ok_or_else(|| ProcessError::NothingToMerge(name.to_string()))
    }

    pub fn process_file<P: AsRef<Path>>(&mut self, path: P) -> Result<ParsedFile, ProcessError> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path).map_err(|e| ProcessError::io(path, e))?;
        self.process_source(&file_name(path), &src)
    }

    /// Processes the files of `dir` selected by the build tags. Test files
    /// are included when `include_tests` is set.
    pub fn process_package<P: AsRef<Path>>(
        &mut self,
        dir: P,
        include_tests: bool,
    ) -> Result<ParsedPackage, ProcessError> {
        let dir = dir.as_ref();
        let tags = TagSet::new(self.build_tags());
        let paths = select_files(dir, &tags, include_tests).map_err(|e| ProcessError::io(dir, e))?;
        info!("processing {} files in {}", paths.len(), dir.display());

        let mut sources = Vec::with_capacity(paths.len());
        for path in &paths {
            let name = file_name(path);
            let src = std::fs::read_to_string(path).map_err(|e| ProcessError::io(path, e))?;
            let source =
                Source::from_contents(name.clone(), src).map_err(|e| ProcessError::parse(&name, e, ""))?;
            sources.push((name, source));
        }
        let files = self.run(sources)?;
        Ok(ParsedPackage {
            name: self.pkg_name.clone(),
            files,
            formatter: self.formatter.clone(),
            command: self.command.clone(),
        })
    }

    /// Parses every source into one arena, walks them in order with the
    /// shared state, then finalizes each file.
    fn run(&mut self, sources: Vec<(String, Source)>) -> Result<Vec<ParsedFile>, ProcessError> {
        let mut ast = Ast::new();
        let mut roots = Vec::with_capacity(sources.len());
        for (name, source) in &sources {
            let root = parse_file(&mut ast, source).map_err(|e| ProcessError::parse(name, e, ""))?;
            roots.push(root);
        }

        let mut visited = VisitedSet::default();
        for root in &roots {
            Walker::new(&mut ast, &mut self.rules, &mut visited, &mut self.pkg_name).walk_file(*root);
        }
        for root in &roots {
            self.inject_imports(&mut ast, *root);
        }
        // Needs discovered in any file of the run land in the first one.
        if let Some(first) = roots.first() {
            self.emit_zero_values(&mut ast, *first);
        }

        Ok(roots
            .iter()
            .zip(sources)
            .map(|(root, (name, _))| {
                let printed = print_file(&ast, *root);
                let src = format_or_keep(self.formatter.as_ref(), &name, &printed);
                ParsedFile {
                    name,
                    src,
                    command: self.command.clone(),
                }
            })
            .collect())
    }

    /// Adds the imports required by qualified rule targets that the file
    /// does not import yet.
    fn inject_imports(&self, ast: &mut Ast, file: NodeId) {
        if self.rules.imports.is_empty() {
            return;
        }
        let Node::File { decls, .. } = ast.get(file).clone() else {
            return;
        };
        let import_decl = decls.iter().copied().find(|d| {
            matches!(
                ast.get(*d),
                Node::GenDecl {
                    keyword: DeclKeyword::Import,
                    ..
                }
            )
        });
        let present: Vec<String> = decls
            .iter()
            .flat_map(|d| ast.descendants(*d))
            .filter_map(|id| match ast.get(id) {
                Node::ImportSpec { path, .. } => Some(path.trim_matches('"').to_string()),
                _ => None,
            })
            .collect();

        let mut specs = vec![];
        for (path, alias) in self.rules.imports.iter() {
            if present.contains(path) {
                continue;
            }
            debug!("importing {path}");
            let name = (!alias.is_empty()).then(|| ast.ident(alias));
            specs.push(ast.synth(Node::ImportSpec {
                doc: None,
                name,
                path: format!("\"{path}\""),
            }));
        }
        if specs.is_empty() {
            return;
        }

        match import_decl {
            Some(decl) => {
                if let Node::GenDecl {
                    specs: existing,
                    grouped,
                    ..
                } = ast.get_mut(decl)
                {
                    existing.extend(specs);
                    *grouped = true;
                }
            }
            None => {
                let grouped = specs.len() > 1;
                let decl = ast.synth(Node::GenDecl {
                    doc: None,
                    keyword: DeclKeyword::Import,
                    specs,
                    grouped,
                });
                if let Node::File { decls, .. } = ast.get_mut(file) {
                    decls.insert(0, decl);
                }
            }
        }
    }

    /// Appends `var zero_<T> <T>` for every zero value needed so far.
    fn emit_zero_values(&mut self, ast: &mut Ast, file: NodeId) {
        if !self.rules.zero.any_needed() {
            return;
        }
        let mut decls = vec![];
        for (var, ty) in self.rules.zero.take_needed() {
            debug!("emitting {var}");
            let name = ast.ident(&var);
            let ty = ast.ident(&ty);
            let spec = ast.synth(Node::ValueSpec {
                doc: None,
                names: vec![name],
                ty: Some(ty),
                values: vec![],
            });
            decls.push(ast.synth(Node::GenDecl {
                doc: None,
                keyword: DeclKeyword::Var,
                specs: vec![spec],
                grouped: false,
            }));
        }
        if let Node::File { decls: slot, .. } = ast.get_mut(file) {
            slot.extend(decls);
        }
    }
}
