// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::{Ast, Node, NodeId};
use crate::rules::Rules;

use std::collections::BTreeSet;

use tracing::trace;

/// What a handler decided about the node it was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Keep,
    Replace(NodeId),
    /// Remove the node. Lifted to the nearest construct able to drop it:
    /// a struct field, an interface method, a keyed literal element, a spec
    /// or a top level declaration.
    Delete,
}

/// Nodes already handled during one run.
#[derive(Debug, Clone, Default)]
pub struct VisitedSet(BTreeSet<NodeId>);

impl VisitedSet {
    /// True the first time `id` is seen.
    pub fn insert(&mut self, id: NodeId) -> bool {
        self.0.insert(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Result types of the function whose body is being walked, one entry per
/// result value.
#[derive(Debug, Clone, Default)]
pub struct FuncScope {
    results: Vec<String>,
}

impl FuncScope {
    pub fn new(ast: &Ast, func_type: NodeId) -> Self {
        let mut results = vec![];
        if let Node::FuncType { results: fields, .. } = ast.get(func_type) {
            for field in fields {
                if let Node::Field { names, ty, .. } = ast.get(*field) {
                    let ty = ast.type_string(*ty);
                    results.extend(std::iter::repeat(ty).take(names.len().max(1)));
                }
            }
        }
        Self { results }
    }

    pub fn result(&self, i: usize) -> Option<&str> {
        self.results.get(i).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    /// Struct field or interface method.
    Member,
    /// Parameter, result or receiver.
    Param,
}

fn is_stmt(node: &Node) -> bool {
    matches!(
        node,
        Node::EmptyStmt
            | Node::Labeled { .. }
            | Node::ExprStmt { .. }
            | Node::Send { .. }
            | Node::IncDec { .. }
            | Node::Assign { .. }
            | Node::Go { .. }
            | Node::Defer { .. }
            | Node::Return { .. }
            | Node::Branch { .. }
            | Node::Block { .. }
            | Node::If { .. }
            | Node::CaseClause { .. }
            | Node::Switch { .. }
            | Node::TypeSwitch { .. }
            | Node::CommClause { .. }
            | Node::Select { .. }
            | Node::For { .. }
            | Node::Range { .. }
            | Node::DeclStmt { .. }
    )
}

fn is_type(node: &Node) -> bool {
    matches!(
        node,
        Node::ArrayType { .. }
            | Node::StructType { .. }
            | Node::FuncType { .. }
            | Node::InterfaceType { .. }
            | Node::MapType { .. }
            | Node::ChanType { .. }
            | Node::Ellipsis { .. }
    )
}

/// Walks one file after another, handing every node to its rewrite handler
/// exactly once and lifting deletions to the enclosing construct.
pub struct Walker<'a> {
    pub(crate) ast: &'a mut Ast,
    pub(crate) rules: &'a mut Rules,
    pub(crate) visited: &'a mut VisitedSet,
    /// Output package name; adopted from the first file when empty.
    pub(crate) pkg_name: &'a mut String,
}

impl<'a> Walker<'a> {
    pub fn new(
        ast: &'a mut Ast,
        rules: &'a mut Rules,
        visited: &'a mut VisitedSet,
        pkg_name: &'a mut String,
    ) -> Self {
        Self {
            ast,
            rules,
            visited,
            pkg_name,
        }
    }

    pub fn walk_file(&mut self, file: NodeId) {
        if !self.visited.insert(file) {
            return;
        }
        self.rewrite_package_name(file);
        let Node::File { decls, .. } = self.ast.get(file).clone() else {
            return;
        };
        let decls = self.walk_list(decls, |w, id| w.walk_decl(id));
        if let Node::File { decls: slot, .. } = self.ast.get_mut(file) {
            *slot = decls;
        }
        self.rewrite_file_comments(file);
    }

    /// Applies a child's action to its slot in `parent`. False when the
    /// child was deleted.
    pub(crate) fn settle(&mut self, parent: NodeId, child: NodeId, action: Action) -> bool {
        match action {
            Action::Keep => true,
            Action::Replace(new) => {
                self.ast.get_mut(parent).replace_child(child, new);
                true
            }
            Action::Delete => false,
        }
    }

    pub(crate) fn walk_children(
        &mut self,
        id: NodeId,
        mut f: impl FnMut(&mut Self, NodeId) -> Action,
    ) -> Action {
        for child in self.ast.get(id).children() {
            let action = f(self, child);
            if !self.settle(id, child, action) {
                return Action::Delete;
            }
        }
        Action::Keep
    }

    /// Walks the items of a declaration level list. Deleted items vanish
    /// together with the trailing comment that followed them.
    pub(crate) fn walk_list(
        &mut self,
        list: Vec<NodeId>,
        mut f: impl FnMut(&mut Self, NodeId) -> Action,
    ) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(list.len());
        let mut dropped = false;
        for id in list {
            if self.ast.is_comment_group(id) {
                let orphan = dropped && self.ast.is_trailing_group(id);
                if !orphan && self.rewrite_comment_group(id) {
                    out.push(id);
                }
                dropped = false;
                continue;
            }
            dropped = false;
            match f(self, id) {
                Action::Keep => out.push(id),
                Action::Replace(new) => out.push(new),
                Action::Delete => dropped = true,
            }
        }
        out
    }

    pub(crate) fn walk_decl(&mut self, id: NodeId) -> Action {
        if !self.visited.insert(id) {
            return Action::Keep;
        }
        match self.ast.get(id).clone() {
            Node::GenDecl { specs, .. } => {
                self.rewrite_doc(id);
                let specs = self.walk_list(specs, |w, spec| w.walk_spec(spec));
                if specs.iter().all(|s| self.ast.is_comment_group(*s)) {
                    trace!("{id:?}: declaration emptied");
                    return Action::Delete;
                }
                if let Node::GenDecl { specs: slot, .. } = self.ast.get_mut(id) {
                    *slot = specs;
                }
                Action::Keep
            }
            Node::FuncDecl { .. } => self.rewrite_func_decl(id),
            _ => Action::Keep,
        }
    }

    fn walk_spec(&mut self, id: NodeId) -> Action {
        if !self.visited.insert(id) {
            return Action::Keep;
        }
        match self.ast.get(id).clone() {
            Node::TypeSpec { .. } => self.rewrite_type_spec(id),
            Node::ValueSpec {
                names, ty, values, ..
            } => {
                self.rewrite_doc(id);
                for name in names {
                    let action = self.walk_expr(name);
                    if !self.settle(id, name, action) {
                        return Action::Delete;
                    }
                }
                if let Some(ty) = ty {
                    let action = self.walk_type(ty);
                    if !self.settle(id, ty, action) {
                        return Action::Delete;
                    }
                }
                for value in values {
                    let action = self.walk_expr(value);
                    if !self.settle(id, value, action) {
                        return Action::Delete;
                    }
                }
                Action::Keep
            }
            // Import paths are never rewritten.
            _ => Action::Keep,
        }
    }

    pub(crate) fn walk_field(&mut self, id: NodeId, role: FieldRole) -> Action {
        if !self.visited.insert(id) {
            return Action::Keep;
        }
        self.rewrite_field(id, role)
    }

    /// A node in type position.
    pub(crate) fn walk_type(&mut self, id: NodeId) -> Action {
        if !self.visited.insert(id) {
            return Action::Keep;
        }
        self.dispatch_type(id)
    }

    fn dispatch_type(&mut self, id: NodeId) -> Action {
        trace!("type {id:?}");
        match self.ast.get(id).clone() {
            Node::Ident { .. } => self.rewrite_ident(id),
            Node::Selector { .. } => self.rewrite_selector(id),
            Node::Star { .. }
            | Node::Paren { .. }
            | Node::ArrayType { .. }
            | Node::MapType { .. }
            | Node::ChanType { .. }
            | Node::Ellipsis { .. } => self.walk_children(id, |w, c| w.walk_type(c)),
            Node::FuncType { .. } => self.walk_children(id, |w, c| w.walk_field(c, FieldRole::Param)),
            Node::InterfaceType { methods } if methods.is_empty() => self.rewrite_interface(),
            Node::InterfaceType { methods } => {
                let methods = self.walk_list(methods, |w, m| w.walk_field(m, FieldRole::Member));
                if let Node::InterfaceType { methods: slot } = self.ast.get_mut(id) {
                    *slot = methods;
                }
                Action::Keep
            }
            Node::StructType { fields } => {
                let fields = self.walk_list(fields, |w, f| w.walk_field(f, FieldRole::Member));
                if let Node::StructType { fields: slot } = self.ast.get_mut(id) {
                    *slot = fields;
                }
                Action::Keep
            }
            _ => self.dispatch_expr(id),
        }
    }

    pub(crate) fn walk_expr(&mut self, id: NodeId) -> Action {
        if !self.visited.insert(id) {
            return Action::Keep;
        }
        self.dispatch_expr(id)
    }

    fn dispatch_expr(&mut self, id: NodeId) -> Action {
        trace!("expr {id:?}");
        match self.ast.get(id).clone() {
            Node::Ident { .. } => self.rewrite_ident(id),
            Node::BasicLit { .. } | Node::Comment { .. } | Node::CommentGroup { .. } => {
                Action::Keep
            }
            Node::Selector { .. } => self.rewrite_selector(id),
            Node::CompositeLit { ty, elts, .. } => {
                if let Some(ty) = ty {
                    let action = self.walk_type(ty);
                    if !self.settle(id, ty, action) {
                        return Action::Delete;
                    }
                }
                match self.walk_elements(elts) {
                    Some(elts) => {
                        if let Node::CompositeLit { elts: slot, .. } = self.ast.get_mut(id) {
                            *slot = elts;
                        }
                        Action::Keep
                    }
                    None => Action::Delete,
                }
            }
            Node::FuncLit { ty, body } => {
                let action = self.walk_type(ty);
                if !self.settle(id, ty, action) {
                    return Action::Delete;
                }
                let scope = FuncScope::new(self.ast, ty);
                let action = self.walk_stmt(body, &scope);
                if !self.settle(id, body, action) {
                    return Action::Delete;
                }
                Action::Keep
            }
            Node::TypeAssert { x, ty } => {
                let action = self.walk_expr(x);
                if !self.settle(id, x, action) {
                    return Action::Delete;
                }
                if let Some(ty) = ty {
                    let action = self.walk_type(ty);
                    if !self.settle(id, ty, action) {
                        return Action::Delete;
                    }
                }
                Action::Keep
            }
            node if is_type(&node) => self.dispatch_type(id),
            _ => self.walk_children(id, |w, c| w.walk_expr(c)),
        }
    }

    /// Composite literal elements. A deleted keyed element is dropped, any
    /// other deleted element takes the whole literal with it.
    fn walk_elements(&mut self, elts: Vec<NodeId>) -> Option<Vec<NodeId>> {
        let mut out = Vec::with_capacity(elts.len());
        let mut dropped = false;
        for elt in elts {
            if self.ast.is_comment_group(elt) {
                let orphan = dropped && self.ast.is_trailing_group(elt);
                if !orphan && self.rewrite_comment_group(elt) {
                    out.push(elt);
                }
                dropped = false;
                continue;
            }
            dropped = false;
            let keyed = matches!(self.ast.get(elt), Node::KeyValue { .. });
            let action = match keyed {
                true if self.visited.insert(elt) => self.rewrite_key_value(elt),
                true => Action::Keep,
                false => self.walk_expr(elt),
            };
            match action {
                Action::Keep => out.push(elt),
                Action::Replace(new) => out.push(new),
                Action::Delete if keyed => dropped = true,
                Action::Delete => return None,
            }
        }
        Some(out)
    }

    pub(crate) fn walk_stmt(&mut self, id: NodeId, scope: &FuncScope) -> Action {
        if !self.visited.insert(id) {
            return Action::Keep;
        }
        trace!("stmt {id:?}");
        match self.ast.get(id).clone() {
            Node::Block { list } => match self.walk_stmt_list(list, scope) {
                Some(list) => {
                    if let Node::Block { list: slot } = self.ast.get_mut(id) {
                        *slot = list;
                    }
                    Action::Keep
                }
                None => Action::Delete,
            },
            Node::CaseClause { list, body } => {
                for x in list.unwrap_or_default() {
                    let action = self.walk_expr(x);
                    if !self.settle(id, x, action) {
                        return Action::Delete;
                    }
                }
                match self.walk_stmt_list(body, scope) {
                    Some(body) => {
                        if let Node::CaseClause { body: slot, .. } = self.ast.get_mut(id) {
                            *slot = body;
                        }
                        Action::Keep
                    }
                    None => Action::Delete,
                }
            }
            Node::CommClause { comm, body } => {
                if let Some(comm) = comm {
                    let action = self.walk_stmt(comm, scope);
                    if !self.settle(id, comm, action) {
                        return Action::Delete;
                    }
                }
                match self.walk_stmt_list(body, scope) {
                    Some(body) => {
                        if let Node::CommClause { body: slot, .. } = self.ast.get_mut(id) {
                            *slot = body;
                        }
                        Action::Keep
                    }
                    None => Action::Delete,
                }
            }
            Node::Labeled { label, stmt } => {
                self.visited.insert(label);
                let action = self.walk_stmt(stmt, scope);
                match self.settle(id, stmt, action) {
                    true => Action::Keep,
                    false => Action::Delete,
                }
            }
            Node::Branch { label, .. } => {
                if let Some(label) = label {
                    self.visited.insert(label);
                }
                Action::Keep
            }
            Node::Return { .. } => match self.walk_children(id, |w, c| w.walk_expr(c)) {
                Action::Delete => Action::Delete,
                _ => self.rewrite_return(id, scope),
            },
            Node::DeclStmt { decl } => {
                let action = self.walk_decl(decl);
                match self.settle(id, decl, action) {
                    true => Action::Keep,
                    false => Action::Delete,
                }
            }
            _ => self.walk_children(id, |w, c| match is_stmt(w.ast.get(c)) {
                true => w.walk_stmt(c, scope),
                false => w.walk_expr(c),
            }),
        }
    }

    /// None when a statement was deleted; the enclosing function goes too.
    fn walk_stmt_list(&mut self, list: Vec<NodeId>, scope: &FuncScope) -> Option<Vec<NodeId>> {
        let mut out = Vec::with_capacity(list.len());
        for id in list {
            if self.ast.is_comment_group(id) {
                if self.rewrite_comment_group(id) {
                    out.push(id);
                }
                continue;
            }
            match self.walk_stmt(id, scope) {
                Action::Keep => out.push(id),
                Action::Replace(new) => out.push(new),
                Action::Delete => {
                    trace!("{id:?}: statement deleted");
                    return None;
                }
            }
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Source;
    use crate::parser::parse_file;

    fn parse(src: &str) -> (Ast, NodeId) {
        let mut ast = Ast::new();
        let source = Source::from_contents("test.go".into(), src.into()).unwrap();
        let file = parse_file(&mut ast, &source).unwrap();
        (ast, file)
    }

    #[test]
    fn every_node_is_visited_once() {
        let (mut ast, file) = parse(
            "package p\n\nfunc f(a int) (int, error) {\n\tif a > 0 {\n\t\treturn a, nil\n\t}\n\treturn 0, nil\n}\n",
        );
        let reachable = ast.descendants(file).len();
        let mut rules = Rules::default();
        let mut visited = VisitedSet::default();
        let mut pkg = String::new();
        Walker::new(&mut ast, &mut rules, &mut visited, &mut pkg).walk_file(file);
        assert_eq!(pkg, "p");
        assert_eq!(visited.len(), reachable);

        let before = visited.len();
        Walker::new(&mut ast, &mut rules, &mut visited, &mut pkg).walk_file(file);
        assert_eq!(visited.len(), before);
    }

    #[test]
    fn scope_expands_named_results() {
        let (ast, file) = parse("package p\n\nfunc f() (a, b KT, err error) {\n\treturn\n}\n");
        let Node::File { decls, .. } = ast.get(file) else {
            panic!("not a file");
        };
        let Node::FuncDecl { ty, .. } = ast.get(decls[0]) else {
            panic!("not a func");
        };
        let scope = FuncScope::new(&ast, *ty);
        assert_eq!(scope.len(), 3);
        assert_eq!(scope.result(1), Some("KT"));
        assert_eq!(scope.result(2), Some("error"));
        assert_eq!(scope.result(3), None);
    }
}
