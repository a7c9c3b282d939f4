// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Per node rewrite handlers invoked by the [`Walker`].

use crate::ast::{Node, NodeId};
use crate::rules::{is_identifier, Rule, RuleKind};
use crate::walker::{Action, FieldRole, FuncScope, Walker};

use tracing::{debug, trace};

impl Walker<'_> {
    fn rule(&self, kind: RuleKind, name: &str) -> Option<Rule> {
        self.rules.get(kind, name).cloned()
    }

    fn name_of(&self, id: NodeId) -> String {
        self.ast.ident_name(id).unwrap_or_default().to_string()
    }

    fn rename(&mut self, id: NodeId, name: &str) {
        if let Node::Ident { name: slot } = self.ast.get_mut(id) {
            if slot != name {
                trace!("{slot} -> {name}");
                *slot = name.to_string();
            }
        }
    }

    fn substitute(&mut self, id: NodeId) {
        let name = self.name_of(id);
        let replaced = self.rules.subst.replace(&name);
        self.rename(id, &replaced);
    }

    /// Identifier in expression or type position.
    pub(crate) fn rewrite_ident(&mut self, id: NodeId) -> Action {
        let name = self.name_of(id);
        for kind in [RuleKind::Type, RuleKind::Func] {
            match self.rule(kind, &name) {
                Some(Rule::Delete) => {
                    debug!("`{name}` refers to a deleted {}", kind.as_str());
                    return Action::Delete;
                }
                Some(rule) => {
                    self.rename(id, rule.target().unwrap_or(&name));
                    return Action::Keep;
                }
                None => (),
            }
        }
        self.substitute(id);
        Action::Keep
    }

    /// `x.member`, tried in order: a rule on the bare member, a rule on the
    /// exact `x.member` pair, a reference into the output package and finally
    /// plain substitution of both parts.
    pub(crate) fn rewrite_selector(&mut self, id: NodeId) -> Action {
        let Node::Selector { x, sel } = self.ast.get(id).clone() else {
            return Action::Keep;
        };
        self.visited.insert(sel);
        let member = self.name_of(sel);
        let bare = self.rule(RuleKind::Selector, &format!(".{member}"));

        if let Some(target) = bare.as_ref().and_then(Rule::target) {
            self.rename(sel, target);
            return self.walk_receiver(id, x);
        }

        let recv = self.ast.ident_name(x).map(str::to_string);
        if let Some(recv) = &recv {
            if let Some(rule) = self.rule(RuleKind::Selector, &format!("{recv}.{member}")) {
                self.visited.insert(x);
                let Some(target) = rule.target() else {
                    debug!("selector `{recv}.{member}` is deleted");
                    return Action::Delete;
                };
                return match target.split_once('.') {
                    Some((pkg, name)) if !name.contains('.') => {
                        self.rename(x, pkg);
                        self.rename(sel, name);
                        Action::Keep
                    }
                    _ => {
                        self.rename(x, target);
                        Action::Replace(x)
                    }
                };
            }
        }

        if bare.is_some() {
            debug!("member `.{member}` is deleted");
            return Action::Delete;
        }

        if !self.pkg_name.is_empty() && recv.as_deref() == Some(self.pkg_name.as_str()) {
            return match self.rewrite_member(sel) {
                Action::Delete => Action::Delete,
                _ => Action::Replace(sel),
            };
        }

        match self.walk_receiver(id, x) {
            Action::Delete => Action::Delete,
            _ => self.rewrite_member(sel),
        }
    }

    fn walk_receiver(&mut self, selector: NodeId, x: NodeId) -> Action {
        if self.ast.ident_name(x).is_some() {
            return match self.visited.insert(x) {
                true => self.rewrite_ident(x),
                false => Action::Keep,
            };
        }
        let action = self.walk_expr(x);
        match self.settle(selector, x, action) {
            true => Action::Keep,
            false => Action::Delete,
        }
    }

    fn rewrite_member(&mut self, sel: NodeId) -> Action {
        let name = self.name_of(sel);
        match self.rule(RuleKind::Func, &name) {
            Some(Rule::Delete) => {
                debug!("call of deleted func `{name}`");
                Action::Delete
            }
            Some(rule) => {
                self.rename(sel, rule.target().unwrap_or(&name));
                Action::Keep
            }
            None => {
                self.substitute(sel);
                Action::Keep
            }
        }
    }

    /// The `interface{}` placeholder outside of a type declaration.
    pub(crate) fn rewrite_interface(&mut self) -> Action {
        match self.rule(RuleKind::Type, "interface{}") {
            None => Action::Keep,
            Some(Rule::Delete) => Action::Delete,
            Some(rule) => {
                let ident = self.ast.ident(rule.target().unwrap_or_default());
                self.visited.insert(ident);
                Action::Replace(ident)
            }
        }
    }

    pub(crate) fn rewrite_key_value(&mut self, id: NodeId) -> Action {
        let Node::KeyValue { key, .. } = self.ast.get(id).clone() else {
            return Action::Keep;
        };
        if let Some(name) = self.ast.ident_name(key).map(str::to_string) {
            match self.rule(RuleKind::Field, &name) {
                Some(Rule::Delete) => {
                    debug!("dropping literal element `{name}`");
                    return Action::Delete;
                }
                Some(rule) => {
                    self.rename(key, rule.target().unwrap_or(&name));
                    self.visited.insert(key);
                }
                None => (),
            }
        }
        self.walk_children(id, |w, c| w.walk_expr(c))
    }

    pub(crate) fn rewrite_field(&mut self, id: NodeId, role: FieldRole) -> Action {
        let Node::Field { names, ty, .. } = self.ast.get(id).clone() else {
            return Action::Keep;
        };
        if role == FieldRole::Member {
            self.rewrite_doc(id);
        }

        let action = self.walk_type(ty);
        if !self.settle(id, ty, action) {
            debug!("{id:?}: field type deleted");
            return Action::Delete;
        }

        let mut kept = Vec::with_capacity(names.len());
        for name_id in &names {
            self.visited.insert(*name_id);
            let name = self.name_of(*name_id);
            let rule = match role {
                FieldRole::Member => self.rule(RuleKind::Field, &name),
                FieldRole::Param => None,
            };
            match rule {
                Some(Rule::Delete) => {
                    debug!("dropping field `{name}`");
                    continue;
                }
                Some(rule) => self.rename(*name_id, rule.target().unwrap_or(&name)),
                None => self.substitute(*name_id),
            }
            kept.push(*name_id);
        }
        if !names.is_empty() && kept.is_empty() {
            return Action::Delete;
        }
        if let Node::Field { names: slot, .. } = self.ast.get_mut(id) {
            *slot = kept;
        }
        Action::Keep
    }

    pub(crate) fn rewrite_type_spec(&mut self, id: NodeId) -> Action {
        let Node::TypeSpec { name, ty, .. } = self.ast.get(id).clone() else {
            return Action::Keep;
        };
        self.visited.insert(name);
        let decl = self.name_of(name);

        match self.rules.type_decl(&decl) {
            None => self.substitute(name),
            Some(Rule::Delete) => {
                debug!("deleting type `{decl}`");
                return Action::Delete;
            }
            Some(rule) => {
                let target = rule.target().unwrap_or_default().to_string();
                if matches!(
                    self.ast.get(ty),
                    Node::Ident { .. } | Node::Selector { .. } | Node::InterfaceType { .. }
                ) {
                    debug!("type `{decl}` is replaced by `{target}`");
                    self.rules.retire(&decl);
                    return Action::Delete;
                }
                if !is_identifier(&target) {
                    debug!("type `{decl}` cannot be declared as `{target}`");
                    return Action::Delete;
                }
                self.rename(name, &target);
            }
        }

        self.rewrite_doc(id);
        let action = self.walk_type(ty);
        match self.settle(id, ty, action) {
            true => Action::Keep,
            false => Action::Delete,
        }
    }

    pub(crate) fn rewrite_func_decl(&mut self, id: NodeId) -> Action {
        let Node::FuncDecl {
            recv,
            name,
            ty,
            body,
            ..
        } = self.ast.get(id).clone()
        else {
            return Action::Keep;
        };
        self.visited.insert(name);
        let func = self.name_of(name);

        match self.rule(RuleKind::Func, &func) {
            Some(Rule::Delete) => {
                debug!("deleting func `{func}`");
                return Action::Delete;
            }
            Some(rule) => self.rename(name, rule.target().unwrap_or(&func)),
            None => self.substitute(name),
        }

        if let Some(recv) = recv {
            let action = self.walk_field(recv, FieldRole::Param);
            if !self.settle(id, recv, action) {
                debug!("deleting method `{func}` of a deleted type");
                return Action::Delete;
            }
        }

        let action = self.walk_type(ty);
        if !self.settle(id, ty, action) {
            debug!("deleting func `{func}`: signature uses a deleted type");
            return Action::Delete;
        }

        if let Some(body) = body {
            if self.references_deleted(body) {
                debug!("deleting func `{func}`: body uses a deleted name");
                return Action::Delete;
            }
            let scope = FuncScope::new(self.ast, ty);
            let action = self.walk_stmt(body, &scope);
            if !self.settle(id, body, action) {
                debug!("deleting func `{func}`: body statement deleted");
                return Action::Delete;
            }
        }

        self.rewrite_doc(id);
        Action::Keep
    }

    /// Whether a function body mentions a deleted type, function, field or
    /// selector. Keys of keyed literal elements do not count; those elements
    /// are dropped on their own.
    fn references_deleted(&self, id: NodeId) -> bool {
        match self.ast.get(id) {
            Node::Ident { name } => {
                self.rules.is_deleted(RuleKind::Type, name)
                    || self.rules.is_deleted(RuleKind::Func, name)
            }
            Node::Selector { x, sel } => {
                let member = self.ast.ident_name(*sel).unwrap_or_default();
                if self.rules.is_deleted(RuleKind::Field, member)
                    || self.rules.is_deleted(RuleKind::Selector, &format!(".{member}"))
                {
                    return true;
                }
                if let Some(recv) = self.ast.ident_name(*x) {
                    if self
                        .rules
                        .is_deleted(RuleKind::Selector, &format!("{recv}.{member}"))
                    {
                        return true;
                    }
                }
                self.references_deleted(*x)
            }
            Node::KeyValue { key, value } => {
                let keyed = self.ast.ident_name(*key).is_some();
                (!keyed && self.references_deleted(*key)) || self.references_deleted(*value)
            }
            Node::Labeled { stmt, .. } => self.references_deleted(*stmt),
            Node::Branch { .. } | Node::Comment { .. } | Node::CommentGroup { .. } => false,
            node => node
                .children()
                .into_iter()
                .any(|c| self.references_deleted(c)),
        }
    }

    /// `return nil` where the result type has no nil gets the type's zero
    /// value variable instead.
    pub(crate) fn rewrite_return(&mut self, id: NodeId, scope: &FuncScope) -> Action {
        let Node::Return { results } = self.ast.get(id).clone() else {
            return Action::Keep;
        };
        if results.len() != scope.len() {
            return Action::Keep;
        }
        for (i, result) in results.iter().enumerate() {
            if self.ast.ident_name(*result) != Some("nil") {
                continue;
            }
            let Some(ty) = scope.result(i) else {
                continue;
            };
            if let Some(var) = self.rules.zero.mark(ty) {
                self.rename(*result, &var);
            }
        }
        Action::Keep
    }

    pub(crate) fn rewrite_doc(&mut self, id: NodeId) {
        let Some(doc) = self.ast.doc(id) else {
            return;
        };
        if !self.rewrite_comment_group(doc) {
            if let Some(slot) = self.ast.get_mut(id).doc_mut() {
                *slot = None;
            }
        }
    }

    /// Rewrites the comments of a group in place. False when none survive.
    pub(crate) fn rewrite_comment_group(&mut self, group: NodeId) -> bool {
        self.visited.insert(group);
        let Node::CommentGroup { list, .. } = self.ast.get(group).clone() else {
            return true;
        };
        let mut kept = Vec::with_capacity(list.len());
        for c in list {
            if !self.visited.insert(c) {
                kept.push(c);
                continue;
            }
            let Node::Comment { text } = self.ast.get(c).clone() else {
                continue;
            };
            let filtered = self
                .rules
                .filters
                .apply(&text)
                .map(|t| self.rules.subst.comment(&t));
            match filtered {
                None => trace!("dropping comment {text:?}"),
                Some(new) => {
                    if new != text {
                        self.ast.set(c, Node::Comment { text: new });
                    }
                    kept.push(c);
                }
            }
        }
        let survived = !kept.is_empty();
        if let Node::CommentGroup { list, .. } = self.ast.get_mut(group) {
            *list = kept;
        }
        survived
    }

    /// Renames the package clause to the output package, or adopts the
    /// file's name when none was given.
    pub(crate) fn rewrite_package_name(&mut self, file: NodeId) {
        let Node::File { name, .. } = self.ast.get(file).clone() else {
            return;
        };
        self.visited.insert(name);
        let current = self.name_of(name);
        if self.pkg_name.is_empty() {
            debug!("adopting package name `{current}`");
            *self.pkg_name = current;
        } else if *self.pkg_name != current {
            let pkg = self.pkg_name.clone();
            debug!("package `{current}` renamed to `{pkg}`");
            self.rename(name, &pkg);
        }
    }

    /// The file header and the package doc get the same treatment as every
    /// other comment: build pragmas naming genx and deleted names are
    /// removed, renamed ones substituted. Groups left empty are dropped.
    pub(crate) fn rewrite_file_comments(&mut self, file: NodeId) {
        let Node::File { header, doc, .. } = self.ast.get(file).clone() else {
            return;
        };
        let header: Vec<NodeId> = header
            .into_iter()
            .filter(|g| self.rewrite_comment_group(*g))
            .collect();
        let doc = doc.filter(|g| self.rewrite_comment_group(*g));
        if let Node::File {
            header: header_slot,
            doc: doc_slot,
            ..
        } = self.ast.get_mut(file)
        {
            *header_slot = header;
            *doc_slot = doc;
        }
    }
}
