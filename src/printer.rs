// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::*;

/// Renders arena nodes back into Go source.
///
/// Layout is canonical: tab indentation, one list item per line, binary
/// operators spaced. Blank lines between list items are kept where the
/// source had them; a synthesized item is set apart from real ones by a
/// blank line. Printing the output of a re-parse yields the same text.
///
/// Comments are only attached to list items, so a comment written inside an
/// expression is printed after the item holding it, at the end of the line.
pub struct Printer<'a> {
    ast: &'a Ast,
    out: String,
    indent: usize,
    // Set while printing the direct members of an interface.
    in_interface: bool,
}

pub fn print_file(ast: &Ast, file: NodeId) -> String {
    let mut p = Printer::new(ast);
    p.node(file);
    p.out.push('\n');
    p.out
}

pub fn print_node(ast: &Ast, id: NodeId) -> String {
    let mut p = Printer::new(ast);
    p.node(id);
    p.out
}

impl<'a> Printer<'a> {
    pub fn new(ast: &'a Ast) -> Self {
        Self {
            ast,
            out: String::new(),
            indent: 0,
            in_interface: false,
        }
    }

    fn line_break(&mut self, blank: bool) {
        if !self.out.is_empty() {
            if blank {
                self.out.push('\n');
            }
            self.out.push('\n');
        }
        for _ in 0..self.indent {
            self.out.push('\t');
        }
    }

    fn text(&mut self, s: &str) {
        self.out.push_str(s);
    }

    // `prev` is the end line of the output preceding the first item and
    // whether it was synthesized; None suppresses a leading blank line.
    fn items(&mut self, items: &[NodeId], mut prev: Option<(u32, bool)>, term: &str) {
        let ast = self.ast;
        for &id in items {
            if ast.is_trailing_group(id) {
                self.text(" ");
                self.comment_group(id, true);
                if let Some((end, synth)) = prev {
                    prev = Some((end.max(ast.end_line(id)), synth));
                }
                continue;
            }

            let synth = ast.line(id) == 0;
            let blank = match prev {
                None => false,
                Some((_, psynth)) if synth || psynth => synth != psynth,
                Some((end, _)) => ast.start_line(id) > end + 1,
            };
            self.line_break(blank);
            self.node(id);
            if !ast.is_comment_group(id) {
                self.text(term);
            }
            prev = Some((ast.end_line(id), synth));
        }
    }

    fn comment_group(&mut self, id: NodeId, inline: bool) {
        let ast = self.ast;
        if let Node::CommentGroup { list, .. } = ast.get(id) {
            for (i, c) in list.iter().enumerate() {
                if i > 0 {
                    if inline {
                        self.text(" ");
                    } else {
                        self.line_break(false);
                    }
                }
                self.node(*c);
            }
        }
    }

    fn doc(&mut self, doc: &Option<NodeId>) {
        if let Some(doc) = doc {
            self.comment_group(*doc, false);
            self.line_break(false);
        }
    }

    fn exprs(&mut self, list: &[NodeId]) {
        let ast = self.ast;
        let mut first = true;
        for id in list.iter().filter(|id| !ast.is_comment_group(**id)) {
            if !first {
                self.text(", ");
            }
            first = false;
            self.node(*id);
        }
    }

    fn block(&mut self, list: &[NodeId]) {
        if list.is_empty() {
            self.text("{}");
            return;
        }
        self.text("{");
        self.indent += 1;
        self.items(list, None, "");
        self.indent -= 1;
        self.line_break(false);
        self.text("}");
    }

    fn signature(&mut self, ty: NodeId) {
        let ast = self.ast;
        let Node::FuncType {
            params,
            results,
            results_paren,
        } = ast.get(ty)
        else {
            self.node(ty);
            return;
        };
        self.text("(");
        self.exprs(params);
        self.text(")");
        if results.is_empty() {
            return;
        }
        let named = results
            .iter()
            .any(|r| matches!(ast.get(*r), Node::Field { names, .. } if !names.is_empty()));
        if *results_paren || named || results.len() > 1 {
            self.text(" (");
            self.exprs(results);
            self.text(")");
        } else {
            self.text(" ");
            self.exprs(results);
        }
    }

    fn opt_stmt(&mut self, stmt: &Option<NodeId>) {
        if let Some(stmt) = stmt {
            self.node(*stmt);
        }
    }

    pub fn node(&mut self, id: NodeId) {
        let ast = self.ast;
        match ast.get(id) {
            Node::Comment { text } => self.text(text),
            Node::CommentGroup { trailing, .. } => self.comment_group(id, *trailing),

            Node::Ident { name } => self.text(name),
            Node::BasicLit { value, .. } => self.text(value),
            Node::CompositeLit {
                ty,
                elts,
                multiline,
            } => {
                if let Some(ty) = ty {
                    self.node(*ty);
                }
                if *multiline && !elts.is_empty() {
                    self.text("{");
                    self.indent += 1;
                    self.items(elts, None, ",");
                    self.indent -= 1;
                    self.line_break(false);
                    self.text("}");
                } else {
                    self.text("{");
                    self.exprs(elts);
                    self.text("}");
                }
            }
            Node::FuncLit { ty, body } => {
                self.text("func");
                self.signature(*ty);
                self.text(" ");
                self.node(*body);
            }
            Node::Paren { x } => {
                self.text("(");
                self.node(*x);
                self.text(")");
            }
            Node::Selector { x, sel } => {
                self.node(*x);
                self.text(".");
                self.node(*sel);
            }
            Node::Index { x, index } => {
                self.node(*x);
                self.text("[");
                self.node(*index);
                self.text("]");
            }
            Node::Slice {
                x,
                low,
                high,
                max,
                slice3,
            } => {
                self.node(*x);
                self.text("[");
                self.opt_stmt(low);
                self.text(":");
                self.opt_stmt(high);
                if *slice3 {
                    self.text(":");
                    self.opt_stmt(max);
                }
                self.text("]");
            }
            Node::TypeAssert { x, ty } => {
                self.node(*x);
                self.text(".(");
                match ty {
                    Some(ty) => self.node(*ty),
                    None => self.text("type"),
                }
                self.text(")");
            }
            Node::Call {
                fun,
                args,
                ellipsis,
            } => {
                self.node(*fun);
                self.text("(");
                self.exprs(args);
                if *ellipsis {
                    self.text("...");
                }
                self.text(")");
            }
            Node::Star { x } => {
                self.text("*");
                self.node(*x);
            }
            Node::Unary { op, x } => {
                self.text(op);
                if matches!(ast.get(*x), Node::Unary { .. }) {
                    self.text(" ");
                }
                self.node(*x);
            }
            Node::Binary { op, x, y } => {
                self.node(*x);
                self.text(" ");
                self.text(op);
                self.text(" ");
                self.node(*y);
            }
            Node::KeyValue { key, value } => {
                self.node(*key);
                self.text(": ");
                self.node(*value);
            }

            Node::ArrayType { len, elt } => {
                self.text("[");
                self.opt_stmt(len);
                self.text("]");
                self.node(*elt);
            }
            Node::StructType { fields } => {
                if fields.is_empty() {
                    self.text("struct{}");
                } else {
                    self.text("struct ");
                    self.block(fields);
                }
            }
            Node::FuncType { .. } => {
                self.text("func");
                self.signature(id);
            }
            Node::InterfaceType { methods } => {
                if methods.is_empty() {
                    self.text("interface{}");
                } else {
                    self.text("interface ");
                    let outer = core::mem::replace(&mut self.in_interface, true);
                    self.block(methods);
                    self.in_interface = outer;
                }
            }
            Node::MapType { key, value } => {
                self.text("map[");
                self.node(*key);
                self.text("]");
                self.node(*value);
            }
            Node::ChanType { dir, value } => {
                self.text(match dir {
                    ChanDir::Both => "chan ",
                    ChanDir::Send => "chan<- ",
                    ChanDir::Recv => "<-chan ",
                });
                self.node(*value);
            }
            Node::Ellipsis { elt } => {
                self.text("...");
                self.opt_stmt(elt);
            }
            Node::Field {
                doc,
                names,
                ty,
                tag,
            } => {
                let method = core::mem::replace(&mut self.in_interface, false);
                self.doc(doc);
                self.exprs(names);
                match ast.get(*ty) {
                    Node::FuncType { .. } if method && names.len() == 1 => self.signature(*ty),
                    _ => {
                        if !names.is_empty() {
                            self.text(" ");
                        }
                        self.node(*ty);
                    }
                }
                if let Some(tag) = tag {
                    self.text(" ");
                    self.text(tag);
                }
                self.in_interface = method;
            }

            Node::DeclStmt { decl } => self.node(*decl),
            Node::EmptyStmt => (),
            Node::Labeled { label, stmt } => {
                self.node(*label);
                self.text(":");
                if !matches!(ast.get(*stmt), Node::EmptyStmt) {
                    self.line_break(false);
                    self.node(*stmt);
                }
            }
            Node::ExprStmt { x } => self.node(*x),
            Node::Send { chan, value } => {
                self.node(*chan);
                self.text(" <- ");
                self.node(*value);
            }
            Node::IncDec { x, inc } => {
                self.node(*x);
                self.text(if *inc { "++" } else { "--" });
            }
            Node::Assign { lhs, op, rhs } => {
                self.exprs(lhs);
                self.text(" ");
                self.text(op);
                self.text(" ");
                self.exprs(rhs);
            }
            Node::Go { call } => {
                self.text("go ");
                self.node(*call);
            }
            Node::Defer { call } => {
                self.text("defer ");
                self.node(*call);
            }
            Node::Return { results } => {
                self.text("return");
                if !results.is_empty() {
                    self.text(" ");
                    self.exprs(results);
                }
            }
            Node::Branch { keyword, label } => {
                self.text(keyword);
                if let Some(label) = label {
                    self.text(" ");
                    self.node(*label);
                }
            }
            Node::Block { list } => self.block(list),
            Node::If {
                init,
                cond,
                body,
                els,
            } => {
                self.text("if ");
                if let Some(init) = init {
                    self.node(*init);
                    self.text("; ");
                }
                self.node(*cond);
                self.text(" ");
                self.node(*body);
                if let Some(els) = els {
                    self.text(" else ");
                    self.node(*els);
                }
            }
            Node::CaseClause { list, body } => {
                match list {
                    Some(list) => {
                        self.text("case ");
                        self.exprs(list);
                        self.text(":");
                    }
                    None => self.text("default:"),
                }
                self.indent += 1;
                self.items(body, None, "");
                self.indent -= 1;
            }
            Node::Switch { init, tag, body } => {
                self.text("switch ");
                if let Some(init) = init {
                    self.node(*init);
                    self.text(";");
                    if tag.is_some() {
                        self.text(" ");
                    }
                }
                if let Some(tag) = tag {
                    self.node(*tag);
                }
                if init.is_some() || tag.is_some() {
                    self.text(" ");
                }
                self.clauses(*body);
            }
            Node::TypeSwitch { init, assign, body } => {
                self.text("switch ");
                if let Some(init) = init {
                    self.node(*init);
                    self.text("; ");
                }
                self.node(*assign);
                self.text(" ");
                self.clauses(*body);
            }
            Node::CommClause { comm, body } => {
                match comm {
                    Some(comm) => {
                        self.text("case ");
                        self.node(*comm);
                        self.text(":");
                    }
                    None => self.text("default:"),
                }
                self.indent += 1;
                self.items(body, None, "");
                self.indent -= 1;
            }
            Node::Select { body } => {
                self.text("select ");
                self.clauses(*body);
            }
            Node::For {
                init,
                cond,
                post,
                body,
            } => {
                self.text("for ");
                if init.is_some() || post.is_some() {
                    self.opt_stmt(init);
                    self.text("; ");
                    self.opt_stmt(cond);
                    self.text("; ");
                    self.opt_stmt(post);
                    self.text(" ");
                } else if let Some(cond) = cond {
                    self.node(*cond);
                    self.text(" ");
                }
                self.node(*body);
            }
            Node::Range {
                key,
                value,
                define,
                x,
                body,
            } => {
                self.text("for ");
                if let Some(key) = key {
                    self.node(*key);
                    if let Some(value) = value {
                        self.text(", ");
                        self.node(*value);
                    }
                    self.text(if *define { " := " } else { " = " });
                }
                self.text("range ");
                self.node(*x);
                self.text(" ");
                self.node(*body);
            }

            Node::GenDecl {
                doc,
                keyword,
                specs,
                grouped,
            } => {
                self.doc(doc);
                self.text(keyword.as_str());
                if *grouped || specs.len() != 1 {
                    self.text(" (");
                    self.indent += 1;
                    self.items(specs, None, "");
                    self.indent -= 1;
                    self.line_break(false);
                    self.text(")");
                } else {
                    self.text(" ");
                    self.node(specs[0]);
                }
            }
            Node::ImportSpec { doc, name, path } => {
                self.doc(doc);
                if let Some(name) = name {
                    self.node(*name);
                    self.text(" ");
                }
                self.text(path);
            }
            Node::ValueSpec {
                doc,
                names,
                ty,
                values,
            } => {
                self.doc(doc);
                self.exprs(names);
                if let Some(ty) = ty {
                    self.text(" ");
                    self.node(*ty);
                }
                if !values.is_empty() {
                    self.text(" = ");
                    self.exprs(values);
                }
            }
            Node::TypeSpec {
                doc,
                name,
                alias,
                ty,
            } => {
                self.doc(doc);
                self.node(*name);
                self.text(if *alias { " = " } else { " " });
                self.node(*ty);
            }
            Node::FuncDecl {
                doc,
                recv,
                name,
                ty,
                body,
            } => {
                self.doc(doc);
                self.text("func ");
                if let Some(recv) = recv {
                    self.text("(");
                    self.node(*recv);
                    self.text(") ");
                }
                self.node(*name);
                self.signature(*ty);
                if let Some(body) = body {
                    self.text(" ");
                    self.node(*body);
                }
            }
            Node::File {
                header,
                doc,
                name,
                decls,
            } => {
                self.items(header, None, "");
                let blank = match header.last() {
                    Some(last) => ast.start_line(id) > ast.end_line(*last) + 1,
                    None => false,
                };
                self.line_break(blank);
                self.doc(doc);
                self.text("package ");
                self.node(*name);
                self.items(decls, Some((ast.end_line(*name), false)), "");
            }
        }
    }

    fn clauses(&mut self, body: NodeId) {
        let ast = self.ast;
        let list = match ast.get(body) {
            Node::Block { list } => list,
            _ => return,
        };
        self.text("{");
        self.items(list, None, "");
        self.line_break(false);
        self.text("}");
    }
}
