// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::*;
use crate::lexer::*;

use anyhow::{bail, Result};

struct PendingComment {
    id: NodeId,
    line: u32,
    end_line: u32,
    // On the same line as the token before it.
    trailing: bool,
}

enum Simple {
    Stmt(NodeId),
    Range {
        key: Option<NodeId>,
        value: Option<NodeId>,
        define: bool,
        x: NodeId,
    },
}

enum Param {
    Named(NodeId, NodeId, u32),
    Bare(NodeId, u32),
}

const ASSIGN_OPS: [&str; 13] = [
    "=", ":=", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "<<=", ">>=", "&^=",
];

fn precedence(op: &str) -> i32 {
    match op {
        "||" => 1,
        "&&" => 2,
        "==" | "!=" | "<" | "<=" | ">" | ">=" => 3,
        "+" | "-" | "|" | "^" => 4,
        "*" | "/" | "%" | "<<" | ">>" | "&" | "&^" => 5,
        _ => 0,
    }
}

fn lit_kind(text: &str) -> LitKind {
    let hex = text.starts_with("0x") || text.starts_with("0X");
    if text.ends_with('i') {
        LitKind::Imag
    } else if text.contains('.')
        || (hex && text.contains(|c| matches!(c, 'p' | 'P')))
        || (!hex && text.contains(|c| matches!(c, 'e' | 'E')))
    {
        LitKind::Float
    } else {
        LitKind::Int
    }
}

pub struct Parser<'source, 'a> {
    lexer: Lexer<'source>,
    ast: &'a mut Ast,
    tok: Token,
    // End line of the last consumed token.
    end_line: u32,
    // < 0 in control clauses, where `T {` opens a block rather than a literal.
    expr_lev: i32,
    comments: Vec<PendingComment>,
}

impl<'source, 'a> Parser<'source, 'a> {
    pub fn new(source: &'source Source, ast: &'a mut Ast) -> Result<Self> {
        let start = Span {
            source: source.clone(),
            line: 0,
            col: 0,
            start: 0,
            end: 0,
        };
        let mut parser = Self {
            lexer: Lexer::new(source),
            ast,
            tok: Token(TokenKind::Eof, start),
            end_line: 0,
            expr_lev: 0,
            comments: vec![],
        };
        parser.next_token()?;
        Ok(parser)
    }

    pub fn token_text(&self) -> &str {
        match self.tok.0 {
            TokenKind::Symbol | TokenKind::Ident => self.tok.1.text(),
            TokenKind::AutoSemi => ";",
            _ => "",
        }
    }

    pub fn next_token(&mut self) -> Result<()> {
        self.end_line = self.tok.1.end_line();
        loop {
            let tok = self.lexer.next_token()?;
            if tok.0 != TokenKind::Comment {
                self.tok = tok;
                return Ok(());
            }
            let (line, end_line) = (tok.1.line, tok.1.end_line());
            let id = self.ast.alloc(
                Node::Comment {
                    text: tok.1.text().to_string(),
                },
                line,
                end_line,
            );
            self.comments.push(PendingComment {
                id,
                line,
                end_line,
                trailing: line == self.end_line,
            });
        }
    }

    fn error(&self, msg: &str) -> anyhow::Error {
        self.tok.1.error(msg)
    }

    fn expect(&mut self, text: &str, context: &str) -> Result<()> {
        if self.token_text() == text {
            self.next_token()
        } else {
            let msg = format!("expecting `{text}` {context}");
            Err(self.error(&msg))
        }
    }

    fn at_eof(&self) -> bool {
        self.tok.0 == TokenKind::Eof
    }

    fn is_ident(&self) -> bool {
        self.tok.0 == TokenKind::Ident && !is_keyword(self.tok.1.text())
    }

    fn node(&mut self, node: Node, line: u32) -> NodeId {
        self.ast.alloc(node, line, self.end_line)
    }

    // Splits the pending comments into groups. A group breaks on blank lines,
    // and a trailing group never extends past its line.
    fn take_groups(&mut self) -> Vec<(NodeId, u32, bool)> {
        let mut runs: Vec<Vec<PendingComment>> = vec![];
        for c in core::mem::take(&mut self.comments) {
            match runs.last_mut() {
                Some(run) if Self::joins(run, &c) => run.push(c),
                _ => runs.push(vec![c]),
            }
        }

        runs.into_iter()
            .map(|run| {
                let trailing = run[0].trailing;
                let (line, end_line) = (run[0].line, run[run.len() - 1].end_line);
                let list = run.iter().map(|c| c.id).collect();
                let id = self
                    .ast
                    .alloc(Node::CommentGroup { list, trailing }, line, end_line);
                (id, end_line, trailing)
            })
            .collect()
    }

    fn joins(run: &[PendingComment], c: &PendingComment) -> bool {
        let (first, last) = (&run[0], &run[run.len() - 1]);
        match (first.trailing, c.trailing) {
            (true, true) => c.line == last.end_line,
            (false, false) => c.line <= last.end_line + 1,
            _ => false,
        }
    }

    // Comments before a list item. The group right above the item becomes its
    // doc when `doc` is set; everything else floats in the list.
    fn take_leading(&mut self, item_line: u32, doc: bool) -> (Vec<NodeId>, Option<NodeId>) {
        let mut groups = self.take_groups();
        let doc = match groups.last() {
            Some((_, end_line, false)) if doc && end_line + 1 >= item_line => {
                groups.pop().map(|(id, _, _)| id)
            }
            _ => None,
        };
        (groups.into_iter().map(|(id, _, _)| id).collect(), doc)
    }

    fn flush_comments(&mut self) -> Vec<NodeId> {
        self.take_groups().into_iter().map(|(id, _, _)| id).collect()
    }

    pub fn parse_ident(&mut self) -> Result<NodeId> {
        if !self.is_ident() {
            return Err(self.error("expecting identifier"));
        }
        let line = self.tok.1.line;
        let name = self.tok.1.text().to_string();
        self.next_token()?;
        Ok(self.node(Node::Ident { name }, line))
    }

    fn parse_ident_list(&mut self) -> Result<Vec<NodeId>> {
        let mut names = vec![self.parse_ident()?];
        while self.token_text() == "," {
            self.next_token()?;
            names.push(self.parse_ident()?);
        }
        Ok(names)
    }

    fn parse_qualified_ident(&mut self) -> Result<NodeId> {
        let line = self.tok.1.line;
        let x = self.parse_ident()?;
        if self.token_text() == "." {
            self.next_token()?;
            let sel = self.parse_ident()?;
            return Ok(self.node(Node::Selector { x, sel }, line));
        }
        Ok(x)
    }

    fn can_start_type(&self) -> bool {
        self.is_ident()
            || matches!(
                self.token_text(),
                "*" | "[" | "(" | "map" | "chan" | "func" | "struct" | "interface" | "<-"
            )
    }

    pub fn parse_type(&mut self) -> Result<NodeId> {
        let line = self.tok.1.line;
        match self.token_text() {
            "*" => {
                self.next_token()?;
                let x = self.parse_type()?;
                Ok(self.node(Node::Star { x }, line))
            }
            "[" => {
                self.next_token()?;
                let len = match self.token_text() {
                    "]" => None,
                    "..." => {
                        self.next_token()?;
                        Some(self.node(Node::Ellipsis { elt: None }, line))
                    }
                    _ => {
                        self.expr_lev += 1;
                        let len = self.parse_expr();
                        self.expr_lev -= 1;
                        Some(len?)
                    }
                };
                self.expect("]", "after array length")?;
                let elt = self.parse_type()?;
                Ok(self.node(Node::ArrayType { len, elt }, line))
            }
            "map" => {
                self.next_token()?;
                self.expect("[", "after map")?;
                let key = self.parse_type()?;
                self.expect("]", "after map key type")?;
                let value = self.parse_type()?;
                Ok(self.node(Node::MapType { key, value }, line))
            }
            "chan" => {
                self.next_token()?;
                let dir = if self.token_text() == "<-" {
                    self.next_token()?;
                    ChanDir::Send
                } else {
                    ChanDir::Both
                };
                let value = self.parse_type()?;
                Ok(self.node(Node::ChanType { dir, value }, line))
            }
            "<-" => {
                self.next_token()?;
                self.expect("chan", "after <-")?;
                let value = self.parse_type()?;
                Ok(self.node(
                    Node::ChanType {
                        dir: ChanDir::Recv,
                        value,
                    },
                    line,
                ))
            }
            "func" => {
                self.next_token()?;
                self.parse_signature(line)
            }
            "struct" => self.parse_struct_type(),
            "interface" => self.parse_interface_type(),
            "(" => {
                self.next_token()?;
                let x = self.parse_type()?;
                self.expect(")", "after parenthesized type")?;
                Ok(self.node(Node::Paren { x }, line))
            }
            _ if self.is_ident() => self.parse_qualified_ident(),
            _ => Err(self.error("expecting type")),
        }
    }

    fn parse_struct_type(&mut self) -> Result<NodeId> {
        let line = self.tok.1.line;
        self.expect("struct", "")?;
        self.expect("{", "after struct")?;
        let mut fields = vec![];
        while self.token_text() != "}" && !self.at_eof() {
            let (floating, doc) = self.take_leading(self.tok.1.line, true);
            fields.extend(floating);
            fields.push(self.parse_field_decl(doc)?);
            if self.token_text() != "}" {
                self.expect(";", "after struct field")?;
            }
        }
        fields.extend(self.flush_comments());
        self.expect("}", "to close struct")?;
        Ok(self.node(Node::StructType { fields }, line))
    }

    fn parse_field_decl(&mut self, doc: Option<NodeId>) -> Result<NodeId> {
        let line = self.tok.1.line;
        let (names, ty) = if self.token_text() == "*" {
            (vec![], self.parse_type()?)
        } else if self.is_ident() {
            let first = self.parse_ident()?;
            match self.token_text() {
                "." => {
                    self.next_token()?;
                    let sel = self.parse_ident()?;
                    (vec![], self.node(Node::Selector { x: first, sel }, line))
                }
                ";" | "}" => (vec![], first),
                _ if matches!(self.tok.0, TokenKind::String | TokenKind::RawString) => {
                    (vec![], first)
                }
                "," => {
                    self.next_token()?;
                    let mut names = vec![first];
                    names.extend(self.parse_ident_list()?);
                    (names, self.parse_type()?)
                }
                _ => (vec![first], self.parse_type()?),
            }
        } else {
            return Err(self.error("expecting field name or embedded type"));
        };

        let tag = match self.tok.0 {
            TokenKind::String | TokenKind::RawString => {
                let tag = self.tok.1.text().to_string();
                self.next_token()?;
                Some(tag)
            }
            _ => None,
        };
        Ok(self.node(
            Node::Field {
                doc,
                names,
                ty,
                tag,
            },
            line,
        ))
    }

    fn parse_interface_type(&mut self) -> Result<NodeId> {
        let line = self.tok.1.line;
        self.expect("interface", "")?;
        self.expect("{", "after interface")?;
        let mut methods = vec![];
        while self.token_text() != "}" && !self.at_eof() {
            let (floating, doc) = self.take_leading(self.tok.1.line, true);
            methods.extend(floating);
            let mline = self.tok.1.line;
            let (names, ty) = if self.is_ident() {
                let name = self.parse_ident()?;
                match self.token_text() {
                    "(" => (vec![name], self.parse_signature(mline)?),
                    "." => {
                        self.next_token()?;
                        let sel = self.parse_ident()?;
                        (vec![], self.node(Node::Selector { x: name, sel }, mline))
                    }
                    _ => (vec![], name),
                }
            } else {
                (vec![], self.parse_type()?)
            };
            methods.push(self.node(
                Node::Field {
                    doc,
                    names,
                    ty,
                    tag: None,
                },
                mline,
            ));
            if self.token_text() != "}" {
                self.expect(";", "after interface method")?;
            }
        }
        methods.extend(self.flush_comments());
        self.expect("}", "to close interface")?;
        Ok(self.node(Node::InterfaceType { methods }, line))
    }

    fn parse_signature(&mut self, line: u32) -> Result<NodeId> {
        let params = self.parse_parameters()?;
        let (results, results_paren) = if self.token_text() == "(" {
            (self.parse_parameters()?, true)
        } else if self.can_start_type() {
            let rline = self.tok.1.line;
            let ty = self.parse_type()?;
            let field = self.node(
                Node::Field {
                    doc: None,
                    names: vec![],
                    ty,
                    tag: None,
                },
                rline,
            );
            (vec![field], false)
        } else {
            (vec![], false)
        };
        Ok(self.node(
            Node::FuncType {
                params,
                results,
                results_paren,
            },
            line,
        ))
    }

    fn parse_param_type(&mut self) -> Result<NodeId> {
        if self.token_text() == "..." {
            let line = self.tok.1.line;
            self.next_token()?;
            let elt = self.parse_type()?;
            return Ok(self.node(Node::Ellipsis { elt: Some(elt) }, line));
        }
        self.parse_type()
    }

    // Either every entry is a bare type, or names are grouped with the type
    // that follows them: `(a, b int, c string)`.
    fn parse_parameters(&mut self) -> Result<Vec<NodeId>> {
        self.expect("(", "to open parameter list")?;
        let mut items = vec![];
        while self.token_text() != ")" && !self.at_eof() {
            let line = self.tok.1.line;
            if self.is_ident() {
                let name = self.parse_ident()?;
                match self.token_text() {
                    "." => {
                        self.next_token()?;
                        let sel = self.parse_ident()?;
                        let x = self.node(Node::Selector { x: name, sel }, line);
                        items.push(Param::Bare(x, line));
                    }
                    "," | ")" => items.push(Param::Bare(name, line)),
                    _ => {
                        let ty = self.parse_param_type()?;
                        items.push(Param::Named(name, ty, line));
                    }
                }
            } else {
                let ty = self.parse_param_type()?;
                items.push(Param::Bare(ty, line));
            }
            if self.token_text() != ")" {
                self.expect(",", "in parameter list")?;
            }
        }
        self.expect(")", "to close parameter list")?;

        let named = items.iter().any(|p| matches!(p, Param::Named(..)));
        let mut fields = vec![];
        let mut names = vec![];
        let mut start = None;
        for item in items {
            let (line, ty) = match item {
                Param::Bare(ty, line) if !named => (line, ty),
                Param::Bare(name, line) => {
                    if self.ast.ident_name(name).is_none() {
                        bail!(self.error("mixed named and unnamed parameters"));
                    }
                    names.push(name);
                    start.get_or_insert(line);
                    continue;
                }
                Param::Named(name, ty, line) => {
                    names.push(name);
                    (start.take().unwrap_or(line), ty)
                }
            };
            let end_line = self.ast.end_line(ty);
            fields.push(self.ast.alloc(
                Node::Field {
                    doc: None,
                    names: core::mem::take(&mut names),
                    ty,
                    tag: None,
                },
                line,
                end_line,
            ));
        }
        if !names.is_empty() {
            bail!(self.error("mixed named and unnamed parameters"));
        }
        Ok(fields)
    }

    pub fn parse_expr(&mut self) -> Result<NodeId> {
        self.parse_binary_expr(1)
    }

    fn parse_expr_list(&mut self) -> Result<Vec<NodeId>> {
        let mut list = vec![self.parse_expr()?];
        while self.token_text() == "," {
            self.next_token()?;
            list.push(self.parse_expr()?);
        }
        Ok(list)
    }

    fn parse_binary_expr(&mut self, min_prec: i32) -> Result<NodeId> {
        let line = self.tok.1.line;
        let mut x = self.parse_unary_expr()?;
        loop {
            let prec = match self.tok.0 {
                TokenKind::Symbol => precedence(self.token_text()),
                _ => 0,
            };
            if prec < min_prec {
                return Ok(x);
            }
            let op = self.token_text().to_string();
            self.next_token()?;
            let y = self.parse_binary_expr(prec + 1)?;
            x = self.node(Node::Binary { op, x, y }, line);
        }
    }

    fn parse_unary_expr(&mut self) -> Result<NodeId> {
        let line = self.tok.1.line;
        if self.tok.0 != TokenKind::Symbol {
            return self.parse_primary_expr();
        }
        match self.token_text() {
            "+" | "-" | "!" | "^" | "&" => {
                let op = self.token_text().to_string();
                self.next_token()?;
                let x = self.parse_unary_expr()?;
                Ok(self.node(Node::Unary { op, x }, line))
            }
            "<-" => {
                self.next_token()?;
                if self.token_text() == "chan" {
                    self.next_token()?;
                    let value = self.parse_type()?;
                    return Ok(self.node(
                        Node::ChanType {
                            dir: ChanDir::Recv,
                            value,
                        },
                        line,
                    ));
                }
                let x = self.parse_unary_expr()?;
                Ok(self.node(
                    Node::Unary {
                        op: "<-".to_string(),
                        x,
                    },
                    line,
                ))
            }
            "*" => {
                self.next_token()?;
                let x = self.parse_unary_expr()?;
                Ok(self.node(Node::Star { x }, line))
            }
            _ => self.parse_primary_expr(),
        }
    }

    fn is_type_name(&self, x: NodeId) -> bool {
        match self.ast.get(x) {
            Node::Ident { .. } => true,
            Node::Selector { x, .. } => matches!(self.ast.get(*x), Node::Ident { .. }),
            _ => false,
        }
    }

    fn is_literal_type(&self, x: NodeId) -> bool {
        self.is_type_name(x)
            || matches!(
                self.ast.get(x),
                Node::ArrayType { .. } | Node::MapType { .. } | Node::StructType { .. }
            )
    }

    fn parse_operand(&mut self) -> Result<NodeId> {
        let line = self.tok.1.line;
        let kind = match self.tok.0 {
            TokenKind::Number => Some(lit_kind(self.tok.1.text())),
            TokenKind::Char => Some(LitKind::Char),
            TokenKind::String | TokenKind::RawString => Some(LitKind::String),
            _ => None,
        };
        if let Some(kind) = kind {
            let value = self.tok.1.text().to_string();
            self.next_token()?;
            return Ok(self.node(Node::BasicLit { kind, value }, line));
        }
        if self.is_ident() {
            return self.parse_ident();
        }

        match self.token_text() {
            "(" => {
                self.next_token()?;
                self.expr_lev += 1;
                let x = self.parse_expr();
                self.expr_lev -= 1;
                let x = x?;
                self.expect(")", "to close parenthesized expression")?;
                Ok(self.node(Node::Paren { x }, line))
            }
            "func" => {
                self.next_token()?;
                let ty = self.parse_signature(line)?;
                if self.token_text() != "{" {
                    return Ok(ty);
                }
                self.expr_lev += 1;
                let body = self.parse_block();
                self.expr_lev -= 1;
                let body = body?;
                Ok(self.node(Node::FuncLit { ty, body }, line))
            }
            "[" | "map" | "chan" | "struct" | "interface" => self.parse_type(),
            _ => Err(self.error("expecting expression")),
        }
    }

    fn parse_primary_expr(&mut self) -> Result<NodeId> {
        let line = self.tok.1.line;
        let mut x = self.parse_operand()?;
        loop {
            if self.tok.0 != TokenKind::Symbol {
                return Ok(x);
            }
            match self.token_text() {
                "." => {
                    self.next_token()?;
                    if self.is_ident() {
                        let sel = self.parse_ident()?;
                        x = self.node(Node::Selector { x, sel }, line);
                    } else if self.token_text() == "(" {
                        self.next_token()?;
                        let ty = if self.token_text() == "type" {
                            self.next_token()?;
                            None
                        } else {
                            Some(self.parse_type()?)
                        };
                        self.expect(")", "to close type assertion")?;
                        x = self.node(Node::TypeAssert { x, ty }, line);
                    } else {
                        return Err(self.error("expecting selector or type assertion"));
                    }
                }
                "[" => {
                    self.next_token()?;
                    self.expr_lev += 1;
                    let index = self.parse_index_or_slice(x, line);
                    self.expr_lev -= 1;
                    x = index?;
                }
                "(" => {
                    self.next_token()?;
                    self.expr_lev += 1;
                    let call = self.parse_call(x, line);
                    self.expr_lev -= 1;
                    x = call?;
                }
                "{" if self.is_literal_type(x) && (self.expr_lev >= 0 || !self.is_type_name(x)) => {
                    x = self.parse_literal_value(Some(x), line)?;
                }
                _ => return Ok(x),
            }
        }
    }

    fn parse_index_or_slice(&mut self, x: NodeId, line: u32) -> Result<NodeId> {
        let mut idx = [None, None, None];
        let mut colons = 0;
        if self.token_text() != ":" {
            idx[0] = Some(self.parse_expr()?);
        }
        while self.token_text() == ":" && colons < 2 {
            colons += 1;
            self.next_token()?;
            if !matches!(self.token_text(), ":" | "]") {
                idx[colons] = Some(self.parse_expr()?);
            }
        }
        self.expect("]", "to close index expression")?;
        match (colons, idx[0]) {
            (0, Some(index)) => Ok(self.node(Node::Index { x, index }, line)),
            (0, None) => Err(self.error("expecting index")),
            _ => Ok(self.node(
                Node::Slice {
                    x,
                    low: idx[0],
                    high: idx[1],
                    max: idx[2],
                    slice3: colons == 2,
                },
                line,
            )),
        }
    }

    fn parse_call(&mut self, fun: NodeId, line: u32) -> Result<NodeId> {
        let mut args = vec![];
        let mut ellipsis = false;
        while self.token_text() != ")" && !self.at_eof() {
            args.push(self.parse_expr()?);
            if self.token_text() == "..." {
                self.next_token()?;
                ellipsis = true;
            }
            if self.token_text() != ")" {
                self.expect(",", "in argument list")?;
            }
        }
        self.expect(")", "to close argument list")?;
        Ok(self.node(
            Node::Call {
                fun,
                args,
                ellipsis,
            },
            line,
        ))
    }

    fn parse_element(&mut self) -> Result<NodeId> {
        let line = self.tok.1.line;
        let key = if self.token_text() == "{" {
            self.parse_literal_value(None, line)?
        } else {
            self.parse_expr()?
        };
        if self.token_text() != ":" {
            return Ok(key);
        }
        self.next_token()?;
        let value = if self.token_text() == "{" {
            let vline = self.tok.1.line;
            self.parse_literal_value(None, vline)?
        } else {
            self.parse_expr()?
        };
        Ok(self.node(Node::KeyValue { key, value }, line))
    }

    fn parse_literal_value(&mut self, ty: Option<NodeId>, line: u32) -> Result<NodeId> {
        let open_line = self.tok.1.line;
        self.expect("{", "to open composite literal")?;
        self.expr_lev += 1;
        let elts = self.parse_elements();
        self.expr_lev -= 1;
        let (elts, first_line, last_end, commented) = elts?;
        let close_line = self.tok.1.line;
        self.expect("}", "to close composite literal")?;

        let multiline = commented
            || first_line.is_some_and(|l| l > open_line)
            || last_end.is_some_and(|l| close_line > l);
        Ok(self.node(
            Node::CompositeLit {
                ty,
                elts,
                multiline,
            },
            line,
        ))
    }

    #[allow(clippy::type_complexity)]
    fn parse_elements(&mut self) -> Result<(Vec<NodeId>, Option<u32>, Option<u32>, bool)> {
        let mut elts = vec![];
        let mut first_line = None;
        let mut last_end = None;
        let mut commented = false;
        while self.token_text() != "}" && !self.at_eof() {
            let (floating, _) = self.take_leading(self.tok.1.line, false);
            commented |= !floating.is_empty();
            elts.extend(floating);
            first_line.get_or_insert(self.tok.1.line);
            elts.push(self.parse_element()?);
            last_end = Some(self.end_line);
            if self.token_text() != "}" {
                self.expect(",", "in composite literal")?;
            }
        }
        let rest = self.flush_comments();
        commented |= !rest.is_empty();
        elts.extend(rest);
        Ok((elts, first_line, last_end, commented))
    }

    pub fn parse_block(&mut self) -> Result<NodeId> {
        let line = self.tok.1.line;
        self.expect("{", "to open block")?;
        let list = self.parse_stmt_list()?;
        self.expect("}", "to close block")?;
        Ok(self.node(Node::Block { list }, line))
    }

    fn at_list_end(&self) -> bool {
        self.at_eof() || matches!(self.token_text(), "}" | "case" | "default")
    }

    fn parse_stmt_list(&mut self) -> Result<Vec<NodeId>> {
        let mut list = vec![];
        while !self.at_list_end() {
            let (floating, _) = self.take_leading(self.tok.1.line, false);
            list.extend(floating);
            if self.token_text() == ";" {
                self.next_token()?;
                continue;
            }
            list.push(self.parse_stmt()?);
            if !self.at_list_end() {
                self.expect(";", "after statement")?;
            }
        }
        list.extend(self.flush_comments());
        Ok(list)
    }

    pub fn parse_stmt(&mut self) -> Result<NodeId> {
        let line = self.tok.1.line;
        match self.token_text() {
            "var" | "const" | "type" => {
                let decl = self.parse_gen_decl(None)?;
                Ok(self.node(Node::DeclStmt { decl }, line))
            }
            "go" | "defer" => {
                let go = self.token_text() == "go";
                self.next_token()?;
                let call = self.parse_expr()?;
                Ok(self.node(
                    if go {
                        Node::Go { call }
                    } else {
                        Node::Defer { call }
                    },
                    line,
                ))
            }
            "return" => {
                self.next_token()?;
                let results = if matches!(self.token_text(), ";" | "}") {
                    vec![]
                } else {
                    self.parse_expr_list()?
                };
                Ok(self.node(Node::Return { results }, line))
            }
            "break" | "continue" | "goto" | "fallthrough" => {
                let keyword = self.token_text().to_string();
                self.next_token()?;
                let label = if self.is_ident() {
                    Some(self.parse_ident()?)
                } else {
                    None
                };
                Ok(self.node(Node::Branch { keyword, label }, line))
            }
            "{" => self.parse_block(),
            "if" => self.parse_if(),
            "switch" => self.parse_switch(),
            "select" => self.parse_select(),
            "for" => self.parse_for(),
            _ => match self.parse_simple_stmt(true)? {
                Simple::Stmt(s) => Ok(s),
                Simple::Range { .. } => Err(self.error("unexpected range clause")),
            },
        }
    }

    fn parse_simple_stmt(&mut self, label_ok: bool) -> Result<Simple> {
        let line = self.tok.1.line;
        if self.token_text() == "range" {
            self.next_token()?;
            let x = self.parse_expr()?;
            return Ok(Simple::Range {
                key: None,
                value: None,
                define: false,
                x,
            });
        }

        let lhs = self.parse_expr_list()?;
        let text = self.token_text().to_string();
        if ASSIGN_OPS.contains(&text.as_str()) {
            self.next_token()?;
            if self.token_text() == "range" && (text == ":=" || text == "=") && lhs.len() <= 2 {
                self.next_token()?;
                let x = self.parse_expr()?;
                return Ok(Simple::Range {
                    key: lhs.first().copied(),
                    value: lhs.get(1).copied(),
                    define: text == ":=",
                    x,
                });
            }
            let rhs = self.parse_expr_list()?;
            return Ok(Simple::Stmt(self.node(
                Node::Assign { lhs, op: text, rhs },
                line,
            )));
        }

        if lhs.len() > 1 {
            return Err(self.error("expecting assignment"));
        }
        let x = lhs[0];
        let stmt = match text.as_str() {
            ":" if label_ok && self.ast.ident_name(x).is_some() => {
                self.next_token()?;
                let stmt = if matches!(self.token_text(), ";" | "}") {
                    self.node(Node::EmptyStmt, line)
                } else {
                    self.parse_stmt()?
                };
                Node::Labeled { label: x, stmt }
            }
            "<-" => {
                self.next_token()?;
                let value = self.parse_expr()?;
                Node::Send { chan: x, value }
            }
            "++" | "--" => {
                self.next_token()?;
                Node::IncDec {
                    x,
                    inc: text == "++",
                }
            }
            _ => Node::ExprStmt { x },
        };
        Ok(Simple::Stmt(self.node(stmt, line)))
    }

    fn parse_simple(&mut self) -> Result<NodeId> {
        match self.parse_simple_stmt(false)? {
            Simple::Stmt(s) => Ok(s),
            Simple::Range { .. } => Err(self.error("unexpected range clause")),
        }
    }

    fn expr_of(&self, stmt: NodeId) -> Result<NodeId> {
        match self.ast.get(stmt) {
            Node::ExprStmt { x } => Ok(*x),
            _ => Err(self.error("expecting expression, found statement")),
        }
    }

    fn parse_if(&mut self) -> Result<NodeId> {
        let line = self.tok.1.line;
        self.expect("if", "")?;
        let outer = self.expr_lev;
        self.expr_lev = -1;
        let header = self.parse_if_header();
        self.expr_lev = outer;
        let (init, cond) = header?;

        let body = self.parse_block()?;
        let els = if self.token_text() == "else" {
            self.next_token()?;
            match self.token_text() {
                "if" => Some(self.parse_if()?),
                "{" => Some(self.parse_block()?),
                _ => return Err(self.error("expecting if statement or block after else")),
            }
        } else {
            None
        };
        Ok(self.node(
            Node::If {
                init,
                cond,
                body,
                els,
            },
            line,
        ))
    }

    fn parse_if_header(&mut self) -> Result<(Option<NodeId>, NodeId)> {
        if self.token_text() == "{" {
            return Err(self.error("missing condition in if statement"));
        }
        let mut init = None;
        if self.token_text() != ";" {
            init = Some(self.parse_simple()?);
        }
        if self.token_text() == ";" {
            self.next_token()?;
            let cond = self.parse_expr()?;
            return Ok((init, cond));
        }
        match init {
            Some(s) => Ok((None, self.expr_of(s)?)),
            None => Err(self.error("missing condition in if statement")),
        }
    }

    fn is_type_switch_guard(&self, stmt: NodeId) -> bool {
        let x = match self.ast.get(stmt) {
            Node::ExprStmt { x } => *x,
            Node::Assign { op, rhs, .. } if op == ":=" && rhs.len() == 1 => rhs[0],
            _ => return false,
        };
        matches!(self.ast.get(x), Node::TypeAssert { ty: None, .. })
    }

    fn parse_switch(&mut self) -> Result<NodeId> {
        let line = self.tok.1.line;
        self.expect("switch", "")?;
        let outer = self.expr_lev;
        self.expr_lev = -1;
        let header = self.parse_switch_header();
        self.expr_lev = outer;
        let (init, tag) = header?;

        let type_switch = tag.is_some_and(|s| self.is_type_switch_guard(s));
        let body = self.parse_clauses(false)?;
        match (type_switch, tag) {
            (true, Some(assign)) => Ok(self.node(Node::TypeSwitch { init, assign, body }, line)),
            (_, tag) => {
                let tag = match tag {
                    Some(s) => Some(self.expr_of(s)?),
                    None => None,
                };
                Ok(self.node(Node::Switch { init, tag, body }, line))
            }
        }
    }

    fn parse_switch_header(&mut self) -> Result<(Option<NodeId>, Option<NodeId>)> {
        let mut init = None;
        let mut tag = None;
        if self.token_text() != "{" {
            if self.token_text() != ";" {
                tag = Some(self.parse_simple()?);
            }
            if self.token_text() == ";" {
                self.next_token()?;
                init = tag.take();
                if self.token_text() != "{" {
                    tag = Some(self.parse_simple()?);
                }
            }
        }
        Ok((init, tag))
    }

    fn parse_select(&mut self) -> Result<NodeId> {
        let line = self.tok.1.line;
        self.expect("select", "")?;
        let body = self.parse_clauses(true)?;
        Ok(self.node(Node::Select { body }, line))
    }

    // The `{ case ...: ... }` body of switch and select statements.
    fn parse_clauses(&mut self, comm: bool) -> Result<NodeId> {
        let line = self.tok.1.line;
        self.expect("{", "to open switch body")?;
        let mut list = vec![];
        while self.token_text() != "}" && !self.at_eof() {
            let (floating, _) = self.take_leading(self.tok.1.line, false);
            list.extend(floating);
            let cline = self.tok.1.line;
            let keyword = self.token_text().to_string();
            let clause = match (keyword.as_str(), comm) {
                ("case", false) => {
                    self.next_token()?;
                    Node::CaseClause {
                        list: Some(self.parse_expr_list()?),
                        body: vec![],
                    }
                }
                ("case", true) => {
                    self.next_token()?;
                    Node::CommClause {
                        comm: Some(self.parse_simple()?),
                        body: vec![],
                    }
                }
                ("default", false) => {
                    self.next_token()?;
                    Node::CaseClause {
                        list: None,
                        body: vec![],
                    }
                }
                ("default", true) => {
                    self.next_token()?;
                    Node::CommClause {
                        comm: None,
                        body: vec![],
                    }
                }
                _ => return Err(self.error("expecting case or default")),
            };
            self.expect(":", "after case")?;
            let stmts = self.parse_stmt_list()?;
            let clause = match clause {
                Node::CaseClause { list, .. } => Node::CaseClause { list, body: stmts },
                Node::CommClause { comm, .. } => Node::CommClause { comm, body: stmts },
                other => other,
            };
            list.push(self.node(clause, cline));
        }
        list.extend(self.flush_comments());
        self.expect("}", "to close switch body")?;
        Ok(self.node(Node::Block { list }, line))
    }

    fn parse_for(&mut self) -> Result<NodeId> {
        let line = self.tok.1.line;
        self.expect("for", "")?;
        let outer = self.expr_lev;
        self.expr_lev = -1;
        let header = self.parse_for_header();
        self.expr_lev = outer;
        let header = header?;

        let body = self.parse_block()?;
        let node = match header {
            (_, _, _, Some(Simple::Range { key, value, define, x })) => Node::Range {
                key,
                value,
                define,
                x,
                body,
            },
            (init, cond, post, _) => Node::For {
                init,
                cond,
                post,
                body,
            },
        };
        Ok(self.node(node, line))
    }

    #[allow(clippy::type_complexity)]
    fn parse_for_header(
        &mut self,
    ) -> Result<(Option<NodeId>, Option<NodeId>, Option<NodeId>, Option<Simple>)> {
        if self.token_text() == "{" {
            return Ok((None, None, None, None));
        }
        let mut first = None;
        if self.token_text() != ";" {
            match self.parse_simple_stmt(false)? {
                range @ Simple::Range { .. } => return Ok((None, None, None, Some(range))),
                Simple::Stmt(s) => first = Some(s),
            }
        }
        if self.token_text() != ";" {
            let cond = match first {
                Some(s) => Some(self.expr_of(s)?),
                None => None,
            };
            return Ok((None, cond, None, None));
        }

        self.next_token()?;
        let mut cond = None;
        if self.token_text() != ";" {
            let s = self.parse_simple()?;
            cond = Some(self.expr_of(s)?);
        }
        self.expect(";", "in for clause")?;
        let post = if self.token_text() != "{" {
            Some(self.parse_simple()?)
        } else {
            None
        };
        Ok((first, cond, post, None))
    }

    fn parse_spec(&mut self, keyword: DeclKeyword, doc: Option<NodeId>) -> Result<NodeId> {
        let line = self.tok.1.line;
        let spec = match keyword {
            DeclKeyword::Import => {
                let name = match self.token_text() {
                    "." => {
                        self.next_token()?;
                        Some(self.node(
                            Node::Ident {
                                name: ".".to_string(),
                            },
                            line,
                        ))
                    }
                    _ if self.is_ident() => Some(self.parse_ident()?),
                    _ => None,
                };
                if !matches!(self.tok.0, TokenKind::String | TokenKind::RawString) {
                    return Err(self.error("expecting import path"));
                }
                let path = self.tok.1.text().to_string();
                self.next_token()?;
                Node::ImportSpec { doc, name, path }
            }
            DeclKeyword::Type => {
                let name = self.parse_ident()?;
                let alias = self.token_text() == "=";
                if alias {
                    self.next_token()?;
                }
                let ty = self.parse_type()?;
                Node::TypeSpec {
                    doc,
                    name,
                    alias,
                    ty,
                }
            }
            DeclKeyword::Const | DeclKeyword::Var => {
                let names = self.parse_ident_list()?;
                let ty = if matches!(self.token_text(), "=" | ";" | ")") {
                    None
                } else {
                    Some(self.parse_type()?)
                };
                let values = if self.token_text() == "=" {
                    self.next_token()?;
                    self.parse_expr_list()?
                } else {
                    vec![]
                };
                Node::ValueSpec {
                    doc,
                    names,
                    ty,
                    values,
                }
            }
        };
        Ok(self.node(spec, line))
    }

    fn parse_gen_decl(&mut self, doc: Option<NodeId>) -> Result<NodeId> {
        let line = self.tok.1.line;
        let keyword = match self.token_text() {
            "import" => DeclKeyword::Import,
            "const" => DeclKeyword::Const,
            "type" => DeclKeyword::Type,
            "var" => DeclKeyword::Var,
            _ => return Err(self.error("expecting declaration")),
        };
        self.next_token()?;

        let mut specs = vec![];
        let grouped = self.token_text() == "(";
        if grouped {
            self.next_token()?;
            while self.token_text() != ")" && !self.at_eof() {
                let (floating, doc) = self.take_leading(self.tok.1.line, true);
                specs.extend(floating);
                specs.push(self.parse_spec(keyword, doc)?);
                if self.token_text() != ")" {
                    self.expect(";", "after declaration")?;
                }
            }
            specs.extend(self.flush_comments());
            self.expect(")", "to close declaration group")?;
        } else {
            specs.push(self.parse_spec(keyword, None)?);
        }
        Ok(self.node(
            Node::GenDecl {
                doc,
                keyword,
                specs,
                grouped,
            },
            line,
        ))
    }

    fn parse_func_decl(&mut self, doc: Option<NodeId>) -> Result<NodeId> {
        let line = self.tok.1.line;
        self.expect("func", "")?;
        let recv = if self.token_text() == "(" {
            let params = self.parse_parameters()?;
            if params.len() != 1 {
                return Err(self.error("method has multiple receivers"));
            }
            Some(params[0])
        } else {
            None
        };
        let name = self.parse_ident()?;
        let ty = self.parse_signature(line)?;
        let body = if self.token_text() == "{" {
            Some(self.parse_block()?)
        } else {
            None
        };
        Ok(self.node(
            Node::FuncDecl {
                doc,
                recv,
                name,
                ty,
                body,
            },
            line,
        ))
    }

    pub fn parse_decl(&mut self, doc: Option<NodeId>) -> Result<NodeId> {
        match self.token_text() {
            "func" => self.parse_func_decl(doc),
            _ => self.parse_gen_decl(doc),
        }
    }

    pub fn parse_file(&mut self) -> Result<NodeId> {
        let line = self.tok.1.line;
        let (header, doc) = self.take_leading(line, true);
        self.expect("package", "at start of file")?;
        let name = self.parse_ident()?;
        if !self.at_eof() {
            self.expect(";", "after package clause")?;
        }

        let mut decls = vec![];
        while !self.at_eof() {
            let (floating, doc) = self.take_leading(self.tok.1.line, true);
            decls.extend(floating);
            if self.token_text() == ";" {
                self.next_token()?;
                continue;
            }
            decls.push(self.parse_decl(doc)?);
            if !self.at_eof() {
                self.expect(";", "after top level declaration")?;
            }
        }
        decls.extend(self.flush_comments());
        Ok(self.node(
            Node::File {
                header,
                doc,
                name,
                decls,
            },
            line,
        ))
    }
}

/// Parses `source` into `ast`, returning the file root.
pub fn parse_file(ast: &mut Ast, source: &Source) -> Result<NodeId> {
    Parser::new(source, ast)?.parse_file()
}
