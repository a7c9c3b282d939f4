// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::fmt;

/// Stable index of a node in an [`Ast`] arena.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum LitKind {
    Int,
    Float,
    Imag,
    Char,
    String,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DeclKeyword {
    Import,
    Const,
    Type,
    Var,
}

impl DeclKeyword {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Import => "import",
            Self::Const => "const",
            Self::Type => "type",
            Self::Var => "var",
        }
    }
}

/// Every syntactic construct of a Go source file.
///
/// Children are referenced by [`NodeId`]. Lists that carry source layout
/// (declarations, specs, fields, statements, literal elements) may also hold
/// [`Node::CommentGroup`] items for comments that float between entries or
/// trail the preceding entry on its line.
#[derive(Debug, Clone)]
pub enum Node {
    Comment {
        text: String,
    },
    CommentGroup {
        list: Vec<NodeId>,
        trailing: bool,
    },

    // Expressions.
    Ident {
        name: String,
    },
    BasicLit {
        kind: LitKind,
        value: String,
    },
    CompositeLit {
        ty: Option<NodeId>,
        elts: Vec<NodeId>,
        multiline: bool,
    },
    FuncLit {
        ty: NodeId,
        body: NodeId,
    },
    Paren {
        x: NodeId,
    },
    Selector {
        x: NodeId,
        sel: NodeId,
    },
    Index {
        x: NodeId,
        index: NodeId,
    },
    Slice {
        x: NodeId,
        low: Option<NodeId>,
        high: Option<NodeId>,
        max: Option<NodeId>,
        slice3: bool,
    },
    // `ty` is None for `x.(type)`.
    TypeAssert {
        x: NodeId,
        ty: Option<NodeId>,
    },
    Call {
        fun: NodeId,
        args: Vec<NodeId>,
        ellipsis: bool,
    },
    Star {
        x: NodeId,
    },
    Unary {
        op: String,
        x: NodeId,
    },
    Binary {
        op: String,
        x: NodeId,
        y: NodeId,
    },
    KeyValue {
        key: NodeId,
        value: NodeId,
    },

    // Types.
    // `len` is None for slices and an element-less Ellipsis for `[...]T`.
    ArrayType {
        len: Option<NodeId>,
        elt: NodeId,
    },
    StructType {
        fields: Vec<NodeId>,
    },
    FuncType {
        params: Vec<NodeId>,
        results: Vec<NodeId>,
        results_paren: bool,
    },
    InterfaceType {
        methods: Vec<NodeId>,
    },
    MapType {
        key: NodeId,
        value: NodeId,
    },
    ChanType {
        dir: ChanDir,
        value: NodeId,
    },
    Ellipsis {
        elt: Option<NodeId>,
    },
    Field {
        doc: Option<NodeId>,
        names: Vec<NodeId>,
        ty: NodeId,
        tag: Option<String>,
    },

    // Statements.
    DeclStmt {
        decl: NodeId,
    },
    EmptyStmt,
    Labeled {
        label: NodeId,
        stmt: NodeId,
    },
    ExprStmt {
        x: NodeId,
    },
    Send {
        chan: NodeId,
        value: NodeId,
    },
    IncDec {
        x: NodeId,
        inc: bool,
    },
    Assign {
        lhs: Vec<NodeId>,
        op: String,
        rhs: Vec<NodeId>,
    },
    Go {
        call: NodeId,
    },
    Defer {
        call: NodeId,
    },
    Return {
        results: Vec<NodeId>,
    },
    Branch {
        keyword: String,
        label: Option<NodeId>,
    },
    Block {
        list: Vec<NodeId>,
    },
    If {
        init: Option<NodeId>,
        cond: NodeId,
        body: NodeId,
        els: Option<NodeId>,
    },
    // `list` is None for `default:`.
    CaseClause {
        list: Option<Vec<NodeId>>,
        body: Vec<NodeId>,
    },
    Switch {
        init: Option<NodeId>,
        tag: Option<NodeId>,
        body: NodeId,
    },
    TypeSwitch {
        init: Option<NodeId>,
        assign: NodeId,
        body: NodeId,
    },
    // `comm` is None for `default:`.
    CommClause {
        comm: Option<NodeId>,
        body: Vec<NodeId>,
    },
    Select {
        body: NodeId,
    },
    For {
        init: Option<NodeId>,
        cond: Option<NodeId>,
        post: Option<NodeId>,
        body: NodeId,
    },
    Range {
        key: Option<NodeId>,
        value: Option<NodeId>,
        define: bool,
        x: NodeId,
        body: NodeId,
    },

    // Declarations.
    GenDecl {
        doc: Option<NodeId>,
        keyword: DeclKeyword,
        specs: Vec<NodeId>,
        grouped: bool,
    },
    ImportSpec {
        doc: Option<NodeId>,
        name: Option<NodeId>,
        path: String,
    },
    ValueSpec {
        doc: Option<NodeId>,
        names: Vec<NodeId>,
        ty: Option<NodeId>,
        values: Vec<NodeId>,
    },
    TypeSpec {
        doc: Option<NodeId>,
        name: NodeId,
        alias: bool,
        ty: NodeId,
    },
    FuncDecl {
        doc: Option<NodeId>,
        recv: Option<NodeId>,
        name: NodeId,
        ty: NodeId,
        body: Option<NodeId>,
    },
    File {
        header: Vec<NodeId>,
        doc: Option<NodeId>,
        name: NodeId,
        decls: Vec<NodeId>,
    },
}

impl Node {
    /// Calls `f` on every direct child slot, in source order.
    pub fn for_each_child_mut(&mut self, mut f: impl FnMut(&mut NodeId)) {
        macro_rules! visit {
            ($($e:expr),*) => {{ $( Visit::visit($e, &mut f); )* }};
        }
        match self {
            Self::Comment { .. } | Self::Ident { .. } | Self::BasicLit { .. } | Self::EmptyStmt => (),
            Self::CommentGroup { list, .. } => visit!(list),
            Self::CompositeLit { ty, elts, .. } => visit!(ty, elts),
            Self::FuncLit { ty, body } => visit!(ty, body),
            Self::Paren { x }
            | Self::Star { x }
            | Self::Unary { x, .. }
            | Self::ExprStmt { x }
            | Self::IncDec { x, .. } => visit!(x),
            Self::Selector { x, sel } => visit!(x, sel),
            Self::Index { x, index } => visit!(x, index),
            Self::Slice {
                x, low, high, max, ..
            } => visit!(x, low, high, max),
            Self::TypeAssert { x, ty } => visit!(x, ty),
            Self::Call { fun, args, .. } => visit!(fun, args),
            Self::Binary { x, y, .. } => visit!(x, y),
            Self::KeyValue { key, value } => visit!(key, value),
            Self::ArrayType { len, elt } => visit!(len, elt),
            Self::StructType { fields } => visit!(fields),
            Self::FuncType {
                params, results, ..
            } => visit!(params, results),
            Self::InterfaceType { methods } => visit!(methods),
            Self::MapType { key, value } => visit!(key, value),
            Self::ChanType { value, .. } => visit!(value),
            Self::Ellipsis { elt } => visit!(elt),
            Self::Field { doc, names, ty, .. } => visit!(doc, names, ty),
            Self::DeclStmt { decl } => visit!(decl),
            Self::Labeled { label, stmt } => visit!(label, stmt),
            Self::Send { chan, value } => visit!(chan, value),
            Self::Assign { lhs, rhs, .. } => visit!(lhs, rhs),
            Self::Go { call } | Self::Defer { call } => visit!(call),
            Self::Return { results } => visit!(results),
            Self::Branch { label, .. } => visit!(label),
            Self::Block { list } => visit!(list),
            Self::If {
                init,
                cond,
                body,
                els,
            } => visit!(init, cond, body, els),
            Self::CaseClause { list, body } => visit!(list, body),
            Self::Switch { init, tag, body } => visit!(init, tag, body),
            Self::TypeSwitch { init, assign, body } => visit!(init, assign, body),
            Self::CommClause { comm, body } => visit!(comm, body),
            Self::Select { body } => visit!(body),
            Self::For {
                init,
                cond,
                post,
                body,
            } => visit!(init, cond, post, body),
            Self::Range {
                key,
                value,
                x,
                body,
                ..
            } => visit!(key, value, x, body),
            Self::GenDecl { doc, specs, .. } => visit!(doc, specs),
            Self::ImportSpec { doc, name, .. } => visit!(doc, name),
            Self::ValueSpec {
                doc,
                names,
                ty,
                values,
            } => visit!(doc, names, ty, values),
            Self::TypeSpec { doc, name, ty, .. } => visit!(doc, name, ty),
            Self::FuncDecl {
                doc,
                recv,
                name,
                ty,
                body,
            } => visit!(doc, recv, name, ty, body),
            Self::File {
                header,
                doc,
                name,
                decls,
            } => visit!(header, doc, name, decls),
        }
    }

    /// Direct children in source order.
    pub fn children(&self) -> Vec<NodeId> {
        let mut out = vec![];
        self.clone().for_each_child_mut(|id| out.push(*id));
        out
    }

    pub fn replace_child(&mut self, old: NodeId, new: NodeId) {
        self.for_each_child_mut(|id| {
            if *id == old {
                *id = new;
            }
        });
    }

    pub fn doc_mut(&mut self) -> Option<&mut Option<NodeId>> {
        match self {
            Self::Field { doc, .. }
            | Self::GenDecl { doc, .. }
            | Self::ImportSpec { doc, .. }
            | Self::ValueSpec { doc, .. }
            | Self::TypeSpec { doc, .. }
            | Self::FuncDecl { doc, .. }
            | Self::File { doc, .. } => Some(doc),
            _ => None,
        }
    }
}

trait Visit {
    fn visit(&mut self, f: &mut impl FnMut(&mut NodeId));
}

impl Visit for NodeId {
    fn visit(&mut self, f: &mut impl FnMut(&mut NodeId)) {
        f(self)
    }
}

impl<T: Visit> Visit for Option<T> {
    fn visit(&mut self, f: &mut impl FnMut(&mut NodeId)) {
        if let Some(v) = self {
            v.visit(f)
        }
    }
}

impl<T: Visit> Visit for Vec<T> {
    fn visit(&mut self, f: &mut impl FnMut(&mut NodeId)) {
        for v in self {
            v.visit(f)
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    node: Node,
    line: u32,
    end_line: u32,
}

/// Arena holding the nodes of one or more parsed files.
///
/// Nodes are never freed; a deleted node simply becomes unreachable from its
/// file root. Synthesized nodes carry line 0.
#[derive(Debug, Clone, Default)]
pub struct Ast {
    slots: Vec<Slot>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, node: Node, line: u32, end_line: u32) -> NodeId {
        let id = NodeId(self.slots.len() as u32);
        self.slots.push(Slot {
            node,
            line,
            end_line,
        });
        id
    }

    pub fn synth(&mut self, node: Node) -> NodeId {
        self.alloc(node, 0, 0)
    }

    pub fn ident(&mut self, name: &str) -> NodeId {
        self.synth(Node::Ident {
            name: name.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.slots[id.index()].node
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.slots[id.index()].node
    }

    pub fn set(&mut self, id: NodeId, node: Node) {
        self.slots[id.index()].node = node;
    }

    pub fn set_lines(&mut self, id: NodeId, line: u32, end_line: u32) {
        let slot = &mut self.slots[id.index()];
        slot.line = line;
        slot.end_line = end_line;
    }

    pub fn line(&self, id: NodeId) -> u32 {
        self.slots[id.index()].line
    }

    pub fn end_line(&self, id: NodeId) -> u32 {
        self.slots[id.index()].end_line
    }

    /// First line of an item including its doc comment.
    pub fn start_line(&self, id: NodeId) -> u32 {
        match self.doc(id) {
            Some(doc) if self.line(doc) != 0 => self.line(doc),
            _ => self.line(id),
        }
    }

    pub fn doc(&self, id: NodeId) -> Option<NodeId> {
        match self.get(id) {
            Node::Field { doc, .. }
            | Node::GenDecl { doc, .. }
            | Node::ImportSpec { doc, .. }
            | Node::ValueSpec { doc, .. }
            | Node::TypeSpec { doc, .. }
            | Node::FuncDecl { doc, .. }
            | Node::File { doc, .. } => *doc,
            _ => None,
        }
    }

    pub fn ident_name(&self, id: NodeId) -> Option<&str> {
        match self.get(id) {
            Node::Ident { name } => Some(name.as_str()),
            _ => None,
        }
    }

    /// The identifier at the core of `T` or `*T`.
    pub fn base_ident(&self, id: NodeId) -> Option<NodeId> {
        match self.get(id) {
            Node::Ident { .. } => Some(id),
            Node::Star { x } | Node::Paren { x } => self.base_ident(*x),
            _ => None,
        }
    }

    pub fn is_trailing_group(&self, id: NodeId) -> bool {
        matches!(self.get(id), Node::CommentGroup { trailing: true, .. })
    }

    pub fn is_comment_group(&self, id: NodeId) -> bool {
        matches!(self.get(id), Node::CommentGroup { .. })
    }

    /// All nodes reachable from `root`, pre-order.
    pub fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = vec![];
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            let children = self.get(id).children();
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// Source-like rendering of a type expression, used for result type names.
    pub fn type_string(&self, id: NodeId) -> String {
        match self.get(id) {
            Node::Ident { name } => name.clone(),
            Node::Star { x } => format!("*{}", self.type_string(*x)),
            Node::Paren { x } => format!("({})", self.type_string(*x)),
            Node::Selector { x, sel } => {
                format!("{}.{}", self.type_string(*x), self.type_string(*sel))
            }
            Node::ArrayType { len: None, elt } => format!("[]{}", self.type_string(*elt)),
            Node::ArrayType { len: Some(_), elt } => format!("[N]{}", self.type_string(*elt)),
            Node::MapType { key, value } => {
                format!(
                    "map[{}]{}",
                    self.type_string(*key),
                    self.type_string(*value)
                )
            }
            Node::ChanType { value, .. } => format!("chan {}", self.type_string(*value)),
            Node::Ellipsis { elt: Some(elt) } => format!("...{}", self.type_string(*elt)),
            Node::InterfaceType { methods } if methods.is_empty() => "interface{}".to_string(),
            Node::InterfaceType { .. } => "interface".to_string(),
            Node::StructType { .. } => "struct".to_string(),
            Node::FuncType { .. } => "func()".to_string(),
            _ => String::new(),
        }
    }

    /// Moves every non-synthesized node under `root` down by `delta` lines.
    pub fn shift_lines(&mut self, root: NodeId, delta: u32) {
        for id in self.descendants(root) {
            let slot = &mut self.slots[id.index()];
            if slot.line != 0 {
                slot.line += delta;
                slot.end_line += delta;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_child_rewires_slots() {
        let mut ast = Ast::new();
        let x = ast.alloc(Node::Ident { name: "x".into() }, 1, 1);
        let y = ast.alloc(Node::Ident { name: "y".into() }, 1, 1);
        let call = ast.alloc(
            Node::Call {
                fun: x,
                args: vec![x, y],
                ellipsis: false,
            },
            1,
            1,
        );
        let z = ast.ident("z");
        ast.get_mut(call).replace_child(x, z);
        assert_eq!(ast.get(call).children(), vec![z, z, y]);
        assert_eq!(ast.descendants(call), vec![call, z, z, y]);
    }

    #[test]
    fn shifted_lines_skip_synthesized_nodes() {
        let mut ast = Ast::new();
        let elt = ast.ident("T");
        let star = ast.alloc(Node::Star { x: elt }, 3, 4);
        ast.shift_lines(star, 10);
        assert_eq!((ast.line(star), ast.end_line(star)), (13, 14));
        assert_eq!(ast.line(elt), 0);
    }

    #[test]
    fn type_strings() {
        let mut ast = Ast::new();
        let k = ast.ident("KT");
        let v = ast.ident("VT");
        let ptr = ast.synth(Node::Star { x: v });
        let map = ast.synth(Node::MapType { key: k, value: ptr });
        assert_eq!(ast.type_string(map), "map[KT]*VT");
        let empty = ast.synth(Node::InterfaceType { methods: vec![] });
        assert_eq!(ast.type_string(empty), "interface{}");
    }
}
