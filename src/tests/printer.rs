// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::ast::*;
use crate::lexer::Source;
use crate::parser::parse_file;
use crate::printer::print_file;

use anyhow::Result;

fn parse(ast: &mut Ast, src: &str) -> Result<NodeId> {
    let source = Source::from_contents("test.go".to_string(), src.to_string())?;
    parse_file(ast, &source)
}

fn var_decl(ast: &mut Ast, name: &str, ty: &str) -> NodeId {
    let name = ast.ident(name);
    let ty = ast.ident(ty);
    let spec = ast.synth(Node::ValueSpec {
        doc: None,
        names: vec![name],
        ty: Some(ty),
        values: vec![],
    });
    ast.synth(Node::GenDecl {
        doc: None,
        keyword: DeclKeyword::Var,
        specs: vec![spec],
        grouped: false,
    })
}

fn decls_mut(ast: &mut Ast, file: NodeId) -> &mut Vec<NodeId> {
    match ast.get_mut(file) {
        Node::File { decls, .. } => decls,
        _ => panic!("not a file"),
    }
}

#[test]
fn synthesized_declarations_are_set_apart() -> Result<()> {
    let mut ast = Ast::new();
    let file = parse(&mut ast, "package p\n\nvar a = 1\nvar b = 2\n")?;

    let c = var_decl(&mut ast, "c", "int");
    decls_mut(&mut ast, file).push(c);
    assert_eq!(
        print_file(&ast, file),
        "package p\n\nvar a = 1\nvar b = 2\n\nvar c int\n"
    );

    let d = var_decl(&mut ast, "d", "string");
    decls_mut(&mut ast, file).insert(0, d);
    assert_eq!(
        print_file(&ast, file),
        "package p\n\nvar d string\n\nvar a = 1\nvar b = 2\n\nvar c int\n"
    );
    Ok(())
}

#[test]
fn shifted_files_print_the_same() -> Result<()> {
    let src = "// Header.\n\npackage p\n\n// T is a type.\ntype T struct {\n\tA int // a\n\n\tB string\n}\n\n// floating\n\nfunc f() {}\n";
    let mut ast = Ast::new();
    let file = parse(&mut ast, src)?;
    ast.shift_lines(file, 40);
    assert_eq!(print_file(&ast, file), src);
    Ok(())
}

#[test]
fn deleted_comments_leave_no_gap() -> Result<()> {
    let mut ast = Ast::new();
    let file = parse(&mut ast, "package p\n\nvar a = 1 // one\n\n// two\nvar b = 2\n")?;
    let decls = decls_mut(&mut ast, file);
    assert_eq!(decls.len(), 3);
    // Drop the trailing group of `a`.
    decls.remove(1);
    assert_eq!(print_file(&ast, file), "package p\n\nvar a = 1\n\n// two\nvar b = 2\n");
    Ok(())
}

#[test]
fn qualified_identifiers_print_verbatim() -> Result<()> {
    let mut ast = Ast::new();
    let file = parse(&mut ast, "package p\n\nvar v VT\n")?;
    let vt = ast
        .descendants(file)
        .into_iter()
        .find(|id| ast.ident_name(*id) == Some("VT"))
        .ok_or_else(|| anyhow::anyhow!("no VT"))?;
    ast.set(
        vt,
        Node::Ident {
            name: "money.Amount".to_string(),
        },
    );
    assert_eq!(print_file(&ast, file), "package p\n\nvar v money.Amount\n");
    Ok(())
}
