// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::{anyhow, bail, Result};
use genx::unstable::*;
use serde::{Deserialize, Serialize};
use test_generator::test_resources;

macro_rules! my_assert_eq {
    ($left:expr, $right:expr, $($arg:tt)+) => {
	match (&($left), &($right)) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
		    return Err(anyhow!("mismatch:\nleft  = {}\nright = {}\n{}",
		     		       &$left, &$right, format_args!($($arg)+)));
                }
            }
	}
    }
}

#[derive(Serialize, Deserialize, PartialEq, Debug)]
struct Case {
    pub note: String,
    pub go: String,
    /// Printed form when it differs from the input.
    pub want: Option<String>,
    pub error: Option<String>,
}

#[derive(Serialize, Deserialize, PartialEq, Debug)]
struct Test {
    cases: Vec<Case>,
}

fn print(name: &str, go: &str) -> Result<String> {
    let source = Source::from_contents(name.to_string(), go.to_string())?;
    let mut ast = Ast::new();
    let file = parse_file(&mut ast, &source)?;
    Ok(print_file(&ast, file))
}

fn yaml_test_impl(file: &str) -> Result<()> {
    println!("\nrunning {}", file);

    let yaml = std::fs::read_to_string(file)?;
    let test: Test = serde_yaml::from_str(&yaml)?;

    for case in &test.cases {
        print!("case {} ", &case.note);
        match (print("case.go", &case.go), &case.error) {
            (Ok(printed), None) => {
                let want = case.want.as_ref().unwrap_or(&case.go);
                my_assert_eq!(printed, *want, "case `{}` printed differently", case.note);
                let again = print("printed.go", &printed)?;
                my_assert_eq!(again, printed, "case `{}` is not stable", case.note);
            }
            (Ok(printed), Some(expected)) => {
                bail!("expected error `{expected}`, parsed\n{printed}");
            }
            (Err(actual), Some(expected)) => {
                let actual = actual.to_string();
                if !actual.contains(expected.as_str()) {
                    bail!(
                        "Error message\n`{}\n`\ndoes not contain `{}`",
                        actual,
                        expected
                    );
                }
            }
            (Err(actual), None) => return Err(actual),
        }
        println!("passed");
    }

    println!("{} cases passed.", test.cases.len());
    Ok(())
}

fn yaml_test(file: &str) -> Result<()> {
    match yaml_test_impl(file) {
        Ok(_) => Ok(()),
        Err(e) => {
            // If Err is returned, it doesn't always get printed by cargo test.
            // Therefore, panic with the error.
            panic!("{}", e);
        }
    }
}

#[test_resources("tests/parser/cases/*.yaml")]
fn run(path: &str) {
    yaml_test(path).unwrap()
}

fn parse(go: &str) -> Result<(Ast, NodeId)> {
    let source = Source::from_contents("case.go".to_string(), go.to_string())?;
    let mut ast = Ast::new();
    let file = parse_file(&mut ast, &source)?;
    Ok((ast, file))
}

fn decls(ast: &Ast, file: NodeId) -> Result<Vec<NodeId>> {
    match ast.get(file) {
        Node::File { decls, .. } => Ok(decls.clone()),
        _ => bail!("not a file"),
    }
}

#[test]
fn docs_attach_to_declarations() -> Result<()> {
    let (ast, file) = parse("package p\n\n// floating\n\n// Doc.\ntype T int // trailing\n")?;
    let decls = decls(&ast, file)?;
    assert_eq!(decls.len(), 3);
    assert!(ast.is_comment_group(decls[0]));
    assert!(!ast.is_trailing_group(decls[0]));
    let doc = ast.doc(decls[1]).ok_or_else(|| anyhow!("missing doc"))?;
    assert_eq!(ast.start_line(decls[1]), ast.line(doc));
    assert!(ast.is_trailing_group(decls[2]));
    Ok(())
}

#[test]
fn composite_literal_needs_parens_in_control_clauses() -> Result<()> {
    let (ast, file) = parse("package p\n\nfunc f() {\n\tif x == (T{}) {\n\t}\n\tfor v := range s {\n\t}\n}\n")?;
    let decls = decls(&ast, file)?;
    let literals = ast
        .descendants(decls[0])
        .into_iter()
        .filter(|id| matches!(ast.get(*id), Node::CompositeLit { .. }))
        .count();
    assert_eq!(literals, 1);
    Ok(())
}

#[test]
fn type_switch_guard() -> Result<()> {
    let (ast, file) = parse("package p\n\nfunc f(x any) {\n\tswitch y := x.(type) {\n\t}\n}\n")?;
    let decls = decls(&ast, file)?;
    assert!(ast
        .descendants(decls[0])
        .into_iter()
        .any(|id| matches!(ast.get(id), Node::TypeSwitch { .. })));
    Ok(())
}

#[test]
fn node_printing() -> Result<()> {
    let (ast, file) = parse("package p\n\nvar x map[string]*[]chan<- func(int) error\n")?;
    let decls = decls(&ast, file)?;
    let ty = ast
        .descendants(decls[0])
        .into_iter()
        .find(|id| matches!(ast.get(*id), Node::MapType { .. }))
        .ok_or_else(|| anyhow!("no map type"))?;
    assert_eq!(print_node(&ast, ty), "map[string]*[]chan<- func(int) error");
    // Result types only need a coarse rendering.
    assert_eq!(ast.type_string(ty), "map[string]*[]chan func()");
    Ok(())
}
