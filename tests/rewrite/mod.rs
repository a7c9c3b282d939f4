// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use genx::*;
use serde::{Deserialize, Serialize};
use test_generator::test_resources;

fn yes() -> bool {
    true
}

#[derive(Serialize, Deserialize, PartialEq, Debug)]
#[serde(deny_unknown_fields)]
struct Case {
    pub note: String,
    pub rules: BTreeMap<String, String>,
    /// Output package name.
    #[serde(default)]
    pub name: String,
    pub go: String,
    pub want: Option<String>,
    pub error: Option<String>,
    /// Whether running the same rules on the output changes nothing.
    #[serde(default = "yes")]
    pub idempotent: bool,
}

#[derive(Serialize, Deserialize, PartialEq, Debug)]
struct Test {
    cases: Vec<Case>,
}

fn generate(case: &Case, src: &str) -> Result<String, ProcessError> {
    let mut engine = Engine::new(&case.name, &case.rules);
    Ok(engine.process_source("case.go", src)?.src)
}

fn yaml_test_impl(file: &str) -> Result<()> {
    println!("\nrunning {}", file);

    let yaml = std::fs::read_to_string(file)?;
    let test: Test = serde_yaml::from_str(&yaml)?;

    for case in &test.cases {
        print!("case {} ", &case.note);
        match (generate(case, &case.go), &case.error, &case.want) {
            (Ok(out), None, Some(want)) => {
                assert_eq!(&out, want, "case `{}`", case.note);
                if case.idempotent {
                    let again = generate(case, &out)?;
                    assert_eq!(again, out, "case `{}` is not idempotent", case.note);
                }
            }
            (Err(actual), Some(expected), _) => {
                let actual = actual.to_string();
                if !actual.contains(expected.as_str()) {
                    bail!(
                        "Error message\n`{}\n`\ndoes not contain `{}`",
                        actual,
                        expected
                    );
                }
            }
            (Ok(out), ..) => bail!("case `{}` unexpectedly produced\n{out}", case.note),
            (Err(e), ..) => return Err(e.into()),
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

#[test]
#[ignore = "intended for running a single yaml file given on the command line"]
fn one_yaml() -> Result<()> {
    let mut file = String::default();
    for a in std::env::args() {
        if a.ends_with(".yaml") {
            file = a;
            break;
        }
    }

    if file.is_empty() {
        bail!("missing yaml test file");
    }

    yaml_test(file.as_str())
}

#[test_resources("tests/rewrite/cases/*.yaml")]
fn run(path: &str) {
    yaml_test(path).unwrap()
}

#[test]
fn malformed_rules_are_not_errors() -> Result<()> {
    let mut engine = Engine::new(
        "",
        [("KT", "string"), ("wat:VT", "int")],
    );
    assert!(engine.ordered_rules().contains(&"type:KT=string".to_string()));
    assert!(engine.ordered_rules().contains(&"type:VT=int".to_string()));

    let out = engine.process_source(
        "m.go",
        "package p\n\ntype KT interface{}\ntype VT interface{}\n\nvar m map[KT]VT\n",
    )?;
    assert_eq!(out.src, "package p\n\nvar m map[string]int\n");
    Ok(())
}

#[test]
fn package_name_is_adopted_then_enforced() -> Result<()> {
    let mut engine = Engine::new("", [("type:KT", "int")]);
    engine.process_source("a.go", "package cmap\n")?;
    assert_eq!(engine.pkg_name(), "cmap");
    let out = engine.process_source("b.go", "package other\n\nvar x = cmap.New()\n")?;
    assert_eq!(out.src, "package cmap\n\nvar x = New()\n");
    Ok(())
}

#[test]
fn parse_errors_name_the_file() {
    let mut engine = Engine::new("", [("type:KT", "int")]);
    match engine.process_source("broken.go", "package p\n\nfunc (\n") {
        Err(ProcessError::Parse { file, message, .. }) => {
            assert_eq!(file, "broken.go");
            assert!(message.contains("to close parameter list"), "{message}");
        }
        other => panic!("unexpected {other:?}"),
    }
}
