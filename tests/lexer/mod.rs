// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::{bail, Result};
use genx::unstable::*;
use serde::{Deserialize, Serialize};
use std::env;
use test_generator::test_resources;

fn get_tokens(source: &Source) -> Result<Vec<Token>> {
    let mut tokens = vec![];
    let mut lex = Lexer::new(source);
    loop {
        let tok = lex.next_token()?;
        tokens.push(tok.clone());
        if tok.0 == TokenKind::Eof {
            break;
        }
    }

    Ok(tokens)
}

// The token text must start at the reported column of its line.
fn check_loc(source: &Source, tok: &Token) -> Result<()> {
    if tok.0 == TokenKind::Eof {
        return Ok(());
    }
    let line: String = source
        .line(tok.1.line - 1)
        .chars()
        .skip(tok.1.col as usize - 1)
        .collect();
    let text = tok.1.text().split('\n').next().unwrap_or_default();
    if !line.starts_with(text) {
        bail!(
            "location mismatch for {tok:?}{}",
            tok.1.message("mismatch-error", text)
        );
    }
    Ok(())
}

#[test]
#[ignore = "intended for lexing a single file given on the command line"]
fn one_file() -> Result<()> {
    let mut file = String::default();
    let mut verbose = false;
    for a in env::args() {
        if a.ends_with(".go") {
            file = a.clone();
        }
        if matches!(a.as_str(), "verbose") {
            verbose = true;
        }
    }

    if file.is_empty() {
        bail!("missing <file.go>")
    }

    let source = Source::from_file(&file)?;
    for tok in &get_tokens(&source)? {
        if tok.0 == TokenKind::Eof {
            break;
        }
        check_loc(&source, tok)?;
        if verbose {
            println!("{}", tok.1.message("", ""));
        }
        println!("{:?}", tok);
    }

    Ok(())
}

#[derive(Serialize, Deserialize, PartialEq, Debug)]
struct Case {
    pub go: String,
    pub note: String,
    #[serde(default)]
    pub tokens: Vec<String>,
    pub kinds: Option<Vec<String>>,
    pub error: Option<String>,
}

#[derive(Serialize, Deserialize, PartialEq, Debug)]
struct Test {
    cases: Vec<Case>,
}

fn yaml_test_impl(file: &str) -> Result<()> {
    println!("\nrunning {}", file);

    let yaml = std::fs::read_to_string(file)?;
    let test: Test = serde_yaml::from_str(&yaml)?;

    for case in &test.cases {
        let source = Source::from_contents("case.go".to_string(), case.go.clone())?;

        print!("case {} ", &case.note);

        match get_tokens(&source) {
            Ok(tokens) => {
                if let Some(expected) = &case.error {
                    bail!("expected error `{expected}`, lexed {tokens:?}");
                }
                for (idx, tok) in tokens.iter().enumerate() {
                    if idx >= case.tokens.len() {
                        break;
                    }
                    assert_eq!(
                        tok.1.text(),
                        case.tokens[idx],
                        "{} Expected token `{}` not found",
                        tok.1.message("mismatch-error", &case.tokens[idx]),
                        &case.tokens[idx]
                    );

                    if let Some(k) = &case.kinds {
                        if idx >= k.len() {
                            break;
                        }
                        assert_eq!(
                            format!("{:?}", tok.0),
                            k[idx],
                            "{}",
                            tok.1.message("mismatch-error", "token kind mismatch")
                        );
                    }

                    check_loc(&source, tok)?;
                }
                assert_eq!(
                    tokens.len(),
                    case.tokens.len(),
                    "\n. Token count mismatch.\nLexed tokens:{:?}",
                    tokens
                );
                if let Some(k) = &case.kinds {
                    assert_eq!(
                        tokens.len(),
                        k.len(),
                        "\n. Kind count mismatch.\nLexed tokens:{:?}",
                        tokens
                    );
                }
            }
            Err(actual) => match &case.error {
                Some(expected) => {
                    let actual = actual.to_string();
                    if !actual.contains(expected) {
                        bail!(
                            "Error message\n`{}\n`\ndoes not contain `{}`",
                            actual,
                            expected
                        );
                    }
                }
                _ => return Err(actual),
            },
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
    for a in env::args() {
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

#[test_resources("tests/lexer/cases/*.yaml")]
fn run(path: &str) {
    yaml_test(path).unwrap()
}

#[test]
fn debug() -> Result<()> {
    let go = "abcdefghijklmnopqrstuvwxyz0123456789 short";
    let source = Source::from_contents("case.go".to_string(), go.to_string())?;

    let mut lexer = Lexer::new(&source);
    let tok = lexer.next_token()?;
    check_loc(&source, &tok)?;

    assert_eq!(
        format!("{:?}", tok.1),
        "1:1:0:36, \"abcdefghijklmnopqrstuvwxyz012345...\"",
        "long span not truncated correctly"
    );

    let tok = lexer.next_token()?;
    check_loc(&source, &tok)?;
    assert_eq!(format!("{:?}", tok.1), "1:38:37:42, \"short\"");

    Ok(())
}

#[test]
fn tab() -> Result<()> {
    let go = "\tx := `raw\tstring`\n\ty";
    let source = Source::from_contents("case.go".to_string(), go.to_string())?;

    let mut lexer = Lexer::new(&source);

    let tok = lexer.next_token()?;
    check_loc(&source, &tok)?;
    assert_eq!(tok.1.col, 2, "tab not accounted correctly.");

    lexer.next_token()?;
    let tok = lexer.next_token()?;
    check_loc(&source, &tok)?;
    assert_eq!(tok.1.col, 7, "raw string not positioned correctly");

    // line break inserts a semicolon
    let tok = lexer.next_token()?;
    assert_eq!(tok.0, TokenKind::AutoSemi);

    let tok = lexer.next_token()?;
    check_loc(&source, &tok)?;
    assert_eq!((tok.1.line, tok.1.col), (2, 2));

    // the caret line keeps the tab so that it lines up
    let msg = tok.1.message("", "");
    assert!(msg.contains("| \t^"), "{msg}");

    Ok(())
}

#[test]
fn invalid_line() -> Result<()> {
    let source = Source::from_contents("case.go".to_string(), String::new())?;

    assert_eq!(
        source.message(2, 0, "", ""),
        "case.go: invalid line 2 specified"
    );

    Ok(())
}
