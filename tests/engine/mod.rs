// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::path::Path;

use anyhow::{bail, Result};
use genx::*;

fn write_files(dir: &Path, files: &[(&str, &str)]) -> Result<()> {
    for (name, contents) in files {
        std::fs::write(dir.join(name), contents)?;
    }
    Ok(())
}

fn names(package: &ParsedPackage) -> Vec<&str> {
    package.files.iter().map(|f| f.name.as_str()).collect()
}

#[test]
fn package_files_follow_build_tags() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_files(
        dir.path(),
        &[
            ("a.go", "package cmap\n\ntype KT interface{}\n\nvar keys []KT\n"),
            (
                "b_string.go",
                "//go:build genx_kt_string\n\npackage cmap\n\nfunc first(keys []KT) KT {\n\treturn keys[0]\n}\n",
            ),
            ("c_int.go", "//go:build genx_kt_int\n\npackage cmap\n\nvar x = 1\n"),
            ("gen.go", "//go:build !genx\n\npackage cmap\n"),
            ("a_test.go", "package cmap\n"),
        ],
    )?;

    let mut engine = Engine::new("", [("type:KT", "string")]);
    let package = engine.process_package(dir.path(), false)?;
    assert_eq!(names(&package), ["a.go", "b_string.go"]);
    assert_eq!(package.name, "cmap");
    assert_eq!(package.files[0].src, "package cmap\n\nvar keys []string\n");
    // The constraint naming genx is gone from the output.
    assert_eq!(
        package.files[1].src,
        "package cmap\n\nfunc first(keys []string) string {\n\treturn keys[0]\n}\n"
    );

    let package = engine.process_package(dir.path(), true)?;
    assert_eq!(names(&package), ["a.go", "a_test.go", "b_string.go"]);
    Ok(())
}

#[test]
fn zero_values_land_in_the_first_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_files(
        dir.path(),
        &[
            ("a.go", "package p\n\ntype VT interface{}\n"),
            ("b.go", "package p\n\nfunc get() VT {\n\treturn nil\n}\n"),
        ],
    )?;

    let mut engine = Engine::new("", [("type:VT", "int")]);
    let package = engine.process_package(dir.path(), false)?;
    assert_eq!(package.files[0].src, "package p\n\nvar zero_int int\n");
    assert_eq!(
        package.files[1].src,
        "package p\n\nfunc get() int {\n\treturn zero_int\n}\n"
    );
    Ok(())
}

#[test]
fn merge_hoists_imports() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_files(
        dir.path(),
        &[
            (
                "a.go",
                "package p\n\nimport \"fmt\"\n\nfunc A() {\n\tfmt.Println()\n}\n",
            ),
            (
                "b.go",
                "package p\n\nimport \"strings\"\n\nfunc B() string {\n\treturn strings.TrimSpace(\"\")\n}\n",
            ),
        ],
    )?;

    let mut engine = Engine::new("", [("type:KT", "int")]);
    let package = engine.process_package(dir.path(), false)?;
    let merged = package.merge_all(false)?;
    assert_eq!(merged.name, "a.go");
    assert_eq!(
        merged.src,
        r#"package p

import (
	"fmt"
	"strings"
)

func A() {
	fmt.Println()
}

func B() string {
	return strings.TrimSpace("")
}
"#
    );

    match package.merge_all(true) {
        Err(ProcessError::NothingToMerge(name)) => assert_eq!(name, "p"),
        other => bail!("unexpected {other:?}"),
    }
    Ok(())
}

#[test]
fn written_files_are_not_templates() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let out = tempfile::tempdir()?;
    write_files(dir.path(), &[("set.go", "package set\n\ntype T interface{}\n\ntype TSet map[T]struct{}\n")])?;

    let mut engine = Engine::new("u64set", [("type:T", "uint64")]);
    engine.set_command("genx generate -t T=uint64");
    let package = engine.process_package(dir.path(), false)?;
    package.write_package(out.path().join("u64set"))?;

    let written = std::fs::read_to_string(out.path().join("u64set").join("set.go"))?;
    assert!(written.starts_with("// Code generated by genx. DO NOT EDIT.\n"));
    assert!(written.contains("// cmd: genx generate -t T=uint64\n"));
    assert!(written.contains("//go:build !genx\n"));
    assert!(written.ends_with("package u64set\n\ntype Uint64Set map[uint64]struct{}\n"));

    let tags = TagSet::new(engine.build_tags());
    assert!(select_files(&out.path().join("u64set"), &tags, true)?.is_empty());
    Ok(())
}

#[test]
fn merged_output_goes_to_a_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_files(
        dir.path(),
        &[
            ("a.go", "package p\n\nvar a = 1\n"),
            ("b.go", "package p\n\nvar b = 2\n"),
        ],
    )?;

    let mut engine = Engine::new("", [("type:KT", "int")]);
    let package = engine.process_package(dir.path(), false)?;
    let path = dir.path().join("out").join("p_gen.go");
    package.write_all_merged(&path, false)?;

    let written = std::fs::read_to_string(&path)?;
    assert!(written.ends_with("package p\n\nvar a = 1\n\nvar b = 2\n"), "{written}");
    Ok(())
}

#[test]
fn missing_files_are_io_errors() {
    let mut engine = Engine::new("", [("type:KT", "int")]);
    match engine.process_file("does/not/exist.go") {
        Err(ProcessError::Io { path, .. }) => assert_eq!(path, "does/not/exist.go"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn engine_from_config() -> Result<()> {
    let config = RuleConfig::from_yaml_str(
        r#"
name: fastmap
types:
  KT: int
  VT:
funcs:
  Debug: "-"
tags: [fast]
"#,
    )?;
    let engine = Engine::from_config(&config);
    assert_eq!(engine.pkg_name(), "fastmap");
    assert_eq!(
        engine.build_tags(),
        ["genx", "genx_kt_builtin", "genx_kt_int", "fast"]
    );
    assert_eq!(
        engine.ordered_rules(),
        ["func:Debug=-", "type:KT=int", "type:VT=-"]
    );
    Ok(())
}
