// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Build constraints and package file selection.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use tracing::{debug, warn};

const KNOWN_OS: &[&str] = &[
    "aix",
    "android",
    "darwin",
    "dragonfly",
    "freebsd",
    "hurd",
    "illumos",
    "ios",
    "js",
    "linux",
    "nacl",
    "netbsd",
    "openbsd",
    "plan9",
    "solaris",
    "wasip1",
    "windows",
    "zos",
];

const KNOWN_ARCH: &[&str] = &[
    "386", "amd64", "arm", "arm64", "loong64", "mips", "mips64", "mips64le", "mipsle", "ppc64",
    "ppc64le", "riscv64", "s390x", "wasm",
];

const UNIX_OS: &[&str] = &[
    "aix",
    "android",
    "darwin",
    "dragonfly",
    "freebsd",
    "hurd",
    "illumos",
    "ios",
    "linux",
    "netbsd",
    "openbsd",
    "solaris",
];

fn host_os() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        os => os,
    }
}

fn host_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "x86" => "386",
        "aarch64" => "arm64",
        "powerpc64" => "ppc64",
        "loongarch64" => "loong64",
        arch => arch,
    }
}

/// Tags considered satisfied when selecting files.
#[derive(Debug, Clone)]
pub struct TagSet {
    tags: BTreeSet<String>,
    os: String,
    arch: String,
}

impl TagSet {
    /// `tags` plus the host's OS and architecture and the `gc` toolchain.
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::for_target(tags, host_os(), host_arch())
    }

    pub fn for_target<I, S>(tags: I, os: &str, arch: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set: BTreeSet<String> = tags
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        set.insert(os.to_string());
        set.insert(arch.to_string());
        set.insert("gc".to_string());
        if UNIX_OS.contains(&os) {
            set.insert("unix".to_string());
        }
        Self {
            tags: set,
            os: os.to_string(),
            arch: arch.to_string(),
        }
    }

    pub fn matches(&self, tag: &str) -> bool {
        self.tags.contains(tag) || tag.starts_with("go1.")
    }
}

struct ExprParser<'a> {
    tokens: Vec<&'a str>,
    pos: usize,
}

fn tokenize(expr: &str) -> Result<Vec<&str>> {
    let mut tokens = vec![];
    let mut rest = expr.trim_start();
    while !rest.is_empty() {
        let len = if rest.starts_with("&&") || rest.starts_with("||") {
            2
        } else if rest.starts_with(|c: char| matches!(c, '!' | '(' | ')')) {
            1
        } else {
            let len = rest
                .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.'))
                .unwrap_or(rest.len());
            if len == 0 {
                let c = rest.chars().next().unwrap_or_default();
                bail!("unexpected `{c}` in build constraint");
            }
            len
        };
        tokens.push(&rest[..len]);
        rest = rest[len..].trim_start();
    }
    Ok(tokens)
}

impl<'a> ExprParser<'a> {
    fn peek(&self) -> Option<&'a str> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<&'a str> {
        let tok = self.peek();
        self.pos += 1;
        tok
    }

    fn parse_or(&mut self, tags: &TagSet) -> Result<bool> {
        let mut v = self.parse_and(tags)?;
        while self.peek() == Some("||") {
            self.pos += 1;
            v |= self.parse_and(tags)?;
        }
        Ok(v)
    }

    fn parse_and(&mut self, tags: &TagSet) -> Result<bool> {
        let mut v = self.parse_not(tags)?;
        while self.peek() == Some("&&") {
            self.pos += 1;
            v &= self.parse_not(tags)?;
        }
        Ok(v)
    }

    fn parse_not(&mut self, tags: &TagSet) -> Result<bool> {
        match self.next() {
            Some("!") => Ok(!self.parse_not(tags)?),
            Some("(") => {
                let v = self.parse_or(tags)?;
                match self.next() {
                    Some(")") => Ok(v),
                    _ => bail!("missing `)` in build constraint"),
                }
            }
            Some(tok) if tok != "&&" && tok != "||" && tok != ")" => Ok(tags.matches(tok)),
            Some(tok) => bail!("unexpected `{tok}` in build constraint"),
            None => bail!("unexpected end of build constraint"),
        }
    }
}

/// Evaluates a `//go:build` expression.
pub fn eval_expr(expr: &str, tags: &TagSet) -> Result<bool> {
    let mut parser = ExprParser {
        tokens: tokenize(expr)?,
        pos: 0,
    };
    let v = parser.parse_or(tags)?;
    if let Some(tok) = parser.peek() {
        bail!("unexpected `{tok}` in build constraint");
    }
    Ok(v)
}

/// Evaluates the options of a `// +build` line: space separated options are
/// or-ed, comma separated terms within an option are and-ed.
pub fn eval_plus_build(line: &str, tags: &TagSet) -> bool {
    line.split_whitespace().any(|option| {
        option.split(',').all(|term| match term.strip_prefix('!') {
            Some(tag) => !tags.matches(tag),
            None => tags.matches(term),
        })
    })
}

/// Whether the constraints in the header of `contents` are satisfied.
/// A `//go:build` line takes precedence over `// +build` lines.
pub fn should_build(contents: &str, tags: &TagSet) -> Result<bool> {
    let mut go_build = None;
    let mut plus_build = vec![];
    for line in contents.lines().map(str::trim) {
        if line.starts_with("package ") || line == "package" {
            break;
        }
        if let Some(expr) = line.strip_prefix("//go:build") {
            go_build = Some(expr.trim());
        } else if let Some(rest) = line.strip_prefix("//") {
            if let Some(opts) = rest.trim_start().strip_prefix("+build") {
                plus_build.push(opts);
            }
        }
    }
    match go_build {
        Some(expr) => eval_expr(expr, tags),
        None => Ok(plus_build.iter().all(|l| eval_plus_build(l, tags))),
    }
}

/// Applies the `_GOOS`, `_GOARCH` and `_GOOS_GOARCH` file name suffixes.
pub fn matches_file_name(name: &str, tags: &TagSet) -> bool {
    let stem = name.strip_suffix(".go").unwrap_or(name);
    let stem = stem.strip_suffix("_test").unwrap_or(stem);
    let parts: Vec<&str> = stem.split('_').collect();
    let n = parts.len();
    if n >= 3 && KNOWN_OS.contains(&parts[n - 2]) && KNOWN_ARCH.contains(&parts[n - 1]) {
        return parts[n - 2] == tags.os && parts[n - 1] == tags.arch;
    }
    if n >= 2 {
        let last = parts[n - 1];
        if KNOWN_OS.contains(&last) {
            return last == tags.os;
        }
        if KNOWN_ARCH.contains(&last) {
            return last == tags.arch;
        }
    }
    true
}

pub fn is_test_file(name: &str) -> bool {
    name.ends_with("_test.go")
}

/// The `.go` files of `dir` satisfying `tags`, sorted by name. Test files
/// are included only when `tests` is set.
pub fn select_files(dir: &Path, tags: &TagSet, tests: bool) -> std::io::Result<Vec<PathBuf>> {
    let mut files = vec![];
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.ends_with(".go")
            || name.starts_with('_')
            || name.starts_with('.')
            || !path.is_file()
        {
            continue;
        }
        if is_test_file(name) && !tests {
            continue;
        }
        if !matches_file_name(name, tags) {
            debug!("skipping {name}: file name constraint");
            continue;
        }
        match should_build(&std::fs::read_to_string(&path)?, tags) {
            Ok(true) => files.push(path),
            Ok(false) => debug!("skipping {name}: build constraints"),
            Err(e) => warn!("skipping {name}: {e}"),
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(list: &[&str]) -> TagSet {
        TagSet::for_target(list.iter().copied(), "linux", "amd64")
    }

    #[test]
    fn go_build_expressions() -> Result<()> {
        let t = tags(&["genx", "genx_kt_builtin"]);
        assert!(eval_expr("genx", &t)?);
        assert!(!eval_expr("!genx", &t)?);
        assert!(eval_expr("genx && (linux || darwin)", &t)?);
        assert!(!eval_expr("genx && windows", &t)?);
        assert!(eval_expr("!windows && unix && go1.18", &t)?);
        assert!(eval_expr("genx_kt_builtin || genx_kt_string", &t)?);
        assert!(eval_expr("genx &&", &t).is_err());
        assert!(eval_expr("(genx", &t).is_err());
        assert!(eval_expr("genx linux", &t).is_err());
        Ok(())
    }

    #[test]
    fn plus_build_lines() {
        let t = tags(&["genx"]);
        assert!(eval_plus_build("genx", &t));
        assert!(!eval_plus_build("!genx", &t));
        assert!(eval_plus_build("windows linux,genx", &t));
        assert!(!eval_plus_build("linux,!genx", &t));
    }

    #[test]
    fn header_constraints() -> Result<()> {
        let t = tags(&["genx"]);
        assert!(should_build("package x\n", &t)?);
        assert!(!should_build("//go:build !genx\n// +build !genx\n\npackage x\n", &t)?);
        assert!(should_build("// +build genx\n\npackage x\n", &t)?);
        assert!(!should_build("// +build genx\n// +build windows\n\npackage x\n", &t)?);
        // constraints after the package clause do not count
        assert!(should_build("package x\n\n//go:build windows\n", &t)?);
        Ok(())
    }

    #[test]
    fn file_name_suffixes() {
        let t = tags(&[]);
        assert!(matches_file_name("map.go", &t));
        assert!(matches_file_name("map_linux.go", &t));
        assert!(!matches_file_name("map_windows.go", &t));
        assert!(matches_file_name("map_linux_amd64_test.go", &t));
        assert!(!matches_file_name("map_linux_arm64.go", &t));
        assert!(matches_file_name("linux.go", &t));
    }

    #[test]
    fn selects_package_files() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let write = |name: &str, contents: &str| std::fs::write(dir.path().join(name), contents);
        write("b.go", "// +build genx\n\npackage x\n")?;
        write("a.go", "package x\n")?;
        write("gen.go", "//go:build !genx\n\npackage x\n")?;
        write("a_test.go", "package x\n")?;
        write("_skip.go", "package x\n")?;
        write("notes.txt", "package x\n")?;

        let t = tags(&["genx"]);
        let names = |files: Vec<PathBuf>| -> Vec<String> {
            files
                .iter()
                .filter_map(|p| p.file_name()?.to_str().map(str::to_string))
                .collect()
        };
        assert_eq!(names(select_files(dir.path(), &t, false)?), ["a.go", "b.go"]);
        assert_eq!(
            names(select_files(dir.path(), &t, true)?),
            ["a.go", "a_test.go", "b.go"]
        );
        Ok(())
    }
}
