// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::rc::Rc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use genx::unstable::{parse_file, Ast, Lexer, Source, TokenKind};
use genx::{package_dir, Engine, External, ProcessError, RuleConfig};

/// `name=target` for a rule of `kind`; a missing target deletes.
fn split_rule(kind: &str, arg: &str) -> (String, String) {
    match arg.split_once('=') {
        Some((name, target)) => (format!("{kind}:{}", name.trim()), target.trim().to_string()),
        None => (format!("{kind}:{}", arg.trim()), String::new()),
    }
}

#[derive(Args)]
struct RuleArgs {
    /// Type rule, e.g. `KT=string`.
    #[arg(short = 't', long = "type", value_name = "NAME[=TARGET]")]
    types: Vec<String>,

    /// Selector rule, e.g. `cm.HashFn=github.com/x/hash.Fn`.
    #[arg(short, long = "selector", value_name = "SEL[=TARGET]")]
    selectors: Vec<String>,

    /// Field rule.
    #[arg(long = "fld", value_name = "NAME[=TARGET]")]
    fields: Vec<String>,

    /// Function rule.
    #[arg(long = "fn", value_name = "NAME[=TARGET]")]
    funcs: Vec<String>,

    /// Rule file. yaml or json.
    #[arg(long, value_name = "rules.yaml|rules.json")]
    rules: Option<String>,
}

impl RuleArgs {
    fn config(&self) -> Result<RuleConfig> {
        let mut config = match &self.rules {
            Some(file) => RuleConfig::from_file(file)?,
            None => RuleConfig::default(),
        };
        let flags = [
            ("type", &self.types),
            ("selector", &self.selectors),
            ("field", &self.fields),
            ("func", &self.funcs),
        ];
        for (kind, args) in flags {
            for arg in args {
                let (key, target) = split_rule(kind, arg);
                config.rules.insert(key, Some(target));
            }
        }
        Ok(config)
    }
}

fn genx_generate(rules: RuleArgs, opts: GenerateArgs) -> Result<()> {
    let mut config = rules.config()?;
    if let Some(name) = opts.name {
        config.name = Some(name);
    }
    config.tags.extend(opts.tags);

    let mut engine = Engine::from_config(&config);
    if let Some(cmd) = &opts.formatter {
        engine = engine.with_formatter(Rc::new(External::new(cmd)?));
    }
    engine.set_command(std::env::args().collect::<Vec<_>>().join(" "));

    let to_stdout = opts.out == "-" || opts.out == "/dev/stdout";
    match (opts.file, opts.pkg) {
        (Some(file), None) => engine.process_file(&file)?.write_file(&opts.out)?,
        (None, Some(pkg)) => {
            let flags: Vec<String> = opts
                .get_flags
                .as_deref()
                .unwrap_or_default()
                .split_whitespace()
                .map(str::to_string)
                .collect();
            let dir = package_dir(&pkg, opts.get, &flags, &engine.build_tags())?;
            let package = engine.process_package(&dir, opts.tests)?;
            if opts.merge || to_stdout {
                package.write_all_merged(&opts.out, opts.tests)?;
            } else {
                package.write_package(&opts.out)?;
            }
        }
        _ => bail!("exactly one of --file or --pkg is required"),
    }
    Ok(())
}

fn genx_lex(file: String, locations: bool) -> Result<()> {
    let source = Source::from_file(&file)?;
    let mut lexer = Lexer::new(&source);

    loop {
        let token = lexer.next_token()?;
        if token.0 == TokenKind::Eof {
            break;
        }
        if locations {
            println!("{}", token.1.message("", ""));
        }
        println!("{:?} {:?}", token.0, token.1.text());
    }
    Ok(())
}

fn genx_parse(file: String) -> Result<()> {
    let source = Source::from_file(&file)?;
    let mut ast = Ast::new();
    let root = parse_file(&mut ast, &source)?;
    println!("root: {root:?}");
    println!("{ast:#?}");
    Ok(())
}

fn genx_rules(rules: RuleArgs) -> Result<()> {
    let engine = Engine::from_config(&rules.config()?);
    for rule in engine.ordered_rules() {
        println!("{rule}");
    }
    println!("tags: {}", engine.build_tags().join(","));
    for (path, alias) in engine.rules().imports.iter() {
        match alias.is_empty() {
            true => println!("import: {path}"),
            false => println!("import: {alias} {path}"),
        }
    }
    Ok(())
}

#[derive(Args)]
struct GenerateArgs {
    /// Extra build tags, comma separated.
    #[arg(long, value_delimiter = ',')]
    tags: Vec<String>,

    /// Template file.
    #[arg(short, long, conflicts_with = "pkg")]
    file: Option<String>,

    /// Template package, a directory or an import path.
    #[arg(short, long)]
    pkg: Option<String>,

    /// Output file or directory. `-` writes the merged output to stdout.
    #[arg(short, long, default_value = "-")]
    out: String,

    /// Output package name.
    #[arg(short, long)]
    name: Option<String>,

    /// Merge the package into a single file.
    #[arg(short, long)]
    merge: bool,

    /// Include test files; with --merge only test files are merged.
    #[arg(long)]
    tests: bool,

    /// Formatter command the output is piped through, e.g. `goimports`.
    #[arg(long)]
    formatter: Option<String>,

    /// Fetch the package with `go get` if it cannot be found.
    #[arg(long)]
    get: bool,

    /// Extra flags for `go get`.
    #[arg(long, allow_hyphen_values = true)]
    get_flags: Option<String>,
}

#[derive(Subcommand)]
enum GenxCommand {
    /// Generate a concrete variant of a template file or package.
    Generate {
        #[command(flatten)]
        rules: RuleArgs,

        #[command(flatten)]
        opts: GenerateArgs,
    },

    /// Tokenize a Go file.
    Lex {
        /// Go source file.
        file: String,

        /// Show where each token is.
        #[arg(long)]
        locations: bool,
    },

    /// Parse a Go file and dump the tree.
    Parse {
        /// Go source file.
        file: String,
    },

    /// Print the normalized rule table.
    Rules {
        #[command(flatten)]
        rules: RuleArgs,
    },
}

#[derive(clap::Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: GenxCommand,

    /// Log rewrite decisions.
    #[arg(short, long, global = true)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        GenxCommand::Generate { rules, opts } => genx_generate(rules, opts),
        GenxCommand::Lex { file, locations } => genx_lex(file, locations),
        GenxCommand::Parse { file } => genx_parse(file),
        GenxCommand::Rules { rules } => genx_rules(rules),
    };

    if let Err(err) = &result {
        if let Some(partial) = err.downcast_ref::<ProcessError>().and_then(ProcessError::partial) {
            eprintln!("{partial}");
        }
    }
    result.context("genx failed")
}
