// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

// Use README.md as crate documentation.
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

mod ast;
mod config;
mod constraint;
mod engine;
mod error;
mod format;
mod lexer;
mod parser;
mod printer;
mod resolve;
mod rewrite;
mod rules;
mod walker;
mod zero;

pub use config::RuleConfig;
pub use constraint::{select_files, should_build, TagSet};
pub use engine::{Engine, ParsedFile, ParsedPackage};
pub use error::{ProcessError, ResolveError};
pub use format::{Canonical, External, Formatter};
pub use resolve::package_dir;
pub use rules::{parse_qualified, QualifiedName, Rule, RuleKind, Rules};

/// Items in `unstable` are likely to change.
pub mod unstable {
    pub use crate::ast::*;
    pub use crate::format::organize_imports;
    pub use crate::lexer::*;
    pub use crate::parser::*;
    pub use crate::printer::*;
    pub use crate::walker::{Action, FuncScope, VisitedSet, Walker};
}

#[cfg(test)]
mod tests;
