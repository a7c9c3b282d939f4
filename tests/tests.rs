// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

mod engine;
mod lexer;
mod parser;
mod rewrite;
