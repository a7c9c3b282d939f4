// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::fmt::{self, Debug, Formatter, Write};
use core::iter::Peekable;
use core::str::CharIndices;
use std::path::Path;
use std::rc::Rc;

use anyhow::{anyhow, Context, Result};

struct SourceFile {
    name: String,
    text: String,
    // Byte offset at which each line begins.
    line_starts: Vec<u32>,
}

/// A named Go source text, shared cheaply between tokens and spans.
#[derive(Clone)]
pub struct Source(Rc<SourceFile>);

impl PartialEq for Source {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Source {}

impl Debug for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0.name)
    }
}

impl Source {
    pub fn from_contents(file: String, contents: String) -> Result<Source> {
        // Offsets and columns are u32; leave room for the end of file.
        if contents.len() >= u32::MAX as usize - 1 {
            return Err(anyhow!("{file} is too large to be lexed"));
        }
        let line_starts = core::iter::once(0)
            .chain(
                contents
                    .match_indices('\n')
                    .map(|(i, _)| i as u32 + 1),
            )
            .collect();
        Ok(Self(Rc::new(SourceFile {
            name: file,
            text: contents,
            line_starts,
        })))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Source> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_contents(path.to_string_lossy().into_owned(), contents)
    }

    pub fn file(&self) -> &str {
        &self.0.name
    }

    pub fn contents(&self) -> &str {
        &self.0.text
    }

    pub fn line_count(&self) -> u32 {
        self.0.line_starts.len() as u32
    }

    /// Text of the zero based line `idx` without its line terminator.
    pub fn line(&self, idx: u32) -> &str {
        let starts = &self.0.line_starts;
        let Some(&begin) = starts.get(idx as usize) else {
            return "";
        };
        let end = starts
            .get(idx as usize + 1)
            .map_or(self.0.text.len(), |next| *next as usize - 1);
        let text = &self.0.text[begin as usize..end];
        text.strip_suffix('\r').unwrap_or(text)
    }

    /// Renders `msg` with the offending line and a caret under `col`.
    pub fn message(&self, line: u32, col: u32, kind: &str, msg: &str) -> String {
        if line == 0 || line > self.line_count() {
            return format!("{}: invalid line {line} specified", self.0.name);
        }

        let text = self.line(line - 1);
        let gutter = " ".repeat(line.to_string().len() + 1);
        let mut out = format!("\n--> {}:{line}:{col}\n{gutter}|\n", self.0.name);
        let _ = writeln!(out, "{line:<width$}| {text}", width = gutter.len());
        out.push_str(&gutter);
        out.push_str("| ");
        // Tabs stay tabs so that the caret lines up with the source.
        out.extend(
            text.chars()
                .take(col.saturating_sub(1) as usize)
                .map(|c| if c == '\t' { '\t' } else { ' ' }),
        );
        let _ = write!(out, "^\n{kind}: {msg}");
        out
    }

    pub fn error(&self, line: u32, col: u32, msg: &str) -> anyhow::Error {
        anyhow!(self.message(line, col, "error", msg))
    }
}

/// Location of a token: 1-based line and column plus its byte range.
#[derive(Clone)]
pub struct Span {
    pub source: Source,
    pub line: u32,
    pub col: u32,
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn text(&self) -> &str {
        &self.source.contents()[self.start as usize..self.end as usize]
    }

    /// Line on which the span ends. Only raw strings and block comments span lines.
    pub fn end_line(&self) -> u32 {
        self.line + self.text().matches('\n').count() as u32
    }

    pub fn message(&self, kind: &str, msg: &str) -> String {
        self.source.message(self.line, self.col, kind, msg)
    }

    pub fn error(&self, msg: &str) -> anyhow::Error {
        self.source.error(self.line, self.col, msg)
    }
}

// Long texts are cut after 32 escaped characters.
impl Debug for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let escaped = self.text().escape_debug().to_string();
        let cut = escaped
            .char_indices()
            .nth(32)
            .map_or(escaped.len(), |(i, _)| i);
        let more = if cut < escaped.len() { "..." } else { "" };
        write!(
            f,
            "{}:{}:{}:{}, \"{}{more}\"",
            self.line,
            self.col,
            self.start,
            self.end,
            &escaped[..cut]
        )
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TokenKind {
    Symbol,
    Ident,
    Number,
    Char,
    String,
    RawString,
    Comment,
    // Semicolon inserted at a line break.
    AutoSemi,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token(pub TokenKind, pub Span);

pub const KEYWORDS: [&str; 25] = [
    "break",
    "case",
    "chan",
    "const",
    "continue",
    "default",
    "defer",
    "else",
    "fallthrough",
    "for",
    "func",
    "go",
    "goto",
    "if",
    "import",
    "interface",
    "map",
    "package",
    "range",
    "return",
    "select",
    "struct",
    "switch",
    "type",
    "var",
];

pub fn is_keyword(ident: &str) -> bool {
    KEYWORDS.contains(&ident)
}

// Longest operators first so that the first match is the longest one.
const OPERATORS: [&str; 47] = [
    "<<=", ">>=", "&^=", "...", "&&", "||", "<-", "++", "--", "==", "!=", "<=", ">=", ":=", "+=",
    "-=", "*=", "/=", "%=", "&=", "|=", "^=", "<<", ">>", "&^", "+", "-", "*", "/", "%", "&",
    "|", "^", "<", ">", "=", "!", "(", ")", "[", "]", "{", "}", ",", ";", ".", ":",
];

#[derive(Clone)]
pub struct Lexer<'source> {
    source: Source,
    iter: Peekable<CharIndices<'source>>,
    line: u32,
    col: u32,
    // Whether a line break at this point terminates a statement.
    semi: bool,
}

impl<'source> Lexer<'source> {
    pub fn new(source: &'source Source) -> Self {
        Self {
            source: source.clone(),
            iter: source.contents().char_indices().peekable(),
            line: 1,
            col: 1,
            semi: false,
        }
    }

    fn peek(&mut self) -> (usize, char) {
        match self.iter.peek() {
            Some((index, chr)) => (*index, *chr),
            _ => (self.source.contents().len(), '\x00'),
        }
    }

    fn peekahead(&mut self, n: usize) -> (usize, char) {
        match self.iter.clone().nth(n) {
            Some((index, chr)) => (index, chr),
            _ => (self.source.contents().len(), '\x00'),
        }
    }

    fn bump(&mut self) {
        if let Some((_, ch)) = self.iter.next() {
            if ch == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
    }

    fn span(&self, line: u32, col: u32, start: usize, end: usize) -> Span {
        Span {
            source: self.source.clone(),
            line,
            col,
            start: start as u32,
            end: end as u32,
        }
    }

    fn auto_semi(&mut self) -> Token {
        self.semi = false;
        let (start, _) = self.peek();
        Token(
            TokenKind::AutoSemi,
            self.span(self.line, self.col, start, start),
        )
    }

    fn read_ident(&mut self) -> Token {
        let (start, _) = self.peek();
        let (line, col) = (self.line, self.col);
        loop {
            let ch = self.peek().1;
            if ch.is_alphanumeric() || ch == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let end = self.peek().0;
        let span = self.span(line, col, start, end);
        self.semi = match span.text() {
            "break" | "continue" | "fallthrough" | "return" => true,
            t => !is_keyword(t),
        };
        Token(TokenKind::Ident, span)
    }

    // Accepts decimal, hex, octal and binary integers, floats (including hex
    // floats), underscores as digit separators and the imaginary suffix.
    // Validity of the digits themselves is left to the Go compiler.
    fn read_number(&mut self) -> Result<Token> {
        let (start, _) = self.peek();
        let (line, col) = (self.line, self.col);
        let hex = self.peek().1 == '0' && matches!(self.peekahead(1).1, 'x' | 'X');
        let mut prev = '\x00';
        loop {
            let ch = self.peek().1;
            let exponent = if hex {
                matches!(prev, 'p' | 'P')
            } else {
                matches!(prev, 'e' | 'E')
            };
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '.' || (exponent && matches!(ch, '+' | '-')) {
                prev = ch;
                self.bump();
            } else {
                break;
            }
        }
        let end = self.peek().0;
        let span = self.span(line, col, start, end);
        if span.text().contains("..") {
            return Err(self.source.error(line, col, "invalid number"));
        }
        self.semi = true;
        Ok(Token(TokenKind::Number, span))
    }

    fn read_quoted(&mut self, quote: char, kind: TokenKind) -> Result<Token> {
        let (start, _) = self.peek();
        let (line, col) = (self.line, self.col);
        self.bump();
        loop {
            match self.peek().1 {
                '\\' => {
                    self.bump();
                    if matches!(self.peek().1, '\n' | '\x00') {
                        return Err(self.source.error(line, col, "invalid escape sequence"));
                    }
                    self.bump();
                }
                '\n' | '\x00' => {
                    let msg = format!("unmatched {quote}");
                    return Err(self.source.error(line, col, &msg));
                }
                ch if ch == quote => {
                    self.bump();
                    break;
                }
                _ => self.bump(),
            }
        }
        let end = self.peek().0;
        self.semi = true;
        Ok(Token(kind, self.span(line, col, start, end)))
    }

    fn read_raw_string(&mut self) -> Result<Token> {
        let (start, _) = self.peek();
        let (line, col) = (self.line, self.col);
        self.bump();
        loop {
            match self.peek().1 {
                '`' => {
                    self.bump();
                    break;
                }
                '\x00' => {
                    return Err(self.source.error(line, col, "unmatched `"));
                }
                _ => self.bump(),
            }
        }
        let end = self.peek().0;
        self.semi = true;
        Ok(Token(TokenKind::RawString, self.span(line, col, start, end)))
    }

    fn read_line_comment(&mut self) -> Token {
        let (start, _) = self.peek();
        let (line, col) = (self.line, self.col);
        while !matches!(self.peek().1, '\n' | '\x00') {
            self.bump();
        }
        let mut end = self.peek().0;
        if self.source.contents()[start..end].ends_with('\r') {
            end -= 1;
        }
        Token(TokenKind::Comment, self.span(line, col, start, end))
    }

    fn read_block_comment(&mut self) -> Result<Token> {
        let (start, _) = self.peek();
        let (line, col) = (self.line, self.col);
        self.bump();
        self.bump();
        loop {
            match self.peek().1 {
                '*' if self.peekahead(1).1 == '/' => {
                    self.bump();
                    self.bump();
                    break;
                }
                '\x00' => return Err(self.source.error(line, col, "comment not terminated")),
                _ => self.bump(),
            }
        }
        let end = self.peek().0;
        Ok(Token(TokenKind::Comment, self.span(line, col, start, end)))
    }

    fn skip_ws(&mut self) -> Option<Token> {
        loop {
            match self.peek().1 {
                ' ' | '\t' | '\r' => self.bump(),
                '\n' if self.semi => return Some(self.auto_semi()),
                '\n' => self.bump(),
                _ => return None,
            }
        }
    }

    pub fn next_token(&mut self) -> Result<Token> {
        if let Some(semi) = self.skip_ws() {
            // Consume the line break that produced the semicolon.
            self.bump();
            return Ok(semi);
        }

        let (start, chr) = self.peek();
        let (line, col) = (self.line, self.col);

        match chr {
            '\x00' if self.semi => Ok(self.auto_semi()),
            '\x00' => Ok(Token(TokenKind::Eof, self.span(line, col, start, start))),
            '/' if self.peekahead(1).1 == '/' => {
                // A line comment ends the line; the semicolon goes before it.
                if self.semi {
                    return Ok(self.auto_semi());
                }
                Ok(self.read_line_comment())
            }
            '/' if self.peekahead(1).1 == '*' => {
                let state = (self.iter.clone(), self.line, self.col);
                let comment = self.read_block_comment()?;
                if self.semi && comment.1.text().contains('\n') {
                    (self.iter, self.line, self.col) = state;
                    return Ok(self.auto_semi());
                }
                Ok(comment)
            }
            '"' => self.read_quoted('"', TokenKind::String),
            '\'' => self.read_quoted('\'', TokenKind::Char),
            '`' => self.read_raw_string(),
            '.' if self.peekahead(1).1.is_ascii_digit() => self.read_number(),
            _ if chr.is_ascii_digit() => self.read_number(),
            _ if chr.is_alphabetic() || chr == '_' => Ok(self.read_ident()),
            _ => {
                let rest = &self.source.contents()[start..];
                let op = match OPERATORS.iter().find(|op| rest.starts_with(*op)) {
                    Some(op) => *op,
                    None => return Err(self.source.error(line, col, "invalid character")),
                };
                for _ in 0..op.len() {
                    self.bump();
                }
                self.semi = matches!(op, ")" | "]" | "}" | "++" | "--");
                Ok(Token(
                    TokenKind::Symbol,
                    self.span(line, col, start, start + op.len()),
                ))
            }
        }
    }
}
