//! Compiler collaborator: trait seam plus the built-in evaluator
//!
//! The engine only sees the [`Compiler`] trait. The shipped
//! [`SassCompiler`] is a deliberately small evaluator: it resolves and
//! inlines `@use`/`@import`/`@forward` targets through the resolver and
//! evaluates flat (optionally nested) rule blocks. Full language coverage
//! lives outside this crate's scope; what matters here is that every
//! compile attempt, failed ones included, reports the dependency records
//! observed along the way so the engine can keep its graph current.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::graph::FileRecord;
use crate::paths;
use crate::resolver::{self, Resolution};

/// A failed compile, positioned in its source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    pub message: String,
    pub file: PathBuf,
    /// 1-based
    pub line: usize,
    /// 1-based
    pub column: usize,
    snippet: Option<String>,
}

impl CompileError {
    pub fn new(
        message: impl Into<String>,
        file: &Path,
        line: usize,
        column: usize,
        snippet: Option<String>,
    ) -> Self {
        Self {
            message: message.into(),
            file: file.to_path_buf(),
            line,
            column,
            snippet,
        }
    }

    /// Source-context block printed under the `Error:` line
    pub fn render_context(&self) -> String {
        let location = format!(
            "  {} {}:{}",
            paths::display_rel(&self.file),
            self.line,
            self.column
        );
        match &self.snippet {
            Some(text) => {
                let gutter = self.line.to_string();
                let pad = " ".repeat(gutter.len());
                let caret = " ".repeat(self.column.saturating_sub(1));
                format!("  {gutter} | {text}\n  {pad} | {caret}^\n{location}")
            }
            None => location,
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CompileError {}

/// Everything a compile attempt produces
///
/// `records` holds the dependency record for every file the attempt
/// visited; it is populated on failure too, so a broken import still
/// registers the slots it probed.
#[derive(Debug)]
pub struct CompileOutcome {
    pub result: Result<String, CompileError>,
    pub records: HashMap<PathBuf, FileRecord>,
}

impl CompileOutcome {
    /// An outcome carrying only an error, with no visited files
    pub fn failure(input: &Path, message: impl Into<String>) -> Self {
        Self {
            result: Err(CompileError::new(message, input, 1, 1, None)),
            records: HashMap::new(),
        }
    }
}

/// The language evaluator, safe to invoke concurrently for distinct inputs
pub trait Compiler: Send + Sync {
    fn compile(&self, input: &Path, load_paths: &[PathBuf]) -> CompileOutcome;
}

/// Built-in evaluator
#[derive(Debug, Clone, Copy, Default)]
pub struct SassCompiler;

impl SassCompiler {
    pub fn new() -> Self {
        Self
    }

    /// Compile source text directly (stdin mode); imports resolve relative
    /// to `base`'s directory
    pub fn compile_string(
        &self,
        source: &str,
        base: &Path,
        load_paths: &[PathBuf],
    ) -> CompileOutcome {
        let mut visit = Visit::new(load_paths);
        visit.records.insert(base.to_path_buf(), FileRecord::default());
        visit.stack.push(base.to_path_buf());
        let result = visit.compile_source(source, base).map(render);
        CompileOutcome {
            result,
            records: visit.records,
        }
    }
}

impl Compiler for SassCompiler {
    fn compile(&self, input: &Path, load_paths: &[PathBuf]) -> CompileOutcome {
        let input = paths::canonical(input);
        let mut visit = Visit::new(load_paths);
        let result = visit.compile_file(&input).map(render);
        CompileOutcome {
            result,
            records: visit.records,
        }
    }
}

fn render(blocks: Vec<String>) -> String {
    if blocks.is_empty() {
        String::new()
    } else {
        format!("{}\n", blocks.join("\n\n"))
    }
}

/// One compile attempt's traversal state
struct Visit<'a> {
    load_paths: &'a [PathBuf],
    records: HashMap<PathBuf, FileRecord>,
    /// Files already inlined; duplicate imports are emitted once
    emitted: HashSet<PathBuf>,
    /// Load chain for cycle detection
    stack: Vec<PathBuf>,
}

impl<'a> Visit<'a> {
    fn new(load_paths: &'a [PathBuf]) -> Self {
        Self {
            load_paths,
            records: HashMap::new(),
            emitted: HashSet::new(),
            stack: Vec::new(),
        }
    }

    fn compile_file(&mut self, path: &Path) -> Result<Vec<String>, CompileError> {
        let source = fs::read_to_string(path)
            .map_err(|_| CompileError::new("Cannot open file.", path, 1, 1, None))?;
        // Fresh record per attempt, never merged with the previous one.
        self.records.insert(path.to_path_buf(), FileRecord::default());
        self.stack.push(path.to_path_buf());
        let result = self.compile_source(&source, path);
        self.stack.pop();
        result
    }

    fn compile_source(&mut self, source: &str, file: &Path) -> Result<Vec<String>, CompileError> {
        let mut sc = Scanner::new(source, file);
        let mut blocks: Vec<String> = Vec::new();
        loop {
            sc.skip_trivia()?;
            match sc.peek() {
                None => break,
                Some('@') => self.directive(&mut sc, file, &mut blocks)?,
                Some('}') => return Err(sc.error("unmatched \"}\".")),
                Some(_) => self.rule(&mut sc, "", &mut blocks)?,
            }
        }
        Ok(blocks)
    }

    fn directive(
        &mut self,
        sc: &mut Scanner,
        file: &Path,
        blocks: &mut Vec<String>,
    ) -> Result<(), CompileError> {
        let at_line = sc.line;
        let at_col = sc.col;
        sc.bump(); // '@'
        let name = sc.take_ident();
        match name.as_str() {
            "use" => {
                sc.skip_trivia()?;
                let (spec, line, col) = sc.quoted_string()?;
                self.load(sc, &spec, file, line, col, blocks)?;
                sc.skip_trivia()?;
                if sc.eat_keyword("as") {
                    sc.skip_trivia()?;
                    if sc.peek() == Some('*') {
                        sc.bump();
                    } else if sc.take_ident().is_empty() {
                        return Err(sc.error("Expected identifier."));
                    }
                    sc.skip_trivia()?;
                }
                sc.expect(';')
            }
            "forward" => {
                sc.skip_trivia()?;
                let (spec, line, col) = sc.quoted_string()?;
                self.load(sc, &spec, file, line, col, blocks)?;
                // show/hide clauses carry no output
                let _ = sc.take_until_any(&[';']);
                sc.expect(';')
            }
            "import" => {
                loop {
                    sc.skip_trivia()?;
                    let (spec, line, col) = sc.quoted_string()?;
                    self.load(sc, &spec, file, line, col, blocks)?;
                    sc.skip_trivia()?;
                    if sc.peek() == Some(',') {
                        sc.bump();
                        continue;
                    }
                    break;
                }
                sc.expect(';')
            }
            _ => Err(sc.error_at(at_line, at_col, format!("Unknown at-rule \"@{name}\"."))),
        }
    }

    fn load(
        &mut self,
        sc: &Scanner,
        spec: &str,
        from: &Path,
        line: usize,
        col: usize,
        blocks: &mut Vec<String>,
    ) -> Result<(), CompileError> {
        if is_plain_css_import(spec) {
            blocks.push(format!("@import \"{spec}\";"));
            return Ok(());
        }

        let mut probes = BTreeSet::new();
        let resolution = resolver::resolve(spec, from, self.load_paths, &mut probes);
        let record = self.records.entry(from.to_path_buf()).or_default();
        record.potential.extend(probes);

        match resolution {
            Resolution::File(target) => {
                record.resolved.insert(target.clone());
                if self.stack.contains(&target) {
                    return Err(sc.error_at(line, col, "This file is already being loaded."));
                }
                if self.emitted.insert(target.clone()) {
                    let nested = self.compile_file(&target)?;
                    blocks.extend(nested);
                }
                Ok(())
            }
            Resolution::Ambiguous(candidates) => {
                let mut message = String::from("It's not clear which file to import. Found:");
                for candidate in candidates {
                    message.push_str(&format!("\n  {}", paths::display_rel(&candidate)));
                }
                Err(sc.error_at(line, col, message))
            }
            Resolution::NotFound => {
                Err(sc.error_at(line, col, "Can't find stylesheet to import."))
            }
        }
    }

    fn rule(
        &mut self,
        sc: &mut Scanner,
        parent: &str,
        blocks: &mut Vec<String>,
    ) -> Result<(), CompileError> {
        let raw_selector = sc.take_until_any(&['{', ';', '}']);
        if sc.peek() != Some('{') {
            return Err(sc.error("expected \"{\"."));
        }
        sc.bump();

        let selector = collapse_ws(&raw_selector);
        if selector.is_empty() {
            return Err(sc.error("expected selector."));
        }
        let combined = if parent.is_empty() {
            selector
        } else {
            format!("{parent} {selector}")
        };

        // Parent block slots in ahead of any nested blocks parsed below.
        let at = blocks.len();
        let mut decls: Vec<String> = Vec::new();
        loop {
            sc.skip_trivia()?;
            match sc.peek() {
                None => return Err(sc.error("expected \"}\".")),
                Some('}') => {
                    sc.bump();
                    break;
                }
                Some(_) => {
                    if sc.next_is_nested_rule() {
                        self.rule(sc, &combined, blocks)?;
                    } else {
                        decls.push(declaration(sc)?);
                    }
                }
            }
        }

        if !decls.is_empty() {
            blocks.insert(at, format!("{combined} {{\n{}\n}}", decls.join("\n")));
        }
        Ok(())
    }
}

fn declaration(sc: &mut Scanner) -> Result<String, CompileError> {
    let raw_prop = sc.take_until_any(&[':', ';', '}', '{']);
    if sc.peek() != Some(':') {
        return Err(sc.error("expected \":\"."));
    }
    let prop = collapse_ws(&raw_prop);
    if prop.is_empty() {
        return Err(sc.error("expected declaration."));
    }
    sc.bump(); // ':'

    let raw_value = sc.take_until_any(&[';', '}', '{']);
    if sc.peek() == Some('{') {
        return Err(sc.error("expected \";\"."));
    }
    let value = collapse_ws(&raw_value);
    if value.is_empty() {
        return Err(sc.error("Expected expression."));
    }
    if sc.peek() == Some(';') {
        sc.bump();
    }
    Ok(format!("  {prop}: {value};"))
}

fn collapse_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_plain_css_import(spec: &str) -> bool {
    spec.ends_with(".css")
        || spec.starts_with("http://")
        || spec.starts_with("https://")
        || spec.starts_with("//")
}

/// Character scanner with 1-based line/column tracking
struct Scanner {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    file: PathBuf,
    lines: Vec<String>,
}

impl Scanner {
    fn new(source: &str, file: &Path) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            file: file.to_path_buf(),
            lines: source.lines().map(String::from).collect(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn error(&self, message: impl Into<String>) -> CompileError {
        self.error_at(self.line, self.col, message)
    }

    fn error_at(&self, line: usize, col: usize, message: impl Into<String>) -> CompileError {
        CompileError::new(
            message,
            &self.file,
            line,
            col,
            self.lines.get(line - 1).cloned(),
        )
    }

    fn skip_trivia(&mut self) -> Result<(), CompileError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    let (line, col) = (self.line, self.col);
                    self.bump();
                    self.bump();
                    loop {
                        match self.peek() {
                            None => {
                                return Err(self.error_at(line, col, "expected \"*/\"."));
                            }
                            Some('*') if self.peek_at(1) == Some('/') => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            Some(_) => {
                                self.bump();
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn take_ident(&mut self) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                out.push(c);
                self.bump();
            } else {
                break;
            }
        }
        out
    }

    fn take_until_any(&mut self, stops: &[char]) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if stops.contains(&c) {
                break;
            }
            out.push(c);
            self.bump();
        }
        out
    }

    fn expect(&mut self, c: char) -> Result<(), CompileError> {
        if self.peek() == Some(c) {
            self.bump();
            Ok(())
        } else {
            Err(self.error(format!("expected \"{c}\".")))
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let kchars: Vec<char> = keyword.chars().collect();
        if !self.chars[self.pos..].starts_with(&kchars[..]) {
            return false;
        }
        let boundary = !matches!(
            self.peek_at(kchars.len()),
            Some(c) if c.is_alphanumeric() || c == '-' || c == '_'
        );
        if boundary {
            for _ in 0..kchars.len() {
                self.bump();
            }
            true
        } else {
            false
        }
    }

    fn quoted_string(&mut self) -> Result<(String, usize, usize), CompileError> {
        let (line, col) = (self.line, self.col);
        let quote = match self.peek() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(self.error("Expected string.")),
        };
        self.bump();
        let mut out = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => return Err(self.error("Expected closing quote.")),
                Some(c) if c == quote => {
                    self.bump();
                    break;
                }
                Some(c) => {
                    out.push(c);
                    self.bump();
                }
            }
        }
        Ok((out, line, col))
    }

    /// Decide declaration vs nested rule by which of `{`, `;`, `}` comes
    /// first, skipping quoted strings
    fn next_is_nested_rule(&self) -> bool {
        let mut i = self.pos;
        while i < self.chars.len() {
            match self.chars[i] {
                '{' => return true,
                ';' | '}' => return false,
                q @ ('"' | '\'') => {
                    i += 1;
                    while i < self.chars.len() && self.chars[i] != q {
                        i += 1;
                    }
                }
                _ => {}
            }
            i += 1;
        }
        false
    }
}
