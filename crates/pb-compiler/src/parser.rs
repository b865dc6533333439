// parser.rs — Module parser.
//
// Parses the statement structure of a module: the package clause,
// imports and rule heads. Rule values and bodies are scanned as balanced
// token spans and then mined for call sites and references. A module
// stops at its first parse error.

use crate::annotations::{self, Annotations};
use crate::ast::{CallSite, Import, Module, Reference, Rule, RuleKind, FUTURE_KEYWORDS};
use crate::check::NETWORK_BUILTINS;
use crate::error::{Diagnostic, ErrorKind};
use crate::lexer::{tokenize, Token, TokenKind};

const IMPORT_ROOTS: &[&str] = &["data", "future", "input", "rego"];

/// Words that never start a rule reference.
const RESERVED: &[&str] = &[
    "as", "contains", "default", "else", "every", "false", "if", "import", "in", "input", "not",
    "null", "package", "some", "true", "with", "_",
];

/// Parse one module.
pub fn parse_module(file: &str, source: &str) -> Result<Module, Diagnostic> {
    let tokens = tokenize(file, source)?;
    Parser {
        file,
        tokens,
        pos: 0,
        pending: None,
        keywords: Vec::new(),
        rego_v1: false,
    }
    .parse(source)
}

struct Parser<'a> {
    file: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    /// Annotations waiting for the next statement.
    pending: Option<Annotations>,
    keywords: Vec<String>,
    rego_v1: bool,
}

impl<'a> Parser<'a> {
    fn parse(mut self, source: &str) -> Result<Module, Diagnostic> {
        self.skip_trivia()?;
        if !self.peek().is_ident("package") {
            return Err(self.error(self.line(), "package expected"));
        }
        let package_line = self.line();
        self.bump();
        let package = self.parse_ref()?;
        if package.first().map(String::as_str) == Some("data") && package.len() > 1 {
            return Err(self.error(package_line, "package path must not start with data"));
        }
        let package_annotations = self.pending.take();
        self.end_statement()?;

        let mut imports = Vec::new();
        let mut rules = Vec::new();

        loop {
            self.skip_trivia()?;
            let token = self.peek_token().clone();
            match &token.kind {
                TokenKind::Eof => break,
                k if k.is_ident("package") => {
                    return Err(self.error(token.line, "unexpected package statement"));
                }
                k if k.is_ident("import") => imports.push(self.parse_import()?),
                TokenKind::Ident(_) => rules.push(self.parse_rule()?),
                other => {
                    return Err(self.error(token.line, format!("unexpected {} token", other)));
                }
            }
        }

        Ok(Module {
            file: self.file.to_string(),
            package,
            package_line,
            package_annotations,
            imports,
            rules,
            rego_v1: self.rego_v1,
            keywords: self.keywords,
            source: source.to_string(),
        })
    }

    // ── token helpers ───────────────────────────────────────────────

    fn peek_token(&self) -> &Token {
        // The stream always ends with Eof and `pos` never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &TokenKind {
        &self.peek_token().kind
    }

    fn peek_nth(&self, n: usize) -> &TokenKind {
        &self.tokens[(self.pos + n).min(self.tokens.len() - 1)].kind
    }

    fn line(&self) -> usize {
        self.peek_token().line
    }

    fn bump(&mut self) -> Token {
        let token = self.peek_token().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error(&self, line: usize, message: impl Into<String>) -> Diagnostic {
        Diagnostic::new(ErrorKind::Parse, self.file, line, message)
    }

    fn unexpected(&self) -> Diagnostic {
        self.error(self.line(), format!("unexpected {} token", self.peek()))
    }

    fn expect_ident(&mut self) -> Result<String, Diagnostic> {
        match self.peek().clone() {
            TokenKind::Ident(name) => {
                self.bump();
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn keyword_enabled(&self, keyword: &str) -> bool {
        self.rego_v1 || self.keywords.iter().any(|k| k == keyword)
    }

    fn require_keyword(&self, keyword: &str, line: usize) -> Result<(), Diagnostic> {
        if self.keyword_enabled(keyword) {
            Ok(())
        } else {
            Err(self.error(
                line,
                format!(
                    "unexpected {} keyword: import future.keywords.{} or rego.v1 to use it",
                    keyword, keyword
                ),
            ))
        }
    }

    /// Skip blank lines, separators and comments between statements,
    /// collecting METADATA blocks for the next statement.
    fn skip_trivia(&mut self) -> Result<(), Diagnostic> {
        // (marker line, last line, yaml lines)
        let mut block: Option<(usize, usize, Vec<String>)> = None;
        loop {
            let token = self.peek_token().clone();
            match &token.kind {
                TokenKind::Newline | TokenKind::Semicolon => {
                    self.bump();
                }
                TokenKind::Comment(text) => {
                    self.bump();
                    let marker = annotations::is_metadata_marker(text);
                    if let Some((_, last, lines)) = block.as_mut() {
                        if token.line == *last + 1 && !marker {
                            lines.push(text.clone());
                            *last = token.line;
                            continue;
                        }
                        self.finish_block(block.take())?;
                    }
                    if marker {
                        block = Some((token.line, token.line, Vec::new()));
                    }
                }
                _ => break,
            }
        }
        self.finish_block(block)
    }

    fn finish_block(&mut self, block: Option<(usize, usize, Vec<String>)>) -> Result<(), Diagnostic> {
        if let Some((line, _, lines)) = block {
            self.pending = Some(annotations::parse_block(self.file, line, &lines)?);
        }
        Ok(())
    }

    fn end_statement(&mut self) -> Result<(), Diagnostic> {
        while let TokenKind::Comment(_) = self.peek() {
            self.bump();
        }
        match self.peek() {
            TokenKind::Newline | TokenKind::Semicolon | TokenKind::Eof => Ok(()),
            _ => Err(self.unexpected()),
        }
    }

    /// `a.b["c"].d` → `["a", "b", "c", "d"]`
    fn parse_ref(&mut self) -> Result<Vec<String>, Diagnostic> {
        let mut segments = vec![self.expect_ident()?];
        loop {
            match (self.peek().clone(), self.peek_nth(1).clone()) {
                (TokenKind::Dot, TokenKind::Ident(s)) => {
                    self.bump();
                    self.bump();
                    segments.push(s);
                }
                (TokenKind::LBracket, TokenKind::String(s))
                    if *self.peek_nth(2) == TokenKind::RBracket =>
                {
                    self.bump();
                    self.bump();
                    self.bump();
                    segments.push(s);
                }
                (TokenKind::Dot, _) => {
                    self.bump();
                    return Err(self.unexpected());
                }
                _ => return Ok(segments),
            }
        }
    }

    // ── imports ─────────────────────────────────────────────────────

    fn parse_import(&mut self) -> Result<Import, Diagnostic> {
        let line = self.bump().line;
        let path = self.parse_ref()?;
        let alias = if self.peek().is_ident("as") {
            self.bump();
            Some(self.expect_ident()?)
        } else {
            None
        };

        let root = path[0].as_str();
        if !IMPORT_ROOTS.contains(&root) {
            return Err(self.error(
                line,
                format!(
                    "unexpected import path, must begin with one of: {{{}}}, got: {}",
                    IMPORT_ROOTS.join(", "),
                    root
                ),
            ));
        }

        match root {
            "future" => {
                if path.get(1).map(String::as_str) != Some("keywords") || path.len() > 3 {
                    return Err(self.error(
                        line,
                        format!("invalid import {}, must be future.keywords[.<keyword>]", path.join(".")),
                    ));
                }
                match path.get(2) {
                    None => self.keywords.extend(FUTURE_KEYWORDS.iter().map(|k| k.to_string())),
                    Some(kw) if FUTURE_KEYWORDS.contains(&kw.as_str()) => self.keywords.push(kw.clone()),
                    Some(kw) => {
                        return Err(self.error(
                            line,
                            format!("unexpected keyword {}, must be one of [{}]", kw, FUTURE_KEYWORDS.join(" ")),
                        ))
                    }
                }
            }
            "rego" => {
                if path.len() != 2 || path[1] != "v1" {
                    return Err(self.error(
                        line,
                        format!("invalid import {}, must be rego.v1", path.join(".")),
                    ));
                }
                self.rego_v1 = true;
            }
            _ => {}
        }

        self.end_statement()?;
        Ok(Import { path, alias, line })
    }

    // ── rules ───────────────────────────────────────────────────────

    fn parse_rule(&mut self) -> Result<Rule, Diagnostic> {
        let annotations = self.pending.take();
        let line = self.line();
        let is_default = if self.peek().is_ident("default") {
            self.bump();
            true
        } else {
            false
        };

        let name = self.expect_ident()?;
        if RESERVED.contains(&name.as_str()) {
            return Err(self.error(line, format!("unexpected {} keyword", name)));
        }

        let mut spans: Vec<Token> = Vec::new();
        let mut locals: Vec<String> = Vec::new();
        let mut kind = RuleKind::Complete;
        let mut head_ref = self.scan_head_ref()?;

        match self.peek().clone() {
            TokenKind::LParen if !head_ref.is_empty() => {
                return Err(self.error(
                    line,
                    format!("ref heads are not supported on functions: {}.{}", name, head_ref.join(".")),
                ));
            }
            TokenKind::LParen => {
                let args = self.scan_delimited(TokenKind::LParen, TokenKind::RParen)?;
                kind = RuleKind::Function {
                    arity: count_args(&args),
                };
                locals.extend(idents(&args));
                spans.extend(args);
            }
            TokenKind::LBracket => {
                let key = self.scan_delimited(TokenKind::LBracket, TokenKind::RBracket)?;
                if key.iter().all(|t| t.kind == TokenKind::Newline) {
                    return Err(self.error(line, "rule key must not be empty"));
                }
                kind = if matches!(self.peek(), TokenKind::Unify | TokenKind::Assign) {
                    RuleKind::PartialObject
                } else {
                    RuleKind::PartialSet
                };
                locals.extend(idents(&key));
                spans.extend(key);
                // `fruit[name].color := …`
                let tail = self.scan_head_ref()?;
                if !tail.is_empty() {
                    head_ref.push("[]".to_string());
                    head_ref.extend(tail);
                }
            }
            TokenKind::Ident(kw) if kw == "contains" && *self.peek_nth(1) != TokenKind::LParen => {
                self.require_keyword("contains", self.line())?;
                self.bump();
                let term = self.scan_expr()?;
                if term.is_empty() {
                    return Err(self.error(line, "expected term after contains"));
                }
                kind = RuleKind::PartialSet;
                locals.extend(idents(&term));
                spans.extend(term);
            }
            _ => {}
        }

        let mut has_value = false;
        if matches!(self.peek(), TokenKind::Unify | TokenKind::Assign) {
            self.bump();
            let value = self.scan_expr()?;
            if value.is_empty() {
                return Err(self.error(self.line(), format!("rule {} has an empty value", name)));
            }
            has_value = true;
            spans.extend(value);
        }

        if is_default {
            if !has_value {
                return Err(self.error(line, format!("default rule {} must have a value", name)));
            }
            self.end_statement()?;
        } else {
            let has_body = self.parse_body(&mut spans)?;
            if !has_value && !has_body && matches!(kind, RuleKind::Complete | RuleKind::Function { .. }) {
                return Err(self.error(line, format!("rule {} must have a value or a body", name)));
            }
            if has_body {
                self.parse_else_chain(&name, kind, &mut spans)?;
            }
            self.end_statement()?;
        }

        self.check_keywords(&spans)?;
        locals.extend(bound_locals(&spans));
        let (calls, refs) = analyze(&spans, &locals);

        // A ref head defines keys inside the object named by its first segment.
        if !head_ref.is_empty() {
            kind = RuleKind::PartialObject;
        }

        Ok(Rule {
            name,
            head_ref,
            kind,
            is_default,
            line,
            annotations,
            calls,
            refs,
        })
    }

    /// Parse an optional `if` and body. Returns whether a body was present.
    fn parse_body(&mut self, spans: &mut Vec<Token>) -> Result<bool, Diagnostic> {
        let has_if = self.peek().is_ident("if");
        if has_if {
            self.require_keyword("if", self.line())?;
            self.bump();
        }

        if *self.peek() == TokenKind::LBrace {
            let line = self.line();
            let body = self.scan_delimited(TokenKind::LBrace, TokenKind::RBrace)?;
            if body
                .iter()
                .all(|t| matches!(t.kind, TokenKind::Newline | TokenKind::Semicolon))
            {
                return Err(self.error(line, "found empty body"));
            }
            spans.extend(body);
            Ok(true)
        } else if has_if {
            let line = self.line();
            let body = self.scan_expr()?;
            if body.is_empty() {
                return Err(self.error(line, "expected rule body after if"));
            }
            spans.extend(body);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn parse_else_chain(&mut self, name: &str, kind: RuleKind, spans: &mut Vec<Token>) -> Result<(), Diagnostic> {
        loop {
            // `else` may start on the line after the closing brace.
            let mut n = 0;
            while matches!(self.peek_nth(n), TokenKind::Newline | TokenKind::Comment(_)) {
                n += 1;
            }
            if !self.peek_nth(n).is_ident("else") {
                return Ok(());
            }
            for _ in 0..n {
                self.bump();
            }
            let line = self.bump().line;

            if matches!(kind, RuleKind::PartialSet | RuleKind::PartialObject) {
                return Err(self.error(line, format!("else keyword cannot be used on partial rule {}", name)));
            }
            if matches!(self.peek(), TokenKind::Unify | TokenKind::Assign) {
                self.bump();
                let value = self.scan_expr()?;
                if value.is_empty() {
                    return Err(self.error(line, "else has an empty value"));
                }
                spans.extend(value);
            }
            if !self.parse_body(spans)? {
                // A bare `else = v` terminates the chain.
                return Ok(());
            }
        }
    }

    /// Consume the `.a.b` tail of a ref head and return its segments.
    fn scan_head_ref(&mut self) -> Result<Vec<String>, Diagnostic> {
        let mut segments = Vec::new();
        while *self.peek() == TokenKind::Dot {
            self.bump();
            segments.push(self.expect_ident()?);
        }
        Ok(segments)
    }

    /// Consume `open … close` and return the tokens strictly between them.
    fn scan_delimited(&mut self, open: TokenKind, close: TokenKind) -> Result<Vec<Token>, Diagnostic> {
        let start = self.line();
        if *self.peek() != open {
            return Err(self.unexpected());
        }
        self.bump();
        let mut depth = 0usize;
        let mut out = Vec::new();
        loop {
            let token = self.bump();
            match &token.kind {
                TokenKind::Eof => {
                    return Err(self.error(start, format!("unexpected eof token: {} not closed", open)))
                }
                TokenKind::Comment(_) => {}
                k if *k == close && depth == 0 => return Ok(out),
                TokenKind::LBrace | TokenKind::LBracket | TokenKind::LParen => {
                    depth += 1;
                    out.push(token);
                }
                TokenKind::RBrace | TokenKind::RBracket | TokenKind::RParen => {
                    if depth == 0 {
                        return Err(self.error(token.line, format!("unexpected {} token", token.kind)));
                    }
                    depth -= 1;
                    out.push(token);
                }
                _ => out.push(token),
            }
        }
    }

    /// Scan one expression: a rule value, a `contains` term or an
    /// `if` body without braces.
    ///
    /// Stops at a top-level newline (unless the line ends in an operator
    /// or comma), `;`, `if`, `else`, or a `{` that follows a complete term.
    /// The term after `with … as` may be an object or set literal.
    fn scan_expr(&mut self) -> Result<Vec<Token>, Diagnostic> {
        let mut depth = 0usize;
        let mut out: Vec<Token> = Vec::new();
        loop {
            let token = self.peek_token().clone();
            match &token.kind {
                TokenKind::Eof => {
                    if depth > 0 {
                        return Err(self.error(token.line, "unexpected eof token"));
                    }
                    return Ok(out);
                }
                TokenKind::Comment(_) => {
                    self.bump();
                }
                TokenKind::Newline if depth > 0 => {
                    self.bump();
                }
                TokenKind::Newline => {
                    if out.last().is_some_and(continues_line) {
                        self.bump();
                    } else {
                        return Ok(out);
                    }
                }
                TokenKind::Semicolon if depth == 0 => return Ok(out),
                k if depth == 0 && (k.is_ident("if") || k.is_ident("else")) => return Ok(out),
                TokenKind::LBrace if depth == 0 && out.last().is_some_and(|t| !continues_line(t)) => {
                    return Ok(out);
                }
                TokenKind::LBrace | TokenKind::LBracket | TokenKind::LParen => {
                    depth += 1;
                    out.push(self.bump());
                }
                TokenKind::RBrace | TokenKind::RBracket | TokenKind::RParen => {
                    if depth == 0 {
                        return Err(self.unexpected());
                    }
                    depth -= 1;
                    out.push(self.bump());
                }
                _ => out.push(self.bump()),
            }
        }
    }

    /// Future keywords in values and bodies must have been imported.
    fn check_keywords(&self, tokens: &[Token]) -> Result<(), Diagnostic> {
        for (i, token) in tokens.iter().enumerate() {
            if let TokenKind::Ident(word) = &token.kind {
                let followed_by_call = tokens.get(i + 1).map(|t| &t.kind) == Some(&TokenKind::LParen);
                let after_dot = i > 0 && tokens[i - 1].kind == TokenKind::Dot;
                if FUTURE_KEYWORDS.contains(&word.as_str()) && !followed_by_call && !after_dot {
                    self.require_keyword(word, token.line)?;
                }
            }
        }
        Ok(())
    }
}

fn continues_line(token: &Token) -> bool {
    token.kind.is_binary_operator()
        || matches!(
            token.kind,
            TokenKind::Comma | TokenKind::Dot | TokenKind::Colon | TokenKind::LBrace | TokenKind::LBracket | TokenKind::LParen
        )
        || token.kind.is_ident("in")
        || token.kind.is_ident("as")
        || token.kind.is_ident("not")
}

/// Number of top-level comma-separated items in a delimited span.
fn count_args(tokens: &[Token]) -> usize {
    let mut depth = 0usize;
    let mut commas = 0;
    let mut any = false;
    for token in tokens {
        match token.kind {
            TokenKind::Newline => continue,
            TokenKind::LBrace | TokenKind::LBracket | TokenKind::LParen => depth += 1,
            TokenKind::RBrace | TokenKind::RBracket | TokenKind::RParen => depth = depth.saturating_sub(1),
            TokenKind::Comma if depth == 0 => commas += 1,
            _ => {}
        }
        any = true;
    }
    if any {
        commas + 1
    } else {
        0
    }
}

fn idents(tokens: &[Token]) -> impl Iterator<Item = String> + '_ {
    tokens.iter().filter_map(|t| match &t.kind {
        TokenKind::Ident(name) if !RESERVED.contains(&name.as_str()) => Some(name.clone()),
        _ => None,
    })
}

/// Variables bound inside a body: `x := …`, `some x, y`, `every k, v in`.
fn bound_locals(tokens: &[Token]) -> Vec<String> {
    let mut locals = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i].kind {
            TokenKind::Ident(name) if tokens.get(i + 1).map(|t| &t.kind) == Some(&TokenKind::Assign) => {
                locals.push(name.clone());
            }
            k if k.is_ident("some") || k.is_ident("every") => {
                let mut j = i + 1;
                while let Some(token) = tokens.get(j) {
                    match &token.kind {
                        TokenKind::Ident(name) if name != "in" => locals.push(name.clone()),
                        TokenKind::Comma => {}
                        _ => break,
                    }
                    j += 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    locals
}

/// Extract call sites and rule references from a token span.
fn analyze(tokens: &[Token], locals: &[String]) -> (Vec<CallSite>, Vec<Reference>) {
    let mut calls = Vec::new();
    let mut refs = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        let first = match &tokens[i].kind {
            TokenKind::Ident(name) if i == 0 || tokens[i - 1].kind != TokenKind::Dot => name.clone(),
            _ => {
                i += 1;
                continue;
            }
        };
        let line = tokens[i].line;
        let mut segments = vec![first];
        let mut j = i + 1;
        loop {
            match (tokens.get(j).map(|t| &t.kind), tokens.get(j + 1).map(|t| &t.kind)) {
                (Some(TokenKind::Dot), Some(TokenKind::Ident(s))) => {
                    segments.push(s.clone());
                    j += 2;
                }
                (Some(TokenKind::LBracket), Some(TokenKind::String(s)))
                    if tokens.get(j + 2).map(|t| &t.kind) == Some(&TokenKind::RBracket) =>
                {
                    segments.push(s.clone());
                    j += 3;
                }
                _ => break,
            }
        }

        if tokens.get(j).map(|t| &t.kind) == Some(&TokenKind::LParen) {
            let name = segments.join(".");
            let args = delimited_after(tokens, j);
            let host = if NETWORK_BUILTINS.contains(&name.as_str()) {
                literal_host(args)
            } else {
                None
            };
            calls.push(CallSite {
                name,
                arg_count: count_args(args),
                line,
                host,
            });
        } else if !RESERVED.contains(&segments[0].as_str()) && !locals.contains(&segments[0]) {
            refs.push(Reference { segments, line });
        }
        i = j;
    }

    (calls, refs)
}

/// Tokens between the delimiter at `open` and its match.
fn delimited_after(tokens: &[Token], open: usize) -> &[Token] {
    let mut depth = 0usize;
    for (k, token) in tokens.iter().enumerate().skip(open) {
        match token.kind {
            TokenKind::LBrace | TokenKind::LBracket | TokenKind::LParen => depth += 1,
            TokenKind::RBrace | TokenKind::RBracket | TokenKind::RParen => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return &tokens[open + 1..k];
                }
            }
            _ => {}
        }
    }
    &tokens[(open + 1).min(tokens.len())..]
}

/// Host from a literal first argument: `"https://h/x"`, `"h"` or `{"url": "…"}`.
fn literal_host(args: &[Token]) -> Option<String> {
    let mut it = args.iter().filter(|t| t.kind != TokenKind::Newline);
    match it.next().map(|t| &t.kind) {
        Some(TokenKind::String(s)) | Some(TokenKind::RawString(s)) => Some(host_of(s)),
        Some(TokenKind::LBrace) => {
            let inner: Vec<&TokenKind> = it.map(|t| &t.kind).collect();
            inner.windows(3).find_map(|w| match (w[0], w[1], w[2]) {
                (TokenKind::String(k), TokenKind::Colon, TokenKind::String(v)) if k == "url" => {
                    Some(host_of(v))
                }
                _ => None,
            })
        }
        _ => None,
    }
}

/// `https://user@api.example.com:8443/path` → `api.example.com`
pub(crate) fn host_of(url: &str) -> String {
    let rest = url.split_once("://").map_or(url, |(_, r)| r);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    if let Some(bracketed) = host_port.strip_prefix('[') {
        return bracketed.split(']').next().unwrap_or(bracketed).to_string();
    }
    match host_port.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host.to_string(),
        _ => host_port.to_string(),
    }
}
