// lexer.rs — Tokenizer for Rego source.
//
// Produces a flat token stream with line numbers. Comments are kept as
// tokens because METADATA annotation blocks live in them; newlines are
// kept because they terminate rule heads and body expressions.

use std::fmt;

use crate::error::{Diagnostic, ErrorKind};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Ident(String),
    /// Double-quoted string, escapes already decoded.
    String(String),
    /// Backtick string, verbatim.
    RawString(String),
    Number(String),
    /// Comment text after the `#`.
    Comment(String),
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Dot,
    Comma,
    Semicolon,
    Colon,
    /// `:=`
    Assign,
    /// `=`
    Unify,
    /// `==`
    Eq,
    /// `!=`
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Pipe,
    Amp,
    Newline,
    Eof,
}

impl TokenKind {
    /// Binary operators that may join two terms inside an expression.
    pub fn is_binary_operator(&self) -> bool {
        matches!(
            self,
            TokenKind::Assign
                | TokenKind::Unify
                | TokenKind::Eq
                | TokenKind::Neq
                | TokenKind::Lt
                | TokenKind::Lte
                | TokenKind::Gt
                | TokenKind::Gte
                | TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Star
                | TokenKind::Slash
                | TokenKind::Percent
                | TokenKind::Pipe
                | TokenKind::Amp
        )
    }

    pub fn is_ident(&self, name: &str) -> bool {
        matches!(self, TokenKind::Ident(s) if s == name)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Ident(s) | TokenKind::Number(s) => f.write_str(s),
            TokenKind::String(s) => write!(f, "{:?}", s),
            TokenKind::RawString(s) => write!(f, "`{}`", s),
            TokenKind::Comment(s) => write!(f, "#{}", s),
            TokenKind::LBrace => f.write_str("{"),
            TokenKind::RBrace => f.write_str("}"),
            TokenKind::LBracket => f.write_str("["),
            TokenKind::RBracket => f.write_str("]"),
            TokenKind::LParen => f.write_str("("),
            TokenKind::RParen => f.write_str(")"),
            TokenKind::Dot => f.write_str("."),
            TokenKind::Comma => f.write_str(","),
            TokenKind::Semicolon => f.write_str(";"),
            TokenKind::Colon => f.write_str(":"),
            TokenKind::Assign => f.write_str(":="),
            TokenKind::Unify => f.write_str("="),
            TokenKind::Eq => f.write_str("=="),
            TokenKind::Neq => f.write_str("!="),
            TokenKind::Lt => f.write_str("<"),
            TokenKind::Lte => f.write_str("<="),
            TokenKind::Gt => f.write_str(">"),
            TokenKind::Gte => f.write_str(">="),
            TokenKind::Plus => f.write_str("+"),
            TokenKind::Minus => f.write_str("-"),
            TokenKind::Star => f.write_str("*"),
            TokenKind::Slash => f.write_str("/"),
            TokenKind::Percent => f.write_str("%"),
            TokenKind::Pipe => f.write_str("|"),
            TokenKind::Amp => f.write_str("&"),
            TokenKind::Newline => f.write_str("\\n"),
            TokenKind::Eof => f.write_str("EOF"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

/// Tokenize a module. The returned stream always ends with `Eof`.
pub fn tokenize(file: &str, source: &str) -> Result<Vec<Token>, Diagnostic> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut i = 0;

    let error = |line: usize, message: String| Diagnostic::new(ErrorKind::Parse, file, line, message);

    while i < chars.len() {
        let c = chars[i];
        let start_line = line;
        let mut push = |kind: TokenKind, width: usize, i: &mut usize| {
            tokens.push(Token {
                kind,
                line: start_line,
            });
            *i += width;
        };

        match c {
            '\n' => {
                push(TokenKind::Newline, 1, &mut i);
                line += 1;
            }
            ' ' | '\t' | '\r' => i += 1,
            '#' => {
                let end = chars[i..]
                    .iter()
                    .position(|&ch| ch == '\n')
                    .map_or(chars.len(), |p| i + p);
                let text: String = chars[i + 1..end].iter().collect();
                push(TokenKind::Comment(text), end - i, &mut i);
            }
            '"' => {
                let mut value = String::new();
                let mut j = i + 1;
                loop {
                    match chars.get(j) {
                        None | Some('\n') => {
                            return Err(error(start_line, "non-terminated string".to_string()))
                        }
                        Some('"') => break,
                        Some('\\') => {
                            let escaped = match chars.get(j + 1) {
                                Some('n') => '\n',
                                Some('t') => '\t',
                                Some('r') => '\r',
                                Some('b') => '\u{8}',
                                Some('f') => '\u{c}',
                                Some('"') => '"',
                                Some('\\') => '\\',
                                Some('/') => '/',
                                Some('u') => {
                                    let (decoded, width) = unicode_escape(&chars, j)
                                        .map_err(|message| error(start_line, message))?;
                                    value.push(decoded);
                                    j += width;
                                    continue;
                                }
                                Some(other) => {
                                    return Err(error(
                                        start_line,
                                        format!("illegal escape sequence \\{}", other),
                                    ))
                                }
                                None => {
                                    return Err(error(start_line, "non-terminated string".to_string()))
                                }
                            };
                            value.push(escaped);
                            j += 2;
                        }
                        Some(&ch) => {
                            value.push(ch);
                            j += 1;
                        }
                    }
                }
                push(TokenKind::String(value), j + 1 - i, &mut i);
            }
            '`' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&ch| ch == '`')
                    .map(|p| i + 1 + p)
                    .ok_or_else(|| error(start_line, "non-terminated raw string".to_string()))?;
                let text: String = chars[i + 1..end].iter().collect();
                let newlines = text.matches('\n').count();
                push(TokenKind::RawString(text), end + 1 - i, &mut i);
                line += newlines;
            }
            c if c.is_ascii_digit() => {
                let end = scan_while(&chars, i, |ch| {
                    ch.is_ascii_alphanumeric() || ch == '.' || ch == '_'
                });
                let text: String = chars[i..end].iter().collect();
                push(TokenKind::Number(text), end - i, &mut i);
            }
            c if c.is_alphabetic() || c == '_' => {
                let end = scan_while(&chars, i, |ch| ch.is_alphanumeric() || ch == '_');
                let text: String = chars[i..end].iter().collect();
                push(TokenKind::Ident(text), end - i, &mut i);
            }
            _ => {
                let next = chars.get(i + 1).copied();
                let (kind, width) = match (c, next) {
                    (':', Some('=')) => (TokenKind::Assign, 2),
                    ('=', Some('=')) => (TokenKind::Eq, 2),
                    ('!', Some('=')) => (TokenKind::Neq, 2),
                    ('<', Some('=')) => (TokenKind::Lte, 2),
                    ('>', Some('=')) => (TokenKind::Gte, 2),
                    ('{', _) => (TokenKind::LBrace, 1),
                    ('}', _) => (TokenKind::RBrace, 1),
                    ('[', _) => (TokenKind::LBracket, 1),
                    (']', _) => (TokenKind::RBracket, 1),
                    ('(', _) => (TokenKind::LParen, 1),
                    (')', _) => (TokenKind::RParen, 1),
                    ('.', _) => (TokenKind::Dot, 1),
                    (',', _) => (TokenKind::Comma, 1),
                    (';', _) => (TokenKind::Semicolon, 1),
                    (':', _) => (TokenKind::Colon, 1),
                    ('=', _) => (TokenKind::Unify, 1),
                    ('<', _) => (TokenKind::Lt, 1),
                    ('>', _) => (TokenKind::Gt, 1),
                    ('+', _) => (TokenKind::Plus, 1),
                    ('-', _) => (TokenKind::Minus, 1),
                    ('*', _) => (TokenKind::Star, 1),
                    ('/', _) => (TokenKind::Slash, 1),
                    ('%', _) => (TokenKind::Percent, 1),
                    ('|', _) => (TokenKind::Pipe, 1),
                    ('&', _) => (TokenKind::Amp, 1),
                    _ => return Err(error(start_line, format!("illegal token '{}'", c))),
                };
                push(kind, width, &mut i);
            }
        }
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        line,
    });
    Ok(tokens)
}

fn scan_while(chars: &[char], start: usize, pred: impl Fn(char) -> bool) -> usize {
    let mut end = start;
    while end < chars.len() && pred(chars[end]) {
        end += 1;
    }
    end
}

/// Decodes a `\uXXXX` escape starting at the backslash, joining a
/// UTF-16 surrogate pair when a low surrogate escape follows. Returns the
/// character and the number of source chars consumed.
fn unicode_escape(chars: &[char], start: usize) -> Result<(char, usize), String> {
    let high = hex4(chars, start + 2)?;
    if !(0xD800..0xDC00).contains(&high) {
        let decoded = char::from_u32(high)
            .ok_or_else(|| format!("invalid unicode escape \\u{:04x}", high))?;
        return Ok((decoded, 6));
    }

    let low = match (chars.get(start + 6), chars.get(start + 7)) {
        (Some('\\'), Some('u')) => hex4(chars, start + 8)?,
        _ => return Err(format!("unpaired surrogate \\u{:04x}", high)),
    };
    if !(0xDC00..0xE000).contains(&low) {
        return Err(format!("unpaired surrogate \\u{:04x}", high));
    }
    let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
    let decoded =
        char::from_u32(code).ok_or_else(|| format!("invalid unicode escape \\u{:04x}", high))?;
    Ok((decoded, 12))
}

fn hex4(chars: &[char], start: usize) -> Result<u32, String> {
    let digits: String = chars.iter().skip(start).take(4).collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("illegal escape sequence \\u{}", digits));
    }
    u32::from_str_radix(&digits, 16).map_err(|e| e.to_string())
}
