//! # WorkerScript Lexer
//!
//! Tokenizes WorkerScript source one line at a time.
//!
//! ## Features
//!
//! - **Numeric literals**: decimal (`123`) and hex (`0x3000`, `0XFF`),
//!   masked into a signed 16-bit value. A leading minus is never part of
//!   the literal — it always lexes as a separate `Minus` token so that
//!   `A=3-5` tokenizes as `3 Minus 5`, not `3 -5`, matching the grammar's
//!   unary-minus prefix operator.
//! - **String literals**: `"like this"`, with `""` as an escaped quote.
//! - **Character literals**: exactly `'x'`, valued at the ASCII code of `x`.
//! - **Comments**: `:` runs to the end of the line.
//! - **Labels**: `^NAME` lexes to a single `LabelDef` token, reused by the
//!   parser both for label *definitions* (leading position on a line) and
//!   for GOTO/GOSUB jump *targets* — the source grammar never needs two
//!   token kinds for the same `^NAME` spelling.
//! - **Identifiers**: single uppercase letters A–Z. A lowercase letter
//!   outside a string or character literal is a lex error.
//! - **Operators**: two-character operators (`>=`, `<=`, `<>`) are matched
//!   greedily before their single-character prefixes.

pub mod cursor;
pub mod token;


use crate::error::LexError;
use cursor::Cursor;
use token::{Token, TokenKind};

/// Tokenize a single source line (no trailing newline in `line`).
///
/// Returns the token stream for that line, always terminated by `Eof`.
pub fn tokenize_line(line: &str, line_no: usize) -> Result<Vec<Token>, LexError> {
    let mut cursor = Cursor::new(line, line_no);
    let mut tokens = Vec::new();

    loop {
        skip_spaces(&mut cursor);
        if cursor.is_at_end() {
            break;
        }
        let (l, c) = (cursor.line(), cursor.col());
        let ch = cursor.peek().unwrap();

        if ch == ':' {
            let text: String = std::iter::from_fn(|| cursor.advance()).collect();
            tokens.push(Token::new(TokenKind::Comment(text.clone()), text, l, c));
            break;
        }

        let token = lex_one(&mut cursor, l, c)?;
        tokens.push(token);
    }

    let (l, c) = (cursor.line(), cursor.col());
    tokens.push(Token::new(TokenKind::Eof, "", l, c));
    Ok(tokens)
}

/// Tokenize every line of a full source text, LF-delimited (CRLF tolerated).
///
/// Returns one token stream per source line, 1-indexed by position in the
/// returned vector (`lines[0]` is source line 1).
pub fn tokenize_program(source: &str) -> (Vec<Vec<Token>>, Vec<LexError>) {
    let mut lines = Vec::new();
    let mut errors = Vec::new();

    for (i, raw_line) in source.lines().enumerate() {
        let line_no = i + 1;
        match tokenize_line(raw_line, line_no) {
            Ok(tokens) => lines.push(tokens),
            Err(err) => {
                errors.push(err);
                lines.push(vec![Token::new(TokenKind::Eof, "", line_no, 1)]);
            }
        }
    }

    (lines, errors)
}

fn skip_spaces(cursor: &mut Cursor) {
    while matches!(cursor.peek(), Some(' ' | '\t')) {
        cursor.advance();
    }
}

fn lex_one(cursor: &mut Cursor, l: usize, c: usize) -> Result<Token, LexError> {
    let ch = cursor.peek().unwrap();

    macro_rules! single {
        ($kind:expr) => {{
            let ch = cursor.advance().unwrap();
            Ok(Token::new($kind, ch.to_string(), l, c))
        }};
    }

    match ch {
        '"' => lex_string(cursor, l, c),
        '\'' => lex_char_literal(cursor, l, c),
        '^' => lex_label(cursor, l, c),
        '0' if matches!(cursor.peek_at(1), Some('x' | 'X')) => lex_hex(cursor, l, c),
        _ if ch.is_ascii_digit() => lex_decimal(cursor, l, c),
        _ if ch.is_ascii_uppercase() => {
            cursor.advance();
            Ok(Token::new(TokenKind::Identifier(ch), ch.to_string(), l, c))
        }
        _ if ch.is_ascii_lowercase() => Err(LexError::new(
            l,
            format!("illegal lowercase identifier '{}' (identifiers are A-Z)", ch),
        )),
        '>' if cursor.peek_at(1) == Some('=') => {
            cursor.advance();
            cursor.advance();
            Ok(Token::new(TokenKind::GreaterEqual, ">=", l, c))
        }
        '<' if cursor.peek_at(1) == Some('=') => {
            cursor.advance();
            cursor.advance();
            Ok(Token::new(TokenKind::LessEqual, "<=", l, c))
        }
        '<' if cursor.peek_at(1) == Some('>') => {
            cursor.advance();
            cursor.advance();
            Ok(Token::new(TokenKind::NotEqual, "<>", l, c))
        }
        '+' => single!(TokenKind::Plus),
        '-' => single!(TokenKind::Minus),
        '*' => single!(TokenKind::Star),
        '/' => single!(TokenKind::Slash),
        '%' => single!(TokenKind::Percent),
        '=' => single!(TokenKind::Equal),
        '>' => single!(TokenKind::Greater),
        '<' => single!(TokenKind::Less),
        '&' => single!(TokenKind::Amp),
        '|' => single!(TokenKind::Pipe),
        '!' => single!(TokenKind::Bang),
        '?' => single!(TokenKind::Question),
        ';' => single!(TokenKind::Semicolon),
        '#' => single!(TokenKind::Hash),
        '[' => single!(TokenKind::LBracket),
        ']' => single!(TokenKind::RBracket),
        '@' => single!(TokenKind::At),
        ',' => single!(TokenKind::Comma),
        '(' => single!(TokenKind::LParen),
        ')' => single!(TokenKind::RParen),
        '$' => single!(TokenKind::Dollar),
        '~' => single!(TokenKind::Tilde),
        '`' => single!(TokenKind::Backtick),
        other => {
            cursor.advance();
            Err(LexError::new(l, format!("illegal character: '{}'", other)))
        }
    }
}

fn lex_string(cursor: &mut Cursor, l: usize, c: usize) -> Result<Token, LexError> {
    cursor.advance(); // opening quote
    let mut value = String::new();
    let mut raw = String::from("\"");

    loop {
        match cursor.peek() {
            None => return Err(LexError::new(l, "unterminated string literal")),
            Some('"') => {
                if cursor.peek_at(1) == Some('"') {
                    cursor.advance();
                    cursor.advance();
                    value.push('"');
                    raw.push_str("\"\"");
                } else {
                    cursor.advance();
                    raw.push('"');
                    break;
                }
            }
            Some(ch) => {
                cursor.advance();
                value.push(ch);
                raw.push(ch);
            }
        }
    }

    Ok(Token::new(TokenKind::Str(value), raw, l, c))
}

fn lex_char_literal(cursor: &mut Cursor, l: usize, c: usize) -> Result<Token, LexError> {
    cursor.advance(); // opening quote
    let inner = cursor.peek().ok_or_else(|| LexError::new(l, "unterminated character literal"))?;
    cursor.advance();
    match cursor.peek() {
        Some('\'') => {
            cursor.advance();
            Ok(Token::new(TokenKind::CharLiteral(inner as u8), format!("'{}'", inner), l, c))
        }
        _ => Err(LexError::new(l, "character literal must be exactly 'x'")),
    }
}

fn lex_label(cursor: &mut Cursor, l: usize, c: usize) -> Result<Token, LexError> {
    cursor.advance(); // '^'
    let mut name = String::new();
    while matches!(cursor.peek(), Some(ch) if ch.is_ascii_alphanumeric() || ch == '_') {
        name.push(cursor.advance().unwrap());
    }
    if name.is_empty() {
        return Err(LexError::new(l, "expected label name after '^'"));
    }
    Ok(Token::new(TokenKind::LabelDef(name.clone()), format!("^{}", name), l, c))
}

fn lex_hex(cursor: &mut Cursor, l: usize, c: usize) -> Result<Token, LexError> {
    cursor.advance(); // '0'
    cursor.advance(); // 'x' / 'X'
    let mut digits = String::new();
    while matches!(cursor.peek(), Some(ch) if ch.is_ascii_hexdigit()) {
        digits.push(cursor.advance().unwrap());
    }
    if digits.is_empty() {
        return Err(LexError::new(l, "expected hex digits after 0x"));
    }
    let value = u32::from_str_radix(&digits, 16)
        .map_err(|_| LexError::new(l, format!("invalid hex literal: 0x{}", digits)))?;
    Ok(Token::new(TokenKind::Number((value & 0xFFFF) as u16 as i16), format!("0x{}", digits), l, c))
}

fn lex_decimal(cursor: &mut Cursor, l: usize, c: usize) -> Result<Token, LexError> {
    let mut digits = String::new();
    while matches!(cursor.peek(), Some(ch) if ch.is_ascii_digit()) {
        digits.push(cursor.advance().unwrap());
    }
    let value: i64 = digits
        .parse()
        .map_err(|_| LexError::new(l, format!("invalid decimal literal: {}", digits)))?;
    Ok(Token::new(TokenKind::Number((value & 0xFFFF) as u16 as i16), digits, l, c))
}
