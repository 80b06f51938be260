//! # WorkerScript Parser
//!
//! Assembles tokenized source lines into a block-structured `Program` AST.
//!
//! ## Architecture
//!
//! Parsing happens in two phases, per the language's own design:
//!
//! 1. Each physical source line is split into whitespace-separated
//!    "statement fields" (respecting string and character literals, and
//!    stopping at an unquoted `:` comment), then each field is tokenized
//!    independently with [`crate::lexer::tokenize_line`] — every
//!    WorkerScript statement is written with no internal whitespace, so a
//!    field is always exactly one statement's worth of tokens.
//! 2. Fields are assembled into `Statement`s. Three statement kinds —
//!    `IfBlock`, `ForBlock`, `WhileBlock` — can additionally consume
//!    further physical lines as their body, when the opening construct is
//!    the sole field on its line; otherwise an `IfBlock` is *inline* and
//!    its body is simply the rest of that line's fields.
//!
//! ## Expression precedence
//!
//! A standard precedence-climbing (Pratt) parser implements the table
//! from the language grammar, lowest to highest: `,` (used only to
//! assemble a FOR triple or an array-initialization list), `|`, `&`,
//! comparisons, `+ -`, `* / %`, prefix `- + !`, then primaries.

#[cfg(test)]
mod tests;

use crate::ast::{BinaryOp, Expr, Line, Program, Statement, UnaryOp};
use crate::error::{CompileError, ParseError};
use crate::lexer::{
    token::{Token, TokenKind},
    tokenize_line,
};

type RawLines = Vec<(usize, String)>;

/// Parse a complete WorkerScript source text into a `Program`.
pub fn parse_program(source: &str) -> Result<Program, CompileError> {
    let raw: RawLines = source
        .lines()
        .enumerate()
        .map(|(i, text)| (i + 1, text.to_string()))
        .collect();

    let mut body = Vec::new();
    let mut labels = std::collections::HashMap::new();
    let mut idx = 0usize;

    while idx < raw.len() {
        let (line_no, text) = raw[idx].clone();
        let (label, statements) = parse_logical_line(&raw, &mut idx, true)?;
        if let Some(name) = label {
            if labels.contains_key(&name) {
                return Err(ParseError::new(line_no, format!("duplicate label: ^{}", name)).into());
            }
            labels.insert(name, body.len());
        }
        body.push(Line { line_no, statements, text });
    }

    Ok(Program { body, labels })
}

/// Parse one "logical" source line: the physical line at `raw[*idx]`, plus
/// any additional lines it pulls in as a block body. Advances `*idx` past
/// everything consumed. Returns the line's label (if `allow_label`) and the
/// statement(s) produced.
fn parse_logical_line(
    raw: &RawLines,
    idx: &mut usize,
    allow_label: bool,
) -> Result<(Option<String>, Vec<Statement>), ParseError> {
    let (line_no, text) = raw[*idx].clone();
    *idx += 1;

    let mut fields = split_fields(&text);
    let mut label = None;

    if allow_label {
        if let Some(first) = fields.first() {
            if let Some(name) = as_pure_label(first, line_no)? {
                label = Some(name);
                fields.remove(0);
            }
        }
    }

    if fields.is_empty() {
        return Ok((label, Vec::new()));
    }

    let first_tokens = tokenize_line(&fields[0], line_no)?;

    if is_if_marker(&first_tokens) {
        let mut pos = 2; // past `;` `=`
        let condition = parse_expr(&first_tokens, &mut pos, 2, line_no)?;
        expect_eof(&first_tokens, pos, line_no, "after IF condition")?;

        if fields.len() > 1 {
            let then_body = parse_fields_inline(&fields[1..], line_no)?;
            return Ok((label, vec![Statement::IfBlock { condition, then_body, else_body: None, line: line_no }]));
        }

        let mut then_body = Vec::new();
        let mut else_body: Option<Vec<Statement>> = None;
        loop {
            if *idx >= raw.len() {
                return Err(ParseError::new(line_no, "block IF not closed by #=;"));
            }
            let marker = split_fields(&raw[*idx].1);
            if marker.len() == 1 && marker[0] == "#=;" {
                *idx += 1;
                break;
            }
            if marker.len() == 1 && marker[0] == ";" && else_body.is_none() {
                *idx += 1;
                else_body = Some(Vec::new());
                continue;
            }
            let (_, stmts) = parse_logical_line(raw, idx, false)?;
            match else_body.as_mut() {
                Some(body) => body.extend(stmts),
                None => then_body.extend(stmts),
            }
        }
        return Ok((label, vec![Statement::IfBlock { condition, then_body, else_body, line: line_no }]));
    }

    if is_for_marker(&first_tokens) {
        if fields.len() > 1 {
            return Err(ParseError::new(line_no, "FOR only exists as a block; nothing may follow it on its line"));
        }
        let (var, start, end, step) = parse_for_header(&first_tokens, line_no)?;
        let body = collect_block_body(raw, idx, line_no, "#=@", "FOR block not closed by #=@")?;
        return Ok((label, vec![Statement::ForBlock { var, start, end, step, body, line: line_no }]));
    }

    if is_while_marker(&first_tokens) {
        if fields.len() > 1 {
            return Err(ParseError::new(line_no, "WHILE only exists as a block; nothing may follow it on its line"));
        }
        let condition = parse_while_header(&first_tokens, line_no)?;
        let body = collect_block_body(raw, idx, line_no, "#=@", "WHILE block not closed by #=@")?;
        return Ok((label, vec![Statement::WhileBlock { condition, body, line: line_no }]));
    }

    let stmts = parse_fields_inline(&fields, line_no)?;
    Ok((label, stmts))
}

fn collect_block_body(
    raw: &RawLines,
    idx: &mut usize,
    line_no: usize,
    terminator: &str,
    unclosed_message: &str,
) -> Result<Vec<Statement>, ParseError> {
    let mut body = Vec::new();
    loop {
        if *idx >= raw.len() {
            return Err(ParseError::new(line_no, unclosed_message));
        }
        let marker = split_fields(&raw[*idx].1);
        if marker.len() == 1 && marker[0] == terminator {
            *idx += 1;
            break;
        }
        let (_, stmts) = parse_logical_line(raw, idx, false)?;
        body.extend(stmts);
    }
    Ok(body)
}

/// Parse a flat run of same-line fields into statements. Any bare IF marker
/// encountered here is always inline — block IFs can only open from the
/// outermost field list of a physical line, handled by `parse_logical_line`.
fn parse_fields_inline(fields: &[String], line_no: usize) -> Result<Vec<Statement>, ParseError> {
    if fields.is_empty() {
        return Ok(Vec::new());
    }
    let tokens = tokenize_line(&fields[0], line_no)?;

    if is_if_marker(&tokens) {
        let mut pos = 2;
        let condition = parse_expr(&tokens, &mut pos, 2, line_no)?;
        expect_eof(&tokens, pos, line_no, "after inline IF condition")?;
        let then_body = parse_fields_inline(&fields[1..], line_no)?;
        return Ok(vec![Statement::IfBlock { condition, then_body, else_body: None, line: line_no }]);
    }
    if is_for_marker(&tokens) || is_while_marker(&tokens) {
        return Err(ParseError::new(line_no, "FOR/WHILE may only appear as the sole statement of a line"));
    }

    let stmt = parse_single_statement(&tokens, line_no)?;
    let mut rest = parse_fields_inline(&fields[1..], line_no)?;
    let mut out = vec![stmt];
    out.append(&mut rest);
    Ok(out)
}

fn parse_single_statement(tokens: &[Token], line_no: usize) -> Result<Statement, ParseError> {
    use TokenKind::*;

    match (&tokens[0].kind, tokens.get(1).map(|t| &t.kind)) {
        (Identifier(ch), Some(Equal)) => {
            let mut pos = 2;
            let expr = parse_expr(tokens, &mut pos, 2, line_no)?;
            expect_eof(tokens, pos, line_no, "after assignment")?;
            Ok(Statement::Assignment { var: *ch, expr, line: line_no })
        }
        (Question, Some(Equal)) => {
            let mut pos = 2;
            let expr = parse_expr(tokens, &mut pos, 2, line_no)?;
            expect_eof(tokens, pos, line_no, "after output expression")?;
            Ok(Statement::Output { expr, line: line_no })
        }
        (Slash, _) => {
            expect_eof(tokens, 1, line_no, "after /")?;
            Ok(Statement::Newline { line: line_no })
        }
        (Hash, Some(Equal)) => parse_hash_form(tokens, line_no),
        (Bang, Some(Equal)) => match tokens.get(2).map(|t| &t.kind) {
            Some(LabelDef(name)) => {
                expect_eof(tokens, 3, line_no, "after GOSUB target")?;
                Ok(Statement::Gosub { label: name.clone(), line: line_no })
            }
            _ => Err(ParseError::new(line_no, "GOSUB requires a ^LABEL target")),
        },
        (Backtick, Some(Equal)) => {
            let mut pos = 2;
            let expr = parse_expr(tokens, &mut pos, 2, line_no)?;
            expect_eof(tokens, pos, line_no, "after POKE expression")?;
            Ok(Statement::Poke { expr, line: line_no })
        }
        (Dollar, Some(Equal)) => {
            let mut pos = 2;
            let expr = parse_expr(tokens, &mut pos, 2, line_no)?;
            expect_eof(tokens, pos, line_no, "after $= expression")?;
            Ok(Statement::IoPut { expr, line: line_no })
        }
        (LBracket, _) => parse_array_statement(tokens, line_no),
        _ => Err(ParseError::new(line_no, "unrecognized statement form")),
    }
}

fn parse_hash_form(tokens: &[Token], line_no: usize) -> Result<Statement, ParseError> {
    use TokenKind::*;
    match tokens.get(2).map(|t| &t.kind) {
        Some(LabelDef(name)) => {
            expect_eof(tokens, 3, line_no, "after GOTO target")?;
            Ok(Statement::Goto { label: name.clone(), line: line_no })
        }
        Some(Bang) => {
            expect_eof(tokens, 3, line_no, "after #=!")?;
            Ok(Statement::Return { line: line_no })
        }
        Some(Minus) if matches!(tokens.get(3).map(|t| &t.kind), Some(Number(1))) => {
            expect_eof(tokens, 4, line_no, "after #=-1")?;
            Ok(Statement::Halt { line: line_no })
        }
        Some(Backtick) => {
            expect_eof(tokens, 3, line_no, "after frame-wait")?;
            Ok(Statement::WaitForNextFrame { line: line_no })
        }
        _ => Err(ParseError::new(line_no, "unrecognized #= form (expected ^LABEL, !, -1, or `)")),
    }
}

fn parse_array_statement(tokens: &[Token], line_no: usize) -> Result<Statement, ParseError> {
    use TokenKind::*;
    let mut pos = 1; // past '['
    let (index, is_literal_minus_one) = parse_array_index(tokens, &mut pos, line_no)?;
    match tokens.get(pos).map(|t| &t.kind) {
        Some(RBracket) => pos += 1,
        _ => return Err(ParseError::new(line_no, "expected ']' after array index")),
    }
    match tokens.get(pos).map(|t| &t.kind) {
        Some(Equal) => pos += 1,
        _ => return Err(ParseError::new(line_no, "expected '=' after array index")),
    }

    let combined = parse_expr(tokens, &mut pos, 1, line_no)?;
    expect_eof(tokens, pos, line_no, "after array statement")?;
    let mut exprs = Vec::new();
    flatten_comma(combined, &mut exprs);

    if exprs.len() == 1 {
        Ok(Statement::ArrayAssignment {
            index,
            is_literal_minus_one,
            expr: exprs.into_iter().next().unwrap(),
            line: line_no,
        })
    } else {
        if is_literal_minus_one {
            return Err(ParseError::new(line_no, "array initialization cannot target the stack ([-1])"));
        }
        Ok(Statement::ArrayInitialization { index, is_literal_minus_one, exprs, line: line_no })
    }
}

fn parse_array_index(tokens: &[Token], pos: &mut usize, line_no: usize) -> Result<(Expr, bool), ParseError> {
    use TokenKind::*;
    if matches!(tokens.get(*pos).map(|t| &t.kind), Some(Minus))
        && matches!(tokens.get(*pos + 1).map(|t| &t.kind), Some(Number(1)))
    {
        *pos += 2;
        return Ok((Expr::NumericLiteral(-1), true));
    }
    let expr = parse_expr(tokens, pos, 2, line_no)?;
    Ok((expr, false))
}

fn is_if_marker(tokens: &[Token]) -> bool {
    matches!(tokens.first().map(|t| &t.kind), Some(TokenKind::Semicolon))
        && matches!(tokens.get(1).map(|t| &t.kind), Some(TokenKind::Equal))
}

fn is_for_marker(tokens: &[Token]) -> bool {
    matches!(tokens.first().map(|t| &t.kind), Some(TokenKind::At))
        && matches!(tokens.get(1).map(|t| &t.kind), Some(TokenKind::Equal))
        && matches!(tokens.get(2).map(|t| &t.kind), Some(TokenKind::Identifier(_)))
}

fn is_while_marker(tokens: &[Token]) -> bool {
    matches!(tokens.first().map(|t| &t.kind), Some(TokenKind::At))
        && matches!(tokens.get(1).map(|t| &t.kind), Some(TokenKind::Equal))
        && matches!(tokens.get(2).map(|t| &t.kind), Some(TokenKind::LParen))
}

fn parse_for_header(tokens: &[Token], line_no: usize) -> Result<(char, Expr, Expr, Option<Expr>), ParseError> {
    let var = match &tokens[2].kind {
        TokenKind::Identifier(ch) => *ch,
        _ => unreachable!("is_for_marker guarantees this"),
    };
    if !matches!(tokens.get(3).map(|t| &t.kind), Some(TokenKind::Comma)) {
        return Err(ParseError::new(line_no, "FOR requires a comma after the loop variable"));
    }
    let mut pos = 4;
    let combined = parse_expr(tokens, &mut pos, 1, line_no)?;
    expect_eof(tokens, pos, line_no, "after FOR header")?;
    let mut parts = Vec::new();
    flatten_comma(combined, &mut parts);
    match parts.len() {
        2 => {
            let mut it = parts.into_iter();
            Ok((var, it.next().unwrap(), it.next().unwrap(), None))
        }
        3 => {
            let mut it = parts.into_iter();
            let start = it.next().unwrap();
            let end = it.next().unwrap();
            let step = it.next().unwrap();
            Ok((var, start, end, Some(step)))
        }
        n => Err(ParseError::new(line_no, format!("FOR expects start,end[,step] (got {} values)", n))),
    }
}

fn parse_while_header(tokens: &[Token], line_no: usize) -> Result<Expr, ParseError> {
    let mut pos = 2; // at '('
    let condition = parse_expr(tokens, &mut pos, 2, line_no)?;
    expect_eof(tokens, pos, line_no, "after WHILE condition")?;
    Ok(condition)
}

/// Flatten a left-associative chain of `Comma` binary nodes back into an
/// ordered list, e.g. `Comma(Comma(1,10),2)` -> `[1, 10, 2]`.
fn flatten_comma(expr: Expr, out: &mut Vec<Expr>) {
    match expr {
        Expr::Binary { op: BinaryOp::Comma, left, right } => {
            flatten_comma(*left, out);
            out.push(*right);
        }
        other => out.push(other),
    }
}

fn expect_eof(tokens: &[Token], pos: usize, line_no: usize, context: &str) -> Result<(), ParseError> {
    match tokens.get(pos).map(|t| &t.kind) {
        Some(TokenKind::Eof) | None => Ok(()),
        Some(_) => Err(ParseError::new(line_no, format!("unexpected token {}", context))),
    }
}

fn as_pure_label(field: &str, line_no: usize) -> Result<Option<String>, ParseError> {
    let tokens = tokenize_line(field, line_no)?;
    match (&tokens.first().map(|t| &t.kind), tokens.get(1).map(|t| &t.kind)) {
        (Some(TokenKind::LabelDef(name)), Some(TokenKind::Eof)) => Ok(Some(name.clone())),
        _ => Ok(None),
    }
}

/// Split a physical source line into whitespace-separated statement
/// fields, respecting string/char literals and stopping at an unquoted
/// `:` comment.
fn split_fields(text: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    let mut in_string = false;

    while let Some(ch) = chars.next() {
        if in_string {
            current.push(ch);
            if ch == '"' {
                if chars.peek() == Some(&'"') {
                    current.push(chars.next().unwrap());
                } else {
                    in_string = false;
                }
            }
            continue;
        }
        match ch {
            '"' => {
                in_string = true;
                current.push(ch);
            }
            '\'' => {
                current.push(ch);
                if let Some(inner) = chars.next() {
                    current.push(inner);
                }
                if chars.peek() == Some(&'\'') {
                    current.push(chars.next().unwrap());
                }
            }
            ':' => break,
            ' ' | '\t' => {
                if !current.is_empty() {
                    fields.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(ch),
        }
    }
    if !current.is_empty() {
        fields.push(current);
    }
    fields
}

// --- Expression parsing (precedence climbing) ---

fn binop_info(kind: &TokenKind) -> Option<(BinaryOp, u8)> {
    use TokenKind::*;
    Some(match kind {
        Comma => (BinaryOp::Comma, 1),
        Pipe => (BinaryOp::Or, 2),
        Amp => (BinaryOp::And, 3),
        Greater => (BinaryOp::Gt, 4),
        Less => (BinaryOp::Lt, 4),
        GreaterEqual => (BinaryOp::Ge, 4),
        LessEqual => (BinaryOp::Le, 4),
        Equal => (BinaryOp::Eq, 4),
        NotEqual => (BinaryOp::NotEq, 4),
        Plus => (BinaryOp::Add, 5),
        Minus => (BinaryOp::Sub, 5),
        Star => (BinaryOp::Mul, 6),
        Slash => (BinaryOp::Div, 6),
        Percent => (BinaryOp::Mod, 6),
        _ => return None,
    })
}

fn parse_expr(tokens: &[Token], pos: &mut usize, min_prec: u8, line_no: usize) -> Result<Expr, ParseError> {
    let mut left = parse_unary(tokens, pos, line_no)?;
    loop {
        let Some((op, prec)) = tokens.get(*pos).and_then(|t| binop_info(&t.kind)) else { break };
        if prec < min_prec {
            break;
        }
        *pos += 1;
        let right = parse_expr(tokens, pos, prec + 1, line_no)?;
        left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
    }
    Ok(left)
}

fn parse_unary(tokens: &[Token], pos: &mut usize, line_no: usize) -> Result<Expr, ParseError> {
    let op = match tokens.get(*pos).map(|t| &t.kind) {
        Some(TokenKind::Minus) => Some(UnaryOp::Neg),
        Some(TokenKind::Plus) => Some(UnaryOp::Plus),
        Some(TokenKind::Bang) => Some(UnaryOp::Not),
        _ => None,
    };
    if let Some(op) = op {
        *pos += 1;
        let operand = parse_unary(tokens, pos, line_no)?;
        return Ok(Expr::Unary { op, operand: Box::new(operand) });
    }
    parse_primary(tokens, pos, line_no)
}

fn parse_primary(tokens: &[Token], pos: &mut usize, line_no: usize) -> Result<Expr, ParseError> {
    use TokenKind::*;
    let kind = tokens.get(*pos).map(|t| &t.kind).ok_or_else(|| ParseError::new(line_no, "unexpected end of expression"))?;

    match kind {
        Number(n) => {
            let n = *n;
            *pos += 1;
            Ok(Expr::NumericLiteral(n))
        }
        Str(s) => {
            let s = s.clone();
            *pos += 1;
            Ok(Expr::StringLiteral(s))
        }
        CharLiteral(c) => {
            let c = *c;
            *pos += 1;
            Ok(Expr::CharLiteral(c))
        }
        Identifier(ch) => {
            let ch = *ch;
            *pos += 1;
            Ok(Expr::Identifier(ch))
        }
        LParen => {
            *pos += 1;
            let inner = parse_expr(tokens, pos, 1, line_no)?;
            match tokens.get(*pos).map(|t| &t.kind) {
                Some(RParen) => *pos += 1,
                _ => return Err(ParseError::new(line_no, "expected ')'")),
            }
            Ok(inner)
        }
        LBracket => {
            *pos += 1;
            let (index, is_literal_minus_one) = parse_array_index(tokens, pos, line_no)?;
            match tokens.get(*pos).map(|t| &t.kind) {
                Some(RBracket) => *pos += 1,
                _ => return Err(ParseError::new(line_no, "expected ']'")),
            }
            Ok(Expr::ArrayAccess { index: Box::new(index), is_literal_minus_one })
        }
        Backtick => {
            *pos += 1;
            Ok(Expr::Peek)
        }
        Tilde => {
            *pos += 1;
            Ok(Expr::Random)
        }
        Dollar => {
            *pos += 1;
            Ok(Expr::IoGet)
        }
        Question => {
            *pos += 1;
            Ok(Expr::InputNumber)
        }
        Less if matches!(tokens.get(*pos + 1).map(|t| &t.kind), Some(Amp)) => {
            *pos += 2;
            // Comparisons (prec 4) are excluded so the closing '>' is never
            // mistaken for a binary greater-than operator.
            let expected = parse_expr(tokens, pos, 5, line_no)?;
            match tokens.get(*pos).map(|t| &t.kind) {
                Some(Comma) => *pos += 1,
                _ => return Err(ParseError::new(line_no, "expected ',' in <&expected,new>")),
            }
            let new_value = parse_expr(tokens, pos, 5, line_no)?;
            match tokens.get(*pos).map(|t| &t.kind) {
                Some(Greater) => *pos += 1,
                _ => return Err(ParseError::new(line_no, "expected '>' closing <&expected,new>")),
            }
            Ok(Expr::CompareAndSwap { expected: Box::new(expected), new_value: Box::new(new_value) })
        }
        other => Err(ParseError::new(line_no, format!("unexpected token in expression: {:?}", other))),
    }
}
