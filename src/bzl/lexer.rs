//! Tokenizer for the build-file dialect.
//!
//! Lines inside brackets are joined (no Newline tokens while bracket depth is
//! positive), matching Python-style implicit line continuation. Comments are
//! real tokens so the parser can attach them to neighboring nodes.

use super::ParseError;

#[derive(Clone, Debug, PartialEq)]
pub enum TokKind {
    Ident(String),
    Int(i64),
    Str { value: String, triple: bool },
    /// Raw comment text including the leading `#`.
    Comment(String),
    Punct(char),
    Def,
    Pass,
    Newline,
    Eof,
}

#[derive(Clone, Debug)]
pub struct Tok {
    pub kind: TokKind,
    pub line: usize,
    pub col: usize,
    pub offset: usize,
}

pub fn tokenize(input: &str) -> Result<Vec<Tok>, ParseError> {
    let bytes = input.as_bytes();
    let mut toks = Vec::new();
    let mut i = 0usize;
    let mut line = 1usize;
    let mut col = 1usize;
    let mut depth = 0usize;

    macro_rules! push {
        ($kind:expr, $l:expr, $c:expr, $o:expr) => {
            toks.push(Tok {
                kind: $kind,
                line: $l,
                col: $c,
                offset: $o,
            })
        };
    }

    while i < bytes.len() {
        let c = bytes[i] as char;
        match c {
            ' ' | '\t' | '\r' => {
                i += 1;
                col += 1;
            }
            '\n' => {
                if depth == 0 {
                    push!(TokKind::Newline, line, col, i);
                }
                i += 1;
                line += 1;
                col = 1;
            }
            '\\' if i + 1 < bytes.len() && bytes[i + 1] == b'\n' => {
                // Explicit line continuation.
                i += 2;
                line += 1;
                col = 1;
            }
            '#' => {
                let start = i;
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                let text = input[start..i].trim_end().to_string();
                push!(TokKind::Comment(text), line, col, start);
                col += i - start;
            }
            '(' | '[' | '{' => {
                depth += 1;
                push!(TokKind::Punct(c), line, col, i);
                i += 1;
                col += 1;
            }
            ')' | ']' | '}' => {
                depth = depth.saturating_sub(1);
                push!(TokKind::Punct(c), line, col, i);
                i += 1;
                col += 1;
            }
            ',' | ':' | '=' | '+' | '-' | '*' | '%' | '.' => {
                push!(TokKind::Punct(c), line, col, i);
                i += 1;
                col += 1;
            }
            '"' | '\'' => {
                let (tok, consumed, newlines, endcol) =
                    lex_string(input, i, line, col, false)?;
                push!(tok, line, col, i);
                i += consumed;
                line += newlines;
                col = if newlines > 0 { endcol } else { col + consumed };
            }
            'r' if i + 1 < bytes.len() && (bytes[i + 1] == b'"' || bytes[i + 1] == b'\'') => {
                let (tok, consumed, newlines, endcol) =
                    lex_string(input, i + 1, line, col + 1, true)?;
                push!(tok, line, col, i);
                i += consumed + 1;
                line += newlines;
                col = if newlines > 0 { endcol } else { col + consumed + 1 };
            }
            _ if c.is_ascii_digit() => {
                let start = i;
                while i < bytes.len()
                    && ((bytes[i] as char).is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
                let text = &input[start..i];
                let value = parse_int(text)
                    .ok_or_else(|| ParseError::syntax(line, format!("bad integer {:?}", text)))?;
                push!(TokKind::Int(value), line, col, start);
                col += i - start;
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < bytes.len()
                    && ((bytes[i] as char).is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
                let text = &input[start..i];
                let kind = match text {
                    "def" => TokKind::Def,
                    "pass" => TokKind::Pass,
                    _ => TokKind::Ident(text.to_string()),
                };
                push!(kind, line, col, start);
                col += i - start;
            }
            _ => {
                return Err(ParseError::syntax(
                    line,
                    format!("unexpected character {:?}", c),
                ));
            }
        }
    }
    push!(TokKind::Newline, line, col, i);
    push!(TokKind::Eof, line, col, i);
    Ok(toks)
}

fn parse_int(text: &str) -> Option<i64> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else {
        text.parse().ok()
    }
}

/// Lex a string starting at the opening quote. Returns the token, the number
/// of bytes consumed, newlines crossed, and the column after the close quote.
fn lex_string(
    input: &str,
    start: usize,
    line: usize,
    _col: usize,
    raw: bool,
) -> Result<(TokKind, usize, usize, usize), ParseError> {
    let bytes = input.as_bytes();
    let quote = bytes[start];
    let triple = start + 2 < bytes.len() && bytes[start + 1] == quote && bytes[start + 2] == quote;
    let mut i = start + if triple { 3 } else { 1 };
    let mut value = String::new();
    let mut newlines = 0usize;
    let mut col_after = 1usize;

    while i < bytes.len() {
        let c = bytes[i];
        if c == quote {
            if triple {
                if i + 2 < bytes.len() && bytes[i + 1] == quote && bytes[i + 2] == quote {
                    return Ok((
                        TokKind::Str { value, triple },
                        i + 3 - start,
                        newlines,
                        col_after + 3,
                    ));
                }
                value.push(c as char);
                i += 1;
                col_after += 1;
                continue;
            }
            return Ok((TokKind::Str { value, triple }, i + 1 - start, newlines, col_after + 1));
        }
        if c == b'\n' {
            if !triple {
                return Err(ParseError::syntax(line, "unterminated string".to_string()));
            }
            value.push('\n');
            newlines += 1;
            col_after = 1;
            i += 1;
            continue;
        }
        if c == b'\\' && !raw && i + 1 < bytes.len() {
            let esc = bytes[i + 1] as char;
            let decoded = match esc {
                'n' => Some('\n'),
                't' => Some('\t'),
                'r' => Some('\r'),
                '\\' => Some('\\'),
                '\'' => Some('\''),
                '"' => Some('"'),
                '\n' => None, // escaped newline, dropped
                other => {
                    // Unknown escape: keep both characters verbatim.
                    value.push('\\');
                    Some(other)
                }
            };
            if let Some(d) = decoded {
                value.push(d);
            } else {
                newlines += 1;
                col_after = 1;
            }
            i += 2;
            col_after += 2;
            continue;
        }
        // Multibyte characters pass through untouched.
        let ch_len = utf8_len(c);
        value.push_str(&input[i..i + ch_len]);
        i += ch_len;
        col_after += 1;
    }
    Err(ParseError::syntax(line, "unterminated string".to_string()))
}

fn utf8_len(first: u8) -> usize {
    match first {
        b if b < 0x80 => 1,
        b if b >> 5 == 0b110 => 2,
        b if b >> 4 == 0b1110 => 3,
        _ => 4,
    }
}
