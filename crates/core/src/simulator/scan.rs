use std::sync::LazyLock;

use regex::Regex;

use super::SimulationError;

/// `print` as a whole word followed by an opening parenthesis.
static PRINT_CALL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bprint\s*\(").expect("Invalid print call regex"));

/// One `print(...)` occurrence in learner code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PrintCall<'a> {
    /// 1-based line of the `print` keyword.
    pub line: usize,
    /// Argument text between the parentheses.
    pub arguments: &'a str,
}

/// Find every top-level `print(...)` call in source order.
///
/// String literals and `#` comments are masked out first, so parentheses or
/// `print(` inside them are ignored. A call nested in another call's
/// arguments is part of the outer call.
pub(crate) fn find_print_calls(code: &str) -> Result<Vec<PrintCall<'_>>, SimulationError> {
    let mask = mask_code(code)?;
    let bytes = mask.as_bytes();
    let mut calls = Vec::new();
    let mut resume_at = 0;

    for found in PRINT_CALL.find_iter(&mask) {
        if found.start() < resume_at {
            continue;
        }
        let line = line_of(code, found.start());
        let open = found.end();
        let mut depth = 1_usize;
        let mut close = None;
        for (offset, byte) in bytes[open..].iter().enumerate() {
            match byte {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(open + offset);
                        break;
                    }
                }
                _ => {}
            }
        }
        let Some(close) = close else {
            return Err(SimulationError::Syntax(format!(
                "'(' was never closed (line {line})"
            )));
        };
        calls.push(PrintCall {
            line,
            arguments: &code[open..close],
        });
        resume_at = close + 1;
    }

    Ok(calls)
}

fn line_of(code: &str, offset: usize) -> usize {
    code[..offset].bytes().filter(|b| *b == b'\n').count() + 1
}

/// Copy of `code` with string contents and comments blanked to spaces.
/// Byte offsets are preserved; quote characters are kept.
fn mask_code(code: &str) -> Result<String, SimulationError> {
    let chars: Vec<(usize, char)> = code.char_indices().collect();
    let mut mask = String::with_capacity(code.len());
    let mut i = 0;
    let blank = |mask: &mut String, c: char| {
        if c == '\n' {
            mask.push('\n');
        } else {
            mask.extend(std::iter::repeat_n(' ', c.len_utf8()));
        }
    };

    while i < chars.len() {
        let (offset, c) = chars[i];
        match c {
            '#' => {
                while i < chars.len() && chars[i].1 != '\n' {
                    blank(&mut mask, chars[i].1);
                    i += 1;
                }
            }
            '"' | '\'' => {
                let quote = c;
                let triple = chars.get(i + 1).map(|p| p.1) == Some(quote)
                    && chars.get(i + 2).map(|p| p.1) == Some(quote);
                let width = if triple { 3 } else { 1 };
                for _ in 0..width {
                    mask.push(quote);
                }
                i += width;

                loop {
                    let Some(&(_, current)) = chars.get(i) else {
                        return Err(SimulationError::Syntax(format!(
                            "unterminated string literal (line {})",
                            line_of(code, offset)
                        )));
                    };
                    let closes = current == quote
                        && (!triple
                            || (chars.get(i + 1).map(|p| p.1) == Some(quote)
                                && chars.get(i + 2).map(|p| p.1) == Some(quote)));
                    if closes {
                        for _ in 0..width {
                            mask.push(quote);
                        }
                        i += width;
                        break;
                    }
                    if current == '\n' && !triple {
                        return Err(SimulationError::Syntax(format!(
                            "unterminated string literal (line {})",
                            line_of(code, offset)
                        )));
                    }
                    blank(&mut mask, current);
                    i += 1;
                    if current == '\\' {
                        if let Some(&(_, escaped)) = chars.get(i) {
                            blank(&mut mask, escaped);
                            i += 1;
                        }
                    }
                }
            }
            other => {
                mask.push(other);
                i += 1;
            }
        }
    }

    Ok(mask)
}
