use super::SimulationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Op {
    pub(crate) fn symbol(self) -> &'static str {
        match self {
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::FloorDiv => "//",
            Op::Mod => "%",
            Op::Pow => "**",
            Op::Eq => "==",
            Op::Ne => "!=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Int(i64),
    Float(f64),
    /// String literal with escapes already resolved. `format` marks f-strings,
    /// whose `{...}` fields are evaluated later.
    Str { text: String, format: bool },
    Name(String),
    Op(Op),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Assign,
}

pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, SimulationError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\r' | '\n' | '\\' => i += 1,
            '#' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '"' | '\'' => {
                let (token, next) = string_literal(&chars, i, false, false)?;
                tokens.push(token);
                i = next;
            }
            '.' if chars.get(i + 1).is_some_and(char::is_ascii_digit) => {
                let (token, next) = number(&chars, i)?;
                tokens.push(token);
                i = next;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            c if c.is_ascii_digit() => {
                let (token, next) = number(&chars, i)?;
                tokens.push(token);
                i = next;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let quoted = matches!(chars.get(i), Some('"' | '\''));
                match string_prefix(&word) {
                    Some((format, raw)) if quoted => {
                        let (token, next) = string_literal(&chars, i, format, raw)?;
                        tokens.push(token);
                        i = next;
                    }
                    _ => tokens.push(Token::Name(word)),
                }
            }
            _ => {
                let (op, width) = operator(&chars, i)?;
                tokens.push(op);
                i += width;
            }
        }
    }

    Ok(tokens)
}

/// `(is_format, is_raw)` for a string prefix, `None` for ordinary names.
fn string_prefix(word: &str) -> Option<(bool, bool)> {
    match word.to_ascii_lowercase().as_str() {
        "f" => Some((true, false)),
        "r" => Some((false, true)),
        "fr" | "rf" => Some((true, true)),
        "b" | "u" => Some((false, false)),
        "br" | "rb" => Some((false, true)),
        _ => None,
    }
}

fn operator(chars: &[char], i: usize) -> Result<(Token, usize), SimulationError> {
    let next = chars.get(i + 1).copied();
    let token = match (chars[i], next) {
        ('*', Some('*')) => return Ok((Token::Op(Op::Pow), 2)),
        ('/', Some('/')) => return Ok((Token::Op(Op::FloorDiv), 2)),
        ('=', Some('=')) => return Ok((Token::Op(Op::Eq), 2)),
        ('!', Some('=')) => return Ok((Token::Op(Op::Ne), 2)),
        ('<', Some('=')) => return Ok((Token::Op(Op::Le), 2)),
        ('>', Some('=')) => return Ok((Token::Op(Op::Ge), 2)),
        ('+', _) => Token::Op(Op::Add),
        ('-', _) => Token::Op(Op::Sub),
        ('*', _) => Token::Op(Op::Mul),
        ('/', _) => Token::Op(Op::Div),
        ('%', _) => Token::Op(Op::Mod),
        ('<', _) => Token::Op(Op::Lt),
        ('>', _) => Token::Op(Op::Gt),
        ('=', _) => Token::Assign,
        (other, _) => {
            return Err(SimulationError::Syntax(format!("invalid character '{other}'")));
        }
    };
    Ok((token, 1))
}

fn number(chars: &[char], start: usize) -> Result<(Token, usize), SimulationError> {
    let mut i = start;
    let mut is_float = false;
    while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '_') {
        i += 1;
    }
    if i < chars.len() && chars[i] == '.' {
        is_float = true;
        i += 1;
        while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '_') {
            i += 1;
        }
    }
    if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
        let mut j = i + 1;
        if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
            j += 1;
        }
        if j < chars.len() && chars[j].is_ascii_digit() {
            is_float = true;
            i = j;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
        }
    }

    let literal: String = chars[start..i].iter().filter(|c| **c != '_').collect();
    let token = if is_float {
        literal
            .parse::<f64>()
            .map(Token::Float)
            .map_err(|_| SimulationError::Syntax(format!("invalid number '{literal}'")))?
    } else {
        literal
            .parse::<i64>()
            .map(Token::Int)
            .map_err(|_| SimulationError::Overflow("integer literal is too large"))?
    };
    Ok((token, i))
}

fn string_literal(
    chars: &[char],
    start: usize,
    format: bool,
    raw: bool,
) -> Result<(Token, usize), SimulationError> {
    let quote = chars[start];
    let triple = chars.get(start + 1) == Some(&quote) && chars.get(start + 2) == Some(&quote);
    let mut i = start + if triple { 3 } else { 1 };
    let mut text = String::new();

    loop {
        let Some(&c) = chars.get(i) else {
            return Err(SimulationError::Syntax("unterminated string literal".into()));
        };
        if c == quote {
            if !triple {
                return Ok((Token::Str { text, format }, i + 1));
            }
            if chars.get(i + 1) == Some(&quote) && chars.get(i + 2) == Some(&quote) {
                return Ok((Token::Str { text, format }, i + 3));
            }
        }
        if c == '\n' && !triple {
            return Err(SimulationError::Syntax("unterminated string literal".into()));
        }
        if c == '\\' {
            let Some(&escaped) = chars.get(i + 1) else {
                return Err(SimulationError::Syntax("unterminated string literal".into()));
            };
            if raw {
                text.push('\\');
                text.push(escaped);
            } else {
                match escaped {
                    'n' => text.push('\n'),
                    't' => text.push('\t'),
                    'r' => text.push('\r'),
                    '0' => text.push('\0'),
                    '\\' => text.push('\\'),
                    '\'' => text.push('\''),
                    '"' => text.push('"'),
                    '\n' => {}
                    other => {
                        text.push('\\');
                        text.push(other);
                    }
                }
            }
            i += 2;
            continue;
        }
        text.push(c);
        i += 1;
    }
}
