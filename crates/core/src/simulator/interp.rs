use super::SimulationError;
use super::lexer::{Op, tokenize};
use super::parser::{Argument, Expr, Parser};
use super::value::{Number, Value, format_float};

/// Nesting limit for f-strings inside f-strings.
const MAX_FORMAT_DEPTH: usize = 8;

/// Longest string any single evaluation may produce.
const MAX_TEXT_LEN: usize = 100_000;

fn check_len(len: usize, what: &'static str) -> Result<(), SimulationError> {
    if len > MAX_TEXT_LEN {
        return Err(SimulationError::Overflow(what));
    }
    Ok(())
}

/// Evaluate a single expression.
#[cfg(test)]
fn evaluate(source: &str) -> Result<Value, SimulationError> {
    Evaluator { depth: 0 }.eval_source(source)
}

/// Evaluate the argument text of a `print(...)` call into the printed line.
pub(crate) fn evaluate_print_arguments(source: &str) -> Result<String, SimulationError> {
    let tokens = tokenize(source)?;
    let args = Parser::new(&tokens).parse_arguments()?;
    let evaluator = Evaluator { depth: 0 };

    let mut separator = " ".to_owned();
    let mut pieces = Vec::new();
    for arg in &args {
        let value = evaluator.eval(&arg.value)?;
        match arg.keyword.as_deref() {
            None => pieces.push(value.to_string()),
            Some("sep") => match value {
                Value::Str(sep) => separator = sep,
                Value::None => separator = " ".to_owned(),
                other => {
                    return Err(SimulationError::Type(format!(
                        "sep must be None or a string, not {}",
                        other.type_name()
                    )));
                }
            },
            Some("end" | "flush") => {}
            Some(other) => {
                return Err(SimulationError::Type(format!(
                    "'{other}' is an invalid keyword argument for print()"
                )));
            }
        }
    }
    let line = pieces.join(&separator);
    check_len(line.len(), "printed line is too long")?;
    Ok(line)
}

struct Evaluator {
    depth: usize,
}

impl Evaluator {
    fn eval_source(&self, source: &str) -> Result<Value, SimulationError> {
        let tokens = tokenize(source)?;
        let expr = Parser::new(&tokens).parse_expression()?;
        self.eval(&expr)
    }

    fn eval(&self, expr: &Expr) -> Result<Value, SimulationError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Format(body) => self.format_string(body).map(Value::Str),
            Expr::Name(name) => Err(SimulationError::UnknownName(name.clone())),
            Expr::Negate(operand) => negate(self.eval(operand)?),
            Expr::Plus(operand) => {
                let value = self.eval(operand)?;
                value.as_number().map(Number::into_value).ok_or_else(|| {
                    SimulationError::Type(format!(
                        "bad operand type for unary +: '{}'",
                        value.type_name()
                    ))
                })
            }
            Expr::Not(operand) => Ok(Value::Bool(!self.eval(operand)?.is_truthy())),
            Expr::And(left, right) => {
                let left = self.eval(left)?;
                if left.is_truthy() { self.eval(right) } else { Ok(left) }
            }
            Expr::Or(left, right) => {
                let left = self.eval(left)?;
                if left.is_truthy() { Ok(left) } else { self.eval(right) }
            }
            Expr::Binary(op, left, right) => binary(*op, self.eval(left)?, self.eval(right)?),
            Expr::Compare(first, rest) => {
                let mut left = self.eval(first)?;
                for (op, right) in rest {
                    let right = self.eval(right)?;
                    if !compare(*op, &left, &right)? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            Expr::Call { function, args } => {
                let args = self.positional(function, args)?;
                call_builtin(function, &args)
            }
            Expr::Method {
                receiver,
                name,
                args,
            } => {
                let receiver = self.eval(receiver)?;
                let args = self.positional(name, args)?;
                self.call_method(&receiver, name, &args)
            }
        }
    }

    fn positional(&self, function: &str, args: &[Argument]) -> Result<Vec<Value>, SimulationError> {
        args.iter()
            .map(|arg| match &arg.keyword {
                Some(keyword) => Err(SimulationError::Type(format!(
                    "{function}() got an unexpected keyword argument '{keyword}'"
                ))),
                None => self.eval(&arg.value),
            })
            .collect()
    }

    fn nested(&self) -> Result<Self, SimulationError> {
        if self.depth >= MAX_FORMAT_DEPTH {
            return Err(SimulationError::Syntax("f-string is nested too deeply".into()));
        }
        Ok(Self {
            depth: self.depth + 1,
        })
    }

    /// Expand `{expr[!conv][:spec]}` fields of an f-string body.
    fn format_string(&self, body: &str) -> Result<String, SimulationError> {
        let inner = self.nested()?;
        let mut out = String::new();
        for segment in split_fields(body)? {
            match segment {
                Segment::Text(text) => out.push_str(&text),
                Segment::Field(field) => {
                    let field = parse_field(&field);
                    if field.expression.trim().is_empty() {
                        return Err(SimulationError::Syntax(
                            "f-string: empty expression not allowed".into(),
                        ));
                    }
                    let value = inner.eval_source(field.expression)?;
                    out.push_str(&render_field(&value, field.conversion, field.spec)?);
                }
            }
            check_len(out.len(), "formatted string is too long")?;
        }
        Ok(out)
    }

    /// `"...".format(...)` with automatic (`{}`) or explicit (`{0}`) indices.
    fn format_method(&self, template: &str, args: &[Value]) -> Result<String, SimulationError> {
        let mut next_auto = 0;
        let mut out = String::new();
        for segment in split_fields(template)? {
            match segment {
                Segment::Text(text) => out.push_str(&text),
                Segment::Field(field) => {
                    let field = parse_field(&field);
                    let name = field.expression.trim();
                    let index = if name.is_empty() {
                        next_auto += 1;
                        next_auto - 1
                    } else {
                        name.parse::<usize>().map_err(|_| {
                            SimulationError::Value(format!("unsupported format field '{name}'"))
                        })?
                    };
                    let value = args.get(index).ok_or_else(|| {
                        SimulationError::Index(format!(
                            "Replacement index {index} out of range for positional args tuple"
                        ))
                    })?;
                    out.push_str(&render_field(value, field.conversion, field.spec)?);
                }
            }
            check_len(out.len(), "formatted string is too long")?;
        }
        Ok(out)
    }

    fn call_method(
        &self,
        receiver: &Value,
        name: &str,
        args: &[Value],
    ) -> Result<Value, SimulationError> {
        let Value::Str(text) = receiver else {
            return Err(SimulationError::Attribute(format!(
                "'{}' object has no attribute '{name}'",
                receiver.type_name()
            )));
        };
        let no_args = || {
            if args.is_empty() {
                Ok(())
            } else {
                Err(SimulationError::Type(format!(
                    "str.{name}() takes no arguments ({} given)",
                    args.len()
                )))
            }
        };
        match name {
            "upper" => no_args().map(|()| Value::Str(text.to_uppercase())),
            "lower" => no_args().map(|()| Value::Str(text.to_lowercase())),
            "strip" => no_args().map(|()| Value::Str(text.trim().to_owned())),
            "lstrip" => no_args().map(|()| Value::Str(text.trim_start().to_owned())),
            "rstrip" => no_args().map(|()| Value::Str(text.trim_end().to_owned())),
            "capitalize" => no_args().map(|()| Value::Str(capitalize(text))),
            "title" => no_args().map(|()| Value::Str(title_case(text))),
            "replace" => match args {
                [Value::Str(from), Value::Str(to)] => replace(text, from, to),
                _ => Err(SimulationError::Type(
                    "replace() expects two string arguments".into(),
                )),
            },
            "count" => match args {
                [Value::Str(needle)] if !needle.is_empty() => {
                    Ok(Value::Int(i64::try_from(text.matches(needle.as_str()).count()).unwrap_or(i64::MAX)))
                }
                _ => Err(SimulationError::Type(
                    "count() expects one non-empty string argument".into(),
                )),
            },
            "format" => self.format_method(text, args).map(Value::Str),
            _ => Err(SimulationError::Attribute(format!(
                "'str' object has no attribute '{name}'"
            ))),
        }
    }
}

//
// ─── OPERATORS ─────────────────────────────────────────────────────────────────
//

fn unsupported(op: Op, left: &Value, right: &Value) -> SimulationError {
    SimulationError::Type(format!(
        "unsupported operand type(s) for {}: '{}' and '{}'",
        op.symbol(),
        left.type_name(),
        right.type_name()
    ))
}

fn negate(value: Value) -> Result<Value, SimulationError> {
    match value.as_number() {
        Some(Number::Int(n)) => n
            .checked_neg()
            .map(Value::Int)
            .ok_or(SimulationError::Overflow("integer result is too large")),
        Some(Number::Float(f)) => Ok(Value::Float(-f)),
        None => Err(SimulationError::Type(format!(
            "bad operand type for unary -: '{}'",
            value.type_name()
        ))),
    }
}

fn int_result(result: Option<i64>) -> Result<Value, SimulationError> {
    result
        .map(Value::Int)
        .ok_or(SimulationError::Overflow("integer result is too large"))
}

fn repeat(text: &str, times: i64) -> Result<Value, SimulationError> {
    let times = usize::try_from(times).unwrap_or(0);
    check_len(text.len().saturating_mul(times), "repeated string is too long")?;
    Ok(Value::Str(text.repeat(times)))
}

/// An empty `from` inserts `to` at every character boundary.
fn replace(text: &str, from: &str, to: &str) -> Result<Value, SimulationError> {
    let hits = if from.is_empty() {
        text.chars().count() + 1
    } else {
        text.matches(from).count()
    };
    let len = (text.len() - hits * from.len()).saturating_add(hits.saturating_mul(to.len()));
    check_len(len, "replaced string is too long")?;
    Ok(Value::Str(text.replace(from, to)))
}

pub(crate) fn binary(op: Op, left: Value, right: Value) -> Result<Value, SimulationError> {
    match (op, &left, &right) {
        (Op::Add, Value::Str(a), Value::Str(b)) => {
            check_len(a.len().saturating_add(b.len()), "concatenated string is too long")?;
            return Ok(Value::Str(format!("{a}{b}")));
        }
        (Op::Add, Value::Str(_), other) => {
            return Err(SimulationError::Type(format!(
                "can only concatenate str (not \"{}\") to str",
                other.type_name()
            )));
        }
        (Op::Mul, Value::Str(text), Value::Int(n)) | (Op::Mul, Value::Int(n), Value::Str(text)) => {
            return repeat(text, *n);
        }
        (Op::Mul, Value::Str(text), Value::Bool(b)) | (Op::Mul, Value::Bool(b), Value::Str(text)) => {
            return repeat(text, i64::from(*b));
        }
        _ => {}
    }

    let (Some(a), Some(b)) = (left.as_number(), right.as_number()) else {
        return Err(unsupported(op, &left, &right));
    };

    match (a, b) {
        (Number::Int(a), Number::Int(b)) => int_binary(op, a, b),
        (a, b) => float_binary(op, a.as_f64(), b.as_f64()),
    }
}

fn int_binary(op: Op, a: i64, b: i64) -> Result<Value, SimulationError> {
    match op {
        Op::Add => int_result(a.checked_add(b)),
        Op::Sub => int_result(a.checked_sub(b)),
        Op::Mul => int_result(a.checked_mul(b)),
        Op::Div => {
            if b == 0 {
                return Err(SimulationError::ZeroDivision("division by zero"));
            }
            Ok(Value::Float(Number::Int(a).as_f64() / Number::Int(b).as_f64()))
        }
        Op::FloorDiv | Op::Mod => {
            if b == 0 {
                return Err(SimulationError::ZeroDivision(
                    "integer division or modulo by zero",
                ));
            }
            let (Some(quotient), Some(remainder)) = (a.checked_div(b), a.checked_rem(b)) else {
                return Err(SimulationError::Overflow("integer result is too large"));
            };
            // Floor toward negative infinity, so the remainder takes the divisor's sign.
            let adjust = remainder != 0 && ((remainder < 0) != (b < 0));
            if op == Op::FloorDiv {
                Ok(Value::Int(if adjust { quotient - 1 } else { quotient }))
            } else {
                Ok(Value::Int(if adjust { remainder + b } else { remainder }))
            }
        }
        Op::Pow => {
            if b < 0 {
                if a == 0 {
                    return Err(SimulationError::ZeroDivision(
                        "0.0 cannot be raised to a negative power",
                    ));
                }
                return Ok(Value::Float(
                    Number::Int(a).as_f64().powf(Number::Int(b).as_f64()),
                ));
            }
            let exponent = u32::try_from(b)
                .map_err(|_| SimulationError::Overflow("integer result is too large"))?;
            int_result(a.checked_pow(exponent))
        }
        _ => Err(SimulationError::Type(format!(
            "operator {} is not arithmetic",
            op.symbol()
        ))),
    }
}

fn float_binary(op: Op, a: f64, b: f64) -> Result<Value, SimulationError> {
    let value = match op {
        Op::Add => a + b,
        Op::Sub => a - b,
        Op::Mul => a * b,
        Op::Div => {
            if b == 0.0 {
                return Err(SimulationError::ZeroDivision("float division by zero"));
            }
            a / b
        }
        Op::FloorDiv => {
            if b == 0.0 {
                return Err(SimulationError::ZeroDivision("float floor division by zero"));
            }
            (a / b).floor()
        }
        Op::Mod => {
            if b == 0.0 {
                return Err(SimulationError::ZeroDivision("float modulo"));
            }
            a - b * (a / b).floor()
        }
        Op::Pow => {
            if a == 0.0 && b < 0.0 {
                return Err(SimulationError::ZeroDivision(
                    "0.0 cannot be raised to a negative power",
                ));
            }
            a.powf(b)
        }
        _ => {
            return Err(SimulationError::Type(format!(
                "operator {} is not arithmetic",
                op.symbol()
            )));
        }
    };
    Ok(Value::Float(value))
}

fn compare(op: Op, left: &Value, right: &Value) -> Result<bool, SimulationError> {
    match op {
        Op::Eq => Ok(left.loose_eq(right)),
        Op::Ne => Ok(!left.loose_eq(right)),
        Op::Lt => Ok(left.ordering(right, "<")?.is_lt()),
        Op::Le => Ok(left.ordering(right, "<=")?.is_le()),
        Op::Gt => Ok(left.ordering(right, ">")?.is_gt()),
        Op::Ge => Ok(left.ordering(right, ">=")?.is_ge()),
        other => Err(SimulationError::Type(format!(
            "operator {} is not a comparison",
            other.symbol()
        ))),
    }
}

//
// ─── BUILTINS ──────────────────────────────────────────────────────────────────
//

fn call_builtin(function: &str, args: &[Value]) -> Result<Value, SimulationError> {
    let arity = |expected: usize| {
        SimulationError::Type(format!(
            "{function}() takes {expected} argument(s) ({} given)",
            args.len()
        ))
    };
    match function {
        "str" => match args {
            [] => Ok(Value::Str(String::new())),
            [value] => Ok(Value::Str(value.to_string())),
            _ => Err(arity(1)),
        },
        "int" => match args {
            [] => Ok(Value::Int(0)),
            [value] => to_int(value),
            _ => Err(arity(1)),
        },
        "float" => match args {
            [] => Ok(Value::Float(0.0)),
            [value] => to_float(value),
            _ => Err(arity(1)),
        },
        "bool" => match args {
            [] => Ok(Value::Bool(false)),
            [value] => Ok(Value::Bool(value.is_truthy())),
            _ => Err(arity(1)),
        },
        "len" => match args {
            [Value::Str(text)] => Ok(Value::Int(
                i64::try_from(text.chars().count()).unwrap_or(i64::MAX),
            )),
            [other] => Err(SimulationError::Type(format!(
                "object of type '{}' has no len()",
                other.type_name()
            ))),
            _ => Err(arity(1)),
        },
        "abs" => match args {
            [value] => match value.as_number() {
                Some(Number::Int(n)) => int_result(n.checked_abs()),
                Some(Number::Float(f)) => Ok(Value::Float(f.abs())),
                None => Err(SimulationError::Type(format!(
                    "bad operand type for abs(): '{}'",
                    value.type_name()
                ))),
            },
            _ => Err(arity(1)),
        },
        "round" => round(args),
        "max" | "min" => extreme(function, args),
        "type" => Err(SimulationError::Type("type() is not supported".into())),
        _ => Err(SimulationError::UnknownName(function.to_owned())),
    }
}

fn to_int(value: &Value) -> Result<Value, SimulationError> {
    match value {
        Value::Str(text) => text
            .trim()
            .replace('_', "")
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| {
                SimulationError::Value(format!(
                    "invalid literal for int() with base 10: {}",
                    value.repr()
                ))
            }),
        Value::Float(f) => {
            if !f.is_finite() {
                return Err(SimulationError::Overflow("cannot convert float to integer"));
            }
            let truncated = f.trunc();
            #[allow(clippy::cast_precision_loss)]
            let in_range = truncated >= i64::MIN as f64 && truncated < i64::MAX as f64;
            if !in_range {
                return Err(SimulationError::Overflow("integer result is too large"));
            }
            #[allow(clippy::cast_possible_truncation)]
            let truncated = truncated as i64;
            Ok(Value::Int(truncated))
        }
        Value::Int(_) | Value::Bool(_) => value
            .as_number()
            .map(Number::into_value)
            .ok_or(SimulationError::Overflow("integer result is too large")),
        Value::None => Err(SimulationError::Type(
            "int() argument must be a string or a number, not 'NoneType'".into(),
        )),
    }
}

fn to_float(value: &Value) -> Result<Value, SimulationError> {
    match value {
        Value::Str(text) => {
            let trimmed = text.trim();
            let parsed = match trimmed.to_ascii_lowercase().as_str() {
                "inf" | "+inf" | "infinity" => Some(f64::INFINITY),
                "-inf" | "-infinity" => Some(f64::NEG_INFINITY),
                "nan" => Some(f64::NAN),
                _ => trimmed.parse::<f64>().ok(),
            };
            parsed.map(Value::Float).ok_or_else(|| {
                SimulationError::Value(format!(
                    "could not convert string to float: {}",
                    value.repr()
                ))
            })
        }
        Value::None => Err(SimulationError::Type(
            "float() argument must be a string or a number, not 'NoneType'".into(),
        )),
        number => Ok(Value::Float(
            number.as_number().map_or(0.0, Number::as_f64),
        )),
    }
}

fn round(args: &[Value]) -> Result<Value, SimulationError> {
    let (value, digits) = match args {
        [value] => (value, None),
        [value, Value::Int(digits)] => (value, Some(*digits)),
        [_, Value::None] => (&args[0], None),
        _ => {
            return Err(SimulationError::Type(
                "round() expects a number and optional integer digits".into(),
            ));
        }
    };
    let number = value.as_number().ok_or_else(|| {
        SimulationError::Type(format!(
            "type {} doesn't define __round__ method",
            value.type_name()
        ))
    })?;

    match (number, digits) {
        (Number::Int(n), _) => Ok(Value::Int(n)),
        (Number::Float(f), None) => to_int(&Value::Float(f.round_ties_even())),
        (Number::Float(f), Some(digits)) => {
            let digits = i32::try_from(digits.clamp(-308, 308)).unwrap_or(0);
            let scale = 10_f64.powi(digits);
            Ok(Value::Float((f * scale).round_ties_even() / scale))
        }
    }
}

fn extreme(function: &str, args: &[Value]) -> Result<Value, SimulationError> {
    let mut values: Vec<Value> = match args {
        [] => {
            return Err(SimulationError::Type(format!(
                "{function} expected at least 1 argument, got 0"
            )));
        }
        [Value::Str(text)] => text.chars().map(|c| Value::Str(c.to_string())).collect(),
        [other] => {
            return Err(SimulationError::Type(format!(
                "'{}' object is not iterable",
                other.type_name()
            )));
        }
        many => many.to_vec(),
    };
    if values.is_empty() {
        return Err(SimulationError::Value(format!(
            "{function}() arg is an empty sequence"
        )));
    }

    let mut best = values.remove(0);
    for candidate in values {
        let replace = if function == "max" {
            candidate.ordering(&best, ">")?.is_gt()
        } else {
            candidate.ordering(&best, "<")?.is_lt()
        };
        if replace {
            best = candidate;
        }
    }
    Ok(best)
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_is_letter = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            out.push(c);
            previous_is_letter = false;
        }
    }
    out
}

//
// ─── FORMAT FIELDS ─────────────────────────────────────────────────────────────
//

enum Segment {
    Text(String),
    Field(String),
}

/// Split a template into literal text and `{...}` fields; `{{` and `}}`
/// are literal braces. Braces inside quoted strings of a field do not count.
fn split_fields(body: &str) -> Result<Vec<Segment>, SimulationError> {
    let chars: Vec<char> = body.chars().collect();
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '{' if chars.get(i + 1) == Some(&'{') => {
                text.push('{');
                i += 2;
            }
            '}' if chars.get(i + 1) == Some(&'}') => {
                text.push('}');
                i += 2;
            }
            '}' => {
                return Err(SimulationError::Syntax("f-string: single '}' is not allowed".into()));
            }
            '{' => {
                if !text.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut text)));
                }
                let mut depth = 1;
                let mut quote: Option<char> = None;
                let mut j = i + 1;
                while j < chars.len() {
                    let c = chars[j];
                    match quote {
                        Some(q) if c == q => quote = None,
                        Some(_) => {}
                        None => match c {
                            '\'' | '"' => quote = Some(c),
                            '{' | '(' | '[' => depth += 1,
                            '}' | ')' | ']' => {
                                depth -= 1;
                                if depth == 0 && c == '}' {
                                    break;
                                }
                            }
                            _ => {}
                        },
                    }
                    j += 1;
                }
                if j >= chars.len() {
                    return Err(SimulationError::Syntax("f-string: expecting '}'".into()));
                }
                segments.push(Segment::Field(chars[i + 1..j].iter().collect()));
                i = j + 1;
            }
            c => {
                text.push(c);
                i += 1;
            }
        }
    }
    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    Ok(segments)
}

struct Field<'a> {
    expression: &'a str,
    conversion: Option<char>,
    spec: &'a str,
}

/// Split `expr!r:spec` at the top level (outside quotes and brackets).
fn parse_field(field: &str) -> Field<'_> {
    let mut depth = 0_i32;
    let mut quote: Option<char> = None;
    let mut conversion_at = None;
    let mut spec_at = None;

    for (index, c) in field.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' => quote = Some(c),
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth -= 1,
                '!' if depth == 0
                    && conversion_at.is_none()
                    && !field[index + 1..].starts_with('=') =>
                {
                    conversion_at = Some(index);
                }
                ':' if depth == 0 => {
                    spec_at = Some(index);
                    break;
                }
                _ => {}
            },
        }
    }

    let expression_end = conversion_at.or(spec_at).unwrap_or(field.len());
    let conversion = conversion_at.and_then(|at| field[at + 1..].chars().next());
    let spec = spec_at.map_or("", |at| &field[at + 1..]);
    Field {
        expression: &field[..expression_end],
        conversion,
        spec,
    }
}

fn render_field(
    value: &Value,
    conversion: Option<char>,
    spec: &str,
) -> Result<String, SimulationError> {
    let converted = match conversion {
        None => None,
        Some('s') => Some(Value::Str(value.to_string())),
        Some('r' | 'a') => Some(Value::Str(value.repr())),
        Some(other) => {
            return Err(SimulationError::Syntax(format!(
                "f-string: invalid conversion character '{other}'"
            )));
        }
    };
    apply_spec(converted.as_ref().unwrap_or(value), spec)
}

/// Subset of the format-spec mini language: `[[fill]align][width][.precision][type]`
/// with align in `<>^` and type in `d f % s`.
fn apply_spec(value: &Value, spec: &str) -> Result<String, SimulationError> {
    if spec.is_empty() {
        return Ok(value.to_string());
    }
    let invalid = || SimulationError::Value(format!("Invalid format specifier '{spec}'"));
    let chars: Vec<char> = spec.chars().collect();
    let mut i = 0;

    let mut fill = ' ';
    let mut align = None;
    if chars.len() >= 2 && matches!(chars[1], '<' | '>' | '^') {
        fill = chars[0];
        align = Some(chars[1]);
        i = 2;
    } else if matches!(chars[0], '<' | '>' | '^') {
        align = Some(chars[0]);
        i = 1;
    }

    let width_start = i;
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    let width: usize = if i > width_start {
        chars[width_start..i]
            .iter()
            .collect::<String>()
            .parse()
            .map_err(|_| invalid())?
    } else {
        0
    };

    let mut precision = None;
    if i < chars.len() && chars[i] == '.' {
        i += 1;
        let start = i;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
        if i == start {
            return Err(invalid());
        }
        precision = Some(
            chars[start..i]
                .iter()
                .collect::<String>()
                .parse::<usize>()
                .map_err(|_| invalid())?,
        );
    }

    let kind = chars.get(i).copied();
    if i + usize::from(kind.is_some()) != chars.len() {
        return Err(invalid());
    }
    check_len(width, "format width is too large")?;
    check_len(precision.unwrap_or(0), "format precision is too large")?;

    let body = match (kind, value) {
        (Some('d'), Value::Int(n)) => n.to_string(),
        (Some('d'), Value::Bool(b)) => i64::from(*b).to_string(),
        (Some('d'), other) => {
            return Err(SimulationError::Value(format!(
                "Unknown format code 'd' for object of type '{}'",
                other.type_name()
            )));
        }
        (Some('f'), other) => {
            let number = other.as_number().ok_or_else(|| {
                SimulationError::Value(format!(
                    "Unknown format code 'f' for object of type '{}'",
                    other.type_name()
                ))
            })?;
            format!("{:.*}", precision.unwrap_or(6), number.as_f64())
        }
        (Some('%'), other) => {
            let number = other.as_number().ok_or_else(invalid)?;
            format!("{:.*}%", precision.unwrap_or(6), number.as_f64() * 100.0)
        }
        (Some('s') | None, Value::Str(text)) => match precision {
            Some(max) => text.chars().take(max).collect(),
            None => text.clone(),
        },
        (None, Value::Float(f)) => match precision {
            Some(digits) => trim_general(*f, digits),
            None => format_float(*f),
        },
        (None, other) => other.to_string(),
        (Some(_), _) => return Err(invalid()),
    };

    let length = body.chars().count();
    if length >= width {
        return Ok(body);
    }
    let padding = width - length;
    let numeric = value.as_number().is_some();
    let pad = |count: usize| std::iter::repeat_n(fill, count).collect::<String>();
    Ok(match align.unwrap_or(if numeric { '>' } else { '<' }) {
        '>' => format!("{}{body}", pad(padding)),
        '^' => format!("{}{body}{}", pad(padding / 2), pad(padding - padding / 2)),
        _ => format!("{body}{}", pad(padding)),
    })
}

/// `{x:.3}` on a float: `digits` significant digits, trailing zeros removed.
fn trim_general(value: f64, digits: usize) -> String {
    if value == 0.0 || !value.is_finite() {
        return format_float(value);
    }
    let digits = digits.max(1);
    #[allow(clippy::cast_possible_truncation)]
    let magnitude = value.abs().log10().floor() as i64;
    let decimals = usize::try_from((i64::try_from(digits).unwrap_or(1) - 1 - magnitude).max(0))
        .unwrap_or(0);
    let fixed = format!("{value:.decimals$}");
    if fixed.contains('.') {
        fixed.trim_end_matches('0').trim_end_matches('.').to_owned()
    } else {
        fixed
    }
}
