use super::SimulationError;
use super::lexer::{Op, Token};
use super::value::Value;

const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(Value),
    /// Body of an f-string; fields are parsed when evaluated.
    Format(String),
    Name(String),
    Negate(Box<Expr>),
    Plus(Box<Expr>),
    Not(Box<Expr>),
    Binary(Op, Box<Expr>, Box<Expr>),
    Compare(Box<Expr>, Vec<(Op, Expr)>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Call {
        function: String,
        args: Vec<Argument>,
    },
    Method {
        receiver: Box<Expr>,
        name: String,
        args: Vec<Argument>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Argument {
    pub keyword: Option<String>,
    pub value: Expr,
}

pub(crate) struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    depth: usize,
}

impl<'t> Parser<'t> {
    pub(crate) fn new(tokens: &'t [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    /// Parse a whole token stream as one expression.
    pub(crate) fn parse_expression(mut self) -> Result<Expr, SimulationError> {
        let expr = self.expression()?;
        self.expect_end()?;
        Ok(expr)
    }

    /// Parse a whole token stream as a call argument list (without parens).
    pub(crate) fn parse_arguments(mut self) -> Result<Vec<Argument>, SimulationError> {
        let args = self.arguments(None)?;
        self.expect_end()?;
        Ok(args)
    }

    fn expect_end(&self) -> Result<(), SimulationError> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(SimulationError::Syntax(format!(
                "unexpected {}",
                describe(token)
            ))),
        }
    }

    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&'t Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Some(Token::Name(name)) if name == keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn enter(&mut self) -> Result<(), SimulationError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(SimulationError::Syntax("expression is nested too deeply".into()));
        }
        Ok(())
    }

    /// Arguments up to `closing` (exclusive), or to the end of input.
    fn arguments(&mut self, closing: Option<&Token>) -> Result<Vec<Argument>, SimulationError> {
        let mut args = Vec::new();
        loop {
            let at_end = match closing {
                Some(token) => self.peek() == Some(token),
                None => self.peek().is_none(),
            };
            if at_end {
                return Ok(args);
            }

            let keyword = match (self.peek(), self.peek_at(1)) {
                (Some(Token::Name(name)), Some(Token::Assign)) => {
                    self.pos += 2;
                    Some(name.clone())
                }
                _ => None,
            };
            if keyword.is_none() && args.iter().any(|a: &Argument| a.keyword.is_some()) {
                return Err(SimulationError::Syntax(
                    "positional argument follows keyword argument".into(),
                ));
            }
            let value = self.expression()?;
            args.push(Argument { keyword, value });

            if !self.eat(&Token::Comma) {
                return Ok(args);
            }
        }
    }

    fn expression(&mut self) -> Result<Expr, SimulationError> {
        self.enter()?;
        let result = self.or_expr();
        self.depth -= 1;
        result
    }

    fn or_expr(&mut self) -> Result<Expr, SimulationError> {
        let mut left = self.and_expr()?;
        while self.eat_keyword("or") {
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, SimulationError> {
        let mut left = self.not_expr()?;
        while self.eat_keyword("and") {
            let right = self.not_expr()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not_expr(&mut self) -> Result<Expr, SimulationError> {
        if self.eat_keyword("not") {
            self.enter()?;
            let operand = self.not_expr();
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(operand?)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, SimulationError> {
        let first = self.additive()?;
        let mut rest = Vec::new();
        while let Some(Token::Op(op @ (Op::Eq | Op::Ne | Op::Lt | Op::Le | Op::Gt | Op::Ge))) =
            self.peek()
        {
            self.pos += 1;
            rest.push((*op, self.additive()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Compare(Box::new(first), rest))
        }
    }

    fn additive(&mut self) -> Result<Expr, SimulationError> {
        let mut left = self.term()?;
        while let Some(Token::Op(op @ (Op::Add | Op::Sub))) = self.peek() {
            self.pos += 1;
            let right = self.term()?;
            left = Expr::Binary(*op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Expr, SimulationError> {
        let mut left = self.unary()?;
        while let Some(Token::Op(op @ (Op::Mul | Op::Div | Op::FloorDiv | Op::Mod))) = self.peek()
        {
            self.pos += 1;
            let right = self.unary()?;
            left = Expr::Binary(*op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, SimulationError> {
        match self.peek() {
            Some(Token::Op(Op::Sub)) => {
                self.pos += 1;
                self.enter()?;
                let operand = self.unary();
                self.depth -= 1;
                Ok(Expr::Negate(Box::new(operand?)))
            }
            Some(Token::Op(Op::Add)) => {
                self.pos += 1;
                self.enter()?;
                let operand = self.unary();
                self.depth -= 1;
                Ok(Expr::Plus(Box::new(operand?)))
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Expr, SimulationError> {
        let base = self.postfix()?;
        if self.eat(&Token::Op(Op::Pow)) {
            self.enter()?;
            let exponent = self.unary();
            self.depth -= 1;
            return Ok(Expr::Binary(Op::Pow, Box::new(base), Box::new(exponent?)));
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<Expr, SimulationError> {
        let mut expr = self.primary()?;
        while self.eat(&Token::Dot) {
            let Some(Token::Name(name)) = self.advance() else {
                return Err(SimulationError::Syntax("expected a name after '.'".into()));
            };
            if !self.eat(&Token::LParen) {
                return Err(SimulationError::Attribute(format!(
                    "attribute '{name}' is not supported"
                )));
            }
            let args = self.arguments(Some(&Token::RParen))?;
            self.closing_paren()?;
            expr = Expr::Method {
                receiver: Box::new(expr),
                name: name.clone(),
                args,
            };
        }
        Ok(expr)
    }

    fn closing_paren(&mut self) -> Result<(), SimulationError> {
        if self.eat(&Token::RParen) {
            Ok(())
        } else {
            Err(SimulationError::Syntax("'(' was never closed".into()))
        }
    }

    fn primary(&mut self) -> Result<Expr, SimulationError> {
        let Some(token) = self.advance() else {
            return Err(SimulationError::Syntax("unexpected end of expression".into()));
        };
        match token {
            Token::Int(value) => Ok(Expr::Literal(Value::Int(*value))),
            Token::Float(value) => Ok(Expr::Literal(Value::Float(*value))),
            Token::Str { text, format } => Ok(self.string_run(text, *format)),
            Token::Name(name) => match name.as_str() {
                "True" => Ok(Expr::Literal(Value::Bool(true))),
                "False" => Ok(Expr::Literal(Value::Bool(false))),
                "None" => Ok(Expr::Literal(Value::None)),
                _ if self.eat(&Token::LParen) => {
                    let args = self.arguments(Some(&Token::RParen))?;
                    self.closing_paren()?;
                    Ok(Expr::Call {
                        function: name.clone(),
                        args,
                    })
                }
                _ => Ok(Expr::Name(name.clone())),
            },
            Token::LParen => {
                let inner = self.expression()?;
                self.closing_paren()?;
                Ok(inner)
            }
            Token::LBracket => Err(SimulationError::Syntax("lists are not supported".into())),
            other => Err(SimulationError::Syntax(format!("unexpected {}", describe(other)))),
        }
    }

    /// Adjacent string literals concatenate, e.g. `"a" f"{b}"`.
    fn string_run(&mut self, first: &str, first_format: bool) -> Expr {
        let piece = |text: &str, format: bool| {
            if format {
                Expr::Format(text.to_owned())
            } else {
                Expr::Literal(Value::Str(text.to_owned()))
            }
        };
        let mut expr = piece(first, first_format);
        while let Some(Token::Str { text, format }) = self.peek() {
            self.pos += 1;
            expr = match (expr, *format) {
                (Expr::Literal(Value::Str(mut joined)), false) => {
                    joined.push_str(text);
                    Expr::Literal(Value::Str(joined))
                }
                (left, format) => {
                    Expr::Binary(Op::Add, Box::new(left), Box::new(piece(text, format)))
                }
            };
        }
        expr
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Int(value) => format!("number {value}"),
        Token::Float(value) => format!("number {value}"),
        Token::Str { .. } => "string".into(),
        Token::Name(name) => format!("name '{name}'"),
        Token::Op(op) => format!("'{}'", op.symbol()),
        Token::LParen => "'('".into(),
        Token::RParen => "')'".into(),
        Token::LBracket => "'['".into(),
        Token::RBracket => "']'".into(),
        Token::Comma => "','".into(),
        Token::Dot => "'.'".into(),
        Token::Assign => "'='".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::lexer::tokenize;

    fn parse(source: &str) -> Result<Expr, SimulationError> {
        let tokens = tokenize(source)?;
        Parser::new(&tokens).parse_expression()
    }

    #[test]
    fn power_binds_tighter_than_unary_minus() {
        let expr = parse("-2 ** 2").unwrap();
        assert!(matches!(expr, Expr::Negate(inner) if matches!(*inner, Expr::Binary(Op::Pow, _, _))));
    }

    #[test]
    fn adjacent_plain_strings_join() {
        assert_eq!(
            parse("'a' \"b\"").unwrap(),
            Expr::Literal(Value::Str("ab".into()))
        );
    }

    #[test]
    fn keyword_arguments_are_recognised() {
        let tokens = tokenize("1, 2, sep='-'").unwrap();
        let args = Parser::new(&tokens).parse_arguments().unwrap();
        assert_eq!(args.len(), 3);
        assert_eq!(args[2].keyword.as_deref(), Some("sep"));
    }

    #[test]
    fn rejects_positional_after_keyword() {
        let tokens = tokenize("sep='-', 2").unwrap();
        assert!(Parser::new(&tokens).parse_arguments().is_err());
    }

    #[test]
    fn reports_trailing_tokens() {
        let err = parse("1 2").unwrap_err();
        assert_eq!(err, SimulationError::Syntax("unexpected number 2".into()));
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let source = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        assert!(matches!(parse(&source), Err(SimulationError::Syntax(_))));
    }
}
