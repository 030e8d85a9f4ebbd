//! Arithmetic calculator tool
//!
//! Input is reduced to digits, `+ - * / ( ) .` and whitespace before being
//! parsed, so stray words in a spoken expression ("what is 2 plus 2") are
//! dropped rather than rejected. `**` is exponentiation and `//` is floor
//! division.

use super::{parse_args, ParameterKind, ToolArgs, ToolError, ToolHandler, ToolSpec};
use async_trait::async_trait;
use serde::Deserialize;
use std::iter::Peekable;
use std::str::Chars;
use thiserror::Error;

/// Deepest allowed nesting of parentheses, signs, and exponents
const MAX_DEPTH: usize = 64;

pub struct CalculatorTool;

#[derive(Debug, Deserialize)]
struct CalculatorInput {
    expression: String,
}

#[derive(Debug, Clone, Error, PartialEq)]
enum CalcError {
    #[error("Cannot divide by zero")]
    DivideByZero,
    #[error("Invalid mathematical expression - {0}")]
    Invalid(String),
}

impl CalculatorTool {
    pub fn spec() -> ToolSpec {
        ToolSpec::new(
            "calculator",
            "Perform mathematical calculations (add, subtract, multiply, divide, powers)",
        )
        .required(
            "expression",
            ParameterKind::String,
            "Arithmetic expression to evaluate, e.g. '(12 + 4) * 3'",
        )
    }
}

#[async_trait]
impl ToolHandler for CalculatorTool {
    async fn execute(&self, args: &ToolArgs) -> Result<String, ToolError> {
        let input: CalculatorInput = parse_args(args)?;
        let value = evaluate(&input.expression).map_err(|e| ToolError::Execution(e.to_string()))?;
        Ok(format!("{} = {value}", input.expression))
    }
}

fn sanitize(expression: &str) -> String {
    expression
        .chars()
        .filter(|c| c.is_ascii_digit() || "+-*/().".contains(*c) || c.is_whitespace())
        .collect()
}

fn evaluate(expression: &str) -> Result<f64, CalcError> {
    let cleaned = sanitize(expression);
    let mut parser = Parser {
        chars: cleaned.chars().peekable(),
        depth: 0,
    };
    let value = parser.expr()?;
    parser.skip_whitespace();
    if let Some(c) = parser.chars.next() {
        return Err(CalcError::Invalid(format!("unexpected '{c}'")));
    }
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CalcError::Invalid("result is not a finite number".to_string()))
    }
}

/// Recursive-descent parser over the sanitized expression.
///
/// ```text
/// expr   := term (('+' | '-') term)*
/// term   := unary (('*' | '/' | '//') unary)*
/// unary  := ('+' | '-') unary | power
/// power  := atom ('**' unary)?
/// atom   := number | '(' expr ')'
/// ```
///
/// Every recursive path passes through `unary`, which bounds nesting at
/// [`MAX_DEPTH`].
struct Parser<'a> {
    chars: Peekable<Chars<'a>>,
    depth: usize,
}

impl Parser<'_> {
    fn skip_whitespace(&mut self) {
        while self.chars.next_if(|c| c.is_whitespace()).is_some() {}
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_whitespace();
        self.chars.peek().copied()
    }

    fn expr(&mut self) -> Result<f64, CalcError> {
        let mut value = self.term()?;
        while let Some(op @ ('+' | '-')) = self.peek() {
            self.chars.next();
            let rhs = self.term()?;
            value = if op == '+' { value + rhs } else { value - rhs };
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64, CalcError> {
        let mut value = self.unary()?;
        loop {
            match self.peek() {
                Some('*') => {
                    self.chars.next();
                    // `**` belongs to power(); only reached for a lone `*`
                    value *= self.unary()?;
                }
                Some('/') => {
                    self.chars.next();
                    let floor = self.chars.next_if_eq(&'/').is_some();
                    let rhs = self.unary()?;
                    if rhs == 0.0 {
                        return Err(CalcError::DivideByZero);
                    }
                    value = if floor { (value / rhs).floor() } else { value / rhs };
                }
                _ => return Ok(value),
            }
        }
    }

    fn unary(&mut self) -> Result<f64, CalcError> {
        if self.depth >= MAX_DEPTH {
            return Err(CalcError::Invalid("expression nested too deeply".to_string()));
        }
        self.depth += 1;
        let value = self.signed();
        self.depth -= 1;
        value
    }

    fn signed(&mut self) -> Result<f64, CalcError> {
        match self.peek() {
            Some('-') => {
                self.chars.next();
                Ok(-self.unary()?)
            }
            Some('+') => {
                self.chars.next();
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<f64, CalcError> {
        let base = self.atom()?;
        if self.peek() == Some('*') {
            let mut lookahead = self.chars.clone();
            lookahead.next();
            if lookahead.peek() == Some(&'*') {
                self.chars.next();
                self.chars.next();
                let exponent = self.unary()?;
                return Ok(base.powf(exponent));
            }
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<f64, CalcError> {
        match self.peek() {
            Some('(') => {
                self.chars.next();
                let value = self.expr()?;
                if self.peek() == Some(')') {
                    self.chars.next();
                    Ok(value)
                } else {
                    Err(CalcError::Invalid("missing closing parenthesis".to_string()))
                }
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.number(),
            Some(c) => Err(CalcError::Invalid(format!("unexpected '{c}'"))),
            None => Err(CalcError::Invalid("unexpected end of expression".to_string())),
        }
    }

    fn number(&mut self) -> Result<f64, CalcError> {
        let mut literal = String::new();
        while let Some(c) = self.chars.next_if(|c| c.is_ascii_digit() || *c == '.') {
            literal.push(c);
        }
        literal
            .parse()
            .map_err(|_| CalcError::Invalid(format!("bad number '{literal}'")))
    }
}
