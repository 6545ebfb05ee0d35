//! Bounded expression interpreter for callback return values.
//!
//! A callback stub's declared `return` expression ("`a-b`", "`a>=b`", ...)
//! is evaluated in a scope holding *only* the declared parameter names
//! bound to the received arguments. The grammar is deliberately tiny —
//! arithmetic, comparison, parentheses, literals — never a general eval.
//!
//! ```text
//! comparison := additive (( "==" | "!=" | "<" | "<=" | ">" | ">=" ) additive)?
//! additive   := multiplicative (( "+" | "-" ) multiplicative)*
//! multiplicative := unary (( "*" | "/" | "%" ) unary)*
//! unary      := "-" unary | primary
//! primary    := number | string | identifier | "(" comparison ")"
//! ```
//!
//! Semantics follow the reference runtimes: `/` always yields a float,
//! `%` is integer-only, mixed int/float arithmetic widens to float.

use std::collections::BTreeMap;
use thiserror::Error;
use unicall_types::{ErrorCode, Value};

/// Expression evaluation failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExprError {
    /// The expression text does not match the grammar.
    #[error("parse error: {0}")]
    Parse(String),

    /// An identifier is not among the bound parameter names.
    #[error("unbound name: {0}")]
    Unbound(String),

    /// Operands have no defined behavior for the operator.
    #[error("type error: {0}")]
    Type(String),

    /// Division or modulo by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// Integer arithmetic left the 64-bit range.
    #[error("integer overflow")]
    Overflow,
}

impl ErrorCode for ExprError {
    fn code(&self) -> &'static str {
        match self {
            Self::Parse(_) => "EXPR_PARSE",
            Self::Unbound(_) => "EXPR_UNBOUND_NAME",
            Self::Type(_) => "EXPR_TYPE",
            Self::DivisionByZero => "EXPR_DIVISION_BY_ZERO",
            Self::Overflow => "EXPR_OVERFLOW",
        }
    }

    fn is_recoverable(&self) -> bool {
        false
    }
}

/// Evaluates `expr` against the bound names in `scope`.
///
/// # Errors
///
/// Any [`ExprError`]; callers treat every failure as a soft fallback to
/// the literal return value.
pub fn eval(expr: &str, scope: &BTreeMap<String, Value>) -> Result<Value, ExprError> {
    let tokens = lex(expr)?;
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.comparison(scope)?;
    if parser.pos != parser.tokens.len() {
        return Err(ExprError::Parse(format!(
            "unexpected trailing input in '{expr}'"
        )));
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
}

fn lex(expr: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = expr.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '+' | '-' | '*' | '/' | '%' => {
                tokens.push(Token::Op(match c {
                    '+' => "+",
                    '-' => "-",
                    '*' => "*",
                    '/' => "/",
                    _ => "%",
                }));
                i += 1;
            }
            '=' | '!' | '<' | '>' => {
                let two = chars.get(i + 1) == Some(&'=');
                let op = match (c, two) {
                    ('=', true) => "==",
                    ('!', true) => "!=",
                    ('<', true) => "<=",
                    ('>', true) => ">=",
                    ('<', false) => "<",
                    ('>', false) => ">",
                    _ => return Err(ExprError::Parse(format!("stray '{c}'"))),
                };
                tokens.push(Token::Op(op));
                i += if two { 2 } else { 1 };
            }
            '\'' | '"' => {
                let quote = c;
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end] != quote {
                    end += 1;
                }
                if end == chars.len() {
                    return Err(ExprError::Parse("unterminated string".into()));
                }
                tokens.push(Token::Str(chars[start..end].iter().collect()));
                i = end + 1;
            }
            _ if c.is_ascii_digit() => {
                let start = i;
                let mut is_float = false;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    if chars[i] == '.' {
                        is_float = true;
                    }
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                if is_float {
                    let f = text
                        .parse::<f64>()
                        .map_err(|_| ExprError::Parse(format!("bad number '{text}'")))?;
                    tokens.push(Token::Float(f));
                } else {
                    let n = text
                        .parse::<i64>()
                        .map_err(|_| ExprError::Parse(format!("bad number '{text}'")))?;
                    tokens.push(Token::Int(n));
                }
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            _ => return Err(ExprError::Parse(format!("unexpected character '{c}'"))),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn take_op(&mut self, ops: &[&str]) -> Option<&'static str> {
        if let Some(Token::Op(op)) = self.peek() {
            if ops.contains(op) {
                let op = *op;
                self.pos += 1;
                return Some(op);
            }
        }
        None
    }

    fn comparison(&mut self, scope: &BTreeMap<String, Value>) -> Result<Value, ExprError> {
        let left = self.additive(scope)?;
        if let Some(op) = self.take_op(&["==", "!=", "<", "<=", ">", ">="]) {
            let right = self.additive(scope)?;
            return compare(op, &left, &right);
        }
        Ok(left)
    }

    fn additive(&mut self, scope: &BTreeMap<String, Value>) -> Result<Value, ExprError> {
        let mut left = self.multiplicative(scope)?;
        while let Some(op) = self.take_op(&["+", "-"]) {
            let right = self.multiplicative(scope)?;
            left = arithmetic(op, &left, &right)?;
        }
        Ok(left)
    }

    fn multiplicative(&mut self, scope: &BTreeMap<String, Value>) -> Result<Value, ExprError> {
        let mut left = self.unary(scope)?;
        while let Some(op) = self.take_op(&["*", "/", "%"]) {
            let right = self.unary(scope)?;
            left = arithmetic(op, &left, &right)?;
        }
        Ok(left)
    }

    fn unary(&mut self, scope: &BTreeMap<String, Value>) -> Result<Value, ExprError> {
        if self.take_op(&["-"]).is_some() {
            return match self.unary(scope)? {
                Value::Int(i) => i.checked_neg().map(Value::Int).ok_or(ExprError::Overflow),
                Value::Float(f) => Ok(Value::Float(-f)),
                other => Err(ExprError::Type(format!(
                    "cannot negate {}",
                    other.type_name()
                ))),
            };
        }
        self.primary(scope)
    }

    fn primary(&mut self, scope: &BTreeMap<String, Value>) -> Result<Value, ExprError> {
        let token = self
            .peek()
            .cloned()
            .ok_or_else(|| ExprError::Parse("unexpected end of expression".into()))?;
        self.pos += 1;
        match token {
            Token::Int(i) => Ok(Value::Int(i)),
            Token::Float(f) => Ok(Value::Float(f)),
            Token::Str(s) => Ok(Value::Str(s)),
            Token::Ident(name) => scope
                .get(&name)
                .cloned()
                .ok_or(ExprError::Unbound(name)),
            Token::LParen => {
                let inner = self.comparison(scope)?;
                match self.peek() {
                    Some(Token::RParen) => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    _ => Err(ExprError::Parse("missing ')'".into())),
                }
            }
            other => Err(ExprError::Parse(format!("unexpected token {other:?}"))),
        }
    }
}

fn arithmetic(op: &str, left: &Value, right: &Value) -> Result<Value, ExprError> {
    // String concatenation is the one non-numeric case.
    if op == "+" {
        if let (Value::Str(a), Value::Str(b)) = (left, right) {
            return Ok(Value::Str(format!("{a}{b}")));
        }
    }

    match (left, right) {
        // Checked ops: expression text comes from the wire, an overflow
        // must surface as a soft failure, never a panic.
        (Value::Int(a), Value::Int(b)) => match op {
            "+" => a.checked_add(*b).map(Value::Int).ok_or(ExprError::Overflow),
            "-" => a.checked_sub(*b).map(Value::Int).ok_or(ExprError::Overflow),
            "*" => a.checked_mul(*b).map(Value::Int).ok_or(ExprError::Overflow),
            "/" => {
                if *b == 0 {
                    Err(ExprError::DivisionByZero)
                } else {
                    Ok(Value::Float(*a as f64 / *b as f64))
                }
            }
            "%" => {
                if *b == 0 {
                    Err(ExprError::DivisionByZero)
                } else {
                    a.checked_rem(*b).map(Value::Int).ok_or(ExprError::Overflow)
                }
            }
            _ => unreachable!("unknown arithmetic op"),
        },
        _ => {
            let (a, b) = (
                left.as_float()
                    .ok_or_else(|| type_err(op, left, right))?,
                right
                    .as_float()
                    .ok_or_else(|| type_err(op, left, right))?,
            );
            match op {
                "+" => Ok(Value::Float(a + b)),
                "-" => Ok(Value::Float(a - b)),
                "*" => Ok(Value::Float(a * b)),
                "/" => {
                    if b == 0.0 {
                        Err(ExprError::DivisionByZero)
                    } else {
                        Ok(Value::Float(a / b))
                    }
                }
                "%" => Err(ExprError::Type("'%' requires integers".into())),
                _ => unreachable!("unknown arithmetic op"),
            }
        }
    }
}

fn compare(op: &str, left: &Value, right: &Value) -> Result<Value, ExprError> {
    let ordering = match (left, right) {
        (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.partial_cmp(b),
        _ => {
            let a = left.as_float().ok_or_else(|| type_err(op, left, right))?;
            let b = right.as_float().ok_or_else(|| type_err(op, left, right))?;
            a.partial_cmp(&b)
        }
    };
    let Some(ordering) = ordering else {
        return Ok(Value::Bool(false));
    };
    let result = match op {
        "==" => ordering.is_eq(),
        "!=" => ordering.is_ne(),
        "<" => ordering.is_lt(),
        "<=" => ordering.is_le(),
        ">" => ordering.is_gt(),
        ">=" => ordering.is_ge(),
        _ => unreachable!("unknown comparison op"),
    };
    Ok(Value::Bool(result))
}

fn type_err(op: &str, left: &Value, right: &Value) -> ExprError {
    ExprError::Type(format!(
        "'{op}' undefined for {} and {}",
        left.type_name(),
        right.type_name()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn arithmetic_over_bound_names() {
        let s = scope(&[("a", Value::Int(2)), ("b", Value::Int(3))]);
        assert_eq!(eval("a-b", &s).unwrap(), Value::Int(-1));
        assert_eq!(eval("a*b+1", &s).unwrap(), Value::Int(7));
        assert_eq!(eval("(a+b)*2", &s).unwrap(), Value::Int(10));
        assert_eq!(eval("-a", &s).unwrap(), Value::Int(-2));
    }

    #[test]
    fn division_widens_to_float() {
        let s = scope(&[("a", Value::Int(1)), ("b", Value::Int(2))]);
        assert_eq!(eval("a/b", &s).unwrap(), Value::Float(0.5));
    }

    #[test]
    fn modulo_is_integer_only() {
        let s = scope(&[("a", Value::Int(7)), ("b", Value::Int(3))]);
        assert_eq!(eval("a%b", &s).unwrap(), Value::Int(1));
        let f = scope(&[("a", Value::Float(7.0)), ("b", Value::Float(3.0))]);
        assert!(matches!(eval("a%b", &f), Err(ExprError::Type(_))));
    }

    #[test]
    fn comparisons() {
        let s = scope(&[("a", Value::Int(2)), ("b", Value::Int(3))]);
        assert_eq!(eval("a<b", &s).unwrap(), Value::Bool(true));
        assert_eq!(eval("a>=b", &s).unwrap(), Value::Bool(false));
        assert_eq!(eval("a+1==b", &s).unwrap(), Value::Bool(true));
    }

    #[test]
    fn mixed_numeric_widening() {
        let s = scope(&[("a", Value::Int(1)), ("x", Value::Float(0.5))]);
        assert_eq!(eval("a+x", &s).unwrap(), Value::Float(1.5));
        assert_eq!(eval("x<a", &s).unwrap(), Value::Bool(true));
    }

    #[test]
    fn string_literals_and_concat() {
        let s = scope(&[("name", Value::Str("Auto".into()))]);
        assert_eq!(
            eval("'Unit'+name", &s).unwrap(),
            Value::Str("UnitAuto".into())
        );
        assert_eq!(eval("name=='Auto'", &s).unwrap(), Value::Bool(true));
    }

    #[test]
    fn unbound_name_fails() {
        assert_eq!(
            eval("missing", &BTreeMap::new()),
            Err(ExprError::Unbound("missing".into()))
        );
    }

    #[test]
    fn division_by_zero() {
        let s = scope(&[("a", Value::Int(1)), ("b", Value::Int(0))]);
        assert_eq!(eval("a/b", &s), Err(ExprError::DivisionByZero));
        assert_eq!(eval("a%b", &s), Err(ExprError::DivisionByZero));
    }

    #[test]
    fn integer_overflow_is_an_error() {
        let s = scope(&[("a", Value::Int(i64::MAX)), ("b", Value::Int(i64::MIN))]);
        assert_eq!(eval("a+1", &s), Err(ExprError::Overflow));
        assert_eq!(eval("b-1", &s), Err(ExprError::Overflow));
        assert_eq!(eval("a*2", &s), Err(ExprError::Overflow));
        assert_eq!(eval("-b", &s), Err(ExprError::Overflow));
        assert_eq!(eval("b%-1", &s), Err(ExprError::Overflow));
    }

    #[test]
    fn parse_errors() {
        let s = BTreeMap::new();
        assert!(matches!(eval("1 +", &s), Err(ExprError::Parse(_))));
        assert!(matches!(eval("(1", &s), Err(ExprError::Parse(_))));
        assert!(matches!(eval("1 ~ 2", &s), Err(ExprError::Parse(_))));
        assert!(matches!(eval("1 2", &s), Err(ExprError::Parse(_))));
    }

    #[test]
    fn no_function_calls_or_general_eval() {
        let s = scope(&[("a", Value::Int(1))]);
        // Identifier followed by '(' is trailing input, not a call.
        assert!(eval("a(1)", &s).is_err());
    }
}
