//! Safe boolean-expression evaluator shared by both engines.
//!
//! Guards, node tests, preconditions, and success/failure criteria are all
//! evaluated through this one closed grammar: name references, literals,
//! the six comparison operators, and `and`/`or`. There is deliberately no
//! function call syntax and no escape hatch into the host language, so
//! expression text in a workflow file can never execute arbitrary code.
//!
//! Failure semantics: any lex/parse error, any reference to an undefined
//! name, and any unsupported operation makes the expression evaluate to
//! `false`. Guards fail safe; they never raise.

use std::cmp::Ordering;

use crate::core::value::{Context, Value};
use crate::olog_debug;

/// Evaluate a guard expression against a context.
///
/// The expression is trimmed and case-folded first; an empty expression or
/// the literal `true` short-circuits to `true`. `&&`/`||` are accepted as
/// aliases for `and`/`or`. Note that case-folding applies to the whole
/// expression, so context keys are expected to be lowercase, and resolving
/// `none` requires a literal `none` key bound in the context.
pub fn evaluate(expression: &str, context: &Context) -> bool {
    let normalized = expression.trim().to_lowercase();
    if normalized.is_empty() || normalized == "true" {
        return true;
    }
    let normalized = normalized.replace("&&", " and ").replace("||", " or ");

    match parse(&normalized).and_then(|expr| eval(&expr, context)) {
        Ok(value) => value.truthy(),
        Err(err) => {
            olog_debug!("guard '{}' evaluated false: {}", expression, err.0);
            false
        }
    }
}

struct EvalError(String);

impl EvalError {
    fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

type EvalResult<T> = std::result::Result<T, EvalError>;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    LParen,
    RParen,
}

fn lex(input: &str) -> EvalResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        ident.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(match ident.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "true" => Token::Bool(true),
                    "false" => Token::Bool(false),
                    _ => Token::Ident(ident),
                });
            }
            c if c.is_ascii_digit() || c == '-' => {
                let mut number = String::new();
                if c == '-' {
                    number.push(c);
                    chars.next();
                    if !chars.peek().is_some_and(|c| c.is_ascii_digit()) {
                        return Err(EvalError::new("dangling '-'"));
                    }
                }
                let mut is_float = false;
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() {
                        number.push(c);
                        chars.next();
                    } else if c == '.' && !is_float {
                        is_float = true;
                        number.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if is_float {
                    let value: f64 = number
                        .parse()
                        .map_err(|_| EvalError::new(format!("bad float literal: {number}")))?;
                    tokens.push(Token::Float(value));
                } else {
                    let value: i64 = number
                        .parse()
                        .map_err(|_| EvalError::new(format!("bad int literal: {number}")))?;
                    tokens.push(Token::Int(value));
                }
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut literal = String::new();
                loop {
                    match chars.next() {
                        Some(c) if c == quote => break,
                        Some(c) => literal.push(c),
                        None => return Err(EvalError::new("unterminated string literal")),
                    }
                }
                tokens.push(Token::Str(literal));
            }
            '=' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Eq);
                } else {
                    return Err(EvalError::new("single '=' is not an operator"));
                }
            }
            '!' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Ne);
                } else {
                    return Err(EvalError::new("expected '=' after '!'"));
                }
            }
            '<' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Le);
                } else {
                    tokens.push(Token::Lt);
                }
            }
            '>' => {
                chars.next();
                if chars.next_if_eq(&'=').is_some() {
                    tokens.push(Token::Ge);
                } else {
                    tokens.push(Token::Gt);
                }
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            other => return Err(EvalError::new(format!("unexpected character: {other}"))),
        }
    }

    Ok(tokens)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    Name(String),
    /// Comparison chain, pairwise like `1 < x < 10`.
    Cmp {
        first: Box<Expr>,
        rest: Vec<(CmpOp, Expr)>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

fn parse(input: &str) -> EvalResult<Expr> {
    let tokens = lex(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(EvalError::new("trailing tokens after expression"));
    }
    Ok(expr)
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn parse_or(&mut self) -> EvalResult<Expr> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.next();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> EvalResult<Expr> {
        let mut left = self.parse_comparison()?;
        while self.peek() == Some(&Token::And) {
            self.next();
            let right = self.parse_comparison()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> EvalResult<Expr> {
        let first = self.parse_operand()?;
        let mut rest = Vec::new();
        while let Some(op) = self.peek().and_then(cmp_op) {
            self.next();
            rest.push((op, self.parse_operand()?));
        }
        if rest.is_empty() {
            Ok(first)
        } else {
            Ok(Expr::Cmp {
                first: Box::new(first),
                rest,
            })
        }
    }

    fn parse_operand(&mut self) -> EvalResult<Expr> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(Expr::Name(name)),
            Some(Token::Int(n)) => Ok(Expr::Literal(Value::Int(n))),
            Some(Token::Float(f)) => Ok(Expr::Literal(Value::Float(f))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::Str(s))),
            Some(Token::Bool(b)) => Ok(Expr::Literal(Value::Bool(b))),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(EvalError::new("expected ')'")),
                }
            }
            other => Err(EvalError::new(format!("unexpected token: {other:?}"))),
        }
    }
}

fn cmp_op(token: &Token) -> Option<CmpOp> {
    match token {
        Token::Eq => Some(CmpOp::Eq),
        Token::Ne => Some(CmpOp::Ne),
        Token::Lt => Some(CmpOp::Lt),
        Token::Le => Some(CmpOp::Le),
        Token::Gt => Some(CmpOp::Gt),
        Token::Ge => Some(CmpOp::Ge),
        _ => None,
    }
}

fn eval(expr: &Expr, context: &Context) -> EvalResult<Value> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Name(name) => context
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::new(format!("undefined name: {name}"))),
        Expr::And(left, right) => {
            let l = eval(left, context)?;
            if !l.truthy() {
                Ok(l)
            } else {
                eval(right, context)
            }
        }
        Expr::Or(left, right) => {
            let l = eval(left, context)?;
            if l.truthy() {
                Ok(l)
            } else {
                eval(right, context)
            }
        }
        Expr::Cmp { first, rest } => {
            let mut left = eval(first, context)?;
            for (op, right_expr) in rest {
                let right = eval(right_expr, context)?;
                if !compare(*op, &left, &right)? {
                    return Ok(Value::Bool(false));
                }
                left = right;
            }
            Ok(Value::Bool(true))
        }
    }
}

fn compare(op: CmpOp, left: &Value, right: &Value) -> EvalResult<bool> {
    match op {
        CmpOp::Eq => Ok(loose_eq(left, right)),
        CmpOp::Ne => Ok(!loose_eq(left, right)),
        _ => {
            let ordering = loose_cmp(left, right)?;
            Ok(match op {
                CmpOp::Lt => ordering == Ordering::Less,
                CmpOp::Le => ordering != Ordering::Greater,
                CmpOp::Gt => ordering == Ordering::Greater,
                CmpOp::Ge => ordering != Ordering::Less,
                CmpOp::Eq | CmpOp::Ne => unreachable!(),
            })
        }
    }
}

/// Equality unifying Int and Float; mismatched types are unequal, not an error.
fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Int(x), Value::Float(y)) | (Value::Float(y), Value::Int(x)) => (*x as f64) == *y,
        (Value::List(xs), Value::List(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| loose_eq(x, y))
        }
        _ => left == right,
    }
}

/// Ordering is defined for number/number and string/string only.
fn loose_cmp(left: &Value, right: &Value) -> EvalResult<Ordering> {
    if let (Some(x), Some(y)) = (left.as_f64(), right.as_f64()) {
        return x
            .partial_cmp(&y)
            .ok_or_else(|| EvalError::new("unordered numeric comparison"));
    }
    if let (Value::Str(x), Value::Str(y)) = (left, right) {
        return Ok(x.cmp(y));
    }
    Err(EvalError::new(format!(
        "cannot order {left} against {right}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(entries: &[(&str, Value)]) -> Context {
        let mut context = Context::new();
        for (k, v) in entries {
            context.insert(*k, v.clone());
        }
        context
    }

    #[test]
    fn test_empty_and_true_are_true() {
        let context = Context::new();
        assert!(evaluate("", &context));
        assert!(evaluate("  ", &context));
        assert!(evaluate("true", &context));
        assert!(evaluate("TRUE", &context));
    }

    #[test]
    fn test_simple_equality() {
        let context = ctx(&[("x", Value::Int(5)), ("y", Value::Int(10))]);
        assert!(evaluate("x == 5", &context));
        assert!(!evaluate("x == 10", &context));
        assert!(evaluate("y == 10", &context));
    }

    #[test]
    fn test_inequality() {
        let context = ctx(&[("value", Value::Int(42))]);
        assert!(evaluate("value != 0", &context));
        assert!(!evaluate("value != 42", &context));
    }

    #[test]
    fn test_comparisons() {
        let context = ctx(&[("score", Value::Int(75))]);
        assert!(evaluate("score > 50", &context));
        assert!(evaluate("score < 100", &context));
        assert!(evaluate("score >= 75", &context));
        assert!(evaluate("score <= 75", &context));
        assert!(!evaluate("score > 100", &context));
    }

    #[test]
    fn test_int_float_unification() {
        let context = ctx(&[("x", Value::Float(5.0))]);
        assert!(evaluate("x == 5", &context));
        assert!(evaluate("x >= 5", &context));
        assert!(!evaluate("x > 5", &context));
    }

    #[test]
    fn test_boolean_and() {
        let context = ctx(&[
            ("a", Value::Bool(true)),
            ("b", Value::Bool(true)),
            ("c", Value::Bool(false)),
        ]);
        assert!(evaluate("a and b", &context));
        assert!(!evaluate("a and c", &context));
        assert!(!evaluate("b and c", &context));
    }

    #[test]
    fn test_boolean_or() {
        let context = ctx(&[
            ("a", Value::Bool(true)),
            ("b", Value::Bool(false)),
            ("c", Value::Bool(false)),
        ]);
        assert!(evaluate("a or b", &context));
        assert!(!evaluate("b or c", &context));
        assert!(evaluate("a or c", &context));
    }

    #[test]
    fn test_symbolic_operators_normalized() {
        let context = ctx(&[("a", Value::Bool(true)), ("b", Value::Bool(false))]);
        assert!(evaluate("a || b", &context));
        assert!(!evaluate("a && b", &context));
        assert!(evaluate("a&&a", &context));
    }

    #[test]
    fn test_combined_conditions() {
        let context = ctx(&[
            ("x", Value::Int(10)),
            ("y", Value::Int(20)),
            ("valid", Value::Bool(true)),
        ]);
        assert!(evaluate("x < y and valid", &context));
        assert!(evaluate("x > y or valid", &context));
        assert!(!evaluate("x > y and valid", &context));
    }

    #[test]
    fn test_string_comparison() {
        let context = ctx(&[("status", Value::from("approved")), ("kind", Value::from("refund"))]);
        assert!(evaluate("status == 'approved'", &context));
        assert!(!evaluate("status == 'rejected'", &context));
        assert!(evaluate("kind != 'charge'", &context));
        assert!(evaluate("status == \"approved\"", &context));
    }

    #[test]
    fn test_none_requires_bound_key() {
        let context = ctx(&[
            ("value", Value::Null),
            ("other", Value::Int(42)),
            ("none", Value::Null),
        ]);
        assert!(evaluate("value == none", &context));
        assert!(evaluate("other != none", &context));

        // Without a bound `none`, the name is undefined and the guard fails safe.
        let bare = ctx(&[("value", Value::Null)]);
        assert!(!evaluate("value == none", &bare));
    }

    #[test]
    fn test_undefined_name_is_false_not_a_panic() {
        let context = ctx(&[("x", Value::Int(5))]);
        assert!(!evaluate("undefined_var == 5", &context));
        assert!(!evaluate("undefined == 5", &ctx(&[])));
    }

    #[test]
    fn test_short_circuit_skips_undefined_names() {
        let context = ctx(&[("a", Value::Bool(false)), ("b", Value::Bool(true))]);
        // Right side never evaluated, so the undefined name does not matter.
        assert!(!evaluate("a and missing == 1", &context));
        assert!(evaluate("b or missing == 1", &context));
    }

    #[test]
    fn test_chained_comparisons() {
        let context = ctx(&[("value", Value::Int(50))]);
        assert!(evaluate("0 < value", &context));
        assert!(evaluate("0 < value < 100", &context));
        assert!(!evaluate("0 < value < 50", &context));
    }

    #[test]
    fn test_parentheses() {
        let context = ctx(&[
            ("a", Value::Bool(true)),
            ("b", Value::Bool(false)),
            ("c", Value::Bool(false)),
        ]);
        assert!(!evaluate("a and (b or c)", &context));
        assert!(evaluate("(a and b) or a", &context));
    }

    #[test]
    fn test_negative_numbers() {
        let context = ctx(&[("delta", Value::Int(-3))]);
        assert!(evaluate("delta < 0", &context));
        assert!(evaluate("delta == -3", &context));
        assert!(evaluate("delta > -10", &context));
    }

    #[test]
    fn test_truthiness_of_bare_names() {
        let context = ctx(&[
            ("flag", Value::Bool(true)),
            ("empty", Value::from("")),
            ("items", Value::from(vec![1])),
        ]);
        assert!(evaluate("flag", &context));
        assert!(!evaluate("empty", &context));
        assert!(evaluate("items", &context));
    }

    #[test]
    fn test_mismatched_type_equality_is_inequality() {
        let context = ctx(&[("x", Value::Int(5))]);
        assert!(!evaluate("x == '5'", &context));
        assert!(evaluate("x != '5'", &context));
    }

    #[test]
    fn test_mismatched_type_ordering_fails_safe() {
        let context = ctx(&[("x", Value::Int(5)), ("s", Value::from("abc"))]);
        assert!(!evaluate("x < s", &context));
        assert!(!evaluate("s >= x", &context));
    }

    #[test]
    fn test_list_equality() {
        let context = ctx(&[("xs", Value::from(vec![1, 2]))]);
        // List literals are not part of the grammar, but name-to-name
        // comparison over lists works.
        let mut both = context.clone();
        both.insert("ys", Value::from(vec![1, 2]));
        assert!(evaluate("xs == ys", &both));
    }

    #[test]
    fn test_malformed_expressions_return_false() {
        let context = ctx(&[("x", Value::Int(5))]);
        assert!(!evaluate("x ==", &context));
        assert!(!evaluate("== 5", &context));
        assert!(!evaluate("x = 5", &context));
        assert!(!evaluate("x ! 5", &context));
        assert!(!evaluate("x == 5 and", &context));
        assert!(!evaluate("(x == 5", &context));
        assert!(!evaluate("x @ 5", &context));
        assert!(!evaluate("'unterminated", &context));
        assert!(!evaluate("len(x) == 1", &context));
    }

    #[test]
    fn test_case_folding_applies_to_whole_expression() {
        let context = ctx(&[("status", Value::from("approved"))]);
        assert!(evaluate("STATUS == 'APPROVED'", &context));
    }
}
