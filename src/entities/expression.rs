//! Expression parsing and evaluation for entity expressions
//!
//! Entities store their expressions as source text. This module parses that
//! text into an [`Expression`] tree, reports which identifiers it references
//! (the raw material for a container's direct-reference sets), and evaluates
//! it against an [`EvaluationContext`].

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, multispace0},
    combinator::recognize,
    multi::many0,
    number::complete::double,
    sequence::pair,
    IResult, Parser,
};
use std::collections::HashMap;
use thiserror::Error;

/// Names of the functions understood by the evaluator.
pub const BUILTIN_FUNCTIONS: &[&str] = &[
    "sin", "cos", "tan", "asin", "acos", "atan", "sinh", "cosh", "tanh", "exp", "ln", "log",
    "log10", "sqrt", "abs", "min", "max", "pow",
];

/// Named constants resolved by the evaluator before the context is consulted.
pub const CONSTANTS: &[(&str, f64)] = &[("pi", std::f64::consts::PI), ("e", std::f64::consts::E)];

/// Error that can occur during expression parsing or evaluation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("Failed to parse expression: {message}")]
    ParseError { message: String },

    #[error("Undefined variable: {name}")]
    UndefinedVariable { name: String },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    #[error("Undefined function: {name}")]
    UndefinedFunction { name: String },
}

/// Result type for expression evaluation
pub type ExprResult<T> = Result<T, ExpressionError>;

/// Expression AST node
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Constant number
    Number(f64),

    /// Variable reference
    Variable(String),

    /// Unary operations
    Unary(UnaryOp, Box<Expression>),

    /// Binary operations
    Binary(BinaryOp, Box<Expression>, Box<Expression>),

    /// Function call
    Function(String, Vec<Expression>),
}

/// Unary operations
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    /// Negation (-)
    Neg,
}

/// Binary operations
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinaryOp {
    /// Addition (+)
    Add,

    /// Subtraction (-)
    Sub,

    /// Multiplication (*)
    Mul,

    /// Division (/)
    Div,

    /// Power (^)
    Pow,
}

/// Context for expression evaluation, providing variable values
pub trait EvaluationContext {
    /// Get the value of a variable
    fn get_variable(&self, name: &str) -> ExprResult<f64>;

    /// Check if a variable exists
    fn has_variable(&self, name: &str) -> bool;
}

/// Simple implementation of EvaluationContext using a HashMap
#[derive(Debug, Clone, Default)]
pub struct SimpleContext {
    /// Map of variable names to values
    variables: HashMap<String, f64>,
}

impl SimpleContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self {
            variables: HashMap::new(),
        }
    }

    /// Set a variable value
    pub fn set_variable(&mut self, name: &str, value: f64) {
        self.variables.insert(name.to_string(), value);
    }
}

impl EvaluationContext for SimpleContext {
    fn get_variable(&self, name: &str) -> ExprResult<f64> {
        self.variables.get_variable(name)
    }

    fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }
}

impl EvaluationContext for HashMap<String, f64> {
    fn get_variable(&self, name: &str) -> ExprResult<f64> {
        self.get(name)
            .copied()
            .ok_or_else(|| ExpressionError::UndefinedVariable {
                name: name.to_string(),
            })
    }

    fn has_variable(&self, name: &str) -> bool {
        self.contains_key(name)
    }
}

/// Whether `name` is a builtin function or constant and so can never name an entity.
pub fn is_builtin_name(name: &str) -> bool {
    BUILTIN_FUNCTIONS.contains(&name) || CONSTANTS.iter().any(|(c, _)| *c == name)
}

/// Whether `name` is a syntactically valid identifier.
pub fn is_identifier(name: &str) -> bool {
    match identifier(name) {
        Ok((rest, _)) => rest.is_empty(),
        Err(_) => false,
    }
}

fn constant(name: &str) -> Option<f64> {
    CONSTANTS
        .iter()
        .find(|(c, _)| *c == name)
        .map(|(_, value)| *value)
}

fn check_arity(name: &str, args: &[f64], expected: usize) -> ExprResult<()> {
    if args.len() != expected {
        return Err(ExpressionError::InvalidOperation {
            message: format!(
                "{}() requires {} argument(s), got {}",
                name,
                expected,
                args.len()
            ),
        });
    }
    Ok(())
}

fn call_builtin(name: &str, args: &[f64]) -> ExprResult<f64> {
    let unary: Option<fn(f64) -> f64> = match name {
        "sin" => Some(f64::sin),
        "cos" => Some(f64::cos),
        "tan" => Some(f64::tan),
        "asin" => Some(f64::asin),
        "acos" => Some(f64::acos),
        "atan" => Some(f64::atan),
        "sinh" => Some(f64::sinh),
        "cosh" => Some(f64::cosh),
        "tanh" => Some(f64::tanh),
        "exp" => Some(f64::exp),
        "ln" | "log" => Some(f64::ln),
        "log10" => Some(f64::log10),
        "sqrt" => Some(f64::sqrt),
        "abs" => Some(f64::abs),
        _ => None,
    };
    if let Some(f) = unary {
        check_arity(name, args, 1)?;
        return Ok(f(args[0]));
    }

    match name {
        "pow" => {
            check_arity(name, args, 2)?;
            Ok(args[0].powf(args[1]))
        }
        "max" | "min" => {
            if args.len() < 2 {
                return Err(ExpressionError::InvalidOperation {
                    message: format!("{}() requires at least 2 arguments, got {}", name, args.len()),
                });
            }
            if name == "max" {
                Ok(args.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b)))
            } else {
                Ok(args.iter().fold(f64::INFINITY, |a, &b| a.min(b)))
            }
        }
        _ => Err(ExpressionError::UndefinedFunction {
            name: name.to_string(),
        }),
    }
}

impl Expression {
    /// Parse an expression from a string
    pub fn parse(input: &str) -> ExprResult<Self> {
        match expr_parser(input.trim()) {
            Ok((remainder, expr)) => {
                // Make sure the entire input was consumed
                if remainder.trim().is_empty() {
                    Ok(expr)
                } else {
                    Err(ExpressionError::ParseError {
                        message: format!("Unexpected trailing characters: '{}'", remainder),
                    })
                }
            }
            Err(e) => Err(ExpressionError::ParseError {
                message: format!("{:?}", e),
            }),
        }
    }

    /// Evaluate the expression with the given context
    pub fn evaluate<C: EvaluationContext + ?Sized>(&self, context: &C) -> ExprResult<f64> {
        match self {
            Self::Number(n) => Ok(*n),

            Self::Variable(name) => match constant(name) {
                Some(value) => Ok(value),
                None => context.get_variable(name),
            },

            Self::Unary(op, expr) => {
                let value = expr.evaluate(context)?;
                match op {
                    UnaryOp::Neg => Ok(-value),
                }
            }

            Self::Binary(op, left, right) => {
                let lhs = left.evaluate(context)?;
                let rhs = right.evaluate(context)?;

                match op {
                    BinaryOp::Add => Ok(lhs + rhs),
                    BinaryOp::Sub => Ok(lhs - rhs),
                    BinaryOp::Mul => Ok(lhs * rhs),
                    BinaryOp::Div => {
                        if rhs == 0.0 {
                            Err(ExpressionError::DivisionByZero)
                        } else {
                            Ok(lhs / rhs)
                        }
                    }
                    BinaryOp::Pow => Ok(lhs.powf(rhs)),
                }
            }

            Self::Function(name, args) => {
                let mut evaluated_args = Vec::with_capacity(args.len());
                for arg in args {
                    evaluated_args.push(arg.evaluate(context)?);
                }
                call_builtin(name, &evaluated_args)
            }
        }
    }

    /// Find all variable names used in the expression, sorted and deduplicated.
    ///
    /// Function names and builtin constants are not variables.
    pub fn variables(&self) -> Vec<String> {
        let mut vars = Vec::new();
        self.collect_variables(&mut vars);
        vars.sort();
        vars.dedup();
        vars
    }

    fn collect_variables(&self, vars: &mut Vec<String>) {
        match self {
            Self::Number(_) => {}

            Self::Variable(name) => {
                if constant(name).is_none() {
                    vars.push(name.clone());
                }
            }

            Self::Unary(_, expr) => {
                expr.collect_variables(vars);
            }

            Self::Binary(_, left, right) => {
                left.collect_variables(vars);
                right.collect_variables(vars);
            }

            Self::Function(_, args) => {
                for arg in args {
                    arg.collect_variables(vars);
                }
            }
        }
    }
}

// Parser functions using nom

fn ws(input: &str) -> IResult<&str, &str> {
    multispace0(input)
}

fn symbol(input: &str, c: char) -> IResult<&str, char> {
    let (input, _) = ws(input)?;
    char(c).parse(input)
}

/// Parse an identifier (variable or function name)
fn identifier(input: &str) -> IResult<&str, String> {
    let mut parser = recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ));

    let (input, matched) = parser.parse(input)?;
    Ok((input, matched.to_string()))
}

/// Parse a comma-separated list of expressions (for function arguments)
fn args_list(input: &str) -> IResult<&str, Vec<Expression>> {
    let (mut remainder, first) = expr_parser(input)?;
    let mut res = vec![first];

    while let Ok((after_comma, _)) = symbol(remainder, ',') {
        let (after_expr, expr) = expr_parser(after_comma)?;
        res.push(expr);
        remainder = after_expr;
    }

    Ok((remainder, res))
}

/// Parse an identifier, optionally followed by a call argument list
fn name_or_call(input: &str) -> IResult<&str, Expression> {
    let (input, name) = identifier(input)?;

    let Ok((after_open, _)) = symbol(input, '(') else {
        return Ok((input, Expression::Variable(name)));
    };

    if let Ok((rest, _)) = symbol(after_open, ')') {
        return Ok((rest, Expression::Function(name, vec![])));
    }

    let (rest, args) = args_list(after_open)?;
    let (rest, _) = symbol(rest, ')')?;
    Ok((rest, Expression::Function(name, args)))
}

/// Parse a number
fn number(input: &str) -> IResult<&str, Expression> {
    let (input, num) = double(input)?;
    Ok((input, Expression::Number(num)))
}

/// Parse a parenthesized expression
fn parens(input: &str) -> IResult<&str, Expression> {
    let (input, _) = symbol(input, '(')?;
    let (input, expr) = expr_parser(input)?;
    let (input, _) = symbol(input, ')')?;
    Ok((input, expr))
}

/// Parse a primary expression (number, variable, function call, or parenthesized expression)
fn primary(input: &str) -> IResult<&str, Expression> {
    let (input, _) = ws(input)?;
    match input.chars().next() {
        // `double` also accepts "inf" and "nan", which would swallow identifiers
        Some(c) if c.is_ascii_digit() || c == '.' => number(input),
        Some(c) if c.is_alphabetic() || c == '_' => name_or_call(input),
        _ => parens(input),
    }
}

/// Parse a unary expression (-expr)
fn unary(input: &str) -> IResult<&str, Expression> {
    if let Ok((rest, _)) = symbol(input, '-') {
        let (rest, expr) = unary(rest)?;
        return Ok((rest, Expression::Unary(UnaryOp::Neg, Box::new(expr))));
    }
    if let Ok((rest, _)) = symbol(input, '+') {
        return unary(rest);
    }
    power(input)
}

/// Parse a power expression (expr ^ expr), right associative
fn power(input: &str) -> IResult<&str, Expression> {
    let (input, left) = primary(input)?;

    match symbol(input, '^') {
        Ok((after_op, _)) => {
            let (after_right, right) = unary(after_op)?;
            Ok((
                after_right,
                Expression::Binary(BinaryOp::Pow, Box::new(left), Box::new(right)),
            ))
        }
        Err(_) => Ok((input, left)),
    }
}

/// Parse a multiplicative expression (expr * expr, expr / expr), left associative
fn term(input: &str) -> IResult<&str, Expression> {
    let (mut input, mut left) = unary(input)?;

    loop {
        let op = if let Ok((rest, _)) = symbol(input, '*') {
            (rest, BinaryOp::Mul)
        } else if let Ok((rest, _)) = symbol(input, '/') {
            (rest, BinaryOp::Div)
        } else {
            return Ok((input, left));
        };
        let (rest, right) = unary(op.0)?;
        left = Expression::Binary(op.1, Box::new(left), Box::new(right));
        input = rest;
    }
}

/// Parse an additive expression (expr + expr, expr - expr), left associative
fn expr_parser(input: &str) -> IResult<&str, Expression> {
    let (mut input, mut left) = term(input)?;

    loop {
        let op = if let Ok((rest, _)) = symbol(input, '+') {
            (rest, BinaryOp::Add)
        } else if let Ok((rest, _)) = symbol(input, '-') {
            (rest, BinaryOp::Sub)
        } else {
            return Ok((input, left));
        };
        let (rest, right) = term(op.0)?;
        left = Expression::Binary(op.1, Box::new(left), Box::new(right));
        input = rest;
    }
}
