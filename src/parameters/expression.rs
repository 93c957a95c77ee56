//! Restricted arithmetic expressions for derived parameters.
//!
//! The grammar is `+ - * / ( )`, unary sign, numeric literals and parameter
//! names. Function calls, powers and any other syntax are rejected at parse
//! time.
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := factor (('*' | '/') factor)*
//! factor := '-' factor | '+' factor | number | name | '(' expr ')'
//! ```
//!
//! Binary operators are left-associative, so `a - b - c` is `(a - b) - c`.

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, multispace0, one_of},
    combinator::{map, map_res, recognize},
    multi::{fold_many0, many0},
    number::complete::recognize_float,
    sequence::{delimited, pair, preceded},
    IResult, Parser,
};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Error that can occur during expression parsing or evaluation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("Failed to parse expression: {message}")]
    ParseError { message: String },

    #[error("Undefined variable: {name}")]
    UndefinedVariable { name: String },
}

/// Result type for expression evaluation
type ExprResult<T> = Result<T, ExpressionError>;

/// Expression AST node
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Constant number
    Number(f64),

    /// Parameter reference
    Variable(String),

    /// Unary operations
    Unary(UnaryOp, Box<Expression>),

    /// Binary operations
    Binary(BinaryOp, Box<Expression>, Box<Expression>),
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
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    fn symbol(self) -> char {
        match self {
            BinaryOp::Add => '+',
            BinaryOp::Sub => '-',
            BinaryOp::Mul => '*',
            BinaryOp::Div => '/',
        }
    }

    fn from_symbol(symbol: char) -> Self {
        match symbol {
            '+' => BinaryOp::Add,
            '-' => BinaryOp::Sub,
            '*' => BinaryOp::Mul,
            _ => BinaryOp::Div,
        }
    }
}

/// Context for expression evaluation, providing variable values
pub trait EvaluationContext {
    /// Get the value of a variable
    fn get_variable(&self, name: &str) -> ExprResult<f64>;
}

impl EvaluationContext for HashMap<String, f64> {
    fn get_variable(&self, name: &str) -> ExprResult<f64> {
        self.get(name)
            .copied()
            .ok_or_else(|| ExpressionError::UndefinedVariable {
                name: name.to_string(),
            })
    }
}

impl Expression {
    /// Parse an expression, requiring the whole input to be consumed.
    ///
    /// # Examples
    ///
    /// ```
    /// use spectrafit_rs::parameters::expression::Expression;
    ///
    /// let expr = Expression::parse("pseudovoigt_amplitude_1 / 3").unwrap();
    /// assert_eq!(expr.variables(), vec!["pseudovoigt_amplitude_1".to_string()]);
    /// assert!(Expression::parse("sqrt(a)").is_err());
    /// ```
    pub fn parse(input: &str) -> ExprResult<Self> {
        if input.trim().is_empty() {
            return Err(ExpressionError::ParseError {
                message: "empty expression".to_string(),
            });
        }

        match expr_parser(input) {
            Ok((remainder, expr)) => {
                if remainder.trim().is_empty() {
                    Ok(expr)
                } else {
                    Err(ExpressionError::ParseError {
                        message: format!("unexpected input at '{}'", remainder.trim()),
                    })
                }
            }
            Err(e) => Err(ExpressionError::ParseError {
                message: format!("{}", e),
            }),
        }
    }

    /// Evaluate the expression with the given context.
    ///
    /// Division follows IEEE-754 semantics; a zero divisor yields an
    /// infinity or NaN rather than an error.
    pub fn evaluate<C: EvaluationContext + ?Sized>(&self, context: &C) -> ExprResult<f64> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Variable(name) => context.get_variable(name),
            Self::Unary(UnaryOp::Neg, inner) => Ok(-inner.evaluate(context)?),
            Self::Binary(op, left, right) => {
                let lhs = left.evaluate(context)?;
                let rhs = right.evaluate(context)?;
                Ok(match op {
                    BinaryOp::Add => lhs + rhs,
                    BinaryOp::Sub => lhs - rhs,
                    BinaryOp::Mul => lhs * rhs,
                    BinaryOp::Div => lhs / rhs,
                })
            }
        }
    }

    /// Names referenced by the expression, in first-occurrence order.
    pub fn variables(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables(&self, names: &mut Vec<String>) {
        match self {
            Self::Number(_) => {}
            Self::Variable(name) => {
                if !names.iter().any(|n| n == name) {
                    names.push(name.clone());
                }
            }
            Self::Unary(_, inner) => inner.collect_variables(names),
            Self::Binary(_, left, right) => {
                left.collect_variables(names);
                right.collect_variables(names);
            }
        }
    }

    /// Return a copy with every variable renamed through `rename`.
    pub fn rename_variables<F>(&self, rename: &F) -> Expression
    where
        F: Fn(&str) -> String,
    {
        match self {
            Self::Number(n) => Self::Number(*n),
            Self::Variable(name) => Self::Variable(rename(name)),
            Self::Unary(op, inner) => Self::Unary(*op, Box::new(inner.rename_variables(rename))),
            Self::Binary(op, left, right) => Self::Binary(
                *op,
                Box::new(left.rename_variables(rename)),
                Box::new(right.rename_variables(rename)),
            ),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Variable(name) => write!(f, "{}", name),
            Self::Unary(UnaryOp::Neg, inner) => write!(f, "-({})", inner),
            Self::Binary(op, left, right) => write!(f, "({} {} {})", left, op.symbol(), right),
        }
    }
}

fn expr_parser(input: &str) -> IResult<&str, Expression> {
    let (input, first) = term(input)?;
    fold_many0(
        pair(delimited(multispace0, one_of("+-"), multispace0), term),
        move || first.clone(),
        |lhs, (op, rhs)| Expression::Binary(BinaryOp::from_symbol(op), Box::new(lhs), Box::new(rhs)),
    )
    .parse(input)
}

fn term(input: &str) -> IResult<&str, Expression> {
    let (input, first) = factor(input)?;
    fold_many0(
        pair(delimited(multispace0, one_of("*/"), multispace0), factor),
        move || first.clone(),
        |lhs, (op, rhs)| Expression::Binary(BinaryOp::from_symbol(op), Box::new(lhs), Box::new(rhs)),
    )
    .parse(input)
}

fn factor(input: &str) -> IResult<&str, Expression> {
    delimited(
        multispace0,
        alt((negation, unary_plus, number, variable, parenthesized)),
        multispace0,
    )
    .parse(input)
}

fn negation(input: &str) -> IResult<&str, Expression> {
    map(preceded(char('-'), factor), |inner| {
        Expression::Unary(UnaryOp::Neg, Box::new(inner))
    })
    .parse(input)
}

fn unary_plus(input: &str) -> IResult<&str, Expression> {
    preceded(char('+'), factor).parse(input)
}

fn number(input: &str) -> IResult<&str, Expression> {
    map(map_res(recognize_float, str::parse::<f64>), Expression::Number).parse(input)
}

fn variable(input: &str) -> IResult<&str, Expression> {
    map(
        recognize(pair(
            alt((alpha1, tag("_"))),
            many0(alt((alphanumeric1, tag("_")))),
        )),
        |name: &str| Expression::Variable(name.to_string()),
    )
    .parse(input)
}

fn parenthesized(input: &str) -> IResult<&str, Expression> {
    delimited(char('('), expr_parser, char(')')).parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn context(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_parse_literals_and_names() {
        assert_eq!(Expression::parse("2.5").unwrap(), Expression::Number(2.5));
        assert_eq!(Expression::parse(" 1e-3 ").unwrap(), Expression::Number(1e-3));
        assert_eq!(
            Expression::parse("gaussian_center_1").unwrap(),
            Expression::Variable("gaussian_center_1".to_string())
        );
    }

    #[test]
    fn test_precedence_and_associativity() {
        let ctx = context(&[]);
        let cases = [
            ("1 + 2 * 3", 7.0),
            ("(1 + 2) * 3", 9.0),
            ("10 - 4 - 3", 3.0),
            ("16 / 4 / 2", 2.0),
            ("-2 * -3", 6.0),
            ("+4 - -1", 5.0),
            ("2*(3+(4-1))/4", 3.0),
        ];
        for (text, expected) in cases {
            let expr = Expression::parse(text).unwrap();
            assert_relative_eq!(expr.evaluate(&ctx).unwrap(), expected);
        }
    }

    #[test]
    fn test_evaluate_with_variables() {
        let ctx = context(&[("pseudovoigt_amplitude_1", 0.9), ("offset", 0.1)]);
        let expr = Expression::parse("pseudovoigt_amplitude_1 / 3 + offset").unwrap();
        assert_relative_eq!(expr.evaluate(&ctx).unwrap(), 0.4);

        let missing = Expression::parse("unknown * 2").unwrap();
        assert_eq!(
            missing.evaluate(&ctx),
            Err(ExpressionError::UndefinedVariable {
                name: "unknown".to_string()
            })
        );
    }

    #[test]
    fn test_division_by_zero_is_ieee() {
        let expr = Expression::parse("1 / 0").unwrap();
        assert!(expr.evaluate(&context(&[])).unwrap().is_infinite());
    }

    #[test]
    fn test_rejects_unsupported_syntax() {
        for text in [
            "",
            "sqrt(a)",
            "a ^ 2",
            "a ** 2",
            "a +",
            "(a",
            "a)",
            "__import__('os')",
            "a; b",
            "inf",
            "2abc",
        ] {
            let parsed = Expression::parse(text);
            if text == "inf" {
                // `inf` is a plain name, never a float literal
                assert_eq!(parsed.unwrap(), Expression::Variable("inf".to_string()));
            } else {
                assert!(parsed.is_err(), "expected '{}' to be rejected", text);
            }
        }
    }

    #[test]
    fn test_variables_and_rename() {
        let expr = Expression::parse("a * b + a / c").unwrap();
        assert_eq!(expr.variables(), vec!["a", "b", "c"]);

        let renamed = expr.rename_variables(&|name: &str| format!("{}_2", name));
        assert_eq!(renamed.variables(), vec!["a_2", "b_2", "c_2"]);
    }

    #[test]
    fn test_display_round_trips() {
        let ctx = context(&[("a", 3.0), ("b", 5.0)]);
        let expr = Expression::parse("a - b - -2 * a / b").unwrap();
        let reparsed = Expression::parse(&expr.to_string()).unwrap();
        assert_relative_eq!(
            expr.evaluate(&ctx).unwrap(),
            reparsed.evaluate(&ctx).unwrap()
        );
    }
}
