//! Text form of formulas: `y = a * x + b`, `cos(t) * r`, ...

use std::fmt;

use once_cell::sync::Lazy;
use pest::iterators::{Pair, Pairs};
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;

use super::expression::{BinaryOperator, Expression, UnaryFunction};
use crate::error::FormulaError;

#[derive(Parser)]
#[grammar = "formula/grammar.pest"] // relative to project `src`
struct FormulaParser;

static PRATT: Lazy<PrattParser<Rule>> = Lazy::new(|| {
    use Assoc::*;
    use Rule::*;

    PrattParser::new()
        .op(Op::infix(add, Left) | Op::infix(sub, Left))
        .op(Op::infix(mul, Left) | Op::infix(div, Left))
        .op(Op::prefix(neg))
});

/// An equation `lhs = rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct Equation {
    pub lhs: Expression,
    pub rhs: Expression,
}

impl fmt::Display for Equation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.lhs, self.rhs)
    }
}

/// Parse a single expression.
pub fn parse_expression(input: &str) -> Result<Expression, FormulaError> {
    let mut pairs = FormulaParser::parse(Rule::formula, input).map_err(syntax_error)?;
    let expr = pairs
        .next()
        .and_then(|formula| formula.into_inner().next())
        .ok_or_else(|| FormulaError::Parse("empty formula".into()))?;
    build(expr.into_inner())
}

/// Parse an equation of the form `expr = expr`.
pub fn parse_equation(input: &str) -> Result<Equation, FormulaError> {
    let mut pairs = FormulaParser::parse(Rule::equation, input).map_err(syntax_error)?;
    let mut sides = pairs
        .next()
        .ok_or_else(|| FormulaError::Parse("empty equation".into()))?
        .into_inner();
    let (Some(lhs), Some(rhs)) = (sides.next(), sides.next()) else {
        return Err(FormulaError::Parse("equation needs two sides".into()));
    };
    Ok(Equation {
        lhs: build(lhs.into_inner())?,
        rhs: build(rhs.into_inner())?,
    })
}

fn syntax_error(err: pest::error::Error<Rule>) -> FormulaError {
    FormulaError::Parse(err.to_string())
}

fn build(pairs: Pairs<Rule>) -> Result<Expression, FormulaError> {
    PRATT
        .map_primary(build_primary)
        .map_prefix(|op, operand| match op.as_rule() {
            Rule::neg => Ok(negate(operand?)),
            rule => Err(unexpected(rule)),
        })
        .map_infix(|lhs, op, rhs| {
            let op = match op.as_rule() {
                Rule::add => BinaryOperator::Add,
                Rule::sub => BinaryOperator::Sub,
                Rule::mul => BinaryOperator::Mul,
                Rule::div => BinaryOperator::Div,
                rule => return Err(unexpected(rule)),
            };
            Ok(Expression::binary(op, lhs?, rhs?))
        })
        .parse(pairs)
}

fn build_primary(primary: Pair<Rule>) -> Result<Expression, FormulaError> {
    match primary.as_rule() {
        Rule::number => primary
            .as_str()
            .parse::<f64>()
            .map(Expression::Constant)
            .map_err(|e| FormulaError::Parse(e.to_string())),
        Rule::variable => Ok(Expression::variable(primary.as_str())),
        Rule::expr => build(primary.into_inner()),
        Rule::call => {
            let mut inner = primary.into_inner();
            let (Some(function), Some(argument)) = (inner.next(), inner.next()) else {
                return Err(FormulaError::Parse("malformed function call".into()));
            };
            let func: UnaryFunction = function.as_str().parse()?;
            Ok(Expression::unary(func, build(argument.into_inner())?))
        }
        rule => Err(unexpected(rule)),
    }
}

/// Literal negation folds into the constant so `-2` stays a number.
fn negate(operand: Expression) -> Expression {
    match operand {
        Expression::Constant(value) => Expression::Constant(-value),
        other => Expression::unary(UnaryFunction::Neg, other),
    }
}

fn unexpected(rule: Rule) -> FormulaError {
    FormulaError::Parse(format!("unexpected {rule:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::Bindings;

    fn eval(input: &str, pairs: &[(&str, f64)]) -> f64 {
        let bindings: Bindings = pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        parse_expression(input).unwrap().evaluate(&bindings).unwrap()
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(eval("1 + 2 * 3", &[]), 7.0);
        assert_eq!(eval("(1 + 2) * 3", &[]), 9.0);
        assert_eq!(eval("8 - 3 - 2", &[]), 3.0);
        assert_eq!(eval("8 / 4 / 2", &[]), 1.0);
        assert_eq!(eval("-x * 2", &[("x", 3.0)]), -6.0);
        assert_eq!(eval("2 * -x", &[("x", 3.0)]), -6.0);
    }

    #[test]
    fn functions_and_variables() {
        assert_eq!(eval("cos(0) + sqrt(x)", &[("x", 16.0)]), 5.0);
        assert_eq!(eval("cosx + 1", &[("cosx", 1.0)]), 2.0);
        assert_eq!(eval("ln(exp(2))", &[]), 2.0);
    }

    #[test]
    fn negative_literal_is_constant() {
        assert_eq!(parse_expression("-2").unwrap(), Expression::Constant(-2.0));
        assert_eq!(
            parse_expression("-x").unwrap(),
            Expression::unary(UnaryFunction::Neg, Expression::variable("x"))
        );
    }

    #[test]
    fn display_reparses_to_same_tree() {
        for input in [
            "(a + b) * c",
            "a - (b - c)",
            "a / (b * c)",
            "-(x + y) * 2.5",
            "sin(t) * r + -3",
            "a + b + c",
        ] {
            let parsed = parse_expression(input).unwrap();
            let reparsed = parse_expression(&parsed.to_string()).unwrap();
            assert_eq!(parsed, reparsed, "round trip failed for {input}");
        }
    }

    #[test]
    fn equation_sides() {
        let eq = parse_equation("y = a * x + b").unwrap();
        assert_eq!(eq.lhs, Expression::variable("y"));
        assert_eq!(eq.rhs.to_string(), "a * x + b");
        assert_eq!(eq.to_string(), "y = a * x + b");
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(matches!(parse_expression("1 +"), Err(FormulaError::Parse(_))));
        assert!(matches!(parse_expression("x = 1"), Err(FormulaError::Parse(_))));
        assert!(matches!(parse_equation("x + 1"), Err(FormulaError::Parse(_))));
        assert!(matches!(parse_expression(""), Err(FormulaError::Parse(_))));
    }
}
