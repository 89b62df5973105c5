//! Expression trees for exercise formulas.
//!
//! An [`Expression`] is a plain recursive value: constants, named variables
//! (optionally carrying a bound value), binary arithmetic and unary
//! functions. Rewrites consume the tree and return a new one.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::Bindings;
use crate::error::FormulaError;

/// Binary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            BinaryOperator::Add | BinaryOperator::Sub => 1,
            BinaryOperator::Mul | BinaryOperator::Div => 2,
        }
    }

    fn apply(&self, lhs: f64, rhs: f64) -> Result<f64, FormulaError> {
        let value = match self {
            BinaryOperator::Add => lhs + rhs,
            BinaryOperator::Sub => lhs - rhs,
            BinaryOperator::Mul => lhs * rhs,
            BinaryOperator::Div => {
                if rhs == 0.0 {
                    return Err(FormulaError::DivisionByZero);
                }
                lhs / rhs
            }
        };
        finite(value, self.symbol())
    }
}

/// Unary functions, including negation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryFunction {
    Neg,
    Cos,
    Sin,
    Tan,
    Exp,
    Ln,
    Sqrt,
}

impl UnaryFunction {
    pub fn name(&self) -> &'static str {
        match self {
            UnaryFunction::Neg => "-",
            UnaryFunction::Cos => "cos",
            UnaryFunction::Sin => "sin",
            UnaryFunction::Tan => "tan",
            UnaryFunction::Exp => "exp",
            UnaryFunction::Ln => "ln",
            UnaryFunction::Sqrt => "sqrt",
        }
    }

    fn apply(&self, x: f64) -> Result<f64, FormulaError> {
        let value = match self {
            UnaryFunction::Neg => -x,
            UnaryFunction::Cos => x.cos(),
            UnaryFunction::Sin => x.sin(),
            UnaryFunction::Tan => x.tan(),
            UnaryFunction::Exp => x.exp(),
            UnaryFunction::Ln => x.ln(),
            UnaryFunction::Sqrt => x.sqrt(),
        };
        finite(value, self.name())
    }
}

impl FromStr for UnaryFunction {
    type Err = FormulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cos" => Ok(UnaryFunction::Cos),
            "sin" => Ok(UnaryFunction::Sin),
            "tan" => Ok(UnaryFunction::Tan),
            "exp" => Ok(UnaryFunction::Exp),
            "ln" => Ok(UnaryFunction::Ln),
            "sqrt" => Ok(UnaryFunction::Sqrt),
            other => Err(FormulaError::Parse(format!("unknown function: {other}"))),
        }
    }
}

fn finite(value: f64, what: &str) -> Result<f64, FormulaError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(FormulaError::NonFinite(what.to_string()))
    }
}

/// A formula expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Constant(f64),
    Variable {
        name: String,
        value: Option<f64>,
    },
    BinaryOp {
        op: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    UnaryFunc {
        func: UnaryFunction,
        operand: Box<Expression>,
    },
}

impl Expression {
    pub fn constant(value: f64) -> Self {
        Expression::Constant(value)
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Expression::Variable {
            name: name.into(),
            value: None,
        }
    }

    pub fn binary(op: BinaryOperator, left: Expression, right: Expression) -> Self {
        Expression::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(func: UnaryFunction, operand: Expression) -> Self {
        Expression::UnaryFunc {
            func,
            operand: Box::new(operand),
        }
    }

    pub fn add(left: Expression, right: Expression) -> Self {
        Self::binary(BinaryOperator::Add, left, right)
    }

    pub fn sub(left: Expression, right: Expression) -> Self {
        Self::binary(BinaryOperator::Sub, left, right)
    }

    pub fn mul(left: Expression, right: Expression) -> Self {
        Self::binary(BinaryOperator::Mul, left, right)
    }

    pub fn div(left: Expression, right: Expression) -> Self {
        Self::binary(BinaryOperator::Div, left, right)
    }

    /// Evaluate the expression.
    ///
    /// A variable uses its bound value first, then the entry in `bindings`;
    /// with neither it fails with [`FormulaError::UnboundVariable`].
    pub fn evaluate(&self, bindings: &Bindings) -> Result<f64, FormulaError> {
        match self {
            Expression::Constant(value) => Ok(*value),
            Expression::Variable { name, value } => value
                .or_else(|| bindings.get(name).copied())
                .ok_or_else(|| FormulaError::UnboundVariable(name.clone())),
            Expression::BinaryOp { op, left, right } => {
                let lhs = left.evaluate(bindings)?;
                let rhs = right.evaluate(bindings)?;
                op.apply(lhs, rhs)
            }
            Expression::UnaryFunc { func, operand } => func.apply(operand.evaluate(bindings)?),
        }
    }

    /// Bind every variable named in `bindings`. Others are left as they are.
    pub fn valuate(&mut self, bindings: &Bindings) {
        match self {
            Expression::Constant(_) => {}
            Expression::Variable { name, value } => {
                if let Some(bound) = bindings.get(name.as_str()) {
                    *value = Some(*bound);
                }
            }
            Expression::BinaryOp { left, right, .. } => {
                left.valuate(bindings);
                right.valuate(bindings);
            }
            Expression::UnaryFunc { operand, .. } => operand.valuate(bindings),
        }
    }

    pub fn contains_one_of_variables<S: AsRef<str>>(&self, names: &[S]) -> bool {
        match self {
            Expression::Constant(_) => false,
            Expression::Variable { name, .. } => names.iter().any(|n| n.as_ref() == name),
            Expression::BinaryOp { left, right, .. } => {
                left.contains_one_of_variables(names) || right.contains_one_of_variables(names)
            }
            Expression::UnaryFunc { operand, .. } => operand.contains_one_of_variables(names),
        }
    }

    /// Number of direct children whose subtree contains `name`.
    ///
    /// Leaves and unary functions count as a single branch: 1 if they
    /// contain the variable, 0 otherwise.
    pub fn count_branches_with_variable(&self, name: &str) -> usize {
        match self {
            Expression::BinaryOp { left, right, .. } => {
                usize::from(left.contains_one_of_variables(&[name]))
                    + usize::from(right.contains_one_of_variables(&[name]))
            }
            other => usize::from(other.contains_one_of_variables(&[name])),
        }
    }

    /// All variable names reachable from this node.
    pub fn variables(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables(&self, names: &mut BTreeSet<String>) {
        match self {
            Expression::Constant(_) => {}
            Expression::Variable { name, .. } => {
                names.insert(name.clone());
            }
            Expression::BinaryOp { left, right, .. } => {
                left.collect_variables(names);
                right.collect_variables(names);
            }
            Expression::UnaryFunc { operand, .. } => operand.collect_variables(names),
        }
    }

    /// Distribute a product whose factor contains `var_name` over a sum.
    ///
    /// `(a + b) * c` becomes `a * c + b * c` when only `c` contains the
    /// variable, and symmetrically for `c * (a + b)`. Products where both or
    /// neither side contain the variable are left untouched. Children are
    /// rewritten first.
    pub fn distribute_multiplication(self, var_name: &str) -> Expression {
        match self {
            Expression::BinaryOp { op, left, right } => {
                let left = left.distribute_multiplication(var_name);
                let right = right.distribute_multiplication(var_name);
                let node = Expression::binary(op, left, right);
                if op != BinaryOperator::Mul || node.count_branches_with_variable(var_name) != 1 {
                    return node;
                }
                match node {
                    Expression::BinaryOp { left, right, .. }
                        if left.is_sum() && right.contains_one_of_variables(&[var_name]) =>
                    {
                        distribute_over(*left, &right, FactorSide::Right)
                    }
                    Expression::BinaryOp { left, right, .. }
                        if right.is_sum() && left.contains_one_of_variables(&[var_name]) =>
                    {
                        distribute_over(*right, &left, FactorSide::Left)
                    }
                    other => other,
                }
            }
            Expression::UnaryFunc { func, operand } => {
                Expression::unary(func, operand.distribute_multiplication(var_name))
            }
            leaf => leaf,
        }
    }

    /// Remove trivial identities (`x * 1`, `1 * x`, `x + 0`, `0 + x`,
    /// `x - 0`, `x / 1`, `--x`) bottom-up. Idempotent.
    pub fn get_clean(self) -> Expression {
        match self {
            Expression::BinaryOp { op, left, right } => {
                let left = left.get_clean();
                let right = right.get_clean();
                match op {
                    BinaryOperator::Mul if right.is_constant(1.0) => left,
                    BinaryOperator::Mul if left.is_constant(1.0) => right,
                    BinaryOperator::Add if right.is_constant(0.0) => left,
                    BinaryOperator::Add if left.is_constant(0.0) => right,
                    BinaryOperator::Sub if right.is_constant(0.0) => left,
                    BinaryOperator::Div if right.is_constant(1.0) => left,
                    _ => Expression::binary(op, left, right),
                }
            }
            Expression::UnaryFunc { func, operand } => {
                let operand = operand.get_clean();
                match (func, operand) {
                    (
                        UnaryFunction::Neg,
                        Expression::UnaryFunc {
                            func: UnaryFunction::Neg,
                            operand: inner,
                        },
                    ) => *inner,
                    (func, operand) => Expression::unary(func, operand),
                }
            }
            leaf => leaf,
        }
    }

    pub fn is_constant(&self, expected: f64) -> bool {
        matches!(self, Expression::Constant(value) if *value == expected)
    }

    fn is_sum(&self) -> bool {
        matches!(
            self,
            Expression::BinaryOp {
                op: BinaryOperator::Add | BinaryOperator::Sub,
                ..
            }
        )
    }

    fn precedence(&self) -> u8 {
        match self {
            Expression::BinaryOp { op, .. } => op.precedence(),
            Expression::UnaryFunc {
                func: UnaryFunction::Neg,
                ..
            } => 3,
            Expression::Constant(value) if *value < 0.0 => 3,
            _ => 4,
        }
    }
}

#[derive(Clone, Copy)]
enum FactorSide {
    Left,
    Right,
}

fn distribute_over(sum: Expression, factor: &Expression, side: FactorSide) -> Expression {
    match sum {
        Expression::BinaryOp {
            op: op @ (BinaryOperator::Add | BinaryOperator::Sub),
            left,
            right,
        } => Expression::binary(
            op,
            distribute_over(*left, factor, side),
            distribute_over(*right, factor, side),
        ),
        term => match side {
            FactorSide::Right => Expression::mul(term, factor.clone()),
            FactorSide::Left => Expression::mul(factor.clone(), term),
        },
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Constant(value) => write!(f, "{value}"),
            Expression::Variable { name, .. } => f.write_str(name),
            Expression::BinaryOp { op, left, right } => {
                let prec = op.precedence();
                if left.precedence() < prec {
                    write!(f, "({left})")?;
                } else {
                    write!(f, "{left}")?;
                }
                write!(f, " {} ", op.symbol())?;
                // Operators are left-associative: an equal-precedence right
                // operand keeps its parentheses.
                if right.precedence() <= prec {
                    write!(f, "({right})")
                } else {
                    write!(f, "{right}")
                }
            }
            Expression::UnaryFunc {
                func: UnaryFunction::Neg,
                operand,
            } => {
                if operand.precedence() < 3 {
                    write!(f, "-({operand})")
                } else {
                    write!(f, "-{operand}")
                }
            }
            Expression::UnaryFunc { func, operand } => write!(f, "{}({operand})", func.name()),
        }
    }
}
