//! Formulas: stored knowledge, per-model references and the expression engine.

pub mod expression;
pub mod parse;
pub mod solver;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::OwnerId;

pub use expression::{BinaryOperator, Expression, UnaryFunction};
pub use parse::{parse_equation, parse_expression, Equation};
pub use solver::{EquationSolver, FormulaSolver};

/// Resolved variable values, ordered by name.
pub type Bindings = BTreeMap<String, f64>;

/// Knowledge kind tag carried by stored formulas.
pub const FORMULA_KIND: &str = "formula";

fn default_kind() -> String {
    FORMULA_KIND.to_string()
}

fn default_step() -> f64 {
    1.0
}

/// How a declared variable gets its value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    /// A fixed number.
    Number { value: f64 },
    /// An expression over other variables, e.g. `2 * a`.
    Expression { expression: String },
    /// A random draw from `min, min + step, ..., max`.
    Interval {
        min: f64,
        max: f64,
        #[serde(default = "default_step")]
        step: f64,
    },
    /// Declared without a value; the solver must find it.
    Unbound {},
}

/// A named variable of a formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    #[serde(flatten)]
    pub value: VariableValue,
}

impl Variable {
    pub fn number(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value: VariableValue::Number { value },
        }
    }

    pub fn expression(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: VariableValue::Expression {
                expression: expression.into(),
            },
        }
    }

    pub fn interval(name: impl Into<String>, min: f64, max: f64, step: f64) -> Self {
        Self {
            name: name.into(),
            value: VariableValue::Interval { min, max, step },
        }
    }

    pub fn unbound(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: VariableValue::Unbound {},
        }
    }
}

/// A formula as stored in the knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formula {
    pub equation: String,
    #[serde(default)]
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub unknown: Option<String>,
}

/// An entry of the knowledge base. Only entries of kind `formula` carry a
/// usable [`Formula`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Knowledge {
    pub id: u64,
    pub owner: OwnerId,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(flatten)]
    pub formula: Option<Formula>,
}

impl Knowledge {
    pub fn formula(id: u64, owner: OwnerId, formula: Formula) -> Self {
        Self {
            id,
            owner,
            kind: default_kind(),
            title: None,
            formula: Some(formula),
        }
    }

    pub fn is_formula(&self) -> bool {
        self.kind == FORMULA_KIND && self.formula.is_some()
    }

    pub fn into_formula(self) -> Option<Formula> {
        if self.kind == FORMULA_KIND {
            self.formula
        } else {
            None
        }
    }
}

/// A model's reference to a formula: either a stored formula id or an
/// inline equation, plus variable overrides and the unknown to solve for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalFormula {
    #[serde(default)]
    pub formula_id: Option<u64>,
    #[serde(default)]
    pub equation: Option<String>,
    #[serde(default)]
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub unknown: Option<String>,
}
