//! Solving an equation for its unknown.

use rand::{Rng, RngCore};

use super::parse::{parse_equation, parse_expression};
use super::{Bindings, Expression, Variable, VariableValue};
use crate::error::FormulaError;

/// Tolerance for the linearity check of the default solver.
const LINEARITY_TOLERANCE: f64 = 1e-9;

/// Turns an equation text, its variable definitions and the unknown into
/// a value for every variable.
pub trait FormulaSolver: Send + Sync {
    fn solve(
        &self,
        equation: &str,
        variables: &[Variable],
        unknown: Option<&str>,
        rng: &mut (dyn RngCore + Send),
    ) -> Result<Bindings, FormulaError>;
}

/// The default solver.
///
/// Every variable except the unknown is bound first: numbers directly,
/// intervals by a random draw, expressions once the variables they use
/// are known. An unknown given a plain number keeps it and is not solved.
/// Otherwise the unknown is isolated: directly when it stands alone on one
/// side of the equation, or by treating `lhs - rhs` as a linear function
/// of the unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct EquationSolver;

impl FormulaSolver for EquationSolver {
    fn solve(
        &self,
        equation: &str,
        variables: &[Variable],
        unknown: Option<&str>,
        rng: &mut (dyn RngCore + Send),
    ) -> Result<Bindings, FormulaError> {
        let equation = parse_equation(equation)?;
        let unknown = unknown.map(str::to_string).or_else(|| match &equation.lhs {
            Expression::Variable { name, .. } => Some(name.clone()),
            _ => None,
        });

        let mut values = bind_variables(variables, unknown.as_deref(), rng)?;
        let Some(unknown) = unknown else {
            return Ok(values);
        };
        if let Some(value) = pinned_value(variables, &unknown) {
            tracing::debug!(unknown = %unknown, value, "unknown given, not solved");
            values.insert(unknown, value);
            return Ok(values);
        }

        let value = solve_for(&equation.lhs, &equation.rhs, &unknown, &values)?;
        tracing::debug!(unknown = %unknown, value, "solved equation");
        values.insert(unknown, value);
        Ok(values)
    }
}

/// The last plain-number definition of `name`, if any.
fn pinned_value(variables: &[Variable], name: &str) -> Option<f64> {
    variables
        .iter()
        .rev()
        .find(|v| v.name == name)
        .and_then(|v| match v.value {
            VariableValue::Number { value } => Some(value),
            _ => None,
        })
}

fn bind_variables(
    variables: &[Variable],
    unknown: Option<&str>,
    rng: &mut (dyn RngCore + Send),
) -> Result<Bindings, FormulaError> {
    let mut values = Bindings::new();
    let mut pending: Vec<(&str, Expression)> = Vec::new();

    for variable in variables {
        if Some(variable.name.as_str()) == unknown {
            continue;
        }
        match &variable.value {
            VariableValue::Number { value } => {
                values.insert(variable.name.clone(), *value);
            }
            VariableValue::Interval { min, max, step } => {
                let value = draw_from_interval(&variable.name, *min, *max, *step, rng)?;
                values.insert(variable.name.clone(), value);
            }
            VariableValue::Expression { expression } => {
                pending.push((variable.name.as_str(), parse_expression(expression)?));
            }
            VariableValue::Unbound {} => {}
        }
    }

    // Expressions may reference each other in any order.
    while !pending.is_empty() {
        let ready = pending
            .iter()
            .position(|(_, expr)| expr.variables().iter().all(|v| values.contains_key(v)));
        let index = ready.unwrap_or(0);
        let (name, expr) = pending.remove(index);
        // With nothing ready this reports the first missing variable.
        let value = expr.evaluate(&values)?;
        values.insert(name.to_string(), value);
    }

    Ok(values)
}

fn draw_from_interval(
    name: &str,
    min: f64,
    max: f64,
    step: f64,
    rng: &mut (dyn RngCore + Send),
) -> Result<f64, FormulaError> {
    if !(min.is_finite() && max.is_finite() && step.is_finite()) || step <= 0.0 || min > max {
        return Err(FormulaError::InvalidInterval(name.to_string()));
    }
    let steps = ((max - min) / step + LINEARITY_TOLERANCE).floor() as u64;
    let k = rng.gen_range(0..=steps);
    let value = min + k as f64 * step;
    if !value.is_finite() {
        return Err(FormulaError::NonFinite(name.to_string()));
    }
    Ok(without_float_noise(value, step))
}

/// Round away the accumulation noise of `min + k * step` (as in `0.1 * 3`),
/// keeping twelve significant digits below the step's magnitude.
fn without_float_noise(value: f64, step: f64) -> f64 {
    let digits = (-step.log10().floor() + 12.0).clamp(0.0, 300.0) as usize;
    match format!("{value:.digits$}").parse::<f64>() {
        Ok(cleaned) if cleaned.is_finite() => cleaned,
        _ => value,
    }
}

fn solve_for(
    lhs: &Expression,
    rhs: &Expression,
    unknown: &str,
    values: &Bindings,
) -> Result<f64, FormulaError> {
    if is_lone(lhs, unknown) && !rhs.contains_one_of_variables(&[unknown]) {
        return rhs.evaluate(values);
    }
    if is_lone(rhs, unknown) && !lhs.contains_one_of_variables(&[unknown]) {
        return lhs.evaluate(values);
    }

    let residual = Expression::sub(lhs.clone(), rhs.clone())
        .distribute_multiplication(unknown)
        .get_clean();
    if !residual.contains_one_of_variables(&[unknown]) {
        return Err(FormulaError::NotSolvable(unknown.to_string()));
    }

    // A residual that cannot be evaluated at a sample point (the unknown as
    // a divisor) is not linear in the unknown.
    let at = |x: f64| -> Result<f64, FormulaError> {
        let mut scope = values.clone();
        scope.insert(unknown.to_string(), x);
        residual.evaluate(&scope).map_err(|e| match e {
            FormulaError::DivisionByZero | FormulaError::NonFinite(_) => {
                FormulaError::NotSolvable(unknown.to_string())
            }
            other => other,
        })
    };
    let f0 = at(0.0)?;
    let f1 = at(1.0)?;
    let f2 = at(2.0)?;
    let slope = f1 - f0;
    let expected = f0 + 2.0 * slope;
    if slope == 0.0 || (f2 - expected).abs() > LINEARITY_TOLERANCE * expected.abs().max(1.0) {
        return Err(FormulaError::NotSolvable(unknown.to_string()));
    }
    let value = -f0 / slope;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(FormulaError::NonFinite("solve".into()))
    }
}

fn is_lone(expr: &Expression, name: &str) -> bool {
    matches!(expr, Expression::Variable { name: n, value: None } if n == name)
}
