//! Formula resolution: from a model's formula reference to concrete values.

use rand::RngCore;

use crate::error::FormulaError;
use crate::formula::{Bindings, FormulaSolver, LocalFormula, Variable};
use crate::model::OwnerId;
use crate::retry::RetryPolicy;
use crate::traits::FormulaStore;

/// Equation, variables and unknown after stored and local data are merged.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedFormula {
    pub equation: String,
    pub variables: Vec<Variable>,
    pub unknown: Option<String>,
}

/// Resolve a model's formula into a value for every variable.
///
/// No formula resolves to an empty map. A `formula_id` takes precedence
/// over an inline equation; the local variables and unknown override the
/// stored ones, and an override giving the unknown a number replaces
/// its solved value. Only the store read is retried; the random source is
/// untouched until the formula is fetched.
pub async fn resolve_formula(
    local: Option<&LocalFormula>,
    owner: OwnerId,
    store: &dyn FormulaStore,
    solver: &dyn FormulaSolver,
    retry: &RetryPolicy,
    rng: &mut (dyn RngCore + Send),
) -> Result<Bindings, FormulaError> {
    let Some(local) = local else {
        return Ok(Bindings::new());
    };
    let merged = retry
        .run("formula lookup", || merge_formula(local, owner, store))
        .await?;
    solver.solve(
        &merged.equation,
        &merged.variables,
        merged.unknown.as_deref(),
        rng,
    )
}

/// Fetch the stored formula if referenced and overlay the local overrides.
pub async fn merge_formula(
    local: &LocalFormula,
    owner: OwnerId,
    store: &dyn FormulaStore,
) -> Result<MergedFormula, FormulaError> {
    let (equation, baseline, stored_unknown) = match (local.formula_id, &local.equation) {
        (Some(id), _) => {
            let formula = store
                .get_formula(id, owner)
                .await?
                .into_formula()
                .ok_or(FormulaError::WrongFormulaKind(id))?;
            (formula.equation, formula.variables, formula.unknown)
        }
        (None, Some(equation)) => (equation.clone(), Vec::new(), None),
        (None, None) => return Err(FormulaError::MissingEquation),
    };

    Ok(MergedFormula {
        equation,
        variables: overlay_variables(baseline, &local.variables),
        unknown: local.unknown.clone().or(stored_unknown),
    })
}

/// Replace baseline variables by name with the overrides; overrides with a
/// new name are appended.
pub fn overlay_variables(baseline: Vec<Variable>, overrides: &[Variable]) -> Vec<Variable> {
    let mut merged = baseline;
    for var in overrides {
        match merged.iter_mut().find(|v| v.name == var.name) {
            Some(existing) => *existing = var.clone(),
            None => merged.push(var.clone()),
        }
    }
    merged
}
