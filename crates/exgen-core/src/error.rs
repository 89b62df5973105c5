//! Error types for formula evaluation, model loading and collaborator lookups.
//!
//! Completeness checks never produce these for content-shape problems; they
//! only surface from evaluation, resolution, loading and external lookups.
//! [`LookupError::is_permanent`] lets the generation engine classify lookup
//! failures for retry decisions without string matching.

use thiserror::Error;

/// Errors raised while resolving or evaluating a formula.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    /// Resolution was requested with neither a formula id nor an inline equation.
    #[error("the equation of the formula cannot be found")]
    MissingEquation,

    /// The referenced knowledge resource exists but is not a formula.
    #[error("knowledge resource {0} is not a formula")]
    WrongFormulaKind(u64),

    /// A variable was evaluated without a bound value.
    #[error("variable '{0}' has no value")]
    UnboundVariable(String),

    /// A division with a zero divisor.
    #[error("division by zero")]
    DivisionByZero,

    /// A function or solve step produced NaN or infinity.
    #[error("{0} produced a non-finite value")]
    NonFinite(String),

    /// The equation text could not be parsed.
    #[error("invalid formula: {0}")]
    Parse(String),

    /// The unknown cannot be isolated (non-linear or zero slope).
    #[error("cannot isolate '{0}' in the equation")]
    NotSolvable(String),

    /// An interval definition that cannot produce a value.
    #[error("invalid interval for variable '{0}'")]
    InvalidInterval(String),

    /// The stored formula could not be fetched.
    #[error(transparent)]
    Lookup(#[from] LookupError),
}

/// Errors raised while loading or interpreting exercise models.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    /// The stored content tag does not name one of the five archetypes.
    #[error("unknown exercise model type: {0}")]
    UnknownArchetype(String),

    /// A referenced resource does not exist or has the wrong type.
    #[error("invalid resource reference {id}: {reason}")]
    InvalidResourceReference { id: u64, reason: String },

    /// The stored content does not match the archetype's shape.
    #[error("invalid content for {archetype} model: {message}")]
    Content { archetype: String, message: String },
}

/// Errors returned by the external collaborators (stores and lookups).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// The entity is absent or not visible to the requesting owner.
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: u64 },

    /// The backend could not be reached; the read may be retried.
    #[error("lookup backend unavailable: {0}")]
    Unavailable(String),

    /// The backend answered with an error that retrying will not fix.
    #[error("lookup failed: {0}")]
    Backend(String),
}

impl LookupError {
    pub fn not_found(kind: &'static str, id: u64) -> Self {
        LookupError::NotFound { kind, id }
    }

    /// Returns `true` if this error is permanent and should not be retried.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            LookupError::NotFound { .. } | LookupError::Backend(_)
        )
    }

    /// Returns `true` for the "absent" outcome that completeness checks
    /// treat as a plain `false`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, LookupError::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_error_classification() {
        assert!(LookupError::not_found("resource", 3).is_permanent());
        assert!(LookupError::Backend("bad row".into()).is_permanent());
        assert!(!LookupError::Unavailable("timeout".into()).is_permanent());
        assert!(LookupError::not_found("formula", 1).is_not_found());
        assert!(!LookupError::Unavailable("timeout".into()).is_not_found());
    }

    #[test]
    fn formula_error_wraps_lookup() {
        let err: FormulaError = LookupError::not_found("formula", 7).into();
        assert_eq!(err.to_string(), "formula 7 not found");
    }
}
