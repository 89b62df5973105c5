//! exgen-core: Formula engine, model completeness checks and resource selection.
//!
//! This crate defines the exercise model, the expression tree and equation
//! solver, the collaborator traits, and the generation engine that the rest
//! of exgen builds on.

pub(crate) mod assemble;
pub mod catalog;
pub mod completeness;
pub mod constraints;
pub mod engine;
pub mod error;
pub mod formula;
pub mod interpolate;
pub mod model;
pub mod parser;
pub mod report;
pub mod resolver;
pub mod retry;
pub mod selection;
pub mod traits;

pub use assemble::{classify, MISC_GROUP};
