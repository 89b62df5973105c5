//! TOML catalog parser.
//!
//! Loads catalogs (resources, formulas and models) from TOML files and
//! directories, and validates them.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::catalog::Catalog;
use crate::constraints::COMPARATORS;
use crate::formula::{parse_equation, Knowledge};
use crate::model::{
    ClassificationConstraints, ExerciseModel, MetadataConstraint, OwnerId, ResourceBlock,
    StoredModel,
};
use crate::traits::ResourceRecord;

/// Intermediate TOML structure for parsing catalog files.
#[derive(Debug, Deserialize)]
struct TomlCatalogFile {
    #[serde(default)]
    resources: Vec<ResourceRecord>,
    #[serde(default)]
    formulas: Vec<Knowledge>,
    #[serde(default)]
    models: Vec<TomlModel>,
}

#[derive(Debug, Deserialize)]
struct TomlModel {
    id: u64,
    #[serde(default)]
    owner: OwnerId,
    #[serde(default)]
    title: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default = "empty_table")]
    content: toml::Value,
}

fn empty_table() -> toml::Value {
    toml::Value::Table(Default::default())
}

/// Load a catalog from a file or from every `.toml` file of a directory.
pub fn load_catalog(path: &Path) -> Result<Catalog> {
    if path.is_dir() {
        load_catalog_directory(path)
    } else {
        parse_catalog(path)
    }
}

/// Parse a single TOML catalog file.
pub fn parse_catalog(path: &Path) -> Result<Catalog> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog file: {}", path.display()))?;

    parse_catalog_str(&content, path)
}

/// Parse a TOML string into a [`Catalog`] (useful for testing).
pub fn parse_catalog_str(content: &str, source_path: &Path) -> Result<Catalog> {
    let parsed: TomlCatalogFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    let models = parsed
        .models
        .into_iter()
        .map(|m| -> Result<StoredModel> {
            let content = serde_json::to_value(&m.content)
                .with_context(|| format!("model {} has unrepresentable content", m.id))?;
            let model = ExerciseModel::from_content(&m.kind, content)
                .with_context(|| format!("invalid model {} in {}", m.id, source_path.display()))?;
            Ok(StoredModel {
                id: m.id,
                owner: m.owner,
                title: m.title,
                model,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Catalog {
        resources: parsed.resources,
        formulas: parsed.formulas,
        models,
    })
}

/// Recursively load and merge all `.toml` catalog files from a directory.
pub fn load_catalog_directory(dir: &Path) -> Result<Catalog> {
    let mut catalog = Catalog::default();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .collect::<std::io::Result<_>>()?;
    entries.sort_by_key(|e| e.path());

    for entry in entries {
        let path = entry.path();

        let part = if path.is_dir() {
            load_catalog_directory(&path)?
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_catalog(&path) {
                Ok(part) => part,
                Err(e) => {
                    tracing::warn!("skipping {}: {:#}", path.display(), e);
                    continue;
                }
            }
        } else {
            continue;
        };
        catalog.resources.extend(part.resources);
        catalog.formulas.extend(part.formulas);
        catalog.models.extend(part.models);
    }

    Ok(catalog)
}

/// A warning from catalog validation.
#[derive(Debug, Clone)]
pub struct CatalogWarning {
    /// The entity concerned, e.g. `model 3` (if applicable).
    pub entity: Option<String>,
    /// Warning message.
    pub message: String,
}

/// Validate a catalog for common issues.
pub fn validate_catalog(catalog: &Catalog) -> Vec<CatalogWarning> {
    let mut warnings = Vec::new();

    // Duplicate ids
    let resource_ids = catalog.resources.iter().map(|r| r.id);
    let formula_ids = catalog.formulas.iter().map(|k| k.id);
    let model_ids = catalog.models.iter().map(|m| m.id);
    duplicate_ids("resource", resource_ids, &mut warnings);
    duplicate_ids("formula", formula_ids, &mut warnings);
    duplicate_ids("model", model_ids, &mut warnings);

    // Formulas that will not parse
    for knowledge in &catalog.formulas {
        let entity = Some(format!("formula {}", knowledge.id));
        match &knowledge.formula {
            Some(formula) if knowledge.is_formula() => {
                if let Err(e) = parse_equation(&formula.equation) {
                    warnings.push(CatalogWarning {
                        entity,
                        message: e.to_string(),
                    });
                }
            }
            None if knowledge.kind == crate::formula::FORMULA_KIND => {
                warnings.push(CatalogWarning {
                    entity,
                    message: "formula entry has no equation".into(),
                });
            }
            _ => {}
        }
    }

    // Dangling references and unknown comparators
    for stored in &catalog.models {
        let entity = Some(format!("model {}", stored.id));
        let model = &stored.model;
        for block in blocks(model) {
            for id in &block.resources {
                if catalog.resource(*id).is_none() {
                    warnings.push(CatalogWarning {
                        entity: entity.clone(),
                        message: format!("references unknown resource {id}"),
                    });
                }
            }
        }
        for constraint in metadata_constraints(model) {
            if let Some(op) = constraint.comparator.as_deref() {
                if !COMPARATORS.contains(&op) {
                    warnings.push(CatalogWarning {
                        entity: entity.clone(),
                        message: format!("unknown comparator '{op}' never matches"),
                    });
                }
            }
        }
    }

    warnings
}

fn duplicate_ids(
    kind: &str,
    ids: impl Iterator<Item = u64>,
    warnings: &mut Vec<CatalogWarning>,
) {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            warnings.push(CatalogWarning {
                entity: Some(format!("{kind} {id}")),
                message: format!("duplicate {kind} ID: {id}"),
            });
        }
    }
}

fn blocks(model: &ExerciseModel) -> Vec<&ResourceBlock> {
    match model {
        ExerciseModel::MultipleChoice(m) => m.question_blocks.iter().map(|q| &q.block).collect(),
        ExerciseModel::PairItems(m) => m.pair_blocks.iter().map(|p| &p.block).collect(),
        ExerciseModel::GroupItems(m) => m.object_blocks.iter().map(|o| &o.block).collect(),
        ExerciseModel::OrderItems(m) => m
            .sequence_block
            .iter()
            .map(|s| &s.block)
            .chain(m.object_blocks.iter().map(|o| &o.block))
            .collect(),
        ExerciseModel::OpenEndedQuestion(m) => m.question_blocks.iter().collect(),
    }
}

fn metadata_constraints(model: &ExerciseModel) -> Vec<&MetadataConstraint> {
    let mut found: Vec<&MetadataConstraint> = blocks(model)
        .into_iter()
        .filter_map(|b| b.resource_constraint.as_ref())
        .flat_map(|c| c.metadata_constraints.iter())
        .collect();
    if let ExerciseModel::GroupItems(m) = model {
        let classifications = m
            .classif_constr
            .iter()
            .chain(m.object_blocks.iter().filter_map(|o| o.classif_constr.as_ref()));
        found.extend(
            classifications
                .flat_map(|c: &ClassificationConstraints| c.groups.iter())
                .flat_map(|g| g.metadata_constraints.iter()),
        );
    }
    found
}
