//! The `exgen list-models` command.

use std::path::PathBuf;

use anyhow::Result;

use exgen_core::parser::load_catalog;

pub fn execute(catalog_path: Option<PathBuf>, config_path: Option<PathBuf>) -> Result<()> {
    let config = super::load_config(catalog_path, config_path)?;
    let mut models = load_catalog(&config.catalog_path())?.models;
    models.sort_by_key(|m| m.id);

    if models.is_empty() {
        println!("No models found. Run `exgen init` to create an example catalog.");
        return Ok(());
    }

    for m in &models {
        let formula = match &m.model.common().formula {
            Some(f) => match (f.formula_id, &f.equation) {
                (Some(id), _) => format!(", formula {id}"),
                (None, Some(equation)) => format!(", formula `{equation}`"),
                (None, None) => String::new(),
            },
            None => String::new(),
        };
        println!(
            "  {}  {} ({}, owner {}{formula})",
            m.id,
            m.title,
            m.model.archetype(),
            m.owner
        );
    }

    Ok(())
}
