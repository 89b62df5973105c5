//! The `exgen validate` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use exgen_core::engine::{Collaborators, GenerationEngine};
use exgen_core::parser::{load_catalog, validate_catalog};
use exgen_core::report::ValidationReport;
use exgen_stores::CatalogStore;

pub async fn execute(
    catalog_path: Option<PathBuf>,
    strict: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = super::load_config(catalog_path, config_path)?;
    let path = config.catalog_path();
    let catalog = load_catalog(&path)?;

    println!(
        "Catalog: {} ({} resources, {} formulas, {} models)",
        path.display(),
        catalog.resources.len(),
        catalog.formulas.len(),
        catalog.models.len()
    );

    let warnings = validate_catalog(&catalog);
    for w in &warnings {
        let prefix = w
            .entity
            .as_ref()
            .map(|entity| format!("  [{entity}]"))
            .unwrap_or_else(|| "  ".to_string());
        println!("{prefix} WARNING: {}", w.message);
    }

    let store = Arc::new(CatalogStore::from_catalog(catalog));
    let engine = GenerationEngine::new(Collaborators::shared(store), config.engine_config());
    let report = engine.validate_all().await?;

    print_models(&report);

    let incomplete = report.incomplete().count();
    println!(
        "\n{} models, {} complete, {} incomplete",
        report.models.len(),
        report.models.len() - incomplete,
        incomplete
    );
    if !warnings.is_empty() {
        println!("{} warning(s) found.", warnings.len());
    }

    if strict && incomplete > 0 {
        anyhow::bail!("{incomplete} incomplete model(s)");
    }

    Ok(())
}

fn print_models(report: &ValidationReport) {
    use comfy_table::{Cell, Table};

    if report.models.is_empty() {
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["Model", "Title", "Type", "Complete"]);
    for m in &report.models {
        table.add_row(vec![
            Cell::new(m.model_id),
            Cell::new(&m.title),
            Cell::new(m.archetype),
            Cell::new(if m.complete { "yes" } else { "NO" }),
        ]);
    }
    println!("{table}");
}
