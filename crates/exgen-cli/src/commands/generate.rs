//! The `exgen generate` command.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use exgen_core::engine::{
    Collaborators, GenerateRequest, GenerationEngine, GenerationOutcome, ProgressReporter,
};
use exgen_core::formula::{LocalFormula, Variable};
use exgen_core::resolver::overlay_variables;
use exgen_core::traits::ModelStore;
use exgen_stores::{open_store, CatalogStore};

/// Console progress reporter.
struct ConsoleReporter;

impl ProgressReporter for ConsoleReporter {
    fn on_instance_complete(&self, index: u64, outcome: &GenerationOutcome) {
        match outcome {
            GenerationOutcome::Generated(instance) => {
                eprintln!("  Done: instance {index} ({})", instance.archetype)
            }
            GenerationOutcome::Refused { model_id, archetype } => {
                eprintln!("  Refused: instance {index}, {archetype} model {model_id} is incomplete")
            }
        }
    }

    fn on_instance_error(&self, index: u64, error: &str) {
        eprintln!("  ERROR: instance {index}: {error}");
    }

    fn on_batch_complete(&self, total: usize, generated: usize, failed: usize, elapsed: Duration) {
        eprintln!(
            "\nComplete: {generated}/{total} generated, {failed} failed ({:.1}s)",
            elapsed.as_secs_f64()
        );
    }
}

#[allow(clippy::too_many_arguments)]
pub async fn execute(
    model_id: u64,
    catalog_path: Option<PathBuf>,
    owner: Option<u64>,
    seed: Option<u64>,
    count: u64,
    overrides: Vec<(String, f64)>,
    output: Option<Option<PathBuf>>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    anyhow::ensure!(count >= 1, "count must be at least 1");

    let config = super::load_config(catalog_path, config_path)?;
    let output = output.map(|dir| dir.unwrap_or_else(|| config.output_dir.clone()));
    let store = Arc::new(open_store(&config)?);
    let owner = owner.unwrap_or(config.default_owner);
    let seed = seed.or(config.seed).unwrap_or_else(rand::random);

    let formula = if overrides.is_empty() {
        None
    } else {
        Some(formula_with_overrides(&store, model_id, &overrides).await?)
    };

    let engine = GenerationEngine::new(
        Collaborators::shared(Arc::clone(&store)),
        config.engine_config(),
    );
    let request = GenerateRequest {
        model_id,
        owner,
        formula,
    };

    eprintln!(
        "exgen v{} - Generating {count} instance(s) of model {model_id} (seed {seed})",
        env!("CARGO_PKG_VERSION")
    );
    eprintln!();

    let report = engine
        .generate_batch(&request, count, seed, &ConsoleReporter)
        .await?;

    match &output {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H%M%S");
            let path = dir.join(format!("report-{timestamp}.json"));
            report.save_json(&path)?;
            eprintln!("Report saved to: {}", path.display());
        }
        None => {
            let json = serde_json::to_string_pretty(&report.instances)
                .context("failed to serialize instances")?;
            println!("{json}");
        }
    }

    if report.refused > 0 {
        anyhow::bail!("model {model_id} is incomplete; no instance generated");
    }
    if !report.failures.is_empty() {
        anyhow::bail!("{} instance(s) failed", report.failures.len());
    }

    Ok(())
}

/// The model's own formula with `--set` values overriding its variables.
async fn formula_with_overrides(
    store: &CatalogStore,
    model_id: u64,
    overrides: &[(String, f64)],
) -> Result<LocalFormula> {
    let stored = store
        .get_model(model_id)
        .await
        .with_context(|| format!("failed to load model {model_id}"))?;
    let Some(formula) = stored.model.common().formula.clone() else {
        anyhow::bail!("model {model_id} has no formula; --set does not apply");
    };
    let overrides: Vec<Variable> = overrides
        .iter()
        .map(|(name, value)| Variable::number(name.as_str(), *value))
        .collect();
    Ok(LocalFormula {
        variables: overlay_variables(formula.variables, &overrides),
        ..formula
    })
}
