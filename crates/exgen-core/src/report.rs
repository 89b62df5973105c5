//! Generation and validation reports with JSON persistence.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{Archetype, ExerciseInstance, OwnerId};

/// The result of a generation batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    /// Unique batch identifier.
    pub id: Uuid,
    /// When the batch finished.
    pub created_at: DateTime<Utc>,
    pub model_id: u64,
    pub owner: OwnerId,
    /// Base seed; instance `i` used `seed + i`.
    pub seed: u64,
    /// Number of instances requested.
    pub requested: u64,
    /// Generated instances in index order.
    pub instances: Vec<ExerciseInstance>,
    /// Instances refused because the model is incomplete.
    pub refused: usize,
    pub failures: Vec<GenerationFailure>,
    /// Total wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

/// An instance that could not be generated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationFailure {
    pub index: u64,
    pub error: String,
}

impl GenerationReport {
    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: GenerationReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.refused == 0
    }
}

/// Completeness of one stored model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelValidation {
    pub model_id: u64,
    pub title: String,
    pub archetype: Archetype,
    pub complete: bool,
}

/// Completeness of every model of a catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub models: Vec<ModelValidation>,
}

impl ValidationReport {
    pub fn incomplete(&self) -> impl Iterator<Item = &ModelValidation> {
        self.models.iter().filter(|m| !m.complete)
    }

    pub fn all_complete(&self) -> bool {
        self.incomplete().next().is_none()
    }

    /// Format the report as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        let incomplete = self.incomplete().count();
        md.push_str(&format!(
            "**Summary:** {} models, {} complete, {} incomplete\n\n",
            self.models.len(),
            self.models.len() - incomplete,
            incomplete
        ));
        if !self.models.is_empty() {
            md.push_str("| Model | Title | Type | Complete |\n");
            md.push_str("|-------|-------|------|----------|\n");
            for m in &self.models {
                md.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    m.model_id,
                    m.title,
                    m.archetype,
                    if m.complete { "yes" } else { "no" }
                ));
            }
        }
        md
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExerciseObject, InstanceItems};

    fn make_report() -> GenerationReport {
        GenerationReport {
            id: Uuid::nil(),
            created_at: Utc::now(),
            model_id: 7,
            owner: 1,
            seed: 42,
            requested: 1,
            instances: vec![ExerciseInstance {
                model_id: 7,
                archetype: Archetype::OpenEndedQuestion,
                wording: Some("Explain".into()),
                documents: vec![],
                variables: Default::default(),
                items: InstanceItems::Questions {
                    questions: vec![ExerciseObject::text("Why?")],
                },
            }],
            refused: 0,
            failures: vec![],
            duration_ms: 3,
        }
    }

    #[test]
    fn json_roundtrip() {
        let report = make_report();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("report.json");

        report.save_json(&path).unwrap();
        let loaded = GenerationReport::load_json(&path).unwrap();

        assert_eq!(loaded.model_id, 7);
        assert_eq!(loaded.instances, report.instances);
        assert!(loaded.is_success());
    }

    #[test]
    fn validation_markdown() {
        let report = ValidationReport {
            models: vec![
                ModelValidation {
                    model_id: 1,
                    title: "Capitals".into(),
                    archetype: Archetype::PairItems,
                    complete: true,
                },
                ModelValidation {
                    model_id: 2,
                    title: "Dates".into(),
                    archetype: Archetype::OrderItems,
                    complete: false,
                },
            ],
        };
        assert!(!report.all_complete());
        let md = report.to_markdown();
        assert!(md.contains("2 models, 1 complete, 1 incomplete"));
        assert!(md.contains("| 2 | Dates | order-items | no |"));
    }
}
