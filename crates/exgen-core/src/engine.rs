//! Central generation engine.
//!
//! Loads a model, refuses it when incomplete, resolves its formula, draws
//! resources block by block and assembles an exercise instance. Batches run
//! with bounded parallelism, one seeded random source per instance.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::assemble::Assembler;
use crate::completeness::check_model_complete;
use crate::formula::{EquationSolver, FormulaSolver, LocalFormula};
use crate::model::{Archetype, ExerciseInstance, OwnerId};
use crate::report::{GenerationFailure, GenerationReport, ModelValidation, ValidationReport};
use crate::resolver::resolve_formula;
use crate::retry::RetryPolicy;
use crate::traits::{FormulaStore, ModelStore, ObjectSource, ResourceLookup};

/// Configuration for the generation engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum concurrent instances in a batch.
    pub parallelism: usize,
    /// Retries on transient lookup errors.
    pub max_retries: u32,
    /// Delay before the first retry; doubles after each attempt.
    pub retry_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallelism: 4,
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
        }
    }
}

impl EngineConfig {
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_delay: self.retry_delay,
        }
    }
}

/// The external collaborators the engine reads from.
#[derive(Clone)]
pub struct Collaborators {
    pub models: Arc<dyn ModelStore>,
    pub resources: Arc<dyn ResourceLookup>,
    pub objects: Arc<dyn ObjectSource>,
    pub formulas: Arc<dyn FormulaStore>,
}

impl Collaborators {
    /// Use one backend for every role.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: ModelStore + ResourceLookup + ObjectSource + FormulaStore + 'static,
    {
        Self {
            models: store.clone(),
            resources: store.clone(),
            objects: store.clone(),
            formulas: store,
        }
    }
}

/// A request to generate from one stored model.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub model_id: u64,
    pub owner: OwnerId,
    /// Replaces the model's own formula reference when set.
    pub formula: Option<LocalFormula>,
}

/// Outcome of a single generation.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    Generated(ExerciseInstance),
    /// The model is incomplete; nothing was drawn.
    Refused { model_id: u64, archetype: Archetype },
}

/// Progress reporting trait.
pub trait ProgressReporter: Send + Sync {
    fn on_instance_complete(&self, index: u64, outcome: &GenerationOutcome);
    fn on_instance_error(&self, index: u64, error: &str);
    fn on_batch_complete(&self, total: usize, generated: usize, failed: usize, elapsed: Duration);
}

/// No-op progress reporter.
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn on_instance_complete(&self, _: u64, _: &GenerationOutcome) {}
    fn on_instance_error(&self, _: u64, _: &str) {}
    fn on_batch_complete(&self, _: usize, _: usize, _: usize, _: Duration) {}
}

/// The central generation engine.
pub struct GenerationEngine {
    collaborators: Collaborators,
    solver: Arc<dyn FormulaSolver>,
    config: EngineConfig,
}

impl GenerationEngine {
    pub fn new(collaborators: Collaborators, config: EngineConfig) -> Self {
        Self {
            collaborators,
            solver: Arc::new(EquationSolver),
            config,
        }
    }

    /// Replace the default equation solver.
    pub fn with_solver(mut self, solver: Arc<dyn FormulaSolver>) -> Self {
        self.solver = solver;
        self
    }

    /// Whether a stored model is complete.
    pub async fn check_model(&self, model_id: u64) -> Result<bool> {
        let retry = self.config.retry_policy();
        let stored = retry
            .run("model load", || self.collaborators.models.get_model(model_id))
            .await
            .with_context(|| format!("failed to load model {model_id}"))?;
        let complete = retry
            .run("completeness check", || {
                check_model_complete(&stored.model, self.collaborators.resources.as_ref())
            })
            .await
            .with_context(|| format!("failed to check model {model_id}"))?;
        Ok(complete)
    }

    /// Check every stored model.
    pub async fn validate_all(&self) -> Result<ValidationReport> {
        let retry = self.config.retry_policy();
        let stored = retry
            .run("model listing", || self.collaborators.models.list_models())
            .await
            .context("failed to list models")?;

        let mut report = ValidationReport::default();
        for model in stored {
            let complete = retry
                .run("completeness check", || {
                    check_model_complete(&model.model, self.collaborators.resources.as_ref())
                })
                .await
                .with_context(|| format!("failed to check model {}", model.id))?;
            report.models.push(ModelValidation {
                model_id: model.id,
                title: model.title.clone(),
                archetype: model.model.archetype(),
                complete,
            });
        }
        Ok(report)
    }

    /// Generate one instance.
    pub async fn generate<R: Rng + Send>(
        &self,
        request: &GenerateRequest,
        rng: &mut R,
    ) -> Result<GenerationOutcome> {
        let retry = self.config.retry_policy();
        let stored = retry
            .run("model load", || self.collaborators.models.get_model(request.model_id))
            .await
            .with_context(|| format!("failed to load model {}", request.model_id))?;

        let complete = retry
            .run("completeness check", || {
                check_model_complete(&stored.model, self.collaborators.resources.as_ref())
            })
            .await
            .with_context(|| format!("failed to check model {}", stored.id))?;
        if !complete {
            tracing::info!(
                model = stored.id,
                archetype = %stored.model.archetype(),
                "model incomplete, refusing"
            );
            return Ok(GenerationOutcome::Refused {
                model_id: stored.id,
                archetype: stored.model.archetype(),
            });
        }

        let local = request
            .formula
            .as_ref()
            .or(stored.model.common().formula.as_ref());
        let variables = resolve_formula(
            local,
            request.owner,
            self.collaborators.formulas.as_ref(),
            self.solver.as_ref(),
            &retry,
            &mut *rng,
        )
        .await
        .with_context(|| format!("failed to resolve formula of model {}", stored.id))?;

        let assembler = Assembler {
            owner: request.owner,
            source: self.collaborators.objects.as_ref(),
            retry: &retry,
            variables: &variables,
        };
        let instance = assembler
            .assemble(&stored, rng)
            .await
            .with_context(|| format!("failed to assemble model {}", stored.id))?;

        tracing::debug!(model = stored.id, "instance generated");
        Ok(GenerationOutcome::Generated(instance))
    }

    /// Generate `count` instances, instance `i` seeded with `seed + i`.
    pub async fn generate_batch(
        &self,
        request: &GenerateRequest,
        count: u64,
        seed: u64,
        progress: &dyn ProgressReporter,
    ) -> Result<GenerationReport> {
        let start = Instant::now();
        let batch_id = Uuid::new_v4();
        let semaphore = Arc::new(Semaphore::new(self.config.parallelism.max(1)));

        let mut futures = FuturesUnordered::new();
        for index in 0..count {
            let semaphore = Arc::clone(&semaphore);
            futures.push(async move {
                let result = async {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|_| anyhow::anyhow!("semaphore closed"))?;
                    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(index));
                    self.generate(request, &mut rng).await
                }
                .await;
                (index, result)
            });
        }

        let mut instances = Vec::new();
        let mut refused = 0usize;
        let mut failures = Vec::new();
        let total = futures.len();

        while let Some((index, result)) = futures.next().await {
            match result {
                Ok(outcome) => {
                    progress.on_instance_complete(index, &outcome);
                    match outcome {
                        GenerationOutcome::Generated(instance) => instances.push((index, instance)),
                        GenerationOutcome::Refused { .. } => refused += 1,
                    }
                }
                Err(e) => {
                    tracing::error!("instance {index} of model {} failed: {e:#}", request.model_id);
                    progress.on_instance_error(index, &format!("{e:#}"));
                    failures.push(GenerationFailure {
                        index,
                        error: format!("{e:#}"),
                    });
                }
            }
        }

        instances.sort_by_key(|(index, _)| *index);
        failures.sort_by_key(|f| f.index);

        let elapsed = start.elapsed();
        progress.on_batch_complete(total, instances.len(), failures.len(), elapsed);

        Ok(GenerationReport {
            id: batch_id,
            created_at: chrono::Utc::now(),
            model_id: request.model_id,
            owner: request.owner,
            seed,
            requested: count,
            instances: instances.into_iter().map(|(_, i)| i).collect(),
            refused,
            failures,
            duration_ms: elapsed.as_millis() as u64,
        })
    }
}
