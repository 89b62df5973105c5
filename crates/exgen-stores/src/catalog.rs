//! Catalog-backed store.
//!
//! Serves resources, formulas and models from TOML catalog files, indexed
//! by id. The catalog can be reloaded from disk while the store is shared.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;

use exgen_core::catalog::Catalog;
use exgen_core::error::LookupError;
use exgen_core::formula::Knowledge;
use exgen_core::model::{ExerciseObject, ObjectConstraints, OwnerId, ResourceId, StoredModel};
use exgen_core::parser::{load_catalog, validate_catalog};
use exgen_core::traits::{
    FormulaStore, ModelStore, ObjectSource, ResourceInfo, ResourceLookup, ResourceRecord,
};

#[derive(Debug, Default)]
struct Index {
    resources: HashMap<ResourceId, ResourceRecord>,
    formulas: HashMap<u64, Knowledge>,
    models: HashMap<u64, StoredModel>,
}

impl Index {
    /// Later entries win on duplicate ids.
    fn build(catalog: Catalog) -> Self {
        Self {
            resources: catalog.resources.into_iter().map(|r| (r.id, r)).collect(),
            formulas: catalog.formulas.into_iter().map(|k| (k.id, k)).collect(),
            models: catalog.models.into_iter().map(|m| (m.id, m)).collect(),
        }
    }
}

/// A store over a catalog file or directory.
pub struct CatalogStore {
    path: Option<PathBuf>,
    index: RwLock<Index>,
}

impl CatalogStore {
    /// Serve an in-memory catalog.
    pub fn from_catalog(catalog: Catalog) -> Self {
        Self {
            path: None,
            index: RwLock::new(Index::build(catalog)),
        }
    }

    /// Load a catalog file, or every `.toml` file under a directory.
    pub fn open(path: &Path) -> Result<Self> {
        let catalog = read_catalog(path)?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            index: RwLock::new(Index::build(catalog)),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Re-read the catalog from disk. The old content stays in place when
    /// the new one fails to load.
    pub async fn reload(&self) -> Result<()> {
        let Some(path) = self.path.clone() else {
            anyhow::bail!("store was not loaded from a file");
        };
        let catalog = tokio::task::spawn_blocking(move || read_catalog(&path))
            .await
            .context("catalog reload task failed")??;
        *self.index.write().await = Index::build(catalog);
        Ok(())
    }

    /// Number of resources, formulas and models.
    pub async fn counts(&self) -> (usize, usize, usize) {
        let index = self.index.read().await;
        (index.resources.len(), index.formulas.len(), index.models.len())
    }
}

fn read_catalog(path: &Path) -> Result<Catalog> {
    let catalog = load_catalog(path)
        .with_context(|| format!("failed to load catalog: {}", path.display()))?;
    for warning in validate_catalog(&catalog) {
        match &warning.entity {
            Some(entity) => tracing::warn!("{}: {entity}: {}", path.display(), warning.message),
            None => tracing::warn!("{}: {}", path.display(), warning.message),
        }
    }
    tracing::debug!(
        resources = catalog.resources.len(),
        formulas = catalog.formulas.len(),
        models = catalog.models.len(),
        "loaded catalog {}",
        path.display()
    );
    Ok(catalog)
}

#[async_trait]
impl ResourceLookup for CatalogStore {
    async fn get_resource(&self, id: ResourceId) -> Result<ResourceInfo, LookupError> {
        self.index
            .read()
            .await
            .resources
            .get(&id)
            .map(ResourceRecord::info)
            .ok_or_else(|| LookupError::not_found("resource", id))
    }
}

#[async_trait]
impl ObjectSource for CatalogStore {
    async fn fetch_object(
        &self,
        id: ResourceId,
        _owner: OwnerId,
    ) -> Result<ExerciseObject, LookupError> {
        self.index
            .read()
            .await
            .resources
            .get(&id)
            .map(ResourceRecord::to_object)
            .ok_or_else(|| LookupError::not_found("resource", id))
    }

    async fn find_matching(
        &self,
        constraints: &ObjectConstraints,
        owner: OwnerId,
    ) -> Result<Vec<ResourceId>, LookupError> {
        let index = self.index.read().await;
        let mut ids: Vec<ResourceId> = index
            .resources
            .values()
            .filter(|r| r.owner == owner && constraints.matches(&r.to_object()))
            .map(|r| r.id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

#[async_trait]
impl FormulaStore for CatalogStore {
    async fn get_formula(&self, id: u64, owner: OwnerId) -> Result<Knowledge, LookupError> {
        self.index
            .read()
            .await
            .formulas
            .get(&id)
            .filter(|k| k.owner == owner)
            .cloned()
            .ok_or_else(|| LookupError::not_found("formula", id))
    }
}

#[async_trait]
impl ModelStore for CatalogStore {
    async fn get_model(&self, id: u64) -> Result<StoredModel, LookupError> {
        self.index
            .read()
            .await
            .models
            .get(&id)
            .cloned()
            .ok_or_else(|| LookupError::not_found("model", id))
    }

    async fn list_models(&self) -> Result<Vec<StoredModel>, LookupError> {
        let mut models: Vec<StoredModel> =
            self.index.read().await.models.values().cloned().collect();
        models.sort_by_key(|m| m.id);
        Ok(models)
    }
}
