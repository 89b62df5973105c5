//! Mock store for testing.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use exgen_core::catalog::Catalog;
use exgen_core::error::LookupError;
use exgen_core::formula::Knowledge;
use exgen_core::model::{ExerciseObject, ObjectConstraints, OwnerId, ResourceId, StoredModel};
use exgen_core::traits::{FormulaStore, ModelStore, ObjectSource, ResourceInfo, ResourceLookup};

/// A store over an in-memory catalog that counts calls and can be told to
/// fail, for testing the engine's retry and refusal paths.
pub struct MockStore {
    catalog: Catalog,
    /// Number of calls made, across all traits.
    call_count: AtomicU32,
    /// Calls still to fail with a transient error.
    failures_left: AtomicU32,
    /// Object fetches made.
    fetch_count: AtomicU32,
    /// Last model id requested.
    last_model: Mutex<Option<u64>>,
}

impl MockStore {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            call_count: AtomicU32::new(0),
            failures_left: AtomicU32::new(0),
            fetch_count: AtomicU32::new(0),
            last_model: Mutex::new(None),
        }
    }

    /// Fail the next `n` calls with [`LookupError::Unavailable`].
    pub fn fail_next(&self, n: u32) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Number of `fetch_object` calls that reached the catalog.
    pub fn fetch_count(&self) -> u32 {
        self.fetch_count.load(Ordering::Relaxed)
    }

    pub fn last_model(&self) -> Option<u64> {
        self.last_model.lock().ok().and_then(|guard| *guard)
    }

    fn enter(&self) -> Result<(), LookupError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        let injected = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            Err(LookupError::Unavailable("injected failure".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ResourceLookup for MockStore {
    async fn get_resource(&self, id: ResourceId) -> Result<ResourceInfo, LookupError> {
        self.enter()?;
        self.catalog.get_resource(id).await
    }
}

#[async_trait]
impl ObjectSource for MockStore {
    async fn fetch_object(
        &self,
        id: ResourceId,
        owner: OwnerId,
    ) -> Result<ExerciseObject, LookupError> {
        self.enter()?;
        self.fetch_count.fetch_add(1, Ordering::Relaxed);
        self.catalog.fetch_object(id, owner).await
    }

    async fn find_matching(
        &self,
        constraints: &ObjectConstraints,
        owner: OwnerId,
    ) -> Result<Vec<ResourceId>, LookupError> {
        self.enter()?;
        self.catalog.find_matching(constraints, owner).await
    }
}

#[async_trait]
impl FormulaStore for MockStore {
    async fn get_formula(&self, id: u64, owner: OwnerId) -> Result<Knowledge, LookupError> {
        self.enter()?;
        self.catalog.get_formula(id, owner).await
    }
}

#[async_trait]
impl ModelStore for MockStore {
    async fn get_model(&self, id: u64) -> Result<StoredModel, LookupError> {
        self.enter()?;
        if let Ok(mut last) = self.last_model.lock() {
            *last = Some(id);
        }
        self.catalog.get_model(id).await
    }

    async fn list_models(&self) -> Result<Vec<StoredModel>, LookupError> {
        self.enter()?;
        self.catalog.list_models().await
    }
}
