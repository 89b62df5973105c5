//! Collaborator traits: the stores and lookups the generation pipeline reads
//! from.
//!
//! These async traits are implemented by [`crate::catalog::Catalog`] and by
//! the stores in `exgen-stores`. All of them are read-only; every failure is
//! a [`LookupError`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LookupError;
use crate::formula::Knowledge;
use crate::model::{
    ExerciseObject, ObjectConstraints, OwnerId, ResourceId, ResourceKind, StoredModel,
};

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// Type information about an existing resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceInfo {
    pub id: ResourceId,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    pub owner: OwnerId,
}

/// A resource as held by a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub id: ResourceId,
    #[serde(default)]
    pub owner: OwnerId,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl ResourceRecord {
    pub fn info(&self) -> ResourceInfo {
        ResourceInfo {
            id: self.id,
            kind: self.kind,
            owner: self.owner,
        }
    }

    /// Materialize the record as an exercise object.
    pub fn to_object(&self) -> ExerciseObject {
        ExerciseObject {
            id: Some(self.id),
            kind: self.kind,
            content: self.content.clone(),
            values: self.values.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

/// Resolves resource ids to their type. Used by completeness checks.
#[async_trait]
pub trait ResourceLookup: Send + Sync {
    /// Fails with [`LookupError::NotFound`] when the resource does not exist.
    async fn get_resource(&self, id: ResourceId) -> Result<ResourceInfo, LookupError>;
}

/// Materializes resources into exercise objects.
#[async_trait]
pub trait ObjectSource: Send + Sync {
    async fn fetch_object(
        &self,
        id: ResourceId,
        owner: OwnerId,
    ) -> Result<ExerciseObject, LookupError>;

    /// Ids of the owner's resources satisfying `constraints`, in id order.
    async fn find_matching(
        &self,
        constraints: &ObjectConstraints,
        owner: OwnerId,
    ) -> Result<Vec<ResourceId>, LookupError>;
}

// ---------------------------------------------------------------------------
// Knowledge and models
// ---------------------------------------------------------------------------

/// Stored formulas, scoped by owner.
#[async_trait]
pub trait FormulaStore: Send + Sync {
    /// Fails with [`LookupError::NotFound`] when the entry is absent or not
    /// visible to `owner`. The entry may be of any knowledge kind.
    async fn get_formula(&self, id: u64, owner: OwnerId) -> Result<Knowledge, LookupError>;
}

/// Stored exercise models.
#[async_trait]
pub trait ModelStore: Send + Sync {
    async fn get_model(&self, id: u64) -> Result<StoredModel, LookupError>;

    async fn list_models(&self) -> Result<Vec<StoredModel>, LookupError>;
}
