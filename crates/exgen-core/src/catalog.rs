//! An in-memory catalog of resources, formulas and models.
//!
//! [`Catalog`] is what [`crate::parser`] produces from a catalog file and
//! implements every collaborator trait directly, which makes it the
//! reference backend for tests. On duplicate ids the later entry wins.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::LookupError;
use crate::formula::Knowledge;
use crate::model::{ExerciseObject, ObjectConstraints, OwnerId, ResourceId, StoredModel};
use crate::traits::{
    FormulaStore, ModelStore, ObjectSource, ResourceInfo, ResourceLookup, ResourceRecord,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub resources: Vec<ResourceRecord>,
    #[serde(default)]
    pub formulas: Vec<Knowledge>,
    #[serde(default)]
    pub models: Vec<StoredModel>,
}

impl Catalog {
    pub fn with_resource(mut self, record: ResourceRecord) -> Self {
        self.resources.push(record);
        self
    }

    pub fn with_formula(mut self, knowledge: Knowledge) -> Self {
        self.formulas.push(knowledge);
        self
    }

    pub fn with_model(mut self, model: StoredModel) -> Self {
        self.models.push(model);
        self
    }

    pub fn resource(&self, id: ResourceId) -> Option<&ResourceRecord> {
        self.resources.iter().rev().find(|r| r.id == id)
    }

    pub fn knowledge(&self, id: u64) -> Option<&Knowledge> {
        self.formulas.iter().rev().find(|k| k.id == id)
    }

    pub fn model(&self, id: u64) -> Option<&StoredModel> {
        self.models.iter().rev().find(|m| m.id == id)
    }

    /// Ids of `owner`'s resources matching `constraints`, ascending.
    pub fn matching_ids(&self, constraints: &ObjectConstraints, owner: OwnerId) -> Vec<ResourceId> {
        latest_by_id(&self.resources, |r| r.id)
            .into_values()
            .filter(|r| r.owner == owner && constraints.matches(&r.to_object()))
            .map(|r| r.id)
            .collect()
    }
}

fn latest_by_id<T>(items: &[T], id: impl Fn(&T) -> u64) -> BTreeMap<u64, &T> {
    items.iter().map(|item| (id(item), item)).collect()
}

#[async_trait]
impl ResourceLookup for Catalog {
    async fn get_resource(&self, id: ResourceId) -> Result<ResourceInfo, LookupError> {
        self.resource(id)
            .map(ResourceRecord::info)
            .ok_or_else(|| LookupError::not_found("resource", id))
    }
}

#[async_trait]
impl ObjectSource for Catalog {
    async fn fetch_object(
        &self,
        id: ResourceId,
        _owner: OwnerId,
    ) -> Result<ExerciseObject, LookupError> {
        self.resource(id)
            .map(ResourceRecord::to_object)
            .ok_or_else(|| LookupError::not_found("resource", id))
    }

    async fn find_matching(
        &self,
        constraints: &ObjectConstraints,
        owner: OwnerId,
    ) -> Result<Vec<ResourceId>, LookupError> {
        Ok(self.matching_ids(constraints, owner))
    }
}

#[async_trait]
impl FormulaStore for Catalog {
    async fn get_formula(&self, id: u64, owner: OwnerId) -> Result<Knowledge, LookupError> {
        self.knowledge(id)
            .filter(|k| k.owner == owner)
            .cloned()
            .ok_or_else(|| LookupError::not_found("formula", id))
    }
}

#[async_trait]
impl ModelStore for Catalog {
    async fn get_model(&self, id: u64) -> Result<StoredModel, LookupError> {
        self.model(id)
            .cloned()
            .ok_or_else(|| LookupError::not_found("model", id))
    }

    async fn list_models(&self) -> Result<Vec<StoredModel>, LookupError> {
        Ok(latest_by_id(&self.models, |m| m.id)
            .into_values()
            .cloned()
            .collect())
    }
}
