//! Random selection of resources from a block.
//!
//! Drawing is split from fetching: [`draw_ids`] is a pure function of the
//! pool, the quota and the random source, so a retried fetch never redraws.

use std::collections::HashSet;

use rand::Rng;

use crate::error::LookupError;
use crate::model::{ExerciseObject, OwnerId, ResourceBlock, ResourceId};
use crate::retry::RetryPolicy;
use crate::traits::ObjectSource;

/// Ids drawn from a pool, and what remains of the pool and quota.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draw {
    pub selected: Vec<ResourceId>,
    pub remaining_pool: Vec<ResourceId>,
    pub remaining_quota: i64,
}

/// Objects fetched for a block, with the remaining pool and quota.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub objects: Vec<ExerciseObject>,
    pub remaining_pool: Vec<ResourceId>,
    pub remaining_quota: i64,
}

/// Draw up to `quota` distinct ids uniformly without replacement.
///
/// Stops early when the pool runs out; a non-positive quota draws
/// nothing. Duplicate ids in `pool` count once.
pub fn draw_ids<R: Rng + ?Sized>(pool: &[ResourceId], quota: i64, rng: &mut R) -> Draw {
    let mut seen = HashSet::with_capacity(pool.len());
    let mut remaining: Vec<ResourceId> = pool
        .iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .collect();
    let mut quota = quota;
    let mut selected = Vec::new();

    while quota > 0 && !remaining.is_empty() {
        let index = rng.gen_range(0..remaining.len());
        selected.push(remaining.remove(index));
        quota -= 1;
    }

    Draw {
        selected,
        remaining_pool: remaining,
        remaining_quota: quota,
    }
}

/// The ids a block draws from: its fixed list, or the resources matching
/// its constraint when the list is empty.
pub async fn candidate_pool(
    block: &ResourceBlock,
    owner: OwnerId,
    source: &dyn ObjectSource,
    retry: &RetryPolicy,
) -> Result<Vec<ResourceId>, LookupError> {
    if !block.resources.is_empty() {
        return Ok(block.resources.clone());
    }
    match &block.resource_constraint {
        Some(constraints) => {
            retry
                .run("constraint search", || source.find_matching(constraints, owner))
                .await
        }
        None => Ok(Vec::new()),
    }
}

/// Draw a block's quota of resources and materialize them as objects.
pub async fn select_from_block<R: Rng + ?Sized + Send>(
    block: &ResourceBlock,
    owner: OwnerId,
    source: &dyn ObjectSource,
    retry: &RetryPolicy,
    rng: &mut R,
) -> Result<Selection, LookupError> {
    let pool = candidate_pool(block, owner, source, retry).await?;
    let draw = draw_ids(&pool, block.number_of_occurrences, rng);

    let mut objects = Vec::with_capacity(draw.selected.len());
    for &id in &draw.selected {
        let object = retry
            .run("object fetch", || source.fetch_object(id, owner))
            .await?;
        objects.push(object);
    }
    tracing::debug!(
        pool = pool.len(),
        selected = objects.len(),
        remaining_quota = draw.remaining_quota,
        "selected objects from block"
    );

    Ok(Selection {
        objects,
        remaining_pool: draw.remaining_pool,
        remaining_quota: draw.remaining_quota,
    })
}
