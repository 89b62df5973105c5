//! Model completeness: can an exercise model generate instances?
//!
//! Every check answers `Ok(true)` or `Ok(false)`. A referenced resource
//! that does not exist, or has a disallowed type, is a plain `false`.
//! Only a lookup failure other than "not found" is returned as an error.

use crate::error::LookupError;
use crate::model::{
    ClassificationConstraints, ExerciseModel, GroupItemsModel, GroupNameDisplay,
    MetadataConstraint, MultipleChoiceModel, ObjectConstraints, OpenEndedModel, OrderItemsModel,
    PairItemsModel, ResourceBlock, ResourceId, ResourceKind, SortOrder,
};
use crate::traits::ResourceLookup;

pub(crate) const QUESTION_KINDS: &[ResourceKind] = &[ResourceKind::MultipleChoiceQuestion];
pub(crate) const OPEN_QUESTION_KINDS: &[ResourceKind] = &[ResourceKind::OpenEndedQuestion];
pub(crate) const ITEM_KINDS: &[ResourceKind] = &[ResourceKind::Picture, ResourceKind::Text];
pub(crate) const SEQUENCE_KINDS: &[ResourceKind] = &[ResourceKind::Sequence];

/// Dispatch on the archetype.
pub async fn check_model_complete(
    model: &ExerciseModel,
    lookup: &dyn ResourceLookup,
) -> Result<bool, LookupError> {
    let complete = match model {
        ExerciseModel::MultipleChoice(m) => check_multiple_choice_complete(m, lookup).await?,
        ExerciseModel::PairItems(m) => check_pair_items_complete(m, lookup).await?,
        ExerciseModel::GroupItems(m) => check_group_items_complete(m, lookup).await?,
        ExerciseModel::OrderItems(m) => check_order_items_complete(m, lookup).await?,
        ExerciseModel::OpenEndedQuestion(m) => check_open_ended_complete(m, lookup).await?,
    };
    tracing::debug!(archetype = %model.archetype(), complete, "model completeness checked");
    Ok(complete)
}

pub async fn check_multiple_choice_complete(
    model: &MultipleChoiceModel,
    lookup: &dyn ResourceLookup,
) -> Result<bool, LookupError> {
    if model.shuffle_questions_order.is_none() || model.question_blocks.is_empty() {
        return Ok(false);
    }
    for qb in &model.question_blocks {
        // An absent limit is not read as zero: both must be present.
        let limits_set = qb.max_number_of_propositions.is_some_and(|n| n >= 0)
            && qb.max_number_of_right_propositions.is_some_and(|n| n >= 0);
        if !limits_set || !check_block_complete(&qb.block, QUESTION_KINDS, lookup).await? {
            return Ok(false);
        }
    }
    Ok(true)
}

pub async fn check_pair_items_complete(
    model: &PairItemsModel,
    lookup: &dyn ResourceLookup,
) -> Result<bool, LookupError> {
    if model.pair_blocks.is_empty() {
        return Ok(false);
    }
    for pb in &model.pair_blocks {
        if is_blank(pb.pair_meta_key.as_deref())
            || !check_block_complete(&pb.block, ITEM_KINDS, lookup).await?
        {
            return Ok(false);
        }
    }
    Ok(true)
}

pub async fn check_group_items_complete(
    model: &GroupItemsModel,
    lookup: &dyn ResourceLookup,
) -> Result<bool, LookupError> {
    let display_ok = model
        .display_group_names
        .as_deref()
        .is_some_and(|d| d.parse::<GroupNameDisplay>().is_ok());
    if !display_ok || model.object_blocks.is_empty() {
        return Ok(false);
    }
    let global = match &model.classif_constr {
        Some(cc) if !check_classification_complete(cc) => return Ok(false),
        other => other.as_ref(),
    };
    for ob in &model.object_blocks {
        if global.is_none() {
            match &ob.classif_constr {
                Some(cc) if check_classification_complete(cc) => {}
                _ => return Ok(false),
            }
        }
        if !check_block_complete(&ob.block, ITEM_KINDS, lookup).await? {
            return Ok(false);
        }
    }
    Ok(true)
}

pub async fn check_order_items_complete(
    model: &OrderItemsModel,
    lookup: &dyn ResourceLookup,
) -> Result<bool, LookupError> {
    if model.give_first.is_none() || model.give_last.is_none() {
        return Ok(false);
    }
    match (&model.sequence_block, model.object_blocks.is_empty()) {
        (Some(sequence), true) => {
            let Some(keep_all) = sequence.keep_all else {
                return Ok(false);
            };
            if !keep_all && (sequence.use_first.is_none() || sequence.use_last.is_none()) {
                return Ok(false);
            }
            check_block_complete(&sequence.block, SEQUENCE_KINDS, lookup).await
        }
        (None, false) => {
            let order_ok = model
                .order
                .as_deref()
                .is_some_and(|o| o.parse::<SortOrder>().is_ok());
            if !order_ok || model.show_values.is_none() {
                return Ok(false);
            }
            for ob in &model.object_blocks {
                if is_blank(ob.meta_key.as_deref())
                    || !check_block_complete(&ob.block, ITEM_KINDS, lookup).await?
                {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        // Both or neither of the two sources.
        _ => Ok(false),
    }
}

pub async fn check_open_ended_complete(
    model: &OpenEndedModel,
    lookup: &dyn ResourceLookup,
) -> Result<bool, LookupError> {
    if model.shuffle_questions_order.is_none() || model.question_blocks.is_empty() {
        return Ok(false);
    }
    for block in &model.question_blocks {
        if !check_block_complete(block, OPEN_QUESTION_KINDS, lookup).await? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// A block is complete when its quota is non-negative, it has a source
/// (ids or a constraint), every listed id resolves to an allowed type, a
/// present constraint is complete, and a list-only block holds enough ids
/// for its quota.
pub async fn check_block_complete(
    block: &ResourceBlock,
    allowed: &[ResourceKind],
    lookup: &dyn ResourceLookup,
) -> Result<bool, LookupError> {
    if block.number_of_occurrences < 0 {
        return Ok(false);
    }
    if block.resources.is_empty() && block.resource_constraint.is_none() {
        return Ok(false);
    }
    if block.is_list() && block.number_of_occurrences > block.resources.len() as i64 {
        return Ok(false);
    }
    for id in &block.resources {
        if !check_object_id(*id, allowed, lookup).await? {
            return Ok(false);
        }
    }
    match &block.resource_constraint {
        Some(constraint) => check_constraints_complete(constraint, allowed, lookup).await,
        None => Ok(true),
    }
}

pub async fn check_constraints_complete(
    constraints: &ObjectConstraints,
    allowed: &[ResourceKind],
    lookup: &dyn ResourceLookup,
) -> Result<bool, LookupError> {
    if let Some(kind) = constraints.allowed_type {
        if !allowed.is_empty() && !allowed.contains(&kind) {
            return Ok(false);
        }
    }
    if constraints.metadata_constraints.is_empty()
        || !constraints
            .metadata_constraints
            .iter()
            .all(check_metadata_constraint_complete)
    {
        return Ok(false);
    }
    for id in &constraints.excluded {
        if !check_object_id(*id, &[], lookup).await? {
            return Ok(false);
        }
    }
    Ok(true)
}

pub fn check_metadata_constraint_complete(constraint: &MetadataConstraint) -> bool {
    !is_blank(constraint.key.as_deref()) && !is_blank(constraint.comparator.as_deref())
}

pub fn check_classification_complete(classification: &ClassificationConstraints) -> bool {
    if classification.other_policy().is_none() || classification.meta_keys.is_empty() {
        return false;
    }
    classification.groups.iter().all(|group| {
        !group.name.trim().is_empty()
            && !group.metadata_constraints.is_empty()
            && group
                .metadata_constraints
                .iter()
                .all(check_metadata_constraint_complete)
    })
}

/// Whether `id` exists and, when `allowed` is non-empty, has one of those
/// types.
pub async fn check_object_id(
    id: ResourceId,
    allowed: &[ResourceKind],
    lookup: &dyn ResourceLookup,
) -> Result<bool, LookupError> {
    match lookup.get_resource(id).await {
        Ok(info) => Ok(allowed.is_empty() || allowed.contains(&info.kind)),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::model::{
        Group, GroupObjectBlock, McQuestionBlock, OrderObjectBlock, PairBlock, SequenceBlock,
    };
    use crate::traits::{ResourceInfo, ResourceRecord};
    use async_trait::async_trait;

    fn record(id: ResourceId, kind: ResourceKind) -> ResourceRecord {
        ResourceRecord {
            id,
            owner: 1,
            kind,
            content: Some(format!("resource {id}")),
            values: vec![],
            metadata: Default::default(),
        }
    }

    fn catalog() -> Catalog {
        Catalog::default()
            .with_resource(record(1, ResourceKind::MultipleChoiceQuestion))
            .with_resource(record(2, ResourceKind::MultipleChoiceQuestion))
            .with_resource(record(3, ResourceKind::Text))
            .with_resource(record(4, ResourceKind::Picture))
            .with_resource(record(5, ResourceKind::Sequence))
            .with_resource(record(6, ResourceKind::OpenEndedQuestion))
            .with_resource(record(7, ResourceKind::Text))
    }

    fn country_constraint() -> ObjectConstraints {
        ObjectConstraints {
            allowed_type: Some(ResourceKind::Text),
            metadata_constraints: vec![MetadataConstraint::new("country", "exists", None)],
            excluded: vec![],
        }
    }

    fn classification() -> ClassificationConstraints {
        ClassificationConstraints {
            other: Some("MISC".into()),
            meta_keys: vec!["country".into()],
            groups: vec![Group {
                name: "Europe".into(),
                metadata_constraints: vec![MetadataConstraint::new(
                    "continent",
                    "==",
                    Some("Europe"),
                )],
            }],
        }
    }

    fn mc_model(blocks: Vec<McQuestionBlock>) -> MultipleChoiceModel {
        MultipleChoiceModel {
            common: Default::default(),
            shuffle_questions_order: Some(true),
            question_blocks: blocks,
        }
    }

    fn mc_block(n: i64, ids: Vec<ResourceId>) -> McQuestionBlock {
        McQuestionBlock {
            block: ResourceBlock::new(n, ids),
            max_number_of_propositions: Some(4),
            max_number_of_right_propositions: Some(1),
        }
    }

    #[tokio::test]
    async fn multiple_choice_complete() {
        let model = mc_model(vec![mc_block(2, vec![1, 2])]);
        assert!(check_multiple_choice_complete(&model, &catalog()).await.unwrap());
    }

    #[tokio::test]
    async fn multiple_choice_wrong_type_is_incomplete() {
        // Resource 3 is a text, not a multiple-choice question.
        let model = mc_model(vec![mc_block(1, vec![3])]);
        assert!(!check_multiple_choice_complete(&model, &catalog()).await.unwrap());
    }

    #[tokio::test]
    async fn multiple_choice_missing_fields() {
        let lookup = catalog();
        let mut model = mc_model(vec![mc_block(1, vec![1])]);
        model.shuffle_questions_order = None;
        assert!(!check_multiple_choice_complete(&model, &lookup).await.unwrap());

        let mut block = mc_block(1, vec![1]);
        block.max_number_of_right_propositions = None;
        let model = mc_model(vec![block]);
        assert!(!check_multiple_choice_complete(&model, &lookup).await.unwrap());

        let model = mc_model(vec![]);
        assert!(!check_multiple_choice_complete(&model, &lookup).await.unwrap());
    }

    #[tokio::test]
    async fn pair_items() {
        let lookup = catalog();
        let mut model = PairItemsModel {
            common: Default::default(),
            pair_blocks: vec![PairBlock {
                block: ResourceBlock::new(2, vec![3, 4]),
                pair_meta_key: Some("capital".into()),
            }],
        };
        assert!(check_pair_items_complete(&model, &lookup).await.unwrap());
        model.pair_blocks[0].pair_meta_key = Some(" ".into());
        assert!(!check_pair_items_complete(&model, &lookup).await.unwrap());
    }

    fn group_model() -> GroupItemsModel {
        GroupItemsModel {
            common: Default::default(),
            display_group_names: Some("SHOW".into()),
            classif_constr: Some(classification()),
            object_blocks: vec![GroupObjectBlock {
                block: ResourceBlock::new(2, vec![3, 4, 7]),
                classif_constr: None,
            }],
        }
    }

    #[tokio::test]
    async fn group_items() {
        let lookup = catalog();
        assert!(check_group_items_complete(&group_model(), &lookup).await.unwrap());

        // Quota above the fixed list.
        let mut model = group_model();
        model.object_blocks[0].block.number_of_occurrences = 4;
        assert!(!check_group_items_complete(&model, &lookup).await.unwrap());

        let mut model = group_model();
        model.display_group_names = Some("MAYBE".into());
        assert!(!check_group_items_complete(&model, &lookup).await.unwrap());
    }

    #[tokio::test]
    async fn group_items_per_block_classification() {
        let lookup = catalog();
        let mut model = group_model();
        model.classif_constr = None;
        assert!(!check_group_items_complete(&model, &lookup).await.unwrap());
        model.object_blocks[0].classif_constr = Some(classification());
        assert!(check_group_items_complete(&model, &lookup).await.unwrap());

        let mut bad = classification();
        bad.other = Some("KEEP".into());
        model.classif_constr = Some(bad);
        assert!(!check_group_items_complete(&model, &lookup).await.unwrap());
    }

    fn sequence_model() -> OrderItemsModel {
        OrderItemsModel {
            common: Default::default(),
            give_first: Some(true),
            give_last: Some(false),
            sequence_block: Some(SequenceBlock {
                block: ResourceBlock::new(1, vec![5]),
                keep_all: Some(false),
                use_first: Some(true),
                use_last: Some(true),
            }),
            object_blocks: vec![],
            order: None,
            show_values: None,
        }
    }

    fn object_order_model() -> OrderItemsModel {
        OrderItemsModel {
            common: Default::default(),
            give_first: Some(false),
            give_last: Some(false),
            sequence_block: None,
            object_blocks: vec![OrderObjectBlock {
                block: ResourceBlock::new(2, vec![3, 7]),
                meta_key: Some("year".into()),
            }],
            order: Some("ASCENDENT".into()),
            show_values: Some(true),
        }
    }

    #[tokio::test]
    async fn order_items_sources() {
        let lookup = catalog();
        assert!(check_order_items_complete(&sequence_model(), &lookup).await.unwrap());
        assert!(check_order_items_complete(&object_order_model(), &lookup).await.unwrap());

        // Both a sequence and object blocks.
        let mut both = sequence_model();
        both.object_blocks = object_order_model().object_blocks;
        assert!(!check_order_items_complete(&both, &lookup).await.unwrap());

        // Neither.
        let mut neither = sequence_model();
        neither.sequence_block = None;
        assert!(!check_order_items_complete(&neither, &lookup).await.unwrap());
    }

    #[tokio::test]
    async fn order_items_sequence_flags() {
        let lookup = catalog();
        let mut model = sequence_model();
        if let Some(seq) = model.sequence_block.as_mut() {
            seq.use_last = None;
        }
        assert!(!check_order_items_complete(&model, &lookup).await.unwrap());
        if let Some(seq) = model.sequence_block.as_mut() {
            seq.keep_all = Some(true);
        }
        assert!(check_order_items_complete(&model, &lookup).await.unwrap());

        let mut model = object_order_model();
        model.order = Some("RANDOM".into());
        assert!(!check_order_items_complete(&model, &lookup).await.unwrap());
        let mut model = object_order_model();
        model.object_blocks[0].meta_key = None;
        assert!(!check_order_items_complete(&model, &lookup).await.unwrap());
    }

    #[tokio::test]
    async fn open_ended() {
        let lookup = catalog();
        let mut model = OpenEndedModel {
            common: Default::default(),
            shuffle_questions_order: Some(false),
            question_blocks: vec![ResourceBlock::new(1, vec![6])],
        };
        assert!(check_open_ended_complete(&model, &lookup).await.unwrap());
        model.question_blocks.push(ResourceBlock::new(1, vec![1]));
        assert!(!check_open_ended_complete(&model, &lookup).await.unwrap());
    }

    #[tokio::test]
    async fn block_rules() {
        let lookup = catalog();
        assert!(!check_block_complete(&ResourceBlock::new(-1, vec![3]), ITEM_KINDS, &lookup)
            .await
            .unwrap());
        assert!(!check_block_complete(&ResourceBlock::new(0, vec![]), ITEM_KINDS, &lookup)
            .await
            .unwrap());
        // Missing resource is a plain false.
        assert!(!check_block_complete(&ResourceBlock::new(1, vec![42]), ITEM_KINDS, &lookup)
            .await
            .unwrap());

        let constrained = ResourceBlock {
            number_of_occurrences: 3,
            resources: vec![],
            resource_constraint: Some(country_constraint()),
        };
        assert!(check_block_complete(&constrained, ITEM_KINDS, &lookup).await.unwrap());

        let mut wrong_type = constrained.clone();
        if let Some(c) = wrong_type.resource_constraint.as_mut() {
            c.allowed_type = Some(ResourceKind::Sequence);
        }
        assert!(!check_block_complete(&wrong_type, ITEM_KINDS, &lookup).await.unwrap());
    }

    #[tokio::test]
    async fn constraint_rules() {
        let lookup = catalog();
        let mut c = country_constraint();
        c.excluded = vec![1];
        assert!(check_constraints_complete(&c, ITEM_KINDS, &lookup).await.unwrap());
        c.excluded = vec![99];
        assert!(!check_constraints_complete(&c, ITEM_KINDS, &lookup).await.unwrap());

        let mut empty = country_constraint();
        empty.metadata_constraints.clear();
        assert!(!check_constraints_complete(&empty, ITEM_KINDS, &lookup).await.unwrap());

        let mut half = country_constraint();
        half.metadata_constraints = vec![MetadataConstraint {
            key: Some("country".into()),
            comparator: None,
            value: None,
        }];
        assert!(!check_constraints_complete(&half, ITEM_KINDS, &lookup).await.unwrap());
    }

    #[test]
    fn classification_rules() {
        assert!(check_classification_complete(&classification()));

        let mut c = classification();
        c.meta_keys.clear();
        assert!(!check_classification_complete(&c));

        let mut c = classification();
        c.groups[0].name = String::new();
        assert!(!check_classification_complete(&c));

        let mut c = classification();
        c.groups[0].metadata_constraints.clear();
        assert!(!check_classification_complete(&c));

        let mut c = classification();
        c.other = None;
        assert!(!check_classification_complete(&c));
    }

    struct Unreachable;

    #[async_trait]
    impl ResourceLookup for Unreachable {
        async fn get_resource(&self, _: ResourceId) -> Result<ResourceInfo, LookupError> {
            Err(LookupError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn transient_lookup_failure_is_an_error() {
        let model = mc_model(vec![mc_block(1, vec![1])]);
        let err = check_multiple_choice_complete(&model, &Unreachable)
            .await
            .unwrap_err();
        assert!(!err.is_permanent());
    }

    #[tokio::test]
    async fn dispatch_by_archetype() {
        let model = ExerciseModel::MultipleChoice(mc_model(vec![mc_block(2, vec![1, 2])]));
        assert!(check_model_complete(&model, &catalog()).await.unwrap());
    }

    #[tokio::test]
    async fn half_filled_metadata_constraint_makes_model_incomplete() {
        let mut constraint = country_constraint();
        constraint.metadata_constraints = vec![MetadataConstraint {
            key: Some("country".into()),
            comparator: None,
            value: None,
        }];
        let mut block = ResourceBlock::new(1, vec![]);
        block.resource_constraint = Some(constraint);
        let model = ExerciseModel::PairItems(PairItemsModel {
            common: Default::default(),
            pair_blocks: vec![PairBlock {
                block,
                pair_meta_key: Some("country".into()),
            }],
        });
        assert!(!check_model_complete(&model, &catalog()).await.unwrap());

        // The same block with the comparator filled in is complete.
        let ExerciseModel::PairItems(mut pairs) = model else {
            unreachable!()
        };
        if let Some(c) = pairs.pair_blocks[0].block.resource_constraint.as_mut() {
            c.metadata_constraints[0].comparator = Some("exists".into());
        }
        let model = ExerciseModel::PairItems(pairs);
        assert!(check_model_complete(&model, &catalog()).await.unwrap());
    }
}
