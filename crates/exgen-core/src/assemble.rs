//! Building the archetype-specific body of an exercise instance.

use anyhow::{anyhow, Result};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::completeness::{ITEM_KINDS, OPEN_QUESTION_KINDS, QUESTION_KINDS, SEQUENCE_KINDS};
use crate::error::{LookupError, ModelError};
use crate::formula::Bindings;
use crate::interpolate::{interpolate, interpolate_object, object_to_meta_string};
use crate::model::{
    ClassificationConstraints, ExerciseInstance, ExerciseModel, ExerciseObject, GroupItemsModel,
    GroupNameDisplay, InstanceGroup, InstanceItems, LabelledObject, ModelCommon, OrderItemsModel,
    OtherPolicy, OwnerId, ResourceBlock, ResourceKind, SortOrder, StoredModel,
};
use crate::retry::RetryPolicy;
use crate::selection::select_from_block;
use crate::traits::ObjectSource;

/// Group collecting unclassified objects under the `MISC` policy.
pub const MISC_GROUP: &str = "misc";

/// Draws and fetches objects for the blocks of one model.
pub(crate) struct Assembler<'a> {
    pub owner: OwnerId,
    pub source: &'a dyn ObjectSource,
    pub retry: &'a RetryPolicy,
    pub variables: &'a Bindings,
}

impl Assembler<'_> {
    pub async fn assemble<R: Rng + Send>(
        &self,
        stored: &StoredModel,
        rng: &mut R,
    ) -> Result<ExerciseInstance> {
        let items = match &stored.model {
            ExerciseModel::MultipleChoice(m) => {
                let blocks: Vec<&ResourceBlock> =
                    m.question_blocks.iter().map(|q| &q.block).collect();
                let shuffle = m.shuffle_questions_order.unwrap_or(false);
                self.questions(&blocks, QUESTION_KINDS, shuffle, rng).await?
            }
            ExerciseModel::OpenEndedQuestion(m) => {
                let blocks: Vec<&ResourceBlock> = m.question_blocks.iter().collect();
                let shuffle = m.shuffle_questions_order.unwrap_or(false);
                self.questions(&blocks, OPEN_QUESTION_KINDS, shuffle, rng).await?
            }
            ExerciseModel::PairItems(m) => {
                let mut pairs = Vec::new();
                for pb in &m.pair_blocks {
                    let key = pb.pair_meta_key.as_deref().unwrap_or_default();
                    for object in self.draw(&pb.block, ITEM_KINDS, rng).await? {
                        if let Some(label) = object_to_meta_string(&object, key) {
                            pairs.push(LabelledObject { object, label });
                        }
                    }
                }
                InstanceItems::Pairs { pairs }
            }
            ExerciseModel::GroupItems(m) => self.groups(m, rng).await?,
            ExerciseModel::OrderItems(m) => self.order(m, rng).await?,
        };

        let common = stored.model.common();
        Ok(ExerciseInstance {
            model_id: stored.id,
            archetype: stored.model.archetype(),
            wording: common.wording.as_deref().map(|w| interpolate(w, self.variables)),
            documents: self.documents(common).await?,
            variables: self.variables.clone(),
            items,
        })
    }

    /// Select a block's objects; each must exist and have one of the
    /// `allowed` kinds.
    async fn draw<R: Rng + Send>(
        &self,
        block: &ResourceBlock,
        allowed: &[ResourceKind],
        rng: &mut R,
    ) -> Result<Vec<ExerciseObject>> {
        let selection = select_from_block(block, self.owner, self.source, self.retry, rng)
            .await
            .map_err(invalid_reference)?;
        if let Some(object) = selection.objects.iter().find(|o| !allowed.contains(&o.kind)) {
            return Err(ModelError::InvalidResourceReference {
                id: object.id.unwrap_or_default(),
                reason: format!("a {} resource cannot be used here", object.kind),
            }
            .into());
        }
        if selection.remaining_quota > 0 {
            tracing::warn!(
                missing = selection.remaining_quota,
                "block pool exhausted before its quota"
            );
        }
        Ok(selection
            .objects
            .iter()
            .map(|o| interpolate_object(o, self.variables))
            .collect())
    }

    async fn documents(&self, common: &ModelCommon) -> Result<Vec<ExerciseObject>> {
        let mut documents = Vec::with_capacity(common.documents.len());
        for &id in &common.documents {
            let object = self
                .retry
                .run("document fetch", || self.source.fetch_object(id, self.owner))
                .await
                .map_err(invalid_reference)?;
            documents.push(interpolate_object(&object, self.variables));
        }
        Ok(documents)
    }

    async fn questions<R: Rng + Send>(
        &self,
        blocks: &[&ResourceBlock],
        allowed: &[ResourceKind],
        shuffle: bool,
        rng: &mut R,
    ) -> Result<InstanceItems> {
        let mut questions = Vec::new();
        for block in blocks {
            questions.extend(self.draw(block, allowed, rng).await?);
        }
        if shuffle {
            questions.shuffle(rng);
        }
        Ok(InstanceItems::Questions { questions })
    }

    async fn groups<R: Rng + Send>(
        &self,
        model: &GroupItemsModel,
        rng: &mut R,
    ) -> Result<InstanceItems> {
        let display_group_names: GroupNameDisplay = model
            .display_group_names
            .as_deref()
            .unwrap_or_default()
            .parse()
            .map_err(|e: String| anyhow!(e))?;

        let mut groups: Vec<InstanceGroup> = Vec::new();
        for ob in &model.object_blocks {
            let classification = model
                .classif_constr
                .as_ref()
                .or(ob.classif_constr.as_ref())
                .ok_or_else(|| anyhow!("object block without classification"))?;
            for object in self.draw(&ob.block, ITEM_KINDS, rng).await? {
                if let Some(name) = classify(&object, classification)? {
                    push_into_group(&mut groups, name, object);
                }
            }
        }
        Ok(InstanceItems::Groups {
            display_group_names,
            groups,
        })
    }

    async fn order<R: Rng + Send>(
        &self,
        model: &OrderItemsModel,
        rng: &mut R,
    ) -> Result<InstanceItems> {
        let give_first = model.give_first.unwrap_or(false);
        let give_last = model.give_last.unwrap_or(false);

        if let Some(sequence) = &model.sequence_block {
            let sequences = self.draw(&sequence.block, SEQUENCE_KINDS, rng).await?;
            return Ok(InstanceItems::Sequence {
                give_first,
                give_last,
                sequences,
            });
        }

        let order: SortOrder = model
            .order
            .as_deref()
            .unwrap_or_default()
            .parse()
            .map_err(|e: String| anyhow!(e))?;

        let mut keyed: Vec<(ExerciseObject, ExerciseObject)> = Vec::new();
        for ob in &model.object_blocks {
            let key = ob.meta_key.as_deref().unwrap_or_default();
            for object in self.draw(&ob.block, ITEM_KINDS, rng).await? {
                if let Some(value) = object_to_meta_string(&object, key) {
                    keyed.push((object, value));
                }
            }
        }
        keyed.sort_by(|(_, a), (_, b)| {
            let a = a.content.as_deref().unwrap_or_default();
            let b = b.content.as_deref().unwrap_or_default();
            compare_sort_values(a, b)
        });
        if order == SortOrder::Descendent {
            keyed.reverse();
        }

        let (objects, values): (Vec<_>, Vec<_>) = keyed.into_iter().unzip();
        Ok(InstanceItems::Ordered {
            give_first,
            give_last,
            order,
            objects,
            values: if model.show_values.unwrap_or(false) {
                values
            } else {
                Vec::new()
            },
        })
    }
}

/// A referenced resource that is gone is a broken model reference; other
/// lookup failures pass through.
fn invalid_reference(error: LookupError) -> anyhow::Error {
    match error {
        LookupError::NotFound { id, .. } => ModelError::InvalidResourceReference {
            id,
            reason: "resource not found".into(),
        }
        .into(),
        other => other.into(),
    }
}

/// Name of the group `object` belongs to, or `None` when rejected.
///
/// The first group whose constraints all match wins; otherwise the
/// classification's policy for other objects applies.
pub fn classify(
    object: &ExerciseObject,
    classification: &ClassificationConstraints,
) -> Result<Option<String>> {
    if let Some(group) = classification.groups.iter().find(|g| {
        g.metadata_constraints
            .iter()
            .all(|c| c.matches(&object.metadata))
    }) {
        return Ok(Some(group.name.clone()));
    }
    let policy = classification
        .other_policy()
        .ok_or_else(|| anyhow!("invalid classification policy {:?}", classification.other))?;
    Ok(match policy {
        OtherPolicy::Misc => Some(MISC_GROUP.to_string()),
        OtherPolicy::Own => Some(
            classification
                .meta_keys
                .iter()
                .find_map(|k| object.metadata.get(k))
                .cloned()
                .unwrap_or_else(|| MISC_GROUP.to_string()),
        ),
        OtherPolicy::Reject => None,
    })
}

fn push_into_group(groups: &mut Vec<InstanceGroup>, name: String, object: ExerciseObject) {
    match groups.iter_mut().find(|g| g.name == name) {
        Some(group) => group.objects.push(object),
        None => groups.push(InstanceGroup {
            name,
            objects: vec![object],
        }),
    }
}

/// Numbers first in numeric order, then text in lexical order.
fn compare_sort_values(a: &str, b: &str) -> std::cmp::Ordering {
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(x), Ok(y)) => x.total_cmp(&y),
        (Ok(_), Err(_)) => std::cmp::Ordering::Less,
        (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::model::{Group, MetadataConstraint, OrderObjectBlock};
    use crate::traits::ResourceRecord;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::BTreeMap;

    fn object(pairs: &[(&str, &str)]) -> ExerciseObject {
        let mut o = ExerciseObject::text("x");
        o.metadata = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<BTreeMap<_, _>>();
        o
    }

    fn classification(other: &str) -> ClassificationConstraints {
        ClassificationConstraints {
            other: Some(other.into()),
            meta_keys: vec!["continent".into(), "country".into()],
            groups: vec![Group {
                name: "Mammals".into(),
                metadata_constraints: vec![MetadataConstraint::new("class", "==", Some("mammal"))],
            }],
        }
    }

    #[test]
    fn first_matching_group_wins() {
        let o = object(&[("class", "mammal")]);
        assert_eq!(
            classify(&o, &classification("REJECT")).unwrap(),
            Some("Mammals".to_string())
        );
    }

    #[test]
    fn other_policies() {
        let bird = object(&[("class", "bird"), ("country", "Peru")]);
        assert_eq!(
            classify(&bird, &classification("MISC")).unwrap(),
            Some(MISC_GROUP.to_string())
        );
        assert_eq!(
            classify(&bird, &classification("OWN")).unwrap(),
            Some("Peru".to_string())
        );
        assert_eq!(classify(&bird, &classification("REJECT")).unwrap(), None);
        assert!(classify(&bird, &classification("SOMETIMES")).is_err());
    }

    #[test]
    fn groups_merge_by_name() {
        let mut groups = Vec::new();
        push_into_group(&mut groups, "a".into(), object(&[]));
        push_into_group(&mut groups, "b".into(), object(&[]));
        push_into_group(&mut groups, "a".into(), object(&[]));
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].objects.len(), 2);
    }

    fn resource(id: u64, kind: ResourceKind) -> ResourceRecord {
        ResourceRecord {
            id,
            owner: 1,
            kind,
            content: Some(format!("resource {id}")),
            values: vec![],
            metadata: BTreeMap::from([("year".to_string(), id.to_string())]),
        }
    }

    async fn assemble_with(catalog: &Catalog, model: ExerciseModel) -> Result<ExerciseInstance> {
        let variables = Bindings::new();
        let retry = RetryPolicy::none();
        let assembler = Assembler {
            owner: 1,
            source: catalog,
            retry: &retry,
            variables: &variables,
        };
        let stored = StoredModel {
            id: 1,
            owner: 1,
            title: "Timeline".into(),
            model,
        };
        assembler.assemble(&stored, &mut StdRng::seed_from_u64(0)).await
    }

    fn timeline(resources: Vec<u64>, documents: Vec<u64>) -> ExerciseModel {
        ExerciseModel::OrderItems(OrderItemsModel {
            common: ModelCommon {
                documents,
                ..Default::default()
            },
            give_first: Some(false),
            give_last: Some(false),
            sequence_block: None,
            object_blocks: vec![OrderObjectBlock {
                block: ResourceBlock::new(resources.len() as i64, resources),
                meta_key: Some("year".into()),
            }],
            order: Some("ASCENDENT".into()),
            show_values: Some(false),
        })
    }

    fn invalid_reference_id(err: &anyhow::Error) -> Option<u64> {
        match err.downcast_ref::<ModelError>() {
            Some(ModelError::InvalidResourceReference { id, .. }) => Some(*id),
            _ => None,
        }
    }

    #[tokio::test]
    async fn orders_by_meta_value() {
        let catalog = Catalog::default()
            .with_resource(resource(30, ResourceKind::Text))
            .with_resource(resource(4, ResourceKind::Picture));
        let instance = assemble_with(&catalog, timeline(vec![30, 4], vec![])).await.unwrap();
        let InstanceItems::Ordered { objects, values, .. } = instance.items else {
            panic!("expected ordered items");
        };
        let ids: Vec<_> = objects.iter().filter_map(|o| o.id).collect();
        assert_eq!(ids, vec![4, 30]);
        assert!(values.is_empty());
    }

    #[tokio::test]
    async fn missing_resource_is_an_invalid_reference() {
        let catalog = Catalog::default().with_resource(resource(1, ResourceKind::Text));
        let err = assemble_with(&catalog, timeline(vec![1], vec![77])).await.unwrap_err();
        assert_eq!(invalid_reference_id(&err), Some(77));

        let err = assemble_with(&catalog, timeline(vec![1, 2], vec![])).await.unwrap_err();
        assert_eq!(invalid_reference_id(&err), Some(2));
    }

    #[tokio::test]
    async fn wrong_kind_is_an_invalid_reference() {
        let catalog = Catalog::default()
            .with_resource(resource(1, ResourceKind::Text))
            .with_resource(resource(2, ResourceKind::OpenEndedQuestion));
        let err = assemble_with(&catalog, timeline(vec![1, 2], vec![])).await.unwrap_err();
        assert_eq!(invalid_reference_id(&err), Some(2));
    }

    #[test]
    fn sort_values_numeric_first() {
        use std::cmp::Ordering;
        assert_eq!(compare_sort_values("9", "10"), Ordering::Less);
        assert_eq!(compare_sort_values("b", "a"), Ordering::Greater);
        assert_eq!(compare_sort_values("1a", "9"), Ordering::Greater);

        let mut mixed = vec!["1a", "10", "b", "9"];
        mixed.sort_by(|a, b| compare_sort_values(a, b));
        assert_eq!(mixed, vec!["9", "10", "1a", "b"]);
    }
}
