//! Core data model types for exgen.
//!
//! These are the fundamental types that the rest of the system uses to
//! represent exercise models (the five archetypes), their resource blocks and
//! constraints, the content objects drawn from blocks, and the generated
//! exercise instances.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::formula::LocalFormula;

/// Identifier of an exercise resource.
pub type ResourceId = u64;

/// Identifier of the user owning resources, formulas and models.
pub type OwnerId = u64;

// ---------------------------------------------------------------------------
// Resource kinds and fixed vocabularies
// ---------------------------------------------------------------------------

/// Kinds of exercise resources that blocks may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Picture,
    Text,
    MultipleChoiceQuestion,
    OpenEndedQuestion,
    Sequence,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Picture => "picture",
            ResourceKind::Text => "text",
            ResourceKind::MultipleChoiceQuestion => "multiple-choice-question",
            ResourceKind::OpenEndedQuestion => "open-ended-question",
            ResourceKind::Sequence => "sequence",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "picture" => Ok(ResourceKind::Picture),
            "text" => Ok(ResourceKind::Text),
            "multiple-choice-question" => Ok(ResourceKind::MultipleChoiceQuestion),
            "open-ended-question" => Ok(ResourceKind::OpenEndedQuestion),
            "sequence" => Ok(ResourceKind::Sequence),
            other => Err(format!("unknown resource type: {other}")),
        }
    }
}

/// What to do with objects that match no classification group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtherPolicy {
    Misc,
    Own,
    Reject,
}

impl FromStr for OtherPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MISC" => Ok(OtherPolicy::Misc),
            "OWN" => Ok(OtherPolicy::Own),
            "REJECT" => Ok(OtherPolicy::Reject),
            other => Err(format!("unknown classification policy: {other}")),
        }
    }
}

/// Sort direction of an order-items exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    #[serde(rename = "ASCENDENT")]
    Ascendent,
    #[serde(rename = "DESCENDENT")]
    Descendent,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ASCENDENT" => Ok(SortOrder::Ascendent),
            "DESCENDENT" => Ok(SortOrder::Descendent),
            other => Err(format!("unknown order: {other}")),
        }
    }
}

/// How group names are presented in a group-items exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupNameDisplay {
    #[serde(rename = "ASK")]
    Ask,
    #[serde(rename = "HIDE")]
    Hide,
    #[serde(rename = "SHOW")]
    Show,
}

impl FromStr for GroupNameDisplay {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ASK" => Ok(GroupNameDisplay::Ask),
            "HIDE" => Ok(GroupNameDisplay::Hide),
            "SHOW" => Ok(GroupNameDisplay::Show),
            other => Err(format!("unknown group name display: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Constraints and blocks
// ---------------------------------------------------------------------------

/// A condition on one metadata entry of a resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataConstraint {
    #[serde(default)]
    pub key: Option<String>,
    /// One of `exists`, `==`, `!=`, `<`, `<=`, `>`, `>=`.
    #[serde(default)]
    pub comparator: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

/// A generative constraint describing which resources a block may draw.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectConstraints {
    #[serde(default, rename = "type")]
    pub allowed_type: Option<ResourceKind>,
    #[serde(default)]
    pub metadata_constraints: Vec<MetadataConstraint>,
    #[serde(default)]
    pub excluded: Vec<ResourceId>,
}

/// A named bucket of a classification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub metadata_constraints: Vec<MetadataConstraint>,
}

/// Grouping rule for group-items exercises.
///
/// `other` is kept as the stored literal (`MISC`, `OWN`, `REJECT`) so that an
/// unrecognized value makes the model incomplete instead of unloadable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationConstraints {
    #[serde(default)]
    pub other: Option<String>,
    #[serde(default)]
    pub meta_keys: Vec<String>,
    #[serde(default)]
    pub groups: Vec<Group>,
}

impl ClassificationConstraints {
    pub fn other_policy(&self) -> Option<OtherPolicy> {
        self.other.as_deref().and_then(|o| o.parse().ok())
    }
}

/// A quota plus a pool of candidate resources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceBlock {
    #[serde(default)]
    pub number_of_occurrences: i64,
    #[serde(default)]
    pub resources: Vec<ResourceId>,
    #[serde(default)]
    pub resource_constraint: Option<ObjectConstraints>,
}

impl ResourceBlock {
    pub fn new(number_of_occurrences: i64, resources: Vec<ResourceId>) -> Self {
        Self {
            number_of_occurrences,
            resources,
            resource_constraint: None,
        }
    }

    /// A block drawing only from its fixed id list.
    pub fn is_list(&self) -> bool {
        self.resource_constraint.is_none()
    }
}

// ---------------------------------------------------------------------------
// Archetype contents
// ---------------------------------------------------------------------------

/// Fields shared by every archetype.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelCommon {
    #[serde(default)]
    pub wording: Option<String>,
    #[serde(default)]
    pub documents: Vec<ResourceId>,
    #[serde(default)]
    pub formula: Option<LocalFormula>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct McQuestionBlock {
    #[serde(flatten)]
    pub block: ResourceBlock,
    #[serde(default)]
    pub max_number_of_propositions: Option<i64>,
    #[serde(default)]
    pub max_number_of_right_propositions: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultipleChoiceModel {
    #[serde(flatten)]
    pub common: ModelCommon,
    #[serde(default)]
    pub shuffle_questions_order: Option<bool>,
    #[serde(default)]
    pub question_blocks: Vec<McQuestionBlock>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PairBlock {
    #[serde(flatten)]
    pub block: ResourceBlock,
    #[serde(default)]
    pub pair_meta_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PairItemsModel {
    #[serde(flatten)]
    pub common: ModelCommon,
    #[serde(default)]
    pub pair_blocks: Vec<PairBlock>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupObjectBlock {
    #[serde(flatten)]
    pub block: ResourceBlock,
    #[serde(default)]
    pub classif_constr: Option<ClassificationConstraints>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupItemsModel {
    #[serde(flatten)]
    pub common: ModelCommon,
    /// Stored literal: `ASK`, `HIDE` or `SHOW`.
    #[serde(default)]
    pub display_group_names: Option<String>,
    #[serde(default)]
    pub classif_constr: Option<ClassificationConstraints>,
    #[serde(default)]
    pub object_blocks: Vec<GroupObjectBlock>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SequenceBlock {
    #[serde(flatten)]
    pub block: ResourceBlock,
    #[serde(default)]
    pub keep_all: Option<bool>,
    #[serde(default)]
    pub use_first: Option<bool>,
    #[serde(default)]
    pub use_last: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderObjectBlock {
    #[serde(flatten)]
    pub block: ResourceBlock,
    #[serde(default)]
    pub meta_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderItemsModel {
    #[serde(flatten)]
    pub common: ModelCommon,
    #[serde(default)]
    pub give_first: Option<bool>,
    #[serde(default)]
    pub give_last: Option<bool>,
    #[serde(default)]
    pub sequence_block: Option<SequenceBlock>,
    #[serde(default)]
    pub object_blocks: Vec<OrderObjectBlock>,
    /// Stored literal: `ASCENDENT` or `DESCENDENT`.
    #[serde(default)]
    pub order: Option<String>,
    #[serde(default)]
    pub show_values: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenEndedModel {
    #[serde(flatten)]
    pub common: ModelCommon,
    #[serde(default)]
    pub shuffle_questions_order: Option<bool>,
    #[serde(default)]
    pub question_blocks: Vec<ResourceBlock>,
}

// ---------------------------------------------------------------------------
// Exercise models
// ---------------------------------------------------------------------------

/// The five exercise archetypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Archetype {
    MultipleChoice,
    PairItems,
    GroupItems,
    OrderItems,
    OpenEndedQuestion,
}

impl Archetype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Archetype::MultipleChoice => "multiple-choice",
            Archetype::PairItems => "pair-items",
            Archetype::GroupItems => "group-items",
            Archetype::OrderItems => "order-items",
            Archetype::OpenEndedQuestion => "open-ended-question",
        }
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Archetype {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "multiple-choice" => Ok(Archetype::MultipleChoice),
            "pair-items" => Ok(Archetype::PairItems),
            "group-items" => Ok(Archetype::GroupItems),
            "order-items" => Ok(Archetype::OrderItems),
            "open-ended-question" => Ok(Archetype::OpenEndedQuestion),
            other => Err(ModelError::UnknownArchetype(other.to_string())),
        }
    }
}

/// An exercise model: one of the five archetypes with its blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "kebab-case")]
pub enum ExerciseModel {
    MultipleChoice(MultipleChoiceModel),
    PairItems(PairItemsModel),
    GroupItems(GroupItemsModel),
    OrderItems(OrderItemsModel),
    OpenEndedQuestion(OpenEndedModel),
}

impl ExerciseModel {
    /// Build a model from its stored type tag and JSON content.
    pub fn from_content(kind: &str, content: serde_json::Value) -> Result<Self, ModelError> {
        let archetype: Archetype = kind.parse()?;
        let content_error = |e: serde_json::Error| ModelError::Content {
            archetype: archetype.to_string(),
            message: e.to_string(),
        };
        let model = match archetype {
            Archetype::MultipleChoice => {
                ExerciseModel::MultipleChoice(serde_json::from_value(content).map_err(content_error)?)
            }
            Archetype::PairItems => {
                ExerciseModel::PairItems(serde_json::from_value(content).map_err(content_error)?)
            }
            Archetype::GroupItems => {
                ExerciseModel::GroupItems(serde_json::from_value(content).map_err(content_error)?)
            }
            Archetype::OrderItems => {
                ExerciseModel::OrderItems(serde_json::from_value(content).map_err(content_error)?)
            }
            Archetype::OpenEndedQuestion => ExerciseModel::OpenEndedQuestion(
                serde_json::from_value(content).map_err(content_error)?,
            ),
        };
        Ok(model)
    }

    pub fn archetype(&self) -> Archetype {
        match self {
            ExerciseModel::MultipleChoice(_) => Archetype::MultipleChoice,
            ExerciseModel::PairItems(_) => Archetype::PairItems,
            ExerciseModel::GroupItems(_) => Archetype::GroupItems,
            ExerciseModel::OrderItems(_) => Archetype::OrderItems,
            ExerciseModel::OpenEndedQuestion(_) => Archetype::OpenEndedQuestion,
        }
    }

    pub fn common(&self) -> &ModelCommon {
        match self {
            ExerciseModel::MultipleChoice(m) => &m.common,
            ExerciseModel::PairItems(m) => &m.common,
            ExerciseModel::GroupItems(m) => &m.common,
            ExerciseModel::OrderItems(m) => &m.common,
            ExerciseModel::OpenEndedQuestion(m) => &m.common,
        }
    }
}

/// A model as held by the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredModel {
    pub id: u64,
    pub owner: OwnerId,
    #[serde(default)]
    pub title: String,
    pub model: ExerciseModel,
}

// ---------------------------------------------------------------------------
// Objects and instances
// ---------------------------------------------------------------------------

/// A concrete content object materialized from a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseObject {
    /// Source resource, absent for derived text objects.
    #[serde(default)]
    pub id: Option<ResourceId>,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub values: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl ExerciseObject {
    /// A derived text object.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            id: None,
            kind: ResourceKind::Text,
            content: Some(content.into()),
            values: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }
}

/// An object paired with the text derived from one of its metadata entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelledObject {
    pub object: ExerciseObject,
    pub label: ExerciseObject,
}

/// Objects classified under one group name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceGroup {
    pub name: String,
    pub objects: Vec<ExerciseObject>,
}

/// Archetype-specific body of a generated exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum InstanceItems {
    Questions {
        questions: Vec<ExerciseObject>,
    },
    Pairs {
        pairs: Vec<LabelledObject>,
    },
    Groups {
        display_group_names: GroupNameDisplay,
        groups: Vec<InstanceGroup>,
    },
    Sequence {
        give_first: bool,
        give_last: bool,
        sequences: Vec<ExerciseObject>,
    },
    Ordered {
        give_first: bool,
        give_last: bool,
        order: SortOrder,
        objects: Vec<ExerciseObject>,
        values: Vec<ExerciseObject>,
    },
}

/// A generated exercise, handed over to the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseInstance {
    pub model_id: u64,
    pub archetype: Archetype,
    #[serde(default)]
    pub wording: Option<String>,
    #[serde(default)]
    pub documents: Vec<ExerciseObject>,
    #[serde(default)]
    pub variables: BTreeMap<String, f64>,
    pub items: InstanceItems,
}
