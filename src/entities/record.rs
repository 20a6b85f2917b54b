//! Persistence contract for entities
//!
//! The wire format belongs to whoever stores containers; the core only
//! guarantees that every entity converts to and from an [`EntityRecord`].

use serde::{Deserialize, Serialize};

use crate::entities::entity::{EntityKind, NamedEntity};
use crate::fit::model::FitFunction;

/// Kind tag of a persisted entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Parameter,
    Function,
    Fit(FitFunction),
}

/// Serializable form of a [`NamedEntity`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub name: String,
    pub expression: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub name_editable: bool,
    #[serde(default = "default_true")]
    pub expression_editable: bool,
    #[serde(default)]
    pub synced: bool,
    #[serde(default)]
    pub important: bool,
    pub kind: RecordKind,
}

fn default_true() -> bool {
    true
}

impl From<&NamedEntity> for EntityRecord {
    fn from(entity: &NamedEntity) -> Self {
        let kind = match entity.kind() {
            EntityKind::Parameter { .. } => RecordKind::Parameter,
            EntityKind::Function => RecordKind::Function,
            EntityKind::Fit(fit) => RecordKind::Fit(fit.clone()),
        };
        Self {
            name: entity.name().to_string(),
            // The submitted text, so an unapplied edit survives a round trip
            expression: entity.input().to_string(),
            description: entity.description().map(str::to_string),
            name_editable: entity.is_name_editable(),
            expression_editable: entity.is_expression_editable(),
            synced: entity.is_synced(),
            important: entity.is_important(),
            kind,
        }
    }
}

impl EntityRecord {
    /// Build a fresh entity (new id, unevaluated) from this record.
    pub fn to_entity(&self) -> NamedEntity {
        let entity = match &self.kind {
            RecordKind::Parameter => NamedEntity::parameter(&self.name, &self.expression),
            RecordKind::Function => NamedEntity::function(&self.name, &self.expression),
            RecordKind::Fit(fit) => NamedEntity::fit(&self.name, &self.expression, fit.clone()),
        };
        let mut entity = entity
            .with_name_editable(self.name_editable)
            .with_expression_editable(self.expression_editable)
            .with_synced(self.synced)
            .with_important(self.important);
        entity.set_description(self.description.clone());
        entity
    }
}
