//! Named entity definition
//!
//! A [`NamedEntity`] is the atomic unit of the graph: a name, an expression,
//! the value that expression last evaluated to, and the editability flags an
//! editor consults before letting a user touch it. The per-kind extras live in
//! [`EntityKind`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::entities::expression::Expression;
use crate::fit::model::FitFunction;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of an entity object.
///
/// A fresh id is issued every time an entity is constructed; clones share the
/// id of their source. External state keyed by identity (selection, undo
/// anchors) stays valid exactly as long as the id does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u64);

impl EntityId {
    fn fresh() -> Self {
        EntityId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value of the id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-kind data of an entity.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityKind {
    /// A numeric parameter whose value is its expression over other parameters.
    Parameter {
        /// Flag owned by an external aggregator that synchronizes parameters
        /// across containers.
        synced: bool,
    },

    /// A function of independent variables, parameters and other functions.
    Function,

    /// A function whose free parameters are optimization targets.
    Fit(FitFunction),
}

/// Evaluation state of a single entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    /// Never evaluated since construction.
    Uninitialized,
    /// Expression applied and evaluated to a finite number.
    Valid,
    /// Parse or evaluation failure, pending unapplied input, or a dependency
    /// on a circular entity.
    Invalid,
    /// Member of a cyclic reference closure.
    Circular,
}

/// A uniquely named, expression-bearing value.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedEntity {
    id: EntityId,
    name: String,
    /// Last successfully applied expression text
    expression: String,
    /// Last submitted expression text, applied or not
    input: String,
    value: f64,
    evaluated: bool,
    description: Option<String>,
    name_editable: bool,
    expression_editable: bool,
    important: bool,
    kind: EntityKind,
}

impl NamedEntity {
    fn with_kind(name: &str, expression: &str, kind: EntityKind) -> Self {
        let mut entity = Self {
            id: EntityId::fresh(),
            name: name.to_string(),
            expression: String::new(),
            input: String::new(),
            value: f64::NAN,
            evaluated: false,
            description: None,
            name_editable: true,
            expression_editable: true,
            important: false,
            kind,
        };
        entity.apply_expression(expression);
        entity
    }

    /// Create a parameter.
    ///
    /// # Examples
    ///
    /// ```
    /// use fitgraph::entities::NamedEntity;
    ///
    /// let k = NamedEntity::parameter("k", "2 * 3");
    /// assert_eq!(k.name(), "k");
    /// assert_eq!(k.expression(), "2 * 3");
    /// assert!(k.value().is_nan());
    /// ```
    pub fn parameter(name: &str, expression: &str) -> Self {
        Self::with_kind(name, expression, EntityKind::Parameter { synced: false })
    }

    /// Create a function.
    pub fn function(name: &str, expression: &str) -> Self {
        Self::with_kind(name, expression, EntityKind::Function)
    }

    /// Create a fit function.
    pub fn fit(name: &str, expression: &str, fit: FitFunction) -> Self {
        Self::with_kind(name, expression, EntityKind::Fit(fit))
    }

    /// Create a new entity that copies editability, description, importance
    /// and kind data from `template` but carries its own name, expression and id.
    pub fn derived_from(template: &NamedEntity, name: &str, expression: &str) -> Self {
        let mut entity = Self::with_kind(name, expression, template.kind.clone());
        entity.description = template.description.clone();
        entity.name_editable = template.name_editable;
        entity.expression_editable = template.expression_editable;
        entity.important = template.important;
        entity
    }

    /// A copy of this entity with a fresh id.
    pub(crate) fn fresh_copy(&self) -> Self {
        Self {
            id: EntityId::fresh(),
            ..self.clone()
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_name_editable(mut self, editable: bool) -> Self {
        self.name_editable = editable;
        self
    }

    pub fn with_expression_editable(mut self, editable: bool) -> Self {
        self.expression_editable = editable;
        self
    }

    /// Mark the entity as protected from removal.
    pub fn with_important(mut self, important: bool) -> Self {
        self.important = important;
        self
    }

    /// Set the synced flag. No effect on non-parameters.
    pub fn with_synced(mut self, synced: bool) -> Self {
        self.set_synced(synced);
        self
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The last successfully applied expression.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// The last submitted expression text.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// The last evaluated value; NaN on failure or before the first evaluation.
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_name_editable(&self) -> bool {
        self.name_editable
    }

    pub fn is_expression_editable(&self) -> bool {
        self.expression_editable
    }

    pub fn is_important(&self) -> bool {
        self.important
    }

    pub fn is_evaluated(&self) -> bool {
        self.evaluated
    }

    pub fn kind(&self) -> &EntityKind {
        &self.kind
    }

    pub fn is_parameter(&self) -> bool {
        matches!(self.kind, EntityKind::Parameter { .. })
    }

    /// Synced flag; always false for non-parameters.
    pub fn is_synced(&self) -> bool {
        matches!(self.kind, EntityKind::Parameter { synced: true })
    }

    pub fn set_synced(&mut self, value: bool) {
        if let EntityKind::Parameter { synced } = &mut self.kind {
            *synced = value;
        }
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
    }

    /// Fit data, if this is a fit function.
    pub fn fit_function(&self) -> Option<&FitFunction> {
        match &self.kind {
            EntityKind::Fit(fit) => Some(fit),
            _ => None,
        }
    }

    pub fn fit_function_mut(&mut self) -> Option<&mut FitFunction> {
        match &mut self.kind {
            EntityKind::Fit(fit) => Some(fit),
            _ => None,
        }
    }

    /// True when the submitted input has not been applied.
    pub fn has_pending_input(&self) -> bool {
        self.input != self.expression
    }

    /// Parse the applied expression. `None` if nothing has been applied yet.
    pub fn parsed(&self) -> Option<Expression> {
        Expression::parse(&self.expression).ok()
    }

    /// Working copy carrying a proposed expression, e.g. as the seed of
    /// [`Container::evaluate_dependents`](crate::entities::Container::evaluate_dependents).
    /// The copy keeps this entity's id.
    pub fn with_proposed_expression(&self, expression: &str) -> Self {
        let mut copy = self.clone();
        copy.apply_expression(expression);
        copy
    }

    pub(crate) fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    /// Submit expression text; it is applied only if it parses.
    ///
    /// Returns whether the text was applied.
    pub(crate) fn apply_expression(&mut self, text: &str) -> bool {
        self.input = text.to_string();
        if Expression::parse(text).is_ok() {
            self.expression = text.to_string();
            true
        } else {
            false
        }
    }

    pub(crate) fn set_value(&mut self, value: f64) {
        self.value = value;
        self.evaluated = true;
    }
}
