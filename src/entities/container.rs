//! Dependency container implementation
//!
//! A [`Container`] owns an ordered collection of named entities. It enforces
//! naming rules across linked namespaces, tracks which entities reference
//! which, isolates circular references, and evaluates everything else in an
//! order where no entity reads a stale dependency.
//!
//! Naming violations and protected removals are rejected by returning `None`;
//! evaluation failures are recorded as NaN values and entity states. Nothing
//! here panics or returns an error for bad user input.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use tracing::{debug, trace};

use crate::entities::entity::{EntityId, EntityState, NamedEntity};
use crate::entities::events::{
    Applied, ChangeEvent, ChangeListener, EditKind, EditRecord, EditedProperty,
};
use crate::entities::expression::{
    is_builtin_name, is_identifier, EvaluationContext, ExprResult, ExpressionError,
};
use crate::entities::record::EntityRecord;
use crate::entities::scope::NameScope;
use crate::error::{FitGraphError, Result};

/// What a container holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// Parameters: depend only on other parameters. An expression change
    /// replaces the parameter object so earlier snapshots stay point-in-time.
    Parameters,
    /// Functions: depend on parameters, independent variables and each other.
    /// Edits mutate in place.
    Functions,
}

/// Owner of an ordered set of named entities.
pub struct Container {
    kind: ContainerKind,
    entities: Vec<NamedEntity>,
    forbidden_names: BTreeSet<String>,
    /// Independent variable names, in the order values are supplied
    variables: Vec<String>,
    variable_values: Vec<f64>,
    /// Reserved name a layered child leaves to its parent
    excluded_name: Option<String>,
    /// Positions of the entities each entity's expression names, by position
    direct_references: Vec<BTreeSet<usize>>,
    circular_errors: BTreeSet<EntityId>,
    /// Not circular themselves, but depend on a circular entity
    blocked: BTreeSet<EntityId>,
    evaluation_order: Vec<EntityId>,
    listeners: Vec<Box<dyn ChangeListener>>,
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("kind", &self.kind)
            .field("entities", &self.entities)
            .field("forbidden_names", &self.forbidden_names)
            .field("variables", &self.variables)
            .field("excluded_name", &self.excluded_name)
            .field("circular_errors", &self.circular_errors)
            .field("evaluation_order", &self.evaluation_order)
            .finish_non_exhaustive()
    }
}

/// Lookup chain used while evaluating: entities already evaluated in this
/// pass, then independent variables, then the linked scope.
struct GraphContext<'a> {
    values: &'a HashMap<String, f64>,
    variables: &'a [String],
    variable_values: &'a [f64],
    scope: &'a dyn NameScope,
}

impl EvaluationContext for GraphContext<'_> {
    fn get_variable(&self, name: &str) -> ExprResult<f64> {
        if let Some(value) = self.values.get(name) {
            return Ok(*value);
        }
        if let Some(i) = self.variables.iter().position(|v| v == name) {
            return Ok(self.variable_values.get(i).copied().unwrap_or(0.0));
        }
        self.scope
            .value_of(name)
            .ok_or_else(|| ExpressionError::UndefinedVariable {
                name: name.to_string(),
            })
    }

    fn has_variable(&self, name: &str) -> bool {
        self.values.contains_key(name)
            || self.variables.iter().any(|v| v == name)
            || self.scope.value_of(name).is_some()
    }
}

fn evaluate_entity(entity: &NamedEntity, context: &GraphContext<'_>) -> f64 {
    match entity.parsed() {
        Some(expr) => match expr.evaluate(context) {
            Ok(value) => value,
            Err(err) => {
                trace!(entity = entity.name(), %err, "evaluation failed");
                f64::NAN
            }
        },
        None => f64::NAN,
    }
}

impl Container {
    /// Create an empty container of the given kind.
    pub fn new(kind: ContainerKind) -> Self {
        Self {
            kind,
            entities: Vec::new(),
            forbidden_names: BTreeSet::new(),
            variables: Vec::new(),
            variable_values: Vec::new(),
            excluded_name: None,
            direct_references: Vec::new(),
            circular_errors: BTreeSet::new(),
            blocked: BTreeSet::new(),
            evaluation_order: Vec::new(),
            listeners: Vec::new(),
        }
    }

    /// Create an empty parameter container.
    pub fn parameters() -> Self {
        Self::new(ContainerKind::Parameters)
    }

    /// Create an empty function container over the given independent variables.
    ///
    /// # Examples
    ///
    /// ```
    /// use fitgraph::entities::{Container, NamedEntity};
    ///
    /// let mut params = Container::parameters();
    /// params.add_object(NamedEntity::parameter("k", "2"), 0, false, &());
    /// params.evaluate_all(&());
    ///
    /// let mut functions = Container::functions(&["x"]);
    /// let f = functions
    ///     .add_object(NamedEntity::function("f", "k*x"), 0, false, &params)
    ///     .unwrap();
    /// functions.evaluate_all(&params);
    /// assert_eq!(functions.evaluate_at(f.id, &[3.0], &params), 6.0);
    /// ```
    pub fn functions(variables: &[&str]) -> Self {
        Self::new(ContainerKind::Functions).with_variables(variables)
    }

    /// Set the independent variable names. Their values default to zero.
    pub fn with_variables(mut self, variables: &[&str]) -> Self {
        self.variables = variables.iter().map(|v| v.to_string()).collect();
        self.variable_values = vec![0.0; self.variables.len()];
        self
    }

    /// Reserve names regardless of current entities.
    pub fn with_forbidden_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.forbidden_names.extend(names.into_iter().map(Into::into));
        self
    }

    /// Reserve one name that this (layered) container leaves to its parent.
    pub fn with_excluded_name(mut self, name: &str) -> Self {
        self.excluded_name = Some(name.to_string());
        self
    }

    /// Whether this container holds parameters or functions.
    pub fn kind(&self) -> ContainerKind {
        self.kind
    }

    /// Independent variable names, in the order values are supplied.
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// The name a layered container leaves to its parent, if any.
    pub fn excluded_name(&self) -> Option<&str> {
        self.excluded_name.as_deref()
    }

    /// Names reserved regardless of the current entities.
    pub fn forbidden_names(&self) -> &BTreeSet<String> {
        &self.forbidden_names
    }

    /// Values bound to the independent variables during [`Container::evaluate_all`].
    pub fn set_variable_values(&mut self, values: &[f64]) {
        for (slot, value) in self.variable_values.iter_mut().zip(values) {
            *slot = *value;
        }
    }

    /// Register a listener notified of every applied change.
    ///
    /// Rejected and no-op edits notify nobody.
    pub fn add_listener(&mut self, listener: Box<dyn ChangeListener>) {
        self.listeners.push(listener);
    }

    fn fire(&mut self, event: ChangeEvent) {
        for listener in &mut self.listeners {
            listener.on_change(&event);
        }
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entities in row order.
    pub fn iter(&self) -> impl Iterator<Item = &NamedEntity> {
        self.entities.iter()
    }

    /// Entity with the given id.
    pub fn get(&self, id: EntityId) -> Option<&NamedEntity> {
        self.entities.iter().find(|e| e.id() == id)
    }

    /// Entity with the given name.
    pub fn get_by_name(&self, name: &str) -> Option<&NamedEntity> {
        self.entities.iter().find(|e| e.name() == name)
    }

    /// Row of the entity with the given id.
    pub fn index_of(&self, id: EntityId) -> Option<usize> {
        self.entities.iter().position(|e| e.id() == id)
    }

    /// Entity names in row order.
    pub fn names(&self) -> Vec<String> {
        self.entities.iter().map(|e| e.name().to_string()).collect()
    }

    /// Point-in-time copies of every entity.
    pub fn snapshot(&self) -> Vec<NamedEntity> {
        self.entities.clone()
    }

    /// Entities safe to evaluate, in evaluation order.
    pub fn evaluation_order(&self) -> &[EntityId] {
        &self.evaluation_order
    }

    /// Entities whose reference closure includes themselves.
    pub fn circular_errors(&self) -> &BTreeSet<EntityId> {
        &self.circular_errors
    }

    /// Rows referenced by the expression of the entity at `row`, as of the
    /// last evaluation pass.
    pub fn direct_references(&self, row: usize) -> Option<&BTreeSet<usize>> {
        self.direct_references.get(row)
    }

    pub(crate) fn entity_mut(&mut self, id: EntityId) -> Option<&mut NamedEntity> {
        self.entities.iter_mut().find(|e| e.id() == id)
    }

    /// Whether `name` may not be given to `entity` (or to a new entity when
    /// `entity` is `None`).
    ///
    /// An entity keeping its own current name is always allowed. Otherwise a
    /// name is disallowed when it is not an identifier, names a builtin, is
    /// forbidden or excluded, equals an independent variable, belongs to
    /// another entity here, or belongs to anything in the linked `scope`.
    pub fn is_disallowed_name(
        &self,
        entity: Option<EntityId>,
        name: &str,
        scope: &dyn NameScope,
    ) -> bool {
        if let Some(owner) = entity.and_then(|id| self.get(id)) {
            if owner.name() == name {
                return false;
            }
        }

        let reason = if !is_identifier(name) {
            Some("not an identifier")
        } else if is_builtin_name(name) {
            Some("builtin name")
        } else if self.forbidden_names.contains(name) {
            Some("forbidden name")
        } else if self.excluded_name.as_deref() == Some(name) {
            Some("excluded name")
        } else if self.variables.iter().any(|v| v == name) {
            Some("independent variable")
        } else if self
            .entities
            .iter()
            .any(|e| e.name() == name && Some(e.id()) != entity)
        {
            Some("duplicate name")
        } else if scope.contains_name(name) {
            Some("name used in linked scope")
        } else {
            None
        };

        match reason {
            Some(reason) => {
                debug!(name, reason, "name rejected");
                true
            }
            None => false,
        }
    }

    /// Insert `entity` at `row` (clamped to the end).
    ///
    /// Returns `None` without touching the container if the entity's name is
    /// disallowed. With `post_edit`, the result carries an undoable edit
    /// record holding the container's prior state.
    pub fn add_object(
        &mut self,
        entity: NamedEntity,
        row: usize,
        post_edit: bool,
        scope: &dyn NameScope,
    ) -> Option<Applied> {
        if self.is_disallowed_name(None, entity.name(), scope) || self.index_of(entity.id()).is_some()
        {
            return None;
        }

        let prior_state = post_edit.then(|| self.records());
        let row = row.min(self.entities.len());
        let id = entity.id();
        let name = entity.name().to_string();
        let record = EntityRecord::from(&entity);
        self.entities.insert(row, entity);
        self.rebuild_graph();
        self.fire(ChangeEvent::Added { id, name, row });

        Some(Applied {
            id,
            edit: prior_state.map(|prior_state| EditRecord {
                kind: EditKind::Add,
                row,
                entity: record,
                previous_name: None,
                previous_expression: None,
                prior_state,
            }),
        })
    }

    /// Remove an entity. Returns `None` if it is unknown or important.
    pub fn remove_object(&mut self, id: EntityId, post_edit: bool) -> Option<Applied> {
        let row = self.index_of(id)?;
        if self.entities[row].is_important() {
            debug!(entity = self.entities[row].name(), "refusing to remove important entity");
            return None;
        }

        let prior_state = post_edit.then(|| self.records());
        let removed = self.entities.remove(row);
        self.rebuild_graph();
        self.fire(ChangeEvent::Removed {
            id,
            name: removed.name().to_string(),
            row,
        });

        Some(Applied {
            id,
            edit: prior_state.map(|prior_state| EditRecord {
                kind: EditKind::Remove,
                row,
                entity: EntityRecord::from(&removed),
                previous_name: None,
                previous_expression: None,
                prior_state,
            }),
        })
    }

    /// Rename an entity in place.
    ///
    /// Requires a name-editable entity and an allowed name. Renaming to the
    /// current name is accepted and changes nothing.
    pub fn rename(
        &mut self,
        id: EntityId,
        new_name: &str,
        post_edit: bool,
        scope: &dyn NameScope,
    ) -> Option<Applied> {
        let row = self.index_of(id)?;
        let old_name = self.entities[row].name().to_string();
        if old_name == new_name {
            return Some(Applied { id, edit: None });
        }
        if !self.entities[row].is_name_editable() || self.is_disallowed_name(Some(id), new_name, scope)
        {
            return None;
        }

        let prior_state = post_edit.then(|| self.records());
        self.entities[row].set_name(new_name);
        self.rebuild_graph();
        self.fire(ChangeEvent::Edited {
            id,
            previous_id: id,
            property: EditedProperty::Name,
            old: old_name.clone(),
            new: new_name.to_string(),
        });

        Some(Applied {
            id,
            edit: prior_state.map(|prior_state| EditRecord {
                kind: EditKind::Rename,
                row,
                entity: EntityRecord::from(&self.entities[row]),
                previous_name: Some(old_name),
                previous_expression: None,
                prior_state,
            }),
        })
    }

    /// Submit a new expression for an entity.
    ///
    /// Requires an expression-editable entity. In a parameter container the
    /// parameter is replaced by a new object at the same row, so the returned
    /// id differs from `id`; function containers mutate in place. Text that
    /// does not parse is stored as pending input and leaves the applied
    /// expression untouched.
    pub fn set_expression(
        &mut self,
        id: EntityId,
        expression: &str,
        post_edit: bool,
    ) -> Option<Applied> {
        let row = self.index_of(id)?;
        let current = &self.entities[row];
        if current.input() == expression && current.expression() == expression {
            return Some(Applied { id, edit: None });
        }
        if !current.is_expression_editable() {
            debug!(entity = current.name(), "expression is not editable");
            return None;
        }

        let prior_state = post_edit.then(|| self.records());
        let old_input = current.input().to_string();
        let mut updated = match self.kind {
            ContainerKind::Parameters => current.fresh_copy(),
            ContainerKind::Functions => current.clone(),
        };
        if !updated.apply_expression(expression) {
            debug!(entity = updated.name(), expression, "expression does not parse");
        }
        let new_id = updated.id();
        self.entities[row] = updated;
        self.rebuild_graph();
        self.fire(ChangeEvent::Edited {
            id: new_id,
            previous_id: id,
            property: EditedProperty::Expression,
            old: old_input.clone(),
            new: expression.to_string(),
        });

        Some(Applied {
            id: new_id,
            edit: prior_state.map(|prior_state| EditRecord {
                kind: EditKind::Expression,
                row,
                entity: EntityRecord::from(&self.entities[row]),
                previous_name: None,
                previous_expression: Some(old_input),
                prior_state,
            }),
        })
    }

    fn new_entity(&self, name: &str, expression: &str) -> NamedEntity {
        match self.kind {
            ContainerKind::Parameters => NamedEntity::parameter(name, expression),
            ContainerKind::Functions => NamedEntity::function(name, expression),
        }
    }

    /// Identity-preserving create or update.
    ///
    /// With an `existing` entity whose name and expression already match, the
    /// same id is returned and nothing happens. Otherwise the entity is
    /// renamed and/or given the new expression (all checks run before any
    /// change, so a rejected update changes nothing). Without `existing`, a
    /// new entity is appended, copying flags from `template` when given.
    ///
    /// Returns `None` when the update or creation is rejected.
    pub fn create_or_update(
        &mut self,
        name: &str,
        expression: &str,
        existing: Option<EntityId>,
        template: Option<&NamedEntity>,
        scope: &dyn NameScope,
    ) -> Option<EntityId> {
        let Some(id) = existing else {
            let entity = match template {
                Some(template) => NamedEntity::derived_from(template, name, expression),
                None => self.new_entity(name, expression),
            };
            let row = self.entities.len();
            return self.add_object(entity, row, false, scope).map(|applied| applied.id);
        };

        let current = self.get(id)?;
        let name_changed = current.name() != name;
        let expression_changed = current.expression() != expression || current.input() != expression;
        if !name_changed && !expression_changed {
            return Some(id);
        }
        if name_changed
            && (!current.is_name_editable() || self.is_disallowed_name(Some(id), name, scope))
        {
            return None;
        }
        if expression_changed && !current.is_expression_editable() {
            return None;
        }

        let mut id = id;
        if name_changed {
            id = self.rename(id, name, false, scope)?.id;
        }
        if expression_changed {
            id = self.set_expression(id, expression, false)?.id;
        }
        Some(id)
    }

    /// Whether the entity's submitted input has not been applied.
    pub fn is_invalid_expression(&self, id: EntityId) -> bool {
        self.get(id).map(NamedEntity::has_pending_input).unwrap_or(false)
    }

    /// Evaluation state of an entity.
    pub fn state(&self, id: EntityId) -> Option<EntityState> {
        let entity = self.get(id)?;
        let state = if self.circular_errors.contains(&id) {
            EntityState::Circular
        } else if self.blocked.contains(&id) || entity.has_pending_input() {
            EntityState::Invalid
        } else if !entity.is_evaluated() {
            EntityState::Uninitialized
        } else if entity.value().is_finite() {
            EntityState::Valid
        } else {
            EntityState::Invalid
        };
        Some(state)
    }

    fn compute_references(&self) -> Vec<BTreeSet<usize>> {
        let rows: HashMap<&str, usize> = self
            .entities
            .iter()
            .enumerate()
            .map(|(row, e)| (e.name(), row))
            .collect();

        self.entities
            .iter()
            .map(|entity| {
                entity
                    .parsed()
                    .map(|expr| {
                        expr.variables()
                            .iter()
                            .filter_map(|var| rows.get(var.as_str()).copied())
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .collect()
    }

    /// Rows reachable from `row` through direct references (not including
    /// `row` itself unless it lies on a cycle).
    fn closure(references: &[BTreeSet<usize>], row: usize) -> HashSet<usize> {
        let mut visited = HashSet::new();
        let mut stack: Vec<usize> = references[row].iter().copied().collect();
        while let Some(current) = stack.pop() {
            if visited.insert(current) {
                stack.extend(references[current].iter().copied());
            }
        }
        visited
    }

    /// Recompute direct references, circular errors, blocked entities and
    /// the evaluation order from the current entities. Values are untouched.
    ///
    /// Runs after every membership, name or expression change, so row-keyed
    /// references never describe a previous layout.
    ///
    /// # Returns
    ///
    /// * The rows of the evaluation order and the blocked rows
    fn rebuild_graph(&mut self) -> (Vec<usize>, BTreeSet<usize>) {
        let references = self.compute_references();
        let closures: Vec<HashSet<usize>> = (0..self.entities.len())
            .map(|row| Self::closure(&references, row))
            .collect();

        let circular_rows: BTreeSet<usize> = closures
            .iter()
            .enumerate()
            .filter(|(row, closure)| closure.contains(row))
            .map(|(row, _)| row)
            .collect();
        // Circular entities and entities whose input did not parse poison
        // everything that reaches them
        let broken_rows: BTreeSet<usize> = self
            .entities
            .iter()
            .enumerate()
            .filter(|(row, entity)| circular_rows.contains(row) || entity.has_pending_input())
            .map(|(row, _)| row)
            .collect();
        let blocked_rows: BTreeSet<usize> = closures
            .iter()
            .enumerate()
            .filter(|(row, closure)| {
                !circular_rows.contains(row) && closure.iter().any(|r| broken_rows.contains(r))
            })
            .map(|(row, _)| row)
            .collect();

        // Stable ordering: repeatedly take, in row order, every pending entity
        // whose references have all been placed.
        let mut placed = vec![false; self.entities.len()];
        let mut order_rows = Vec::with_capacity(self.entities.len());
        let mut pending: Vec<usize> = (0..self.entities.len())
            .filter(|row| !circular_rows.contains(row) && !blocked_rows.contains(row))
            .collect();
        while !pending.is_empty() {
            let before = pending.len();
            pending.retain(|&row| {
                if references[row].iter().all(|&r| placed[r]) {
                    placed[row] = true;
                    order_rows.push(row);
                    false
                } else {
                    true
                }
            });
            if pending.len() == before {
                // Unreachable with cycles removed, but never loop forever
                break;
            }
        }

        self.circular_errors = circular_rows.iter().map(|&r| self.entities[r].id()).collect();
        self.blocked = blocked_rows.iter().map(|&r| self.entities[r].id()).collect();
        self.evaluation_order = order_rows.iter().map(|&r| self.entities[r].id()).collect();
        self.direct_references = references;

        if !self.circular_errors.is_empty() {
            let names: Vec<&str> = circular_rows.iter().map(|&r| self.entities[r].name()).collect();
            debug!(?names, "circular references detected");
        }
        (order_rows, blocked_rows)
    }

    /// Rebuild the dependency graph, then evaluate every entity in order.
    ///
    /// Circular entities keep their previous value. Entities that depend on a
    /// circular entity, or on an entity whose latest input did not parse, are
    /// left out of the order and set to NaN.
    ///
    /// # Arguments
    ///
    /// * `scope` - Names and values of the linked containers
    pub fn evaluate_all(&mut self, scope: &dyn NameScope) {
        let (order_rows, blocked_rows) = self.rebuild_graph();

        let mut values = HashMap::new();
        for &row in &order_rows {
            let value = {
                let context = GraphContext {
                    values: &values,
                    variables: &self.variables,
                    variable_values: &self.variable_values,
                    scope,
                };
                evaluate_entity(&self.entities[row], &context)
            };
            values.insert(self.entities[row].name().to_string(), value);
            self.entities[row].set_value(value);
        }
        for &row in &blocked_rows {
            self.entities[row].set_value(f64::NAN);
        }
        trace!(evaluated = order_rows.len(), "evaluation pass complete");
    }

    /// Values of the entities in evaluation order, stopping after `until`.
    fn ordered_values(
        &self,
        until: Option<EntityId>,
        variable_values: &[f64],
        scope: &dyn NameScope,
    ) -> HashMap<String, f64> {
        let mut values = HashMap::new();
        for id in &self.evaluation_order {
            let Some(entity) = self.get(*id) else { continue };
            let value = evaluate_entity(
                entity,
                &GraphContext {
                    values: &values,
                    variables: &self.variables,
                    variable_values,
                    scope,
                },
            );
            values.insert(entity.name().to_string(), value);
            if Some(*id) == until {
                break;
            }
        }
        values
    }

    /// Evaluate an entity at the given independent variable values without
    /// touching cached values. Referenced functions are evaluated at the same
    /// point. NaN if the entity is not in the evaluation order.
    pub fn evaluate_at(&self, id: EntityId, variable_values: &[f64], scope: &dyn NameScope) -> f64 {
        let Some(entity) = self.get(id) else {
            return f64::NAN;
        };
        if !self.evaluation_order.contains(&id) {
            return f64::NAN;
        }
        self.ordered_values(Some(id), variable_values, scope)
            .get(entity.name())
            .copied()
            .unwrap_or(f64::NAN)
    }

    /// Re-evaluate what depends on `seed` without touching live entities.
    ///
    /// `seed` is a working copy of an entity in this container (matched by
    /// name) carrying a proposed expression. The entities after it in the
    /// evaluation order are copied and re-evaluated against the copies; only
    /// copies whose reference closure contains the seed are returned.
    pub fn evaluate_dependents(
        &self,
        seed: &NamedEntity,
        scope: &dyn NameScope,
    ) -> Vec<NamedEntity> {
        let Some(seed_row) = self.entities.iter().position(|e| e.name() == seed.name()) else {
            return Vec::new();
        };
        let seed_id = self.entities[seed_row].id();
        let Some(position) = self.evaluation_order.iter().position(|id| *id == seed_id) else {
            return Vec::new();
        };

        let mut values: HashMap<String, f64> = self
            .entities
            .iter()
            .filter(|e| self.evaluation_order.contains(&e.id()))
            .map(|e| (e.name().to_string(), e.value()))
            .collect();
        let seed_value = {
            let mut earlier = values.clone();
            earlier.remove(seed.name());
            evaluate_entity(
                seed,
                &GraphContext {
                    values: &earlier,
                    variables: &self.variables,
                    variable_values: &self.variable_values,
                    scope,
                },
            )
        };
        values.insert(seed.name().to_string(), seed_value);

        let mut affected = BTreeSet::from([seed_row]);
        let mut dependents = Vec::new();
        for id in &self.evaluation_order[position + 1..] {
            let Some(row) = self.index_of(*id) else { continue };
            let depends = self
                .direct_references
                .get(row)
                .map(|refs| refs.iter().any(|r| affected.contains(r)))
                .unwrap_or(false);
            if !depends {
                continue;
            }
            affected.insert(row);
            let mut copy = self.entities[row].clone();
            let value = evaluate_entity(
                &copy,
                &GraphContext {
                    values: &values,
                    variables: &self.variables,
                    variable_values: &self.variable_values,
                    scope,
                },
            );
            copy.set_value(value);
            values.insert(copy.name().to_string(), value);
            dependents.push(copy);
        }
        dependents
    }

    /// Persistable records of every entity, in row order.
    pub fn records(&self) -> Vec<EntityRecord> {
        self.entities.iter().map(EntityRecord::from).collect()
    }

    /// Serialize every entity record as pretty-printed JSON.
    ///
    /// # Returns
    ///
    /// * A JSON array of [`EntityRecord`]s in row order
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.records())?)
    }

    /// Append entities built from records.
    ///
    /// All names are checked first; if any is disallowed (or repeated within
    /// the batch) nothing is added.
    pub fn load_records(
        &mut self,
        records: &[EntityRecord],
        scope: &dyn NameScope,
    ) -> Result<Vec<EntityId>> {
        let mut seen = HashSet::new();
        for record in records {
            if !seen.insert(record.name.as_str())
                || self.is_disallowed_name(None, &record.name, scope)
            {
                return Err(FitGraphError::RejectedRecord(record.name.clone()));
            }
        }

        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            let row = self.entities.len();
            let applied = self
                .add_object(record.to_entity(), row, false, scope)
                .ok_or_else(|| FitGraphError::RejectedRecord(record.name.clone()))?;
            ids.push(applied.id);
        }
        Ok(ids)
    }

    /// Append the entities in a JSON array of records.
    ///
    /// # Arguments
    ///
    /// * `json` - Output of [`Container::to_json`] or a compatible document
    /// * `scope` - Names of the linked containers, checked like any other add
    ///
    /// # Returns
    ///
    /// * Ids of the new entities, in record order
    ///
    /// # Errors
    ///
    /// * [`FitGraphError::JsonError`] if the document does not parse
    /// * [`FitGraphError::RejectedRecord`] if any name is disallowed; nothing is
    ///   added in that case
    pub fn load_json(&mut self, json: &str, scope: &dyn NameScope) -> Result<Vec<EntityId>> {
        let records: Vec<EntityRecord> = serde_json::from_str(json)?;
        self.load_records(&records, scope)
    }
}

/// A container exposes its entities' names and last values to linked containers.
impl NameScope for Container {
    fn contains_name(&self, name: &str) -> bool {
        self.get_by_name(name).is_some()
    }

    fn value_of(&self, name: &str) -> Option<f64> {
        self.get_by_name(name).map(NamedEntity::value)
    }

    fn scope_names(&self) -> Vec<String> {
        self.names()
    }
}
