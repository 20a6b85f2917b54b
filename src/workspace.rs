//! Workspace: containers and datasets linked by id.
//!
//! A [`Workspace`] owns every container and dataset and records how they are
//! linked: a function container reads a parameter container, a layered
//! parameter container extends a parent, a function container may be backed
//! by a dataset. Containers never see each other directly; for every
//! operation the workspace builds an [`ExternalScope`] for the container
//! being touched.
//!
//! Names are unique across a linked set. In particular a layered child and
//! its parent chain never share a name, so merging their values can never
//! evaluate the same name twice.

use std::collections::{BTreeSet, VecDeque};

use tracing::debug;

use crate::entities::{Applied, Container, EntityId, ExternalScope, NamedEntity};
use crate::error::{FitGraphError, Result};
use crate::fit::{CurveFitter, Dataset, FitConfig, FitReport, FitStrategy, FreeParameter};

/// Index of a container in a [`Workspace`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(usize);

impl ContainerId {
    /// Position of the container in the workspace.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Index of a dataset in a [`Workspace`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatasetId(usize);

impl DatasetId {
    /// Position of the dataset in the workspace.
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Parameters {
        parent: Option<ContainerId>,
    },
    Functions {
        parameters: ContainerId,
        dataset: Option<DatasetId>,
    },
}

impl Link {
    /// The container this one reads values from.
    fn upstream(self) -> Option<ContainerId> {
        match self {
            Link::Parameters { parent } => parent,
            Link::Functions { parameters, .. } => Some(parameters),
        }
    }
}

#[derive(Debug)]
struct Slot {
    container: Container,
    link: Link,
}

/// Arena of linked containers and datasets.
#[derive(Debug, Default)]
pub struct Workspace {
    slots: Vec<Slot>,
    datasets: Vec<Dataset>,
    fitter: CurveFitter,
}

impl Workspace {
    /// Creates an empty workspace with the default fitter configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a non-default fitter configuration for [`Workspace::fit`].
    pub fn with_fit_config(mut self, config: FitConfig) -> Self {
        self.fitter = CurveFitter::new(config);
        self
    }

    fn push(&mut self, container: Container, link: Link) -> ContainerId {
        self.slots.push(Slot { container, link });
        ContainerId(self.slots.len() - 1)
    }

    fn slot(&self, id: ContainerId) -> Result<&Slot> {
        self.slots
            .get(id.0)
            .ok_or(FitGraphError::ContainerNotFound(id.0))
    }

    fn slot_mut(&mut self, id: ContainerId) -> Result<&mut Slot> {
        self.slots
            .get_mut(id.0)
            .ok_or(FitGraphError::ContainerNotFound(id.0))
    }

    fn expect_parameters(&self, id: ContainerId) -> Result<()> {
        match self.slot(id)?.link {
            Link::Parameters { .. } => Ok(()),
            Link::Functions { .. } => Err(FitGraphError::InvalidInput(format!(
                "container {} is not a parameter container",
                id.0
            ))),
        }
    }

    /// Add a free-standing parameter container.
    pub fn add_parameters(&mut self) -> ContainerId {
        self.push(Container::parameters(), Link::Parameters { parent: None })
    }

    /// Add a parameter container layered on `parent`.
    ///
    /// The child sees the values of its parent chain except `excluded_name`,
    /// which it may not define either.
    pub fn add_layered_parameters(
        &mut self,
        parent: ContainerId,
        excluded_name: &str,
    ) -> Result<ContainerId> {
        self.expect_parameters(parent)?;
        let container = Container::parameters().with_excluded_name(excluded_name);
        Ok(self.push(
            container,
            Link::Parameters {
                parent: Some(parent),
            },
        ))
    }

    /// Add a function container reading `parameters`, with the given
    /// independent variables.
    pub fn add_functions(
        &mut self,
        parameters: ContainerId,
        variables: &[&str],
    ) -> Result<ContainerId> {
        self.expect_parameters(parameters)?;
        Ok(self.push(
            Container::functions(variables),
            Link::Functions {
                parameters,
                dataset: None,
            },
        ))
    }

    /// Take ownership of a dataset. It backs nothing until attached.
    pub fn add_dataset(&mut self, dataset: Dataset) -> DatasetId {
        self.datasets.push(dataset);
        DatasetId(self.datasets.len() - 1)
    }

    /// Back a function container by a dataset. The dataset's column names
    /// become reserved in that container.
    pub fn attach_dataset(&mut self, functions: ContainerId, dataset: DatasetId) -> Result<()> {
        if dataset.0 >= self.datasets.len() {
            return Err(FitGraphError::DatasetNotFound(dataset.0));
        }
        match &mut self.slot_mut(functions)?.link {
            Link::Functions { dataset: slot, .. } => {
                *slot = Some(dataset);
                Ok(())
            }
            Link::Parameters { .. } => Err(FitGraphError::InvalidInput(format!(
                "container {} is not a function container",
                functions.0
            ))),
        }
    }

    /// The container with the given id.
    pub fn container(&self, id: ContainerId) -> Option<&Container> {
        self.slots.get(id.0).map(|slot| &slot.container)
    }

    /// Direct access, e.g. to register listeners or set variable values.
    pub fn container_mut(&mut self, id: ContainerId) -> Option<&mut Container> {
        self.slots.get_mut(id.0).map(|slot| &mut slot.container)
    }

    /// The dataset with the given id.
    pub fn dataset(&self, id: DatasetId) -> Option<&Dataset> {
        self.datasets.get(id.0)
    }

    /// All container ids, in creation order.
    pub fn container_ids(&self) -> impl Iterator<Item = ContainerId> {
        (0..self.slots.len()).map(ContainerId)
    }

    /// Containers connected to `id` through parent and parameter links,
    /// including `id` itself.
    pub fn linked_set(&self, id: ContainerId) -> BTreeSet<ContainerId> {
        let mut seen = BTreeSet::new();
        if id.0 >= self.slots.len() {
            return seen;
        }
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            if let Some(up) = self.slots[current.0].link.upstream() {
                queue.push_back(up);
            }
            queue.extend(
                self.container_ids()
                    .filter(|other| self.slots[other.0].link.upstream() == Some(current)),
            );
        }
        seen
    }

    /// The scope a container is edited and evaluated against.
    ///
    /// Every name in the rest of its linked set is reserved. Values come from
    /// the chain of containers it reads from, minus names hidden by a layer's
    /// excluded name. A dataset backing a function container reserves its
    /// column names.
    pub fn scope_for(&self, id: ContainerId) -> Result<ExternalScope> {
        let slot = self.slot(id)?;
        let mut scope = ExternalScope::new();

        for other in self.linked_set(id) {
            if other != id {
                scope.include_names(&self.slots[other.0].container);
            }
        }

        let mut hidden: BTreeSet<String> = slot
            .container
            .excluded_name()
            .map(str::to_string)
            .into_iter()
            .collect();
        let mut cursor = slot.link.upstream();
        while let Some(current) = cursor {
            let upstream = &self.slots[current.0];
            for entity in upstream.container.iter() {
                if !hidden.contains(entity.name()) {
                    scope.insert(entity.name(), Some(entity.value()));
                }
            }
            hidden.extend(upstream.container.excluded_name().map(str::to_string));
            cursor = upstream.link.upstream();
        }

        if let Link::Functions {
            dataset: Some(dataset),
            ..
        } = slot.link
        {
            let dataset = self
                .datasets
                .get(dataset.0)
                .ok_or(FitGraphError::DatasetNotFound(dataset.0))?;
            scope.include_names(dataset);
        }

        Ok(scope)
    }

    /// Whether `name` may not be given to `entity` (or to a new entity) in
    /// container `id`, given everything linked to it.
    ///
    /// # Errors
    ///
    /// * [`FitGraphError::ContainerNotFound`] for an unknown container
    pub fn is_disallowed_name(
        &self,
        id: ContainerId,
        entity: Option<EntityId>,
        name: &str,
    ) -> Result<bool> {
        let scope = self.scope_for(id)?;
        Ok(self.slot(id)?.container.is_disallowed_name(entity, name, &scope))
    }

    /// Insert an entity into container `id` at `row`.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` if the name is taken anywhere in the linked set or is
    ///   otherwise disallowed; the container is unchanged
    pub fn add_object(
        &mut self,
        id: ContainerId,
        entity: NamedEntity,
        row: usize,
        post_edit: bool,
    ) -> Result<Option<Applied>> {
        let scope = self.scope_for(id)?;
        Ok(self.slot_mut(id)?.container.add_object(entity, row, post_edit, &scope))
    }

    /// Remove an entity from container `id`.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` if the entity is unknown or important
    pub fn remove_object(
        &mut self,
        id: ContainerId,
        entity: EntityId,
        post_edit: bool,
    ) -> Result<Option<Applied>> {
        Ok(self.slot_mut(id)?.container.remove_object(entity, post_edit))
    }

    /// Rename an entity in container `id`, checking the new name against the
    /// whole linked set.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` if the rename is rejected
    pub fn rename(
        &mut self,
        id: ContainerId,
        entity: EntityId,
        name: &str,
        post_edit: bool,
    ) -> Result<Option<Applied>> {
        let scope = self.scope_for(id)?;
        Ok(self.slot_mut(id)?.container.rename(entity, name, post_edit, &scope))
    }

    /// Submit a new expression for an entity in container `id`.
    ///
    /// # Returns
    ///
    /// * The applied edit; in a parameter container its id is the id of the
    ///   replacement object
    /// * `Ok(None)` if the expression is not editable
    pub fn set_expression(
        &mut self,
        id: ContainerId,
        entity: EntityId,
        expression: &str,
        post_edit: bool,
    ) -> Result<Option<Applied>> {
        Ok(self
            .slot_mut(id)?
            .container
            .set_expression(entity, expression, post_edit))
    }

    /// Identity-preserving create or update in container `id`.
    ///
    /// # Returns
    ///
    /// * The id of the created or updated entity, unchanged for a no-op update
    /// * `Ok(None)` if the change is rejected
    pub fn create_or_update(
        &mut self,
        id: ContainerId,
        name: &str,
        expression: &str,
        existing: Option<EntityId>,
        template: Option<&NamedEntity>,
    ) -> Result<Option<EntityId>> {
        let scope = self.scope_for(id)?;
        Ok(self
            .slot_mut(id)?
            .container
            .create_or_update(name, expression, existing, template, &scope))
    }

    /// Evaluate one container against its current scope.
    pub fn evaluate(&mut self, id: ContainerId) -> Result<()> {
        let scope = self.scope_for(id)?;
        self.slot_mut(id)?.container.evaluate_all(&scope);
        Ok(())
    }

    /// Evaluate every container. Containers are created after the ones they
    /// read from, so creation order is a valid evaluation order.
    pub fn evaluate_all(&mut self) -> Result<()> {
        for id in self.container_ids().collect::<Vec<_>>() {
            self.evaluate(id)?;
        }
        Ok(())
    }

    /// Evaluate a function at the given independent variable values.
    pub fn evaluate_at(
        &self,
        id: ContainerId,
        entity: EntityId,
        variable_values: &[f64],
    ) -> Result<f64> {
        let scope = self.scope_for(id)?;
        Ok(self
            .slot(id)?
            .container
            .evaluate_at(entity, variable_values, &scope))
    }

    /// Fit a fit-function entity to a dataset.
    ///
    /// Free parameters start from the values of same-named entities in the
    /// linked parameter container, falling back to the values stored on the
    /// fit function. When the fit improves on the start, the fitted values
    /// are written back as parameter expressions (creating parameters that do
    /// not exist yet), stored on the fit function, and everything is
    /// re-evaluated.
    ///
    /// `dataset` overrides the dataset attached to the container.
    pub fn fit(
        &mut self,
        functions: ContainerId,
        entity: EntityId,
        dataset: Option<DatasetId>,
    ) -> Result<FitReport> {
        let Link::Functions {
            parameters,
            dataset: attached,
        } = self.slot(functions)?.link
        else {
            return Err(FitGraphError::InvalidInput(format!(
                "container {} is not a function container",
                functions.0
            )));
        };
        let dataset_id = dataset.or(attached).ok_or_else(|| {
            FitGraphError::InvalidInput(format!("no dataset for container {}", functions.0))
        })?;
        let dataset = self
            .datasets
            .get(dataset_id.0)
            .ok_or(FitGraphError::DatasetNotFound(dataset_id.0))?;

        let target = self
            .slot(functions)?
            .container
            .get(entity)
            .ok_or_else(|| FitGraphError::EntityNotFound(entity.to_string()))?;
        let mut fit_function = target.fit_function().cloned().ok_or_else(|| {
            FitGraphError::InvalidInput(format!("'{}' is not a fit function", target.name()))
        })?;
        if target.has_pending_input() {
            return Err(FitGraphError::FunctionEvaluation(format!(
                "'{}' has an expression that does not parse: {}",
                target.name(),
                target.input()
            )));
        }

        let parameter_container = &self.slot(parameters)?.container;
        let start: Vec<f64> = fit_function
            .free_parameters()
            .iter()
            .map(|p| {
                parameter_container
                    .get_by_name(&p.name)
                    .map(NamedEntity::value)
                    .filter(|v| v.is_finite())
                    .unwrap_or(p.value)
            })
            .collect();
        fit_function.set_values(&start);

        let scope = self.scope_for(functions)?;
        let mut model = fit_function.model(target.expression(), &scope)?;
        let report = self.fitter.fit(model.as_mut(), dataset);
        debug!(entity = target.name(), strategy = %report.strategy, "fit complete");

        if matches!(
            report.strategy,
            FitStrategy::Unchanged | FitStrategy::NotOptimized
        ) {
            return Ok(report);
        }

        fit_function.set_values(&model.parameters());
        self.write_back(parameters, fit_function.free_parameters())?;
        if let Some(stored) = self
            .slot_mut(functions)?
            .container
            .entity_mut(entity)
            .and_then(NamedEntity::fit_function_mut)
        {
            *stored = fit_function;
        }
        self.evaluate_all()?;
        Ok(report)
    }

    fn write_back(&mut self, parameters: ContainerId, values: &[FreeParameter]) -> Result<()> {
        let scope = self.scope_for(parameters)?;
        let container = &mut self.slot_mut(parameters)?.container;
        for param in values.iter().filter(|p| p.value.is_finite()) {
            let existing = container.get_by_name(&param.name).map(NamedEntity::id);
            let expression = format!("{:?}", param.value);
            if container
                .create_or_update(&param.name, &expression, existing, None, &scope)
                .is_none()
            {
                debug!(parameter = param.name.as_str(), "fitted value was not written back");
            }
        }
        Ok(())
    }
}
