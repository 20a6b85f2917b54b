//! Change notification and undoable edit records

use std::cell::RefCell;
use std::rc::Rc;

use crate::entities::entity::EntityId;
use crate::entities::record::EntityRecord;

/// Property touched by an edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditedProperty {
    Name,
    Expression,
}

/// Event fired by a container.
///
/// Membership changes and edits are distinct kinds so that consumers which
/// only care about structure can ignore value edits.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    /// An entity was inserted at `row`.
    Added { id: EntityId, name: String, row: usize },

    /// An entity was removed from `row`.
    Removed { id: EntityId, name: String, row: usize },

    /// An entity's name or expression changed.
    ///
    /// `previous_id` differs from `id` when the edit replaced the entity
    /// object instead of mutating it.
    Edited {
        id: EntityId,
        previous_id: EntityId,
        property: EditedProperty,
        old: String,
        new: String,
    },
}

impl ChangeEvent {
    /// Whether this event changes the container's membership.
    pub fn is_structural(&self) -> bool {
        matches!(self, ChangeEvent::Added { .. } | ChangeEvent::Removed { .. })
    }
}

/// Receiver of container change events.
pub trait ChangeListener {
    fn on_change(&mut self, event: &ChangeEvent);
}

/// Shared, clonable recorder of change events.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<ChangeEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far.
    pub fn events(&self) -> Vec<ChangeEvent> {
        self.events.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl ChangeListener for EventLog {
    fn on_change(&mut self, event: &ChangeEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}

/// Kind of undoable edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    Add,
    Remove,
    Rename,
    Expression,
}

/// Opaque record of an undoable edit, meant for an external undo stack.
///
/// The core never replays these; `prior_state` holds the container's records
/// as they were before the edit so an undo layer can restore them.
#[derive(Debug, Clone, PartialEq)]
pub struct EditRecord {
    pub kind: EditKind,
    pub row: usize,
    /// The entity after the edit (before it, for removals).
    pub entity: EntityRecord,
    pub previous_name: Option<String>,
    pub previous_expression: Option<String>,
    pub prior_state: Vec<EntityRecord>,
}

/// Result of an accepted mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    /// Id of the entity the mutation produced or touched.
    pub id: EntityId,
    /// Present when the caller asked for an undoable edit.
    pub edit: Option<EditRecord>,
}
