//! # Entity graph
//!
//! Named entities (parameters, functions, fit functions) live in
//! [`Container`]s. Each entity carries an expression over the names of other
//! entities, the container's independent variables, and whatever its linked
//! [`NameScope`] provides.
//!
//! ## Example Usage
//!
//! ```rust
//! use fitgraph::entities::{Container, NamedEntity};
//!
//! let mut params = Container::parameters();
//! params.add_object(NamedEntity::parameter("a", "2"), 0, false, &());
//! params.add_object(NamedEntity::parameter("b", "a * 3"), 0, false, &());
//! params.evaluate_all(&());
//!
//! assert_eq!(params.get_by_name("b").unwrap().value(), 6.0);
//! ```

pub mod container;
pub mod entity;
pub mod events;
pub mod expression;
pub mod record;
pub mod scope;

pub use container::{Container, ContainerKind};
pub use entity::{EntityId, EntityKind, EntityState, NamedEntity};
pub use events::{
    Applied, ChangeEvent, ChangeListener, EditKind, EditRecord, EditedProperty, EventLog,
};
pub use expression::{EvaluationContext, Expression, ExpressionError, SimpleContext};
pub use record::{EntityRecord, RecordKind};
pub use scope::{ExternalScope, NameScope};
