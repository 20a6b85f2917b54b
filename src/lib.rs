//! # fitgraph
//!
//! `fitgraph` keeps named parameters and functions in dependency-aware
//! containers and fits functions to sampled data.
//!
//! The library provides:
//! - Containers of named entities whose expressions reference each other,
//!   with naming rules across linked containers, cycle isolation and ordered
//!   evaluation
//! - Undo records and change notifications for every edit
//! - A curve fitter that solves polynomials in closed form and falls back from
//!   a Newton minimizer to Levenberg-Marquardt, never accepting a worse fit
//! - A [`Workspace`] that links containers and datasets by id
//!
//! ## Basic Usage
//!
//! ```
//! use fitgraph::entities::NamedEntity;
//! use fitgraph::Workspace;
//!
//! let mut ws = Workspace::new();
//! let params = ws.add_parameters();
//! let funcs = ws.add_functions(params, &["x"]).unwrap();
//!
//! ws.add_object(params, NamedEntity::parameter("k", "2"), 0, false).unwrap();
//! let f = ws
//!     .add_object(funcs, NamedEntity::function("f", "k * x + 1"), 0, false)
//!     .unwrap()
//!     .unwrap()
//!     .id;
//! ws.evaluate_all().unwrap();
//!
//! assert_eq!(ws.evaluate_at(funcs, f, &[3.0]).unwrap(), 7.0);
//! // "k" is taken anywhere in the linked set
//! assert!(ws.is_disallowed_name(funcs, None, "k").unwrap());
//! ```

// Public modules
pub mod entities;
pub mod error;
pub mod fit;
pub mod workspace;

// Re-exports for convenience
pub use entities::{Container, ContainerKind, EntityId, NamedEntity};
pub use error::{FitGraphError, Result};
pub use fit::{CurveFitter, Dataset, FitConfig, FitReport};
pub use workspace::{ContainerId, DatasetId, Workspace};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
