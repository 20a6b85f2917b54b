//! Linked namespaces
//!
//! Containers never hold pointers to each other. Whatever a container needs
//! from the containers it is linked with (names it must not reuse, values it
//! may read) is handed to it as a [`NameScope`].

use std::collections::{BTreeSet, HashMap};

/// Read access to a namespace outside the container being edited.
pub trait NameScope {
    /// Whether `name` is owned by something in this scope.
    fn contains_name(&self, name: &str) -> bool;

    /// Value bound to `name`, if the scope provides values for it.
    fn value_of(&self, name: &str) -> Option<f64>;

    /// All names owned by this scope.
    fn scope_names(&self) -> Vec<String>;
}

/// The empty scope.
impl NameScope for () {
    fn contains_name(&self, _name: &str) -> bool {
        false
    }

    fn value_of(&self, _name: &str) -> Option<f64> {
        None
    }

    fn scope_names(&self) -> Vec<String> {
        Vec::new()
    }
}

/// An owned snapshot of names and values gathered from several scopes.
///
/// Everything is copied in, so the scope can be held while the scopes it
/// was built from are mutated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternalScope {
    names: BTreeSet<String>,
    values: HashMap<String, f64>,
}

impl ExternalScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the names of `scope` without values.
    pub fn include_names(&mut self, scope: &dyn NameScope) {
        self.names.extend(scope.scope_names());
    }

    /// Bind a single name.
    pub fn insert(&mut self, name: &str, value: Option<f64>) {
        self.names.insert(name.to_string());
        if let Some(value) = value {
            self.values.insert(name.to_string(), value);
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl NameScope for ExternalScope {
    fn contains_name(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    fn value_of(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    fn scope_names(&self) -> Vec<String> {
        self.names.iter().cloned().collect()
    }
}
