//! Configuration schema for specmap
//!
//! Config lives at `.config/specmap/config.yaml` relative to the project root.
//! Paths inside it resolve against the directory holding the config file.

use facet::Facet;
use specmap_core::{DEFAULT_USER_LIST_FIELDS, ReconcileOptions};

/// Root configuration for specmap
#[derive(Debug, Clone, Default, Facet)]
pub struct Config {
    /// Components to report coverage for
    #[facet(default)]
    pub components: Vec<ComponentConfig>,

    #[facet(default)]
    pub history: HistoryConfig,
}

/// Configuration for a single component
#[derive(Debug, Clone, Facet)]
pub struct ComponentConfig {
    /// Name of the component (for display and lookup)
    pub name: String,

    /// Path to the component snapshot JSON
    pub snapshot: String,

    /// Path to the specification text; overrides text carried by the snapshot
    #[facet(default)]
    pub specification: Option<String>,

    /// Minimum coverage percentage for this component to pass
    #[facet(default)]
    pub threshold: Option<f64>,
}

/// How change histories are rendered
#[derive(Debug, Clone, Default, Facet)]
pub struct HistoryConfig {
    /// Fields holding bracketed user id lists, e.g. `[1][4]`.
    /// Defaults to the permission fields when absent.
    #[facet(default)]
    pub user_list_fields: Option<Vec<String>>,
}

impl HistoryConfig {
    pub fn reconcile_options(&self) -> ReconcileOptions {
        match &self.user_list_fields {
            Some(fields) => ReconcileOptions {
                user_list_fields: fields.iter().cloned().collect(),
            },
            None => ReconcileOptions::default(),
        }
    }
}

impl Config {
    pub fn component(&self, name: &str) -> Option<&ComponentConfig> {
        self.components.iter().find(|c| c.name == name)
    }

    pub fn component_names(&self) -> Vec<&str> {
        self.components.iter().map(|c| c.name.as_str()).collect()
    }
}
