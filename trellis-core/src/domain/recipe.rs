//! Recipe domain types
//!
//! A recipe is a pipeline definition. Its resource-reference fields
//! (`source`, `destination`, `model_instances`) exist in exactly one of two
//! representations at a time: name form (human-assigned ids) or permalink
//! form (registry-assigned UIDs). The structural fields are representation
//! agnostic and carry over unchanged when references are translated.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// Pipeline definition
///
/// Structure shared between ingestion (name form) and execution
/// (permalink form).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub version: String,
    /// Trigger conditions, engine-defined shape
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<JsonValue>,
    /// Ordered component definitions
    #[serde(default)]
    pub component: Vec<Component>,
    /// Variable declarations
    #[serde(default)]
    pub variable: HashMap<String, JsonValue>,
    /// Output declarations
    #[serde(default)]
    pub output: HashMap<String, JsonValue>,
    /// Source connector reference
    pub source: String,
    /// Destination connector reference
    pub destination: String,
    /// Model instance references
    #[serde(default)]
    pub model_instances: Vec<String>,
}

/// One component definition inside a recipe
///
/// Only the id is interpreted here; the rest of the definition is owned by
/// the execution engine and passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub id: String,
    #[serde(flatten)]
    pub definition: JsonValue,
}

/// The recipe fields persisted in run snapshots.
///
/// Resource references are resolved and recorded separately, so the stored
/// document carries only the structural fields.
#[derive(Debug, Serialize)]
pub struct RecipeSnapshot<'a> {
    pub version: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on: Option<&'a JsonValue>,
    pub component: &'a [Component],
    pub variable: &'a HashMap<String, JsonValue>,
    pub output: &'a HashMap<String, JsonValue>,
}

impl Recipe {
    /// Borrowing view of the fields that go into a run's recipe snapshot.
    pub fn snapshot(&self) -> RecipeSnapshot<'_> {
        RecipeSnapshot {
            version: &self.version,
            on: self.on.as_ref(),
            component: &self.component,
            variable: &self.variable,
            output: &self.output,
        }
    }

    /// Clones the recipe with its resource references replaced.
    ///
    /// Translation produces a whole new recipe rather than mutating in
    /// place, so a failed translation can never leave a half-substituted
    /// recipe behind.
    pub fn with_references(
        &self,
        source: String,
        destination: String,
        model_instances: Vec<String>,
    ) -> Recipe {
        Recipe {
            version: self.version.clone(),
            on: self.on.clone(),
            component: self.component.clone(),
            variable: self.variable.clone(),
            output: self.output.clone(),
            source,
            destination,
            model_instances,
        }
    }
}
