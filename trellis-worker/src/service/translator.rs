//! Identity translation service
//!
//! Converts a recipe's resource references between name form
//! (human-assigned, renamable ids) and permalink form (registry-assigned
//! UIDs, immutable across renames).
//!
//! Translation is fully re-derived from current registry state on every
//! call: there is no cache and no persisted mapping table, so a rename is
//! observed on the next translation and never served stale. Any registry
//! error aborts the whole call; callers never receive a recipe with some
//! fields translated and some not.

use anyhow::{Context, Result};
use std::sync::Arc;
use trellis_client::registry::{RegistryClient, RegistryEntry, ResourceRegistry};
use trellis_core::domain::recipe::Recipe;
use trellis_core::resource;

use crate::config::Config;

enum Lookup {
    ByName,
    ByPermalink,
}

/// Translates recipes between name form and permalink form
pub struct RecipeTranslator {
    source_connectors: Arc<dyn ResourceRegistry>,
    destination_connectors: Arc<dyn ResourceRegistry>,
    models: Arc<dyn ResourceRegistry>,
    model_instances: Arc<dyn ResourceRegistry>,
}

impl RecipeTranslator {
    /// Creates a translator over the four resource registries
    pub fn new(
        source_connectors: Arc<dyn ResourceRegistry>,
        destination_connectors: Arc<dyn ResourceRegistry>,
        models: Arc<dyn ResourceRegistry>,
        model_instances: Arc<dyn ResourceRegistry>,
    ) -> Self {
        Self {
            source_connectors,
            destination_connectors,
            models,
            model_instances,
        }
    }

    /// Builds a translator wired to the configured registry backends.
    ///
    /// The connector backend hosts both connector collections and the
    /// model backend hosts models and their instances, so each backend
    /// client is shared across its two registry handles.
    pub fn from_config(config: &Config) -> Self {
        let connectors: Arc<dyn ResourceRegistry> = Arc::new(RegistryClient::with_timeout(
            config.connector_backend_url.clone(),
            config.lookup_timeout,
        ));
        let models: Arc<dyn ResourceRegistry> = Arc::new(RegistryClient::with_timeout(
            config.model_backend_url.clone(),
            config.lookup_timeout,
        ));

        Self {
            source_connectors: connectors.clone(),
            destination_connectors: connectors,
            model_instances: models.clone(),
            models,
        }
    }

    /// Translates a name-form recipe into permalink form.
    ///
    /// Structural fields carry over unchanged; the output preserves the
    /// order of `model_instances`. All-or-nothing: the first registry
    /// error aborts the call.
    pub async fn name_to_permalink(&self, recipe: &Recipe) -> Result<Recipe> {
        let (source, destination) = tokio::try_join!(
            self.connector_reference(
                &self.source_connectors,
                &recipe.source,
                Lookup::ByName,
                "GetSourceConnector",
            ),
            self.connector_reference(
                &self.destination_connectors,
                &recipe.destination,
                Lookup::ByName,
                "GetDestinationConnector",
            ),
        )?;

        let mut model_instances = Vec::with_capacity(recipe.model_instances.len());
        for instance in &recipe.model_instances {
            model_instances.push(self.model_instance_reference(instance, Lookup::ByName).await?);
        }

        Ok(recipe.with_references(source, destination, model_instances))
    }

    /// Translates a permalink-form recipe back into name form.
    ///
    /// Exact mirror of [`Self::name_to_permalink`].
    pub async fn permalink_to_name(&self, recipe: &Recipe) -> Result<Recipe> {
        let (source, destination) = tokio::try_join!(
            self.connector_reference(
                &self.source_connectors,
                &recipe.source,
                Lookup::ByPermalink,
                "LookUpSourceConnector",
            ),
            self.connector_reference(
                &self.destination_connectors,
                &recipe.destination,
                Lookup::ByPermalink,
                "LookUpDestinationConnector",
            ),
        )?;

        let mut model_instances = Vec::with_capacity(recipe.model_instances.len());
        for instance in &recipe.model_instances {
            model_instances
                .push(self.model_instance_reference(instance, Lookup::ByPermalink).await?);
        }

        Ok(recipe.with_references(source, destination, model_instances))
    }

    async fn connector_reference(
        &self,
        registry: &Arc<dyn ResourceRegistry>,
        identifier: &str,
        lookup: Lookup,
        operation: &str,
    ) -> Result<String> {
        let (collection, _) = resource::locate(identifier)?;
        let entry = resolve(registry.as_ref(), identifier, &lookup, "connector-backend", operation)
            .await?;

        Ok(format!("{collection}/{}", reference_segment(&entry, &lookup)))
    }

    /// Rebuilds one `model_instances` entry.
    ///
    /// The instance identifier nests under its owning model
    /// (`models/<model>/instances/<instance>`); stripping the instance
    /// pair yields the model's own identifier, and both resources resolve
    /// against the model backend.
    async fn model_instance_reference(&self, identifier: &str, lookup: Lookup) -> Result<String> {
        let (instance_collection, instance_id) = resource::locate(identifier)?;
        let operation = match lookup {
            Lookup::ByName => "GetModelInstance",
            Lookup::ByPermalink => "LookUpModelInstance",
        };
        let instance_entry =
            resolve(self.model_instances.as_ref(), identifier, &lookup, "model-backend", operation)
                .await?;

        let model_identifier = resource::strip_suffix(identifier, instance_collection, instance_id)?;
        let (model_collection, _) = resource::locate(model_identifier)?;
        let operation = match lookup {
            Lookup::ByName => "GetModel",
            Lookup::ByPermalink => "LookUpModel",
        };
        let model_entry =
            resolve(self.models.as_ref(), model_identifier, &lookup, "model-backend", operation)
                .await?;

        Ok(format!(
            "{model_collection}/{}/{instance_collection}/{}",
            reference_segment(&model_entry, &lookup),
            reference_segment(&instance_entry, &lookup),
        ))
    }
}

async fn resolve(
    registry: &dyn ResourceRegistry,
    identifier: &str,
    lookup: &Lookup,
    backend: &str,
    operation: &str,
) -> Result<RegistryEntry> {
    let result = match lookup {
        Lookup::ByName => registry.get_by_name(identifier).await,
        Lookup::ByPermalink => registry.look_up_by_permalink(identifier).await,
    };

    result.with_context(|| format!("[{backend}] {operation} at {identifier}"))
}

/// The id segment written into the translated reference: the UID when
/// translating to permalink form, the human-facing id when translating
/// back to name form.
fn reference_segment<'a>(entry: &'a RegistryEntry, lookup: &Lookup) -> &'a str {
    match lookup {
        Lookup::ByName => &entry.uid,
        Lookup::ByPermalink => &entry.id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use trellis_client::error::{ClientError, Result as ClientResult};

    /// Registry double over fixed name/permalink tables.
    #[derive(Default)]
    struct FakeRegistry {
        by_name: HashMap<String, RegistryEntry>,
        by_permalink: HashMap<String, RegistryEntry>,
    }

    impl FakeRegistry {
        fn insert(&mut self, name: &str, permalink: &str, uid: &str, id: &str) {
            let entry = RegistryEntry {
                uid: uid.to_string(),
                id: id.to_string(),
            };
            self.by_name.insert(name.to_string(), entry.clone());
            self.by_permalink.insert(permalink.to_string(), entry);
        }
    }

    #[async_trait]
    impl ResourceRegistry for FakeRegistry {
        async fn get_by_name(&self, name: &str) -> ClientResult<RegistryEntry> {
            self.by_name
                .get(name)
                .cloned()
                .ok_or_else(|| ClientError::NotFound(name.to_string()))
        }

        async fn look_up_by_permalink(&self, permalink: &str) -> ClientResult<RegistryEntry> {
            self.by_permalink
                .get(permalink)
                .cloned()
                .ok_or_else(|| ClientError::NotFound(permalink.to_string()))
        }
    }

    fn translator() -> RecipeTranslator {
        let mut connectors = FakeRegistry::default();
        connectors.insert(
            "source-connectors/my-slack",
            "source-connectors/abc123",
            "abc123",
            "my-slack",
        );
        connectors.insert(
            "destination-connectors/my-pg",
            "destination-connectors/def456",
            "def456",
            "my-pg",
        );

        let mut models = FakeRegistry::default();
        models.insert("models/classifier", "models/m-uid-1", "m-uid-1", "classifier");
        models.insert("models/detector", "models/m-uid-2", "m-uid-2", "detector");

        let mut instances = FakeRegistry::default();
        instances.insert(
            "models/classifier/instances/latest",
            "models/m-uid-1/instances/i-uid-1",
            "i-uid-1",
            "latest",
        );
        instances.insert(
            "models/detector/instances/v2",
            "models/m-uid-2/instances/i-uid-2",
            "i-uid-2",
            "v2",
        );

        let connectors = Arc::new(connectors);
        RecipeTranslator::new(
            connectors.clone(),
            connectors,
            Arc::new(models),
            Arc::new(instances),
        )
    }

    fn name_form_recipe() -> Recipe {
        Recipe {
            version: "v1alpha".to_string(),
            on: Some(json!({"event": "manual"})),
            component: vec![],
            variable: HashMap::new(),
            output: HashMap::new(),
            source: "source-connectors/my-slack".to_string(),
            destination: "destination-connectors/my-pg".to_string(),
            model_instances: vec![
                "models/classifier/instances/latest".to_string(),
                "models/detector/instances/v2".to_string(),
            ],
        }
    }

    #[tokio::test]
    async fn test_name_to_permalink() {
        let translated = translator()
            .name_to_permalink(&name_form_recipe())
            .await
            .unwrap();

        assert_eq!(translated.source, "source-connectors/abc123");
        assert_eq!(translated.destination, "destination-connectors/def456");
        assert_eq!(
            translated.model_instances,
            vec![
                "models/m-uid-1/instances/i-uid-1".to_string(),
                "models/m-uid-2/instances/i-uid-2".to_string(),
            ]
        );
        // structural fields carry over unchanged
        assert_eq!(translated.version, "v1alpha");
        assert_eq!(translated.on, Some(json!({"event": "manual"})));
    }

    #[tokio::test]
    async fn test_round_trip_reproduces_original() {
        let translator = translator();
        let original = name_form_recipe();

        let permalink = translator.name_to_permalink(&original).await.unwrap();
        let back = translator.permalink_to_name(&permalink).await.unwrap();

        assert_eq!(back, original);
    }

    #[tokio::test]
    async fn test_failure_returns_no_partial_recipe() {
        let translator = translator();
        let mut recipe = name_form_recipe();
        recipe.model_instances.push("models/unknown/instances/v1".to_string());

        let err = translator.name_to_permalink(&recipe).await.unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("[model-backend]"), "{message}");
        assert!(message.contains("models/unknown/instances/v1"), "{message}");
    }

    #[tokio::test]
    async fn test_connector_error_names_backend_and_identifier() {
        let translator = translator();
        let mut recipe = name_form_recipe();
        recipe.source = "source-connectors/renamed-away".to_string();

        let err = translator.name_to_permalink(&recipe).await.unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("[connector-backend]"), "{message}");
        assert!(message.contains("GetSourceConnector"), "{message}");
        assert!(message.contains("source-connectors/renamed-away"), "{message}");
    }

    #[tokio::test]
    async fn test_malformed_reference_is_rejected() {
        let translator = translator();
        let mut recipe = name_form_recipe();
        recipe.model_instances = vec!["not-a-composite".to_string()];

        assert!(translator.name_to_permalink(&recipe).await.is_err());
    }
}
