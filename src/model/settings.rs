//! Persisted model state and its JSON round trip.

use serde::{Deserialize, Serialize};

use super::{EngineOptions, ScaffoldModel};
use crate::annotation::{AnnotationGroup, AnnotationRegistry, Marker};
use crate::delete::DeletionSet;
use crate::error::ScaffoldResult;
use crate::generator::GeneratorRegistry;
use crate::overlay::EditOverlay;
use crate::params::{CustomSet, DEFAULT_SET, ParameterSetManager};
use crate::refine::RefineOptions;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub scaffold_type: String,
    pub parameter_set: String,
    pub custom: Option<CustomSet>,
    /// Node edits and the pending transform.
    pub overlay: EditOverlay,
    pub deletion_ranges: String,
    pub refinement: Option<RefineOptions>,
    pub user_groups: Vec<AnnotationGroup>,
    pub user_markers: Vec<Marker>,
    pub model_coordinates: Option<String>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            scaffold_type: String::new(),
            parameter_set: DEFAULT_SET.to_owned(),
            custom: None,
            overlay: EditOverlay::default(),
            deletion_ranges: String::new(),
            refinement: None,
            user_groups: Vec::new(),
            user_markers: Vec::new(),
            model_coordinates: None,
        }
    }
}

impl ModelSettings {
    pub fn to_json(&self) -> ScaffoldResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> ScaffoldResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

impl ScaffoldModel {
    #[must_use]
    pub fn settings(&self) -> ModelSettings {
        let annotations = &self.snapshot.annotations;
        ModelSettings {
            scaffold_type: self.parameters.scaffold_type().to_owned(),
            parameter_set: self.parameters.active_name().to_owned(),
            custom: self.parameters.custom().cloned(),
            overlay: self.overlay.clone(),
            deletion_ranges: self.deletion.ranges_text(),
            refinement: self.refinement.clone(),
            user_groups: annotations.user_groups(),
            user_markers: annotations.user_markers(),
            model_coordinates: self.model_coordinates.clone(),
        }
    }

    /// Rebuilds a model from saved settings, regenerating its scaffold.
    pub fn from_settings(
        registry: GeneratorRegistry,
        settings: &ModelSettings,
        options: EngineOptions,
    ) -> ScaffoldResult<Self> {
        let parameters = ParameterSetManager::restore(
            &registry,
            &settings.scaffold_type,
            &settings.parameter_set,
            settings.custom.clone(),
        )?;
        let annotations =
            AnnotationRegistry::from_parts(settings.user_groups.clone(), settings.user_markers.clone());
        let mut model = Self::build(
            registry,
            options,
            parameters,
            settings.overlay.clone(),
            annotations,
            settings.model_coordinates.clone(),
        )?;
        model.deletion = DeletionSet::from_ranges_text(&settings.deletion_ranges)?;
        model.refinement.clone_from(&settings.refinement);
        log::debug!("restored {} from settings", settings.scaffold_type);
        Ok(model)
    }
}
