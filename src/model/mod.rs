//! Scaffold model: the single writer that owns the active snapshot.
//!
//! Every mutation builds a complete replacement [`ModelSnapshot`] first and
//! only then swaps it in, so a failed or cancelled regeneration leaves the
//! previous snapshot, overlay and annotations untouched. Readers hold
//! `Arc<ModelSnapshot>` handles that stay valid across later mutations.

mod output;
mod settings;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use output::{OutputField, OutputGroup, OutputModel, OutputNode};
pub use settings::ModelSettings;

use crate::annotation::{AnnotationRegistry, MarkerLocationSpec, Membership};
use crate::delete::DeletionSet;
use crate::error::{ScaffoldError, ScaffoldResult};
use crate::field::{FieldRegistrationReport, FieldStore, InversionOptions, ValidationOptions, ValueLabel};
use crate::generator::{CancelToken, GenerationContext, GeneratorRegistry, InteractiveRequest};
use crate::mesh::{Domain, ElementId, NodeId};
use crate::overlay::{DroppedOverlayEntry, EditOverlay};
use crate::params::{ParameterSet, ParameterSetManager, ParameterValue};
use crate::refine::RefineOptions;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    pub validation: ValidationOptions,
    pub inversion: InversionOptions,
}

/// One consistent generation of the model.
#[derive(Debug, Clone)]
pub struct ModelSnapshot {
    pub scaffold_type: String,
    pub parameters: ParameterSet,
    pub domain: Arc<Domain>,
    /// Fields exactly as generated.
    pub base_fields: Arc<FieldStore>,
    /// Base fields with overlay edits applied.
    pub fields: FieldStore,
    /// Edited fields with the pending transform applied to the primary field.
    pub view_fields: FieldStore,
    pub annotations: AnnotationRegistry,
}

impl ModelSnapshot {
    fn with_overlay(&self, overlay: &EditOverlay, annotations: AnnotationRegistry) -> ScaffoldResult<Self> {
        let fields = overlay.resolve(&self.base_fields)?;
        let view_fields = overlay.transformed(&fields)?;
        Ok(Self {
            scaffold_type: self.scaffold_type.clone(),
            parameters: self.parameters.clone(),
            domain: Arc::clone(&self.domain),
            base_fields: Arc::clone(&self.base_fields),
            fields,
            view_fields,
            annotations,
        })
    }
}

/// Outcome of one regeneration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegenerationReport {
    pub scaffold_type: String,
    pub parameter_set: String,
    pub elements: usize,
    pub nodes: usize,
    pub steps: usize,
    pub field_reports: Vec<FieldRegistrationReport>,
    pub dropped_overlay: Vec<DroppedOverlayEntry>,
    pub warnings: Vec<String>,
}

impl RegenerationReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.dropped_overlay.is_empty()
            && self.warnings.is_empty()
            && self.field_reports.iter().all(FieldRegistrationReport::is_clean)
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// The dropped overlay entries as a recoverable error, if any.
    #[must_use]
    pub fn overlay_error(&self) -> Option<ScaffoldError> {
        (!self.dropped_overlay.is_empty()).then(|| ScaffoldError::IncompatibleOverlay {
            dropped: self.dropped_overlay.clone(),
        })
    }

    #[must_use]
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{} `{}` E:{} N:{} steps:{}",
            self.scaffold_type, self.parameter_set, self.elements, self.nodes, self.steps
        );
        if !self.dropped_overlay.is_empty() {
            summary.push_str(&format!(" dropped:{}", self.dropped_overlay.len()));
        }
        if !self.warnings.is_empty() {
            summary.push_str(&format!(" warnings:{}", self.warnings.len()));
        }
        summary
    }
}

impl fmt::Display for RegenerationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Regeneration of {} (`{}`):", self.scaffold_type, self.parameter_set)?;
        writeln!(f, "  Elements: {}", self.elements)?;
        writeln!(f, "  Nodes: {}", self.nodes)?;
        writeln!(f, "  Steps: {}", self.steps)?;
        for report in &self.field_reports {
            writeln!(f, "  Field {}", report.summary())?;
        }
        if !self.dropped_overlay.is_empty() {
            writeln!(f, "  Dropped overlay entries:")?;
            for entry in &self.dropped_overlay {
                writeln!(f, "    - {entry}")?;
            }
        }
        if !self.warnings.is_empty() {
            writeln!(f, "  Warnings:")?;
            for warning in &self.warnings {
                writeln!(f, "    - {warning}")?;
            }
        }
        Ok(())
    }
}

/// Everything a regeneration produces, committed together.
struct Regenerated {
    snapshot: ModelSnapshot,
    overlay: EditOverlay,
    report: RegenerationReport,
}

/// Owner of the generator parameters, overlay, annotations and deletion
/// set of one scaffold, and of the snapshot generated from them.
#[derive(Debug)]
pub struct ScaffoldModel {
    registry: GeneratorRegistry,
    options: EngineOptions,
    parameters: ParameterSetManager,
    overlay: EditOverlay,
    deletion: DeletionSet,
    refinement: Option<RefineOptions>,
    model_coordinates: Option<String>,
    cancel: CancelToken,
    snapshot: Arc<ModelSnapshot>,
    last_report: RegenerationReport,
}

impl ScaffoldModel {
    /// Generates the `Default` set of `scaffold_type`.
    pub fn new(registry: GeneratorRegistry, scaffold_type: &str, options: EngineOptions) -> ScaffoldResult<Self> {
        let parameters = ParameterSetManager::new(&registry, scaffold_type)?;
        Self::build(
            registry,
            options,
            parameters,
            EditOverlay::new(),
            AnnotationRegistry::new(),
            None,
        )
    }

    fn build(
        registry: GeneratorRegistry,
        options: EngineOptions,
        parameters: ParameterSetManager,
        overlay: EditOverlay,
        annotations: AnnotationRegistry,
        model_coordinates: Option<String>,
    ) -> ScaffoldResult<Self> {
        let cancel = CancelToken::new();
        let regenerated = regenerate(
            &registry,
            &options,
            &cancel,
            &parameters,
            &overlay,
            &annotations,
            model_coordinates.as_deref(),
        )?;
        Ok(Self {
            registry,
            options,
            parameters,
            overlay: regenerated.overlay,
            deletion: DeletionSet::new(),
            refinement: None,
            model_coordinates,
            cancel,
            snapshot: Arc::new(regenerated.snapshot),
            last_report: regenerated.report,
        })
    }

    // ───────────────────────────────────────────────────────────────────────
    // Accessors
    // ───────────────────────────────────────────────────────────────────────

    #[must_use]
    pub fn snapshot(&self) -> Arc<ModelSnapshot> {
        Arc::clone(&self.snapshot)
    }

    #[must_use]
    pub const fn registry(&self) -> &GeneratorRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn parameters(&self) -> &ParameterSetManager {
        &self.parameters
    }

    #[must_use]
    pub const fn overlay(&self) -> &EditOverlay {
        &self.overlay
    }

    #[must_use]
    pub const fn deletion(&self) -> &DeletionSet {
        &self.deletion
    }

    #[must_use]
    pub const fn refinement(&self) -> Option<&RefineOptions> {
        self.refinement.as_ref()
    }

    #[must_use]
    pub const fn last_report(&self) -> &RegenerationReport {
        &self.last_report
    }

    /// Token that cancels the next or running regeneration.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    // ───────────────────────────────────────────────────────────────────────
    // Generator parameters
    // ───────────────────────────────────────────────────────────────────────

    fn commit(&mut self, parameters: ParameterSetManager, overlay: EditOverlay) -> ScaffoldResult<&RegenerationReport> {
        let regenerated = regenerate(
            &self.registry,
            &self.options,
            &self.cancel,
            &parameters,
            &overlay,
            &self.snapshot.annotations,
            self.model_coordinates.as_deref(),
        )?;
        self.parameters = parameters;
        self.overlay = regenerated.overlay;
        self.snapshot = Arc::new(regenerated.snapshot);
        self.last_report = regenerated.report;
        Ok(&self.last_report)
    }

    /// Activates a named set or `Custom`. Node edits are kept where they
    /// still fit; the pending transform is reset.
    pub fn select_parameter_set(&mut self, name: &str) -> ScaffoldResult<&RegenerationReport> {
        let mut parameters = self.parameters.clone();
        parameters.select(&self.registry, name)?;
        let mut overlay = self.overlay.clone();
        overlay.reset_transform();
        self.commit(parameters, overlay)
    }

    /// Sets one generator parameter. The overlay is cleared.
    pub fn edit_parameter(&mut self, name: &str, value: ParameterValue) -> ScaffoldResult<&RegenerationReport> {
        let mut parameters = self.parameters.clone();
        parameters.edit(&self.registry, name, value)?;
        self.commit(parameters, EditOverlay::new())
    }

    pub fn select_nested_set(&mut self, option: &str, set_name: &str) -> ScaffoldResult<&RegenerationReport> {
        let mut parameters = self.parameters.clone();
        parameters.select_nested(&self.registry, option, set_name)?;
        self.commit(parameters, EditOverlay::new())
    }

    pub fn edit_nested_parameter(
        &mut self,
        option: &str,
        parameter: &str,
        value: ParameterValue,
    ) -> ScaffoldResult<&RegenerationReport> {
        let mut parameters = self.parameters.clone();
        parameters.edit_nested(&self.registry, option, parameter, value)?;
        self.commit(parameters, EditOverlay::new())
    }

    /// Switches to the `Default` set of another scaffold type. Node edits and
    /// the pending transform belong to the old type and are discarded.
    pub fn set_scaffold_type(&mut self, scaffold_type: &str) -> ScaffoldResult<&RegenerationReport> {
        let mut parameters = self.parameters.clone();
        parameters.set_scaffold_type(&self.registry, scaffold_type)?;
        self.commit(parameters, EditOverlay::new())
    }

    /// Makes `name` the primary coordinate field, now and after regenerations.
    pub fn set_model_coordinates(&mut self, name: &str) -> ScaffoldResult<()> {
        let mut base = (*self.snapshot.base_fields).clone();
        base.set_primary(name)?;
        let snapshot = ModelSnapshot {
            base_fields: Arc::new(base),
            ..(*self.snapshot).clone()
        }
        .with_overlay(&self.overlay, self.snapshot.annotations.clone())?;
        self.model_coordinates = Some(name.to_owned());
        self.snapshot = Arc::new(snapshot);
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────
    // Overlay
    // ───────────────────────────────────────────────────────────────────────

    fn replace_overlay(&mut self, overlay: EditOverlay) -> ScaffoldResult<()> {
        let snapshot = self
            .snapshot
            .with_overlay(&overlay, self.snapshot.annotations.clone())?;
        self.overlay = overlay;
        self.snapshot = Arc::new(snapshot);
        Ok(())
    }

    /// Overrides one nodal parameter of an existing field.
    pub fn set_node_parameter(
        &mut self,
        node: NodeId,
        field: &str,
        label: ValueLabel,
        value: Vec<f64>,
    ) -> ScaffoldResult<()> {
        if !self.snapshot.domain.contains_node(node) {
            return Err(ScaffoldError::UnknownNode(node));
        }
        let components = self.snapshot.base_fields.get(field)?.components;
        if value.len() != components {
            return Err(ScaffoldError::invalid_parameter(
                format!("{field}.{label}"),
                format!("expected {components} components, got {}", value.len()),
            ));
        }
        let mut overlay = self.overlay.clone();
        overlay.set(node, field, label, value);
        overlay.set_fingerprint(self.snapshot.domain.topology_fingerprint());
        self.replace_overlay(overlay)
    }

    /// Rotates the pending transform by `degrees` about `axis`.
    pub fn rotate(&mut self, axis: [f64; 3], degrees: f64) -> ScaffoldResult<()> {
        let mut overlay = self.overlay.clone();
        overlay.transform.accumulate_rotation(axis, degrees)?;
        self.replace_overlay(overlay)
    }

    pub fn scale(&mut self, factors: [f64; 3]) -> ScaffoldResult<()> {
        let mut overlay = self.overlay.clone();
        overlay.transform.accumulate_scale(factors)?;
        self.replace_overlay(overlay)
    }

    pub fn translate(&mut self, offset: [f64; 3]) -> ScaffoldResult<()> {
        let mut overlay = self.overlay.clone();
        overlay.transform.accumulate_translation(offset);
        self.replace_overlay(overlay)
    }

    /// Bakes the pending transform into the edit fields. Returns the number
    /// of nodes written.
    pub fn apply_transform(&mut self) -> ScaffoldResult<usize> {
        let mut overlay = self.overlay.clone();
        let written = overlay.apply_transform(&self.snapshot.base_fields)?;
        overlay.set_fingerprint(self.snapshot.domain.topology_fingerprint());
        self.replace_overlay(overlay)?;
        Ok(written)
    }

    /// Drops every node edit and the pending transform.
    pub fn clear_overlay(&mut self) -> ScaffoldResult<()> {
        self.replace_overlay(EditOverlay::new())
    }

    /// Names of the active generator's interactive functions.
    pub fn interactive_functions(&self) -> ScaffoldResult<Vec<String>> {
        let generator = self.registry.get(self.parameters.scaffold_type())?;
        Ok(generator.interactive_functions().into_iter().map(|f| f.name).collect())
    }

    /// Runs an interactive function on `selection` (every node when empty),
    /// with `options` overriding its defaults, and records its edits.
    /// Returns the number of edits.
    pub fn run_interactive(
        &mut self,
        name: &str,
        selection: &[NodeId],
        options: &ParameterSet,
    ) -> ScaffoldResult<usize> {
        let generator = self.registry.get(self.parameters.scaffold_type())?;
        let function = generator
            .interactive_functions()
            .into_iter()
            .find(|f| f.name == name)
            .ok_or_else(|| ScaffoldError::invalid_parameter(name, "no such interactive function"))?;
        let mut merged = function.options.clone();
        for (option, value) in options.iter() {
            if merged.get(option).is_none() {
                return Err(ScaffoldError::invalid_parameter(
                    option,
                    format!("not an option of `{name}`"),
                ));
            }
            merged.set(option, value.clone());
        }
        let snapshot = self.snapshot();
        let request = InteractiveRequest {
            selection: selection.to_vec(),
            domain: &snapshot.domain,
            fields: &snapshot.fields,
            overlay: &self.overlay,
            options: &merged,
        };
        let update = function.call(&request)?;
        let mut overlay = self.overlay.clone();
        overlay.apply_update(&update);
        overlay.set_fingerprint(snapshot.domain.topology_fingerprint());
        self.replace_overlay(overlay)?;
        log::debug!("`{name}` recorded {} edits", update.len());
        Ok(update.len())
    }

    // ───────────────────────────────────────────────────────────────────────
    // Annotations
    // ───────────────────────────────────────────────────────────────────────

    fn update_annotations<T>(
        &mut self,
        change: impl FnOnce(&mut AnnotationRegistry, &ModelSnapshot) -> ScaffoldResult<T>,
    ) -> ScaffoldResult<T> {
        let mut annotations = self.snapshot.annotations.clone();
        let out = change(&mut annotations, &self.snapshot)?;
        self.snapshot = Arc::new(ModelSnapshot {
            annotations,
            ..(*self.snapshot).clone()
        });
        Ok(out)
    }

    /// New user group; returns its generated name.
    pub fn create_group(&mut self, selection: &Membership) -> ScaffoldResult<String> {
        self.update_annotations(|a, s| a.create(&s.domain, selection))
    }

    pub fn redefine_group(&mut self, name: &str, selection: &Membership) -> ScaffoldResult<()> {
        self.update_annotations(|a, s| a.redefine(name, &s.domain, selection))
    }

    pub fn rename_group(&mut self, name: &str, new_name: &str) -> ScaffoldResult<()> {
        self.update_annotations(|a, _| a.rename(name, new_name))
    }

    pub fn set_group_term(&mut self, name: &str, term: &str) -> ScaffoldResult<()> {
        self.update_annotations(|a, _| a.set_term(name, term))
    }

    pub fn delete_group(&mut self, name: &str) -> ScaffoldResult<()> {
        self.update_annotations(|a, _| a.delete(name))
    }

    /// New user marker; returns its name.
    pub fn create_marker(&mut self, name: Option<&str>, spec: &MarkerLocationSpec) -> ScaffoldResult<String> {
        let inversion = self.options.inversion;
        self.update_annotations(|a, s| a.create_marker(name, spec, &s.domain, &s.fields, &inversion))
    }

    // ───────────────────────────────────────────────────────────────────────
    // Deletion and refinement
    // ───────────────────────────────────────────────────────────────────────

    pub fn delete_elements(&mut self, ids: impl IntoIterator<Item = ElementId>) {
        self.deletion.delete(ids);
    }

    pub fn restore_elements(&mut self, ids: impl IntoIterator<Item = ElementId>) {
        self.deletion.restore(ids);
    }

    /// Replaces the deletion set from identifier range text.
    pub fn set_deletion_ranges(&mut self, text: &str) -> ScaffoldResult<()> {
        self.deletion = DeletionSet::from_ranges_text(text)?;
        Ok(())
    }

    /// Output refinement; `None` outputs the base mesh.
    pub fn set_refinement(&mut self, options: Option<RefineOptions>) {
        self.refinement = options;
    }
}

fn regenerate(
    registry: &GeneratorRegistry,
    options: &EngineOptions,
    cancel: &CancelToken,
    parameters: &ParameterSetManager,
    overlay: &EditOverlay,
    annotations: &AnnotationRegistry,
    model_coordinates: Option<&str>,
) -> ScaffoldResult<Regenerated> {
    let generator = registry.get(parameters.scaffold_type())?;
    let current = parameters.current();
    generator.parameter_schema().validate_set(current)?;

    let mut ctx = GenerationContext::new(registry, cancel.clone(), options.validation);
    let generated = match generator.generate(current, &mut ctx) {
        Ok(generated) => generated,
        Err(err) => {
            if err == ScaffoldError::Cancelled {
                cancel.reset();
            }
            log::warn!("regeneration of {} failed: {err}", parameters.scaffold_type());
            return Err(err);
        }
    };
    let steps = ctx.steps();
    let field_reports = ctx.into_reports();

    let domain = generated.domain;
    let mut base_fields = generated.fields;
    let mut report = RegenerationReport {
        scaffold_type: parameters.scaffold_type().to_owned(),
        parameter_set: parameters.active_name().to_owned(),
        elements: domain.element_count(),
        nodes: domain.node_count(),
        steps,
        field_reports,
        ..RegenerationReport::default()
    };
    if let Some(name) = model_coordinates {
        if let Err(err) = base_fields.set_primary(name) {
            report.add_warning(format!("model coordinates `{name}` unavailable: {err}"));
        }
    }

    let mut overlay = overlay.clone();
    report.dropped_overlay = overlay.retain_compatible(&domain, &base_fields);
    let fields = overlay.resolve(&base_fields)?;
    let view_fields = overlay.transformed(&fields)?;

    let mut annotations = annotations.clone();
    for warning in annotations.install_builtins(generated.builtin_groups, generated.builtin_markers, &domain) {
        report.add_warning(warning);
    }
    for warning in annotations.retain_compatible(&domain, &fields, &options.inversion) {
        report.add_warning(warning);
    }

    log::info!("regenerated {}", report.summary());
    Ok(Regenerated {
        snapshot: ModelSnapshot {
            scaffold_type: report.scaffold_type.clone(),
            parameters: current.clone(),
            domain: Arc::new(domain),
            base_fields: Arc::new(base_fields),
            fields,
            view_fields,
            annotations,
        },
        overlay,
        report,
    })
}
