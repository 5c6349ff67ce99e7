//! Generator adapter: scaffold types as registered capabilities.
//!
//! A generator turns a parameter set into a domain, its fields and the
//! built-in annotations. Generators are looked up by scaffold type name in a
//! [`GeneratorRegistry`]; nested sub-scaffolds are generated through the
//! same registry within the parent's [`GenerationContext`].

mod box3d;
mod builder;
mod line;
mod plate;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub use box3d::BoxGenerator;
pub use line::LineGenerator;
pub use plate::PlateGenerator;

use crate::annotation::{AnnotationGroup, Marker};
use crate::error::{ScaffoldError, ScaffoldResult, closest_name};
use crate::field::{Field, FieldRegistrationReport, FieldStore, ValidationOptions};
use crate::mesh::{Domain, NodeId};
use crate::overlay::{EditOverlay, OverlayUpdate};
use crate::params::{DEFAULT_SET, ParameterSchema, ParameterSet, ScaffoldPackage};
use crate::smooth::{SmoothMode, SmoothOptions, smooth_derivatives};

/// Sub-scaffolds nested deeper than this are rejected.
const MAX_NESTING_DEPTH: usize = 8;

/// Output of one generation pass.
#[derive(Debug, Clone, Default)]
pub struct GeneratedScaffold {
    pub domain: Domain,
    pub fields: FieldStore,
    pub builtin_groups: Vec<AnnotationGroup>,
    pub builtin_markers: Vec<Marker>,
}

pub trait ScaffoldGenerator: Send + Sync {
    fn scaffold_type(&self) -> &str;

    fn parameter_schema(&self) -> ParameterSchema;

    /// Names of the predefined sets; exactly one must be `Default`.
    fn parameter_set_names(&self) -> Vec<String>;

    fn parameter_set(&self, name: &str) -> ScaffoldResult<ParameterSet>;

    /// Adjusts parameters that depend on others. Returns whether anything changed.
    fn check_parameters(&self, _parameters: &mut ParameterSet) -> bool {
        false
    }

    fn generate(
        &self,
        parameters: &ParameterSet,
        ctx: &mut GenerationContext<'_>,
    ) -> ScaffoldResult<GeneratedScaffold>;

    fn interactive_functions(&self) -> Vec<InteractiveFunction> {
        Vec::new()
    }
}

/// Shared cancellation flag for a running generation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// State threaded through one generation pass, including nested packages.
pub struct GenerationContext<'a> {
    registry: &'a GeneratorRegistry,
    cancel: CancelToken,
    validation: ValidationOptions,
    depth: usize,
    steps: usize,
    reports: Vec<FieldRegistrationReport>,
}

impl<'a> GenerationContext<'a> {
    #[must_use]
    pub fn new(
        registry: &'a GeneratorRegistry,
        cancel: CancelToken,
        validation: ValidationOptions,
    ) -> Self {
        Self {
            registry,
            cancel,
            validation,
            depth: 0,
            steps: 0,
            reports: Vec::new(),
        }
    }

    /// Called between element-construction steps.
    pub fn checkpoint(&mut self) -> ScaffoldResult<()> {
        self.steps += 1;
        if self.cancel.is_cancelled() {
            log::debug!("generation cancelled after {} steps", self.steps);
            return Err(ScaffoldError::Cancelled);
        }
        Ok(())
    }

    /// Generates a sub-scaffold package within this pass.
    pub fn generate_nested(&mut self, package: &ScaffoldPackage) -> ScaffoldResult<GeneratedScaffold> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(ScaffoldError::invalid_parameter(
                &package.scaffold_type,
                format!("sub-scaffolds nested deeper than {MAX_NESTING_DEPTH}"),
            ));
        }
        let generator = self.registry.get(&package.scaffold_type)?;
        generator.parameter_schema().validate_set(&package.parameters)?;
        let mut child = GenerationContext {
            registry: self.registry,
            cancel: self.cancel.clone(),
            validation: self.validation,
            depth: self.depth + 1,
            steps: 0,
            reports: Vec::new(),
        };
        log::debug!(
            "generating nested {} (`{}`)",
            package.scaffold_type,
            package.parameter_set_name
        );
        let generated = generator.generate(&package.parameters, &mut child)?;
        self.steps += child.steps;
        self.reports.extend(child.reports);
        Ok(generated)
    }

    /// Validates and stores a field, keeping its registration report.
    pub fn register_field(
        &mut self,
        fields: &mut FieldStore,
        field: Field,
        domain: &Domain,
    ) -> ScaffoldResult<()> {
        let report = fields.register(field, domain, &self.validation)?;
        self.reports.push(report);
        Ok(())
    }

    #[must_use]
    pub const fn steps(&self) -> usize {
        self.steps
    }

    #[must_use]
    pub fn into_reports(self) -> Vec<FieldRegistrationReport> {
        self.reports
    }
}

/// Arguments handed to an interactive function.
pub struct InteractiveRequest<'a> {
    /// Target nodes; every domain node when the caller selected none.
    pub selection: Vec<NodeId>,
    pub domain: &'a Domain,
    /// Fields with overlay edits applied, before the pending transform.
    pub fields: &'a FieldStore,
    pub overlay: &'a EditOverlay,
    pub options: &'a ParameterSet,
}

pub type InteractiveHandler =
    Arc<dyn Fn(&InteractiveRequest<'_>) -> ScaffoldResult<OverlayUpdate> + Send + Sync>;

/// Named operation that computes overlay edits from the current model.
#[derive(Clone)]
pub struct InteractiveFunction {
    pub name: String,
    /// Default option values; callers override individual entries.
    pub options: ParameterSet,
    handler: InteractiveHandler,
}

impl InteractiveFunction {
    #[must_use]
    pub fn new(name: &str, options: ParameterSet, handler: InteractiveHandler) -> Self {
        Self {
            name: name.to_owned(),
            options,
            handler,
        }
    }

    pub fn call(&self, request: &InteractiveRequest<'_>) -> ScaffoldResult<OverlayUpdate> {
        (self.handler)(request)
    }
}

impl fmt::Debug for InteractiveFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InteractiveFunction")
            .field("name", &self.name)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// The derivative smoothing function offered by every reference generator.
#[must_use]
pub fn smooth_derivatives_function() -> InteractiveFunction {
    let options = ParameterSet::new("Smooth derivatives")
        .with("Update directions", false)
        .with("Scale factor mode", "Arithmetic");
    InteractiveFunction::new(
        "Smooth derivatives",
        options,
        Arc::new(|request: &InteractiveRequest<'_>| {
            let options = SmoothOptions {
                mode: request
                    .options
                    .expect_text("Scale factor mode")?
                    .parse::<SmoothMode>()?,
                adjust_directions: request.options.expect_boolean("Update directions")?,
                ..SmoothOptions::default()
            };
            smooth_derivatives(
                request.domain,
                request.fields.primary()?,
                &request.selection,
                &options,
            )
        }),
    )
}

/// Generators keyed by scaffold type name.
#[derive(Clone, Default)]
pub struct GeneratorRegistry {
    generators: BTreeMap<String, Arc<dyn ScaffoldGenerator>>,
}

impl GeneratorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the `1D Line`, `2D Plate` and `3D Box` generators.
    pub fn with_reference_generators() -> ScaffoldResult<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(LineGenerator))?;
        registry.register(Arc::new(PlateGenerator))?;
        registry.register(Arc::new(BoxGenerator))?;
        Ok(registry)
    }

    /// Adds a generator after checking its predefined sets against its schema.
    pub fn register(&mut self, generator: Arc<dyn ScaffoldGenerator>) -> ScaffoldResult<()> {
        let name = generator.scaffold_type().to_owned();
        if self.generators.contains_key(&name) {
            return Err(ScaffoldError::invalid_parameter(
                &name,
                "scaffold type is already registered",
            ));
        }
        let set_names = generator.parameter_set_names();
        let defaults = set_names.iter().filter(|n| *n == DEFAULT_SET).count();
        if defaults != 1 {
            return Err(ScaffoldError::invalid_parameter(
                &name,
                format!("expected exactly one `{DEFAULT_SET}` parameter set, found {defaults}"),
            ));
        }
        let schema = generator.parameter_schema();
        for set_name in &set_names {
            schema.validate_set(&generator.parameter_set(set_name)?)?;
        }
        log::debug!("registered scaffold type `{name}` with sets {set_names:?}");
        self.generators.insert(name, generator);
        Ok(())
    }

    pub fn get(&self, name: &str) -> ScaffoldResult<Arc<dyn ScaffoldGenerator>> {
        self.generators.get(name).cloned().ok_or_else(|| {
            ScaffoldError::UnknownScaffoldType {
                name: name.to_owned(),
                suggestion: closest_name(name, self.names()),
            }
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.generators.keys().map(String::as_str)
    }
}

impl fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.generators.keys()).finish()
    }
}
