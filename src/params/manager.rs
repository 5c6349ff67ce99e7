//! Active parameter set selection and the `Custom` derivation rule.
//!
//! `Custom` is always a base set name plus the parameters that differ from
//! it. Selecting another set keeps those diffs, so returning to `Custom` is
//! lossless. Editing while a named set is active starts a fresh `Custom`
//! from that set.

use serde::{Deserialize, Serialize};

use super::{ParameterSet, ParameterValue, ScaffoldPackage};
use crate::error::{ScaffoldError, ScaffoldResult};
use crate::generator::{GeneratorRegistry, ScaffoldGenerator};

pub const DEFAULT_SET: &str = "Default";
pub const CUSTOM_SET: &str = "Custom";

/// Base set name plus the parameters that differ from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomSet {
    pub base: String,
    pub diffs: Vec<(String, ParameterValue)>,
}

impl CustomSet {
    fn resolve(&self, base: &ParameterSet) -> ParameterSet {
        let mut set = base.clone();
        set.name = CUSTOM_SET.to_owned();
        for (name, value) in &self.diffs {
            set.set(name, value.clone());
        }
        set
    }

    fn from_resolved(base: &ParameterSet, resolved: &ParameterSet) -> Self {
        let diffs = resolved
            .iter()
            .filter(|(name, value)| base.get(name) != Some(*value))
            .map(|(name, value)| (name.to_owned(), value.clone()))
            .collect();
        Self {
            base: base.name.clone(),
            diffs,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSetManager {
    scaffold_type: String,
    active: String,
    custom: Option<CustomSet>,
    current: ParameterSet,
}

impl ParameterSetManager {
    /// Starts on the `Default` set of `scaffold_type`.
    pub fn new(registry: &GeneratorRegistry, scaffold_type: &str) -> ScaffoldResult<Self> {
        let generator = registry.get(scaffold_type)?;
        Ok(Self {
            scaffold_type: generator.scaffold_type().to_owned(),
            active: DEFAULT_SET.to_owned(),
            custom: None,
            current: generator.parameter_set(DEFAULT_SET)?,
        })
    }

    /// Rebuilds a manager from persisted state.
    pub fn restore(
        registry: &GeneratorRegistry,
        scaffold_type: &str,
        active: &str,
        custom: Option<CustomSet>,
    ) -> ScaffoldResult<Self> {
        let mut manager = Self::new(registry, scaffold_type)?;
        if let Some(custom) = &custom {
            let generator = registry.get(scaffold_type)?;
            generator.parameter_set(&custom.base)?;
            let schema = generator.parameter_schema();
            for (name, value) in &custom.diffs {
                schema.validate(name, value)?;
            }
        }
        manager.custom = custom;
        manager.select(registry, active)?;
        Ok(manager)
    }

    #[must_use]
    pub fn scaffold_type(&self) -> &str {
        &self.scaffold_type
    }

    #[must_use]
    pub fn active_name(&self) -> &str {
        &self.active
    }

    #[must_use]
    pub const fn custom(&self) -> Option<&CustomSet> {
        self.custom.as_ref()
    }

    /// Resolved values of the active set.
    #[must_use]
    pub const fn current(&self) -> &ParameterSet {
        &self.current
    }

    fn generator(
        &self,
        registry: &GeneratorRegistry,
    ) -> ScaffoldResult<std::sync::Arc<dyn ScaffoldGenerator>> {
        registry.get(&self.scaffold_type)
    }

    /// Activates a named set, or `Custom` if one has been derived.
    pub fn select(&mut self, registry: &GeneratorRegistry, name: &str) -> ScaffoldResult<()> {
        let generator = self.generator(registry)?;
        let current = if name == CUSTOM_SET {
            let custom = self
                .custom
                .as_ref()
                .ok_or_else(|| ScaffoldError::UnknownParameterSet(CUSTOM_SET.to_owned()))?;
            custom.resolve(&generator.parameter_set(&custom.base)?)
        } else {
            generator.parameter_set(name)?
        };
        self.current = current;
        self.active = name.to_owned();
        Ok(())
    }

    /// Sets one parameter, deriving `Custom` if needed. Returns whether the
    /// generator's dependent-parameter check changed other values.
    pub fn edit(
        &mut self,
        registry: &GeneratorRegistry,
        name: &str,
        value: ParameterValue,
    ) -> ScaffoldResult<bool> {
        let generator = self.generator(registry)?;
        generator.parameter_schema().validate(name, &value)?;

        let custom = match (&self.custom, self.active == CUSTOM_SET) {
            (Some(custom), true) => custom.clone(),
            _ => CustomSet {
                base: self.active.clone(),
                diffs: Vec::new(),
            },
        };
        let base = generator.parameter_set(&custom.base)?;
        let mut resolved = custom.resolve(&base);
        resolved.set(name, value);
        let dependent_changed = generator.check_parameters(&mut resolved);

        self.custom = Some(CustomSet::from_resolved(&base, &resolved));
        self.current = resolved;
        self.active = CUSTOM_SET.to_owned();
        log::debug!(
            "edited `{name}` on {} (base `{}`, dependent changes: {dependent_changed})",
            self.scaffold_type,
            base.name
        );
        Ok(dependent_changed)
    }

    fn nested_package(&self, option: &str) -> ScaffoldResult<ScaffoldPackage> {
        self.current.expect_scaffold(option).cloned()
    }

    /// Switches the sub-scaffold in `option` to its named set `set_name`.
    pub fn select_nested(
        &mut self,
        registry: &GeneratorRegistry,
        option: &str,
        set_name: &str,
    ) -> ScaffoldResult<()> {
        let mut package = self.nested_package(option)?;
        let nested = registry.get(&package.scaffold_type)?;
        package.parameters = nested.parameter_set(set_name)?;
        package.parameter_set_name = set_name.to_owned();
        self.edit(registry, option, package.into())?;
        Ok(())
    }

    /// Edits one parameter of the sub-scaffold in `option`.
    pub fn edit_nested(
        &mut self,
        registry: &GeneratorRegistry,
        option: &str,
        parameter: &str,
        value: ParameterValue,
    ) -> ScaffoldResult<bool> {
        let mut package = self.nested_package(option)?;
        let nested = registry.get(&package.scaffold_type)?;
        nested.parameter_schema().validate(parameter, &value)?;
        package.parameters.set(parameter, value);
        let nested_changed = nested.check_parameters(&mut package.parameters);
        package.parameters.name = CUSTOM_SET.to_owned();
        package.parameter_set_name = CUSTOM_SET.to_owned();
        let parent_changed = self.edit(registry, option, package.into())?;
        Ok(nested_changed || parent_changed)
    }

    /// Switches scaffold type, starting again from its `Default` set.
    pub fn set_scaffold_type(
        &mut self,
        registry: &GeneratorRegistry,
        scaffold_type: &str,
    ) -> ScaffoldResult<()> {
        *self = Self::new(registry, scaffold_type)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> GeneratorRegistry {
        GeneratorRegistry::with_reference_generators().unwrap()
    }

    #[test]
    fn edit_derives_custom_from_active_set() {
        let registry = registry();
        let mut manager = ParameterSetManager::new(&registry, "2D Plate").unwrap();
        manager.select(&registry, "Wide").unwrap();
        manager
            .edit(&registry, "Width", ParameterValue::Real(7.0))
            .unwrap();

        assert_eq!(manager.active_name(), CUSTOM_SET);
        let custom = manager.custom().unwrap();
        assert_eq!(custom.base, "Wide");
        assert_eq!(custom.diffs, vec![("Width".to_owned(), ParameterValue::Real(7.0))]);
    }

    #[test]
    fn diff_equal_to_base_is_removed() {
        let registry = registry();
        let mut manager = ParameterSetManager::new(&registry, "1D Line").unwrap();
        let original = manager.current().expect_real("Length").unwrap();
        manager.edit(&registry, "Length", ParameterValue::Real(2.0)).unwrap();
        manager
            .edit(&registry, "Length", ParameterValue::Real(original))
            .unwrap();
        assert!(manager.custom().unwrap().diffs.is_empty());
        assert_eq!(manager.active_name(), CUSTOM_SET);
    }

    #[test]
    fn dependent_changes_are_recorded() {
        let registry = registry();
        let mut manager = ParameterSetManager::new(&registry, "2D Plate").unwrap();
        let changed = manager
            .edit(&registry, "Square elements", ParameterValue::Boolean(true))
            .unwrap();
        assert!(changed);
        let count1 = manager.current().expect_integer("Elements count 1").unwrap();
        assert_eq!(
            manager.current().expect_integer("Elements count 2").unwrap(),
            count1
        );
        let diffs = &manager.custom().unwrap().diffs;
        assert!(diffs.iter().any(|(n, _)| n == "Elements count 2"));
    }

    #[test]
    fn selecting_custom_without_edits_fails() {
        let registry = registry();
        let mut manager = ParameterSetManager::new(&registry, "1D Line").unwrap();
        assert_eq!(
            manager.select(&registry, CUSTOM_SET).unwrap_err(),
            ScaffoldError::UnknownParameterSet(CUSTOM_SET.to_owned())
        );
    }

    #[test]
    fn invalid_edit_leaves_state_untouched() {
        let registry = registry();
        let mut manager = ParameterSetManager::new(&registry, "1D Line").unwrap();
        let before = manager.clone();
        assert!(
            manager
                .edit(&registry, "Number of elements", ParameterValue::Integer(0))
                .is_err()
        );
        assert_eq!(manager, before);
    }

    #[test]
    fn nested_edit_turns_parent_custom() {
        let registry = registry();
        let mut manager = ParameterSetManager::new(&registry, "3D Box").unwrap();
        manager
            .edit_nested(&registry, "Plate", "Elements count 1", ParameterValue::Integer(5))
            .unwrap();
        assert_eq!(manager.active_name(), CUSTOM_SET);
        let plate = manager.current().expect_scaffold("Plate").unwrap();
        assert_eq!(plate.parameter_set_name, CUSTOM_SET);
        assert_eq!(plate.parameters.expect_integer("Elements count 1").unwrap(), 5);

        manager.select_nested(&registry, "Plate", "Wide").unwrap();
        let plate = manager.current().expect_scaffold("Plate").unwrap();
        assert_eq!(plate.parameter_set_name, "Wide");
    }

    #[test]
    fn scaffold_type_change_drops_custom() {
        let registry = registry();
        let mut manager = ParameterSetManager::new(&registry, "1D Line").unwrap();
        manager.edit(&registry, "Length", ParameterValue::Real(3.0)).unwrap();
        manager.set_scaffold_type(&registry, "2D Plate").unwrap();
        assert_eq!(manager.active_name(), DEFAULT_SET);
        assert!(manager.custom().is_none());
        assert!(manager.set_scaffold_type(&registry, "2D Plat").is_err());
    }
}
