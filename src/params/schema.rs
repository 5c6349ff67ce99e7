//! Parameter schemas: declared names, kinds and constraints.

use serde::{Deserialize, Serialize};

use super::{ParameterSet, ParameterValue};
use crate::error::{ScaffoldError, ScaffoldResult, closest_name};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub enum ParameterKind {
    Integer,
    Real,
    Boolean,
    Text,
    IntegerList,
    RealList,
    Scaffold,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraints {
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Allowed text values; empty means any.
    pub choices: Vec<String>,
    /// Allowed sub-scaffold types for scaffold parameters.
    pub scaffold_types: Vec<String>,
    pub min_len: Option<usize>,
    pub max_len: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub kind: ParameterKind,
    pub constraints: Constraints,
}

impl ParameterSpec {
    #[must_use]
    pub fn new(name: &str, kind: ParameterKind) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            constraints: Constraints::default(),
        }
    }

    #[must_use]
    pub fn integer(name: &str) -> Self {
        Self::new(name, ParameterKind::Integer)
    }

    #[must_use]
    pub fn real(name: &str) -> Self {
        Self::new(name, ParameterKind::Real)
    }

    #[must_use]
    pub fn boolean(name: &str) -> Self {
        Self::new(name, ParameterKind::Boolean)
    }

    #[must_use]
    pub fn text(name: &str, choices: &[&str]) -> Self {
        let mut spec = Self::new(name, ParameterKind::Text);
        spec.constraints.choices = choices.iter().map(|c| (*c).to_owned()).collect();
        spec
    }

    #[must_use]
    pub fn scaffold(name: &str, scaffold_types: &[&str]) -> Self {
        let mut spec = Self::new(name, ParameterKind::Scaffold);
        spec.constraints.scaffold_types = scaffold_types.iter().map(|c| (*c).to_owned()).collect();
        spec
    }

    #[must_use]
    pub fn min(mut self, min: f64) -> Self {
        self.constraints.min = Some(min);
        self
    }

    #[must_use]
    pub fn max(mut self, max: f64) -> Self {
        self.constraints.max = Some(max);
        self
    }

    #[must_use]
    pub fn length(mut self, min_len: usize, max_len: usize) -> Self {
        self.constraints.min_len = Some(min_len);
        self.constraints.max_len = Some(max_len);
        self
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn validate(&self, value: &ParameterValue) -> ScaffoldResult<()> {
        let fail = |reason: String| Err(ScaffoldError::invalid_parameter(&self.name, reason));
        let c = &self.constraints;
        match (self.kind, value) {
            (ParameterKind::Integer, ParameterValue::Integer(v))
            | (ParameterKind::Real, ParameterValue::Integer(v)) => self.check_range(*v as f64),
            (ParameterKind::Real, ParameterValue::Real(v)) => {
                if !v.is_finite() {
                    return fail(format!("{v} is not finite"));
                }
                self.check_range(*v)
            }
            (ParameterKind::Boolean, ParameterValue::Boolean(_)) => Ok(()),
            (ParameterKind::Text, ParameterValue::Text(v)) => {
                if c.choices.is_empty() || c.choices.contains(v) {
                    Ok(())
                } else {
                    fail(format!("`{v}` is not one of {:?}", c.choices))
                }
            }
            (ParameterKind::IntegerList, ParameterValue::IntegerList(items)) => {
                self.check_len(items.len())?;
                items.iter().try_for_each(|v| self.check_range(*v as f64))
            }
            (ParameterKind::RealList, ParameterValue::RealList(items)) => {
                self.check_len(items.len())?;
                items.iter().try_for_each(|v| self.check_range(*v))
            }
            (ParameterKind::Scaffold, ParameterValue::Scaffold(package)) => {
                if c.scaffold_types.is_empty() || c.scaffold_types.contains(&package.scaffold_type) {
                    Ok(())
                } else {
                    fail(format!(
                        "scaffold type `{}` is not one of {:?}",
                        package.scaffold_type, c.scaffold_types
                    ))
                }
            }
            (kind, other) => fail(format!("expected {kind:?}, found {}", other.kind_name())),
        }
    }

    fn check_range(&self, v: f64) -> ScaffoldResult<()> {
        if let Some(min) = self.constraints.min {
            if v < min {
                return Err(ScaffoldError::invalid_parameter(
                    &self.name,
                    format!("{v} is below the minimum {min}"),
                ));
            }
        }
        if let Some(max) = self.constraints.max {
            if v > max {
                return Err(ScaffoldError::invalid_parameter(
                    &self.name,
                    format!("{v} is above the maximum {max}"),
                ));
            }
        }
        Ok(())
    }

    fn check_len(&self, len: usize) -> ScaffoldResult<()> {
        let c = &self.constraints;
        if c.min_len.is_some_and(|m| len < m) || c.max_len.is_some_and(|m| len > m) {
            return Err(ScaffoldError::invalid_parameter(
                &self.name,
                format!("list length {len} is outside {:?}..={:?}", c.min_len, c.max_len),
            ));
        }
        Ok(())
    }
}

/// Ordered parameter declarations of one scaffold type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    specs: Vec<ParameterSpec>,
}

impl ParameterSchema {
    #[must_use]
    pub const fn new(specs: Vec<ParameterSpec>) -> Self {
        Self { specs }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParameterSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParameterSpec> + '_ {
        self.specs.iter()
    }

    /// Checks one value; unknown names get a "did you mean" hint.
    pub fn validate(&self, name: &str, value: &ParameterValue) -> ScaffoldResult<()> {
        let Some(spec) = self.get(name) else {
            let hint = closest_name(name, self.specs.iter().map(|s| s.name.as_str()))
                .map_or_else(String::new, |s| format!("; did you mean `{s}`?"));
            return Err(ScaffoldError::invalid_parameter(
                name,
                format!("unknown parameter{hint}"),
            ));
        };
        spec.validate(value)
    }

    /// Checks that `set` declares exactly the schema's parameters with valid values.
    pub fn validate_set(&self, set: &ParameterSet) -> ScaffoldResult<()> {
        for (name, value) in set.iter() {
            self.validate(name, value)?;
        }
        if let Some(missing) = self.specs.iter().find(|s| set.get(&s.name).is_none()) {
            return Err(ScaffoldError::invalid_parameter(
                &missing.name,
                format!("missing from parameter set `{}`", set.name),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> ParameterSchema {
        ParameterSchema::new(vec![
            ParameterSpec::integer("Number of elements").min(1.0).max(100.0),
            ParameterSpec::real("Length").min(0.0),
            ParameterSpec::text("Mode", &["Arithmetic", "Harmonic"]),
            ParameterSpec::new("Counts", ParameterKind::IntegerList)
                .min(1.0)
                .length(1, 3),
        ])
    }

    #[test]
    fn validates_ranges_and_kinds() {
        let schema = schema();
        assert!(schema.validate("Number of elements", &ParameterValue::Integer(4)).is_ok());
        assert!(schema.validate("Number of elements", &ParameterValue::Integer(0)).is_err());
        assert!(schema.validate("Length", &ParameterValue::Integer(2)).is_ok());
        assert!(schema.validate("Length", &ParameterValue::Real(f64::NAN)).is_err());
        assert!(schema.validate("Mode", &"Geometric".into()).is_err());
        assert!(schema.validate("Counts", &ParameterValue::IntegerList(vec![1, 2, 3, 4])).is_err());
        assert!(schema.validate("Counts", &ParameterValue::IntegerList(vec![2, 2])).is_ok());
        assert!(schema.validate("Number of elements", &ParameterValue::Boolean(true)).is_err());
    }

    #[test]
    fn unknown_name_suggests_closest() {
        let err = schema()
            .validate("Number of element", &ParameterValue::Integer(4))
            .unwrap_err();
        let ScaffoldError::InvalidParameter { reason, .. } = err else {
            panic!("expected InvalidParameter");
        };
        assert!(reason.contains("did you mean `Number of elements`"), "{reason}");
    }

    #[test]
    fn validate_set_requires_every_parameter() {
        let set = ParameterSet::new("Default").with("Number of elements", 3_i64);
        assert!(schema().validate_set(&set).is_err());
    }
}
