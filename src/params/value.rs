//! Typed generator parameter values and ordered parameter sets.

use serde::{Deserialize, Serialize};

use crate::error::{ScaffoldError, ScaffoldResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    Integer(i64),
    Real(f64),
    Boolean(bool),
    Text(String),
    IntegerList(Vec<i64>),
    RealList(Vec<f64>),
    /// Nested sub-scaffold generated within the parent's pass.
    Scaffold(Box<ScaffoldPackage>),
}

impl ParameterValue {
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::Boolean(_) => "boolean",
            Self::Text(_) => "text",
            Self::IntegerList(_) => "integer list",
            Self::RealList(_) => "real list",
            Self::Scaffold(_) => "scaffold",
        }
    }

    #[must_use]
    pub const fn as_integer(&self) -> Option<i64> {
        if let Self::Integer(v) = self {
            Some(*v)
        } else {
            None
        }
    }

    /// Reals, with integers widened.
    #[must_use]
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Self::Real(v) => Some(*v),
            #[allow(clippy::cast_precision_loss)]
            Self::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_boolean(&self) -> Option<bool> {
        if let Self::Boolean(v) = self {
            Some(*v)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let Self::Text(v) = self {
            Some(v.as_str())
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_scaffold(&self) -> Option<&ScaffoldPackage> {
        if let Self::Scaffold(v) = self {
            Some(&**v)
        } else {
            None
        }
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<ScaffoldPackage> for ParameterValue {
    fn from(value: ScaffoldPackage) -> Self {
        Self::Scaffold(Box::new(value))
    }
}

/// A sub-scaffold: its type, the set it was derived from and its resolved values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaffoldPackage {
    pub scaffold_type: String,
    pub parameter_set_name: String,
    pub parameters: ParameterSet,
}

/// Named, ordered mapping from parameter name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub name: String,
    values: Vec<(String, ParameterValue)>,
}

impl ParameterSet {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
        }
    }

    /// Builder form of [`ParameterSet::set`].
    #[must_use]
    pub fn with(mut self, name: &str, value: impl Into<ParameterValue>) -> Self {
        self.set(name, value.into());
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Replaces the value in place, or appends a new parameter.
    pub fn set(&mut self, name: &str, value: ParameterValue) {
        if let Some(slot) = self.values.iter_mut().find(|(n, _)| n == name) {
            slot.1 = value;
        } else {
            self.values.push((name.to_owned(), value));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParameterValue)> + '_ {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn require(&self, name: &str) -> ScaffoldResult<&ParameterValue> {
        self.get(name)
            .ok_or_else(|| ScaffoldError::invalid_parameter(name, "missing from parameter set"))
    }

    fn wrong_kind(name: &str, expected: &str, found: &ParameterValue) -> ScaffoldError {
        ScaffoldError::invalid_parameter(
            name,
            format!("expected {expected}, found {}", found.kind_name()),
        )
    }

    pub fn expect_integer(&self, name: &str) -> ScaffoldResult<i64> {
        let value = self.require(name)?;
        value
            .as_integer()
            .ok_or_else(|| Self::wrong_kind(name, "integer", value))
    }

    /// Integer parameter that must be at least 1, as a count.
    pub fn expect_count(&self, name: &str) -> ScaffoldResult<usize> {
        let value = self.expect_integer(name)?;
        usize::try_from(value)
            .ok()
            .filter(|v| *v >= 1)
            .ok_or_else(|| ScaffoldError::invalid_parameter(name, format!("{value} is not a positive count")))
    }

    pub fn expect_real(&self, name: &str) -> ScaffoldResult<f64> {
        let value = self.require(name)?;
        value
            .as_real()
            .ok_or_else(|| Self::wrong_kind(name, "real", value))
    }

    pub fn expect_boolean(&self, name: &str) -> ScaffoldResult<bool> {
        let value = self.require(name)?;
        value
            .as_boolean()
            .ok_or_else(|| Self::wrong_kind(name, "boolean", value))
    }

    pub fn expect_text(&self, name: &str) -> ScaffoldResult<&str> {
        let value = self.require(name)?;
        value
            .as_text()
            .ok_or_else(|| Self::wrong_kind(name, "text", value))
    }

    pub fn expect_scaffold(&self, name: &str) -> ScaffoldResult<&ScaffoldPackage> {
        let value = self.require(name)?;
        value
            .as_scaffold()
            .ok_or_else(|| Self::wrong_kind(name, "scaffold", value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_keeps_insertion_order() {
        let mut set = ParameterSet::new("Default")
            .with("Number of elements", 4_i64)
            .with("Length", 1.0);
        set.set("Number of elements", ParameterValue::Integer(2));
        let names: Vec<&str> = set.iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["Number of elements", "Length"]);
        assert_eq!(set.expect_integer("Number of elements").unwrap(), 2);
    }

    #[test]
    fn typed_accessors_report_kind_mismatch() {
        let set = ParameterSet::new("Default").with("Length", 1.5).with("Count", 0_i64);
        assert!((set.expect_real("Length").unwrap() - 1.5).abs() < 1e-12);
        assert!(matches!(
            set.expect_boolean("Length"),
            Err(ScaffoldError::InvalidParameter { .. })
        ));
        assert!(set.expect_count("Count").is_err());
        assert!(set.expect_text("Missing").is_err());
    }
}
