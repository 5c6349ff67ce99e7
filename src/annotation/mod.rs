//! Annotation registry: named groups of domain objects and markers.
//!
//! Built-in groups and markers come from the generator and are immutable;
//! user-defined ones are created, renamed and deleted through the registry
//! and re-checked against the domain after every regeneration.

mod export;
mod group;
mod marker;

use std::collections::BTreeMap;

pub use export::{AnnotationRow, MarkerRow};
pub use group::{AnnotationGroup, GroupKind, Membership, NO_TERM};
pub use marker::{MarkerLocationSpec, MaterialBinding, Marker};

use crate::error::{ScaffoldError, ScaffoldResult};
use crate::field::{FieldStore, InversionOptions};
use crate::mesh::{Domain, NodeId};

/// Groups and markers share one namespace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationRegistry {
    groups: BTreeMap<String, AnnotationGroup>,
    markers: BTreeMap<String, Marker>,
}

impl AnnotationRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(groups: Vec<AnnotationGroup>, markers: Vec<Marker>) -> Self {
        Self {
            groups: groups.into_iter().map(|g| (g.name.clone(), g)).collect(),
            markers: markers.into_iter().map(|m| (m.name.clone(), m)).collect(),
        }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.groups.contains_key(name) || self.markers.contains_key(name)
    }

    #[must_use]
    pub fn group(&self, name: &str) -> Option<&AnnotationGroup> {
        self.groups.get(name)
    }

    #[must_use]
    pub fn marker(&self, name: &str) -> Option<&Marker> {
        self.markers.get(name)
    }

    pub fn groups(&self) -> impl Iterator<Item = &AnnotationGroup> + '_ {
        self.groups.values()
    }

    pub fn markers(&self) -> impl Iterator<Item = &Marker> + '_ {
        self.markers.values()
    }

    #[must_use]
    pub fn user_groups(&self) -> Vec<AnnotationGroup> {
        self.groups.values().filter(|g| !g.is_builtin()).cloned().collect()
    }

    #[must_use]
    pub fn user_markers(&self) -> Vec<Marker> {
        self.markers.values().filter(|m| !m.is_builtin()).cloned().collect()
    }

    fn unique_name(&self, prefix: &str) -> String {
        (1..)
            .map(|i| format!("{prefix}{i}"))
            .find(|name| !self.contains(name))
            .unwrap_or_else(|| prefix.to_owned())
    }

    fn check_mutable(&self, name: &str) -> ScaffoldResult<()> {
        let builtin = match (self.groups.get(name), self.markers.get(name)) {
            (Some(group), _) => group.is_builtin(),
            (None, Some(marker)) => marker.is_builtin(),
            (None, None) => return Err(ScaffoldError::UnknownGroup(name.to_owned())),
        };
        if builtin {
            return Err(ScaffoldError::ImmutableGroup(name.to_owned()));
        }
        Ok(())
    }

    /// New user group from the highest-dimension objects of `selection`.
    pub fn create(&mut self, domain: &Domain, selection: &Membership) -> ScaffoldResult<String> {
        let name = self.unique_name("group");
        let group = AnnotationGroup::new(&name, GroupKind::UserDefined, domain, selection)?;
        log::debug!("created group `{name}` of dimension {}", group.dimension);
        self.groups.insert(name.clone(), group);
        Ok(name)
    }

    pub fn redefine(&mut self, name: &str, domain: &Domain, selection: &Membership) -> ScaffoldResult<()> {
        self.check_mutable(name)?;
        if self.markers.contains_key(name) {
            return Err(ScaffoldError::invalid_parameter(
                name,
                "a marker's membership cannot be redefined",
            ));
        }
        let (dimension, members) = selection.close(domain)?;
        if let Some(group) = self.groups.get_mut(name) {
            group.dimension = dimension;
            group.members = members;
        }
        Ok(())
    }

    pub fn rename(&mut self, name: &str, new_name: &str) -> ScaffoldResult<()> {
        self.check_mutable(name)?;
        if name == new_name {
            return Ok(());
        }
        if new_name.trim().is_empty() {
            return Err(ScaffoldError::invalid_parameter("group name", "name is empty"));
        }
        if self.contains(new_name) {
            return Err(ScaffoldError::DuplicateGroupName(new_name.to_owned()));
        }
        if let Some(mut group) = self.groups.remove(name) {
            new_name.clone_into(&mut group.name);
            self.groups.insert(new_name.to_owned(), group);
        } else if let Some(mut marker) = self.markers.remove(name) {
            new_name.clone_into(&mut marker.name);
            self.markers.insert(new_name.to_owned(), marker);
        }
        Ok(())
    }

    pub fn set_term(&mut self, name: &str, term: &str) -> ScaffoldResult<()> {
        self.check_mutable(name)?;
        let slot = match self.groups.get_mut(name) {
            Some(group) => &mut group.term,
            None => match self.markers.get_mut(name) {
                Some(marker) => &mut marker.term,
                None => return Err(ScaffoldError::UnknownGroup(name.to_owned())),
            },
        };
        term.clone_into(slot);
        Ok(())
    }

    pub fn delete(&mut self, name: &str) -> ScaffoldResult<()> {
        self.check_mutable(name)?;
        self.groups.remove(name);
        self.markers.remove(name);
        Ok(())
    }

    /// Node id for a new marker: past the domain and every existing marker.
    #[must_use]
    pub fn next_marker_node(&self, domain: &Domain) -> NodeId {
        let highest = self
            .markers
            .values()
            .map(|m| m.node.get())
            .max()
            .unwrap_or(0)
            .max(domain.node_high_water());
        NodeId(highest + 1)
    }

    /// Places a user marker; material specs are resolved by inversion.
    pub fn create_marker(
        &mut self,
        name: Option<&str>,
        spec: &MarkerLocationSpec,
        domain: &Domain,
        fields: &FieldStore,
        inversion: &InversionOptions,
    ) -> ScaffoldResult<String> {
        let name = match name {
            Some(name) if self.contains(name) => {
                return Err(ScaffoldError::DuplicateGroupName(name.to_owned()));
            }
            Some(name) if name.trim().is_empty() => {
                return Err(ScaffoldError::invalid_parameter("marker name", "name is empty"));
            }
            Some(name) => name.to_owned(),
            None => self.unique_name("marker"),
        };
        let node = self.next_marker_node(domain);
        let marker = Marker::user(&name, node, spec, domain, fields, inversion)?;
        log::debug!(
            "created marker `{name}` at element {} (node {node})",
            marker.location.element
        );
        self.markers.insert(name.clone(), marker);
        Ok(name)
    }

    /// Replaces the built-in groups and markers. A user annotation with the
    /// name of a built-in is dropped; the returned warnings say which.
    pub fn install_builtins(
        &mut self,
        groups: Vec<AnnotationGroup>,
        markers: Vec<Marker>,
        domain: &Domain,
    ) -> Vec<String> {
        self.groups.retain(|_, g| !g.is_builtin());
        self.markers.retain(|_, m| !m.is_builtin());
        let mut warnings = Vec::new();
        for group in groups {
            if self.groups.remove(&group.name).is_some() || self.markers.remove(&group.name).is_some() {
                warnings.push(format!("user annotation `{}` replaced by built-in group", group.name));
            }
            self.groups.insert(group.name.clone(), group);
        }
        for marker in markers {
            if self.groups.remove(&marker.name).is_some() || self.markers.remove(&marker.name).is_some() {
                warnings.push(format!("user annotation `{}` replaced by built-in marker", marker.name));
            }
            self.markers.insert(marker.name.clone(), marker);
        }
        self.renumber_markers(domain);
        warnings
    }

    /// Re-checks user annotations against a regenerated model, dropping
    /// those that no longer fit. Returns a warning per dropped annotation.
    pub fn retain_compatible(
        &mut self,
        domain: &Domain,
        fields: &FieldStore,
        inversion: &InversionOptions,
    ) -> Vec<String> {
        let mut warnings = Vec::new();
        let mut kept_groups = BTreeMap::new();
        for (name, group) in std::mem::take(&mut self.groups) {
            if group.is_builtin() {
                kept_groups.insert(name, group);
            } else if let Some(rebuilt) = group.rebuilt_for(domain) {
                kept_groups.insert(name, rebuilt);
            } else {
                warnings.push(format!("group `{name}` dropped: members no longer exist"));
            }
        }
        self.groups = kept_groups;

        let mut kept_markers = BTreeMap::new();
        for (name, mut marker) in std::mem::take(&mut self.markers) {
            if marker.is_builtin() {
                kept_markers.insert(name, marker);
                continue;
            }
            match marker::resolve_spec(&marker.spec(), domain, fields, inversion) {
                Ok((location, material)) => {
                    marker.location = location;
                    marker.material = material;
                    kept_markers.insert(name, marker);
                }
                Err(err) => warnings.push(format!("marker `{name}` dropped: {err}")),
            }
        }
        self.markers = kept_markers;
        self.renumber_markers(domain);

        for warning in &warnings {
            log::warn!("{warning}");
        }
        warnings
    }

    /// Gives markers consecutive node ids past the domain's high-water mark,
    /// keeping their relative order.
    pub(crate) fn renumber_markers(&mut self, domain: &Domain) {
        let mut order: Vec<(NodeId, String)> = self
            .markers
            .values()
            .map(|m| (m.node, m.name.clone()))
            .collect();
        order.sort();
        let mut next = domain.node_high_water();
        for (_, name) in order {
            if let Some(marker) = self.markers.get_mut(&name) {
                next += 1;
                marker.node = NodeId(next);
            }
        }
    }
}
