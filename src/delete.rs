//! Deletion set: element identifiers excluded from the output.

use serde::{Deserialize, Serialize};

use crate::error::ScaffoldResult;
use crate::mesh::{Domain, ElementId, format_spans, merge_spans, parse_ranges};

/// Element identifiers hidden from output, held as sorted disjoint inclusive
/// spans. Kept verbatim across regenerations; identifiers absent from the
/// current domain are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionSet {
    spans: Vec<(u32, u32)>,
}

impl DeletionSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses identifier range text such as `1-3,7`.
    pub fn from_ranges_text(text: &str) -> ScaffoldResult<Self> {
        Ok(Self {
            spans: parse_ranges(text)?,
        })
    }

    #[must_use]
    pub fn ranges_text(&self) -> String {
        format_spans(&self.spans)
    }

    pub fn delete(&mut self, ids: impl IntoIterator<Item = ElementId>) {
        let added = ids.into_iter().map(|id| (id.get(), id.get()));
        self.spans = merge_spans(self.spans.iter().copied().chain(added));
    }

    pub fn restore(&mut self, ids: impl IntoIterator<Item = ElementId>) {
        for id in ids {
            self.remove(id.get());
        }
    }

    fn remove(&mut self, id: u32) {
        let index = self.spans.partition_point(|&(_, stop)| stop < id);
        let Some(&(start, stop)) = self.spans.get(index) else {
            return;
        };
        if id < start {
            return;
        }
        let mut pieces = Vec::with_capacity(2);
        if start < id {
            pieces.push((start, id - 1));
        }
        if id < stop {
            pieces.push((id + 1, stop));
        }
        self.spans.splice(index..=index, pieces);
    }

    #[must_use]
    pub fn contains(&self, id: ElementId) -> bool {
        let id = id.get();
        let index = self.spans.partition_point(|&(_, stop)| stop < id);
        self.spans.get(index).is_some_and(|&(start, _)| start <= id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Number of hidden identifiers, saturating at `usize::MAX`.
    #[must_use]
    pub fn len(&self) -> usize {
        self.spans
            .iter()
            .map(|&(start, stop)| usize::try_from(stop - start).map_or(usize::MAX, |n| n.saturating_add(1)))
            .fold(0, usize::saturating_add)
    }

    pub fn iter(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.spans
            .iter()
            .flat_map(|&(start, stop)| (start..=stop).map(ElementId))
    }

    /// The visible part of `domain`: kept elements and the faces, lines and
    /// nodes they use, with identifiers unchanged.
    #[must_use]
    pub fn apply(&self, domain: &Domain) -> Domain {
        domain.filtered(|e| !self.contains(e.id))
    }

    /// Deletion set hiding exactly the elements of `domain` this one keeps.
    #[must_use]
    pub fn complement(&self, domain: &Domain) -> Self {
        Self {
            spans: merge_spans(
                domain
                    .elements()
                    .map(|e| e.id)
                    .filter(|id| !self.contains(*id))
                    .map(|id| (id.get(), id.get())),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::ElementBasis;
    use crate::mesh::{NodeId, Shape};

    fn strip(elements: u32) -> Domain {
        let mut domain = Domain::new(2).unwrap();
        for id in 1..=2 * (elements + 1) {
            domain.add_node(NodeId(id)).unwrap();
        }
        let row = elements + 1;
        for e in 1..=elements {
            domain
                .add_element(
                    ElementId(e),
                    Shape::Square,
                    vec![NodeId(e), NodeId(e + 1), NodeId(e + row), NodeId(e + row + 1)],
                    ElementBasis::linear(Shape::Square),
                )
                .unwrap();
        }
        domain.define_faces();
        domain
    }

    #[test]
    fn ranges_text_round_trips() {
        let set = DeletionSet::from_ranges_text("7, 3-1").unwrap();
        assert_eq!(set.ranges_text(), "1-3,7");
        assert_eq!(set.len(), 4);
    }

    #[test]
    fn restore_splits_spans() {
        let mut set = DeletionSet::from_ranges_text("1-5").unwrap();
        set.restore([ElementId(3), ElementId(1), ElementId(9)]);
        assert_eq!(set.ranges_text(), "2,4-5");
        set.delete([ElementId(3), ElementId(6)]);
        assert_eq!(set.ranges_text(), "2-6");
        assert!(set.contains(ElementId(6)));
        assert!(!set.contains(ElementId(1)));
        assert_eq!(set.iter().collect::<Vec<_>>().len(), 5);
    }

    #[test]
    fn huge_and_extreme_ranges_are_cheap() {
        let mut set = DeletionSet::from_ranges_text("1-4000000000").unwrap();
        assert_eq!(set.len(), 4_000_000_000);
        assert!(set.contains(ElementId(3_999_999_999)));
        assert!(!set.contains(ElementId(4_000_000_001)));
        assert_eq!(set.apply(&strip(4)).element_count(), 0);

        set.delete([ElementId(u32::MAX), ElementId(u32::MAX - 1)]);
        assert_eq!(set.ranges_text(), "1-4000000000,4294967294-4294967295");
        set.restore([ElementId(u32::MAX)]);
        assert_eq!(set.ranges_text(), "1-4000000000,4294967294");
    }

    #[test]
    fn apply_keeps_identifiers_and_high_water() {
        let domain = strip(4);
        let mut set = DeletionSet::new();
        set.delete([ElementId(2), ElementId(9)]);
        let visible = set.apply(&domain);
        assert_eq!(visible.element_count(), 3);
        assert!(!visible.contains_element(ElementId(2)));
        assert!(visible.contains_node(NodeId(2)));
        assert_eq!(visible.element_high_water(), 4);
        assert_eq!(visible.node_high_water(), domain.node_high_water());
    }

    #[test]
    fn complement_union_restores_domain() {
        let domain = strip(4);
        let set = DeletionSet::from_ranges_text("2-3").unwrap();
        let merged = set.apply(&domain).union(&set.complement(&domain).apply(&domain)).unwrap();
        assert_eq!(merged.topology_fingerprint(), domain.topology_fingerprint());
        assert_eq!(merged.node_count(), domain.node_count());
        assert_eq!(merged.lines().count(), domain.lines().count());
    }
}
