//! Canonical keys for refinement lattice points.
//!
//! A lattice point on a base node, line or face is keyed by that entity in a
//! frame independent of the element it was reached from, so neighbouring
//! elements refined with the same counts produce the same key. Lines are
//! ordered from the lower node id; faces start at their lowest corner id and
//! run first toward the lower-id neighbour. Counts are part of the key, so
//! mismatched counts give distinct, non-conformant points.

use crate::mesh::{Element, ElementId, NodeId};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) enum LatticeKey {
    Node(NodeId),
    Line {
        lo: NodeId,
        hi: NodeId,
        count: usize,
        index: usize,
    },
    Face {
        origin: NodeId,
        first: NodeId,
        second: NodeId,
        counts: [usize; 2],
        index: [usize; 2],
    },
    Interior {
        element: ElementId,
        index: [usize; 3],
    },
}

/// Base line or face a shared lattice point lies on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) enum SharedEntity {
    Line(NodeId, NodeId),
    Face(Vec<NodeId>),
}

/// Lattice points strictly inside a shared entity refined with `signature`.
pub(crate) fn interior_points(signature: &[usize]) -> usize {
    signature.iter().map(|n| n.saturating_sub(1)).product()
}

/// A classified lattice point: its key, and for points inside a base line
/// or face, that entity with the count signature used on it.
pub(crate) struct Classified {
    pub key: LatticeKey,
    pub shared: Option<(SharedEntity, Vec<usize>)>,
}

pub(crate) fn classify(element: &Element, counts: [usize; 3], index: [usize; 3]) -> Classified {
    let dim = element.dimension();
    let interior: Vec<usize> = (0..dim)
        .filter(|a| index[*a] > 0 && index[*a] < counts[*a])
        .collect();
    if interior.len() == dim {
        return Classified {
            key: LatticeKey::Interior {
                element: element.id,
                index,
            },
            shared: None,
        };
    }
    // corner of the sub-entity with every free axis at 0
    let base = (0..dim)
        .filter(|a| !interior.contains(a) && index[*a] == counts[*a])
        .fold(0, |corner, a| corner | (1 << a));
    let node = |corner: usize| element.nodes[corner];

    match interior.as_slice() {
        [] => Classified {
            key: LatticeKey::Node(node(base)),
            shared: None,
        },
        [a] => {
            let (n0, n1) = (node(base), node(base | (1 << a)));
            let (m, t) = (counts[*a], index[*a]);
            if n0 == n1 {
                return Classified {
                    key: LatticeKey::Node(n0),
                    shared: None,
                };
            }
            let (lo, hi, t) = if n0 < n1 { (n0, n1, t) } else { (n1, n0, m - t) };
            Classified {
                key: LatticeKey::Line {
                    lo,
                    hi,
                    count: m,
                    index: t,
                },
                shared: Some((SharedEntity::Line(lo, hi), vec![m])),
            }
        }
        [a, b, ..] => {
            let q = |ua: usize, ub: usize| node(base | (ua << a) | (ub << b));
            let (oa, ob) = [(0, 0), (1, 0), (0, 1), (1, 1)]
                .into_iter()
                .min_by_key(|(ua, ub)| q(*ua, *ub))
                .unwrap_or((0, 0));
            let sa = if oa == 0 { index[*a] } else { counts[*a] - index[*a] };
            let sb = if ob == 0 { index[*b] } else { counts[*b] - index[*b] };
            let (nbr_a, nbr_b) = (q(1 - oa, ob), q(oa, 1 - ob));
            let (first, second, face_counts, face_index) = if nbr_a <= nbr_b {
                (nbr_a, nbr_b, [counts[*a], counts[*b]], [sa, sb])
            } else {
                (nbr_b, nbr_a, [counts[*b], counts[*a]], [sb, sa])
            };
            let mut corners = vec![q(0, 0), q(1, 0), q(0, 1), q(1, 1)];
            corners.sort_unstable();
            corners.dedup();
            Classified {
                key: LatticeKey::Face {
                    origin: q(oa, ob),
                    first,
                    second,
                    counts: face_counts,
                    index: face_index,
                },
                shared: Some((SharedEntity::Face(corners), face_counts.to_vec())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::ElementBasis;
    use crate::mesh::Shape;

    fn cube(id: u32, nodes: [u32; 8]) -> Element {
        Element {
            id: ElementId(id),
            shape: Shape::Cube,
            nodes: nodes.iter().map(|n| NodeId(*n)).collect(),
            basis: ElementBasis::linear(Shape::Cube),
        }
    }

    #[test]
    fn shared_face_points_match_across_elements() {
        // two cubes stacked along xi1, sharing nodes 2,4,6,8
        let left = cube(1, [1, 2, 3, 4, 5, 6, 7, 8]);
        let right = cube(2, [2, 9, 4, 10, 6, 11, 8, 12]);
        let counts = [2, 3, 4];
        let a = classify(&left, counts, [2, 1, 3]);
        let b = classify(&right, counts, [0, 1, 3]);
        assert_eq!(a.key, b.key);
        assert!(matches!(a.key, LatticeKey::Face { .. }));

        let mismatched = classify(&right, [2, 2, 4], [0, 1, 3]);
        assert_ne!(a.key, mismatched.key);
    }

    #[test]
    fn line_points_are_ordered_from_lower_node() {
        let left = cube(1, [1, 2, 3, 4, 5, 6, 7, 8]);
        let reversed = cube(2, [2, 1, 4, 3, 6, 5, 8, 7]);
        let a = classify(&left, [3, 1, 1], [1, 0, 0]);
        let b = classify(&reversed, [3, 1, 1], [2, 0, 0]);
        assert_eq!(a.key, b.key);
        assert_eq!(classify(&left, [3, 1, 1], [0, 0, 0]).key, LatticeKey::Node(NodeId(1)));
        assert!(matches!(
            classify(&left, [2, 2, 2], [1, 1, 1]).key,
            LatticeKey::Interior { .. }
        ));
    }
}
