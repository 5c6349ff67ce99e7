//! Regular tensor-product lattices of nodes and elements.

use super::GenerationContext;
use crate::error::ScaffoldResult;
use crate::field::{ElementBasis, Field, ValueLabel};
use crate::mesh::{Domain, ElementId, NodeId, Shape};

/// Elements per axis of a structured block; node and element ids are
/// 1-based and lexicographic with the first axis varying fastest.
#[derive(Debug, Clone)]
pub(crate) struct TensorLattice {
    counts: Vec<usize>,
}

impl TensorLattice {
    pub(crate) fn new(counts: &[usize]) -> Self {
        Self {
            counts: counts.to_vec(),
        }
    }

    pub(crate) fn dimension(&self) -> usize {
        self.counts.len()
    }

    fn shape(&self) -> Shape {
        match self.dimension() {
            1 => Shape::Line,
            2 => Shape::Square,
            _ => Shape::Cube,
        }
    }

    pub(crate) fn node_id(&self, index: &[usize]) -> NodeId {
        let mut id = 0;
        let mut stride = 1;
        for (i, n) in index.iter().zip(&self.counts) {
            id += i * stride;
            stride *= n + 1;
        }
        NodeId(u32::try_from(id + 1).unwrap_or(u32::MAX))
    }

    pub(crate) fn element_id(&self, cell: &[usize]) -> ElementId {
        let mut id = 0;
        let mut stride = 1;
        for (i, n) in cell.iter().zip(&self.counts) {
            id += i * stride;
            stride *= n;
        }
        ElementId(u32::try_from(id + 1).unwrap_or(u32::MAX))
    }

    /// Every lattice node index, in id order.
    pub(crate) fn node_indices(&self) -> Vec<Vec<usize>> {
        product(&self.counts.iter().map(|n| n + 1).collect::<Vec<_>>())
    }

    /// Every cell index, in id order.
    pub(crate) fn cells(&self) -> Vec<Vec<usize>> {
        product(&self.counts)
    }

    /// Corner nodes of `cell` in local lexicographic order.
    pub(crate) fn element_nodes(&self, cell: &[usize]) -> Vec<NodeId> {
        product(&vec![2; self.dimension()])
            .into_iter()
            .map(|offset| {
                let index: Vec<usize> = cell.iter().zip(&offset).map(|(c, o)| c + o).collect();
                self.node_id(&index)
            })
            .collect()
    }

    /// Domain of cubic Hermite elements over the lattice.
    pub(crate) fn build_domain(&self, ctx: &mut GenerationContext<'_>) -> ScaffoldResult<Domain> {
        let shape = self.shape();
        let mut domain = Domain::new(self.dimension())?;
        for index in self.node_indices() {
            domain.add_node(self.node_id(&index))?;
        }
        for cell in self.cells() {
            ctx.checkpoint()?;
            domain.add_element(
                self.element_id(&cell),
                shape,
                self.element_nodes(&cell),
                ElementBasis::cubic_hermite(shape),
            )?;
        }
        domain.define_faces();
        Ok(domain)
    }

    /// Fraction of the way along each axis for a node index.
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn unit_position(&self, index: &[usize]) -> Vec<f64> {
        index
            .iter()
            .zip(&self.counts)
            .map(|(i, n)| *i as f64 / *n as f64)
            .collect()
    }

    /// Multilinear field of the unit-cube position, on a linear basis
    /// overriding the elements' own.
    pub(crate) fn material_field(&self, field: &mut Field, domain: &Domain) -> ScaffoldResult<()> {
        for index in self.node_indices() {
            field.set_parameter(self.node_id(&index), ValueLabel::Value, self.unit_position(&index))?;
        }
        for element in domain.elements() {
            field.set_element_basis(element.id, ElementBasis::linear(element.shape));
        }
        Ok(())
    }
}

/// Cartesian product `0..bounds[0] x 0..bounds[1] x ...`, first axis fastest.
fn product(bounds: &[usize]) -> Vec<Vec<usize>> {
    let mut out: Vec<Vec<usize>> = vec![Vec::new()];
    for bound in bounds {
        out = (0..*bound)
            .flat_map(|i| {
                out.iter().map(move |prefix| {
                    let mut index = prefix.clone();
                    index.push(i);
                    index
                })
            })
            .collect();
    }
    out
}
