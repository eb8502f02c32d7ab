//! Zero-displacement boundary conditions
//!
//! A constrained DOF keeps its row and column in the system; every stored
//! entry on them is zeroed and the diagonal set to one. The matrix stays
//! symmetric and the displacement vector keeps its indexing.

use log::{debug, warn};
use nalgebra::{DVector, Matrix3, Vector3};
use nalgebra_sparse::{CooMatrix, CscMatrix};

use crate::{
    datatypes::{dof_index, dof_owner, Axis, Constraint, Mesh},
    element::Element,
    error::{FemError, FemResult},
};

/// Smallest-to-largest eigenvalue ratio of a group's constraint moments
/// below which a rigid-body motion is left free
pub const RIGID_BODY_TOLERANCE: f64 = 1e-10;

/// Bit-mask over the global DOFs marking the fixed ones
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstrainedDofs {
    mask: Vec<bool>,
}

impl ConstrainedDofs {
    pub fn new(dof_count: usize) -> ConstrainedDofs {
        ConstrainedDofs {
            mask: vec![false; dof_count],
        }
    }

    /// Union of the masks of every constraint
    pub fn from_constraints(
        constraints: &[Constraint],
        dof_count: usize,
    ) -> FemResult<ConstrainedDofs> {
        let mut dofs = ConstrainedDofs::new(dof_count);
        for constraint in constraints {
            for index in constraint.dof_indices() {
                dofs.insert(index)?;
            }
        }
        Ok(dofs)
    }

    pub fn insert(&mut self, index: usize) -> FemResult<()> {
        match self.mask.get_mut(index) {
            Some(flag) => {
                *flag = true;
                Ok(())
            }
            None => Err(FemError::Parse(format!(
                "constraint on DOF {index} outside a system of size {}",
                self.mask.len()
            ))),
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.mask.get(index).copied().unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.mask.iter().filter(|fixed| **fixed).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.mask.iter().any(|fixed| *fixed)
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.mask
            .iter()
            .enumerate()
            .filter(|(_, fixed)| **fixed)
            .map(|(index, _)| index)
    }
}

/// Disjoint sets of nodes joined by elements. The root of a set is its
/// smallest node.
struct NodeGroups {
    parent: Vec<usize>,
}

impl NodeGroups {
    fn new(nodes_count: usize) -> NodeGroups {
        NodeGroups {
            parent: (0..nodes_count).collect(),
        }
    }

    fn find(&mut self, node: usize) -> usize {
        let mut root = node;
        while self.parent[root] != root {
            root = self.parent[root];
        }

        // path compression
        let mut current = node;
        while self.parent[current] != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }

        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let (root_a, root_b) = (self.find(a), self.find(b));
        if root_a != root_b {
            self.parent[root_a.max(root_b)] = root_a.min(root_b);
        }
    }
}

/// Rejects models in which a connected part of the mesh can still move
/// without deforming
///
/// Every group of nodes joined by elements must have its x translation,
/// y translation and rotation blocked by its fixed DOFs. Nodes outside every
/// element are left to the solver, which reports their missing stiffness.
pub fn check_rigid_body_modes(
    mesh: &Mesh,
    elements: &[Element],
    constrained: &ConstrainedDofs,
) -> FemResult<()> {
    let nodes_count = mesh.nodes_count();
    let mut groups = NodeGroups::new(nodes_count);
    let mut in_element = vec![false; nodes_count];

    for element in elements {
        for &node in &element.nodes {
            mesh.vertex(node)?;
            in_element[node] = true;
        }
        groups.union(element.nodes[0], element.nodes[1]);
        groups.union(element.nodes[0], element.nodes[2]);
    }

    let mut members: Vec<Vec<usize>> = vec![Vec::new(); nodes_count];
    for node in (0..nodes_count).filter(|node| in_element[*node]) {
        let root = groups.find(node);
        members[root].push(node);
    }

    for (root, nodes) in members.iter().enumerate().filter(|(_, nodes)| !nodes.is_empty()) {
        let count = nodes.len() as f64;
        let (mut cx, mut cy) = (0.0, 0.0);
        for &node in nodes {
            let vertex = mesh.vertex(node)?;
            cx += vertex.x / count;
            cy += vertex.y / count;
        }
        let mut radius: f64 = 0.0;
        for &node in nodes {
            let vertex = mesh.vertex(node)?;
            radius = radius.max((vertex.x - cx).hypot(vertex.y - cy));
        }
        if radius == 0.0 {
            radius = 1.0;
        }

        // each fixed DOF blocks (x translation, y translation, rotation)
        // in proportion to its row here
        let mut moments: Matrix3<f64> = Matrix3::zeros();
        for &node in nodes {
            let vertex = mesh.vertex(node)?;
            let (dx, dy) = ((vertex.x - cx) / radius, (vertex.y - cy) / radius);

            for axis in [Axis::X, Axis::Y] {
                if !constrained.contains(dof_index(node, axis)) {
                    continue;
                }
                let row = match axis {
                    Axis::X => Vector3::new(1.0, 0.0, -dy),
                    Axis::Y => Vector3::new(0.0, 1.0, dx),
                };
                moments += row * row.transpose();
            }
        }

        let eigenvalues = moments.symmetric_eigenvalues();
        let (smallest, largest) = (eigenvalues.min(), eigenvalues.max());
        debug!(
            "node group of {} (node {root}): constraint eigenvalues {smallest:e} to {largest:e}",
            nodes.len()
        );

        if !(smallest > RIGID_BODY_TOLERANCE * largest) {
            return Err(FemError::Solver(format!(
                "the {} nodes connected to node {root} can move as a rigid body; \
                 add constraints to remove rigid-body motion",
                nodes.len()
            )));
        }
    }

    Ok(())
}

/// Returns a copy of `stiffness` with the constrained rows and columns replaced
///
/// The sparsity pattern is unchanged: entries on a constrained row or column
/// become 0.0, and become 1.0 on the diagonal.
pub fn apply_constraints(stiffness: &CscMatrix<f64>, constrained: &ConstrainedDofs) -> CscMatrix<f64> {
    let mut coo = CooMatrix::new(stiffness.nrows(), stiffness.ncols());

    for (row, col, value) in stiffness.triplet_iter() {
        let value = if constrained.contains(row) || constrained.contains(col) {
            if row == col {
                1.0
            } else {
                0.0
            }
        } else {
            *value
        };
        coo.push(row, col, value);
    }

    CscMatrix::from(&coo)
}

/// Zeroes the load entries at constrained DOFs
///
/// # Returns
/// The number of non-zero loads that were discarded
pub fn clear_constrained_loads(loads: &mut DVector<f64>, constrained: &ConstrainedDofs) -> usize {
    let mut discarded = 0;

    for index in constrained.iter() {
        if loads[index] != 0.0 {
            let (node, axis) = dof_owner(index);
            warn!(
                "discarding {} load {} on node {node}: the DOF is fixed",
                axis.name(),
                loads[index]
            );
            loads[index] = 0.0;
            discarded += 1;
        }
    }

    discarded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::{ConstraintType, Vertex};

    fn square() -> (Mesh, Vec<Element>) {
        let mesh = Mesh::new(vec![
            Vertex { x: 0.0, y: 0.0 },
            Vertex { x: 1.0, y: 0.0 },
            Vertex { x: 1.0, y: 1.0 },
            Vertex { x: 0.0, y: 1.0 },
        ]);
        (mesh, vec![Element::new([0, 1, 2]), Element::new([0, 2, 3])])
    }

    fn fixed(constraints: &[Constraint], dof_count: usize) -> ConstrainedDofs {
        ConstrainedDofs::from_constraints(constraints, dof_count).unwrap()
    }

    fn stiffness() -> CscMatrix<f64> {
        let mut coo = CooMatrix::new(4, 4);
        #[rustfmt::skip]
        let dense = [
            [ 4.0, -1.0,  0.5,  0.0],
            [-1.0,  5.0, -2.0,  1.0],
            [ 0.5, -2.0,  6.0, -3.0],
            [ 0.0,  1.0, -3.0,  7.0],
        ];
        for (r, row) in dense.iter().enumerate() {
            for (c, v) in row.iter().enumerate() {
                if *v != 0.0 {
                    coo.push(r, c, *v);
                }
            }
        }
        CscMatrix::from(&coo)
    }

    fn entry(matrix: &CscMatrix<f64>, row: usize, col: usize) -> Option<f64> {
        matrix
            .triplet_iter()
            .find(|(r, c, _)| *r == row && *c == col)
            .map(|(_, _, v)| *v)
    }

    #[test]
    fn union_of_masks() {
        let constraints = [
            Constraint { node: 1, kind: ConstraintType::UX },
            Constraint { node: 1, kind: ConstraintType::UY },
            Constraint { node: 1, kind: ConstraintType::UXY },
            Constraint { node: 0, kind: ConstraintType::UY },
        ];
        let dofs = ConstrainedDofs::from_constraints(&constraints, 4).unwrap();
        assert_eq!(dofs.iter().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(dofs.len(), 3);

        let out_of_range = [Constraint { node: 2, kind: ConstraintType::UX }];
        assert!(ConstrainedDofs::from_constraints(&out_of_range, 4).is_err());
    }

    #[test]
    fn rows_and_columns_are_replaced() {
        let mut dofs = ConstrainedDofs::new(4);
        dofs.insert(1).unwrap();

        let k = apply_constraints(&stiffness(), &dofs);

        assert_eq!(entry(&k, 1, 1), Some(1.0));
        assert_eq!(entry(&k, 0, 1), Some(0.0));
        assert_eq!(entry(&k, 1, 0), Some(0.0));
        assert_eq!(entry(&k, 3, 1), Some(0.0));
        assert_eq!(entry(&k, 1, 2), Some(0.0));
        assert_eq!(entry(&k, 0, 0), Some(4.0));
        assert_eq!(entry(&k, 2, 3), Some(-3.0));
        // pattern and dimension are kept
        assert_eq!(k.nnz(), stiffness().nnz());
        assert_eq!(k.nrows(), 4);
        assert_eq!(entry(&k, 0, 3), None);
    }

    #[test]
    fn enforcement_is_idempotent_and_order_free() {
        let mut both = ConstrainedDofs::new(4);
        both.insert(0).unwrap();
        both.insert(2).unwrap();
        let once = apply_constraints(&stiffness(), &both);
        let twice = apply_constraints(&once, &both);
        assert_eq!(once, twice);

        let mut first = ConstrainedDofs::new(4);
        first.insert(0).unwrap();
        let mut second = ConstrainedDofs::new(4);
        second.insert(2).unwrap();
        let a = apply_constraints(&apply_constraints(&stiffness(), &first), &second);
        let b = apply_constraints(&apply_constraints(&stiffness(), &second), &first);
        assert_eq!(a, b);
        assert_eq!(a, once);
    }

    #[test]
    fn constrained_loads_are_cleared() {
        let mut dofs = ConstrainedDofs::new(4);
        dofs.insert(1).unwrap();
        dofs.insert(2).unwrap();

        let mut loads = DVector::from_vec(vec![1.0, 2.0, 0.0, 4.0]);
        let discarded = clear_constrained_loads(&mut loads, &dofs);
        assert_eq!(discarded, 1);
        assert_eq!(loads.as_slice(), &[1.0, 0.0, 0.0, 4.0]);
    }

    #[test]
    fn pinned_and_roller_blocks_rigid_motion() {
        let (mesh, elements) = square();
        let constraints = [
            Constraint { node: 0, kind: ConstraintType::UXY },
            Constraint { node: 3, kind: ConstraintType::UX },
        ];
        check_rigid_body_modes(&mesh, &elements, &fixed(&constraints, 8)).unwrap();
    }

    #[test]
    fn free_rotation_is_rejected() {
        let (mesh, elements) = square();

        let unconstrained = check_rigid_body_modes(&mesh, &elements, &ConstrainedDofs::new(8));
        assert!(matches!(unconstrained, Err(FemError::Solver(_))));

        let pinned = [Constraint { node: 0, kind: ConstraintType::UXY }];
        let err = check_rigid_body_modes(&mesh, &elements, &fixed(&pinned, 8)).unwrap_err();
        assert!(err.to_string().contains("node 0"), "{err}");

        // a roller directly above the pin still lets the square turn about it
        let stacked = [
            Constraint { node: 0, kind: ConstraintType::UXY },
            Constraint { node: 3, kind: ConstraintType::UY },
        ];
        assert!(check_rigid_body_modes(&mesh, &elements, &fixed(&stacked, 8)).is_err());
    }

    #[test]
    fn each_part_needs_its_own_supports() {
        let mesh = Mesh::new(vec![
            Vertex { x: 0.0, y: 0.0 },
            Vertex { x: 1.0, y: 0.0 },
            Vertex { x: 0.0, y: 1.0 },
            Vertex { x: 5.0, y: 0.0 },
            Vertex { x: 6.0, y: 0.0 },
            Vertex { x: 5.0, y: 1.0 },
            Vertex { x: 9.0, y: 9.0 },
        ]);
        let elements = vec![Element::new([0, 1, 2]), Element::new([3, 4, 5])];
        let supports = [
            Constraint { node: 0, kind: ConstraintType::UXY },
            Constraint { node: 1, kind: ConstraintType::UXY },
        ];

        let err = check_rigid_body_modes(&mesh, &elements, &fixed(&supports, 14)).unwrap_err();
        assert!(err.to_string().contains("node 3"), "{err}");

        // node 6 belongs to no element and is not checked here
        let both = [
            Constraint { node: 0, kind: ConstraintType::UXY },
            Constraint { node: 1, kind: ConstraintType::UXY },
            Constraint { node: 3, kind: ConstraintType::UXY },
            Constraint { node: 4, kind: ConstraintType::UY },
        ];
        check_rigid_body_modes(&mesh, &elements, &fixed(&both, 14)).unwrap();
    }
}
