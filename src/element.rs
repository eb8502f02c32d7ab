use log::debug;
use nalgebra::{Matrix3, SMatrix};

use crate::{
    datatypes::{Mesh, DOF},
    error::{FemError, FemResult},
};

/// |det(C)| below this fraction of the squared longest edge is degenerate
pub const GEOMETRY_TOLERANCE: f64 = 1e-12;

/// A (row, col, value) contribution to the global stiffness matrix
pub type Triplet = (usize, usize, f64);

/// Constant-strain triangle
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub nodes: [usize; 3],
    strain_displacement: Option<SMatrix<f64, 3, 6>>,
}

impl Element {
    pub fn new(nodes: [usize; 3]) -> Element {
        Element {
            nodes,
            strain_displacement: None,
        }
    }

    /// Global indices of the six element DOFs, in local order
    pub fn global_dofs(&self) -> [usize; 6] {
        let [n0, n1, n2] = self.nodes;
        [
            DOF * n0,
            DOF * n0 + 1,
            DOF * n1,
            DOF * n1 + 1,
            DOF * n2,
            DOF * n2 + 1,
        ]
    }

    /// The strain-displacement matrix cached by [`Element::compute_stiffness_matrix`]
    pub fn strain_displacement_matrix(&self) -> FemResult<&SMatrix<f64, 3, 6>> {
        self.strain_displacement.as_ref().ok_or_else(|| {
            FemError::Solver(format!(
                "element {:?} has no strain-displacement matrix; stiffness was never computed",
                self.nodes
            ))
        })
    }

    /// Computes the 6x6 element stiffness matrix and caches B on the element
    ///
    /// # Arguments
    /// * `mesh` - The node coordinates
    /// * `elasticity` - The material's stress-strain matrix
    /// * `thickness` - The thickness of the part
    pub fn compute_stiffness_matrix(
        &mut self,
        mesh: &Mesh,
        elasticity: &Matrix3<f64>,
        thickness: f64,
    ) -> FemResult<SMatrix<f64, 6, 6>> {
        let v0 = mesh.vertex(self.nodes[0])?;
        let v1 = mesh.vertex(self.nodes[1])?;
        let v2 = mesh.vertex(self.nodes[2])?;

        let c = Matrix3::new(
            1.0, v0.x, v0.y, //
            1.0, v1.x, v1.y, //
            1.0, v2.x, v2.y,
        );

        let det_c = c.determinant();
        let longest_edge_sq = [(v0, v1), (v1, v2), (v2, v0)]
            .iter()
            .map(|(a, b)| f64::powi(a.x - b.x, 2) + f64::powi(a.y - b.y, 2))
            .fold(0.0, f64::max);

        if !det_c.is_finite() || det_c.abs() <= GEOMETRY_TOLERANCE * longest_edge_sq {
            return Err(FemError::Geometry(format!(
                "element {:?} is degenerate (det C = {det_c:e}); its nodes are collinear or coincident",
                self.nodes
            )));
        }
        if det_c < 0.0 {
            debug!("element {:?} is ordered clockwise", self.nodes);
        }

        let inverse_c = c.try_inverse().ok_or_else(|| {
            FemError::Geometry(format!(
                "element {:?} has a singular coordinate matrix",
                self.nodes
            ))
        })?;

        let mut b: SMatrix<f64, 3, 6> = SMatrix::zeros();
        for i in 0..3 {
            b[(0, 2 * i)] = inverse_c[(1, i)];
            b[(1, 2 * i + 1)] = inverse_c[(2, i)];
            b[(2, 2 * i)] = inverse_c[(2, i)];
            b[(2, 2 * i + 1)] = inverse_c[(1, i)];
        }

        let element_area = det_c.abs() / 2.0;
        let stiffness = (b.transpose() * elasticity) * b * element_area * thickness;

        self.strain_displacement = Some(b);

        Ok(stiffness)
    }

    /// Appends the element's contributions, tagged with global indices
    pub fn scatter(&self, stiffness: &SMatrix<f64, 6, 6>, triplets: &mut Vec<Triplet>) {
        let dofs = self.global_dofs();

        for (local_row, global_row) in dofs.iter().enumerate() {
            for (local_col, global_col) in dofs.iter().enumerate() {
                triplets.push((
                    *global_row,
                    *global_col,
                    stiffness[(local_row, local_col)],
                ));
            }
        }
    }
}
