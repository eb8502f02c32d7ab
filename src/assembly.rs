//! Global stiffness assembly
//!
//! Element contributions are collected as coordinate triplets and summed
//! into a compressed sparse column matrix. Stiffness matrices of CST meshes
//! have at most a few dozen non-zeros per row, so the dense `2N x 2N` matrix
//! is never formed.

use indicatif::ProgressBar;
use log::info;
use nalgebra::{DVector, Matrix3};
use nalgebra_sparse::{CooMatrix, CscMatrix};

use crate::{
    datatypes::Mesh,
    element::{Element, Triplet},
    error::{FemError, FemResult},
};

/// Accumulates stiffness contributions in coordinate form
pub struct StiffnessAssembler {
    size: usize,
    triplets: Vec<Triplet>,
}

impl StiffnessAssembler {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            triplets: Vec::new(),
        }
    }

    /// Reserves space for the 36 entries of each of `elements` triangles
    pub fn with_elements(size: usize, elements: usize) -> Self {
        Self {
            size,
            triplets: Vec::with_capacity(36 * elements),
        }
    }

    /// Adds a value. Entries at the same coordinate are summed on build;
    /// zeros are kept so the sparsity pattern is complete.
    pub fn add(&mut self, row: usize, col: usize, value: f64) -> FemResult<()> {
        if row >= self.size || col >= self.size {
            return Err(FemError::Solver(format!(
                "stiffness entry ({row}, {col}) lies outside the {0}x{0} system",
                self.size
            )));
        }
        self.triplets.push((row, col, value));
        Ok(())
    }

    pub fn extend(&mut self, triplets: &[Triplet]) -> FemResult<()> {
        for &(row, col, value) in triplets {
            self.add(row, col, value)?;
        }
        Ok(())
    }

    /// Sums duplicate coordinates into a CSC matrix
    pub fn to_csc(&self) -> CscMatrix<f64> {
        let mut coo = CooMatrix::new(self.size, self.size);

        for &(row, col, value) in &self.triplets {
            coo.push(row, col, value);
        }

        CscMatrix::from(&coo)
    }
}

/// Builds every element stiffness matrix and sums them into the global matrix
///
/// # Arguments
/// * `mesh` - The node coordinates
/// * `elements` - The elements; each one caches its strain-displacement matrix
/// * `elasticity` - The material's stress-strain matrix
/// * `thickness` - The thickness of the part
/// * `bar` - Progress bar advanced once per element
///
/// # Returns
/// The symmetric `2N x 2N` stiffness matrix, before constraints
pub fn assemble_stiffness(
    mesh: &Mesh,
    elements: &mut [Element],
    elasticity: &Matrix3<f64>,
    thickness: f64,
    bar: &ProgressBar,
) -> FemResult<CscMatrix<f64>> {
    let mut assembler = StiffnessAssembler::with_elements(mesh.dof_count(), elements.len());
    let mut triplets: Vec<Triplet> = Vec::with_capacity(36);

    for (i, element) in elements.iter_mut().enumerate() {
        let stiffness = element
            .compute_stiffness_matrix(mesh, elasticity, thickness)
            .map_err(|err| match err {
                FemError::Geometry(msg) => FemError::Geometry(format!("element {i}: {msg}")),
                other => other,
            })?;

        triplets.clear();
        element.scatter(&stiffness, &mut triplets);
        assembler.extend(&triplets)?;

        bar.inc(1);
    }
    bar.finish_and_clear();

    let total_stiffness_matrix = assembler.to_csc();
    info!(
        "built {0}x{0} stiffness matrix with {1} stored entries",
        total_stiffness_matrix.nrows(),
        total_stiffness_matrix.nnz()
    );

    Ok(total_stiffness_matrix)
}

/// Sparse matrix-vector product `K x`
pub fn multiply(matrix: &CscMatrix<f64>, x: &[f64]) -> DVector<f64> {
    let mut product = DVector::zeros(matrix.nrows());

    for (col, column) in matrix.col_iter().enumerate() {
        let xc = x[col];
        if xc == 0.0 {
            continue;
        }
        for (row, value) in column.row_indices().iter().zip(column.values()) {
            product[*row] += value * xc;
        }
    }

    product
}
