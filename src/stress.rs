use indicatif::ProgressBar;
use nalgebra::{DVector, Matrix3, SMatrix, Vector3};

use crate::{
    datatypes::DOF,
    element::Element,
    error::{FemError, FemResult},
};

/// Stress state of one constant-strain element
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElementStress {
    /// (σx, σy, τxy)
    pub sigma: Vector3<f64>,
    pub von_mises: f64,
}

impl Default for ElementStress {
    fn default() -> Self {
        ElementStress {
            sigma: Vector3::zeros(),
            von_mises: 0.0,
        }
    }
}

/// Equivalent von Mises stress of a plane stress state
pub fn von_mises(sigma: &Vector3<f64>) -> f64 {
    let (sx, sy, txy) = (sigma[0], sigma[1], sigma[2]);
    f64::sqrt(sx * sx - sx * sy + sy * sy + 3.0 * txy * txy)
}

/// Calculates the stress in an element
///
/// # Arguments
/// * `element` - An element whose stiffness has been computed
/// * `elasticity` - The material's stress-strain matrix
/// * `displacements` - The global displacement solution
pub fn compute_element_stress(
    element: &Element,
    elasticity: &Matrix3<f64>,
    displacements: &DVector<f64>,
) -> FemResult<ElementStress> {
    let dofs = element.global_dofs();
    if let Some(dof) = dofs.iter().find(|dof| **dof >= displacements.nrows()) {
        return Err(FemError::Solver(format!(
            "element {:?} refers to DOF {dof} outside the displacement vector of length {}",
            element.nodes,
            displacements.nrows()
        )));
    }

    let delta: SMatrix<f64, { DOF * 3 }, 1> = SMatrix::from(dofs.map(|dof| displacements[dof]));

    let sigma = elasticity * element.strain_displacement_matrix()? * delta;

    Ok(ElementStress {
        sigma,
        von_mises: von_mises(&sigma),
    })
}

/// Recovers the stress of every element, in element order
pub fn recover_stresses(
    elements: &[Element],
    elasticity: &Matrix3<f64>,
    displacements: &DVector<f64>,
    bar: &ProgressBar,
) -> FemResult<Vec<ElementStress>> {
    let mut stresses = vec![ElementStress::default(); elements.len()];

    for (i, element) in elements.iter().enumerate() {
        stresses[i] = compute_element_stress(element, elasticity, displacements)?;
        bar.inc(1);
    }
    bar.finish_and_clear();

    Ok(stresses)
}
