use nalgebra::{matrix, Matrix3};

/// Isotropic linear-elastic material under plane stress
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub poisson_ratio: f64,
    pub youngs_modulus: f64,
}

impl Material {
    pub fn new(poisson_ratio: f64, youngs_modulus: f64) -> Material {
        Material {
            poisson_ratio,
            youngs_modulus,
        }
    }

    /// Calculates the stress-strain (elasticity) matrix
    ///
    /// The constants are not validated here; `poisson_ratio` must lie in
    /// (-1, 1) for the result to be finite.
    ///
    /// # Returns
    /// A 3x3 matrix mapping (εx, εy, γxy) to (σx, σy, τxy)
    pub fn elasticity_matrix(&self) -> Matrix3<f64> {
        let nu = self.poisson_ratio;

        let mut stress_strain_mat: Matrix3<f64> = matrix![
            1.0, nu, 0.0;
            nu, 1.0, 0.0;
            0.0, 0.0, (1.0 - nu) / 2.0;
        ];

        stress_strain_mat *= self.youngs_modulus / (1.0 - f64::powi(nu, 2));

        stress_strain_mat
    }
}
