//! Plane stress finite element analysis with constant-strain triangles
//!
//! The pipeline runs strictly forward:
//! - [`material`] builds the elasticity matrix
//! - [`element`] computes each triangle's stiffness
//! - [`assembly`] sums them into a sparse global matrix
//! - [`constraints`] fixes the constrained DOFs
//! - [`solver`] solves for the displacements, after [`ordering`] renumbers
//!   the DOFs for the direct factorization
//! - [`stress`] recovers the von Mises stress of each element
//!
//! [`parser`] reads the model description and [`post_processor`] writes the
//! results.
//!
//! ## Example
//! ```rust
//! use cstfem::{parser::parse_model, solver::{run, AnalysisOptions}};
//!
//! let mut model = parse_model(
//!     "0.3 200000
//!      3  0 0  1 0  0 1
//!      1  0 1 2
//!      2  0 3  1 3
//!      1  2 0 -1000",
//! )
//! .unwrap();
//!
//! let solution = run(&mut model, &AnalysisOptions::default()).unwrap();
//! assert!(solution.displacements[5] < 0.0);
//! ```

pub mod assembly;
pub mod constraints;
pub mod datatypes;
pub mod element;
pub mod error;
pub mod material;
pub mod ordering;
pub mod parser;
pub mod post_processor;
pub mod solver;
pub mod stress;
