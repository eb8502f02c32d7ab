use log::warn;
use nalgebra::DVector;

use crate::{
    element::Element,
    error::{FemError, FemResult},
    material::Material,
};

/// Degrees of freedom per node (x and y displacement)
pub const DOF: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
}

/// Displacement axis of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X = 0,
    Y = 1,
}

impl Axis {
    pub fn name(&self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
        }
    }
}

/// Global index of a node's degree of freedom
pub fn dof_index(node: usize, axis: Axis) -> usize {
    DOF * node + axis as usize
}

/// Inverse of [`dof_index`]
pub fn dof_owner(dof: usize) -> (usize, Axis) {
    let axis = if dof % DOF == 0 { Axis::X } else { Axis::Y };
    (dof / DOF, axis)
}

/// Node coordinates. Node `i` is `vertices[i]`.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
}

impl Mesh {
    pub fn new(vertices: Vec<Vertex>) -> Mesh {
        Mesh { vertices }
    }

    pub fn nodes_count(&self) -> usize {
        self.vertices.len()
    }

    /// Size of the global system
    pub fn dof_count(&self) -> usize {
        DOF * self.vertices.len()
    }

    pub fn vertex(&self, node: usize) -> FemResult<&Vertex> {
        self.vertices.get(node).ok_or_else(|| {
            FemError::Geometry(format!(
                "node {node} does not exist (mesh has {} nodes)",
                self.vertices.len()
            ))
        })
    }
}

/// Which displacement components a constraint fixes to zero
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintType {
    UX = 1,
    UY = 2,
    UXY = 3,
}

impl ConstraintType {
    /// Decodes the numeric type used in input files
    pub fn from_code(code: i64) -> Option<ConstraintType> {
        match code {
            1 => Some(ConstraintType::UX),
            2 => Some(ConstraintType::UY),
            3 => Some(ConstraintType::UXY),
            _ => None,
        }
    }

    pub fn fixes(&self, axis: Axis) -> bool {
        (*self as u8) & (1 << axis as u8) != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Constraint {
    pub node: usize,
    pub kind: ConstraintType,
}

impl Constraint {
    /// Global indices this constraint fixes
    pub fn dof_indices(&self) -> impl Iterator<Item = usize> + '_ {
        [Axis::X, Axis::Y]
            .into_iter()
            .filter(move |axis| self.kind.fixes(*axis))
            .map(move |axis| dof_index(self.node, axis))
    }
}

/// Nodal load vector, two entries per node
#[derive(Debug, Clone, PartialEq)]
pub struct LoadVector {
    values: DVector<f64>,
}

impl LoadVector {
    pub fn zeros(nodes_count: usize) -> LoadVector {
        LoadVector {
            values: DVector::zeros(DOF * nodes_count),
        }
    }

    /// Sets the load at `node`. A repeated node overwrites the earlier load.
    pub fn set(&mut self, node: usize, fx: f64, fy: f64) -> FemResult<()> {
        let ix = dof_index(node, Axis::X);
        let iy = dof_index(node, Axis::Y);
        if iy >= self.values.len() {
            return Err(FemError::Parse(format!(
                "load targets node {node}, which does not exist"
            )));
        }

        if self.values[ix] != 0.0 || self.values[iy] != 0.0 {
            warn!(
                "node {node} is loaded more than once; ({}, {}) replaced by ({fx}, {fy})",
                self.values[ix], self.values[iy]
            );
        }

        self.values[ix] = fx;
        self.values[iy] = fy;
        Ok(())
    }

    pub fn as_vector(&self) -> &DVector<f64> {
        &self.values
    }
}

/// A complete analysis input, as produced by the parser
#[derive(Debug, Clone)]
pub struct Model {
    pub material: Material,
    pub mesh: Mesh,
    pub elements: Vec<Element>,
    pub constraints: Vec<Constraint>,
    pub loads: LoadVector,
}
