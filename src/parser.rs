//! Reader for the whitespace-delimited model description
//!
//! Sections appear in a fixed order: material constants, nodes, elements,
//! constraints and loads, each list prefixed by its count.

use std::{path::Path, str::SplitWhitespace};

use log::{info, warn};

use crate::{
    datatypes::{Constraint, ConstraintType, LoadVector, Mesh, Model, Vertex},
    element::Element,
    error::{FemError, FemResult},
    material::Material,
};

/// Sequential reader over the tokens of an input file
struct TokenStream<'a> {
    tokens: SplitWhitespace<'a>,
    position: usize,
}

impl<'a> TokenStream<'a> {
    fn new(contents: &'a str) -> TokenStream<'a> {
        TokenStream {
            tokens: contents.split_whitespace(),
            position: 0,
        }
    }

    fn next_token(&mut self, what: &str) -> FemResult<&'a str> {
        self.position += 1;
        self.tokens.next().ok_or_else(|| {
            FemError::Parse(format!(
                "unexpected end of input at token {}, expected {what}",
                self.position
            ))
        })
    }

    fn next_f64(&mut self, what: &str) -> FemResult<f64> {
        let token = self.next_token(what)?;
        match token.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(FemError::Parse(format!(
                "token {} ('{token}') is not a finite number, expected {what}",
                self.position
            ))),
        }
    }

    fn next_i64(&mut self, what: &str) -> FemResult<i64> {
        let token = self.next_token(what)?;
        token.parse::<i64>().map_err(|_| {
            FemError::Parse(format!(
                "token {} ('{token}') is not an integer, expected {what}",
                self.position
            ))
        })
    }

    fn next_count(&mut self, what: &str) -> FemResult<usize> {
        let value = self.next_i64(what)?;
        usize::try_from(value).map_err(|_| {
            FemError::Parse(format!(
                "token {} is a negative {what} ({value})",
                self.position
            ))
        })
    }

    /// Reads a node index and checks it against the number of nodes
    fn next_node(&mut self, nodes_count: usize, what: &str) -> FemResult<usize> {
        let value = self.next_i64(what)?;
        match usize::try_from(value) {
            Ok(node) if node < nodes_count => Ok(node),
            _ => Err(FemError::Parse(format!(
                "token {}: {what} {value} is out of range (mesh has {nodes_count} nodes)",
                self.position
            ))),
        }
    }

    fn remaining(&mut self) -> usize {
        self.tokens.by_ref().count()
    }
}

fn parse_material(stream: &mut TokenStream) -> FemResult<Material> {
    let poisson_ratio = stream.next_f64("poisson ratio")?;
    let youngs_modulus = stream.next_f64("young's modulus")?;

    if !(poisson_ratio > -1.0 && poisson_ratio < 1.0) {
        return Err(FemError::Parse(format!(
            "poisson ratio must lie in (-1, 1), got {poisson_ratio}"
        )));
    }
    if !(youngs_modulus > 0.0) {
        return Err(FemError::Parse(format!(
            "young's modulus must be positive, got {youngs_modulus}"
        )));
    }

    Ok(Material::new(poisson_ratio, youngs_modulus))
}

fn parse_nodes(stream: &mut TokenStream) -> FemResult<Mesh> {
    let nodes_count = stream.next_count("node count")?;
    let mut vertices = Vec::with_capacity(nodes_count);

    for _ in 0..nodes_count {
        let x = stream.next_f64("node x coordinate")?;
        let y = stream.next_f64("node y coordinate")?;
        vertices.push(Vertex { x, y });
    }

    Ok(Mesh::new(vertices))
}

fn parse_elements(stream: &mut TokenStream, nodes_count: usize) -> FemResult<Vec<Element>> {
    let element_count = stream.next_count("element count")?;
    let mut elements = Vec::with_capacity(element_count);

    for i in 0..element_count {
        let n0 = stream.next_node(nodes_count, "element node")?;
        let n1 = stream.next_node(nodes_count, "element node")?;
        let n2 = stream.next_node(nodes_count, "element node")?;

        if n0 == n1 || n1 == n2 || n0 == n2 {
            return Err(FemError::Parse(format!(
                "element {i} repeats a node: [{n0}, {n1}, {n2}]"
            )));
        }

        elements.push(Element::new([n0, n1, n2]));
    }

    Ok(elements)
}

fn parse_constraints(stream: &mut TokenStream, nodes_count: usize) -> FemResult<Vec<Constraint>> {
    let constraint_count = stream.next_count("constraint count")?;
    let mut constraints = Vec::with_capacity(constraint_count);

    for _ in 0..constraint_count {
        let node = stream.next_node(nodes_count, "constrained node")?;
        let code = stream.next_i64("constraint type")?;
        let kind = ConstraintType::from_code(code).ok_or_else(|| {
            FemError::Parse(format!(
                "constraint on node {node} has type {code}; expected 1 (x), 2 (y) or 3 (xy)"
            ))
        })?;

        constraints.push(Constraint { node, kind });
    }

    Ok(constraints)
}

fn parse_loads(stream: &mut TokenStream, nodes_count: usize) -> FemResult<LoadVector> {
    let loads_count = stream.next_count("load count")?;
    let mut loads = LoadVector::zeros(nodes_count);

    for _ in 0..loads_count {
        let node = stream.next_node(nodes_count, "loaded node")?;
        let fx = stream.next_f64("load x component")?;
        let fy = stream.next_f64("load y component")?;
        loads.set(node, fx, fy)?;
    }

    Ok(loads)
}

/// Parses a complete model from the contents of an input file
pub fn parse_model(contents: &str) -> FemResult<Model> {
    let mut stream = TokenStream::new(contents);

    let material = parse_material(&mut stream)?;
    let mesh = parse_nodes(&mut stream)?;
    let elements = parse_elements(&mut stream, mesh.nodes_count())?;
    let constraints = parse_constraints(&mut stream, mesh.nodes_count())?;
    let loads = parse_loads(&mut stream, mesh.nodes_count())?;

    let trailing = stream.remaining();
    if trailing > 0 {
        warn!("ignoring {trailing} trailing tokens after the load section");
    }

    Ok(Model {
        material,
        mesh,
        elements,
        constraints,
        loads,
    })
}

/// Reads and parses the input file
///
/// # Arguments
/// * `input_file` - The path to the input file
pub fn load_input_file(input_file: &Path) -> FemResult<Model> {
    let contents = match std::fs::read_to_string(input_file) {
        Ok(f) => f,
        Err(err) => {
            return Err(FemError::Input(format!(
                "Unable to open input file {}: {err}",
                input_file.display()
            )))
        }
    };

    let model = parse_model(&contents)?;
    info!(
        "loaded {} nodes, {} elements, {} constraints",
        model.mesh.nodes_count(),
        model.elements.len(),
        model.constraints.len()
    );

    Ok(model)
}
