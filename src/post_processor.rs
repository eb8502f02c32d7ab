use std::io::Write;

use json::JsonValue;
use log::info;

use crate::{
    datatypes::{dof_index, Axis, Model},
    error::{FemError, FemResult},
    solver::Solution,
};

/// Layout of the results file
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Displacements then von Mises stresses, one value per line
    Text,
    /// A JSON report with nodes, elements and a summary
    Json,
}

fn write_failed(err: std::io::Error) -> FemError {
    FemError::Output(format!("Failed to write results: {err}"))
}

/// Writes the displacement vector followed by one von Mises stress per element
pub fn write_text<W: Write>(writer: &mut W, solution: &Solution) -> FemResult<()> {
    for u in solution.displacements.iter() {
        writeln!(writer, "{u}").map_err(write_failed)?;
    }
    for stress in &solution.stresses {
        writeln!(writer, "{}", stress.von_mises).map_err(write_failed)?;
    }
    Ok(())
}

/// Builds the JSON report of a solved model
pub fn json_report(model: &Model, solution: &Solution) -> JsonValue {
    let mut nodes = Vec::with_capacity(model.mesh.nodes_count());
    let mut max_displacement: f64 = 0.0;

    for (i, vertex) in model.mesh.vertices.iter().enumerate() {
        let ux = solution.displacements[dof_index(i, Axis::X)];
        let uy = solution.displacements[dof_index(i, Axis::Y)];
        max_displacement = max_displacement.max(f64::hypot(ux, uy));

        let mut node = JsonValue::new_object();
        node["x"] = vertex.x.into();
        node["y"] = vertex.y.into();
        node["ux"] = ux.into();
        node["uy"] = uy.into();
        node["rx"] = solution.reactions[dof_index(i, Axis::X)].into();
        node["ry"] = solution.reactions[dof_index(i, Axis::Y)].into();
        nodes.push(node);
    }

    let mut elements = Vec::with_capacity(model.elements.len());
    let mut max_von_mises: f64 = 0.0;

    for (element, stress) in std::iter::zip(&model.elements, &solution.stresses) {
        max_von_mises = max_von_mises.max(stress.von_mises);

        let mut entry = JsonValue::new_object();
        entry["nodes"] = JsonValue::Array(element.nodes.iter().map(|n| (*n).into()).collect());
        entry["sx"] = stress.sigma[0].into();
        entry["sy"] = stress.sigma[1].into();
        entry["txy"] = stress.sigma[2].into();
        entry["von_mises"] = stress.von_mises.into();
        elements.push(entry);
    }

    let mut summary = JsonValue::new_object();
    summary["nodes"] = model.mesh.nodes_count().into();
    summary["elements"] = model.elements.len().into();
    summary["max_displacement"] = max_displacement.into();
    summary["max_von_mises"] = max_von_mises.into();

    let mut report = JsonValue::new_object();
    report["summary"] = summary;
    report["nodes"] = JsonValue::Array(nodes);
    report["elements"] = JsonValue::Array(elements);
    report
}

/// Writes simulation results in the requested format
///
/// # Arguments
/// * `writer` - Destination of the results
/// * `format` - The output layout
/// * `model` - The solved model
/// * `solution` - The solver output
pub fn write_results<W: Write>(
    writer: &mut W,
    format: OutputFormat,
    model: &Model,
    solution: &Solution,
) -> FemResult<()> {
    match format {
        OutputFormat::Text => write_text(writer, solution)?,
        OutputFormat::Json => {
            json_report(model, solution)
                .write_pretty(writer, 2)
                .map_err(write_failed)?;
            writeln!(writer).map_err(write_failed)?;
        }
    }
    writer.flush().map_err(write_failed)?;

    info!(
        "wrote {} displacements and {} element stresses",
        solution.displacements.len(),
        solution.stresses.len()
    );

    Ok(())
}
