use thiserror::Error;

/// Every failure the pipeline can report. All of them are terminal.
#[derive(Error, Debug)]
pub enum FemError {
    #[error("Input error: {0}")]
    Input(String),

    #[error("Output error: {0}")]
    Output(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Geometry error: {0}")]
    Geometry(String),

    #[error("Solver error: {0}")]
    Solver(String),
}

pub type FemResult<T> = Result<T, FemError>;
