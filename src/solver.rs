use crate::{
    assembly::{assemble_stiffness, multiply},
    constraints::{
        apply_constraints, check_rigid_body_modes, clear_constrained_loads, ConstrainedDofs,
    },
    datatypes::{dof_owner, Model},
    error::{FemError, FemResult},
    ordering::{bandwidth, permute_symmetric, reverse_cuthill_mckee},
    stress::{recover_stresses, ElementStress},
};
use argmin_observer_slog::SlogLogger;
use indicatif::ProgressBar;
use log::{debug, info, log_enabled, Level};
use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{factorization::CscCholesky, CscMatrix};

use argmin::{
    core::{
        observers::{Observe, ObserverMode},
        ArgminFloat, Error, Executor, Operator, State, KV,
    },
    solver::conjugategradient::ConjugateGradient,
};

pub const MAX_CG_ITER: u64 = 1e7 as u64;
pub const TARGET_CG_RESIDUAL: f64 = 1e-10;

/// A Cholesky pivot smaller than this fraction of its diagonal entry means
/// the system is singular
pub const PIVOT_TOLERANCE: f64 = 1e-12;

/// Linear solver backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LinearSolver {
    /// Sparse Cholesky factorization
    Cholesky,
    /// Conjugate gradient iteration
    #[value(name = "cg")]
    ConjugateGradient,
}

/// Settings of one analysis run
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub solver: LinearSolver,
    pub thickness: f64,
    pub show_progress: bool,
    pub cg_tolerance: f64,
    pub cg_max_iters: u64,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            solver: LinearSolver::Cholesky,
            thickness: 1.0,
            show_progress: false,
            cg_tolerance: TARGET_CG_RESIDUAL,
            cg_max_iters: MAX_CG_ITER,
        }
    }
}

impl AnalysisOptions {
    fn progress_bar(&self, len: u64) -> ProgressBar {
        if self.show_progress {
            ProgressBar::new(len)
        } else {
            ProgressBar::hidden()
        }
    }
}

/// Results of a solved model
#[derive(Debug, Clone)]
pub struct Solution {
    /// Nodal displacements, `2N` entries
    pub displacements: DVector<f64>,
    /// Support reactions, non-zero only at constrained DOFs
    pub reactions: DVector<f64>,
    /// Per-element stresses, in element order
    pub stresses: Vec<ElementStress>,
}

/// Runs multiplication for Conjugate Gradient Solver
struct StiffnessOperator<'a> {
    a: &'a CscMatrix<f64>,
}

impl<'a> Operator for StiffnessOperator<'a> {
    type Param = Vec<f64>;
    type Output = Vec<f64>;

    fn apply(&self, x: &Self::Param) -> Result<Self::Output, argmin::core::Error> {
        Ok(multiply(self.a, x).as_slice().to_vec())
    }
}

/// Observer bar for argmin solver
struct ConjugateGradientObserverBar {
    bar: ProgressBar,
    initial_mag: Option<f64>,
    final_mag: f64,
}

impl ConjugateGradientObserverBar {
    fn new(bar: ProgressBar, target_cost: f64) -> ConjugateGradientObserverBar {
        ConjugateGradientObserverBar {
            bar,
            initial_mag: None,
            final_mag: target_cost.log10().floor(),
        }
    }

    fn argmin_float_to_f64<F: ArgminFloat>(&self, value: F) -> Option<f64> {
        format!("{:?}", value).parse().ok()
    }
}

impl<I> Observe<I> for ConjugateGradientObserverBar
where
    I: State,
{
    fn observe_init(&mut self, _name: &str, _state: &I, _kv: &KV) -> Result<(), Error> {
        Ok(())
    }

    fn observe_iter(&mut self, state: &I, _kv: &KV) -> Result<(), Error> {
        let cost = match self.argmin_float_to_f64(state.get_cost()) {
            Some(c) if c > 0.0 && c.is_finite() => c,
            _ => return Ok(()), // skip if we can't parse
        };
        let cost_mag = cost.log10().floor();
        let initial_mag = *self.initial_mag.get_or_insert(cost_mag);

        let span = (initial_mag - self.final_mag).max(1.0);
        let done = ((initial_mag - cost_mag) / span).clamp(0.0, 1.0);
        self.bar.set_position((done * 1000.) as u64);

        Ok(())
    }

    fn observe_final(&mut self, _state: &I) -> Result<(), Error> {
        self.bar.finish_and_clear();
        Ok(())
    }
}

/// Diagonal of `a`, rejecting DOFs with no positive stiffness
fn stiffness_diagonal(a: &CscMatrix<f64>) -> FemResult<Vec<f64>> {
    let mut diagonal = vec![0.0; a.nrows()];
    for (row, col, value) in a.triplet_iter() {
        if row == col {
            diagonal[row] = *value;
        }
    }

    if let Some(dof) = diagonal.iter().position(|d| !(*d > 0.0)) {
        let (node, axis) = dof_owner(dof);
        return Err(FemError::Solver(format!(
            "no stiffness in the {} direction of node {node}; \
             the node is not connected to any element or the system is singular",
            axis.name()
        )));
    }

    Ok(diagonal)
}

/// Solves a system of equations using the conjugate gradient method.
///
/// This function returns an approximation for x in `Ax=b`. Rigid-body modes
/// with consistent loads still converge here; [`run`] rules them out from
/// the mesh geometry first.
///
/// # Arguments
/// * `a` - A square positive definite matrix
/// * `b` - A vector of the solutions to the system
/// * `options` - Tolerance, iteration limit and progress display
///
/// # Returns
/// A DVector that represents `x` from the system
pub fn run_conjugate_gradient(
    a: &CscMatrix<f64>,
    b: &DVector<f64>,
    options: &AnalysisOptions,
) -> Result<DVector<f64>, FemError> {
    stiffness_diagonal(a)?;

    let b_norm = b.norm();
    if b_norm == 0.0 {
        return Ok(DVector::zeros(b.nrows()));
    }

    let target_cost = options.cg_tolerance * b_norm;
    let solver: ConjugateGradient<_, f64> = ConjugateGradient::new(b.as_slice().to_vec());
    let initial_guess: Vec<f64> = vec![0.0; b.nrows()];

    let operator = StiffnessOperator { a };
    let observer = ConjugateGradientObserverBar::new(options.progress_bar(1000), target_cost);

    let mut executor = Executor::new(operator, solver)
        .configure(|state| {
            state
                .param(initial_guess)
                .max_iters(options.cg_max_iters)
                .target_cost(target_cost)
        })
        .add_observer(observer, ObserverMode::NewBest);
    if log_enabled!(Level::Debug) {
        executor = executor.add_observer(SlogLogger::term(), ObserverMode::Every(100));
    }

    // Run solver
    let res = match executor.run() {
        Ok(r) => r,
        Err(err) => {
            return Err(FemError::Solver(format!(
                "Conjugate Gradient error: {err}"
            )))
        }
    };

    let best_param = match &res.state().best_param {
        Some(vec) => DVector::from_vec(vec.clone()),
        None => {
            return Err(FemError::Solver(
                "Conjugate Gradient could not produce best parameter".to_owned(),
            ))
        }
    };

    let residual = (multiply(a, best_param.as_slice()) - b).norm() / b_norm;
    if !residual.is_finite() || residual > options.cg_tolerance.max(1e-8) {
        return Err(FemError::Solver(format!(
            "Conjugate Gradient did not converge (relative residual {residual:e}); \
             the system may be singular or insufficiently constrained"
        )));
    }
    debug!(
        "conjugate gradient finished after {} iterations, relative residual {residual:e}",
        res.state().get_iter()
    );

    Ok(best_param)
}

/// Solves `Ax=b` for a symmetric positive definite sparse `a` by Cholesky
/// factorization
///
/// The DOFs are renumbered by reverse Cuthill-McKee before factoring.
/// Singular systems are detected from missing or non-positive diagonal
/// entries and from pivots that vanish relative to their diagonal entry.
pub fn run_cholesky(a: &CscMatrix<f64>, b: &DVector<f64>) -> Result<DVector<f64>, FemError> {
    let n = a.nrows();
    if n == 0 {
        return Ok(DVector::zeros(0));
    }

    let diagonal = stiffness_diagonal(a)?;

    let order = reverse_cuthill_mckee(a);
    let permuted = permute_symmetric(a, &order);
    debug!(
        "reordered DOFs, bandwidth {} -> {}",
        bandwidth(a),
        bandwidth(&permuted)
    );

    let cholesky = CscCholesky::factor(&permuted).map_err(|err| {
        FemError::Solver(format!(
            "stiffness matrix is not positive definite ({err:?}); \
             add constraints to remove rigid-body motion"
        ))
    })?;

    for (row, col, value) in cholesky.l().triplet_iter() {
        let dof = order[row];
        if row == col && !(value * value > PIVOT_TOLERANCE * diagonal[dof]) {
            let (node, axis) = dof_owner(dof);
            return Err(FemError::Solver(format!(
                "stiffness matrix is singular at the {} direction of node {node}; \
                 add constraints to remove rigid-body motion",
                axis.name()
            )));
        }
    }

    let rhs = DMatrix::from_iterator(n, 1, order.iter().map(|&dof| b[dof]));
    let solution = cholesky.solve(&rhs);

    if solution.iter().any(|u| !u.is_finite()) {
        return Err(FemError::Solver(
            "solution contains non-finite displacements".to_owned(),
        ));
    }

    let mut displacements = DVector::zeros(n);
    for (new, &old) in order.iter().enumerate() {
        displacements[old] = solution[(new, 0)];
    }

    Ok(displacements)
}

/// Solves the constrained system with the configured backend
pub fn solve(
    a: &CscMatrix<f64>,
    b: &DVector<f64>,
    options: &AnalysisOptions,
) -> Result<DVector<f64>, FemError> {
    let start = std::time::Instant::now();

    let displacements = match options.solver {
        LinearSolver::Cholesky => run_cholesky(a, b)?,
        LinearSolver::ConjugateGradient => run_conjugate_gradient(a, b, options)?,
    };

    let elapsed = (std::time::Instant::now() - start).as_secs_f32();
    info!("solved system in {:.3} seconds", elapsed);

    Ok(displacements)
}

/// Support reactions `K u - f` at the constrained DOFs
pub fn compute_reactions(
    stiffness: &CscMatrix<f64>,
    displacements: &DVector<f64>,
    loads: &DVector<f64>,
    constrained: &ConstrainedDofs,
) -> DVector<f64> {
    let internal = multiply(stiffness, displacements.as_slice());
    let mut reactions = DVector::zeros(displacements.nrows());

    for index in constrained.iter() {
        reactions[index] = internal[index] - loads[index];
    }

    reactions
}

/// Runs the solver pipeline on a parsed model
///
/// # Arguments
/// * `model` - The model; elements cache their strain-displacement matrices
/// * `options` - The analysis settings
///
/// # Returns
/// Displacements, reactions and element stresses
pub fn run(model: &mut Model, options: &AnalysisOptions) -> FemResult<Solution> {
    if !(options.thickness > 0.0 && options.thickness.is_finite()) {
        return Err(FemError::Input(format!(
            "part thickness must be positive, got {}",
            options.thickness
        )));
    }

    let elasticity = model.material.elasticity_matrix();
    let dof_count = model.mesh.dof_count();

    info!("building element stiffness matrices...");
    let bar = options.progress_bar(model.elements.len() as u64);
    let stiffness = assemble_stiffness(
        &model.mesh,
        &mut model.elements,
        &elasticity,
        options.thickness,
        &bar,
    )?;

    let constrained = ConstrainedDofs::from_constraints(&model.constraints, dof_count)?;
    info!("applying {} constrained DOFs", constrained.len());
    check_rigid_body_modes(&model.mesh, &model.elements, &constrained)?;
    let constrained_stiffness = apply_constraints(&stiffness, &constrained);

    let mut loads = model.loads.as_vector().clone();
    let discarded = clear_constrained_loads(&mut loads, &constrained);
    if discarded > 0 {
        info!("{discarded} loads on fixed DOFs were ignored");
    }

    info!("solving {dof_count} DOF system...");
    let displacements = solve(&constrained_stiffness, &loads, options)?;

    let reactions = compute_reactions(&stiffness, &displacements, &loads, &constrained);

    info!("recovering element stresses...");
    let bar = options.progress_bar(model.elements.len() as u64);
    let stresses = recover_stresses(&model.elements, &elasticity, &displacements, &bar)?;

    info!("solve complete");

    Ok(Solution {
        displacements,
        reactions,
        stresses,
    })
}
