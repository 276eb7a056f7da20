//! Per-step constraint solve orchestration.
//!
//! [`ConstraintSolver`] binds the two collectors, the mobility operator and
//! the non-constraint velocity into a concrete BCQP instance, runs the
//! projected solver, and exposes the resulting constraint forces and
//! velocities. All per-step entities are created in [`ConstraintSolver::setup`]
//! and invalidated by [`ConstraintSolver::reset`]; nothing persists between
//! steps except the solver object itself.
//!
//! # Lifecycle
//!
//! ```text
//! Fresh -> Configured -> SetupDone -> Solved -> Written -> (reset) Fresh
//! ```
//!
//! Only `SetupDone -> Solved` and `Solved -> Written` are idempotent; every
//! other transition is single-shot per step and misuse is an
//! [`ConstraintError::InvalidInput`].

use std::sync::Arc;

use nalgebra::DVector;
use rod_types::{ConstraintError, DofMap};

use crate::{
    BcqpConfig, BcqpSolver, ConstraintCollector, ConstraintMatrix, ConstraintOperator,
    MobilityOperator, Termination,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Lifecycle state of the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SolverState {
    /// No parameters, no problem.
    Fresh,
    /// Tolerances set, awaiting setup.
    Configured,
    /// Problem assembled, awaiting solve.
    SetupDone,
    /// Multipliers available, outputs computed.
    Solved,
    /// Multipliers written back to the collectors.
    Written,
}

/// Summary of one constraint solve.
#[derive(Debug, Clone)]
pub struct SolveReport {
    /// Iterations performed by the BCQP solver.
    pub iterations: usize,
    /// Final scaled residual.
    pub residual: f64,
    /// Why the BCQP solver stopped.
    pub termination: Termination,
    /// Number of unilateral constraint rows.
    pub n_uni: usize,
    /// Number of bilateral constraint rows.
    pub n_bi: usize,
    /// Residual at each iterate, if tracking was enabled.
    pub residual_history: Option<Vec<f64>>,
    /// Objective value at each iterate, if tracking was enabled.
    pub energy_history: Option<Vec<f64>>,
}

impl SolveReport {
    /// Whether the BCQP solver met the tolerance.
    #[must_use]
    pub fn converged(&self) -> bool {
        self.termination == Termination::Converged
    }
}

/// Orchestrator for the per-step constrained dynamics solve.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use nalgebra::DVector;
/// use rod_constraint::{ConstraintCollector, ConstraintSolver, IsotropicMobility};
/// use rod_types::DofMap;
///
/// let uni = ConstraintCollector::new(1);
/// let bi = ConstraintCollector::new(1);
/// let map = DofMap::new(1, 0);
/// let mobility = Arc::new(IsotropicMobility::new(1.0, map.dofs()));
///
/// let mut solver = ConstraintSolver::new();
/// solver.set_control_params(1e-6, 100).unwrap();
/// solver
///     .setup(&uni, &bi, mobility, &DVector::zeros(map.dofs()), &map, 0.01)
///     .unwrap();
/// let report = solver.solve_constraints().unwrap();
/// assert!(report.converged());
/// ```
pub struct ConstraintSolver {
    state: SolverState,
    step_id: u64,
    bcqp: BcqpConfig,
    dt: f64,
    n_uni: usize,
    n_bi: usize,
    mobility: Option<Arc<dyn MobilityOperator>>,
    d_uni: Option<ConstraintMatrix>,
    d_bi: Option<ConstraintMatrix>,
    /// BCQP constant term `q = delta0 / dt + D^T v_nc`.
    q: DVector<f64>,
    /// Current multiplier iterate (initial estimates, then the solution).
    gamma: DVector<f64>,
    /// Bilateral compliance diagonal `1 / (dt * kappa)`.
    compliance: DVector<f64>,
    force_uni: Option<DVector<f64>>,
    force_bi: Option<DVector<f64>>,
    vel_uni: Option<DVector<f64>>,
    vel_bi: Option<DVector<f64>>,
    report: Option<SolveReport>,
}

impl Default for ConstraintSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstraintSolver {
    /// Create a fresh solver.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: SolverState::Fresh,
            step_id: 0,
            bcqp: BcqpConfig::default(),
            dt: 0.0,
            n_uni: 0,
            n_bi: 0,
            mobility: None,
            d_uni: None,
            d_bi: None,
            q: DVector::zeros(0),
            gamma: DVector::zeros(0),
            compliance: DVector::zeros(0),
            force_uni: None,
            force_bi: None,
            vel_uni: None,
            vel_bi: None,
            report: None,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SolverState {
        self.state
    }

    /// Label diagnostics with the caller's step identifier.
    pub fn set_step_id(&mut self, step_id: u64) {
        self.step_id = step_id;
    }

    /// Record residual and energy histories during the next solve.
    pub fn set_track_history(&mut self, track: bool) {
        self.bcqp.track_history = track;
    }

    /// Set the iteration residual and budget. `Fresh -> Configured`.
    ///
    /// # Errors
    ///
    /// [`ConstraintError::InvalidInput`] if the solver is not fresh or the
    /// parameters are out of range.
    pub fn set_control_params(
        &mut self,
        residual_tol: f64,
        max_iterations: usize,
    ) -> Result<(), ConstraintError> {
        if self.state != SolverState::Fresh {
            return Err(ConstraintError::invalid_input(
                "set_control_params requires a fresh solver",
            ));
        }
        let config = BcqpConfig {
            residual_tol,
            max_iterations,
            track_history: self.bcqp.track_history,
        };
        config.validate().map_err(ConstraintError::invalid_input)?;
        self.bcqp = config;
        self.state = SolverState::Configured;
        Ok(())
    }

    /// Assemble the BCQP instance. `Configured -> SetupDone`.
    ///
    /// Builds both constraint halves against `map`, forms
    /// `q = delta0 / dt + D^T v_nc`, materialises the bilateral compliance
    /// diagonal, and initialises the multipliers from the per-block
    /// estimates clipped to feasibility on the unilateral partition.
    ///
    /// # Errors
    ///
    /// - [`ConstraintError::InvalidInput`] on lifecycle misuse, a
    ///   non-positive `dt`, or mismatched dimensions.
    /// - [`ConstraintError::AssemblyInconsistency`] from the collectors.
    /// - [`ConstraintError::NumericFailure`] if a bilateral row carries a
    ///   non-finite or non-positive spring constant.
    pub fn setup(
        &mut self,
        uni: &ConstraintCollector,
        bi: &ConstraintCollector,
        mobility: Arc<dyn MobilityOperator>,
        v_nc: &DVector<f64>,
        map: &DofMap,
        dt: f64,
    ) -> Result<(), ConstraintError> {
        if self.state != SolverState::Configured {
            return Err(ConstraintError::invalid_input(
                "setup requires a configured solver",
            ));
        }
        if !dt.is_finite() || dt <= 0.0 {
            return Err(ConstraintError::invalid_input(format!(
                "timestep must be positive and finite, got {dt}"
            )));
        }
        if mobility.dofs() != map.dofs() {
            return Err(ConstraintError::invalid_input(format!(
                "mobility covers {} DOFs but the map has {}",
                mobility.dofs(),
                map.dofs()
            )));
        }
        if v_nc.len() != map.dofs() {
            return Err(ConstraintError::invalid_input(format!(
                "non-constraint velocity has {} entries but the map has {} DOFs",
                v_nc.len(),
                map.dofs()
            )));
        }

        let assembled_uni = uni.build(map)?;
        let assembled_bi = bi.build(map)?;
        let n_uni = assembled_uni.len();
        let n_bi = assembled_bi.len();

        let mut compliance = DVector::zeros(n_bi);
        for (row, kappa) in assembled_bi.kappa.iter().enumerate() {
            let Some(kappa) = *kappa else {
                return Err(ConstraintError::invalid_input(format!(
                    "bilateral row {row} has no spring constant"
                )));
            };
            if !kappa.is_finite() || kappa <= 0.0 {
                return Err(ConstraintError::NumericFailure {
                    residual: kappa,
                    iteration: 0,
                });
            }
            compliance[row] = 1.0 / (dt * kappa);
        }

        // q = delta0 / dt + D^T v_nc, both halves stacked.
        let delta_nc_uni = assembled_uni.matrix.mul_vec(v_nc);
        let delta_nc_bi = assembled_bi.matrix.mul_vec(v_nc);
        let mut q = DVector::zeros(n_uni + n_bi);
        let mut gamma = DVector::zeros(n_uni + n_bi);
        for row in 0..n_uni {
            q[row] = assembled_uni.delta0[row] / dt + delta_nc_uni[row];
            gamma[row] = assembled_uni.gamma_init[row].max(0.0);
        }
        for row in 0..n_bi {
            q[n_uni + row] = assembled_bi.delta0[row] / dt + delta_nc_bi[row];
            gamma[n_uni + row] = assembled_bi.gamma_init[row];
        }

        self.dt = dt;
        self.n_uni = n_uni;
        self.n_bi = n_bi;
        self.mobility = Some(mobility);
        self.d_uni = Some(assembled_uni.matrix);
        self.d_bi = Some(assembled_bi.matrix);
        self.q = q;
        self.gamma = gamma;
        self.compliance = compliance;
        self.force_uni = None;
        self.force_bi = None;
        self.vel_uni = None;
        self.vel_bi = None;
        self.report = None;
        self.state = SolverState::SetupDone;
        Ok(())
    }

    /// Run the BCQP solver and compute constraint forces and velocities.
    /// `SetupDone -> Solved` (idempotent from `Solved`, warm-started by the
    /// previous iterate).
    ///
    /// # Errors
    ///
    /// - [`ConstraintError::InvalidInput`] on lifecycle misuse.
    /// - [`ConstraintError::NumericFailure`] from the BCQP solver; the
    ///   solver stays in `SetupDone` so `q` and the initial multipliers
    ///   remain inspectable.
    pub fn solve_constraints(&mut self) -> Result<&SolveReport, ConstraintError> {
        if self.state != SolverState::SetupDone && self.state != SolverState::Solved {
            return Err(ConstraintError::invalid_input(
                "solve_constraints requires setup to have run",
            ));
        }

        let outcome = {
            let (Some(d_uni), Some(d_bi), Some(mobility)) = (
                self.d_uni.as_ref(),
                self.d_bi.as_ref(),
                self.mobility.as_ref(),
            ) else {
                return Err(ConstraintError::invalid_input(
                    "solve_constraints requires setup to have run",
                ));
            };
            let mut operator =
                ConstraintOperator::new(d_uni, d_bi, mobility.as_ref(), &self.compliance);
            BcqpSolver::new(self.bcqp).solve(&mut operator, &self.q, self.gamma.clone(), self.n_uni)
        };

        let result = match outcome {
            Ok(result) => result,
            Err(err) => {
                tracing::error!(
                    step = self.step_id,
                    n_uni = self.n_uni,
                    n_bi = self.n_bi,
                    "constraint solve failed: {err}"
                );
                return Err(err);
            }
        };

        if result.termination == Termination::MaxIterations {
            tracing::warn!(
                step = self.step_id,
                iterations = result.iterations,
                residual = result.residual,
                "BCQP reached the iteration budget without converging"
            );
        }

        self.gamma = result.gamma;

        // Constraint forces f = D gamma and velocities v = M f, through the
        // same sparse and mobility paths the operator uses internally.
        {
            let (Some(d_uni), Some(d_bi), Some(mobility)) = (
                self.d_uni.as_ref(),
                self.d_bi.as_ref(),
                self.mobility.as_ref(),
            ) else {
                return Err(ConstraintError::invalid_input(
                    "solve_constraints requires setup to have run",
                ));
            };
            let dofs = mobility.dofs();
            let gamma = self.gamma.as_slice();

            let mut force_uni = DVector::zeros(dofs);
            d_uni.mul_transpose_acc(&gamma[..self.n_uni], force_uni.as_mut_slice());
            let mut vel_uni = DVector::zeros(dofs);
            mobility.apply(&force_uni, &mut vel_uni);

            let mut force_bi = DVector::zeros(dofs);
            d_bi.mul_transpose_acc(&gamma[self.n_uni..], force_bi.as_mut_slice());
            let mut vel_bi = DVector::zeros(dofs);
            mobility.apply(&force_bi, &mut vel_bi);

            self.force_uni = Some(force_uni);
            self.force_bi = Some(force_bi);
            self.vel_uni = Some(vel_uni);
            self.vel_bi = Some(vel_bi);
        }

        self.state = SolverState::Solved;
        let report = SolveReport {
            iterations: result.iterations,
            residual: result.residual,
            termination: result.termination,
            n_uni: self.n_uni,
            n_bi: self.n_bi,
            residual_history: result.residual_history,
            energy_history: result.energy_history,
        };
        Ok(&*self.report.insert(report))
    }

    /// Push the converged multipliers back into the collectors.
    /// `Solved -> Written` (idempotent from `Written`).
    ///
    /// # Errors
    ///
    /// [`ConstraintError::InvalidInput`] on lifecycle misuse or if the
    /// collectors no longer match the assembled row counts.
    pub fn writeback_gamma(
        &mut self,
        uni: &mut ConstraintCollector,
        bi: &mut ConstraintCollector,
    ) -> Result<(), ConstraintError> {
        if self.state != SolverState::Solved && self.state != SolverState::Written {
            return Err(ConstraintError::invalid_input(
                "writeback_gamma requires a solved system",
            ));
        }
        let gamma = self.gamma.as_slice();
        uni.writeback_gamma(&gamma[..self.n_uni])?;
        bi.writeback_gamma(&gamma[self.n_uni..])?;
        self.state = SolverState::Written;
        Ok(())
    }

    /// Release all per-step state. `-> Fresh`.
    pub fn reset(&mut self) {
        *self = Self {
            step_id: self.step_id,
            bcqp: BcqpConfig {
                track_history: self.bcqp.track_history,
                ..BcqpConfig::default()
            },
            ..Self::new()
        };
    }

    /// The BCQP constant term, available after setup.
    #[must_use]
    pub const fn q(&self) -> &DVector<f64> {
        &self.q
    }

    /// The current multiplier vector (estimates after setup, solution
    /// after a successful solve).
    #[must_use]
    pub const fn gamma(&self) -> &DVector<f64> {
        &self.gamma
    }

    /// Unilateral slice of the multiplier vector.
    #[must_use]
    pub fn gamma_uni(&self) -> &[f64] {
        &self.gamma.as_slice()[..self.n_uni]
    }

    /// Bilateral slice of the multiplier vector.
    #[must_use]
    pub fn gamma_bi(&self) -> &[f64] {
        &self.gamma.as_slice()[self.n_uni..]
    }

    /// Generalised force from unilateral constraints, after a solve.
    #[must_use]
    pub fn force_uni(&self) -> Option<&DVector<f64>> {
        self.force_uni.as_ref()
    }

    /// Generalised force from bilateral constraints, after a solve.
    #[must_use]
    pub fn force_bi(&self) -> Option<&DVector<f64>> {
        self.force_bi.as_ref()
    }

    /// Constraint velocity from unilateral constraints, after a solve.
    #[must_use]
    pub fn velocity_uni(&self) -> Option<&DVector<f64>> {
        self.vel_uni.as_ref()
    }

    /// Constraint velocity from bilateral constraints, after a solve.
    #[must_use]
    pub fn velocity_bi(&self) -> Option<&DVector<f64>> {
        self.vel_bi.as_ref()
    }

    /// Report of the last solve.
    #[must_use]
    pub fn report(&self) -> Option<&SolveReport> {
        self.report.as_ref()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::{ConstraintBlock, IsotropicMobility};
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};
    use rod_types::RodId;

    /// One rod touching the lower wall, pushed down at unit speed.
    fn wall_fixture() -> (ConstraintCollector, ConstraintCollector, DVector<f64>, DofMap) {
        let mut uni = ConstraintCollector::new(1);
        uni.append(
            0,
            ConstraintBlock::wall(
                RodId::new(0),
                0,
                0.0,
                Vector3::z(),
                Point3::new(0.0, 0.0, 0.1),
                Point3::origin(),
                Point3::new(0.0, 0.0, 0.4),
            ),
        );
        let bi = ConstraintCollector::new(1);
        let mut v_nc = DVector::zeros(6);
        v_nc[2] = -1.0;
        (uni, bi, v_nc, DofMap::new(1, 0))
    }

    #[test]
    fn test_state_machine_transitions() {
        let mut solver = ConstraintSolver::new();
        assert_eq!(solver.state(), SolverState::Fresh);

        // Setup before configure is rejected without state mutation.
        let (uni, bi, v_nc, map) = wall_fixture();
        let mobility = Arc::new(IsotropicMobility::new(1.0, 6));
        assert!(solver
            .setup(&uni, &bi, mobility.clone(), &v_nc, &map, 0.01)
            .unwrap_err()
            .is_invalid_input());
        assert_eq!(solver.state(), SolverState::Fresh);

        solver.set_control_params(1e-6, 100).unwrap();
        assert_eq!(solver.state(), SolverState::Configured);
        assert!(solver.set_control_params(1e-6, 100).is_err());

        assert!(solver.solve_constraints().unwrap_err().is_invalid_input());

        solver
            .setup(&uni, &bi, mobility, &v_nc, &map, 0.01)
            .unwrap();
        assert_eq!(solver.state(), SolverState::SetupDone);

        solver.solve_constraints().unwrap();
        assert_eq!(solver.state(), SolverState::Solved);
        // Idempotent re-solve.
        solver.solve_constraints().unwrap();

        let (mut uni, mut bi, _, _) = wall_fixture();
        solver.writeback_gamma(&mut uni, &mut bi).unwrap();
        assert_eq!(solver.state(), SolverState::Written);
        solver.writeback_gamma(&mut uni, &mut bi).unwrap();

        solver.reset();
        assert_eq!(solver.state(), SolverState::Fresh);
    }

    #[test]
    fn test_wall_contact_cancels_push() {
        let (uni, bi, v_nc, map) = wall_fixture();
        let inv_drag = 0.25;
        let mobility = Arc::new(IsotropicMobility::new(inv_drag, 6));

        let mut solver = ConstraintSolver::new();
        solver.set_control_params(1e-9, 500).unwrap();
        solver
            .setup(&uni, &bi, mobility, &v_nc, &map, 0.01)
            .unwrap();
        let report = solver.solve_constraints().unwrap();
        assert!(report.converged());

        // Active contact: gamma = 1 / m, constraint velocity cancels the
        // unit push along z.
        let gamma = solver.gamma_uni();
        assert_relative_eq!(gamma[0], 1.0 / inv_drag, epsilon = 1e-6);
        let vel = solver.velocity_uni().unwrap();
        assert_relative_eq!(vel[2], 1.0, epsilon = 1e-6);
        assert!(solver.velocity_bi().unwrap().norm() == 0.0);
    }

    #[test]
    fn test_force_velocity_consistency_is_bitwise() {
        let (uni, bi, v_nc, map) = wall_fixture();
        let mobility = Arc::new(IsotropicMobility::new(0.5, 6));

        let mut solver = ConstraintSolver::new();
        solver.set_control_params(1e-9, 500).unwrap();
        solver
            .setup(&uni, &bi, mobility.clone(), &v_nc, &map, 0.01)
            .unwrap();
        solver.solve_constraints().unwrap();

        let force = solver.force_uni().unwrap();
        let mut expected = DVector::zeros(6);
        mobility.apply(force, &mut expected);
        let velocity = solver.velocity_uni().unwrap();
        for k in 0..6 {
            assert_eq!(velocity[k].to_bits(), expected[k].to_bits());
        }
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let (uni, bi, v_nc, map) = wall_fixture();
        let mobility = Arc::new(IsotropicMobility::new(1.0, 6));

        let mut solver = ConstraintSolver::new();
        assert!(solver.set_control_params(0.0, 100).is_err());
        solver.set_control_params(1e-6, 100).unwrap();

        // Non-positive dt.
        assert!(solver
            .setup(&uni, &bi, mobility.clone(), &v_nc, &map, 0.0)
            .unwrap_err()
            .is_invalid_input());

        // Mismatched velocity length.
        assert!(solver
            .setup(&uni, &bi, mobility.clone(), &DVector::zeros(5), &map, 0.01)
            .unwrap_err()
            .is_invalid_input());

        // Mismatched mobility dimension.
        let small = Arc::new(IsotropicMobility::new(1.0, 12));
        assert!(solver
            .setup(&uni, &bi, small, &v_nc, &map, 0.01)
            .unwrap_err()
            .is_invalid_input());

        assert_eq!(solver.state(), SolverState::Configured);
    }

    #[test]
    fn test_bad_kappa_is_numeric_failure() {
        let uni = ConstraintCollector::new(1);
        let mut bi = ConstraintCollector::new(1);
        let mut block = ConstraintBlock::linkage(
            RodId::new(0),
            RodId::new(1),
            0,
            1,
            0.01,
            1.0,
            Vector3::x(),
            Point3::new(0.5, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::origin(),
            Point3::new(1.5, 0.0, 0.0),
        );
        block.kappa = Some(f64::INFINITY);
        bi.append(0, block);

        let map = DofMap::new(2, 0);
        let mobility = Arc::new(IsotropicMobility::new(1.0, map.dofs()));
        let mut solver = ConstraintSolver::new();
        solver.set_control_params(1e-6, 100).unwrap();
        let err = solver
            .setup(&uni, &bi, mobility, &DVector::zeros(map.dofs()), &map, 0.01)
            .unwrap_err();
        assert!(err.is_numeric_failure());
    }

    #[test]
    fn test_empty_problem_reports_zero_residual() {
        let uni = ConstraintCollector::new(1);
        let bi = ConstraintCollector::new(1);
        let map = DofMap::new(2, 0);
        let mobility = Arc::new(IsotropicMobility::new(1.0, map.dofs()));

        let mut solver = ConstraintSolver::new();
        solver.set_control_params(1e-6, 100).unwrap();
        solver
            .setup(&uni, &bi, mobility, &DVector::zeros(map.dofs()), &map, 0.01)
            .unwrap();
        let report = solver.solve_constraints().unwrap();
        assert!(report.converged());
        assert_eq!(report.iterations, 0);
        assert_eq!(report.residual, 0.0);
        assert_eq!(solver.force_uni().unwrap().norm(), 0.0);
    }
}
