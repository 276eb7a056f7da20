//! Per-step constraint resolution pipeline.
//!
//! [`ConstraintPipeline`] owns the two collectors, the broad phase and the
//! constraint solver, and runs one full resolution pass per call: candidate
//! search, contact and linkage generation, BCQP setup and solve, and the
//! multiplier writeback. Everything the caller needs afterwards (forces,
//! velocities, per-block multipliers, stress, separation statistics) is
//! exposed through read-only accessors.

use std::sync::Arc;

use nalgebra::{DVector, Matrix3, Vector3};
use rod_collision::{
    build_gid_index, collect_linkages, collect_pair_contacts, collect_wall_contacts, SweepAndPrune,
};
use rod_constraint::{
    ConstraintCollector, ConstraintSolver, MobilityOperator, SolveReport, DOF_PER_ROD,
};
use rod_types::{ConstraintError, DofMap, ResolveConfig, Rod};

/// Summary of one resolution step.
#[derive(Debug, Clone)]
pub struct StepReport {
    /// Outcome of the BCQP solve.
    pub solve: SolveReport,
    /// Broad-phase candidate pairs examined.
    pub candidate_pairs: usize,
    /// Contacts whose normal fell back to the canonical direction.
    pub degenerate_normals: usize,
}

/// Owns the per-step machinery of constraint resolution.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use nalgebra::{DVector, Point3, UnitQuaternion};
/// use rod_physics::{ConstraintPipeline, RodDragMobility};
/// use rod_types::{ResolveConfig, Rod, RodId};
///
/// let rods = vec![
///     Rod::new(RodId::new(0), Point3::origin(), UnitQuaternion::identity(), 1.0, 0.5),
/// ];
/// let mobility = Arc::new(RodDragMobility::new(&rods, 1.0));
///
/// let mut pipeline = ConstraintPipeline::new(ResolveConfig::default()).unwrap();
/// let report = pipeline
///     .resolve(&rods, mobility, &DVector::zeros(6), 0.01)
///     .unwrap();
/// assert!(report.solve.converged());
/// ```
pub struct ConstraintPipeline {
    config: ResolveConfig,
    uni: ConstraintCollector,
    bi: ConstraintCollector,
    solver: ConstraintSolver,
    broad: SweepAndPrune,
    sepmin: Vec<f64>,
    step_id: u64,
    track_history: bool,
}

impl ConstraintPipeline {
    /// Create a pipeline with one worker pool per rayon thread.
    ///
    /// # Errors
    ///
    /// [`ConstraintError::InvalidInput`] if the configuration is invalid.
    pub fn new(config: ResolveConfig) -> Result<Self, ConstraintError> {
        Self::with_workers(config, rayon::current_num_threads())
    }

    /// Create a pipeline with an explicit worker pool count.
    ///
    /// The pool count fixes the deterministic constraint ordering, so runs
    /// with the same count reproduce bit-identical assemblies.
    ///
    /// # Errors
    ///
    /// [`ConstraintError::InvalidInput`] if the configuration is invalid.
    pub fn with_workers(config: ResolveConfig, n_workers: usize) -> Result<Self, ConstraintError> {
        config.validate().map_err(ConstraintError::invalid_input)?;
        Ok(Self {
            config,
            uni: ConstraintCollector::new(n_workers),
            bi: ConstraintCollector::new(n_workers),
            solver: ConstraintSolver::new(),
            broad: SweepAndPrune::new(),
            sepmin: Vec::new(),
            step_id: 0,
            track_history: false,
        })
    }

    /// Record residual and energy histories during solves.
    pub fn set_track_history(&mut self, track: bool) {
        self.track_history = track;
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &ResolveConfig {
        &self.config
    }

    /// Run one full resolution step.
    ///
    /// `v_nc` is the non-constraint velocity (Brownian plus external), 6
    /// entries per rod in rod order; `rods[k].global_index` must be
    /// `base + k` for a contiguous base.
    ///
    /// # Errors
    ///
    /// Propagates every fatal error of the underlying stages; see
    /// [`ConstraintError`]. Non-convergence is reported in the returned
    /// [`StepReport`], not as an error.
    pub fn resolve(
        &mut self,
        rods: &[Rod],
        mobility: Arc<dyn MobilityOperator>,
        v_nc: &DVector<f64>,
        dt: f64,
    ) -> Result<StepReport, ConstraintError> {
        self.solver.reset();
        self.solver.set_step_id(self.step_id);
        self.solver.set_track_history(self.track_history);
        self.uni.clear();
        self.bi.clear();

        let pairs =
            self.broad
                .find_candidate_pairs(rods, self.config.collision_radius_ratio, 0.0);
        let contact_report = collect_pair_contacts(rods, &pairs, &mut self.uni, &self.config);
        self.sepmin = contact_report.sepmin;

        collect_wall_contacts(rods, &mut self.uni, &self.config);

        let gid_index = build_gid_index(rods);
        collect_linkages(rods, &gid_index, &mut self.bi, &self.config)?;

        let base = rods.first().map_or(0, |rod| rod.global_index);
        let map = DofMap::new(rods.len(), base);

        self.solver
            .set_control_params(self.config.residual_tol, self.config.max_iterations)?;
        self.solver.setup(&self.uni, &self.bi, mobility, v_nc, &map, dt)?;
        let solve = self.solver.solve_constraints()?.clone();
        self.solver.writeback_gamma(&mut self.uni, &mut self.bi)?;

        tracing::debug!(
            step = self.step_id,
            n_uni = solve.n_uni,
            n_bi = solve.n_bi,
            iterations = solve.iterations,
            "constraint step resolved"
        );
        self.step_id += 1;

        Ok(StepReport {
            solve,
            candidate_pairs: pairs.len(),
            degenerate_normals: contact_report.degenerate_normals,
        })
    }

    /// The constraint solver (force/velocity handles, report, state).
    #[must_use]
    pub const fn solver(&self) -> &ConstraintSolver {
        &self.solver
    }

    /// The unilateral collector (contacts), with post-solve multipliers.
    #[must_use]
    pub const fn contacts(&self) -> &ConstraintCollector {
        &self.uni
    }

    /// The bilateral collector (linkages), with post-solve multipliers.
    #[must_use]
    pub const fn linkages(&self) -> &ConstraintCollector {
        &self.bi
    }

    /// Minimum axis separation per rod from the last contact pass.
    #[must_use]
    pub fn sepmin(&self) -> &[f64] {
        &self.sepmin
    }

    /// Translational and angular constraint velocity of one rod from
    /// unilateral constraints.
    #[must_use]
    pub fn unilateral_velocity(&self, rod: usize) -> Option<(Vector3<f64>, Vector3<f64>)> {
        Self::velocity_of(self.solver.velocity_uni()?, rod)
    }

    /// Translational and angular constraint velocity of one rod from
    /// bilateral constraints.
    #[must_use]
    pub fn bilateral_velocity(&self, rod: usize) -> Option<(Vector3<f64>, Vector3<f64>)> {
        Self::velocity_of(self.solver.velocity_bi()?, rod)
    }

    /// Summed virial stress of the contact constraints.
    #[must_use]
    pub fn contact_stress(&self) -> Matrix3<f64> {
        self.uni.sum_stress()
    }

    /// Summed virial stress of the linkage constraints.
    #[must_use]
    pub fn linkage_stress(&self) -> Matrix3<f64> {
        self.bi.sum_stress()
    }

    fn velocity_of(v: &DVector<f64>, rod: usize) -> Option<(Vector3<f64>, Vector3<f64>)> {
        let offset = DOF_PER_ROD * rod;
        if offset + DOF_PER_ROD > v.len() {
            return None;
        }
        Some((
            Vector3::new(v[offset], v[offset + 1], v[offset + 2]),
            Vector3::new(v[offset + 3], v[offset + 4], v[offset + 5]),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use nalgebra::{Point3, UnitQuaternion};
    use rod_mobility::RodDragMobility;
    use rod_types::RodId;

    #[test]
    fn test_pipeline_rejects_invalid_config() {
        let mut config = ResolveConfig::default();
        config.residual_tol = -1.0;
        assert!(ConstraintPipeline::new(config).is_err());
    }

    #[test]
    fn test_empty_step() {
        let mut pipeline = ConstraintPipeline::with_workers(ResolveConfig::default(), 2).unwrap();
        let rods = vec![Rod::new(
            RodId::new(0),
            Point3::origin(),
            UnitQuaternion::identity(),
            1.0,
            0.5,
        )];
        let mobility = Arc::new(RodDragMobility::new(&rods, 1.0));

        let report = pipeline
            .resolve(&rods, mobility, &DVector::zeros(6), 0.01)
            .unwrap();
        assert!(report.solve.converged());
        assert_eq!(report.solve.n_uni, 0);
        assert_eq!(report.candidate_pairs, 0);
        assert_eq!(pipeline.sepmin().len(), 1);
        assert!(pipeline.unilateral_velocity(0).is_some());
        assert!(pipeline.unilateral_velocity(1).is_none());
    }
}
