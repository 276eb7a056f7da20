//! Constraint collection, assembly and BCQP solving for rod suspensions.
//!
//! This crate is the constraint-resolution core of the workspace. Per
//! timestep it turns a set of scalar constraints (non-penetration contacts
//! and Hookean linkages) into a bound-constrained quadratic program coupled
//! through the hydrodynamic mobility, solves it with a projected
//! Barzilai-Borwein iteration, and hands back per-rod constraint forces and
//! velocities.
//!
//! # Pipeline
//!
//! ```text
//! producers -> ConstraintCollector (uni, bi)
//!           -> ConstraintSolver::setup      (assemble D^T, q, gamma_0)
//!           -> BcqpSolver                   (projected BBPGD on M_total)
//!           -> writeback + force/velocity handles
//! ```
//!
//! # Formulation
//!
//! With `D` the constraint matrix, `M` the mobility, `v_nc` the
//! non-constraint velocity and `delta_0` the reference gaps, the solver
//! finds multipliers `gamma = [gamma_u; gamma_b]` for
//!
//! ```text
//! min 0.5 gamma^T M_total gamma + gamma^T q,    gamma_u >= 0
//! M_total = D^T M D + blkdiag(0, 1/(dt kappa))
//! q       = delta_0 / dt + D^T v_nc
//! ```
//!
//! whose KKT conditions are exactly the non-penetration complementarity for
//! contacts and the end-of-step Hookean spring law for linkages.
//!
//! # Key Types
//!
//! - [`ConstraintBlock`] - One scalar constraint with geometry and stress
//! - [`ConstraintCollector`] - Lock-free per-worker block pools
//! - [`ConstraintMatrix`] - Sparse D^T in CSR form
//! - [`MobilityOperator`] - Opaque force-to-velocity map
//! - [`ConstraintOperator`] - The composite quadratic form `M_total`
//! - [`BcqpSolver`] - Projected Barzilai-Borwein iteration
//! - [`ConstraintSolver`] - Per-step orchestration and lifecycle

#![doc(html_root_url = "https://docs.rs/rod-constraint/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn)]

mod bcqp;
mod block;
mod collector;
mod mobility;
mod operator;
mod solver;
mod sparse;

pub use bcqp::{BcqpConfig, BcqpResult, BcqpSolver, Termination};
pub use block::{ConstraintBlock, ConstraintKind};
pub use collector::{AssembledConstraints, ConstraintCollector};
pub use mobility::{IsotropicMobility, MobilityOperator};
pub use operator::{BcqpOperator, ConstraintOperator};
pub use solver::{ConstraintSolver, SolveReport, SolverState};
pub use sparse::ConstraintMatrix;

// Re-export the shared data types consumed by this crate's interfaces.
pub use rod_types::{ConstraintError, DofMap, RodId, DOF_PER_ROD};
