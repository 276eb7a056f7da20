//! Unified constraint-resolution API for rod suspensions.
//!
//! This crate re-exports the complete resolution stack:
//!
//! - [`rod_types`] - Core data types (rods, ids, maps, config, errors)
//! - [`rod_collision`] - Contact and linkage generation
//! - [`rod_constraint`] - Collectors, the BCQP solver and orchestration
//! - [`rod_mobility`] - Block-diagonal slender-body drag
//!
//! and adds [`ConstraintPipeline`], the per-step driver that chains broad
//! phase, contact generation, solving and writeback.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use nalgebra::DVector;
//! use rod_physics::prelude::*;
//! use nalgebra::{Point3, UnitQuaternion};
//!
//! // Two parallel rods in contact, pushed together.
//! let rods = vec![
//!     Rod::new(RodId::new(0), Point3::origin(), UnitQuaternion::identity(), 1.0, 0.5)
//!         .with_global_index(0),
//!     Rod::new(RodId::new(1), Point3::new(0.9, 0.0, 0.0), UnitQuaternion::identity(), 1.0, 0.5)
//!         .with_global_index(1),
//! ];
//! let mobility = Arc::new(RodDragMobility::new(&rods, 1.0));
//! let mut v_nc = DVector::zeros(12);
//! v_nc[0] = 0.5;
//! v_nc[6] = -0.5;
//!
//! let mut pipeline = ConstraintPipeline::new(ResolveConfig::default()).unwrap();
//! let report = pipeline.resolve(&rods, mobility, &v_nc, 0.01).unwrap();
//!
//! assert!(report.solve.converged());
//! assert_eq!(report.solve.n_uni, 1);
//! // The contact pushes back: its multiplier is non-negative.
//! assert!(pipeline.solver().gamma_uni()[0] >= 0.0);
//! ```

#![doc(html_root_url = "https://docs.rs/rod-physics/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn)]

mod pipeline;

pub use pipeline::{ConstraintPipeline, StepReport};

pub use rod_collision::{
    build_gid_index, closest_points_segments, collect_linkages, collect_pair_contacts,
    collect_wall_contacts, push_inside_walls, Aabb, SweepAndPrune,
};
pub use rod_constraint::{
    BcqpConfig, BcqpResult, BcqpSolver, ConstraintBlock, ConstraintCollector, ConstraintKind,
    ConstraintMatrix, ConstraintOperator, ConstraintSolver, IsotropicMobility, MobilityOperator,
    SolveReport, SolverState, Termination,
};
pub use rod_mobility::{DragCoefficients, RodDragMobility};
pub use rod_types::{ConstraintError, DofMap, ResolveConfig, Rod, RodId, DOF_PER_ROD};

/// Convenient glob import of the whole stack.
pub mod prelude {
    pub use crate::{
        ConstraintBlock, ConstraintCollector, ConstraintError, ConstraintPipeline,
        ConstraintSolver, DofMap, DragCoefficients, MobilityOperator, ResolveConfig, Rod,
        RodDragMobility, RodId, SolveReport, StepReport, Termination,
    };
}
