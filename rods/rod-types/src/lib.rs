//! Core types for sphero-cylinder suspension simulation.
//!
//! This crate provides the foundational types shared by the constraint
//! resolution stack:
//!
//! - [`Rod`] - Read-only view of a rigid sphero-cylinder (capsule)
//! - [`RodId`] - Stable global identifier assigned at creation
//! - [`DofMap`] - Explicit distribution map for the 6-DOF-per-rod space
//! - [`ResolveConfig`] - Contact generation and solver tolerances
//! - [`ConstraintError`] - Error taxonomy for the resolution pipeline
//!
//! # Design Philosophy
//!
//! These types are **pure data**. They carry no geometry routines, no solver
//! state, and no I/O. They are the common language between:
//!
//! - Contact generation (rod-collision)
//! - Constraint assembly and the BCQP solver (rod-constraint)
//! - Mobility construction (rod-mobility)
//! - The per-step pipeline (rod-physics)
//!
//! # Coordinate System
//!
//! Right-handed, Z up. A rod's axis is its orientation quaternion applied to
//! +Z, matching the capsule convention of the rest of the workspace.

#![doc(html_root_url = "https://docs.rs/rod-types/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn)]

mod config;
mod dof;
mod error;
mod rod;

pub use config::ResolveConfig;
pub use dof::DofMap;
pub use error::ConstraintError;
pub use rod::{Rod, RodId};

/// Degrees of freedom per rod: 3 translational + 3 rotational.
pub const DOF_PER_ROD: usize = 6;
