//! Block-diagonal slender-body drag mobility for rod suspensions.
//!
//! Implements the [`MobilityOperator`] contract with the closed-form
//! overdamped mobility of a slender sphero-cylinder in a Newtonian fluid:
//! anisotropic translational drag along and across the rod axis plus a
//! regularised isotropic rotational drag. No many-body hydrodynamic
//! interactions: the operator is block-diagonal, one 6x6 block per rod.

#![doc(html_root_url = "https://docs.rs/rod-mobility/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn)]

mod drag;

pub use drag::{DragCoefficients, RodDragMobility};

pub use rod_constraint::MobilityOperator;
