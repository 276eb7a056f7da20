//! Contact and linkage generation for sphero-cylinder suspensions.
//!
//! Pure-geometry producers of constraint blocks: given the current rod
//! configuration they emit the unilateral (non-penetration) and bilateral
//! (Hookean linkage) constraints consumed by the rod-constraint solver.
//!
//! # Components
//!
//! - [`SweepAndPrune`] / [`Aabb`] - Broad-phase candidate pair search
//! - [`closest_points_segments`] - Two-segment minimum distance
//! - [`collect_pair_contacts`] - Rod-rod contacts with `sepmin` reporting
//! - [`collect_wall_contacts`] - One-sided contacts against planar Z walls
//! - [`collect_linkages`] - Head-to-tail spring linkages
//!
//! All producers partition their work over the collector's worker pools:
//! chunk `k` of the input appends only to pool `k`, so block order is
//! deterministic for a fixed pool count and appends need no locks.

#![doc(html_root_url = "https://docs.rs/rod-collision/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn)]

mod broad_phase;
mod contact;
mod geometry;
mod linkage;
mod wall;

pub use broad_phase::{Aabb, SweepAndPrune};
pub use contact::{collect_pair_contacts, ContactReport};
pub use geometry::{closest_points_segments, GEOM_EPSILON};
pub use linkage::{build_gid_index, collect_linkages};
pub use wall::{collect_wall_contacts, push_inside_walls};
