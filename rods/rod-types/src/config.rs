//! Configuration for contact generation and constraint solving.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for the per-step constraint resolution.
///
/// Groups the geometric knobs of contact generation (wall planes, separation
/// buffers, collision radius scaling) with the BCQP solver tolerances.
///
/// # Example
///
/// ```
/// use rod_types::ResolveConfig;
///
/// let config = ResolveConfig::default()
///     .with_walls(0.0, 1.0)
///     .with_link_kappa(200.0);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ResolveConfig {
    /// Default spring constant applied to linkage blocks emitted without one.
    pub link_kappa: f64,

    /// Enable contact generation against the lower-Z planar wall.
    pub wall_low_z: bool,

    /// Enable contact generation against the upper-Z planar wall.
    pub wall_high_z: bool,

    /// Z position of the lower wall plane.
    pub box_low_z: f64,

    /// Z position of the upper wall plane.
    pub box_high_z: f64,

    /// Convergence tolerance for the BCQP residual.
    pub residual_tol: f64,

    /// Maximum BCQP iterations before reporting non-convergence.
    pub max_iterations: usize,

    /// Effective-radius shift for contacts. A positive buffer widens the
    /// reported gap deficit without changing the emission threshold.
    pub separation_buffer_contacts: f64,

    /// Effective-radius shift for linkage rest lengths.
    pub separation_buffer_linkages: f64,

    /// Ratio applied to the rod radius during contact generation.
    pub collision_radius_ratio: f64,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            link_kappa: 100.0,
            wall_low_z: false,
            wall_high_z: false,
            box_low_z: 0.0,
            box_high_z: 1.0,
            residual_tol: 1e-6,
            max_iterations: 500,
            separation_buffer_contacts: 0.0,
            separation_buffer_linkages: 0.05,
            collision_radius_ratio: 1.0,
        }
    }
}

impl ResolveConfig {
    /// High-accuracy configuration for stiff, dense suspensions.
    #[must_use]
    pub fn high_accuracy() -> Self {
        Self {
            residual_tol: 1e-10,
            max_iterations: 5000,
            ..Self::default()
        }
    }

    /// Enable both planar walls at the given Z positions (builder style).
    #[must_use]
    pub const fn with_walls(mut self, low_z: f64, high_z: f64) -> Self {
        self.wall_low_z = true;
        self.wall_high_z = true;
        self.box_low_z = low_z;
        self.box_high_z = high_z;
        self
    }

    /// Enable only the lower wall at the given Z position (builder style).
    #[must_use]
    pub const fn with_lower_wall(mut self, low_z: f64) -> Self {
        self.wall_low_z = true;
        self.box_low_z = low_z;
        self
    }

    /// Set the default linkage spring constant (builder style).
    #[must_use]
    pub const fn with_link_kappa(mut self, kappa: f64) -> Self {
        self.link_kappa = kappa;
        self
    }

    /// Set the solver tolerances (builder style).
    #[must_use]
    pub const fn with_solver_params(mut self, residual_tol: f64, max_iterations: usize) -> Self {
        self.residual_tol = residual_tol;
        self.max_iterations = max_iterations;
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error string if any value is out of range.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !self.link_kappa.is_finite() || self.link_kappa <= 0.0 {
            return Err("link_kappa must be positive and finite");
        }
        if self.residual_tol <= 0.0 {
            return Err("residual_tol must be positive");
        }
        if self.max_iterations == 0 {
            return Err("max_iterations must be at least 1");
        }
        if self.wall_low_z && self.wall_high_z && self.box_low_z >= self.box_high_z {
            return Err("box_low_z must lie below box_high_z");
        }
        if self.collision_radius_ratio <= 0.0 {
            return Err("collision_radius_ratio must be positive");
        }
        Ok(())
    }
}
