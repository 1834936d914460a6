//! Parameter sets for every computation in the crate.
//!
//! Each struct carries the values the teaching setups use as its `Default`
//! and is passed explicitly into the functions that need it.

use crate::pendulum::OscillatorState;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Physical constants of two pendulums joined by a spring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PendulumParams {
    /// Mass of the first bob (kg).
    pub m1: f64,
    /// Mass of the second bob (kg).
    pub m2: f64,
    /// Coupling spring constant (N/m).
    pub kappa: f64,
    /// Pendulum length (m), shared by both.
    pub length: f64,
    /// Gravitational acceleration (m/s^2).
    pub gravity: f64,
}

impl Default for PendulumParams {
    fn default() -> Self {
        Self {
            m1: 1.0,
            m2: 1.0,
            kappa: 0.5,
            length: 1.0,
            gravity: 9.81,
        }
    }
}

impl PendulumParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.m1 > 0.0) || !(self.m2 > 0.0) {
            bail!("Pendulum masses must be positive.");
        }
        if !(self.length > 0.0) {
            bail!("Pendulum length must be positive.");
        }
        if !self.kappa.is_finite() || self.kappa < 0.0 {
            bail!("Coupling constant kappa must be finite and non-negative.");
        }
        if !self.gravity.is_finite() {
            bail!("Gravity must be finite.");
        }
        Ok(())
    }

    /// g / l, the squared natural frequency of an uncoupled pendulum.
    pub fn gravity_ratio(&self) -> f64 {
        self.gravity / self.length
    }
}

/// Ring of identical masses with nearest, next-nearest and opposite springs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingParams {
    /// Number of oscillators on the ring.
    pub n: usize,
    /// Mass of each oscillator (kg).
    pub mass: f64,
    /// Nearest-neighbour spring constant (N/m).
    pub k1: f64,
    /// Next-nearest-neighbour spring constant (N/m).
    pub k2: f64,
    /// Spring constant to the diametrically opposite node (N/m).
    pub k3: f64,
}

impl Default for RingParams {
    fn default() -> Self {
        Self {
            n: 6,
            mass: 1.0,
            k1: 10.0,
            k2: 5.0,
            k3: 2.0,
        }
    }
}

impl RingParams {
    pub fn validate(&self) -> Result<()> {
        if self.n < 4 {
            bail!("Ring needs at least 4 oscillators, got {}.", self.n);
        }
        if self.n % 2 != 0 {
            bail!(
                "Ring size must be even so every node has an opposite partner, got {}.",
                self.n
            );
        }
        if !(self.mass > 0.0) {
            bail!("Oscillator mass must be positive.");
        }
        if ![self.k1, self.k2, self.k3].iter().all(|k| k.is_finite()) {
            bail!("Spring constants must be finite.");
        }
        Ok(())
    }
}

/// Time horizon and sampling for a pendulum run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub t_start: f64,
    pub t_end: f64,
    /// Fixed step used by RK4.
    pub step_size: f64,
    /// Number of evenly spaced evaluation times for the adaptive solver.
    pub samples: usize,
    /// `[theta1, omega1, theta2, omega2]` at `t_start`.
    pub initial_state: OscillatorState,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            t_start: 0.0,
            t_end: 20.0,
            step_size: 0.01,
            samples: 1000,
            initial_state: [0.1, 0.0, 0.1, 0.0],
        }
    }
}

impl SimulationSettings {
    pub fn validate(&self) -> Result<()> {
        if !self.t_start.is_finite() || !self.t_end.is_finite() {
            bail!("Time span must be finite.");
        }
        if self.t_end <= self.t_start {
            bail!(
                "t_end ({}) must be greater than t_start ({}).",
                self.t_end,
                self.t_start
            );
        }
        if !(self.step_size > 0.0) || !self.step_size.is_finite() {
            bail!("Step size must be positive and finite.");
        }
        if self.samples < 2 {
            bail!("At least two evaluation samples are required.");
        }
        if !self.initial_state.iter().all(|v| v.is_finite()) {
            bail!("Initial state must be finite.");
        }
        Ok(())
    }

    /// Evaluation grid for the adaptive solver.
    pub fn evaluation_times(&self) -> Vec<f64> {
        crate::trajectory::linspace(self.t_start, self.t_end, self.samples)
    }
}

/// Error control for the adaptive Dormand-Prince solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveSettings {
    pub rtol: f64,
    pub atol: f64,
    /// Initial step guess; chosen automatically when absent.
    pub first_step: Option<f64>,
    pub min_step: f64,
    pub max_step: f64,
    pub max_steps: usize,
}

impl Default for AdaptiveSettings {
    fn default() -> Self {
        Self {
            rtol: 1e-3,
            atol: 1e-6,
            first_step: None,
            min_step: 1e-12,
            max_step: f64::INFINITY,
            max_steps: 1_000_000,
        }
    }
}

/// Closed-form two-pendulum mode demonstration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PendulumModeSettings {
    /// Angular amplitude (rad).
    pub amplitude: f64,
    pub t_end: f64,
    pub dt: f64,
    /// Horizontal distance between the two pivots (m).
    pub separation: f64,
}

impl Default for PendulumModeSettings {
    fn default() -> Self {
        Self {
            amplitude: 0.1,
            t_end: 10.0,
            dt: 0.01,
            separation: 4.0,
        }
    }
}

impl PendulumModeSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.dt > 0.0) || !self.dt.is_finite() {
            bail!("dt must be positive.");
        }
        if !(self.t_end > 0.0) || !self.t_end.is_finite() {
            bail!("t_end must be positive.");
        }
        if !self.amplitude.is_finite() || !self.separation.is_finite() {
            bail!("Amplitude and separation must be finite.");
        }
        Ok(())
    }
}

/// Ring mode animation and plotting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingAnimationSettings {
    /// Displacement amplitude applied to each eigenvector.
    pub amplitude: f64,
    pub t_max: f64,
    pub dt: f64,
    /// Radius of the equilibrium circle.
    pub radius: f64,
}

impl Default for RingAnimationSettings {
    fn default() -> Self {
        Self {
            amplitude: 1.0,
            t_max: 10.0,
            dt: 0.05,
            radius: 5.0,
        }
    }
}

impl RingAnimationSettings {
    pub fn validate(&self) -> Result<()> {
        if !(self.dt > 0.0) || !self.dt.is_finite() {
            bail!("dt must be positive.");
        }
        if !(self.t_max > 0.0) || !self.t_max.is_finite() {
            bail!("t_max must be positive.");
        }
        if !self.amplitude.is_finite() || !(self.radius > 0.0) {
            bail!("Amplitude must be finite and radius positive.");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        PendulumParams::default().validate().expect("pendulum params");
        RingParams::default().validate().expect("ring params");
        SimulationSettings::default().validate().expect("simulation");
        PendulumModeSettings::default().validate().expect("modes");
        RingAnimationSettings::default().validate().expect("animation");
    }

    #[test]
    fn ring_params_reject_odd_and_small_rings() {
        let odd = RingParams {
            n: 7,
            ..RingParams::default()
        };
        let message = format!("{}", odd.validate().expect_err("odd ring"));
        assert!(message.contains("even"), "got \"{message}\"");

        let small = RingParams {
            n: 2,
            ..RingParams::default()
        };
        assert!(small.validate().is_err());
    }

    #[test]
    fn simulation_settings_reject_zero_step() {
        let settings = SimulationSettings {
            step_size: 0.0,
            ..SimulationSettings::default()
        };
        let message = format!("{}", settings.validate().expect_err("zero step"));
        assert!(message.contains("Step size"), "got \"{message}\"");
    }

    #[test]
    fn evaluation_times_cover_span() {
        let settings = SimulationSettings::default();
        let times = settings.evaluation_times();
        assert_eq!(times.len(), 1000);
        assert_eq!(times[0], 0.0);
        assert!((times[999] - 20.0).abs() < 1e-12);
    }
}
