//! Two pendulums of equal length joined by a weak spring, in the small-angle
//! approximation.
//!
//! State layout is `[theta1, omega1, theta2, omega2]`: angle and angular
//! velocity of each bob, interleaved.

use crate::config::{PendulumModeSettings, PendulumParams};
use crate::traits::{DynamicalSystem, Scalar};
use crate::trajectory::linspace;
use anyhow::Result;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

pub const THETA1: usize = 0;
pub const OMEGA1: usize = 1;
pub const THETA2: usize = 2;
pub const OMEGA2: usize = 3;
pub const STATE_DIM: usize = 4;

pub type OscillatorState = [f64; STATE_DIM];

/// Linear coupled-pendulum vector field.
#[derive(Debug, Clone, Copy)]
pub struct CoupledPendulums {
    params: PendulumParams,
}

impl CoupledPendulums {
    pub fn new(params: PendulumParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    /// Linearized total energy per unit mass.
    ///
    /// The coupling term divides by `m1`; the expression is only an exact
    /// invariant when both masses are equal.
    pub fn energy(&self, state: &OscillatorState) -> f64 {
        let p = &self.params;
        let (theta1, omega1) = (state[THETA1], state[OMEGA1]);
        let (theta2, omega2) = (state[THETA2], state[OMEGA2]);
        let stretch = theta1 - theta2;
        0.5 * (omega1 * omega1 + omega2 * omega2)
            + 0.5 * p.gravity_ratio() * (theta1 * theta1 + theta2 * theta2)
            + 0.5 * p.kappa * stretch * stretch / p.m1
    }

    /// Matrix `M` in `theta'' = -M theta`.
    ///
    /// Symmetric only when `m1 == m2`.
    pub fn stiffness_matrix(&self) -> DMatrix<f64> {
        let p = &self.params;
        let g = p.gravity_ratio();
        DMatrix::from_row_slice(
            2,
            2,
            &[
                g + p.kappa / p.m1,
                -p.kappa / p.m1,
                -p.kappa / p.m2,
                g + p.kappa / p.m2,
            ],
        )
    }
}

impl<T: Scalar> DynamicalSystem<T> for CoupledPendulums {
    fn dimension(&self) -> usize {
        STATE_DIM
    }

    fn apply(&self, _t: T, x: &[T], out: &mut [T]) {
        let g = T::from_f64(self.params.gravity_ratio()).unwrap_or_else(T::nan);
        let c1 = T::from_f64(self.params.kappa / self.params.m1).unwrap_or_else(T::nan);
        let c2 = T::from_f64(self.params.kappa / self.params.m2).unwrap_or_else(T::nan);

        let theta1 = x[THETA1];
        let theta2 = x[THETA2];

        out[THETA1] = x[OMEGA1];
        out[OMEGA1] = -g * theta1 - c1 * (theta1 - theta2);
        out[THETA2] = x[OMEGA2];
        out[OMEGA2] = -g * theta2 - c2 * (theta2 - theta1);
    }
}

/// The two mode frequencies used by the closed-form mode demonstration.
///
/// These follow the demonstration's own formulas: `in_phase` adds a single
/// `kappa / m1` to `g / l` and `out_of_phase` is the bare pendulum frequency.
/// The eigen-decomposition of [`CoupledPendulums::stiffness_matrix`] gives
/// the exact small-oscillation frequencies instead.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModeFrequencies {
    pub in_phase: f64,
    pub out_of_phase: f64,
}

impl ModeFrequencies {
    pub fn closed_form(params: &PendulumParams) -> Self {
        let g = params.gravity_ratio();
        Self {
            in_phase: (g + params.kappa / params.m1).sqrt(),
            out_of_phase: g.sqrt(),
        }
    }
}

/// Angle series of both modes sampled on a common time grid.
#[derive(Debug, Clone, Serialize)]
pub struct PendulumModeSeries {
    pub frequencies: ModeFrequencies,
    pub times: Vec<f64>,
    pub in_phase_theta1: Vec<f64>,
    pub in_phase_theta2: Vec<f64>,
    pub out_of_phase_theta1: Vec<f64>,
    pub out_of_phase_theta2: Vec<f64>,
}

impl PendulumModeSeries {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// Samples both modes on `linspace(0, t_end, floor(t_end / dt))`.
pub fn pendulum_mode_series(
    params: &PendulumParams,
    settings: &PendulumModeSettings,
) -> Result<PendulumModeSeries> {
    params.validate()?;
    settings.validate()?;

    let frequencies = ModeFrequencies::closed_form(params);
    let count = (settings.t_end / settings.dt).floor() as usize;
    let times = linspace(0.0, settings.t_end, count);
    let a = settings.amplitude;

    let in_phase: Vec<f64> = times
        .iter()
        .map(|&t| a * (frequencies.in_phase * t).cos())
        .collect();
    let out_of_phase: Vec<f64> = times
        .iter()
        .map(|&t| a * (frequencies.out_of_phase * t).cos())
        .collect();

    Ok(PendulumModeSeries {
        frequencies,
        times,
        in_phase_theta1: in_phase.clone(),
        in_phase_theta2: in_phase,
        out_of_phase_theta2: out_of_phase.iter().map(|v| -v).collect(),
        out_of_phase_theta1: out_of_phase,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modes::ModeSet;

    fn system(kappa: f64) -> CoupledPendulums {
        CoupledPendulums::new(PendulumParams {
            kappa,
            ..PendulumParams::default()
        })
        .expect("valid params")
    }

    fn rates(system: &CoupledPendulums, state: &[f64]) -> Vec<f64> {
        system.derivative(0.0, state)
    }

    #[test]
    fn equal_angles_give_equal_accelerations() {
        let system = system(0.5);
        let rates = rates(&system, &[0.2, 0.0, 0.2, 0.0]);
        assert_eq!(rates[OMEGA1], rates[OMEGA2]);
        assert!((rates[OMEGA1] + 9.81 * 0.2).abs() < 1e-12);
    }

    #[test]
    fn coupling_terms_are_equal_and_opposite() {
        let coupled = system(0.5);
        let free = system(0.0);
        let state = [0.3, 0.0, -0.1, 0.0];
        let with = rates(&coupled, &state);
        let without = rates(&free, &state);
        let coupling1 = with[OMEGA1] - without[OMEGA1];
        let coupling2 = with[OMEGA2] - without[OMEGA2];
        assert!((coupling1 + coupling2).abs() < 1e-12);
        assert!((coupling1 + 0.5 * 0.4).abs() < 1e-12);
    }

    #[test]
    fn angle_rates_are_angular_velocities() {
        let rates = rates(&system(0.5), &[0.1, -0.7, 0.2, 1.3]);
        assert_eq!(rates[THETA1], -0.7);
        assert_eq!(rates[THETA2], 1.3);
    }

    #[test]
    fn rejects_invalid_params() {
        let result = CoupledPendulums::new(PendulumParams {
            length: 0.0,
            ..PendulumParams::default()
        });
        assert!(result.is_err());
    }

    #[test]
    fn closed_form_frequencies_match_reference_values() {
        let frequencies = ModeFrequencies::closed_form(&PendulumParams::default());
        assert!((frequencies.out_of_phase - 3.1321).abs() < 5e-5);
        assert!((frequencies.in_phase - (10.31_f64).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn stiffness_eigenmodes_are_in_phase_and_out_of_phase() {
        let system = system(0.5);
        let modes = ModeSet::from_stiffness(&system.stiffness_matrix(), 1.0)
            .expect("decomposition should succeed");
        assert!((modes.frequencies()[0] - 9.81_f64.sqrt()).abs() < 1e-9);
        assert!((modes.frequencies()[1] - 10.81_f64.sqrt()).abs() < 1e-9);

        let slow = &modes.mode(0).expect("slow mode").vector;
        assert!((slow[0] - slow[1]).abs() < 1e-9);
        let fast = &modes.mode(1).expect("fast mode").vector;
        assert!((fast[0] + fast[1]).abs() < 1e-9);
    }

    #[test]
    fn energy_splits_into_kinetic_gravity_and_spring_terms() {
        let system = system(0.5);
        let at_rest: OscillatorState = [0.0; STATE_DIM];
        assert_eq!(system.energy(&at_rest), 0.0);

        let state: OscillatorState = [0.1, 0.2, -0.1, 0.0];
        let kinetic = 0.5 * 0.2 * 0.2;
        let gravity = 0.5 * 9.81 * (0.1 * 0.1 + 0.1 * 0.1);
        let spring = 0.5 * 0.5 * 0.2 * 0.2;
        assert!((system.energy(&state) - (kinetic + gravity + spring)).abs() < 1e-15);
    }

    #[test]
    fn mode_series_follows_closed_form() {
        let params = PendulumParams::default();
        let settings = PendulumModeSettings::default();
        let series = pendulum_mode_series(&params, &settings).expect("series");

        assert_eq!(series.len(), 1000);
        assert_eq!(series.times[0], 0.0);
        assert!((series.times[999] - 10.0).abs() < 1e-12);
        assert_eq!(series.in_phase_theta1, series.in_phase_theta2);
        assert!((series.out_of_phase_theta1[0] - 0.1).abs() < 1e-15);
        for (a, b) in series
            .out_of_phase_theta1
            .iter()
            .zip(&series.out_of_phase_theta2)
        {
            assert_eq!(*a, -*b);
        }
        let t = series.times[10];
        let expected = 0.1 * (series.frequencies.out_of_phase * t).cos();
        assert!((series.out_of_phase_theta1[10] - expected).abs() < 1e-15);
    }
}
