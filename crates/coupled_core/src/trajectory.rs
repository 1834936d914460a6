use crate::config::{AdaptiveSettings, PendulumParams, SimulationSettings};
use crate::pendulum::{CoupledPendulums, OscillatorState};
use crate::solvers::{DormandPrince45, SolverStats, RK4};
use crate::traits::{DynamicalSystem, Steppable};
use anyhow::{bail, Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

/// `count` evenly spaced points from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (count - 1) as f64;
            let mut values: Vec<f64> = (0..count).map(|i| start + step * i as f64).collect();
            values[count - 1] = end;
            values
        }
    }
}

/// `start, start + step, ...` up to but excluding `end`.
pub fn arange(start: f64, end: f64, step: f64) -> Vec<f64> {
    if !(step > 0.0) || !(end > start) {
        return Vec::new();
    }
    let count = ((end - start) / step).ceil() as usize;
    (0..count).map(|i| start + step * i as f64).collect()
}

/// Sampled solution of an ODE: one state per time, in time order.
#[derive(Debug, Clone, Serialize)]
pub struct Trajectory {
    dimension: usize,
    times: Vec<f64>,
    states: Vec<Vec<f64>>,
}

impl Trajectory {
    fn with_capacity(dimension: usize, capacity: usize) -> Self {
        Self {
            dimension,
            times: Vec::with_capacity(capacity),
            states: Vec::with_capacity(capacity),
        }
    }

    fn push(&mut self, t: f64, state: &[f64]) {
        self.times.push(t);
        self.states.push(state.to_vec());
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn states(&self) -> &[Vec<f64>] {
        &self.states
    }

    /// Time series of a single state component.
    pub fn component(&self, index: usize) -> Vec<f64> {
        self.states.iter().map(|s| s[index]).collect()
    }

    pub fn last(&self) -> Option<(f64, &[f64])> {
        self.times
            .last()
            .zip(self.states.last())
            .map(|(&t, s)| (t, s.as_slice()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, &[f64])> {
        self.times
            .iter()
            .zip(&self.states)
            .map(|(&t, s)| (t, s.as_slice()))
    }
}

fn check_initial_state(system: &impl DynamicalSystem<f64>, y0: &[f64]) -> Result<()> {
    if y0.len() != system.dimension() {
        bail!(
            "Initial state dimension mismatch. Expected {}, got {}.",
            system.dimension(),
            y0.len()
        );
    }
    if !y0.iter().all(|v| v.is_finite()) {
        bail!("Initial state must be finite.");
    }
    Ok(())
}

/// Classical RK4 with a fixed step `h`.
///
/// Takes `floor((t_end - t_start) / h)` steps and labels the samples with
/// `linspace(t_start, t_end, steps + 1)`.
pub fn integrate_fixed(
    system: &impl DynamicalSystem<f64>,
    y0: &[f64],
    t_start: f64,
    t_end: f64,
    h: f64,
) -> Result<Trajectory> {
    check_initial_state(system, y0)?;
    if !(h > 0.0) || !h.is_finite() {
        bail!("Step size h must be positive and finite.");
    }
    if !t_start.is_finite() || !t_end.is_finite() || t_end <= t_start {
        bail!("Invalid time span [{}, {}].", t_start, t_end);
    }

    let steps = ((t_end - t_start) / h).floor() as usize;
    let times = linspace(t_start, t_end, steps + 1);
    let mut stepper = RK4::new(y0.len());
    let mut state = y0.to_vec();
    let mut trajectory = Trajectory::with_capacity(y0.len(), steps + 1);
    trajectory.push(times[0], &state);

    for window in times.windows(2) {
        let mut t = window[0];
        stepper.step(system, &mut t, &mut state, h);
        trajectory.push(window[1], &state);
    }

    debug!("rk4 took {} steps of {} over [{}, {}]", steps, h, t_start, t_end);
    Ok(trajectory)
}

/// Adaptive Dormand-Prince integration reported at `t_eval`.
///
/// `t_eval` must be sorted and lie inside `[t_start, t_end]`; the returned
/// trajectory contains exactly those times.
pub fn integrate_adaptive(
    system: &impl DynamicalSystem<f64>,
    y0: &[f64],
    t_start: f64,
    t_end: f64,
    t_eval: &[f64],
    settings: AdaptiveSettings,
) -> Result<(Trajectory, SolverStats)> {
    check_initial_state(system, y0)?;
    if !t_start.is_finite() || !t_end.is_finite() || t_end < t_start {
        bail!("Invalid time span [{}, {}].", t_start, t_end);
    }
    if t_eval.windows(2).any(|w| w[1] < w[0]) {
        bail!("Evaluation times must be sorted.");
    }
    if let (Some(&first), Some(&last)) = (t_eval.first(), t_eval.last()) {
        if first < t_start || last > t_end {
            bail!("Evaluation times must lie within [{}, {}].", t_start, t_end);
        }
    }

    let mut solver = DormandPrince45::new(y0.len(), settings);
    let mut state = y0.to_vec();
    let mut t = t_start;
    let mut trajectory = Trajectory::with_capacity(y0.len(), t_eval.len());

    for &target in t_eval {
        solver
            .advance(system, &mut t, &mut state, target)
            .with_context(|| format!("Adaptive integration failed before t = {}.", target))?;
        trajectory.push(target, &state);
    }

    Ok((trajectory, solver.stats))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationMethod {
    /// Adaptive Dormand-Prince 4(5).
    Rk45,
    /// Classical fixed-step RK4.
    Rk4,
}

impl IntegrationMethod {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "rk45" => Ok(Self::Rk45),
            "rk4" => Ok(Self::Rk4),
            other => bail!("Unknown integration method \"{}\".", other),
        }
    }
}

/// A complete coupled-pendulum run.
#[derive(Debug, Clone, Serialize)]
pub struct PendulumRun {
    pub method: IntegrationMethod,
    pub trajectory: Trajectory,
    /// Present for the adaptive method only.
    pub stats: Option<SolverStats>,
    /// Linearized energy at every sample.
    pub energy: Vec<f64>,
}

impl PendulumRun {
    /// Largest deviation of the energy from its initial value.
    pub fn energy_drift(&self) -> f64 {
        let Some(&e0) = self.energy.first() else {
            return 0.0;
        };
        self.energy
            .iter()
            .map(|e| (e - e0).abs())
            .fold(0.0, f64::max)
    }
}

/// Integrates the coupled pendulums with the chosen method.
pub fn simulate_pendulums(
    params: &PendulumParams,
    settings: &SimulationSettings,
    method: IntegrationMethod,
    adaptive: AdaptiveSettings,
) -> Result<PendulumRun> {
    settings.validate()?;
    let system = CoupledPendulums::new(*params)?;

    let (trajectory, stats) = match method {
        IntegrationMethod::Rk4 => (
            integrate_fixed(
                &system,
                &settings.initial_state,
                settings.t_start,
                settings.t_end,
                settings.step_size,
            )?,
            None,
        ),
        IntegrationMethod::Rk45 => {
            let (trajectory, stats) = integrate_adaptive(
                &system,
                &settings.initial_state,
                settings.t_start,
                settings.t_end,
                &settings.evaluation_times(),
                adaptive,
            )?;
            (trajectory, Some(stats))
        }
    };

    let energy = trajectory
        .iter()
        .map(|(_, s)| OscillatorState::try_from(s).map(|state| system.energy(&state)))
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("Trajectory sample is not a pendulum state.")?;
    Ok(PendulumRun {
        method,
        trajectory,
        stats,
        energy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pendulum::{THETA1, THETA2};
    use std::f64::consts::PI;

    fn assert_err_contains<T: std::fmt::Debug>(result: Result<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err:#}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    fn pendulums(kappa: f64) -> CoupledPendulums {
        CoupledPendulums::new(PendulumParams {
            kappa,
            ..PendulumParams::default()
        })
        .expect("valid params")
    }

    #[test]
    fn linspace_includes_both_endpoints() {
        let values = linspace(0.0, 1.0, 5);
        assert_eq!(values, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
        assert_eq!(linspace(2.0, 3.0, 1), vec![2.0]);
    }

    #[test]
    fn arange_excludes_end() {
        let values = arange(0.0, 1.0, 0.25);
        assert_eq!(values, vec![0.0, 0.25, 0.5, 0.75]);
        assert_eq!(arange(0.0, 10.0, 0.05).len(), 200);
        assert!(arange(0.0, 1.0, 0.0).is_empty());
    }

    #[test]
    fn fixed_step_sample_count_uses_floor() {
        let system = pendulums(0.5);
        let trajectory =
            integrate_fixed(&system, &[0.1, 0.0, 0.1, 0.0], 0.0, 1.0, 0.3).expect("rk4");
        assert_eq!(trajectory.len(), 4);
        assert_eq!(trajectory.times()[0], 0.0);
        assert_eq!(trajectory.times()[3], 1.0);

        let trajectory =
            integrate_fixed(&system, &[0.1, 0.0, 0.1, 0.0], 0.0, 20.0, 0.01).expect("rk4");
        assert_eq!(trajectory.len(), 2001);
    }

    #[test]
    fn fixed_step_returns_after_one_period() {
        let system = pendulums(0.0);
        let period = 2.0 * PI * (1.0_f64 / 9.81).sqrt();
        let steps = 400.0;
        let h = period / steps;
        let y0 = [0.1, 0.0, -0.05, 0.0];
        let trajectory = integrate_fixed(&system, &y0, 0.0, period, h * (1.0 - 1e-12))
            .expect("rk4");
        assert_eq!(trajectory.len(), 401);
        let (t, last) = trajectory.last().expect("non-empty");
        assert!((t - period).abs() < 1e-9);
        for (a, b) in last.iter().zip(&y0) {
            assert!((a - b).abs() < 1e-6, "{a} vs {b}");
        }
    }

    #[test]
    fn fixed_step_conserves_linearized_energy() {
        let run = simulate_pendulums(
            &PendulumParams::default(),
            &SimulationSettings {
                initial_state: [0.1, 0.0, 0.0, 0.0],
                ..SimulationSettings::default()
            },
            IntegrationMethod::Rk4,
            AdaptiveSettings::default(),
        )
        .expect("simulation");
        let e0 = run.energy[0];
        assert!(e0 > 0.0);
        assert!(run.energy_drift() / e0 < 1e-6);
        assert!(run.stats.is_none());
    }

    #[test]
    fn fixed_step_rejects_zero_step() {
        let system = pendulums(0.5);
        assert_err_contains(
            integrate_fixed(&system, &[0.0; 4], 0.0, 1.0, 0.0),
            "Step size h must be positive",
        );
        assert_err_contains(
            integrate_fixed(&system, &[0.0; 3], 0.0, 1.0, 0.1),
            "dimension mismatch",
        );
    }

    #[test]
    fn fixed_step_rejects_empty_or_reversed_span() {
        let system = pendulums(0.5);
        let y0 = [0.1, 0.0, 0.1, 0.0];
        assert_err_contains(integrate_fixed(&system, &y0, 1.0, 1.0, 0.01), "Invalid time span");
        assert_err_contains(integrate_fixed(&system, &y0, 1.0, 0.5, 0.01), "Invalid time span");
        assert_err_contains(
            integrate_fixed(&system, &y0, 0.0, f64::INFINITY, 0.01),
            "Invalid time span",
        );
    }

    #[test]
    fn trajectory_iter_pairs_times_with_states() {
        let system = pendulums(0.5);
        let trajectory =
            integrate_fixed(&system, &[0.1, 0.0, 0.0, 0.0], 0.0, 0.5, 0.1).expect("rk4");
        let samples: Vec<(f64, &[f64])> = trajectory.iter().collect();
        assert_eq!(samples.len(), trajectory.len());
        assert_eq!(trajectory.dimension(), 4);
        for ((t, state), (want_t, want_state)) in
            samples.iter().zip(trajectory.times().iter().zip(trajectory.states()))
        {
            assert_eq!(t, want_t);
            assert_eq!(*state, want_state.as_slice());
        }
    }

    #[test]
    fn in_phase_start_stays_in_phase() {
        let system = pendulums(0.5);
        let trajectory =
            integrate_fixed(&system, &[0.1, 0.0, 0.1, 0.0], 0.0, 5.0, 0.01).expect("rk4");
        let theta1 = trajectory.component(THETA1);
        let theta2 = trajectory.component(THETA2);
        for (a, b) in theta1.iter().zip(&theta2) {
            assert_eq!(a, b);
        }
        let omega = 9.81_f64.sqrt();
        let (t, last) = trajectory.last().expect("non-empty");
        assert!((last[THETA1] - 0.1 * (omega * t).cos()).abs() < 1e-6);
    }

    #[test]
    fn adaptive_reports_exactly_requested_times() {
        let settings = SimulationSettings::default();
        let run = simulate_pendulums(
            &PendulumParams::default(),
            &settings,
            IntegrationMethod::Rk45,
            AdaptiveSettings::default(),
        )
        .expect("simulation");
        assert_eq!(run.trajectory.times(), settings.evaluation_times().as_slice());
        let stats = run.stats.expect("adaptive stats");
        assert!(stats.accepted_steps > 0);
    }

    #[test]
    fn adaptive_agrees_with_fixed_step() {
        let system = pendulums(0.5);
        let y0 = [0.1, 0.0, 0.0, 0.0];
        let fixed = integrate_fixed(&system, &y0, 0.0, 10.0, 0.01).expect("rk4");
        let settings = AdaptiveSettings {
            rtol: 1e-9,
            atol: 1e-12,
            ..AdaptiveSettings::default()
        };
        let (adaptive, _) =
            integrate_adaptive(&system, &y0, 0.0, 10.0, &[2.5, 5.0, 10.0], settings)
                .expect("rk45");
        let (_, fixed_last) = fixed.last().expect("non-empty");
        let (t, adaptive_last) = adaptive.last().expect("non-empty");
        assert_eq!(t, 10.0);
        for (a, b) in fixed_last.iter().zip(adaptive_last) {
            assert!((a - b).abs() < 1e-6, "{a} vs {b}");
        }
    }

    #[test]
    fn adaptive_rejects_unsorted_or_out_of_range_times() {
        let system = pendulums(0.5);
        assert_err_contains(
            integrate_adaptive(
                &system,
                &[0.0; 4],
                0.0,
                1.0,
                &[0.5, 0.2],
                AdaptiveSettings::default(),
            ),
            "sorted",
        );
        assert_err_contains(
            integrate_adaptive(
                &system,
                &[0.0; 4],
                0.0,
                1.0,
                &[0.5, 2.0],
                AdaptiveSettings::default(),
            ),
            "within",
        );
    }

    #[test]
    fn adaptive_wraps_solver_failures() {
        let system = pendulums(0.5);
        let settings = AdaptiveSettings {
            max_steps: 1,
            ..AdaptiveSettings::default()
        };
        assert_err_contains(
            integrate_adaptive(&system, &[0.1, 0.0, 0.0, 0.0], 0.0, 20.0, &[20.0], settings),
            "budget",
        );
    }

    #[test]
    fn integration_method_parses_names() {
        assert_eq!(IntegrationMethod::from_name("rk4").expect("rk4"), IntegrationMethod::Rk4);
        assert_eq!(IntegrationMethod::from_name("rk45").expect("rk45"), IntegrationMethod::Rk45);
        assert_err_contains(IntegrationMethod::from_name("euler"), "Unknown");
    }
}
