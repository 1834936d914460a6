use crate::config::AdaptiveSettings;
use crate::traits::{DynamicalSystem, Scalar, Steppable};
use log::debug;
use thiserror::Error;

/// Classic Runge-Kutta 4th Order Solver
pub struct RK4<T: Scalar> {
    k1: Vec<T>,
    k2: Vec<T>,
    k3: Vec<T>,
    k4: Vec<T>,
    tmp: Vec<T>,
}

impl<T: Scalar> RK4<T> {
    pub fn new(dim: usize) -> Self {
        Self {
            k1: vec![T::zero(); dim],
            k2: vec![T::zero(); dim],
            k3: vec![T::zero(); dim],
            k4: vec![T::zero(); dim],
            tmp: vec![T::zero(); dim],
        }
    }
}

impl<T: Scalar> Steppable<T> for RK4<T> {
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T) {
        let two = T::one() + T::one();
        let half = T::one() / two;
        let sixth = T::one() / (two + two + two);

        let t0 = *t;

        // k1 = f(t, y)
        system.apply(t0, state, &mut self.k1);

        // k2 = f(t + h/2, y + h/2 * k1)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * half * self.k1[i];
        }
        system.apply(t0 + dt * half, &self.tmp, &mut self.k2);

        // k3 = f(t + h/2, y + h/2 * k2)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * half * self.k2[i];
        }
        system.apply(t0 + dt * half, &self.tmp, &mut self.k3);

        // k4 = f(t + h, y + h * k3)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k3[i];
        }
        system.apply(t0 + dt, &self.tmp, &mut self.k4);

        for i in 0..state.len() {
            state[i] = state[i]
                + dt * sixth * (self.k1[i] + two * self.k2[i] + two * self.k3[i] + self.k4[i]);
        }

        *t = t0 + dt;
    }

    fn order(&self) -> usize {
        4
    }
}

/// Failures of the adaptive solver.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegrationError {
    #[error("Step size {h:e} fell below the minimum at t = {t}.")]
    StepSizeTooSmall { t: f64, h: f64 },
    #[error("Exceeded the budget of {max_steps} steps before reaching t = {target}.")]
    MaxStepsExceeded { max_steps: usize, target: f64 },
    #[error("Non-finite state encountered at t = {t}.")]
    NonFiniteState { t: f64 },
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Counters reported by the adaptive solver.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct SolverStats {
    pub fn_evals: usize,
    pub accepted_steps: usize,
    pub rejected_steps: usize,
}

/// I-controller: h_new = safety * h * err^(-1/(p+1)).
#[derive(Debug, Clone, Copy)]
pub struct StepController {
    pub safety: f64,
    pub min_factor: f64,
    pub max_factor: f64,
    exponent: f64,
}

impl Default for StepController {
    fn default() -> Self {
        Self {
            safety: 0.9,
            min_factor: 0.2,
            max_factor: 10.0,
            // error estimator is 4th order
            exponent: 1.0 / 5.0,
        }
    }
}

impl StepController {
    pub fn factor(&self, error: f64) -> f64 {
        if error == 0.0 {
            return self.max_factor;
        }
        (self.safety * error.powf(-self.exponent)).clamp(self.min_factor, self.max_factor)
    }
}

// Dormand-Prince 5(4) tableau.
const C2: f64 = 1.0 / 5.0;
const C3: f64 = 3.0 / 10.0;
const C4: f64 = 4.0 / 5.0;
const C5: f64 = 8.0 / 9.0;

const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;

// 5th order weights; also the last row of A (FSAL).
const B1: f64 = 35.0 / 384.0;
const B3: f64 = 500.0 / 1113.0;
const B4: f64 = 125.0 / 192.0;
const B5: f64 = -2187.0 / 6784.0;
const B6: f64 = 11.0 / 84.0;

// b - b_hat, the embedded error weights.
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

/// Outcome of a single trial step.
#[derive(Debug, Clone)]
pub struct TrialStep {
    pub y: Vec<f64>,
    pub error: f64,
    pub accepted: bool,
    /// Suggested magnitude of the next step.
    pub h_next: f64,
}

/// Adaptive explicit Runge-Kutta 4(5) solver (Dormand-Prince pair).
pub struct DormandPrince45 {
    settings: AdaptiveSettings,
    controller: StepController,
    k1: Vec<f64>,
    k2: Vec<f64>,
    k3: Vec<f64>,
    k4: Vec<f64>,
    k5: Vec<f64>,
    k6: Vec<f64>,
    k7: Vec<f64>,
    tmp: Vec<f64>,
    /// `k1` already holds the derivative at the current point.
    k1_current: bool,
    h: Option<f64>,
    pub stats: SolverStats,
}

impl DormandPrince45 {
    pub fn new(dim: usize, settings: AdaptiveSettings) -> Self {
        Self {
            settings,
            controller: StepController::default(),
            k1: vec![0.0; dim],
            k2: vec![0.0; dim],
            k3: vec![0.0; dim],
            k4: vec![0.0; dim],
            k5: vec![0.0; dim],
            k6: vec![0.0; dim],
            k7: vec![0.0; dim],
            tmp: vec![0.0; dim],
            k1_current: false,
            h: settings.first_step,
            stats: SolverStats::default(),
        }
    }

    fn validate(&self, t: f64, state: &[f64], t_target: f64) -> Result<(), IntegrationError> {
        let s = &self.settings;
        if !(s.rtol > 0.0) || !(s.atol >= 0.0) || !s.rtol.is_finite() || !s.atol.is_finite() {
            return Err(IntegrationError::InvalidInput(
                "tolerances must be finite, rtol positive and atol non-negative".into(),
            ));
        }
        if !(s.min_step > 0.0) || !(s.max_step >= s.min_step) {
            return Err(IntegrationError::InvalidInput(
                "step limits must satisfy 0 < min_step <= max_step".into(),
            ));
        }
        if state.len() != self.k1.len() {
            return Err(IntegrationError::InvalidInput(format!(
                "state has {} components, solver was built for {}",
                state.len(),
                self.k1.len()
            )));
        }
        if !t.is_finite() || !t_target.is_finite() {
            return Err(IntegrationError::InvalidInput("times must be finite".into()));
        }
        if t_target < t {
            return Err(IntegrationError::InvalidInput(format!(
                "cannot integrate backwards from {t} to {t_target}"
            )));
        }
        if !state.iter().all(|v| v.is_finite()) {
            return Err(IntegrationError::NonFiniteState { t });
        }
        Ok(())
    }

    fn error_scale(&self, y: f64, y_new: f64) -> f64 {
        self.settings.atol + self.settings.rtol * y.abs().max(y_new.abs())
    }

    /// Initial step heuristic from Hairer, Nørsett & Wanner (II.4).
    fn initial_step(&mut self, system: &impl DynamicalSystem<f64>, t: f64, y: &[f64]) -> f64 {
        let dim = y.len();
        system.apply(t, y, &mut self.k1);
        self.stats.fn_evals += 1;
        self.k1_current = true;

        let scale: Vec<f64> = y
            .iter()
            .map(|v| self.settings.atol + self.settings.rtol * v.abs())
            .collect();
        let d0 = rms(y.iter().zip(&scale).map(|(v, s)| v / s), dim);
        let d1 = rms(self.k1.iter().zip(&scale).map(|(v, s)| v / s), dim);
        let h0 = if d0 < 1e-5 || d1 < 1e-5 { 1e-6 } else { 0.01 * d0 / d1 };

        for i in 0..dim {
            self.tmp[i] = y[i] + h0 * self.k1[i];
        }
        system.apply(t + h0, &self.tmp, &mut self.k2);
        self.stats.fn_evals += 1;
        let d2 = rms(
            self.k2
                .iter()
                .zip(&self.k1)
                .zip(&scale)
                .map(|((f1, f0), s)| (f1 - f0) / s),
            dim,
        ) / h0;

        let h1 = if d1 <= 1e-15 && d2 <= 1e-15 {
            (h0 * 1e-3).max(1e-6)
        } else {
            (0.01 / d1.max(d2)).powf(1.0 / 5.0)
        };
        (100.0 * h0).min(h1)
    }

    /// Computes one Dormand-Prince step of size `h` from `(t, y)` without
    /// committing it. `k1` is reused when it already belongs to `(t, y)`.
    fn trial_step(
        &mut self,
        system: &impl DynamicalSystem<f64>,
        t: f64,
        y: &[f64],
        h: f64,
    ) -> TrialStep {
        let n = y.len();

        if !self.k1_current {
            system.apply(t, y, &mut self.k1);
            self.stats.fn_evals += 1;
            self.k1_current = true;
        }

        for i in 0..n {
            self.tmp[i] = y[i] + h * A21 * self.k1[i];
        }
        system.apply(t + C2 * h, &self.tmp, &mut self.k2);

        for i in 0..n {
            self.tmp[i] = y[i] + h * (A31 * self.k1[i] + A32 * self.k2[i]);
        }
        system.apply(t + C3 * h, &self.tmp, &mut self.k3);

        for i in 0..n {
            self.tmp[i] = y[i] + h * (A41 * self.k1[i] + A42 * self.k2[i] + A43 * self.k3[i]);
        }
        system.apply(t + C4 * h, &self.tmp, &mut self.k4);

        for i in 0..n {
            self.tmp[i] = y[i]
                + h * (A51 * self.k1[i] + A52 * self.k2[i] + A53 * self.k3[i] + A54 * self.k4[i]);
        }
        system.apply(t + C5 * h, &self.tmp, &mut self.k5);

        for i in 0..n {
            self.tmp[i] = y[i]
                + h * (A61 * self.k1[i]
                    + A62 * self.k2[i]
                    + A63 * self.k3[i]
                    + A64 * self.k4[i]
                    + A65 * self.k5[i]);
        }
        system.apply(t + h, &self.tmp, &mut self.k6);

        let mut y_new = vec![0.0; n];
        for i in 0..n {
            y_new[i] = y[i]
                + h * (B1 * self.k1[i]
                    + B3 * self.k3[i]
                    + B4 * self.k4[i]
                    + B5 * self.k5[i]
                    + B6 * self.k6[i]);
        }
        system.apply(t + h, &y_new, &mut self.k7);
        self.stats.fn_evals += 6;

        let error = rms(
            (0..n).map(|i| {
                let e = h
                    * (E1 * self.k1[i]
                        + E3 * self.k3[i]
                        + E4 * self.k4[i]
                        + E5 * self.k5[i]
                        + E6 * self.k6[i]
                        + E7 * self.k7[i]);
                e / self.error_scale(y[i], y_new[i])
            }),
            n,
        );

        let accepted = error <= 1.0;
        let h_next = (h.abs() * self.controller.factor(error))
            .clamp(self.settings.min_step, self.settings.max_step);

        TrialStep {
            y: y_new,
            error,
            accepted,
            h_next,
        }
    }

    /// Advances `state` from `*t` to exactly `t_target`, choosing internal
    /// steps to satisfy the tolerances. The step size carries over between
    /// calls.
    pub fn advance(
        &mut self,
        system: &impl DynamicalSystem<f64>,
        t: &mut f64,
        state: &mut [f64],
        t_target: f64,
    ) -> Result<(), IntegrationError> {
        self.validate(*t, state, t_target)?;
        if t_target == *t {
            return Ok(());
        }
        // the caller may have changed the state since the last call
        self.k1_current = false;

        let mut h = match self.h {
            Some(h) if h > 0.0 => h,
            _ => self.initial_step(system, *t, state),
        }
        .clamp(self.settings.min_step, self.settings.max_step);

        let mut steps = 0usize;
        while *t < t_target {
            let remaining = t_target - *t;
            let clipped = remaining <= h;
            let h_try = if clipped { remaining } else { h };

            let trial = self.trial_step(system, *t, state, h_try);
            steps += 1;

            if trial.accepted {
                self.stats.accepted_steps += 1;
                *t = if clipped { t_target } else { *t + h_try };
                state.copy_from_slice(&trial.y);
                // first same as last
                std::mem::swap(&mut self.k1, &mut self.k7);
                if !state.iter().all(|v| v.is_finite()) {
                    return Err(IntegrationError::NonFiniteState { t: *t });
                }
                // a step shortened to land on the target should not shrink the next one
                h = if clipped { h.max(trial.h_next) } else { trial.h_next };
            } else {
                self.stats.rejected_steps += 1;
                if h_try <= self.settings.min_step {
                    return Err(IntegrationError::StepSizeTooSmall { t: *t, h: h_try });
                }
                h = trial.h_next.min(h_try);
            }

            if steps > self.settings.max_steps {
                return Err(IntegrationError::MaxStepsExceeded {
                    max_steps: self.settings.max_steps,
                    target: t_target,
                });
            }
        }

        self.h = Some(h);
        debug!(
            "rk45 reached t = {} ({} accepted, {} rejected, {} evaluations)",
            t_target, self.stats.accepted_steps, self.stats.rejected_steps, self.stats.fn_evals
        );
        Ok(())
    }
}

fn rms(values: impl Iterator<Item = f64>, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    (values.map(|v| v * v).sum::<f64>() / n as f64).sqrt()
}
