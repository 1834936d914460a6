use anyhow::{bail, Context, Result};
use log::{debug, warn};
use nalgebra::{DMatrix, DVector, SymmetricEigen};
use serde::Serialize;

/// Eigenvalues smaller than this fraction of the largest matrix entry are
/// treated as exact zeros.
const ZERO_EIGENVALUE_SCALE: f64 = 1e-10;

#[derive(Debug, Clone, Serialize)]
pub struct NormalMode {
    /// Eigenvalue of the stiffness matrix.
    pub eigenvalue: f64,
    /// Angular frequency `sqrt(eigenvalue / mass)`, exactly zero for rigid modes.
    pub frequency: f64,
    /// Unit-norm mode shape.
    pub vector: Vec<f64>,
}

impl NormalMode {
    /// Rigid modes have no restoring force and are not animated.
    pub fn is_rigid(&self) -> bool {
        self.frequency == 0.0
    }

    /// Per-oscillator displacement `A * v_j * cos(omega t)`.
    ///
    /// Rigid modes are held at zero displacement instead of evaluating the
    /// cosine, which would otherwise translate the whole system by `A * v`.
    pub fn displacement(&self, amplitude: f64, t: f64) -> Vec<f64> {
        let envelope = self.envelope(amplitude, t);
        self.vector.iter().map(|v| v * envelope).collect()
    }

    /// Shared scalar factor of [`NormalMode::displacement`].
    pub fn envelope(&self, amplitude: f64, t: f64) -> f64 {
        if self.is_rigid() {
            0.0
        } else {
            amplitude * (self.frequency * t).cos()
        }
    }
}

/// Normal modes of a symmetric stiffness matrix in ascending eigenvalue order.
#[derive(Debug, Clone, Serialize)]
pub struct ModeSet {
    mass: f64,
    modes: Vec<NormalMode>,
}

impl ModeSet {
    /// Diagonalizes `stiffness` for identical masses `mass`.
    pub fn from_stiffness(stiffness: &DMatrix<f64>, mass: f64) -> Result<Self> {
        let dim = stiffness.nrows();
        if dim == 0 || stiffness.ncols() != dim {
            bail!(
                "Stiffness matrix must be square and non-empty, got {}x{}.",
                stiffness.nrows(),
                stiffness.ncols()
            );
        }
        if !(mass > 0.0) {
            bail!("Mass must be positive.");
        }
        if stiffness.iter().any(|v| !v.is_finite()) {
            bail!("Stiffness matrix contains non-finite entries.");
        }
        let scale = stiffness.amax().max(f64::MIN_POSITIVE);
        let asymmetry = (stiffness - stiffness.transpose()).amax();
        if asymmetry > 1e-12 * scale {
            bail!(
                "Stiffness matrix is not symmetric (max |K - K^T| = {:e}).",
                asymmetry
            );
        }

        let eigen = SymmetricEigen::new(stiffness.clone());
        let zero_tol = ZERO_EIGENVALUE_SCALE * scale;

        let mut order: Vec<usize> = (0..dim).collect();
        order.sort_by(|&a, &b| eigen.eigenvalues[a].total_cmp(&eigen.eigenvalues[b]));

        let mut modes = Vec::with_capacity(dim);
        for idx in order {
            let lambda = eigen.eigenvalues[idx];
            if lambda < -zero_tol {
                warn!(
                    "stiffness matrix has negative eigenvalue {:e}; treating its frequency as zero",
                    lambda
                );
            }
            let frequency = if lambda.abs() <= zero_tol {
                0.0
            } else {
                (lambda.max(0.0) / mass).sqrt()
            };
            let mut vector: Vec<f64> = eigen.eigenvectors.column(idx).iter().copied().collect();
            orient(&mut vector);
            modes.push(NormalMode {
                eigenvalue: if lambda.abs() <= zero_tol { 0.0 } else { lambda },
                frequency,
                vector,
            });
        }

        debug!(
            "mode frequencies: {:?}",
            modes.iter().map(|m| m.frequency).collect::<Vec<_>>()
        );
        Ok(Self { mass, modes })
    }

    pub fn dimension(&self) -> usize {
        self.modes.len()
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn modes(&self) -> &[NormalMode] {
        &self.modes
    }

    pub fn mode(&self, index: usize) -> Option<&NormalMode> {
        self.modes.get(index)
    }

    pub fn eigenvalues(&self) -> Vec<f64> {
        self.modes.iter().map(|m| m.eigenvalue).collect()
    }

    pub fn frequencies(&self) -> Vec<f64> {
        self.modes.iter().map(|m| m.frequency).collect()
    }

    /// Mode shapes as the columns of a matrix.
    pub fn eigenvector_matrix(&self) -> DMatrix<f64> {
        let dim = self.dimension();
        DMatrix::from_fn(dim, dim, |row, col| self.modes[col].vector[row])
    }

    /// `V diag(lambda) V^T`.
    pub fn reconstruct(&self) -> DMatrix<f64> {
        let v = self.eigenvector_matrix();
        let lambda = DMatrix::from_diagonal(&DVector::from_vec(self.eigenvalues()));
        &v * lambda * v.transpose()
    }

    /// Displacement history of every oscillator for one mode.
    pub fn mode_trajectory(
        &self,
        index: usize,
        amplitude: f64,
        times: &[f64],
    ) -> Result<ModeTrajectory> {
        let mode = self
            .mode(index)
            .with_context(|| format!("Mode index {} out of range (have {}).", index, self.dimension()))?;
        Ok(ModeTrajectory::sample(index, mode, amplitude, times))
    }

    /// [`ModeSet::mode_trajectory`] for every mode.
    pub fn all_mode_trajectories(&self, amplitude: f64, times: &[f64]) -> Vec<ModeTrajectory> {
        self.modes
            .iter()
            .enumerate()
            .map(|(index, mode)| ModeTrajectory::sample(index, mode, amplitude, times))
            .collect()
    }
}

/// Flips the sign so the largest-magnitude component is positive.
fn orient(vector: &mut [f64]) {
    let mut pivot = 0.0_f64;
    for &v in vector.iter() {
        if v.abs() > pivot.abs() + 1e-12 {
            pivot = v;
        }
    }
    if pivot < 0.0 {
        for v in vector.iter_mut() {
            *v = -*v;
        }
    }
}

/// Oscillation pattern of a single mode: `displacements[j][i]` is oscillator
/// `j` at `times[i]`.
#[derive(Debug, Clone, Serialize)]
pub struct ModeTrajectory {
    pub mode: usize,
    pub frequency: f64,
    pub times: Vec<f64>,
    pub displacements: Vec<Vec<f64>>,
}

impl ModeTrajectory {
    fn sample(index: usize, mode: &NormalMode, amplitude: f64, times: &[f64]) -> Self {
        let envelopes: Vec<f64> = times.iter().map(|&t| mode.envelope(amplitude, t)).collect();
        let displacements = mode
            .vector
            .iter()
            .map(|v| envelopes.iter().map(|e| v * e).collect())
            .collect();
        Self {
            mode: index,
            frequency: mode.frequency,
            times: times.to_vec(),
            displacements,
        }
    }
}
