//! Stiffness matrix of identical masses on a ring.
//!
//! Every node is tied to its two nearest neighbours (`k1`), its two
//! next-nearest neighbours (`k2`) and the diametrically opposite node
//! (`k3`). Each connection subtracts its constant from the off-diagonal
//! entry and adds it to the diagonal, so every row sums to zero: a uniform
//! displacement of the whole ring produces no restoring force.

use crate::config::RingParams;
use anyhow::Result;
use log::debug;
use nalgebra::DMatrix;

pub fn stiffness_matrix(params: &RingParams) -> Result<DMatrix<f64>> {
    params.validate()?;

    let n = params.n;
    let mut k = DMatrix::<f64>::zeros(n, n);

    for i in 0..n {
        let next = (i + 1) % n;
        let prev = (i + n - 1) % n;
        k[(i, next)] -= params.k1;
        k[(i, prev)] -= params.k1;
        k[(i, i)] += 2.0 * params.k1;

        let next2 = (i + 2) % n;
        let prev2 = (i + n - 2) % n;
        k[(i, next2)] -= params.k2;
        k[(i, prev2)] -= params.k2;
        k[(i, i)] += 2.0 * params.k2;

        let opposite = (i + n / 2) % n;
        k[(i, opposite)] -= params.k3;
        k[(i, i)] += params.k3;
    }

    debug!(
        "assembled {}x{} ring stiffness (k1 = {}, k2 = {}, k3 = {})",
        n, n, params.k1, params.k2, params.k3
    );
    Ok(k)
}

/// Sum of each row; zero for a well-formed ring.
pub fn row_sums(k: &DMatrix<f64>) -> Vec<f64> {
    k.row_iter().map(|row| row.sum()).collect()
}
