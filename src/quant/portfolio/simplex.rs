//! # Random Simplex Weights
//!
//! $$
//! u_i\sim\mathcal U[0,1),\qquad w_i=\frac{u_i}{\sum_j u_j}
//! $$
//!
//! Normalized uniform draws. This is not the uniform distribution on the
//! simplex: mass concentrates on balanced allocations, and frontier samples
//! depend on exactly this scheme.

use ndarray::Array1;
use ndarray_rand::RandomExt;
use rand::Rng;
use rand_distr::Uniform;

use super::error::InputError;
use super::error::Result;

/// Draw one long-only, fully invested weight vector of length `n_assets`.
pub fn random_simplex<R: Rng + ?Sized>(n_assets: usize, rng: &mut R) -> Result<Array1<f64>> {
  if n_assets == 0 {
    return Err(InputError::Empty("random simplex needs at least one asset".to_string()).into());
  }

  let unit = Uniform::new(0.0, 1.0);
  loop {
    let mut w = Array1::random_using(n_assets, unit, rng);
    let total = w.sum();
    // an all-zero draw cannot be normalized
    if total > 0.0 {
      w /= total;
      return Ok(w);
    }
  }
}
