//! # Active-Set QP
//!
//! $$
//! \min_{d}\ \tfrac12 d^\top B d + g^\top d\quad\text{s.t.}\quad A_E d = b_E,\ A_I d \ge b_I
//! $$
//!
//! Dense primal active-set solver for the SQP subproblem. `B` must be
//! symmetric positive definite.

use nalgebra::DMatrix;
use nalgebra::DVector;

const FEAS_TOL: f64 = 1e-10;
const STEP_TOL: f64 = 1e-12;
const MULT_TOL: f64 = 1e-10;
const KKT_BLOWUP: f64 = 1e12;

pub(crate) struct QpProblem<'a> {
  pub hessian: &'a DMatrix<f64>,
  pub gradient: &'a DVector<f64>,
  pub a_eq: &'a DMatrix<f64>,
  pub b_eq: &'a DVector<f64>,
  pub a_in: &'a DMatrix<f64>,
  pub b_in: &'a DVector<f64>,
}

#[derive(Clone, Debug)]
pub(crate) struct QpSolution {
  pub step: DVector<f64>,
  pub eq_multipliers: DVector<f64>,
  /// Zero for inequality rows outside the final working set.
  pub ineq_multipliers: DVector<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum QpError {
  /// No step satisfies the linearized constraints.
  Infeasible,
  /// KKT system could not be factorized.
  Singular,
}

fn row_dot(m: &DMatrix<f64>, j: usize, v: &DVector<f64>) -> f64 {
  m.row(j).iter().zip(v.iter()).map(|(a, b)| a * b).sum()
}

fn stack_rows(a_eq: &DMatrix<f64>, a_in: &DMatrix<f64>, working: &[usize]) -> DMatrix<f64> {
  let me = a_eq.nrows();
  let mut rows = DMatrix::zeros(me + working.len(), a_eq.ncols());
  rows.rows_mut(0, me).copy_from(a_eq);
  for (k, &j) in working.iter().enumerate() {
    rows.row_mut(me + k).copy_from(&a_in.row(j));
  }
  rows
}

/// Solve `[B -Aᵀ; A 0] [p; λ] = [-h; r]`.
fn solve_kkt(
  hessian: &DMatrix<f64>,
  shift: &DVector<f64>,
  rows: &DMatrix<f64>,
  rhs: &DVector<f64>,
) -> Option<(DVector<f64>, DVector<f64>)> {
  let n = hessian.nrows();
  let k = rows.nrows();

  let mut kkt = DMatrix::zeros(n + k, n + k);
  kkt.view_mut((0, 0), (n, n)).copy_from(hessian);
  kkt.view_mut((0, n), (n, k)).copy_from(&(-rows.transpose()));
  kkt.view_mut((n, 0), (k, n)).copy_from(rows);

  let mut b = DVector::zeros(n + k);
  b.rows_mut(0, n).copy_from(&(-shift));
  b.rows_mut(n, k).copy_from(rhs);

  let sol = kkt.lu().solve(&b)?;
  if sol.iter().any(|v| !v.is_finite()) || sol.amax() > KKT_BLOWUP {
    return None;
  }

  Some((sol.rows(0, n).into_owned(), sol.rows(n, k).into_owned()))
}

/// Most violated inequality outside the working set, if any.
fn most_violated(
  a_in: &DMatrix<f64>,
  b_in: &DVector<f64>,
  d: &DVector<f64>,
  working: &[usize],
) -> Option<usize> {
  let mut worst: Option<(usize, f64)> = None;
  for j in 0..a_in.nrows() {
    if working.contains(&j) {
      continue;
    }
    let violation = b_in[j] - row_dot(a_in, j, d);
    if violation > FEAS_TOL * (1.0 + b_in[j].abs()) && worst.map_or(true, |(_, v)| violation > v) {
      worst = Some((j, violation));
    }
  }
  worst.map(|(j, _)| j)
}

pub(crate) fn solve(problem: &QpProblem<'_>) -> Result<QpSolution, QpError> {
  let QpProblem {
    hessian,
    gradient,
    a_eq,
    b_eq,
    a_in,
    b_in,
  } = *problem;

  let n = hessian.nrows();
  let me = a_eq.nrows();
  let mi = a_in.nrows();

  // Phase 1: least-norm step satisfying the equalities, clamping violated
  // inequalities one at a time until the step is feasible.
  let identity = DMatrix::identity(n, n);
  let origin = DVector::zeros(n);
  let mut working: Vec<usize> = Vec::new();
  let mut d = loop {
    let rows = stack_rows(a_eq, a_in, &working);
    let mut rhs = DVector::zeros(rows.nrows());
    rhs.rows_mut(0, me).copy_from(b_eq);
    for (k, &j) in working.iter().enumerate() {
      rhs[me + k] = b_in[j];
    }

    let (d, _) = solve_kkt(&identity, &origin, &rows, &rhs).ok_or(QpError::Infeasible)?;
    match most_violated(a_in, b_in, &d, &working) {
      None => break d,
      Some(j) => working.push(j),
    }
  };

  // Phase 2: primal active-set iterations from the feasible step.
  let max_iter = 10 * (n + me + mi) + 20;
  let mut lambda = DVector::zeros(me + working.len());
  for _ in 0..max_iter {
    let shift = hessian * &d + gradient;
    let rows = stack_rows(a_eq, a_in, &working);
    let zeros = DVector::zeros(rows.nrows());
    let (p, lam) = solve_kkt(hessian, &shift, &rows, &zeros).ok_or(QpError::Singular)?;
    lambda = lam;

    if p.amax() <= STEP_TOL * (1.0 + d.amax()) {
      let release = working
        .iter()
        .enumerate()
        .map(|(k, _)| (k, lambda[me + k]))
        .filter(|(_, l)| *l < -MULT_TOL)
        .min_by(|a, b| a.1.total_cmp(&b.1));

      match release {
        Some((k, _)) => {
          working.remove(k);
          continue;
        }
        None => break,
      }
    }

    let mut alpha = 1.0;
    let mut blocking = None;
    for j in 0..mi {
      if working.contains(&j) {
        continue;
      }
      let ap = row_dot(a_in, j, &p);
      if ap < -STEP_TOL {
        let slack = row_dot(a_in, j, &d) - b_in[j];
        let t = (slack / -ap).max(0.0);
        if t < alpha {
          alpha = t;
          blocking = Some(j);
        }
      }
    }

    d.axpy(alpha, &p, 1.0);
    if let Some(j) = blocking {
      working.push(j);
      lambda = DVector::zeros(me + working.len());
    }
  }

  let mut ineq_multipliers = DVector::zeros(mi);
  if lambda.len() == me + working.len() {
    for (k, &j) in working.iter().enumerate() {
      ineq_multipliers[j] = lambda[me + k];
    }
  }

  Ok(QpSolution {
    step: d,
    eq_multipliers: lambda.rows(0, me).into_owned(),
    ineq_multipliers,
  })
}
