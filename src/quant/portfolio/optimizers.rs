//! # Portfolio Optimizers
//!
//! $$
//! \min_{\mathbf{w}}\ -\frac{\mathbf{w}^\top\mu}{\sqrt{\mathbf{w}^\top\Sigma\mathbf{w}}}\quad\text{s.t.}\quad \mathbf 1^\top\mathbf{w}=1,\ 0\le w_i\le 1
//! $$
//!
//! Generic constrained minimizers and the long-only Sharpe maximization built
//! on top of them.

use argmin::core::CostFunction;
use argmin::core::Executor;
use argmin::core::TerminationReason;
use argmin::core::TerminationStatus;
use argmin::solver::neldermead::NelderMead;
use nalgebra::DMatrix;
use nalgebra::DVector;
use ndarray::Array1;
use ndarray::ArrayView1;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::data::ReturnsModel;
use super::error::InputError;
use super::error::Result;
use super::qp;
use super::statistics::statistics;
use super::types::OptimizationResult;

/// Box constraint `lower <= x <= upper` for one variable.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
  pub lower: f64,
  pub upper: f64,
}

impl Bounds {
  pub fn new(lower: f64, upper: f64) -> Self {
    Self { lower, upper }
  }

  /// `[0, 1]`: no short selling, no leverage.
  pub fn unit() -> Self {
    Self::new(0.0, 1.0)
  }

  fn clamp(&self, x: f64) -> f64 {
    x.max(self.lower).min(self.upper)
  }
}

/// General constraint on the decision vector.
pub enum Constraint {
  /// `f(x) == 0`
  Eq(Box<dyn Fn(&[f64]) -> f64>),
  /// `f(x) >= 0`
  Ineq(Box<dyn Fn(&[f64]) -> f64>),
}

impl Constraint {
  pub fn equality(f: impl Fn(&[f64]) -> f64 + 'static) -> Self {
    Self::Eq(Box::new(f))
  }

  pub fn inequality(f: impl Fn(&[f64]) -> f64 + 'static) -> Self {
    Self::Ineq(Box::new(f))
  }

  fn eval(&self, x: &[f64]) -> f64 {
    match self {
      Self::Eq(f) | Self::Ineq(f) => f(x),
    }
  }

  fn violation(&self, x: &[f64]) -> f64 {
    match self {
      Self::Eq(f) => f(x).abs(),
      Self::Ineq(f) => (-f(x)).max(0.0),
    }
  }
}

fn total_violation(constraints: &[Constraint], x: &[f64]) -> f64 {
  constraints.iter().map(|c| c.violation(x)).sum()
}

/// Outcome of a [`Minimizer`] run.
#[derive(Clone, Debug, PartialEq)]
pub struct MinimizeResult {
  /// Best point found.
  pub x: Vec<f64>,
  /// Objective value at `x`.
  pub fun: f64,
  /// Whether the convergence criteria were met.
  pub success: bool,
  pub iterations: usize,
  pub message: String,
}

impl MinimizeResult {
  fn failed(x: Vec<f64>, fun: f64, iterations: usize, message: &str) -> Self {
    Self {
      x,
      fun,
      success: false,
      iterations,
      message: message.to_string(),
    }
  }
}

/// Constrained nonlinear minimization capability.
///
/// Implementations never panic on non-convergence; they report it through
/// [`MinimizeResult::success`] along with the best point found.
pub trait Minimizer {
  fn minimize(
    &self,
    objective: &dyn Fn(&[f64]) -> f64,
    initial: &[f64],
    bounds: &[Bounds],
    constraints: &[Constraint],
  ) -> MinimizeResult;
}

/// Finite-difference gradient; one-sided where one probe is not finite.
fn fd_gradient(f: &dyn Fn(&[f64]) -> f64, x: &[f64], fx: f64, step: f64) -> Option<DVector<f64>> {
  let mut grad = DVector::zeros(x.len());
  let mut probe = x.to_vec();

  for i in 0..x.len() {
    let h = step * x[i].abs().max(1.0);
    probe[i] = x[i] + h;
    let fp = f(&probe);
    probe[i] = x[i] - h;
    let fm = f(&probe);
    probe[i] = x[i];

    grad[i] = match (fp.is_finite(), fm.is_finite()) {
      (true, true) => (fp - fm) / (2.0 * h),
      (true, false) => (fp - fx) / h,
      (false, true) => (fx - fm) / h,
      (false, false) => return None,
    };
  }

  if grad.iter().all(|g| g.is_finite()) {
    Some(grad)
  } else {
    None
  }
}

struct Linearization {
  values: DVector<f64>,
  jacobian: DMatrix<f64>,
}

fn linearize(constraints: &[&Constraint], x: &[f64], step: f64) -> Option<Linearization> {
  let n = x.len();
  let mut values = DVector::zeros(constraints.len());
  let mut jacobian = DMatrix::zeros(constraints.len(), n);

  for (k, c) in constraints.iter().enumerate() {
    let eval = |y: &[f64]| c.eval(y);
    let value = eval(x);
    if !value.is_finite() {
      return None;
    }
    let grad = fd_gradient(&eval, x, value, step)?;
    values[k] = value;
    jacobian.row_mut(k).copy_from(&grad.transpose());
  }

  Some(Linearization { values, jacobian })
}

/// Options for [`Slsqp`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SlsqpOptions {
  /// Maximum number of SQP iterations.
  pub max_iter: usize,
  /// Objective-change / predicted-decrease tolerance.
  pub ftol: f64,
  /// Relative finite-difference step.
  pub fd_step: f64,
}

impl Default for SlsqpOptions {
  fn default() -> Self {
    Self {
      max_iter: 100,
      ftol: 1e-6,
      fd_step: f64::EPSILON.cbrt(),
    }
  }
}

/// Sequential quadratic programming with a damped BFGS Hessian.
///
/// Each iteration solves a QP on the linearized constraints (bounds included
/// as inequality rows) and backtracks on an L1 merit function. Gradients and
/// constraint Jacobians are central finite differences.
#[derive(Clone, Copy, Debug, Default)]
pub struct Slsqp {
  pub options: SlsqpOptions,
}

impl Slsqp {
  pub fn new(options: SlsqpOptions) -> Self {
    Self { options }
  }
}

impl Minimizer for Slsqp {
  fn minimize(
    &self,
    objective: &dyn Fn(&[f64]) -> f64,
    initial: &[f64],
    bounds: &[Bounds],
    constraints: &[Constraint],
  ) -> MinimizeResult {
    let opts = self.options;
    let n = initial.len();

    if n == 0 {
      return MinimizeResult::failed(Vec::new(), f64::NAN, 0, "Empty initial point");
    }
    if bounds.len() != n {
      return MinimizeResult::failed(
        initial.to_vec(),
        f64::NAN,
        0,
        "Bounds length does not match the initial point",
      );
    }

    let clamp = |x: &mut [f64]| {
      for (xi, b) in x.iter_mut().zip(bounds.iter()) {
        *xi = b.clamp(*xi);
      }
    };

    let eq: Vec<&Constraint> = constraints
      .iter()
      .filter(|c| matches!(c, Constraint::Eq(_)))
      .collect();
    let ineq: Vec<&Constraint> = constraints
      .iter()
      .filter(|c| matches!(c, Constraint::Ineq(_)))
      .collect();

    let finite_lower: Vec<usize> = (0..n).filter(|&i| bounds[i].lower.is_finite()).collect();
    let finite_upper: Vec<usize> = (0..n).filter(|&i| bounds[i].upper.is_finite()).collect();
    let m_in = ineq.len() + finite_lower.len() + finite_upper.len();

    let mut x = initial.to_vec();
    clamp(&mut x);

    let mut f = objective(&x);
    if !f.is_finite() {
      return MinimizeResult::failed(x, f, 0, "Objective is not finite at the initial point");
    }

    let Some(mut grad) = fd_gradient(objective, &x, f, opts.fd_step) else {
      return MinimizeResult::failed(x, f, 0, "Objective gradient is not finite");
    };
    let (Some(mut lin_eq), Some(mut lin_in)) = (
      linearize(&eq, &x, opts.fd_step),
      linearize(&ineq, &x, opts.fd_step),
    ) else {
      return MinimizeResult::failed(x, f, 0, "Constraint evaluation is not finite");
    };

    let mut hessian = DMatrix::<f64>::identity(n, n);
    let mut penalty = 0.0_f64;

    for iter in 1..=opts.max_iter {
      // Linearized general inequalities first, then finite lower and upper bounds.
      let mut a_in = DMatrix::zeros(m_in, n);
      let mut b_in = DVector::zeros(m_in);
      a_in.rows_mut(0, ineq.len()).copy_from(&lin_in.jacobian);
      b_in.rows_mut(0, ineq.len()).copy_from(&(-&lin_in.values));
      let mut row = ineq.len();
      for &i in &finite_lower {
        a_in[(row, i)] = 1.0;
        b_in[row] = bounds[i].lower - x[i];
        row += 1;
      }
      for &i in &finite_upper {
        a_in[(row, i)] = -1.0;
        b_in[row] = x[i] - bounds[i].upper;
        row += 1;
      }
      let b_eq = -&lin_eq.values;

      let sub = match qp::solve(&qp::QpProblem {
        hessian: &hessian,
        gradient: &grad,
        a_eq: &lin_eq.jacobian,
        b_eq: &b_eq,
        a_in: &a_in,
        b_in: &b_in,
      }) {
        Ok(sub) => sub,
        Err(qp::QpError::Infeasible) => {
          return MinimizeResult::failed(x, f, iter, "Inequality constraints incompatible");
        }
        Err(qp::QpError::Singular) => {
          return MinimizeResult::failed(x, f, iter, "Singular matrix in QP subproblem");
        }
      };

      let d = sub.step;
      let violation = total_violation(constraints, &x);
      let slope = grad.dot(&d);

      if violation <= opts.ftol && (slope.abs() <= opts.ftol || d.amax() <= f64::EPSILON) {
        debug!(iter, f, "slsqp converged on first-order conditions");
        return MinimizeResult {
          x,
          fun: f,
          success: true,
          iterations: iter,
          message: "Optimization terminated successfully".to_string(),
        };
      }

      let general_ineq = sub.ineq_multipliers.rows(0, ineq.len());
      let lambda_max = sub
        .eq_multipliers
        .iter()
        .chain(general_ineq.iter())
        .fold(0.0_f64, |acc, l| acc.max(l.abs()));
      penalty = penalty.max(1.5 * lambda_max + 1e-8);

      let merit = f + penalty * violation;
      let merit_slope = (slope - penalty * violation).min(0.0);

      let mut alpha = 1.0;
      let mut accepted = None;
      while alpha > 1e-12 {
        let mut trial = x.clone();
        for (t, di) in trial.iter_mut().zip(d.iter()) {
          *t += alpha * di;
        }
        clamp(&mut trial);

        let f_trial = objective(&trial);
        if f_trial.is_finite() {
          let merit_trial = f_trial + penalty * total_violation(constraints, &trial);
          if merit_trial <= merit + 1e-4 * alpha * merit_slope {
            accepted = Some((trial, f_trial));
            break;
          }
        }
        alpha *= 0.5;
      }

      let Some((x_new, f_new)) = accepted else {
        let message = "Positive directional derivative for linesearch";
        return MinimizeResult::failed(x, f, iter, message);
      };

      let Some(grad_new) = fd_gradient(objective, &x_new, f_new, opts.fd_step) else {
        return MinimizeResult::failed(x_new, f_new, iter, "Objective gradient is not finite");
      };
      let (Some(lin_eq_new), Some(lin_in_new)) = (
        linearize(&eq, &x_new, opts.fd_step),
        linearize(&ineq, &x_new, opts.fd_step),
      ) else {
        return MinimizeResult::failed(x_new, f_new, iter, "Constraint evaluation is not finite");
      };

      // Lagrangian gradient difference; bound rows are linear and drop out.
      let lagrangian_grad = |g: &DVector<f64>, e: &Linearization, i: &Linearization| {
        g - e.jacobian.transpose() * &sub.eq_multipliers - i.jacobian.transpose() * general_ineq
      };
      let y = lagrangian_grad(&grad_new, &lin_eq_new, &lin_in_new)
        - lagrangian_grad(&grad, &lin_eq, &lin_in);
      let s = DVector::from_iterator(n, x_new.iter().zip(x.iter()).map(|(a, b)| a - b));
      damped_bfgs_update(&mut hessian, &s, &y);

      let df = f_new - f;
      debug!(iter, f = f_new, alpha, violation, "slsqp iteration");

      x = x_new;
      f = f_new;
      grad = grad_new;
      lin_eq = lin_eq_new;
      lin_in = lin_in_new;

      if df.abs() <= opts.ftol && total_violation(constraints, &x) <= opts.ftol {
        return MinimizeResult {
          x,
          fun: f,
          success: true,
          iterations: iter,
          message: "Optimization terminated successfully".to_string(),
        };
      }
    }

    MinimizeResult::failed(x, f, opts.max_iter, "Iteration limit reached")
  }
}

/// Powell-damped BFGS update keeping `hessian` positive definite.
fn damped_bfgs_update(hessian: &mut DMatrix<f64>, s: &DVector<f64>, y: &DVector<f64>) {
  let bs = &*hessian * s;
  let sbs = s.dot(&bs);
  if sbs <= 1e-16 {
    return;
  }

  let sy = s.dot(y);
  let theta = if sy >= 0.2 * sbs {
    1.0
  } else {
    0.8 * sbs / (sbs - sy)
  };
  let r = theta * y + (1.0 - theta) * &bs;
  let sr = s.dot(&r);
  if sr <= 1e-16 {
    return;
  }

  *hessian += &r * r.transpose() / sr - &bs * bs.transpose() / sbs;
}

/// Options for [`NelderMeadPenalty`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NelderMeadOptions {
  pub max_iters: u64,
  /// Standard-deviation tolerance of the simplex cost values.
  pub sd_tolerance: f64,
  /// Weight of the L1 constraint and bound penalty.
  pub penalty: f64,
  /// Edge length of the initial simplex.
  pub initial_step: f64,
  /// Constraint violation accepted in a successful result.
  pub constraint_tol: f64,
}

impl Default for NelderMeadOptions {
  fn default() -> Self {
    Self {
      max_iters: 5000,
      sd_tolerance: 1e-10,
      penalty: 100.0,
      initial_step: 0.1,
      constraint_tol: 1e-6,
    }
  }
}

/// Derivative-free alternative: argmin Nelder-Mead on an exact L1 penalty.
#[derive(Clone, Copy, Debug, Default)]
pub struct NelderMeadPenalty {
  pub options: NelderMeadOptions,
}

impl NelderMeadPenalty {
  pub fn new(options: NelderMeadOptions) -> Self {
    Self { options }
  }
}

struct PenaltyCost<'a> {
  objective: &'a dyn Fn(&[f64]) -> f64,
  bounds: &'a [Bounds],
  constraints: &'a [Constraint],
  penalty: f64,
}

impl PenaltyCost<'_> {
  fn project(&self, x: &[f64]) -> Vec<f64> {
    x.iter()
      .zip(self.bounds.iter())
      .map(|(xi, b)| b.clamp(*xi))
      .collect()
  }
}

impl CostFunction for PenaltyCost<'_> {
  type Param = Vec<f64>;
  type Output = f64;

  fn cost(&self, x: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
    let projected = self.project(x);
    let f = (self.objective)(&projected);
    if !f.is_finite() {
      return Ok(f64::INFINITY);
    }

    let outside: f64 = x
      .iter()
      .zip(projected.iter())
      .map(|(a, b)| (a - b).abs())
      .sum();
    let violation = total_violation(self.constraints, &projected);

    Ok(f + self.penalty * (violation + outside))
  }
}

impl Minimizer for NelderMeadPenalty {
  fn minimize(
    &self,
    objective: &dyn Fn(&[f64]) -> f64,
    initial: &[f64],
    bounds: &[Bounds],
    constraints: &[Constraint],
  ) -> MinimizeResult {
    let opts = self.options;
    let n = initial.len();
    if n == 0 || bounds.len() != n {
      return MinimizeResult::failed(
        initial.to_vec(),
        f64::NAN,
        0,
        "Bounds length does not match the initial point",
      );
    }

    let cost = PenaltyCost {
      objective,
      bounds,
      constraints,
      penalty: opts.penalty,
    };

    let x0 = cost.project(initial);
    let mut simplex = Vec::with_capacity(n + 1);
    simplex.push(x0.clone());
    for i in 0..n {
      let mut point = x0.clone();
      point[i] += if point[i] + opts.initial_step <= bounds[i].upper {
        opts.initial_step
      } else {
        -opts.initial_step
      };
      simplex.push(point);
    }

    let solver = match NelderMead::new(simplex).with_sd_tolerance(opts.sd_tolerance) {
      Ok(solver) => solver,
      Err(err) => {
        return MinimizeResult::failed(x0, f64::NAN, 0, &format!("Invalid simplex: {err}"));
      }
    };

    match Executor::new(cost, solver)
      .configure(|state| state.max_iters(opts.max_iters))
      .run()
    {
      Ok(res) => {
        let best = res.state.best_param.clone().unwrap_or_else(|| x0.clone());
        let x: Vec<f64> = best
          .iter()
          .zip(bounds.iter())
          .map(|(xi, b)| b.clamp(*xi))
          .collect();
        let fun = objective(&x);
        let iterations = res.state.iter as usize;
        let converged = matches!(
          res.state.termination_status,
          TerminationStatus::Terminated(TerminationReason::SolverConverged)
        );
        let feasible = total_violation(constraints, &x) <= opts.constraint_tol;

        let (success, message) = match (converged, feasible) {
          (true, true) => (true, "Optimization terminated successfully".to_string()),
          (true, false) => (false, "Converged to an infeasible point".to_string()),
          (false, _) => (
            false,
            format!("Stopped without convergence: {:?}", res.state.termination_status),
          ),
        };

        MinimizeResult {
          x,
          fun,
          success: success && fun.is_finite(),
          iterations,
          message,
        }
      }
      Err(err) => MinimizeResult::failed(x0, f64::NAN, 0, &format!("Solver error: {err}")),
    }
  }
}

/// Maximize the Sharpe ratio over long-only, fully invested weights.
///
/// The result is a local optimum that depends on `initial_weights`. A solver
/// that stops early yields `success == false` together with the best weights
/// it reached; only malformed inputs are errors.
pub fn optimize<'a, M: Minimizer + ?Sized>(
  initial_weights: impl Into<ArrayView1<'a, f64>>,
  model: &ReturnsModel,
  minimizer: &M,
) -> Result<OptimizationResult> {
  let initial = initial_weights.into();
  let n = model.n_assets();
  if initial.len() != n {
    return Err(InputError::mismatch("initial weights", n, initial.len()).into());
  }
  if let Some(row) = initial.iter().position(|w| !w.is_finite()) {
    return Err(
      InputError::MissingValue {
        column: "initial weights".to_string(),
        row,
      }
      .into(),
    );
  }

  // Degenerate portfolios have no Sharpe ratio; NaN makes the solver back off.
  let objective = |w: &[f64]| {
    statistics(w, model)
      .map(|s| -s.sharpe)
      .unwrap_or(f64::NAN)
  };
  let bounds = vec![Bounds::unit(); n];
  let constraints = [Constraint::equality(|w: &[f64]| w.iter().sum::<f64>() - 1.0)];

  let res = minimizer.minimize(&objective, &initial.to_vec(), &bounds, &constraints);

  let weights = Array1::from(res.x).mapv(|w| w.clamp(0.0, 1.0));
  let stats = statistics(&weights, model).ok();
  // a stopping point without a Sharpe ratio is not an optimum
  let (success, message) = match stats {
    None if res.success => (false, "Optimum has zero volatility".to_string()),
    _ => (res.success, res.message),
  };

  if success {
    info!(
      iterations = res.iterations,
      sharpe = stats.map(|s| s.sharpe),
      "sharpe optimization converged"
    );
  } else {
    warn!(
      iterations = res.iterations,
      message = %message,
      "sharpe optimization did not converge"
    );
  }

  Ok(OptimizationResult {
    weights,
    statistics: stats,
    success,
    iterations: res.iterations,
    objective: res.fun,
    message,
  })
}
