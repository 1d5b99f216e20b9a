//! Jacobian-linearized backward Euler for linear kinetic schemes
//!
//! # Mathematical Background
//!
//! For a compartment with tracked occupancies `S` (length N) at voltage `V`,
//! the kinetic right-hand side is affine in `S`:
//!
//! ```text
//! F(S) = A·S + b,    A = ∂F/∂S,    b = F(S) − A·S
//! ```
//!
//! Backward Euler `S_next = S + dt·F(S_next)` then reduces to one linear
//! solve per compartment:
//!
//! ```text
//! (I − dt·A) · S_next = S + dt·b
//! ```
//!
//! `A` is obtained by forward-mode differentiation of
//! [`MarkovScheme::rhs_point`] with `num_dual::Dual64`, seeding one state
//! direction per pass (N passes per compartment). Because `F` is affine,
//! the linearization is exact and the step is unconditionally stable.
//!
//! # Batching
//!
//! Compartments never couple: each one gets its own N × N system solved by
//! LU decomposition. Above [`parallel_threshold`](crate::solver::parallel_threshold)
//! compartments the solves are distributed with Rayon (feature `parallel`).
//!
//! # Example
//!
//! ```rust
//! use markov_rs::kinetics::{MarkovScheme, RateTable};
//! use markov_rs::solver::ImplicitStepSolver;
//! use nalgebra::{DMatrix, DVector};
//!
//! let rates = RateTable::new()
//!     .with("a", |_| 2.0).unwrap()
//!     .with("b", |_| 1.0).unwrap();
//! let scheme = MarkovScheme::builder()
//!     .states(&["open", "closed"])
//!     .reversible("closed", "open", "a", "b")
//!     .build(rates)
//!     .unwrap();
//!
//! let states = DMatrix::from_column_slice(2, 1, &[0.0, 1.0]);
//! let v = DVector::from_element(1, -65.0);
//!
//! let next = ImplicitStepSolver::new().step(&scheme, &states, &v, 10.0).unwrap();
//! assert!((next[(0, 0)] - 2.0 / 3.0).abs() < 0.05);
//! ```

use crate::error::{ChannelError, ChannelResult};
use crate::kinetics::MarkovScheme;
use log::trace;
use nalgebra::{DMatrix, DVector};
use num_dual::Dual64;

// =================================================================================================
// Linearization
// =================================================================================================

/// Affine form `F(S) = A·S + b` of one compartment
#[derive(Debug, Clone, PartialEq)]
pub struct Linearization {
    /// Jacobian `∂F/∂S` (N × N)
    pub a: DMatrix<f64>,

    /// Constant term `F(S) − A·S` (N)
    pub b: DVector<f64>,
}

impl Linearization {
    /// Linearize the scheme at `s` with precomputed transition rates
    ///
    /// `s` must hold every tracked state and `rates` every transition.
    pub fn at(scheme: &MarkovScheme, s: &[f64], rates: &[f64]) -> ChannelResult<Self> {
        scheme.check_point(s.len(), rates.len())?;
        let n = s.len();
        let mut a = DMatrix::zeros(n, n);

        for j in 0..n {
            let seeded: Vec<Dual64> = s
                .iter()
                .enumerate()
                .map(|(i, &x)| {
                    if i == j {
                        Dual64::new(x, 1.0)
                    } else {
                        Dual64::from(x)
                    }
                })
                .collect();
            let column = scheme.rhs_point(&seeded, rates)?;
            for (i, d) in column.iter().enumerate() {
                a[(i, j)] = d.eps;
            }
        }

        let f = DVector::from_vec(scheme.rhs_point(s, rates)?);
        let b = f - &a * DVector::from_column_slice(s);
        Ok(Self { a, b })
    }

    /// Evaluate `A·S + b`
    pub fn apply(&self, s: &DVector<f64>) -> DVector<f64> {
        &self.a * s + &self.b
    }

    pub fn is_finite(&self) -> bool {
        self.a.iter().all(|x| x.is_finite()) && self.b.iter().all(|x| x.is_finite())
    }
}

// =================================================================================================
// Implicit Step Solver
// =================================================================================================

/// Stateless backward-Euler stepper for [`MarkovScheme`]s
///
/// States are passed stacked as an `N × M` matrix, one column per
/// compartment, and the result has the same layout. Inputs are never
/// mutated: the caller writes the returned rows back into its cells, so a
/// failed step leaves the channel untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImplicitStepSolver;

impl ImplicitStepSolver {
    pub fn new() -> Self {
        Self
    }

    /// Linearize every compartment of `states` at its voltage
    pub fn linearize(
        &self,
        scheme: &MarkovScheme,
        states: &DMatrix<f64>,
        v: &DVector<f64>,
    ) -> ChannelResult<Vec<Linearization>> {
        scheme.check_shape(states, v)?;
        self.per_compartment(states.ncols(), |k| {
            let s: Vec<f64> = states.column(k).iter().copied().collect();
            Self::linearize_checked(scheme, &s, v[k], k)
        })
    }

    /// Advance `states` by one backward-Euler step of size `dt`
    pub fn step(
        &self,
        scheme: &MarkovScheme,
        states: &DMatrix<f64>,
        v: &DVector<f64>,
        dt: f64,
    ) -> ChannelResult<DMatrix<f64>> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(ChannelError::config(format!(
                "time step must be positive and finite, got {}",
                dt
            )));
        }
        scheme.check_shape(states, v)?;

        let n = states.nrows();
        let columns = self.per_compartment(states.ncols(), |k| {
            let s: Vec<f64> = states.column(k).iter().copied().collect();
            let lin = Self::linearize_checked(scheme, &s, v[k], k)?;

            let lhs = DMatrix::<f64>::identity(n, n) - &lin.a * dt;
            let rhs = DVector::from_vec(s) + &lin.b * dt;
            Self::solve_checked(lhs, rhs, k, "singular backward-Euler system")
        })?;

        trace!(
            "implicit step: {} states x {} compartments, dt = {}",
            n,
            columns.len(),
            dt
        );
        Ok(DMatrix::from_columns(&columns))
    }

    /// Stationary occupancies `A·S + b = 0` at each voltage
    ///
    /// Without a derived remainder `A` is singular (columns sum to zero),
    /// so its last row is replaced by the conservation constraint
    /// `Σ S = 1`.
    pub fn steady_state(
        &self,
        scheme: &MarkovScheme,
        v: &DVector<f64>,
    ) -> ChannelResult<DMatrix<f64>> {
        if v.is_empty() {
            return Err(ChannelError::shape("voltage (compartments)", 1, 0));
        }
        let n = scheme.n_states();
        let origin = vec![0.0; n];

        let columns = self.per_compartment(v.len(), |k| {
            let lin = Self::linearize_checked(scheme, &origin, v[k], k)?;
            let mut lhs = lin.a;
            let mut rhs = -lin.b;
            if !scheme.has_remainder() {
                lhs.row_mut(n - 1).fill(1.0);
                rhs[n - 1] = 1.0;
            }
            Self::solve_checked(lhs, rhs, k, "singular steady-state system")
        })?;

        Ok(DMatrix::from_columns(&columns))
    }

    fn linearize_checked(
        scheme: &MarkovScheme,
        s: &[f64],
        v: f64,
        compartment: usize,
    ) -> ChannelResult<Linearization> {
        let rates = scheme.rates_at(v);
        if let Some(i) = rates.iter().position(|k| !k.is_finite()) {
            return Err(ChannelError::instability(
                compartment,
                format!("non-finite rate for transition {} at V = {}", i, v),
            ));
        }
        let lin = Linearization::at(scheme, s, &rates)?;
        if !lin.is_finite() {
            return Err(ChannelError::instability(
                compartment,
                "non-finite Jacobian or constant term",
            ));
        }
        Ok(lin)
    }

    fn solve_checked(
        lhs: DMatrix<f64>,
        rhs: DVector<f64>,
        compartment: usize,
        singular: &str,
    ) -> ChannelResult<DVector<f64>> {
        let solution = lhs
            .lu()
            .solve(&rhs)
            .ok_or_else(|| ChannelError::instability(compartment, singular))?;
        if solution.iter().any(|x| !x.is_finite()) {
            return Err(ChannelError::instability(
                compartment,
                "non-finite solution",
            ));
        }
        Ok(solution)
    }

    /// Run `f` for every compartment, in parallel above the threshold
    fn per_compartment<T, F>(&self, m: usize, f: F) -> ChannelResult<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> ChannelResult<T> + Sync + Send,
    {
        if m > crate::solver::parallel_threshold() {
            #[cfg(feature = "parallel")]
            {
                use rayon::prelude::*;
                return (0..m).into_par_iter().map(f).collect();
            }
        }
        (0..m).map(f).collect()
    }
}

// =================================================================================================
// Tests
// =================================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinetics::RateTable;
    use approx::assert_relative_eq;

    fn two_state(a: f64, b: f64) -> MarkovScheme {
        let rates = RateTable::new()
            .with("a", move |_| a)
            .unwrap()
            .with("b", move |_| b)
            .unwrap();
        MarkovScheme::builder()
            .states(&["open", "closed"])
            .reversible("closed", "open", "a", "b")
            .build(rates)
            .unwrap()
    }

    fn three_state_remainder() -> MarkovScheme {
        let rates = RateTable::new()
            .with("co", |v: f64| 0.5 * (v / 30.0).exp())
            .unwrap()
            .with("oc", |v: f64| 0.2 * (-v / 30.0).exp())
            .unwrap()
            .with("oi", |_| 0.3)
            .unwrap()
            .with("ic", |_| 0.05)
            .unwrap();
        MarkovScheme::builder()
            .states(&["C", "O"])
            .remainder("I")
            .reversible("C", "O", "co", "oc")
            .transition("O", "I", "oi")
            .transition("I", "C", "ic")
            .build(rates)
            .unwrap()
    }

    #[test]
    fn test_jacobian_two_state() {
        let scheme = two_state(2.0, 1.0);
        let rates = scheme.rates_at(0.0);
        let lin = Linearization::at(&scheme, &[0.3, 0.7], &rates).unwrap();

        // d(open)/dt = 2 closed − open
        assert_relative_eq!(lin.a[(0, 0)], -1.0);
        assert_relative_eq!(lin.a[(0, 1)], 2.0);
        assert_relative_eq!(lin.a[(1, 0)], 1.0);
        assert_relative_eq!(lin.a[(1, 1)], -2.0);
        assert_relative_eq!(lin.b.norm(), 0.0, epsilon = 1e-15);
    }

    #[test]
    fn test_remainder_gives_constant_term() {
        let scheme = three_state_remainder();
        let rates = scheme.rates_at(0.0);
        let lin = Linearization::at(&scheme, &[0.2, 0.3], &rates).unwrap();

        // C gains 0.05·(1 − C − O): b_C = 0.05, A_CC includes −0.05
        assert_relative_eq!(lin.b[0], 0.05, epsilon = 1e-15);
        assert_relative_eq!(lin.b[1], 0.0, epsilon = 1e-15);
        assert_relative_eq!(lin.a[(0, 1)], 0.2 - 0.05, epsilon = 1e-15);
    }

    #[test]
    fn test_linearization_reproduces_rhs() {
        let scheme = three_state_remainder();
        let rates = scheme.rates_at(-20.0);
        let s = [0.4, 0.1];
        let lin = Linearization::at(&scheme, &s, &rates).unwrap();
        let direct = scheme.rhs_point(&s, &rates).unwrap();
        let affine = lin.apply(&DVector::from_column_slice(&s));
        for i in 0..2 {
            assert_relative_eq!(affine[i], direct[i], epsilon = 1e-14);
        }
    }

    #[test]
    fn test_linearization_rejects_mismatched_lengths() {
        let scheme = three_state_remainder();
        let rates = scheme.rates_at(0.0);

        assert_eq!(
            Linearization::at(&scheme, &[0.5], &rates),
            Err(ChannelError::shape("tracked states", 2, 1))
        );
        assert_eq!(
            Linearization::at(&scheme, &[0.2, 0.3], &rates[..3]),
            Err(ChannelError::shape("transition rates", 4, 3))
        );
    }

    #[test]
    fn test_linearization_independent_of_point() {
        let scheme = three_state_remainder();
        let states = DMatrix::from_column_slice(2, 2, &[0.9, 0.05, 0.1, 0.1]);
        let v = DVector::from_element(2, 10.0);
        let lins = ImplicitStepSolver::new().linearize(&scheme, &states, &v).unwrap();

        assert_eq!(lins.len(), 2);
        assert_relative_eq!(lins[0].a, lins[1].a, epsilon = 1e-14);
        assert_relative_eq!(lins[0].b, lins[1].b, epsilon = 1e-14);
    }

    #[test]
    fn test_step_conserves_mass() {
        let scheme = two_state(2.0, 1.0);
        let states = DMatrix::from_column_slice(2, 1, &[0.0, 1.0]);
        let v = DVector::from_element(1, 0.0);
        let next = ImplicitStepSolver::new()
            .step(&scheme, &states, &v, 0.5)
            .unwrap();
        assert_relative_eq!(next.column(0).sum(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_step_matches_closed_form() {
        // Backward Euler on the two-state scheme: o' = (o + dt·a) / (1 + dt·(a + b))
        let scheme = two_state(2.0, 1.0);
        let states = DMatrix::from_column_slice(2, 1, &[0.1, 0.9]);
        let v = DVector::from_element(1, 0.0);
        let dt = 0.25;
        let next = ImplicitStepSolver::new()
            .step(&scheme, &states, &v, dt)
            .unwrap();
        assert_relative_eq!(
            next[(0, 0)],
            (0.1 + dt * 2.0) / (1.0 + dt * 3.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_rejects_bad_dt_and_shapes() {
        let scheme = two_state(2.0, 1.0);
        let states = DMatrix::from_column_slice(2, 1, &[0.0, 1.0]);
        let v = DVector::from_element(1, 0.0);
        let solver = ImplicitStepSolver::new();

        assert!(matches!(
            solver.step(&scheme, &states, &v, 0.0),
            Err(ChannelError::Configuration(_))
        ));
        assert!(matches!(
            solver.step(&scheme, &states, &v, f64::NAN),
            Err(ChannelError::Configuration(_))
        ));
        let wrong_v = DVector::from_element(3, 0.0);
        assert!(matches!(
            solver.step(&scheme, &states, &wrong_v, 0.1),
            Err(ChannelError::Shape { .. })
        ));
    }

    #[test]
    fn test_non_finite_rate_is_instability() {
        let rates = RateTable::new()
            .with("a", |v: f64| if v > 0.0 { f64::INFINITY } else { 1.0 })
            .unwrap()
            .with("b", |_| 1.0)
            .unwrap();
        let scheme = MarkovScheme::builder()
            .states(&["O", "C"])
            .reversible("C", "O", "a", "b")
            .build(rates)
            .unwrap();
        let states = DMatrix::from_column_slice(2, 2, &[0.5, 0.5, 0.5, 0.5]);
        let v = DVector::from_vec(vec![-10.0, 10.0]);

        match ImplicitStepSolver::new().step(&scheme, &states, &v, 0.1) {
            Err(ChannelError::NumericalInstability { compartment, .. }) => {
                assert_eq!(compartment, 1)
            }
            other => panic!("expected instability, got {:?}", other),
        }
    }

    #[test]
    fn test_steady_state_two_state() {
        let scheme = two_state(2.0, 1.0);
        let v = DVector::from_element(3, 0.0);
        let ss = ImplicitStepSolver::new().steady_state(&scheme, &v).unwrap();
        assert_eq!(ss.shape(), (2, 3));
        for k in 0..3 {
            assert_relative_eq!(ss[(0, k)], 2.0 / 3.0, epsilon = 1e-12);
            assert_relative_eq!(ss[(1, k)], 1.0 / 3.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_steady_state_is_fixed_point() {
        let scheme = three_state_remainder();
        let v = DVector::from_vec(vec![-60.0, 0.0]);
        let solver = ImplicitStepSolver::new();
        let ss = solver.steady_state(&scheme, &v).unwrap();

        let d = scheme.rhs(&ss, &v).unwrap();
        assert!(d.amax() < 1e-12);

        let next = solver.step(&scheme, &ss, &v, 1.0).unwrap();
        assert_relative_eq!(next, ss, epsilon = 1e-12);
    }

    #[test]
    fn test_parallel_path_matches_sequential() {
        let scheme = three_state_remainder();
        let m = 32;
        let states = DMatrix::from_fn(2, m, |i, k| 0.1 + 0.01 * (i + k) as f64);
        let v = DVector::from_fn(m, |k, _| -80.0 + 4.0 * k as f64);
        let solver = ImplicitStepSolver::new();

        let sequential = solver.step(&scheme, &states, &v, 0.05).unwrap();
        let _guard = crate::solver::ThresholdGuard::save(4);
        let parallel = solver.step(&scheme, &states, &v, 0.05).unwrap();
        assert_relative_eq!(sequential, parallel, epsilon = 1e-15);
    }
}
