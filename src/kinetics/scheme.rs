//! Linear Markov kinetic schemes
//!
//! A [`MarkovScheme`] assembles named conformational states and a
//! [`RateTable`] into the right-hand side
//!
//! ```text
//! dS/dt = F(S, V)
//! ```
//!
//! For every transition `from → to` with rate `k(V)`, the flux `k(V)·S_from`
//! leaves `from` and enters `to`. At fixed voltage `F` is affine in `S`: it
//! is linear through the origin unless the scheme has a derived remainder
//! state `R = 1 − Σ S`, whose outflows add a constant term.
//!
//! # Derived remainder
//!
//! At most one state is not stored: it is recomputed from the tracked states
//! every time `F` is evaluated, which keeps the population conserved without
//! storing a redundant variable. Its own derivative is never produced.
//!
//! # Scalar genericity
//!
//! [`MarkovScheme::rhs_point`] is generic over [`Occupancy`], implemented
//! for `f64` and for `num_dual::Dual64`. Evaluating it on dual numbers seeded
//! along one state direction yields one column of the Jacobian `∂F/∂S`
//! (forward-mode differentiation). Rates depend on voltage only and are
//! always plain `f64`.
//!
//! # Example
//!
//! ```rust
//! use markov_rs::kinetics::{MarkovScheme, RateTable};
//!
//! let rates = RateTable::new()
//!     .with("a", |_| 2.0).unwrap()
//!     .with("b", |_| 1.0).unwrap();
//!
//! let scheme = MarkovScheme::builder()
//!     .state("open")
//!     .state("closed")
//!     .transition("closed", "open", "a")
//!     .transition("open", "closed", "b")
//!     .build(rates)
//!     .unwrap();
//!
//! let rates_at = scheme.rates_at(-65.0);
//! let d = scheme.rhs_point(&[0.0, 1.0], &rates_at).unwrap();
//! assert_eq!(d, vec![2.0, -2.0]);
//! ```

use crate::error::{ChannelError, ChannelResult};
use crate::kinetics::rates::RateTable;
use crate::physics::StateCell;
use nalgebra::{DMatrix, DVector};
use num_dual::Dual64;
use std::collections::HashSet;
use std::ops::{Add, Mul, Sub};

// =================================================================================================
// Occupancy scalar
// =================================================================================================

/// Scalar type the kinetic right-hand side can be evaluated on
pub trait Occupancy:
    Copy + Add<Output = Self> + Sub<Output = Self> + Mul<f64, Output = Self>
{
    fn constant(value: f64) -> Self;
}

impl Occupancy for f64 {
    #[inline]
    fn constant(value: f64) -> Self {
        value
    }
}

impl Occupancy for Dual64 {
    #[inline]
    fn constant(value: f64) -> Self {
        Dual64::from(value)
    }
}

// =================================================================================================
// Transitions
// =================================================================================================

/// Endpoint of a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    /// Index into the tracked states
    Tracked(usize),

    /// The derived remainder state
    Remainder,
}

/// One directed transition with its rate index in the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: Node,
    pub to: Node,
    pub rate: usize,
}

// =================================================================================================
// Builder
// =================================================================================================

/// Declarative builder for [`MarkovScheme`]
///
/// Names are resolved only in [`build`](SchemeBuilder::build), so states
/// and transitions can be declared in any order.
#[derive(Debug, Clone, Default)]
pub struct SchemeBuilder {
    states: Vec<String>,
    remainder: Option<String>,
    transitions: Vec<(String, String, String)>,
}

impl SchemeBuilder {
    /// Declare a tracked state
    pub fn state(mut self, name: impl Into<String>) -> Self {
        self.states.push(name.into());
        self
    }

    /// Declare several tracked states in order
    pub fn states(mut self, names: &[&str]) -> Self {
        self.states.extend(names.iter().map(|s| s.to_string()));
        self
    }

    /// Declare the derived remainder state
    pub fn remainder(mut self, name: impl Into<String>) -> Self {
        self.remainder = Some(name.into());
        self
    }

    /// Declare a directed transition using the rate registered as `rate`
    pub fn transition(
        mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        rate: impl Into<String>,
    ) -> Self {
        self.transitions.push((from.into(), to.into(), rate.into()));
        self
    }

    /// Declare `a → b` with `forward` and `b → a` with `backward`
    pub fn reversible(self, a: &str, b: &str, forward: &str, backward: &str) -> Self {
        self.transition(a, b, forward).transition(b, a, backward)
    }

    /// Resolve names and validate the scheme against `rates`
    pub fn build(self, rates: RateTable) -> ChannelResult<MarkovScheme> {
        if self.states.is_empty() {
            return Err(ChannelError::config("kinetic scheme has no tracked state"));
        }

        let mut seen = HashSet::new();
        for name in self.states.iter().chain(self.remainder.iter()) {
            if !seen.insert(name.as_str()) {
                return Err(ChannelError::config(format!(
                    "state '{}' declared twice",
                    name
                )));
            }
        }

        let resolve = |name: &str| -> ChannelResult<Node> {
            if let Some(i) = self.states.iter().position(|s| s == name) {
                return Ok(Node::Tracked(i));
            }
            if self.remainder.as_deref() == Some(name) {
                return Ok(Node::Remainder);
            }
            Err(ChannelError::config(format!(
                "transition references undeclared state '{}'",
                name
            )))
        };

        let mut transitions = Vec::with_capacity(self.transitions.len());
        for (from, to, rate) in &self.transitions {
            if from == to {
                return Err(ChannelError::config(format!(
                    "self transition on state '{}'",
                    from
                )));
            }
            let rate_index = rates.index_of(rate).ok_or_else(|| {
                ChannelError::config(format!(
                    "transition {} -> {} uses unknown rate '{}'",
                    from, to, rate
                ))
            })?;
            transitions.push(Transition {
                from: resolve(from)?,
                to: resolve(to)?,
                rate: rate_index,
            });
        }

        Ok(MarkovScheme {
            states: self.states,
            remainder: self.remainder,
            transitions,
            rates,
        })
    }
}

// =================================================================================================
// Markov Scheme
// =================================================================================================

/// Voltage-dependent linear kinetic scheme `dS/dt = F(S, V)`
///
/// States are stacked as rows of an `N × M` matrix (N tracked states,
/// M compartments). Transitions never couple compartments.
#[derive(Debug, Clone)]
pub struct MarkovScheme {
    states: Vec<String>,
    remainder: Option<String>,
    transitions: Vec<Transition>,
    rates: RateTable,
}

impl MarkovScheme {
    pub fn builder() -> SchemeBuilder {
        SchemeBuilder::default()
    }

    /// Number of tracked (stored) states
    pub fn n_states(&self) -> usize {
        self.states.len()
    }

    pub fn state_names(&self) -> &[String] {
        &self.states
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.states.iter().position(|s| s == name)
    }

    pub fn remainder_name(&self) -> Option<&str> {
        self.remainder.as_deref()
    }

    pub fn has_remainder(&self) -> bool {
        self.remainder.is_some()
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn rate_table(&self) -> &RateTable {
        &self.rates
    }

    /// Rate of every transition at voltage `v`, in transition order
    pub fn rates_at(&self, v: f64) -> Vec<f64> {
        self.transitions
            .iter()
            .map(|t| self.rates.evaluate_at(t.rate, v))
            .collect()
    }

    /// Right-hand side for one compartment
    ///
    /// `s` holds the tracked states, `rates` comes from
    /// [`rates_at`](MarkovScheme::rates_at). Fails with a shape error when
    /// either length does not match the scheme.
    pub fn rhs_point<T: Occupancy>(&self, s: &[T], rates: &[f64]) -> ChannelResult<Vec<T>> {
        self.check_point(s.len(), rates.len())?;

        let zero = T::constant(0.0);
        let remainder = if self.has_remainder() {
            s.iter().fold(T::constant(1.0), |acc, &x| acc - x)
        } else {
            zero
        };

        let mut d = vec![zero; s.len()];
        for (transition, &k) in self.transitions.iter().zip(rates) {
            let source = match transition.from {
                Node::Tracked(i) => s[i],
                Node::Remainder => remainder,
            };
            let flux = source * k;
            if let Node::Tracked(i) = transition.from {
                d[i] = d[i] - flux;
            }
            if let Node::Tracked(j) = transition.to {
                d[j] = d[j] + flux;
            }
        }
        Ok(d)
    }

    /// Batched right-hand side: `states` is `N × M`, `v` has length `M`
    pub fn rhs(&self, states: &DMatrix<f64>, v: &DVector<f64>) -> ChannelResult<DMatrix<f64>> {
        self.check_shape(states, v)?;

        let mut d = DMatrix::zeros(states.nrows(), states.ncols());
        for m in 0..states.ncols() {
            let s: Vec<f64> = states.column(m).iter().copied().collect();
            let dm = self.rhs_point(&s, &self.rates_at(v[m]))?;
            for (i, value) in dm.into_iter().enumerate() {
                d[(i, m)] = value;
            }
        }
        Ok(d)
    }

    /// Derived remainder `1 − Σ tracked` per compartment
    ///
    /// `None` when the scheme has no remainder state.
    pub fn remainder(&self, states: &DMatrix<f64>) -> Option<DVector<f64>> {
        self.remainder.as_ref()?;
        Some(DVector::from_iterator(
            states.ncols(),
            states.column_iter().map(|c| 1.0 - c.sum()),
        ))
    }

    /// Check one compartment's state and rate lengths
    pub fn check_point(&self, states: usize, rates: usize) -> ChannelResult<()> {
        if states != self.n_states() {
            return Err(ChannelError::shape("tracked states", self.n_states(), states));
        }
        if rates != self.transitions.len() {
            return Err(ChannelError::shape(
                "transition rates",
                self.transitions.len(),
                rates,
            ));
        }
        Ok(())
    }

    /// Check that `states` is `N × M` with `M = v.len()`
    pub fn check_shape(&self, states: &DMatrix<f64>, v: &DVector<f64>) -> ChannelResult<()> {
        if v.is_empty() {
            return Err(ChannelError::shape("voltage (compartments)", 1, 0));
        }
        if states.nrows() != self.n_states() {
            return Err(ChannelError::shape(
                "stacked states (rows)",
                self.n_states(),
                states.nrows(),
            ));
        }
        if states.ncols() != v.len() {
            return Err(ChannelError::shape(
                "voltage (compartments)",
                states.ncols(),
                v.len(),
            ));
        }
        Ok(())
    }
}

// =================================================================================================
// Stacking helpers
// =================================================================================================

/// Stack cell values as rows of an `N × M` matrix
pub fn stack_cells(cells: &[&StateCell]) -> ChannelResult<DMatrix<f64>> {
    let Some(first) = cells.first() else {
        return Err(ChannelError::config("cannot stack an empty cell list"));
    };
    let m = first.len();
    let mut stacked = DMatrix::zeros(cells.len(), m);
    for (i, cell) in cells.iter().enumerate() {
        if cell.len() != m {
            return Err(ChannelError::shape(
                format!("stacking '{}'", cell.name()),
                m,
                cell.len(),
            ));
        }
        stacked.set_row(i, &cell.value().transpose());
    }
    Ok(stacked)
}

/// Write the rows of `stacked` back into the cells, in order
pub fn unstack_into(stacked: &DMatrix<f64>, cells: &mut [&mut StateCell]) -> ChannelResult<()> {
    if stacked.nrows() != cells.len() {
        return Err(ChannelError::shape(
            "unstacking rows",
            cells.len(),
            stacked.nrows(),
        ));
    }
    for (i, cell) in cells.iter_mut().enumerate() {
        cell.set_value(stacked.row(i).transpose())?;
    }
    Ok(())
}

// =================================================================================================
// Tests
// =================================================================================================
