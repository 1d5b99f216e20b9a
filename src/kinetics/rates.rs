//! Transition rate registry
//!
//! A [`RateTable`] maps transition names to pure rate functions `k(V)`
//! (1/ms, voltage in mV). It is built once when a channel is configured and
//! consulted every time the kinetic right-hand side is evaluated, which can
//! happen many times per step.
//!
//! # Example
//!
//! ```rust
//! use markov_rs::kinetics::RateTable;
//!
//! let mut table = RateTable::new();
//! table.insert("open", |_v| 2.0).unwrap();
//! table.insert("close", |v: f64| (v / 20.0).exp()).unwrap();
//!
//! assert_eq!(table.evaluate("open", -65.0).unwrap(), 2.0);
//! assert!(table.evaluate("missing", 0.0).is_err());
//! ```

use crate::error::{ChannelError, ChannelResult};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Pure rate law `k(V)`
pub type RateFn = Arc<dyn Fn(f64) -> f64 + Send + Sync>;

/// Registry of rate functions keyed by transition name
///
/// Insertion order is preserved, so the index returned by
/// [`index_of`](RateTable::index_of) is stable and can be used to evaluate
/// all rates of a compartment into a flat slice.
#[derive(Clone, Default)]
pub struct RateTable {
    names: Vec<String>,
    functions: Vec<RateFn>,
    index: HashMap<String, usize>,
}

impl RateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `rate` under `name`
    ///
    /// Fails with a configuration error when the name is already taken.
    pub fn insert<F>(&mut self, name: impl Into<String>, rate: F) -> ChannelResult<()>
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(ChannelError::config(format!(
                "rate '{}' registered twice",
                name
            )));
        }
        self.index.insert(name.clone(), self.names.len());
        self.names.push(name);
        self.functions.push(Arc::new(rate));
        Ok(())
    }

    /// Builder form of [`insert`](RateTable::insert)
    pub fn with<F>(mut self, name: impl Into<String>, rate: F) -> ChannelResult<Self>
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        self.insert(name, rate)?;
        Ok(self)
    }

    /// Register a voltage-independent rate
    pub fn insert_constant(&mut self, name: impl Into<String>, value: f64) -> ChannelResult<()> {
        self.insert(name, move |_| value)
    }

    pub fn get(&self, name: &str) -> Option<&RateFn> {
        self.index.get(name).map(|&i| &self.functions[i])
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Evaluate the named rate at voltage `v`
    pub fn evaluate(&self, name: &str, v: f64) -> ChannelResult<f64> {
        self.get(name)
            .map(|rate| rate(v))
            .ok_or_else(|| ChannelError::config(format!("unknown rate '{}'", name)))
    }

    /// Evaluate the rate at position `index` (see [`index_of`](RateTable::index_of))
    #[inline]
    pub fn evaluate_at(&self, index: usize, v: f64) -> f64 {
        (self.functions[index])(v)
    }

    /// Rate names in insertion order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl fmt::Debug for RateTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateTable")
            .field("rates", &self.names)
            .finish()
    }
}

// =================================================================================================
// Rate law helpers
// =================================================================================================

/// Relative error exponential `(exp(x) - 1) / x`, equal to 1 at `x = 0`
///
/// Rate laws of the form `a·x / (1 - exp(-x/k))` are rewritten with
/// `exprel` so they stay finite at their removable singularity.
pub fn exprel(x: f64) -> f64 {
    if x.abs() < 1e-6 {
        1.0 + x / 2.0 + x * x / 6.0
    } else {
        x.exp_m1() / x
    }
}

/// Q10 temperature factor `q10^((T - T_ref)/10)`
pub fn q10_factor(q10: f64, temperature: f64, reference: f64) -> f64 {
    q10.powf((temperature - reference) / 10.0)
}

// =================================================================================================
// Tests
// =================================================================================================
