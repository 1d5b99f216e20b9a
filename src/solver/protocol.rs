//! Voltage-clamp command protocols
//!
//! A [`VoltageProtocol`] gives the membrane voltage of every compartment as
//! a function of time: a holding potential (uniform, or one value per
//! compartment) optionally followed by step commands applied to all
//! compartments.
//!
//! # Example
//!
//! ```rust
//! use markov_rs::solver::VoltageProtocol;
//!
//! # fn main() -> Result<(), markov_rs::error::ChannelError> {
//! // hold at -80 mV, step to -10 mV at 1 ms, repolarize to -40 mV at 5 ms
//! let protocol = VoltageProtocol::steps(-80.0, vec![(1.0, -10.0), (5.0, -40.0)])?;
//!
//! assert_eq!(protocol.command(0.5), -80.0);
//! assert_eq!(protocol.command(1.0), -10.0);
//! assert_eq!(protocol.command(7.0), -40.0);
//! assert_eq!(protocol.voltage(2.0, 3)?.len(), 3);
//! # Ok(())
//! # }
//! ```

use crate::error::{ChannelError, ChannelResult};
use nalgebra::DVector;

/// Holding potential before the first step
#[derive(Debug, Clone, PartialEq)]
enum Holding {
    Uniform(f64),
    PerCompartment(DVector<f64>),
}

/// Piecewise-constant command voltage (mV) over time (ms)
#[derive(Debug, Clone, PartialEq)]
pub struct VoltageProtocol {
    holding: Holding,
    steps: Vec<(f64, f64)>,
}

impl VoltageProtocol {
    /// Same voltage in every compartment for the whole run
    pub fn constant(v: f64) -> Self {
        Self {
            holding: Holding::Uniform(v),
            steps: Vec::new(),
        }
    }

    /// Hold at `holding`, then switch to `v` at each `(t_start, v)`
    ///
    /// Start times must be finite, non-negative and strictly increasing.
    pub fn steps(holding: f64, steps: Vec<(f64, f64)>) -> ChannelResult<Self> {
        Self {
            holding: Holding::Uniform(holding),
            steps: Vec::new(),
        }
        .with_steps(steps)
    }

    /// One holding potential per compartment
    pub fn per_compartment(holding: DVector<f64>) -> ChannelResult<Self> {
        if holding.is_empty() {
            return Err(ChannelError::shape("holding potentials", 1, 0));
        }
        if holding.iter().any(|v| !v.is_finite()) {
            return Err(ChannelError::config("holding potentials must be finite"));
        }
        Ok(Self {
            holding: Holding::PerCompartment(holding),
            steps: Vec::new(),
        })
    }

    /// Replace the step commands
    pub fn with_steps(mut self, steps: Vec<(f64, f64)>) -> ChannelResult<Self> {
        let mut previous = f64::NEG_INFINITY;
        for &(t, v) in &steps {
            if !(t.is_finite() && t >= 0.0) || !v.is_finite() {
                return Err(ChannelError::config(format!(
                    "invalid voltage step ({} ms, {} mV)",
                    t, v
                )));
            }
            if t <= previous {
                return Err(ChannelError::config(
                    "voltage step times must be strictly increasing",
                ));
            }
            previous = t;
        }
        self.steps = steps;
        Ok(self)
    }

    /// Active step command at `t`, if any
    fn active_step(&self, t: f64) -> Option<f64> {
        self.steps
            .iter()
            .take_while(|(start, _)| *start <= t)
            .last()
            .map(|&(_, v)| v)
    }

    /// Command voltage of the first compartment at `t`
    pub fn command(&self, t: f64) -> f64 {
        self.active_step(t).unwrap_or(match &self.holding {
            Holding::Uniform(v) => *v,
            Holding::PerCompartment(vs) => vs[0],
        })
    }

    /// Voltage of all `n` compartments at `t`
    pub fn voltage(&self, t: f64, n: usize) -> ChannelResult<DVector<f64>> {
        if let Some(v) = self.active_step(t) {
            return Ok(DVector::from_element(n, v));
        }
        match &self.holding {
            Holding::Uniform(v) => Ok(DVector::from_element(n, *v)),
            Holding::PerCompartment(vs) => {
                if vs.len() != n {
                    return Err(ChannelError::shape("holding potentials", n, vs.len()));
                }
                Ok(vs.clone())
            }
        }
    }

    /// Number of compartments fixed by the protocol, if any
    pub fn compartments(&self) -> Option<usize> {
        match &self.holding {
            Holding::Uniform(_) => None,
            Holding::PerCompartment(vs) => Some(vs.len()),
        }
    }
}
