//! Differential state cells
//!
//! A [`StateCell`] pairs a batched value with its instantaneous derivative.
//! It is the unit of integration: channels declare their state variables as
//! cells, fill the derivatives every step, and either a generic integrator or
//! the implicit step solver writes the next values back.
//!
//! # Batch axis
//!
//! Every cell carries one element per simulated compartment. The batch axis
//! is either absent ([`BatchShape::Unbatched`], a single compartment) or
//! present with an arbitrary size ([`BatchShape::Batched`]). Storage is a
//! `DVector<f64>` in both cases.
//!
//! # Memory Layout
//!
//! - **Unbatched**: 2 × 8 bytes (value + derivative)
//! - **Batched(n)**: 2 × 8n bytes

use crate::error::{ChannelError, ChannelResult};
use nalgebra::DVector;
use std::fmt;

// =================================================================================================
// Batch Shape
// =================================================================================================

/// Shape of the compartment axis shared by every cell of one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchShape {
    /// Single compartment, no batch axis
    Unbatched,

    /// `n` independent compartments
    Batched(usize),
}

impl BatchShape {
    /// Build from a compartment count, rejecting an empty batch
    pub fn batched(size: usize) -> ChannelResult<Self> {
        if size == 0 {
            return Err(ChannelError::shape("batch size", 1, 0));
        }
        Ok(Self::Batched(size))
    }

    /// Infer the shape from a voltage vector
    ///
    /// A length-1 vector is treated as unbatched.
    pub fn from_len(len: usize) -> ChannelResult<Self> {
        match len {
            0 => Err(ChannelError::shape("batch size", 1, 0)),
            1 => Ok(Self::Unbatched),
            n => Ok(Self::Batched(n)),
        }
    }

    /// Number of compartments
    pub fn len(&self) -> usize {
        match self {
            BatchShape::Unbatched => 1,
            BatchShape::Batched(n) => *n,
        }
    }

    /// Always false for a valid shape
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check that `found` elements fit this shape
    pub fn check(&self, context: &str, found: usize) -> ChannelResult<()> {
        if found != self.len() {
            return Err(ChannelError::shape(context, self.len(), found));
        }
        Ok(())
    }
}

impl fmt::Display for BatchShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchShape::Unbatched => write!(f, "unbatched"),
            BatchShape::Batched(n) => write!(f, "batch [{}]", n),
        }
    }
}

// =================================================================================================
// State Cell
// =================================================================================================

/// A differential variable: value plus instantaneous derivative
///
/// `value` is only mutated by the lifecycle controller, the generic
/// integrator or the implicit step solver. `derivative` is transient and
/// recomputed every step.
///
/// # Example
///
/// ```rust
/// use markov_rs::physics::{BatchShape, StateCell};
/// use nalgebra::DVector;
///
/// let mut cell = StateCell::zeros("O", BatchShape::Batched(3));
/// cell.set_value(DVector::from_vec(vec![0.1, 0.2, 0.3])).unwrap();
/// assert!(cell.set_derivative(DVector::zeros(2)).is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct StateCell {
    name: String,
    shape: BatchShape,
    value: DVector<f64>,
    derivative: DVector<f64>,
}

impl StateCell {
    /// Zero-initialized cell for the given batch shape
    pub fn zeros(name: impl Into<String>, shape: BatchShape) -> Self {
        Self::filled(name, shape, 0.0)
    }

    /// Cell with every compartment set to `value`
    pub fn filled(name: impl Into<String>, shape: BatchShape, value: f64) -> Self {
        Self {
            name: name.into(),
            shape,
            value: DVector::from_element(shape.len(), value),
            derivative: DVector::zeros(shape.len()),
        }
    }

    /// State variable name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Batch shape fixed at creation
    pub fn shape(&self) -> BatchShape {
        self.shape
    }

    /// Number of compartments
    pub fn len(&self) -> usize {
        self.shape.len()
    }

    /// Always false for a valid cell
    pub fn is_empty(&self) -> bool {
        self.shape.is_empty()
    }

    pub fn value(&self) -> &DVector<f64> {
        &self.value
    }

    /// In-place access for normalizers and solvers
    pub fn value_mut(&mut self) -> &mut DVector<f64> {
        &mut self.value
    }

    pub fn set_value(&mut self, value: DVector<f64>) -> ChannelResult<()> {
        self.shape.check(&format!("value of '{}'", self.name), value.len())?;
        self.value = value;
        Ok(())
    }

    pub fn derivative(&self) -> &DVector<f64> {
        &self.derivative
    }

    pub fn set_derivative(&mut self, derivative: DVector<f64>) -> ChannelResult<()> {
        self.shape
            .check(&format!("derivative of '{}'", self.name), derivative.len())?;
        self.derivative = derivative;
        Ok(())
    }

    /// Apply `f` to every compartment value
    pub fn apply<F>(&mut self, f: F)
    where
        F: Fn(f64) -> f64 + Sync + Send,
    {
        if self.value.len() > crate::solver::parallel_threshold() {
            #[cfg(feature = "parallel")]
            {
                use rayon::prelude::*;
                self.value
                    .as_mut_slice()
                    .par_iter_mut()
                    .for_each(|x| *x = f(*x));
                return;
            }
        }
        self.value.iter_mut().for_each(|x| *x = f(*x));
    }

    /// True when neither value nor derivative holds NaN or Inf
    pub fn is_finite(&self) -> bool {
        self.value.iter().all(|x| x.is_finite()) && self.derivative.iter().all(|x| x.is_finite())
    }
}

impl fmt::Display for StateCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.shape)
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_shape_len() {
        assert_eq!(BatchShape::Unbatched.len(), 1);
        assert_eq!(BatchShape::Batched(7).len(), 7);
        assert!(BatchShape::batched(0).is_err());
    }

    #[test]
    fn test_from_len() {
        assert_eq!(BatchShape::from_len(1).unwrap(), BatchShape::Unbatched);
        assert_eq!(BatchShape::from_len(4).unwrap(), BatchShape::Batched(4));
        assert!(matches!(
            BatchShape::from_len(0),
            Err(ChannelError::Shape { .. })
        ));
    }

    #[test]
    fn test_zero_cell() {
        let cell = StateCell::zeros("C1", BatchShape::Batched(5));
        assert_eq!(cell.len(), 5);
        assert_eq!(cell.name(), "C1");
        assert!(cell.value().iter().all(|&x| x == 0.0));
        assert!(cell.derivative().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_set_value_shape_mismatch() {
        let mut cell = StateCell::zeros("O", BatchShape::Batched(3));
        let err = cell.set_value(DVector::zeros(4)).unwrap_err();
        assert_eq!(err, ChannelError::shape("value of 'O'", 3, 4));
    }

    #[test]
    fn test_set_derivative() {
        let mut cell = StateCell::zeros("O", BatchShape::Unbatched);
        cell.set_derivative(DVector::from_vec(vec![2.5])).unwrap();
        assert_eq!(cell.derivative()[0], 2.5);
    }

    #[test]
    fn test_apply() {
        let mut cell = StateCell::filled("B", BatchShape::Batched(10), 2.0);
        cell.apply(|x| x * 3.0);
        assert!(cell.value().iter().all(|&x| x == 6.0));
    }

    #[test]
    fn test_apply_above_threshold() {
        let _guard = crate::solver::ThresholdGuard::save(4);
        let mut cell = StateCell::filled("B", BatchShape::Batched(16), -1.0);
        cell.apply(|x| x.max(0.0));
        assert!(cell.value().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_finite_check() {
        let mut cell = StateCell::zeros("I1", BatchShape::Batched(2));
        assert!(cell.is_finite());
        cell.value_mut()[1] = f64::NAN;
        assert!(!cell.is_finite());
    }
}
