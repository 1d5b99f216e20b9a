//! Channel traits and types
//!
//! This module defines the core API shared by every channel model:
//! - `Channel`: the base kinetics contract (lifecycle hooks, derivative, current)
//! - `IonInfo`: read-only reversal potential and concentration of the owning ion
//! - `IntegrationMode`: whether the channel is advanced by a generic integrator
//!   or by its own implicit step

use crate::error::{ChannelError, ChannelResult};
use crate::physics::data::{BatchShape, StateCell};
use nalgebra::DVector;

// =================================================================================================
// Ion information
// =================================================================================================

/// Reversal potential and concentration supplied by the owning ion species
///
/// Both vectors carry one value per compartment. `e` is in mV, `c` in mM.
/// Channels only read it.
#[derive(Debug, Clone, PartialEq)]
pub struct IonInfo {
    /// Reversal potential (mV)
    pub e: DVector<f64>,

    /// Concentration (mM)
    pub c: DVector<f64>,
}

impl IonInfo {
    pub fn new(e: DVector<f64>, c: DVector<f64>) -> ChannelResult<Self> {
        if e.len() != c.len() {
            return Err(ChannelError::shape("ion concentration", e.len(), c.len()));
        }
        Ok(Self { e, c })
    }

    /// Same reversal potential and concentration in every compartment
    pub fn uniform(shape: BatchShape, e: f64, c: f64) -> Self {
        Self {
            e: DVector::from_element(shape.len(), e),
            c: DVector::from_element(shape.len(), c),
        }
    }

    /// Number of compartments described
    pub fn len(&self) -> usize {
        self.e.len()
    }

    pub fn is_empty(&self) -> bool {
        self.e.is_empty()
    }
}

// =================================================================================================
// Integration mode
// =================================================================================================

/// How the state-update phase of a step is carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntegrationMode {
    /// Cells are handed to the enclosing generic integrator, which consumes
    /// the derivatives filled by `compute_derivative`
    #[default]
    Generic,

    /// The channel advances its own cells through `update_state`
    /// (Jacobian-linearized backward Euler); the generic integrator is
    /// bypassed for those cells
    Implicit,
}

// =================================================================================================
// Channel Trait
// =================================================================================================

/// Base kinetics contract for every channel model
///
/// # Responsibility
///
/// A channel declares its state variables as [`StateCell`]s and computes
/// their derivatives. It does NOT decide when hooks run: that is the job of
/// [`ChannelLifecycle`](crate::solver::ChannelLifecycle), which calls, once
/// per step and in this order:
///
/// 1. [`pre_integral`](Channel::pre_integral)
/// 2. [`compute_derivative`](Channel::compute_derivative)
/// 3. the generic integrator on [`cells_mut`](Channel::cells_mut), or
///    [`update_state`](Channel::update_state) for implicit channels
/// 4. [`post_integral`](Channel::post_integral)
///
/// Voltages are in mV, `dt` in ms.
pub trait Channel: Send + Sync {
    /// Name of the channel (used to display and logging)
    fn name(&self) -> &str;

    /// Allocates zeroed cells for `batch` compartments
    fn init_state(&mut self, v: &DVector<f64>, ion: &IonInfo, batch: BatchShape)
    -> ChannelResult<()>;

    /// Brings the cells to a physical starting point
    fn reset_state(&mut self, v: &DVector<f64>, ion: &IonInfo) -> ChannelResult<()>;

    /// Hook run before the derivative is computed (normalization)
    fn pre_integral(&mut self, _v: &DVector<f64>, _ion: &IonInfo) -> ChannelResult<()> {
        Ok(())
    }

    /// Fills the derivative slot of every cell
    fn compute_derivative(&mut self, v: &DVector<f64>, ion: &IonInfo) -> ChannelResult<()>;

    /// Advances the cells directly (implicit channels only)
    fn update_state(&mut self, _v: &DVector<f64>, _ion: &IonInfo, _dt: f64) -> ChannelResult<()> {
        Err(ChannelError::config(format!(
            "channel '{}' has no implicit update",
            self.name()
        )))
    }

    /// Hook run after the state update
    fn post_integral(&mut self, _v: &DVector<f64>, _ion: &IonInfo) -> ChannelResult<()> {
        Ok(())
    }

    /// Transmembrane current, one value per compartment
    ///
    /// Pure function of the current state and inputs.
    fn current(&self, v: &DVector<f64>, ion: &IonInfo) -> ChannelResult<DVector<f64>>;

    /// How step phase (3) is carried out
    fn integration_mode(&self) -> IntegrationMode {
        IntegrationMode::Generic
    }

    /// Read access to every differential cell
    fn cells(&self) -> Vec<&StateCell>;

    /// Write access to every differential cell
    fn cells_mut(&mut self) -> Vec<&mut StateCell>;

    /// Description of the channel (option)
    fn description(&self) -> Option<&str> {
        None
    }
}

// =================================================================================================
// Tests
// =================================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct Leak {
        g: f64,
        cells: Vec<StateCell>,
    }

    impl Channel for Leak {
        fn name(&self) -> &str {
            "Leak"
        }

        fn init_state(
            &mut self,
            _v: &DVector<f64>,
            _ion: &IonInfo,
            _batch: BatchShape,
        ) -> ChannelResult<()> {
            Ok(())
        }

        fn reset_state(&mut self, _v: &DVector<f64>, _ion: &IonInfo) -> ChannelResult<()> {
            Ok(())
        }

        fn compute_derivative(&mut self, _v: &DVector<f64>, _ion: &IonInfo) -> ChannelResult<()> {
            Ok(())
        }

        fn current(&self, v: &DVector<f64>, ion: &IonInfo) -> ChannelResult<DVector<f64>> {
            Ok((&ion.e - v) * self.g)
        }

        fn cells(&self) -> Vec<&StateCell> {
            self.cells.iter().collect()
        }

        fn cells_mut(&mut self) -> Vec<&mut StateCell> {
            self.cells.iter_mut().collect()
        }
    }

    #[test]
    fn test_ion_info_shape() {
        let err = IonInfo::new(DVector::zeros(2), DVector::zeros(3)).unwrap_err();
        assert!(matches!(err, ChannelError::Shape { .. }));

        let ion = IonInfo::uniform(BatchShape::Batched(4), 50.0, 10.0);
        assert_eq!(ion.len(), 4);
        assert_eq!(ion.e[3], 50.0);
    }

    #[test]
    fn test_default_hooks() {
        let mut leak = Leak { g: 0.1, cells: vec![] };
        let v = DVector::from_element(1, -65.0);
        let ion = IonInfo::uniform(BatchShape::Unbatched, -70.0, 1.0);

        assert_eq!(leak.integration_mode(), IntegrationMode::Generic);
        assert!(leak.pre_integral(&v, &ion).is_ok());
        assert!(leak.post_integral(&v, &ion).is_ok());
        assert!(matches!(
            leak.update_state(&v, &ion, 0.01),
            Err(ChannelError::Configuration(_))
        ));
        assert!(leak.description().is_none());
    }

    #[test]
    fn test_current_sign() {
        let leak = Leak { g: 0.1, cells: vec![] };
        let v = DVector::from_element(1, -65.0);
        let ion = IonInfo::uniform(BatchShape::Unbatched, -70.0, 1.0);
        let i = leak.current(&v, &ion).unwrap();
        assert!((i[0] - (-0.5)).abs() < 1e-12);
    }
}
