//! Fixed ion species
//!
//! A [`FixedIon`] holds a constant reversal potential and concentration,
//! owns the lifecycles of the channels carrying it, and forwards every
//! lifecycle operation to them with its [`IonInfo`]. The total current is
//! the sum of the channel currents.

use crate::error::{ChannelError, ChannelResult};
use crate::physics::{BatchShape, IonInfo, StateCell};
use crate::solver::{ChannelLifecycle, LifecyclePhase};
use log::debug;
use nalgebra::DVector;

/// Ion species with constant `E` (mV) and `C` (mM)
///
/// # Example
///
/// ```rust
/// use markov_rs::models::{FixedIon, ResurgentSodium};
/// use markov_rs::physics::BatchShape;
/// use markov_rs::solver::ChannelLifecycle;
/// use nalgebra::DVector;
///
/// # fn main() -> Result<(), markov_rs::error::ChannelError> {
/// let mut sodium = FixedIon::sodium()
///     .with_channel(ChannelLifecycle::new(Box::new(ResurgentSodium::new(Default::default())?)));
///
/// let v = DVector::from_element(1, -65.0);
/// sodium.init_state(&v, BatchShape::Unbatched)?;
/// sodium.reset_state(&v)?;
/// let i = sodium.step(&v, 0.025)?;
/// assert_eq!(i.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct FixedIon {
    name: String,
    e: f64,
    c: f64,
    channels: Vec<ChannelLifecycle>,
}

impl FixedIon {
    pub fn new(name: impl Into<String>, e: f64, c: f64) -> ChannelResult<Self> {
        let name = name.into();
        if !e.is_finite() {
            return Err(ChannelError::config(format!(
                "reversal potential of '{}' must be finite, got {}",
                name, e
            )));
        }
        if !(c.is_finite() && c >= 0.0) {
            return Err(ChannelError::config(format!(
                "concentration of '{}' must be non-negative, got {}",
                name, c
            )));
        }
        Ok(Self {
            name,
            e,
            c,
            channels: Vec::new(),
        })
    }

    /// Na⁺: E = 50 mV, C = 10 mM
    pub fn sodium() -> Self {
        Self::preset("Na", 50.0, 10.0)
    }

    /// K⁺: E = −95 mV, C = 0.0400811 mM
    pub fn potassium() -> Self {
        Self::preset("K", -95.0, 0.0400811)
    }

    fn preset(name: &str, e: f64, c: f64) -> Self {
        Self {
            name: name.to_string(),
            e,
            c,
            channels: Vec::new(),
        }
    }

    pub fn with_channel(mut self, channel: ChannelLifecycle) -> Self {
        self.add_channel(channel);
        self
    }

    pub fn add_channel(&mut self, channel: ChannelLifecycle) {
        self.channels.push(channel);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reversal potential (mV)
    pub fn reversal_potential(&self) -> f64 {
        self.e
    }

    /// Concentration (mM)
    pub fn concentration(&self) -> f64 {
        self.c
    }

    pub fn channels(&self) -> &[ChannelLifecycle] {
        &self.channels
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.channels
            .iter()
            .map(|lc| lc.channel().name().to_string())
            .collect()
    }

    /// Ion information broadcast over `batch`
    pub fn info(&self, batch: BatchShape) -> IonInfo {
        IonInfo::uniform(batch, self.e, self.c)
    }

    fn info_for(&self, v: &DVector<f64>) -> ChannelResult<IonInfo> {
        Ok(self.info(BatchShape::from_len(v.len())?))
    }

    /// Initialize every channel for `batch`
    ///
    /// Channels already `Ready` with the same batch shape are left
    /// untouched, and those with another shape are re-initialized, so an
    /// ion can be run several times.
    pub fn init_state(&mut self, v: &DVector<f64>, batch: BatchShape) -> ChannelResult<()> {
        let ion = self.info(batch);
        for lifecycle in &mut self.channels {
            match (lifecycle.phase(), lifecycle.batch()) {
                (LifecyclePhase::Ready, Some(current)) if current == batch => {}
                (LifecyclePhase::Ready, _) => lifecycle.reinit_state(v, &ion, batch)?,
                _ => lifecycle.init_state(v, &ion, batch)?,
            }
        }
        debug!("{}: {} channel(s) initialized", self.name, self.channels.len());
        Ok(())
    }

    pub fn reset_state(&mut self, v: &DVector<f64>) -> ChannelResult<()> {
        let ion = self.info_for(v)?;
        for lifecycle in &mut self.channels {
            lifecycle.reset_state(v, &ion)?;
        }
        Ok(())
    }

    /// Step every channel and return the summed current
    pub fn step(&mut self, v: &DVector<f64>, dt: f64) -> ChannelResult<DVector<f64>> {
        let ion = self.info_for(v)?;
        let mut total = DVector::zeros(v.len());
        for lifecycle in &mut self.channels {
            total += lifecycle.step(v, &ion, dt)?;
        }
        Ok(total)
    }

    /// Summed current on the present state
    pub fn current(&self, v: &DVector<f64>) -> ChannelResult<DVector<f64>> {
        let ion = self.info_for(v)?;
        let mut total = DVector::zeros(v.len());
        for lifecycle in &self.channels {
            total += lifecycle.current(v, &ion)?;
        }
        Ok(total)
    }

    pub fn dispose(&mut self) {
        for lifecycle in &mut self.channels {
            lifecycle.dispose();
        }
    }

    /// Every cell of every channel, in channel order
    pub fn cells(&self) -> Vec<&StateCell> {
        self.channels.iter().flat_map(|lc| lc.cells()).collect()
    }

    pub fn cell_names(&self) -> Vec<String> {
        self.cells().iter().map(|c| c.name().to_string()).collect()
    }

    /// Value of every cell in compartment 0
    pub fn first_compartment(&self) -> Vec<f64> {
        self.cells()
            .iter()
            .map(|c| c.value().get(0).copied().unwrap_or(f64::NAN))
            .collect()
    }
}

// =================================================================================================
// Tests
// =================================================================================================
