//! Voltage-clamp scenario definition
//!
//! A scenario is WHAT to simulate: an ion species with its channels, the
//! voltage protocol driving them and the number of compartments.

use crate::error::{ChannelError, ChannelResult};
use crate::models::FixedIon;
use crate::physics::BatchShape;
use crate::solver::protocol::VoltageProtocol;
use std::fmt;

/// Ion species + channels + voltage protocol + batch shape
pub struct Scenario {
    pub ion: FixedIon,

    pub protocol: VoltageProtocol,

    pub batch: BatchShape,
}

impl Scenario {
    /// Scenario over the batch implied by the protocol (one compartment
    /// unless per-compartment holding potentials are given)
    pub fn new(ion: FixedIon, protocol: VoltageProtocol) -> Self {
        let batch = match protocol.compartments() {
            Some(n) if n > 1 => BatchShape::Batched(n),
            _ => BatchShape::Unbatched,
        };
        Self {
            ion,
            protocol,
            batch,
        }
    }

    /// Override the number of compartments
    pub fn with_batch(mut self, batch: BatchShape) -> Self {
        self.batch = batch;
        self
    }

    /// Check that the protocol fits the batch and that channels exist
    pub fn validate(&self) -> ChannelResult<()> {
        if self.batch.is_empty() {
            return Err(ChannelError::shape("batch size", 1, 0));
        }
        if let Some(n) = self.protocol.compartments() {
            self.batch.check("protocol compartments", n)?;
        }
        if self.ion.channels().is_empty() {
            return Err(ChannelError::config(format!(
                "ion '{}' carries no channel",
                self.ion.name()
            )));
        }
        Ok(())
    }

    pub fn compartments(&self) -> usize {
        self.batch.len()
    }
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("ion", &self.ion.name())
            .field("channels", &self.ion.channels().len())
            .field("batch", &self.batch)
            .field("protocol", &self.protocol)
            .finish()
    }
}
