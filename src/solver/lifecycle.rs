//! Channel lifecycle controller
//!
//! [`ChannelLifecycle`] owns one channel and enforces when its hooks run:
//!
//! ```text
//! Uninitialized ──init_state──▶ Ready ──step──▶ Stepping ──▶ Ready
//!                                 ▲ │
//!                                 └─┘ reset_state, reinit_state, current
//!
//! any phase ──dispose──▶ Disposed
//! ```
//!
//! Each step runs, in strict order:
//!
//! 1. `pre_integral` (normalization, remainder)
//! 2. `compute_derivative`
//! 3. the state update: the configured [`Integrator`] on every cell for
//!    generic channels, or the channel's own `update_state` for implicit ones
//! 4. `post_integral`
//!
//! and returns the current evaluated on the updated state. A failing step
//! returns the error and leaves the controller `Ready`.

use crate::error::{ChannelError, ChannelResult};
use crate::physics::{BatchShape, Channel, IntegrationMode, IonInfo, StateCell};
use crate::solver::methods::ForwardEuler;
use crate::solver::traits::Integrator;
use log::{debug, trace};
use nalgebra::DVector;
use std::fmt;

// =================================================================================================
// Lifecycle phase
// =================================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Uninitialized,
    Ready,
    Stepping,
    Disposed,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecyclePhase::Uninitialized => "uninitialized",
            LifecyclePhase::Ready => "ready",
            LifecyclePhase::Stepping => "stepping",
            LifecyclePhase::Disposed => "disposed",
        };
        write!(f, "{}", name)
    }
}

// =================================================================================================
// Channel lifecycle
// =================================================================================================

/// Phase-checked driver around one [`Channel`]
///
/// # Example
///
/// ```rust
/// use markov_rs::models::ResurgentSodium;
/// use markov_rs::physics::{BatchShape, IonInfo};
/// use markov_rs::solver::{ChannelLifecycle, LifecyclePhase};
/// use nalgebra::DVector;
///
/// # fn main() -> Result<(), markov_rs::error::ChannelError> {
/// let mut lifecycle = ChannelLifecycle::new(Box::new(ResurgentSodium::new(Default::default())?));
/// let v = DVector::from_element(1, -65.0);
/// let ion = IonInfo::uniform(BatchShape::Unbatched, 50.0, 10.0);
///
/// lifecycle.init_state(&v, &ion, BatchShape::Unbatched)?;
/// lifecycle.reset_state(&v, &ion)?;
/// let current = lifecycle.step(&v, &ion, 0.025)?;
/// assert_eq!(current.len(), 1);
/// assert_eq!(lifecycle.phase(), LifecyclePhase::Ready);
///
/// lifecycle.dispose();
/// assert!(lifecycle.step(&v, &ion, 0.025).is_err());
/// # Ok(())
/// # }
/// ```
pub struct ChannelLifecycle {
    channel: Box<dyn Channel>,
    integrator: Box<dyn Integrator>,
    phase: LifecyclePhase,
    batch: Option<BatchShape>,
    steps: usize,
}

impl ChannelLifecycle {
    /// Drive `channel`, using `integrator` for its generic-mode cells
    pub fn with_integrator(channel: Box<dyn Channel>, integrator: Box<dyn Integrator>) -> Self {
        Self {
            channel,
            integrator,
            phase: LifecyclePhase::Uninitialized,
            batch: None,
            steps: 0,
        }
    }

    /// Drive `channel` with [`ForwardEuler`] as generic integrator
    ///
    /// Implicit channels never consult the integrator.
    pub fn new(channel: Box<dyn Channel>) -> Self {
        Self::with_integrator(channel, Box::new(ForwardEuler::new()))
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    pub fn batch(&self) -> Option<BatchShape> {
        self.batch
    }

    /// Steps completed since the last reset
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn channel(&self) -> &dyn Channel {
        self.channel.as_ref()
    }

    pub fn integrator(&self) -> &dyn Integrator {
        self.integrator.as_ref()
    }

    /// Read access to the channel's cells
    pub fn cells(&self) -> Vec<&StateCell> {
        self.channel.cells()
    }

    /// Allocate the channel's cells: `Uninitialized → Ready`
    pub fn init_state(
        &mut self,
        v: &DVector<f64>,
        ion: &IonInfo,
        batch: BatchShape,
    ) -> ChannelResult<()> {
        self.require(LifecyclePhase::Uninitialized, "initialize")?;
        self.check_inputs(batch, v, ion)?;

        self.channel.init_state(v, ion, batch)?;
        self.batch = Some(batch);
        self.phase = LifecyclePhase::Ready;
        debug!("{}: initialized ({})", self.channel.name(), batch);
        Ok(())
    }

    /// Reallocate the cells of a `Ready` channel for a new batch shape
    ///
    /// The channel must be reset again before stepping.
    pub fn reinit_state(
        &mut self,
        v: &DVector<f64>,
        ion: &IonInfo,
        batch: BatchShape,
    ) -> ChannelResult<()> {
        self.ready_batch("re-initialize")?;
        self.check_inputs(batch, v, ion)?;

        self.channel.init_state(v, ion, batch)?;
        self.batch = Some(batch);
        self.steps = 0;
        debug!("{}: re-initialized ({})", self.channel.name(), batch);
        Ok(())
    }

    /// Bring the cells to their starting point
    pub fn reset_state(&mut self, v: &DVector<f64>, ion: &IonInfo) -> ChannelResult<()> {
        let batch = self.ready_batch("reset")?;
        self.check_inputs(batch, v, ion)?;

        self.channel.reset_state(v, ion)?;
        self.steps = 0;
        debug!("{}: reset", self.channel.name());
        Ok(())
    }

    /// Advance one step of `dt` ms and return the updated current
    pub fn step(
        &mut self,
        v: &DVector<f64>,
        ion: &IonInfo,
        dt: f64,
    ) -> ChannelResult<DVector<f64>> {
        let batch = self.ready_batch("step")?;
        self.check_inputs(batch, v, ion)?;
        if !(dt.is_finite() && dt > 0.0) {
            return Err(ChannelError::config(format!(
                "time step must be positive and finite, got {}",
                dt
            )));
        }

        self.phase = LifecyclePhase::Stepping;
        let outcome = self.run_phases(v, ion, dt);
        self.phase = LifecyclePhase::Ready;

        if outcome.is_ok() {
            self.steps += 1;
            trace!("{}: step {} done", self.channel.name(), self.steps);
        }
        outcome
    }

    /// Current on the present state
    pub fn current(&self, v: &DVector<f64>, ion: &IonInfo) -> ChannelResult<DVector<f64>> {
        let batch = self.ready_batch("compute current")?;
        self.check_inputs(batch, v, ion)?;
        self.channel.current(v, ion)
    }

    /// Release the channel; every later call fails
    pub fn dispose(&mut self) {
        if self.phase != LifecyclePhase::Disposed {
            debug!("{}: disposed after {} steps", self.channel.name(), self.steps);
        }
        self.phase = LifecyclePhase::Disposed;
    }

    fn run_phases(
        &mut self,
        v: &DVector<f64>,
        ion: &IonInfo,
        dt: f64,
    ) -> ChannelResult<DVector<f64>> {
        self.channel.pre_integral(v, ion)?;
        self.channel.compute_derivative(v, ion)?;

        match self.channel.integration_mode() {
            IntegrationMode::Implicit => self.channel.update_state(v, ion, dt)?,
            IntegrationMode::Generic => self.advance_cells(dt)?,
        }

        self.channel.post_integral(v, ion)?;
        self.channel.current(v, ion)
    }

    fn require(&self, expected: LifecyclePhase, operation: &'static str) -> ChannelResult<()> {
        if self.phase != expected {
            return Err(ChannelError::Lifecycle {
                operation,
                phase: self.phase.to_string(),
            });
        }
        Ok(())
    }

    fn ready_batch(&self, operation: &'static str) -> ChannelResult<BatchShape> {
        self.require(LifecyclePhase::Ready, operation)?;
        self.batch.ok_or(ChannelError::Lifecycle {
            operation,
            phase: self.phase.to_string(),
        })
    }

    /// Integrate every cell on a copy, then commit all of them
    fn advance_cells(&mut self, dt: f64) -> ChannelResult<()> {
        let mut staged: Vec<StateCell> = self.channel.cells().into_iter().cloned().collect();
        for cell in staged.iter_mut() {
            self.integrator.advance(cell, dt)?;
        }
        for (cell, next) in self.channel.cells_mut().into_iter().zip(staged) {
            cell.set_value(next.value().clone())?;
        }
        Ok(())
    }

    fn check_inputs(
        &self,
        batch: BatchShape,
        v: &DVector<f64>,
        ion: &IonInfo,
    ) -> ChannelResult<()> {
        batch.check("voltage", v.len())?;
        batch.check("ion reversal potential", ion.e.len())?;
        batch.check("ion concentration", ion.c.len())
    }
}

impl fmt::Debug for ChannelLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelLifecycle")
            .field("channel", &self.channel.name())
            .field("integrator", &self.integrator.name())
            .field("phase", &self.phase)
            .field("batch", &self.batch)
            .field("steps", &self.steps)
            .finish()
    }
}

// =================================================================================================
// Tests
// =================================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Records the order in which hooks are called
    struct Recorder {
        mode: IntegrationMode,
        log: Arc<Mutex<Vec<&'static str>>>,
        cells: Vec<StateCell>,
        n_cells: usize,
        fail_update: bool,
    }

    impl Recorder {
        fn new(mode: IntegrationMode) -> (Self, Arc<Mutex<Vec<&'static str>>>) {
            let log = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    mode,
                    log: Arc::clone(&log),
                    cells: Vec::new(),
                    n_cells: 1,
                    fail_update: false,
                },
                log,
            )
        }

        fn push(&self, hook: &'static str) {
            self.log.lock().unwrap().push(hook);
        }
    }

    impl Channel for Recorder {
        fn name(&self) -> &str {
            "Recorder"
        }

        fn init_state(
            &mut self,
            _v: &DVector<f64>,
            _ion: &IonInfo,
            batch: BatchShape,
        ) -> ChannelResult<()> {
            self.push("init");
            self.cells = (0..self.n_cells)
                .map(|i| StateCell::zeros(format!("x{}", i), batch))
                .collect();
            Ok(())
        }

        fn reset_state(&mut self, _v: &DVector<f64>, _ion: &IonInfo) -> ChannelResult<()> {
            self.push("reset");
            for cell in self.cells.iter_mut() {
                cell.value_mut().fill(1.0);
            }
            Ok(())
        }

        fn pre_integral(&mut self, _v: &DVector<f64>, _ion: &IonInfo) -> ChannelResult<()> {
            self.push("pre");
            Ok(())
        }

        fn compute_derivative(&mut self, _v: &DVector<f64>, _ion: &IonInfo) -> ChannelResult<()> {
            self.push("derivative");
            for cell in self.cells.iter_mut() {
                let d = -cell.value();
                cell.set_derivative(d)?;
            }
            Ok(())
        }

        fn update_state(
            &mut self,
            _v: &DVector<f64>,
            _ion: &IonInfo,
            _dt: f64,
        ) -> ChannelResult<()> {
            self.push("update");
            if self.fail_update {
                return Err(ChannelError::instability(0, "forced"));
            }
            Ok(())
        }

        fn post_integral(&mut self, _v: &DVector<f64>, _ion: &IonInfo) -> ChannelResult<()> {
            self.push("post");
            Ok(())
        }

        fn current(&self, _v: &DVector<f64>, _ion: &IonInfo) -> ChannelResult<DVector<f64>> {
            Ok(self.cells[0].value().clone())
        }

        fn integration_mode(&self) -> IntegrationMode {
            self.mode
        }

        fn cells(&self) -> Vec<&StateCell> {
            self.cells.iter().collect()
        }

        fn cells_mut(&mut self) -> Vec<&mut StateCell> {
            self.cells.iter_mut().collect()
        }
    }

    fn inputs(n: usize) -> (DVector<f64>, IonInfo, BatchShape) {
        let batch = BatchShape::from_len(n).unwrap();
        (
            DVector::from_element(n, -65.0),
            IonInfo::uniform(batch, 50.0, 10.0),
            batch,
        )
    }

    #[test]
    fn test_phase_transitions() {
        let (channel, _) = Recorder::new(IntegrationMode::Generic);
        let mut lifecycle = ChannelLifecycle::new(Box::new(channel));
        let (v, ion, batch) = inputs(2);

        assert_eq!(lifecycle.phase(), LifecyclePhase::Uninitialized);
        lifecycle.init_state(&v, &ion, batch).unwrap();
        assert_eq!(lifecycle.phase(), LifecyclePhase::Ready);
        assert_eq!(lifecycle.batch(), Some(batch));

        lifecycle.reset_state(&v, &ion).unwrap();
        lifecycle.step(&v, &ion, 0.1).unwrap();
        assert_eq!(lifecycle.phase(), LifecyclePhase::Ready);
        assert_eq!(lifecycle.steps(), 1);

        lifecycle.dispose();
        assert_eq!(lifecycle.phase(), LifecyclePhase::Disposed);
    }

    #[test]
    fn test_wrong_phase_rejected() {
        let (channel, _) = Recorder::new(IntegrationMode::Generic);
        let mut lifecycle = ChannelLifecycle::new(Box::new(channel));
        let (v, ion, batch) = inputs(1);

        let err = lifecycle.step(&v, &ion, 0.1).unwrap_err();
        assert_eq!(
            err,
            ChannelError::Lifecycle {
                operation: "step",
                phase: "uninitialized".to_string()
            }
        );
        assert!(lifecycle.current(&v, &ion).is_err());
        assert!(lifecycle.reset_state(&v, &ion).is_err());

        lifecycle.init_state(&v, &ion, batch).unwrap();
        assert!(matches!(
            lifecycle.init_state(&v, &ion, batch),
            Err(ChannelError::Lifecycle { .. })
        ));

        lifecycle.dispose();
        assert!(lifecycle.reset_state(&v, &ion).is_err());
        assert!(lifecycle.current(&v, &ion).is_err());
    }

    #[test]
    fn test_generic_hook_order() {
        let (channel, log) = Recorder::new(IntegrationMode::Generic);
        let mut lifecycle = ChannelLifecycle::new(Box::new(channel));
        let (v, ion, batch) = inputs(1);

        lifecycle.init_state(&v, &ion, batch).unwrap();
        lifecycle.reset_state(&v, &ion).unwrap();
        let i = lifecycle.step(&v, &ion, 0.1).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["init", "reset", "pre", "derivative", "post"]
        );
        // Forward Euler on dx/dt = -x from 1
        assert!((i[0] - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_implicit_bypasses_integrator() {
        let (channel, log) = Recorder::new(IntegrationMode::Implicit);
        let mut lifecycle = ChannelLifecycle::new(Box::new(channel));
        let (v, ion, batch) = inputs(1);

        lifecycle.init_state(&v, &ion, batch).unwrap();
        lifecycle.reset_state(&v, &ion).unwrap();
        let i = lifecycle.step(&v, &ion, 0.1).unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["init", "reset", "pre", "derivative", "update", "post"]
        );
        assert_eq!(i[0], 1.0);
    }

    #[test]
    fn test_failed_step_returns_to_ready() {
        let (mut channel, log) = Recorder::new(IntegrationMode::Implicit);
        channel.fail_update = true;
        let mut lifecycle = ChannelLifecycle::new(Box::new(channel));
        let (v, ion, batch) = inputs(1);

        lifecycle.init_state(&v, &ion, batch).unwrap();
        let err = lifecycle.step(&v, &ion, 0.1).unwrap_err();
        assert!(matches!(err, ChannelError::NumericalInstability { .. }));
        assert_eq!(lifecycle.phase(), LifecyclePhase::Ready);
        assert_eq!(lifecycle.steps(), 0);
        assert!(!log.lock().unwrap().contains(&"post"));
    }

    /// Forward Euler that fails on its second cell
    struct FailsOnSecondCell(AtomicUsize);

    impl Integrator for FailsOnSecondCell {
        fn advance(&self, cell: &mut StateCell, dt: f64) -> ChannelResult<()> {
            if self.0.fetch_add(1, Ordering::SeqCst) == 1 {
                return Err(ChannelError::instability(0, "integrator failure"));
            }
            ForwardEuler::new().advance(cell, dt)
        }

        fn name(&self) -> &str {
            "FailsOnSecondCell"
        }
    }

    #[test]
    fn test_failed_integration_leaves_cells_untouched() {
        let (mut channel, _) = Recorder::new(IntegrationMode::Generic);
        channel.n_cells = 3;
        let integrator = FailsOnSecondCell(AtomicUsize::new(0));
        let mut lifecycle =
            ChannelLifecycle::with_integrator(Box::new(channel), Box::new(integrator));
        let (v, ion, batch) = inputs(2);

        lifecycle.init_state(&v, &ion, batch).unwrap();
        lifecycle.reset_state(&v, &ion).unwrap();
        assert!(lifecycle.step(&v, &ion, 0.1).is_err());

        for cell in lifecycle.cells() {
            assert_eq!(cell.value(), &DVector::from_element(2, 1.0), "{}", cell.name());
        }
        assert_eq!(lifecycle.phase(), LifecyclePhase::Ready);
        assert_eq!(lifecycle.steps(), 0);
    }

    #[test]
    fn test_reinit_changes_batch() {
        let (channel, _) = Recorder::new(IntegrationMode::Generic);
        let mut lifecycle = ChannelLifecycle::new(Box::new(channel));
        let (v1, ion1, batch1) = inputs(1);
        let (v4, ion4, batch4) = inputs(4);

        assert!(lifecycle.reinit_state(&v4, &ion4, batch4).is_err());
        lifecycle.init_state(&v1, &ion1, batch1).unwrap();
        lifecycle.reset_state(&v1, &ion1).unwrap();
        lifecycle.step(&v1, &ion1, 0.1).unwrap();

        lifecycle.reinit_state(&v4, &ion4, batch4).unwrap();
        assert_eq!(lifecycle.batch(), Some(batch4));
        assert_eq!(lifecycle.steps(), 0);
        assert_eq!(lifecycle.cells()[0].len(), 4);
        lifecycle.reset_state(&v4, &ion4).unwrap();
        assert_eq!(lifecycle.step(&v4, &ion4, 0.1).unwrap().len(), 4);

        lifecycle.dispose();
        assert!(lifecycle.reinit_state(&v1, &ion1, batch1).is_err());
    }

    #[test]
    fn test_ion_concentration_shape_checked() {
        let (channel, _) = Recorder::new(IntegrationMode::Generic);
        let mut lifecycle = ChannelLifecycle::new(Box::new(channel));
        let (v, ion, batch) = inputs(3);
        lifecycle.init_state(&v, &ion, batch).unwrap();

        let mut bad = ion.clone();
        bad.c = DVector::from_element(2, 10.0);
        assert_eq!(
            lifecycle.step(&v, &bad, 0.1),
            Err(ChannelError::shape("ion concentration", 3, 2))
        );
        assert!(lifecycle.reset_state(&v, &bad).is_err());
        assert!(lifecycle.current(&v, &bad).is_err());
    }

    #[test]
    fn test_input_shapes_checked() {
        let (channel, _) = Recorder::new(IntegrationMode::Generic);
        let mut lifecycle = ChannelLifecycle::new(Box::new(channel));
        let (v, ion, batch) = inputs(3);

        let short = DVector::from_element(2, -65.0);
        assert!(matches!(
            lifecycle.init_state(&short, &ion, batch),
            Err(ChannelError::Shape { .. })
        ));
        assert_eq!(lifecycle.phase(), LifecyclePhase::Uninitialized);

        lifecycle.init_state(&v, &ion, batch).unwrap();
        assert!(lifecycle.step(&short, &ion, 0.1).is_err());
        assert!(matches!(
            lifecycle.step(&v, &ion, -0.1),
            Err(ChannelError::Configuration(_))
        ));
    }
}
