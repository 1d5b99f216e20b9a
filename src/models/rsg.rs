//! Resurgent sodium channel
//!
//! Thirteen-state Markov scheme with five closed states, an open state, an
//! open-channel blocked state `B` and six inactivated states:
//!
//! ```text
//!        f01      f02      f03      f04      f0O      fip
//!   C1 ⇄ C2 ⇄ C3 ⇄ C4 ⇄ C5 ⇄ O ⇄ B
//!   ↕ fi1/bi1  ↕ …        ↕ fi5/bi5    ↕ fin/bin
//!   I1 ⇄ I2 ⇄ I3 ⇄ I4 ⇄ I5 ⇄ I6
//!        f11      f12      f13      f14      f1n
//! ```
//!
//! `I6` is the derived remainder `1 − Σ tracked`. All rates are in 1/ms,
//! scaled by `phi = 3^((T − 22)/10)`. The current flows through `O`:
//! `I = g_max · O · (E − V)`.
//!
//! Inactivation rates `Ck → Ik` and `Ik → Ck` are geometric in
//! `alfac = (Oon/Con)^(1/4)` and `btfac = (Ooff/Coff)^(1/4)` so that
//! detailed balance holds around every cycle.
//!
//! # Example
//!
//! ```rust
//! use markov_rs::models::{ResurgentSodium, RsgParams};
//!
//! # fn main() -> Result<(), markov_rs::error::ChannelError> {
//! let warm = ResurgentSodium::new(RsgParams { temperature: 32.0, ..Default::default() })?;
//! assert!((warm.params().phi() - 3.0).abs() < 1e-12);
//! # Ok(())
//! # }
//! ```

use crate::error::{ChannelError, ChannelResult};
use crate::kinetics::{MarkovScheme, RateTable, q10_factor};
use crate::models::markov::MarkovChannel;
use crate::physics::{BatchShape, Channel, IntegrationMode, IonInfo, StateCell};
use nalgebra::DVector;

/// Tracked states in storage order
pub const RSG_STATES: [&str; 12] = [
    "C1", "C2", "C3", "C4", "C5", "I1", "I2", "I3", "I4", "I5", "O", "B",
];

/// Derived remainder state
pub const RSG_REMAINDER: &str = "I6";

// =================================================================================================
// Parameters
// =================================================================================================

/// Kinetic constants of the resurgent sodium scheme
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RsgParams {
    /// Temperature (°C)
    pub temperature: f64,
    /// Maximal conductance (mS/cm²)
    pub g_max: f64,

    pub con: f64,
    pub coff: f64,
    pub oon: f64,
    pub ooff: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub delta: f64,
    pub epsilon: f64,
    pub zeta: f64,

    /// Voltage slopes (mV)
    pub x1: f64,
    pub x2: f64,
    pub x3: f64,
    pub x4: f64,
    pub x5: f64,
    pub x6: f64,

    /// Voltage shifts (mV)
    pub vshifta: f64,
    pub vshifti: f64,
    pub vshiftk: f64,
}

impl Default for RsgParams {
    fn default() -> Self {
        Self {
            temperature: 22.0,
            g_max: 15.0,
            con: 0.005,
            coff: 0.5,
            oon: 0.75,
            ooff: 0.005,
            alpha: 150.0,
            beta: 3.0,
            gamma: 150.0,
            delta: 40.0,
            epsilon: 1.75,
            zeta: 0.03,
            x1: 20.0,
            x2: -20.0,
            x3: 1e12,
            x4: -1e12,
            x5: 1e12,
            x6: -25.0,
            vshifta: 0.0,
            vshifti: 0.0,
            vshiftk: 0.0,
        }
    }
}

impl RsgParams {
    /// Temperature factor `3^((T − 22)/10)`
    pub fn phi(&self) -> f64 {
        q10_factor(3.0, self.temperature, 22.0)
    }

    pub fn alfac(&self) -> f64 {
        (self.oon / self.con).powf(0.25)
    }

    pub fn btfac(&self) -> f64 {
        (self.ooff / self.coff).powf(0.25)
    }

    pub fn validate(&self) -> ChannelResult<()> {
        let positive = [
            ("Con", self.con),
            ("Coff", self.coff),
            ("Oon", self.oon),
            ("Ooff", self.ooff),
            ("alpha", self.alpha),
            ("beta", self.beta),
            ("gamma", self.gamma),
            ("delta", self.delta),
            ("epsilon", self.epsilon),
            ("zeta", self.zeta),
        ];
        if let Some((name, value)) = positive.iter().find(|(_, x)| !(x.is_finite() && *x > 0.0)) {
            return Err(ChannelError::config(format!(
                "rate constant {} must be positive, got {}",
                name, value
            )));
        }
        let slopes = [self.x1, self.x2 + self.vshiftk, self.x3, self.x4, self.x5, self.x6];
        if slopes.iter().any(|x| !x.is_finite() || *x == 0.0) {
            return Err(ChannelError::config("voltage slopes must be finite and non-zero"));
        }
        if !(self.g_max.is_finite() && self.g_max >= 0.0) {
            return Err(ChannelError::config("maximal conductance must be non-negative"));
        }
        if !self.temperature.is_finite() {
            return Err(ChannelError::config("temperature must be finite"));
        }
        Ok(())
    }

    /// Rate table of all 34 transitions
    pub fn rate_table(&self) -> ChannelResult<RateTable> {
        let p = *self;
        let phi = p.phi();
        let alfac = p.alfac();
        let btfac = p.btfac();
        let mut table = RateTable::new();

        // activation along the closed and inactivated rows
        for (k, factor) in [4.0, 3.0, 2.0, 1.0].into_iter().enumerate() {
            table.insert(format!("f0{}", k + 1), move |v: f64| {
                factor * p.alpha * (v / p.x1).exp() * phi
            })?;
            table.insert(format!("f1{}", k + 1), move |v: f64| {
                factor * p.alpha * alfac * ((v + p.vshifti) / p.x1).exp() * phi
            })?;
        }
        for (k, factor) in [1.0, 2.0, 3.0, 4.0].into_iter().enumerate() {
            table.insert(format!("b0{}", k + 1), move |v: f64| {
                factor * p.beta * ((v + p.vshifta) / (p.x2 + p.vshiftk)).exp() * phi
            })?;
            table.insert(format!("b1{}", k + 1), move |v: f64| {
                factor * p.beta * btfac * ((v + p.vshifti) / p.x2).exp() * phi
            })?;
        }

        table.insert("f0O", move |v: f64| p.gamma * (v / p.x3).exp() * phi)?;
        table.insert("b0O", move |v: f64| p.delta * (v / p.x4).exp() * phi)?;
        table.insert("f1n", move |v: f64| p.gamma * (v / p.x3).exp() * phi)?;
        table.insert("b1n", move |v: f64| p.delta * (v / p.x4).exp() * phi)?;
        table.insert("fip", move |v: f64| p.epsilon * (v / p.x5).exp() * phi)?;
        table.insert("bip", move |v: f64| p.zeta * (v / p.x6).exp() * phi)?;

        // voltage-independent inactivation
        for k in 0..5 {
            table.insert_constant(format!("fi{}", k + 1), p.con * alfac.powi(k) * phi)?;
            table.insert_constant(format!("bi{}", k + 1), p.coff * btfac.powi(k) * phi)?;
        }
        table.insert_constant("fin", p.oon * phi)?;
        table.insert_constant("bin", p.ooff * phi)?;

        Ok(table)
    }

    /// Full kinetic scheme with `I6` as derived remainder
    pub fn scheme(&self) -> ChannelResult<MarkovScheme> {
        let mut builder = MarkovScheme::builder()
            .states(&RSG_STATES)
            .remainder(RSG_REMAINDER);

        for k in 1..=4 {
            let (c, c_next) = (format!("C{}", k), format!("C{}", k + 1));
            let (i, i_next) = (format!("I{}", k), format!("I{}", k + 1));
            builder = builder
                .reversible(&c, &c_next, &format!("f0{}", k), &format!("b0{}", k))
                .reversible(&i, &i_next, &format!("f1{}", k), &format!("b1{}", k));
        }
        for k in 1..=5 {
            builder = builder.reversible(
                &format!("C{}", k),
                &format!("I{}", k),
                &format!("fi{}", k),
                &format!("bi{}", k),
            );
        }

        builder
            .reversible("C5", "O", "f0O", "b0O")
            .reversible("I5", "I6", "f1n", "b1n")
            .reversible("O", "B", "fip", "bip")
            .reversible("O", "I6", "fin", "bin")
            .build(self.rate_table()?)
    }
}

// =================================================================================================
// Resurgent sodium channel
// =================================================================================================

/// Resurgent sodium current, integrated implicitly
///
/// By default reset seeds the steady state at the reset voltage. With
/// [`with_steady_state_reset(false)`](ResurgentSodium::with_steady_state_reset)
/// reset puts all occupancy in `C1` and normalizes.
#[derive(Debug, Clone)]
pub struct ResurgentSodium {
    params: RsgParams,
    inner: MarkovChannel,
}

impl ResurgentSodium {
    pub fn new(params: RsgParams) -> ChannelResult<Self> {
        params.validate()?;
        let inner = MarkovChannel::new("INa_Rsg", params.scheme()?, &["O"], params.g_max)?
            .with_steady_state_reset(true);
        Ok(Self { params, inner })
    }

    /// Choose how `reset_state` seeds the cells
    pub fn with_steady_state_reset(mut self, enabled: bool) -> Self {
        self.inner = self.inner.with_steady_state_reset(enabled);
        self
    }

    pub fn steady_state_reset(&self) -> bool {
        self.inner.steady_state_reset()
    }

    pub fn params(&self) -> &RsgParams {
        &self.params
    }

    pub fn scheme(&self) -> &MarkovScheme {
        self.inner.scheme()
    }

    /// Values of one tracked state (`"C1"` … `"B"`)
    pub fn occupancy(&self, state: &str) -> Option<&DVector<f64>> {
        self.inner.occupancy(state)
    }

    /// Derived `I6` occupancy per compartment
    pub fn i6(&self) -> ChannelResult<DVector<f64>> {
        self.inner
            .remainder()?
            .ok_or_else(|| ChannelError::config("scheme has no remainder state"))
    }
}

impl Channel for ResurgentSodium {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn init_state(
        &mut self,
        v: &DVector<f64>,
        ion: &IonInfo,
        batch: BatchShape,
    ) -> ChannelResult<()> {
        self.inner.init_state(v, ion, batch)
    }

    fn reset_state(&mut self, v: &DVector<f64>, ion: &IonInfo) -> ChannelResult<()> {
        self.inner.reset_state(v, ion)
    }

    fn pre_integral(&mut self, v: &DVector<f64>, ion: &IonInfo) -> ChannelResult<()> {
        self.inner.pre_integral(v, ion)
    }

    fn compute_derivative(&mut self, v: &DVector<f64>, ion: &IonInfo) -> ChannelResult<()> {
        self.inner.compute_derivative(v, ion)
    }

    fn update_state(&mut self, v: &DVector<f64>, ion: &IonInfo, dt: f64) -> ChannelResult<()> {
        self.inner.update_state(v, ion, dt)
    }

    fn current(&self, v: &DVector<f64>, ion: &IonInfo) -> ChannelResult<DVector<f64>> {
        self.inner.current(v, ion)
    }

    fn integration_mode(&self) -> IntegrationMode {
        IntegrationMode::Implicit
    }

    fn cells(&self) -> Vec<&StateCell> {
        self.inner.cells()
    }

    fn cells_mut(&mut self) -> Vec<&mut StateCell> {
        self.inner.cells_mut()
    }

    fn description(&self) -> Option<&str> {
        Some("Resurgent sodium channel (13-state Markov scheme, I6 derived)")
    }
}

// =================================================================================================
// Tests
// =================================================================================================
