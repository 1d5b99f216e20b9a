//! p³q sodium channels
//!
//! Two independent first-order gates, activation `p` and inactivation `q`:
//!
//! ```text
//! dp/dt = phi · (alpha_p(V) · (1 − p) − beta_p(V) · p)
//! dq/dt = phi · (alpha_q(V) · (1 − q) − beta_q(V) · q)
//! I     = g_max · p³ · q · (E − V)
//! ```
//!
//! Each gate is a two-state scheme, so it is cheap and not stiff at usual
//! step sizes: these channels use `IntegrationMode::Generic` and are
//! advanced by the lifecycle's integrator.
//!
//! Three published rate laws are provided ([`P3qRateLaw`]), all written
//! relative to a voltage shift `V_sh`. Removable singularities are
//! evaluated through [`exprel`].

use crate::error::{ChannelError, ChannelResult};
use crate::kinetics::{exprel, q10_factor};
use crate::physics::{BatchShape, Channel, IntegrationMode, IonInfo, StateCell};
use nalgebra::DVector;

// =================================================================================================
// Rate laws
// =================================================================================================

/// Published voltage dependence of the p and q gates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum P3qRateLaw {
    /// Hodgkin & Huxley (1952)
    Hh1952,
    /// Bazhenov et al. (2002)
    Ba2002,
    /// Traub & Miles (1991)
    Tm1991,
}

impl P3qRateLaw {
    pub fn name(&self) -> &'static str {
        match self {
            P3qRateLaw::Hh1952 => "INa_HH1952",
            P3qRateLaw::Ba2002 => "INa_Ba2002",
            P3qRateLaw::Tm1991 => "INa_TM1991",
        }
    }

    /// `(alpha_p, beta_p)` at `v` for shift `v_sh`
    pub fn p_rates(&self, v: f64, v_sh: f64) -> (f64, f64) {
        let u = v - v_sh;
        match self {
            P3qRateLaw::Hh1952 => (
                1.0 / exprel(-(u - 5.0) / 10.0),
                4.0 * (-(u + 20.0) / 18.0).exp(),
            ),
            P3qRateLaw::Ba2002 | P3qRateLaw::Tm1991 => (
                0.32 * 4.0 / exprel(-(u - 13.0) / 4.0),
                0.28 * 5.0 / exprel((u - 40.0) / 5.0),
            ),
        }
    }

    /// `(alpha_q, beta_q)` at `v` for shift `v_sh`
    pub fn q_rates(&self, v: f64, v_sh: f64) -> (f64, f64) {
        let u = v - v_sh;
        match self {
            P3qRateLaw::Hh1952 => (
                0.07 * (-(u + 20.0) / 20.0).exp(),
                1.0 / (1.0 + (-(u - 10.0) / 10.0).exp()),
            ),
            P3qRateLaw::Ba2002 | P3qRateLaw::Tm1991 => (
                0.128 * (-(u - 17.0) / 18.0).exp(),
                4.0 / (1.0 + (-(u - 40.0) / 5.0).exp()),
            ),
        }
    }
}

// =================================================================================================
// Parameters
// =================================================================================================

/// Parameters of a p³q sodium channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct P3qParams {
    pub law: P3qRateLaw,
    /// Maximal conductance (mS/cm²)
    pub g_max: f64,
    /// Voltage shift (mV)
    pub v_sh: f64,
    /// Temperature factor applied to both gates
    pub phi: f64,
}

impl P3qParams {
    pub fn hh1952() -> Self {
        Self {
            law: P3qRateLaw::Hh1952,
            g_max: 120.0,
            v_sh: -45.0,
            phi: 1.0,
        }
    }

    /// Bazhenov kinetics at `temperature` °C, `phi = 3^((T − 36)/10)`
    pub fn ba2002(temperature: f64) -> Self {
        Self {
            law: P3qRateLaw::Ba2002,
            g_max: 90.0,
            v_sh: -50.0,
            phi: q10_factor(3.0, temperature, 36.0),
        }
    }

    pub fn tm1991() -> Self {
        Self {
            law: P3qRateLaw::Tm1991,
            g_max: 120.0,
            v_sh: -63.0,
            phi: 1.0,
        }
    }

    pub fn validate(&self) -> ChannelResult<()> {
        if !(self.g_max.is_finite() && self.g_max >= 0.0) {
            return Err(ChannelError::config(format!(
                "maximal conductance must be non-negative, got {}",
                self.g_max
            )));
        }
        if !(self.phi.is_finite() && self.phi > 0.0) {
            return Err(ChannelError::config(format!(
                "temperature factor must be positive, got {}",
                self.phi
            )));
        }
        if !self.v_sh.is_finite() {
            return Err(ChannelError::config("voltage shift must be finite"));
        }
        Ok(())
    }
}

impl Default for P3qParams {
    fn default() -> Self {
        Self::hh1952()
    }
}

// =================================================================================================
// Channel
// =================================================================================================

/// Sodium channel with `I = g_max p³ q (E − V)`
#[derive(Debug, Clone)]
pub struct SodiumP3q {
    params: P3qParams,
    p: StateCell,
    q: StateCell,
}

impl SodiumP3q {
    pub fn new(params: P3qParams) -> ChannelResult<Self> {
        params.validate()?;
        Ok(Self {
            params,
            p: StateCell::zeros("p", BatchShape::Unbatched),
            q: StateCell::zeros("q", BatchShape::Unbatched),
        })
    }

    pub fn params(&self) -> &P3qParams {
        &self.params
    }

    pub fn p(&self) -> &DVector<f64> {
        self.p.value()
    }

    pub fn q(&self) -> &DVector<f64> {
        self.q.value()
    }

    /// Steady-state value `alpha/(alpha + beta)` of both gates at `v`
    pub fn steady_state(&self, v: f64) -> (f64, f64) {
        let (ap, bp) = self.params.law.p_rates(v, self.params.v_sh);
        let (aq, bq) = self.params.law.q_rates(v, self.params.v_sh);
        (ap / (ap + bp), aq / (aq + bq))
    }

    fn check_voltage(&self, v: &DVector<f64>) -> ChannelResult<()> {
        self.p.shape().check("voltage", v.len())
    }
}

impl Channel for SodiumP3q {
    fn name(&self) -> &str {
        self.params.law.name()
    }

    fn init_state(
        &mut self,
        v: &DVector<f64>,
        _ion: &IonInfo,
        batch: BatchShape,
    ) -> ChannelResult<()> {
        batch.check("voltage", v.len())?;
        self.p = StateCell::zeros("p", batch);
        self.q = StateCell::zeros("q", batch);
        Ok(())
    }

    fn reset_state(&mut self, v: &DVector<f64>, _ion: &IonInfo) -> ChannelResult<()> {
        self.check_voltage(v)?;
        let (p, q): (Vec<f64>, Vec<f64>) = v.iter().map(|&vk| self.steady_state(vk)).unzip();
        self.p.set_value(DVector::from_vec(p))?;
        self.q.set_value(DVector::from_vec(q))
    }

    fn compute_derivative(&mut self, v: &DVector<f64>, _ion: &IonInfo) -> ChannelResult<()> {
        self.check_voltage(v)?;
        let P3qParams { law, v_sh, phi, .. } = self.params;

        let dp = DVector::from_fn(v.len(), |k, _| {
            let (a, b) = law.p_rates(v[k], v_sh);
            let x = self.p.value()[k];
            phi * (a * (1.0 - x) - b * x)
        });
        let dq = DVector::from_fn(v.len(), |k, _| {
            let (a, b) = law.q_rates(v[k], v_sh);
            let x = self.q.value()[k];
            phi * (a * (1.0 - x) - b * x)
        });

        self.p.set_derivative(dp)?;
        self.q.set_derivative(dq)
    }

    fn current(&self, v: &DVector<f64>, ion: &IonInfo) -> ChannelResult<DVector<f64>> {
        self.check_voltage(v)?;
        if ion.len() != v.len() {
            return Err(ChannelError::shape("ion reversal potential", v.len(), ion.len()));
        }
        let g = self.params.g_max;
        Ok(DVector::from_fn(v.len(), |k, _| {
            let p = self.p.value()[k];
            g * p * p * p * self.q.value()[k] * (ion.e[k] - v[k])
        }))
    }

    fn integration_mode(&self) -> IntegrationMode {
        IntegrationMode::Generic
    }

    fn cells(&self) -> Vec<&StateCell> {
        vec![&self.p, &self.q]
    }

    fn cells_mut(&mut self) -> Vec<&mut StateCell> {
        vec![&mut self.p, &mut self.q]
    }

    fn description(&self) -> Option<&str> {
        Some("p3q sodium channel (two independent gates)")
    }
}

// =================================================================================================
// Tests
// =================================================================================================
