//! Diode model.
//!
//! Uses the Shockley diode equation:
//!   I = Is * (exp(V / (n * Vt)) - 1)
//!
//! Each Newton sub-iteration the junction is linearized around the
//! present operating point and stamped as a conductance plus a current
//! source:
//!   G_eq = Is/(n*Vt) * exp(V0/(n*Vt))
//!   I_eq = I(V0) - G_eq * V0
//!
//! Voltage steps past the critical voltage are pulled back
//! logarithmically; an oversized or limited step clears the engine's
//! convergence flag so another sub-iteration runs.

use super::{CircuitElement, Terminals};
use crate::solver::MnaSystem;
use crate::THERMAL_VOLTAGE;

/// Parameters for a diode model.
#[derive(Debug, Clone)]
pub struct DiodeParams {
    /// Saturation current (Is), typically 1e-14 to 1e-12 A.
    pub leakage: f64,
    /// Ideality factor (n), typically 1.0 to 2.0.
    pub emission: f64,
}

impl Default for DiodeParams {
    fn default() -> Self {
        Self {
            leakage: 1e-14,
            emission: 1.0,
        }
    }
}

impl DiodeParams {
    /// Parameters for a germanium diode (lower forward drop).
    pub fn germanium() -> Self {
        Self {
            leakage: 1e-9,
            emission: 1.5,
        }
    }
}

/// A diode element. Lead 0 is the anode, lead 1 the cathode.
#[derive(Debug, Clone)]
pub struct Diode {
    leads: Terminals,
    pub params: DiodeParams,
    vscale: f64,
    vdcoef: f64,
    vcrit: f64,
    last_voltdiff: f64,
}

impl Diode {
    /// Create a silicon diode with default parameters.
    pub fn new() -> Self {
        Self::with_params(DiodeParams::default())
    }

    /// Create a diode from explicit parameters.
    pub fn with_params(params: DiodeParams) -> Self {
        let vscale = params.emission * THERMAL_VOLTAGE;
        let vdcoef = 1.0 / vscale;
        // Voltage above which exp() would overflow the linear solve.
        let vcrit = vscale * (vscale / (std::f64::consts::SQRT_2 * params.leakage)).ln();
        Self {
            leads: Terminals::new(2),
            params,
            vscale,
            vdcoef,
            vcrit,
            last_voltdiff: 0.0,
        }
    }

    /// Junction current at voltage `v`.
    pub fn junction_current(&self, v: f64) -> f64 {
        self.params.leakage * ((v * self.vdcoef).exp() - 1.0)
    }

    fn limit_step(&self, mut vnew: f64, vold: f64, mna: &mut MnaSystem) -> f64 {
        if vnew > self.vcrit && (vnew - vold).abs() > 2.0 * self.vscale {
            if vold > 0.0 {
                let arg = 1.0 + (vnew - vold) / self.vscale;
                if arg > 0.0 {
                    vnew = vold + self.vscale * arg.ln();
                } else {
                    vnew = self.vcrit;
                }
            } else {
                vnew = self.vscale * (vnew / self.vscale).ln();
            }
            mna.converged = false;
        }
        vnew
    }
}

impl Default for Diode {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitElement for Diode {
    fn terminals(&self) -> &Terminals {
        &self.leads
    }

    fn terminals_mut(&mut self) -> &mut Terminals {
        &mut self.leads
    }

    fn nonlinear(&self) -> bool {
        true
    }

    fn stamp(&mut self, mna: &mut MnaSystem) {
        mna.stamp_nonlinear(self.lead_node(0));
        mna.stamp_nonlinear(self.lead_node(1));
    }

    fn step(&mut self, mna: &mut MnaSystem) {
        let mut voltdiff = self.lead_voltage(0) - self.lead_voltage(1);
        if (voltdiff - self.last_voltdiff).abs() > 0.01 {
            mna.converged = false;
        }
        voltdiff = self.limit_step(voltdiff, self.last_voltdiff, mna);
        self.last_voltdiff = voltdiff;

        let eval = (voltdiff * self.vdcoef).exp();
        let geq = self.vdcoef * self.params.leakage * eval;
        let nc = (eval - 1.0) * self.params.leakage - geq * voltdiff;
        mna.stamp_conductance(self.lead_node(0), self.lead_node(1), geq);
        mna.stamp_current_source(self.lead_node(0), self.lead_node(1), nc);
    }

    fn calculate_current(&mut self) {
        let v = self.voltage_delta();
        self.leads.current = self.junction_current(v);
    }

    fn reset(&mut self) {
        self.leads.clear();
        self.last_voltdiff = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_bias_current() {
        let d = Diode::new();
        // Around 0 V the junction is essentially off.
        assert!(d.junction_current(0.0).abs() < 1e-12);
        // Forward current grows exponentially.
        let i_small = d.junction_current(0.3);
        let i_large = d.junction_current(0.6);
        assert!(i_large > i_small * 100.0);
    }

    #[test]
    fn test_reverse_bias_saturates() {
        let d = Diode::new();
        let i_rev = d.junction_current(-1.0);
        assert!(i_rev < 0.0);
        assert!(i_rev > -2.0 * d.params.leakage);
    }

    #[test]
    fn test_oversized_step_clears_convergence() {
        let mut mna = MnaSystem::new(5e-6);
        mna.alloc(3, 0, true);
        let mut d = Diode::new();
        d.set_lead_node(0, 1);
        d.set_lead_node(1, 2);
        d.stamp(&mut mna);

        mna.converged = true;
        d.set_lead_voltage(0, 5.0);
        d.set_lead_voltage(1, 0.0);
        d.step(&mut mna);
        assert!(!mna.converged);
        // The accepted operating point was pulled back below the raw 5 V.
        assert!(d.last_voltdiff < 1.0);
    }

    #[test]
    fn test_marks_rows_nonlinear() {
        let mut mna = MnaSystem::new(5e-6);
        mna.alloc(3, 0, true);
        let mut d = Diode::new();
        d.set_lead_node(0, 1);
        d.set_lead_node(1, 2);
        d.stamp(&mut mna);
        assert!(mna.row_info[0].ls_changes);
        assert!(mna.row_info[1].ls_changes);
    }
}
