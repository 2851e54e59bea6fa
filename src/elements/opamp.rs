//! Operational amplifier model.
//!
//! Finite-gain model built from a transconductance stage: a VCCS of
//! `gm = gain / r_out` drives an internal node loaded by `1 / r_out`,
//! and an ideal 0 V source buffers that node onto the output lead so the
//! output current stays observable. At DC this reproduces
//! `v(out) = gain * (v(+) - v(-))` with output resistance `r_out`.
//! Output rails are not modeled.

use super::{CircuitElement, Terminals};
use crate::solver::MnaSystem;

/// Parameters for an op-amp model.
#[derive(Debug, Clone)]
pub struct OpAmpParams {
    /// Open-loop DC gain.
    pub gain: f64,
    /// Output resistance in ohms.
    pub r_out: f64,
    /// Input resistance in ohms.
    pub r_in: f64,
}

impl Default for OpAmpParams {
    fn default() -> Self {
        Self::ideal()
    }
}

impl OpAmpParams {
    /// Very high but finite gain for numerical stability.
    pub fn ideal() -> Self {
        Self {
            gain: 1e5,
            r_out: 75.0,
            r_in: 1e9,
        }
    }
}

/// An op-amp. Leads are [output, non-inverting (+), inverting (-)];
/// the transconductance stage lives on one internal node.
#[derive(Debug, Clone)]
pub struct OpAmp {
    leads: Terminals,
    pub params: OpAmpParams,
    vs: usize,
}

impl OpAmp {
    pub fn new(params: OpAmpParams) -> Self {
        Self {
            leads: Terminals::with_internal(3, 1),
            params,
            vs: 0,
        }
    }

    /// Effective transconductance of the input stage.
    pub fn transconductance(&self) -> f64 {
        self.params.gain / self.params.r_out
    }
}

impl Default for OpAmp {
    fn default() -> Self {
        Self::new(OpAmpParams::ideal())
    }
}

impl CircuitElement for OpAmp {
    fn terminals(&self) -> &Terminals {
        &self.leads
    }

    fn terminals_mut(&mut self) -> &mut Terminals {
        &mut self.leads
    }

    fn voltage_source_count(&self) -> usize {
        1
    }

    fn lead_is_ground(&self, lead: usize) -> bool {
        // The output is driven against ground through the output stage.
        lead == 0
    }

    fn leads_are_connected(&self, _a: usize, _b: usize) -> bool {
        false
    }

    fn set_voltage_source(&mut self, _ordinal: usize, global: usize) {
        self.vs = global;
    }

    fn stamp(&mut self, mna: &mut MnaSystem) {
        let out = self.lead_node(0);
        let inp = self.lead_node(1);
        let inn = self.lead_node(2);
        let drive = self.lead_node(3);

        let g_out = 1.0 / self.params.r_out;
        mna.stamp_vc_current_source(0, drive, inp, inn, self.transconductance());
        mna.stamp_conductance(drive, 0, g_out);
        mna.stamp_conductance(inp, inn, 1.0 / self.params.r_in);
        mna.stamp_voltage_source(drive, out, self.vs, 0.0);
    }

    fn voltage_delta(&self) -> f64 {
        self.leads.volts[0]
    }
}
