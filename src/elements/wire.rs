//! Connectivity elements: ideal wires and ground posts.
//!
//! Both stamp a 0 V voltage source. A wire row is exactly the shape the
//! row simplifier eliminates, so ideal wires cost nothing after analysis
//! while their current remains observable through the source registry.

use super::{CircuitElement, Terminals};
use crate::solver::MnaSystem;

/// An ideal wire between two leads.
#[derive(Debug, Clone)]
pub struct Wire {
    leads: Terminals,
    vs: usize,
}

impl Wire {
    /// Create a new wire.
    pub fn new() -> Self {
        Self {
            leads: Terminals::new(2),
            vs: 0,
        }
    }
}

impl Default for Wire {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitElement for Wire {
    fn terminals(&self) -> &Terminals {
        &self.leads
    }

    fn terminals_mut(&mut self) -> &mut Terminals {
        &mut self.leads
    }

    fn voltage_source_count(&self) -> usize {
        1
    }

    fn is_wire(&self) -> bool {
        true
    }

    fn set_voltage_source(&mut self, _ordinal: usize, global: usize) {
        self.vs = global;
    }

    fn stamp(&mut self, mna: &mut MnaSystem) {
        mna.stamp_voltage_source(self.lead_node(0), self.lead_node(1), self.vs, 0.0);
    }
}

/// A ground post pinning its single lead to 0 V.
#[derive(Debug, Clone)]
pub struct Ground {
    leads: Terminals,
    vs: usize,
}

impl Ground {
    /// Create a new ground post.
    pub fn new() -> Self {
        Self {
            leads: Terminals::new(1),
            vs: 0,
        }
    }
}

impl Default for Ground {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitElement for Ground {
    fn terminals(&self) -> &Terminals {
        &self.leads
    }

    fn terminals_mut(&mut self) -> &mut Terminals {
        &mut self.leads
    }

    fn voltage_source_count(&self) -> usize {
        1
    }

    fn lead_is_ground(&self, _lead: usize) -> bool {
        true
    }

    fn set_voltage_source(&mut self, _ordinal: usize, global: usize) {
        self.vs = global;
    }

    fn stamp(&mut self, mna: &mut MnaSystem) {
        mna.stamp_voltage_source(0, self.lead_node(0), self.vs, 0.0);
    }

    fn set_current(&mut self, _vs: usize, i: f64) {
        // Positive current flows out of the post into the circuit.
        self.leads.current = -i;
    }

    fn voltage_delta(&self) -> f64 {
        0.0
    }
}
