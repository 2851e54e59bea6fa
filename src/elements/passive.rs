//! Linear passive elements: Resistor, Capacitor, Inductor.

use super::{CircuitElement, Terminals};
use crate::solver::MnaSystem;

/// A resistor element.
#[derive(Debug, Clone)]
pub struct Resistor {
    leads: Terminals,
    /// Resistance in ohms.
    pub resistance: f64,
}

impl Resistor {
    /// Create a new resistor.
    pub fn new(resistance: f64) -> Self {
        Self {
            leads: Terminals::new(2),
            // Minimum resistance to avoid singularity
            resistance: resistance.max(1e-12),
        }
    }

    /// Conductance (1/R).
    pub fn conductance(&self) -> f64 {
        1.0 / self.resistance
    }
}

impl CircuitElement for Resistor {
    fn terminals(&self) -> &Terminals {
        &self.leads
    }

    fn terminals_mut(&mut self) -> &mut Terminals {
        &mut self.leads
    }

    fn stamp(&mut self, mna: &mut MnaSystem) {
        mna.stamp_resistor(self.lead_node(0), self.lead_node(1), self.resistance);
    }

    fn calculate_current(&mut self) {
        let v = self.voltage_delta();
        self.leads.current = v / self.resistance;
    }
}

/// A capacitor element.
///
/// In discrete time a capacitor is replaced by its trapezoidal companion
/// model: a Norton equivalent of resistance `dt / (2C)` in parallel with
/// a history current source recomputed every tick:
///
/// ```text
/// i(n) = v(n) / R_c + i_src     with  i_src = -v(n-1) / R_c - i(n-1)
/// ```
#[derive(Debug, Clone)]
pub struct Capacitor {
    leads: Terminals,
    /// Capacitance in farads.
    pub capacitance: f64,
    comp_resistance: f64,
    cur_source_value: f64,
}

impl Capacitor {
    /// Create a new capacitor.
    pub fn new(capacitance: f64) -> Self {
        Self {
            leads: Terminals::new(2),
            capacitance,
            comp_resistance: 0.0,
            cur_source_value: 0.0,
        }
    }

    /// Companion resistance for the configured time step.
    pub fn companion_resistance(&self, dt: f64) -> f64 {
        dt / (2.0 * self.capacitance)
    }
}

impl CircuitElement for Capacitor {
    fn terminals(&self) -> &Terminals {
        &self.leads
    }

    fn terminals_mut(&mut self) -> &mut Terminals {
        &mut self.leads
    }

    fn stamp(&mut self, mna: &mut MnaSystem) {
        self.comp_resistance = self.companion_resistance(mna.time_step);
        mna.stamp_resistor(self.lead_node(0), self.lead_node(1), self.comp_resistance);
        // The history current source rewrites these right sides each tick.
        mna.stamp_right_side_changes(self.lead_node(0));
        mna.stamp_right_side_changes(self.lead_node(1));
    }

    fn begin_step(&mut self, _mna: &mut MnaSystem) {
        let voltdiff = self.voltage_delta();
        self.cur_source_value = -voltdiff / self.comp_resistance - self.leads.current;
    }

    fn step(&mut self, mna: &mut MnaSystem) {
        mna.stamp_current_source(self.lead_node(0), self.lead_node(1), self.cur_source_value);
    }

    fn calculate_current(&mut self) {
        let voltdiff = self.voltage_delta();
        if self.comp_resistance > 0.0 {
            self.leads.current = voltdiff / self.comp_resistance + self.cur_source_value;
        }
    }

    fn reset(&mut self) {
        self.leads.clear();
        self.cur_source_value = 0.0;
    }
}

/// An inductor element.
///
/// The trapezoidal companion model is the dual of the capacitor's: a
/// resistance of `2L / dt` in parallel with a history current source.
#[derive(Debug, Clone)]
pub struct Inductor {
    leads: Terminals,
    /// Inductance in henries.
    pub inductance: f64,
    comp_resistance: f64,
    cur_source_value: f64,
}

impl Inductor {
    /// Create a new inductor.
    pub fn new(inductance: f64) -> Self {
        Self {
            leads: Terminals::new(2),
            inductance,
            comp_resistance: 0.0,
            cur_source_value: 0.0,
        }
    }

    /// Companion resistance for the configured time step.
    pub fn companion_resistance(&self, dt: f64) -> f64 {
        2.0 * self.inductance / dt
    }
}

impl CircuitElement for Inductor {
    fn terminals(&self) -> &Terminals {
        &self.leads
    }

    fn terminals_mut(&mut self) -> &mut Terminals {
        &mut self.leads
    }

    fn stamp(&mut self, mna: &mut MnaSystem) {
        self.comp_resistance = self.companion_resistance(mna.time_step);
        mna.stamp_resistor(self.lead_node(0), self.lead_node(1), self.comp_resistance);
        mna.stamp_right_side_changes(self.lead_node(0));
        mna.stamp_right_side_changes(self.lead_node(1));
    }

    fn begin_step(&mut self, _mna: &mut MnaSystem) {
        let voltdiff = self.voltage_delta();
        self.cur_source_value = voltdiff / self.comp_resistance + self.leads.current;
    }

    fn step(&mut self, mna: &mut MnaSystem) {
        mna.stamp_current_source(self.lead_node(0), self.lead_node(1), self.cur_source_value);
    }

    fn calculate_current(&mut self) {
        let voltdiff = self.voltage_delta();
        if self.comp_resistance > 0.0 {
            self.leads.current = voltdiff / self.comp_resistance + self.cur_source_value;
        }
    }

    fn reset(&mut self) {
        self.leads.clear();
        self.cur_source_value = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resistor_conductance() {
        let r = Resistor::new(1000.0);
        assert!((r.conductance() - 0.001).abs() < 1e-10);
    }

    #[test]
    fn test_resistor_current_follows_voltage() {
        let mut r = Resistor::new(500.0);
        r.set_lead_voltage(0, 2.0);
        r.set_lead_voltage(1, 0.0);
        assert!((r.current() - 0.004).abs() < 1e-12);
    }

    #[test]
    fn test_capacitor_companion_resistance() {
        let c = Capacitor::new(1e-6);
        let dt = 5e-6;
        // dt / (2C) = 5e-6 / 2e-6 = 2.5 ohms
        assert!((c.companion_resistance(dt) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_inductor_companion_resistance() {
        let l = Inductor::new(1e-3);
        let dt = 5e-6;
        // 2L / dt = 2e-3 / 5e-6 = 400 ohms
        assert!((l.companion_resistance(dt) - 400.0).abs() < 1e-9);
    }

    #[test]
    fn test_capacitor_history_source() {
        let mut mna = MnaSystem::new(5e-6);
        mna.alloc(3, 0, false);
        let mut c = Capacitor::new(1e-6);
        c.set_lead_node(0, 1);
        c.set_lead_node(1, 2);
        c.stamp(&mut mna);

        // With 1 V across the plates the history source discharges it.
        c.set_lead_voltage(0, 1.0);
        c.set_lead_voltage(1, 0.0);
        c.begin_step(&mut mna);
        let expected = -1.0 / 2.5 - c.current();
        mna.right_side.fill(0.0);
        c.step(&mut mna);
        assert!((mna.right_side[0] + expected).abs() < 1e-12);
        assert!((mna.right_side[1] - expected).abs() < 1e-12);
    }
}
