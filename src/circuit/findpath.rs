//! Graph traversal used by pre-simulation validation.
//!
//! A [`FindPath`] answers one question: does a path exist between two
//! nodes through a restricted class of elements, ignoring the element
//! under test? The class depends on the [`PathKind`]:
//!
//! | kind | admissible elements | answers |
//! |---|---|---|
//! | `Inductor` | any except current sources | does an inductor have a return path? |
//! | `Voltage` | wires and voltage sources | zero-resistance source loop? |
//! | `Short` | wires only | is a capacitor shorted? |
//! | `CapVoltage` | wires, capacitors, voltage sources | capacitor loop with no resistor? |
//!
//! The ground bus is not modeled as edges, so the walk may hop into and
//! out of node 0 through any lead that reports a ground connection.

use crate::elements::{CircuitElement, Element};

/// Which elements a path may traverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Inductor,
    Voltage,
    Short,
    CapVoltage,
}

/// Depth-first path search over the post-resolver graph.
pub struct FindPath<'a> {
    kind: PathKind,
    elements: &'a [Element],
    first: usize,
    dest: usize,
    used: Vec<bool>,
}

impl<'a> FindPath<'a> {
    /// Prepare a search toward `dest`, excluding element `first`.
    pub fn new(
        kind: PathKind,
        elements: &'a [Element],
        node_count: usize,
        first: usize,
        dest: usize,
    ) -> Self {
        Self {
            kind,
            elements,
            first,
            dest,
            used: vec![false; node_count],
        }
    }

    /// Search with unbounded depth.
    pub fn search(&mut self, start: usize) -> bool {
        self.walk(start, -1)
    }

    /// Search visiting at most `depth` nodes along any branch.
    pub fn search_depth(&mut self, start: usize, depth: i32) -> bool {
        self.walk(start, depth)
    }

    fn admissible(&self, elm: &Element) -> bool {
        match self.kind {
            PathKind::Inductor => !matches!(elm, Element::Current(_)),
            PathKind::Voltage => {
                elm.is_wire() || matches!(elm, Element::Voltage(_) | Element::Rail(_))
            }
            PathKind::Short => elm.is_wire(),
            PathKind::CapVoltage => {
                elm.is_wire()
                    || matches!(
                        elm,
                        Element::Capacitor(_) | Element::Voltage(_) | Element::Rail(_)
                    )
            }
        }
    }

    fn walk(&mut self, n1: usize, mut depth: i32) -> bool {
        if n1 == self.dest {
            return true;
        }
        if depth == 0 {
            return false;
        }
        depth -= 1;
        if self.used[n1] {
            return false;
        }
        self.used[n1] = true;

        let elements = self.elements;
        for (ei, elm) in elements.iter().enumerate() {
            if ei == self.first {
                continue;
            }
            if !self.admissible(elm) {
                continue;
            }

            if n1 == 0 {
                // Hop out of ground through any grounded lead.
                for j in 0..elm.lead_count() {
                    if elm.lead_is_ground(j) && self.walk(elm.lead_node(j), depth) {
                        self.used[n1] = false;
                        return true;
                    }
                }
            }

            let Some(j) = (0..elm.lead_count()).find(|&j| elm.lead_node(j) == n1) else {
                continue;
            };

            if elm.lead_is_ground(j) && self.walk(0, depth) {
                self.used[n1] = false;
                return true;
            }

            if self.kind == PathKind::Inductor {
                if let Element::Inductor(_) = elm {
                    // Only inductors carrying the test element's current
                    // belong to the same series path.
                    let mut c = elm.current();
                    if j == 0 {
                        c = -c;
                    }
                    if (c - self.elements[self.first].current()).abs() > 1e-10 {
                        continue;
                    }
                }
            }

            for k in 0..elm.lead_count() {
                if j == k {
                    continue;
                }
                if elm.leads_are_connected(j, k) && self.walk(elm.lead_node(k), depth) {
                    self.used[n1] = false;
                    return true;
                }
            }
        }

        self.used[n1] = false;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{Capacitor, Inductor, Resistor, VoltageSource, Wire};

    fn bind(elm: &mut Element, n0: usize, n1: usize) {
        elm.set_lead_node(0, n0);
        elm.set_lead_node(1, n1);
    }

    #[test]
    fn test_inductor_with_resistive_return_path() {
        // Inductor 1-2, resistor 2-1 closing the loop.
        let mut ind = Element::from(Inductor::new(1e-3));
        let mut res = Element::from(Resistor::new(100.0));
        bind(&mut ind, 1, 2);
        bind(&mut res, 2, 1);
        let elements = vec![ind, res];

        let mut fp = FindPath::new(PathKind::Inductor, &elements, 3, 0, elements[0].lead_node(1));
        assert!(fp.search(elements[0].lead_node(0)));
    }

    #[test]
    fn test_inductor_without_return_path() {
        let mut ind = Element::from(Inductor::new(1e-3));
        let mut res = Element::from(Resistor::new(100.0));
        bind(&mut ind, 1, 2);
        // The resistor dangles elsewhere.
        bind(&mut res, 2, 3);
        let elements = vec![ind, res];

        let mut fp = FindPath::new(PathKind::Inductor, &elements, 4, 0, elements[0].lead_node(1));
        assert!(!fp.search(elements[0].lead_node(0)));
    }

    #[test]
    fn test_voltage_loop_through_parallel_source() {
        let mut v1 = Element::from(VoltageSource::dc(5.0));
        let mut v2 = Element::from(VoltageSource::dc(5.0));
        bind(&mut v1, 1, 2);
        bind(&mut v2, 1, 2);
        let elements = vec![v1, v2];

        let mut fp = FindPath::new(PathKind::Voltage, &elements, 3, 0, elements[0].lead_node(1));
        assert!(fp.search(elements[0].lead_node(0)));
    }

    #[test]
    fn test_voltage_path_does_not_cross_resistors() {
        let mut v1 = Element::from(VoltageSource::dc(5.0));
        let mut res = Element::from(Resistor::new(1000.0));
        bind(&mut v1, 1, 2);
        bind(&mut res, 1, 2);
        let elements = vec![v1, res];

        let mut fp = FindPath::new(PathKind::Voltage, &elements, 3, 0, elements[0].lead_node(1));
        assert!(!fp.search(elements[0].lead_node(0)));
    }

    #[test]
    fn test_capacitor_short_through_wire() {
        let mut cap = Element::from(Capacitor::new(1e-6));
        let mut wire = Element::from(Wire::new());
        bind(&mut cap, 1, 2);
        bind(&mut wire, 1, 2);
        let elements = vec![cap, wire];

        let mut fp = FindPath::new(PathKind::Short, &elements, 3, 0, elements[0].lead_node(1));
        assert!(fp.search(elements[0].lead_node(0)));
    }

    #[test]
    fn test_cap_voltage_loop_through_source() {
        let mut cap = Element::from(Capacitor::new(1e-6));
        let mut v = Element::from(VoltageSource::dc(5.0));
        bind(&mut cap, 1, 2);
        bind(&mut v, 1, 2);
        let elements = vec![cap, v];

        // Not a wire short, but a capacitor/voltage-source loop.
        let mut short = FindPath::new(PathKind::Short, &elements, 3, 0, elements[0].lead_node(1));
        assert!(!short.search(elements[0].lead_node(0)));
        let mut capv =
            FindPath::new(PathKind::CapVoltage, &elements, 3, 0, elements[0].lead_node(1));
        assert!(capv.search(elements[0].lead_node(0)));
    }

    #[test]
    fn test_depth_bound_cuts_long_paths() {
        // A chain of four wires between nodes 1 and 5.
        let mut elements = Vec::new();
        for i in 0..4 {
            let mut w = Element::from(Wire::new());
            bind(&mut w, i + 1, i + 2);
            elements.push(w);
        }
        let mut probe = Element::from(Wire::new());
        bind(&mut probe, 1, 5);
        elements.push(probe);

        let mut fp = FindPath::new(PathKind::Short, &elements, 6, 4, 5);
        assert!(!fp.search_depth(1, 2));
        let mut fp = FindPath::new(PathKind::Short, &elements, 6, 4, 5);
        assert!(fp.search(1));
    }
}
