//! Topology resolution: from the lead-adjacency mesh to the ordered node
//! list the matrix is built over.
//!
//! The resolver walks elements in insertion order, folding mesh IDs into
//! dense node indices, allocating element-internal nodes, and assigning
//! every voltage source its global index. Node index 0 is ground and is
//! excluded from the matrix.

use std::collections::HashMap;

use log::debug;

use crate::circuit::types::{IdSource, MeshId, GROUND, UNASSIGNED};
use crate::elements::{CircuitElement, Element};

/// A live circuit node.
#[derive(Debug, Clone)]
pub struct CircuitNode {
    /// Mesh ID the node was folded from.
    pub mesh_id: MeshId,
    /// Injected by an element rather than by user connections. Internal
    /// nodes are exempt from the unconnected-node repair.
    pub internal: bool,
    /// Every (element, terminal) bound to this node.
    pub links: Vec<NodeLink>,
}

/// One terminal bound to a node.
#[derive(Debug, Clone, Copy)]
pub struct NodeLink {
    pub element: usize,
    pub lead: usize,
}

/// Output of topology resolution.
#[derive(Debug)]
pub struct Topology {
    /// Ordered node list; position 0 is ground, position in this list is
    /// the node's matrix row plus one.
    pub nodes: Vec<CircuitNode>,
    /// Element index owning voltage source `k`.
    pub voltage_sources: Vec<usize>,
    /// Whether any element is nonlinear.
    pub nonlinear: bool,
}

/// Resolve the node mesh into the ordered node list and bind every
/// element terminal to its node index.
pub fn resolve(
    elements: &mut [Element],
    mesh: &mut [Vec<MeshId>],
    ids: &mut IdSource,
) -> Topology {
    // Classify ground and voltage-source presence.
    let mut has_ground = false;
    let mut first_voltage = None;
    for (ei, elm) in elements.iter().enumerate() {
        for lead in 0..elm.lead_count() {
            if elm.lead_is_ground(lead) {
                has_ground = true;
            }
        }
        if first_voltage.is_none() && matches!(elm, Element::Voltage(_)) {
            first_voltage = Some(ei);
        }
    }

    // Choose the ground node's mesh ID. Without an explicit ground, the
    // first terminal of the first two-terminal voltage source becomes the
    // reference node.
    let ground_id = if has_ground {
        ids.next()
    } else if let Some(vi) = first_voltage {
        if mesh[vi][0] == UNASSIGNED {
            mesh[vi][0] = ids.next();
        }
        mesh[vi][0]
    } else {
        ids.next()
    };

    let mut nodes = vec![CircuitNode {
        mesh_id: ground_id,
        internal: false,
        links: Vec::new(),
    }];
    let mut index: HashMap<MeshId, usize> = HashMap::new();
    index.insert(ground_id, 0);

    let mut nonlinear = false;
    let mut vs_count = 0;

    for ei in 0..elements.len() {
        let external = elements[ei].lead_count();
        let internal = elements[ei].internal_lead_count();
        mesh[ei].resize(external + internal, UNASSIGNED);

        for lead in 0..external {
            let mut id = mesh[ei][lead];
            if id == UNASSIGNED {
                // Never-connected leads each get their own node.
                id = ids.next();
                mesh[ei][lead] = id;
            }
            let ni = if id == GROUND {
                0
            } else {
                match index.get(&id) {
                    Some(&ni) => ni,
                    None => {
                        let ni = nodes.len();
                        index.insert(id, ni);
                        nodes.push(CircuitNode {
                            mesh_id: id,
                            internal: false,
                            links: Vec::new(),
                        });
                        ni
                    }
                }
            };
            elements[ei].set_lead_node(lead, ni);
            if ni == 0 {
                elements[ei].set_lead_voltage(lead, 0.0);
            }
            nodes[ni].links.push(NodeLink { element: ei, lead });
        }

        for k in 0..internal {
            let id = ids.next();
            let lead = external + k;
            mesh[ei][lead] = id;
            let ni = nodes.len();
            index.insert(id, ni);
            nodes.push(CircuitNode {
                mesh_id: id,
                internal: true,
                links: vec![NodeLink { element: ei, lead }],
            });
            elements[ei].set_lead_node(lead, ni);
        }

        vs_count += elements[ei].voltage_source_count();
        if elements[ei].nonlinear() {
            nonlinear = true;
        }
    }

    // Bind each element's voltage source ordinals to global indices, in
    // element insertion order.
    let mut voltage_sources = vec![0; vs_count];
    let mut vs = 0;
    for (ei, elm) in elements.iter_mut().enumerate() {
        for ordinal in 0..elm.voltage_source_count() {
            voltage_sources[vs] = ei;
            elm.set_voltage_source(ordinal, vs);
            vs += 1;
        }
    }

    debug!(
        "resolved {} nodes, {} voltage sources, nonlinear: {}",
        nodes.len(),
        voltage_sources.len(),
        nonlinear
    );

    Topology {
        nodes,
        voltage_sources,
        nonlinear,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{Ground, OpAmp, Resistor, VoltageSource};

    fn connect(mesh: &mut [Vec<MeshId>], ids: &mut IdSource, a: (usize, usize), b: (usize, usize)) {
        let id = ids.next();
        mesh[a.0][a.1] = id;
        mesh[b.0][b.1] = id;
    }

    #[test]
    fn test_nodes_assigned_in_insertion_order() {
        let mut elements = vec![
            Element::from(Resistor::new(1000.0)),
            Element::from(Resistor::new(2000.0)),
            Element::from(Ground::new()),
        ];
        let mut mesh = vec![vec![UNASSIGNED; 2], vec![UNASSIGNED; 2], vec![UNASSIGNED; 1]];
        let mut ids = IdSource::new();
        // r0 lead1 -- r1 lead0, r1 lead1 -- ground
        connect(&mut mesh, &mut ids, (0, 1), (1, 0));
        let shared = ids.next();
        mesh[1][1] = shared;
        mesh[2][0] = shared;

        let topo = resolve(&mut elements, &mut mesh, &mut ids);
        // ground + r0.0 + junction + r1.1 = 4 nodes
        assert_eq!(topo.nodes.len(), 4);
        assert_eq!(elements[0].lead_node(0), 1);
        assert_eq!(elements[0].lead_node(1), 2);
        assert_eq!(elements[1].lead_node(0), 2);
        assert_eq!(elements[1].lead_node(1), 3);
        assert_eq!(elements[2].lead_node(0), 3);
        // One voltage source: the ground post.
        assert_eq!(topo.voltage_sources, vec![2]);
    }

    #[test]
    fn test_battery_terminal_becomes_ground() {
        let mut elements = vec![
            Element::from(VoltageSource::dc(10.0)),
            Element::from(Resistor::new(1000.0)),
        ];
        let mut mesh = vec![vec![UNASSIGNED; 2], vec![UNASSIGNED; 2]];
        let mut ids = IdSource::new();
        connect(&mut mesh, &mut ids, (0, 1), (1, 0));
        connect(&mut mesh, &mut ids, (1, 1), (0, 0));

        let topo = resolve(&mut elements, &mut mesh, &mut ids);
        // No ground post: the battery's first terminal is the reference.
        assert_eq!(elements[0].lead_node(0), 0);
        assert_eq!(elements[0].lead_voltage(0), 0.0);
        // Two electrical nodes: the reference and the battery/resistor top.
        assert_eq!(topo.nodes.len(), 2);
    }

    #[test]
    fn test_internal_nodes_flagged_and_appended() {
        let mut elements = vec![Element::from(OpAmp::default())];
        let mut mesh = vec![vec![UNASSIGNED; 3]];
        let mut ids = IdSource::new();

        let topo = resolve(&mut elements, &mut mesh, &mut ids);
        // ground + 3 external + 1 internal
        assert_eq!(topo.nodes.len(), 5);
        assert!(topo.nodes[4].internal);
        assert!(!topo.nodes[1].internal);
        assert_eq!(elements[0].lead_node(3), 4);
        assert_eq!(mesh[0].len(), 4);
    }

    #[test]
    fn test_unconnected_leads_get_distinct_nodes() {
        let mut elements = vec![Element::from(Resistor::new(1.0))];
        let mut mesh = vec![vec![UNASSIGNED; 2]];
        let mut ids = IdSource::new();
        let topo = resolve(&mut elements, &mut mesh, &mut ids);
        assert_eq!(topo.nodes.len(), 3);
        assert_ne!(elements[0].lead_node(0), elements[0].lead_node(1));
    }
}
