//! Main simulator interface.
//!
//! The [`Simulator`] owns the element arena, the lead-adjacency mesh and
//! the MNA system. Users add elements, connect leads and call
//! [`update`](Simulator::update); the engine lazily re-analyzes the
//! topology when it is dirty, then advances the simulation by exactly one
//! time step per call.
//!
//! Analysis runs in five phases: topology resolution, stamping, the
//! unconnected-node closure, path validation, and row simplification.
//! Linear circuits are LU-factored once at analysis time; nonlinear
//! circuits re-factor inside the Newton loop every tick.

use log::{debug, warn};

use crate::circuit::{
    CircuitNode, ElementId, FindPath, IdSource, Lead, MeshId, PathKind, ScopeFrame, UNASSIGNED,
};
use crate::circuit::topology;
use crate::elements::{CircuitElement, Element};
use crate::error::{BreadboardError, Result};
use crate::solver::lu::{lu_factor, lu_solve};
use crate::solver::matrix::RowKind;
use crate::solver::{simplify, MnaSystem, GROUND_PATCH_RESISTANCE, SUBITER_COUNT};
use crate::DEFAULT_TIME_STEP;

/// An append-only sample buffer for one watched element.
#[derive(Debug, Clone)]
struct Scope {
    element: usize,
    frames: Vec<ScopeFrame>,
}

/// The circuit simulation engine.
pub struct Simulator {
    elements: Vec<Element>,
    /// Mesh IDs per element terminal; parallel to `elements`.
    mesh: Vec<Vec<MeshId>>,
    nodes: Vec<CircuitNode>,
    /// Element index owning voltage source `k`.
    voltage_sources: Vec<usize>,
    mna: MnaSystem,
    ids: IdSource,
    dirty: bool,
    error: Option<BreadboardError>,
    error_element: Option<ElementId>,
    scopes: Vec<Scope>,
}

impl Simulator {
    /// Create an empty engine with the default time step.
    pub fn new() -> Self {
        Self {
            elements: Vec::new(),
            mesh: Vec::new(),
            nodes: Vec::new(),
            voltage_sources: Vec::new(),
            mna: MnaSystem::new(DEFAULT_TIME_STEP),
            ids: IdSource::new(),
            dirty: true,
            error: None,
            error_element: None,
            scopes: Vec::new(),
        }
    }

    // ============ Construction surface ============

    /// Register an element, taking ownership. Returns its ID, which is
    /// also its insertion index.
    pub fn add_element(&mut self, element: impl Into<Element>) -> ElementId {
        let element = element.into();
        let id = ElementId(self.elements.len());
        self.mesh.push(vec![UNASSIGNED; element.lead_count()]);
        self.elements.push(element);
        self.need_analyze();
        id
    }

    /// Connect two leads into one electrical node.
    ///
    /// When both leads already carry distinct mesh IDs, the right lead
    /// adopts the left lead's ID; earlier adopters of the right ID are
    /// not rewritten, so connect in a consistent order.
    pub fn connect(&mut self, left: Lead, right: Lead) {
        let l = self.mesh[left.element.0][left.terminal];
        let r = self.mesh[right.element.0][right.terminal];
        if l == UNASSIGNED && r == UNASSIGNED {
            let id = self.ids.next();
            self.mesh[left.element.0][left.terminal] = id;
            self.mesh[right.element.0][right.terminal] = id;
        } else if l == UNASSIGNED {
            self.mesh[left.element.0][left.terminal] = r;
        } else {
            self.mesh[right.element.0][right.terminal] = l;
        }
        self.need_analyze();
    }

    /// Start observing an element; one [`ScopeFrame`] is appended per
    /// tick.
    pub fn watch(&mut self, element: ElementId) {
        if !self.scopes.iter().any(|s| s.element == element.0) {
            self.scopes.push(Scope {
                element: element.0,
                frames: Vec::new(),
            });
        }
    }

    /// Samples captured for a watched element.
    pub fn frames(&self, element: ElementId) -> &[ScopeFrame] {
        self.scopes
            .iter()
            .find(|s| s.element == element.0)
            .map(|s| s.frames.as_slice())
            .unwrap_or(&[])
    }

    // ============ Accessors ============

    /// Shared access to an element.
    pub fn element(&self, id: ElementId) -> &Element {
        &self.elements[id.0]
    }

    /// Mutable access to an element. Call [`need_analyze`](Self::need_analyze)
    /// afterwards if the edit changes the element's topology.
    pub fn element_mut(&mut self, id: ElementId) -> &mut Element {
        &mut self.elements[id.0]
    }

    /// Number of registered elements.
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Number of live nodes after the last analysis, including ground.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Mesh ID of node list position `i`.
    pub fn node_id(&self, i: usize) -> MeshId {
        self.nodes[i].mesh_id
    }

    /// Simulation time in seconds.
    pub fn time(&self) -> f64 {
        self.mna.time
    }

    /// Time step in seconds.
    pub fn time_step(&self) -> f64 {
        self.mna.time_step
    }

    /// Change the time step. Takes effect at the next analysis.
    pub fn set_time_step(&mut self, dt: f64) {
        self.mna.time_step = dt;
        self.need_analyze();
    }

    /// The recorded fatal error, if any.
    pub fn error(&self) -> Option<&BreadboardError> {
        self.error.as_ref()
    }

    /// The recorded fatal error rendered as its user-facing message.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.to_string())
    }

    /// The element blamed for the recorded error, if any.
    pub fn error_element(&self) -> Option<ElementId> {
        self.error_element
    }

    // ============ Lifecycle ============

    /// Rewind simulation time to zero.
    pub fn reset_time(&mut self) {
        self.mna.time = 0.0;
    }

    /// Mark the topology dirty and clear any recorded error; the next
    /// `update` re-analyzes.
    pub fn need_analyze(&mut self) {
        self.dirty = true;
        self.error = None;
        self.error_element = None;
    }

    /// Advance the simulation by one time step.
    ///
    /// The `_dt` argument exists for callers that schedule on wall time;
    /// every call performs exactly one step of [`time_step`](Self::time_step).
    /// With no elements this is a no-op. While a fatal error is recorded
    /// the call returns it immediately; clear it with
    /// [`need_analyze`](Self::need_analyze) (any topology edit does).
    pub fn update(&mut self, _dt: f64) -> Result<()> {
        if self.elements.is_empty() {
            return Ok(());
        }
        if let Some(err) = self.error.clone() {
            return Err(err);
        }
        if self.dirty {
            self.analyze()?;
        }
        self.tick()
    }

    // ============ Analysis ============

    fn fail(&mut self, err: BreadboardError, element: Option<ElementId>) {
        self.error = Some(err);
        self.error_element = element;
        self.mna.clear_system();
        self.dirty = true;
    }

    fn analyze(&mut self) -> Result<()> {
        self.error = None;
        self.error_element = None;

        let topo = topology::resolve(&mut self.elements, &mut self.mesh, &mut self.ids);
        self.nodes = topo.nodes;
        self.voltage_sources = topo.voltage_sources;
        self.mna.alloc(
            self.nodes.len(),
            self.voltage_sources.len(),
            topo.nonlinear,
        );

        for i in 0..self.elements.len() {
            self.elements[i].stamp(&mut self.mna);
        }

        self.connect_unconnected_nodes();

        if let Err((err, element)) = self.validate() {
            self.fail(err.clone(), Some(element));
            return Err(err);
        }

        if let Err(err) = simplify::simplify(&mut self.mna) {
            self.fail(err.clone(), None);
            return Err(err);
        }

        self.mna.orig_matrix = self.mna.matrix.clone();
        self.mna.orig_right_side = self.mna.right_side.clone();
        self.mna.needs_map = true;

        if !self.mna.nonlinear && !lu_factor(&mut self.mna.matrix, &mut self.mna.permute) {
            let err = BreadboardError::SingularMatrix;
            self.fail(err.clone(), None);
            return Err(err);
        }

        debug!(
            "analyze: {} nodes, {} sources, matrix {}x{}",
            self.nodes.len(),
            self.voltage_sources.len(),
            self.mna.size,
            self.mna.size
        );
        self.dirty = false;
        Ok(())
    }

    /// Grow the set of nodes reachable from ground through conducting
    /// element leads; tie each remaining external node to ground through
    /// a large resistance so the matrix stays solvable.
    fn connect_unconnected_nodes(&mut self) {
        let n = self.nodes.len();
        let mut closure = vec![false; n];
        closure[0] = true;

        let mut changed = true;
        while changed {
            changed = false;
            for elm in self.elements.iter() {
                let leads = elm.lead_count();
                for j in 0..leads {
                    let nj = elm.lead_node(j);
                    if !closure[nj] {
                        if elm.lead_is_ground(j) {
                            closure[nj] = true;
                            changed = true;
                        }
                        continue;
                    }
                    for k in 0..leads {
                        if j == k {
                            continue;
                        }
                        let nk = elm.lead_node(k);
                        if elm.leads_are_connected(j, k) && !closure[nk] {
                            closure[nk] = true;
                            changed = true;
                        }
                    }
                }
            }
            if changed {
                continue;
            }
            for i in 0..n {
                if !closure[i] && !self.nodes[i].internal {
                    warn!("node {i} has no path to ground; patching with 1e8 ohms");
                    self.mna.stamp_resistor(0, i, GROUND_PATCH_RESISTANCE);
                    closure[i] = true;
                    changed = true;
                    break;
                }
            }
        }
    }

    fn validate(&mut self) -> std::result::Result<(), (BreadboardError, ElementId)> {
        let mut resets = Vec::new();
        let node_count = self.nodes.len();

        for (ei, elm) in self.elements.iter().enumerate() {
            match elm {
                Element::Inductor(_) => {
                    let dest = elm.lead_node(1);
                    let start = elm.lead_node(0);
                    let mut fp =
                        FindPath::new(PathKind::Inductor, &self.elements, node_count, ei, dest);
                    // A shallow probe finds most return paths cheaply.
                    if !fp.search_depth(start, 5) && !fp.search(start) {
                        warn!("inductor E{ei} has no current path; resetting it");
                        resets.push(ei);
                    }
                }
                Element::Current(_) => {
                    let dest = elm.lead_node(1);
                    let start = elm.lead_node(0);
                    let mut fp =
                        FindPath::new(PathKind::Inductor, &self.elements, node_count, ei, dest);
                    if !fp.search(start) {
                        return Err((BreadboardError::NoCurrentSourcePath, ElementId(ei)));
                    }
                }
                Element::Voltage(_) => {
                    let dest = elm.lead_node(1);
                    let start = elm.lead_node(0);
                    let mut fp =
                        FindPath::new(PathKind::Voltage, &self.elements, node_count, ei, dest);
                    if fp.search(start) {
                        return Err((BreadboardError::VoltageSourceLoop, ElementId(ei)));
                    }
                }
                Element::Capacitor(_) => {
                    let dest = elm.lead_node(1);
                    let start = elm.lead_node(0);
                    let mut fp =
                        FindPath::new(PathKind::Short, &self.elements, node_count, ei, dest);
                    if fp.search(start) {
                        warn!("capacitor E{ei} is shorted; resetting it");
                        resets.push(ei);
                    } else {
                        let mut fp = FindPath::new(
                            PathKind::CapVoltage,
                            &self.elements,
                            node_count,
                            ei,
                            dest,
                        );
                        if fp.search(start) {
                            return Err((BreadboardError::CapacitorLoop, ElementId(ei)));
                        }
                    }
                }
                _ => {}
            }
        }

        for ei in resets {
            self.elements[ei].reset();
        }
        Ok(())
    }

    // ============ Stepping ============

    fn tick(&mut self) -> Result<()> {
        for i in 0..self.elements.len() {
            self.elements[i].begin_step(&mut self.mna);
        }

        let mut subiter = 0;
        loop {
            if subiter == SUBITER_COUNT {
                let err = BreadboardError::ConvergenceFailed;
                self.fail(err.clone(), None);
                return Err(err);
            }

            self.mna.converged = true;
            self.mna.restore_right_side();
            if self.mna.nonlinear {
                self.mna.restore_matrix();
            }

            for i in 0..self.elements.len() {
                self.elements[i].step(&mut self.mna);
            }

            if self.mna.matrix.data().iter().any(|v| !v.is_finite()) {
                let err = BreadboardError::NonFiniteMatrix;
                self.fail(err.clone(), None);
                return Err(err);
            }

            if self.mna.nonlinear {
                if self.mna.converged && subiter > 0 {
                    break;
                }
                if !lu_factor(&mut self.mna.matrix, &mut self.mna.permute) {
                    let err = BreadboardError::SingularMatrix;
                    self.fail(err.clone(), None);
                    return Err(err);
                }
            }

            lu_solve(&self.mna.matrix, &self.mna.permute, &mut self.mna.right_side);
            self.distribute();

            if !self.mna.nonlinear {
                break;
            }
            subiter += 1;
        }

        // Round to keep k * dt exact over long runs.
        self.mna.time = round12(self.mna.time + self.mna.time_step);

        let time = self.mna.time;
        for scope in self.scopes.iter_mut() {
            let elm = &self.elements[scope.element];
            scope.frames.push(ScopeFrame {
                time,
                voltage: elm.voltage_delta(),
                current: elm.current(),
            });
        }
        Ok(())
    }

    /// Push the solved unknowns back out: node voltages to every bound
    /// lead, source currents to their owning elements. Indexed over the
    /// full pre-simplification system so constant rows resolve too.
    fn distribute(&mut self) {
        let node_rows = self.nodes.len() - 1;
        for j in 0..self.mna.full_size {
            let info = &self.mna.row_info[j];
            let res = match info.kind {
                RowKind::Const => info.value,
                _ => match info.map_col {
                    Some(c) => self.mna.right_side[c],
                    None => 0.0,
                },
            };
            if res.is_nan() {
                self.mna.converged = false;
                break;
            }
            if j < node_rows {
                let node = j + 1;
                for li in 0..self.nodes[node].links.len() {
                    let link = self.nodes[node].links[li];
                    self.elements[link.element].set_lead_voltage(link.lead, res);
                }
            } else {
                let ji = j - node_rows;
                let owner = self.voltage_sources[ji];
                self.elements[owner].set_current(ji, res);
            }
        }
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

fn round12(t: f64) -> f64 {
    (t * 1e12).round() / 1e12
}
