//! # Breadboard
//!
//! An interactive transient circuit simulator core built on Modified
//! Nodal Analysis (MNA).
//!
//! This library provides:
//! - An element arena with user-connectable leads (build circuits the
//!   way you would plug parts into a breadboard)
//! - MNA assembly through a stamp kernel shared by all elements
//! - Structural row simplification before factorization
//! - Dense LU factorization with partial pivoting
//! - Newton-Raphson iteration for nonlinear elements
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`circuit`] - Node identity, topology resolution and path validation
//! - [`elements`] - Element models (resistors, sources, diodes, logic, ...)
//! - [`solver`] - MNA system, row simplifier, LU kernel and the engine
//! - [`error`] - The unified error type
//!
//! ## Usage
//!
//! ```
//! use breadboard::{CircuitElement, Ground, Resistor, Simulator, VoltageSource};
//!
//! let mut sim = Simulator::new();
//! let bat = sim.add_element(VoltageSource::dc(10.0));
//! let r1 = sim.add_element(Resistor::new(10_000.0));
//! let r2 = sim.add_element(Resistor::new(10_000.0));
//! let gnd = sim.add_element(Ground::new());
//!
//! sim.connect(bat.lead(1), r1.lead(0));
//! sim.connect(r1.lead(1), r2.lead(0));
//! sim.connect(r2.lead(1), gnd.lead(0));
//! sim.connect(bat.lead(0), gnd.lead(0));
//!
//! sim.update(0.0).unwrap();
//! let mid = sim.element(r2).lead_voltage(0);
//! assert!((mid - 5.0).abs() < 1e-9);
//! ```
//!
//! ## Simulation method
//!
//! Each call to [`Simulator::update`] advances the circuit by one time
//! step:
//!
//! 1. If the topology changed, re-analyze: resolve nodes, stamp elements,
//!    repair unconnected nodes, validate paths, simplify and factor
//! 2. Let every element precompute its companion model for the tick
//! 3. Solve Ax = z, re-stamping and re-factoring inside a Newton loop
//!    while nonlinear elements keep moving
//! 4. Distribute node voltages and source currents back to the elements
//!
//! Reactive elements (C, L) are discretized with the trapezoidal rule.

pub mod circuit;
pub mod elements;
pub mod error;
pub mod solver;

// Re-export main types for convenience
pub use circuit::{ElementId, Lead, MeshId, ScopeFrame};
pub use elements::{
    Capacitor, CircuitElement, CurrentSource, Diode, Element, Ground, HalfAdder, Inductor,
    LogicInput, LogicOutput, OpAmp, OpAmpParams, Rail, Resistor, VoltageSource, Waveform, Wire,
};
pub use error::{BreadboardError, Result};
pub use solver::{MnaSystem, Simulator};

/// Default simulation time step in seconds.
pub const DEFAULT_TIME_STEP: f64 = 5e-6;

/// Thermal voltage at room temperature (approximately 26mV)
pub const THERMAL_VOLTAGE: f64 = 0.0258;
