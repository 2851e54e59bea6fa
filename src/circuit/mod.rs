//! Circuit topology: node identity, lead connectivity, resolution into
//! the ordered node list, and pre-simulation path validation.

pub mod findpath;
pub mod topology;
mod types;

pub use findpath::{FindPath, PathKind};
pub use topology::{CircuitNode, NodeLink, Topology};
pub use types::{ElementId, Lead, MeshId, ScopeFrame, GROUND, UNASSIGNED};

pub(crate) use types::IdSource;
