//! Core types for circuit identification and observation.

use std::fmt;

/// Mesh identifier attached to an element terminal.
///
/// IDs are opaque; only equality matters. `-1` marks a terminal that was
/// never connected, `0` is reserved for the ground node.
pub type MeshId = i64;

/// Mesh ID of a terminal that has not been connected yet.
pub const UNASSIGNED: MeshId = -1;

/// Mesh ID reserved for the ground node.
pub const GROUND: MeshId = 0;

/// A unique identifier for an element in the engine.
///
/// Elements are stored in insertion order and this is the insertion index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub usize);

impl ElementId {
    /// The lead at terminal `terminal` of this element.
    pub fn lead(self, terminal: usize) -> Lead {
        Lead {
            element: self,
            terminal,
        }
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

/// A connectable terminal: an element plus a terminal ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Lead {
    /// The element the terminal belongs to.
    pub element: ElementId,
    /// Terminal ordinal within the element.
    pub terminal: usize,
}

impl Lead {
    /// Create a lead from an element ID and terminal ordinal.
    pub fn new(element: ElementId, terminal: usize) -> Self {
        Self { element, terminal }
    }
}

impl fmt::Display for Lead {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.element, self.terminal)
    }
}

/// One observation sample of a watched element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScopeFrame {
    /// Simulation time the sample was taken at.
    pub time: f64,
    /// Voltage across the element.
    pub voltage: f64,
    /// Current through the element.
    pub current: f64,
}

/// Source of fresh mesh IDs.
///
/// Any unique 64-bit source works; a counter keeps IDs dense and
/// deterministic. `0` is never handed out because it addresses ground.
#[derive(Debug, Clone)]
pub(crate) struct IdSource {
    next: MeshId,
}

impl IdSource {
    pub(crate) fn new() -> Self {
        Self { next: 1 }
    }

    pub(crate) fn next(&mut self) -> MeshId {
        let id = self.next;
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_source_skips_reserved_ids() {
        let mut ids = IdSource::new();
        let first = ids.next();
        assert_ne!(first, UNASSIGNED);
        assert_ne!(first, GROUND);
        assert_ne!(ids.next(), first);
    }

    #[test]
    fn test_lead_display() {
        let lead = ElementId(3).lead(1);
        assert_eq!(lead.to_string(), "E3:1");
    }
}
