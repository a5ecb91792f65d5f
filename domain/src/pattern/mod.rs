//! Pattern definitions.

pub mod entities;

pub use entities::{Gate, ParticipantSelection, PatternDef, Phase, Topology, TopologyOptions};
