//! Node types: the registry mapping type names to descriptors and
//! behaviors, the built-in catalog, and per-node render-thread scratch.

pub mod catalog;
pub mod registry;
pub mod scratch;

pub use registry::{NodeBehavior, NodeCategory, NodeDescriptor, NodeRegistry};
pub use scratch::{NodeScratch, ScratchTable};
