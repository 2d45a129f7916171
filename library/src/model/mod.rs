//! The serializable document model: projects, compositions, nodes, pins,
//! masks and the dynamic values that flow between them.

pub mod attribute;
pub mod composition;
pub mod mask;
pub mod node;
pub mod pin;
pub mod project;
pub mod value;

pub use attribute::{Attribute, Keyframe};
pub use composition::Composition;
pub use mask::{CompositionMask, MaskOperation};
pub use node::Node;
pub use pin::{allocate_id, ensure_ids_above, Pin, PinDirection, PinId, UNCONNECTED};
pub use project::Project;
pub use value::{DynValue, FromDynValue, PinMap, ValueKind};
