use super::try_append;
use crate::evaluation::context::EvalContext;
use crate::evaluation::engine;
use crate::model::node::Node;
use crate::model::value::{DynValue, PinMap};
use crate::nodes::registry::{NodeBehavior, NodeCategory, NodeDescriptor, NodeRegistry};

/// Republishes whatever arrives on "Input" under a stable output pin.
/// Useful as a named junction between distant parts of a graph. Emits
/// nothing when the input resolves to nothing.
struct TransportValue;

impl NodeBehavior for TransportValue {
    fn execute(&self, node: &Node, ctx: &mut EvalContext<'_>, accumulated: &PinMap) -> PinMap {
        let mut outputs = PinMap::new();
        if let Some(value) = engine::dynamic_attribute(ctx, node, "Input", accumulated) {
            try_append(&mut outputs, node, "Output", value);
        }
        outputs
    }
}

fn component_index(swizzle_char: char) -> Option<usize> {
    match swizzle_char {
        'x' | 'r' | 's' => Some(0),
        'y' | 'g' | 't' => Some(1),
        'z' | 'b' => Some(2),
        'w' | 'a' => Some(3),
        _ => None,
    }
}

/// Reorders vector components per a GLSL-style mask ("xy", "RGBA", "w"...).
/// Unknown characters and components past the input's size are dropped; the
/// collected length picks the output kind. A three-component result has no
/// kind to land in and yields nothing.
fn swizzle(value: &DynValue, mask: &str) -> Option<DynValue> {
    let components: &[f32] = match value {
        DynValue::Vec2(v) => v,
        DynValue::Vec4(v) => v,
        _ => return None,
    };
    let collected: Vec<f32> = mask
        .to_lowercase()
        .chars()
        .filter_map(component_index)
        .filter(|&index| index < components.len())
        .map(|index| components[index])
        .collect();
    match collected.as_slice() {
        [single] => Some(DynValue::Float(*single)),
        [x, y] => Some(DynValue::Vec2([*x, *y])),
        [x, y, z, w] => Some(DynValue::Vec4([*x, *y, *z, *w])),
        _ => None,
    }
}

struct SwizzleVector;

impl NodeBehavior for SwizzleVector {
    fn execute(&self, node: &Node, ctx: &mut EvalContext<'_>, accumulated: &PinMap) -> PinMap {
        let mut outputs = PinMap::new();
        let value = engine::dynamic_attribute(ctx, node, "Value", accumulated);
        let mask = engine::attribute::<String>(ctx, node, "SwizzleMask", accumulated);
        if let (Some(value), Some(mask)) = (value, mask) {
            if let Some(swizzled) = swizzle(&value, &mask) {
                try_append(&mut outputs, node, "Output", swizzled);
            }
        }
        outputs
    }
}

pub(super) fn register(registry: &mut NodeRegistry) {
    registry.register(
        NodeDescriptor::new(
            "utility.transport_value",
            "Transport Value",
            NodeCategory::Utilities,
        )
        .with_inputs(vec!["Input"])
        .with_outputs(vec!["Output"]),
        TransportValue,
    );
    registry.register(
        NodeDescriptor::new(
            "utility.swizzle_vector",
            "Swizzle Vector",
            NodeCategory::Utilities,
        )
        .with_inputs(vec!["Value"])
        .with_outputs(vec!["Output"])
        .with_defaults(vec![
            ("Value", DynValue::Vec4([0.0, 0.0, 0.0, 0.0])),
            ("SwizzleMask", DynValue::String("XYZW".to_string())),
        ]),
        SwizzleVector,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swizzle_reorders_and_repeats_components() {
        let value = DynValue::Vec4([1.0, 2.0, 3.0, 4.0]);
        assert_eq!(
            swizzle(&value, "wzyx"),
            Some(DynValue::Vec4([4.0, 3.0, 2.0, 1.0]))
        );
        assert_eq!(swizzle(&value, "xx"), Some(DynValue::Vec2([1.0, 1.0])));
        assert_eq!(swizzle(&value, "a"), Some(DynValue::Float(4.0)));
    }

    #[test]
    fn test_swizzle_accepts_color_aliases_case_insensitively() {
        let value = DynValue::Vec4([0.1, 0.2, 0.3, 0.4]);
        assert_eq!(
            swizzle(&value, "RGBA"),
            Some(DynValue::Vec4([0.1, 0.2, 0.3, 0.4]))
        );
        // Unknown characters are dropped, not errors.
        assert_eq!(swizzle(&value, "r?g"), Some(DynValue::Vec2([0.1, 0.2])));
    }

    #[test]
    fn test_swizzle_drops_components_past_the_input_size() {
        let value = DynValue::Vec2([5.0, 6.0]);
        // z and w do not exist on a vec2, so only x and y survive.
        assert_eq!(swizzle(&value, "xyzw"), Some(DynValue::Vec2([5.0, 6.0])));
    }

    #[test]
    fn test_swizzle_rejects_unusable_shapes() {
        let value = DynValue::Vec4([1.0, 2.0, 3.0, 4.0]);
        assert_eq!(swizzle(&value, "xyz"), None);
        assert_eq!(swizzle(&value, ""), None);
        assert_eq!(swizzle(&DynValue::Float(1.0), "x"), None);
        assert_eq!(swizzle(&DynValue::String("xy".into()), "xy"), None);
    }
}
